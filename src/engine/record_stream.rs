//! Lazy record sequence of one stream-partition
//!
//! Drives the stream's page sequence through the executor, normalizes and
//! filters records, and reports the highest replication value per page.

use super::types::{EmittedRecord, RecordPage};
use crate::decode::{normalize_keys, JsonDecoder};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::pagination::{PageRequest, PageResponse, PageSequence};
use crate::partition::PartitionContext;
use crate::state::Bookmark;
use crate::streams::StreamDefinition;
use crate::template;
use chrono::Utc;
use futures::{stream, Stream, TryStreamExt};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Records of one stream for one partition context
pub struct RecordStream {
    client: Arc<HttpClient>,
    definition: StreamDefinition,
    context: PartitionContext,
    resume_from: Option<Bookmark>,
    decoder: JsonDecoder,
    pages: PageSequence,
    previous: Option<PageResponse>,
}

impl RecordStream {
    /// Prepare the first request of the run. Nothing is fetched until the
    /// first page is asked for.
    pub fn new(
        client: Arc<HttpClient>,
        definition: StreamDefinition,
        context: PartitionContext,
        resume_from: Option<Bookmark>,
    ) -> Result<Self> {
        let first = first_request(&definition, &context, resume_from.as_ref())?;
        let pages = PageSequence::new(&definition.pagination, first);

        Ok(Self {
            client,
            decoder: JsonDecoder::with_path(definition.record_path),
            definition,
            context,
            resume_from,
            pages,
            previous: None,
        })
    }

    /// Stream definition
    pub fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    /// Partition context
    pub fn context(&self) -> &PartitionContext {
        &self.context
    }

    /// Bookmark the run resumes from
    pub fn resume_from(&self) -> Option<&Bookmark> {
        self.resume_from.as_ref()
    }

    /// Requests issued so far
    pub fn requests(&self) -> u32 {
        self.pages.state().requests
    }

    /// Fetch the next page, or `None` once pagination is exhausted.
    ///
    /// An error aborts the run; the stream must not be polled again after it.
    pub async fn next_page(&mut self) -> Result<Option<RecordPage>> {
        let Some(request) = self.pages.next(self.previous.as_ref()) else {
            return Ok(None);
        };

        let response = match self.client.execute(&request).await {
            Ok(response) => response.decoded(&self.decoder)?,
            Err(Error::ClientRequest { status, body }) if self.definition.tolerates(status) => {
                warn!(
                    stream = self.definition.name,
                    partition = %self.context,
                    status,
                    body = %body,
                    "Endpoint not available, treating as empty"
                );
                PageResponse::empty(status)
            }
            Err(e) => return Err(e),
        };

        let page = self.build_page(&response);
        debug!(
            stream = self.definition.name,
            partition = %self.context,
            fetched = page.fetched,
            kept = page.len(),
            "Page received"
        );
        self.previous = Some(response);
        Ok(Some(page))
    }

    /// Consume the stream as a lazy sequence of records
    pub fn into_records(self) -> impl Stream<Item = Result<EmittedRecord>> {
        stream::try_unfold(self, |mut records| async move {
            let page = records.next_page().await?;
            let batch = page.map(|page| stream::iter(page.records.into_iter().map(Ok::<_, Error>)));
            Ok::<_, Error>(batch.map(|batch| (batch, records)))
        })
        .try_flatten()
    }

    fn build_page(&self, response: &PageResponse) -> RecordPage {
        let time_extracted = Utc::now();
        let replication = self.definition.replication;
        let mut page = RecordPage {
            fetched: response.record_count(),
            ..RecordPage::default()
        };

        for raw in &response.records {
            let record = self.merge_context(normalize_keys(raw.clone()));

            if let Some(replication) = replication {
                let value = record
                    .get(replication.field)
                    .and_then(|v| Bookmark::from_value(v, replication.kind));
                match value {
                    Some(value) => {
                        if self.is_older_than_resume(&value) {
                            continue;
                        }
                        let higher = page
                            .max_bookmark
                            .as_ref()
                            .is_none_or(|max| value.partial_cmp(max) == Some(Ordering::Greater));
                        if higher {
                            page.max_bookmark = Some(value);
                        }
                    }
                    None => debug!(
                        stream = self.definition.name,
                        field = replication.field,
                        "Record has no usable replication value"
                    ),
                }
            }

            page.records.push(EmittedRecord::new(
                self.definition.name,
                self.context.clone(),
                record,
                time_extracted,
            ));
        }

        page
    }

    fn is_older_than_resume(&self, value: &Bookmark) -> bool {
        self.resume_from
            .as_ref()
            .is_some_and(|resume| value.partial_cmp(resume) == Some(Ordering::Less))
    }

    /// Copy partition context fields into the record where it has none
    fn merge_context(&self, mut record: Value) -> Value {
        if let Value::Object(fields) = &mut record {
            for (key, value) in self.context.iter() {
                fields.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        record
    }
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("stream", &self.definition.name)
            .field("context", &self.context)
            .field("resume_from", &self.resume_from)
            .field("requests", &self.requests())
            .finish_non_exhaustive()
    }
}

/// Render the stream's path and query against the partition and inject the
/// server-side filter when resuming.
fn first_request(
    definition: &StreamDefinition,
    context: &PartitionContext,
    resume_from: Option<&Bookmark>,
) -> Result<PageRequest> {
    let mut request = PageRequest::get(template::render_path(definition.path, context)?);
    request.method = definition.method;

    for (key, value) in definition.query {
        let rendered = template::render(value, context)?;
        if !rendered.is_empty() {
            request = request.with_query(*key, rendered);
        }
    }

    let filter = definition.replication.and_then(|r| r.server_filter);
    if let (Some(filter), Some(seconds)) = (filter, resume_from.and_then(Bookmark::as_unix_seconds)) {
        request = request.with_query(filter.param, seconds.to_string());
    }

    Ok(request)
}
