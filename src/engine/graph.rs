//! Stream dependency graph
//!
//! Orders the selected streams so every child runs after its parent, and
//! pulls in unselected ancestors that only feed partition contexts.

use crate::error::{Error, Result};
use crate::streams::{Catalog, StreamDefinition};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Execution plan over a catalog
#[derive(Debug, Clone)]
pub struct DependencyGraph<'a> {
    /// Streams in execution order
    order: Vec<&'a StreamDefinition>,
    /// Streams whose records are emitted
    selected: HashSet<&'static str>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the plan for `selected` streams (`None` selects every stream).
    ///
    /// Fails on unknown streams, unknown parents and parent cycles.
    pub fn new(catalog: &'a Catalog, selected: Option<&[String]>) -> Result<Self> {
        let roots: Vec<&'a StreamDefinition> = match selected {
            Some(names) => names
                .iter()
                .map(|name| catalog.require(name))
                .collect::<Result<_>>()?,
            None => catalog.iter().collect(),
        };

        let mut marks: HashMap<&'static str, Mark> = HashMap::new();
        let mut order = Vec::new();
        for stream in &roots {
            visit(catalog, stream, &mut marks, &mut Vec::new(), &mut order)?;
        }

        Ok(Self {
            order,
            selected: roots.iter().map(|s| s.name).collect(),
        })
    }

    /// Streams in an order where every parent precedes its children
    pub fn execution_order(&self) -> &[&'a StreamDefinition] {
        &self.order
    }

    /// Whether the records of `stream` are emitted
    pub fn is_selected(&self, stream: &str) -> bool {
        self.selected.contains(stream)
    }

    /// Planned streams fed by `parent`
    pub fn children(&self, parent: &str) -> Vec<&'a StreamDefinition> {
        self.order
            .iter()
            .copied()
            .filter(|s| s.parent() == Some(parent))
            .collect()
    }

    /// Number of planned streams
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is planned
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn visit<'a>(
    catalog: &'a Catalog,
    stream: &'a StreamDefinition,
    marks: &mut HashMap<&'static str, Mark>,
    path: &mut Vec<&'static str>,
    order: &mut Vec<&'a StreamDefinition>,
) -> Result<()> {
    match marks.get(stream.name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|s| *s == stream.name).unwrap_or(0);
            let mut streams: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
            streams.push(stream.name.to_string());
            return Err(Error::DependencyCycle { streams });
        }
        None => {}
    }

    marks.insert(stream.name, Mark::Visiting);
    path.push(stream.name);

    if let Some(parent_name) = stream.parent() {
        let parent = catalog.get(parent_name).ok_or_else(|| {
            Error::config(format!(
                "Stream '{}' depends on unknown stream '{parent_name}'",
                stream.name
            ))
        })?;
        visit(catalog, parent, marks, path, order)?;
    }

    path.pop();
    marks.insert(stream.name, Mark::Done);
    order.push(stream);
    Ok(())
}
