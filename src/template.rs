//! Path template interpolation
//!
//! Stream paths are declared as templates such as
//! `/api/stacks/{org_name}/{project_name}/{stack_name}/updates` and rendered
//! against the partition context of the run.

use crate::error::{Error, Result};
use crate::partition::PartitionContext;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::form_urlencoded;

/// Regex for matching template variables: {variable}
static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}").unwrap());

/// Render a template string with the given partition context.
///
/// Values are substituted verbatim; use [`render_path`] for URL paths.
pub fn render(template: &str, ctx: &PartitionContext) -> Result<String> {
    render_with(template, ctx, |value| value)
}

/// Render a URL path template. Each substituted value is percent-encoded
/// as a single path segment, so `/`, `?` or `#` in a name stay inside it.
pub fn render_path(template: &str, ctx: &PartitionContext) -> Result<String> {
    render_with(template, ctx, |value| encode_segment(&value))
}

fn render_with(
    template: &str,
    ctx: &PartitionContext,
    encode: impl Fn(String) -> String,
) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let name = &cap[1];
        match ctx.get(name) {
            Some(value) => encode(value_to_string(value)),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Form encoding writes spaces as `+`; paths need `%20`. A literal `+` is
/// already `%2B` at this point.
fn encode_segment(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_substitution() {
        let ctx = PartitionContext::new().with("org_name", "acme");
        let result = render("/api/orgs/{org_name}/teams", &ctx).unwrap();
        assert_eq!(result, "/api/orgs/acme/teams");
    }

    #[test]
    fn test_multiple_substitutions() {
        let ctx = PartitionContext::new()
            .with("org_name", "acme")
            .with("project_name", "web")
            .with("stack_name", "prod");

        let result = render("/api/stacks/{org_name}/{project_name}/{stack_name}", &ctx).unwrap();
        assert_eq!(result, "/api/stacks/acme/web/prod");
    }

    #[test]
    fn test_number_substitution() {
        let ctx = PartitionContext::new().with("scheduled_action_id", 42);
        assert_eq!(
            render("/schedules/{scheduled_action_id}/history", &ctx).unwrap(),
            "/schedules/42/history"
        );
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = PartitionContext::new().with("org_name", "acme");
        let err = render("/api/orgs/{org_name}/teams/{team_name}", &ctx).unwrap_err();
        assert!(err.to_string().contains("team_name"));
    }

    #[test]
    fn test_no_templates() {
        let ctx = PartitionContext::new();
        assert_eq!(render("/api/user", &ctx).unwrap(), "/api/user");
    }

    #[test]
    fn test_whitespace_in_template() {
        let ctx = PartitionContext::new().with("org_name", "acme");
        assert_eq!(render("{org_name}", &ctx).unwrap(), "acme");
        assert_eq!(render("{ org_name }", &ctx).unwrap(), "acme");
    }

    #[test]
    fn test_path_values_are_percent_encoded() {
        let ctx = PartitionContext::new()
            .with("org_name", "acme")
            .with("team_name", "ops/on call#1?x+y");
        assert_eq!(
            render_path("/api/orgs/{org_name}/teams/{team_name}", &ctx).unwrap(),
            "/api/orgs/acme/teams/ops%2Fon%20call%231%3Fx%2By"
        );
    }

    #[test]
    fn test_path_keeps_unreserved_characters() {
        let ctx = PartitionContext::new().with("stack_name", "web-app_v1.2");
        assert_eq!(
            render_path("/stacks/{stack_name}", &ctx).unwrap(),
            "/stacks/web-app_v1.2"
        );
    }

    #[test]
    fn test_query_values_are_not_encoded() {
        let ctx = PartitionContext::new().with("org_name", "a b");
        assert_eq!(render("{org_name}", &ctx).unwrap(), "a b");
    }
}
