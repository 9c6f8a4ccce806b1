//! The model-completion collaborator interface.
//!
//! The core never talks to a provider directly. It consumes this narrow
//! text-in/text-out interface whose failures are typed [`ModelError`]s.

use crate::errors::ModelError;
use async_trait::async_trait;

/// A generative-model completion client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Completes `prompt` with the model identified by `model_id`.
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<String, ModelError>;
}

/// A client for pipelines that never call a model.
///
/// Every call fails with an unclassified error, so it is never retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledModelClient;

#[async_trait]
impl ModelClient for DisabledModelClient {
    async fn complete(&self, _prompt: &str, model_id: &str) -> Result<String, ModelError> {
        Err(ModelError::other(format!(
            "no model client configured (requested '{model_id}')"
        )))
    }
}

/// Fills `{name}` placeholders in `template` from `lookup`.
///
/// Placeholders `lookup` does not know are left untouched.
pub fn render_prompt<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .map(|close| &after[..close])
            .filter(|name| is_placeholder_name(name))
            .and_then(|name| lookup(name).map(|value| (name.len(), value)));

        match value {
            Some((len, value)) => {
                out.push_str(&value);
                rest = &after[len + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_render_prompt() {
        let rendered = render_prompt("Build {app} with {stack} and {missing}. {\"json\": 1}", |key| {
            match key {
                "app" => Some("todo".to_string()),
                "stack" => Some("{react}".to_string()),
                _ => None,
            }
        });
        assert_eq!(rendered, "Build todo with {react} and {missing}. {\"json\": 1}");
    }

    #[tokio::test]
    async fn test_disabled_client_is_not_retryable() {
        let err = DisabledModelClient.complete("hi", "m").await.unwrap_err();
        assert!(!err.kind().is_retryable());
        assert!(err.to_string().contains("'m'"));
    }

    #[tokio::test]
    async fn test_mock_client_behind_trait_object() {
        let mut mock = MockModelClient::new();
        mock.expect_complete()
            .withf(|prompt, model| prompt == "ping" && model == "small")
            .times(1)
            .returning(|_, _| Ok("pong".to_string()));

        let client: Arc<dyn ModelClient> = Arc::new(mock);
        assert_eq!(client.complete("ping", "small").await.unwrap(), "pong");
    }
}
