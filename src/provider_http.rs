//! Query provider for a hosted graph's HTTP query endpoint.
//!
//! Sends the Datalog query from [`page_dump_core::query`] as
//! `{"query": ..., "args": [title, rules]}` with a bearer token, and
//! reads back `{"result": [[record], ...]}`. Keys in the result carry
//! Datalog namespaces (`:block/string`, `:db/id`); they are stripped
//! before deserialization so records match the file provider's shape.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use page_dump_core::query::{build_query, build_rules};
use page_dump_core::{FollowLinksDirective, RawRecord};
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::SourceConfig;
use crate::provider_file::parse_records;
use crate::traits::QueryProvider;

pub struct HttpQueryProvider {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpQueryProvider {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }

    /// Build from `[source]`, reading the token from `source.token_env`.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .context("source.endpoint is not set")?;
        let token = std::env::var(&config.token_env).with_context(|| {
            format!(
                "Environment variable {} must hold the API token",
                config.token_env
            )
        })?;
        Self::new(endpoint, token, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl QueryProvider for HttpQueryProvider {
    async fn fetch_records(
        &self,
        title: &str,
        follow_children: FollowLinksDirective,
        follow_refs: FollowLinksDirective,
    ) -> Result<Vec<RawRecord>> {
        let query = build_query(follow_children, follow_refs);
        let rules = build_rules(follow_children, follow_refs);
        tracing::debug!(%query, %rules, "posting query");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "args": [title, rules] }))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to query {}: {}", self.endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Query failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        let body: Value = resp.json().await.context("Query response is not JSON")?;
        let result = match body {
            Value::Object(mut obj) => obj.remove("result").unwrap_or(Value::Null),
            other => other,
        };
        parse_records(strip_namespaces(result))
    }
}

/// Recursively rewrite `:ns/name` keys to `name`.
pub fn strip_namespaces(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(strip_namespaces).collect()),
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (local_name(&k).to_string(), strip_namespaces(v)))
                .collect::<Map<_, _>>(),
        ),
        other => other,
    }
}

fn local_name(key: &str) -> &str {
    let key = key.strip_prefix(':').unwrap_or(key);
    key.rsplit_once('/').map(|(_, name)| name).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_namespaces() {
        let raw = json!([[{
            ":db/id": 2,
            ":block/uid": "b1",
            ":block/string": "hi",
            ":block/children": [{":db/id": 3}],
            ":block/page": {":db/id": 1}
        }]]);
        assert_eq!(
            strip_namespaces(raw),
            json!([[{
                "id": 2,
                "uid": "b1",
                "string": "hi",
                "children": [{"id": 3}],
                "page": {"id": 1}
            }]])
        );
    }

    #[test]
    fn test_plain_keys_untouched() {
        assert_eq!(local_name("uid"), "uid");
        assert_eq!(local_name(":node/title"), "title");
    }

    #[test]
    fn test_stripped_result_parses_as_records() {
        let raw = json!([[{":db/id": 1, ":block/uid": "p1", ":node/title": "Root"}]]);
        let records = parse_records(strip_namespaces(raw)).unwrap();
        assert_eq!(records[0].title.as_deref(), Some("Root"));
        assert_eq!(records[0].id, 1);
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = SourceConfig {
            kind: "http".to_string(),
            dir: None,
            endpoint: Some("https://example.com/q".to_string()),
            token_env: "PAGE_DUMP_TEST_TOKEN_THAT_IS_NOT_SET".to_string(),
            timeout_secs: 5,
        };
        let err = HttpQueryProvider::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("PAGE_DUMP_TEST_TOKEN_THAT_IS_NOT_SET"));
    }
}
