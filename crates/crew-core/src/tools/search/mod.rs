//! Web search tools backed by SerpAPI, SearchAPI.io and Serper
//!
//! Every tool turns a provider's JSON response into the plain-text block
//! format agents consume:
//!
//! ```text
//! Title: ...
//! Link: ...
//! Snippet: ...
//! ---
//! ```

mod searchapi;
mod serpapi;
mod serper;

pub use searchapi::{news_time_filter, parse_scholar_results, NewsArchiveSearch, ScholarResult, ScholarSearch, SearchApiSearch};
pub use serpapi::{parse_youtube_results, SerpApiSearch, TwitterSearch, VideoResult, YouTubeSearch, MAX_TWEETS};
pub use serper::{extract_citations, extract_year, SerperScholarSearch, SerperSearch};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{SEARCHAPI_KEY_ENV, SERPAPI_KEY_ENV, SERPER_KEY_ENV};
use crate::error::ToolError;

/// Environment variable holding the key a search tool needs
pub fn api_key_env(tool_name: &str) -> Option<&'static str> {
    match tool_name {
        "internet_search" | "youtube_search" | "twitter_search" => Some(SERPAPI_KEY_ENV),
        "searchapi_search" | "scholar_search" | "news_archive_search" => Some(SEARCHAPI_KEY_ENV),
        "serper_search" | "serper_scholar" => Some(SERPER_KEY_ENV),
        _ => None,
    }
}

/// Search result from web search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

impl SearchResult {
    pub(crate) fn from_item(item: &Value) -> Self {
        Self {
            title: str_field(item, "title"),
            link: str_field(item, "link"),
            snippet: str_field(item, "snippet"),
        }
    }
}

/// Render results as `Title/Link/Snippet/---` blocks.
///
/// Returns `empty_message` when there is nothing to show so agents get a
/// readable answer instead of an empty string.
pub fn format_results(results: &[SearchResult], empty_message: &str) -> String {
    if results.is_empty() {
        return empty_message.to_string();
    }

    let mut lines = Vec::with_capacity(results.len() * 4);
    for result in results {
        lines.push(format!("Title: {}", or_placeholder(&result.title, "No title")));
        lines.push(format!("Link: {}", or_placeholder(&result.link, "No link")));
        lines.push(format!("Snippet: {}", or_placeholder(&result.snippet, "No snippet")));
        lines.push("---".to_string());
    }
    lines.join("\n")
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}

/// Schema shared by every single-query search tool
pub(crate) fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": description,
                "minLength": 2
            }
        },
        "required": ["query"]
    })
}

/// Pull the `query` parameter, rejecting missing or too-short queries
pub(crate) fn query_param(params: &Value) -> Result<String, ToolError> {
    let query = params
        .get("query")
        .and_then(|q| q.as_str())
        .map(str::trim)
        .ok_or_else(|| ToolError::InvalidParams("query is required".into()))?;

    if query.chars().count() < 2 {
        return Err(ToolError::InvalidParams(
            "query must be at least 2 characters".into(),
        ));
    }
    Ok(query.to_string())
}

pub(crate) fn u64_param(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

pub(crate) fn str_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ToolError::ExecutionFailed(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into an error carrying the provider's message
pub(crate) async fn json_body(response: reqwest::Response, provider: &str) -> Result<Value, ToolError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ToolError::ExecutionFailed(format!(
            "{} error {}: {}",
            provider,
            status,
            crate::report::truncate_str(&body, 200)
        )));
    }
    response
        .json()
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("Failed to parse {} response: {}", provider, e)))
}

pub(crate) fn organic(body: &Value, key: &str) -> Vec<Value> {
    body.get(key)
        .and_then(|o| o.as_array())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_results() {
        let results = vec![SearchResult {
            title: "Partition of Bengal".into(),
            link: "https://example.org/bengal".into(),
            snippet: String::new(),
        }];
        assert_eq!(
            format_results(&results, "none"),
            "Title: Partition of Bengal\nLink: https://example.org/bengal\nSnippet: No snippet\n---"
        );
        assert_eq!(format_results(&[], "No results found."), "No results found.");
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(&json!({"query": "  assam tea "})).unwrap(), "assam tea");
        assert!(matches!(query_param(&json!({})), Err(ToolError::InvalidParams(_))));
        assert!(matches!(query_param(&json!({"query": "a"})), Err(ToolError::InvalidParams(_))));
    }

    #[test]
    fn test_u64_param_accepts_strings() {
        assert_eq!(u64_param(&json!({"start_year": 1947}), "start_year"), Some(1947));
        assert_eq!(u64_param(&json!({"start_year": "1971"}), "start_year"), Some(1971));
        assert_eq!(u64_param(&json!({"start_year": "soon"}), "start_year"), None);
    }
}
