//! Serper (google.serper.dev) tools: web search and a scholar-flavoured
//! search that pulls publication year and citation counts out of the
//! result text.

use serde_json::{json, Value};
use std::time::Duration;

use super::{format_results, http_client, json_body, organic, query_param, query_schema, u64_param, SearchResult};
use crate::config::{SearchConfig, SERPER_KEY_ENV};
use crate::error::ToolError;
use crate::tools::{BoxFuture, Tool, ToolOutput};

const SERPER_BASE_URL: &str = "https://google.serper.dev";

const CITATION_PATTERNS: &[&str] = &["cited by", "citations:", "citations -"];
const CITATION_WINDOW: usize = 30;

#[derive(Debug, Clone)]
struct SerperClient {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl SerperClient {
    fn new(config: &SearchConfig) -> Self {
        Self {
            api_key: config.serper_key(),
            base_url: SERPER_BASE_URL.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn search(&self, payload: Value) -> Result<Value, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::MissingApiKey(SERPER_KEY_ENV))?;

        let client = http_client(self.timeout)?;
        let response = client
            .post(format!("{}/search", self.base_url.trim_end_matches('/')))
            .header("X-API-KEY", api_key)
            .json(&payload)
            .send()
            .await?;

        json_body(response, "Serper").await
    }
}

macro_rules! serper_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
                self.client.base_url = base_url.into();
                self
            }

            pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
                self.client.api_key = Some(api_key.into());
                self
            }
        }
    };
}

/// Web search through Serper
pub struct SerperSearch {
    client: SerperClient,
}

serper_builders!(SerperSearch);

impl SerperSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SerperClient::new(config),
        }
    }
}

impl Tool for SerperSearch {
    fn name(&self) -> &str {
        "serper_search"
    }

    fn description(&self) -> &str {
        "Search the internet for current information using Serper."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The search query to execute")
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = query_param(&params)?;
            let body = self.client.search(json!({ "q": query })).await?;
            let results: Vec<SearchResult> = organic(&body, "organic")
                .iter()
                .map(SearchResult::from_item)
                .collect();
            Ok(ToolOutput::success(format_results(
                &results,
                "No results found or error in search.",
            ))
            .with_metadata("count", results.len())
            .with_metadata("provider", "serper"))
        })
    }
}

fn digits(word: &str) -> String {
    word.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// First year between 1901 and 2024 mentioned in `title`, then `snippet`.
///
/// Words are stripped down to their digits, so "(1947)" and "1947," match.
pub fn extract_year(title: &str, snippet: &str) -> Option<String> {
    [title, snippet].iter().find_map(|text| {
        text.split_whitespace().find_map(|word| {
            let cleaned = digits(word);
            match cleaned.parse::<u32>() {
                Ok(year) if year > 1900 && year < 2025 => Some(cleaned),
                _ => None,
            }
        })
    })
}

/// Citation count that follows "cited by", "citations:" or "citations -".
///
/// Later patterns win when several are present.
pub fn extract_citations(snippet: &str) -> Option<String> {
    let lower = snippet.to_ascii_lowercase();
    let mut citations = None;

    for pattern in CITATION_PATTERNS {
        let Some(idx) = lower.find(pattern) else {
            continue;
        };
        let window: String = snippet[idx..].chars().take(CITATION_WINDOW).collect();
        if let Some(count) = window
            .split_whitespace()
            .map(digits)
            .find(|d| !d.is_empty())
        {
            citations = Some(count);
        }
    }
    citations
}

/// Scholarly search through Serper, restricted to scholar.google.com
pub struct SerperScholarSearch {
    client: SerperClient,
}

serper_builders!(SerperScholarSearch);

impl SerperScholarSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SerperClient::new(config),
        }
    }
}

fn format_scholar_item(item: &Value) -> String {
    let result = SearchResult::from_item(item);
    let title = if result.title.is_empty() { "No title".to_string() } else { result.title };
    let link = if result.link.is_empty() { "No link".to_string() } else { result.link };
    let snippet = if result.snippet.is_empty() { "No snippet".to_string() } else { result.snippet };

    let year = extract_year(&title, &snippet).unwrap_or_else(|| "N/A".into());
    let citations = extract_citations(&snippet).unwrap_or_else(|| "N/A".into());

    format!(
        "Title: {}\nLink: {}\nYear: {}\nCitations: {}\nSnippet: {}\n---",
        title, link, year, citations, snippet
    )
}

impl Tool for SerperScholarSearch {
    fn name(&self) -> &str {
        "serper_scholar"
    }

    fn description(&self) -> &str {
        "Search for academic papers and scholarly content using Serper."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The academic search query to execute", "minLength": 2 },
                "num_results": { "type": "integer", "description": "Number of results to return (default 20)" }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = query_param(&params)?;
            let num = u64_param(&params, "num_results").unwrap_or(20);
            let body = self
                .client
                .search(json!({
                    "q": format!("{} site:scholar.google.com", query),
                    "num": num
                }))
                .await?;

            let items = organic(&body, "organic");
            let content = if items.is_empty() {
                "No scholarly results found or error in search.".to_string()
            } else {
                items.iter().map(format_scholar_item).collect::<Vec<_>>().join("\n")
            };
            Ok(ToolOutput::success(content).with_metadata("count", items.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_year_prefers_title() {
        assert_eq!(
            extract_year("Partition narratives (1947)", "Published 1999"),
            Some("1947".to_string())
        );
        assert_eq!(
            extract_year("Partition narratives", "Published 1999, reprinted"),
            Some("1999".to_string())
        );
    }

    #[test]
    fn test_extract_year_bounds() {
        assert_eq!(extract_year("Census of 1900", ""), None);
        assert_eq!(extract_year("Outlook 2025", ""), None);
        assert_eq!(extract_year("Volume 12 page 88", "no years here"), None);
    }

    #[test]
    fn test_extract_citations() {
        assert_eq!(
            extract_citations("A study of Sylhet ... Cited by 245 Related articles"),
            Some("245".to_string())
        );
        assert_eq!(extract_citations("Citations: 17"), Some("17".to_string()));
        assert_eq!(extract_citations("no counts mentioned"), None);
    }

    #[test]
    fn test_format_scholar_item_placeholders() {
        let text = format_scholar_item(&json!({ "link": "https://scholar.google.com/x" }));
        assert!(text.starts_with("Title: No title\n"));
        assert!(text.contains("Year: N/A"));
        assert!(text.contains("Citations: N/A"));
    }
}
