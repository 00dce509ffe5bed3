//! SearchAPI.io-backed tools: Google search, Google Scholar and the news archive.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{format_results, http_client, json_body, organic, query_param, query_schema, str_field, u64_param, SearchResult};
use crate::config::{SearchConfig, SEARCHAPI_KEY_ENV};
use crate::error::ToolError;
use crate::tools::{BoxFuture, Tool, ToolOutput};

const SEARCHAPI_BASE_URL: &str = "https://www.searchapi.io";

#[derive(Debug, Clone)]
struct SearchApiClient {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl SearchApiClient {
    fn new(config: &SearchConfig) -> Self {
        Self {
            api_key: config.searchapi_key(),
            base_url: SEARCHAPI_BASE_URL.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<Value, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::MissingApiKey(SEARCHAPI_KEY_ENV))?;

        let client = http_client(self.timeout)?;
        let response = client
            .get(format!("{}/api/v1/search", self.base_url.trim_end_matches('/')))
            .query(params)
            .query(&[("api_key", api_key)])
            .send()
            .await?;

        json_body(response, "SearchAPI").await
    }
}

macro_rules! searchapi_builders {
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

/// Google web search through SearchAPI.io
pub struct SearchApiSearch {
    client: SearchApiClient,
}

searchapi_builders!(SearchApiSearch);

impl SearchApiSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SearchApiClient::new(config),
        }
    }
}

impl Tool for SearchApiSearch {
    fn name(&self) -> &str {
        "searchapi_search"
    }

    fn description(&self) -> &str {
        "Find current data and information on any topic (Google via SearchAPI)."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The search query")
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = query_param(&params)?;
            let body = self
                .client
                .get(&[("engine", "google".to_string()), ("q", query)])
                .await?;
            let results: Vec<SearchResult> = organic(&body, "organic_results")
                .iter()
                .map(SearchResult::from_item)
                .collect();
            Ok(ToolOutput::success(format_results(&results, "No results found."))
                .with_metadata("count", results.len())
                .with_metadata("provider", "searchapi"))
        })
    }
}

/// A scholarly article from Google Scholar
#[derive(Debug, Clone, PartialEq)]
pub struct ScholarResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub citations: Option<u64>,
    pub year: Option<String>,
    pub authors: Vec<String>,
}

impl ScholarResult {
    fn from_item(item: &Value) -> Self {
        let authors = item
            .get("authors")
            .and_then(|a| a.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| match a {
                        Value::String(s) => Some(s.clone()),
                        other => other.get("name").and_then(|n| n.as_str()).map(String::from),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let year = match str_field(item, "year") {
            y if y.is_empty() => None,
            y => Some(y),
        };

        Self {
            title: str_field(item, "title"),
            link: str_field(item, "link"),
            snippet: str_field(item, "snippet"),
            citations: item.get("cited_by_count").and_then(|c| c.as_u64()),
            year,
            authors,
        }
    }
}

/// Parse `organic_results` of a SearchAPI Google Scholar response
pub fn parse_scholar_results(body: &Value) -> Vec<ScholarResult> {
    organic(body, "organic_results")
        .iter()
        .map(ScholarResult::from_item)
        .collect()
}

fn format_scholar(results: &[ScholarResult]) -> String {
    if results.is_empty() {
        return "No scholarly results found.".to_string();
    }
    results
        .iter()
        .map(|r| {
            format!(
                "Title: {}\nLink: {}\nYear: {}\nCitations: {}\nAuthors: {}\nSnippet: {}\n---",
                r.title,
                r.link,
                r.year.as_deref().unwrap_or("N/A"),
                r.citations.map(|c| c.to_string()).unwrap_or_else(|| "N/A".into()),
                if r.authors.is_empty() { "N/A".to_string() } else { r.authors.join(", ") },
                r.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Academic search through SearchAPI's Google Scholar engine
pub struct ScholarSearch {
    client: SearchApiClient,
}

searchapi_builders!(ScholarSearch);

impl ScholarSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SearchApiClient::new(config),
        }
    }
}

impl Tool for ScholarSearch {
    fn name(&self) -> &str {
        "scholar_search"
    }

    fn description(&self) -> &str {
        "Academic search returning scholarly articles with citation counts, year and authors."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The academic search query", "minLength": 2 },
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
                .get(&[
                    ("engine", "google_scholar".to_string()),
                    ("q", query),
                    ("num", num.to_string()),
                ])
                .await?;
            let results = parse_scholar_results(&body);
            debug!(count = results.len(), "Google Scholar search finished");
            Ok(ToolOutput::success(format_scholar(&results)).with_metadata("count", results.len()))
        })
    }
}

/// Build the `tbs` value for a news archive search
pub fn news_time_filter(start_year: Option<u64>, end_year: Option<u64>) -> String {
    let mut tbs = "ar:1".to_string();
    if let (Some(start), Some(end)) = (start_year, end_year) {
        tbs.push_str(&format!(",cdr:1,cd_min:1/1/{},cd_max:12/31/{}", start, end));
    }
    tbs
}

/// Historical news search with an optional year range
pub struct NewsArchiveSearch {
    client: SearchApiClient,
}

searchapi_builders!(NewsArchiveSearch);

impl NewsArchiveSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SearchApiClient::new(config),
        }
    }
}

impl Tool for NewsArchiveSearch {
    fn name(&self) -> &str {
        "news_archive_search"
    }

    fn description(&self) -> &str {
        "Search historical news archives, optionally limited to a start_year..end_year range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The news search query", "minLength": 2 },
                "start_year": { "type": "integer", "description": "First year of the range" },
                "end_year": { "type": "integer", "description": "Last year of the range" }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = query_param(&params)?;
            let start = u64_param(&params, "start_year");
            let end = u64_param(&params, "end_year");
            if let (Some(s), Some(e)) = (start, end) {
                if s > e {
                    return Err(ToolError::InvalidParams(format!(
                        "start_year {} is after end_year {}",
                        s, e
                    )));
                }
            }

            let body = self
                .client
                .get(&[
                    ("engine", "google".to_string()),
                    ("q", query),
                    ("tbm", "nws".to_string()),
                    ("tbs", news_time_filter(start, end)),
                ])
                .await?;

            let articles: Vec<String> = organic(&body, "organic_results")
                .iter()
                .map(|item| {
                    format!(
                        "Title: {}\nLink: {}\nSource: {}\nDate: {}\nSnippet: {}\n---",
                        str_field(item, "title"),
                        str_field(item, "link"),
                        str_field(item, "source"),
                        str_field(item, "date"),
                        str_field(item, "snippet"),
                    )
                })
                .collect();

            let count = articles.len();
            let content = if articles.is_empty() {
                "No news articles found.".to_string()
            } else {
                articles.join("\n")
            };
            Ok(ToolOutput::success(content).with_metadata("count", count))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_time_filter() {
        assert_eq!(news_time_filter(None, None), "ar:1");
        assert_eq!(news_time_filter(Some(1947), None), "ar:1");
        assert_eq!(
            news_time_filter(Some(1947), Some(1950)),
            "ar:1,cdr:1,cd_min:1/1/1947,cd_max:12/31/1950"
        );
    }

    #[test]
    fn test_parse_scholar_results() {
        let body = json!({
            "organic_results": [{
                "title": "Tea and empire",
                "link": "https://doi.org/10.1/tea",
                "snippet": "Plantation labour in colonial Assam",
                "cited_by_count": 112,
                "year": 2009,
                "authors": [{"name": "J. Sharma"}, "R. Behal"]
            }]
        });

        let results = parse_scholar_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].citations, Some(112));
        assert_eq!(results[0].year.as_deref(), Some("2009"));
        assert_eq!(results[0].authors, vec!["J. Sharma", "R. Behal"]);

        let text = format_scholar(&results);
        assert!(text.contains("Authors: J. Sharma, R. Behal"));
        assert!(text.contains("Citations: 112"));
    }
}
