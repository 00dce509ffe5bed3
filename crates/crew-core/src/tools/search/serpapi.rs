//! SerpAPI-backed tools: Google web search, YouTube search and a
//! paginated Google search restricted to twitter.com.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{format_results, http_client, json_body, organic, query_param, query_schema, str_field, SearchResult};
use crate::config::{SearchConfig, SERPAPI_KEY_ENV};
use crate::error::ToolError;
use crate::tools::{BoxFuture, Tool, ToolOutput};

const SERPAPI_BASE_URL: &str = "https://serpapi.com";

/// Tweets collected at most per search
pub const MAX_TWEETS: usize = 200;
const TWEETS_PER_PAGE: usize = 10;

/// Connection settings shared by all SerpAPI tools
#[derive(Debug, Clone)]
struct SerpApiClient {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl SerpApiClient {
    fn new(config: &SearchConfig) -> Self {
        Self {
            api_key: config.serpapi_key(),
            base_url: SERPAPI_BASE_URL.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<Value, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::MissingApiKey(SERPAPI_KEY_ENV))?;

        let client = http_client(self.timeout)?;
        let response = client
            .get(format!("{}/search", self.base_url.trim_end_matches('/')))
            .query(params)
            .query(&[("api_key", api_key)])
            .send()
            .await?;

        json_body(response, "SerpAPI").await
    }
}

macro_rules! serpapi_builders {
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

/// Google web search through SerpAPI
pub struct SerpApiSearch {
    client: SerpApiClient,
    max_results: usize,
}

serpapi_builders!(SerpApiSearch);

impl SerpApiSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SerpApiClient::new(config),
            max_results: config.max_results,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        let body = self
            .client
            .get(&[
                ("engine", "google".to_string()),
                ("q", query.to_string()),
                ("google_domain", "google.com".to_string()),
                ("gl", "us".to_string()),
                ("hl", "en".to_string()),
                ("safe", "active".to_string()),
                ("num", self.max_results.to_string()),
            ])
            .await?;

        Ok(organic(&body, "organic_results")
            .iter()
            .take(self.max_results)
            .map(SearchResult::from_item)
            .collect())
    }
}

impl Tool for SerpApiSearch {
    fn name(&self) -> &str {
        "internet_search"
    }

    fn description(&self) -> &str {
        "Search the internet for people, topics and current events (Google via SerpAPI)."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The search query")
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = query_param(&params)?;
            let results = self.search(&query).await?;
            debug!(query = %query, count = results.len(), "SerpAPI search finished");
            Ok(ToolOutput::success(format_results(&results, "No results found."))
                .with_metadata("count", results.len())
                .with_metadata("provider", "serpapi"))
        })
    }
}

/// A video returned by the YouTube engine
#[derive(Debug, Clone, PartialEq)]
pub struct VideoResult {
    pub title: String,
    pub link: String,
    pub channel_name: String,
    pub channel_link: String,
    pub views: String,
    pub published_date: String,
}

impl VideoResult {
    fn from_item(item: &Value) -> Self {
        let channel = item.get("channel").cloned().unwrap_or(Value::Null);
        Self {
            title: str_field(item, "title"),
            link: str_field(item, "link"),
            channel_name: str_field(&channel, "name"),
            channel_link: str_field(&channel, "link"),
            views: str_field(item, "views"),
            published_date: str_field(item, "published_date"),
        }
    }
}

/// Parse the `video_results` array of a SerpAPI YouTube response
pub fn parse_youtube_results(body: &Value) -> Vec<VideoResult> {
    organic(body, "video_results")
        .iter()
        .map(VideoResult::from_item)
        .collect()
}

fn format_videos(videos: &[VideoResult]) -> String {
    if videos.is_empty() {
        return "No videos found.".to_string();
    }
    videos
        .iter()
        .map(|v| {
            format!(
                "Title: {}\nLink: {}\nChannel: {} ({})\nViews: {}\nPublished: {}\n---",
                v.title, v.link, v.channel_name, v.channel_link, v.views, v.published_date
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// YouTube search through SerpAPI
pub struct YouTubeSearch {
    client: SerpApiClient,
}

serpapi_builders!(YouTubeSearch);

impl YouTubeSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SerpApiClient::new(config),
        }
    }
}

impl Tool for YouTubeSearch {
    fn name(&self) -> &str {
        "youtube_search"
    }

    fn description(&self) -> &str {
        "Search YouTube for videos on a topic. Returns title, link, channel, views and publish date."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("What to search for on YouTube")
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = query_param(&params)?;
            let body = self
                .client
                .get(&[("engine", "youtube".to_string()), ("search_query", query)])
                .await?;
            let videos = parse_youtube_results(&body);
            Ok(ToolOutput::success(format_videos(&videos)).with_metadata("count", videos.len()))
        })
    }
}

/// Google search restricted to twitter.com, walking result pages
pub struct TwitterSearch {
    client: SerpApiClient,
    max_pages: usize,
}

serpapi_builders!(TwitterSearch);

impl TwitterSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: SerpApiClient::new(config),
            max_pages: 20,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Collect up to [`MAX_TWEETS`] tweet links.
    ///
    /// Stops early on a short page or a failed request; whatever was
    /// collected before a failure is still returned.
    pub async fn collect(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        info!(query = %query, "Starting Google search for Twitter results");
        let mut tweets: Vec<SearchResult> = Vec::new();

        for page in 0..self.max_pages {
            let body = match self
                .client
                .get(&[
                    ("engine", "google".to_string()),
                    ("q", format!("{} site:twitter.com", query)),
                    ("start", (page * TWEETS_PER_PAGE).to_string()),
                    ("num", TWEETS_PER_PAGE.to_string()),
                ])
                .await
            {
                Ok(body) => body,
                Err(ToolError::MissingApiKey(env)) => return Err(ToolError::MissingApiKey(env)),
                Err(e) => {
                    warn!(page, error = %e, "Twitter search page failed");
                    break;
                }
            };

            let before = tweets.len();
            tweets.extend(
                organic(&body, "organic_results")
                    .iter()
                    .map(SearchResult::from_item)
                    .filter(|r| r.link.contains("twitter.com")),
            );

            // A page with fewer than a full page of tweets is the last one
            if tweets.len() - before < TWEETS_PER_PAGE || tweets.len() >= MAX_TWEETS {
                break;
            }
        }

        tweets.truncate(MAX_TWEETS);
        info!(count = tweets.len(), "Total tweets collected");
        Ok(tweets)
    }
}

impl Tool for TwitterSearch {
    fn name(&self) -> &str {
        "twitter_search"
    }

    fn description(&self) -> &str {
        "Search Google for Twitter posts about a topic. Returns up to 200 tweet snippets and links."
    }

    fn parameters_schema(&self) -> Value {
        query_schema("Topic to look for on Twitter")
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = query_param(&params)?;
            let tweets = self.collect(&query).await?;
            Ok(ToolOutput::success(format_results(&tweets, "No tweets found."))
                .with_metadata("count", json!(tweets.len())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_youtube_results() {
        let body = json!({
            "video_results": [{
                "title": "Tea gardens of Assam",
                "link": "https://youtube.com/watch?v=1",
                "channel": {"name": "History Lens", "link": "https://youtube.com/@lens"},
                "views": 12034,
                "published_date": "2 years ago"
            }, {
                "title": "No channel"
            }]
        });

        let videos = parse_youtube_results(&body);
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].channel_name, "History Lens");
        assert_eq!(videos[0].views, "12034");
        assert_eq!(videos[1].channel_link, "");
    }

    #[test]
    fn test_format_videos_empty() {
        assert_eq!(format_videos(&[]), "No videos found.");
    }
}
