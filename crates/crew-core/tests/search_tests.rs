//! Search tool integration tests
//!
//! Each tool is pointed at a wiremock server standing in for the provider.

use crew_core::config::SearchConfig;
use crew_core::error::ToolError;
use crew_core::tools::search::{
    NewsArchiveSearch, ScholarSearch, SearchApiSearch, SerpApiSearch, SerperScholarSearch, SerperSearch,
    TwitterSearch, YouTubeSearch, MAX_TWEETS,
};
use crew_core::tools::Tool;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> SearchConfig {
    SearchConfig::default()
}

fn organic_results(n: usize, domain: &str) -> Value {
    let items: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "title": format!("Result {}", i),
                "link": format!("https://{}/status/{}", domain, i),
                "snippet": format!("Snippet {}", i)
            })
        })
        .collect();
    json!({ "organic_results": items })
}

mod serpapi_tests {
    use super::*;

    #[tokio::test]
    async fn test_internet_search_formats_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("engine", "google"))
            .and(query_param("q", "urban farming experts"))
            .and(query_param("safe", "active"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [
                    {"title": "Urban Farming Today", "link": "https://example.com/uf", "snippet": "Interviews"},
                    {"link": "https://example.com/bare"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = SerpApiSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool.execute(json!({"query": "urban farming experts"})).await.unwrap();

        assert!(output.success);
        assert!(output.content.starts_with("Title: Urban Farming Today\nLink: https://example.com/uf"));
        assert!(output.content.contains("Title: No title\nLink: https://example.com/bare\nSnippet: No snippet\n---"));
        assert_eq!(output.metadata["count"], 2);
    }

    #[tokio::test]
    async fn test_short_query_is_rejected() {
        let tool = SerpApiSearch::new(&config()).with_api_key("test-key");
        let err = tool.execute(json!({"query": " a "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_youtube_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("engine", "youtube"))
            .and(query_param("search_query", "assam tea history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "video_results": [{
                    "title": "Tea gardens",
                    "link": "https://youtube.com/watch?v=1",
                    "channel": {"name": "History Lens", "link": "https://youtube.com/@lens"},
                    "views": 1500,
                    "published_date": "1 year ago"
                }]
            })))
            .mount(&server)
            .await;

        let tool = YouTubeSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool.execute(json!({"query": "assam tea history"})).await.unwrap();
        assert!(output.content.contains("Channel: History Lens (https://youtube.com/@lens)"));
        assert!(output.content.contains("Views: 1500"));
    }

    #[tokio::test]
    async fn test_twitter_search_stops_when_page_has_few_tweets() {
        let server = MockServer::start().await;
        let mut mixed_page = organic_results(7, "twitter.com");
        if let Some(items) = mixed_page["organic_results"].as_array_mut() {
            for i in 0..3 {
                items.push(json!({"title": "Elsewhere", "link": format!("https://example.com/{}", i), "snippet": "not a tweet"}));
            }
        }
        // Ten results, only seven of them tweets
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "tea site:twitter.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mixed_page))
            .expect(1)
            .mount(&server)
            .await;

        let tool = TwitterSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let tweets = tool.collect("tea").await.unwrap();

        assert_eq!(tweets.len(), 7);
        assert!(tweets.iter().all(|t| t.link.contains("twitter.com")));
    }

    #[tokio::test]
    async fn test_twitter_search_follows_full_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_results(10, "twitter.com")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("start", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_results(3, "twitter.com")))
            .expect(1)
            .mount(&server)
            .await;

        let tool = TwitterSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let tweets = tool.collect("tea").await.unwrap();

        assert_eq!(tweets.len(), 13);
    }

    #[tokio::test]
    async fn test_twitter_search_caps_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_results(10, "twitter.com")))
            .mount(&server)
            .await;

        let tool = TwitterSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key")
            .with_max_pages(50);
        let tweets = tool.collect("tea").await.unwrap();
        assert_eq!(tweets.len(), MAX_TWEETS);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), MAX_TWEETS / 10);
    }

    #[tokio::test]
    async fn test_twitter_search_keeps_results_before_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_results(10, "twitter.com")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("start", "10"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let tool = TwitterSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        assert_eq!(tool.collect("tea").await.unwrap().len(), 10);
    }
}

mod searchapi_tests {
    use super::*;

    #[tokio::test]
    async fn test_searchapi_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("engine", "google"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_results(2, "example.org")))
            .expect(1)
            .mount(&server)
            .await;

        let tool = SearchApiSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool.execute(json!({"query": "podcast guests soil"})).await.unwrap();
        assert_eq!(output.content.matches("---").count(), 2);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let tool = SearchApiSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool.execute(json!({"query": "nothing here"})).await.unwrap();
        assert!(output.success);
        assert_eq!(output.content, "No results found.");
    }

    #[tokio::test]
    async fn test_scholar_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("engine", "google_scholar"))
            .and(query_param("num", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [{
                    "title": "Partition and memory",
                    "link": "https://doi.org/10.1/pm",
                    "snippet": "Oral histories",
                    "cited_by_count": 88,
                    "year": 2001
                }]
            })))
            .mount(&server)
            .await;

        let tool = ScholarSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool
            .execute(json!({"query": "partition memory", "num_results": 5}))
            .await
            .unwrap();
        assert!(output.content.contains("Year: 2001\nCitations: 88\nAuthors: N/A"));
    }

    #[tokio::test]
    async fn test_news_archive_date_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("tbm", "nws"))
            .and(query_param("tbs", "ar:1,cdr:1,cd_min:1/1/1947,cd_max:12/31/1950"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic_results": [{
                    "title": "Refugee camps expand",
                    "link": "https://news.example/1",
                    "source": "The Statesman",
                    "date": "Mar 3, 1948",
                    "snippet": "Thousands arrive"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = NewsArchiveSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool
            .execute(json!({"query": "partition refugees", "start_year": 1947, "end_year": "1950"}))
            .await
            .unwrap();
        assert!(output.content.contains("Source: The Statesman\nDate: Mar 3, 1948"));
    }

    #[tokio::test]
    async fn test_news_archive_rejects_reversed_range() {
        let tool = NewsArchiveSearch::new(&config()).with_api_key("test-key");
        let err = tool
            .execute(json!({"query": "partition", "start_year": 1960, "end_year": 1950}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}

mod serper_tests {
    use super::*;

    #[tokio::test]
    async fn test_serper_search_posts_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "test-key"))
            .and(body_partial_json(json!({"q": "b-roll ideas"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [{"title": "Stock footage", "link": "https://example.com/b", "snippet": "Free clips"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = SerperSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool.execute(json!({"query": "b-roll ideas"})).await.unwrap();
        assert_eq!(
            output.content,
            "Title: Stock footage\nLink: https://example.com/b\nSnippet: Free clips\n---"
        );
    }

    #[tokio::test]
    async fn test_serper_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Unauthorized."))
            .mount(&server)
            .await;

        let tool = SerperSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("bad-key");
        let err = tool.execute(json!({"query": "anything"})).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Serper error 403"));
        assert!(message.contains("Unauthorized."));
    }

    #[tokio::test]
    async fn test_serper_scholar_extracts_year_and_citations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({"q": "tea labour site:scholar.google.com", "num": 20})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    {
                        "title": "Tea labour in Assam, 1890-1947",
                        "link": "https://scholar.google.com/x",
                        "snippet": "Published 2003 ... Cited by 120 Related articles"
                    },
                    {"title": "Untitled notes", "link": "https://scholar.google.com/y"}
                ]
            })))
            .mount(&server)
            .await;

        let tool = SerperScholarSearch::new(&config())
            .with_base_url(server.uri())
            .with_api_key("test-key");
        let output = tool.execute(json!({"query": "tea labour"})).await.unwrap();

        // "1890-1947" strips to 18901947, out of range, so the snippet year wins
        assert!(output.content.contains("Year: 2003\nCitations: 120"));
        assert!(output.content.contains("Year: N/A\nCitations: N/A\nSnippet: No snippet"));
    }
}
