use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::debug;

use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::WebSearch;
use flowstack_core::WebResult;

const SERPAPI_URL: &str = "https://serpapi.com/search";
const TAVILY_URL: &str = "https://api.tavily.com/search";

fn search_err(provider: &str, message: impl ToString) -> FlowError {
    FlowError::WebSearch {
        provider: provider.to_string(),
        message: message.to_string(),
    }
}

async fn read_json(provider: &str, resp: reqwest::Response) -> Result<Value> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(search_err(provider, format!("HTTP {}: {}", status, body)));
    }
    resp.json().await.map_err(|e| search_err(provider, e))
}

/// Google organic results through SerpApi.
pub struct SerpApiSearch {
    api_key: String,
    http: reqwest::Client,
}

impl SerpApiSearch {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

pub(crate) fn parse_serpapi(body: &Value, num_results: usize) -> Vec<WebResult> {
    body["organic_results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .take(num_results)
                .map(|r| WebResult {
                    title: r["title"].as_str().unwrap_or("").to_string(),
                    link: r["link"].as_str().unwrap_or("").to_string(),
                    snippet: r["snippet"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl WebSearch for SerpApiSearch {
    fn name(&self) -> &str {
        "serpapi"
    }

    fn search(&self, query: &str, num_results: usize) -> BoxFuture<'_, Result<Vec<WebResult>>> {
        let query = query.to_string();
        Box::pin(async move {
            let num = num_results.to_string();
            let resp = self
                .http
                .get(SERPAPI_URL)
                .query(&[
                    ("q", query.as_str()),
                    ("api_key", self.api_key.as_str()),
                    ("num", num.as_str()),
                ])
                .send()
                .await
                .map_err(|e| search_err("serpapi", e))?;

            let body = read_json("serpapi", resp).await?;
            if let Some(error) = body["error"].as_str() {
                return Err(search_err("serpapi", error));
            }
            let results = parse_serpapi(&body, num_results);
            debug!(hits = results.len(), "SerpApi search complete");
            Ok(results)
        })
    }
}

/// Tavily search API.
pub struct TavilySearch {
    api_key: String,
    http: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

pub(crate) fn parse_tavily(body: &Value, num_results: usize) -> Vec<WebResult> {
    body["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .take(num_results)
                .map(|r| WebResult {
                    title: r["title"].as_str().unwrap_or("").to_string(),
                    link: r["url"].as_str().unwrap_or("").to_string(),
                    snippet: r["content"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl WebSearch for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search(&self, query: &str, num_results: usize) -> BoxFuture<'_, Result<Vec<WebResult>>> {
        let query = query.to_string();
        Box::pin(async move {
            let resp = self
                .http
                .post(TAVILY_URL)
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": num_results,
                }))
                .send()
                .await
                .map_err(|e| search_err("tavily", e))?;

            let body = read_json("tavily", resp).await?;
            let results = parse_tavily(&body, num_results);
            debug!(hits = results.len(), "Tavily search complete");
            Ok(results)
        })
    }
}
