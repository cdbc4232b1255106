//! Headline retrieval from RSS/Atom feeds, plus the News API when a key is
//! configured.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{FeedSource, NewsConfig};

/// Source of candidate headlines, most relevant first.
#[allow(async_fn_in_trait)]
pub trait HeadlineSource {
    async fn get_latest_headlines(&self, limit: usize) -> Result<Vec<String>>;
}

/// Pulls headlines from a fixed list of syndication feeds.
pub struct RssHeadlineSource {
    client: Client,
    feeds: Vec<FeedSource>,
    min_title_len: usize,
    news_api: Option<NewsApi>,
}

struct NewsApi {
    url: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    title: Option<String>,
}

impl RssHeadlineSource {
    pub fn new(config: &NewsConfig, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .user_agent(concat!("newsforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            feeds: config.feeds.clone(),
            min_title_len: config.min_title_len,
            news_api: config
                .news_api_key
                .as_ref()
                .filter(|key| !key.is_empty())
                .map(|key| NewsApi {
                    url: config.news_api_url.clone(),
                    key: key.clone(),
                }),
        }
    }

    fn keep_title(&self, title: &str) -> bool {
        title.chars().count() > self.min_title_len
    }

    async fn fetch_feed(&self, feed: &FeedSource, per_feed: usize) -> Result<Vec<String>> {
        let body = self
            .client
            .get(&feed.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", feed.url))?
            .error_for_status()?
            .bytes()
            .await?;

        let parsed = feed_rs::parser::parse(&body[..])
            .with_context(|| format!("unparseable feed from {}", feed.url))?;

        let titles = parsed
            .entries
            .into_iter()
            .take(per_feed)
            .filter_map(|entry| entry.title.map(|t| t.content.trim().to_string()))
            .filter(|title| self.keep_title(title))
            .collect();
        Ok(titles)
    }

    /// Top general headlines in English, `page_size` at most.
    async fn fetch_news_api(&self, api: &NewsApi, page_size: usize) -> Result<Vec<String>> {
        let page_size = page_size.to_string();
        let response: NewsApiResponse = self
            .client
            .get(&api.url)
            .query(&[
                ("apiKey", api.key.as_str()),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
                ("category", "general"),
            ])
            .send()
            .await
            .context("News API request failed")?
            .error_for_status()?
            .json()
            .await
            .context("unexpected News API response")?;

        let titles = response
            .articles
            .into_iter()
            .filter_map(|article| article.title.map(|t| t.trim().to_string()))
            .filter(|title| self.keep_title(title))
            .collect();
        Ok(titles)
    }
}

impl HeadlineSource for RssHeadlineSource {
    /// Each feed contributes up to `limit / feeds` titles and the News API
    /// up to `limit / 2`. Failing sources are logged and skipped, so total
    /// failure yields an empty list.
    async fn get_latest_headlines(&self, limit: usize) -> Result<Vec<String>> {
        if limit == 0 || (self.feeds.is_empty() && self.news_api.is_none()) {
            return Ok(Vec::new());
        }

        let mut headlines: Vec<String> = Vec::new();
        let mut merge = |titles: Vec<String>| {
            for title in titles {
                if !headlines.contains(&title) {
                    headlines.push(title);
                }
            }
        };

        if !self.feeds.is_empty() {
            let per_feed = (limit / self.feeds.len()).max(1);
            for feed in &self.feeds {
                match self.fetch_feed(feed, per_feed).await {
                    Ok(titles) => {
                        debug!(feed = %feed.name, count = titles.len(), "feed fetched");
                        merge(titles);
                    }
                    Err(e) => warn!(feed = %feed.name, "feed fetch failed: {e:#}"),
                }
            }
        }

        if let Some(api) = &self.news_api {
            match self.fetch_news_api(api, (limit / 2).max(1)).await {
                Ok(titles) => {
                    debug!(count = titles.len(), "News API fetched");
                    merge(titles);
                }
                Err(e) => warn!("News API fetch failed: {e:#}"),
            }
        }

        headlines.truncate(limit);
        info!(count = headlines.len(), "fetched unique headlines");
        Ok(headlines)
    }
}
