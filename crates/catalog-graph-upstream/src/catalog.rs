//! Catalog search and access-control reads.
//!
//! The `fetch_*` methods recover every failure to `None` with a warning, so
//! one unreadable record only skips that record. The `try_*` variants keep
//! the error for callers that want it.

use crate::config::UpstreamConfig;
use crate::records::{AclPage, AclRecord, CollectionPage, CollectionRecord};
use crate::token::Credential;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamFetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

#[derive(Deserialize)]
struct UmmSearchResponse {
    #[serde(default)]
    items: Vec<CollectionRecord>,
}

#[derive(Deserialize, Default)]
struct JsonFeed {
    #[serde(default)]
    feed: FeedBody,
}

#[derive(Deserialize, Default)]
struct FeedBody {
    #[serde(default)]
    entry: Vec<FeedEntry>,
}

#[derive(Deserialize)]
struct FeedEntry {
    id: String,
}

#[derive(Deserialize, Default)]
struct AclSearchResponse {
    #[serde(default)]
    hits: Option<u64>,
    #[serde(default)]
    items: Vec<AclSearchItem>,
}

#[derive(Deserialize)]
struct AclSearchItem {
    concept_id: String,
}

pub struct CatalogClient {
    pub(crate) client: Client,
    pub(crate) config: UpstreamConfig,
}

impl CatalogClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamFetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamFetchError::Transport {
                url: config.catalog_root.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub(crate) fn authorize(request: RequestBuilder, token: Option<&Credential>) -> RequestBuilder {
        match token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token.expose())),
            None => request,
        }
    }

    /// GET `url` with `query` appended. 404 is `Ok(None)`.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
        token: Option<&Credential>,
    ) -> Result<Option<T>, UpstreamFetchError> {
        let response = Self::authorize(self.client.get(url.clone()).query(query), token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpstreamFetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(UpstreamFetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| UpstreamFetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub async fn try_fetch_collection(
        &self,
        concept_id: &str,
        token: Option<&Credential>,
    ) -> Result<Option<CollectionRecord>, UpstreamFetchError> {
        let url = self.config.endpoint(&["search", "collections.umm_json"]);
        let response: Option<UmmSearchResponse> = self
            .get_json(url, &[("concept_id", concept_id)], token)
            .await?;
        Ok(response.and_then(|r| r.items.into_iter().next()))
    }

    /// The collection with `concept_id`, or `None` if it is absent or unreadable.
    pub async fn fetch_collection(
        &self,
        concept_id: &str,
        token: Option<&Credential>,
    ) -> Option<CollectionRecord> {
        match self.try_fetch_collection(concept_id, token).await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(concept_id, %error, "could not fetch collection");
                None
            }
        }
    }

    // ========================================================================
    // Access control
    // ========================================================================

    pub async fn try_fetch_acl(
        &self,
        concept_id: &str,
        token: Option<&Credential>,
    ) -> Result<Option<AclRecord>, UpstreamFetchError> {
        let url = self.config.endpoint(&["access-control", "acls", concept_id]);
        self.get_json(url, &[], token).await
    }

    pub async fn fetch_acl(&self, concept_id: &str, token: Option<&Credential>) -> Option<AclRecord> {
        match self.try_fetch_acl(concept_id, token).await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(concept_id, %error, "could not fetch acl");
                None
            }
        }
    }

    /// One page (1-based) of catalog item acl concept ids. The acl listing
    /// pages by number and keeps no server-side cursor.
    pub async fn fetch_acl_page(
        &self,
        page_num: u32,
        token: Option<&Credential>,
    ) -> Result<AclPage, UpstreamFetchError> {
        let url = self.config.endpoint(&["access-control", "acls"]);
        let page_size = self.config.page_size.to_string();
        let page_num = page_num.to_string();
        let query = [
            ("identity_type", "catalog_item"),
            ("page_size", page_size.as_str()),
            ("page_num", page_num.as_str()),
        ];
        let response: Option<AclSearchResponse> = self.get_json(url, &query, token).await?;
        let response = response.unwrap_or_default();
        Ok(AclPage {
            concept_ids: response.items.into_iter().map(|i| i.concept_id).collect(),
            hits: response.hits,
        })
    }

    // ========================================================================
    // Scrolled search
    // ========================================================================

    /// One page of collection concept ids, continuing `scroll_id` when given.
    pub async fn fetch_collection_page(
        &self,
        scroll_id: Option<&str>,
        token: Option<&Credential>,
        provider: Option<&str>,
    ) -> Result<CollectionPage, UpstreamFetchError> {
        let mut url = self.config.endpoint(&["search", "collections.json"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("page_size", &self.config.page_size.to_string())
                .append_pair("scroll", "true");
            if let Some(provider) = provider {
                query.append_pair("provider", provider);
            }
        }
        let url = url.to_string();

        let mut request = Self::authorize(self.client.get(&url), token);
        if let Some(scroll_id) = scroll_id {
            request = request.header("CMR-Scroll-Id", scroll_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamFetchError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(UpstreamFetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let next_scroll = response
            .headers()
            .get("cmr-scroll-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: JsonFeed = response
            .json()
            .await
            .map_err(|e| UpstreamFetchError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;

        Ok(CollectionPage {
            concept_ids: body.feed.entry.into_iter().map(|e| e.id).collect(),
            scroll_id: next_scroll,
        })
    }
}
