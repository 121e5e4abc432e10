//! Bulk harvesting: scrolled collection search (releasing the server-side
//! cursor afterwards) and the numbered acl listing.
//!
//! Releasing a scroll only frees upstream resources. It never fails the
//! caller; problems are logged and reported as `None`.

use crate::catalog::{CatalogClient, UpstreamFetchError};
use crate::token::Credential;
use serde_json::json;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScrollReleaseError {
    #[error("clear-scroll request failed: {0}")]
    Transport(String),
}

impl CatalogClient {
    /// Release `scroll_id`. Returns the upstream status code, or `None` when
    /// there was nothing to release or the call failed.
    pub async fn clear_scroll_session(&self, scroll_id: Option<&str>) -> Option<u16> {
        let scroll_id = match scroll_id {
            Some(id) if !id.is_empty() => id,
            _ => return None,
        };

        tracing::info!(scroll_id, "clearing scroll session");
        match self.try_clear_scroll_session(scroll_id).await {
            Ok(status) => {
                tracing::info!(scroll_id, status, "cleared scroll session");
                Some(status)
            }
            Err(error) => {
                tracing::warn!(scroll_id, %error, "could not clear scroll session");
                None
            }
        }
    }

    async fn try_clear_scroll_session(&self, scroll_id: &str) -> Result<u16, ScrollReleaseError> {
        let url = self.config.endpoint(&["search", "clear-scroll"]);
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&json!({ "scroll_id": scroll_id }))
            .send()
            .await
            .map_err(|e| ScrollReleaseError::Transport(e.to_string()))?;
        Ok(response.status().as_u16())
    }

    /// Page through every collection (optionally for one provider) and return
    /// the concept ids. The scroll session is released whether or not paging
    /// succeeded.
    pub async fn harvest_collection_ids(
        &self,
        token: Option<&Credential>,
        provider: Option<&str>,
    ) -> Result<Vec<String>, UpstreamFetchError> {
        let page_size = self.config.page_size as usize;
        let mut scroll_id: Option<String> = None;
        let mut concept_ids = Vec::new();
        let mut scroll_num = 0usize;

        let outcome = loop {
            tracing::info!(scroll_num, "fetching collections page");
            match self
                .fetch_collection_page(scroll_id.as_deref(), token, provider)
                .await
            {
                Ok(page) => {
                    let full = page.concept_ids.len() >= page_size;
                    if page.scroll_id.is_some() {
                        scroll_id = page.scroll_id;
                    }
                    concept_ids.extend(page.concept_ids);
                    if !full || scroll_id.is_none() {
                        break Ok(());
                    }
                    scroll_num += 1;
                }
                Err(error) => break Err(error),
            }
        };

        self.clear_scroll_session(scroll_id.as_deref()).await;
        outcome.map(|()| concept_ids)
    }

    /// Page through every catalog item acl and return the concept ids.
    /// Paging stops at the first short page or once `hits` ids are collected.
    pub async fn harvest_acl_ids(
        &self,
        token: Option<&Credential>,
    ) -> Result<Vec<String>, UpstreamFetchError> {
        let page_size = self.config.page_size as usize;
        let mut concept_ids = Vec::new();
        let mut page_num = 1u32;

        loop {
            tracing::info!(page_num, "fetching acls page");
            let page = self.fetch_acl_page(page_num, token).await?;
            let full = page.concept_ids.len() >= page_size;
            concept_ids.extend(page.concept_ids);

            let exhausted = page
                .hits
                .is_some_and(|hits| concept_ids.len() as u64 >= hits);
            if !full || exhausted {
                return Ok(concept_ids);
            }
            page_num += 1;
        }
    }
}
