//! Commons SDC search: which file pages already reference a provider photo id.

use std::collections::HashMap;

use curator_core::models::ExistingPage;
use serde::Deserialize;

use crate::HandlerError;

const FILE_NAMESPACE: u32 = 6;

#[derive(Clone)]
pub struct CommonsSearch {
    client: reqwest::Client,
    api_url: String,
    site_base: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

impl CommonsSearch {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        let site_base = api_url
            .strip_suffix("/w/api.php")
            .unwrap_or("https://commons.wikimedia.org")
            .to_string();
        Self {
            client,
            api_url,
            site_base,
        }
    }

    /// Search `haswbstatement:{property}={image_id}` in the File namespace
    /// for each id. Ids with no hits map to an empty list.
    pub async fn pages_with_photo_id(
        &self,
        property: &str,
        image_ids: &[String],
    ) -> Result<HashMap<String, Vec<ExistingPage>>, HandlerError> {
        let mut pages = HashMap::with_capacity(image_ids.len());

        for image_id in image_ids {
            let response = self
                .client
                .get(&self.api_url)
                .query(&[
                    ("action", "query"),
                    ("list", "search"),
                    (
                        "srsearch",
                        &format!("haswbstatement:{}={}", property, image_id),
                    ),
                    ("srnamespace", &FILE_NAMESPACE.to_string()),
                    ("format", "json"),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(HandlerError::Upstream {
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            let body: SearchResponse = response.json().await?;
            let hits = body.query.map(|q| q.search).unwrap_or_default();
            let links = hits
                .into_iter()
                .map(|hit| ExistingPage {
                    url: self.page_url(&hit.title),
                    title: hit.title,
                })
                .collect();
            pages.insert(image_id.clone(), links);
        }

        Ok(pages)
    }

    /// Canonical page URL (`…/wiki/File:Title_with_underscores`).
    pub fn page_url(&self, title: &str) -> String {
        format!("{}/wiki/{}", self.site_base, title.replace(' ', "_"))
    }
}
