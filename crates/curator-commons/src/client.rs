//! MediaWiki API client bound to one user's OAuth credentials.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use curator_core::models::{ErrorLink, Label};
use curator_core::sdc::Statement;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::hash_lock::HashLockRegistry;
use crate::oauth::OAuth1;
use crate::{UploadReceipt, WikiClient, WikiError};

const CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Factory producing per-job clients that share one HTTP pool and one
/// hash-lock registry.
pub struct MediaWikiClientFactory {
    client: reqwest::Client,
    api_url: String,
    consumer_key: String,
    consumer_secret: String,
    locks: Arc<HashLockRegistry>,
}

impl MediaWikiClientFactory {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        locks: Arc<HashLockRegistry>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            locks,
        }
    }
}

impl crate::WikiClientFactory for MediaWikiClientFactory {
    fn create(
        &self,
        token: &curator_core::AccessToken,
        username: &str,
    ) -> Arc<dyn WikiClient> {
        Arc::new(MediaWikiClient::new(
            self.client.clone(),
            self.api_url.clone(),
            OAuth1::new(
                self.consumer_key.clone(),
                self.consumer_secret.clone(),
                token.key.clone(),
                token.secret.clone(),
            ),
            Arc::clone(&self.locks),
            username,
        ))
    }
}

pub struct MediaWikiClient {
    client: reqwest::Client,
    api_url: String,
    locks: Arc<HashLockRegistry>,
    oauth: OAuth1,
    username: String,
}

impl MediaWikiClient {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        oauth: OAuth1,
        locks: Arc<HashLockRegistry>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            locks,
            oauth,
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, WikiError> {
        let header = self.oauth.authorization_header("GET", &self.api_url, params);
        let response = self
            .client
            .get(&self.api_url)
            .header(AUTHORIZATION, header)
            .query(params)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<Value, WikiError> {
        let header = self.oauth.authorization_header("POST", &self.api_url, params);
        let response = self
            .client
            .post(&self.api_url)
            .header(AUTHORIZATION, header)
            .form(params)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Multipart bodies are excluded from the OAuth signature.
    async fn post_multipart(&self, form: Form) -> Result<Value, WikiError> {
        let header = self.oauth.authorization_header("POST", &self.api_url, &[]);
        let response = self
            .client
            .post(&self.api_url)
            .header(AUTHORIZATION, header)
            .multipart(form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn parse_response(response: reqwest::Response) -> Result<Value, WikiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(WikiError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let value: Value = response.json().await?;
        if let Some(error) = value.get("error") {
            let code = error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let info = error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(match code.as_str() {
                "mwoauth-invalid-authorization" | "permissiondenied" | "assertuserfailed" => {
                    WikiError::Unauthorized(info)
                }
                _ => WikiError::Api { code, info },
            });
        }
        Ok(value)
    }

    async fn csrf_token(&self) -> Result<String, WikiError> {
        let value = self
            .get_json(&[
                ("action", "query"),
                ("meta", "tokens"),
                ("type", "csrf"),
                ("format", "json"),
            ])
            .await?;
        value
            .pointer("/query/tokens/csrftoken")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WikiError::Other(anyhow::anyhow!("No CSRF token in response")))
    }

    /// Null edit so the wiki re-renders the page with the fresh MediaInfo.
    async fn null_edit(&self, file_title: &str, token: &str) -> Result<(), WikiError> {
        self.post_form(&[
            ("action", "edit"),
            ("format", "json"),
            ("title", file_title),
            ("appendtext", ""),
            ("token", token),
        ])
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WikiClient for MediaWikiClient {
    #[tracing::instrument(skip(self))]
    async fn check_title_blacklisted(&self, title: &str) -> Result<Option<String>, WikiError> {
        let file_title = format!("File:{}", title);
        let value = self
            .get_json(&[
                ("action", "titleblacklist"),
                ("tbaction", "create"),
                ("tbtitle", &file_title),
                ("format", "json"),
            ])
            .await?;

        let result = value
            .pointer("/titleblacklist/result")
            .and_then(Value::as_str);
        if result == Some("blacklisted") {
            let reason = value
                .pointer("/titleblacklist/reason")
                .and_then(Value::as_str)
                .unwrap_or("Title is blacklisted")
                .to_string();
            return Ok(Some(reason));
        }
        Ok(None)
    }

    #[tracing::instrument(skip(self))]
    async fn find_duplicates(&self, content_sha1: &str) -> Result<Vec<ErrorLink>, WikiError> {
        let value = self
            .get_json(&[
                ("action", "query"),
                ("list", "allimages"),
                ("aisha1", content_sha1),
                ("aiprop", "url"),
                ("format", "json"),
            ])
            .await?;

        let images = value
            .pointer("/query/allimages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(images
            .iter()
            .filter_map(|image| {
                let title = image.get("title")?.as_str()?.to_string();
                // descriptionurl is the file page; url would be the raw media.
                let url = image.get("descriptionurl")?.as_str()?.to_string();
                Some(ErrorLink { title, url })
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_sdc(&self, title: &str) -> Result<Option<Vec<Statement>>, WikiError> {
        let file_title = format!("File:{}", title);
        let value = self
            .get_json(&[
                ("action", "wbgetentities"),
                ("sites", "commonswiki"),
                ("titles", &file_title),
                ("format", "json"),
            ])
            .await?;

        let Some(entities) = value.get("entities").and_then(Value::as_object) else {
            return Ok(None);
        };
        let Some(entity) = entities.values().next() else {
            return Ok(None);
        };
        if entity.get("missing").is_some() {
            return Ok(None);
        }

        // MediaInfo statements arrive keyed by property; an empty claim set
        // is serialized as an empty array.
        let mut statements = Vec::new();
        if let Some(by_property) = entity.get("statements").and_then(Value::as_object) {
            for claims in by_property.values() {
                let Some(claims) = claims.as_array() else {
                    continue;
                };
                for claim in claims {
                    let statement: Statement = serde_json::from_value(claim.clone())
                        .map_err(|e| anyhow::anyhow!("Unparseable statement: {}", e))?;
                    statements.push(statement);
                }
            }
        }
        Ok(Some(statements))
    }

    #[tracing::instrument(skip(self, local_path, wikitext))]
    async fn upload_chunked(
        &self,
        local_path: &Path,
        content_sha1: &str,
        target_title: &str,
        wikitext: &str,
        edit_summary: &str,
        edit_group: &str,
    ) -> Result<UploadReceipt, WikiError> {
        let _guard = self
            .locks
            .try_acquire(content_sha1)
            .ok_or_else(|| WikiError::HashLock {
                sha1: content_sha1.to_string(),
            })?;

        let token = self.csrf_token().await?;
        let data = tokio::fs::read(local_path).await?;
        let filesize = data.len();

        let mut filekey: Option<String> = None;
        let mut offset = 0usize;
        while offset < filesize {
            let end = (offset + CHUNK_SIZE).min(filesize);
            let part = Part::bytes(data[offset..end].to_vec())
                .file_name(target_title.to_string())
                .mime_str("application/octet-stream")?;

            let mut form = Form::new()
                .text("action", "upload")
                .text("format", "json")
                .text("stash", "1")
                .text("filename", target_title.to_string())
                .text("filesize", filesize.to_string())
                .text("offset", offset.to_string())
                .text("token", token.clone())
                .part("chunk", part);
            if let Some(key) = &filekey {
                form = form.text("filekey", key.clone());
            }

            let value = self.post_multipart(form).await?;
            filekey = value
                .pointer("/upload/filekey")
                .and_then(Value::as_str)
                .map(str::to_string);
            if filekey.is_none() {
                return Err(WikiError::Other(anyhow::anyhow!(
                    "Chunk upload returned no filekey at offset {}",
                    offset
                )));
            }
            offset = end;

            tracing::debug!(
                title = %target_title,
                offset = offset,
                filesize = filesize,
                "Chunk stashed"
            );
        }

        let filekey = filekey
            .ok_or_else(|| WikiError::Other(anyhow::anyhow!("Empty file cannot be uploaded")))?;
        let comment = format!(
            "{} ([[:toollabs:editgroups-commons/b/curator/{}|details]])",
            edit_summary, edit_group
        );

        let value = self
            .post_form(&[
                ("action", "upload"),
                ("format", "json"),
                ("filename", target_title),
                ("filekey", &filekey),
                ("comment", &comment),
                ("text", wikitext),
                ("token", &token),
            ])
            .await?;

        let result = value.pointer("/upload/result").and_then(Value::as_str);
        if result != Some("Success") {
            return Err(WikiError::Other(anyhow::anyhow!(
                "Upload did not succeed: {:?}",
                value.get("upload")
            )));
        }

        let title = value
            .pointer("/upload/imageinfo/canonicaltitle")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("File:{}", target_title));
        let url = value
            .pointer("/upload/imageinfo/descriptionurl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WikiError::Other(anyhow::anyhow!("Upload response missing page URL")))?;

        tracing::info!(title = %title, "Upload finished");
        Ok(UploadReceipt { title, url })
    }

    #[tracing::instrument(skip(self, statements, labels))]
    async fn apply_sdc(
        &self,
        title: &str,
        statements: &[Statement],
        labels: Option<&BTreeMap<String, Label>>,
        edit_summary: &str,
    ) -> Result<(), WikiError> {
        let file_title = format!("File:{}", title);
        let token = self.csrf_token().await?;

        let mut data = serde_json::json!({ "claims": statements });
        if let Some(labels) = labels {
            data["labels"] = serde_json::to_value(labels)
                .map_err(|e| anyhow::anyhow!("Unserializable labels: {}", e))?;
        }
        let data = serde_json::to_string(&data)
            .map_err(|e| anyhow::anyhow!("Unserializable claim data: {}", e))?;

        self.post_form(&[
            ("action", "wbeditentity"),
            ("format", "json"),
            ("site", "commonswiki"),
            ("title", &file_title),
            ("data", &data),
            ("summary", edit_summary),
            ("token", &token),
        ])
        .await?;

        self.null_edit(&file_title, &token).await
    }
}
