//! Hugging Face Hub dataset sink.
//!
//! Each shard becomes one commit on the `main` branch of the dataset
//! repository, stored under `data/<name>`. The repository is created on the
//! first publish; an existing repository is fine.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{OutputConfig, UploadConfig};
use crate::storage::{ShardHandle, ShardReceipt, ShardSink};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    commit_url: Option<String>,
}

/// Sink that pushes shards to a Hub dataset repository.
pub struct HubSink {
    client: Client,
    hub_url: String,
    repo: String,
    token: String,
    private: bool,
    keep_local: bool,
    repo_ready: AtomicBool,
}

impl HubSink {
    pub fn new(client: Client, upload: &UploadConfig, output: &OutputConfig) -> Result<Self> {
        let token = upload
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::config("HF_TOKEN is required for the hub sink"))?;
        if upload.dataset_repo.trim().is_empty() {
            return Err(AppError::config("upload.dataset_repo is required for the hub sink"));
        }

        Ok(Self {
            client,
            hub_url: upload.hub_url.trim_end_matches('/').to_string(),
            repo: upload.dataset_repo.trim().to_string(),
            token,
            private: upload.private,
            keep_local: output.keep_local,
            repo_ready: AtomicBool::new(false),
        })
    }

    /// Create the dataset repository unless it already exists.
    async fn ensure_repo(&self, shard: &str) -> Result<()> {
        if self.repo_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let (organization, name) = match self.repo.split_once('/') {
            Some((org, name)) => (Some(org), name),
            None => (None, self.repo.as_str()),
        };
        let body = json!({
            "type": "dataset",
            "name": name,
            "organization": organization,
            "private": self.private,
        });

        let response = self
            .client
            .post(format!("{}/api/repos/create", self.hub_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::upload(shard, e))?;

        let status = response.status();
        if status.is_success() {
            log::info!("Created dataset repository {}", self.repo);
        } else if status == StatusCode::CONFLICT {
            log::debug!("Dataset repository {} already exists", self.repo);
        } else {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::upload(
                shard,
                format!("creating {} failed with HTTP {}: {}", self.repo, status, text),
            ));
        }

        self.repo_ready.store(true, Ordering::Release);
        Ok(())
    }

    fn commit_body(&self, shard: &ShardHandle, bytes: &[u8]) -> Result<String> {
        let header = json!({
            "key": "header",
            "value": {
                "summary": format!("Add {} ({} records)", shard.name, shard.record_count),
                "description": format!("sha256: {}", shard.sha256),
            }
        });
        let file = json!({
            "key": "file",
            "value": {
                "path": format!("data/{}", shard.name),
                "encoding": "base64",
                "content": STANDARD.encode(bytes),
            }
        });
        Ok(format!(
            "{}\n{}\n",
            serde_json::to_string(&header)?,
            serde_json::to_string(&file)?
        ))
    }
}

#[async_trait]
impl ShardSink for HubSink {
    async fn publish(&self, shard: &ShardHandle) -> Result<ShardReceipt> {
        self.ensure_repo(&shard.name).await?;

        let bytes = tokio::fs::read(&shard.path)
            .await
            .map_err(|e| AppError::upload(&shard.name, e))?;
        let body = self.commit_body(shard, &bytes)?;

        let response = self
            .client
            .post(format!(
                "{}/api/datasets/{}/commit/main",
                self.hub_url, self.repo
            ))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::upload(&shard.name, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::upload(
                &shard.name,
                format!("commit failed with HTTP {}: {}", status, text),
            ));
        }

        let commit: CommitResponse = response
            .json()
            .await
            .unwrap_or(CommitResponse { commit_url: None });
        let location = commit.commit_url.unwrap_or_else(|| {
            format!(
                "{}/datasets/{}/blob/main/data/{}",
                self.hub_url, self.repo, shard.name
            )
        });

        log::info!(
            "Uploaded {} ({} records) to {}",
            shard.name,
            shard.record_count,
            self.repo
        );

        if !self.keep_local {
            if let Err(e) = tokio::fs::remove_file(&shard.path).await {
                log::warn!("Could not remove local shard {}: {}", shard.path.display(), e);
            }
        }

        Ok(ShardReceipt {
            name: shard.name.clone(),
            location,
            record_count: shard.record_count,
        })
    }
}
