//! Marathon Group Sync
//!
//! Periodically pushes application group definitions to Marathon with
//! `PUT /v2/groups`. Every configured file is sent on every run; a file that
//! cannot be read or is rejected is logged and does not hold up the rest.

use crate::config::MarathonConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const GROUPS_PATH: &str = "/v2/groups";

/// Outcome of one pass over the group files
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub finished_at: DateTime<Utc>,
    /// Files Marathon accepted, with the response status
    pub pushed: Vec<(PathBuf, u16)>,
    /// Files that could not be pushed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Pushes group definitions to Marathon
pub struct MarathonSync {
    config: MarathonConfig,
    client: reqwest::Client,
    last_report: RwLock<Option<SyncReport>>,
}

impl MarathonSync {
    pub fn new(config: MarathonConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            config,
            client,
            last_report: RwLock::new(None),
        })
    }

    /// Files currently matched by the configured patterns
    pub fn group_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for pattern in &self.config.group_json_files {
            let paths = match glob::glob(pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!("Invalid group file pattern {}: {}", pattern, e);
                    continue;
                }
            };

            let before = files.len();
            for entry in paths {
                match entry {
                    Ok(path) => files.push(path),
                    Err(e) => warn!("Cannot read {}: {}", e.path().display(), e),
                }
            }
            if files.len() == before {
                warn!("Group file pattern {} matched nothing", pattern);
            }
        }

        files
    }

    /// Push one group definition, returning Marathon's status code
    pub async fn update_group(&self, path: &Path) -> Result<u16> {
        info!("Updating {}", path.display());

        let body = tokio::fs::read(path).await?;
        let url = format!("{}{}", self.config.base_url(), GROUPS_PATH);

        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!("API response for {}: {} {}", path.display(), status, text);

        if !status.is_success() {
            return Err(Error::backend(
                format!("PUT {}", GROUPS_PATH),
                format!("{}: {}", status, text),
            ));
        }

        Ok(status.as_u16())
    }

    /// Push every group file concurrently
    pub async fn update_groups(&self) -> SyncReport {
        let files = self.group_files();
        let results = join_all(files.iter().map(|path| self.update_group(path))).await;

        let mut report = SyncReport {
            finished_at: Utc::now(),
            pushed: Vec::new(),
            failed: Vec::new(),
        };
        for (path, result) in files.into_iter().zip(results) {
            match result {
                Ok(status) => report.pushed.push((path, status)),
                Err(e) => {
                    error!("Failed to update {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        *self.last_report.write() = Some(report.clone());
        report
    }

    /// Outcome of the most recent pass
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().clone()
    }

    /// Push on a fixed interval until cancelled; the first push is immediate
    pub async fn run(&self, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Marathon sync every {}s to {}",
            self.config.interval_secs,
            self.config.base_url()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Marathon sync stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.update_groups().await;
                    debug!(
                        "Marathon sync pushed {} files, {} failed",
                        report.pushed.len(),
                        report.failed.len()
                    );
                }
            }
        }
    }
}
