//! Job Dispatchers
//!
//! Two implementations of the job-dispatch transport:
//! - [`LocalDispatcher`] runs the [`JobHandler`] in this process. It serves a
//!   single-node cluster.
//! - [`HttpDispatcher`] posts each job to the peer's own
//!   `/v1/commands/{job}` endpoint. Members are peer base URLs.
//!
//! Each dispatched target gets its own task with a result slot keyed by
//! `(job id, member)`. Waiting on a slot is bounded by the caller's timeout;
//! a slot is consumed by the first wait.

use crate::domain::ports::{ClusterMember, JobDispatcher, JobHandle, JobHandlerRef};
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type SlotKey = (String, ClusterMember);

fn fanout_timeout(handle: &JobHandle, member: &ClusterMember, timeout: Duration) -> Error {
    warn!("{} on {} timed out after {:?}", handle.id, member, timeout);
    Error::FanoutTimeout {
        member: member.to_string(),
        timeout_secs: timeout.as_secs(),
    }
}

fn no_pending(handle: &JobHandle, member: &ClusterMember) -> Error {
    Error::Dispatch(format!("no result pending for {} on {}", handle.id, member))
}

// =============================================================================
// Local Dispatcher
// =============================================================================

/// Dispatcher that runs every member's job in this process
pub struct LocalDispatcher {
    members: Vec<ClusterMember>,
    handler: JobHandlerRef,
    pending: DashMap<SlotKey, oneshot::Receiver<Value>>,
    next_id: AtomicU64,
}

impl LocalDispatcher {
    pub fn new(
        members: impl IntoIterator<Item = impl Into<ClusterMember>>,
        handler: JobHandlerRef,
    ) -> Self {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            handler,
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Result slots not yet awaited
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl JobDispatcher for LocalDispatcher {
    async fn members(&self) -> Result<Vec<ClusterMember>> {
        Ok(self.members.clone())
    }

    async fn dispatch(
        &self,
        job: &str,
        payload: Value,
        targets: &[ClusterMember],
    ) -> Result<JobHandle> {
        if let Some(unknown) = targets.iter().find(|t| !self.members.contains(t)) {
            return Err(Error::Dispatch(format!("unknown cluster member: {}", unknown)));
        }

        let id = format!("{}-{}", job, self.next_id.fetch_add(1, Ordering::Relaxed));

        for member in targets {
            let (tx, rx) = oneshot::channel();
            let handler = self.handler.clone();
            let job = job.to_string();
            let payload = payload.clone();

            tokio::spawn(async move {
                let result = handler.handle_job(&job, payload).await;
                let _ = tx.send(result);
            });

            self.pending.insert((id.clone(), member.clone()), rx);
        }

        debug!("Dispatched {} to {} members", id, targets.len());

        Ok(JobHandle {
            id,
            job: job.to_string(),
        })
    }

    async fn await_result(
        &self,
        handle: &JobHandle,
        member: &ClusterMember,
        timeout: Duration,
    ) -> Result<Value> {
        let (_, rx) = self
            .pending
            .remove(&(handle.id.clone(), member.clone()))
            .ok_or_else(|| no_pending(handle, member))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::Dispatch(format!(
                "{} on {} ended without a result",
                handle.id, member
            ))),
            Err(_) => Err(fanout_timeout(handle, member, timeout)),
        }
    }
}

// =============================================================================
// HTTP Dispatcher
// =============================================================================

/// Dispatcher that runs each member's job on that member over its REST API
pub struct HttpDispatcher {
    members: Vec<ClusterMember>,
    client: reqwest::Client,
    pending: DashMap<SlotKey, JoinHandle<Result<Value>>>,
    next_id: AtomicU64,
}

impl HttpDispatcher {
    /// `members` are peer base URLs such as `http://gfs1:8090`
    pub fn new(members: impl IntoIterator<Item = impl Into<ClusterMember>>) -> Result<Self> {
        Ok(Self {
            members: members.into_iter().map(Into::into).collect(),
            client: reqwest::Client::builder().build()?,
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Result slots not yet awaited
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn job_url(member: &ClusterMember, job: &str) -> String {
        format!("{}/v1/commands/{}", member.as_str().trim_end_matches('/'), job)
    }
}

async fn post_job(
    client: reqwest::Client,
    member: ClusterMember,
    url: String,
    payload: Value,
) -> Result<Value> {
    let failed = |reason: String| Error::FanoutFailed {
        member: member.to_string(),
        reason,
    };

    let response = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| failed(format!("POST {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(failed(format!("POST {} returned {}: {}", url, status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| failed(format!("unreadable reply from {}: {}", url, e)))
}

#[async_trait]
impl JobDispatcher for HttpDispatcher {
    async fn members(&self) -> Result<Vec<ClusterMember>> {
        Ok(self.members.clone())
    }

    async fn dispatch(
        &self,
        job: &str,
        payload: Value,
        targets: &[ClusterMember],
    ) -> Result<JobHandle> {
        if let Some(unknown) = targets.iter().find(|t| !self.members.contains(t)) {
            return Err(Error::Dispatch(format!("unknown cluster member: {}", unknown)));
        }

        let id = format!("{}-{}", job, self.next_id.fetch_add(1, Ordering::Relaxed));

        for member in targets {
            let url = Self::job_url(member, job);
            let task = tokio::spawn(post_job(
                self.client.clone(),
                member.clone(),
                url,
                payload.clone(),
            ));
            self.pending.insert((id.clone(), member.clone()), task);
        }

        debug!("Dispatched {} to {} peers", id, targets.len());

        Ok(JobHandle {
            id,
            job: job.to_string(),
        })
    }

    async fn await_result(
        &self,
        handle: &JobHandle,
        member: &ClusterMember,
        timeout: Duration,
    ) -> Result<Value> {
        let (_, mut task) = self
            .pending
            .remove(&(handle.id.clone(), member.clone()))
            .ok_or_else(|| no_pending(handle, member))?;

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::Dispatch(format!(
                "{} on {} ended without a result: {}",
                handle.id, member, e
            ))),
            Err(_) => {
                task.abort();
                Err(fanout_timeout(handle, member, timeout))
            }
        }
    }
}
