//! Volume Provisioner
//!
//! Ensures a named Gluster volume exists and is running.
//!
//! ```text
//! Absent ──fan-out──create──▶ Stopped ──start──▶ Running
//! ```
//!
//! A fresh volume is only created after every cluster member has confirmed
//! its brick directory exists. If any member fails or times out the call
//! aborts before `volume create` is issued.

use crate::config::GlusterConfig;
use crate::domain::ports::{ClusterMember, DirectoryReport, JobDispatcherRef, JobHandle, Volume};
use crate::error::{Error, Result};
use crate::volume::gluster::GlusterCli;
use crate::volume::layout::{create_args, validate_volume_name};
use crate::volume::worker::{CreateDirectories, CREATE_DIRECTORIES_JOB};
use futures::future::try_join_all;
use std::time::Duration;
use tracing::{debug, info};

/// Default per-member bound on the directory fan-out
pub const DEFAULT_FANOUT_TIMEOUT: Duration = Duration::from_secs(60);

/// Orchestrates creation of distributed volumes
pub struct VolumeProvisioner {
    config: GlusterConfig,
    gluster: GlusterCli,
    dispatcher: JobDispatcherRef,
    fanout_timeout: Duration,
}

impl VolumeProvisioner {
    pub fn new(config: GlusterConfig, gluster: GlusterCli, dispatcher: JobDispatcherRef) -> Self {
        Self {
            config,
            gluster,
            dispatcher,
            fanout_timeout: DEFAULT_FANOUT_TIMEOUT,
        }
    }

    /// Override the per-member fan-out timeout
    pub fn with_fanout_timeout(mut self, timeout: Duration) -> Self {
        self.fanout_timeout = timeout;
        self
    }

    /// Ensure `name` exists and is running, returning its descriptor
    pub async fn ensure_volume(&self, name: &str) -> Result<Volume> {
        validate_volume_name(name)?;

        match self.gluster.volume(name).await? {
            Some(volume) if volume.running => {
                info!("Volume exists {}", name);
                Ok(volume)
            }
            Some(_) => {
                self.gluster.start_volume(name).await?;
                let volume = self.observe(name).await?;
                info!("Volume started {:?}", volume);
                Ok(volume)
            }
            None => {
                self.create_volume(name).await?;
                let volume = self.observe(name).await?;
                info!("Volume created {:?}", volume);
                Ok(volume)
            }
        }
    }

    /// Fan out, then create and start
    async fn create_volume(&self, name: &str) -> Result<()> {
        let args = create_args(&self.config, name);

        self.prepare_bricks(name).await?;

        self.gluster.create_volume(&args).await?;
        self.gluster.start_volume(name).await
    }

    /// Directory fan-out barrier
    async fn prepare_bricks(&self, name: &str) -> Result<()> {
        let members = self.dispatcher.members().await?;
        if members.is_empty() {
            return Err(Error::Dispatch("no cluster members available".into()));
        }

        let payload = serde_json::to_value(CreateDirectories {
            name: name.to_string(),
        })?;
        let handle = self
            .dispatcher
            .dispatch(CREATE_DIRECTORIES_JOB, payload, &members)
            .await?;

        debug!(
            "Dispatched {} for {} to {} members",
            CREATE_DIRECTORIES_JOB,
            name,
            members.len()
        );

        try_join_all(members.iter().map(|member| self.await_member(&handle, member))).await?;

        Ok(())
    }

    async fn await_member(&self, handle: &JobHandle, member: &ClusterMember) -> Result<()> {
        let result = self
            .dispatcher
            .await_result(handle, member, self.fanout_timeout)
            .await?;

        let report: DirectoryReport =
            serde_json::from_value(result).map_err(|e| Error::FanoutFailed {
                member: member.to_string(),
                reason: format!("unreadable result: {}", e),
            })?;

        match report.error {
            None => Ok(()),
            Some(reason) => Err(Error::FanoutFailed {
                member: member.to_string(),
                reason,
            }),
        }
    }

    /// Re-read the full listing after a state change
    async fn observe(&self, name: &str) -> Result<Volume> {
        let mut volumes = self.gluster.volumes().await?;
        volumes.shift_remove(name).ok_or_else(|| {
            Error::BackendState(format!("volume {} missing from listing after provisioning", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGluster, MemberBehaviour, RecordingDispatcher};
    use assert_matches::assert_matches;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn provisioner(
        gluster: &Arc<FakeGluster>,
        dispatcher: &Arc<RecordingDispatcher>,
    ) -> VolumeProvisioner {
        let config = GlusterConfig {
            nodes: vec!["test".into()],
            mounts: vec![PathBuf::from("/data1"), PathBuf::from("/data2")],
            ..Default::default()
        };
        VolumeProvisioner::new(
            config,
            GlusterCli::new("/usr/sbin/gluster", gluster.clone()),
            dispatcher.clone(),
        )
    }

    #[tokio::test]
    async fn test_fresh_volume() {
        let gluster = Arc::new(FakeGluster::new());
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1", "m2"]));

        let volume = provisioner(&gluster, &dispatcher)
            .ensure_volume("testvol")
            .await
            .unwrap();

        assert!(volume.running);
        assert_eq!(
            volume.bricks,
            vec!["test:/data1/xylem-testvol", "test:/data2/xylem-testvol"]
        );

        let dispatches = dispatcher.dispatches();
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].job, CREATE_DIRECTORIES_JOB);
        assert_eq!(dispatches[0].payload, serde_json::json!({ "name": "testvol" }));
        assert_eq!(
            dispatches[0].targets,
            vec![ClusterMember::from("m1"), ClusterMember::from("m2")]
        );
        assert_eq!(dispatcher.awaited().len(), 2);

        let verbs = gluster.verbs();
        let create = verbs.iter().position(|v| v == "volume create").unwrap();
        let start = verbs.iter().position(|v| v == "volume start").unwrap();
        assert!(create < start);
    }

    #[tokio::test]
    async fn test_second_call_is_noop() {
        let gluster = Arc::new(FakeGluster::new());
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1"]));
        let provisioner = provisioner(&gluster, &dispatcher);

        let first = provisioner.ensure_volume("testvol").await.unwrap();
        let creates = gluster.count("volume create");

        let second = provisioner.ensure_volume("testvol").await.unwrap();

        assert!(first.running && second.running);
        assert_eq!(first, second);
        assert_eq!(gluster.count("volume create"), creates);
        assert_eq!(dispatcher.dispatches().len(), 1);
    }

    #[tokio::test]
    async fn test_stopped_volume_is_started() {
        let gluster = Arc::new(FakeGluster::new());
        gluster.add_volume("testvol", false, &["test:/data1/xylem-testvol"]);
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1"]));

        let volume = provisioner(&gluster, &dispatcher)
            .ensure_volume("testvol")
            .await
            .unwrap();

        assert!(volume.running);
        assert_eq!(gluster.count("volume start"), 1);
        assert_eq!(gluster.count("volume create"), 0);
        assert!(dispatcher.dispatches().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creator_wins() {
        let gluster = Arc::new(FakeGluster::new());
        gluster.concurrent_create("testvol", &["test:/data1/xylem-testvol"]);
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1"]));

        let volume = provisioner(&gluster, &dispatcher)
            .ensure_volume("testvol")
            .await
            .unwrap();

        assert!(volume.running);
        assert_eq!(volume.bricks, vec!["test:/data1/xylem-testvol"]);
        assert_eq!(gluster.count("volume create"), 1);
        assert_eq!(gluster.count("volume start"), 1);
    }

    #[tokio::test]
    async fn test_member_timeout_blocks_create() {
        let gluster = Arc::new(FakeGluster::new());
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1", "m2"]));
        dispatcher.set_behaviour("m2", MemberBehaviour::Timeout);

        let result = provisioner(&gluster, &dispatcher).ensure_volume("testvol").await;

        assert_matches!(result, Err(Error::FanoutTimeout { member, .. }) if member == "m2");
        assert_eq!(gluster.count("volume create"), 0);
        assert_eq!(gluster.count("volume start"), 0);
    }

    #[tokio::test]
    async fn test_member_error_blocks_create() {
        let gluster = Arc::new(FakeGluster::new());
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1", "m2"]));
        dispatcher.set_behaviour("m1", MemberBehaviour::Report("Permission denied".into()));

        let result = provisioner(&gluster, &dispatcher).ensure_volume("testvol").await;

        assert_matches!(
            result,
            Err(Error::FanoutFailed { member, reason })
                if member == "m1" && reason == "Permission denied"
        );
        assert_eq!(gluster.count("volume create"), 0);
    }

    #[tokio::test]
    async fn test_no_members() {
        let gluster = Arc::new(FakeGluster::new());
        let dispatcher = Arc::new(RecordingDispatcher::new(&[]));

        let result = provisioner(&gluster, &dispatcher).ensure_volume("testvol").await;

        assert_matches!(result, Err(Error::Dispatch(_)));
        assert_eq!(gluster.count("volume create"), 0);
    }

    #[tokio::test]
    async fn test_invalid_name_has_no_side_effects() {
        let gluster = Arc::new(FakeGluster::new());
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1"]));

        let result = provisioner(&gluster, &dispatcher).ensure_volume("../etc").await;

        assert_matches!(result, Err(Error::Validation(_)));
        assert!(gluster.verbs().is_empty());
        assert!(dispatcher.dispatches().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let gluster = Arc::new(FakeGluster::new());
        gluster.fail_next("Connection failed. Please check if gluster daemon is operational.");
        let dispatcher = Arc::new(RecordingDispatcher::new(&["m1"]));

        let result = provisioner(&gluster, &dispatcher).ensure_volume("testvol").await;

        assert_matches!(result, Err(Error::BackendCommand { .. }));
        assert!(dispatcher.dispatches().is_empty());
    }
}
