//! In-memory fakes for the domain ports

use crate::config::{DatabaseServer, GlusterConfig, PostgresConfig};
use crate::controlplane::Orchestrator;
use crate::database::{DatabaseProvisioner, FixedSelector};
use crate::domain::ports::{
    CatalogConnector, CatalogSession, ClusterMember, DatabaseRecord, DatabaseRegistry,
    JobDispatcher, JobHandle, ProcessExecutor, ProcessOutput,
};
use crate::error::{Error, Result};
use crate::volume::{DirectoryWorker, GlusterCli, VolumeProvisioner};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Gluster CLI
// =============================================================================

struct FakeVolume {
    id: String,
    status: &'static str,
    bricks: Vec<String>,
}

#[derive(Default)]
struct GlusterState {
    volumes: IndexMap<String, FakeVolume>,
    calls: Vec<Vec<String>>,
    fail_next: Option<String>,
    /// Volume another caller creates and starts just before our create lands
    concurrent_create: Option<(String, Vec<String>)>,
    next_id: u32,
}

impl GlusterState {
    fn insert(&mut self, name: &str, status: &'static str, bricks: Vec<String>) {
        self.next_id += 1;
        self.volumes.insert(
            name.to_string(),
            FakeVolume {
                id: format!("00000000-0000-0000-0000-{:012}", self.next_id),
                status,
                bricks,
            },
        );
    }

    fn render(&self, names: &[&String]) -> String {
        let mut out = String::new();
        for name in names {
            let volume = &self.volumes[name.as_str()];
            let _ = writeln!(out);
            let _ = writeln!(out, "Volume Name: {}", name);
            let _ = writeln!(out, "Type: Distribute");
            let _ = writeln!(out, "Volume ID: {}", volume.id);
            let _ = writeln!(out, "Status: {}", volume.status);
            let _ = writeln!(out, "Number of Bricks: {}", volume.bricks.len());
            let _ = writeln!(out, "Transport-type: tcp");
            let _ = writeln!(out, "Bricks:");
            for (i, brick) in volume.bricks.iter().enumerate() {
                let _ = writeln!(out, "Brick{}: {}", i + 1, brick);
            }
            let _ = writeln!(out, "Options Reconfigured:");
            let _ = writeln!(out, "performance.readdir-ahead: on");
        }
        out
    }
}

fn ok(stdout: impl Into<String>) -> ProcessOutput {
    ProcessOutput {
        stdout: stdout.into(),
        stderr: String::new(),
        exit_code: 0,
    }
}

fn failed(stderr: impl Into<String>) -> ProcessOutput {
    ProcessOutput {
        stdout: String::new(),
        stderr: stderr.into(),
        exit_code: 1,
    }
}

/// Stateful stand-in for the gluster CLI
#[derive(Default)]
pub struct FakeGluster {
    state: Mutex<GlusterState>,
}

impl FakeGluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_volume(&self, name: &str, running: bool, bricks: &[&str]) {
        let status = if running { "Started" } else { "Stopped" };
        self.state
            .lock()
            .insert(name, status, bricks.iter().map(|b| b.to_string()).collect());
    }

    /// Make the next invocation exit 1 with `stderr`
    pub fn fail_next(&self, stderr: &str) {
        self.state.lock().fail_next = Some(stderr.to_string());
    }

    /// Another caller creates and starts `name` between our lookup and create
    pub fn concurrent_create(&self, name: &str, bricks: &[&str]) {
        self.state.lock().concurrent_create =
            Some((name.to_string(), bricks.iter().map(|b| b.to_string()).collect()));
    }

    /// First two arguments of every invocation, e.g. `volume create`
    pub fn verbs(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|args| args.iter().take(2).cloned().collect::<Vec<_>>().join(" "))
            .collect()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.verbs().iter().filter(|v| *v == verb).count()
    }
}

#[async_trait]
impl ProcessExecutor for FakeGluster {
    async fn run(&self, _path: &str, args: &[String]) -> Result<ProcessOutput> {
        let mut state = self.state.lock();
        state.calls.push(args.to_vec());

        if let Some(stderr) = state.fail_next.take() {
            return Ok(failed(stderr));
        }

        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = match words.as_slice() {
            ["volume", "info"] => {
                let names: Vec<String> = state.volumes.keys().cloned().collect();
                ok(state.render(&names.iter().collect::<Vec<_>>()))
            }
            ["volume", "info", name] => {
                let name = name.to_string();
                if state.volumes.contains_key(&name) {
                    ok(state.render(&[&name]))
                } else {
                    failed(format!("Volume {} does not exist", name))
                }
            }
            ["volume", "create", name, rest @ ..] => {
                if let Some((winner, bricks)) = state.concurrent_create.take() {
                    state.insert(&winner, "Started", bricks);
                }
                if state.volumes.contains_key(*name) {
                    failed(format!(
                        "volume create: {}: failed: Volume {} already exists",
                        name, name
                    ))
                } else {
                    let mut bricks = Vec::new();
                    let mut words = rest.iter();
                    while let Some(word) = words.next() {
                        match *word {
                            "stripe" | "replica" => {
                                words.next();
                            }
                            "force" => {}
                            brick => bricks.push(brick.to_string()),
                        }
                    }
                    state.insert(name, "Created", bricks);
                    ok(format!(
                        "volume create: {}: success: please start the volume to access data",
                        name
                    ))
                }
            }
            ["volume", "start", name] => match state.volumes.get_mut(*name) {
                None => failed(format!(
                    "volume start: {}: failed: Volume {} does not exist",
                    name, name
                )),
                Some(volume) if volume.status == "Started" => failed(format!(
                    "volume start: {}: failed: Volume {} already started",
                    name, name
                )),
                Some(volume) => {
                    volume.status = "Started";
                    ok(format!("volume start: {}: success", name))
                }
            },
            _ => failed(format!("unrecognized word: {}", words.join(" "))),
        };

        Ok(output)
    }
}

// =============================================================================
// Job Dispatcher
// =============================================================================

/// How a member answers a fan-out job
#[derive(Debug, Clone, Default)]
pub enum MemberBehaviour {
    #[default]
    Ok,
    /// In-band failure report
    Report(String),
    /// No answer within the timeout
    Timeout,
}

#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub job: String,
    pub payload: Value,
    pub targets: Vec<ClusterMember>,
}

#[derive(Default)]
struct DispatcherState {
    behaviours: HashMap<String, MemberBehaviour>,
    dispatches: Vec<DispatchRecord>,
    awaited: Vec<ClusterMember>,
    delay: Option<Duration>,
}

/// Dispatcher that records jobs and answers from scripted behaviours
pub struct RecordingDispatcher {
    members: Vec<ClusterMember>,
    state: Mutex<DispatcherState>,
}

impl RecordingDispatcher {
    pub fn new(members: &[&str]) -> Self {
        Self {
            members: members.iter().map(|m| ClusterMember::from(*m)).collect(),
            state: Mutex::new(DispatcherState::default()),
        }
    }

    pub fn set_behaviour(&self, member: &str, behaviour: MemberBehaviour) {
        self.state
            .lock()
            .behaviours
            .insert(member.to_string(), behaviour);
    }

    /// Every member takes `delay` to answer
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.state.lock().dispatches.clone()
    }

    pub fn awaited(&self) -> Vec<ClusterMember> {
        self.state.lock().awaited.clone()
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn members(&self) -> Result<Vec<ClusterMember>> {
        Ok(self.members.clone())
    }

    async fn dispatch(
        &self,
        job: &str,
        payload: Value,
        targets: &[ClusterMember],
    ) -> Result<JobHandle> {
        let mut state = self.state.lock();
        state.dispatches.push(DispatchRecord {
            job: job.to_string(),
            payload,
            targets: targets.to_vec(),
        });
        Ok(JobHandle {
            id: format!("job-{}", state.dispatches.len()),
            job: job.to_string(),
        })
    }

    async fn await_result(
        &self,
        _handle: &JobHandle,
        member: &ClusterMember,
        timeout: Duration,
    ) -> Result<Value> {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.awaited.push(member.clone());

        match state.behaviours.get(member.as_str()).cloned().unwrap_or_default() {
            MemberBehaviour::Ok => Ok(json!({ "error": null })),
            MemberBehaviour::Report(reason) => Ok(json!({ "error": reason })),
            MemberBehaviour::Timeout => Err(Error::FanoutTimeout {
                member: member.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

// =============================================================================
// Database Registry
// =============================================================================

#[derive(Default)]
struct RegistryState {
    records: Vec<DatabaseRecord>,
    find_calls: usize,
    bootstraps: usize,
    race_on_insert: Option<DatabaseRecord>,
    appear_after_find: Option<DatabaseRecord>,
    fail_insert: Option<String>,
}

/// Registry table held in memory with the same uniqueness rule
#[derive(Default)]
pub struct MemoryRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A concurrent caller inserts `winner` just before our insert lands
    pub fn race_on_insert(&self, winner: DatabaseRecord) {
        self.state.lock().race_on_insert = Some(winner);
    }

    /// `record` becomes visible once the first lookup has missed
    pub fn appear_after_first_find(&self, record: DatabaseRecord) {
        self.state.lock().appear_after_find = Some(record);
    }

    /// The next insert fails without recording anything
    pub fn fail_next_insert(&self, reason: &str) {
        self.state.lock().fail_insert = Some(reason.to_string());
    }

    pub fn records(&self) -> Vec<DatabaseRecord> {
        self.state.lock().records.clone()
    }

    pub fn find_calls(&self) -> usize {
        self.state.lock().find_calls
    }

    pub fn bootstraps(&self) -> usize {
        self.state.lock().bootstraps
    }
}

#[async_trait]
impl DatabaseRegistry for MemoryRegistry {
    async fn bootstrap(&self) -> Result<()> {
        self.state.lock().bootstraps += 1;
        Ok(())
    }

    async fn find(&self, name: &str) -> Result<Option<DatabaseRecord>> {
        let mut state = self.state.lock();
        state.find_calls += 1;
        let found = state.records.iter().find(|r| r.name == name).cloned();
        if let Some(record) = state.appear_after_find.take() {
            state.records.push(record);
        }
        Ok(found)
    }

    async fn insert(&self, record: &DatabaseRecord) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_insert.take() {
            return Err(Error::Internal(reason));
        }
        if let Some(winner) = state.race_on_insert.take() {
            state.records.push(winner);
        }
        if state.records.iter().any(|r| r.name == record.name) {
            return Err(Error::RegistryConflict {
                name: record.name.clone(),
            });
        }
        state.records.push(record.clone());
        Ok(())
    }
}

// =============================================================================
// Tenant Catalog
// =============================================================================

#[derive(Default)]
struct CatalogState {
    /// database name -> owner
    databases: HashMap<String, String>,
    /// username -> password
    users: HashMap<String, String>,
    statements: Vec<String>,
    connections: Vec<String>,
    closed: usize,
    duplicate_on_create: bool,
    fail_create_user: Option<String>,
}

/// A single fake database server shared by every session
#[derive(Default)]
pub struct FakeCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database created outside the registry
    pub fn add_database(&self, name: &str) {
        self.state
            .lock()
            .databases
            .insert(name.to_string(), "postgres".to_string());
    }

    /// `CREATE DATABASE` loses to a concurrent creator
    pub fn duplicate_on_create(&self) {
        self.state.lock().duplicate_on_create = true;
    }

    pub fn fail_create_user(&self, reason: &str) {
        self.state.lock().fail_create_user = Some(reason.to_string());
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.state.lock().databases.contains_key(name)
    }

    pub fn owner_of(&self, name: &str) -> Option<String> {
        self.state.lock().databases.get(name).cloned()
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        self.state.lock().users.get(username).cloned()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Hosts sessions were opened against
    pub fn connections(&self) -> Vec<String> {
        self.state.lock().connections.clone()
    }

    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }
}

#[async_trait]
impl CatalogConnector for FakeCatalog {
    async fn connect(&self, server: &DatabaseServer) -> Result<Box<dyn CatalogSession>> {
        self.state
            .lock()
            .connections
            .push(server.connect_host().to_string());
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<CatalogState>>,
}

#[async_trait]
impl CatalogSession for FakeSession {
    async fn database_exists(&mut self, name: &str) -> Result<bool> {
        Ok(self.state.lock().databases.contains_key(name))
    }

    async fn create_user(&mut self, username: &str, password: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_create_user.clone() {
            return Err(Error::Internal(reason));
        }
        state.statements.push(format!("CREATE USER {}", username));
        state.users.insert(username.to_string(), password.to_string());
        Ok(())
    }

    async fn create_database(&mut self, name: &str, owner: &str) -> Result<()> {
        let mut state = self.state.lock();
        state
            .statements
            .push(format!("CREATE DATABASE {} OWNER {}", name, owner));
        if state.duplicate_on_create || state.databases.contains_key(name) {
            return Err(Error::Conflict {
                name: name.to_string(),
            });
        }
        state.databases.insert(name.to_string(), owner.to_string());
        Ok(())
    }

    async fn drop_user(&mut self, username: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.statements.push(format!("DROP USER {}", username));
        state.users.remove(username);
        Ok(())
    }

    async fn drop_database(&mut self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.statements.push(format!("DROP DATABASE {}", name));
        state.databases.remove(name);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().closed += 1;
        Ok(())
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Orchestrator over the fakes; the directory worker writes under `mount`
pub fn fake_orchestrator(
    gluster: &Arc<FakeGluster>,
    dispatcher: &Arc<RecordingDispatcher>,
    catalog: &Arc<FakeCatalog>,
    mount: PathBuf,
) -> Arc<Orchestrator> {
    let gluster_config = GlusterConfig {
        nodes: vec!["test".into()],
        mounts: vec![mount],
        ..Default::default()
    };
    let volumes = VolumeProvisioner::new(
        gluster_config.clone(),
        GlusterCli::new("/usr/sbin/gluster", gluster.clone()),
        dispatcher.clone(),
    );

    let postgres = PostgresConfig {
        key: "mysecretkey".into(),
        servers: vec![DatabaseServer::new("localhost")],
        registry: Default::default(),
    };
    let databases =
        DatabaseProvisioner::new(&postgres, Arc::new(MemoryRegistry::new()), catalog.clone())
            .with_selector(Arc::new(FixedSelector(0)));

    Orchestrator::new(
        Some(volumes),
        Some(databases),
        Some(Arc::new(DirectoryWorker::new(&gluster_config))),
    )
    .expect("metrics registry")
}
