//! Test doubles shared by service tests.
//!
//! `FakeHost` simulates the parts of a managed host the services touch:
//! a docker installation with volumes, images and containers, a MongoDB
//! server per container, and a handful of files. It interprets the exact
//! command strings produced by `domain::commands`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use outpost_common::{InstanceKey, InstanceRecord, StateCollection};

use crate::application::ports::{ProgressReporter, RemoteConnector, RemoteShell, StateStore};
use crate::domain::{CommandResult, RemoteError, StateError};

// ── Fake host ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub running: bool,
}

/// Mutable world behind a [`FakeHost`]. Tests tweak the knobs directly.
#[derive(Debug, Clone)]
pub struct FakeHostState {
    pub docker_installed: bool,
    pub docker_version_output: String,
    pub install_succeeds: bool,
    pub install_provides_binary: bool,
    pub daemon_running: bool,
    pub daemon_starts: bool,
    pub user_in_docker_group: bool,
    pub group_change_requested: bool,
    pub volumes: BTreeSet<String>,
    pub images: BTreeSet<String>,
    pub pull_fails: bool,
    pub containers: BTreeMap<String, FakeContainer>,
    pub crash_on_start: bool,
    /// Number of failed pings before the database answers.
    pub pings_before_ready: u32,
    pub pings: u32,
    /// Container stops on the first ping.
    pub crash_while_waiting: bool,
    /// Pings never answer and run until their timeout expires.
    pub hang_pings: bool,
    pub users: BTreeSet<String>,
    pub files: BTreeMap<String, String>,
    pub fail_file_writes: bool,
    pub dump_stderr: Option<String>,
    pub restore_stderr: Option<String>,
    /// Commands containing this text fail at the transport level.
    pub drop_connection_on: Option<String>,
    pub next_id: u32,
    pub log: Vec<(String, Duration)>,
}

impl Default for FakeHostState {
    fn default() -> Self {
        Self {
            docker_installed: true,
            docker_version_output: "Docker version 24.0.7, build afdd53b".to_string(),
            install_succeeds: true,
            install_provides_binary: true,
            daemon_running: true,
            daemon_starts: true,
            user_in_docker_group: true,
            group_change_requested: false,
            volumes: BTreeSet::new(),
            images: BTreeSet::new(),
            pull_fails: false,
            containers: BTreeMap::new(),
            crash_on_start: false,
            pings_before_ready: 0,
            pings: 0,
            crash_while_waiting: false,
            hang_pings: false,
            users: BTreeSet::new(),
            files: BTreeMap::new(),
            fail_file_writes: false,
            dump_stderr: None,
            restore_stderr: None,
            drop_connection_on: None,
            next_id: 0,
            log: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeHost {
    host: String,
    state: Arc<Mutex<FakeHostState>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new(FakeHostState::default())
    }
}

impl FakeHost {
    pub fn new(state: FakeHostState) -> Self {
        Self {
            host: "db1.example.com".to_string(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Inspect or mutate the simulated world.
    pub fn with<T>(&self, f: impl FnOnce(&mut FakeHostState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn commands(&self) -> Vec<String> {
        self.with(|s| s.log.iter().map(|(c, _)| c.clone()).collect())
    }

    pub fn timeout_of(&self, needle: &str) -> Option<Duration> {
        self.with(|s| {
            s.log
                .iter()
                .find(|(c, _)| c.contains(needle))
                .map(|(_, t)| *t)
        })
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }

    /// Add a running container as if provisioned earlier.
    pub fn add_container(&self, name: &str, id: &str, running: bool) {
        self.with(|s| {
            s.containers.insert(
                name.to_string(),
                FakeContainer {
                    id: id.to_string(),
                    running,
                },
            );
        });
    }
}

fn ok(stdout: &str) -> CommandResult {
    CommandResult::new(stdout, "", 0)
}

fn fail(code: i32, stderr: &str) -> CommandResult {
    CommandResult::new("", stderr, code)
}

fn unquote(token: &str) -> String {
    token.trim_matches('\'').to_string()
}

impl FakeHostState {
    fn find_container(&self, reference: &str) -> Option<String> {
        self.containers
            .iter()
            .find(|(name, c)| name.as_str() == reference || c.id.starts_with(reference))
            .map(|(name, _)| name.clone())
    }

    fn dispatch(&mut self, command: &str, input: &[u8]) -> CommandResult {
        if command == "docker --version" {
            return if self.docker_installed {
                ok(&format!("{}\n", self.docker_version_output))
            } else {
                fail(127, "bash: docker: command not found")
            };
        }
        if command == "command -v docker" {
            return if self.docker_installed {
                ok("/usr/bin/docker\n")
            } else {
                fail(1, "")
            };
        }
        if command.starts_with("f=$(mktemp)") {
            if !self.install_succeeds {
                return fail(6, "curl: (6) Could not resolve host: get.docker.com");
            }
            self.docker_installed = self.install_provides_binary;
            self.daemon_running = true;
            return ok("Docker installed\n");
        }
        if command.starts_with("sudo -n systemctl start docker") {
            if self.daemon_starts {
                self.daemon_running = true;
            }
            return ok("");
        }
        if command.starts_with("sudo -n usermod -aG docker") {
            self.group_change_requested = true;
            return ok("");
        }
        if let Some(path) = command.strip_prefix("test -f ") {
            return if self.files.contains_key(&unquote(path)) {
                ok("")
            } else {
                fail(1, "")
            };
        }
        if let Some(path) = command.strip_prefix("cat ") {
            return match self.files.get(&unquote(path)) {
                Some(content) => ok(content),
                None => fail(1, "cat: no such file"),
            };
        }
        if let Some(rest) = command.strip_prefix("tmp=") {
            if self.fail_file_writes {
                return fail(1, "cat: write error: Permission denied");
            }
            let path = unquote(rest.split(".tmp.$$").next().unwrap());
            self.files
                .insert(path, String::from_utf8_lossy(input).into_owned());
            return ok("");
        }
        if command.starts_with("umask 077 && mkdir -p") {
            return self.dump(command);
        }
        if let Some((first, second)) = command.split_once(" 2>/dev/null || ") {
            let r = self.dispatch(first, input);
            if r.success() {
                return r;
            }
            return self.dispatch(second.trim_end_matches(" 2>/dev/null"), input);
        }
        if let Some(rest) = command.strip_prefix("sudo -n docker ") {
            return self.docker(rest, true);
        }
        if let Some(rest) = command.strip_prefix("docker ") {
            return self.docker(rest, false);
        }
        fail(127, &format!("fake host: unknown command: {command}"))
    }

    fn docker(&mut self, rest: &str, sudo: bool) -> CommandResult {
        if !self.docker_installed {
            return fail(127, "docker: command not found");
        }
        if !sudo && !self.user_in_docker_group {
            return fail(
                1,
                "permission denied while trying to connect to the Docker daemon socket at unix:///var/run/docker.sock",
            );
        }
        if !self.daemon_running {
            return fail(
                1,
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
            );
        }
        let rest = rest.trim_end_matches(" 2>&1");
        let args: Vec<String> = rest.split_whitespace().map(unquote).collect();
        let a: Vec<&str> = args.iter().map(String::as_str).collect();
        match a.as_slice() {
            ["ps", "-q"] => ok(&self
                .containers
                .values()
                .filter(|c| c.running)
                .map(|c| format!("{}\n", &c.id[..12.min(c.id.len())]))
                .collect::<String>()),
            ["volume", "inspect", v] => {
                if self.volumes.contains(*v) {
                    ok("[]")
                } else {
                    fail(1, &format!("Error response from daemon: get {v}: no such volume"))
                }
            }
            ["volume", "create", v] => {
                self.volumes.insert((*v).to_string());
                ok(&format!("{v}\n"))
            }
            ["volume", "rm", v] => {
                if self.volumes.remove(*v) {
                    ok(&format!("{v}\n"))
                } else {
                    fail(1, &format!("Error response from daemon: get {v}: no such volume"))
                }
            }
            ["image", "inspect", i] => {
                if self.images.contains(*i) {
                    ok("[]")
                } else {
                    fail(1, &format!("Error response from daemon: No such image: {i}"))
                }
            }
            ["pull", i] => {
                if self.pull_fails {
                    fail(1, &format!("Error response from daemon: manifest for {i} not found: manifest unknown"))
                } else {
                    self.images.insert((*i).to_string());
                    ok("Status: Downloaded newer image\n")
                }
            }
            ["run", "-d", "--name", name, ..] => {
                if self.containers.contains_key(*name) {
                    return fail(
                        125,
                        &format!("docker: Error response from daemon: Conflict. The container name \"/{name}\" is already in use."),
                    );
                }
                self.next_id += 1;
                let id = format!("{:064x}", 0xc0ffee_u64 + u64::from(self.next_id));
                self.containers.insert(
                    (*name).to_string(),
                    FakeContainer {
                        id: id.clone(),
                        running: !self.crash_on_start,
                    },
                );
                ok(&format!("{id}\n"))
            }
            ["inspect", "--format", _, reference] => match self.find_container(reference) {
                Some(name) => ok(&format!("{}\n", self.containers[&name].running)),
                None => fail(1, &format!("Error: No such object: {reference}")),
            },
            ["logs", "--tail", _, reference] => match self.find_container(reference) {
                Some(_) => ok("{\"msg\":\"fake log line\"}\n"),
                None => fail(1, &format!("Error: No such container: {reference}")),
            },
            ["rm", "-f", reference] => match self.find_container(reference) {
                Some(name) => {
                    self.containers.remove(&name);
                    ok(&format!("{reference}\n"))
                }
                None => fail(
                    1,
                    &format!("Error response from daemon: No such container: {reference}"),
                ),
            },
            ["exec", "-i", reference, "mongorestore", ..] => {
                let archive = rest.rsplit("< ").next().map(unquote).unwrap_or_default();
                if self.find_container(reference).is_none() {
                    return fail(1, &format!("Error: No such container: {reference}"));
                }
                if let Some(stderr) = &self.restore_stderr {
                    return fail(1, stderr);
                }
                if self.files.contains_key(&archive) {
                    ok("")
                } else {
                    fail(1, "sh: cannot open archive: No such file")
                }
            }
            ["exec", reference, "mongosh", ..] => self.mongosh(reference, rest),
            _ => fail(1, &format!("fake docker: unsupported: {rest}")),
        }
    }

    fn mongosh(&mut self, reference: &str, rest: &str) -> CommandResult {
        let Some(name) = self.find_container(reference) else {
            return fail(1, &format!("Error: No such container: {reference}"));
        };
        if !self.containers[&name].running {
            return fail(1, &format!("Error response from daemon: container {reference} is not running"));
        }
        if rest.contains("ping: 1") {
            self.pings += 1;
            if self.crash_while_waiting {
                if let Some(c) = self.containers.get_mut(&name) {
                    c.running = false;
                }
                return fail(1, "MongoNetworkError: connection closed");
            }
            if self.pings > self.pings_before_ready {
                return ok("1\n");
            }
            return fail(1, "MongoNetworkError: connect ECONNREFUSED 127.0.0.1:27017");
        }
        if rest.contains("createUser") {
            let user = rest
                .split("user: \"")
                .nth(1)
                .and_then(|s| s.split('"').next())
                .unwrap_or_default()
                .to_string();
            if !self.users.insert(user.clone()) {
                return CommandResult::new(
                    format!("MongoServerError: User \"{user}\" already exists\n"),
                    "",
                    1,
                );
            }
            return ok("{ ok: 1 }\n");
        }
        fail(1, "fake mongosh: unsupported script")
    }

    fn dump(&mut self, command: &str) -> CommandResult {
        let archive = command
            .split(" > ")
            .nth(1)
            .and_then(|s| s.split(" || ").next())
            .map(unquote)
            .unwrap_or_default();
        let reference = command
            .split(" exec ")
            .nth(1)
            .and_then(|s| s.split_whitespace().next())
            .map(unquote)
            .unwrap_or_default();
        if self.find_container(&reference).is_none() {
            return fail(1, &format!("Error: No such container: {reference}"));
        }
        if let Some(stderr) = &self.dump_stderr {
            return fail(1, stderr);
        }
        self.files.insert(archive, "GZIPPED-ARCHIVE".to_string());
        ok("")
    }
}

impl RemoteShell for FakeHost {
    fn host(&self) -> &str {
        &self.host
    }

    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandResult, RemoteError> {
        self.execute_with_input(command, &[], timeout).await
    }

    async fn execute_with_input(
        &self,
        command: &str,
        input: &[u8],
        timeout: Duration,
    ) -> Result<CommandResult, RemoteError> {
        let hangs = {
            let mut state = self.state.lock().unwrap();
            state.log.push((command.to_string(), timeout));
            state.hang_pings && command.contains("ping: 1")
        };
        if hangs {
            tokio::time::sleep(timeout).await;
            return Err(RemoteError::Timeout {
                host: self.host.clone(),
                command: crate::domain::remote::command_label(command),
                timeout,
            });
        }
        let mut state = self.state.lock().unwrap();
        if state
            .drop_connection_on
            .as_deref()
            .is_some_and(|needle| command.contains(needle))
        {
            return Err(RemoteError::Connection {
                host: self.host.clone(),
                reason: "Connection reset by peer".to_string(),
            });
        }
        Ok(state.dispatch(command, input))
    }
}

// ── Scripted connector ────────────────────────────────────────────────────────

/// Connector whose `connect` outcomes are scripted in advance; once the
/// script runs out every attempt succeeds with the shared [`FakeHost`].
pub struct ScriptedConnector {
    pub host: FakeHost,
    script: Mutex<VecDeque<RemoteError>>,
    pub attempts: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(host: FakeHost, failures: Vec<RemoteError>) -> Self {
        Self {
            host,
            script: Mutex::new(failures.into()),
            attempts: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub fn connection_error() -> RemoteError {
    RemoteError::Connection {
        host: "db1.example.com".to_string(),
        reason: "Connection refused".to_string(),
    }
}

pub fn auth_error() -> RemoteError {
    RemoteError::Auth {
        host: "db1.example.com".to_string(),
        user: "deploy".to_string(),
        reason: "Permission denied (publickey)".to_string(),
    }
}

impl RemoteConnector for ScriptedConnector {
    type Session = FakeHost;

    fn host(&self) -> &str {
        self.host.host()
    }

    async fn connect(&self) -> Result<FakeHost, RemoteError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(self.host.clone()),
        }
    }

    async fn disconnect(&self, _session: FakeHost) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// ── In-memory state store ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    name: String,
    collection: Mutex<StateCollection>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub writes: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_record(self, key: &InstanceKey, record: InstanceRecord) -> Self {
        self.collection.lock().unwrap().insert(key.clone(), record);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn snapshot(&self) -> StateCollection {
        self.collection.lock().unwrap().clone()
    }

    pub fn record(&self, key: &InstanceKey) -> Option<InstanceRecord> {
        self.snapshot().get(key).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn location(&self) -> String {
        self.name.clone()
    }

    async fn read(&self) -> Result<StateCollection, StateError> {
        if self.fail_reads {
            return Err(StateError::Validation {
                location: self.name.clone(),
                key: Some("app/dev".to_string()),
                field: "port".to_string(),
                reason: "is missing".to_string(),
            });
        }
        Ok(self.snapshot())
    }

    async fn write(&self, collection: &StateCollection) -> Result<(), StateError> {
        if self.fail_writes {
            return Err(StateError::RemoteCommand {
                location: self.name.clone(),
                command: "tmp=.outpost/state.json.tmp.$$;".to_string(),
                exit_code: 1,
                stderr: "No space left on device".to_string(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.collection.lock().unwrap() = collection.clone();
        Ok(())
    }
}

// ── Recording reporter ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingReporter {
    pub fn warnings(&self) -> Vec<String> {
        self.of("warn")
    }

    pub fn steps(&self) -> Vec<String> {
        self.of("step")
    }

    pub fn infos(&self) -> Vec<String> {
        self.of("info")
    }

    fn of(&self, kind: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.events.lock().unwrap().push(("step", message.to_string()));
    }

    fn success(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(("success", message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.events.lock().unwrap().push(("warn", message.to_string()));
    }

    fn info(&self, message: &str) {
        self.events.lock().unwrap().push(("info", message.to_string()));
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub fn key() -> InstanceKey {
    InstanceKey::new("app", "dev").unwrap()
}

pub fn record(port: u16, container_id: &str) -> InstanceRecord {
    InstanceRecord {
        port,
        database: "app_dev".to_string(),
        app_username: "app_dev_app".to_string(),
        app_password: "AppPassword23456789abcdefghijkmn".to_string(),
        admin_password: "AdminPassword2345678abcdefghijkm".to_string(),
        volume: "outpost-app-dev-data".to_string(),
        container_id: container_id.to_string(),
        created_at: chrono::DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&chrono::Utc),
        last_backup_at: None,
    }
}
