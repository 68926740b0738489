#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{http::HeaderMap, routing::post, Json, Router};
use monoexec::{
    config::ExecutorConfig,
    engine::{ContainerSummary, Engine, ExecOutput, OrchestrationPool, RunOptions},
    orchestration::Orchestrator,
    storage::LocalStorage,
    utils::CONTAINER_BUILDS_PATH,
    ExecutorError, ExecutorResult,
};
use tokio::{fs, io::AsyncWriteExt};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

pub const SECRET: &str = "test-secret";

pub const SOURCE_PATH: &str = "functions/code.tar.gz";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An in-memory container engine.
///
/// Build commands are interpreted rather than run:
/// - `echo <text>` writes `<text>` to stdout
/// - `fail <text>` writes `<text>` to stderr and exits non-zero
/// - `sleep <ms>` waits
/// - `emit <n>` writes `n` characters to stdout
/// - `artifact` writes the build artifact into the mounted builds directory
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub containers: BTreeMap<String, FakeContainer>,
    pub runs: usize,
    pub pulls: Vec<String>,
    pub run_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// A temp directory with an orchestrator wired to a [`FakeEngine`].
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub engine: FakeEngine,
    pub orchestrator: Orchestrator,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakeEngine {
    pub fn with_run_delay(self, delay: Duration) -> Self {
        self.state().run_delay = delay;
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.state()
            .containers
            .values()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn runs(&self) -> usize {
        self.state().runs
    }

    /// Adds a container as if another process had started it.
    pub fn insert(&self, name: &str, labels: &[(&str, &str)]) {
        let container = FakeContainer {
            id: format!("id-{name}"),
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            volumes: vec![],
            env: BTreeMap::new(),
        };
        self.state().containers.insert(name.to_string(), container);
    }

    fn builds_dir(&self, name: &str) -> Option<PathBuf> {
        let state = self.state();
        let container = state.containers.get(name)?;
        container.volumes.iter().find_map(|volume| {
            let mut parts = volume.split(':');
            let host = parts.next()?;
            (parts.next()? == CONTAINER_BUILDS_PATH).then(|| PathBuf::from(host))
        })
    }
}

impl Harness {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(
        customize: impl FnOnce(&mut ExecutorConfig),
    ) -> anyhow::Result<Self> {
        Self::with_engine(FakeEngine::default(), customize).await
    }

    pub async fn with_engine(
        engine: FakeEngine,
        customize: impl FnOnce(&mut ExecutorConfig),
    ) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let storage_root = dir.path().join("storage");

        let source = storage_root.join(SOURCE_PATH);
        fs::create_dir_all(source.parent().unwrap()).await?;
        fs::write(&source, b"source archive").await?;

        let mut config = ExecutorConfig::builder()
            .secret(SECRET)
            .pool_size(4)
            .temp_dir(dir.path().join("tmp"))
            .source_root(&storage_root)
            .destination_root(&storage_root)
            .execution_ready_retries(2)
            .build();
        customize(&mut config);

        let pool = OrchestrationPool::from_fn(*config.get_pool_size(), || {
            Box::new(engine.clone()) as Box<dyn Engine>
        });
        let storage = Arc::new(LocalStorage::new(&storage_root));
        let orchestrator = Orchestrator::new(config, pool, storage.clone(), storage)?;

        Ok(Self {
            dir,
            engine,
            orchestrator,
        })
    }

    pub fn storage_root(&self) -> PathBuf {
        self.dir.path().join("storage")
    }

    pub fn work_dir(&self, runtime_id: &str) -> PathBuf {
        self.dir.path().join("tmp").join("runtimes").join(runtime_id)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Engine for FakeEngine {
    async fn run(&self, options: &RunOptions) -> ExecutorResult<String> {
        let delay = self.state().run_delay;
        tokio::time::sleep(delay).await;

        let mut state = self.state();
        state.runs += 1;
        if state.containers.contains_key(options.get_name()) {
            return Err(ExecutorError::UpstreamFailure(format!(
                "container name {} is already in use",
                options.get_name()
            )));
        }

        let id = format!("id-{}-{}", options.get_name(), state.runs);
        state.containers.insert(
            options.get_name().clone(),
            FakeContainer {
                id: id.clone(),
                name: options.get_name().clone(),
                labels: options.get_labels().clone(),
                volumes: options.get_volumes().clone(),
                env: options.get_env().clone(),
            },
        );

        Ok(id)
    }

    async fn execute(
        &self,
        name: &str,
        command: &[String],
        timeout: Duration,
        log_path: Option<&Path>,
    ) -> ExecutorResult<ExecOutput> {
        if !self.state().containers.contains_key(name) {
            return Err(ExecutorError::UpstreamFailure(format!(
                "no such container: {name}"
            )));
        }

        let script = command.last().cloned().unwrap_or_default();
        let run = async {
            let mut output = ExecOutput {
                success: true,
                ..Default::default()
            };

            for step in script.split(" && ") {
                let (verb, arg) = step.split_once(' ').unwrap_or((step, ""));
                let line = match verb {
                    "echo" => {
                        output.stdout.push_str(arg);
                        output.stdout.push('\n');
                        Some(format!("{arg}\n"))
                    }
                    "fail" => {
                        output.stderr.push_str(arg);
                        output.stderr.push('\n');
                        output.success = false;
                        Some(format!("{arg}\n"))
                    }
                    "sleep" => {
                        tokio::time::sleep(Duration::from_millis(arg.parse()?)).await;
                        None
                    }
                    "emit" => {
                        output.stdout.push_str(&"x".repeat(arg.parse()?));
                        None
                    }
                    "artifact" => {
                        let dir = self.builds_dir(name).unwrap();
                        fs::write(dir.join("code.tar.gz"), b"artifact").await?;
                        None
                    }
                    _ => None,
                };

                if let (Some(line), Some(path)) = (line, log_path) {
                    fs::create_dir_all(path.parent().unwrap()).await?;
                    let mut file = fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .await?;
                    file.write_all(line.as_bytes()).await?;
                }

                if !output.success {
                    break;
                }
            }

            anyhow::Ok(output)
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(output) => output.map_err(ExecutorError::custom),
            Err(_) => Err(ExecutorError::Timeout(format!("exec in {name}"))),
        }
    }

    async fn remove(&self, name: &str, _force: bool) -> ExecutorResult<bool> {
        let mut state = self.state();
        let key = state
            .containers
            .values()
            .find(|c| c.name == name || c.id == name)
            .map(|c| c.name.clone());

        Ok(key.and_then(|k| state.containers.remove(&k)).is_some())
    }

    async fn list(&self, labels: &[(String, String)]) -> ExecutorResult<Vec<ContainerSummary>> {
        Ok(self
            .state()
            .containers
            .values()
            .filter(|c| labels.iter().all(|(k, v)| c.labels.get(k) == Some(v)))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                labels: c.labels.clone(),
                status: "Up".to_string(),
            })
            .collect())
    }

    async fn network_connect(&self, name: &str, _network: &str) -> ExecutorResult<bool> {
        Ok(self.state().containers.contains_key(name))
    }

    async fn pull(&self, image: &str) -> ExecutorResult<bool> {
        self.state().pulls.push(image.to_string());
        Ok(true)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Starts a stand-in for the HTTP server inside a runtime. Answers every `POST /` with
/// `status` and a body produced by `respond` from the request payload. Returns the port.
pub async fn spawn_runtime_server(
    status: u16,
    respond: fn(&serde_json::Value) -> String,
) -> anyhow::Result<u16> {
    let app = Router::new().route(
        "/",
        post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            let status = if headers.get("x-runtime-secret").is_some() {
                axum::http::StatusCode::from_u16(status).unwrap()
            } else {
                axum::http::StatusCode::UNAUTHORIZED
            };
            (status, respond(&body))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move { axum::serve(listener, app).await });

    Ok(port)
}

/// Points the runtime at the loopback address so a local stand-in server can answer for it.
pub fn route_to_localhost(orchestrator: &Orchestrator, runtime_id: &str) {
    orchestrator.registry().update(runtime_id, |record| {
        record.set_hostname("127.0.0.1".to_string());
    });
}

/// Returns a port nothing listens on.
pub async fn closed_port() -> anyhow::Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}
