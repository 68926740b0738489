use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::{Output, Stdio},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::Command,
    sync::Mutex,
    time,
};

use crate::{config::MAX_OUTPUT_CHARS, ExecutorError, ExecutorResult};

use super::{ContainerSummary, Engine, ExecOutput, RunOptions};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The docker binary looked up on `PATH` when none is configured.
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// How long a single docker command may take before it is killed.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// How long pulling an image may take before it is killed.
const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// Upper bound on the bytes of output kept in memory per stream.
const MAX_CAPTURE_BYTES: usize = MAX_OUTPUT_CHARS * 4;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An [`Engine`] that drives the docker daemon through the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    /// Path to the docker binary.
    binary: PathBuf,

    /// Timeout applied to every command except `pull`.
    command_timeout: Duration,

    /// Timeout applied to `pull`.
    pull_timeout: Duration,
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct DockerPsEntry {
    #[serde(rename = "ID")]
    id: String,

    #[serde(rename = "Names")]
    names: String,

    #[serde(rename = "Labels", default)]
    labels: String,

    #[serde(rename = "Status", default)]
    status: String,
}

type SharedLog = Option<Arc<Mutex<File>>>;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DockerEngine {
    /// Creates an engine using the given docker binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }

    /// Sets the timeout applied to every command except `pull`.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the timeout applied to `pull`.
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Runs a docker command to completion, bounded by `timeout`.
    async fn docker(&self, args: &[String], timeout: Duration) -> ExecutorResult<Output> {
        tracing::trace!("docker {}", args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match time::timeout(timeout, output).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ExecutorError::UpstreamFailure(format!(
                "failed to run {}: {}",
                self.binary.display(),
                e
            ))),
            Err(_) => Err(ExecutorError::Timeout(format!(
                "docker {} exceeded {}s",
                args.first().map(String::as_str).unwrap_or_default(),
                timeout.as_secs()
            ))),
        }
    }

    /// Builds the argument list of `docker run` for `options`.
    fn run_args(options: &RunOptions) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            options.get_name().clone(),
            "--hostname".to_string(),
            options.get_hostname().clone(),
        ];

        if *options.get_cpus() > 0.0 {
            args.push(format!("--cpus={}", options.get_cpus()));
        }

        if *options.get_memory_mib() > 0 {
            args.push(format!("--memory={}m", options.get_memory_mib()));
            args.push(format!(
                "--memory-swap={}m",
                options.get_memory_mib() + options.get_swap_mib()
            ));
        }

        for (key, value) in options.get_labels() {
            args.push("--label".to_string());
            args.push(format!("{key}={value}"));
        }

        for (key, value) in options.get_env() {
            args.push("--env".to_string());
            args.push(format!("{key}={value}"));
        }

        for volume in options.get_volumes() {
            args.push("--volume".to_string());
            args.push(volume.clone());
        }

        if let Some(workdir) = options.get_workdir() {
            args.push("--workdir".to_string());
            args.push(workdir.clone());
        }

        args.push(options.get_image().clone());
        args.extend(options.get_command().iter().cloned());
        args
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for DockerEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_BINARY)
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn run(&self, options: &RunOptions) -> ExecutorResult<String> {
        let output = self
            .docker(&Self::run_args(options), self.command_timeout)
            .await?;

        if !output.status.success() {
            return Err(ExecutorError::UpstreamFailure(format!(
                "failed to create container {}: {}",
                options.get_name(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn execute(
        &self,
        name: &str,
        command: &[String],
        timeout: Duration,
        log_path: Option<&Path>,
    ) -> ExecutorResult<ExecOutput> {
        tracing::debug!("executing in {name}: {}", command.join(" "));

        let mut child = Command::new(&self.binary)
            .arg("exec")
            .arg(name)
            .args(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecutorError::UpstreamFailure(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ExecutorError::UpstreamFailure("failed to capture exec stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            ExecutorError::UpstreamFailure("failed to capture exec stderr".to_string())
        })?;

        let log: SharedLog = match log_path {
            Some(path) => Some(Arc::new(Mutex::new(open_log(path).await?))),
            None => None,
        };

        let run = async {
            let (stdout, stderr, status) = tokio::join!(
                capture(stdout, log.clone()),
                capture(stderr, log.clone()),
                child.wait()
            );

            ExecutorResult::Ok(ExecOutput {
                success: status?.success(),
                stdout,
                stderr,
            })
        };

        match time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Timeout(format!(
                "command in {} exceeded {}s",
                name,
                timeout.as_secs()
            ))),
        }
    }

    async fn remove(&self, name: &str, force: bool) -> ExecutorResult<bool> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(name.to_string());

        let output = self.docker(&args, self.command_timeout).await?;
        if !output.status.success() {
            tracing::debug!(
                "docker rm {name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.status.success())
    }

    async fn list(&self, labels: &[(String, String)]) -> ExecutorResult<Vec<ContainerSummary>> {
        let mut args = vec![
            "ps".to_string(),
            "--all".to_string(),
            "--no-trunc".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];

        for (key, value) in labels {
            args.push("--filter".to_string());
            args.push(format!("label={key}={value}"));
        }

        let output = self.docker(&args, self.command_timeout).await?;
        if !output.status.success() {
            return Err(ExecutorError::UpstreamFailure(format!(
                "failed to list containers: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| -> ExecutorResult<ContainerSummary> {
                Ok(serde_json::from_str::<DockerPsEntry>(line)?.into())
            })
            .collect()
    }

    async fn network_connect(&self, name: &str, network: &str) -> ExecutorResult<bool> {
        let args = [
            "network".to_string(),
            "connect".to_string(),
            network.to_string(),
            name.to_string(),
        ];

        let output = self.docker(&args, self.command_timeout).await?;
        if !output.status.success() {
            tracing::warn!(
                "failed to connect {name} to network {network}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.status.success())
    }

    async fn pull(&self, image: &str) -> ExecutorResult<bool> {
        let args = ["pull".to_string(), image.to_string()];
        let output = self.docker(&args, self.pull_timeout).await?;

        Ok(output.status.success())
    }
}

impl From<DockerPsEntry> for ContainerSummary {
    fn from(entry: DockerPsEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.names,
            labels: parse_labels(&entry.labels),
            status: entry.status,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Parses docker's `key=value,key=value` label rendering.
fn parse_labels(labels: &str) -> BTreeMap<String, String> {
    labels
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .collect()
}

/// Opens a log file for appending, creating it and its parent directory if needed.
async fn open_log(path: &Path) -> ExecutorResult<File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

/// Reads `reader` line by line into a string, mirroring each line into `log`.
///
/// Bytes that are not valid UTF-8 are replaced rather than ending the capture, and the reader is
/// drained to the end so the writing process never blocks on a full pipe.
async fn capture(reader: impl AsyncRead + Unpin, log: SharedLog) -> String {
    let mut captured = String::new();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("stopped reading exec output: {}", e);
                break;
            }
        }

        let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = String::from_utf8_lossy(line);

        if let Some(log) = &log {
            let mut file = log.lock().await;
            if let Err(e) = file.write_all(format!("{}\n", line).as_bytes()).await {
                tracing::error!("failed to write build log: {}", e);
            }
            if let Err(e) = file.flush().await {
                tracing::error!("failed to flush build log: {}", e);
            }
        }

        if captured.len() < MAX_CAPTURE_BYTES {
            captured.push_str(&line);
            captured.push('\n');
        }
    }

    captured
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_run_args() {
        let options = RunOptions::builder()
            .image("lang:1.0")
            .name("r1")
            .hostname("abc")
            .cpus(1.5)
            .memory_mib(256)
            .swap_mib(128)
            .env(BTreeMap::from([("A".to_string(), "1".to_string())]))
            .labels(BTreeMap::from([(
                "monoexec.type".to_string(),
                "runtime".to_string(),
            )]))
            .command(vec!["tail".to_string(), "-f".to_string(), "/dev/null".to_string()])
            .workdir("/usr/code")
            .volumes(vec!["/tmp/r1/src:/tmp:rw".to_string()])
            .build();

        let args = DockerEngine::run_args(&options);
        let joined = args.join(" ");

        assert!(joined.starts_with("run -d --name r1 --hostname abc"));
        assert!(args.contains(&"--cpus=1.5".to_string()));
        assert!(args.contains(&"--memory=256m".to_string()));
        assert!(args.contains(&"--memory-swap=384m".to_string()));
        assert!(joined.contains("--label monoexec.type=runtime"));
        assert!(joined.contains("--env A=1"));
        assert!(joined.contains("--volume /tmp/r1/src:/tmp:rw"));
        assert!(joined.contains("--workdir /usr/code"));
        assert!(joined.ends_with("lang:1.0 tail -f /dev/null"));
    }

    #[test]
    fn test_docker_ps_entry_conversion() -> anyhow::Result<()> {
        let line = r#"{"ID":"abc123","Names":"r1","Labels":"monoexec.type=runtime,monoexec.runtime=node","Status":"Up 2 minutes"}"#;
        let summary: ContainerSummary = serde_json::from_str::<DockerPsEntry>(line)?.into();

        assert_eq!(summary.id, "abc123");
        assert_eq!(summary.name, "r1");
        assert_eq!(summary.labels["monoexec.type"], "runtime");
        assert_eq!(summary.labels["monoexec.runtime"], "node");
        Ok(())
    }

    #[tokio::test]
    async fn test_capture_mirrors_lines_into_log() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("logs").join("build.log");
        let log = Some(Arc::new(Mutex::new(open_log(&path).await?)));

        let captured = capture(&b"one\ntwo\n"[..], log).await;

        assert_eq!(captured, "one\ntwo\n");
        assert_eq!(tokio::fs::read_to_string(&path).await?, "one\ntwo\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_capture_keeps_reading_past_invalid_utf8() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("build.log");
        let log = Some(Arc::new(Mutex::new(open_log(&path).await?)));

        let captured = capture(&b"one\n\xff\xfe\ntwo\r\nthree"[..], log).await;

        assert_eq!(captured, "one\n\u{fffd}\u{fffd}\ntwo\nthree\n");
        assert_eq!(tokio::fs::read_to_string(&path).await?, captured);
        Ok(())
    }
}
