use std::{collections::BTreeMap, path::Path};

use tokio::fs;

use crate::{
    engine::{ExecOutput, RunOptions},
    runtime::{RuntimeRecord, RuntimeStatus},
    utils::{
        self, BUILDS_SUBDIR, BUILD_ARTIFACT_FILENAME, CONTAINER_BUILDS_PATH,
        CONTAINER_SOURCE_PATH, SOURCE_ARCHIVE_FILENAME, SOURCE_SUBDIR,
    },
    ExecutorError, ExecutorResult,
};

use super::{
    BuildResult, BuildStatus, CreateRuntimeRequest, Orchestrator, LABEL_CREATED, LABEL_RUNTIME,
    LABEL_RUNTIME_ID, LABEL_TYPE, LABEL_TYPE_RUNTIME, RUNTIME_ENTRYPOINT_ENV, RUNTIME_SECRET_ENV,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a build has produced so far. Survives a failed build so the failure can be reported.
#[derive(Debug, Default)]
struct BuildProgress {
    container_id: Option<String>,
    output: ExecOutput,
    output_path: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Orchestrator {
    /// Creates a runtime container and, when the request carries commands, builds the function
    /// inside it.
    ///
    /// The runtime is registered as `pending` before the container engine is called, so a second
    /// create for the same identifier fails fast instead of racing this one. On success the
    /// runtime becomes `up`; with `remove` set it is torn down and forgotten once the build
    /// finishes, whatever the outcome.
    ///
    /// ## Errors
    /// - [`ExecutorError::Conflict`] if the runtime is already up.
    /// - [`ExecutorError::Transient`] if another create for it is still in flight.
    /// - [`ExecutorError::InvalidArgument`] if the identifier is not a valid container name or
    ///   the image is not allowed.
    /// - [`ExecutorError::BuildFailed`] if any build step fails. The result carries the output.
    pub async fn create_runtime(
        &self,
        request: CreateRuntimeRequest,
    ) -> ExecutorResult<BuildResult> {
        let runtime_id = request.runtime_id.clone();
        utils::validate_runtime_id(&runtime_id)?;

        if !self.config.is_image_allowed(&request.base_image) {
            return Err(ExecutorError::InvalidArgument(format!(
                "image not allowed: {}",
                request.base_image
            )));
        }

        let secret = utils::generate_secret();
        let record = RuntimeRecord::new(
            &runtime_id,
            utils::generate_hostname(),
            &request.base_image,
            &secret,
        );
        self.registry.create(record)?;

        tracing::info!("creating runtime {runtime_id} from {}", request.base_image);

        // Detached so the runtime is always finalised, even when the caller goes away mid-build.
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.run_build(request, secret).await }).await?
    }

    /// Builds a runtime already registered as `pending` and settles its record and container.
    async fn run_build(
        &self,
        request: CreateRuntimeRequest,
        secret: String,
    ) -> ExecutorResult<BuildResult> {
        let runtime_id = request.runtime_id.as_str();
        let start_time = utils::now_timestamp_f64();
        let mut progress = BuildProgress::default();
        let outcome = self.build(&request, &secret, &mut progress).await;
        let end_time = utils::now_timestamp_f64();
        let duration = (end_time - start_time).max(0.0);

        let BuildProgress {
            container_id,
            output,
            output_path,
        } = progress;

        let result = match &outcome {
            Ok(()) => BuildResult {
                status: BuildStatus::Ready,
                response: utils::truncate_output(output.stdout),
                stderr: utils::truncate_output(output.stderr),
                start_time,
                end_time,
                duration,
                output_path,
            },
            Err(e) => {
                let stderr = if output.stderr.trim().is_empty() {
                    e.to_string()
                } else {
                    output.stderr
                };

                BuildResult {
                    status: BuildStatus::Failed,
                    response: utils::truncate_output(output.stdout),
                    stderr: utils::truncate_output(stderr),
                    start_time,
                    end_time,
                    duration,
                    output_path: None,
                }
            }
        };

        if request.remove {
            self.remove_container(runtime_id, container_id.as_deref())
                .await;
            self.registry.delete(runtime_id);
            self.remove_work_dir(runtime_id).await;
        } else if outcome.is_ok() {
            self.registry.update(runtime_id, |record| {
                record.set_id(container_id.unwrap_or_default());
                record.set_status(RuntimeStatus::Up { duration });
                record.touch();
            });
        } else {
            self.remove_container(runtime_id, container_id.as_deref())
                .await;
            self.registry.update(runtime_id, |record| {
                record.set_status(RuntimeStatus::Error);
                record.touch();
            });
        }

        match outcome {
            Ok(()) => {
                tracing::info!("runtime {runtime_id} is up after {duration:.2}s");
                Ok(result)
            }
            Err(e) => {
                tracing::error!("failed to create runtime {runtime_id}: {e}");
                Err(ExecutorError::BuildFailed(Box::new(result)))
            }
        }
    }

    /// Runs the build steps in order, recording what they produce into `progress`.
    async fn build(
        &self,
        request: &CreateRuntimeRequest,
        secret: &str,
        progress: &mut BuildProgress,
    ) -> ExecutorResult<()> {
        let runtime_id = &request.runtime_id;
        let work_dir = self.work_dir(runtime_id);
        let source_dir = work_dir.join(SOURCE_SUBDIR);
        let builds_dir = work_dir.join(BUILDS_SUBDIR);

        // A replaced `error` runtime may have left its log and output behind.
        self.remove_work_dir(runtime_id).await;

        // The source must be local before any container exists.
        if !self.source_storage.exists(&request.source).await? {
            return Err(ExecutorError::UpstreamFailure(format!(
                "source not found on storage: {}",
                request.source
            )));
        }
        self.source_storage
            .download(&request.source, &source_dir.join(SOURCE_ARCHIVE_FILENAME))
            .await?;
        fs::create_dir_all(&builds_dir).await?;

        let record = self.get_runtime(runtime_id)?;
        let options = self.run_options(request, record.get_hostname(), secret, &work_dir);
        let container_id = self.pool.acquire().await?.run(&options).await?;
        progress.container_id = Some(container_id);

        let network = self.config.get_network();
        if !self
            .pool
            .acquire()
            .await?
            .network_connect(runtime_id, network)
            .await?
        {
            return Err(ExecutorError::UpstreamFailure(format!(
                "failed to connect runtime {runtime_id} to network {network}"
            )));
        }

        if !request.commands.is_empty() {
            let command = vec![
                "sh".to_string(),
                "-c".to_string(),
                request.commands.join(" && "),
            ];
            let log_path = utils::build_log_path(self.config.get_temp_dir(), runtime_id);

            progress.output = self
                .pool
                .acquire()
                .await?
                .execute(
                    runtime_id,
                    &command,
                    self.config.build_timeout(),
                    Some(&log_path),
                )
                .await?;

            if !progress.output.success {
                return Err(ExecutorError::UpstreamFailure(format!(
                    "build commands of runtime {runtime_id} exited with a non-zero status"
                )));
            }
        }

        if let Some(destination) = &request.destination {
            let artifact = builds_dir.join(BUILD_ARTIFACT_FILENAME);
            if !fs::try_exists(&artifact).await? {
                return Err(ExecutorError::UpstreamFailure(format!(
                    "build artifact not found at {}",
                    artifact.display()
                )));
            }

            let path = format!(
                "{}/{}",
                destination.trim_end_matches('/'),
                utils::generate_artifact_name("tar.gz")
            );
            progress.output_path = Some(self.destination_storage.upload(&artifact, &path).await?);
        }

        Ok(())
    }

    /// Describes the container of a runtime.
    fn run_options(
        &self,
        request: &CreateRuntimeRequest,
        hostname: &str,
        secret: &str,
        work_dir: &Path,
    ) -> RunOptions {
        let mut env = request.vars.clone();
        env.insert(RUNTIME_SECRET_ENV.to_string(), secret.to_string());
        env.insert(
            RUNTIME_ENTRYPOINT_ENV.to_string(),
            request.entrypoint.clone(),
        );

        let labels = BTreeMap::from([
            (LABEL_TYPE.to_string(), LABEL_TYPE_RUNTIME.to_string()),
            (LABEL_RUNTIME_ID.to_string(), request.runtime_id.clone()),
            (
                LABEL_CREATED.to_string(),
                utils::now_timestamp().to_string(),
            ),
            (LABEL_RUNTIME.to_string(), request.runtime.clone()),
        ]);

        // Keep the container alive so build commands can be run inside it.
        let command = if request.commands.is_empty() {
            vec![]
        } else {
            vec!["tail".into(), "-f".into(), "/dev/null".into()]
        };

        let volumes = vec![
            format!(
                "{}:{CONTAINER_SOURCE_PATH}:rw",
                work_dir.join(SOURCE_SUBDIR).display()
            ),
            format!(
                "{}:{CONTAINER_BUILDS_PATH}:rw",
                work_dir.join(BUILDS_SUBDIR).display()
            ),
        ];

        let options = RunOptions::builder()
            .image(request.base_image.as_str())
            .name(request.runtime_id.as_str())
            .hostname(hostname)
            .cpus(*self.config.get_cpus())
            .memory_mib(*self.config.get_memory_mib())
            .swap_mib(*self.config.get_swap_mib())
            .env(env)
            .labels(labels)
            .command(command)
            .volumes(volumes);

        match &request.workdir {
            Some(workdir) => options.workdir(workdir.as_str()).build(),
            None => options.build(),
        }
    }
}
