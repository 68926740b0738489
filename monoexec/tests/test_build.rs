mod common;

use std::time::{Duration, Instant};

use common::{FakeEngine, Harness, SOURCE_PATH};
use futures::StreamExt;
use monoexec::{
    orchestration::{BuildStatus, CreateRuntimeRequest, LABEL_RUNTIME_ID, RUNTIME_SECRET_ENV},
    runtime::RuntimeStatus,
    ExecutorError,
};

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_build_brings_runtime_up() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let request = request("r1", vec!["echo hi"]);

    let result = harness.orchestrator.create_runtime(request).await?;
    assert_eq!(result.status, BuildStatus::Ready);
    assert_eq!(result.response, "hi\n");
    assert!(result.duration >= 0.0);
    assert!(result.end_time >= result.start_time);
    assert!((result.duration - (result.end_time - result.start_time)).abs() < 1e-9);
    assert!(result.output_path.is_none());

    let record = harness.orchestrator.get_runtime("r1")?;
    assert!(record.is_up());
    assert!(!record.get_id().is_empty());
    assert!(!record.get_secret().is_empty());
    assert!(record.get_status().to_string().starts_with("Up"));

    let state = harness.engine.state();
    let container = &state.containers["r1"];
    assert_eq!(container.labels[LABEL_RUNTIME_ID], "r1");
    assert_eq!(&container.env[RUNTIME_SECRET_ENV], record.get_secret());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_build_without_commands_skips_exec() -> anyhow::Result<()> {
    let harness = Harness::new().await?;

    let result = harness
        .orchestrator
        .create_runtime(request("r1", vec![]))
        .await?;

    assert!(result.is_ready());
    assert!(result.response.is_empty());
    assert!(harness.orchestrator.get_runtime("r1")?.is_up());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_failed_build_is_recorded_as_error() -> anyhow::Result<()> {
    let harness = Harness::new().await?;

    let error = harness
        .orchestrator
        .create_runtime(request("r1", vec!["echo start", "fail no such package"]))
        .await
        .unwrap_err();

    let result = match error {
        ExecutorError::BuildFailed(result) => result,
        other => panic!("expected a build failure, got {other:?}"),
    };
    assert_eq!(result.status, BuildStatus::Failed);
    assert_eq!(result.stderr, "no such package\n");
    assert_eq!(result.response, "start\n");
    assert!(result.duration >= 0.0);

    let record = harness.orchestrator.get_runtime("r1")?;
    assert_eq!(record.get_status(), &RuntimeStatus::Error);
    assert!(harness.engine.container_names().is_empty());

    // A failed runtime can be created again.
    let result = harness
        .orchestrator
        .create_runtime(request("r1", vec!["echo again"]))
        .await?;
    assert!(result.is_ready());
    assert!(harness.orchestrator.get_runtime("r1")?.is_up());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_missing_source_fails_before_container() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let request = CreateRuntimeRequest::builder()
        .runtime_id("r1")
        .source("functions/missing.tar.gz")
        .base_image("lang:1.0")
        .build();

    let error = harness
        .orchestrator
        .create_runtime(request)
        .await
        .unwrap_err();

    let result = match error {
        ExecutorError::BuildFailed(result) => result,
        other => panic!("expected a build failure, got {other:?}"),
    };
    assert!(result.stderr.contains("functions/missing.tar.gz"));
    assert_eq!(harness.engine.runs(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_ephemeral_build_leaves_nothing_behind() -> anyhow::Result<()> {
    let harness = Harness::new().await?;

    let mut ok = request("r1", vec!["echo hi"]);
    ok.remove = true;
    let result = harness.orchestrator.create_runtime(ok).await?;
    assert!(result.is_ready());

    let mut failing = request("r2", vec!["fail boom"]);
    failing.remove = true;
    let error = harness
        .orchestrator
        .create_runtime(failing)
        .await
        .unwrap_err();
    assert!(matches!(error, ExecutorError::BuildFailed(_)));

    assert!(harness.orchestrator.list_runtimes().is_empty());
    assert!(harness.engine.container_names().is_empty());
    assert!(!harness.work_dir("r1").exists());
    assert!(!harness.work_dir("r2").exists());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_concurrent_creates_admit_one() -> anyhow::Result<()> {
    let engine = FakeEngine::default().with_run_delay(Duration::from_millis(200));
    let harness = Harness::with_engine(engine, |_| {}).await?;

    let (first, second) = tokio::join!(
        harness
            .orchestrator
            .create_runtime(request("dup", vec!["echo one"])),
        harness
            .orchestrator
            .create_runtime(request("dup", vec!["echo two"])),
    );

    let (succeeded, rejected) = match (first, second) {
        (Ok(result), Err(error)) | (Err(error), Ok(result)) => (result, error),
        other => panic!("expected exactly one success, got {other:?}"),
    };
    assert!(succeeded.is_ready());
    assert!(matches!(
        rejected,
        ExecutorError::Transient(_) | ExecutorError::Conflict(_)
    ));
    assert_eq!(harness.engine.runs(), 1);

    // Once up, another create conflicts.
    let error = harness
        .orchestrator
        .create_runtime(request("dup", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(error, ExecutorError::Conflict(_)));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_build_output_is_truncated() -> anyhow::Result<()> {
    let harness = Harness::new().await?;

    let result = harness
        .orchestrator
        .create_runtime(request("r1", vec!["emit 1500000"]))
        .await?;

    assert_eq!(result.response.chars().count(), 1_000_000);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_build_artifact_is_relocated() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let request = CreateRuntimeRequest::builder()
        .runtime_id("r1")
        .source(SOURCE_PATH)
        .destination("builds/r1/")
        .base_image("lang:1.0")
        .commands(vec!["artifact".to_string()])
        .build();

    let result = harness.orchestrator.create_runtime(request).await?;

    let output_path = result.output_path.expect("artifact path");
    assert!(output_path.starts_with("builds/r1/"));
    assert!(output_path.ends_with(".tar.gz"));
    assert!(!output_path.contains("//"));
    assert_eq!(
        tokio::fs::read(harness.storage_root().join(&output_path)).await?,
        b"artifact"
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_missing_artifact_fails_build() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let request = CreateRuntimeRequest::builder()
        .runtime_id("r1")
        .source(SOURCE_PATH)
        .destination("builds/r1")
        .base_image("lang:1.0")
        .commands(vec!["echo nothing".to_string()])
        .build();

    let error = harness
        .orchestrator
        .create_runtime(request)
        .await
        .unwrap_err();

    assert!(matches!(error, ExecutorError::BuildFailed(_)));
    assert_eq!(
        harness.orchestrator.get_runtime("r1")?.get_status(),
        &RuntimeStatus::Error
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_disallowed_image_is_rejected() -> anyhow::Result<()> {
    let harness = Harness::with_config(|config| {
        config.set_images(vec!["lang:1.0".to_string()]);
    })
    .await?;

    let mut request = request("r1", vec![]);
    request.base_image = "other:1.0".to_string();
    let error = harness
        .orchestrator
        .create_runtime(request)
        .await
        .unwrap_err();

    assert!(matches!(error, ExecutorError::InvalidArgument(_)));
    assert!(harness.orchestrator.list_runtimes().is_empty());
    assert_eq!(harness.engine.runs(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_build_logs_are_streamed() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let orchestrator = harness.orchestrator.clone();

    let build = tokio::spawn(async move {
        orchestrator
            .create_runtime(request("r1", vec!["echo one", "sleep 300", "echo two"]))
            .await
    });

    while !harness.orchestrator.registry().contains("r1") {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let chunks: Vec<_> = harness
        .orchestrator
        .stream_logs("r1", Some(Duration::from_secs(10)))?
        .collect()
        .await;

    let mut log = String::new();
    for chunk in chunks {
        log.push_str(std::str::from_utf8(&chunk?)?);
    }
    assert_eq!(log, "one\ntwo\n");

    build.await??;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_logs_of_unknown_runtime() -> anyhow::Result<()> {
    let harness = Harness::new().await?;

    let error = harness.orchestrator.stream_logs("ghost", None).err();
    assert!(matches!(error, Some(ExecutorError::NotFound(_))));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_runtime_id_cannot_escape_work_dir() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let victim = harness.dir.path().join("tmp").join("victim");
    tokio::fs::create_dir_all(&victim).await?;
    tokio::fs::write(victim.join("keep.txt"), b"keep").await?;

    for runtime_id in ["../victim", "..", "a/b", ".hidden"] {
        let mut request = request(runtime_id, vec!["echo hi"]);
        request.remove = true;

        let error = harness
            .orchestrator
            .create_runtime(request)
            .await
            .unwrap_err();
        assert!(
            matches!(error, ExecutorError::InvalidArgument(_)),
            "{runtime_id}: {error:?}"
        );
    }

    assert!(victim.join("keep.txt").exists());
    assert!(harness.orchestrator.list_runtimes().is_empty());
    assert_eq!(harness.engine.runs(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_abandoned_create_still_settles_runtime() -> anyhow::Result<()> {
    let engine = FakeEngine::default().with_run_delay(Duration::from_millis(300));
    let harness = Harness::with_engine(engine, |_| {}).await?;

    let mut ephemeral = request("eph", vec!["echo hi"]);
    ephemeral.remove = true;
    let create = tokio::spawn({
        let orchestrator = harness.orchestrator.clone();
        async move { orchestrator.create_runtime(ephemeral).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    create.abort();
    let _ = create.await;

    let deadline = Instant::now() + Duration::from_secs(3);
    while harness.orchestrator.registry().contains("eph") {
        assert!(Instant::now() < deadline, "runtime stayed registered");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(harness.engine.container_names().is_empty());
    assert!(!harness.work_dir("eph").exists());

    let result = harness
        .orchestrator
        .create_runtime(request("eph", vec![]))
        .await?;
    assert!(result.is_ready());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_replaced_runtime_starts_a_fresh_log() -> anyhow::Result<()> {
    let harness = Harness::new().await?;

    let error = harness
        .orchestrator
        .create_runtime(request("r1", vec!["echo first", "fail broken"]))
        .await
        .unwrap_err();
    assert!(matches!(error, ExecutorError::BuildFailed(_)));

    harness
        .orchestrator
        .create_runtime(request("r1", vec!["echo second"]))
        .await?;

    let chunks: Vec<_> = harness
        .orchestrator
        .stream_logs("r1", Some(Duration::from_secs(5)))?
        .collect()
        .await;

    let mut log = String::new();
    for chunk in chunks {
        log.push_str(std::str::from_utf8(&chunk?)?);
    }
    assert_eq!(log, "second\n");
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn request(runtime_id: &str, commands: Vec<&str>) -> CreateRuntimeRequest {
    CreateRuntimeRequest::builder()
        .runtime_id(runtime_id)
        .source(SOURCE_PATH)
        .base_image("lang:1.0")
        .commands(commands.into_iter().map(String::from).collect())
        .build()
}
