use std::{error::Error as StdError, io, time::Duration};

use serde_json::json;
use tokio::time::Instant;

use crate::{
    config::{PENDING_WAIT_ATTEMPTS, PENDING_WAIT_INTERVAL_MS, READY_RETRY_INTERVAL_MS},
    runtime::RuntimeRecord,
    utils, ExecutorError, ExecutorResult,
};

use super::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, Orchestrator, RUNTIME_SECRET_HEADER,
};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Orchestrator {
    /// Invokes the function inside the runtime `request.runtime_id`.
    ///
    /// Waits briefly for a `pending` runtime to come up, then posts the payload to the runtime's
    /// HTTP server. Connections the runtime refuses are retried a few times, since its server may
    /// not be listening yet. The runtime's activity clock is refreshed whatever the outcome.
    pub async fn create_execution(
        &self,
        request: ExecutionRequest,
    ) -> ExecutorResult<ExecutionResult> {
        let runtime_id = request.runtime_id.as_str();
        let record = self
            .registry
            .wait_until_ready(
                runtime_id,
                PENDING_WAIT_ATTEMPTS,
                Duration::from_millis(PENDING_WAIT_INTERVAL_MS),
            )
            .await?;

        let result = self.invoke(&record, &request).await;
        self.registry.touch(runtime_id);

        match &result {
            Ok(r) => tracing::debug!(
                "executed runtime {runtime_id}: {} in {:.3}s",
                r.status_code,
                r.time
            ),
            Err(e) => tracing::warn!("failed to execute runtime {runtime_id}: {e}"),
        }

        result
    }

    async fn invoke(
        &self,
        record: &RuntimeRecord,
        request: &ExecutionRequest,
    ) -> ExecutorResult<ExecutionResult> {
        let runtime_id = record.get_name();
        if record.get_secret().is_empty() {
            return Err(ExecutorError::UpstreamFailure(format!(
                "runtime {runtime_id} has no secret, recreate it"
            )));
        }

        let timeout = request
            .timeout
            .unwrap_or(*self.config.get_function_timeout_secs());
        let url = format!(
            "http://{}:{}/",
            record.get_hostname(),
            self.config.get_runtime_port()
        );
        let body = json!({
            "env": request.vars,
            "payload": request.data,
            "timeout": timeout,
        });

        let (http, url, body, secret) = (&self.http, &url, &body, record.get_secret());
        let started = Instant::now();
        let response = utils::retry_fixed(
            *self.config.get_execution_ready_retries(),
            Duration::from_millis(READY_RETRY_INTERVAL_MS),
            |e| matches!(e, ExecutorError::NotReady(_)),
            move || async move {
                http.post(url)
                    .header(RUNTIME_SECRET_HEADER, secret)
                    .timeout(Duration::from_secs(timeout))
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| classify_transport_error(e, runtime_id))
            },
        )
        .await?;

        let status_code = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, runtime_id))?;
        let text = utils::truncate_output(text);
        let time = started.elapsed().as_secs_f64();

        let (status, response, stderr) = match status_code {
            500..=u16::MAX => (ExecutionStatus::Failed, String::new(), text),
            100..=499 => (ExecutionStatus::Completed, text, String::new()),
            _ => (
                ExecutionStatus::Failed,
                String::new(),
                format!("runtime answered with unexpected status {status_code}"),
            ),
        };

        Ok(ExecutionResult {
            status,
            status_code,
            response,
            stderr,
            time,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn classify_transport_error(error: reqwest::Error, runtime_id: &str) -> ExecutorError {
    if is_connection_refused(&error) {
        ExecutorError::NotReady(runtime_id.to_string())
    } else if error.is_timeout() {
        ExecutorError::Timeout(format!("execution of runtime {runtime_id}"))
    } else {
        ExecutorError::UpstreamFailure(format!("failed to reach runtime {runtime_id}: {error}"))
    }
}

/// Whether `error` was caused by the peer refusing the connection.
fn is_connection_refused(error: &reqwest::Error) -> bool {
    if !error.is_connect() {
        return false;
    }

    let mut source = error.source();
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            return io.kind() == io::ErrorKind::ConnectionRefused;
        }
        source = e.source();
    }

    false
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
