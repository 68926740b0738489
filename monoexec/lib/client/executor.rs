use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::{header, Client, RequestBuilder, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

use crate::{
    config::{
        DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_FUNCTION_TIMEOUT_SECS,
        DEFAULT_LOG_STREAM_TIMEOUT_SECS,
    },
    orchestration::{BuildResult, CreateRuntimeRequest, ExecutionRequest, ExecutionResult},
    runtime::RuntimeRecord,
    server::{ErrorResponse, HealthResponse},
    ExecutorError, ExecutorResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Header naming the runtime a request concerns, so a gateway can route it.
pub const RUNTIME_ID_HEADER: &str = "x-opr-runtime-id";

/// Header selecting how a gateway addresses the executor fleet.
pub const ADDRESSING_METHOD_HEADER: &str = "x-opr-addressing-method";

/// Value of [`ADDRESSING_METHOD_HEADER`] that reaches every executor replica.
pub const ADDRESSING_METHOD_BROADCAST: &str = "broadcast";

/// Default time added to the remote bound of a call before the local request gives up.
const DEFAULT_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

/// Time allowed for calls with no remote bound.
const SHORT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A client of an executor's control API.
///
/// Creates and executions are sent once; the idempotent calls (reads, deletes and log streams)
/// are retried on transient transport failures.
#[derive(Debug, Clone)]
pub struct ExecutorClient {
    /// The base URL of the executor, without a trailing slash.
    endpoint: String,

    /// The shared secret sent as a bearer token.
    secret: String,

    /// The client used for calls that must not be repeated.
    client: Client,

    /// The client used for idempotent calls.
    retrying: ClientWithMiddleware,

    /// The time a build may take on the executor.
    build_timeout: Duration,

    /// The time added to the remote bound of a call before the local request gives up.
    timeout_margin: Duration,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExecutorClient {
    /// Creates a client of the executor at `endpoint`, e.g. `http://executor:3456`.
    pub fn new(endpoint: impl Into<String>, secret: impl Into<String>) -> Self {
        let client = Client::new();
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let retrying = ClientBuilder::new(client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
            client,
            retrying,
            build_timeout: Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS),
            timeout_margin: DEFAULT_TIMEOUT_MARGIN,
        }
    }

    /// Sets the time a build may take on the executor.
    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = timeout;
        self
    }

    /// Sets the time added to the remote bound of a call before the local request gives up with
    /// [`ExecutorError::SyncTimeout`].
    pub fn with_timeout_margin(mut self, margin: Duration) -> Self {
        self.timeout_margin = margin;
        self
    }

    /// Creates (and builds) a runtime. Waits for the build to finish.
    pub async fn create_runtime(
        &self,
        request: &CreateRuntimeRequest,
    ) -> ExecutorResult<BuildResult> {
        let response = self
            .authorized(self.client.post(self.url("/v1/runtimes")))
            .header(RUNTIME_ID_HEADER, &request.runtime_id)
            .timeout(self.build_timeout + self.timeout_margin)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, "create runtime"))?;

        json(response, "create runtime").await
    }

    /// Follows the build log of `runtime_id`, handing every chunk to `callback` as it arrives.
    ///
    /// Returns once the executor closes the stream or `timeout` passes.
    pub async fn get_logs(
        &self,
        runtime_id: &str,
        timeout: Option<Duration>,
        mut callback: impl FnMut(Bytes),
    ) -> ExecutorResult<()> {
        let timeout = timeout.unwrap_or(Duration::from_secs(DEFAULT_LOG_STREAM_TIMEOUT_SECS));
        let response = self
            .retrying
            .get(self.url(&format!("/v1/runtimes/{runtime_id}/logs")))
            .bearer_auth(&self.secret)
            .header(RUNTIME_ID_HEADER, runtime_id)
            .query(&[("timeout", timeout.as_secs())])
            .timeout(timeout + self.timeout_margin)
            .send()
            .await
            .map_err(|e| middleware_error(e, "get logs"))?;

        let mut stream = check(response).await?.bytes_stream();
        while let Some(chunk) = stream.next().await {
            callback(chunk.map_err(|e| transport_error(e, "get logs"))?);
        }

        Ok(())
    }

    /// Deletes `runtime_id` on every executor replica.
    pub async fn delete_runtime(&self, runtime_id: &str) -> ExecutorResult<()> {
        let response = self
            .retrying
            .delete(self.url(&format!("/v1/runtimes/{runtime_id}")))
            .bearer_auth(&self.secret)
            .header(RUNTIME_ID_HEADER, runtime_id)
            .header(ADDRESSING_METHOD_HEADER, ADDRESSING_METHOD_BROADCAST)
            .timeout(SHORT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| middleware_error(e, "delete runtime"))?;

        check(response).await?;
        Ok(())
    }

    /// Invokes the function inside a runtime.
    pub async fn create_execution(
        &self,
        request: &ExecutionRequest,
    ) -> ExecutorResult<ExecutionResult> {
        let remote_timeout = request.timeout.unwrap_or(DEFAULT_FUNCTION_TIMEOUT_SECS);
        let response = self
            .authorized(self.client.post(self.url("/v1/execution")))
            .header(RUNTIME_ID_HEADER, &request.runtime_id)
            .timeout(Duration::from_secs(remote_timeout) + self.timeout_margin)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, "create execution"))?;

        json(response, "create execution").await
    }

    /// Returns every runtime the executor knows about.
    pub async fn list_runtimes(&self) -> ExecutorResult<Vec<RuntimeRecord>> {
        let response = self
            .retrying
            .get(self.url("/v1/runtimes"))
            .bearer_auth(&self.secret)
            .timeout(SHORT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| middleware_error(e, "list runtimes"))?;

        json(response, "list runtimes").await
    }

    /// Returns the runtime `runtime_id`.
    pub async fn get_runtime(&self, runtime_id: &str) -> ExecutorResult<RuntimeRecord> {
        let response = self
            .retrying
            .get(self.url(&format!("/v1/runtimes/{runtime_id}")))
            .bearer_auth(&self.secret)
            .header(RUNTIME_ID_HEADER, runtime_id)
            .timeout(SHORT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| middleware_error(e, "get runtime"))?;

        json(response, "get runtime").await
    }

    /// Returns the executor's health.
    pub async fn health(&self) -> ExecutorResult<HealthResponse> {
        let response = self
            .retrying
            .get(self.url("/v1/health"))
            .timeout(SHORT_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| middleware_error(e, "health"))?;

        json(response, "health").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.secret)
            .header(header::ACCEPT, "application/json")
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Turns an error status into [`ExecutorError::Remote`].
async fn check(response: Response) -> ExecutorResult<Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error) => match error.details {
            Some(details) => format!("{}: {}", error.message, details),
            None => error.message,
        },
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body,
    };

    Err(ExecutorError::Remote {
        status: status.as_u16(),
        message,
    })
}

async fn json<T: DeserializeOwned>(response: Response, operation: &str) -> ExecutorResult<T> {
    check(response)
        .await?
        .json()
        .await
        .map_err(|e| transport_error(e, operation))
}

fn transport_error(error: reqwest::Error, operation: &str) -> ExecutorError {
    if error.is_timeout() {
        ExecutorError::SyncTimeout(operation.to_string())
    } else {
        ExecutorError::HttpRequest(error)
    }
}

fn middleware_error(error: reqwest_middleware::Error, operation: &str) -> ExecutorError {
    match error {
        reqwest_middleware::Error::Reqwest(e) => transport_error(e, operation),
        e => ExecutorError::HttpMiddleware(e),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
