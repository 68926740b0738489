use std::{future::Future, time::Duration};

use tokio::time;

use crate::{ExecutorError, ExecutorResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs `operation` up to `attempts` times, sleeping `interval` between attempts, for as long
/// as it fails with an error `retry_if` accepts. The last error is returned when attempts run out.
pub async fn retry_fixed<T, F, Fut>(
    attempts: u32,
    interval: Duration,
    retry_if: impl Fn(&ExecutorError) -> bool,
    mut operation: F,
) -> ExecutorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExecutorResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(e) if attempt < attempts && retry_if(&e) => {
                tracing::debug!("attempt {attempt}/{attempts} failed, retrying: {e}");
                attempt += 1;
                time::sleep(interval).await;
            }
            result => return result,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_retry_fixed_stops_on_success() -> anyhow::Result<()> {
        let calls = AtomicU32::new(0);
        let value = retry_fixed(5, Duration::from_millis(1), ExecutorError::is_transient, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExecutorError::NotReady("r1".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await?;

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_fixed_gives_up() {
        let calls = AtomicU32::new(0);
        let result: ExecutorResult<()> =
            retry_fixed(3, Duration::from_millis(1), ExecutorError::is_transient, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExecutorError::NotReady("r1".into())) }
            })
            .await;

        assert!(matches!(result, Err(ExecutorError::NotReady(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_fixed_skips_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: ExecutorResult<()> =
            retry_fixed(3, Duration::from_millis(1), ExecutorError::is_transient, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExecutorError::NotFound("r1".into())) }
            })
            .await;

        assert!(matches!(result, Err(ExecutorError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
