use std::{io::SeekFrom, path::Path, pin::Pin, time::Duration};

use bytes::Bytes;
use futures::Stream;
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt},
    time::{self, Instant},
};

use crate::{utils, ExecutorError, ExecutorResult};

use super::Orchestrator;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const LOG_POLL_INTERVAL: Duration = Duration::from_millis(100);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A stream of build log chunks.
pub type LogStream = Pin<Box<dyn Stream<Item = ExecutorResult<Bytes>> + Send>>;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Orchestrator {
    /// Follows the build log of `runtime_id`.
    ///
    /// Chunks are yielded as the build writes them. The stream ends once the runtime has left
    /// `pending` and the log is drained, when the runtime is forgotten, or after `timeout`
    /// (the configured log stream timeout when `None`).
    pub fn stream_logs(
        &self,
        runtime_id: &str,
        timeout: Option<Duration>,
    ) -> ExecutorResult<LogStream> {
        if !self.registry.contains(runtime_id) {
            return Err(ExecutorError::NotFound(runtime_id.to_string()));
        }

        let registry = self.registry.clone();
        let runtime_id = runtime_id.to_string();
        let log_path = utils::build_log_path(self.config.get_temp_dir(), &runtime_id);
        let deadline = Instant::now() + timeout.unwrap_or_else(|| self.config.log_stream_timeout());

        let stream = async_stream::stream! {
            let mut offset = 0;
            let mut interval = time::interval(LOG_POLL_INTERVAL);

            loop {
                interval.tick().await;

                // Checked before reading, so the last chunk is never skipped.
                let finished = registry
                    .get(&runtime_id)
                    .map_or(true, |record| !record.is_pending());

                match read_from(&log_path, offset).await {
                    Ok(Some(chunk)) => {
                        offset += chunk.len() as u64;
                        yield Ok(Bytes::from(chunk));
                    }
                    Ok(None) if finished => break,
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }

                if Instant::now() >= deadline {
                    tracing::debug!("log stream of runtime {runtime_id} timed out");
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads whatever `path` holds past `offset`. `None` if there is nothing new or no file yet.
async fn read_from(path: &Path, offset: u64) -> ExecutorResult<Option<Vec<u8>>> {
    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if file.metadata().await?.len() <= offset {
        return Ok(None);
    }

    file.seek(SeekFrom::Start(offset)).await?;
    let mut chunk = Vec::new();
    file.read_to_end(&mut chunk).await?;

    Ok(Some(chunk).filter(|c| !c.is_empty()))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_from_offsets() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("build.log");

        assert!(read_from(&path, 0).await?.is_none());

        fs::write(&path, b"step 1\n").await?;
        assert_eq!(read_from(&path, 0).await?.as_deref(), Some(&b"step 1\n"[..]));
        assert!(read_from(&path, 7).await?.is_none());

        fs::write(&path, b"step 1\nstep 2\n").await?;
        assert_eq!(read_from(&path, 7).await?.as_deref(), Some(&b"step 2\n"[..]));
        Ok(())
    }
}
