//! Transport - The network seam of the loader.
//!
//! A transport fetches one URL and must give up with [`FetchError::Canceled`]
//! once the token fires. [`HttpTransport`] runs a blocking `ureq` request on
//! tokio's blocking pool and races it against the token; a canceled request's
//! thread finishes on its own and its result is dropped.

use std::io::{self, Read};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::FetchError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches resource payloads by URL.
#[async_trait(?Send)]
pub trait Transport {
    async fn fetch(&self, url: &str, cancel: CancellationToken) -> Result<Vec<u8>, FetchError>;
}

// =============================================================================
// HttpTransport
// =============================================================================

/// HTTP(S) transport over a shared `ureq` agent.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    max_bytes: usize,
}

impl HttpTransport {
    /// Transport rejecting bodies over `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();
        Self { agent, max_bytes }
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, cancel: CancellationToken) -> Result<Vec<u8>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Canceled);
        }
        let agent = self.agent.clone();
        let target = url.to_owned();
        let max_bytes = self.max_bytes;
        let request = tokio::task::spawn_blocking(move || blocking_get(&agent, &target, max_bytes));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!(url, "request abandoned");
                Err(FetchError::Canceled)
            }
            joined = request => joined.unwrap_or_else(|err| {
                Err(FetchError::Network {
                    url: url.to_owned(),
                    message: err.to_string(),
                })
            }),
        }
    }
}

fn blocking_get(agent: &ureq::Agent, url: &str, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status,
            });
        }
        Err(err) => {
            return Err(FetchError::Network {
                url: url.to_owned(),
                message: err.to_string(),
            });
        }
    };
    read_limited(response, max_bytes).map_err(|err| FetchError::Network {
        url: url.to_owned(),
        message: err.to_string(),
    })
}

/// Read the body, refusing anything over `max_bytes`.
fn read_limited(response: ureq::Response, max_bytes: usize) -> Result<Vec<u8>, io::Error> {
    let declared = response
        .header("Content-Length")
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > max_bytes as u64) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("response too large: {declared:?} bytes"),
        ));
    }
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("response exceeded {max_bytes} bytes"),
        ));
    }
    Ok(bytes)
}
