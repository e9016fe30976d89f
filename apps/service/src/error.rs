use thiserror::Error;

/// Why a single probe did not count as healthy.
///
/// Probe errors travel as data inside a [`ProbeResult`](crate::monitoring::ProbeResult),
/// so they hold rendered messages rather than source errors and stay `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("invalid target url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("error building http client: {0}")]
    ClientBuild(String),
    #[error("{0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("tor SOCKS proxy not available at {proxy}: {reason}")]
    ProxyUnavailable { proxy: String, reason: String },
    #[error("service unavailable (HTTP 503)")]
    ServiceUnavailable,
    #[error("max attempts reached ({attempts}), last error: {last}")]
    MaxAttemptsReached { attempts: u32, last: Box<ProbeError> },
}

impl ProbeError {
    /// Map a transport failure from reqwest, keeping timeouts distinct.
    pub fn from_reqwest(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Transport(error_chain(&err))
        }
    }
}

/// Failure of a best-effort sink call. Never crosses into the prober or tracker.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{0} not initialized")]
    NotInitialized(&'static str),
    #[error("error sending request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("sink rejected request, status: {status}, response: {body}")]
    Rejected { status: u16, body: String },
    #[error("error encoding payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Render an error together with its sources, `a: b: c`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
