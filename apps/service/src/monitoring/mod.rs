/// Monitoring module - everything between a target list and the results channel
///
/// - `checker`: the network seam (`Transport`) and its reqwest implementation
/// - `executor`: the `Prober`, routing, proxy checks and retries
/// - `retry`: exponential backoff policy
/// - `scheduler`: periodic fan-out of probe tasks
/// - `validation`: target and timing sanity checks used by the config loader
pub mod checker;
pub mod executor;
pub mod retry;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{HttpTransport, Timeouts, Transport};
pub use executor::{Prober, ProxySettings};
pub use retry::RetryPolicy;
pub use scheduler::Scheduler;
pub use types::{ProbeResult, Target};
