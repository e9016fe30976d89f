use std::collections::HashMap;
use std::fmt;

use tokio::sync::Mutex;

/// A state change worth notifying about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// UP -> DOWN
    WentDown,
    /// DOWN -> UP
    Recovered,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::WentDown => write!(f, "up -> down"),
            Transition::Recovered => write!(f, "down -> up"),
        }
    }
}

/// Known up/down state per URL.
///
/// A URL without an entry is up. Entries are created on the first failure and
/// never removed.
#[derive(Debug, Default)]
pub struct StatusTracker {
    down: Mutex<HashMap<String, bool>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and return the transition it caused, if any.
    ///
    /// The read-decide-write sequence runs under a single lock, so concurrent
    /// observations for the same URL yield each transition exactly once.
    pub async fn observe(&self, url: &str, failed: bool) -> Option<Transition> {
        let mut down = self.down.lock().await;
        let was_down = down.get(url).copied().unwrap_or(false);

        match (was_down, failed) {
            (false, true) => {
                down.insert(url.to_string(), true);
                Some(Transition::WentDown)
            }
            (true, false) => {
                down.insert(url.to_string(), false);
                Some(Transition::Recovered)
            }
            _ => None,
        }
    }

    #[cfg(test)]
    pub async fn is_down(&self, url: &str) -> bool {
        self.down.lock().await.get(url).copied().unwrap_or(false)
    }

    /// URLs currently marked down, sorted.
    pub async fn down_targets(&self) -> Vec<String> {
        let down = self.down.lock().await;
        let mut urls: Vec<String> =
            down.iter().filter(|(_, is_down)| **is_down).map(|(url, _)| url.clone()).collect();
        urls.sort();
        urls
    }
}
