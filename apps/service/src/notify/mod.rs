pub mod notifier;
pub mod tracker;

pub use notifier::Notifier;
pub use tracker::{StatusTracker, Transition};
