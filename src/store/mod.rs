//! External state: session directory and stats persistence

pub mod sessions;
pub mod stats;

pub use sessions::{Session, SessionRegistry};
pub use stats::StatsStore;
