pub mod connectors;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod progress;
pub mod state;
