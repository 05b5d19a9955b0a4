pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use algorithms::{AlsTrainer, CancellationToken, MISSING};
pub use config::{Config, TrainingConfig};
pub use error::{AlsError, Axis, Result};
pub use models::*;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
