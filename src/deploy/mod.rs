//! Remote function deployment.

pub mod auth;
pub mod error;
pub mod gcf;
pub mod orchestrator;
pub mod platform;

pub use error::DeployError;
pub use orchestrator::{DeploySettings, Deployer, Orchestrator, TokioSleeper};
