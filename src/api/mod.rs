pub mod clarify;
pub mod health;
pub mod job;
pub mod validation;

/// Knobs for the HTTP handlers
#[derive(Debug, Clone, Copy)]
pub struct ApiSettings {
    /// Spawn one dispatcher run after each submission
    pub trigger_on_submit: bool,
}
