use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One-way progress update from a running body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    /// Fraction complete in `0.0..=1.0`, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
}

impl Notification {
    #[must_use]
    pub fn new(message: impl Into<String>, progress: Option<f32>) -> Self {
        Self {
            message: message.into(),
            progress: progress.map(|p| p.clamp(0.0, 1.0)),
        }
    }
}
