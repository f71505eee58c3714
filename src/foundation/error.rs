/// Result type used across the crate.
pub type AnimResult<T> = Result<T, AnimError>;

/// Top-level error type for the frame cache and preparation pipeline.
///
/// Failures inside background preparation jobs never surface as `AnimError` to the submitter; they
/// are logged and the frame is simply not cached. This type covers the synchronous edges:
/// allocation, rendering into a buffer, configuration, and scheduler construction.
#[derive(thiserror::Error, Debug)]
pub enum AnimError {
    /// Invalid argument or state.
    #[error("validation error: {0}")]
    Validation(String),

    /// A bitmap buffer could not be allocated.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// A frame could not be rendered into its buffer.
    #[error("render error: {0}")]
    Render(String),

    /// Worker pool or timer could not be created or accept work.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnimError {
    /// Build an [`AnimError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build an [`AnimError::Allocation`].
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build an [`AnimError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build an [`AnimError::Scheduler`].
    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Build an [`AnimError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
