/// Convenience result type used across storyreel.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level error taxonomy surfaced by every pipeline stage.
///
/// Stage errors are never retried internally; the orchestrator maps any of them to the `Failed`
/// state after tearing down the asset store.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The source document could not be turned into narration text.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Narration synthesis failed or produced no audio.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Invalid configuration or missing required inputs.
    #[error("config error: {0}")]
    Config(String),

    /// Speed-segment overrides are malformed, overlap, or run past the video.
    #[error("speed-segment configuration error: {0}")]
    SpeedSegments(String),

    /// A layer referenced an unusable asset while compositing.
    #[error("composition error: {0}")]
    Composition(String),

    /// Temporary storage backing the asset store is unavailable.
    #[error("storage error: {0}")]
    Storage(String),

    /// The final encode did not complete.
    #[error("render error: {0}")]
    Render(String),

    /// The run was cancelled at a stage boundary.
    #[error("cancelled before {0}")]
    Cancelled(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Build a [`PipelineError::Extraction`] value.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Build a [`PipelineError::Synthesis`] value.
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Build a [`PipelineError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`PipelineError::SpeedSegments`] value.
    pub fn speed_segments(msg: impl Into<String>) -> Self {
        Self::SpeedSegments(msg.into())
    }

    /// Build a [`PipelineError::Composition`] value.
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Build a [`PipelineError::Storage`] value.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Build a [`PipelineError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Classify the error into the correction the user has to make.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Extraction(_) => FailureReason::NoUsableText,
            Self::Synthesis(_) => FailureReason::ZeroDurationNarration,
            Self::SpeedSegments(_) => FailureReason::InvalidSpeedSegments,
            Self::Config(_) => FailureReason::InvalidConfig,
            Self::Composition(_) => FailureReason::Composition,
            Self::Storage(_) => FailureReason::Storage,
            Self::Render(_) | Self::Other(_) => FailureReason::EncodeFailure,
            Self::Cancelled(_) => FailureReason::Cancelled,
        }
    }
}

/// User-facing failure category, distinct per required correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// Neither the document nor a fallback text produced narration text.
    NoUsableText,
    /// Text-to-speech returned nothing playable.
    ZeroDurationNarration,
    /// Segment speed overrides overlap or fall outside the video.
    InvalidSpeedSegments,
    /// Any other rejected configuration value.
    InvalidConfig,
    /// Internal compositing failure.
    Composition,
    /// Scratch storage unavailable.
    Storage,
    /// The encoder failed.
    EncodeFailure,
    /// The caller cancelled the run.
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoUsableText => "no usable input text",
            Self::ZeroDurationNarration => "zero-duration narration",
            Self::InvalidSpeedSegments => "invalid speed-segment configuration",
            Self::InvalidConfig => "invalid configuration",
            Self::Composition => "composition failure",
            Self::Storage => "temporary storage unavailable",
            Self::EncodeFailure => "encode failure",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
