use std::fmt;

/// Result alias that carries the custom [`PreviewError`] type.
pub type Result<T> = std::result::Result<T, PreviewError>;

/// Step of a capture transaction that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Override,
    Render,
    Readback,
    Encode,
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureStage::Override => "override",
            CaptureStage::Render => "render",
            CaptureStage::Readback => "readback",
            CaptureStage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// Free-form message for failures that do not deserve their own variant.
    #[error("{0}")]
    Message(String),
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("parameter `{0}` is already declared")]
    DuplicateParameter(String),
    /// A value that cannot be coerced into the parameter's kind. Values that
    /// are merely out of range are clamped instead and never end up here.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("scene node `{0}` does not exist")]
    UnknownNode(String),
    /// Another capture transaction currently owns the renderer.
    #[error("a capture is already in progress")]
    CaptureBusy,
    /// Rendering, readback or encoding failed. Renderer state has already been
    /// restored by the time this error reaches the caller.
    #[error("capture failed during {stage}: {source}")]
    CaptureFailure {
        stage: CaptureStage,
        #[source]
        source: Box<PreviewError>,
    },
    #[error("asset `{path}` is unavailable: {reason}")]
    AssetUnavailable { path: String, reason: String },
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

impl PreviewError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Wraps `source` as a failure of the given capture stage. Errors that
    /// already describe a capture failure are passed through untouched.
    pub fn capture(stage: CaptureStage, source: PreviewError) -> Self {
        match source {
            err @ PreviewError::CaptureFailure { .. } => err,
            other => Self::CaptureFailure {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, PreviewError::CaptureBusy)
    }
}

impl From<&str> for PreviewError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PreviewError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
