/// Convenience result type used across animframe.
pub type AnimResult<T> = Result<T, AnimError>;

/// Top-level error taxonomy used by animframe APIs.
///
/// The draw path never surfaces these to its caller: failures there turn into a fallback stage or
/// a dropped frame. They surface from construction, decoding and compositing entry points.
#[derive(thiserror::Error, Debug)]
pub enum AnimError {
    /// Invalid caller-provided data (dimensions, frame metadata, options).
    #[error("validation error: {0}")]
    Validation(String),

    /// The decoder could not produce frame data.
    #[error("decode error: {0}")]
    Decode(String),

    /// Rendering or compositing a frame failed.
    #[error("render error: {0}")]
    Render(String),

    /// A pixel buffer could not be allocated.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// Errors when serializing or deserializing options.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A frame index outside `[0, frame_count)`.
    #[error("frame {frame} out of range (frame count {frame_count})")]
    FrameOutOfRange {
        /// Requested frame.
        frame: usize,
        /// Frame count of the image.
        frame_count: usize,
    },

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnimError {
    /// Build an [`AnimError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build an [`AnimError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build an [`AnimError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build an [`AnimError::Allocation`] value.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build an [`AnimError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
