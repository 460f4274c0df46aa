use thiserror::Error;

/// Errors raised while decoding wire data of either protocol generation.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("frame header must be {expected} bytes, got {actual}")]
    ShortHeader { expected: usize, actual: usize },

    #[error("invalid frame header: {0}")]
    Header(#[from] bincode::Error),

    #[error("invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid session key: {0}")]
    SessionKey(#[from] base64::DecodeError),

    #[error("indexed list declares a non-numeric count: {0:?}")]
    BadCount(String),

    #[error("malformed {what}: {input:?}")]
    Malformed { what: &'static str, input: String },
}

impl FrameError {
    pub fn malformed(what: &'static str, input: impl Into<String>) -> Self {
        FrameError::Malformed {
            what,
            input: input.into(),
        }
    }
}
