//! Error taxonomy for the ingestion core.
//!
//! Internal code propagates `Result<T, IngestError>` with `?`; the public
//! session API additionally converts to the stable `Status` codes callers
//! on the other side of the API boundary key their behavior off (see
//! `From<IngestError> for Status`).

use thiserror::Error;

use crate::Status;

/// Client-facing and lifecycle errors produced by the registry and
/// session layers. Transient conditions (`BUSY`, `RETRY`, `TIMEOUT`) are
/// handled internally and never constructed as an `IngestError` — they
/// are intermediate `Status` values only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The sample's payload kind is not `FLOAT`, or another argument is
    /// malformed.
    #[error("bad argument: {message}")]
    BadArg { message: String },

    /// The series id is not known to the registry.
    #[error("series id not found")]
    NotFound,

    /// The extent list rejected the sample because its timestamp is
    /// older than the series' durable watermark.
    #[error("late write rejected by extent list")]
    LateWrite,

    /// The registry has been torn down; the session must stop accepting
    /// writes.
    #[error("registry closed")]
    Closed,

    /// The external name normalizer rejected the raw series name.
    #[error("invalid series name: {message}")]
    InvalidName { message: String },

    /// The destination buffer passed to `get_series_name` was too small.
    /// Carries the required length so callers can retry with a bigger
    /// buffer, matching the `-len` return convention at the FFI-style
    /// boundary.
    #[error("buffer too small: need {required} bytes")]
    BufferTooSmall { required: usize },
}

impl From<&IngestError> for Status {
    fn from(err: &IngestError) -> Self {
        match err {
            IngestError::BadArg { .. } => Status::BadArg,
            IngestError::NotFound => Status::NotFound,
            IngestError::LateWrite => Status::LateWrite,
            IngestError::Closed => Status::Closed,
            IngestError::InvalidName { .. } => Status::BadArg,
            IngestError::BufferTooSmall { .. } => Status::BadArg,
        }
    }
}

impl From<IngestError> for Status {
    fn from(err: IngestError) -> Self {
        Status::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
