//! Wire sample shape: `{ id, timestamp, payload }`.

use serde::{Deserialize, Serialize};

use crate::Id;

/// A sample's payload. The core only accepts `Float`; any other kind is
/// rejected with `Status::BadArg` before it ever reaches an extent list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Float(f64),
    /// Placeholder for payload kinds the ingestion core does not accept.
    /// Front ends map unsupported wire kinds to this so `Session::write`
    /// can reject them uniformly.
    Unsupported,
}

impl Payload {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Payload::Float(v) => Some(*v),
            Payload::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Id,
    pub timestamp: i64,
    pub payload: Payload,
}

impl Sample {
    pub fn new(id: Id, timestamp: i64, value: f64) -> Self {
        Self {
            id,
            timestamp,
            payload: Payload::Float(value),
        }
    }
}
