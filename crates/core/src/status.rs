//! Stable status codes and append outcomes used across the ingestion API
//! boundary. These values are part of the public contract: front ends on
//! either side of this crate key their behavior off them, so variants are
//! additive only.

use serde::{Deserialize, Serialize};

/// Status codes returned by session and registry operations.
///
/// Client errors (`BadArg`, `LateWrite`, `NotFound`) are returned as-is to
/// callers. Transient conditions (`Busy`, `Retry`, `Timeout`) are internal
/// signals: `Busy` never escapes the registry (it triggers broadcast), and
/// `Retry`/`Timeout` are only ever produced by `wait_for_sync_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Busy,
    NotFound,
    Timeout,
    Retry,
    Closed,
    BadArg,
    LateWrite,
}

/// Outcome of an `ExtentList::append` call, reported up through the
/// session and registry layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppendOutcome {
    Ok,
    OkFlushNeeded,
    FailLateWrite,
    FailBadId,
}

impl AppendOutcome {
    /// Maps an append outcome to the `Status` a session returns to its
    /// caller. `OkFlushNeeded` collapses to `Ok` here — handling the flush
    /// signal (fetching roots, forwarding to `update_rescue_points`) is the
    /// session's job before this conversion happens.
    pub fn to_status(self) -> Status {
        match self {
            AppendOutcome::Ok | AppendOutcome::OkFlushNeeded => Status::Ok,
            AppendOutcome::FailLateWrite => Status::LateWrite,
            AppendOutcome::FailBadId => Status::NotFound,
        }
    }
}
