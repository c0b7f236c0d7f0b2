//! Core types shared by every crate in the tsingest ingestion registry:
//! series identifiers, the canonical-name newtype, the sample wire shape,
//! stable status codes, and the error taxonomy.

mod error;
mod name;
mod sample;
mod status;

pub use error::{IngestError, Result};
pub use name::CanonicalName;
pub use sample::{Payload, Sample};
pub use status::{AppendOutcome, Status};

/// Series identifier: nonzero, globally unique within a database
/// lifetime, never reused. `0` is reserved as "no match".
pub type Id = u64;

/// Reserved id meaning "no match".
pub const NO_MATCH_ID: Id = 0;

/// Opaque content address of a block in the block store.
pub type Addr = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_outcome_maps_to_status() {
        assert_eq!(AppendOutcome::Ok.to_status(), Status::Ok);
        assert_eq!(AppendOutcome::OkFlushNeeded.to_status(), Status::Ok);
        assert_eq!(AppendOutcome::FailLateWrite.to_status(), Status::LateWrite);
        assert_eq!(AppendOutcome::FailBadId.to_status(), Status::NotFound);
    }

    #[test]
    fn canonical_name_equality_is_byte_equality() {
        let a = CanonicalName::from(b"cpu|host=a".to_vec());
        let b = CanonicalName::from(b"cpu|host=a".to_vec());
        let c = CanonicalName::from(b"cpu|host=b".to_vec());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            Status::from(IngestError::BadArg {
                message: "x".into()
            }),
            Status::BadArg
        );
        assert_eq!(Status::from(IngestError::NotFound), Status::NotFound);
        assert_eq!(Status::from(IngestError::LateWrite), Status::LateWrite);
        assert_eq!(Status::from(IngestError::Closed), Status::Closed);
    }
}
