//! Canonical series name: the byte sequence produced by the external
//! normalizer. Equality of this type defines series identity; names are
//! never renamed or deleted once registered, so a session's local cache
//! of them never needs to be invalidated.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalName(Box<[u8]>);

impl CanonicalName {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[u8]> for CanonicalName {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "CanonicalName({s:?})"),
            Err(_) => write!(f, "CanonicalName({:?})", self.0),
        }
    }
}

impl From<&[u8]> for CanonicalName {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl From<Vec<u8>> for CanonicalName {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}
