//! Path identifiers.

use rand::RngCore;
use std::fmt;
use thiserror::Error;

/// Length of a path identifier in bytes.
pub const PATH_ID_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path id length: expected 16, got {0}")]
pub struct InvalidPathId(pub usize);

/// 128-bit opaque identifier of one path as seen by a hop.
///
/// Assigned during path construction (outside this crate); every inbound
/// control message is tagged with the id of the path it arrived on.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId([u8; PATH_ID_SIZE]);

impl PathId {
    pub fn from_bytes(bytes: [u8; PATH_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a PathId from a slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, InvalidPathId> {
        let bytes: [u8; PATH_ID_SIZE] = slice.try_into().map_err(|_| InvalidPathId(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Generate a random path id.
    pub fn random() -> Self {
        let mut bytes = [0u8; PATH_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PATH_ID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for PathId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
