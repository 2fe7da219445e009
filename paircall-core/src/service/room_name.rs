//! Deterministic room naming
//!
//! Both participants derive the same room identifier from the pair of
//! identities, regardless of who computes it.

use crate::{Error, Result};

/// Separator between the two identities in a room id. Identities accepted
/// at the service boundary may not contain it.
pub const ROOM_SEPARATOR: char = '_';

/// Deterministic room id for a pair of identities, independent of
/// argument order: the identities sorted lexicographically, joined by
/// [`ROOM_SEPARATOR`].
pub fn room_name(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first}{ROOM_SEPARATOR}{second}")
}

/// Validate an identity string at the service boundary: non-empty and
/// free of the room separator.
pub fn validate_identity(identity: &str) -> Result<()> {
    if identity.is_empty() {
        return Err(Error::InvalidInput("identity must not be empty".to_string()));
    }
    if identity.contains(ROOM_SEPARATOR) {
        return Err(Error::InvalidInput(format!(
            "identity must not contain '{ROOM_SEPARATOR}': {identity}"
        )));
    }
    Ok(())
}
