//! Type-safe identifiers.
//!
//! [`PoiId`] and [`ProfileId`] are newtype wrappers around [`uuid::Uuid`]
//! (v4) so that place identifiers cannot be confused with profile
//! identifiers or other UUIDs floating through the system.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a point of interest.
///
/// Generated once when the POI document is first created for a coordinate
/// pair and immutable thereafter. Used as the subscription key inside
/// profiles and as the workflow-id suffix for POI refresh workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoiId(uuid::Uuid);

impl PoiId {
    /// Creates a new random `PoiId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `PoiId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Parses a `PoiId` from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`uuid::Error`] when the string is not a
    /// valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl Default for PoiId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for PoiId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PoiId> for uuid::Uuid {
    fn from(id: PoiId) -> Self {
        id.0
    }
}

/// Unique identifier for a profile document.
///
/// Distinct from the account number: the account number is the public,
/// client-facing handle while the profile id keys report documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(uuid::Uuid);

impl ProfileId {
    /// Creates a new random `ProfileId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ProfileId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a help request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HelpId(uuid::Uuid);

impl HelpId {
    /// Creates a new random `HelpId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `HelpId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Parses a `HelpId` from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`uuid::Error`] when the string is not a
    /// valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl Default for HelpId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HelpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(PoiId::new(), PoiId::new());
        assert_ne!(ProfileId::new(), ProfileId::new());
    }

    #[test]
    fn poi_id_parse_round_trip() {
        let id = PoiId::new();
        let parsed = PoiId::parse(&id.to_string());
        assert_eq!(parsed.ok(), Some(id));
    }

    #[test]
    fn poi_id_parse_rejects_garbage() {
        assert!(PoiId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let id = PoiId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
