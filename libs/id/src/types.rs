//! Identity, counter class, and assigned ID definitions.

use crate::IdError;

// =============================================================================
// Stable Identity
// =============================================================================

/// The immutable identity of a directory object (its `objectGUID`).
///
/// Two identities are equal exactly when their GUIDs are equal; the label an
/// object carried when it was first seen plays no part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StableIdentity(uuid::Uuid);

impl StableIdentity {
    /// Size of the raw identity in bytes.
    pub const LEN: usize = 16;

    /// Creates an identity from a GUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Creates an identity from the directory's raw `objectGUID` bytes.
    ///
    /// The directory stores the first three GUID fields little-endian.
    #[must_use]
    pub fn from_directory_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(uuid::Uuid::from_bytes_le(bytes))
    }

    /// Like [`Self::from_directory_bytes`], but checks the slice length.
    pub fn from_directory_slice(bytes: &[u8]) -> Result<Self, IdError> {
        let raw: [u8; Self::LEN] = bytes.try_into().map_err(|_| IdError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::from_directory_bytes(raw))
    }

    /// Returns the raw bytes in directory (little-endian GUID) order.
    #[must_use]
    pub fn to_directory_bytes(&self) -> [u8; Self::LEN] {
        self.0.to_bytes_le()
    }

    /// Parses an identity from its textual GUID form.
    ///
    /// Accepts hyphenated, simple, braced, and URN forms, with surrounding
    /// whitespace ignored.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }

        uuid::Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|e| IdError::InvalidGuid {
                input: trimmed.to_string(),
                message: e.to_string(),
            })
    }
}

impl std::fmt::Display for StableIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for StableIdentity {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<uuid::Uuid> for StableIdentity {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl serde::Serialize for StableIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for StableIdentity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Counter Class
// =============================================================================

/// An independently sequenced allocation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CounterClass {
    /// POSIX user IDs, written to `uidNumber`.
    User,
    /// POSIX group IDs, written to `gidNumber`.
    Group,
}

impl CounterClass {
    /// Every class, in registry column order.
    pub const ALL: [Self; 2] = [Self::User, Self::Group];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }

    /// The directory attribute that receives IDs from this class.
    #[must_use]
    pub const fn directory_attribute(&self) -> &'static str {
        match self {
            Self::User => "uidNumber",
            Self::Group => "gidNumber",
        }
    }

    /// Parses a class name, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "uid" => Ok(Self::User),
            "group" | "gid" => Ok(Self::Group),
            _ => Err(IdError::UnknownCounterClass(s.to_string())),
        }
    }
}

impl std::fmt::Display for CounterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CounterClass {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for CounterClass {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for CounterClass {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Assigned ID
// =============================================================================

/// A POSIX user or group ID handed out by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssignedId(u32);

impl AssignedId {
    /// Creates an AssignedId from a u32.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for AssignedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AssignedId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<AssignedId> for u32 {
    fn from(id: AssignedId) -> Self {
        id.0
    }
}

impl From<AssignedId> for i64 {
    fn from(id: AssignedId) -> Self {
        i64::from(id.0)
    }
}

impl TryFrom<i64> for AssignedId {
    type Error = IdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| IdError::OutOfRange(value))
    }
}

impl serde::Serialize for AssignedId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for AssignedId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = u32::deserialize(deserializer)?;
        Ok(Self(id))
    }
}

// =============================================================================
// Tests
// =============================================================================
