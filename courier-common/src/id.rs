use std::{fmt, str::FromStr};

use crate::error::ParseError;

/// Identifier for a notification
///
/// A ULID, so identifiers sort by creation time and can double as file names
/// in stores that keep one record per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId {
    id: ulid::Ulid,
}

impl NotificationId {
    const EXTENSION: &'static str = ".json";

    /// Generate a new unique identifier
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }

    /// Milliseconds since the Unix epoch at which this identifier was generated
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }

    /// The file name a record with this identifier is stored under
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}{}", self.id, Self::EXTENSION)
    }

    /// Parse an identifier back out of a stored record's file name.
    ///
    /// Anything containing a path separator or a traversal pattern is refused,
    /// as is any stem that is not a valid ULID.
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return None;
        }

        let stem = filename.strip_suffix(Self::EXTENSION)?;
        ulid::Ulid::from_string(stem).ok().map(Self::new)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl FromStr for NotificationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s)
            .map(Self::new)
            .map_err(|_| ParseError::InvalidId(s.to_string()))
    }
}

impl serde::Serialize for NotificationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for NotificationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Token shared by a delivery task and every retry successor of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(ulid::Ulid);

impl CorrelationId {
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_validation() {
        let id = NotificationId::generate();
        assert_eq!(NotificationId::from_filename(&id.filename()), Some(id));

        assert!(NotificationId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV.json").is_some());
        assert!(NotificationId::from_filename("../etc/passwd.json").is_none());
        assert!(NotificationId::from_filename("foo/bar.json").is_none());
        assert!(NotificationId::from_filename("..\\windows.json").is_none());
        assert!(NotificationId::from_filename("not_a_valid_ulid.json").is_none());
        assert!(NotificationId::from_filename(".tmp_01ARZ3NDEKTSV4RRFFQ69G5FAV.json").is_none());
        assert!(NotificationId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV.bin").is_none());
    }

    #[test]
    fn test_parse_and_display() {
        let id = NotificationId::generate();
        let parsed: NotificationId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("nope".parse::<NotificationId>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let id: NotificationId = "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"01ARZ3NDEKTSV4RRFFQ69G5FAV\"");
        let back: NotificationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
