//! # Stream keys.
//!
//! A [`StreamKey`] names one logical input/output stream pair. Keys are
//! supplied from outside (relay notifications, operator commands) and are not
//! validated beyond being non-empty.

use std::{borrow::Borrow, fmt, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ControlError;

/// Opaque, cheap-to-clone stream identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey(Arc<str>);

impl StreamKey {
    /// Creates a key, rejecting empty or whitespace-only input.
    ///
    /// # Example
    /// ```
    /// use rendervisor::StreamKey;
    ///
    /// assert!(StreamKey::new("test").is_ok());
    /// assert!(StreamKey::new("   ").is_err());
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ControlError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(ControlError::InvalidKey);
        }
        Ok(Self(Arc::from(raw)))
    }

    /// Parses an optional key coming from an operator command.
    pub fn required(raw: Option<&str>) -> Result<Self, ControlError> {
        raw.ok_or(ControlError::InvalidKey).and_then(Self::new)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StreamKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for StreamKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StreamKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StreamKey::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let key = StreamKey::new("  test ").unwrap();
        assert_eq!(key.as_str(), "test");
    }

    #[test]
    fn missing_key_is_invalid() {
        assert!(matches!(
            StreamKey::required(None),
            Err(ControlError::InvalidKey)
        ));
        assert!(matches!(
            StreamKey::required(Some("")),
            Err(ControlError::InvalidKey)
        ));
    }

    #[test]
    fn deserialize_rejects_empty() {
        let ok: StreamKey = serde_json::from_str("\"cam1\"").unwrap();
        assert_eq!(ok.as_str(), "cam1");
        assert!(serde_json::from_str::<StreamKey>("\"\"").is_err());
    }
}
