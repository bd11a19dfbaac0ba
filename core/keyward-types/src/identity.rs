//! The holder-identity record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary caller-supplied metadata about the license holder
/// (name, contact, device id, ...).
///
/// The only structural requirement is that it is a JSON object; keys and
/// values are otherwise open-ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderIdentity(Map<String, Value>);

impl HolderIdentity {
    /// Creates an empty identity record.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert of a single field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns a field by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Serializes to compact JSON bytes.
    pub fn to_json_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Parses JSON bytes, rejecting anything that is not an object.
    pub fn from_json_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::try_from(value)
    }
}

impl From<Map<String, Value>> for HolderIdentity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for HolderIdentity {
    type Error = crate::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(crate::Error::IdentityNotObject("null")),
            Value::Bool(_) => Err(crate::Error::IdentityNotObject("boolean")),
            Value::Number(_) => Err(crate::Error::IdentityNotObject("number")),
            Value::String(_) => Err(crate::Error::IdentityNotObject("string")),
            Value::Array(_) => Err(crate::Error::IdentityNotObject("array")),
        }
    }
}
