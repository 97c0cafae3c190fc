//! Encoded object used by every parse and create routine.
//!
//! A JSON object with sorted keys, so [`MslObject::to_bytes`] is canonical.
//! Byte strings are standard base64.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use tessera_common::{Error, ErrorCode, Result};

#[derive(Clone, Default, PartialEq, Eq)]
pub struct MslObject(Map<String, Value>);

fn missing(key: &str) -> Error {
    Error::encoding(ErrorCode::MslParseError, format!("missing field `{key}`"))
}

fn mistyped(key: &str, expected: &str) -> Error {
    Error::encoding(ErrorCode::MslParseError, format!("field `{key}` is not {expected}"))
}

impl MslObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an object from its byte encoding.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::encoding(ErrorCode::MslParseError, e))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(Error::encoding(ErrorCode::MslParseError, "not an object")),
        }
    }

    /// Canonical byte encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|e| Error::encoding(ErrorCode::MslParseError, e))
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.0.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(mistyped(key, "a string")),
            None => Err(missing(key)),
        }
    }

    pub fn get_long(&self, key: &str) -> Result<i64> {
        match self.0.get(key) {
            Some(value) => value.as_i64().ok_or_else(|| mistyped(key, "an integer")),
            None => Err(missing(key)),
        }
    }

    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let encoded = self.get_string(key)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|_| mistyped(key, "base64"))
    }

    pub fn get_object(&self, key: &str) -> Result<MslObject> {
        match self.0.get(key) {
            Some(Value::Object(map)) => Ok(Self(map.clone())),
            Some(_) => Err(mistyped(key, "an object")),
            None => Err(missing(key)),
        }
    }

    /// Nested object that may be absent. Present but mistyped is still an
    /// error.
    pub fn opt_object(&self, key: &str) -> Result<Option<MslObject>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Self(map.clone()))),
            Some(_) => Err(mistyped(key, "an object")),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn put_bytes(&mut self, key: impl Into<String>, bytes: &[u8]) {
        self.put(key, STANDARD.encode(bytes));
    }

    pub fn put_object(&mut self, key: impl Into<String>, object: MslObject) {
        self.0.insert(key.into(), Value::Object(object.0));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Copy `base` then overwrite with the keys of `overlay`.
    pub fn merge(base: Option<&MslObject>, overlay: Option<&MslObject>) -> Option<MslObject> {
        match (base, overlay) {
            (None, None) => None,
            (Some(b), None) => Some(b.clone()),
            (None, Some(o)) => Some(o.clone()),
            (Some(b), Some(o)) => {
                let mut merged = b.clone();
                for (k, v) in &o.0 {
                    merged.0.insert(k.clone(), v.clone());
                }
                Some(merged)
            }
        }
    }
}

impl fmt::Debug for MslObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MslObject({})", Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for MslObject {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_canonical() {
        let mut a = MslObject::new();
        a.put("zeta", 1);
        a.put("alpha", "x");
        let mut b = MslObject::new();
        b.put("alpha", "x");
        b.put("zeta", 1);
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        assert_eq!(MslObject::parse(&a.to_bytes().unwrap()).unwrap(), a);
    }

    #[test]
    fn test_typed_getters() {
        let mut mo = MslObject::new();
        mo.put("name", "device");
        mo.put("count", 42);
        mo.put_bytes("blob", &[1, 2, 3]);

        assert_eq!(mo.get_string("name").unwrap(), "device");
        assert_eq!(mo.get_long("count").unwrap(), 42);
        assert_eq!(mo.get_bytes("blob").unwrap(), vec![1, 2, 3]);

        let err = mo.get_long("name").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MslParseError));
        assert!(matches!(mo.get_string("absent"), Err(Error::Encoding(..))));
        assert!(mo.opt_object("absent").unwrap().is_none());
        assert!(mo.opt_object("name").is_err());
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(MslObject::parse(b"[1,2]").is_err());
        assert!(MslObject::parse(b"not json").is_err());
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base = MslObject::new();
        base.put("a", 1);
        base.put("b", 2);
        let mut overlay = MslObject::new();
        overlay.put("b", 3);

        let merged = MslObject::merge(Some(&base), Some(&overlay)).unwrap();
        assert_eq!(merged.get_long("a").unwrap(), 1);
        assert_eq!(merged.get_long("b").unwrap(), 3);
        assert!(MslObject::merge(None, None).is_none());
        assert_eq!(MslObject::merge(None, Some(&overlay)), Some(overlay));
    }
}
