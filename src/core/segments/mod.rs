//! Bar segments as they travel through the relay.
//!
//! A [`Segment`] is the JSON object i3bar renders as one block. Only `name`
//! and `full_text` are interpreted here; every other key rides along in its
//! original position.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Names of segments whose `full_text` holds a clock reading
pub const CLOCK_SEGMENT_NAMES: &[&str] = &["time", "tztime"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Segment {
    fields: Map<String, Value>,
    /// Set when the relay rewrote the clock text itself; never sent on the wire
    #[serde(skip)]
    transformed: bool,
}

/// One protocol cycle: the blocks of a single JSON array, left to right
pub type Tick = Vec<Segment>;

impl Segment {
    pub fn new(name: impl Into<String>, full_text: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.into()));
        fields.insert("full_text".to_string(), Value::String(full_text.into()));
        Self {
            fields,
            transformed: false,
        }
    }

    /// Empty block substituted for a failing plugin method
    pub fn placeholder() -> Self {
        Self::new("", "")
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            transformed: false,
        }
    }

    /// Check a plugin-supplied value is a mapping with string `name` and `full_text`
    pub fn validate(value: Value) -> Result<Self, SegmentValidationError> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => return Err(SegmentValidationError::NotAMapping(other)),
        };
        for key in ["full_text", "name"] {
            match fields.get(key) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(SegmentValidationError::NotAString(key)),
                None => return Err(SegmentValidationError::MissingKey(key)),
            }
        }
        Ok(Self::from_map(fields))
    }

    /// Best-effort conversion that keeps whatever the plugin sent
    pub fn lenient(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            other => {
                let mut fields = Map::new();
                fields.insert("full_text".to_string(), Value::String(other.to_string()));
                Self::from_map(fields)
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn full_text(&self) -> Option<&str> {
        self.fields.get("full_text").and_then(Value::as_str)
    }

    pub fn set_full_text(&mut self, text: impl Into<String>) {
        self.fields
            .insert("full_text".to_string(), Value::String(text.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Remove a key, keeping the order of the remaining ones
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn is_clock(&self) -> bool {
        self.name()
            .is_some_and(|name| CLOCK_SEGMENT_NAMES.contains(&name))
    }

    pub fn is_transformed(&self) -> bool {
        self.transformed
    }

    pub fn mark_transformed(&mut self) {
        self.transformed = true;
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentValidationError {
    NotAMapping(Value),
    MissingKey(&'static str),
    NotAString(&'static str),
}

impl std::fmt::Display for SegmentValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentValidationError::NotAMapping(value) => {
                write!(f, "plugin should return a mapping, got {}", value)
            }
            SegmentValidationError::MissingKey(key) => write!(f, "missing '{}' key", key),
            SegmentValidationError::NotAString(key) => write!(f, "'{}' must be a string", key),
        }
    }
}

impl std::error::Error for SegmentValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extra_keys_keep_their_order() {
        let raw = r##"{"name":"disk","instance":"/","full_text":"12G","color":"#00FF00"}"##;
        let segment: Segment = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_string(&segment).unwrap(), raw);
        assert_eq!(segment.name(), Some("disk"));
        assert_eq!(segment.full_text(), Some("12G"));
    }

    #[test]
    fn test_transformed_flag_is_not_serialized() {
        let mut segment = Segment::new("time", "12:00");
        segment.mark_transformed();
        let out = serde_json::to_string(&segment).unwrap();
        assert_eq!(out, r#"{"name":"time","full_text":"12:00"}"#);
        assert!(segment.is_transformed());
    }

    #[test]
    fn test_validate() {
        assert!(Segment::validate(json!({"name": "a", "full_text": "b"})).is_ok());
        assert_eq!(
            Segment::validate(json!({"name": "a"})),
            Err(SegmentValidationError::MissingKey("full_text"))
        );
        assert_eq!(
            Segment::validate(json!({"name": 3, "full_text": "b"})),
            Err(SegmentValidationError::NotAString("name"))
        );
        assert!(matches!(
            Segment::validate(json!([1, 2])),
            Err(SegmentValidationError::NotAMapping(_))
        ));
    }

    #[test]
    fn test_is_clock() {
        assert!(Segment::new("time", "").is_clock());
        assert!(Segment::new("tztime", "").is_clock());
        assert!(!Segment::new("battery", "").is_clock());
        assert!(!Segment::from_map(Map::new()).is_clock());
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut segment: Segment =
            serde_json::from_str(r#"{"name":"a","cached_until":5,"full_text":"b","color":"c"}"#)
                .unwrap();
        assert_eq!(segment.remove("cached_until"), Some(json!(5)));
        assert_eq!(
            serde_json::to_string(&segment).unwrap(),
            r#"{"name":"a","full_text":"b","color":"c"}"#
        );
    }
}
