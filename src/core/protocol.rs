//! i3bar protocol line classification.
//!
//! The generator stream is a header object, the `[` that opens the endless
//! array, and then one JSON array per tick, every one after the first
//! prefixed with a comma.

use crate::core::segments::Tick;
use crate::error::{RelayError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolLine {
    /// `{"version":1}` and friends, forwarded verbatim
    Header(String),
    /// The lone `[` opening the infinite array
    ArrayOpen(String),
    Element { leading_comma: bool, tick: Tick },
}

impl ProtocolLine {
    pub fn is_element(&self) -> bool {
        matches!(self, ProtocolLine::Element { .. })
    }
}

/// Classify one raw generator line. Trailing newlines are ignored.
pub fn classify(raw: &str) -> Result<ProtocolLine> {
    let line = raw.trim_end_matches(['\n', '\r']);

    if line.starts_with('{') && line.contains("version") {
        return Ok(ProtocolLine::Header(line.to_string()));
    }
    if line == "[" {
        return Ok(ProtocolLine::ArrayOpen(line.to_string()));
    }

    let (leading_comma, payload) = match line.strip_prefix(',') {
        Some(rest) => (true, rest),
        None => (false, line),
    };
    let tick: Tick = serde_json::from_str(payload).map_err(|source| RelayError::Protocol {
        line: line.to_string(),
        source,
    })?;

    Ok(ProtocolLine::Element {
        leading_comma,
        tick,
    })
}

/// Inverse of [`classify`]; elements come out as compact JSON
pub fn serialize(line: &ProtocolLine) -> Result<String> {
    match line {
        ProtocolLine::Header(raw) | ProtocolLine::ArrayOpen(raw) => Ok(raw.clone()),
        ProtocolLine::Element {
            leading_comma,
            tick,
        } => {
            let body = serde_json::to_string(tick)?;
            Ok(if *leading_comma {
                format!(",{}", body)
            } else {
                body
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::segments::Segment;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    fn segment_strategy() -> impl Strategy<Value = Segment> {
        (
            "[a-z_]{0,8}",
            ".{0,12}",
            prop::collection::vec(("[a-z_]{1,8}", any::<i32>(), ".{0,6}"), 0..4),
        )
            .prop_map(|(name, text, extra)| {
                let mut fields = Map::new();
                fields.insert("name".to_string(), Value::String(name));
                fields.insert("full_text".to_string(), Value::String(text));
                for (i, (key, number, text)) in extra.into_iter().enumerate() {
                    let value = if i % 2 == 0 {
                        Value::from(number)
                    } else {
                        Value::String(text)
                    };
                    fields.insert(key, value);
                }
                Segment::from_map(fields)
            })
    }

    proptest! {
        #[test]
        fn prop_element_lines_round_trip(
            tick in prop::collection::vec(segment_strategy(), 0..5),
            leading_comma in any::<bool>(),
        ) {
            let line = serialize(&ProtocolLine::Element { leading_comma, tick }).unwrap();
            let parsed = classify(&line).unwrap();
            prop_assert_eq!(serialize(&parsed).unwrap(), line);
        }
    }

    #[test]
    fn test_header_and_array_open_pass_through() {
        let header = classify("{\"version\":1,\"click_events\":true}\n").unwrap();
        assert_eq!(
            header,
            ProtocolLine::Header("{\"version\":1,\"click_events\":true}".to_string())
        );
        assert_eq!(classify("[\n").unwrap(), ProtocolLine::ArrayOpen("[".to_string()));
        assert!(!header.is_element());
    }

    #[test]
    fn test_element_records_leading_comma() {
        match classify(",[{\"name\":\"a\",\"full_text\":\"b\"}]").unwrap() {
            ProtocolLine::Element {
                leading_comma,
                tick,
            } => {
                assert!(leading_comma);
                assert_eq!(tick.len(), 1);
                assert_eq!(tick[0].name(), Some("a"));
            }
            other => panic!("unexpected {:?}", other),
        }

        match classify("[]").unwrap() {
            ProtocolLine::Element { leading_comma, tick } => {
                assert!(!leading_comma);
                assert!(tick.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_round_trip() {
        for line in [
            "{\"version\":1}",
            "[",
            "[{\"name\":\"time\",\"full_text\":\"2024-01-01 00:00:00\"}]",
            ",[{\"name\":\"wireless\",\"instance\":\"wlan0\",\"color\":\"#00FF00\",\"full_text\":\"W: up\"}]",
        ] {
            let parsed = classify(line).unwrap();
            assert_eq!(serialize(&parsed).unwrap(), line);
        }
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let err = classify(",[{\"name\":").unwrap_err();
        assert!(matches!(err, RelayError::Protocol { .. }));
        assert_eq!(err.exit_code(), 2);
    }
}
