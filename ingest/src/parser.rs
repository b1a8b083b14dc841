//! Turns logstash-style JSON lines into [`LogEvent`]s.

use crate::config::Auth;
use crate::errors::ParseError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::event::{Attributes, LogEvent, Severity};

const TIMESTAMP_KEY: &str = "@timestamp";
const FIELDS_KEY: &str = "@fields";
const MESSAGE_ALIAS_KEY: &str = "@message";
const MESSAGE_KEY: &str = "message";
const LEVEL_KEYS: [&str; 3] = ["level", "levelName", "levelname"];

/// Per-connection parsing state.
pub struct Parser {
    auth: Option<Auth>,
    authenticated: bool,
    nb_events: u64,
}

impl Parser {
    pub fn new(auth: Option<Auth>) -> Self {
        Parser {
            authenticated: !matches!(auth, Some(Auth::Key { .. })),
            auth,
            nb_events: 0,
        }
    }

    /// Events successfully parsed so far.
    pub fn nb_events(&self) -> u64 {
        self.nb_events
    }

    pub fn parse(&mut self, line: &str) -> Result<LogEvent, ParseError> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let payload = match &self.auth {
            Some(Auth::Prefix { token }) => match line.split_once(' ') {
                Some((prefix, rest)) if prefix == token => rest,
                _ => return Err(ParseError::Auth("wrong authentication token".into())),
            },
            _ => line,
        };

        let mut attributes: Attributes = serde_json::from_str(payload)?;

        if let Some(Auth::Key { key, value }) = &self.auth {
            let provided = attributes.remove(key);
            if !self.authenticated {
                match provided {
                    Some(Value::String(provided)) if provided == *value => {
                        self.authenticated = true;
                    }
                    _ => {
                        return Err(ParseError::Auth(format!(
                            "wrong authentication with key {key}"
                        )));
                    }
                }
            }
        }

        let timestamp = match attributes.get(TIMESTAMP_KEY) {
            Some(Value::String(ts)) => DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        };
        let timestamp = match timestamp {
            Some(timestamp) => {
                attributes.remove(TIMESTAMP_KEY);
                timestamp
            }
            None => Utc::now(),
        };

        // Nested fields would otherwise be indexed as one opaque value.
        if let Some(fields) = attributes.remove(FIELDS_KEY)
            && let Value::Object(fields) = fields
        {
            for (key, value) in fields {
                attributes.entry(key).or_insert(value);
            }
        }

        if let Some(message) = attributes.remove(MESSAGE_ALIAS_KEY) {
            attributes.insert(MESSAGE_KEY.into(), message);
        }

        let severity = severity(&mut attributes);

        self.nb_events += 1;
        Ok(LogEvent::new(timestamp, severity, attributes))
    }
}

/// Takes the first string level attribute out of the map. Unknown names are
/// removed too and read as Info.
fn severity(attributes: &mut Attributes) -> Severity {
    let level = LEVEL_KEYS.iter().find_map(|key| match attributes.get(*key) {
        Some(Value::String(name)) => Some((*key, Severity::from_name(name))),
        _ => None,
    });

    match level {
        Some((key, severity)) => {
            attributes.remove(key);
            severity.unwrap_or_default()
        }
        None => Severity::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn attrs(event: &LogEvent) -> Value {
        Value::Object(event.attributes.clone())
    }

    #[test]
    fn defaults_to_info_and_now() {
        let mut parser = Parser::new(None);
        let before = Utc::now();
        let event = parser.parse(r#"{"message":"hello"}"#).unwrap();
        let after = Utc::now();

        assert_eq!(event.severity, Severity::Info);
        assert!(event.timestamp >= before && event.timestamp <= after);
        assert_eq!(attrs(&event), json!({"message": "hello"}));
        assert_eq!(parser.nb_events(), 1);
    }

    #[test]
    fn end_to_end_line() {
        let mut parser = Parser::new(None);
        let event = parser
            .parse(r#"{"@timestamp":"2024-01-01T00:00:00Z","level":"error","@message":"boom","host":"x"}"#)
            .unwrap();

        assert_eq!(event.severity, Severity::Error);
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(attrs(&event), json!({"message": "boom", "host": "x"}));
    }

    #[test]
    fn timestamp_with_fraction_and_offset() {
        let mut parser = Parser::new(None);
        let event = parser
            .parse(r#"{"@timestamp":"2024-01-01T02:00:00.250+02:00"}"#)
            .unwrap();
        assert_eq!(event.timestamp_millis(), 1_704_067_200_250);
        assert_eq!(attrs(&event), json!({}));
    }

    #[test]
    fn unparsable_timestamp_is_kept() {
        let mut parser = Parser::new(None);
        let event = parser.parse(r#"{"@timestamp":"yesterday"}"#).unwrap();
        assert_eq!(attrs(&event), json!({"@timestamp": "yesterday"}));

        let event = parser.parse(r#"{"@timestamp":12}"#).unwrap();
        assert_eq!(attrs(&event), json!({"@timestamp": 12}));
    }

    #[test]
    fn fields_are_flattened() {
        let mut parser = Parser::new(None);
        let event = parser
            .parse(r#"{"a":"top","@fields":{"a":"nested","b":1}}"#)
            .unwrap();
        assert_eq!(attrs(&event), json!({"a": "top", "b": 1}));

        let event = parser.parse(r#"{"@fields":"not an object"}"#).unwrap();
        assert_eq!(attrs(&event), json!({}));
    }

    #[test]
    fn message_alias_overwrites() {
        let mut parser = Parser::new(None);
        let event = parser
            .parse(r#"{"@message":"hi","message":"bye"}"#)
            .unwrap();
        assert_eq!(attrs(&event), json!({"message": "hi"}));
    }

    #[test]
    fn levels() {
        let mut parser = Parser::new(None);
        for level in ["WARN", "Warning", "warning"] {
            let event = parser
                .parse(&format!(r#"{{"level":"{level}"}}"#))
                .unwrap();
            assert_eq!(event.severity, Severity::Warning);
            assert_eq!(attrs(&event), json!({}));
        }

        let event = parser.parse(r#"{"level":"verbose"}"#).unwrap();
        assert_eq!(event.severity, Severity::Info);
        assert_eq!(attrs(&event), json!({}));

        let event = parser.parse(r#"{"levelname":"CRITICAL"}"#).unwrap();
        assert_eq!(event.severity, Severity::Critical);

        // Only the first string level key is used and removed.
        let event = parser
            .parse(r#"{"level":3,"levelName":"debug","levelname":"error"}"#)
            .unwrap();
        assert_eq!(event.severity, Severity::Debug);
        assert_eq!(attrs(&event), json!({"level": 3, "levelname": "error"}));
    }

    #[test]
    fn decode_errors() {
        let mut parser = Parser::new(None);
        assert!(matches!(parser.parse("not json"), Err(ParseError::Decode(_))));
        assert!(matches!(parser.parse("[1, 2]"), Err(ParseError::Decode(_))));
        assert_eq!(parser.nb_events(), 0);
    }

    #[test]
    fn trailing_carriage_return() {
        let mut parser = Parser::new(None);
        let event = parser.parse("{\"message\":\"hi\"}\r").unwrap();
        assert_eq!(attrs(&event), json!({"message": "hi"}));
    }

    #[test]
    fn prefix_auth() {
        let mut parser = Parser::new(Some(Auth::Prefix {
            token: "secret".into(),
        }));
        let event = parser.parse(r#"secret {"message":"hi"}"#).unwrap();
        assert_eq!(attrs(&event), json!({"message": "hi"}));

        assert!(matches!(
            parser.parse(r#"other {"message":"hi"}"#),
            Err(ParseError::Auth(_))
        ));
        assert!(matches!(
            parser.parse(r#"{"message":"hi"}"#),
            Err(ParseError::Auth(_))
        ));
    }

    #[test]
    fn key_auth() {
        let auth = Auth::Key {
            key: "auth".into(),
            value: "secret".into(),
        };

        let mut parser = Parser::new(Some(auth.clone()));
        let err = parser.parse(r#"{"message":"hi"}"#).unwrap_err();
        assert_eq!(err.to_string(), "wrong authentication with key auth");

        let mut parser = Parser::new(Some(auth.clone()));
        assert!(matches!(
            parser.parse(r#"{"auth":"nope"}"#),
            Err(ParseError::Auth(_))
        ));

        let mut parser = Parser::new(Some(auth));
        let event = parser
            .parse(r#"{"auth":"secret","message":"first"}"#)
            .unwrap();
        assert_eq!(attrs(&event), json!({"message": "first"}));

        // Authenticated now: the key is optional but still stripped.
        let event = parser.parse(r#"{"message":"second"}"#).unwrap();
        assert_eq!(attrs(&event), json!({"message": "second"}));
        let event = parser
            .parse(r#"{"auth":"whatever","message":"third"}"#)
            .unwrap();
        assert_eq!(attrs(&event), json!({"message": "third"}));
        assert_eq!(parser.nb_events(), 3);
    }
}
