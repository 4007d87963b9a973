//! JSONB encoding of documents.
//!
//! JSON has no timestamp type, so resolved instants are wrapped as
//! `{"$timestamp": "<rfc3339>"}` and unwrapped again on read. Document keys
//! starting with `$` gain one extra `$` on write and lose it on read, so a
//! stored payload can never spell the wrapper itself. Server timestamp
//! sentinels are resolved to the supplied database time while encoding, so
//! nothing written ever contains the sentinel.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as JsonValue};

use crate::domain::{Document, Value};

const TIMESTAMP_KEY: &str = "$timestamp";
const ESCAPE: char = '$';

fn escape_key(key: &str) -> String {
    if key.starts_with(ESCAPE) {
        format!("{ESCAPE}{key}")
    } else {
        key.to_owned()
    }
}

fn unescape_key(key: String) -> String {
    match key.strip_prefix(ESCAPE) {
        Some(rest) => rest.to_owned(),
        None => key,
    }
}

fn timestamp_to_json(at: DateTime<Utc>) -> JsonValue {
    JsonValue::Object(Map::from_iter([(
        TIMESTAMP_KEY.to_owned(),
        JsonValue::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    )]))
}

fn value_to_json(value: &Value, now: DateTime<Utc>) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(flag) => JsonValue::Bool(*flag),
        Value::Integer(number) => JsonValue::Number(Number::from(*number)),
        Value::Double(number) => Number::from_f64(*number)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(text) => JsonValue::String(text.clone()),
        Value::Timestamp(at) => timestamp_to_json(*at),
        Value::ServerTimestamp => timestamp_to_json(now),
        Value::Array(items) => {
            JsonValue::Array(items.iter().map(|item| value_to_json(item, now)).collect())
        }
        Value::Map(map) => document_to_json(map, now),
    }
}

/// Encode `document` for a JSONB column, resolving sentinels to `now`.
pub(super) fn document_to_json(document: &Document, now: DateTime<Utc>) -> JsonValue {
    JsonValue::Object(
        document
            .iter()
            .map(|(key, value)| (escape_key(key), value_to_json(value, now)))
            .collect(),
    )
}

fn wrapped_timestamp(object: &Map<String, JsonValue>) -> Option<DateTime<Utc>> {
    if object.len() != 1 {
        return None;
    }
    let text = object.get(TIMESTAMP_KEY)?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn value_from_json(value: JsonValue) -> Value {
    match value {
        JsonValue::Object(object) => match wrapped_timestamp(&object) {
            Some(at) => Value::Timestamp(at),
            None => Value::Map(object_to_document(object)),
        },
        JsonValue::Array(items) => Value::Array(items.into_iter().map(value_from_json).collect()),
        scalar => Value::from(scalar),
    }
}

fn object_to_document(object: Map<String, JsonValue>) -> Document {
    object
        .into_iter()
        .map(|(key, value)| (unescape_key(key), value_from_json(value)))
        .collect()
}

/// Decode a JSONB column; non-object bodies yield `None`.
pub(super) fn document_from_json(body: JsonValue) -> Option<Document> {
    match body {
        JsonValue::Object(object) => Some(object_to_document(object)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn sentinels_are_written_as_wrapped_timestamps() {
        let document = Document::from([
            ("used".to_owned(), Value::Bool(false)),
            ("created".to_owned(), Value::ServerTimestamp),
        ]);

        assert_eq!(
            document_to_json(&document, instant()),
            json!({"used": false, "created": {"$timestamp": "2024-01-01T00:00:00Z"}})
        );
    }

    #[test]
    fn wrapped_timestamps_read_back_as_instants() {
        let body = json!({
            "timestamp": {"$timestamp": "2024-01-01T00:00:00Z"},
            "humidity": 40,
        });

        let document = document_from_json(body).expect("object body");

        assert_eq!(document.get("timestamp"), Some(&Value::Timestamp(instant())));
        assert_eq!(document.get("humidity"), Some(&Value::Integer(40)));
    }

    #[test]
    fn lookalike_objects_stay_maps() {
        let body = json!({"meta": {"$timestamp": "not a time"}, "pair": {"$timestamp": "2024-01-01T00:00:00Z", "x": 1}});

        let document = document_from_json(body).expect("object body");

        assert!(matches!(document.get("meta"), Some(Value::Map(_))));
        assert!(matches!(document.get("pair"), Some(Value::Map(_))));
    }

    #[rstest]
    #[case::wrapper_shape("$timestamp", Value::from("2024-01-01T00:00:00Z"))]
    #[case::double_dollar("$$timestamp", Value::from("2024-01-01T00:00:00Z"))]
    #[case::plain_dollar("$price", Value::Integer(3))]
    fn dollar_keys_round_trip_as_maps(#[case] key: &str, #[case] inner: Value) {
        let nested = Document::from([(key.to_owned(), inner)]);
        let document = Document::from([
            ("payload".to_owned(), Value::Map(nested)),
            (key.to_owned(), Value::Bool(true)),
        ]);

        let encoded = document_to_json(&document, instant());
        let decoded = document_from_json(encoded).expect("object body");

        assert_eq!(decoded, document);
    }

    #[test]
    fn escaped_keys_are_stored_with_an_extra_dollar() {
        let document = Document::from([(
            "meta".to_owned(),
            Value::Map(Document::from([(
                "$timestamp".to_owned(),
                Value::from("2024-01-01T00:00:00Z"),
            )])),
        )]);

        assert_eq!(
            document_to_json(&document, instant()),
            json!({"meta": {"$$timestamp": "2024-01-01T00:00:00Z"}})
        );
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert_eq!(document_from_json(json!([1, 2])), None);
    }
}
