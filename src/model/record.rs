use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type RecordId = Uuid;

/// Field name → value patch sent to the backend on writes.
pub type FieldChanges = Map<String, Value>;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A backend row. Opaque except for the fields the engine reads: the start
/// and stop datetimes, dependency id lists, and the name/progress/color
/// decoration fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: FieldChanges,
}

impl Record {
    pub fn new(id: RecordId, fields: FieldChanges) -> Self {
        Self { id, fields }
    }

    pub fn datetime(&self, field: &str) -> Option<NaiveDateTime> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .and_then(parse_datetime)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    pub fn flag(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// A many-to-many field: an array of record id strings.
    pub fn id_list(&self, field: &str) -> Vec<RecordId> {
        match self.fields.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| Uuid::parse_str(s).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Raw value of a field, `Null` when absent.
    pub fn value(&self, field: &str) -> Value {
        self.fields.get(field).cloned().unwrap_or(Value::Null)
    }
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).ok()
}

pub fn format_datetime(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub fn datetime_value(value: NaiveDateTime) -> Value {
    Value::String(format_datetime(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_accessors() {
        let id = Uuid::new_v4();
        let dep = Uuid::new_v4();
        let mut fields = FieldChanges::new();
        fields.insert("name".into(), json!("Install rig"));
        fields.insert("date_start".into(), json!("2024-06-10T09:00:00"));
        fields.insert("progress".into(), json!(0.4));
        fields.insert("blocked".into(), json!(true));
        fields.insert("depend_on".into(), json!([dep.to_string(), "not-a-uuid"]));
        let record = Record::new(id, fields);

        assert_eq!(record.text("name"), Some("Install rig"));
        assert_eq!(
            record.datetime("date_start"),
            parse_datetime("2024-06-10T09:00:00")
        );
        assert_eq!(record.number("progress"), Some(0.4));
        assert!(record.flag("blocked"));
        assert!(!record.flag("missing"));
        // Malformed ids are skipped, valid ones kept
        assert_eq!(record.id_list("depend_on"), vec![dep]);
    }

    #[test]
    fn test_datetime_round_trip() {
        let text = "2024-02-29T13:30:00";
        let parsed = parse_datetime(text).unwrap();
        assert_eq!(format_datetime(parsed), text);
    }
}
