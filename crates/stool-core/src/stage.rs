use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot decode error: {0}")]
    Decode(String),
    #[error("snapshot entry {index} has no string name")]
    MissingName { index: usize },
    #[error("snapshot entry {index} is not an object")]
    NotAnObject { index: usize },
    #[error("snapshot must be an object or an array, got {0}")]
    UnexpectedShape(&'static str),
}

/// One stage as reported by the server. `name` is the identity; everything
/// else is display data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl StageRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Display text for a field. Missing fields and `null` come back empty.
    pub fn field_text(&self, key: &str) -> String {
        self.field(key).map(display_value).unwrap_or_default()
    }

    fn from_members(name: String, members: Map<String, Value>) -> Self {
        Self {
            name,
            fields: members.into_iter().collect(),
        }
    }
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSnapshot {
    records: Vec<StageRecord>,
}

impl StageSnapshot {
    /// Builds a snapshot with unique names. A repeated name keeps the
    /// position of its first occurrence and the fields of its last.
    pub fn from_records(records: impl IntoIterator<Item = StageRecord>) -> Self {
        let mut ordered: Vec<StageRecord> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in records {
            match positions.get(&record.name) {
                Some(&pos) => ordered[pos].fields = record.fields,
                None => {
                    positions.insert(record.name.clone(), ordered.len());
                    ordered.push(record);
                }
            }
        }
        Self { records: ordered }
    }

    pub fn from_json_str(body: &str) -> Result<Self, SnapshotError> {
        let value: Value =
            serde_json::from_str(body).map_err(|err| SnapshotError::Decode(err.to_string()))?;
        Self::from_value(value)
    }

    /// Accepts `{"name": {fields}}` as well as `[{"name": "...", ...}]`.
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        match value {
            Value::Object(map) => Ok(Self::from_records(map.into_iter().map(
                |(name, fields)| match fields {
                    Value::Object(members) => StageRecord::from_members(name, members),
                    _ => StageRecord::new(name),
                },
            ))),
            Value::Array(items) => {
                let mut records = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let Value::Object(mut members) = item else {
                        return Err(SnapshotError::NotAnObject { index });
                    };
                    let name = match members.remove("name") {
                        Some(Value::String(name)) => name,
                        _ => return Err(SnapshotError::MissingName { index }),
                    };
                    records.push(StageRecord::from_members(name, members));
                }
                Ok(Self::from_records(records))
            }
            Value::Null => Err(SnapshotError::UnexpectedShape("null")),
            Value::Bool(_) => Err(SnapshotError::UnexpectedShape("boolean")),
            Value::Number(_) => Err(SnapshotError::UnexpectedShape("number")),
            Value::String(_) => Err(SnapshotError::UnexpectedShape("string")),
        }
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&StageRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'de> Deserialize<'de> for StageSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        StageSnapshot::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_shape_maps_names_to_fields() {
        let snapshot = StageSnapshot::from_json_str(
            r#"{"alpha": {"status": "up", "apps": ["web", "api"]}, "beta": {"status": "down"}}"#,
        )
        .expect("decode");

        assert_eq!(snapshot.len(), 2);
        let alpha = snapshot.get("alpha").expect("alpha");
        assert_eq!(alpha.field_text("status"), "up");
        assert_eq!(alpha.field_text("apps"), "web, api");
        assert_eq!(snapshot.get("beta").expect("beta").field_text("status"), "down");
    }

    #[test]
    fn object_shape_keeps_server_order() {
        let snapshot =
            StageSnapshot::from_json_str(r#"{"zeta": {}, "alpha": {}, "mid": {}}"#).expect("decode");
        let names: Vec<&str> = snapshot.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn array_shape_strips_name_member() {
        let snapshot = StageSnapshot::from_value(json!([
            {"name": "alpha", "status": "up"},
            {"name": "beta", "expire": 3}
        ]))
        .expect("decode");

        let names: Vec<&str> = snapshot.names().collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        let alpha = snapshot.get("alpha").expect("alpha");
        assert!(alpha.field("name").is_none());
        assert_eq!(snapshot.get("beta").expect("beta").field_text("expire"), "3");
    }

    #[test]
    fn duplicate_names_keep_first_position_and_last_fields() {
        let snapshot = StageSnapshot::from_records([
            StageRecord::new("a").with_field("status", "old"),
            StageRecord::new("b"),
            StageRecord::new("a").with_field("status", "new"),
        ]);

        let names: Vec<&str> = snapshot.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(snapshot.get("a").expect("a").field_text("status"), "new");
    }

    #[test]
    fn malformed_fields_render_empty() {
        let snapshot = StageSnapshot::from_value(json!({
            "alpha": null,
            "beta": {"status": null, "comment": {"by": "me"}, "running": true}
        }))
        .expect("decode");

        let alpha = snapshot.get("alpha").expect("alpha");
        assert!(alpha.fields.is_empty());
        assert_eq!(alpha.field_text("status"), "");

        let beta = snapshot.get("beta").expect("beta");
        assert_eq!(beta.field_text("status"), "");
        assert_eq!(beta.field_text("comment"), r#"{"by":"me"}"#);
        assert_eq!(beta.field_text("running"), "true");
    }

    #[test]
    fn rejects_unusable_shapes() {
        assert!(matches!(
            StageSnapshot::from_json_str("\"nope\""),
            Err(SnapshotError::UnexpectedShape("string"))
        ));
        assert!(matches!(
            StageSnapshot::from_value(json!([{"status": "up"}])),
            Err(SnapshotError::MissingName { index: 0 })
        ));
        assert!(matches!(
            StageSnapshot::from_value(json!([{"name": "a"}, 7])),
            Err(SnapshotError::NotAnObject { index: 1 })
        ));
        assert!(matches!(
            StageSnapshot::from_json_str("{not json"),
            Err(SnapshotError::Decode(_))
        ));
    }

    #[test]
    fn deserializes_through_serde() {
        let snapshot: StageSnapshot =
            serde_json::from_str(r#"[{"name": "alpha"}]"#).expect("deserialize");
        assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["alpha"]);
    }
}
