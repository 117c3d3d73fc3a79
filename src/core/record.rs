//! SD-003: Change-tracked system record.
//!
//! Holds the tracked field values, a baseline snapshot taken at load (or the
//! last `reset`), and the ordered set of fields whose value differs from that
//! baseline. Untracked attributes ride along untouched, and so does a fetched
//! field value that does not decode as its field's kind until it is changed.

use super::edit::EditCommand;
use super::merge;
use super::types::{Field, FieldKind, FieldValue, Format, Mode, Rendered};
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

/// A system record with local change tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRecord {
    fields: IndexMap<Field, FieldValue>,
    baseline: IndexMap<Field, FieldValue>,
    changed: IndexSet<Field>,
    extra: Map<String, Value>,
    /// Fetched values that did not decode; emitted verbatim while unchanged.
    raw: IndexMap<Field, Value>,
}

impl Default for TrackedRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackedRecord {
    /// An empty record with every tracked field at its kind's empty value.
    pub fn new() -> Self {
        let fields: IndexMap<Field, FieldValue> =
            Field::ALL.iter().map(|f| (*f, f.kind().empty())).collect();
        Self {
            baseline: fields.clone(),
            fields,
            changed: IndexSet::new(),
            extra: Map::new(),
            raw: IndexMap::new(),
        }
    }

    /// Build a record from a fetched mapping. The change set starts empty.
    pub fn from_mapping(raw: &Map<String, Value>) -> Self {
        let mut record = Self::new();
        for (key, value) in raw {
            match Field::from_name(key) {
                Some(field) => match merge::decode(field.kind(), value) {
                    Some(decoded) => {
                        record.fields.insert(field, decoded);
                    }
                    None => {
                        tracing::debug!(field = %field, "keeping undecodable value verbatim");
                        record.raw.insert(field, value.clone());
                    }
                },
                None => {
                    record.extra.insert(key.clone(), value.clone());
                }
            }
        }
        record.reset();
        record
    }

    /// Build a record from JSON text holding a mapping.
    pub fn from_json(json: &str) -> Result<Self, String> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => Ok(Self::from_mapping(&map)),
            Ok(other) => Err(format!("expected a JSON object, got {}", kind_name(&other))),
            Err(e) => Err(format!("JSON parse error: {}", e)),
        }
    }

    /// Record name, used as the edit selector.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: &str) {
        self.extra
            .insert("name".to_string(), Value::String(name.to_string()));
    }

    /// Untracked attribute by name.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Fetched value of `field` kept verbatim because it did not decode.
    /// `value(field)` is the kind's empty value meanwhile.
    pub fn raw(&self, field: Field) -> Option<&Value> {
        self.raw.get(&field)
    }

    pub fn value(&self, field: Field) -> &FieldValue {
        // Every field is seeded in `new`.
        &self.fields[&field]
    }

    /// Fields changed since load or last reset, in first-change order.
    pub fn changes(&self) -> impl Iterator<Item = Field> + '_ {
        self.changed.iter().copied()
    }

    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Take the current values as the new baseline and clear the change set.
    pub fn reset(&mut self) {
        let changed = &self.changed;
        self.raw.retain(|field, _| !changed.contains(field));
        self.baseline = self.fields.clone();
        self.changed.clear();
    }

    /// Update a field and return its new value rendered in `format`.
    ///
    /// `input` is either structured (object/array) or JSON text; anything
    /// else is treated as no change requested.
    pub fn update(&mut self, field: Field, input: &Value, mode: Mode, format: Format) -> Rendered {
        let update = merge::coerce(field.kind(), input);
        let before = self.value(field);
        let after = merge::integrate(before, update, mode);
        if after != *before {
            if self.raw.contains_key(&field) {
                tracing::warn!(
                    field = %field,
                    expected = kind_label(field.kind()),
                    "update overwrites a stored value that did not decode"
                );
            }
            tracing::debug!(field = %field, mode = ?mode, "field updated");
            self.fields.insert(field, after);
            self.track(field);
        }
        self.value(field).render(format)
    }

    pub fn comment(&mut self, input: &Value, mode: Mode, format: Format) -> Rendered {
        self.update(Field::Comment, input, mode, format)
    }

    pub fn ks_meta(&mut self, input: &Value, mode: Mode, format: Format) -> Rendered {
        self.update(Field::KsMeta, input, mode, format)
    }

    pub fn mgmt_classes(&mut self, input: &Value, mode: Mode, format: Format) -> Rendered {
        self.update(Field::MgmtClasses, input, mode, format)
    }

    /// Render a field without modifying it.
    pub fn render(&self, field: Field, format: Format) -> Rendered {
        self.value(field).render(format)
    }

    /// Synthesize the edit command for the current change set.
    pub fn emit_edit(&self) -> EditCommand {
        let changes = self
            .changed
            .iter()
            .map(|f| (*f, self.render(*f, f.command_format()).to_string()))
            .collect();
        EditCommand::new(self.name().unwrap_or_default(), changes)
    }

    /// Whole record as a mapping. The comment goes back to JSON text; an
    /// unchanged undecodable value goes back exactly as fetched.
    pub fn to_mapping(&self) -> Map<String, Value> {
        let mut out = self.extra.clone();
        for (field, value) in &self.fields {
            let encoded = match (self.raw.get(field), field.kind()) {
                (Some(raw), _) if !self.changed.contains(field) => raw.clone(),
                (_, FieldKind::Text) => Value::String(value.to_json()),
                _ => value.to_value(),
            };
            out.insert(field.name().to_string(), encoded);
        }
        out
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.to_mapping()).to_string()
    }

    fn track(&mut self, field: Field) {
        if self.fields.get(&field) == self.baseline.get(&field) {
            self.changed.shift_remove(&field);
        } else {
            self.changed.insert(field);
        }
    }
}

fn kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "JSON text",
        FieldKind::Map => "a mapping",
        FieldKind::List => "a list",
    }
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn fetched() -> TrackedRecord {
        let raw = json!({
            "name": "web01",
            "hostname": "web01.example.com",
            "profile": "centos7-x86_64",
            "comment": r#"{"owner":"ops"}"#,
            "ks_meta": {"tree": "http://mirror/os", "lang": "en"},
            "mgmt_classes": ["base", "web"],
        });
        TrackedRecord::from_mapping(raw.as_object().unwrap())
    }

    #[test]
    fn test_sd003_new_is_clean() {
        let r = TrackedRecord::new();
        assert!(!r.is_changed());
        for f in Field::ALL {
            assert!(r.value(f).is_empty());
        }
        assert!(matches!(r.value(Field::KsMeta), FieldValue::Map(_)));
        assert!(matches!(r.value(Field::Comment), FieldValue::Map(_)));
    }

    #[test]
    fn test_sd003_from_mapping_is_clean() {
        let r = fetched();
        assert!(!r.is_changed());
        assert_eq!(r.name(), Some("web01"));
        assert_eq!(r.attribute("profile"), Some(&json!("centos7-x86_64")));
        assert_eq!(
            r.render(Field::Comment, Format::Native),
            Rendered::Native(json!({"owner": "ops"}))
        );
    }

    #[test]
    fn test_sd003_missing_and_null_maps_normalized() {
        let raw = json!({"name": "bare", "ks_meta": null, "comment": ""});
        let r = TrackedRecord::from_mapping(raw.as_object().unwrap());
        assert_eq!(r.value(Field::KsMeta), &FieldValue::Map(IndexMap::new()));
        assert_eq!(r.value(Field::Comment), &FieldValue::Map(IndexMap::new()));
        assert_eq!(r.value(Field::MgmtClasses), &FieldValue::List(vec![]));
        assert!(!r.is_changed());
    }

    #[test]
    fn test_sd003_merge_empty_not_changed() {
        let mut r = fetched();
        r.ks_meta(&json!({}), Mode::Merge, Format::Native);
        r.comment(&Value::Null, Mode::Merge, Format::Native);
        r.mgmt_classes(&json!([]), Mode::Merge, Format::Native);
        assert!(!r.is_changed());
    }

    #[test]
    fn test_sd003_replace_with_same_not_changed() {
        let mut r = fetched();
        r.ks_meta(
            &json!({"tree": "http://mirror/os", "lang": "en"}),
            Mode::Replace,
            Format::Native,
        );
        r.mgmt_classes(&json!(["base", "web"]), Mode::Replace, Format::Native);
        assert!(!r.is_changed());
    }

    #[test]
    fn test_sd003_list_replace_empty_guard() {
        let mut r = fetched();
        let out = r.mgmt_classes(&json!([]), Mode::Replace, Format::Joined);
        assert_eq!(out.as_text(), Some("base web"));
        assert!(!r.is_changed());
    }

    #[test]
    fn test_sd003_comment_joined() {
        let mut r = TrackedRecord::new();
        let out = r.comment(&json!({"note": "x"}), Mode::Merge, Format::Joined);
        assert_eq!(out.as_text(), Some("note=x"));
        assert_eq!(r.changes().collect::<Vec<_>>(), vec![Field::Comment]);
    }

    #[test]
    fn test_sd003_json_text_input() {
        let mut r = fetched();
        let out = r.ks_meta(&json!(r#"{"lang":"de"}"#), Mode::Merge, Format::Joined);
        assert_eq!(out.as_text(), Some("tree=http://mirror/os lang=de"));
        assert!(r.is_changed());
    }

    #[test]
    fn test_sd003_restore_leaves_change_set() {
        let mut r = fetched();
        r.ks_meta(&json!({"lang": "de"}), Mode::Merge, Format::Native);
        assert!(r.is_changed());
        r.ks_meta(&json!({"lang": "en"}), Mode::Merge, Format::Native);
        assert!(!r.is_changed());
    }

    #[test]
    fn test_sd003_reset_rebaselines() {
        let mut r = fetched();
        r.mgmt_classes(&json!(["db"]), Mode::Merge, Format::Native);
        r.reset();
        assert!(!r.is_changed());
        assert_eq!(
            r.value(Field::MgmtClasses),
            &FieldValue::List(vec!["base".into(), "web".into(), "db".into()])
        );
    }

    #[test]
    fn test_sd003_change_order_is_first_change() {
        let mut r = fetched();
        r.mgmt_classes(&json!(["db"]), Mode::Merge, Format::Native);
        r.comment(&json!({"note": "moved"}), Mode::Merge, Format::Native);
        r.mgmt_classes(&json!(["cache"]), Mode::Merge, Format::Native);
        assert_eq!(
            r.changes().collect::<Vec<_>>(),
            vec![Field::MgmtClasses, Field::Comment]
        );
    }

    #[test]
    fn test_sd003_to_mapping_roundtrip() {
        let r = fetched();
        let back = TrackedRecord::from_mapping(&r.to_mapping());
        assert_eq!(back, r);
        assert_eq!(r.to_mapping()["comment"], json!(r#"{"owner":"ops"}"#));
    }

    fn annotated() -> TrackedRecord {
        let raw = json!({
            "name": "db01",
            "comment": "rack 4, owned by ops",
            "ks_meta": {"tree": "http://mirror/os"},
            "mgmt_classes": "<<inherit>>",
        });
        TrackedRecord::from_mapping(raw.as_object().unwrap())
    }

    #[test]
    fn test_sd003_undecodable_values_kept_verbatim() {
        let r = annotated();
        assert!(!r.is_changed());
        assert_eq!(r.raw(Field::Comment), Some(&json!("rack 4, owned by ops")));
        assert_eq!(r.raw(Field::MgmtClasses), Some(&json!("<<inherit>>")));
        assert_eq!(r.raw(Field::KsMeta), None);

        let out = r.to_mapping();
        assert_eq!(out["comment"], json!("rack 4, owned by ops"));
        assert_eq!(out["mgmt_classes"], json!("<<inherit>>"));
        assert_eq!(out["ks_meta"], json!({"tree": "http://mirror/os"}));
        assert_eq!(TrackedRecord::from_mapping(&out), r);
        assert!(r.emit_edit().is_noop());
    }

    #[test]
    fn test_sd003_update_replaces_undecodable_value() {
        let mut r = annotated();
        r.comment(&json!({"note": "x"}), Mode::Merge, Format::Native);
        assert_eq!(r.changes().collect::<Vec<_>>(), vec![Field::Comment]);
        assert_eq!(r.to_mapping()["comment"], json!(r#"{"note":"x"}"#));
        assert_eq!(r.to_mapping()["mgmt_classes"], json!("<<inherit>>"));

        // back to the baseline: the fetched text is what the record holds again
        r.comment(&json!({}), Mode::Replace, Format::Native);
        assert!(!r.is_changed());
        assert_eq!(r.to_mapping()["comment"], json!("rack 4, owned by ops"));
    }

    #[test]
    fn test_sd003_reset_drops_overwritten_raw() {
        let mut r = annotated();
        r.mgmt_classes(&json!(["web"]), Mode::Merge, Format::Native);
        r.reset();
        assert_eq!(r.raw(Field::MgmtClasses), None);
        assert_eq!(r.raw(Field::Comment), Some(&json!("rack 4, owned by ops")));
        assert_eq!(r.to_mapping()["mgmt_classes"], json!(["web"]));
    }

    #[test]
    fn test_sd003_from_json() {
        let r = TrackedRecord::from_json(r#"{"name":"db01","ks_meta":{"a":"1"}}"#).unwrap();
        assert_eq!(r.name(), Some("db01"));
        assert!(TrackedRecord::from_json("[1]").unwrap_err().contains("an array"));
        assert!(TrackedRecord::from_json("{").is_err());
    }

    fn arb_update() -> impl Strategy<Value = (usize, Value, Mode)> {
        let value = prop_oneof![
            proptest::collection::btree_map("[a-c]", "[x-z]", 0..3)
                .prop_map(|m| json!(m)),
            proptest::collection::vec("[a-c]", 0..3).prop_map(|l| json!(l)),
            Just(Value::Null),
        ];
        let mode = prop_oneof![Just(Mode::Merge), Just(Mode::Replace)];
        (0..Field::ALL.len(), value, mode)
    }

    proptest! {
        #[test]
        fn prop_sd003_change_set_is_exact_diff(
            updates in proptest::collection::vec(arb_update(), 0..12)
        ) {
            let mut r = fetched();
            let baseline = r.clone();
            for (idx, value, mode) in updates {
                r.update(Field::ALL[idx], &value, mode, Format::Native);
            }
            for f in Field::ALL {
                let differs = r.value(f) != baseline.value(f);
                prop_assert_eq!(r.changes().any(|c| c == f), differs);
            }
        }
    }
}
