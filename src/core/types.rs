//! SD-001: Field model. The closed set of tracked record fields.
//!
//! Every tracked field has a kind (text, map, list) that selects its merge,
//! replace and render rules, and an external flag spelling used when the
//! change set is turned into a `cobbler system edit` invocation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Fields
// ============================================================================

/// A tracked field of a system record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Free-text comment. Holds a mapping the remote side stores as JSON text.
    Comment,
    /// Kickstart metadata (`key=value` pairs).
    KsMeta,
    /// Management classes.
    MgmtClasses,
}

impl Field {
    /// Every tracked field, in record order.
    pub const ALL: [Field; 3] = [Field::Comment, Field::KsMeta, Field::MgmtClasses];

    /// Attribute name in the remote record.
    pub fn name(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::KsMeta => "ks_meta",
            Self::MgmtClasses => "mgmt_classes",
        }
    }

    /// Look up a field by its remote attribute name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Comment => FieldKind::Text,
            Self::KsMeta => FieldKind::Map,
            Self::MgmtClasses => FieldKind::List,
        }
    }

    /// Command-line flag name (without the leading `--`).
    pub fn flag(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::KsMeta => "ksmeta",
            Self::MgmtClasses => "mgmt-classes",
        }
    }

    /// Format used when embedding the value in an edit command.
    pub fn command_format(self) -> Format {
        match self.kind() {
            FieldKind::Text => Format::Json,
            FieldKind::Map | FieldKind::List => Format::Joined,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Value kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Text stored remotely, modeled locally as a mapping.
    Text,
    Map,
    List,
}

impl FieldKind {
    /// The empty value for this kind.
    pub fn empty(self) -> FieldValue {
        match self {
            Self::Text | Self::Map => FieldValue::Map(IndexMap::new()),
            Self::List => FieldValue::List(Vec::new()),
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// Current value of a tracked field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Map(IndexMap<String, String>),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(m) => m.is_empty(),
            Self::List(l) => l.is_empty(),
        }
    }

    /// Structured form.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Map(m) => serde_json::Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
            Self::List(l) => serde_json::Value::Array(
                l.iter().cloned().map(serde_json::Value::String).collect(),
            ),
        }
    }

    /// Compact JSON text.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Space-joined `key=value` pairs or bare elements. One-way; not parsed back.
    pub fn to_joined(&self) -> String {
        match self {
            Self::Map(m) => m
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" "),
            Self::List(l) => l.join(" "),
        }
    }

    pub fn render(&self, format: Format) -> Rendered {
        match format {
            Format::Native => Rendered::Native(self.to_value()),
            Format::Json => Rendered::Text(self.to_json()),
            Format::Joined => Rendered::Text(self.to_joined()),
        }
    }
}

/// How an update combines with the existing value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Merge,
    Replace,
}

/// Output rendering of a field accessor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    #[default]
    Native,
    Json,
    Joined,
}

/// A rendered field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Native(serde_json::Value),
    Text(String),
}

impl Rendered {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Native(_) => None,
        }
    }

    pub fn as_native(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Native(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}
