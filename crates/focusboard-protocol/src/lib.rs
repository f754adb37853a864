use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FIELD_ID: &str = "id";
pub const FIELD_MONGO_ID: &str = "_id";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_COMPLETED: &str = "completed";
pub const FIELD_DONE: &str = "done";
pub const FIELD_IMPORTANCE: &str = "importance";
pub const FIELD_ESTIMATED_TIME: &str = "estimatedTime";
pub const FIELD_COUNT: &str = "count";
pub const FIELD_COMFORT_MESSAGE: &str = "aiComfortMessage";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_IS_FOCUS: &str = "isFocus";
pub const FIELD_CREATED_AT: &str = "createdAt";

/// Every field name the normalizer interprets. Anything else on a record is
/// carried through untouched.
pub const KNOWN_FIELDS: &[&str] = &[
    FIELD_ID,
    FIELD_MONGO_ID,
    FIELD_TITLE,
    FIELD_TEXT,
    FIELD_COMPLETED,
    FIELD_DONE,
    FIELD_IMPORTANCE,
    FIELD_ESTIMATED_TIME,
    FIELD_COUNT,
    FIELD_COMFORT_MESSAGE,
    FIELD_CATEGORY,
    FIELD_IS_FOCUS,
    FIELD_CREATED_AT,
];

/// A task record exactly as a remote store returned it.
///
/// Both backends are loose about field names and types, so the record is
/// kept as a JSON object and read through tolerant accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTask(pub Map<String, Value>);

impl RawTask {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First non-empty string among `keys`. Numbers are stringified so
    /// numeric ids still resolve.
    pub fn str_field(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.0.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        let value = self.0.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_owned(), value);
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.insert(FIELD_ID, Value::String(id.to_owned()));
        self
    }
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub importance: i64,
    #[serde(rename = "estimatedTime")]
    pub estimated_time: i64,
    pub completed: bool,
    pub count: i64,
    #[serde(rename = "aiComfortMessage")]
    pub comfort_message: String,
    pub category: String,
    #[serde(rename = "isFocus")]
    pub is_focus: bool,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl NewTask {
    pub fn to_raw(&self) -> RawTask {
        serde_json::to_value(self)
            .ok()
            .and_then(RawTask::from_value)
            .unwrap_or_default()
    }
}

/// Partial update body. Only the fields that are set go on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            ..Default::default()
        }
    }
}

/// `{"data": ...}` wrapper used by the REST API for both lists and items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataEnvelope {
    #[serde(default)]
    pub data: Option<Value>,
}

/// Response of a realtime-database `POST`: the generated child key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKey {
    pub name: String,
}

/// Payload of a realtime `put`/`patch` stream event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChange {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

pub const STREAM_PUT: &str = "put";
pub const STREAM_PATCH: &str = "patch";
pub const STREAM_KEEP_ALIVE: &str = "keep-alive";
pub const STREAM_CANCEL: &str = "cancel";
pub const STREAM_AUTH_REVOKED: &str = "auth_revoked";

/// Records from a REST list body: `{"data": [...]}` or a bare array.
pub fn records_from_list_body(body: Value) -> Vec<RawTask> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items.into_iter().filter_map(RawTask::from_value).collect()
}

/// The created/updated record from a REST item body, if the server sent one.
pub fn record_from_item_body(body: Value) -> Option<RawTask> {
    let envelope: DataEnvelope = serde_json::from_value(body).ok()?;
    RawTask::from_value(envelope.data?)
}

/// Records from a realtime snapshot: a map of child key to record, or `null`
/// when the path does not exist. The child key becomes the record id.
pub fn records_from_snapshot(body: Value) -> Vec<RawTask> {
    let Value::Object(children) = body else {
        return Vec::new();
    };
    children
        .into_iter()
        .filter_map(|(key, value)| RawTask::from_value(value).map(|raw| raw.with_id(&key)))
        .collect()
}
