//! Canonical task record and the normalizer that builds it from whatever a
//! remote store sent.
//!
//! # Invariants
//! - `normalize` never fails; every missing or mistyped field has a default.
//! - Fields the client does not interpret are kept in `extra` and written
//!   back out unchanged.

use focusboard_protocol::{
    NewTask, RawTask, FIELD_CATEGORY, FIELD_COMFORT_MESSAGE, FIELD_COMPLETED, FIELD_COUNT,
    FIELD_CREATED_AT, FIELD_DONE, FIELD_ESTIMATED_TIME, FIELD_ID, FIELD_IMPORTANCE, FIELD_IS_FOCUS,
    FIELD_MONGO_ID, FIELD_TEXT, FIELD_TITLE, KNOWN_FIELDS,
};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;
use time::macros::format_description;

pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_IMPORTANCE: i64 = 2;
/// Estimate attached to every task created from this client.
pub const NEW_TASK_ESTIMATED_MINUTES: i64 = 40;

pub type TaskId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub done: bool,
    pub category: String,
    pub is_focus: bool,
    pub created_at_ms: u64,

    pub importance: i64,
    pub estimated_minutes: i64,
    pub count: i64,
    pub comfort_message: String,
    pub extra: Map<String, Value>,
}

impl Task {
    /// Read alias of `title` for consumers of the `text` field name.
    pub fn text(&self) -> &str {
        &self.title
    }

    /// Read alias of `done` for consumers of the `completed` field name.
    pub fn completed(&self) -> bool {
        self.done
    }
}

#[derive(Serialize)]
struct TaskWire<'a> {
    id: &'a str,
    title: &'a str,
    text: &'a str,
    done: bool,
    completed: bool,
    category: &'a str,
    #[serde(rename = "isFocus")]
    is_focus: bool,
    #[serde(rename = "createdAt")]
    created_at: u64,
    importance: i64,
    #[serde(rename = "estimatedTime")]
    estimated_time: i64,
    count: i64,
    #[serde(rename = "aiComfortMessage")]
    comfort_message: &'a str,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TaskWire {
            id: &self.id,
            title: &self.title,
            text: &self.title,
            done: self.done,
            completed: self.done,
            category: &self.category,
            is_focus: self.is_focus,
            created_at: self.created_at_ms,
            importance: self.importance,
            estimated_time: self.estimated_minutes,
            count: self.count,
            comfort_message: &self.comfort_message,
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

pub fn normalize(raw: &RawTask, now_ms: u64) -> Task {
    let id = raw
        .str_field(&[FIELD_MONGO_ID, FIELD_ID])
        .unwrap_or_default();
    let title = raw
        .str_field(&[FIELD_TITLE, FIELD_TEXT])
        .unwrap_or_default();
    let done = raw.bool_field(FIELD_COMPLETED) == Some(true)
        || raw.bool_field(FIELD_DONE) == Some(true);
    let category = raw
        .str_field(&[FIELD_CATEGORY])
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());

    let extra = raw
        .0
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Task {
        id,
        title,
        done,
        category,
        is_focus: raw.bool_field(FIELD_IS_FOCUS) == Some(true),
        created_at_ms: parse_created_at(raw.get(FIELD_CREATED_AT)).unwrap_or(now_ms),
        importance: raw.i64_field(FIELD_IMPORTANCE).unwrap_or(DEFAULT_IMPORTANCE),
        estimated_minutes: raw.i64_field(FIELD_ESTIMATED_TIME).unwrap_or(0),
        count: raw.i64_field(FIELD_COUNT).unwrap_or(0),
        comfort_message: raw
            .str_field(&[FIELD_COMFORT_MESSAGE])
            .unwrap_or_default(),
        extra,
    }
}

/// Epoch milliseconds from an RFC 3339 string, a `YYYY-MM-DD` date, a
/// numeric string, or a JSON number.
pub fn parse_created_at(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ms) = s.parse::<u64>() {
        return Some(ms);
    }
    if let Ok(dt) =
        time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
    {
        return u64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok();
    }
    let date = time::Date::parse(s, format_description!("[year]-[month]-[day]")).ok()?;
    let dt = date.midnight().assume_utc();
    u64::try_from(dt.unix_timestamp_nanos() / 1_000_000).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TitleError {
    #[error("title is empty")]
    Empty,
}

pub fn validate_title(title: &str) -> Result<&str, TitleError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TitleError::Empty);
    }
    Ok(trimmed)
}

/// Create payload with the fixed defaults every new task carries.
pub fn new_task_payload(title: &str, category: &str, is_focus: bool) -> NewTask {
    let category = category.trim();
    NewTask {
        title: title.trim().to_owned(),
        importance: DEFAULT_IMPORTANCE,
        estimated_time: NEW_TASK_ESTIMATED_MINUTES,
        completed: false,
        count: 0,
        comfort_message: String::new(),
        category: if category.is_empty() {
            DEFAULT_CATEGORY.to_owned()
        } else {
            category.to_owned()
        },
        is_focus,
        created_at: None,
    }
}

/// Record for a create the store confirmed without echoing it back.
pub fn local_task(id: TaskId, payload: &NewTask, now_ms: u64) -> Task {
    Task {
        id,
        title: payload.title.clone(),
        done: false,
        category: payload.category.clone(),
        is_focus: payload.is_focus,
        created_at_ms: now_ms,
        importance: payload.importance,
        estimated_minutes: payload.estimated_time,
        count: payload.count,
        comfort_message: payload.comfort_message.clone(),
        extra: Map::new(),
    }
}

pub fn local_id(now_ms: u64) -> TaskId {
    format!("local-{}", to_base36(now_ms))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawTask {
        RawTask::from_value(v).unwrap()
    }

    #[test]
    fn normalize_fills_documented_defaults() {
        let task = normalize(&raw(json!({"_id": "a1", "title": "Write"})), 777);
        assert_eq!(task.id, "a1");
        assert_eq!(task.title, "Write");
        assert!(!task.done);
        assert_eq!(task.category, DEFAULT_CATEGORY);
        assert!(!task.is_focus);
        assert_eq!(task.created_at_ms, 777);
        assert_eq!(task.importance, 2);
        assert_eq!(task.estimated_minutes, 0);
        assert_eq!(task.count, 0);
        assert_eq!(task.comfort_message, "");
    }

    #[test]
    fn normalize_unifies_field_name_conventions() {
        let a = normalize(&raw(json!({"id": "x", "text": "hello", "done": true})), 0);
        assert_eq!(a.title, "hello");
        assert!(a.done);
        assert_eq!(a.text(), "hello");
        assert!(a.completed());

        let b = normalize(
            &raw(json!({"_id": "y", "title": "hi", "completed": true})),
            0,
        );
        assert!(b.done);
    }

    #[test]
    fn unparseable_timestamp_falls_back_to_now() {
        let t = normalize(&raw(json!({"id": "x", "createdAt": "yesterday-ish"})), 55);
        assert_eq!(t.created_at_ms, 55);
        let t = normalize(&raw(json!({"id": "x", "createdAt": {"nested": 1}})), 56);
        assert_eq!(t.created_at_ms, 56);
    }

    #[test]
    fn timestamps_parse_from_strings_and_numbers() {
        assert_eq!(
            parse_created_at(Some(&json!("1970-01-01T00:00:01.500Z"))),
            Some(1_500)
        );
        assert_eq!(parse_created_at(Some(&json!("1970-01-02"))), Some(86_400_000));
        assert_eq!(parse_created_at(Some(&json!(1234))), Some(1234));
        assert_eq!(parse_created_at(Some(&json!("99"))), Some(99));
        assert_eq!(parse_created_at(Some(&json!(-5))), None);
        assert_eq!(parse_created_at(None), None);
    }

    #[test]
    fn unknown_fields_pass_through_and_aliases_serialize() {
        let t = normalize(
            &raw(json!({"_id": "a", "title": "t", "priorityColor": "red", "__v": 0})),
            1,
        );
        assert_eq!(t.extra.get("priorityColor"), Some(&json!("red")));
        assert!(!t.extra.contains_key("_id"));

        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["title"], json!("t"));
        assert_eq!(v["text"], json!("t"));
        assert_eq!(v["done"], json!(false));
        assert_eq!(v["completed"], json!(false));
        assert_eq!(v["priorityColor"], json!("red"));
        assert_eq!(v["__v"], json!(0));
    }

    #[test]
    fn validate_title_trims_and_rejects_blank() {
        assert_eq!(validate_title("  milk "), Ok("milk"));
        assert_eq!(validate_title(""), Err(TitleError::Empty));
        assert_eq!(validate_title("   "), Err(TitleError::Empty));
    }

    #[test]
    fn new_task_payload_uses_fixed_defaults() {
        let p = new_task_payload(" Buy milk ", " ", true);
        assert_eq!(p.title, "Buy milk");
        assert_eq!(p.importance, 2);
        assert_eq!(p.estimated_time, 40);
        assert!(!p.completed);
        assert_eq!(p.category, DEFAULT_CATEGORY);
        assert!(p.is_focus);
    }

    #[test]
    fn local_ids_are_base36() {
        assert_eq!(local_id(0), "local-0");
        assert_eq!(local_id(35), "local-z");
        assert_eq!(local_id(36), "local-10");
    }
}
