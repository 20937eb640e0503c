//! Wire format of the homework status API and its validation.

use chrono::{DateTime, Utc};
use hwbot_core::error::{HwBotError, Result};
use hwbot_core::types::{Homework, HomeworkStatus, StatusPage};
use serde::Deserialize;
use serde_json::Value;

/// One entry of the `homeworks` list.
///
/// Only `homework_name` and `status` are required. The remaining fields are
/// informational and an unexpected type is treated as absent.
#[derive(Debug, Deserialize)]
pub struct RawHomework {
    pub homework_name: String,
    pub status: HomeworkStatus,
    pub id: Option<Value>,
    pub reviewer_comment: Option<Value>,
    pub lesson_name: Option<Value>,
    pub date_updated: Option<Value>,
}

impl From<RawHomework> for Homework {
    fn from(raw: RawHomework) -> Self {
        let text = |v: Option<Value>| match v {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };
        Homework {
            name: raw.homework_name,
            id: raw.id.as_ref().and_then(Value::as_i64),
            status: raw.status,
            reviewer_comment: text(raw.reviewer_comment),
            lesson_name: text(raw.lesson_name),
            updated_at: raw.date_updated.as_ref().and_then(timestamp),
        }
    }
}

/// `date_updated` arrives either as RFC 3339 text or as unix seconds.
fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Index of the most recently updated entry. Entries without a usable
/// `date_updated` rank lowest; ties keep list order (the API lists newest first).
fn latest_index(homeworks: &[Value]) -> usize {
    let mut best = 0;
    let mut best_at = None;
    for (i, entry) in homeworks.iter().enumerate() {
        let at = entry.get("date_updated").and_then(timestamp);
        if i == 0 || at > best_at {
            best = i;
            best_at = at;
        }
    }
    best
}

/// Validate a response body and keep only the most recent homework.
///
/// Older entries are never inspected beyond their timestamp, so a malformed
/// historical record cannot block the current one.
pub fn parse_response(body: &str) -> Result<StatusPage> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| HwBotError::Parse(format!("body is not valid JSON: {e}")))?;

    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(HwBotError::Parse(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            )));
        }
    };
    let mut homeworks = match object.remove("homeworks") {
        None => return Err(HwBotError::Parse("missing `homeworks` key".into())),
        Some(Value::Array(list)) => list,
        Some(other) => {
            return Err(HwBotError::Parse(format!(
                "`homeworks` must be a list, got {}",
                json_type(&other)
            )));
        }
    };
    let current_date = object.get("current_date").and_then(Value::as_i64);

    let homework = if homeworks.is_empty() {
        None
    } else {
        let latest = homeworks.swap_remove(latest_index(&homeworks));
        let raw: RawHomework = serde_json::from_value(latest)
            .map_err(|e| HwBotError::Parse(format!("malformed homework entry: {e}")))?;
        Some(Homework::from(raw))
    };

    Ok(StatusPage {
        homework,
        current_date,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
