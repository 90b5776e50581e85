//! Turns loosely-shaped queue payloads into canonical [`JobRecord`]s.
//!
//! Queue payloads vary in where they keep the run identity (inside `data` or
//! at the top level) and how they encode timestamps (RFC 3339 strings or
//! epoch milliseconds). Everything downstream only sees `JobRecord`.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::NormalizeError;
use crate::job::{JobApproval, JobRecord, ParentRef};

type Object = Map<String, Value>;

/// Looks `key` up in `data` first, then at the top level.
fn lookup<'a>(job: &'a Object, data: Option<&'a Object>, key: &str) -> Option<&'a Value> {
    data.and_then(|d| d.get(key))
        .filter(|v| !v.is_null())
        .or_else(|| job.get(key).filter(|v| !v.is_null()))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_timestamp(field: &'static str, value: &Value) -> Result<DateTime<Utc>, NormalizeError> {
    let invalid = || NormalizeError::InvalidTimestamp {
        field,
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(invalid)?;
            Utc.timestamp_millis_opt(millis).single().ok_or_else(invalid)
        }
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            let millis: i64 = s.trim().parse().map_err(|_| invalid())?;
            Utc.timestamp_millis_opt(millis).single().ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

/// Reads the first present key among `keys` as an optional timestamp.
fn optional_timestamp(
    job: &Object,
    keys: &[&'static str],
) -> Result<Option<DateTime<Utc>>, NormalizeError> {
    for &key in keys {
        if let Some(value) = job.get(key).filter(|v| !v.is_null()) {
            return parse_timestamp(key, value).map(Some);
        }
    }
    Ok(None)
}

fn read_approval(value: &Value) -> Option<JobApproval> {
    let obj = value.as_object()?;
    Some(JobApproval {
        required: obj.get("required").and_then(Value::as_bool).unwrap_or(false),
        approved: obj.get("approved").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn read_parent(value: &Value) -> Option<ParentRef> {
    let obj = value.as_object()?;
    let stage_id = obj
        .get("queue")
        .or_else(|| obj.get("stageId"))
        .and_then(as_text)?;
    let job_id = obj.get("id").and_then(as_text)?;
    Some(ParentRef { stage_id, job_id })
}

fn read_stacktrace(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(lines) => {
            let lines: Vec<&str> = lines.iter().filter_map(Value::as_str).collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        _ => None,
    }
}

/// Builds a [`JobRecord`] for `stage_id` from one raw payload.
///
/// `id`, `entityKey`, `threadId` and `createdAt` (or `timestamp`) are
/// required. Unknown fields are ignored.
pub fn normalize_job(stage_id: &str, raw: &Value) -> Result<JobRecord, NormalizeError> {
    let job = raw.as_object().ok_or(NormalizeError::NotAnObject)?;
    let data = job.get("data").and_then(Value::as_object);

    let id = job
        .get("id")
        .and_then(as_text)
        .ok_or(NormalizeError::MissingField("id"))?;
    let entity_key = lookup(job, data, "entityKey")
        .and_then(as_text)
        .ok_or(NormalizeError::MissingField("entityKey"))?;
    let thread_id = lookup(job, data, "threadId")
        .and_then(as_text)
        .ok_or(NormalizeError::MissingField("threadId"))?;
    let created_at = optional_timestamp(job, &["createdAt", "timestamp"])?
        .ok_or(NormalizeError::MissingField("createdAt"))?;

    let failed_reason = job
        .get("failedReason")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let failed =
        job.get("failed").and_then(Value::as_bool).unwrap_or(false) || failed_reason.is_some();

    Ok(JobRecord {
        id,
        stage_id: stage_id.to_string(),
        entity_key,
        year: lookup(job, data, "year").and_then(as_year),
        thread_id,
        created_at,
        started_at: optional_timestamp(job, &["startedAt", "processedOn"])?,
        finished_at: optional_timestamp(job, &["finishedAt", "finishedOn"])?,
        failed,
        failed_reason,
        stacktrace: job.get("stacktrace").and_then(read_stacktrace),
        approval: lookup(job, data, "approval").and_then(read_approval),
        parent: job.get("parent").and_then(read_parent),
        attempts_made: job
            .get("attemptsMade")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
    })
}

/// Normalizes a page of payloads, skipping the ones that do not parse.
///
/// Returns the records and the number of payloads skipped.
pub fn normalize_page(stage_id: &str, raw: &[Value]) -> (Vec<JobRecord>, usize) {
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for value in raw {
        match normalize_job(stage_id, value) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping job payload on stage {}: {}", stage_id, e);
            }
        }
    }

    (records, skipped)
}
