use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// The part of an S3 notification record this function reads.
///
/// Only presence is required along `s3.bucket.name` and `s3.object.key`; the
/// leaf values are taken as they come.
#[derive(Deserialize)]
struct Record {
    s3: Entity,
}

#[derive(Deserialize)]
struct Entity {
    #[serde(rename = "bucket")]
    _bucket: Bucket,
    object: Object,
}

#[derive(Deserialize)]
struct Bucket {
    #[serde(rename = "name")]
    _name: IgnoredAny,
}

#[derive(Deserialize)]
struct Object {
    key: Value,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("event is not a JSON object")]
    EventNotAnObject,
    #[error("'Records' is not a list")]
    RecordsNotAList,
    #[error("record {index}: {source}")]
    Malformed {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Returns a single-pass iterator over the object keys named by `event["Records"]`.
///
/// A missing `Records` key yields nothing. Each record is decoded only when the
/// iterator reaches it, so a malformed record surfaces after the ones before it.
pub fn object_keys(
    event: &Value,
) -> Result<impl Iterator<Item = Result<String, ExtractError>> + '_, ExtractError> {
    let event = event.as_object().ok_or(ExtractError::EventNotAnObject)?;

    let records: &[Value] = match event.get("Records") {
        None => &[],
        Some(Value::Array(records)) => records,
        Some(_) => return Err(ExtractError::RecordsNotAList),
    };

    Ok(records
        .iter()
        .enumerate()
        .map(|(index, record)| object_key(index, record)))
}

fn object_key(index: usize, record: &Value) -> Result<String, ExtractError> {
    let record = Record::deserialize(record)
        .map_err(|source| ExtractError::Malformed { index, source })?;

    // Strings are shown bare, anything else as JSON.
    Ok(match record.s3.object.key {
        Value::String(key) => key,
        other => other.to_string(),
    })
}
