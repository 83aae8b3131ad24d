//! Request data extraction.
//!
//! # Responsibilities
//! - Build the query, header and body bags the orchestrator validates
//! - Parse JSON and urlencoded bodies
//!
//! # Design Decisions
//! - Values stay strings; only the query bag is coerced, later, by the orchestrator
//! - Repeated query or form keys become arrays
//! - Header names are lowercase; repeated headers are joined with ", "
//! - Content types the gate does not parse yield an empty body bag

use axum::http::HeaderMap;
use serde_json::Value;

use crate::http::error::RequestError;
use crate::validation::DataBag;

/// Bag for a raw query string (without the leading `?`).
pub fn query_bag(query: Option<&str>) -> DataBag {
    query.map(|q| urlencoded_bag(q.as_bytes())).unwrap_or_default()
}

pub fn header_bag(headers: &HeaderMap) -> DataBag {
    let mut bag = DataBag::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        bag.insert(name.as_str().to_string(), Value::String(joined));
    }
    bag
}

/// Parse a buffered body according to its content type.
pub fn body_bag(content_type: Option<&str>, bytes: &[u8]) -> Result<DataBag, RequestError> {
    if bytes.is_empty() {
        return Ok(DataBag::new());
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        return match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(map) => Ok(map),
            _ => Err(RequestError::BodyNotObject),
        };
    }

    if mime == "application/x-www-form-urlencoded" {
        return Ok(urlencoded_bag(bytes));
    }

    tracing::debug!(content_type = %mime, "Body not parsed");
    Ok(DataBag::new())
}

fn urlencoded_bag(input: &[u8]) -> DataBag {
    let mut bag = DataBag::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        match bag.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                bag.insert(key.into_owned(), value);
            }
        }
    }
    bag
}
