//! Built-in JSON formatting with [`serde_json`](serde_json).
//!
//! Structured bodies and error bodies serialize through this formatter by
//! default; raw byte bodies pass through untouched so handlers can stream
//! pre-encoded JSON if they have it.
use crate::content::{Formatter, SerializationError};
use crate::response::Body;

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, body: &Body) -> Result<Vec<u8>, SerializationError> {
        match body {
            Body::Json(value) => {
                serde_json::to_vec(value).map_err(|e| SerializationError::new(&e.to_string()))
            }
            Body::Text(text) => {
                serde_json::to_vec(text).map_err(|e| SerializationError::new(&e.to_string()))
            }
            Body::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}
