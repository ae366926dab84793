pub mod blocks;
pub mod receipts;
pub mod traces;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::errors::SyncError;

/// JSON-RPC representation of a response object.
pub fn to_object<T: Serialize>(method: &'static str, value: &T) -> Result<Map<String, Value>, SyncError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(SyncError::Chain {
            method,
            message: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(SyncError::Chain {
            method,
            message: e.to_string(),
        }),
    }
}
