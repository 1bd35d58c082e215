pub mod json;

pub use json::{Canonical, JsonCodec};

use serde_json::Value;

use crate::QueueResult;

/// Canonical string form used to compare argument sets byte-for-byte
pub fn canonical_json(value: &Value) -> QueueResult<String> {
    JsonCodec.canonical(value)
}
