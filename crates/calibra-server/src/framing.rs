//! Sentinel framing for the generation stream.
//!
//! The body is plain text. A meta block precedes the generated text and a
//! result (or error) block follows it, so a client can render text as it
//! arrives and still recover structured data at the end.

use serde::Serialize;

const META_OPEN: &str = "\u{1e}[[CALIBRA:META]]";
const META_CLOSE: &str = "[[/CALIBRA:META]]\n";
const RESULT_OPEN: &str = "\n[[CALIBRA:RESULT]]";
const RESULT_CLOSE: &str = "[[/CALIBRA:RESULT]]";
const ERROR_OPEN: &str = "\n[[CALIBRA:ERROR]]";
const ERROR_CLOSE: &str = "[[/CALIBRA:ERROR]]";

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn meta_block<T: Serialize>(meta: &T) -> String {
    format!("{}{}{}", META_OPEN, to_json(meta), META_CLOSE)
}

pub fn result_block<T: Serialize>(result: &T) -> String {
    format!("{}{}{}", RESULT_OPEN, to_json(result), RESULT_CLOSE)
}

pub fn error_block(message: &str) -> String {
    let body = serde_json::json!({ "error": message });
    format!("{}{}{}", ERROR_OPEN, body, ERROR_CLOSE)
}
