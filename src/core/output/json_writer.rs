//! JSON export of the raw fetched messages.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::message::Message;

/// Writes messages to a JSON file as an array, in API (newest-first) order.
///
/// # Format
/// ```json
/// [
///   {"id": "M2", "personEmail": "bob@example.com", "created": "...", "text": "Hi"},
///   {"id": "M1", "personEmail": "alice@example.com", "created": "...", "text": "Hello"}
/// ]
/// ```
pub fn write_json(messages: &[Message], output_path: &Path) -> Result<()> {
    let json = to_json(messages)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Converts messages to a pretty-printed JSON array.
pub fn to_json(messages: &[Message]) -> Result<String> {
    Ok(serde_json::to_string_pretty(messages)?)
}
