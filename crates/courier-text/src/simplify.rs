//! Message text simplification.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Source format of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeFormat {
    Plain,
    Html,
}

/// Prepare a decoded message body for display.
///
/// Returns an owned copy of the input; empty input yields an empty buffer.
///
/// The returned bytes are currently an exact copy regardless of `format`.
/// HTML-to-text conversion and trailing-quote stripping will hook in here;
/// the format tag is part of the signature now so call sites won't change
/// when they do.
pub fn simplify(input: &[u8], format: MimeFormat) -> Vec<u8> {
    if input.is_empty() {
        return Vec::new();
    }
    trace!(bytes = input.len(), ?format, "Simplifying message text");
    input.to_vec()
}
