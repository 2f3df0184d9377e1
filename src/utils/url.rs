//! URL-encoding of path components.
//!
//! The hub expects the same encoding for device ids in request paths, in the
//! `iothub-to` header and in the SAS resource URI, so everything goes through
//! [`encode`].

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Bytes escaped in a path component: everything except ASCII alphanumerics
/// and `!()*-._`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// Percent-encodes `input`, keeping ASCII alphanumerics and `!()*-._`.
///
/// Every other byte of the UTF-8 representation becomes `%xx` (lowercase hex).
pub fn encode(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT)
        .map(|chunk| {
            if chunk.starts_with('%') {
                chunk.to_ascii_lowercase()
            } else {
                chunk.to_string()
            }
        })
        .collect()
}
