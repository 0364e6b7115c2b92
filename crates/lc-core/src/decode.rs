//! Strict percent decoding
//!
//! Mirrors `decodeURIComponent`: every `%XX` escape is decoded, the decoded
//! bytes must form valid UTF-8, and anything malformed is an error rather than
//! being passed through.

/// Error returned for a malformed escape sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Byte offset of a `%` not followed by two hex digits
    #[error("Malformed escape at byte {0}")]
    MalformedEscape(usize),
    /// Offset into the decoded bytes where valid UTF-8 ends
    #[error("Invalid UTF-8 after {0} decoded bytes")]
    InvalidUtf8(usize),
}

/// Percent-decode a URI component.
pub fn decode_uri_component(src: &str) -> Result<String, DecodeError> {
    validate_escapes(src.as_bytes())?;

    let bytes = urlencoding::decode_binary(src.as_bytes()).into_owned();
    String::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8(e.utf8_error().valid_up_to()))
}

/// `urlencoding` passes bad escapes through unchanged, so reject them first.
fn validate_escapes(bytes: &[u8]) -> Result<(), DecodeError> {
    for (offset, _) in bytes.iter().enumerate().filter(|&(_, &b)| b == b'%') {
        let well_formed = bytes
            .get(offset + 1..offset + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(DecodeError::MalformedEscape(offset));
        }
    }
    Ok(())
}
