//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding a single frame.
///
/// A `Decode` error is scoped to the offending frame: the connection
/// discards that frame, logs the error, and keeps reading. It never
/// tears down the stream by itself.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound command failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// An inbound frame was not a valid event record.
    ///
    /// Common causes: malformed JSON, a record that is not an object,
    /// missing required fields, or invalid UTF-8 in the frame body.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
