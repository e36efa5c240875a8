//! Error types for the voicelink client.

use thiserror::Error;

/// Errors from the local audio encode/decode path.
///
/// A malformed fragment is dropped by the caller; it never ends the
/// conversation.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid transport encoding: {0}")]
    InvalidEncoding(String),

    #[error("PCM payload of {len} bytes is not a whole number of {channels}-channel frames")]
    TruncatedFrame { len: usize, channels: u16 },
}

/// Errors from the microphone capture path.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture device could not be acquired. Terminal for the
    /// conversation attempt; the user must fix device access and re-enter.
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    #[error("capture stream error: {0}")]
    Stream(String),
}

/// Session-level errors. Terminal for the conversation attempt.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("session handshake timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("session error: {0}")]
    Session(String),
}

/// Errors from the request/response generation calls. Isolated to the
/// affected exchange; conversation/session state is untouched.
#[derive(Error, Debug)]
pub enum RemoteCallError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("operation did not finish within {0} polls")]
    PollExhausted(u32),
}
