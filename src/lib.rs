//! voicelink - a native multimodal chat client for a hosted generative-AI
//! service.
//!
//! The core is the realtime voice conversation: microphone capture feeds a
//! websocket session as base64 PCM; inbound transcription deltas and audio
//! fragments are assembled into turns and scheduled for gapless playback,
//! with server-signaled barge-in cancelling everything queued. Text, image,
//! video, and speech generation are plain request/response calls.

pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod protocol;
pub mod remote;
pub mod session;
pub mod turns;
