//! Outward-facing services: the audio blob store and the HTTP/push surface.

pub mod audio;
pub mod http;
