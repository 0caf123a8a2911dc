//! Agora relay service.
//!
//! Thin browser-facing frontend for the deliberation pipeline: accepts an
//! evaluation request, forwards it upstream, and normalizes whatever comes
//! back (a live event stream or a buffered JSON result) into one SSE
//! stream of pipeline events.

pub mod routes;
