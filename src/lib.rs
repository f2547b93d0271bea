//! line-echo: a single-threaded TCP line-echo service.
//!
//! The server accepts any number of concurrent connections on one thread,
//! reads newline-delimited text and writes every complete line back to its
//! sender unchanged. A companion client sends stdin line by line and prints
//! the echoes.
//!
//! Known limitations: idle or slow peers are never timed out, and buffers are
//! unbounded unless `max_buffer_bytes` is configured.

pub mod client;
pub mod config;
pub mod protocols;
pub mod runtime;
