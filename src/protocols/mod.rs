//! Protocol implementations.
//!
//! Protocols are pure byte transformations used by the runtime event loop;
//! they never touch sockets.
//!
//! - `echo`: newline-delimited line echo

pub mod echo;
