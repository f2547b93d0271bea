//! Line echo protocol.
//!
//! Plain text over TCP. The unit of meaning is a line terminated by a single
//! `\n` byte. Every complete line is written back to its sender unchanged,
//! terminator included:
//!
//! ```text
//! Request:  ping\n
//! Response: ping\n
//! ```
//!
//! There is no handshake, no length prefix and no `\r` stripping. A line may
//! arrive in any number of reads, and one read may carry several lines.

pub mod framer;

pub use framer::frame_lines;
