//! Line framer for the echo protocol.

use bytes::BytesMut;

/// Line delimiter.
pub const DELIMITER: u8 = b'\n';

/// Move every complete line from `inbound` to the end of `outbound`.
///
/// A line is everything up to and including the first `\n`. Lines are
/// copied verbatim. Whatever follows the last delimiter stays in `inbound`
/// until a later read completes it.
///
/// `scanned` is how many leading bytes of `inbound` are already known to
/// hold no delimiter (the fragment left by earlier calls), so a long
/// unterminated line is searched once rather than on every read.
///
/// Returns the number of lines moved.
pub fn frame_lines(inbound: &mut BytesMut, outbound: &mut BytesMut, scanned: usize) -> usize {
    let mut lines = 0;
    let mut from = scanned.min(inbound.len());

    while let Some(pos) = find_delimiter(&inbound[from..]) {
        let line = inbound.split_to(from + pos + 1);
        outbound.extend_from_slice(&line);
        lines += 1;
        from = 0;
    }

    lines
}

/// Position of the first delimiter in `buffer`.
fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == DELIMITER)
}
