use std::time::{Duration, Instant};

/// Split the first complete line off `buf`.
///
/// Bytes up to and including the first `\n` are removed from the buffer,
/// decoded lossily (invalid UTF-8 is dropped, not fatal) and trimmed.
/// Blank lines are consumed and skipped. Returns `None` while no complete
/// non-blank line is buffered.
pub fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw).replace('\u{FFFD}', "");
        let line = text.trim();
        if !line.is_empty() {
            return Some(line.to_string());
        }
    }
    None
}

/// Time left until `deadline`, or `None` once it has passed.
#[inline]
pub fn remaining_until(deadline: Instant, now: Instant) -> Option<Duration> {
    let left = deadline.saturating_duration_since(now);
    if left.is_zero() { None } else { Some(left) }
}
