// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outbound frame size validation.

/// Frames past this log a warning; something upstream forgot summary-only
/// completion.
pub const OUTBOUND_WARN_THRESHOLD: usize = 1024 * 1024;

/// Platform frame ceiling. At or past this the socket closes 1009.
pub const OUTBOUND_HARD_LIMIT: usize = 32 * 1024 * 1024;

/// Verdict on one outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    Ok,
    /// Over 1 MB: send, but warn.
    Warn(usize),
    /// Over 32 MiB: do not send; close 1009.
    TooLarge(usize),
}

/// Classify an outbound text frame by UTF-8 byte length.
pub fn check_outbound_size(text: &str) -> SizeCheck {
    let bytes = text.len();
    if bytes > OUTBOUND_HARD_LIMIT {
        SizeCheck::TooLarge(bytes)
    } else if bytes > OUTBOUND_WARN_THRESHOLD {
        SizeCheck::Warn(bytes)
    } else {
        SizeCheck::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_frames_pass() {
        assert_eq!(check_outbound_size("{\"type\":\"pong\"}"), SizeCheck::Ok);
    }

    #[test]
    fn warn_threshold_is_exclusive() {
        let exactly = "x".repeat(OUTBOUND_WARN_THRESHOLD);
        assert_eq!(check_outbound_size(&exactly), SizeCheck::Ok);
        let over = "x".repeat(OUTBOUND_WARN_THRESHOLD + 1);
        assert_eq!(check_outbound_size(&over), SizeCheck::Warn(OUTBOUND_WARN_THRESHOLD + 1));
    }

    #[test]
    fn hard_limit_boundary() {
        // Exactly 32 MiB still sends; one byte past closes 1009.
        let at_limit = "x".repeat(OUTBOUND_HARD_LIMIT);
        assert_eq!(check_outbound_size(&at_limit), SizeCheck::Warn(OUTBOUND_HARD_LIMIT));
        let past = "x".repeat(OUTBOUND_HARD_LIMIT + 1);
        assert_eq!(check_outbound_size(&past), SizeCheck::TooLarge(OUTBOUND_HARD_LIMIT + 1));
    }
}
