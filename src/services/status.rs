//! User-facing status lines
//!
//! Status lines go to the command's output stream with a fixed tag, separate
//! from diagnostic logging on stderr.

use std::io::Write;

/// Tag prefixed to every status line
pub const STATUS_PREFIX: &str = "[RemoveBG]";

/// Writes tagged status lines to an output stream
pub struct StatusReporter<'a> {
    out: &'a mut dyn Write,
}

impl<'a> StatusReporter<'a> {
    #[must_use]
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out }
    }

    /// Write `[RemoveBG] <message>`
    ///
    /// Write failures are ignored; a closed stdout must not change the
    /// outcome of the operation being reported.
    pub fn report(&mut self, message: &str) {
        tracing::debug!(status = message);
        let _ = writeln!(self.out, "{STATUS_PREFIX} {message}");
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_report_prefixes_lines() {
        let mut out = Vec::new();
        let mut reporter = StatusReporter::new(&mut out);
        reporter.report("Loading image: a.jpg");
        reporter.report("Saved to: b.png");

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[RemoveBG] Loading image: a.jpg\n[RemoveBG] Saved to: b.png\n"
        );
    }

    #[test]
    fn test_report_ignores_write_errors() {
        let mut pipe = ClosedPipe;
        StatusReporter::new(&mut pipe).report("still fine");
    }
}
