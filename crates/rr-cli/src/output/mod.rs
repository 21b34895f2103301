//! Terminal output helpers
//!
//! Status messages are colored with a one-character prefix. Remote output
//! lines are written verbatim so they can be piped.

use std::io::Write;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

use rr_core::Origin;
use rr_transfer::TransferReport;

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning in yellow to stderr
pub fn print_warning(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Write one remote line to the local stream matching its origin
pub fn print_line(text: &str, origin: Origin) {
    let _ = match origin {
        Origin::Stdout => writeln!(std::io::stdout().lock(), "{}", text),
        Origin::Stderr => writeln!(std::io::stderr().lock(), "{}", text),
    };
}

/// One-line summary of a transfer batch
pub fn format_report(report: &TransferReport) -> String {
    match &report.first_error {
        None => format!("{}/{} transfers succeeded", report.succeeded, report.total),
        Some(e) => format!(
            "{}/{} transfers succeeded before failure: {}",
            report.succeeded, report.total, e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::TransferError;

    #[test]
    fn test_format_report_success() {
        let report = TransferReport {
            succeeded: 3,
            total: 3,
            first_error: None,
        };
        assert_eq!(format_report(&report), "3/3 transfers succeeded");
    }

    #[test]
    fn test_format_report_failure() {
        let report = TransferReport {
            succeeded: 1,
            total: 4,
            first_error: Some(TransferError::Timeout {
                completed: 1,
                total: 4,
            }),
        };
        let line = format_report(&report);
        assert!(line.starts_with("1/4 transfers succeeded before failure"));
        assert!(line.contains("timeout"));
    }
}
