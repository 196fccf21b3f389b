use std::io::{self, Write};

use serde::Serialize;
use tracing::debug;

use crate::app::{ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Plain progress lines on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary(out: &mut impl Write, summary: &RunSummary) -> io::Result<()> {
        if summary.dry_run {
            writeln!(
                out,
                "Dry run: {} to convert, {} already converted",
                summary.pending.len(),
                summary.skipped
            )?;
            for path in &summary.pending {
                writeln!(out, "  {path}")?;
            }
            return Ok(());
        }

        writeln!(out, "{}", summary.headline())?;
        if !summary.failed.is_empty() {
            writeln!(out, "---------------------------------------")?;
            writeln!(out, "The following files failed to convert:")?;
            writeln!(out, "---------------------------------------")?;
            for path in &summary.failed {
                writeln!(out, "{path}")?;
            }
        }
        if let Some(report) = &summary.error_report {
            writeln!(out, "Error report: {report}")?;
        }
        Ok(())
    }

    pub fn write_event(out: &mut impl Write, event: &ProgressEvent) -> io::Result<()> {
        match event.elapsed {
            Some(elapsed) => writeln!(out, "{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => writeln!(out, "{}", event.message),
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = Self::write_event(&mut stdout, &event) {
            debug!(error = %err, "failed to write progress line");
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn progress_line_carries_elapsed_seconds() {
        let mut buffer = Vec::new();
        let event = ProgressEvent {
            message: "Converted 1 / 2".to_string(),
            elapsed: Some(Duration::from_millis(1500)),
        };
        ConsoleOutput::write_event(&mut buffer, &event).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "Converted 1 / 2 (1.5s)\n");
    }

    #[test]
    fn progress_write_errors_are_reported() {
        let event = ProgressEvent {
            message: "Conversions complete".to_string(),
            elapsed: None,
        };
        let err = ConsoleOutput::write_event(&mut ClosedPipe, &event).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn summary_lists_failures() {
        let summary = RunSummary {
            total: 3,
            converted: 2,
            skipped: 0,
            failed: vec!["/in/bad.kmz".to_string()],
            pending: Vec::new(),
            dry_run: false,
            ledger_path: "/out/PreviouslyConvertedFiles.txt".to_string(),
            error_report: None,
        };
        let mut buffer = Vec::new();
        ConsoleOutput::write_summary(&mut buffer, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("Successfully converted 2 / 3\n"));
        assert!(text.contains("The following files failed to convert:"));
        assert!(text.ends_with("/in/bad.kmz\n"));
    }
}
