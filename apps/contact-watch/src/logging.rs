//! Diagnostic logging on stderr.
//!
//! Every line reads `[HH:MM:SS][tag] message key=value`, where `tag` is the
//! last path segment of the event target (`coordinator`, `store`, ...).
//! Warnings and errors carry their level after the tag. Stdout is reserved
//! for frames.

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Event formatter producing `[HH:MM:SS][tag] message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticFormat;

/// Last `::` segment of a target.
fn tag_for(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl<S, N> FormatEvent<S, N> for DiagnosticFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let now = chrono::Local::now().format("%H:%M:%S");

        write!(writer, "[{}][{}] ", now, tag_for(meta.target()))?;
        if matches!(*meta.level(), Level::WARN | Level::ERROR) {
            write!(writer, "{}: ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Default filter directive for a `-v` count.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .event_format(DiagnosticFormat)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tag_for() {
        assert_eq!(tag_for("contact_sync::coordinator"), "coordinator");
        assert_eq!(tag_for("contact_watch"), "contact_watch");
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "info");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(5), "trace");
    }

    #[test]
    fn test_line_format() {
        let capture = Capture::default();
        let make_writer = {
            let capture = capture.clone();
            move || capture.clone()
        };

        let subscriber = tracing_subscriber::fmt()
            .with_writer(make_writer)
            .with_ansi(false)
            .event_format(DiagnosticFormat)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "contact_sync::store", count = 3, "Fetched records");
            tracing::warn!(target: "contact_sync::coordinator", "Cycle failed");
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[0][10..], "[store] Fetched records count=3");
        assert_eq!(&lines[1][10..], "[coordinator] WARN: Cycle failed");
    }
}
