//! Console logging.
//!
//! Events are rendered as `LEVEL target: span1:span2: message fields`, so
//! the emitting module is always the first thing after the level.

use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event formatter that writes the target before the span context
pub struct TargetFirstFormat {
    ansi: bool,
}

impl TargetFirstFormat {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[35m",
    }
}

impl<S, N> FormatEvent<S, N> for TargetFirstFormat
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
        let metadata = event.metadata();
        let level = metadata.level();

        if self.ansi {
            write!(writer, "{}{:>5}\x1b[0m ", level_color(level), level)?;
        } else {
            write!(writer, "{:>5} ", level)?;
        }
        write!(writer, "{}: ", metadata.target())?;

        if let Some(scope) = ctx.event_scope() {
            let names: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !names.is_empty() {
                write!(writer, "{}: ", names.join(":"))?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter from `RUST_LOG`, falling back to `info` (or `debug` for this crate when verbose)
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,overhead=debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Install the global subscriber; logs go to stderr so command output stays clean
pub fn init_logging(verbose: bool) {
    let ansi = std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .event_format(TargetFirstFormat::new(ansi))
        .init();
}
