//! Custom logging implementation for Feldspar
//!
//! Colored, compact output on stderr plus a per-run plain-text file under
//! the log directory, so every session leaves a full debug trail.

use crate::error::Result;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const GRAY: &str = "\x1b[90m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GREEN: &str = "\x1b[32m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Formats the current UTC time as HH:MM:SS.mmm
fn format_current_time() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond()
    )
}

/// Returns the appropriate color and formatted level string for a log level
fn format_level(level: &tracing::Level) -> String {
    match *level {
        tracing::Level::ERROR => format!("{}[ERROR]{}", colors::RED, colors::RESET),
        tracing::Level::WARN => format!("{}[WARN]{}", colors::YELLOW, colors::RESET),
        tracing::Level::INFO => format!("{}[INFO]{}", colors::GREEN, colors::RESET),
        tracing::Level::DEBUG => format!("{}[DEBUG]{}", colors::BLUE, colors::RESET),
        tracing::Level::TRACE => format!("{}[TRACE]{}", colors::MAGENTA, colors::RESET),
    }
}

/// Colored, timestamped event format for the terminal
struct ConsoleFormat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        // Gray timestamp, colored level, then the message and fields.
        write!(
            writer,
            "{}{}{} ",
            colors::GRAY,
            format_current_time(),
            colors::RESET
        )?;
        write!(writer, "{} ", format_level(event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Initialize the logging system.
///
/// Stderr gets the colored format, filtered by `RUST_LOG` when set and
/// falling back to info (or debug with `verbose`). A per-run file under
/// `log_dir` always records everything at debug.
pub fn init(verbose: bool, log_dir: &Path) -> Result<()> {
    let fallback = if verbose { "debug" } else { "info" };
    let stderr_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    std::fs::create_dir_all(log_dir)?;
    let now = time::OffsetDateTime::now_utc();
    let file_name = format!(
        "{:04}.{:02}.{:02}-{:02}.{:02}.{:02}.log",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    );
    let file = File::create(log_dir.join(file_name))?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_target(false)
        .event_format(ConsoleFormat)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Arc::new(file))
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
