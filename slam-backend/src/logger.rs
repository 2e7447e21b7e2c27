//! Logging setup shared by the slam-backend binaries.
//!
//! The library itself only emits `tracing` events. Binaries call [`init_logger`]
//! once at startup to get a single-line bracketed format with an INFO default.

use tracing::Level;

/// Install the global subscriber with INFO as default level.
///
/// Format: `[LEVEL YYYY-MM-DD HH:MM:SS target] message` for INFO/WARN/ERROR and
/// `[LEVEL YYYY-MM-DD HH:MM:SS file:line] message` for DEBUG/TRACE.
///
/// # Example
/// ```no_run
/// use slam_backend::init_logger;
///
/// init_logger();
/// tracing::info!("Backend started");
/// ```
///
/// `RUST_LOG` overrides the default, e.g. `RUST_LOG=debug` prints the per-trial
/// Levenberg-Marquardt table:
/// ```bash
/// RUST_LOG=debug cargo run --features cli --bin curve_fitting
/// RUST_LOG=slam_backend=trace cargo run --features cli --bin curve_fitting
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Install the global subscriber with a custom default level.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logger_with_level(default_level: Level) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .event_format(BracketFormatter)
        .try_init();
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}

/// Bracketed single-line event formatter.
struct BracketFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for BracketFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use chrono::Local;

        let metadata = event.metadata();
        let level = *metadata.level();

        let color = match level {
            Level::ERROR => "31",
            Level::WARN => "33",
            Level::INFO => "32",
            Level::DEBUG => "34",
            Level::TRACE => "35",
        };
        if writer.has_ansi_escapes() {
            write!(writer, "[\x1b[{color}m{level}\x1b[0m ")?;
        } else {
            write!(writer, "[{level} ")?;
        }
        write!(writer, "{} ", Local::now().format("%Y-%m-%d %H:%M:%S"))?;

        match (level, metadata.file()) {
            (Level::DEBUG | Level::TRACE, Some(file)) => {
                let filename = file.rsplit('/').next().unwrap_or(file);
                write!(writer, "{filename}")?;
                if let Some(line) = metadata.line() {
                    write!(writer, ":{line}")?;
                }
            }
            _ => write!(writer, "{}", metadata.target())?,
        }
        write!(writer, "] ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
