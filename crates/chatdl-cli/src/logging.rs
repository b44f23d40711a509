//! `tracing-subscriber` bootstrap matching spec.md §6's log-line format
//! and multi-target fan-out.
//!
//! Grounded on `lunaroute-server/src/main.rs`'s `EnvFilter`/
//! `FmtSubscriber` bootstrap, extended with a custom
//! [`FormatEvent`] for this engine's bracketed
//! `[LEVEL][datetime][context]` line, and a fan-out [`MakeWriter`]
//! replacing a Python reference tool's
//! `sys.stdout = _MultiFile(...)` trick with a native writer.

use crate::cli::LogLevelArg;
use chatdl_core::Error;
use std::fmt;
use std::fs::File;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// One `--log-file` occurrence resolved to an actual sink.
#[derive(Clone)]
enum LogTarget {
    Console,
    File(Arc<Mutex<File>>),
}

/// Resolves `--log-file`/`--hide-output` into the concrete list of
/// targets tracing fans every line out to. `:none:` and
/// `--hide-output` both resolve to an empty list (nothing written,
/// matching the reference tool opening `os.devnull`).
pub fn resolve_log_targets(log_file: &[String], hide_output: bool) -> Result<Vec<LogTargetHandle>, Error> {
    if hide_output {
        return Ok(Vec::new());
    }
    if log_file.is_empty() {
        return Ok(vec![LogTargetHandle(LogTarget::Console)]);
    }
    if log_file.iter().any(|f| f == ":none:") {
        return Ok(Vec::new());
    }

    let mut targets = Vec::with_capacity(log_file.len());
    for entry in log_file {
        if entry == ":console:" {
            targets.push(LogTargetHandle(LogTarget::Console));
            continue;
        }
        let file = File::create(entry).map_err(Error::Io)?;
        targets.push(LogTargetHandle(LogTarget::File(Arc::new(Mutex::new(file)))));
    }
    Ok(targets)
}

#[derive(Clone)]
pub struct LogTargetHandle(LogTarget);

#[derive(Clone)]
struct FanoutMakeWriter {
    targets: Arc<Vec<LogTargetHandle>>,
}

struct FanoutWriter(Arc<Vec<LogTargetHandle>>);

impl io::Write for FanoutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for handle in self.0.iter() {
            match &handle.0 {
                LogTarget::Console => {
                    io::stdout().write_all(buf)?;
                }
                LogTarget::File(file) => {
                    file.lock().unwrap().write_all(buf)?;
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for handle in self.0.iter() {
            match &handle.0 {
                LogTarget::Console => io::stdout().flush()?,
                LogTarget::File(file) => file.lock().unwrap().flush()?,
            }
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for FanoutMakeWriter {
    type Writer = FanoutWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FanoutWriter(self.targets.clone())
    }
}

/// `[LEVEL][YYYY-MM-DD HH:MM:SS][<base_context><video_id>] message`
/// (spec.md §6 "Log-line format").
struct LineFormatter {
    context_bracket: String,
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        write!(
            writer,
            "[{}][{}][{}] ",
            level_name(event.metadata().level()),
            now,
            self.context_bracket
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn log_level_filter(level: LogLevelArg) -> &'static str {
    match level {
        LogLevelArg::Trace => "trace",
        LogLevelArg::Debug => "debug",
        LogLevelArg::Info => "info",
        LogLevelArg::Warning => "warn",
        // `tracing` has no level above ERROR; "critical" (the reference
        // tool's `logging.CRITICAL`) collapses onto it.
        LogLevelArg::Error | LogLevelArg::Critical => "error",
    }
}

/// Installs the global subscriber: `EnvFilter` at the operator's
/// `--log-level`, custom bracketed formatting, fanned out to every
/// resolved `--log-file` target.
pub fn init(
    level: LogLevelArg,
    base_context: &str,
    video_id: &str,
    targets: Vec<LogTargetHandle>,
) -> Result<(), Error> {
    let filter = EnvFilter::new(log_level_filter(level));
    let make_writer = FanoutMakeWriter {
        targets: Arc::new(targets),
    };
    let formatter = LineFormatter {
        context_bracket: format!("{base_context}{video_id}"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(formatter)
        .with_writer(make_writer)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Parsing {
            what: "tracing subscriber".to_string(),
            detail: e.to_string(),
        })
}
