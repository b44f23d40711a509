//! CLI surface (spec.md §6).

use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "chatdl", version, about = "Fetches YouTube/Twitch chat from past broadcasts/VODs. No authentication needed!")]
pub struct Cli {
    /// YouTube/Twitch video URL
    pub url: String,

    /// Start time in seconds or hh:mm:ss
    #[arg(long, visible_alias = "from", default_value = "0")]
    pub start_time: String,

    /// End time in seconds or hh:mm:ss (default: until the end)
    #[arg(long, visible_alias = "to")]
    pub end_time: Option<String>,

    /// Types of messages to include (YouTube only)
    #[arg(long, value_enum, default_value = "messages")]
    pub message_type: MessageTypeArg,

    /// Which chat to get messages from (YouTube only)
    #[arg(long, value_enum, default_value = "live")]
    pub chat_type: ChatTypeArg,

    /// Name of output file (default: print to standard output)
    #[arg(long, short = 'o')]
    pub output: Option<std::path::PathBuf>,

    /// Name of a Netscape-format cookies file
    #[arg(long, short = 'c')]
    pub cookies: Option<std::path::PathBuf>,

    /// Writes the session's cookies back out in Netscape format after the run
    #[arg(long)]
    pub save_cookies: Option<std::path::PathBuf>,

    /// A condition on which this application aborts; repeatable, ORed together
    /// across occurrences, ANDed within an occurrence's comma-separated list
    #[arg(long = "abort-condition")]
    pub abort_condition: Vec<String>,

    /// Whether to hide stdout/stderr output (deprecated alias for `--log-file :none:`)
    #[arg(long)]
    pub hide_output: bool,

    /// Redirects stdout/stderr to the given file, ':console:', or ':none:';
    /// repeatable to fan out to multiple targets (default: ':console:')
    #[arg(long = "log-file")]
    pub log_file: Vec<String>,

    /// Log level, logged to standard output
    #[arg(long, value_enum, default_value = "warning")]
    pub log_level: LogLevelArg,

    /// Prepended to each log line's video-id bracket
    #[arg(long, default_value = "")]
    pub log_base_context: String,

    /// Backslash-escaped line terminator (empty = host-native)
    #[arg(long)]
    pub newline: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum MessageTypeArg {
    Messages,
    Superchat,
    All,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum ChatTypeArg {
    Live,
    Top,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Normalizes the reference tool's forgiving single-dash long options
/// (`-abort-condition`) into clap's expected `--` form, leaving short
/// flags (`-o`, `-c`) and already-double-dashed args untouched.
pub fn normalize_single_dash_args(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|arg| {
        let bytes = arg.as_bytes();
        if arg.len() >= 3 && bytes[0] == b'-' && bytes[1] != b'-' {
            format!("-{arg}")
        } else {
            arg
        }
    })
    .collect()
}
