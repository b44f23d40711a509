//! `chatdl`: fetches YouTube/Twitch chat from past broadcasts/VODs,
//! no authentication needed (spec.md §6).
//!
//! Grounded on `lunaroute-server/src/main.rs`'s bootstrap shape
//! (parse args, init tracing, wire components, run, report errors),
//! trimmed from a multi-command server binary down to this tool's
//! single positional-URL surface and extended with the reference
//! tool's argument-normalization and log fan-out behavior
//! (`original_source/chat_replay_downloader.py`'s `main()`).

mod cli;
mod cookie_bridge;
mod logging;
mod video_id;

use chatdl_abort::{host_file_exists, Formula};
use chatdl_core::record::ChatRecord;
use chatdl_core::time::time_to_seconds;
use chatdl_core::{Platform, RealClock};
use chatdl_http::{HttpSession, HttpSessionConfig};
use chatdl_sink::OutputSink;
use chatdl_signal::{ShutdownController, SignalRouter};
use chatdl_youtube::{ChatType, MessageType, RunOptions};
use clap::Parser;
use cli::{Cli, ChatTypeArg, MessageTypeArg};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let program = std::env::args().next().unwrap_or_default();
    let normalized = cli::normalize_single_dash_args(std::env::args().skip(1));
    let cli = Cli::parse_from(std::iter::once(program).chain(normalized));

    let platform = Platform::detect(&cli.url)?;
    let video_id = video_id::extract(&cli.url, platform)?;

    let log_targets = logging::resolve_log_targets(&cli.log_file, cli.hide_output)?;
    let print_to_stdout = !cli.hide_output && !cli.log_file.iter().any(|f| f == ":none:");
    logging::init(cli.log_level, &cli.log_base_context, &video_id, log_targets)?;

    let start_time = time_to_seconds(&cli.start_time)
        .ok_or_else(|| anyhow::anyhow!("invalid --start-time: {}", cli.start_time))?;
    let end_time = match &cli.end_time {
        Some(raw) => Some(
            time_to_seconds(raw).ok_or_else(|| anyhow::anyhow!("invalid --end-time: {raw}"))?,
        ),
        None => None,
    };
    let newline = cli.newline.as_deref().map(unescape_newline);

    let abort = Formula::parse(&cli.abort_condition)?;

    let shutdown = ShutdownController::new();
    SignalRouter::new(shutdown.clone()).install(abort.signal_overrides());

    let session = HttpSession::new(HttpSessionConfig::default())?;
    if let Some(path) = &cli.cookies {
        cookie_bridge::load(&session, path)?;
    }

    let mut sink = OutputSink::new(cli.output.clone(), newline, print_to_stdout)?;
    let clock = RealClock;

    let result = {
        let mut push = |record: &ChatRecord| {
            if let Err(e) = sink.push(record.clone()) {
                tracing::error!(error = %e, "failed to write record to sink");
            }
        };

        match platform {
            Platform::YouTube => {
                let options = RunOptions {
                    video_id: video_id.clone(),
                    start_time,
                    end_time,
                    message_type: map_message_type(cli.message_type),
                    chat_type: map_chat_type(cli.chat_type),
                    abort: &abort,
                    shutdown: shutdown.clone(),
                    clock: &clock,
                    file_exists: &host_file_exists,
                };
                chatdl_youtube::run(&session, options, push).await
            }
            Platform::Twitch => {
                chatdl_twitch::fetch_comments(&session, &video_id, start_time, end_time, push)
                    .await
            }
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "engine exited with an error");
    }
    sink.finalize()?;

    if let Some(path) = &cli.save_cookies {
        cookie_bridge::save(&session, platform, path)?;
    }

    result?;
    Ok(())
}

fn map_message_type(arg: MessageTypeArg) -> MessageType {
    match arg {
        MessageTypeArg::Messages => MessageType::Messages,
        MessageTypeArg::Superchat => MessageType::Superchat,
        MessageTypeArg::All => MessageType::All,
    }
}

fn map_chat_type(arg: ChatTypeArg) -> ChatType {
    match arg {
        ChatTypeArg::Live => ChatType::Live,
        ChatTypeArg::Top => ChatType::Top,
    }
}

/// Interprets `--newline`'s backslash escapes (`\n`, `\r`, `\t`, `\\`);
/// anything else passes through literally.
fn unescape_newline(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_common_sequences() {
        assert_eq!(unescape_newline(r"\n"), "\n");
        assert_eq!(unescape_newline(r"\r\n"), "\r\n");
        assert_eq!(unescape_newline(r"\t"), "\t");
        assert_eq!(unescape_newline("plain"), "plain");
    }
}
