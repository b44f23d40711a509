//! CLI-facing options for one engine run (spec.md §4.6, §6).

use chatdl_abort::Formula;
use chatdl_core::Clock;
use chatdl_signal::ShutdownController;
use std::path::Path;
use std::sync::Arc;

/// `<ChatType>` in the continuation-by-title map (spec.md §4.6):
/// title-cased into `Live chat` / `Live chat replay` or `Top chat` /
/// `Top chat replay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    Live,
    Top,
}

impl ChatType {
    pub fn title(self) -> &'static str {
        match self {
            ChatType::Live => "Live",
            ChatType::Top => "Top",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Messages,
    Superchat,
    All,
}

/// Everything Phase I-III need that isn't reconstructible from the
/// response stream itself.
pub struct RunOptions<'a> {
    pub video_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub message_type: MessageType,
    pub chat_type: ChatType,
    pub abort: &'a Formula,
    pub shutdown: Arc<ShutdownController>,
    pub clock: &'a dyn Clock,
    pub file_exists: &'a dyn Fn(&Path) -> bool,
}
