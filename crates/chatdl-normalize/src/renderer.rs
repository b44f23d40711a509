//! `RawRenderer` registry (Design Notes §9: "Dynamic message dispatch
//! on the renderer's only key" re-architected as a fixed tagged enum
//! rather than runtime reflection over whatever key happens to be
//! present).

/// The three dispatch classes spec.md §4.6 step 5 filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Ignore,
    Message,
    Superchat,
}

/// Classifies a renderer by its JSON key name. Unknown renderers are
/// treated as `Ignore` (§4.3 step 1: "If the renderer is unknown, log
/// a warning and continue").
///
/// `liveChatPaidStickerRenderer` is classed `Superchat` per the
/// SPEC_FULL.md §9 Open Question resolution (the newer upstream
/// revision's placement), pinned by
/// `tests::paid_sticker_is_superchat_class`.
pub fn classify(renderer_name: &str) -> Category {
    match renderer_name {
        "liveChatTextMessageRenderer" => Category::Message,
        "liveChatMembershipItemRenderer" => Category::Message,
        "liveChatViewerEngagementMessageRenderer" => Category::Message,
        "liveChatTickerSponsorItemRenderer" => Category::Message,
        "liveChatPaidMessageRenderer" => Category::Superchat,
        "liveChatPaidStickerRenderer" => Category::Superchat,
        "liveChatTickerPaidMessageItemRenderer" => Category::Superchat,
        "liveChatTickerPaidStickerItemRenderer" => Category::Superchat,
        "liveChatPlaceholderItemRenderer" => Category::Ignore,
        "liveChatModeChangeMessageRenderer" => Category::Ignore,
        "liveChatBannerRenderer" => Category::Ignore,
        "liveChatDonationAnnouncementRenderer" => Category::Ignore,
        unknown => {
            tracing::warn!(renderer = unknown, "unknown chat renderer, ignoring item");
            Category::Ignore
        }
    }
}

/// True for the ticker-class renderers whose records are retained in
/// the output buffer but suppressed from stdout (invariant iii) since
/// they mirror a chat-class record that was already printed.
pub fn is_ticker_renderer(renderer_name: &str) -> bool {
    matches!(
        renderer_name,
        "liveChatTickerPaidMessageItemRenderer"
            | "liveChatTickerPaidStickerItemRenderer"
            | "liveChatTickerSponsorItemRenderer"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_sticker_is_superchat_class() {
        assert_eq!(classify("liveChatPaidStickerRenderer"), Category::Superchat);
    }

    #[test]
    fn placeholder_and_mode_change_are_ignored() {
        assert_eq!(classify("liveChatPlaceholderItemRenderer"), Category::Ignore);
        assert_eq!(classify("liveChatModeChangeMessageRenderer"), Category::Ignore);
    }

    #[test]
    fn unknown_renderer_is_ignored_not_fatal() {
        assert_eq!(classify("liveChatSomeFutureRenderer"), Category::Ignore);
    }
}
