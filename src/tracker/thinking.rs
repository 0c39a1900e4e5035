use chrono::Utc;

use crate::model::ThinkingFragment;

/// Result of folding one raw thinking delta into a worker's fragment list.
#[derive(Debug, Clone)]
pub struct ThinkingUpdate {
    pub fragment: ThinkingFragment,
    /// Slot the fragment occupies in the worker's list.
    pub block_index: usize,
    /// True when the delta extended the previous fragment in place.
    pub merged: bool,
}

/// Fold a raw thinking delta into the fragment list.
///
/// Streaming producers re-send a block as a growing prefix-extension of the
/// previous delta. When the new content starts with the last fragment's
/// content, the last fragment is replaced in place, so the list keeps one
/// entry per logical reasoning block. Content that does not extend the last
/// fragment starts a new block and is appended.
pub fn fold_fragment(
    fragments: &mut Vec<ThinkingFragment>,
    content: &str,
    token_count: Option<u32>,
) -> ThinkingUpdate {
    let fragment = ThinkingFragment {
        content: content.to_string(),
        timestamp: Utc::now(),
        token_count,
    };

    if let Some(last) = fragments.last_mut() {
        if content.starts_with(last.content.as_str()) {
            *last = fragment.clone();
            return ThinkingUpdate {
                fragment,
                block_index: fragments.len() - 1,
                merged: true,
            };
        }
    }

    fragments.push(fragment.clone());
    ThinkingUpdate {
        fragment,
        block_index: fragments.len() - 1,
        merged: false,
    }
}
