//! Approximate token accounting.
//!
//! Budgets bound backchannel traffic, not provider billing, so a length heuristic is
//! enough: four characters per token, plus a fixed overhead per message for role
//! markers and delimiters.

use relay_types::Message;

/// Approximate per-message overhead for role markers and formatting.
pub const MESSAGE_OVERHEAD_TOKENS: u64 = 4;

const CHARS_PER_TOKEN: u64 = 4;

#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(CHARS_PER_TOKEN)
}

#[must_use]
pub fn estimate_messages(messages: &[Message]) -> u64 {
    messages
        .iter()
        .map(|m| estimate_tokens(&m.content) + MESSAGE_OVERHEAD_TOKENS)
        .sum()
}
