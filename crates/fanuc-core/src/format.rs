//! Text helpers for HTML chat messages.

/// Marker appended to truncated payloads.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Escapes text for Telegram's HTML parse mode.
pub fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Re-indents JSON payloads; anything else is returned unchanged.
pub fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// Cuts `text` to at most `max_chars` characters, appending `marker` when cut.
pub fn truncate(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], marker),
        None => text.to_string(),
    }
}

/// Pretty-prints, truncates and escapes a payload for a `<pre>` block.
pub fn payload_block(raw: &str, max_chars: usize) -> String {
    let pretty = pretty_json(raw);
    format!(
        "<pre>{}</pre>",
        html_escape(&truncate(&pretty, max_chars, TRUNCATION_MARKER))
    )
}
