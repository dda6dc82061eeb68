use html2text::from_read;
use regex::Regex;
use std::sync::OnceLock;

/// Rough speaking rate used when the provider does not report a duration
const MS_PER_CHARACTER: i32 = 50;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("static URL pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Prepare segment text for synthesis: strip markup, drop URLs (nobody
/// wants them read aloud) and collapse whitespace.
pub fn clean_for_speech(text: &str) -> String {
    let plain_text = if text.contains('<') {
        from_read(text.as_bytes(), usize::MAX)
    } else {
        text.to_string()
    };

    let without_urls = url_pattern().replace_all(&plain_text, "");
    let normalized = whitespace_pattern().replace_all(&without_urls, " ");

    normalized.trim().to_string()
}

pub fn estimate_duration_ms(text: &str) -> i32 {
    let chars = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
    chars.saturating_mul(MS_PER_CHARACTER)
}
