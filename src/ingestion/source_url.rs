//! Source input handling: URL normalization, duplicate detection and the
//! search fallback for free-text input.

use regex::Regex;
use std::sync::OnceLock;

use crate::catalog::entry::Entry;

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").expect("valid regex"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9+.-]*://)?(?:[\w-]+\.)+[a-zA-Z]{2,}(?:[/?#]\S*)?$")
            .expect("valid regex")
    })
}

/// Whether the input is plausibly a URL rather than search terms.
pub fn looks_like_url(input: &str) -> bool {
    let input = input.trim();
    !input.contains(char::is_whitespace) && url_re().is_match(input)
}

/// Rewrite free-text input into a provider search query.
pub fn search_query(input: &str) -> String {
    format!("ytsearch:{}", input.trim())
}

/// Reduce a URL to a canonical form so that trivially different
/// spellings of the same source compare equal: scheme and `www.` are
/// dropped, the youtube short and music hosts are folded into
/// `youtube.com/watch`, and youtube watch URLs keep only their video id.
pub fn normalize(link: &str) -> String {
    let trimmed = link.trim();
    let without_scheme = scheme_re().replace(trimmed, "");
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(&without_scheme);

    let (host, rest) = match without_www.split_once('/') {
        Some((host, rest)) => (host, rest),
        None => (without_www, ""),
    };

    match host {
        "youtu.be" => {
            let video_id = rest.split(['?', '&']).next().unwrap_or("");
            format!("youtube.com/watch?v={}", video_id)
        }
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => match video_id_param(rest) {
            Some(video_id) => format!("youtube.com/watch?v={}", video_id),
            None => format!("youtube.com/{}", rest.trim_end_matches('/')),
        },
        _ => without_www.trim_end_matches('/').to_string(),
    }
}

fn video_id_param(path_and_query: &str) -> Option<&str> {
    let (_, query) = path_and_query.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .filter(|v| !v.is_empty())
}

/// Find an existing entry with the same normalized source. Imported
/// entries have no meaningful source and are skipped.
pub fn find_duplicate<'a>(link: &str, entries: &'a [Entry]) -> Option<&'a Entry> {
    let target = normalize(link);
    entries
        .iter()
        .filter(|entry| !entry.is_imported())
        .find(|entry| normalize(&entry.source_url) == target)
}
