//! Turning user input (URLs, bare ids) into a canonical video reference.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::ScribeError;

const ID_LEN: usize = 11;

/// An 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    /// Accepts exactly 11 characters of `[A-Za-z0-9_-]`.
    pub fn parse(candidate: &str) -> Option<Self> {
        let valid = candidate.len() == ID_LEN
            && candidate
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        valid.then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved reference: the canonical id plus the input it came from.
#[derive(Debug, Clone)]
pub struct VideoReference {
    id: VideoId,
    source: String,
}

impl VideoReference {
    pub fn id(&self) -> &VideoId {
        &self.id
    }

    /// The original user input, kept for error messages.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Canonical watch URL, used whenever a strategy needs a full URL.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Resolve a URL or bare id into a [`VideoReference`].
///
/// Accepts bare 11-character ids, watch URLs (any youtube.com host),
/// youtu.be short links and embed URLs. Anything else falls back to a
/// pattern scan for an 11-character token, so shorts links and
/// scheme-less URLs still resolve.
pub fn resolve(input: &str) -> Result<VideoReference, ScribeError> {
    let trimmed = input.trim();

    let id = VideoId::parse(trimmed)
        .or_else(|| parse_url(trimmed))
        .or_else(|| scan_for_id(trimmed))
        .ok_or_else(|| ScribeError::InvalidReference(input.to_string()))?;

    Ok(VideoReference {
        id,
        source: trimmed.to_string(),
    })
}

fn parse_url(input: &str) -> Option<VideoId> {
    let url = Url::parse(input).ok()?;
    let host = url.host_str()?;

    if host == "youtu.be" || host == "www.youtu.be" {
        return url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .and_then(VideoId::parse);
    }

    if !(host == "youtube.com" || host.ends_with(".youtube.com")) {
        return None;
    }

    match url.path() {
        "/watch" => url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .and_then(|(_, value)| VideoId::parse(&value)),
        path if path.starts_with("/embed/") || path.starts_with("/v/") => {
            let mut segments = url.path_segments()?;
            segments.next();
            segments.next().and_then(VideoId::parse)
        }
        _ => None,
    }
}

/// Last resort: any 11-character token following `v=` or a slash.
fn scan_for_id(input: &str) -> Option<VideoId> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").unwrap());
    pattern
        .captures(input)
        .and_then(|caps| caps.get(1))
        .and_then(|m| VideoId::parse(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn resolves_bare_id() {
        let reference = resolve(ID).unwrap();
        assert_eq!(reference.id().as_str(), ID);
        assert_eq!(reference.source(), ID);
    }

    #[test]
    fn resolves_watch_url() {
        let reference = resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(reference.id().as_str(), ID);
    }

    #[test]
    fn resolves_watch_url_with_extra_params() {
        let reference = resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s&list=PL").unwrap();
        assert_eq!(reference.id().as_str(), ID);
    }

    #[test]
    fn resolves_short_link() {
        let reference = resolve("https://youtu.be/dQw4w9WgXcQ?si=abc").unwrap();
        assert_eq!(reference.id().as_str(), ID);
    }

    #[test]
    fn resolves_embed_url() {
        let reference = resolve("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap();
        assert_eq!(reference.id().as_str(), ID);
    }

    #[test]
    fn resolves_mobile_host() {
        let reference = resolve("https://m.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(reference.id().as_str(), ID);
    }

    #[test]
    fn resolves_shorts_via_pattern_scan() {
        let reference = resolve("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap();
        assert_eq!(reference.id().as_str(), ID);
    }

    #[test]
    fn resolves_scheme_less_url() {
        let reference = resolve("youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(reference.id().as_str(), ID);
    }

    #[test]
    fn canonical_watch_url() {
        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(
            reference.watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn rejects_plain_text() {
        assert!(resolve("not a video").is_err());
    }

    #[test]
    fn rejects_wrong_length_id() {
        assert!(resolve("dQw4w9WgXc").is_err());
        assert!(VideoId::parse("dQw4w9WgXcQQ").is_none());
    }

    #[test]
    fn rejects_id_with_invalid_characters() {
        assert!(VideoId::parse("dQw4w9WgX!Q").is_none());
    }

    #[test]
    fn rejects_unrelated_url_without_token() {
        assert!(resolve("https://example.com/page").is_err());
    }

    #[test]
    fn error_carries_original_input() {
        let err = resolve("garbage").unwrap_err();
        assert!(err.to_string().contains("garbage"));
    }
}
