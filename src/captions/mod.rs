//! YouTube caption track listing, fetching and formatting.
//!
//! Talks to the public watch page and timedtext endpoints. Track discovery
//! reads the `"captionTracks"` array embedded in the watch page player
//! response; track content is fetched in the json3 timed-text format.

use std::time::Duration;

use serde::Deserialize;

use crate::reference::VideoId;

const WATCH_PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const TRACKS_KEY: &str = "\"captionTracks\":";

/// Failure while listing or fetching captions. Both variants are
/// infrastructure trouble; "video has no captions" is not an error but an
/// empty track list.
#[derive(Debug, thiserror::Error)]
pub enum CaptionsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected captions payload: {0}")]
    Malformed(String),
}

/// One caption track as advertised by the watch page.
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    pub language_code: String,
    pub language_name: Option<String>,
    pub is_auto_generated: bool,
    pub(crate) base_url: String,
}

/// A single timed caption line.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLine {
    pub start_secs: f64,
    pub text: String,
}

pub struct CaptionsClient {
    http: reqwest::Client,
}

impl CaptionsClient {
    pub fn new() -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(WATCH_PAGE_TIMEOUT)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) ytscribe")
            .build()?;
        Ok(Self { http })
    }

    /// List the caption tracks for a video. An empty list means the video
    /// has no captions; that is not an error.
    pub async fn list_tracks(&self, id: &VideoId) -> Result<Vec<CaptionTrack>, CaptionsError> {
        let url = format!(
            "https://www.youtube.com/watch?v={}",
            urlencoding::encode(id.as_str())
        );
        let response = self
            .http
            .get(&url)
            .header("Accept-Language", "en-US,en")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptionsError::Malformed(format!(
                "watch page returned HTTP {status}"
            )));
        }
        let page = response.text().await?;
        extract_caption_tracks(&page)
    }

    /// Fetch the timed lines of one track.
    pub async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionLine>, CaptionsError> {
        let url = if track.base_url.contains("fmt=") {
            track.base_url.clone()
        } else {
            format!("{}&fmt=json3", track.base_url)
        };
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptionsError::Malformed(format!(
                "timedtext endpoint returned HTTP {status}"
            )));
        }
        let payload: TimedTextPayload = response.json().await?;
        Ok(lines_from_payload(payload))
    }
}

/// Pick the track to fetch. Preferred languages are tried in order, with a
/// manual track beating an auto-generated one of the same language. An
/// empty preference list accepts the first track advertised.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    preferred: &[String],
) -> Option<&'a CaptionTrack> {
    if preferred.is_empty() {
        return tracks.first();
    }
    for language in preferred {
        if let Some(track) = tracks
            .iter()
            .find(|t| matches_language(t, language) && !t.is_auto_generated)
        {
            return Some(track);
        }
        if let Some(track) = tracks.iter().find(|t| matches_language(t, language)) {
            return Some(track);
        }
    }
    None
}

fn matches_language(track: &CaptionTrack, language: &str) -> bool {
    let code = track.language_code.as_str();
    code.eq_ignore_ascii_case(language)
        || code
            .split('-')
            .next()
            .is_some_and(|primary| primary.eq_ignore_ascii_case(language))
}

/// Space-joined plain text of every line.
pub fn format_plain(lines: &[CaptionLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One `[MM:SS] text` row per line.
pub fn format_timestamped(lines: &[CaptionLine]) -> String {
    lines
        .iter()
        .map(|line| {
            let total = line.start_secs as u64;
            format!("[{:02}:{:02}] {}", total / 60, total % 60, line.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Locate the `"captionTracks"` array in the watch page and parse it.
/// A page without the key is a video without captions.
fn extract_caption_tracks(page: &str) -> Result<Vec<CaptionTrack>, CaptionsError> {
    let Some(key_index) = page.find(TRACKS_KEY) else {
        return Ok(Vec::new());
    };
    let array_start = key_index + TRACKS_KEY.len();
    // StreamDeserializer reads exactly one JSON value and ignores the rest
    // of the page after it.
    let mut stream = serde_json::Deserializer::from_str(&page[array_start..])
        .into_iter::<Vec<RawCaptionTrack>>();
    match stream.next() {
        Some(Ok(raw_tracks)) => Ok(raw_tracks.into_iter().map(CaptionTrack::from).collect()),
        Some(Err(e)) => Err(CaptionsError::Malformed(format!(
            "could not parse captionTracks: {e}"
        ))),
        None => Err(CaptionsError::Malformed(
            "captionTracks key present but empty".to_string(),
        )),
    }
}

fn lines_from_payload(payload: TimedTextPayload) -> Vec<CaptionLine> {
    payload
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event
                .segments
                .iter()
                .map(|segment| segment.text.as_str())
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                return None;
            }
            Some(CaptionLine {
                start_secs: event.start_ms as f64 / 1000.0,
                text,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<TrackName>,
}

impl From<RawCaptionTrack> for CaptionTrack {
    fn from(raw: RawCaptionTrack) -> Self {
        // YouTube marks auto-generated tracks with kind == "asr".
        let is_auto_generated = raw.kind.as_deref() == Some("asr");
        let language_name = raw.name.and_then(|name| name.display_text());
        CaptionTrack {
            language_code: raw.language_code,
            language_name,
            is_auto_generated,
            base_url: raw.base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    #[serde(default)]
    simple_text: Option<String>,
    #[serde(default)]
    runs: Option<Vec<TextRun>>,
}

impl TrackName {
    fn display_text(self) -> Option<String> {
        if let Some(text) = self.simple_text {
            return Some(text);
        }
        let runs = self.runs?;
        let joined: String = runs.into_iter().map(|run| run.text).collect();
        (!joined.is_empty()).then_some(joined)
    }
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

#[derive(Debug, Deserialize)]
struct TimedTextPayload {
    #[serde(default)]
    events: Vec<TimedEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedEvent {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "segs", default)]
    segments: Vec<TimedSegment>,
}

#[derive(Debug, Deserialize)]
struct TimedSegment {
    #[serde(rename = "utf8", default)]
    text: String,
}
