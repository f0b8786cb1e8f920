//! Plain-text playlist format.
//!
//! ```text
//! @https://example.com/intro.mp4
//! ^https://cdn.example.com/intro-alt.mp4
//! #music live
//! Intro clip
//!
//! @https://example.com/second.webm
//! Second clip
//! ```
//!
//! `@` opens an entry with its main URL, `^` sets the platform alternate
//! URL, `#` adds space or comma separated tags, and any other non-blank line
//! is the entry title (several title lines are joined with a space).

use crate::MediaUrl;
use crate::error::{Result, SourceError};

use super::PlaylistTrack;

pub fn parse_playlist_text(text: &str) -> Result<Vec<PlaylistTrack>> {
    let mut tracks = Vec::new();
    let mut current: Option<PlaylistTrack> = None;

    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(url) = line.strip_prefix('@') {
            let url = url.trim();
            if url.is_empty() {
                return Err(SourceError::Parse {
                    line: line_no,
                    message: "entry without URL".into(),
                });
            }
            tracks.extend(current.take());
            current = Some(PlaylistTrack::new(MediaUrl::new(url)));
            continue;
        }

        let Some(track) = current.as_mut() else {
            return Err(SourceError::Parse {
                line: line_no,
                message: "content before the first '@' entry".into(),
            });
        };

        if let Some(alt) = line.strip_prefix('^') {
            track.media.alt_url = alt.trim().to_string();
        } else if let Some(tags) = line.strip_prefix('#') {
            track.tags.extend(
                tags.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            );
        } else if track.media.title.is_empty() {
            track.media.title = line.to_string();
        } else {
            track.media.title.push(' ');
            track.media.title.push_str(line);
        }
    }

    tracks.extend(current);
    Ok(tracks)
}
