//! RSS 2.0 podcast feed parser.
//!
//! Streams the document with `quick_xml`'s event reader and keeps only what
//! the poller needs. Element names are matched on their qualified form, so
//! `itunes:duration` and `podcast:guid` are recognised by prefix.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_core::traits::{ParsedEpisode, ParsedFeed};

use crate::{guid, mime};

const MAX_TITLE_CHARS: usize = 1000;
const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// A parsed feed plus the reasons individual items were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// Podcast and its usable episodes, oldest first.
    pub feed: ParsedFeed,
    /// One message per skipped item.
    pub skipped: Vec<String>,
}

#[derive(Debug, Default)]
struct ItemBuilder {
    guid: String,
    title: String,
    description: String,
    pub_date: String,
    duration: String,
    enclosure_url: String,
    enclosure_type: String,
    enclosure_length: String,
}

impl ItemBuilder {
    fn guid(&self) -> String {
        if !self.guid.is_empty() {
            return guid::sanitize(&self.guid);
        }
        let suffix = if self.pub_date.is_empty() {
            &self.enclosure_url
        } else {
            &self.pub_date
        };
        guid::derive(&format!("{}{suffix}", self.title))
    }

    fn build(self) -> Result<ParsedEpisode, String> {
        let guid = self.guid();
        if self.enclosure_url.is_empty() {
            return Err(format!(
                "could not read download URL, skipping episode '{guid}'"
            ));
        }
        let Some(mime_type) = mime::detect(&self.enclosure_type, &self.enclosure_url) else {
            return Err(format!(
                "unsupported file type '{}', skipping episode '{guid}'",
                self.enclosure_type
            ));
        };

        Ok(ParsedEpisode {
            guid,
            title: truncate(&self.title, MAX_TITLE_CHARS),
            description: truncate(&self.description, MAX_DESCRIPTION_CHARS),
            download_url: self.enclosure_url,
            mime_type,
            size_bytes: self.enclosure_length.trim().parse().ok().filter(|n| *n > 0),
            duration_secs: parse_duration(&self.duration),
            published_at: parse_pub_date(&self.pub_date),
        })
    }
}

/// Parse an RSS document fetched from `feed_url`.
///
/// Fails only when the document is not well-formed XML or has no
/// `<channel>`. Items without a usable enclosure are skipped and reported
/// in [`ParseOutcome::skipped`].
pub fn parse_feed(xml: &str, feed_url: &str) -> AppResult<ParseOutcome> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut text = String::new();
    let mut seen_channel = false;
    let mut title: Option<String> = None;
    let mut podcast_guid: Option<String> = None;
    let mut item: Option<ItemBuilder> = None;
    let mut episodes = Vec::new();
    let mut skipped = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            AppError::with_source(
                ErrorKind::Validation,
                format!(
                    "Malformed feed XML at position {}",
                    reader.buffer_position()
                ),
                e,
            )
        })?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                text.clear();
                match name.as_slice() {
                    b"channel" => seen_channel = true,
                    b"item" if stack.last().is_some_and(|p| p == b"channel") => {
                        item = Some(ItemBuilder::default());
                    }
                    b"enclosure" => read_enclosure(&e, item.as_mut()),
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"enclosure" {
                    read_enclosure(&e, item.as_mut());
                }
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned().into());
                text.push_str(&value);
            }
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let Some(name) = stack.pop() else { continue };
                let value = std::mem::take(&mut text).trim().to_string();
                let parent = stack.last().map(Vec::as_slice);

                match (parent, name.as_slice()) {
                    (Some(b"channel"), b"item") => {
                        if let Some(done) = item.take() {
                            match done.build() {
                                Ok(episode) => episodes.push(episode),
                                Err(reason) => skipped.push(reason),
                            }
                        }
                    }
                    (Some(b"item"), field) => {
                        if let Some(current) = item.as_mut() {
                            match field {
                                b"guid" => current.guid = value,
                                b"title" => current.title = value,
                                b"description" => current.description = value,
                                b"itunes:summary" if current.description.is_empty() => {
                                    current.description = value;
                                }
                                b"pubDate" => current.pub_date = value,
                                b"itunes:duration" => current.duration = value,
                                _ => {}
                            }
                        }
                    }
                    (Some(b"channel"), b"title") if title.is_none() => title = Some(value),
                    (Some(b"channel"), b"podcast:guid") if !value.is_empty() => {
                        podcast_guid = Some(value);
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_channel {
        return Err(AppError::validation(format!(
            "Feed '{feed_url}' has no RSS channel"
        )));
    }

    episodes.sort_by_key(|e: &ParsedEpisode| e.published_at);

    let guid = match podcast_guid {
        Some(g) => guid::sanitize(&g),
        None => guid::derive(feed_url),
    };

    Ok(ParseOutcome {
        feed: ParsedFeed {
            guid,
            title: truncate(title.as_deref().unwrap_or_default(), MAX_TITLE_CHARS),
            episodes,
        },
        skipped,
    })
}

fn read_enclosure(e: &BytesStart<'_>, item: Option<&mut ItemBuilder>) {
    let Some(item) = item else { return };
    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&attr.value).into_owned()));
        match attr.key.as_ref() {
            b"url" => item.enclosure_url = value.trim().to_string(),
            b"type" => item.enclosure_type = value.trim().to_string(),
            b"length" => item.enclosure_length = value.into_owned(),
            _ => {}
        }
    }
}

/// Parse `SS`, `MM:SS` or `HH:MM:SS`.
fn parse_duration(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    parts.iter().try_fold(0i64, |acc, part| {
        let n: i64 = part.trim().parse().ok()?;
        acc.checked_mul(60)?.checked_add(n)
    })
}

/// Items without a readable date sort first, at the Unix epoch.
fn parse_pub_date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
