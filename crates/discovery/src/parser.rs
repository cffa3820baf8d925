//! Atom feed parser
//!
//! Streams the payload with quick-xml and builds one [`PaperRecord`] per
//! `entry`. Elements are matched on their local name, so both bare Atom and
//! `atom:`-prefixed documents parse. The parser never fails: on malformed
//! markup it stops and returns the entries completed so far.

use paperscout_common::errors::ErrorCode;
use paperscout_common::metrics::record_dropped_entries;
use paperscout_common::models::collapse_whitespace;
use paperscout_common::PaperRecord;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, warn};

use crate::source::RawPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    in_author: bool,
}

impl EntryBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::AuthorName => match self.authors.last_mut() {
                Some(name) => name,
                None => return,
            },
        };
        target.push_str(text);
    }

    fn build(self) -> Option<PaperRecord> {
        let id = self.id.trim();
        let title = collapse_whitespace(&self.title);
        if id.is_empty() || title.is_empty() {
            return None;
        }

        let authors = self
            .authors
            .iter()
            .map(|name| collapse_whitespace(name))
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Some(PaperRecord {
            external_id: external_id(id),
            title,
            authors,
            abstract_text: collapse_whitespace(&self.summary),
            published_at: self.published.trim().to_string(),
            url: Some(id.to_string()),
        })
    }
}

/// Final path segment of a URL-shaped id
pub fn external_id(id: &str) -> String {
    let id = id.trim().trim_end_matches('/');
    id.rsplit('/').next().unwrap_or(id).to_string()
}

/// Parse an Atom payload into paper records, in document order.
pub fn parse(payload: &RawPayload) -> Vec<PaperRecord> {
    let mut reader = Reader::from_str(payload.as_str());

    let mut papers = Vec::new();
    let mut dropped = 0usize;

    let mut entry: Option<EntryBuilder> = None;
    // Open capture and the element depth it started at
    let mut capture: Option<(Field, usize)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                depth += 1;
                if capture.is_some() {
                    continue;
                }

                let local = start.local_name();
                let name = local.as_ref();
                if name == b"entry" {
                    entry = Some(EntryBuilder::default());
                    continue;
                }
                let Some(current) = entry.as_mut() else {
                    continue;
                };

                match name {
                    b"author" => current.in_author = true,
                    b"name" if current.in_author => {
                        current.authors.push(String::new());
                        capture = Some((Field::AuthorName, depth));
                    }
                    _ if !current.in_author => {
                        let field = match name {
                            b"id" => Some(Field::Id),
                            b"title" => Some(Field::Title),
                            b"summary" => Some(Field::Summary),
                            b"published" => Some(Field::Published),
                            _ => None,
                        };
                        capture = field.map(|f| (f, depth));
                    }
                    _ => {}
                }
            }
            Ok(Event::End(end)) => {
                if matches!(capture, Some((_, open)) if open == depth) {
                    capture = None;
                }
                depth = depth.saturating_sub(1);

                if capture.is_none() {
                    match end.local_name().as_ref() {
                        b"author" => {
                            if let Some(current) = entry.as_mut() {
                                current.in_author = false;
                            }
                        }
                        b"entry" => {
                            if let Some(done) = entry.take() {
                                match done.build() {
                                    Some(paper) => papers.push(paper),
                                    None => dropped += 1,
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some((field, _)), Some(current)) = (capture, entry.as_mut()) {
                    match text.unescape() {
                        Ok(decoded) => current.push_text(field, &decoded),
                        Err(_) => current.push_text(field, &String::from_utf8_lossy(&text)),
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let (Some((field, _)), Some(current)) = (capture, entry.as_mut()) {
                    current.push_text(field, &String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(
                    error = %e,
                    position = reader.buffer_position(),
                    parsed = papers.len(),
                    "Malformed feed, keeping entries parsed so far"
                );
                break;
            }
            Ok(_) => {}
        }
    }

    if dropped > 0 {
        debug!(dropped, code = ?ErrorCode::ParseDegraded, "Dropped entries without id or title");
        record_dropped_entries(dropped);
    }

    papers
}
