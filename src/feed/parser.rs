use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;

use crate::storage::ParsedEntry;
use crate::util::{clean_title, is_http_link};

/// Outcome of parsing one feed document.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// Entries that carried a usable link
    pub entries: Vec<ParsedEntry>,
    /// Entries dropped because no http(s) link could be found
    pub skipped: usize,
}

/// Parse an RSS, Atom or JSON Feed document into candidate entries.
///
/// A document that cannot be parsed at all is an error. Individual entries
/// without a usable link are skipped and counted in [`ParseResult::skipped`].
/// `base_url` resolves relative links in Atom documents.
pub fn parse_feed(bytes: &[u8], base_url: Option<&str>) -> Result<ParseResult> {
    let feed = parser::Builder::new()
        .base_uri(base_url)
        .build()
        .parse(bytes)?;

    let mut result = ParseResult::default();
    for entry in feed.entries {
        match entry_to_parsed(entry) {
            Some(parsed) => result.entries.push(parsed),
            None => result.skipped += 1,
        }
    }

    Ok(result)
}

fn entry_to_parsed(entry: Entry) -> Option<ParsedEntry> {
    let link = pick_link(&entry.links).or_else(|| {
        let id = entry.id.trim();
        is_http_link(id).then(|| id.to_string())
    })?;

    let pub_date = entry
        .published
        .or(entry.updated)
        .map(format_pub_date)
        .unwrap_or_default();

    let title = entry
        .title
        .map(|t| clean_title(&t.content).into_owned())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let content = entry.content.and_then(|c| c.body);
    let summary = entry.summary.map(|s| s.content).or_else(|| content.clone());

    Some(ParsedEntry {
        title,
        link,
        pub_date,
        summary,
        content,
    })
}

/// Prefer an `alternate` (or unlabelled) link, fall back to any http link.
fn pick_link(links: &[Link]) -> Option<String> {
    let usable = |l: &&Link| is_http_link(l.href.trim());

    links
        .iter()
        .filter(usable)
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.iter().find(usable))
        .map(|l| l.href.trim().to_string())
}

/// Canonical textual form stored in `FeedItem::pub_date`.
pub fn format_pub_date(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored `pub_date`. Accepts RFC 3339 and RFC 2822.
///
/// Returns `None` for empty or unrecognized text; such items are never
/// considered old by cleanup.
pub fn parse_pub_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>X</title>
    <item>
        <title>First   post</title>
        <link>https://x.example/1</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
        <description>First summary</description>
    </item>
    <item>
        <title>Second post</title>
        <link>https://x.example/2</link>
    </item>
    <item>
        <title>No link at all</title>
    </item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Y</title>
    <id>urn:uuid:feed</id>
    <updated>2024-02-01T00:00:00Z</updated>
    <entry>
        <title>Atom entry</title>
        <id>urn:uuid:1</id>
        <link rel="self" href="https://y.example/api/1"/>
        <link rel="alternate" href="https://y.example/posts/1"/>
        <updated>2024-02-01T12:30:00Z</updated>
        <content type="html">Body text</content>
    </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_entries() {
        let result = parse_feed(RSS.as_bytes(), None).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.skipped, 1);

        let first = &result.entries[0];
        assert_eq!(first.title, "First post");
        assert_eq!(first.link, "https://x.example/1");
        assert_eq!(first.pub_date, "2024-01-01T10:00:00Z");
        assert_eq!(first.summary.as_deref(), Some("First summary"));

        let second = &result.entries[1];
        assert_eq!(second.pub_date, "");
        assert!(second.summary.is_none());
    }

    #[test]
    fn test_parse_atom_prefers_alternate_link() {
        let result = parse_feed(ATOM.as_bytes(), None).unwrap();
        assert_eq!(result.entries.len(), 1);

        let entry = &result.entries[0];
        assert_eq!(entry.link, "https://y.example/posts/1");
        assert_eq!(entry.pub_date, "2024-02-01T12:30:00Z");
        assert_eq!(entry.content.as_deref(), Some("Body text"));
        assert_eq!(entry.summary.as_deref(), Some("Body text"));
    }

    #[test]
    fn test_missing_title_becomes_untitled() {
        let rss = r#"<rss version="2.0"><channel>
            <item><link>https://x.example/3</link></item>
        </channel></rss>"#;
        let result = parse_feed(rss.as_bytes(), None).unwrap();
        assert_eq!(result.entries[0].title, "Untitled");
    }

    #[test]
    fn test_permalink_guid_used_when_no_link() {
        let rss = r#"<rss version="2.0"><channel>
            <item><title>Guid only</title><guid isPermaLink="true">https://x.example/guid</guid></item>
        </channel></rss>"#;
        let result = parse_feed(rss.as_bytes(), None).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].link, "https://x.example/guid");
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(parse_feed(b"<not valid xml", None).is_err());
        assert!(parse_feed(b"", None).is_err());
    }

    #[test]
    fn test_empty_channel_yields_nothing() {
        let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        let result = parse_feed(rss.as_bytes(), None).unwrap();
        assert!(result.entries.is_empty());
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn test_parse_pub_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_pub_date("2024-01-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_pub_date("2024-01-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_pub_date("Mon, 01 Jan 2024 10:00:00 +0000"), Some(expected));
        assert_eq!(parse_pub_date(""), None);
        assert_eq!(parse_pub_date("yesterday"), None);
    }

    #[test]
    fn test_format_pub_date_round_trips() {
        let dt = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(parse_pub_date(&format_pub_date(dt)), Some(dt));
    }
}
