//! Streaming page/revision parser for Wikipedia XML dumps.
//!
//! The parser is a pull-based finite-state machine over `quick-xml` events
//! with states `Idle` (between pages), `InPage` and `InRevision`. Exactly one
//! page is in progress at any time and its revision history is bounded by a
//! [`RevisionWindow`], so peak memory is O(largest single page), not O(dump).
//!
//! The dump is presumed to be well-formed dump output: structurally invalid
//! XML, an unparsable page id or a non-ISO-8601 timestamp abort the run.
//! Malformed restriction tokens are the one recovered condition; they are
//! logged and skipped.

use crate::models::{Contributor, Page, PageBundle, Revision};
use crate::stats::FilterStats;
use crate::titles;
use crate::window::{RevisionWindow, WindowLimits};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use std::io::BufRead;
use tracing::warn;

/// Iterator over the pages of a dump, yielding one [`PageBundle`] per
/// `</page>` element.
pub struct DumpParser<'s, R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    limits: WindowLimits,
    stats: &'s FilterStats,
    finished: bool,
}

enum State {
    Idle,
    InPage(PageAccum),
    InRevision(PageAccum, RevAccum),
}

#[derive(Clone, Copy)]
enum PageField {
    Title,
    Id,
    Restrictions,
}

#[derive(Clone, Copy)]
enum RevField {
    Id,
    Timestamp,
    Comment,
    Text,
    Username,
    ContributorId,
    Ip,
}

struct PageAccum {
    title: String,
    id_raw: String,
    restrictions_raw: String,
    redirect: bool,
    redirect_target: Option<String>,
    window: RevisionWindow,
    field: Option<PageField>,
    buf: String,
}

impl PageAccum {
    fn new(limits: WindowLimits) -> Self {
        Self {
            title: String::new(),
            id_raw: String::new(),
            restrictions_raw: String::new(),
            redirect: false,
            redirect_target: None,
            window: RevisionWindow::new(limits),
            field: None,
            buf: String::new(),
        }
    }

    fn begin(&mut self, field: PageField) {
        self.field = Some(field);
        self.buf.clear();
    }

    fn commit(&mut self) {
        let value = std::mem::take(&mut self.buf);
        match self.field.take() {
            Some(PageField::Title) => self.title = value,
            Some(PageField::Id) => self.id_raw = value,
            Some(PageField::Restrictions) => self.restrictions_raw = value,
            None => {}
        }
    }

    fn finish(self, stats: &FilterStats) -> Result<PageBundle> {
        let id: u32 = self
            .id_raw
            .trim()
            .parse()
            .with_context(|| format!("page {:?} has an unparsable id: {:?}", self.title, self.id_raw))?;
        let restrictions = parse_restrictions(&self.restrictions_raw, &self.title, stats);
        Ok(PageBundle {
            page: Page {
                title: titles::normalize(&self.title),
                id,
                redirect: self.redirect,
                redirect_target: self.redirect_target.as_deref().map(titles::normalize),
                restrictions,
            },
            revisions: self.window.into_revisions(),
        })
    }
}

#[derive(Default)]
struct RevAccum {
    id_raw: String,
    timestamp_raw: String,
    comment: String,
    text: String,
    minor: bool,
    username: Option<String>,
    contributor_id_raw: String,
    ip: Option<String>,
    in_contributor: bool,
    field: Option<RevField>,
    buf: String,
}

impl RevAccum {
    fn begin(&mut self, field: RevField) {
        self.field = Some(field);
        self.buf.clear();
    }

    fn commit(&mut self) {
        let value = std::mem::take(&mut self.buf);
        match self.field.take() {
            Some(RevField::Id) => self.id_raw = value,
            Some(RevField::Timestamp) => self.timestamp_raw = value,
            Some(RevField::Comment) => self.comment = value,
            Some(RevField::Text) => self.text = value,
            Some(RevField::Username) => self.username = Some(value),
            Some(RevField::ContributorId) => self.contributor_id_raw = value,
            Some(RevField::Ip) => self.ip = Some(value),
            None => {}
        }
    }

    fn finish(self, page_title: &str) -> Result<Revision> {
        let id: u64 = self.id_raw.trim().parse().with_context(|| {
            format!("page {:?} has a revision with an unparsable id: {:?}", page_title, self.id_raw)
        })?;
        let timestamp = DateTime::parse_from_rfc3339(self.timestamp_raw.trim())
            .with_context(|| {
                format!("revision {} has a non-ISO-8601 timestamp: {:?}", id, self.timestamp_raw)
            })?
            .with_timezone(&Utc);
        let contributor_id = self.contributor_id_raw.trim().parse().ok();
        Ok(Revision {
            id,
            timestamp,
            contributor: Contributor {
                username: self.username,
                id: contributor_id,
                ip: self.ip,
            },
            comment: self.comment,
            text: self.text,
            minor: self.minor,
        })
    }
}

impl<'s, R: BufRead> DumpParser<'s, R> {
    pub fn new(reader: R, limits: WindowLimits, stats: &'s FilterStats) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::new(),
            limits,
            stats,
            finished: false,
        }
    }

    /// Drives the state machine until the next `</page>` or end of input.
    fn read_page(&mut self) -> Result<Option<PageBundle>> {
        let mut state = State::Idle;
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .context("malformed XML in dump")?;
            state = match state {
                State::Idle => match event {
                    Event::Start(ref e) if e.local_name().as_ref() == b"page" => {
                        State::InPage(PageAccum::new(self.limits))
                    }
                    Event::Eof => return Ok(None),
                    _ => State::Idle,
                },
                State::InPage(mut page) => match event {
                    Event::Start(ref e) => match e.local_name().as_ref() {
                        b"title" => {
                            page.begin(PageField::Title);
                            State::InPage(page)
                        }
                        b"id" => {
                            page.begin(PageField::Id);
                            State::InPage(page)
                        }
                        b"restrictions" => {
                            page.begin(PageField::Restrictions);
                            State::InPage(page)
                        }
                        b"redirect" => {
                            page.redirect = true;
                            page.redirect_target = attribute(e, b"title")?;
                            State::InPage(page)
                        }
                        b"revision" => State::InRevision(page, RevAccum::default()),
                        _ => {
                            page.field = None;
                            State::InPage(page)
                        }
                    },
                    Event::Empty(ref e) => {
                        if e.local_name().as_ref() == b"redirect" {
                            page.redirect = true;
                            page.redirect_target = attribute(e, b"title")?;
                        }
                        State::InPage(page)
                    }
                    Event::Text(t) => {
                        if page.field.is_some() {
                            page.buf.push_str(&t.unescape().context("malformed text content")?);
                        }
                        State::InPage(page)
                    }
                    Event::CData(t) => {
                        if page.field.is_some() {
                            page.buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
                        }
                        State::InPage(page)
                    }
                    Event::End(ref e) => {
                        if e.local_name().as_ref() == b"page" {
                            let bundle = page.finish(self.stats)?;
                            self.stats.inc_pages();
                            if bundle.page.redirect {
                                self.stats.inc_redirects();
                            }
                            return Ok(Some(bundle));
                        }
                        page.commit();
                        State::InPage(page)
                    }
                    Event::Eof => bail!("dump ended inside a <page> element"),
                    _ => State::InPage(page),
                },
                State::InRevision(page, mut rev) => match event {
                    Event::Start(ref e) => match e.local_name().as_ref() {
                        b"contributor" => {
                            rev.in_contributor = true;
                            State::InRevision(page, rev)
                        }
                        b"id" => {
                            rev.begin(if rev.in_contributor {
                                RevField::ContributorId
                            } else {
                                RevField::Id
                            });
                            State::InRevision(page, rev)
                        }
                        b"timestamp" => {
                            rev.begin(RevField::Timestamp);
                            State::InRevision(page, rev)
                        }
                        b"comment" => {
                            rev.begin(RevField::Comment);
                            State::InRevision(page, rev)
                        }
                        b"text" => {
                            rev.begin(RevField::Text);
                            State::InRevision(page, rev)
                        }
                        b"username" => {
                            rev.begin(RevField::Username);
                            State::InRevision(page, rev)
                        }
                        b"ip" => {
                            rev.begin(RevField::Ip);
                            State::InRevision(page, rev)
                        }
                        b"minor" => {
                            rev.minor = true;
                            State::InRevision(page, rev)
                        }
                        _ => {
                            rev.field = None;
                            State::InRevision(page, rev)
                        }
                    },
                    Event::Empty(ref e) => {
                        if e.local_name().as_ref() == b"minor" {
                            rev.minor = true;
                        }
                        State::InRevision(page, rev)
                    }
                    Event::Text(t) => {
                        if rev.field.is_some() {
                            rev.buf.push_str(&t.unescape().context("malformed text content")?);
                        }
                        State::InRevision(page, rev)
                    }
                    Event::CData(t) => {
                        if rev.field.is_some() {
                            rev.buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
                        }
                        State::InRevision(page, rev)
                    }
                    Event::End(ref e) => match e.local_name().as_ref() {
                        b"revision" => {
                            let mut page = page;
                            let revision = rev.finish(&page.title)?;
                            if page.window.insert(revision) {
                                self.stats.inc_revisions_kept();
                            } else {
                                self.stats.inc_revisions_dropped();
                            }
                            State::InPage(page)
                        }
                        b"contributor" => {
                            rev.in_contributor = false;
                            State::InRevision(page, rev)
                        }
                        _ => {
                            rev.commit();
                            State::InRevision(page, rev)
                        }
                    },
                    Event::Eof => bail!("dump ended inside a <revision> element"),
                    _ => State::InRevision(page, rev),
                },
            };
        }
    }
}

impl<'s, R: BufRead> Iterator for DumpParser<'s, R> {
    type Item = Result<PageBundle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_page() {
            Ok(Some(bundle)) => Some(Ok(bundle)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.context("malformed XML attribute")?;
        if attr.key.as_ref() == name {
            let value = attr.unescape_value().context("malformed attribute value")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parses `<restrictions>` content: colon-separated tokens, each either
/// `action=group` or a bare group applying to all actions. Examples:
/// `edit=sysop:move=sysop` and `sysop`.
fn parse_restrictions(raw: &str, title: &str, stats: &FilterStats) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for token in raw.split(':').map(str::trim).filter(|t| !t.is_empty()) {
        let mut parts = token.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(action), Some(group), None) => {
                map.insert(action.to_string(), group.to_string());
            }
            (Some(group), None, None) => {
                map.insert("all".to_string(), group.to_string());
            }
            _ => {
                warn!(page = title, token = token, "skipping malformed restriction token");
                stats.inc_malformed_restrictions();
            }
        }
    }
    map
}
