#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Status blocks: which submission is the latest, the best, the one that
//! counts, and so on.

use std::collections::BTreeMap;

use bon::Builder;
use scraper::ElementRef;
use serde::{Serialize, Serializer};

use crate::{
    client::Themis,
    error::{Result, ThemisError},
    html,
    node::Node,
    submission::Submission,
};

/// Descriptive labels Themis uses and the short role names they map to.
pub const ROLE_TABLE: &[(&str, &str)] = &[
    ("leading the submission that counts towards the grade", "leading"),
    ("best the latest submission with the best result", "best"),
    ("latest the most recent submission", "latest"),
    ("first pass the first submission that passed", "first_pass"),
    ("last pass the last submission to pass before the deadline", "last_pass"),
];

/// Turns a raw status label into a role key.
///
/// Colons are dropped and whitespace collapsed. Known labels map to their
/// short role; other labels are lowercased unless `case_sensitive` is set.
pub fn normalize_key(raw: &str, case_sensitive: bool) -> String {
    let collapsed = raw
        .replace(':', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let lowered = collapsed.to_lowercase();

    match ROLE_TABLE.iter().find(|(label, _)| *label == lowered) {
        Some((_, role)) => role.to_string(),
        None if case_sensitive => collapsed,
        None => lowered,
    }
}

/// A link to a submission, fetched only when asked for.
#[derive(Debug, Clone)]
pub struct SubmissionLink {
    /// Client used to fetch the submission.
    client: Themis,
    /// Site path of the submission page.
    path:   String,
}

impl SubmissionLink {
    /// Site path of the submission page.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetches the submission.
    pub fn fetch(&self) -> Result<Submission> {
        Submission::fetch(&self.client, &self.path)
    }
}

impl PartialEq for SubmissionLink {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Serialize for SubmissionLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

/// The value of one status line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusValue {
    /// The line links to a submission.
    Submission(SubmissionLink),
    /// Plain text, or any line when raw text was requested.
    Text(String),
}

impl StatusValue {
    /// The linked submission, if any.
    pub fn as_link(&self) -> Option<&SubmissionLink> {
        match self {
            Self::Submission(link) => Some(link),
            Self::Text(_) => None,
        }
    }

    /// The text, if the value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Submission(_) => None,
        }
    }
}

/// Role -> value.
pub type StatusMap = BTreeMap<String, StatusValue>;

/// How status lines are read.
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct StatusOptions {
    /// Keep every value as text instead of resolving links.
    #[builder(default)]
    pub raw_text:            bool,
    /// Keep the case of labels outside the role table.
    #[builder(default)]
    pub case_sensitive_keys: bool,
}

/// A status line before links are bound to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Normalized role key.
    pub key:  String,
    /// Text of the value.
    pub text: String,
    /// Link target of the value, if any.
    pub link: Option<String>,
}

/// Reads the `cfg-line` pairs of a status container.
fn parse_lines(container: ElementRef<'_>, options: &StatusOptions) -> Vec<StatusLine> {
    let line_selector = html::selector("div.cfg-line");
    let key_selector = html::selector("span.cfg-key");
    let val_selector = html::selector("span.cfg-val");
    let link_selector = html::selector("a[href]");

    container
        .select(&line_selector)
        .filter_map(|line| {
            let key = line.select(&key_selector).next()?;
            let val = line.select(&val_selector).next()?;
            Some(StatusLine {
                key:  normalize_key(&html::text(key), options.case_sensitive_keys),
                text: html::text(val),
                link: val
                    .select(&link_selector)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string),
            })
        })
        .collect()
}

/// Parses the first status container of a page. `None` if there is none.
pub fn parse_status_section(body: &str, options: &StatusOptions) -> Option<Vec<StatusLine>> {
    let doc = html::document(body);
    let container = doc.select(&html::selector("div.cfg-container")).next()?;
    Some(parse_lines(container, options))
}

/// Parses every titled status block of an aggregate page, keyed by the
/// block heading.
pub fn parse_status_blocks(
    body: &str,
    options: &StatusOptions,
) -> BTreeMap<String, Vec<StatusLine>> {
    let doc = html::document(body);
    let block_selector = html::selector("div.subsec");
    let heading_selector = html::selector("h2, h3, h4");
    let container_selector = html::selector("div.cfg-container");

    doc.select(&block_selector)
        .filter_map(|block| {
            let heading = html::text(block.select(&heading_selector).next()?);
            let container = block.select(&container_selector).next()?;
            (!heading.is_empty()).then(|| (heading, parse_lines(container, options)))
        })
        .collect()
}

/// Binds parsed lines to a client.
fn into_map(client: &Themis, lines: Vec<StatusLine>, options: &StatusOptions) -> StatusMap {
    lines
        .into_iter()
        .map(|line| {
            let value = match line.link {
                Some(path) if !options.raw_text => StatusValue::Submission(SubmissionLink {
                    client: client.clone(),
                    path,
                }),
                _ => StatusValue::Text(line.text),
            };
            (line.key, value)
        })
        .collect()
}

impl Node {
    /// Finds and fetches this node's status page.
    fn status_page(&self) -> Result<Option<String>> {
        let page = self.client().fetch(&self.page_path(), "open node")?;
        let doc = html::document(&page.body);
        let Some(href) = html::link_with_text(&doc, "Status")
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
        else {
            return Ok(None);
        };
        let status = self.client().fetch(&href, "fetch status")?;
        Ok(Some(status.body))
    }

    /// Reads this node's status block.
    ///
    /// Fails with [`ThemisError::NotAvailable`] when the node has no status
    /// link or the status page has no status section.
    pub fn status(&self, options: &StatusOptions) -> Result<StatusMap> {
        let not_available = || ThemisError::NotAvailable {
            path: self.path().to_string(),
        };
        let body = self.status_page()?.ok_or_else(not_available)?;
        let lines = parse_status_section(&body, options).ok_or_else(not_available)?;
        Ok(into_map(self.client(), lines, options))
    }

    /// Reads every status block on this node's status page, keyed by
    /// exercise title. A node without status blocks yields an empty map.
    pub fn all_statuses(&self, options: &StatusOptions) -> Result<BTreeMap<String, StatusMap>> {
        let Some(body) = self.status_page()? else {
            return Ok(BTreeMap::new());
        };
        Ok(parse_status_blocks(&body, options)
            .into_iter()
            .map(|(title, lines)| (title, into_map(self.client(), lines, options)))
            .collect())
    }
}
