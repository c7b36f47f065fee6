#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Submitted attempts and the per-case statuses Themis reports for them.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::{Deserialize, Serialize};

use crate::{client::Themis, error::Result, html};

/// Why a case ended up without a pass/fail verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "label")]
pub enum BugReason {
    /// Themis reported "No status".
    NoStatus,
    /// Themis reported an error label (compile error, crash, ...).
    Error(String),
    /// A label outside the known vocabulary.
    Unrecognized(String),
}

/// Status of a single test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Waiting for a judge.
    Queued,
    /// Dispatched to a judge but not finished.
    Pending,
    /// Output matched.
    Passed,
    /// Output differed.
    WrongOutput,
    /// No verdict could be given.
    Bugged(BugReason),
}

impl CaseStatus {
    /// Classifies a status cell from its class list and label text.
    ///
    /// The class list wins for the transitional states, since Themis marks
    /// them with `queued` / `pending` classes; the label decides otherwise.
    /// Labels outside the vocabulary become
    /// [`BugReason::Unrecognized`] instead of an error.
    pub fn classify<S: AsRef<str>>(classes: &[S], label: &str) -> Self {
        let has = |wanted: &str| classes.iter().any(|c| c.as_ref() == wanted);
        if has("pending") {
            return Self::Pending;
        }
        if has("queued") {
            return Self::Queued;
        }
        Self::from_label(label)
    }

    /// Classifies a status label alone.
    pub fn from_label(label: &str) -> Self {
        let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
        let lower = label.to_lowercase();

        if lower.contains("pending") {
            Self::Pending
        } else if lower.contains("queued") {
            Self::Queued
        } else if label.contains("Passed") {
            Self::Passed
        } else if label.contains("Wrong output") {
            Self::WrongOutput
        } else if label.contains("No status") {
            Self::Bugged(BugReason::NoStatus)
        } else if lower.contains("error") {
            Self::Bugged(BugReason::Error(label))
        } else {
            Self::Bugged(BugReason::Unrecognized(label))
        }
    }

    /// True once the case can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Pending)
    }

    /// Tri-state verdict: `Some(true)` passed, `Some(false)` wrong output,
    /// `None` otherwise.
    pub fn verdict(&self) -> Option<bool> {
        match self {
            Self::Passed => Some(true),
            Self::WrongOutput => Some(false),
            _ => None,
        }
    }

    /// Single-glyph rendering for terminal output.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Queued | Self::Pending => "⏳",
            Self::Passed => "✅",
            Self::WrongOutput => "❌",
            Self::Bugged(_) => "🐛",
        }
    }
}

impl Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Pending => write!(f, "pending"),
            Self::Passed => write!(f, "passed"),
            Self::WrongOutput => write!(f, "wrong output"),
            Self::Bugged(BugReason::NoStatus) => write!(f, "no status"),
            Self::Bugged(BugReason::Error(label)) => write!(f, "error: {label}"),
            Self::Bugged(BugReason::Unrecognized(label)) => {
                write!(f, "unrecognized status: {label}")
            }
        }
    }
}

/// Final verdicts keyed by case number; serializes as a JSON object of
/// `true` / `false` / `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(pub BTreeMap<u32, Option<bool>>);

impl Outcome {
    /// Builds the verdict map for a set of cases.
    pub fn from_cases(cases: &BTreeMap<u32, CaseStatus>) -> Self {
        Self(
            cases
                .iter()
                .map(|(id, status)| (*id, status.verdict()))
                .collect(),
        )
    }

    /// True if every case passed.
    pub fn all_passed(&self) -> bool {
        self.0.values().all(|v| *v == Some(true))
    }

    /// Verdict of one case.
    pub fn get(&self, case: u32) -> Option<Option<bool>> {
        self.0.get(&case).copied()
    }
}

/// One row of a results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRow {
    /// Case number.
    pub id:     u32,
    /// Parsed status.
    pub status: CaseStatus,
}

/// Parses the `tr.sub-casetop` rows of a results page.
///
/// Returns `None` when the page carries no results table at all. Rows whose
/// case name is not a number are skipped with a warning.
pub fn parse_case_rows(body: &str) -> Option<Vec<CaseRow>> {
    let doc = html::document(body);
    let row_selector = html::selector("tr.sub-casetop");
    let name_selector = html::selector("td.sub-casename");
    let status_selector = html::selector("td.status-icon");

    let rows: Vec<_> = doc.select(&row_selector).collect();
    if rows.is_empty() {
        let has_table = doc.select(&html::selector(".sub-cases")).next().is_some();
        return has_table.then(Vec::new);
    }

    let parsed = rows
        .into_iter()
        .filter_map(|row| {
            let name = row.select(&name_selector).next().map(html::text)?;
            let Ok(id) = name.parse::<u32>() else {
                tracing::warn!("Skipping test case with non-numeric name `{name}`");
                return None;
            };
            let status = match row.select(&status_selector).next() {
                Some(cell) => CaseStatus::classify(&html::classes(cell), &html::text(cell)),
                None => CaseStatus::Bugged(BugReason::NoStatus),
            };
            Some(CaseRow { id, status })
        })
        .collect();
    Some(parsed)
}

/// Normalizes a details key: `"Submitted on:"` becomes `submitted_on`.
pub fn normalize_info_key(raw: &str) -> String {
    raw.trim()
        .replace(['\t', '\n', ':'], "")
        .trim()
        .replace(' ', "_")
        .to_lowercase()
}

/// Details block of a submission page: plain metadata and uploaded files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionInfo {
    /// Normalized key -> value.
    pub metadata: BTreeMap<String, String>,
    /// Uploaded file name -> retrieval path.
    pub files:    BTreeMap<String, String>,
}

/// Parses the "Details" block of a submission page. Missing block yields
/// `None`.
pub fn parse_info(body: &str) -> Option<SubmissionInfo> {
    let doc = html::document(body);
    let block_selector = html::selector("div.subsec");
    let heading_selector = html::selector("h4.info");
    let line_selector = html::selector("div.cfg-container div.cfg-line");
    let key_selector = html::selector("span.cfg-key");
    let val_selector = html::selector("span.cfg-val");
    let link_selector = html::selector("a[href]");

    let block = doc.select(&block_selector).find(|div| {
        div.select(&heading_selector)
            .any(|h4| html::text(h4).contains("Details"))
    })?;

    let mut info = SubmissionInfo::default();
    for line in block.select(&line_selector) {
        let (Some(key), Some(val)) = (
            line.select(&key_selector).next(),
            line.select(&val_selector).next(),
        ) else {
            continue;
        };

        let raw_key = html::raw_text(key);
        if raw_key.contains("Files") {
            for link in val.select(&link_selector) {
                if let Some(href) = link.value().attr("href") {
                    info.files.insert(html::text(link), href.to_string());
                }
            }
        } else {
            info.metadata
                .insert(normalize_info_key(&raw_key), html::text(val));
        }
    }
    Some(info)
}

/// A submission as found on its page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Site path of the submission page.
    path:  String,
    /// Case number -> status.
    cases: BTreeMap<u32, CaseStatus>,
    /// Details block.
    info:  SubmissionInfo,
}

impl Submission {
    /// Fetches and parses the submission at `path`.
    pub fn fetch(client: &Themis, path: &str) -> Result<Self> {
        let page = client.fetch(path, "fetch submission")?;
        Ok(Self::from_page(path, &page.body))
    }

    /// Parses a submission page. Missing sections yield empty maps.
    pub fn from_page(path: impl Into<String>, body: &str) -> Self {
        let cases = parse_case_rows(body)
            .unwrap_or_default()
            .into_iter()
            .map(|row| (row.id, row.status))
            .collect();
        Self {
            path: path.into(),
            cases,
            info: parse_info(body).unwrap_or_default(),
        }
    }

    /// Site path of the submission page.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case number -> status.
    pub fn cases(&self) -> &BTreeMap<u32, CaseStatus> {
        &self.cases
    }

    /// Normalized details metadata.
    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info.metadata
    }

    /// Uploaded file name -> retrieval path.
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.info.files
    }

    /// True when no case is queued or pending.
    pub fn is_final(&self) -> bool {
        self.cases.values().all(CaseStatus::is_terminal)
    }

    /// Verdict map of the cases.
    pub fn outcome(&self) -> Outcome {
        Outcome::from_cases(&self.cases)
    }
}
