#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Submitting files to an exercise and waiting for the judge.
//!
//! A submission moves through `Uploading -> Triggered -> Polling ->
//! Resolved`. While polling, a result page with a *pending* case means the
//! judge was dispatched before Themis registered the trigger, so the trigger
//! is re-sent straight away; a *queued* case only needs patience. Both paths
//! are bounded by [`ClientConfig`] so a stuck judge surfaces as
//! [`ThemisError::Timeout`].

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    client::Themis,
    config::{ClientConfig, FileTypePolicy},
    error::{Result, ThemisError},
    html,
    node::Node,
    submission::{CaseStatus, Outcome, parse_case_rows},
    transport::{Upload, UploadFile},
};

/// Judge language sent when no file matched and the policy is lenient.
pub const NO_LANGUAGE: &str = "none";

/// Marker contained in every submission page URL.
const SUBMISSIONS_MARKER: &str = "@submissions";

/// Accepted file suffixes of one exercise, mapped to judge languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTypes(BTreeMap<String, String>);

impl FileTypes {
    /// Parses the JSON object of a form's `data-suffixes` attribute.
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json).map(Self)
    }

    /// Judge language for `file_name`; the longest matching suffix wins.
    pub fn language_for(&self, file_name: &str) -> Option<&str> {
        self.0
            .iter()
            .filter(|(suffix, _)| file_name.ends_with(suffix.as_str()))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, language)| language.as_str())
    }

    /// All accepted suffixes.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FileTypes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The upload form of an exercise page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitForm {
    /// Upload endpoint (form `action`).
    pub action:     String,
    /// Accepted suffixes (form `data-suffixes`).
    pub file_types: FileTypes,
}

impl SubmitForm {
    /// Locates the submit form on an exercise page. `None` if no form has
    /// both an action and a readable suffix table.
    pub fn parse(body: &str) -> Option<Self> {
        let doc = html::document(body);
        let form = doc
            .select(&html::selector("form[action][data-suffixes]"))
            .next()?;
        let action = form.value().attr("action")?.to_string();
        let suffixes = form.value().attr("data-suffixes")?;
        match FileTypes::parse(suffixes) {
            Ok(file_types) => Some(Self { action, file_types }),
            Err(err) => {
                tracing::debug!("Unreadable data-suffixes on submit form: {err}");
                None
            }
        }
    }
}

/// What the caller wants to happen after the upload.
#[derive(Debug, Clone, Builder)]
pub struct SubmitOptions {
    /// Ask Themis to judge the submission right away.
    #[builder(default = true)]
    pub judge:   bool,
    /// Block until every case is judged.
    #[builder(default = true)]
    pub wait:    bool,
    /// Report each case once as it resolves.
    #[builder(default)]
    pub verbose: bool,
    /// Checked before every poll.
    #[builder(default)]
    pub cancel:  CancellationToken,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Cooperative cancellation for a running poll loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the poller stops before its next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`Self::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives each resolved case of a verbose poll session.
pub trait Reporter {
    /// Called at most once per case and session.
    fn report(&mut self, case: u32, status: &CaseStatus);
}

/// Reporter that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, case: u32, status: &CaseStatus) {
        match status {
            CaseStatus::Bugged(_) => tracing::info!("{case}: {} {status}", status.symbol()),
            _ => tracing::info!("{case}: {}", status.symbol()),
        }
    }
}

/// The wait between two polls.
pub trait Pause {
    /// Blocks the calling thread for `duration`.
    fn pause(&self, duration: Duration);
}

/// [`Pause`] that sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Pluggable side effects of a poll session.
pub struct PollHooks {
    /// Where verbose reports go.
    pub reporter: Box<dyn Reporter>,
    /// How the backoff wait is performed.
    pub pause:    Box<dyn Pause>,
}

impl Default for PollHooks {
    fn default() -> Self {
        Self {
            reporter: Box::new(TracingReporter),
            pause:    Box::new(ThreadSleep),
        }
    }
}

impl fmt::Debug for PollHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollHooks").finish_non_exhaustive()
    }
}

/// What the poller decided after reading one result page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// A fresh result page is needed.
    Polling,
    /// Some case is pending; the judge must be triggered again.
    ReTriggering,
    /// Some case is queued; wait and poll again.
    Backoff,
    /// Every case is terminal.
    Resolved,
}

impl PollState {
    /// Applies the priority rule to one poll's statuses: pending beats
    /// queued, and only a page without either is resolved.
    pub fn after_poll<'a>(statuses: impl IntoIterator<Item = &'a CaseStatus>) -> Self {
        let mut queued = false;
        for status in statuses {
            match status {
                CaseStatus::Pending => return Self::ReTriggering,
                CaseStatus::Queued => queued = true,
                _ => {}
            }
        }
        if queued { Self::Backoff } else { Self::Resolved }
    }
}

/// A submission whose cases all reached a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgedSubmission {
    /// Result page that was polled.
    pub location:   String,
    /// Final case statuses.
    pub cases:      BTreeMap<u32, CaseStatus>,
    /// Result pages fetched.
    pub polls:      u32,
    /// Judge re-triggers issued.
    pub retriggers: u32,
}

impl JudgedSubmission {
    /// Tri-state verdict map.
    pub fn outcome(&self) -> Outcome {
        Outcome::from_cases(&self.cases)
    }
}

/// Result of [`Node::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SubmitOutcome {
    /// Judging finished.
    Judged(JudgedSubmission),
    /// The caller did not wait; the result page, if Themis produced one.
    Submitted {
        /// Result page of the new submission.
        location: Option<String>,
    },
}

/// URL that (re-)triggers judging for a result page.
pub fn judge_url(location: &str) -> String {
    location.replace("submission", "judge")
}

/// Polls a result page until every case is terminal.
pub struct Poller<'a> {
    /// Client used for every request.
    client:     &'a Themis,
    /// Result page.
    location:   String,
    /// Report resolved cases.
    verbose:    bool,
    /// Checked before every poll.
    cancel:     CancellationToken,
    /// Side effects.
    hooks:      PollHooks,
    /// Cases already reported in this session.
    reported:   BTreeSet<u32>,
    /// Result pages fetched so far.
    polls:      u32,
    /// Re-triggers issued so far.
    retriggers: u32,
}

impl<'a> Poller<'a> {
    /// Prepares a poll session for `location`.
    pub fn new(client: &'a Themis, location: impl Into<String>) -> Self {
        Self {
            client,
            location: location.into(),
            verbose: false,
            cancel: CancellationToken::default(),
            hooks: PollHooks::default(),
            reported: BTreeSet::new(),
            polls: 0,
            retriggers: 0,
        }
    }

    /// Enables reporting of resolved cases.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Uses `cancel` to stop the loop from outside.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replaces the default reporter and pause.
    pub fn hooks(mut self, hooks: PollHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Runs the loop to completion.
    pub fn run(mut self) -> Result<JudgedSubmission> {
        let client = self.client;
        let config: &ClientConfig = client.config();
        let started = Instant::now();
        let mut state = PollState::Polling;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ThemisError::Cancelled {
                    location: self.location,
                });
            }
            if self.exhausted(config, started) {
                return Err(self.timeout());
            }

            let cases = self.poll()?;
            let next = PollState::after_poll(cases.values());
            tracing::debug!(
                "Poll {} of {}: {state:?} -> {next:?}",
                self.polls,
                self.location
            );
            self.report(&cases);
            state = next;

            match state {
                PollState::ReTriggering => {
                    if self.retriggers >= config.max_retriggers() {
                        return Err(self.timeout());
                    }
                    self.retrigger()?;
                    state = PollState::Polling;
                }
                PollState::Backoff => {
                    // No pause when no poll would follow it.
                    if self.exhausted(config, started) {
                        return Err(self.timeout());
                    }
                    self.hooks.pause.pause(config.poll_interval());
                    state = PollState::Polling;
                }
                PollState::Resolved => {
                    return Ok(JudgedSubmission {
                        location: self.location,
                        cases,
                        polls: self.polls,
                        retriggers: self.retriggers,
                    });
                }
                PollState::Polling => {}
            }
        }
    }

    /// True once the poll count or the elapsed time reaches its bound.
    fn exhausted(&self, config: &ClientConfig, started: Instant) -> bool {
        self.polls >= config.max_polls() || started.elapsed() >= config.poll_timeout()
    }

    /// Fetches and parses the result page once.
    fn poll(&mut self) -> Result<BTreeMap<u32, CaseStatus>> {
        self.polls += 1;
        let page = self.client.fetch(&self.location, "poll results")?;
        let rows = parse_case_rows(&page.body)
            .ok_or_else(|| ThemisError::malformed(&self.location, "results table missing"))?;
        Ok(rows.into_iter().map(|row| (row.id, row.status)).collect())
    }

    /// Sends the judge trigger again.
    fn retrigger(&mut self) -> Result<()> {
        self.retriggers += 1;
        let url = judge_url(&self.location);
        tracing::debug!("Case pending before judging was registered; re-triggering {url}");
        self.client.fetch(&url, "re-trigger judging")?;
        Ok(())
    }

    /// Reports terminal cases not reported before.
    fn report(&mut self, cases: &BTreeMap<u32, CaseStatus>) {
        if !self.verbose {
            return;
        }
        for (id, status) in cases.iter().filter(|(_, s)| s.is_terminal()) {
            if self.reported.insert(*id) {
                self.hooks.reporter.report(*id, status);
            }
        }
    }

    /// Timeout error for the current location.
    fn timeout(&self) -> ThemisError {
        ThemisError::Timeout {
            location: self.location.clone(),
            polls:    self.polls,
        }
    }
}

/// A local file tagged with its judge language.
#[derive(Debug, Clone)]
struct TaggedFile {
    /// Local path.
    path:      PathBuf,
    /// File name sent to the server.
    file_name: String,
    /// Judge language of the suffix, if any matched.
    language:  Option<String>,
}

/// Matches every file against `file_types` and picks the batch language.
///
/// The batch language is the last matched language, so it follows the final
/// recognised file on the command line. Without any match the
/// policy decides between failing and the [`NO_LANGUAGE`] sentinel.
fn tag_files(
    files: &[PathBuf],
    file_types: &FileTypes,
    policy: FileTypePolicy,
) -> Result<(Vec<TaggedFile>, String)> {
    let tagged: Vec<TaggedFile> = files
        .iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let language = file_types.language_for(&file_name).map(str::to_string);
            TaggedFile {
                path: path.clone(),
                file_name,
                language,
            }
        })
        .collect();

    let batch_language = tagged.iter().rev().find_map(|f| f.language.clone());
    let batch_language = match (batch_language, policy) {
        (Some(language), _) => language,
        (None, FileTypePolicy::Strict) => {
            return Err(ThemisError::UnknownFileType {
                files: tagged.into_iter().map(|f| f.file_name).collect(),
            });
        }
        (None, FileTypePolicy::Lenient) => {
            tracing::warn!(
                "None of the files matches an accepted suffix ({}); submitting with judge \
                 language `{NO_LANGUAGE}`",
                file_types.suffixes().collect::<Vec<_>>().join(", ")
            );
            NO_LANGUAGE.to_string()
        }
    };
    Ok((tagged, batch_language))
}

/// Reads every file and assembles the multipart body.
fn build_upload(tagged: Vec<TaggedFile>, language: &str, judge: bool) -> Result<Upload> {
    let files = tagged
        .into_iter()
        .map(|file| {
            let bytes = std::fs::read(&file.path).map_err(|source| ThemisError::Io {
                path: file.path.clone(),
                source,
            })?;
            Ok(UploadFile {
                field: file.language.unwrap_or_else(|| language.to_string()),
                file_name: file.file_name,
                bytes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Upload {
        fields: vec![
            ("judgenow".to_string(), judge.to_string()),
            ("judgeLanguage".to_string(), language.to_string()),
        ],
        files,
    })
}

impl Node {
    /// Submits `files` with the default reporter and a real sleep.
    pub fn submit<P: AsRef<Path>>(
        &self,
        files: &[P],
        options: &SubmitOptions,
    ) -> Result<SubmitOutcome> {
        self.submit_with(files, options, PollHooks::default())
    }

    /// Submits `files` and, if asked to, waits for the judge.
    ///
    /// Nothing is uploaded when the node is not an exercise, the page has no
    /// submit form, a file cannot be read, or (under the strict policy) no
    /// file has an accepted suffix.
    pub fn submit_with<P: AsRef<Path>>(
        &self,
        files: &[P],
        options: &SubmitOptions,
        hooks: PollHooks,
    ) -> Result<SubmitOutcome> {
        self.require_exercise()?;
        let client = self.client();

        let page = client.fetch(&self.page_path(), "open exercise")?;
        let form = SubmitForm::parse(&page.body).ok_or_else(|| ThemisError::NotSubmittable {
            path: self.path().to_string(),
        })?;

        let files: Vec<PathBuf> = files.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let (tagged, language) =
            tag_files(&files, &form.file_types, client.config().file_type_policy())?;
        let upload = build_upload(tagged, &language, options.judge)?;

        tracing::info!("Submitting to {}", self.title());
        if options.verbose {
            for file in &upload.files {
                tracing::info!("• {}", file.file_name);
            }
        }

        let url = client.url(&form.action)?;
        let response = client.transport().post_multipart(&url, upload)?;
        let response = Themis::check_session(response, &url)?.ensure_success("upload")?;
        let location = response
            .url
            .contains(SUBMISSIONS_MARKER)
            .then(|| response.url.clone());

        if !options.wait || !options.judge {
            return Ok(SubmitOutcome::Submitted { location });
        }

        let location = location.ok_or(ThemisError::RequestRejected {
            operation: "upload",
            url:       response.url,
            status:    response.status,
        })?;

        Poller::new(client, location)
            .verbose(options.verbose)
            .cancellation(options.cancel.clone())
            .hooks(hooks)
            .run()
            .map(SubmitOutcome::Judged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::BugReason;

    #[test]
    fn longest_suffix_wins() {
        let types: FileTypes = [(".c", "c"), (".h", "c"), (".tar.gz", "archive"), (".gz", "gzip")]
            .into_iter()
            .collect();
        assert_eq!(types.language_for("main.c"), Some("c"));
        assert_eq!(types.language_for("bundle.tar.gz"), Some("archive"));
        assert_eq!(types.language_for("notes.txt"), None);
    }

    #[test]
    fn form_requires_action_and_suffixes() {
        let ok = r#"<form action="/submit/2023/x" data-suffixes='{".py": "python"}'></form>"#;
        let form = SubmitForm::parse(ok).expect("form");
        assert_eq!(form.action, "/submit/2023/x");
        assert_eq!(form.file_types.language_for("a.py"), Some("python"));

        assert!(SubmitForm::parse(r#"<form action="/submit/x"></form>"#).is_none());
        assert!(SubmitForm::parse("<p>no form</p>").is_none());

        let with_header = r#"<form action="/log/out"><button>Log out</button></form>
            <form action="/submit/2023/x" data-suffixes='{".c": "c"}'></form>"#;
        let form = SubmitForm::parse(with_header).expect("submit form after header form");
        assert_eq!(form.action, "/submit/2023/x");
    }

    #[test]
    fn pending_outranks_queued() {
        let statuses = [CaseStatus::Queued, CaseStatus::Passed, CaseStatus::Pending];
        assert_eq!(PollState::after_poll(&statuses), PollState::ReTriggering);
        let statuses = [CaseStatus::Passed, CaseStatus::Queued];
        assert_eq!(PollState::after_poll(&statuses), PollState::Backoff);
        let statuses = [
            CaseStatus::Passed,
            CaseStatus::Bugged(BugReason::Unrecognized("?".into())),
        ];
        assert_eq!(PollState::after_poll(&statuses), PollState::Resolved);
    }

    #[test]
    fn strict_policy_rejects_unknown_types() {
        let types: FileTypes = [(".c", "c")].into_iter().collect();
        let err = tag_files(&[PathBuf::from("notes.txt")], &types, FileTypePolicy::Strict)
            .expect_err("strict must fail");
        assert!(matches!(err, ThemisError::UnknownFileType { files } if files == ["notes.txt"]));

        let (_, language) =
            tag_files(&[PathBuf::from("notes.txt")], &types, FileTypePolicy::Lenient)
                .expect("lenient proceeds");
        assert_eq!(language, NO_LANGUAGE);
    }

    #[test]
    fn unmatched_files_inherit_batch_language() {
        let types: FileTypes = [(".c", "c")].into_iter().collect();
        let (tagged, language) = tag_files(
            &[PathBuf::from("Makefile"), PathBuf::from("src/main.c")],
            &types,
            FileTypePolicy::Strict,
        )
        .expect("one file matches");
        assert_eq!(language, "c");
        assert_eq!(tagged[0].language, None);
        assert_eq!(tagged[1].file_name, "main.c");
    }

    #[test]
    fn mixed_batches_take_the_last_matched_language() {
        let types: FileTypes = [(".py", "python"), (".c", "c")].into_iter().collect();
        let (tagged, language) = tag_files(
            &[
                PathBuf::from("helper.py"),
                PathBuf::from("main.c"),
                PathBuf::from("README"),
            ],
            &types,
            FileTypePolicy::Strict,
        )
        .expect("two files match");
        assert_eq!(language, "c");
        assert_eq!(tagged[0].language.as_deref(), Some("python"));
    }

    #[test]
    fn judge_url_swaps_path_segment() {
        assert_eq!(
            judge_url("https://themis.example/submission/2023-2024/x/@submissions/s1"),
            "https://themis.example/judge/2023-2024/x/@judges/s1"
        );
    }
}
