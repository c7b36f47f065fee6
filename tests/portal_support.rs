#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use temmies::{
    Blob, CaseStatus, ClientConfig, Page, Pause, PollHooks, Reporter, Result, Themis,
    Transport, Upload,
};
use uuid::Uuid;

pub const BASE: &str = "https://themis.test";

/// Something the client did, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Get(String),
    PostForm(String, Vec<(String, String)>),
    Upload(String),
    Pause(Duration),
    Report(u32, CaseStatus),
}

pub type Log = Arc<Mutex<Vec<Event>>>;

/// In-memory portal. Each URL answers from its queue; the last response of a
/// queue repeats forever. Unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes:  Mutex<HashMap<String, VecDeque<Page>>>,
    uploads: Mutex<Vec<Upload>>,
    log:     Log,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Log {
        self.log.clone()
    }

    /// Queues `body` as a 200 answer for `path` (relative to [`BASE`]).
    pub fn page(&self, path: &str, body: impl Into<String>) -> &Self {
        let url = url(path);
        self.push(&url, Page::new(200, url.clone(), body))
    }

    /// Queues an arbitrary answer for `url`.
    pub fn push(&self, url: &str, page: Page) -> &Self {
        self.routes
            .lock()
            .expect("routes lock")
            .entry(url.to_string())
            .or_default()
            .push_back(page);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn gets_of(&self, path: &str) -> usize {
        let url = url(path);
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Get(u) if *u == url))
            .count()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().expect("uploads lock").clone()
    }

    fn answer(&self, url: &str) -> Page {
        let mut routes = self.routes.lock().expect("routes lock");
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("non-empty queue"),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Page::new(404, url, "Not found"),
        }
    }

    fn record(&self, event: Event) {
        self.log.lock().expect("log lock").push(event);
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str) -> Result<Page> {
        self.record(Event::Get(url.to_string()));
        Ok(self.answer(url))
    }

    fn get_bytes(&self, url: &str) -> Result<Blob> {
        self.record(Event::Get(url.to_string()));
        let page = self.answer(url);
        Ok(Blob {
            status: page.status,
            url:    page.url,
            bytes:  page.body.into_bytes(),
        })
    }

    fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<Page> {
        self.record(Event::PostForm(url.to_string(), fields.to_vec()));
        Ok(self.answer(url))
    }

    fn post_multipart(&self, url: &str, upload: Upload) -> Result<Page> {
        self.record(Event::Upload(url.to_string()));
        self.uploads.lock().expect("uploads lock").push(upload);
        Ok(self.answer(url))
    }
}

/// Pause that only records how long it would have slept.
pub struct RecordingPause(pub Log);

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.0.lock().expect("log lock").push(Event::Pause(duration));
    }
}

/// Reporter that records every report.
pub struct RecordingReporter(pub Log);

impl Reporter for RecordingReporter {
    fn report(&mut self, case: u32, status: &CaseStatus) {
        self.0
            .lock()
            .expect("log lock")
            .push(Event::Report(case, status.clone()));
    }
}

pub fn url(path: &str) -> String {
    if path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{BASE}{path}")
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::builder()
        .base_url(BASE)
        .poll_interval(Duration::from_millis(250))
        .build()
}

pub fn client(transport: &Arc<ScriptedTransport>, config: ClientConfig) -> Themis {
    Themis::from_shared(transport.clone(), config)
}

pub fn hooks(transport: &ScriptedTransport) -> PollHooks {
    PollHooks {
        reporter: Box::new(RecordingReporter(transport.log())),
        pause:    Box::new(RecordingPause(transport.log())),
    }
}

/// Writes `files` into a fresh temporary directory.
pub fn temp_files(files: &[(&str, &str)]) -> Vec<PathBuf> {
    let root = std::env::temp_dir().join(format!("temmies-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create temp root");
    files
        .iter()
        .map(|(name, contents)| {
            let path = root.join(name);
            std::fs::write(&path, contents).expect("write temp file");
            path
        })
        .collect()
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("temmies-{}", Uuid::new_v4()))
}

/// Header shared by every portal page.
pub fn crumbs(titles: &[&str]) -> String {
    titles
        .iter()
        .map(|t| format!(r#"<a class="fill accent large" href="/course">{t}</a>"#))
        .collect()
}

/// An exercise page with a submit form.
pub fn exercise_page(title: &str, action: &str, suffixes: &str) -> String {
    format!(
        r#"<html><body>{}
        <form action="{action}" method="post" data-suffixes='{suffixes}'></form>
        </body></html>"#,
        crumbs(&["2023-2024", "Imperative Programming", title])
    )
}

/// A folder page without a submit form.
pub fn folder_page(title: &str, children: &str) -> String {
    format!(
        r#"<html><body>{}<div class="ass-children">{children}</div></body></html>"#,
        crumbs(&["2023-2024", title])
    )
}

/// A results page with one row per `(case, class, label)`.
pub fn results_page(rows: &[(u32, &str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(id, class, label)| {
            format!(
                r#"<tr class="sub-casetop"><td class="sub-casename">{id}</td><td class="status-icon {class}">{label}</td></tr>"#
            )
        })
        .collect();
    format!(r#"<div class="sub-cases subsec"><table>{rows}</table></div>"#)
}
