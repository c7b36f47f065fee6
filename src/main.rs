#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # temmies
//! ## Introduction
//!
//! A command line client for the Themis coursework portal.
//!
//! ## Usage
//!
//! Put `THEMIS_USER` and `THEMIS_PASSWORD` in the environment or in a `.env`
//! file, then run `temmies ls /2023-2024` to browse, or
//! `temmies submit /2023-2024/adinc-ai/labs/1 main.c` to submit and wait for
//! the judge. Every command prints JSON on stdout; progress and tables go to
//! stderr.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use serde::Serialize;
use serde_json::json;
use tabled::{
    Table, Tabled,
    settings::{Panel, Style},
};
use temmies::{
    CaseStatus, ClientConfig, EnvCredentials, Node, StatusOptions, SubmitOptions, SubmitOutcome,
    Themis,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// List the children of a folder
    Ls(String),
    /// Submit files to an exercise
    Submit {
        /// Navigation path of the exercise
        path:     String,
        /// Files to upload
        files:    Vec<PathBuf>,
        /// Upload without asking for judging
        no_judge: bool,
        /// Return right after the upload
        no_wait:  bool,
        /// Do not report cases as they resolve
        quiet:    bool,
    },
    /// Show status blocks
    Status {
        /// Navigation path of the node
        path: String,
        /// Every block on the status page instead of the first
        all:  bool,
        /// Keep links as text
        text: bool,
    },
    /// Show the cases of a submission
    Cases(String),
    /// Download test cases or attachments
    Download {
        /// Navigation path of the node
        path:        String,
        /// Target directory
        dir:         PathBuf,
        /// Attachments instead of test cases
        attachments: bool,
    },
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses a navigation path
    fn p() -> impl Parser<String> {
        positional("PATH").help("Navigation path, e.g. /2023-2024/adinc-ai/labs")
    }

    /// parses a submission path
    fn s() -> impl Parser<String> {
        positional("SUBMISSION").help("Path of a submission page")
    }

    let ls = construct!(Cmd::Ls(p()))
        .to_options()
        .command("ls")
        .help("List the folders and exercises inside a folder");

    let submit = {
        let path = p();
        let files = positional::<PathBuf>("FILE")
            .help("File to upload")
            .some("at least one file is required");
        let no_judge = long("no-judge")
            .help("Upload without judging")
            .switch();
        let no_wait = long("no-wait")
            .help("Do not wait for the judge")
            .switch();
        let quiet = short('q')
            .long("quiet")
            .help("Do not report cases as they resolve")
            .switch();
        construct!(Cmd::Submit {
            path,
            files,
            no_judge,
            no_wait,
            quiet
        })
    }
    .to_options()
    .command("submit")
    .help("Submit files to an exercise and wait for the results");

    let status = {
        let path = p();
        let all = long("all")
            .help("Read every status block on the page")
            .switch();
        let text = long("text")
            .help("Keep submission links as plain text")
            .switch();
        construct!(Cmd::Status { path, all, text })
    }
    .to_options()
    .command("status")
    .help("Show which submissions are leading, best, latest, ...");

    let cases = construct!(Cmd::Cases(s()))
        .to_options()
        .command("cases")
        .help("Show the test case results of a submission");

    let download = {
        let path = p();
        let dir = positional::<PathBuf>("DIR").help("Directory to write into");
        let attachments = long("attachments")
            .help("Download attachments instead of test cases")
            .switch();
        construct!(Cmd::Download {
            path,
            dir,
            attachments
        })
    }
    .to_options()
    .command("download")
    .help("Download the test cases or attachments of a node");

    let cmd = construct!([ls, submit, status, cases, download]);

    cmd.to_options()
        .descr("Client for the Themis coursework portal")
        .run()
}

/// One row of the `ls` table.
#[derive(Tabled, Serialize)]
struct Listing {
    /// Display title
    #[tabled(rename = "Title")]
    title: String,
    /// Folder or exercise
    #[tabled(rename = "Kind")]
    kind:  String,
    /// Navigation path
    #[tabled(rename = "Path")]
    path:  String,
}

impl From<&Node> for Listing {
    fn from(node: &Node) -> Self {
        let kind = if node.is_exercise() {
            "exercise"
        } else {
            "folder"
        };
        Self {
            title: node.title().to_string(),
            kind:  kind.to_string(),
            path:  node.path().to_string(),
        }
    }
}

/// One row of a case table.
#[derive(Tabled)]
struct CaseLine {
    /// Case number
    #[tabled(rename = "Case")]
    id:     u32,
    /// Colored status
    #[tabled(rename = "Status")]
    status: String,
}

/// Renders case statuses as a table, colored by verdict.
fn case_table(title: &str, cases: &BTreeMap<u32, CaseStatus>) -> String {
    let lines: Vec<CaseLine> = cases
        .iter()
        .map(|(id, status)| {
            let label = format!("{} {status}", status.symbol());
            let status = match status.verdict() {
                Some(true) => label.green().to_string(),
                Some(false) => label.red().to_string(),
                None => label.yellow().to_string(),
            };
            CaseLine { id: *id, status }
        })
        .collect();

    Table::new(&lines)
        .with(Panel::header(title.to_string()))
        .with(Style::modern())
        .to_string()
}

/// Prints a value as pretty JSON on stdout.
fn print_json(value: &impl Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();

    let level = std::env::var("TEMMIES_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let filter_layer = LevelFilter::from_level(level);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let cmd = options();

    let config = ClientConfig::from_env();
    let themis = Themis::connect(config, &EnvCredentials::default())
        .context("Failed to log in to Themis")?;

    match cmd {
        Cmd::Ls(path) => {
            let node = themis
                .node(&path)
                .with_context(|| format!("Failed to open `{path}`"))?;
            let children = node
                .list_children()
                .with_context(|| format!("Failed to list `{path}`"))?;
            let listing: Vec<Listing> = children.iter().map(Listing::from).collect();

            eprintln!(
                "{}",
                Table::new(&listing)
                    .with(Panel::header(node.to_string()))
                    .with(Style::modern())
            );
            print_json(&listing)?;
        }
        Cmd::Submit {
            path,
            files,
            no_judge,
            no_wait,
            quiet,
        } => {
            let exercise = themis
                .node(&path)
                .with_context(|| format!("Failed to open `{path}`"))?;
            let options = SubmitOptions::builder()
                .judge(!no_judge)
                .wait(!no_wait)
                .verbose(!quiet)
                .build();
            let outcome = exercise
                .submit(&files, &options)
                .with_context(|| format!("Failed to submit to `{path}`"))?;

            match outcome {
                SubmitOutcome::Judged(judged) => {
                    if !quiet {
                        eprintln!("{}", case_table(exercise.title(), &judged.cases));
                    }
                    print_json(&json!({
                        "location": judged.location,
                        "outcome": judged.outcome(),
                        "all_passed": judged.outcome().all_passed(),
                    }))?;
                }
                submitted @ SubmitOutcome::Submitted { .. } => print_json(&submitted)?,
            }
        }
        Cmd::Status { path, all, text } => {
            let node = themis
                .node(&path)
                .with_context(|| format!("Failed to open `{path}`"))?;
            let options = StatusOptions::builder().raw_text(text).build();
            if all {
                let statuses = node
                    .all_statuses(&options)
                    .with_context(|| format!("Failed to read statuses of `{path}`"))?;
                print_json(&statuses)?;
            } else {
                let status = node
                    .status(&options)
                    .with_context(|| format!("Failed to read status of `{path}`"))?;
                print_json(&status)?;
            }
        }
        Cmd::Cases(path) => {
            let submission = themis
                .submission(&path)
                .with_context(|| format!("Failed to fetch submission `{path}`"))?;
            eprintln!("{}", case_table(&path, submission.cases()));
            print_json(&json!({
                "path": submission.path(),
                "final": submission.is_final(),
                "outcome": submission.outcome(),
                "info": submission.info(),
                "files": submission.files(),
            }))?;
        }
        Cmd::Download {
            path,
            dir,
            attachments,
        } => {
            let node = themis
                .node(&path)
                .with_context(|| format!("Failed to open `{path}`"))?;
            let written = if attachments {
                node.download_attachments(&dir)
            } else {
                node.download_test_cases(&dir)
            }
            .with_context(|| format!("Failed to download from `{path}`"))?;
            print_json(&written)?;
        }
    };

    Ok(())
}
