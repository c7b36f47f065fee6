#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Test cases and attachments offered for download on exercise pages.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    error::{Result, ThemisError},
    html,
    node::Node,
};

/// A downloadable file linked from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Download {
    /// Link text, used as the local file name.
    pub name: String,
    /// Site path of the file.
    pub path: String,
}

/// Links listed under the "Test cases" info block.
pub fn parse_test_cases(body: &str) -> Vec<Download> {
    let doc = html::document(body);
    let block_selector = html::selector("div.subsec");
    let heading_selector = html::selector("h4.info");
    let link_selector = html::selector("div.cfg-line a[href]");

    doc.select(&block_selector)
        .filter(|block| {
            block
                .select(&heading_selector)
                .any(|h4| html::text(h4).contains("Test cases"))
        })
        .flat_map(|block| block.select(&link_selector).collect::<Vec<_>>())
        .filter_map(|a| {
            Some(Download {
                name: html::text(a),
                path: a.value().attr("href")?.to_string(),
            })
        })
        .collect()
}

/// Links listed under the "Downloads" key of the details block.
pub fn parse_attachments(body: &str) -> Vec<Download> {
    let doc = html::document(body);
    let details_selector = html::selector("div[id^=details]");
    let line_selector = html::selector("div.cfg-line");
    let key_selector = html::selector("span.cfg-key");
    let link_selector = html::selector("span.cfg-val a[href]");

    let Some(details) = doc.select(&details_selector).next() else {
        return Vec::new();
    };

    details
        .select(&line_selector)
        .filter(|line| {
            line.select(&key_selector)
                .next()
                .is_some_and(|key| html::text(key).contains("Downloads"))
        })
        .flat_map(|line| line.select(&link_selector).collect::<Vec<_>>())
        .filter_map(|a| {
            Some(Download {
                name: html::text(a),
                path: a.value().attr("href")?.to_string(),
            })
        })
        .collect()
}

impl Node {
    /// Test cases published on this exercise.
    pub fn test_cases(&self) -> Result<Vec<Download>> {
        self.require_exercise()?;
        let page = self.client().fetch(&self.page_path(), "open exercise")?;
        Ok(parse_test_cases(&page.body))
    }

    /// Files attached to this folder or exercise.
    pub fn attachments(&self) -> Result<Vec<Download>> {
        let page = self.client().fetch(&self.page_path(), "open node")?;
        Ok(parse_attachments(&page.body))
    }

    /// Downloads every test case into `dir`, returning the written paths.
    pub fn download_test_cases(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let downloads = self.test_cases()?;
        self.download_all(&downloads, dir.as_ref())
    }

    /// Downloads every attachment into `dir`, returning the written paths.
    pub fn download_attachments(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let downloads = self.attachments()?;
        self.download_all(&downloads, dir.as_ref())
    }

    /// Fetches each download and writes it under `dir`.
    fn download_all(&self, downloads: &[Download], dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|source| ThemisError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        downloads
            .iter()
            .enumerate()
            .map(|(index, download)| {
                let target = dir.join(local_name(&download.name, index));

                tracing::info!("Downloading {}", download.name);
                let bytes = self.client().fetch_bytes(&download.path, "download")?;
                std::fs::write(&target, bytes).map_err(|source| ThemisError::Io {
                    path: target.clone(),
                    source,
                })?;
                Ok(target)
            })
            .collect()
    }
}

/// File name for the `index`th download. Link text is server-controlled, so
/// only its final component is used; text without one gets a numbered name.
fn local_name(name: &str, index: usize) -> PathBuf {
    match Path::new(name).file_name() {
        Some(file_name) => PathBuf::from(file_name),
        None => {
            let fallback = format!("download-{index}");
            tracing::warn!("Link {name:?} has no file name, saving it as {fallback}");
            PathBuf::from(fallback)
        }
    }
}
