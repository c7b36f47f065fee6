#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The [`Themis`] handle: one authenticated transport plus configuration,
//! shared by every node and submission it hands out.

use std::{fmt, sync::Arc};

use url::Url;

use crate::{
    config::ClientConfig,
    error::{Result, ThemisError},
    html,
    node::Node,
    submission::Submission,
    transport::{Page, Transport},
    year::Year,
};

/// Entry point into the portal.
///
/// Cloning is cheap; clones share the transport and its cookies. The
/// transport is used strictly in program order, one request at a time.
#[derive(Clone)]
pub struct Themis {
    /// Authenticated connection.
    transport: Arc<dyn Transport>,
    /// Settings for every request.
    config:    Arc<ClientConfig>,
}

impl fmt::Debug for Themis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Themis")
            .field("base_url", &self.config.base_url())
            .finish_non_exhaustive()
    }
}

impl Themis {
    /// Wraps an already authenticated transport.
    pub fn new(transport: impl Transport + 'static, config: ClientConfig) -> Self {
        Self::from_shared(Arc::new(transport), config)
    }

    /// Wraps a transport that is shared with other owners.
    pub fn from_shared(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Resolves a site path (or an absolute URL) against the base URL.
    pub fn url(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        let base = Url::parse(self.config.base_url())
            .map_err(|e| ThemisError::Url(self.config.base_url().to_string(), e))?;
        base.join(path)
            .map(String::from)
            .map_err(|e| ThemisError::Url(path.to_string(), e))
    }

    /// GETs a page, failing on login redirects and non-success statuses.
    pub fn fetch(&self, path: &str, operation: &'static str) -> Result<Page> {
        let url = self.url(path)?;
        let page = self.transport.get(&url)?;
        Self::check_session(page, &url)?.ensure_success(operation)
    }

    /// GETs a file, failing on login redirects and non-success statuses.
    pub fn fetch_bytes(&self, path: &str, operation: &'static str) -> Result<Vec<u8>> {
        let url = self.url(path)?;
        let blob = self.transport.get_bytes(&url)?;
        if blob.is_login_redirect() {
            return Err(ThemisError::SessionInvalid { url });
        }
        if !blob.is_success() {
            return Err(ThemisError::RequestRejected {
                operation,
                url: blob.url,
                status: blob.status,
            });
        }
        Ok(blob.bytes)
    }

    /// Fails with [`ThemisError::SessionInvalid`] if `page` is the login form.
    pub(crate) fn check_session(page: Page, requested: &str) -> Result<Page> {
        if page.is_login_redirect() {
            Err(ThemisError::SessionInvalid {
                url: requested.to_string(),
            })
        } else {
            Ok(page)
        }
    }

    /// Every academic year listed on the course overview.
    pub fn all_years(&self) -> Result<Vec<Year>> {
        let page = self.fetch("/course/", "list years")?;
        let doc = html::document(&page.body);
        let entries = html::selector("ul.round li.large a");

        let years = doc
            .select(&entries)
            .filter_map(|a| {
                let label = html::text(a);
                let parsed = Year::parse_label(&label);
                if parsed.is_none() {
                    tracing::debug!("Skipping year entry `{label}`");
                }
                parsed
            })
            .map(|(start, end)| Year::new(self.clone(), start, end))
            .collect();
        Ok(years)
    }

    /// The academic year `start-end`. No request is made.
    pub fn year(&self, start: u16, end: u16) -> Year {
        Year::new(self.clone(), start, end)
    }

    /// Fetches the node at `path`, e.g. `/2023-2024/adinc-ai/labs`.
    pub fn node(&self, path: &str) -> Result<Node> {
        Node::from_path(self.clone(), path)
    }

    /// Fetches the submission at `path`.
    pub fn submission(&self, path: &str) -> Result<Submission> {
        Submission::fetch(self, path)
    }
}
