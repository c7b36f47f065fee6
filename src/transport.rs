#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The HTTP boundary. Everything above this module speaks in [`Page`]s and
//! never touches reqwest directly, so tests can swap in a scripted transport.

use reqwest::blocking::{
    Client, Response,
    multipart::{Form, Part},
};

use crate::{
    config::ClientConfig,
    error::{Result, ThemisError},
};

/// Path of the login form; landing here after a redirect means the session
/// expired.
pub const LOGIN_PATH: &str = "/log/in";

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// HTTP status code.
    pub status: u16,
    /// URL after following redirects.
    pub url:    String,
    /// Response body.
    pub body:   String,
}

impl Page {
    /// Creates a page from its parts.
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// True for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True if the request was bounced to the login form.
    pub fn is_login_redirect(&self) -> bool {
        is_login_url(&self.url)
    }

    /// Fails with [`ThemisError::RequestRejected`] unless the response is 2xx.
    pub fn ensure_success(self, operation: &'static str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ThemisError::RequestRejected {
                operation,
                url: self.url,
                status: self.status,
            })
        }
    }
}

/// A fetched file, kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// HTTP status code.
    pub status: u16,
    /// URL after following redirects.
    pub url:    String,
    /// Response body.
    pub bytes:  Vec<u8>,
}

impl Blob {
    /// True for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True if the request was bounced to the login form.
    pub fn is_login_redirect(&self) -> bool {
        is_login_url(&self.url)
    }
}

/// True if `url` points at the login form.
fn is_login_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| parsed.path().trim_end_matches('/') == LOGIN_PATH)
        .unwrap_or_else(|_| url.contains(LOGIN_PATH))
}

/// One file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Multipart field name; Themis expects the judge language here.
    pub field:     String,
    /// File name reported to the server.
    pub file_name: String,
    /// File contents.
    pub bytes:     Vec<u8>,
}

/// A multipart request body.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Plain text fields.
    pub fields: Vec<(String, String)>,
    /// File parts.
    pub files:  Vec<UploadFile>,
}

impl Upload {
    /// Value of the text field `name`, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// An authenticated connection to the portal.
///
/// Implementations keep whatever session state they need (cookies); they are
/// shared by every node and submission of a client.
pub trait Transport: Send + Sync {
    /// Fetches `url`, following redirects.
    fn get(&self, url: &str) -> Result<Page>;

    /// Fetches `url` as raw bytes, following redirects.
    fn get_bytes(&self, url: &str) -> Result<Blob>;

    /// Posts an urlencoded form.
    fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<Page>;

    /// Posts a multipart body.
    fn post_multipart(&self, url: &str, upload: Upload) -> Result<Page>;
}

/// [`Transport`] backed by a blocking reqwest client with a cookie jar.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Underlying client; cloning shares the cookie jar.
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with an empty cookie jar.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent())
            .build()
            .map_err(|source| ThemisError::Transport {
                method: "BUILD",
                url: config.base_url().to_string(),
                source,
            })?;
        Ok(Self { client })
    }

    /// Turns a response into a [`Page`].
    fn read_page(method: &'static str, response: Response) -> Result<Page> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().map_err(|source| ThemisError::Transport {
            method,
            url: url.clone(),
            source,
        })?;
        tracing::trace!("{method} {url} -> {status}");
        Ok(Page { status, url, body })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Page> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| ThemisError::Transport {
                method: "GET",
                url: url.to_string(),
                source,
            })?;
        Self::read_page("GET", response)
    }

    fn get_bytes(&self, url: &str) -> Result<Blob> {
        let err = |source| ThemisError::Transport {
            method: "GET",
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(err)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let bytes = response.bytes().map_err(err)?.to_vec();
        tracing::trace!("GET {final_url} -> {status} ({} bytes)", bytes.len());
        Ok(Blob {
            status,
            url: final_url,
            bytes,
        })
    }

    fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<Page> {
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .map_err(|source| ThemisError::Transport {
                method: "POST",
                url: url.to_string(),
                source,
            })?;
        Self::read_page("POST", response)
    }

    fn post_multipart(&self, url: &str, upload: Upload) -> Result<Page> {
        let mut form = Form::new();
        for (name, value) in upload.fields {
            form = form.text(name, value);
        }
        for file in upload.files {
            form = form.part(file.field, Part::bytes(file.bytes).file_name(file.file_name));
        }

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .map_err(|source| ThemisError::Transport {
                method: "POST",
                url: url.to_string(),
                source,
            })?;
        Self::read_page("POST", response)
    }
}
