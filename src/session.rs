#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Logging in: credentials come from a provider handed to the client, never
//! from global state.

use std::fmt;

use crate::{
    client::Themis,
    config::ClientConfig,
    error::{Result, ThemisError},
    html,
    transport::{HttpTransport, LOGIN_PATH, Transport},
};

/// Text Themis shows only to authenticated users.
const LOGGED_IN_MARKER: &str = "Welcome, logged in as";

/// A user name and password.
#[derive(Clone)]
pub struct Credentials {
    /// Student or staff number.
    user:     String,
    /// Password.
    password: String,
}

impl Credentials {
    /// Bundles a user name and password.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user:     user.into(),
            password: password.into(),
        }
    }

    /// User name.
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of credentials.
pub trait CredentialProvider {
    /// Produces credentials, or explains why there are none.
    fn credentials(&self) -> Result<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

/// Reads credentials from two environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    /// Variable holding the user name.
    user_var:     String,
    /// Variable holding the password.
    password_var: String,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new("THEMIS_USER", "THEMIS_PASSWORD")
    }
}

impl EnvCredentials {
    /// Reads from custom variable names.
    pub fn new(user_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self {
            user_var:     user_var.into(),
            password_var: password_var.into(),
        }
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ThemisError::MissingCredentials(format!("`{var}` is not set")))
        };
        Ok(Credentials::new(read(&self.user_var)?, read(&self.password_var)?))
    }
}

/// Logs `credentials` in on `transport`, leaving the session cookies in it.
///
/// The login form carries a CSRF token that has to be echoed back; success
/// is recognised by the greeting on the landing page.
pub fn login(
    transport: &dyn Transport,
    config: &ClientConfig,
    credentials: &Credentials,
) -> Result<()> {
    let url = format!("{}{LOGIN_PATH}", config.base_url());
    let form = transport.get(&url)?.ensure_success("open login form")?;

    let doc = html::document(&form.body);
    let token = doc
        .select(&html::selector("input[name=_csrf]"))
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| ThemisError::malformed(&url, "login form has no CSRF token"))?;

    let fields = vec![
        ("user".to_string(), credentials.user.clone()),
        ("password".to_string(), credentials.password.clone()),
        ("_csrf".to_string(), token),
        ("sudo".to_string(), credentials.user.to_lowercase()),
    ];
    let landing = transport.post_form(&url, &fields)?;

    if landing.is_success() && landing.body.contains(LOGGED_IN_MARKER) {
        tracing::info!("Logged in as {}", credentials.user);
        Ok(())
    } else {
        Err(ThemisError::LoginFailed {
            user: credentials.user.clone(),
        })
    }
}

impl Themis {
    /// Opens a fresh HTTP session and logs in with credentials from
    /// `provider`.
    pub fn connect(config: ClientConfig, provider: &dyn CredentialProvider) -> Result<Self> {
        let credentials = provider.credentials()?;
        let transport = HttpTransport::new(&config)?;
        login(&transport, &config, &credentials)?;
        Ok(Themis::new(transport, config))
    }
}
