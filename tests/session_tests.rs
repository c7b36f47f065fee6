use temmies::{
    CredentialProvider, Credentials, EnvCredentials, Page, ThemisError, session::login,
};
use uuid::Uuid;

mod portal_support;
use portal_support::*;

const LOGIN_FORM: &str = r#"<form method="post" action="/log/in">
    <input type="hidden" name="_csrf" value="token-123">
    <input name="user"><input name="password" type="password">
</form>"#;

#[test]
fn login_echoes_the_csrf_token() {
    let transport = ScriptedTransport::new();
    transport.page("/log/in", LOGIN_FORM);
    transport.page("/log/in", "<p>Welcome, logged in as s1234567</p>");

    let credentials = Credentials::new("S1234567", "hunter2");
    login(&*transport, &config(), &credentials).expect("login succeeds");

    let posted = transport
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::PostForm(url, fields) => Some((url, fields)),
            _ => None,
        })
        .expect("login form was posted");
    assert_eq!(posted.0, url("/log/in"));
    let field = |name: &str| {
        posted
            .1
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    assert_eq!(field("_csrf").as_deref(), Some("token-123"));
    assert_eq!(field("user").as_deref(), Some("S1234567"));
    assert_eq!(field("password").as_deref(), Some("hunter2"));
    assert_eq!(field("sudo").as_deref(), Some("s1234567"));
}

#[test]
fn refused_credentials_fail_the_login() {
    let transport = ScriptedTransport::new();
    transport.page("/log/in", LOGIN_FORM);
    transport.page("/log/in", "<p>Invalid credentials</p>");

    let err = login(&*transport, &config(), &Credentials::new("s1", "wrong"))
        .expect_err("login refused");
    assert!(matches!(err, ThemisError::LoginFailed { ref user } if user == "s1"));
    assert!(err.is_session_error());
}

#[test]
fn login_form_without_token_is_malformed() {
    let transport = ScriptedTransport::new();
    transport.push(
        &url("/log/in"),
        Page::new(200, url("/log/in"), "<form></form>"),
    );

    let err = login(&*transport, &config(), &Credentials::new("s1", "pw"))
        .expect_err("no token");
    assert!(matches!(err, ThemisError::MalformedPage { .. }));
    assert!(
        !transport
            .events()
            .iter()
            .any(|e| matches!(e, Event::PostForm(..)))
    );
}

#[test]
fn env_credentials_require_both_variables() {
    let missing = format!("TEMMIES_TEST_UNSET_{}", Uuid::new_v4().simple());
    let provider = EnvCredentials::new(missing.clone(), format!("{missing}_PASSWORD"));
    let err = provider.credentials().expect_err("variables are unset");
    assert!(matches!(err, ThemisError::MissingCredentials(_)));
}

#[test]
fn credentials_never_print_the_password() {
    let credentials = Credentials::new("s1234567", "hunter2");
    let printed = format!("{credentials:?}");
    assert!(printed.contains("s1234567"));
    assert!(!printed.contains("hunter2"));
    assert_eq!(
        credentials.credentials().expect("static").user(),
        "s1234567"
    );
}
