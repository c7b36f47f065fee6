use std::fs;

use temmies::{Page, ThemisError};

mod portal_support;
use portal_support::*;

const EXERCISE: &str = "/2023-2024/progimp/hello";

fn exercise_with_downloads() -> String {
    format!(
        r#"{}
        <div id="details-hello"><div class="cfg-container">
          <div class="cfg-line"><span class="cfg-key">Downloads</span>
            <span class="cfg-val"><a href="/file/2023-2024/progimp/hello/skeleton.c">skeleton.c</a></span></div>
        </div></div>
        <div class="subsec round shade"><h4 class="info">Test cases</h4>
          <div class="cfg-line"><a href="/file/2023-2024/progimp/hello/@tests/1.in">1.in</a></div>
          <div class="cfg-line"><a href="/file/2023-2024/progimp/hello/@tests/1.out">1.out</a></div>
        </div>"#,
        exercise_page("Hello", "/submit/hello", r#"{".c": "c"}"#)
    )
}

#[test]
fn test_cases_are_written_under_their_names() {
    let transport = ScriptedTransport::new();
    transport.page(&format!("/course{EXERCISE}"), exercise_with_downloads());
    transport.page("/file/2023-2024/progimp/hello/@tests/1.in", "3 4\n");
    transport.page("/file/2023-2024/progimp/hello/@tests/1.out", "7\n");
    let themis = client(&transport, config());

    let exercise = themis.node(EXERCISE).expect("open exercise");
    let cases = exercise.test_cases().expect("list test cases");
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].name, "1.in");

    let dir = temp_dir();
    let written = exercise
        .download_test_cases(&dir)
        .expect("download test cases");
    assert_eq!(written, [dir.join("1.in"), dir.join("1.out")]);
    assert_eq!(
        fs::read_to_string(dir.join("1.out")).expect("read 1.out"),
        "7\n"
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn attachments_come_from_the_details_block() {
    let transport = ScriptedTransport::new();
    transport.page(&format!("/course{EXERCISE}"), exercise_with_downloads());
    transport.page(
        "/file/2023-2024/progimp/hello/skeleton.c",
        "int main(void) {}\n",
    );
    let themis = client(&transport, config());

    let dir = temp_dir();
    let written = themis
        .node(EXERCISE)
        .expect("open exercise")
        .download_attachments(&dir)
        .expect("download attachments");
    assert_eq!(written, [dir.join("skeleton.c")]);
    assert_eq!(
        fs::read_to_string(&written[0]).expect("read skeleton"),
        "int main(void) {}\n"
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_files_surface_as_rejected_requests() {
    let transport = ScriptedTransport::new();
    transport.page(&format!("/course{EXERCISE}"), exercise_with_downloads());
    let themis = client(&transport, config());

    let dir = temp_dir();
    let err = themis
        .node(EXERCISE)
        .expect("open exercise")
        .download_test_cases(&dir)
        .expect_err("files are not served");
    assert!(matches!(err, ThemisError::RequestRejected { status: 404, .. }));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn expired_sessions_do_not_write_the_login_form() {
    let transport = ScriptedTransport::new();
    transport.page(&format!("/course{EXERCISE}"), exercise_with_downloads());
    transport.push(
        &url("/file/2023-2024/progimp/hello/@tests/1.in"),
        Page::new(200, url("/log/in"), r#"<form action="/log/in"></form>"#),
    );
    let themis = client(&transport, config());

    let dir = temp_dir();
    let err = themis
        .node(EXERCISE)
        .expect("open exercise")
        .download_test_cases(&dir)
        .expect_err("bounced to the login form");
    assert!(matches!(err, ThemisError::SessionInvalid { .. }));
    assert!(!dir.join("1.in").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn nameless_links_do_not_overwrite_each_other() {
    let transport = ScriptedTransport::new();
    transport.page(
        &format!("/course{EXERCISE}"),
        format!(
            r#"{}
            <div class="subsec round shade"><h4 class="info">Test cases</h4>
              <div class="cfg-line"><a href="/file/x/@tests/a">..</a></div>
              <div class="cfg-line"><a href="/file/x/@tests/b">/</a></div>
            </div>"#,
            exercise_page("Hello", "/submit/hello", r#"{".c": "c"}"#)
        ),
    );
    transport.page("/file/x/@tests/a", "first\n");
    transport.page("/file/x/@tests/b", "second\n");
    let themis = client(&transport, config());

    let dir = temp_dir();
    let written = themis
        .node(EXERCISE)
        .expect("open exercise")
        .download_test_cases(&dir)
        .expect("download test cases");
    assert_eq!(written, [dir.join("download-0"), dir.join("download-1")]);
    assert_eq!(
        fs::read_to_string(&written[0]).expect("read first"),
        "first\n"
    );
    assert_eq!(
        fs::read_to_string(&written[1]).expect("read second"),
        "second\n"
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn folders_have_no_test_cases() {
    let transport = ScriptedTransport::new();
    transport.page(
        "/course/2023-2024/progimp",
        folder_page("Imperative Programming", ""),
    );
    let themis = client(&transport, config());

    let err = themis
        .node("/2023-2024/progimp")
        .expect("open folder")
        .download_test_cases(temp_dir())
        .expect_err("folders are not exercises");
    assert!(matches!(err, ThemisError::NotSubmittable { .. }));
}
