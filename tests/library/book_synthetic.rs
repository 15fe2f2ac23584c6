use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bookmate_rs::library::HookFuture;
use bookmate_rs::{BmError, Completion, Converter, FetchConfig, Library, ResourceKind};
use httpmock::Method::GET;
use httpmock::{Mock, MockServer};

use crate::common::client_for;

fn config(root: &Path) -> FetchConfig {
    FetchConfig {
        output_root: root.join("out"),
        ledger_path: root.join("archive.txt"),
        ..FetchConfig::default()
    }
}

fn json<'a>(server: &'a MockServer, path: &str, body: &str) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200)
            .header("content-type", "application/json")
            .body(body);
    })
}

fn bytes<'a>(server: &'a MockServer, path: &str, body: &str) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200).body(body);
    })
}

#[derive(Default)]
struct RecordingConverter {
    calls: Mutex<Vec<(ResourceKind, PathBuf)>>,
    fail: bool,
}

impl Converter for RecordingConverter {
    fn convert<'a>(&'a self, kind: ResourceKind, source: &'a Path) -> HookFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push((kind, source.to_path_buf()));
            if self.fail {
                Err(BmError::Collaborator {
                    tool: "epub2fb2".into(),
                    reason: "exit status 1".into(),
                })
            } else {
                Ok(())
            }
        })
    }
}

#[tokio::test]
async fn book_writes_epub_and_side_files_then_converts() {
    let server = MockServer::start();
    let info_body = format!(
        r#"{{"book":{{"title":"War. And Peace. Vol 1","annotation":"Long.","cover":{{"large":"{}"}}}}}}"#,
        server.url("/img/cover.jpg")
    );
    json(&server, "/api/v5/books/bk1", &info_body);
    let cover = bytes(&server, "/img/cover.jpg", "JPEG");
    let content = bytes(&server, "/api/v5/books/bk1/content/v4", "EPUB");

    let tmp = tempfile::tempdir().unwrap();
    let converter = Arc::new(RecordingConverter::default());
    let library = Library::builder(client_for(&server))
        .config(config(tmp.path()))
        .converter(converter.clone())
        .build();

    let done = library.fetch(ResourceKind::Book, "bk1").await.unwrap();
    assert_eq!(done, Completion::Downloaded);
    cover.assert_hits(1);
    content.assert_hits(1);

    let dir = tmp.path().join("out/book/War_And Peace");
    let epub = dir.join("War_And Peace.epub");
    assert_eq!(std::fs::read_to_string(&epub).unwrap(), "EPUB");
    assert_eq!(std::fs::read_to_string(dir.join("War_And Peace.jpeg")).unwrap(), "JPEG");
    assert_eq!(std::fs::read_to_string(dir.join("info.txt")).unwrap(), "Long.\n");
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("War_And Peace.json")).unwrap())
            .unwrap();
    assert_eq!(saved["book"]["title"], "War. And Peace. Vol 1");

    assert_eq!(
        *converter.calls.lock().unwrap(),
        vec![(ResourceKind::Book, epub)]
    );
    assert!(library.ledger().contains("bk1").await.unwrap());
}

#[tokio::test]
async fn existing_side_files_are_kept_unless_forced() {
    let server = MockServer::start();
    json(&server, "/api/v5/books/bk2", r#"{"book":{"title":"Short","annotation":"New."}}"#);
    bytes(&server, "/api/v5/books/bk2/content/v4", "EPUB");

    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("out/book/Short");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("info.txt"), "hand edited").unwrap();

    let library = Library::builder(client_for(&server))
        .config(config(tmp.path()))
        .build();
    library.fetch(ResourceKind::Book, "bk2").await.unwrap();
    assert_eq!(std::fs::read_to_string(dir.join("info.txt")).unwrap(), "hand edited");

    std::fs::remove_file(tmp.path().join("archive.txt")).unwrap();
    let forced = Library::builder(client_for(&server))
        .config(FetchConfig {
            force_meta: true,
            ..config(tmp.path())
        })
        .build();
    forced.fetch(ResourceKind::Book, "bk2").await.unwrap();
    assert_eq!(std::fs::read_to_string(dir.join("info.txt")).unwrap(), "New.\n");
}

#[tokio::test]
async fn converter_failure_is_only_a_warning() {
    let server = MockServer::start();
    json(&server, "/api/v5/books/bk3", r#"{"book":{"title":"Odd"}}"#);
    bytes(&server, "/api/v5/books/bk3/content/v4", "EPUB");

    let tmp = tempfile::tempdir().unwrap();
    let library = Library::builder(client_for(&server))
        .config(config(tmp.path()))
        .converter(Arc::new(RecordingConverter {
            fail: true,
            ..RecordingConverter::default()
        }))
        .build();

    let done = library.fetch(ResourceKind::Book, "bk3").await.unwrap();
    assert_eq!(done, Completion::Downloaded);
    assert!(library.ledger().contains("bk3").await.unwrap());
}

#[tokio::test]
async fn failed_content_download_records_nothing() {
    let server = MockServer::start();
    json(&server, "/api/v5/books/bk4", r#"{"book":{"title":"Locked"}}"#);
    server.mock(|when, then| {
        when.method(GET).path("/api/v5/books/bk4/content/v4");
        then.status(402).body("subscription required");
    });

    let tmp = tempfile::tempdir().unwrap();
    let library = Library::builder(client_for(&server))
        .config(config(tmp.path()))
        .build();

    let err = library.fetch(ResourceKind::Book, "bk4").await.unwrap_err();
    assert!(matches!(err, BmError::Status { status: 402, .. }));
    assert!(!library.ledger().contains("bk4").await.unwrap());
    assert!(!tmp.path().join("out/book/Locked/Locked.epub").exists());
}

#[tokio::test]
async fn comicbook_archive_is_streamed_to_cbr() {
    let server = MockServer::start();
    json(&server, "/api/v5/comicbooks/cb1", r#"{"comicbook":{"title":"Panels"}}"#);
    let meta = format!(r#"{{"uris":{{"zip":"{}"}}}}"#, server.url("/zips/cb1.zip"));
    json(&server, "/api/v5/comicbooks/cb1/metadata.json", &meta);
    bytes(&server, "/zips/cb1.zip", "PK");

    let tmp = tempfile::tempdir().unwrap();
    let library = Library::builder(client_for(&server))
        .config(config(tmp.path()))
        .build();
    library.fetch(ResourceKind::Comicbook, "cb1").await.unwrap();

    let cbr = tmp.path().join("out/comicbook/Panels/Panels.cbr");
    assert_eq!(std::fs::read_to_string(cbr).unwrap(), "PK");
}

#[tokio::test]
async fn serial_episodes_are_books_with_their_own_ledger_entries() {
    let server = MockServer::start();
    json(&server, "/api/v5/books/sr1", r#"{"book":{"title":"Tale"}}"#);
    json(
        &server,
        "/api/v5/books/sr1/episodes",
        r#"{"episodes":[{"uuid":"e1","title":"Start"},{"uuid":"e2","title":"End"}]}"#,
    );
    bytes(&server, "/api/v5/books/e1/content/v4", "ONE");
    bytes(&server, "/api/v5/books/e2/content/v4", "TWO");

    let tmp = tempfile::tempdir().unwrap();
    let library = Library::builder(client_for(&server))
        .config(config(tmp.path()))
        .build();
    library.fetch(ResourceKind::Serial, "sr1").await.unwrap();

    let dir = tmp.path().join("out/serial/Tale");
    assert_eq!(
        std::fs::read_to_string(dir.join("1. Start/1. Start.epub")).unwrap(),
        "ONE"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("2. End/2. End.epub")).unwrap(),
        "TWO"
    );
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("archive.txt")).unwrap(),
        "e1\ne2\nsr1\n"
    );
}

#[tokio::test]
async fn series_parts_land_under_the_series_directory() {
    let server = MockServer::start();
    json(&server, "/api/v5/series/s1", r#"{"series":{"title":"Saga"}}"#);
    json(
        &server,
        "/api/v5/series/s1/parts",
        r#"{"parts":[
            {"resource_type":"book","resource":{"uuid":"p1"}},
            {"resource_type":"book","resource":{"uuid":"p2"}}
        ]}"#,
    );
    json(&server, "/api/v5/books/p1", r#"{"book":{"title":"One"}}"#);
    json(&server, "/api/v5/books/p2", r#"{"book":{"title":"Two"}}"#);
    bytes(&server, "/api/v5/books/p1/content/v4", "1");
    let p2 = bytes(&server, "/api/v5/books/p2/content/v4", "2");

    let tmp = tempfile::tempdir().unwrap();
    // p2 was fetched on its own before.
    std::fs::write(tmp.path().join("archive.txt"), "p2\n").unwrap();

    let library = Library::builder(client_for(&server))
        .config(config(tmp.path()))
        .build();
    library.fetch(ResourceKind::Series, "s1").await.unwrap();

    let series = tmp.path().join("out/series/Saga");
    assert!(series.join("Saga.json").exists());
    assert_eq!(
        std::fs::read_to_string(series.join("1. One/One.epub")).unwrap(),
        "1"
    );
    p2.assert_hits(0);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("archive.txt")).unwrap(),
        "p2\np1\ns1\n"
    );
}
