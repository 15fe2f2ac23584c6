use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bookmate_rs::library::HookFuture;
use bookmate_rs::{
    BmClient, BmError, ChapterMerger, Completion, FetchConfig, Library, MergeRequest, Quality,
    ResourceKind, RetryPolicy,
};
use httpmock::Method::GET;
use httpmock::{Mock, MockServer};

use crate::common::{base_api, client_for, fast_policy};

struct Scratch {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Scratch {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    fn config(&self, quality: Quality) -> FetchConfig {
        FetchConfig {
            output_root: self.root.join("out"),
            ledger_path: self.root.join("archive.txt"),
            quality,
            ..FetchConfig::default()
        }
    }

    fn book_dir(&self) -> PathBuf {
        self.root.join("out").join("audiobook").join("Dune")
    }

    fn ledger_text(&self) -> String {
        std::fs::read_to_string(self.root.join("archive.txt")).unwrap_or_default()
    }
}

fn mock_info(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/api/v5/audiobooks/ab1");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"audiobook":{"title":"Dune","annotation":"Spice.","topics":[{"title":"Аудио"}]}}"#);
    })
}

fn mock_playlist(server: &MockServer, tracks: u32) -> Mock<'_> {
    let entries: Vec<String> = (1..=tracks)
        .map(|n| {
            format!(
                r#"{{"number":{n},"offline":{{
                    "max_bit_rate":{{"url":"{hi}"}},
                    "min_bit_rate":{{"url":"{lo}"}}}}}}"#,
                hi = server.url(format!("/cdn/{n}_hi.m3u8")),
                lo = server.url(format!("/cdn/{n}_lo.m4a")),
            )
        })
        .collect();
    let body = format!(r#"{{"tracks":[{}]}}"#, entries.join(","));
    server.mock(|when, then| {
        when.method(GET).path("/api/v5/audiobooks/ab1/playlists.json");
        then.status(200).body(body);
    })
}

fn mock_file<'a>(server: &'a MockServer, path: &str, status: u16, body: &str) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(status).body(body);
    })
}

#[tokio::test]
async fn server_error_on_preferred_variant_downgrades_and_records() {
    let server = MockServer::start();
    let info = mock_info(&server);
    mock_playlist(&server, 2);
    let hi1 = mock_file(&server, "/cdn/1_hi.m4a", 500, "hi down");
    let lo1 = mock_file(&server, "/cdn/1_lo.m4a", 200, "lo-1");
    let hi2 = mock_file(&server, "/cdn/2_hi.m4a", 200, "hi-2");
    let lo2 = mock_file(&server, "/cdn/2_lo.m4a", 200, "lo-2");

    let scratch = Scratch::new();
    let library = Library::builder(client_for(&server))
        .config(scratch.config(Quality::Max))
        .build();

    let done = library.fetch(ResourceKind::Audiobook, "ab1").await.unwrap();
    assert_eq!(done, Completion::Downloaded);

    hi1.assert_hits(1);
    lo1.assert_hits(1);
    hi2.assert_hits(1);
    lo2.assert_hits(0);

    let dir = scratch.book_dir();
    assert_eq!(std::fs::read_to_string(dir.join("Chapter_1.m4a")).unwrap(), "lo-1");
    assert_eq!(std::fs::read_to_string(dir.join("Chapter_2.m4a")).unwrap(), "hi-2");
    assert!(dir.join("Dune.json").exists());
    assert_eq!(std::fs::read_to_string(dir.join("info.txt")).unwrap(), "Spice.\n");
    assert_eq!(scratch.ledger_text(), "ab1\n");

    // A second run is answered by the ledger alone.
    let again = library.fetch(ResourceKind::Audiobook, "ab1").await.unwrap();
    assert_eq!(again, Completion::AlreadyDone);
    info.assert_hits(1);
    hi2.assert_hits(1);
}

#[tokio::test]
async fn client_error_aborts_track_and_skips_ledger() {
    let server = MockServer::start();
    mock_info(&server);
    mock_playlist(&server, 1);
    let hi1 = mock_file(&server, "/cdn/1_hi.m4a", 404, "no such file");
    let lo1 = mock_file(&server, "/cdn/1_lo.m4a", 200, "lo-1");

    let scratch = Scratch::new();
    let library = Library::builder(client_for(&server))
        .config(scratch.config(Quality::Max))
        .build();

    let err = library
        .fetch(ResourceKind::Audiobook, "ab1")
        .await
        .unwrap_err();
    match err {
        BmError::RequestInvalid {
            track,
            variant,
            status,
        } => {
            assert_eq!(track, "1");
            assert_eq!(variant, "max_bit_rate");
            assert_eq!(status, 404);
        }
        other => panic!("expected RequestInvalid, got {other:?}"),
    }
    hi1.assert_hits(1);
    lo1.assert_hits(0);
    assert!(!scratch.book_dir().join("Chapter_1.m4a").exists());
    assert_eq!(scratch.ledger_text(), "");
}

#[tokio::test]
async fn all_variants_failing_escalates_to_retrying_download() {
    let server = MockServer::start();
    mock_info(&server);
    mock_playlist(&server, 1);
    let hi1 = mock_file(&server, "/cdn/1_hi.m4a", 503, "busy");
    let lo1 = mock_file(&server, "/cdn/1_lo.m4a", 502, "busy");

    let scratch = Scratch::new();
    let library = Library::builder(client_for(&server))
        .config(scratch.config(Quality::Max))
        .build();

    let err = library
        .fetch(ResourceKind::Audiobook, "ab1")
        .await
        .unwrap_err();

    assert!(matches!(err, BmError::Exhausted { attempts: 3, .. }));
    // One probe, then the full retry budget on the preferred variant.
    hi1.assert_hits(4);
    lo1.assert_hits(1);
    assert_eq!(scratch.ledger_text(), "");
}

#[tokio::test]
async fn min_quality_prefers_low_bitrate_and_existing_chapters_are_kept() {
    let server = MockServer::start();
    mock_info(&server);
    mock_playlist(&server, 2);
    let hi1 = mock_file(&server, "/cdn/1_hi.m4a", 200, "hi-1");
    let lo1 = mock_file(&server, "/cdn/1_lo.m4a", 200, "lo-1");
    let lo2 = mock_file(&server, "/cdn/2_lo.m4a", 200, "lo-2");

    let scratch = Scratch::new();
    std::fs::create_dir_all(scratch.book_dir()).unwrap();
    std::fs::write(scratch.book_dir().join("Chapter_1.m4a"), "from an earlier run").unwrap();

    let library = Library::builder(client_for(&server))
        .config(scratch.config(Quality::Min))
        .build();
    library.fetch(ResourceKind::Audiobook, "ab1").await.unwrap();

    hi1.assert_hits(0);
    lo1.assert_hits(0);
    lo2.assert_hits(1);
    assert_eq!(
        std::fs::read_to_string(scratch.book_dir().join("Chapter_1.m4a")).unwrap(),
        "from an earlier run"
    );
}

#[derive(Default)]
struct RecordingMerger {
    requests: Mutex<Vec<MergeRequest>>,
}

impl ChapterMerger for RecordingMerger {
    fn merge<'a>(&'a self, request: &'a MergeRequest) -> HookFuture<'a> {
        Box::pin(async move {
            std::fs::write(&request.output, "merged")?;
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        })
    }
}

#[tokio::test]
async fn merged_chapters_are_cleaned_up() {
    let server = MockServer::start();
    mock_info(&server);
    mock_playlist(&server, 2);
    mock_file(&server, "/cdn/1_hi.m4a", 200, "hi-1");
    mock_file(&server, "/cdn/2_hi.m4a", 200, "hi-2");

    let scratch = Scratch::new();
    let merger = Arc::new(RecordingMerger::default());
    let library = Library::builder(client_for(&server))
        .config(FetchConfig {
            merge_chapters: true,
            ..scratch.config(Quality::Max)
        })
        .chapter_merger(merger.clone())
        .build();
    library.fetch(ResourceKind::Audiobook, "ab1").await.unwrap();

    let requests = merger.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    let names: Vec<&str> = req
        .chapters
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .collect();
    assert_eq!(names, ["Chapter_1.m4a", "Chapter_2.m4a"]);
    assert_eq!(req.metadata, [("title".to_string(), "Dune".to_string())]);
    assert_eq!(req.output, scratch.book_dir().join("Dune.m4a"));

    let dir = scratch.book_dir();
    assert!(!Path::new(&dir.join("Chapter_1.m4a")).exists());
    assert!(dir.join("Dune.m4a").exists());
}

#[tokio::test]
async fn cancel_during_download_backoff_leaves_ledger_and_chapters_untouched() {
    let server = MockServer::start();
    mock_info(&server);
    mock_playlist(&server, 1);
    let hi1 = mock_file(&server, "/cdn/1_hi.m4a", 503, "busy");
    mock_file(&server, "/cdn/1_lo.m4a", 503, "busy");

    let scratch = Scratch::new();
    std::fs::write(scratch.root.join("archive.txt"), "earlier\n").unwrap();

    let slow = RetryPolicy::new(
        3,
        Duration::from_secs(30),
        Duration::from_secs(30),
        Duration::from_secs(2),
    )
    .unwrap()
    .with_max_jitter(Duration::ZERO);
    let client = BmClient::builder()
        .base_api(base_api(&server))
        .auth_token("test-token")
        .metadata_policy(fast_policy(3))
        .download_policy(slow)
        .build()
        .unwrap();
    let library = Library::builder(client)
        .config(scratch.config(Quality::Max))
        .build();

    let cancel = library.cancel_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let err = library
        .fetch(ResourceKind::Audiobook, "ab1")
        .await
        .unwrap_err();

    assert!(err.is_cancelled(), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
    // One probe, then the first retrying attempt before the cancelled backoff.
    hi1.assert_hits(2);
    assert_eq!(scratch.ledger_text(), "earlier\n");

    let leftovers: Vec<String> = std::fs::read_dir(scratch.book_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("Chapter_") || n.ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
}
