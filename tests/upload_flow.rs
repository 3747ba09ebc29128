use csv_uploader::api::{ApiClient, FileId};
use csv_uploader::app::{AppState, View, UPLOAD_SUCCESS_MESSAGE};
use csv_uploader::files::FileList;
use csv_uploader::preview::{PreviewFetcher, MAX_PREVIEW_LINES};
use csv_uploader::upload::{FileHandle, UploadManager, UploadStatus, INVALID_FILE_MESSAGE};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), None).expect("build client")
}

fn csv_of_len(name: &str, len: usize) -> FileHandle {
    let mut content = b"id,value\n".to_vec();
    content.resize(len, b'1');
    FileHandle::from_bytes(name, content)
}

async fn mount_upload_ok(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_files_upload_independently() {
    let server = MockServer::start().await;
    mount_upload_ok(&server, 2).await;

    let client = client_for(&server);
    let mut manager = UploadManager::new();
    manager.accept_drop(vec![
        csv_of_len("sample1.csv", 150_000),
        csv_of_len("sample2.csv", 200),
    ]);

    assert!(manager.upload_all(&client, &Handle::current()));
    assert!(manager.is_uploading());
    assert!(manager
        .pending()
        .iter()
        .all(|f| f.status == UploadStatus::Uploading));

    let outcome = manager.wait().await.expect("batch outcome");

    assert!(outcome.all_succeeded());
    let mut succeeded = outcome.succeeded.clone();
    succeeded.sort();
    assert_eq!(succeeded, vec!["sample1.csv", "sample2.csv"]);
    assert!(manager.pending().is_empty());
    assert!(!manager.is_uploading());
    assert_eq!(manager.error(), None);

    for file in manager.last_batch() {
        assert_eq!(file.status, UploadStatus::Done);
        assert_eq!(file.progress, 100);
    }

    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == "/upload")
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect();
    assert_eq!(bodies.len(), 2);
    assert!(bodies.iter().any(|b| b.contains(r#"filename="sample1.csv""#)));
    assert!(bodies.iter().any(|b| b.contains(r#"filename="sample2.csv""#)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_is_published_per_file_while_uploading() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut manager = UploadManager::new();
    manager.accept_drop(vec![
        csv_of_len("big.csv", 400_000),
        FileHandle::from_bytes("empty.csv", Vec::new()),
    ]);
    manager.upload_all(&client, &Handle::current());

    let mut seen_in_flight = vec![false; 2];
    let deadline = Instant::now() + Duration::from_secs(10);
    let outcome = loop {
        if let Some(outcome) = manager.poll() {
            break outcome;
        }
        for (index, file) in manager.pending().iter().enumerate() {
            if file.status == UploadStatus::Uploading && file.progress == 100 {
                seen_in_flight[index] = true;
            }
        }
        assert!(Instant::now() < deadline, "batch never settled");
        tokio::time::sleep(Duration::from_millis(2)).await;
    };

    assert!(outcome.all_succeeded());
    assert_eq!(seen_in_flight, vec![true, true]);
}

#[tokio::test]
async fn failed_file_is_surfaced_without_stopping_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains(r#"filename="broken.csv""#))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_upload_ok(&server, 1).await;

    let client = client_for(&server);
    let mut manager = UploadManager::new();
    manager.accept_drop(vec![csv_of_len("good.csv", 64), csv_of_len("broken.csv", 64)]);
    manager.upload_all(&client, &Handle::current());

    let outcome = manager.wait().await.expect("batch outcome");

    assert_eq!(outcome.succeeded, vec!["good.csv"]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, "broken.csv");
    assert!(outcome.failed[0].1.contains("500"));

    assert!(manager.pending().is_empty());
    let error = manager.error().expect("failure is reported");
    assert!(error.contains("broken.csv"));
}

#[tokio::test]
async fn unreachable_server_fails_every_file() {
    // Nothing listens on the discard port.
    let client = ApiClient::new("http://127.0.0.1:9", None).unwrap();
    let mut manager = UploadManager::new();
    manager.accept_drop(vec![csv_of_len("a.csv", 10), csv_of_len("b.csv", 10)]);
    manager.upload_all(&client, &Handle::current());

    let outcome = manager.wait().await.expect("batch outcome");

    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 2);
    assert!(manager.pending().is_empty());
}

#[tokio::test]
async fn second_upload_all_while_running_is_ignored() {
    let server = MockServer::start().await;
    mount_upload_ok(&server, 1).await;

    let client = client_for(&server);
    let mut manager = UploadManager::new();
    manager.accept_drop(vec![csv_of_len("only.csv", 32)]);

    assert!(manager.upload_all(&client, &Handle::current()));
    assert!(!manager.upload_all(&client, &Handle::current()));

    let outcome = manager.wait().await.expect("batch outcome");
    assert_eq!(outcome.total(), 1);
}

#[tokio::test]
async fn successful_upload_confirms_progress_on_server() {
    let server = MockServer::start().await;
    mount_upload_ok(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/progress/sample.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "sample.csv",
            "uploaded_size": 200,
            "progress_percentage": 100.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut manager = UploadManager::new();
    manager.accept_drop(vec![csv_of_len("sample.csv", 200)]);
    manager.upload_all(&client, &Handle::current());

    let outcome = manager.wait().await.expect("batch outcome");
    assert!(outcome.all_succeeded());
}

#[tokio::test]
async fn upload_then_file_list_shows_new_file() {
    let server = MockServer::start().await;
    mount_upload_ok(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1, "filename": "sample.csv"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let handle = Handle::current();
    let mut state = AppState::new();

    state
        .uploads
        .accept_drop(vec![csv_of_len("sample.csv", 200), csv_of_len("notes.txt", 10)]);
    assert_eq!(state.uploads.error(), Some(INVALID_FILE_MESSAGE));
    assert_eq!(state.uploads.pending().len(), 1);

    state.uploads.upload_all(&client, &handle);
    let outcome = state.uploads.wait().await.expect("batch outcome");

    let done_at = Instant::now();
    state.on_batch_complete(&outcome, done_at);
    assert_eq!(
        state.toast.as_ref().map(|t| t.message()),
        Some(UPLOAD_SUCCESS_MESSAGE)
    );
    assert!(state.uploads.pending().is_empty());

    state.tick(&client, &handle, done_at + Duration::from_millis(2000));
    assert_eq!(state.view, View::FileList);

    state.files.settle().await;
    let names: Vec<_> = state
        .files
        .records()
        .iter()
        .map(|r| r.filename.as_str())
        .collect();
    assert_eq!(names, vec!["sample.csv"]);
}

#[tokio::test]
async fn failed_list_fetch_shows_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut list = FileList::new();
    list.refresh(&client_for(&server), &Handle::current());
    assert!(list.is_loading());

    list.settle().await;

    assert!(!list.is_loading());
    assert!(list.records().is_empty());
}

#[tokio::test]
async fn download_suggests_record_filename() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/5"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", r#"attachment; filename="5_sample.csv""#)
                .set_body_bytes(b"a,b\n".to_vec()),
        )
        .mount(&server)
        .await;

    let mut list = FileList::new();
    list.download(
        &client_for(&server),
        &Handle::current(),
        FileId::new("5"),
        "sample.csv".to_string(),
    );

    let ready = list.next_download().await.expect("download ready");
    assert_eq!(ready.filename, "sample.csv");
    assert_eq!(&ready.bytes[..], b"a,b\n");

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join(&ready.filename);
    ready.save_to(&target).unwrap();
    assert_eq!(std::fs::read(target).unwrap(), b"a,b\n");
}

#[tokio::test]
async fn preview_is_cached_and_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/preview/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            "Line 1", "Line 2", "Line 3", "Line 4", "Line 5", "Line 6"
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut previews = PreviewFetcher::new();
    previews.fetch_preview(&client, &Handle::current(), FileId::new("9"), "preview.csv".into());
    assert!(previews.is_loading());

    previews.settle().await;

    let lines = previews.cache().get("preview.csv").expect("cached preview");
    assert_eq!(lines.len(), MAX_PREVIEW_LINES);
    assert_eq!(lines[4], "Line 5");
    assert!(!previews.is_loading());
}

#[tokio::test]
async fn failed_preview_leaves_cache_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/preview/9"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut previews = PreviewFetcher::new();
    previews.fetch_preview(
        &client_for(&server),
        &Handle::current(),
        FileId::new("9"),
        "preview.csv".into(),
    );
    previews.settle().await;

    assert!(previews.cache().get("preview.csv").is_none());
    assert!(!previews.is_loading());
}
