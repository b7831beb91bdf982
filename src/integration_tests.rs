//! Pipeline properties exercised against the scripted host: staging,
//! fan-out, temp cleanup, and the album decision flow.

use std::path::PathBuf;

use teloxide::types::MessageId;

use crate::host::HostErrorKind;
use crate::pending::PendingAlbums;
use crate::testing::MockHost;
use crate::traits::FileHost;
use crate::types::UploadError;
use crate::upload::{upload_staged, StagedFile};

#[tokio::test]
async fn single_upload_returns_the_id_and_cleans_up() {
    let host = MockHost::new();
    host.script_store("a.txt", Ok("abc".to_string())).await;

    let staged = StagedFile::write("a.txt".to_string(), b"hello").unwrap();
    let temp_path: PathBuf = staged.path().to_path_buf();
    assert!(temp_path.exists());

    let outcome = upload_staged(&host, MessageId(1), staged).await;
    let uploaded = outcome.unwrap();
    assert_eq!(uploaded.file_id, "abc");
    assert_eq!(uploaded.message_id, MessageId(1));
    assert_eq!(host.file_link(&uploaded.file_id), "https://pixeldrain.com/u/abc");

    assert!(!temp_path.exists(), "temp file must be gone after the upload");
}

#[tokio::test]
async fn failed_upload_still_cleans_up() {
    let host = MockHost::new();
    host.script_store(
        "b.txt",
        Err(MockHost::failure(HostErrorKind::ServerError, "boom")),
    )
    .await;

    let staged = StagedFile::write("b.txt".to_string(), b"payload").unwrap();
    let temp_path = staged.path().to_path_buf();

    let outcome = upload_staged(&host, MessageId(2), staged).await;
    let failure = outcome.unwrap_err();
    assert_eq!(failure.message_id, MessageId(2));
    match &failure.error {
        UploadError::Host(e) => assert_eq!(e.kind, HostErrorKind::ServerError),
        other => panic!("unexpected error variant: {:?}", other),
    }

    assert!(!temp_path.exists(), "temp file must be gone after a failure");
}

#[tokio::test]
async fn fan_out_preserves_submission_order_and_isolates_failures() {
    let host = MockHost::new();
    host.script_store("n1.bin", Ok("a1".to_string())).await;
    host.script_store(
        "n2.bin",
        Err(MockHost::failure(HostErrorKind::Timeout, "too slow")),
    )
    .await;
    host.script_store("n3.bin", Ok("a3".to_string())).await;

    let staged: Vec<StagedFile> = ["n1.bin", "n2.bin", "n3.bin"]
        .iter()
        .map(|name| StagedFile::write(name.to_string(), b"data").unwrap())
        .collect();

    let outcomes = futures::future::join_all(
        staged
            .into_iter()
            .enumerate()
            .map(|(i, file)| upload_staged(&host, MessageId(i as i32 + 1), file)),
    )
    .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].as_ref().unwrap().file_id, "a1");
    assert_eq!(outcomes[1].as_ref().unwrap_err().message_id, MessageId(2));
    assert_eq!(outcomes[2].as_ref().unwrap().file_id, "a3");

    let succeeded: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.as_ref().ok().map(|f| f.file_id.clone()))
        .collect();
    assert_eq!(succeeded, vec!["a1", "a3"]);

    assert_eq!(host.stored_names.lock().await.len(), 3);
}

#[tokio::test]
async fn album_build_consumes_the_token_once() {
    let host = MockHost::new();
    host.script_list(Ok("L9".to_string())).await;
    let albums = PendingAlbums::new(None);

    let token = albums
        .insert(vec!["a1".to_string(), "a3".to_string()])
        .await;

    // First decision wins and reaches the host.
    let file_ids = albums.take(&token).await.expect("offer should be pending");
    let list_id = host.create_list(&file_ids).await.unwrap();
    assert_eq!(host.list_link(&list_id), "https://pixeldrain.com/l/L9");
    assert_eq!(
        *host.list_calls.lock().await,
        vec![vec!["a1".to_string(), "a3".to_string()]]
    );

    // A second decision on the same token finds nothing to act on.
    assert_eq!(albums.take(&token).await, None);
    assert!(!albums.discard(&token).await);
}
