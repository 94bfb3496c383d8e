//! Version store against PostgreSQL.
//!
//! Run with `cargo test -p folio-db -- --ignored` and a reachable DATABASE_URL.

use folio_db::test_fixtures::TestDatabase;
use folio_db::{CreateDocumentRequest, DocumentRepository, Error, NewVersion, VersionRepository};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_version_numbers_are_gapless() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let created = db
        .documents
        .create_document(
            owner.objective_id,
            owner.workspace_id,
            owner.user_id,
            CreateDocumentRequest::new("Goals", "v1"),
        )
        .await
        .expect("create document");
    assert_eq!(created.version.version_number, 1);

    for i in 2..=5 {
        let v = db
            .versions
            .create_version(
                created.document.id,
                owner.user_id,
                NewVersion::new(format!("v{}", i)),
            )
            .await
            .expect("create version");
        assert_eq!(v.version_number, i);
    }

    let versions = db
        .versions
        .list_versions(created.document.id)
        .await
        .unwrap();
    let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![5, 4, 3, 2, 1], "newest first, no gaps");

    let latest = db
        .versions
        .get_latest_version(created.document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.content, "v5");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_writers_never_share_a_number() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = test_db.db.clone();

    let created = db
        .documents
        .create_document(
            owner.objective_id,
            owner.workspace_id,
            owner.user_id,
            CreateDocumentRequest::new("Goals", ""),
        )
        .await
        .unwrap();
    let document_id = created.document.id;

    let mut handles = Vec::new();
    for i in 0..8 {
        let versions = db.versions.clone();
        let author = owner.user_id;
        handles.push(tokio::spawn(async move {
            versions
                .create_version(document_id, author, NewVersion::new(format!("writer {}", i)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("concurrent create");
    }

    let mut numbers: Vec<i32> = db
        .versions
        .list_versions(document_id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=9).collect::<Vec<_>>());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_punchlist_carries_forward_from_latest() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let created = db
        .documents
        .create_document(
            owner.objective_id,
            owner.workspace_id,
            owner.user_id,
            CreateDocumentRequest::new("Goals", "v1"),
        )
        .await
        .unwrap();
    let document_id = created.document.id;

    let punchlist = json!({"open": ["confirm budget", "name an owner"]});
    let v2 = db
        .versions
        .create_version(
            document_id,
            owner.user_id,
            NewVersion::new("v2").with_punchlist(punchlist.clone()),
        )
        .await
        .unwrap();
    assert_eq!(v2.version_number, 2);

    let v3 = db
        .versions
        .create_version(document_id, owner.user_id, NewVersion::new("v3"))
        .await
        .unwrap();
    assert_eq!(v3.version_number, 3);
    assert_eq!(v3.punchlist, Some(punchlist));

    let v4 = db
        .versions
        .create_version(
            document_id,
            owner.user_id,
            NewVersion::new("v4").with_punchlist(JsonValue::Null),
        )
        .await
        .unwrap();
    assert!(v4.punchlist.is_none(), "explicit null clears the punchlist");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_create_version_touches_document() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let created = db
        .documents
        .create_document(
            owner.objective_id,
            owner.workspace_id,
            owner.user_id,
            CreateDocumentRequest::new("Goals", ""),
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    db.versions
        .create_version(created.document.id, owner.user_id, NewVersion::new("next"))
        .await
        .unwrap();

    let document = db
        .documents
        .get_document(created.document.id)
        .await
        .unwrap()
        .unwrap();
    assert!(document.updated_at_utc > created.document.updated_at_utc);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_create_version_for_missing_document() {
    let test_db = TestDatabase::new().await;

    let result = test_db
        .db
        .versions
        .create_version(Uuid::new_v4(), Uuid::new_v4(), NewVersion::new("orphan"))
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_history_summaries_and_diff() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let created = db
        .documents
        .create_document(
            owner.objective_id,
            owner.workspace_id,
            owner.user_id,
            CreateDocumentRequest::new("Goals", "ship v1\nhire two\n"),
        )
        .await
        .unwrap();
    let document_id = created.document.id;
    db.versions
        .create_version(
            document_id,
            owner.user_id,
            NewVersion::new("ship v1\nhire three\n").with_punchlist(json!(["check headcount"])),
        )
        .await
        .unwrap();

    let summaries = db
        .versions
        .list_version_summaries(document_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].version_number, 2);
    assert!(summaries[0].has_punchlist);
    assert!(!summaries[1].has_punchlist);
    assert_eq!(summaries[1].content_len, "ship v1\nhire two\n".len() as i32);

    let diff = db.versions.diff_versions(document_id, 1, 2).await.unwrap();
    assert!(diff.contains("-hire two"));
    assert!(diff.contains("+hire three"));

    let missing = db.versions.diff_versions(document_id, 1, 9).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    test_db.cleanup().await;
}
