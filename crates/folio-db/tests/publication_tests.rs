//! Envelope publication transitions against PostgreSQL.

use folio_db::test_fixtures::{SeededOwner, TestDatabase};
use folio_db::{
    CreateDocumentRequest, DocumentRepository, Envelope, Error, PublicationRepository,
    PublicationState, VersionRepository,
};
use uuid::Uuid;

async fn new_envelope(test_db: &TestDatabase, owner: &SeededOwner) -> Envelope {
    test_db
        .db
        .publication
        .create_envelope(
            owner.objective_id,
            owner.workspace_id,
            owner.user_id,
            CreateDocumentRequest::new("Findings", "draft body"),
        )
        .await
        .expect("create envelope")
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_new_envelope_starts_with_draft() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;

    let envelope = new_envelope(&test_db, &owner).await;
    assert_eq!(envelope.slots.state(), PublicationState::DraftOnly);

    let loaded = test_db
        .db
        .publication
        .get_envelope(envelope.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.slots, envelope.slots);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_publish_then_toggle_searchable() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let publication = &test_db.db.publication;

    let envelope = new_envelope(&test_db, &owner).await;
    let draft = envelope.slots.draft_version_id.unwrap();

    let published = publication
        .publish(envelope.id(), draft, true)
        .await
        .expect("publish");
    assert_eq!(published.slots.published_version_id, Some(draft));
    assert_eq!(published.slots.draft_version_id, Some(draft), "draft kept");
    assert!(published.slots.searchable);

    let searchable = publication.toggle_searchable(envelope.id()).await.unwrap();
    assert!(!searchable);

    let loaded = publication.get_envelope(envelope.id()).await.unwrap().unwrap();
    assert_eq!(loaded.slots.published_version_id, Some(draft));
    assert!(!loaded.slots.searchable);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_toggle_without_published_is_invalid() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;

    let envelope = new_envelope(&test_db, &owner).await;
    let result = test_db.db.publication.toggle_searchable(envelope.id()).await;
    assert!(matches!(result, Err(Error::InvalidState(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_publish_non_draft_leaves_published_slot() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let envelope = new_envelope(&test_db, &owner).await;
    let first = envelope.slots.draft_version_id.unwrap();
    db.publication.publish(envelope.id(), first, false).await.unwrap();

    db.versions
        .create_version(envelope.id(), owner.user_id, folio_db::NewVersion::new("edit"))
        .await
        .unwrap();

    let result = db.publication.publish(envelope.id(), first, true).await;
    assert!(matches!(result, Err(Error::InvalidState(_))));

    let stray = db.publication.publish(envelope.id(), Uuid::new_v4(), true).await;
    assert!(matches!(stray, Err(Error::InvalidState(_))));

    let loaded = db.publication.get_envelope(envelope.id()).await.unwrap().unwrap();
    assert_eq!(loaded.slots.published_version_id, Some(first));
    assert!(!loaded.slots.searchable);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_edited_version_becomes_publishable_draft() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let envelope = new_envelope(&test_db, &owner).await;
    let first = envelope.slots.draft_version_id.unwrap();
    db.publication.publish(envelope.id(), first, true).await.unwrap();

    let edited = db
        .versions
        .create_version(envelope.id(), owner.user_id, folio_db::NewVersion::new("v2 edited"))
        .await
        .unwrap();
    assert_eq!(edited.version_number, 2);

    let loaded = db.publication.get_envelope(envelope.id()).await.unwrap().unwrap();
    assert_eq!(loaded.slots.draft_version_id, Some(edited.id));
    assert_eq!(loaded.slots.published_version_id, Some(first));
    assert!(loaded.slots.searchable);

    let listed = db.publication.list_searchable(owner.workspace_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "draft body");

    let published = db
        .publication
        .publish(envelope.id(), edited.id, true)
        .await
        .expect("publish edited draft");
    assert_eq!(published.slots.published_version_id, Some(edited.id));
    assert_eq!(published.slots.draft_version_id, Some(edited.id));

    let listed = db.publication.list_searchable(owner.workspace_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version_id, edited.id);
    assert_eq!(listed[0].content, "v2 edited");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_standalone_draft_after_edit_clones_latest_published() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let publication = &test_db.db.publication;

    let envelope = new_envelope(&test_db, &owner).await;
    let edited = test_db
        .db
        .versions
        .create_version(envelope.id(), owner.user_id, folio_db::NewVersion::new("v2 edited"))
        .await
        .unwrap();
    publication.publish(envelope.id(), edited.id, false).await.unwrap();
    publication.discard_draft(envelope.id()).await.unwrap();

    let draft = publication
        .create_standalone_draft(envelope.id(), owner.user_id)
        .await
        .expect("clone draft");
    assert_eq!(draft.version_number, 3);
    assert_eq!(draft.content, "v2 edited");

    let loaded = publication.get_envelope(envelope.id()).await.unwrap().unwrap();
    assert_eq!(loaded.slots.draft_version_id, Some(draft.id));
    assert_eq!(loaded.slots.published_version_id, Some(edited.id));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_standalone_draft_is_idempotent() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let publication = &test_db.db.publication;

    let envelope = new_envelope(&test_db, &owner).await;
    let original = envelope.slots.draft_version_id.unwrap();
    publication.publish(envelope.id(), original, true).await.unwrap();
    publication.discard_draft(envelope.id()).await.unwrap();

    let first = publication
        .create_standalone_draft(envelope.id(), owner.user_id)
        .await
        .expect("clone draft");
    let second = publication
        .create_standalone_draft(envelope.id(), owner.user_id)
        .await
        .expect("re-fetch draft");

    assert_eq!(first.id, second.id);
    assert_ne!(first.id, original, "clone is a new version");
    assert_eq!(first.content, "draft body");
    assert_eq!(first.version_number, 2);
    assert_eq!(test_db.version_count(envelope.id()).await, 2);

    let loaded = publication.get_envelope(envelope.id()).await.unwrap().unwrap();
    assert_eq!(loaded.slots.state(), PublicationState::DraftAndPublished);
    assert_eq!(loaded.slots.published_version_id, Some(original));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_discard_draft_keeps_history_and_unpublish_keeps_draft() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let envelope = new_envelope(&test_db, &owner).await;
    let draft = envelope.slots.draft_version_id.unwrap();
    db.publication.publish(envelope.id(), draft, true).await.unwrap();

    let unpublished = db.publication.unpublish(envelope.id()).await.unwrap();
    assert_eq!(unpublished.slots.state(), PublicationState::DraftOnly);
    assert!(!unpublished.slots.searchable);

    let again = db.publication.unpublish(envelope.id()).await;
    assert!(matches!(again, Err(Error::InvalidState(_))));

    let discarded = db.publication.discard_draft(envelope.id()).await.unwrap();
    assert_eq!(discarded.slots.state(), PublicationState::Empty);
    assert!(db.versions.get_version(draft).await.unwrap().is_some());

    let nothing = db
        .publication
        .create_standalone_draft(envelope.id(), owner.user_id)
        .await;
    assert!(matches!(nothing, Err(Error::InvalidState(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_list_searchable_and_attach() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let envelope = new_envelope(&test_db, &owner).await;
    let draft = envelope.slots.draft_version_id.unwrap();
    assert!(db.publication.list_searchable(owner.workspace_id).await.unwrap().is_empty());

    db.publication.publish(envelope.id(), draft, true).await.unwrap();
    let listed = db.publication.list_searchable(owner.workspace_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version_id, draft);
    assert_eq!(listed[0].content, "draft body");

    let second_objective = test_db
        .seed_objective(owner.workspace_id, "Plain document")
        .await;
    let plain = db
        .documents
        .create_document(
            second_objective,
            owner.workspace_id,
            owner.user_id,
            CreateDocumentRequest::new("Plain", ""),
        )
        .await
        .unwrap();
    let attached = db.publication.attach_envelope(plain.document.id).await.unwrap();
    assert_eq!(attached.slots.state(), PublicationState::Empty);
    let reattached = db.publication.attach_envelope(plain.document.id).await.unwrap();
    assert_eq!(reattached.slots, attached.slots);

    let missing = db.publication.attach_envelope(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_delete_removes_envelope() {
    let test_db = TestDatabase::new().await;
    let owner = test_db.seed_owner().await;
    let db = &test_db.db;

    let envelope = new_envelope(&test_db, &owner).await;
    let draft = envelope.slots.draft_version_id.unwrap();
    db.publication.publish(envelope.id(), draft, true).await.unwrap();

    db.documents
        .delete_document(envelope.id(), owner.user_id)
        .await
        .unwrap();
    assert!(db.publication.get_envelope(envelope.id()).await.unwrap().is_none());
    assert!(db.publication.list_searchable(owner.workspace_id).await.unwrap().is_empty());

    test_db.cleanup().await;
}
