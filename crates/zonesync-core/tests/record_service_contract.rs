//! Contract Test: Record Service
//!
//! The service is the persistence side of the lifecycle hooks.
//!
//! Constraints verified:
//! - Loud path: remote failure rolls the local write back and is returned
//! - Quiet path: the local write is kept and a record resync is queued
//! - Deleting an unknown record is NotFound

mod common;

use common::*;
use zonesync_core::model::{RecordField, RecordId};
use zonesync_core::resync;
use zonesync_core::traits::{ApiError, RecordStore, RemoteOp};
use zonesync_core::{Error, RecordService, ResyncMessage};

fn service(h: &Harness) -> RecordService {
    RecordService::new(h.store.clone(), h.orchestrator.clone())
}

#[tokio::test]
async fn create_persists_remote_identity() {
    let h = harness().await;

    let created = service(&h).create(a_record(1)).await.unwrap();

    assert_eq!(created.sync.remote_id.as_deref(), Some("remote-1"));
    let stored = h.store.get_record(RecordId(1)).await.unwrap().unwrap();
    assert!(stored.is_reconciled());
}

#[tokio::test]
async fn failed_create_rolls_back_local_record() {
    let h = harness().await;
    h.remote
        .fail(RemoteOp::Create, vec![ApiError::new(Some(9005), "Content for A record is invalid")]);

    let err = service(&h).create(a_record(1)).await.unwrap_err();

    assert!(matches!(err, Error::RemoteOperation { .. }));
    assert!(h.store.get_record(RecordId(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_update_restores_previous_version() {
    let h = harness().await;
    let mut original = a_record(1).with_remote_id("abc");
    original.sync.synced = true;
    h.store.save_record(&original).await.unwrap();
    h.remote
        .fail(RemoteOp::Update, vec![ApiError::new(Some(9005), "Content for A record is invalid")]);

    let mut edited = original.clone();
    edited.content = "not-an-address".to_string();
    let err = service(&h)
        .update(edited, &[RecordField::Content])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RemoteOperation { .. }));
    assert_eq!(h.store.get_record(RecordId(1)).await.unwrap(), Some(original));
}

#[tokio::test]
async fn update_of_unknown_record_is_not_found() {
    let h = harness().await;

    let err = service(&h)
        .update(a_record(5), &[RecordField::Content])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(h.remote.total_calls(), 0);
}

#[tokio::test]
async fn failed_delete_keeps_local_record() {
    let h = harness().await;
    let record = a_record(1).with_remote_id("xyz");
    h.store.save_record(&record).await.unwrap();
    h.remote.fail_transport(RemoteOp::Delete, "operation timed out");

    assert!(service(&h).delete(RecordId(1)).await.is_err());

    let stored = h.store.get_record(RecordId(1)).await.unwrap().unwrap();
    assert_eq!(stored.sync.remote_id.as_deref(), Some("xyz"));
}

#[tokio::test]
async fn delete_removes_locally_and_remotely() {
    let h = harness().await;
    h.store
        .save_record(&a_record(1).with_remote_id("xyz"))
        .await
        .unwrap();

    let deleted = service(&h).delete(RecordId(1)).await.unwrap();

    assert_eq!(deleted.id, RecordId(1));
    assert_eq!(h.remote.ops(), vec![RemoteOp::Delete]);
    assert!(h.store.get_record(RecordId(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_of_unknown_record_is_not_found() {
    let h = harness().await;

    let err = service(&h).delete(RecordId(9)).await.unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn deferred_writes_queue_a_record_resync() {
    let h = harness().await;
    let (queue, rx) = resync::channel(8);
    let service = service(&h).with_queue(queue);

    let created = service.create_deferred(a_record(1)).await.unwrap();
    assert!(created.sync.remote_id.is_none());

    let mut edited = created.clone();
    edited.ttl = 600;
    service
        .update_deferred(edited, &[RecordField::Ttl])
        .await
        .unwrap();

    // No remote traffic on the caller's task
    assert_eq!(h.remote.total_calls(), 0);
    assert_eq!(
        h.store.get_record(RecordId(1)).await.unwrap().unwrap().ttl,
        600
    );

    let expected = ResyncMessage::RecordResync {
        record_id: RecordId(1),
    };
    assert_eq!(rx.try_recv().await.map(|e| e.message), Some(expected));
    assert_eq!(rx.try_recv().await.map(|e| e.message), Some(expected));
}

#[tokio::test]
async fn deferred_write_without_queue_is_a_configuration_error() {
    let h = harness().await;

    let err = service(&h).create_deferred(a_record(1)).await.unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(h.store.get_record(RecordId(1)).await.unwrap().is_none());
}
