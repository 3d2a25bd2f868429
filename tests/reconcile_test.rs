//! Original status reconciliation tests.

mod common;

use common::{audio_from_video, TestHarness};
use rendition_common::{JobStatus, OriginalId, OriginalStatus, OwnerId, TranscodeKind};
use rendition_db::queries::{originals, transcode_jobs};

fn assert_invariant(harness: &TestHarness, ids: &[OriginalId]) {
    let conn = harness.conn();
    for &id in ids {
        let status = originals::get_original(&conn, id).unwrap().unwrap().status;
        let live = transcode_jobs::list_for_original(&conn, id)
            .unwrap()
            .iter()
            .any(|j| j.status.is_live());
        assert_eq!(
            status == OriginalStatus::Transcoding,
            live,
            "original {id}: status {status}, live jobs: {live}"
        );
    }
}

async fn reconcile(harness: &TestHarness) {
    harness.ctx.reconciler.reconcile_all().await.unwrap();
}

#[tokio::test]
async fn second_sweep_changes_nothing() {
    let harness = TestHarness::new();
    let a = harness.original(1);
    let b = harness.original(1);
    let source = harness.source_video(a, 1080);
    harness.enqueue(a, source, TranscodeKind::video(480, None).unwrap());
    harness
        .ctx
        .status
        .set_original_status(b, OriginalStatus::Transcoding)
        .unwrap();

    let mut sub = harness.ctx.broadcaster.subscribe(OwnerId::from(1));

    let first = harness.ctx.reconciler.reconcile_all().await.unwrap();
    assert_eq!(first.marked_transcoding, vec![a]);
    assert_eq!(first.marked_completed, vec![b]);
    let mut events = 0;
    while sub.try_recv().is_some() {
        events += 1;
    }
    assert_eq!(events, 2);

    let second = harness.ctx.reconciler.reconcile_all().await.unwrap();
    assert!(second.is_empty(), "unexpected transitions: {second}");
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn invariant_holds_through_job_lifecycle() {
    let harness = TestHarness::new();
    let ids: Vec<OriginalId> = (0..3).map(|_| harness.original(2)).collect();
    let sources: Vec<_> = ids
        .iter()
        .map(|&id| harness.source_video(id, 720))
        .collect();
    reconcile(&harness).await;
    assert_invariant(&harness, &ids);

    let j0 = harness.enqueue(ids[0], sources[0], TranscodeKind::video(480, None).unwrap());
    let j1 = harness.enqueue(ids[1], sources[1], audio_from_video(96));
    let j2 = harness.enqueue(ids[1], sources[1], TranscodeKind::video(240, None).unwrap());
    reconcile(&harness).await;
    assert_invariant(&harness, &ids);

    {
        let conn = harness.conn();
        assert!(transcode_jobs::claim(&conn, j0.id).unwrap());
        transcode_jobs::delete(&conn, j1.id).unwrap();
    }
    reconcile(&harness).await;
    assert_invariant(&harness, &ids);

    {
        let conn = harness.conn();
        transcode_jobs::mark_failed(&conn, j0.id, "encoder exited with 1").unwrap();
        transcode_jobs::delete(&conn, j2.id).unwrap();
    }
    reconcile(&harness).await;
    assert_invariant(&harness, &ids);
    {
        let conn = harness.conn();
        assert_eq!(
            originals::get_original(&conn, ids[0]).unwrap().unwrap().status,
            OriginalStatus::Completed
        );
        assert_eq!(
            transcode_jobs::get_job(&conn, j0.id).unwrap().status,
            JobStatus::Failed
        );
    }

    assert!(transcode_jobs::retry_failed(&harness.conn(), j0.id).unwrap());
    reconcile(&harness).await;
    assert_invariant(&harness, &ids);
    assert_eq!(
        originals::get_original(&harness.conn(), ids[0])
            .unwrap()
            .unwrap()
            .status,
        OriginalStatus::Transcoding
    );
}

#[tokio::test]
async fn concurrent_sweeps_publish_each_transition_once() {
    let harness = TestHarness::new();
    let id = harness.original(3);
    let source = harness.source_audio(id);
    harness.enqueue(
        id,
        source,
        TranscodeKind::audio(rendition_common::MediaKind::Audio, 96).unwrap(),
    );

    let mut sub = harness.ctx.broadcaster.subscribe(OwnerId::from(3));
    let reconciler = harness.ctx.reconciler.clone();
    let (a, b) = tokio::join!(reconciler.reconcile_all(), reconciler.reconcile_all());
    let transitions = a.unwrap().marked_transcoding.len() + b.unwrap().marked_transcoding.len();
    assert_eq!(transitions, 1);

    assert_eq!(sub.recv().await.unwrap().status, OriginalStatus::Transcoding);
    assert!(sub.try_recv().is_none());
}
