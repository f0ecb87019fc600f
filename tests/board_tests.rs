
use std::collections::HashSet;
use std::path::PathBuf;

use scrape_lite::scheduler::task::{CleanTask, FetchTask};
use scrape_lite::scheduler::{Event, JobBoard, JobId, NewJob, Stage};
use scrape_lite::ProtocolError;
use test_harness::{noop_cleaner, paginate, paths};

fn job(url: &str) -> NewJob {
    NewJob::new(url, noop_cleaner())
}

fn capture_job(url: &str) -> NewJob {
    NewJob::new(url, noop_cleaner()).with_driver_script(paginate)
}

fn web_complete(job_id: JobId, path: &str) -> Event {
    Event::WebTaskComplete {
        path: PathBuf::from(path),
        job_id,
    }
}

/// Assert `id` sits in exactly the given stage.
fn assert_stage(board: &JobBoard, id: JobId, stage: Stage) {
    assert_eq!(board.locate(id), vec![stage], "job {} misplaced", id);
}

#[test]
fn test_single_job_lifecycle() {
    let board = JobBoard::new();
    let id = board.post(job("u1"));
    assert_eq!(id, JobId(0));
    assert!(board.has_pending_jobs());

    match board.get_web_task() {
        Some(FetchTask::Web(task)) => {
            assert_eq!(task.url, "u1");
            assert_eq!(task.job_id, JobId(0));
        }
        other => panic!("expected web task, got {:?}", other),
    }

    board.report_event(web_complete(id, "p1")).unwrap();

    match board.get_cleaning_task() {
        Some(CleanTask::Cleaning(task)) => {
            assert_eq!(task.path, PathBuf::from("p1"));
            assert_eq!(task.job_id, JobId(0));
        }
        other => panic!("expected cleaning task, got {:?}", other),
    }

    board
        .report_event(Event::CleaningTaskComplete { job_id: id })
        .unwrap();
    assert!(!board.has_pending_jobs());
    assert_eq!(board.counts().total(), 0);
}

#[test]
fn test_job_occupies_exactly_one_stage() {
    let board = JobBoard::new();
    let id = board.post(job("u1"));
    assert_stage(&board, id, Stage::WebPending);

    board.get_web_task().unwrap();
    assert_stage(&board, id, Stage::Downloading);

    board.report_event(web_complete(id, "p1")).unwrap();
    assert_stage(&board, id, Stage::CleaningPending);

    board.get_cleaning_task().unwrap();
    assert_stage(&board, id, Stage::Parsing);

    board
        .report_event(Event::CleaningTaskComplete { job_id: id })
        .unwrap();
    assert!(board.locate(id).is_empty());
}

#[test]
fn test_web_queue_is_fifo() {
    let board = JobBoard::new();
    let a = board.post(job("a"));
    let b = board.post(job("b"));
    let c = board.post(job("c"));

    let order: Vec<JobId> = std::iter::from_fn(|| board.get_web_task())
        .map(|t| t.job_id())
        .collect();
    assert_eq!(order, vec![a, b, c]);
}

#[test]
fn test_cleaning_queue_is_fifo_in_completion_order() {
    let board = JobBoard::new();
    let a = board.post(job("a"));
    let b = board.post(job("b"));
    board.get_web_task().unwrap();
    board.get_web_task().unwrap();

    // Fetches finish out of issue order
    board.report_event(web_complete(b, "pb")).unwrap();
    board.report_event(web_complete(a, "pa")).unwrap();

    assert_eq!(board.get_cleaning_task().unwrap().job_id(), b);
    assert_eq!(board.get_cleaning_task().unwrap().job_id(), a);
}

#[test]
fn test_empty_queues_return_none_without_side_effects() {
    let board = JobBoard::new();
    for _ in 0..3 {
        assert!(board.get_web_task().is_none());
        assert!(board.get_cleaning_task().is_none());
    }
    assert!(!board.has_pending_jobs());
    assert_eq!(board.minted(), 0);

    let id = board.post(job("u1"));
    board.get_web_task().unwrap();
    let before = board.counts();
    for _ in 0..3 {
        assert!(board.get_web_task().is_none());
        assert!(board.get_cleaning_task().is_none());
    }
    assert_eq!(board.counts(), before);
    assert_stage(&board, id, Stage::Downloading);
}

#[test]
fn test_interleaved_completions_across_queues() {
    let board = JobBoard::new();
    let a = board.post(job("a"));
    let b = board.post(job("b"));

    board.get_web_task().unwrap();
    board.report_event(web_complete(a, "pa")).unwrap();
    board.get_cleaning_task().unwrap();
    board.get_web_task().unwrap();

    // a is cleaned while b is still downloading
    board
        .report_event(Event::CleaningTaskComplete { job_id: a })
        .unwrap();
    assert!(board.has_pending_jobs());
    assert_stage(&board, b, Stage::Downloading);

    board.report_event(web_complete(b, "pb")).unwrap();
    board.get_cleaning_task().unwrap();
    board
        .report_event(Event::CleaningTaskComplete { job_id: b })
        .unwrap();
    assert!(!board.has_pending_jobs());
}

#[test]
fn test_multi_shot_capture_enqueues_one_unit_per_snapshot() {
    let board = JobBoard::new();
    let id = board.post(capture_job("gallery"));

    match board.get_web_task() {
        Some(FetchTask::SnapshotCapture(task)) => {
            assert_eq!(task.url, "gallery");
            assert_eq!(task.job_id, id);
        }
        other => panic!("expected capture task, got {:?}", other),
    }

    for shot in 0..3 {
        let p = format!("shot{}", shot);
        board
            .report_event(Event::SnapshotCaptured {
                paths: paths(&[("page", p.as_str())]),
                job_id: id,
            })
            .unwrap();
        // Originating job stays in flight until capture completes
        assert_stage(&board, id, Stage::Downloading);
    }
    assert_eq!(board.counts().cleaning_pending, 3);

    board
        .report_event(Event::SnapshotCaptureComplete { job_id: id })
        .unwrap();
    assert!(board.locate(id).is_empty());

    let mut unit_ids = Vec::new();
    while let Some(task) = board.get_cleaning_task() {
        match task {
            CleanTask::SnapshotCleaning(t) => {
                assert_eq!(t.paths["page"], PathBuf::from(format!("shot{}", unit_ids.len())));
                unit_ids.push(t.job_id);
            }
            other => panic!("expected snapshot cleaning task, got {:?}", other),
        }
    }
    assert_eq!(unit_ids.len(), 3);
    assert!(unit_ids.iter().all(|u| *u != id));
    let distinct: HashSet<JobId> = unit_ids.iter().copied().collect();
    assert_eq!(distinct.len(), 3);

    for unit in unit_ids {
        assert!(board.has_pending_jobs());
        board
            .report_event(Event::CleaningTaskComplete { job_id: unit })
            .unwrap();
    }
    assert!(!board.has_pending_jobs());
}

#[test]
fn test_capture_with_no_snapshots_drains() {
    let board = JobBoard::new();
    let id = board.post(capture_job("empty"));
    board.get_web_task().unwrap();
    board
        .report_event(Event::SnapshotCaptureComplete { job_id: id })
        .unwrap();
    assert!(!board.has_pending_jobs());
}

#[test]
fn test_unrecognized_event_leaves_board_unchanged() {
    let board = JobBoard::new();
    let a = board.post(job("a"));
    board.post(job("b"));
    board.get_web_task().unwrap();
    let before = board.counts();

    let event: Event = serde_json::from_str(r#"{"kind":"retry_later","job_id":0}"#).unwrap();
    let err = board.report_event(event).unwrap_err();

    assert_eq!(err, ProtocolError::UnrecognizedEvent);
    assert_eq!(board.counts(), before);
    assert_stage(&board, a, Stage::Downloading);
}

#[test]
fn test_unknown_job_ids_are_protocol_errors() {
    let board = JobBoard::new();
    let id = board.post(job("a"));

    // Not yet dispatched, so not downloading
    assert_eq!(
        board.report_event(web_complete(id, "p")).unwrap_err(),
        ProtocolError::UnknownJob {
            job_id: id,
            stage: Stage::Downloading
        }
    );
    assert!(board
        .report_event(Event::SnapshotCaptured {
            paths: paths(&[]),
            job_id: id
        })
        .is_err());
    assert!(board
        .report_event(Event::SnapshotCaptureComplete { job_id: JobId(99) })
        .is_err());

    board.get_web_task().unwrap();
    board.report_event(web_complete(id, "p")).unwrap();
    // Duplicate completion for a job that already moved on
    assert!(board.report_event(web_complete(id, "p")).is_err());
    assert_stage(&board, id, Stage::CleaningPending);
    assert_eq!(board.minted(), 1);
}

#[test]
fn test_events_must_match_job_kind() {
    let board = JobBoard::new();
    let plain = board.post(job("plain"));
    let capture = board.post(capture_job("capture"));
    board.get_web_task().unwrap();
    board.get_web_task().unwrap();
    let before = board.counts();

    assert_eq!(
        board
            .report_event(Event::SnapshotCaptureComplete { job_id: plain })
            .unwrap_err(),
        ProtocolError::WrongTaskKind {
            job_id: plain,
            event: "snapshot_capture_complete"
        }
    );
    assert_eq!(
        board
            .report_event(Event::SnapshotCaptured {
                paths: paths(&[("page", "s0")]),
                job_id: plain
            })
            .unwrap_err(),
        ProtocolError::WrongTaskKind {
            job_id: plain,
            event: "snapshot_captured"
        }
    );
    assert_eq!(
        board.report_event(web_complete(capture, "p")).unwrap_err(),
        ProtocolError::WrongTaskKind {
            job_id: capture,
            event: "web_task_complete"
        }
    );

    assert_eq!(board.counts(), before);
    assert_eq!(board.minted(), 2);
    assert_stage(&board, plain, Stage::Downloading);
    assert_stage(&board, capture, Stage::Downloading);
}

#[test]
fn test_has_pending_jobs_tracks_all_four_stages() {
    let board = JobBoard::new();
    assert!(!board.has_pending_jobs());

    let id = board.post(job("a"));
    assert!(board.has_pending_jobs()); // web pending
    board.get_web_task().unwrap();
    assert!(board.has_pending_jobs()); // downloading
    board.report_event(web_complete(id, "p")).unwrap();
    assert!(board.has_pending_jobs()); // cleaning pending
    board.get_cleaning_task().unwrap();
    assert!(board.has_pending_jobs()); // parsing
    board
        .report_event(Event::CleaningTaskComplete { job_id: id })
        .unwrap();
    assert!(!board.has_pending_jobs());
}

#[test]
fn test_ids_unique_across_jobs_and_snapshot_units() {
    let board = JobBoard::new();
    let capture = board.post(capture_job("c"));
    board.get_web_task().unwrap();
    board
        .report_event(Event::SnapshotCaptured {
            paths: paths(&[("page", "s0")]),
            job_id: capture,
        })
        .unwrap();
    let later = board.post(job("later"));

    let unit = board.get_cleaning_task().unwrap().job_id();
    assert_eq!(capture, JobId(0));
    assert_eq!(unit, JobId(1));
    assert_eq!(later, JobId(2));
}

#[test]
fn test_concurrent_posts_mint_distinct_ids() {
    let board = std::sync::Arc::new(JobBoard::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let board = board.clone();
            std::thread::spawn(move || {
                (0..50)
                    .map(|i| board.post(job(&format!("t{}-{}", t, i))))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<JobId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 400);
    assert_eq!(board.counts().web_pending, 400);
}
