
use std::sync::Arc;

use serde::Serialize;

use scrape_lite::cleaner::{empty_output, output_from, Cleaner, CleanerOutput, Emit};
use scrape_lite::scheduler::task::{CleanTask, CleaningTask, SnapshotCleaningTask};
use scrape_lite::scheduler::{JobBoard, JobId, NewJob};
use scrape_lite::storage::Persistence;
use scrape_lite::worker::clean::clean_raw_data;
use scrape_lite::worker::fan_out;
use scrape_lite::{OutputFormat, OutputTarget, Result, ScrapeError};
use test_harness::{noop_cleaner, CallLog, MemoryStorage, RecordingJobSink, SnapshotLines};

#[derive(Serialize)]
struct Product {
    name: String,
}

#[derive(Serialize)]
struct Review {
    stars: u8,
}

/// Emits X, job, Y, X, job, Y in that order.
struct MixedCleaner;

impl Cleaner for MixedCleaner {
    fn clean_text(&self, _text: &str) -> Result<CleanerOutput> {
        Ok(output_from(vec![
            Emit::record(&Product { name: "p1".into() }),
            Ok(Emit::job(NewJob::new("http://next/1", noop_cleaner()))),
            Emit::record(&Review { stars: 5 }),
            Emit::record(&Product { name: "p2".into() }),
            Ok(Emit::job(NewJob::new("http://next/2", noop_cleaner()))),
            Emit::record(&Review { stars: 2 }),
        ]))
    }

    fn output(&self) -> Option<OutputTarget> {
        Some(OutputTarget::File("shop".to_string()))
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }
}

#[test]
fn test_fan_out_posts_jobs_then_persists_one_batch_per_type() {
    let log = CallLog::default();
    let jobs = RecordingJobSink::with_log(log.clone());
    let storage = MemoryStorage::with_log(log.clone());

    let output = MixedCleaner.clean_text("").unwrap();
    let summary = fan_out(output, &MixedCleaner, &jobs, &storage).unwrap();

    assert_eq!(summary.jobs_posted, 2);
    assert_eq!(summary.records, 4);
    assert_eq!(summary.batches, 2);
    assert_eq!(
        log.entries(),
        vec![
            "post http://next/1",
            "post http://next/2",
            "save Product x2",
            "save Review x2",
        ]
    );

    let batches = storage.batches();
    let names: Vec<_> = batches[0]
        .records
        .iter()
        .map(|r| r.get("name").unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["p1", "p2"]);
    let stars: Vec<_> = batches[1]
        .records
        .iter()
        .map(|r| r.get("stars").unwrap().as_u64().unwrap())
        .collect();
    assert_eq!(stars, vec![5, 2]);

    for batch in &batches {
        assert_eq!(batch.output, Some(OutputTarget::File("shop".to_string())));
        assert_eq!(batch.format, OutputFormat::Text);
    }
}

#[test]
fn test_jobs_are_posted_before_output_is_exhausted() {
    let board = Arc::new(JobBoard::new());
    let storage = MemoryStorage::default();
    let observer = board.clone();

    // The third element inspects the board: the job emitted first must
    // already be queued.
    let output: CleanerOutput = Box::new(
        vec![
            Box::new(|| Ok(Emit::job(NewJob::new("http://early", noop_cleaner()))))
                as Box<dyn FnOnce() -> Result<Emit> + Send>,
            Box::new(|| Emit::record(&Review { stars: 1 })),
            Box::new(move || {
                assert_eq!(observer.counts().web_pending, 1);
                Emit::record(&Review { stars: 3 })
            }),
        ]
        .into_iter()
        .map(|f| f()),
    );

    let summary = fan_out(output, &MixedCleaner, board.as_ref(), &storage).unwrap();
    assert_eq!(summary.jobs_posted, 1);
    assert_eq!(storage.batches().len(), 1);
}

#[test]
fn test_empty_output_is_valid() {
    let jobs = RecordingJobSink::default();
    let storage = MemoryStorage::default();

    let summary = fan_out(empty_output(), &MixedCleaner, &jobs, &storage).unwrap();

    assert_eq!(summary.jobs_posted, 0);
    assert_eq!(summary.batches, 0);
    assert!(storage.batches().is_empty());
}

#[test]
fn test_cleaner_error_stops_fan_out_before_persisting() {
    let jobs = RecordingJobSink::default();
    let storage = MemoryStorage::default();
    let output = output_from(vec![
        Emit::record(&Review { stars: 4 }),
        Err(ScrapeError::Cleaner("unparseable row".to_string())),
        Emit::record(&Review { stars: 1 }),
    ]);

    let err = fan_out(output, &MixedCleaner, &jobs, &storage).unwrap_err();
    assert!(matches!(err, ScrapeError::Cleaner(_)));
    assert!(storage.batches().is_empty());
}

#[test]
fn test_clean_raw_data_reads_stored_page() {
    let storage = MemoryStorage::default();
    let jobs = RecordingJobSink::default();
    let path = storage.write_text("alpha\nbeta\n").unwrap();

    let task = CleanTask::Cleaning(CleaningTask {
        path,
        cleaner: test_harness::line_cleaner(),
        job_id: JobId(0),
    });
    let summary = clean_raw_data(&task, &jobs, &storage).unwrap();

    assert_eq!(summary.records, 2);
    let batches = storage.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].kind, "Line");
    assert_eq!(batches[0].output, None);
}

#[test]
fn test_clean_raw_data_assembles_snapshot_from_paths() {
    let storage = MemoryStorage::default();
    let jobs = RecordingJobSink::default();
    let page = storage.write_text("<p>captured</p>").unwrap();

    let task = CleanTask::SnapshotCleaning(SnapshotCleaningTask {
        paths: [("page".to_string(), page)].into_iter().collect(),
        cleaner: Arc::new(SnapshotLines),
        job_id: JobId(5),
    });
    clean_raw_data(&task, &jobs, &storage).unwrap();

    let batches = storage.batches();
    assert_eq!(
        batches[0].records[0].get("text").and_then(|v| v.as_str()),
        Some("<p>captured</p>")
    );
}

#[test]
fn test_snapshot_task_with_text_only_cleaner_fails() {
    let storage = MemoryStorage::default();
    let jobs = RecordingJobSink::default();
    let page = storage.write_text("x").unwrap();

    let task = CleanTask::SnapshotCleaning(SnapshotCleaningTask {
        paths: [("page".to_string(), page)].into_iter().collect(),
        cleaner: noop_cleaner(),
        job_id: JobId(1),
    });
    let err = clean_raw_data(&task, &jobs, &storage).unwrap_err();
    assert!(matches!(err, ScrapeError::SnapshotUnsupported { .. }));
}
