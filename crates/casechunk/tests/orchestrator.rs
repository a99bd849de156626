//! End-to-end batch runs over an in-memory extractor

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use casechunk::config::PipelineConfig;
use casechunk::processing::{FileOutcome, WorkItem};
use casechunk::{
    ChunkRecord, DocumentPipeline, Error, OutputSink, PageExtractor, ResumableOrchestrator,
    Result, StopHandle,
};

/// Serves canned pages by file name; `corrupt*.pdf` fails, `slow*.pdf` sleeps
struct FakeExtractor {
    pages: HashMap<String, Vec<String>>,
    delay: Duration,
}

impl FakeExtractor {
    fn new(docs: &[(&str, &str)]) -> Self {
        Self {
            pages: docs
                .iter()
                .map(|(name, text)| {
                    (
                        name.to_string(),
                        text.split('\u{c}').map(String::from).collect(),
                    )
                })
                .collect(),
            delay: Duration::ZERO,
        }
    }
}

impl PageExtractor for FakeExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if name.starts_with("slow") {
            std::thread::sleep(self.delay);
        }
        self.pages
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::extraction(name, "failed to load PDF: invalid file header"))
    }
}

fn decision(docket: &str, claimant: &str) -> String {
    format!(
        "BEFORE THE APPEALS BOARD\nDocket No. {docket}\n{claimant} )\nClaimant )\n\
         \u{c}APPEARANCES\nCounsel appeared for both parties.\n\n\
         FINDINGS OF FACT\nThe claimant was injured at work. The injury arose out of employment.\n\
         AWARD\nBenefits are awarded.\n"
    )
}

fn docs() -> Vec<(&'static str, String)> {
    vec![
        ("a.pdf", decision("1,000,001", "ALICE ADAMS")),
        ("b.pdf", decision("1,000,002", "BOB BROWN")),
        ("c.pdf", decision("1,000,003", "CAROL CLARK")),
    ]
}

fn items(names: &[&str]) -> Vec<WorkItem> {
    names
        .iter()
        .map(|n| WorkItem::new(PathBuf::from("/decisions").join(n), *n))
        .collect()
}

fn config(workers: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.processing.workers = workers;
    config
}

fn orchestrator(
    extractor: FakeExtractor,
    output: &Path,
    resume: bool,
    config: &PipelineConfig,
) -> ResumableOrchestrator {
    let pipeline = DocumentPipeline::new(Arc::new(extractor), config).unwrap();
    let sink = OutputSink::open(output, resume).unwrap();
    ResumableOrchestrator::new(Arc::new(pipeline), Arc::new(sink), &config.processing)
}

fn extractor() -> FakeExtractor {
    let docs = docs();
    let refs: Vec<(&str, &str)> = docs.iter().map(|(n, t)| (*n, t.as_str())).collect();
    FakeExtractor::new(&refs)
}

fn read_records(path: &Path) -> Vec<ChunkRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// File names in output order, one entry per contiguous run of records
fn file_runs(records: &[ChunkRecord]) -> Vec<String> {
    let mut runs: Vec<String> = Vec::new();
    for record in records {
        if runs.last() != Some(&record.metadata.filename) {
            runs.push(record.metadata.filename.clone());
        }
    }
    runs
}

#[tokio::test]
async fn test_all_files_written_contiguously() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");

    let summary = orchestrator(extractor(), &out, false, &config(3))
        .run(items(&["a.pdf", "b.pdf", "c.pdf"]))
        .await
        .unwrap();

    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.cancelled);

    let records = read_records(&out);
    assert_eq!(records.len(), summary.chunks_written);

    let mut runs = file_runs(&records);
    runs.sort();
    assert_eq!(runs, vec!["a.pdf", "b.pdf", "c.pdf"]);

    let a: Vec<&ChunkRecord> = records.iter().filter(|r| r.metadata.filename == "a.pdf").collect();
    let sections: Vec<&str> = a.iter().map(|r| r.metadata.section.as_str()).collect();
    assert_eq!(sections, vec!["UNLABELED", "APPEARANCES", "FINDINGS OF FACT", "AWARD"]);
    assert_eq!(a[0].metadata.docket_number, "1,000,001");
    assert_eq!(a[0].metadata.claimant_name, "ALICE ADAMS");
    assert_eq!(a[1].metadata.page, 2);
    assert!(a[3]
        .text
        .starts_with("Case: 1,000,001 | Claimant: ALICE ADAMS\nSection: AWARD\n\n"));
}

#[tokio::test]
async fn test_failed_file_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");

    let summary = orchestrator(extractor(), &out, false, &config(2))
        .run(items(&["a.pdf", "corrupt.pdf", "c.pdf"]))
        .await
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].filename, "corrupt.pdf");
    assert!(summary.failures[0].reason.contains("invalid file header"));

    let log = std::fs::read_to_string(OutputSink::failure_log_path(&out)).unwrap();
    assert!(log.contains("corrupt.pdf"));

    let sink = OutputSink::open(&out, true).unwrap();
    assert!(sink.is_completed("a.pdf"));
    assert!(!sink.is_completed("corrupt.pdf"));
}

#[tokio::test]
async fn test_resume_skips_completed_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");

    orchestrator(extractor(), &out, false, &config(2))
        .run(items(&["a.pdf", "b.pdf"]))
        .await
        .unwrap();

    let summary = orchestrator(extractor(), &out, true, &config(2))
        .run(items(&["a.pdf", "b.pdf", "c.pdf"]))
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.completed, 1);

    let mut runs = file_runs(&read_records(&out));
    runs.sort();
    assert_eq!(runs, vec!["a.pdf", "b.pdf", "c.pdf"]);
}

#[tokio::test]
async fn test_crash_between_write_and_mark_is_redone_once() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");
    let progress = OutputSink::progress_path(&out);

    orchestrator(extractor(), &out, false, &config(1))
        .run(items(&["a.pdf", "b.pdf", "c.pdf"]))
        .await
        .unwrap();
    let complete_output = std::fs::read(&out).unwrap();

    // c.pdf's records reached the output but its completion entry did not
    let log = std::fs::read_to_string(&progress).unwrap();
    let kept: Vec<&str> = log.lines().take(2).collect();
    std::fs::write(&progress, format!("{}\n", kept.join("\n"))).unwrap();

    let summary = orchestrator(extractor(), &out, true, &config(1))
        .run(items(&["a.pdf", "b.pdf", "c.pdf"]))
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(std::fs::read(&out).unwrap(), complete_output);
    assert_eq!(file_runs(&read_records(&out)), vec!["a.pdf", "b.pdf", "c.pdf"]);
}

#[tokio::test]
async fn test_torn_batch_is_discarded_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");

    orchestrator(extractor(), &out, false, &config(1))
        .run(items(&["a.pdf"]))
        .await
        .unwrap();

    let mut bytes = std::fs::read(&out).unwrap();
    bytes.extend_from_slice(br#"{"text":"Case: 1,000,002 | Claimant: BOB"#);
    std::fs::write(&out, bytes).unwrap();

    orchestrator(extractor(), &out, true, &config(1))
        .run(items(&["a.pdf", "b.pdf"]))
        .await
        .unwrap();

    // every line parses, so the torn record is gone
    assert_eq!(file_runs(&read_records(&out)), vec!["a.pdf", "b.pdf"]);
}

#[tokio::test]
async fn test_stopped_run_leaves_files_pending() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");

    let stop = StopHandle::new();
    stop.stop();

    let summary = orchestrator(extractor(), &out, false, &config(2))
        .with_stop_handle(stop)
        .run(items(&["a.pdf", "b.pdf", "c.pdf"]))
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.pending, 3);
    assert!(read_records(&out).is_empty());
}

#[tokio::test]
async fn test_file_timeout_is_recorded_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");

    let mut extractor = extractor();
    extractor
        .pages
        .insert("slow.pdf".to_string(), vec![decision("1,000,009", "SAM SLOW")]);
    extractor.delay = Duration::from_millis(1500);

    let mut config = config(2);
    config.processing.file_timeout_secs = Some(1);

    let summary = orchestrator(extractor, &out, false, &config)
        .run(items(&["a.pdf", "slow.pdf"]))
        .await
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].filename, "slow.pdf");
    assert!(summary.failures[0].reason.contains("timed out"));
}

#[tokio::test]
async fn test_progress_reported_once_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");

    let completed = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let (c, f) = (completed.clone(), failed.clone());

    orchestrator(extractor(), &out, false, &config(4))
        .with_progress(Arc::new(move |_name: &str, outcome: &FileOutcome| match outcome {
            FileOutcome::Completed { .. } => {
                c.fetch_add(1, Ordering::SeqCst);
            }
            FileOutcome::Failed { .. } => {
                f.fetch_add(1, Ordering::SeqCst);
            }
        }))
        .run(items(&["a.pdf", "b.pdf", "corrupt.pdf", "a.pdf"]))
        .await
        .unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 2);
    assert_eq!(failed.load(Ordering::SeqCst), 1);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_write_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chunks.jsonl");
    std::os::unix::fs::symlink("/dev/full", &out).unwrap();

    let config = config(1);
    let pipeline = DocumentPipeline::new(Arc::new(extractor()), &config).unwrap();
    let sink = Arc::new(OutputSink::open(&out, false).unwrap());

    let result = ResumableOrchestrator::new(Arc::new(pipeline), sink.clone(), &config.processing)
        .run(items(&["a.pdf", "b.pdf", "c.pdf"]))
        .await;

    let err = result.err().unwrap();
    assert!(matches!(err, Error::Write { .. }));

    let progress = std::fs::read_to_string(OutputSink::progress_path(&out)).unwrap();
    assert!(progress.is_empty());
    assert_eq!(sink.completed_count(), 0);

    // the sink stays unusable for the rest of the process
    assert!(matches!(sink.commit("b.pdf", &[]), Err(Error::State { .. })));
}
