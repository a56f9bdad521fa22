//! End-to-end service-layer tests with mock capabilities.
//!
//! Exercises the upload → index → retrieve/chat/analyze flow the way the
//! HTTP handlers drive it, with deterministic in-process capability
//! implementations so nothing touches the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use spendlens::analysis::analyze;
use spendlens::chat::{chat, NO_DOCUMENTS_REPLY};
use spendlens::config::{InsightsConfig, RetrievalConfig};
use spendlens::embedding::Embedder;
use spendlens::error::{Error, Result};
use spendlens::extract::{mime_from_extension, BuiltinExtractor, MIME_PNG, MIME_TEXT};
use spendlens::ingest::{ingest_files, UploadFile};
use spendlens::llm::{GenerationRequest, Generator};
use spendlens::models::Category;
use spendlens::retrieve::retrieve;
use spendlens::session::{Session, SessionStore};

const DIMS: usize = 8;
const CHUNK_CHARS: usize = 1000;
const MAX_FILE_BYTES: usize = 16 * 1024 * 1024;

/// Deterministic embedder: byte-frequency histogram folded into a fixed
/// number of dimensions. Identical text always embeds identically.
struct HashEmbedder {
    calls: AtomicUsize,
    last_api_key: Mutex<String>,
}

impl HashEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_api_key: Mutex::new(String::new()),
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, api_key: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_api_key.lock().unwrap() = api_key.to_string();
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIMS];
                for b in t.to_lowercase().bytes() {
                    v[(b as usize) % DIMS] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Embedder that always times out, for failure-path tests.
struct TimeoutEmbedder;

#[async_trait]
impl Embedder for TimeoutEmbedder {
    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, _api_key: &str, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::UpstreamTimeout("embedding"))
    }
}

/// Generator that counts invocations and returns a canned reply.
struct ScriptedGenerator {
    calls: AtomicUsize,
    reply: String,
}

impl ScriptedGenerator {
    fn new(reply: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _api_key: &str, _request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn text_file(filename: &str, body: &str) -> UploadFile {
    UploadFile {
        filename: filename.to_string(),
        bytes: body.as_bytes().to_vec(),
        mime: MIME_TEXT.to_string(),
    }
}

fn retrieval_config() -> RetrievalConfig {
    RetrievalConfig::default()
}

async fn upload(session: &Session, embedder: &dyn Embedder, files: Vec<UploadFile>) {
    let outcomes = ingest_files(
        session,
        &BuiltinExtractor,
        embedder,
        CHUNK_CHARS,
        MAX_FILE_BYTES,
        files,
    )
    .await;
    for outcome in &outcomes {
        assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome);
    }
}

const WALMART: &str =
    "WALMART SUPERCENTER\n123 Main St\n\nMILK 2% GAL  3.48\nBREAD WHEAT  2.50\n\nTOTAL 45.67\n01/15/2024";
const CAFE: &str = "CORNER CAFE\n\nLATTE  5.00\nBAGEL  3.25\n\nTOTAL 8.25\n02/01/2024";

#[tokio::test]
async fn upload_extracts_and_indexes() {
    let store = SessionStore::new();
    let session = store.create("sk-live".to_string());
    let embedder = HashEmbedder::new();

    upload(&session, &embedder, vec![text_file("walmart.txt", WALMART)]).await;

    let state = session.read().await;
    assert_eq!(state.bills.len(), 1);
    let bill = &state.bills[0];
    assert_eq!(bill.merchant.as_deref(), Some("WALMART SUPERCENTER"));
    assert_eq!(bill.amount, Some(45.67));
    assert_eq!(bill.category, Category::Groceries);
    assert!(!state.index.is_empty());

    // The embedding capability is authorized with the session credential.
    assert_eq!(*embedder.last_api_key.lock().unwrap(), "sk-live");
}

#[tokio::test]
async fn analysis_scenario_totals() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();

    upload(
        &session,
        &embedder,
        vec![
            text_file("groceries.txt", "KROGER MARKET\ngrocery run\nTOTAL 100.00"),
            text_file("dinner.txt", "CORNER RESTAURANT\ndinner\nTOTAL 50.00"),
        ],
    )
    .await;

    let state = session.read().await;
    let snapshot = analyze(&state.bills, &InsightsConfig::default());
    assert_eq!(snapshot.total_spent, 150.0);
    assert_eq!(snapshot.average_bill, 75.0);
    assert_eq!(snapshot.category_breakdown[&Category::Groceries], 100.0);
    assert_eq!(snapshot.category_breakdown[&Category::Dining], 50.0);
    let breakdown_sum: f64 = snapshot.category_breakdown.values().sum();
    assert!((breakdown_sum - snapshot.total_spent).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_commit_atomically() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = Arc::new(HashEmbedder::new());

    const N: usize = 16;
    let mut handles = Vec::new();
    for i in 0..N {
        let session = store.get(&session.id).unwrap();
        let embedder = embedder.clone();
        handles.push(tokio::spawn(async move {
            let body = format!("MERCHANT {:02}\n\nTOTAL {}.00", i, i + 1);
            upload(
                &session,
                embedder.as_ref(),
                vec![text_file(&format!("bill-{:02}.txt", i), &body)],
            )
            .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let state = session.read().await;
    assert_eq!(state.bills.len(), N, "every upload must commit exactly once");
    // Each file produced one chunk; entry and record counts must match,
    // and every entry must point at a real bill with the same filename.
    assert_eq!(state.index.len(), N);
    let hits = state.index.search(&vec![1.0; DIMS], N);
    for (entry, _) in hits {
        let bill = &state.bills[entry.bill_seq];
        assert_eq!(bill.filename, entry.filename);
    }
}

#[tokio::test]
async fn chat_short_circuits_without_documents() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();
    let generator = ScriptedGenerator::new("unused");

    let (reply, sources) = chat(
        &session,
        &embedder,
        &generator,
        &retrieval_config(),
        "how much did I spend?",
    )
    .await
    .unwrap();

    assert_eq!(reply, NO_DOCUMENTS_REPLY);
    assert!(sources.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

    // The exchange is still part of the transcript.
    let state = session.read().await;
    assert_eq!(state.chat_history.len(), 2);
}

#[tokio::test]
async fn chat_grounds_and_appends_history() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();
    let generator = ScriptedGenerator::new("You spent $45.67 at Walmart.");

    upload(&session, &embedder, vec![text_file("walmart.txt", WALMART)]).await;

    let (reply, sources) = chat(
        &session,
        &embedder,
        &generator,
        &retrieval_config(),
        "what did I buy at walmart?",
    )
    .await
    .unwrap();

    assert_eq!(reply, "You spent $45.67 at Walmart.");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert!(!sources.is_empty());
    assert_eq!(sources[0].filename, "walmart.txt");

    let state = session.read().await;
    assert_eq!(state.chat_history.len(), 2);
    assert_eq!(state.chat_history[0].text, "what did I buy at walmart?");
}

#[tokio::test]
async fn chat_failure_leaves_history_untouched() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let good = HashEmbedder::new();
    let generator = ScriptedGenerator::new("unused");

    upload(&session, &good, vec![text_file("walmart.txt", WALMART)]).await;

    let err = chat(
        &session,
        &TimeoutEmbedder,
        &generator,
        &retrieval_config(),
        "anything?",
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "upstream_timeout");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert!(session.read().await.chat_history.is_empty());
}

#[tokio::test]
async fn retrieve_bounds_and_orders_results() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();

    upload(
        &session,
        &embedder,
        vec![
            text_file("walmart.txt", WALMART),
            text_file("cafe.txt", CAFE),
        ],
    )
    .await;

    let hits = retrieve(&session, &embedder, "groceries", 5).await.unwrap();
    assert!(hits.len() <= 2);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn retrieve_on_empty_session_skips_embedding() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();

    let hits = retrieve(&session, &embedder, "groceries", 5).await.unwrap();
    assert!(hits.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn retrieve_validates_inputs() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();

    let err = retrieve(&session, &embedder, "groceries", 0).await.unwrap_err();
    assert_eq!(err.code(), "validation_error");
    let err = retrieve(&session, &embedder, "   ", 5).await.unwrap_err();
    assert_eq!(err.code(), "validation_error");

    let err = chat(
        &session,
        &embedder,
        &ScriptedGenerator::new("unused"),
        &retrieval_config(),
        "",
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "validation_error");
    assert!(session.read().await.chat_history.is_empty());
}

#[tokio::test]
async fn batch_upload_reports_per_file_outcomes() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();

    let files = vec![
        text_file("good.txt", CAFE),
        UploadFile {
            filename: "weird.bin".to_string(),
            bytes: vec![0, 1, 2],
            mime: "application/octet-stream".to_string(),
        },
        UploadFile {
            filename: "scan.png".to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            mime: MIME_PNG.to_string(),
        },
    ];

    let outcomes = ingest_files(
        &session,
        &BuiltinExtractor,
        &embedder,
        CHUNK_CHARS,
        MAX_FILE_BYTES,
        files,
    )
    .await;

    assert_eq!(outcomes.len(), 3);

    assert!(outcomes[0].error.is_none());
    assert!(outcomes[0].record.is_some());

    let unsupported = outcomes[1].error.as_ref().unwrap();
    assert_eq!(unsupported.code, "unsupported_media_type");
    assert!(outcomes[1].record.is_none());

    // Image without an OCR backend: failure reported, but the record
    // exists with nulled fields so the user sees the file was received.
    let failed = outcomes[2].error.as_ref().unwrap();
    assert_eq!(failed.code, "extraction_failed");
    let record = outcomes[2].record.as_ref().unwrap();
    assert!(record.merchant.is_none());
    assert!(record.amount.is_none());

    let state = session.read().await;
    assert_eq!(state.bills.len(), 2); // good + nulled
    assert_eq!(state.index.len(), 1); // only the readable file indexed
}

#[tokio::test]
async fn embedding_failure_commits_nothing_for_that_file() {
    let store = SessionStore::new();
    let session = store.create(String::new());

    let outcomes = ingest_files(
        &session,
        &BuiltinExtractor,
        &TimeoutEmbedder,
        CHUNK_CHARS,
        MAX_FILE_BYTES,
        vec![text_file("walmart.txt", WALMART)],
    )
    .await;

    assert_eq!(outcomes[0].error.as_ref().unwrap().code, "upstream_timeout");
    assert!(outcomes[0].record.is_none());

    let state = session.read().await;
    assert!(state.bills.is_empty());
    assert!(state.index.is_empty());
}

#[tokio::test]
async fn upload_from_disk_roundtrip() {
    // Mirrors the CLI/boundary flow: bytes come off disk, mime is
    // inferred from the extension, and the pipeline does the rest.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walmart.txt");
    std::fs::write(&path, WALMART).unwrap();

    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();

    let bytes = std::fs::read(&path).unwrap();
    let mime = mime_from_extension("walmart.txt").unwrap();
    let outcomes = ingest_files(
        &session,
        &BuiltinExtractor,
        &embedder,
        CHUNK_CHARS,
        MAX_FILE_BYTES,
        vec![UploadFile {
            filename: "walmart.txt".to_string(),
            bytes,
            mime: mime.to_string(),
        }],
    )
    .await;

    assert!(outcomes[0].error.is_none());
    let record = outcomes[0].record.as_ref().unwrap();
    assert_eq!(record.amount, Some(45.67));
    assert_eq!(record.category, Category::Groceries);
}

#[tokio::test]
async fn oversize_file_rejected_before_extraction() {
    let store = SessionStore::new();
    let session = store.create(String::new());
    let embedder = HashEmbedder::new();

    let outcomes = ingest_files(
        &session,
        &BuiltinExtractor,
        &embedder,
        CHUNK_CHARS,
        8, // tiny per-file limit
        vec![text_file("big.txt", "MERCHANT NAME\nTOTAL 10.00")],
    )
    .await;

    assert_eq!(outcomes[0].error.as_ref().unwrap().code, "validation_error");
    assert!(session.read().await.bills.is_empty());
}
