//! Upload ingestion pipeline.
//!
//! Coordinates the per-file flow: mime admission → text extraction →
//! record extraction → chunking → embedding → atomic commit into the
//! session. Files in one upload are independent: a failure on one never
//! aborts its siblings, and every file gets its own typed outcome in
//! input order.
//!
//! Commit protocol: all capability I/O happens before the session write
//! lock is taken; the lock covers only the paired append of the bill
//! record and its index entries. A request aborted mid-extraction or
//! mid-embedding therefore commits nothing — readers never observe a
//! record without its entries or vice versa.

use serde::Serialize;

use crate::chunk::chunk_text;
use crate::embedding::Embedder;
use crate::error::Error;
use crate::extract::{is_supported_mime, TextExtractor};
use crate::models::BillRecord;
use crate::record::extract_record;
use crate::session::Session;

/// One file in an upload request.
#[derive(Debug)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Typed per-file error in an upload response.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeError {
    pub code: &'static str,
    pub message: String,
}

impl From<&Error> for OutcomeError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result for one uploaded file. `record` is present whenever a bill
/// record was committed — including extraction failures, where the
/// record exists with nulled fields so the user sees the file was
/// received even though it could not be read.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    pub record: Option<BillRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

/// Ingest a batch of files into a session. Outcomes are ordered as the
/// inputs; partial success is reported per file.
pub async fn ingest_files(
    session: &Session,
    extractor: &dyn TextExtractor,
    embedder: &dyn Embedder,
    chunk_chars: usize,
    max_file_bytes: usize,
    files: Vec<UploadFile>,
) -> Vec<FileOutcome> {
    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let outcome =
            ingest_one(session, extractor, embedder, chunk_chars, max_file_bytes, file).await;
        outcomes.push(outcome);
    }
    outcomes
}

async fn ingest_one(
    session: &Session,
    extractor: &dyn TextExtractor,
    embedder: &dyn Embedder,
    chunk_chars: usize,
    max_file_bytes: usize,
    file: UploadFile,
) -> FileOutcome {
    let UploadFile {
        filename,
        bytes,
        mime,
    } = file;

    // Admission checks happen before any extraction work.
    if !is_supported_mime(&mime) {
        let err = Error::UnsupportedMedia(mime);
        return FileOutcome {
            filename,
            record: None,
            error: Some(OutcomeError::from(&err)),
        };
    }
    if bytes.len() > max_file_bytes {
        let err = Error::Validation(format!(
            "file exceeds size limit ({} > {} bytes)",
            bytes.len(),
            max_file_bytes
        ));
        return FileOutcome {
            filename,
            record: None,
            error: Some(OutcomeError::from(&err)),
        };
    }

    let text = match extractor.extract_text(&bytes, &mime) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            return commit_unreadable(
                session,
                filename,
                Error::Extraction("no text recovered from document".to_string()),
            )
            .await;
        }
        Err(err) => {
            tracing::warn!(file = %filename, %err, "text extraction failed");
            return commit_unreadable(session, filename, err).await;
        }
    };

    let record = extract_record(&text, &filename);

    // Embed every chunk in one batch before touching session state.
    let chunks = chunk_text(&text, chunk_chars);
    let vectors = match embedder.embed(&session.api_key, &chunks).await {
        Ok(vectors) => vectors,
        Err(err) => {
            // Nothing committed for this file: no record, no entries.
            tracing::warn!(file = %filename, %err, "embedding failed, file not ingested");
            return FileOutcome {
                filename,
                record: None,
                error: Some(OutcomeError::from(&err)),
            };
        }
    };
    if vectors.len() != chunks.len() {
        let err = Error::Internal(format!(
            "embedding count mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        ));
        tracing::error!(file = %filename, %err, "invariant violation");
        return FileOutcome {
            filename,
            record: None,
            error: Some(OutcomeError::from(&err)),
        };
    }

    // Atomic commit: record and its index entries become visible together.
    let embedded_chunks: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
    let committed = session.append_bill(record.clone(), embedded_chunks).await;

    tracing::info!(file = %filename, bills = committed, "file ingested");
    FileOutcome {
        filename,
        record: Some(record),
        error: None,
    }
}

/// Commit a nulled record for a file whose text could not be extracted.
/// The record is visible to listing and analysis; nothing is indexed.
async fn commit_unreadable(session: &Session, filename: String, err: Error) -> FileOutcome {
    let record = BillRecord::unreadable(&filename);
    session.append_bill(record.clone(), Vec::new()).await;
    FileOutcome {
        filename,
        record: Some(record),
        error: Some(OutcomeError::from(&err)),
    }
}
