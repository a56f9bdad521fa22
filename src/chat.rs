//! Chat orchestration: grounded question answering over a session's
//! bills.
//!
//! Combines retrieval output with a bounded window of prior chat history
//! into a grounded prompt, invokes the generation capability, and
//! appends the exchange to the session's history. A session with no
//! bills short-circuits to a fixed reply without calling the generator —
//! there is nothing to ground an answer in, and the external call would
//! be wasted.

use chrono::Utc;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::llm::{GenerationRequest, Generator};
use crate::models::{ChatTurn, Role, SearchHit, SourceCitation};
use crate::retrieve::retrieve;
use crate::session::Session;

/// Reply for a session that has no documents yet.
pub const NO_DOCUMENTS_REPLY: &str =
    "I don't have any bills to look at yet. Upload a few receipts or bills and ask me again.";

/// Maximum characters of a grounding chunk echoed back as a citation.
const CITATION_EXCERPT_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are a friendly, practical financial assistant. \
Answer the user's question using only the bill excerpts provided below. \
Cite concrete amounts and merchants from the excerpts where relevant. \
If the excerpts do not contain the answer, say so plainly instead of guessing.";

/// Run one chat exchange. Returns the generated response and the source
/// citations used for grounding.
pub async fn chat(
    session: &Session,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    retrieval: &RetrievalConfig,
    message: &str,
) -> Result<(String, Vec<SourceCitation>)> {
    let message = message.trim();
    if message.is_empty() {
        return Err(Error::Validation("message must not be empty".to_string()));
    }

    // No documents: fixed reply, generator never invoked. The exchange
    // is still recorded so the stored transcript matches what the user
    // saw.
    if session.read().await.bills.is_empty() {
        append_exchange(session, message, NO_DOCUMENTS_REPLY).await;
        return Ok((NO_DOCUMENTS_REPLY.to_string(), Vec::new()));
    }

    let hits = retrieve(session, embedder, message, retrieval.chat_top_k).await?;

    let prompt = build_prompt(session, retrieval.history_window, &hits, message).await;

    // History is mutated only after the generator succeeds; a timeout or
    // upstream failure leaves the session untouched.
    let response = generator.generate(&session.api_key, &prompt).await?;

    append_exchange(session, message, &response).await;

    let sources = hits
        .iter()
        .map(|hit| SourceCitation {
            filename: hit.filename.clone(),
            excerpt: excerpt(&hit.text),
            score: hit.score,
        })
        .collect();

    Ok((response, sources))
}

async fn build_prompt(
    session: &Session,
    history_window: usize,
    hits: &[SearchHit],
    message: &str,
) -> GenerationRequest {
    let context = hits
        .iter()
        .map(|hit| format!("Bill: {}\n{}", hit.filename, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = format!("{}\n\nBill excerpts:\n{}", SYSTEM_PROMPT, context);

    let state = session.read().await;
    let start = state.chat_history.len().saturating_sub(history_window);
    let mut messages: Vec<(Role, String)> = state.chat_history[start..]
        .iter()
        .map(|turn| (turn.role, turn.text.clone()))
        .collect();
    drop(state);

    messages.push((Role::User, message.to_string()));

    GenerationRequest { system, messages }
}

async fn append_exchange(session: &Session, user_text: &str, assistant_text: &str) {
    let mut state = session.write().await;
    let now = Utc::now();
    state.chat_history.push(ChatTurn {
        role: Role::User,
        text: user_text.to_string(),
        timestamp: now,
    });
    state.chat_history.push(ChatTurn {
        role: Role::Assistant,
        text: assistant_text.to_string(),
        timestamp: now,
    });
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= CITATION_EXCERPT_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(CITATION_EXCERPT_CHARS).collect();
        format!("{}...", head)
    }
}
