//! Core data models used throughout spendlens.
//!
//! These types represent the bill records, chat turns, and analysis
//! snapshots that flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Spending category for a bill.
///
/// Declaration order is the classifier's priority order and the sort
/// order used everywhere a stable category ordering matters (breakdown
/// serialization, insight emission, tie-breaks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Groceries,
    Dining,
    Utilities,
    #[serde(rename = "Internet/Phone")]
    InternetPhone,
    Transportation,
    Healthcare,
    Entertainment,
    Shopping,
    Insurance,
    Housing,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Groceries => "Groceries",
            Category::Dining => "Dining",
            Category::Utilities => "Utilities",
            Category::InternetPhone => "Internet/Phone",
            Category::Transportation => "Transportation",
            Category::Healthcare => "Healthcare",
            Category::Entertainment => "Entertainment",
            Category::Shopping => "Shopping",
            Category::Insurance => "Insurance",
            Category::Housing => "Housing",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `<description> ... <amount>` line parsed from a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub amount: f64,
}

/// Structured extraction of one uploaded document.
///
/// Created once per uploaded file at ingestion time; immutable thereafter
/// except for deletion with its owning session. Fields the heuristics
/// could not recover are `None` rather than fabricated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub filename: String,
    pub merchant: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub category: Category,
    pub line_items: Vec<LineItem>,
    /// Raw extracted text, retained for indexing.
    pub raw_text: String,
}

impl BillRecord {
    /// A record for a file whose text could not be extracted: the upload
    /// is acknowledged but every extracted field is empty.
    pub fn unreadable(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            merchant: None,
            amount: None,
            date: None,
            category: Category::Other,
            line_items: Vec::new(),
            raw_text: String::new(),
        }
    }
}

/// Speaker role in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a session's chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A retrieval hit projected for the API: chunk text plus attribution.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub filename: String,
    pub score: f32,
}

/// Citation attached to a chat response, pointing at a grounding chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SourceCitation {
    pub filename: String,
    /// Leading excerpt of the grounding chunk (bounded length).
    pub excerpt: String,
    pub score: f32,
}

/// Kind of a generated insight string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Observation,
    Warning,
    Recommendation,
}

/// One deterministic, template-filled insight.
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub text: String,
}

/// Point-in-time aggregate computed from a session's bill records.
///
/// Derived, never cached: recomputed from the current bill sequence on
/// every request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSnapshot {
    pub total_spent: f64,
    pub bill_count: usize,
    pub average_bill: f64,
    /// Summed amounts per category; categories with zero total omitted.
    pub category_breakdown: std::collections::BTreeMap<Category, f64>,
    pub insights: Vec<Insight>,
    pub generated_at: DateTime<Utc>,
}

/// Summary of a session's state, returned by the session-info endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub bill_count: usize,
    pub chat_turns: usize,
    pub has_index: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_order_matches_declaration() {
        assert!(Category::Groceries < Category::Dining);
        assert!(Category::Dining < Category::Utilities);
        assert!(Category::Housing < Category::Other);
    }

    #[test]
    fn category_serializes_display_names() {
        let json = serde_json::to_string(&Category::InternetPhone).unwrap();
        assert_eq!(json, "\"Internet/Phone\"");
        let json = serde_json::to_string(&Category::Groceries).unwrap();
        assert_eq!(json, "\"Groceries\"");
    }

    #[test]
    fn unreadable_record_has_nulled_fields() {
        let rec = BillRecord::unreadable("scan.png");
        assert_eq!(rec.filename, "scan.png");
        assert!(rec.merchant.is_none());
        assert!(rec.amount.is_none());
        assert!(rec.date.is_none());
        assert_eq!(rec.category, Category::Other);
        assert!(rec.raw_text.is_empty());
    }
}
