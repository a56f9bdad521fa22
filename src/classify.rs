//! Rule-based bill categorization.
//!
//! An ordered list of (category, keyword-set) rules is evaluated
//! top-to-bottom against the lower-cased merchant + text; the first rule
//! with a non-empty keyword intersection wins. The rule order below is a
//! fixed priority list and the sole source of classification determinism
//! (e.g. "gas" on a utility bill resolves to Utilities because that rule
//! precedes Transportation).

use crate::models::Category;

/// Priority-ordered classification rules. Earlier rules win ties.
pub const RULES: &[(Category, &[&str])] = &[
    (
        Category::Groceries,
        &[
            "grocery",
            "supermarket",
            "walmart",
            "target",
            "kroger",
            "whole foods",
            "trader joe",
        ],
    ),
    (
        Category::Dining,
        &[
            "restaurant",
            "cafe",
            "coffee",
            "pizza",
            "burger",
            "dining",
            "food",
        ],
    ),
    (
        Category::Utilities,
        &["electric", "utility", "water", "gas", "power", "energy"],
    ),
    (
        Category::InternetPhone,
        &[
            "internet",
            "phone",
            "mobile",
            "verizon",
            "at&t",
            "t-mobile",
            "comcast",
            "spectrum",
        ],
    ),
    (
        Category::Transportation,
        &["fuel", "uber", "lyft", "parking", "metro", "transit"],
    ),
    (
        Category::Healthcare,
        &[
            "pharmacy",
            "medical",
            "doctor",
            "hospital",
            "clinic",
            "cvs",
            "walgreens",
        ],
    ),
    (
        Category::Entertainment,
        &["movie", "theater", "netflix", "spotify", "gaming", "concert"],
    ),
    (
        Category::Shopping,
        &["amazon", "store", "retail", "clothing", "apparel"],
    ),
    (Category::Insurance, &["insurance", "premium", "policy"]),
    (
        Category::Housing,
        &["rent", "mortgage", "lease", "housing"],
    ),
];

/// Classify a bill from its merchant name and raw text.
///
/// Deterministic: identical input always yields the same category.
pub fn classify(merchant: Option<&str>, raw_text: &str) -> Category {
    let mut haystack = String::with_capacity(raw_text.len() + 32);
    if let Some(m) = merchant {
        haystack.push_str(&m.to_lowercase());
        haystack.push('\n');
    }
    haystack.push_str(&raw_text.to_lowercase());

    for (category, keywords) in RULES {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return *category;
        }
    }
    Category::Other
}
