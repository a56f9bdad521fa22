//! Heuristic extraction of structured bill records from raw text.
//!
//! All heuristics fail soft: a field that cannot be recovered is `None`,
//! never an error. The whole module is pure and deterministic over its
//! input text, which keeps extraction reproducible in tests.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::classify::classify;
use crate::models::{BillRecord, LineItem};

/// Words that disqualify a line from being the merchant name.
const MERCHANT_STOPWORDS: &[&str] = &["receipt", "invoice", "bill", "page", "date"];

/// Words that mark a line as a summary row rather than a line item.
const SUMMARY_KEYWORDS: &[&str] = &["total", "subtotal", "tax", "balance", "due"];

/// Maximum line items retained per bill.
const MAX_LINE_ITEMS: usize = 10;

// Amount candidates, scanned in order. The largest candidate wins: on a
// receipt the "total" line normally carries the maximum value. This is a
// documented tie-break heuristic, tunable rather than guaranteed.
static AMOUNT_NEAR_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:grand total|total|amount due|balance)[:\s]*\$?\s*(\d[\d,]*\.?\d*)").unwrap()
});
static AMOUNT_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s*(\d[\d,]*\.\d{2})").unwrap());
static AMOUNT_TRAILING_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d[\d,]*\.\d{2})\s*(?:total|due)").unwrap());

// Date shapes, tried in order; the first successful parse wins.
static DATE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b").unwrap());
static DATE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b").unwrap());
static DATE_TEXTUAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2}),?\s+(\d{4})")
        .unwrap()
});

static LINE_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+\$?\s*(\d+\.\d{2})\s*$").unwrap());

/// Extract a structured [`BillRecord`] from raw document text.
///
/// Never fails: unrecoverable fields are `None` and the category defaults
/// to `Other`.
pub fn extract_record(raw_text: &str, filename: &str) -> BillRecord {
    let merchant = extract_merchant(raw_text, filename);
    let amount = extract_amount(raw_text);
    let date = extract_date(raw_text);
    let line_items = extract_line_items(raw_text);
    let category = classify(merchant.as_deref(), raw_text);

    BillRecord {
        filename: filename.to_string(),
        merchant,
        amount,
        date,
        category,
        line_items,
        raw_text: raw_text.to_string(),
    }
}

/// First plausible merchant line among the top five, preferring an
/// all-uppercase line; falls back to the filename stem.
fn extract_merchant(text: &str, filename: &str) -> Option<String> {
    let candidates: Vec<&str> = text
        .lines()
        .take(5)
        .map(str::trim)
        .filter(|line| is_merchant_candidate(line))
        .collect();

    let picked = candidates
        .iter()
        .find(|line| {
            line.chars().any(|c| c.is_alphabetic())
                && !line.chars().any(|c| c.is_lowercase())
        })
        .or_else(|| candidates.first());

    if let Some(line) = picked {
        return Some((*line).to_string());
    }

    let stem = std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

fn is_merchant_candidate(line: &str) -> bool {
    if line.len() <= 3 {
        return false;
    }
    // A line that is digits and punctuation only is a number, not a name.
    if line
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_punctuation() || c.is_whitespace())
    {
        return false;
    }
    let lower = line.to_lowercase();
    !MERCHANT_STOPWORDS.iter().any(|w| lower.contains(w))
}

/// Largest currency-formatted candidate near a total-like keyword.
fn extract_amount(text: &str) -> Option<f64> {
    let mut amounts: Vec<f64> = Vec::new();
    for re in [&AMOUNT_NEAR_KEYWORD, &AMOUNT_DOLLAR, &AMOUNT_TRAILING_KEYWORD] {
        for cap in re.captures_iter(text) {
            if let Ok(v) = cap[1].replace(',', "").parse::<f64>() {
                if v >= 0.0 {
                    amounts.push(v);
                }
            }
        }
    }
    amounts
        .into_iter()
        .fold(None, |max: Option<f64>, v| match max {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
        .map(round_cents)
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// First date-shaped token that parses to a valid calendar date.
fn extract_date(text: &str) -> Option<NaiveDate> {
    if let Some(cap) = DATE_NUMERIC.captures(text) {
        let a: u32 = cap[1].parse().ok()?;
        let b: u32 = cap[2].parse().ok()?;
        let year = normalize_year(cap[3].parse().ok()?);
        // Month-first, swapped when the first component cannot be a month.
        let (month, day) = if a > 12 && b <= 12 { (b, a) } else { (a, b) };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(cap) = DATE_ISO.captures(text) {
        let year: i32 = cap[1].parse().ok()?;
        let month: u32 = cap[2].parse().ok()?;
        let day: u32 = cap[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(cap) = DATE_TEXTUAL.captures(text) {
        let month = month_number(&cap[1])?;
        let day: u32 = cap[2].parse().ok()?;
        let year: i32 = cap[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    None
}

fn normalize_year(y: i32) -> i32 {
    if y < 100 {
        2000 + y
    } else {
        y
    }
}

fn month_number(name: &str) -> Option<u32> {
    let idx = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| name.to_lowercase().starts_with(m))?;
    Some(idx as u32 + 1)
}

/// Lines shaped `<description> ... <amount>`, excluding summary rows.
fn extract_line_items(text: &str) -> Vec<LineItem> {
    let mut items = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let lower = line.to_lowercase();
        if SUMMARY_KEYWORDS.iter().any(|w| lower.contains(w)) {
            continue;
        }
        if let Some(cap) = LINE_ITEM.captures(line) {
            let description = cap[1].trim().trim_end_matches('.').trim().to_string();
            if description.len() < 3 || description.len() >= 50 {
                continue;
            }
            if let Ok(amount) = cap[2].parse::<f64>() {
                items.push(LineItem {
                    description,
                    amount,
                });
                if items.len() == MAX_LINE_ITEMS {
                    break;
                }
            }
        }
    }
    items
}
