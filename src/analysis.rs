//! Spending analysis over a session's bill records.
//!
//! Everything here is a pure function of the bill slice: totals, the
//! per-category breakdown, and the insight strings are deterministic
//! templates, not model output, which keeps analytics testable without
//! a live model. Snapshots are recomputed on every request and never
//! cached across mutations of the bill sequence.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::InsightsConfig;
use crate::models::{AnalysisSnapshot, BillRecord, Category, Insight, InsightKind};

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compute a point-in-time analysis snapshot from the current bills.
pub fn analyze(bills: &[BillRecord], insights_config: &InsightsConfig) -> AnalysisSnapshot {
    let bill_count = bills.len();
    let total_spent = round_cents(bills.iter().filter_map(|b| b.amount).sum());
    let average_bill = if bill_count > 0 {
        round_cents(total_spent / bill_count as f64)
    } else {
        0.0
    };

    let mut category_breakdown: BTreeMap<Category, f64> = BTreeMap::new();
    for bill in bills {
        let amount = bill.amount.unwrap_or(0.0);
        if amount > 0.0 {
            *category_breakdown.entry(bill.category).or_insert(0.0) += amount;
        }
    }
    for total in category_breakdown.values_mut() {
        *total = round_cents(*total);
    }

    let insights = build_insights(
        bills,
        &category_breakdown,
        total_spent,
        average_bill,
        insights_config,
    );

    AnalysisSnapshot {
        total_spent,
        bill_count,
        average_bill,
        category_breakdown,
        insights,
        generated_at: Utc::now(),
    }
}

/// Deterministic, template-filled insights in fixed emission order:
/// summary observation, recurring-merchant observation, over-share
/// warnings, top-category recommendation, dining-vs-groceries nudge.
fn build_insights(
    bills: &[BillRecord],
    breakdown: &BTreeMap<Category, f64>,
    total_spent: f64,
    average_bill: f64,
    config: &InsightsConfig,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    insights.push(Insight {
        kind: InsightKind::Observation,
        text: format!(
            "You've spent ${:.2} across {} bill(s), averaging ${:.2} per bill.",
            total_spent,
            bills.len(),
            average_bill
        ),
    });

    if let Some((merchant, visits)) = top_recurring_merchant(bills) {
        insights.push(Insight {
            kind: InsightKind::Observation,
            text: format!(
                "Your most visited merchant is {} ({} bills).",
                merchant, visits
            ),
        });
    }

    if total_spent > 0.0 {
        // BTreeMap iteration gives stable category order for warnings.
        for (category, amount) in breakdown {
            let share = amount / total_spent;
            if share > config.category_share_warn {
                insights.push(Insight {
                    kind: InsightKind::Warning,
                    text: format!(
                        "{} accounts for {:.0}% of your spending (${:.2}) — above the {:.0}% watermark.",
                        category,
                        share * 100.0,
                        amount,
                        config.category_share_warn * 100.0
                    ),
                });
            }
        }

        if let Some((category, amount)) = top_category(breakdown) {
            insights.push(Insight {
                kind: InsightKind::Recommendation,
                text: format!(
                    "{} is your biggest category at ${:.2}. Reviewing it first gives the largest savings lever.",
                    category, amount
                ),
            });
        }

        let dining = breakdown.get(&Category::Dining).copied().unwrap_or(0.0);
        let groceries = breakdown.get(&Category::Groceries).copied().unwrap_or(0.0);
        if dining > groceries && dining > 0.0 {
            insights.push(Insight {
                kind: InsightKind::Recommendation,
                text: format!(
                    "You spent more on dining (${:.2}) than groceries (${:.2}); shifting a few meals home would close the gap.",
                    dining, groceries
                ),
            });
        }
    }

    insights
}

/// Merchant appearing on the most bills, when it recurs at least twice.
/// Ties resolve to the merchant seen earliest in the bill sequence.
fn top_recurring_merchant(bills: &[BillRecord]) -> Option<(String, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for bill in bills {
        let Some(merchant) = bill.merchant.as_deref() else {
            continue;
        };
        match counts.iter_mut().find(|(name, _)| *name == merchant) {
            Some((_, n)) => *n += 1,
            None => counts.push((merchant, 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .filter(|(_, n)| *n >= 2)
        .map(|(name, n)| (name.to_string(), n))
}

/// Highest-spend category; ties resolve to the earliest-declared one.
fn top_category(breakdown: &BTreeMap<Category, f64>) -> Option<(Category, f64)> {
    breakdown
        .iter()
        .fold(None, |best: Option<(Category, f64)>, (cat, amount)| {
            match best {
                Some((_, best_amount)) if best_amount >= *amount => best,
                _ => Some((*cat, *amount)),
            }
        })
}
