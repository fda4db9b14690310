use std::collections::BTreeMap;

use serde::Serialize;

use super::rules::{Class, NormalizationRule, RuleKind};
use crate::data::model::Row;

// ---------------------------------------------------------------------------
// Distribution – the table handed to a chart
// ---------------------------------------------------------------------------

/// One category of a distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Percentage breakdown of one question within the current filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub entries: Vec<Share>,
    /// Rows counted in the denominator (respondents for multi-value rules).
    pub denominator: usize,
}

impl Distribution {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn percentage_of(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.percentage)
    }

    pub fn total_percentage(&self) -> f64 {
        self.entries.iter().map(|s| s.percentage).sum()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Normalize `column` of `rows` with `rule` and compute the percentage of
/// each category.
///
/// Discarded answers leave the denominator; for multi-value rules the
/// denominator is every row handed in, so shares may add up past 100.
/// No rows, an unknown column or nothing countable give an empty result.
pub fn aggregate(rows: &[&Row], column: &str, rule: &NormalizationRule) -> Distribution {
    let mut labels: BTreeMap<String, usize> = BTreeMap::new();
    let mut bins: BTreeMap<usize, usize> = BTreeMap::new();
    let mut fallback = 0usize;
    let mut denominator = 0usize;

    for row in rows {
        match rule.classify(row.get(column)) {
            Class::Label(label) => {
                *labels.entry(label).or_default() += 1;
                denominator += 1;
            }
            Class::Fallback => {
                fallback += 1;
                denominator += 1;
            }
            Class::Bin(i) => {
                *bins.entry(i).or_default() += 1;
                denominator += 1;
            }
            Class::Labels(hits) => {
                for label in hits {
                    *labels.entry(label).or_default() += 1;
                }
                denominator += 1;
            }
            Class::Discard => {}
        }
    }

    if denominator == 0 {
        return Distribution::default();
    }

    // Only real answers compete for the top slots; blanks join the
    // fallback afterwards.
    if let RuleKind::TopN { n } = rule.kind {
        labels = collapse_tail(labels, n, &rule.fallback);
    }
    if fallback > 0 {
        *labels.entry(rule.fallback.clone()).or_default() += fallback;
    }

    let share = |label: String, count: usize| Share {
        label,
        count,
        percentage: 100.0 * count as f64 / denominator as f64,
    };

    let mut entries: Vec<Share> = if rule.is_binned() {
        let n_bins = match rule.bin_count() {
            Some(n) => n,
            None => bins
                .keys()
                .next_back()
                .map_or(0, |max| max.saturating_add(1)),
        };
        (0..n_bins)
            .map(|i| share(rule.bin_label(i), bins.get(&i).copied().unwrap_or(0)))
            .collect()
    } else {
        let mut entries: Vec<Share> = labels
            .into_iter()
            .map(|(label, count)| share(label, count))
            .collect();
        // BTreeMap order already breaks ties by label; the sort is stable.
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries
    };

    if let Some(order) = &rule.order {
        let rank = |label: &str| order.iter().position(|o| o == label).unwrap_or(order.len());
        entries.sort_by_key(|s| rank(&s.label));
    }

    Distribution {
        entries,
        denominator,
    }
}

/// Keep the `n` most frequent labels and fold every other count into
/// `fallback`.
fn collapse_tail(labels: BTreeMap<String, usize>, n: usize, fallback: &str) -> BTreeMap<String, usize> {
    let mut ranked: Vec<(String, usize)> = labels.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out: BTreeMap<String, usize> = BTreeMap::new();
    for (i, (label, count)) in ranked.into_iter().enumerate() {
        let key = if i < n { label } else { fallback.to_string() };
        *out.entry(key).or_default() += count;
    }
    out
}
