use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::text::fold;
use crate::data::model::CellValue;
use crate::error::ConfigError;

pub const DEFAULT_FALLBACK: &str = "Outros";

/// Upper bound on the number of fixed-width bins; values past the last one
/// are dropped like values below `start`.
pub const MAX_FIXED_BINS: usize = 1_000;

fn default_fallback() -> String {
    DEFAULT_FALLBACK.to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// What happens to a null or blank answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Counted in the fallback bucket.
    Fallback,
    /// Dropped; not part of the denominator.
    Discard,
}

/// What happens to an answer no table entry recognizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unmatched {
    #[default]
    Fallback,
    Discard,
    /// Keep the raw (trimmed) answer as its own category.
    Keep,
}

/// How raw answers of one column become categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// The trimmed answer is the category.
    Identity,
    /// Exact dictionary from raw answer to category.
    Exact {
        map: BTreeMap<String, String>,
        #[serde(default)]
        unmatched: Unmatched,
    },
    /// Ordered `(needle, category)` substring table over folded text; the
    /// first hit wins.
    Keyword {
        keywords: Vec<(String, String)>,
        /// Answers containing any of these are dropped.
        #[serde(default)]
        discard: Vec<String>,
        /// Answers equal to any of these (after folding) are dropped.
        #[serde(default)]
        discard_exact: Vec<String>,
        #[serde(default)]
        unmatched: Unmatched,
    },
    /// Fixed-width integer bins `[start + k*width, start + (k+1)*width)`.
    /// Values below `start` or past `MAX_FIXED_BINS` bins are dropped.
    FixedBins { start: i64, width: i64 },
    /// Right-closed bins `(edges[i], edges[i+1]]`, plus `(last, +inf)` when
    /// `open_ended`.
    Edges {
        edges: Vec<f64>,
        #[serde(default)]
        open_ended: bool,
        labels: Vec<String>,
    },
    /// "Select all that apply": split on `delimiter` and count each listed
    /// category once per respondent.
    MultiValue {
        #[serde(default = "default_delimiter")]
        delimiter: String,
        categories: Vec<String>,
    },
    /// Keep the `n` most frequent answers, fold the rest into the fallback.
    TopN { n: usize },
}

/// Normalization of one question column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRule {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default = "default_fallback")]
    pub fallback: String,
    /// Overrides the kind's default handling of null answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<MissingPolicy>,
    /// Explicit display order; unlisted categories follow by percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    #[serde(skip)]
    folded: FoldedTables,
}

/// Keyword tables folded once, on first use. Derived from `kind`, so it
/// never takes part in equality; a rule's `kind` is not edited after it
/// has classified answers.
#[derive(Debug, Clone, Default)]
struct FoldedTables(OnceLock<KeywordTables>);

impl PartialEq for FoldedTables {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct KeywordTables {
    needles: Vec<String>,
    discard: Vec<String>,
    discard_exact: Vec<String>,
}

impl KeywordTables {
    fn new(keywords: &[(String, String)], discard: &[String], discard_exact: &[String]) -> Self {
        let fold_all = |items: &[String]| -> Vec<String> { items.iter().map(|s| fold(s)).collect() };
        KeywordTables {
            needles: keywords.iter().map(|(needle, _)| fold(needle)).collect(),
            discard: fold_all(discard),
            discard_exact: fold_all(discard_exact),
        }
    }
}

/// Result of classifying one answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Class {
    Label(String),
    /// Index into the rule's bins.
    Bin(usize),
    /// Multi-value hits (possibly empty).
    Labels(Vec<String>),
    Fallback,
    Discard,
}

impl NormalizationRule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            fallback: default_fallback(),
            missing: None,
            order: None,
            folded: FoldedTables::default(),
        }
    }

    pub fn identity() -> Self {
        Self::new(RuleKind::Identity)
    }

    pub fn with_missing(mut self, policy: MissingPolicy) -> Self {
        self.missing = Some(policy);
        self
    }

    pub fn with_order(mut self, order: Vec<String>) -> Self {
        self.order = Some(order);
        self
    }

    /// Null handling: explicit setting, else the kind's default.
    pub fn missing_policy(&self) -> MissingPolicy {
        self.missing.unwrap_or(match self.kind {
            RuleKind::Exact { .. } | RuleKind::Keyword { .. } | RuleKind::TopN { .. } => {
                MissingPolicy::Fallback
            }
            _ => MissingPolicy::Discard,
        })
    }

    /// Binned rules have a natural ascending order.
    pub fn is_binned(&self) -> bool {
        matches!(self.kind, RuleKind::FixedBins { .. } | RuleKind::Edges { .. })
    }

    pub fn is_multi_value(&self) -> bool {
        matches!(self.kind, RuleKind::MultiValue { .. })
    }

    /// Classify one raw answer. `TopN` answers come back as plain labels;
    /// the aggregator collapses the tail.
    pub fn classify(&self, raw: &CellValue) -> Class {
        if let RuleKind::MultiValue { delimiter, categories } = &self.kind {
            return classify_multi(raw, delimiter, categories, &self.fallback);
        }

        if self.is_binned() {
            return match raw.as_f64().and_then(|v| self.bin_index(v)) {
                Some(i) => Class::Bin(i),
                None if raw.is_null() => self.on_missing(),
                None => Class::Discard,
            };
        }

        let text = match raw.as_text().map(|s| s.trim().to_string()) {
            Some(s) if !s.is_empty() => s,
            _ => return self.on_missing(),
        };

        match &self.kind {
            RuleKind::Identity | RuleKind::TopN { .. } => Class::Label(text),
            RuleKind::Exact { map, unmatched } => match map.get(&text) {
                Some(label) => Class::Label(label.clone()),
                None => on_unmatched(*unmatched, text),
            },
            RuleKind::Keyword {
                keywords,
                discard,
                discard_exact,
                unmatched,
            } => {
                let tables = self
                    .folded
                    .0
                    .get_or_init(|| KeywordTables::new(keywords, discard, discard_exact));
                let folded = fold(&text);
                if tables.discard_exact.iter().any(|d| *d == folded)
                    || tables.discard.iter().any(|d| folded.contains(d.as_str()))
                {
                    return Class::Discard;
                }
                tables
                    .needles
                    .iter()
                    .position(|needle| folded.contains(needle.as_str()))
                    .map(|i| Class::Label(keywords[i].1.clone()))
                    .unwrap_or_else(|| on_unmatched(*unmatched, text))
            }
            RuleKind::FixedBins { .. } | RuleKind::Edges { .. } | RuleKind::MultiValue { .. } => {
                Class::Discard
            }
        }
    }

    fn on_missing(&self) -> Class {
        match self.missing_policy() {
            MissingPolicy::Fallback => Class::Fallback,
            MissingPolicy::Discard => Class::Discard,
        }
    }

    /// Bin index of a numeric value, `None` if it falls outside all bins.
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        match &self.kind {
            RuleKind::FixedBins { start, width } => {
                if *width <= 0 || value < *start as f64 {
                    return None;
                }
                let index = ((value - *start as f64) / *width as f64).floor();
                (index < MAX_FIXED_BINS as f64).then_some(index as usize)
            }
            RuleKind::Edges {
                edges, open_ended, ..
            } => {
                let closed = edges
                    .windows(2)
                    .position(|w| value > w[0] && value <= w[1]);
                match (closed, edges.last()) {
                    (Some(i), _) => Some(i),
                    (None, Some(last)) if *open_ended && value > *last => {
                        Some(edges.len().saturating_sub(1))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Display label of a bin.
    pub fn bin_label(&self, index: usize) -> String {
        match &self.kind {
            RuleKind::FixedBins { start, width } => {
                let offset = i64::try_from(index).unwrap_or(i64::MAX).saturating_mul(*width);
                let lo = start.saturating_add(offset);
                format!("{lo}-{}", lo.saturating_add(width - 1))
            }
            RuleKind::Edges { labels, .. } => labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()),
            _ => self.fallback.clone(),
        }
    }

    /// Number of declared bins; fixed-width rules are unbounded.
    pub fn bin_count(&self) -> Option<usize> {
        match &self.kind {
            RuleKind::Edges {
                edges, open_ended, ..
            } => Some(edges.len().saturating_sub(1) + usize::from(*open_ended)),
            _ => None,
        }
    }

    /// Check the rule's internal consistency.
    pub fn validate(&self, column: &str) -> Result<(), ConfigError> {
        let column = column.to_string();
        match &self.kind {
            RuleKind::FixedBins { width, .. } if *width <= 0 => {
                Err(ConfigError::BadBinWidth { column, width: *width })
            }
            RuleKind::Edges { edges, labels, .. } => {
                if edges.len() < 2 {
                    return Err(ConfigError::LabelCount {
                        column,
                        labels: labels.len(),
                        bins: 0,
                    });
                }
                if edges.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(ConfigError::UnsortedEdges { column });
                }
                let bins = self.bin_count().unwrap_or_default();
                if labels.len() != bins {
                    return Err(ConfigError::LabelCount {
                        column,
                        labels: labels.len(),
                        bins,
                    });
                }
                Ok(())
            }
            RuleKind::TopN { n: 0 } => Err(ConfigError::ZeroTopN { column }),
            RuleKind::MultiValue { delimiter, .. } if delimiter.is_empty() => {
                Err(ConfigError::EmptyDelimiter { column })
            }
            _ => Ok(()),
        }
    }
}

fn on_unmatched(unmatched: Unmatched, text: String) -> Class {
    match unmatched {
        Unmatched::Fallback => Class::Fallback,
        Unmatched::Discard => Class::Discard,
        Unmatched::Keep => Class::Label(text),
    }
}

fn classify_multi(raw: &CellValue, delimiter: &str, categories: &[String], fallback: &str) -> Class {
    let Some(text) = raw.as_text() else {
        return Class::Labels(Vec::new());
    };
    let tokens: Vec<&str> = text
        .split(delimiter)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let mut hits: Vec<String> = Vec::new();
    for token in &tokens {
        if categories.iter().any(|c| c == token) && !hits.iter().any(|h| h == token) {
            hits.push(token.to_string());
        }
    }
    if hits.is_empty() && !tokens.is_empty() {
        hits.push(fallback.to_string());
    }
    Class::Labels(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn keyword_rule() -> NormalizationRule {
        NormalizationRule::new(RuleKind::Keyword {
            keywords: vec![
                ("direito imob".into(), "Direito Imobiliário".into()),
                ("direito".into(), "Direito".into()),
                ("administração".into(), "Administração".into()),
                ("adm".into(), "Administração".into()),
            ],
            discard: vec!["não".into()],
            discard_exact: vec!["n".into(), "99".into()],
            unmatched: Unmatched::Fallback,
        })
    }

    #[test]
    fn keyword_folds_accents_and_respects_order() {
        let rule = keyword_rule();
        assert_eq!(rule.classify(&text("ADMINISTRACAO")), Class::Label("Administração".into()));
        assert_eq!(
            rule.classify(&text("Pós em Direito Imobiliário")),
            Class::Label("Direito Imobiliário".into())
        );
        assert_eq!(rule.classify(&text("direito civil")), Class::Label("Direito".into()));
        assert_eq!(rule.classify(&text("Biologia")), Class::Fallback);
    }

    #[test]
    fn keyword_tables_fold_once_and_stay_out_of_equality() {
        let rule = keyword_rule();
        assert!(rule.folded.0.get().is_none());
        assert_eq!(rule.classify(&text("adm")), Class::Label("Administração".into()));

        let tables = rule.folded.0.get().unwrap();
        assert_eq!(tables.needles[2], "administracao");
        assert_eq!(tables.discard, vec!["nao"]);
        assert_eq!(rule, keyword_rule());

        // A clone carries the folded tables along.
        assert!(rule.clone().folded.0.get().is_some());
    }

    #[test]
    fn keyword_discards() {
        let rule = keyword_rule();
        assert_eq!(rule.classify(&text("Nao possui")), Class::Discard);
        assert_eq!(rule.classify(&text("N")), Class::Discard);
        assert_eq!(rule.classify(&CellValue::Integer(99)), Class::Discard);
        assert_eq!(rule.classify(&CellValue::Null), Class::Fallback);
    }

    #[test]
    fn exact_unmatched_policies() {
        let map: BTreeMap<String, String> =
            [("Africano".to_string(), "Negro".to_string())].into_iter().collect();
        let keep = NormalizationRule::new(RuleKind::Exact {
            map: map.clone(),
            unmatched: Unmatched::Keep,
        });
        assert_eq!(keep.classify(&text("Africano")), Class::Label("Negro".into()));
        assert_eq!(keep.classify(&text("Pardo ")), Class::Label("Pardo".into()));

        let drop = NormalizationRule::new(RuleKind::Exact {
            map,
            unmatched: Unmatched::Discard,
        });
        assert_eq!(drop.classify(&text("Pardo")), Class::Discard);
    }

    #[test]
    fn fixed_bins() {
        let rule = NormalizationRule::new(RuleKind::FixedBins { start: 20, width: 10 });
        assert_eq!(rule.classify(&CellValue::Integer(20)), Class::Bin(0));
        assert_eq!(rule.classify(&CellValue::Integer(29)), Class::Bin(0));
        assert_eq!(rule.classify(&CellValue::Float(30.0)), Class::Bin(1));
        assert_eq!(rule.classify(&CellValue::Integer(19)), Class::Discard);
        assert_eq!(rule.classify(&text("vinte")), Class::Discard);
        assert_eq!(rule.classify(&CellValue::Null), Class::Discard);
        assert_eq!(rule.bin_label(2), "40-49");
    }

    #[test]
    fn fixed_bins_drop_far_outliers() {
        let rule = NormalizationRule::new(RuleKind::FixedBins { start: 20, width: 10 });
        assert_eq!(rule.bin_index(20.0 + 10.0 * (MAX_FIXED_BINS as f64 - 1.0)), Some(MAX_FIXED_BINS - 1));
        assert_eq!(rule.bin_index(20.0 + 10.0 * MAX_FIXED_BINS as f64), None);
        assert_eq!(rule.classify(&CellValue::Float(1e300)), Class::Discard);
        assert_eq!(rule.classify(&CellValue::Integer(i64::MAX)), Class::Discard);

        let wide = NormalizationRule::new(RuleKind::FixedBins { start: i64::MAX - 5, width: i64::MAX });
        assert_eq!(wide.bin_label(3), format!("{}-{}", i64::MAX, i64::MAX));
    }

    #[test]
    fn edges_are_right_closed() {
        let rule = NormalizationRule::new(RuleKind::Edges {
            edges: vec![0.0, 5.0, 10.0, 15.0],
            open_ended: true,
            labels: vec!["01 a 05".into(), "06 a 10".into(), "11 a 15".into(), "mais de 16".into()],
        });
        assert_eq!(rule.bin_count(), Some(4));
        assert_eq!(rule.bin_index(0.0), None);
        assert_eq!(rule.bin_index(5.0), Some(0));
        assert_eq!(rule.bin_index(6.0), Some(1));
        assert_eq!(rule.bin_index(15.0), Some(2));
        assert_eq!(rule.bin_index(400.0), Some(3));
        assert_eq!(rule.bin_label(3), "mais de 16");
        assert!(rule.validate("PERG.44").is_ok());
    }

    #[test]
    fn multi_value_hits_and_fallback() {
        let rule = NormalizationRule::new(RuleKind::MultiValue {
            delimiter: ",".into(),
            categories: vec!["OLX".into(), "ZAP".into()],
        });
        assert_eq!(
            rule.classify(&text("OLX, ZAP, OLX")),
            Class::Labels(vec!["OLX".into(), "ZAP".into()])
        );
        assert_eq!(rule.classify(&text("Facebook")), Class::Labels(vec!["Outros".into()]));
        assert_eq!(rule.classify(&CellValue::Null), Class::Labels(Vec::new()));
    }

    #[test]
    fn validation_rejects_bad_rules() {
        let rule = NormalizationRule::new(RuleKind::FixedBins { start: 0, width: 0 });
        assert_eq!(
            rule.validate("c"),
            Err(ConfigError::BadBinWidth { column: "c".into(), width: 0 })
        );

        let rule = NormalizationRule::new(RuleKind::Edges {
            edges: vec![0.0, 10.0, 5.0],
            open_ended: false,
            labels: vec!["a".into(), "b".into()],
        });
        assert_eq!(rule.validate("c"), Err(ConfigError::UnsortedEdges { column: "c".into() }));

        let rule = NormalizationRule::new(RuleKind::Edges {
            edges: vec![0.0, 10.0],
            open_ended: true,
            labels: vec!["a".into()],
        });
        assert_eq!(
            rule.validate("c"),
            Err(ConfigError::LabelCount { column: "c".into(), labels: 1, bins: 2 })
        );
    }

    #[test]
    fn rule_from_json() {
        let rule: NormalizationRule = serde_json::from_str(
            r#"{ "kind": "keyword", "keywords": [["adm", "Administração"]], "unmatched": "discard" }"#,
        )
        .unwrap();
        assert_eq!(rule.fallback, "Outros");
        assert_eq!(rule.missing_policy(), MissingPolicy::Fallback);
        assert_eq!(rule.classify(&CellValue::Text("Adm.".into())), Class::Label("Administração".into()));
        assert_eq!(rule.classify(&CellValue::Text("Letras".into())), Class::Discard);
    }
}
