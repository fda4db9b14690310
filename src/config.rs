use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::{FilterDimensions, SurveyColumns};
use crate::error::ConfigError;
use crate::stats::rules::NormalizationRule;

const BUILTIN_PAGES: &str = include_str!("../config/builtin_pages.json");

// ---------------------------------------------------------------------------
// Panel configuration: pages, charts and their normalization rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Bar,
    Donut,
}

/// One chart: which question it shows and how answers are bucketed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub column: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub chart: ChartKind,
    pub rule: NormalizationRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub dimensions: FilterDimensions,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

/// Everything the dashboard needs besides the data itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub columns: SurveyColumns,
    pub pages: Vec<PageConfig>,
}

impl PanelConfig {
    /// The stock pages of the broker survey.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_PAGES).context("parsing built-in page configuration")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("loading config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: PanelConfig = serde_json::from_str(text).context("parsing JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could only produce nonsense charts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for page in &self.pages {
            if page.id.trim().is_empty() {
                return Err(ConfigError::EmptyPageId);
            }
            if !seen.insert(page.id.as_str()) {
                return Err(ConfigError::DuplicatePage(page.id.clone()));
            }
            for chart in &page.charts {
                if chart.column.trim().is_empty() {
                    return Err(ConfigError::EmptyColumn {
                        page: page.id.clone(),
                    });
                }
                chart.rule.validate(&chart.column)?;
            }
        }
        Ok(())
    }

    pub fn page(&self, id: &str) -> Option<&PageConfig> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn page_ids(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::rules::RuleKind;

    #[test]
    fn builtin_pages_load() {
        let config = PanelConfig::builtin().unwrap();
        assert_eq!(
            config.page_ids(),
            vec![
                "perfil",
                "etnia-profissao",
                "graduacao",
                "idiomas",
                "imoveis-de-banco",
                "quantos-imoveis",
                "portais"
            ]
        );
        assert_eq!(config.columns, SurveyColumns::default());

        let perfil = config.page("perfil").unwrap();
        assert!(!perfil.dimensions.age_band);
        assert_eq!(perfil.charts[0].rule.kind, RuleKind::FixedBins { start: 20, width: 10 });
        assert_eq!(perfil.charts[1].chart, ChartKind::Donut);

        let sales = &config.page("quantos-imoveis").unwrap().charts[1];
        assert_eq!(sales.rule.bin_count(), Some(4));
    }

    #[test]
    fn duplicate_pages_are_rejected() {
        let json = r#"{ "pages": [ { "id": "a" }, { "id": "a" } ] }"#;
        let err = PanelConfig::from_json(json).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::DuplicatePage("a".into()))
        );
    }

    #[test]
    fn bad_rules_are_rejected() {
        let json = r#"{ "pages": [ { "id": "a", "charts": [
            { "column": "PERG.5", "rule": { "kind": "fixed_bins", "start": 20, "width": -1 } }
        ] } ] }"#;
        let err = PanelConfig::from_json(json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::BadBinWidth { width: -1, .. })
        ));
    }

    #[test]
    fn config_round_trips() {
        let config = PanelConfig::builtin().unwrap();
        let text = serde_json::to_string(&config).unwrap();
        let again = PanelConfig::from_json(&text).unwrap();
        assert_eq!(config, again);
    }
}
