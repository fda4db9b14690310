use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::{ChartKind, PageConfig, PanelConfig};
use crate::data::filter::{AgeBand, FilterSelection, FilterState, Locality, Sex};
use crate::data::model::Dataset;
use crate::data::regions::Region;
use crate::stats::aggregate::{aggregate, Distribution};

/// Shown instead of charts until a region with at least one state is chosen.
pub const AWAITING_FILTERS_MESSAGE: &str = "Selecione os filtros para visualizar os dados.";

// ---------------------------------------------------------------------------
// Rendered output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub column: String,
    pub title: String,
    pub chart: ChartKind,
    pub distribution: Distribution,
}

/// What one page shows for the current selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageView {
    AwaitingFilters {
        page: String,
        message: String,
    },
    Ready {
        page: String,
        title: String,
        responses: usize,
        charts: Vec<ChartView>,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One operator's view: shared read-only data plus their own selection.
pub struct Session {
    dataset: Arc<Dataset>,
    config: PanelConfig,
    page: usize,
    selection: FilterSelection,
}

impl Session {
    pub fn new(dataset: Arc<Dataset>, config: PanelConfig) -> Result<Self> {
        if config.pages.is_empty() {
            bail!("configuration has no pages");
        }
        Ok(Self {
            dataset,
            config,
            page: 0,
            selection: FilterSelection::default(),
        })
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn page(&self) -> &PageConfig {
        &self.config.pages[self.page]
    }

    /// Switch page. The selection carries over; education options are
    /// re-checked because pages may use different dimensions.
    pub fn select_page(&mut self, id: &str) -> Result<()> {
        let Some(index) = self.config.pages.iter().position(|p| p.id == id) else {
            bail!(
                "Unknown page: {id} (available: {})",
                self.config.page_ids().join(", ")
            );
        };
        self.page = index;
        let (engine, selection) = self.split();
        engine.sync_education(selection);
        Ok(())
    }

    /// Filter engine for the current page together with the selection it
    /// mutates.
    fn split(&mut self) -> (FilterState<'_>, &mut FilterSelection) {
        let page = &self.config.pages[self.page];
        let engine = FilterState::new(&self.dataset, &self.config.columns, page.dimensions);
        (engine, &mut self.selection)
    }

    fn engine(&self) -> FilterState<'_> {
        FilterState::new(&self.dataset, &self.config.columns, self.page().dimensions)
    }

    pub fn set_region(&mut self, region: Option<Region>) -> BTreeSet<String> {
        let (engine, selection) = self.split();
        engine.set_region(selection, region, None)
    }

    pub fn set_states(&mut self, states: &BTreeSet<String>) {
        let (engine, selection) = self.split();
        engine.set_states(selection, states);
    }

    pub fn set_locality(&mut self, locality: Locality) {
        let (engine, selection) = self.split();
        engine.set_locality(selection, locality);
    }

    pub fn set_education(&mut self, education: &BTreeSet<String>) -> BTreeSet<String> {
        let (engine, selection) = self.split();
        engine.set_education(selection, education)
    }

    pub fn set_sex(&mut self, sex: &BTreeSet<Sex>) {
        let (engine, selection) = self.split();
        engine.set_sex(selection, sex);
    }

    pub fn set_age_band(&mut self, band: AgeBand) {
        let (engine, selection) = self.split();
        engine.set_age_band(selection, band);
    }

    pub fn state_options(&self) -> BTreeSet<String> {
        self.engine().state_options(&self.selection)
    }

    pub fn education_options(&self) -> BTreeSet<String> {
        self.engine().education_options(&self.selection)
    }

    /// Recompute the filtered rows and every chart of the current page.
    pub fn render(&self) -> PageView {
        let page = self.page();
        if !self.selection.is_ready() {
            return PageView::AwaitingFilters {
                page: page.id.clone(),
                message: AWAITING_FILTERS_MESSAGE.to_string(),
            };
        }

        let rows = self.engine().apply(&self.selection);
        let charts = page
            .charts
            .iter()
            .map(|chart| {
                if !self.dataset.has_column(&chart.column) {
                    log::warn!("page {}: column {} not in dataset", page.id, chart.column);
                }
                ChartView {
                    column: chart.column.clone(),
                    title: chart.title.clone(),
                    chart: chart.chart,
                    distribution: aggregate(&rows, &chart.column, &chart.rule),
                }
            })
            .collect();

        log::info!("page {}: {} responses match", page.id, rows.len());
        PageView::Ready {
            page: page.id.clone(),
            title: page.title.clone(),
            responses: rows.len(),
            charts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_csv;

    const CSV: &str = "\
PERG.5,PERG.6,PERG.7,PERG.9,PERG.16
24,Santa Catarina (SC),Capital,Masculino,Superior
33,Santa Catarina (SC),Interior,Feminino,Superior
47,Paraná (PR),Capital,Masculino,Médio
";

    fn session() -> Session {
        let dataset = Arc::new(read_csv(CSV.as_bytes()).unwrap());
        Session::new(dataset, PanelConfig::builtin().unwrap()).unwrap()
    }

    #[test]
    fn awaits_filters_until_region_is_chosen() {
        let s = session();
        assert!(matches!(s.render(), PageView::AwaitingFilters { .. }));
    }

    #[test]
    fn renders_profile_page() {
        let mut s = session();
        s.set_region(Some(Region::Sul));
        s.set_states(&["Santa Catarina (SC)".to_string()].into_iter().collect());

        let PageView::Ready { responses, charts, .. } = s.render() else {
            panic!("expected charts");
        };
        assert_eq!(responses, 2);
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].distribution.labels(), vec!["20-29", "30-39"]);
        assert_eq!(charts[1].distribution.percentage_of("Feminino"), Some(50.0));
    }

    #[test]
    fn unknown_page_is_an_error() {
        let mut s = session();
        assert!(s.select_page("nope").is_err());
        assert!(s.select_page("portais").is_ok());
        assert_eq!(s.page().id, "portais");
    }

    #[test]
    fn selection_survives_page_switch() {
        let mut s = session();
        s.set_region(Some(Region::Sul));
        s.set_locality(Locality::Capital);
        s.select_page("graduacao").unwrap();
        assert_eq!(s.selection().locality, Locality::Capital);
        assert_eq!(s.selection().region, Some(Region::Sul));
        assert_eq!(
            s.education_options(),
            ["Médio".to_string(), "Superior".to_string()].into_iter().collect()
        );
    }
}
