use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::{Dataset, Row};
use super::regions::Region;

// ---------------------------------------------------------------------------
// Filter dimensions
// ---------------------------------------------------------------------------

/// Capital / interior split (stored in the locality column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locality {
    #[default]
    Both,
    Capital,
    Interior,
}

impl Locality {
    /// Value expected in the locality column, `None` for no restriction.
    pub fn column_value(self) -> Option<&'static str> {
        match self {
            Locality::Both => None,
            Locality::Capital => Some("Capital"),
            Locality::Interior => Some("Interior"),
        }
    }
}

impl FromStr for Locality {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "both" | "ambos" => Ok(Locality::Both),
            "capital" => Ok(Locality::Capital),
            "interior" => Ok(Locality::Interior),
            other => anyhow::bail!("Unknown locality: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn column_value(self) -> &'static str {
        match self {
            Sex::Male => "Masculino",
            Sex::Female => "Feminino",
        }
    }
}

impl FromStr for Sex {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "masculino" => Ok(Sex::Male),
            "f" | "female" | "feminino" => Ok(Sex::Female),
            other => anyhow::bail!("Unknown sex: {other}"),
        }
    }
}

/// Age restriction used by some pages. The two bands are strict on both
/// sides: an age of exactly 35 only matches `All`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBand {
    #[default]
    All,
    Under35,
    Over35,
}

impl AgeBand {
    pub fn contains(self, age: f64) -> bool {
        match self {
            AgeBand::All => true,
            AgeBand::Under35 => age < 35.0,
            AgeBand::Over35 => age > 35.0,
        }
    }
}

impl FromStr for AgeBand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "todos" => Ok(AgeBand::All),
            "under35" => Ok(AgeBand::Under35),
            "over35" => Ok(AgeBand::Over35),
            other => anyhow::bail!("Unknown age band: {other}"),
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgeBand::All => "Todos",
            AgeBand::Under35 => "Menos de 35 anos",
            AgeBand::Over35 => "Mais de 35 anos",
        };
        f.write_str(s)
    }
}

/// Which question code holds each filtered attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyColumns {
    pub state: String,
    pub locality: String,
    pub education: String,
    pub sex: String,
    pub age: String,
}

impl Default for SurveyColumns {
    fn default() -> Self {
        Self {
            state: "PERG.6".into(),
            locality: "PERG.7".into(),
            education: "PERG.16".into(),
            sex: "PERG.9".into(),
            age: "PERG.5".into(),
        }
    }
}

/// Which optional dimensions a page exposes. State filtering is always on;
/// a disabled dimension never restricts rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDimensions {
    pub locality: bool,
    pub education: bool,
    pub sex: bool,
    pub age_band: bool,
}

impl Default for FilterDimensions {
    fn default() -> Self {
        Self {
            locality: true,
            education: true,
            sex: true,
            age_band: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter selection: the operator's current choices
// ---------------------------------------------------------------------------

/// Current filter choices of one session. Owned by the caller and handed
/// to [`FilterState`] by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    /// `None` is the unselected placeholder.
    pub region: Option<Region>,
    pub states: BTreeSet<String>,
    pub locality: Locality,
    /// Empty until synchronized against the data.
    pub education: BTreeSet<String>,
    pub sex: BTreeSet<Sex>,
    pub age_band: AgeBand,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            region: None,
            states: BTreeSet::new(),
            locality: Locality::Both,
            education: BTreeSet::new(),
            sex: Sex::ALL.into_iter().collect(),
            age_band: AgeBand::All,
        }
    }
}

impl FilterSelection {
    /// Whether enough has been chosen to show any data.
    pub fn is_ready(&self) -> bool {
        self.region.is_some() && !self.states.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FilterState: cascading rules over a selection
// ---------------------------------------------------------------------------

/// Cascading filter engine for one page. Holds only borrowed, read-only
/// context; all mutable state lives in the [`FilterSelection`].
#[derive(Debug, Clone, Copy)]
pub struct FilterState<'a> {
    dataset: &'a Dataset,
    columns: &'a SurveyColumns,
    dimensions: FilterDimensions,
}

impl<'a> FilterState<'a> {
    pub fn new(dataset: &'a Dataset, columns: &'a SurveyColumns, dimensions: FilterDimensions) -> Self {
        Self {
            dataset,
            columns,
            dimensions,
        }
    }

    /// Legal state options for the selection's current region.
    pub fn state_options(&self, sel: &FilterSelection) -> BTreeSet<String> {
        match sel.region {
            Some(region) => region.state_options(self.dataset, &self.columns.state),
            None => BTreeSet::new(),
        }
    }

    /// Choose a region and return the new state options.
    ///
    /// A change of region resets the state selection to every option of
    /// the new region, or to `override_states` (restricted to the options)
    /// when given. Re-selecting the current region keeps the states.
    pub fn set_region(
        &self,
        sel: &mut FilterSelection,
        region: Option<Region>,
        override_states: Option<&BTreeSet<String>>,
    ) -> BTreeSet<String> {
        let previous = sel.region;
        sel.region = region;
        let options = self.state_options(sel);

        if region != previous {
            sel.states = match override_states {
                Some(wanted) => wanted.intersection(&options).cloned().collect(),
                None => options.clone(),
            };
            log::debug!(
                "region {} -> {}: {} states selected",
                previous.map_or("none", |r| r.label()),
                region.map_or("none", |r| r.label()),
                sel.states.len()
            );
            self.sync_education(sel);
        }
        options
    }

    /// Replace the state selection. An empty selection is ignored.
    pub fn set_states(&self, sel: &mut FilterSelection, selection: &BTreeSet<String>) {
        if selection.is_empty() {
            log::debug!("ignoring empty state selection");
            return;
        }
        let options = self.state_options(sel);
        let accepted: BTreeSet<String> = selection.intersection(&options).cloned().collect();
        if accepted.is_empty() {
            log::debug!("no selected state belongs to the current region; keeping previous");
            return;
        }
        sel.states = accepted;
        self.sync_education(sel);
    }

    pub fn set_locality(&self, sel: &mut FilterSelection, locality: Locality) {
        sel.locality = locality;
        self.sync_education(sel);
    }

    /// Replace the sex selection. An empty selection is ignored.
    pub fn set_sex(&self, sel: &mut FilterSelection, selection: &BTreeSet<Sex>) {
        if selection.is_empty() {
            log::debug!("ignoring empty sex selection");
            return;
        }
        sel.sex = selection.clone();
    }

    pub fn set_age_band(&self, sel: &mut FilterSelection, band: AgeBand) {
        sel.age_band = band;
    }

    /// Distinct education answers among rows passing the state and
    /// locality filters.
    pub fn education_options(&self, sel: &FilterSelection) -> BTreeSet<String> {
        if sel.states.is_empty() {
            return BTreeSet::new();
        }
        self.dataset
            .rows
            .iter()
            .filter(|row| self.state_matches(sel, row) && self.locality_matches(sel, row))
            .filter_map(|row| row.text(&self.columns.education))
            .collect()
    }

    /// Replace the education selection and return the legal options.
    ///
    /// The stored selection is first reset to all legal options when it is
    /// empty or holds values that are no longer possible. A non-empty
    /// `selection` then replaces it, restricted to the legal options.
    pub fn set_education(&self, sel: &mut FilterSelection, selection: &BTreeSet<String>) -> BTreeSet<String> {
        let options = self.sync_education(sel);
        let accepted: BTreeSet<String> = selection.intersection(&options).cloned().collect();
        if accepted.is_empty() {
            log::debug!("ignoring empty education selection");
        } else {
            sel.education = accepted;
        }
        options
    }

    /// Re-check the stored education selection against the options implied
    /// by the upstream filters.
    pub fn sync_education(&self, sel: &mut FilterSelection) -> BTreeSet<String> {
        let options = self.education_options(sel);
        if sel.education.is_empty() || !sel.education.is_subset(&options) {
            log::debug!("education selection reset to {} options", options.len());
            sel.education = options.clone();
        }
        options
    }

    /// Indices of rows passing every active filter.
    pub fn apply_indices(&self, sel: &FilterSelection) -> Vec<usize> {
        if sel.states.is_empty() {
            return Vec::new();
        }
        self.dataset
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches(sel, row))
            .map(|(i, _)| i)
            .collect()
    }

    /// Rows passing every active filter, in dataset order.
    pub fn apply(&self, sel: &FilterSelection) -> Vec<&'a Row> {
        let dataset = self.dataset;
        self.apply_indices(sel)
            .into_iter()
            .map(|i| &dataset.rows[i])
            .collect()
    }

    /// Conjunction of the predicates, evaluated in a fixed order:
    /// state, locality, education, sex, age band.
    fn matches(&self, sel: &FilterSelection, row: &Row) -> bool {
        self.state_matches(sel, row)
            && self.locality_matches(sel, row)
            && self.education_matches(sel, row)
            && self.sex_matches(sel, row)
            && self.age_matches(sel, row)
    }

    fn state_matches(&self, sel: &FilterSelection, row: &Row) -> bool {
        row.text(&self.columns.state)
            .is_some_and(|s| sel.states.contains(&s))
    }

    fn locality_matches(&self, sel: &FilterSelection, row: &Row) -> bool {
        if !self.dimensions.locality {
            return true;
        }
        match sel.locality.column_value() {
            None => true,
            Some(wanted) => row.text(&self.columns.locality).as_deref() == Some(wanted),
        }
    }

    fn education_matches(&self, sel: &FilterSelection, row: &Row) -> bool {
        if !self.dimensions.education {
            return true;
        }
        row.text(&self.columns.education)
            .is_some_and(|e| sel.education.contains(&e))
    }

    fn sex_matches(&self, sel: &FilterSelection, row: &Row) -> bool {
        if !self.dimensions.sex {
            return true;
        }
        match row.text(&self.columns.sex) {
            Some(value) => sel.sex.iter().any(|s| s.column_value() == value),
            None => false,
        }
    }

    fn age_matches(&self, sel: &FilterSelection, row: &Row) -> bool {
        if !self.dimensions.age_band || sel.age_band == AgeBand::All {
            return true;
        }
        row.number(&self.columns.age)
            .is_some_and(|age| sel.age_band.contains(age))
    }
}
