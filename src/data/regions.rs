use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::Dataset;

/// Placeholder shown by the region selector before anything is chosen.
pub const UNSELECTED_LABEL: &str = "Selecione uma opção";

/// A region of the country. `Brasil` is the sentinel meaning "every state
/// present in the data".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    Brasil,
    #[serde(rename = "Centro-Oeste")]
    CentroOeste,
    Nordeste,
    Norte,
    Sudeste,
    Sul,
}

impl Region {
    /// Selector order.
    pub const ALL: [Region; 6] = [
        Region::Brasil,
        Region::CentroOeste,
        Region::Nordeste,
        Region::Norte,
        Region::Sudeste,
        Region::Sul,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Region::Brasil => "Brasil",
            Region::CentroOeste => "Centro-Oeste",
            Region::Nordeste => "Nordeste",
            Region::Norte => "Norte",
            Region::Sudeste => "Sudeste",
            Region::Sul => "Sul",
        }
    }

    /// Fixed state list; empty for the `Brasil` sentinel.
    pub fn fixed_states(self) -> &'static [&'static str] {
        match self {
            Region::Brasil => &[],
            Region::CentroOeste => &[
                "Goiás (GO)",
                "Mato Grosso (MT)",
                "Mato Grosso do Sul (MS)",
                "Distrito Federal (DF)",
            ],
            Region::Nordeste => &[
                "Alagoas (AL)",
                "Bahia (BA)",
                "Ceará (CE)",
                "Maranhão (MA)",
                "Paraíba (PB)",
                "Pernambuco (PE)",
                "Piauí (PI)",
                "Rio Grande do Norte (RN)",
                "Sergipe (SE)",
            ],
            Region::Norte => &[
                "Acre (AC)",
                "Amapá (AP)",
                "Amazonas (AM)",
                "Pará (PA)",
                "Rondônia (RO)",
                "Roraima (RR)",
                "Tocantins (TO)",
            ],
            Region::Sudeste => &[
                "Espírito Santo (ES)",
                "Minas Gerais (MG)",
                "Rio de Janeiro (RJ)",
                "São Paulo (SP)",
            ],
            Region::Sul => &["Paraná (PR)", "Rio Grande do Sul (RS)", "Santa Catarina (SC)"],
        }
    }

    /// State options for this region. The sentinel reads the distinct
    /// values of `state_column` from the dataset.
    pub fn state_options(self, dataset: &Dataset, state_column: &str) -> BTreeSet<String> {
        match self {
            Region::Brasil => dataset.distinct_text(state_column),
            other => other.fixed_states().iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Region::ALL
            .into_iter()
            .find(|r| r.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow::anyhow!("Unknown region: {wanted}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, Row};

    #[test]
    fn region_table_sizes() {
        assert_eq!(Region::CentroOeste.fixed_states().len(), 4);
        assert_eq!(Region::Nordeste.fixed_states().len(), 9);
        assert_eq!(Region::Norte.fixed_states().len(), 7);
        assert_eq!(Region::Sudeste.fixed_states().len(), 4);
        assert_eq!(Region::Sul.fixed_states().len(), 3);
        let total: usize = Region::ALL.iter().map(|r| r.fixed_states().len()).sum();
        assert_eq!(total, 27);
    }

    #[test]
    fn brasil_reads_states_from_data() {
        let ds = Dataset::from_rows(vec![
            Row::new().with("PERG.6", CellValue::Text("São Paulo (SP)".into())),
            Row::new().with("PERG.6", CellValue::Text("Bahia (BA)".into())),
            Row::new().with("PERG.6", CellValue::Null),
        ]);
        let opts: Vec<String> = Region::Brasil.state_options(&ds, "PERG.6").into_iter().collect();
        assert_eq!(opts, vec!["Bahia (BA)", "São Paulo (SP)"]);
    }

    #[test]
    fn parse_region_labels() {
        assert_eq!("centro-oeste".parse::<Region>().unwrap(), Region::CentroOeste);
        assert_eq!("Sul".parse::<Region>().unwrap(), Region::Sul);
        assert!("Atlantis".parse::<Region>().is_err());
    }
}
