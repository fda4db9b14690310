use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use survey_panel::config::PanelConfig;
use survey_panel::data::filter::{AgeBand, Locality, Sex};
use survey_panel::data::loader;
use survey_panel::data::regions::{Region, UNSELECTED_LABEL};
use survey_panel::report;
use survey_panel::session::Session;

/// Filter a survey and print the chart tables of one dashboard page.
#[derive(Parser, Debug)]
#[command(name = "survey-panel", version, about, long_about = None)]
struct Cli {
    /// Survey responses (.csv or .json)
    #[arg(required_unless_present = "list_pages")]
    data: Option<PathBuf>,

    /// Page/rule configuration (default: built-in pages)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Page to render (default: first page)
    #[arg(long)]
    page: Option<String>,

    /// Brasil, Centro-Oeste, Nordeste, Norte, Sudeste or Sul
    #[arg(long)]
    region: Option<String>,

    /// Restrict to these states of the region
    #[arg(long, value_delimiter = ';')]
    states: Vec<String>,

    /// Both, Capital or Interior
    #[arg(long)]
    locality: Option<Locality>,

    /// Restrict to these education levels
    #[arg(long, value_delimiter = ';')]
    education: Vec<String>,

    /// Masculino and/or Feminino
    #[arg(long, value_delimiter = ',')]
    sex: Vec<Sex>,

    /// all, under35 or over35
    #[arg(long)]
    age: Option<AgeBand>,

    /// Print a table instead of JSON
    #[arg(long)]
    text: bool,

    /// Print the page ids and exit
    #[arg(long)]
    list_pages: bool,
}

impl Cli {
    /// The region placeholder label means "nothing chosen yet".
    fn region(&self) -> Result<Option<Region>> {
        match self.region.as_deref().map(str::trim) {
            None | Some(UNSELECTED_LABEL) => Ok(None),
            Some(name) => Ok(Some(name.parse()?)),
        }
    }
}

fn to_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PanelConfig::from_path(path)?,
        None => PanelConfig::builtin()?,
    };

    if cli.list_pages {
        for page in &config.pages {
            println!("{}\t{}", page.id, page.title);
        }
        return Ok(());
    }

    let data = cli.data.as_ref().context("missing data file")?;
    let dataset = loader::load_cached(data, &config.columns)?;

    let mut session = Session::new(dataset, config)?;
    if let Some(page) = &cli.page {
        session.select_page(page)?;
    }

    // Same order as the sidebar: each step narrows the options of the next.
    session.set_region(cli.region()?);
    session.set_states(&to_set(&cli.states));
    if let Some(locality) = cli.locality {
        session.set_locality(locality);
    }
    if let Some(age) = cli.age {
        session.set_age_band(age);
    }
    session.set_education(&to_set(&cli.education));
    session.set_sex(&cli.sex.iter().copied().collect());

    let view = session.render();
    if cli.text {
        report::write_text(&mut io::stdout().lock(), &view).context("writing report")?;
    } else {
        println!("{}", report::to_json(&view)?);
    }
    Ok(())
}
