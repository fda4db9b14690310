use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::session::PageView;

/// Percentages are shown with two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rounded(view: &PageView) -> PageView {
    let mut view = view.clone();
    if let PageView::Ready { charts, .. } = &mut view {
        for chart in charts {
            for share in &mut chart.distribution.entries {
                share.percentage = round2(share.percentage);
            }
        }
    }
    view
}

/// JSON handed to the chart renderer.
pub fn to_json(view: &PageView) -> Result<String> {
    serde_json::to_string_pretty(&rounded(view)).context("serializing page view")
}

/// Plain-text table for terminals.
pub fn write_text<W: Write>(out: &mut W, view: &PageView) -> io::Result<()> {
    match view {
        PageView::AwaitingFilters { page, message } => {
            writeln!(out, "[{page}] {message}")
        }
        PageView::Ready {
            page,
            title,
            responses,
            charts,
        } => {
            writeln!(out, "[{page}] {title} ({responses} responses)")?;
            for chart in charts {
                writeln!(out)?;
                writeln!(out, "{} ({})", chart.title, chart.column)?;
                if chart.distribution.is_empty() {
                    writeln!(out, "  sem dados")?;
                    continue;
                }
                let width = chart
                    .distribution
                    .entries
                    .iter()
                    .map(|s| s.label.chars().count())
                    .max()
                    .unwrap_or(0);
                for share in &chart.distribution.entries {
                    let pad = width - share.label.chars().count();
                    writeln!(
                        out,
                        "  {}{}  {:>6.2}%  ({})",
                        share.label,
                        " ".repeat(pad),
                        share.percentage,
                        share.count
                    )?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartKind;
    use crate::session::ChartView;
    use crate::stats::aggregate::{Distribution, Share};

    fn view() -> PageView {
        PageView::Ready {
            page: "perfil".into(),
            title: "Perfil".into(),
            responses: 3,
            charts: vec![ChartView {
                column: "PERG.9".into(),
                title: "Sexo".into(),
                chart: ChartKind::Donut,
                distribution: Distribution {
                    entries: vec![
                        Share {
                            label: "Masculino".into(),
                            count: 2,
                            percentage: 200.0 / 3.0,
                        },
                        Share {
                            label: "Feminino".into(),
                            count: 1,
                            percentage: 100.0 / 3.0,
                        },
                    ],
                    denominator: 3,
                },
            }],
        }
    }

    #[test]
    fn json_rounds_to_two_decimals() {
        let json = to_json(&view()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "ready");
        let entries = &value["charts"][0]["distribution"]["entries"];
        assert_eq!(entries[0]["percentage"], 66.67);
        assert_eq!(entries[1]["percentage"], 33.33);
        assert_eq!(value["charts"][0]["chart"], "donut");
    }

    #[test]
    fn text_table() {
        let mut out = Vec::new();
        write_text(&mut out, &view()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[perfil] Perfil (3 responses)"));
        assert!(text.contains("Masculino   66.67%  (2)"));
        assert!(text.contains("Feminino    33.33%  (1)"));
    }

    #[test]
    fn awaiting_message() {
        let mut out = Vec::new();
        let view = PageView::AwaitingFilters {
            page: "perfil".into(),
            message: "Selecione".into(),
        };
        write_text(&mut out, &view).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[perfil] Selecione\n");
    }
}
