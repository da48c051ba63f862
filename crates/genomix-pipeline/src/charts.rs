use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use genomix_analysis::{CodonAnalysis, GeneAnalysis, GenomeStatistics};
use svg::node::element::{Line, Rectangle, Text};
use svg::Document;

use crate::PipelineError;

const SVG_WIDTH: f64 = 640.0;
const SVG_HEIGHT: f64 = 400.0;
const PLOT_LEFT: f64 = 70.0;
const PLOT_RIGHT: f64 = 610.0;
const PLOT_TOP: f64 = 60.0;
const PLOT_BOTTOM: f64 = 330.0;

/// Analysis outputs a renderer draws from. Any of them may be missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChartInputs<'a> {
    pub codon: Option<&'a CodonAnalysis>,
    pub gene: Option<&'a GeneAnalysis>,
    pub genome: Option<&'a GenomeStatistics>,
}

pub trait ChartRenderer: Send + Sync {
    /// Render every chart the inputs allow into `out_dir` and return the
    /// written files keyed by chart name.
    fn render(
        &self,
        inputs: &ChartInputs<'_>,
        out_dir: &Path,
    ) -> Result<BTreeMap<String, PathBuf>, PipelineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SvgChartRenderer;

struct Bar {
    label: String,
    value: f64,
    color: &'static str,
}

impl ChartRenderer for SvgChartRenderer {
    fn render(
        &self,
        inputs: &ChartInputs<'_>,
        out_dir: &Path,
    ) -> Result<BTreeMap<String, PathBuf>, PipelineError> {
        let mut charts = Vec::new();

        if let Some(codon) = inputs.codon {
            let bars = codon
                .stop_codons
                .codons
                .iter()
                .map(|(name, count)| Bar {
                    label: name.clone(),
                    value: count.frequency_percent,
                    color: "#dc2626",
                })
                .collect::<Vec<_>>();
            charts.push((
                "stop_codon_frequency",
                bar_chart("Stop codon frequency", "% of stop codons", &bars),
            ));
        }

        if let Some(genome) = inputs.genome {
            let comp = &genome.nucleotide_composition;
            let bars = [
                ("A", comp.a.percentage, "#16a34a"),
                ("T", comp.t.percentage, "#dc2626"),
                ("G", comp.g.percentage, "#ca8a04"),
                ("C", comp.c.percentage, "#2563eb"),
            ]
            .into_iter()
            .map(|(label, value, color)| Bar {
                label: label.to_string(),
                value,
                color,
            })
            .collect::<Vec<_>>();
            charts.push((
                "nucleotide_composition",
                bar_chart("Nucleotide composition", "% of bases", &bars),
            ));
        }

        if let Some(gene) = inputs.gene {
            let dist = &gene.length_distribution;
            if !dist.counts.is_empty() {
                let bars = dist
                    .bins
                    .iter()
                    .zip(&dist.counts)
                    .map(|(start, count)| Bar {
                        label: start.to_string(),
                        value: *count as f64,
                        color: "#7c3aed",
                    })
                    .collect::<Vec<_>>();
                charts.push((
                    "gene_length_distribution",
                    bar_chart("Gene length distribution", "genes", &bars),
                ));
            }
        }

        let mut written = BTreeMap::new();
        if charts.is_empty() {
            return Ok(written);
        }

        std::fs::create_dir_all(out_dir)?;
        for (name, doc) in charts {
            let path = out_dir.join(format!("{name}.svg"));
            std::fs::write(&path, doc.to_string())?;
            tracing::debug!(chart = name, path = %path.display(), "chart written");
            written.insert(name.to_string(), path);
        }
        Ok(written)
    }
}

fn bar_chart(title: &str, y_label: &str, bars: &[Bar]) -> Document {
    let plot_width = PLOT_RIGHT - PLOT_LEFT;
    let plot_height = PLOT_BOTTOM - PLOT_TOP;
    let max_value = bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
    let scale = if max_value > 0.0 { plot_height / max_value } else { 0.0 };

    let mut doc = Document::new()
        .set("viewBox", (0, 0, SVG_WIDTH, SVG_HEIGHT))
        .set("width", SVG_WIDTH)
        .set("height", SVG_HEIGHT)
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", SVG_WIDTH)
                .set("height", SVG_HEIGHT)
                .set("fill", "#ffffff"),
        )
        .add(
            Text::new(title)
                .set("x", SVG_WIDTH / 2.0)
                .set("y", 32)
                .set("text-anchor", "middle")
                .set("font-family", "sans-serif")
                .set("font-size", 18)
                .set("fill", "#111827"),
        )
        .add(
            Text::new(y_label)
                .set("x", 18)
                .set("y", (PLOT_TOP + PLOT_BOTTOM) / 2.0)
                .set("transform", format!("rotate(-90 18 {})", (PLOT_TOP + PLOT_BOTTOM) / 2.0))
                .set("text-anchor", "middle")
                .set("font-family", "sans-serif")
                .set("font-size", 12)
                .set("fill", "#374151"),
        )
        .add(axis(PLOT_LEFT, PLOT_BOTTOM, PLOT_RIGHT, PLOT_BOTTOM))
        .add(axis(PLOT_LEFT, PLOT_TOP, PLOT_LEFT, PLOT_BOTTOM));

    for tick in 0..=4 {
        let value = max_value * f64::from(tick) / 4.0;
        let y = PLOT_BOTTOM - value * scale;
        doc = doc.add(
            Text::new(format!("{value:.1}"))
                .set("x", PLOT_LEFT - 8.0)
                .set("y", y + 4.0)
                .set("text-anchor", "end")
                .set("font-family", "monospace")
                .set("font-size", 11)
                .set("fill", "#6b7280"),
        );
    }

    if bars.is_empty() {
        return doc;
    }
    let slot = plot_width / bars.len() as f64;
    let bar_width = (slot * 0.7).max(1.0);
    // Histograms can have dozens of bins; label every nth one.
    let label_every = bars.len().div_ceil(16).max(1);

    for (i, bar) in bars.iter().enumerate() {
        let height = bar.value * scale;
        let x = PLOT_LEFT + slot * i as f64 + (slot - bar_width) / 2.0;
        doc = doc.add(
            Rectangle::new()
                .set("x", x)
                .set("y", PLOT_BOTTOM - height)
                .set("width", bar_width)
                .set("height", height)
                .set("fill", bar.color),
        );
        if i % label_every == 0 {
            doc = doc.add(
                Text::new(bar.label.clone())
                    .set("x", x + bar_width / 2.0)
                    .set("y", PLOT_BOTTOM + 18.0)
                    .set("text-anchor", "middle")
                    .set("font-family", "monospace")
                    .set("font-size", 11)
                    .set("fill", "#374151"),
            );
        }
    }
    doc
}

fn axis(x1: f64, y1: f64, x2: f64, y2: f64) -> Line {
    Line::new()
        .set("x1", x1)
        .set("y1", y1)
        .set("x2", x2)
        .set("y2", y2)
        .set("stroke", "#111827")
        .set("stroke-width", 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genomix_analysis::{Analyzer, CodonAnalyzer, GenomeAnalyzer};
    use genomix_core::{GenomeRecord, Topology};

    #[test]
    fn test_render_writes_available_charts() {
        let rec = GenomeRecord::new("t", "ATGAAATAGCCCTGAGGGTAAACGT", Topology::Linear);
        let codon = CodonAnalyzer.run(&rec).unwrap();
        let genome = GenomeAnalyzer::default().run(&rec).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let charts = SvgChartRenderer
            .render(
                &ChartInputs {
                    codon: Some(&codon),
                    genome: Some(&genome),
                    gene: None,
                },
                &dir.path().join("job_1"),
            )
            .unwrap();

        let names: Vec<&str> = charts.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["nucleotide_composition", "stop_codon_frequency"]);
        let svg = std::fs::read_to_string(&charts["stop_codon_frequency"]).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Stop codon frequency"));
        assert!(svg.contains("TGA"));
    }

    #[test]
    fn test_render_nothing_without_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("job_2");
        let charts = SvgChartRenderer.render(&ChartInputs::default(), &out).unwrap();
        assert!(charts.is_empty());
        assert!(!out.exists());
    }
}
