//! Presentation helpers around a finished [`PcaAnalysis`]: a plain-text
//! variance summary and delimited export of the projected data.

use crate::analysis::PcaAnalysis;
use crate::error::Result;
use crate::threshold::VarianceThreshold;
use std::fmt;
use std::io::Write;

/// Number of leading components listed in a [`VarianceReport`].
pub const SUMMARY_TOP_COMPONENTS: usize = 10;

/// Header of the appended label column in exports.
pub const LABEL_COLUMN_HEADER: &str = "label";

/// One row of the summary table.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentLine {
    /// 1-based component number.
    pub component: usize,
    pub variance_percent: f64,
    pub cumulative_percent: f64,
}

/// Text summary of an analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct VarianceReport {
    pub n_features: usize,
    pub n_components: usize,
    pub label_column: Option<String>,
    pub lines: Vec<ComponentLine>,
    pub thresholds: Vec<VarianceThreshold>,
}

impl VarianceReport {
    pub fn from_analysis(analysis: &PcaAnalysis, label_column: Option<&str>) -> Self {
        let lines = analysis
            .explained_variance_ratio()
            .iter()
            .zip(analysis.cumulative_variance().iter())
            .take(SUMMARY_TOP_COMPONENTS)
            .enumerate()
            .map(|(i, (&ratio, &cumulative))| ComponentLine {
                component: i + 1,
                variance_percent: ratio * 100.0,
                cumulative_percent: cumulative * 100.0,
            })
            .collect();

        VarianceReport {
            n_features: analysis.n_features(),
            n_components: analysis.n_components(),
            label_column: label_column.map(str::to_string),
            lines,
            thresholds: analysis.variance_thresholds().to_vec(),
        }
    }
}

impl fmt::Display for VarianceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(56);
        writeln!(f, "Features analysed:     {}", self.n_features)?;
        writeln!(f, "Principal components:  {}", self.n_components)?;
        writeln!(f, "Label column:          {}", self.label_column.as_deref().unwrap_or("none"))?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Leading components by explained variance:")?;
        for line in &self.lines {
            writeln!(
                f,
                "  PC{:<3} {:>7.2}%   cumulative {:>7.2}%",
                line.component, line.variance_percent, line.cumulative_percent
            )?;
        }
        writeln!(f, "{}", rule)?;
        for threshold in &self.thresholds {
            let target = threshold.target * 100.0;
            match threshold.n_components {
                Some(n) => writeln!(f, "Components for {:.0}% variance: {}", target, n)?,
                None => writeln!(
                    f,
                    "Components for {:.0}% variance: not reached with {} components",
                    target, self.n_components
                )?,
            }
        }
        Ok(())
    }
}

/// Writes the projected data as delimited text: a `PC1..PCk` header (plus
/// [`LABEL_COLUMN_HEADER`] when labels are attached) and one row per sample.
pub fn write_projected_delimited<W: Write>(analysis: &PcaAnalysis, writer: W, delimiter: u8) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    let labels = analysis.labels();

    let mut header: Vec<String> = (1..=analysis.n_components()).map(|i| format!("PC{}", i)).collect();
    if labels.is_some() {
        header.push(LABEL_COLUMN_HEADER.to_string());
    }
    wtr.write_record(&header)?;

    for (i, row) in analysis.projected().rows().into_iter().enumerate() {
        let mut record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        if let Some(labels) = labels {
            record.push(labels[i].clone());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
