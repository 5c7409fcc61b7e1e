//! Batch records and report export
//!
//! Text output is one semicolon-delimited line per batch so campaigns can be
//! appended to and parsed line by line. JSON and Markdown wrap the same
//! records in a timestamped report.

use crate::config::OutputFormat;
use crate::harness::BatchOutcome;
use crate::stats::LoadSummary;
use crate::Result;
use arbor_routing::Algorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Records
// ============================================================================

/// Summary of one (algorithm, traffic, variant, rate) batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub algorithm: Algorithm,
    pub tag: String,
    pub variant: u8,
    pub rate: f64,
    pub failed_edges: usize,
    pub loops: usize,
    pub routed: usize,
    pub node_load: LoadSummary,
    pub edge_load: LoadSummary,
    pub avg_hops: f64,
    pub max_hops: usize,
    pub elapsed_secs: f64,
}

impl BatchRecord {
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        let stats = &outcome.stats;
        Self {
            algorithm: outcome.spec.algorithm,
            tag: outcome.spec.tag.clone(),
            variant: outcome.spec.variant.number(),
            rate: outcome.spec.rate,
            failed_edges: outcome.failed_edges,
            loops: stats.loops,
            routed: stats.routed,
            node_load: stats.node_summary(),
            edge_load: stats.edge_summary(),
            avg_hops: stats.average_hops(),
            max_hops: stats.max_hops,
            elapsed_secs: outcome.elapsed.as_secs_f64(),
        }
    }

    /// Semicolon-delimited line; edge load omits the second maximum and p99.95
    pub fn to_line(&self) -> String {
        let n = &self.node_load;
        let e = &self.edge_load;
        let fields: Vec<String> = vec![
            self.algorithm.name().to_string(),
            self.tag.clone(),
            self.variant.to_string(),
            self.rate.to_string(),
            self.failed_edges.to_string(),
            self.loops.to_string(),
            n.max.to_string(),
            n.second.to_string(),
            n.p9999.to_string(),
            n.p9995.to_string(),
            n.p999.to_string(),
            n.p99.to_string(),
            n.p95.to_string(),
            n.p90.to_string(),
            n.p50.to_string(),
            n.p10.to_string(),
            n.mean.to_string(),
            e.max.to_string(),
            e.p9999.to_string(),
            e.p999.to_string(),
            e.p99.to_string(),
            e.p95.to_string(),
            e.p90.to_string(),
            e.p50.to_string(),
            e.p10.to_string(),
            e.mean.to_string(),
            self.avg_hops.to_string(),
            self.max_hops.to_string(),
            self.elapsed_secs.to_string(),
        ];
        fields.join(";")
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimReport {
    pub generated_at: DateTime<Utc>,
    pub fan_out: usize,
    pub trees: usize,
    pub records: Vec<BatchRecord>,
}

impl SimReport {
    pub fn new(fan_out: usize, trees: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            fan_out,
            trees,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: BatchRecord) {
        self.records.push(record);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_text(&self) -> String {
        self.records
            .iter()
            .map(|r| r.to_line() + "\n")
            .collect()
    }

    /// Export as Markdown summary
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Fabric Simulation Report\n\n");
        md.push_str(&format!(
            "**Date:** {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        md.push_str(&format!("**Fan-out:** {}\n", self.fan_out));
        md.push_str(&format!("**Trees:** {}\n\n", self.trees));

        md.push_str("| Algorithm | Tag | Variant | Rate | Failed | Loops | Node max | Node p99 | Edge max | Edge p99 | Edge mean | Avg hops | Max hops | Time (s) |\n");
        md.push_str("|-----------|-----|---------|------|--------|-------|----------|----------|----------|----------|-----------|----------|----------|----------|\n");
        for r in &self.records {
            md.push_str(&format!(
                "| {} | {} | {} | {:.3} | {} | {} | {:.1} | {:.1} | {:.1} | {:.1} | {:.3} | {:.3} | {} | {:.3} |\n",
                r.algorithm,
                r.tag,
                r.variant,
                r.rate,
                r.failed_edges,
                r.loops,
                r.node_load.max,
                r.node_load.p99,
                r.edge_load.max,
                r.edge_load.p99,
                r.edge_load.mean,
                r.avg_hops,
                r.max_hops,
                r.elapsed_secs,
            ));
        }

        let looping: usize = self.records.iter().map(|r| r.loops).sum();
        let routed: usize = self.records.iter().map(|r| r.routed).sum();
        if routed > 0 {
            md.push_str(&format!(
                "\n{} of {} queries looped ({:.2}%)\n",
                looping,
                routed,
                looping as f64 / routed as f64 * 100.0
            ));
        }
        md
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.to_text()),
            OutputFormat::Json => self.to_json(),
            OutputFormat::Markdown => Ok(self.to_markdown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BatchRecord {
        BatchRecord {
            algorithm: Algorithm::SquareOne,
            tag: "A2O".to_string(),
            variant: 2,
            rate: 0.5,
            failed_edges: 5,
            loops: 1,
            routed: 7,
            node_load: LoadSummary {
                max: 7.0,
                second: 4.0,
                mean: 1.5,
                ..Default::default()
            },
            edge_load: LoadSummary {
                max: 4.0,
                mean: 0.75,
                ..Default::default()
            },
            avg_hops: 3.5,
            max_hops: 6,
            elapsed_secs: 0.25,
        }
    }

    #[test]
    fn test_line_field_order() {
        let line = record().to_line();
        let fields: Vec<&str> = line.split(';').collect();
        assert_eq!(fields.len(), 29);
        assert_eq!(&fields[..6], &["sq1", "A2O", "2", "0.5", "5", "1"]);
        assert_eq!(fields[6], "7");
        assert_eq!(fields[7], "4");
        assert_eq!(fields[16], "1.5");
        assert_eq!(fields[17], "4");
        assert_eq!(fields[25], "0.75");
        assert_eq!(&fields[26..], &["3.5", "6", "0.25"]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut report = SimReport::new(4, 2);
        report.push(record());
        let json = report.render(OutputFormat::Json).unwrap();
        let parsed: SimReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.records, report.records);
        assert_eq!(parsed.generated_at, report.generated_at);
        assert!(json.contains("\"algorithm\": \"sq1\""));
    }

    #[test]
    fn test_markdown_and_text() {
        let mut report = SimReport::new(4, 2);
        report.push(record());
        report.push(record());

        let md = report.to_markdown();
        assert!(md.contains("# Fabric Simulation Report"));
        assert!(md.contains("| sq1 | A2O | 2 |"));
        assert!(md.contains("2 of 14 queries looped"));

        let text = report.render(OutputFormat::Text).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
