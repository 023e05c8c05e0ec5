//! Output formatting for CLI commands

use serde::Serialize;

use crate::ingest::IngestReport;
use crate::storage;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => OutputFormat::Text,
            storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text => {
                // Text callers format their own output; this is the fallback
                if let Ok(json) = serde_json::to_string_pretty(data) {
                    println!("{}", json);
                }
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(data) {
                    println!("{}", json);
                }
            }
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Summarizes what normalization compromised on
    pub fn ingest_report(&self, report: &IngestReport, action: &str) {
        if self.is_json() {
            self.data(&serde_json::json!({
                "success": true,
                "action": action,
                "report": report,
            }));
            return;
        }

        println!("{} ({} input)", action, report.shape);
        if report.is_clean() {
            return;
        }

        if let Some(subject) = &report.fallback_subject {
            println!("  fallback subject: {}", subject);
        }
        let lines = [
            ("synthesized topics", report.synthesized_topics.len()),
            ("rejected parent links", report.rejected_parents.len()),
            ("dropped relations", report.dropped_relations.len()),
            ("dropped skill-bits", report.dropped_skill_bits.len()),
            ("reassigned records", report.reassigned.len()),
            ("duplicate records", report.duplicates.len()),
        ];
        for (label, count) in lines {
            if count > 0 {
                println!("  {}: {}", label, count);
            }
        }
    }
}
