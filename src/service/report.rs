//! Definition dump report.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::Result;
use crate::types::Location;

/// Lower-case-initial words: the value-level names a file uses.
const VALUE_IDENTIFIER: &str = r"\b[a-z][a-zA-Z0-9_']*\b";

/// Distinct value identifiers of `text`, in order of first appearance.
pub fn collect_identifiers(text: &str) -> Result<Vec<String>> {
    let re = Regex::new(VALUE_IDENTIFIER)?;
    let mut seen = HashSet::new();
    Ok(re
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|word| seen.insert(*word))
        .map(str::to_string)
        .collect())
}

/// Definitions found for one identifier.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub identifier: String,
    pub locations: Vec<Location>,
}

/// Where every identifier used in a file is defined.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionReport {
    /// The reported file
    pub file: PathBuf,
    /// RFC 3339 timestamp
    pub generated_at: String,
    /// One entry per identifier, in order of first appearance
    pub entries: Vec<ReportEntry>,
}

impl DefinitionReport {
    pub fn new(file: PathBuf, entries: Vec<ReportEntry>) -> Self {
        Self {
            file,
            generated_at: chrono::Utc::now().to_rfc3339(),
            entries,
        }
    }

    /// Identifiers with no definition anywhere.
    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.locations.is_empty())
            .map(|e| e.identifier.as_str())
            .collect()
    }

    /// Render as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# Definition Dump for {}\n\nGenerated on: {}\n\n## Definitions Found\n\n",
            self.file.display(),
            self.generated_at
        );

        for entry in &self.entries {
            for location in &entry.locations {
                out.push_str(&format!(
                    "\"{}\": {}:{}\n    {}\n\n",
                    entry.identifier,
                    location.origin,
                    location.line_index + 1,
                    location.line_text.trim()
                ));
            }
        }

        let missing = self.missing();
        if !missing.is_empty() {
            out.push_str("## Identifiers Without Definitions\n\n");
            out.push_str(&format!(
                "**{} identifier(s) with no definitions found:**\n\n",
                missing.len()
            ));
            out.push_str(&missing.join(", "));
            out.push_str("\n\n");
        }

        out
    }
}
