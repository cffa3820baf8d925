//! Google Scholar search via the bundled script
//!
//! The script prints a JSON array of `{id, title, authors, abstract, year, url}`
//! objects on stdout and progress on stderr.

use paperscout_common::config::ScholarConfig;
use paperscout_common::{AppError, PaperRecord, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::task::ExternalTask;

#[derive(Debug, Deserialize)]
struct ScholarPaper {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    year: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
}

impl ScholarPaper {
    fn into_record(self) -> Option<PaperRecord> {
        let title = paperscout_common::models::collapse_whitespace(&self.title);
        if title.is_empty() {
            return None;
        }

        let external_id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("scholar_{}", Uuid::new_v4()));

        let published_at = match self.year {
            Some(serde_json::Value::String(year)) => year,
            Some(serde_json::Value::Number(year)) => year.to_string(),
            _ => String::new(),
        };

        Some(PaperRecord {
            external_id,
            title,
            authors: self.authors,
            abstract_text: self.abstract_text.unwrap_or_default(),
            published_at,
            url: self.url.filter(|url| !url.is_empty()),
        })
    }
}

/// Decode the script's stdout
pub fn parse_output(stdout: &[u8], program: &str) -> Result<Vec<PaperRecord>> {
    let papers: Vec<ScholarPaper> = serde_json::from_slice(stdout).map_err(|e| AppError::SubprocessFailed {
        program: program.to_string(),
        message: format!("unparsable output: {}", e),
    })?;

    let total = papers.len();
    let records: Vec<PaperRecord> = papers.into_iter().filter_map(ScholarPaper::into_record).collect();
    if records.len() < total {
        debug!(dropped = total - records.len(), "Dropped Scholar results without a title");
    }
    Ok(records)
}

/// Runs the Scholar script under a timeout
#[derive(Debug, Clone)]
pub struct ScholarRunner {
    program: String,
    script_path: String,
    timeout: Duration,
    default_year_from: i32,
}

impl ScholarRunner {
    pub fn new(config: &ScholarConfig) -> Self {
        Self {
            program: config.program.clone(),
            script_path: config.script_path.display().to_string(),
            timeout: config.timeout(),
            default_year_from: config.year_from,
        }
    }

    /// `None` when the source is turned off
    pub fn from_config(config: &ScholarConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config))
    }

    pub fn default_year_from(&self) -> i32 {
        self.default_year_from
    }

    /// Search for papers published in `year_from` or later
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn search(&self, year_from: i32) -> Result<Vec<PaperRecord>> {
        let task = ExternalTask::new(self.program.clone(), self.timeout)
            .arg(self.script_path.clone())
            .arg(year_from.to_string());

        let stdout = task.run().await?;
        parse_output(&stdout, task.program())
    }
}
