//! Forecasts produced by an external analyst agent (typically an LLM).
//!
//! The agent is a caller-owned handle implementing [`AnalystAgent`]; this
//! module builds its context, parses its answer and writes the forecast.

use crate::company::Company;
use crate::error::{ModelError, Result};
use crate::line_item::PeriodValues;
use crate::schema::CompanyDocument;
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct AnalystContext {
    pub company: CompanyDocument,
    pub transcripts: Vec<String>,
    pub target_item: String,
}

impl AnalystContext {
    pub fn instructions(&self) -> String {
        format!(
            "Analyze this '{}' for the company '{}', based on historical financial data, market \
             context, industry dynamics, and management commentary extracted from provided \
             earnings call transcripts.",
            self.target_item, self.company.name
        )
    }

    /// Instructions followed by the context serialized as pretty JSON.
    pub fn to_prompt(&self) -> Result<String> {
        Ok(format!(
            "{}\n\nHere is the necessary data for your analysis:\n{}",
            self.instructions(),
            serde_json::to_string_pretty(self)?
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalystOutput {
    pub target_financial: String,
    pub analysis: String,

    #[serde(rename = "next_4_qs")]
    #[schemars(description = "Forecast for the next four quarters keyed by period label, e.g. 2025Q1")]
    pub forecast: PeriodValues,

    pub reasoning: String,

    #[schemars(description = "0 (no conviction) to 10 (very high conviction)")]
    pub conviction_score: u8,
}

impl AnalystOutput {
    /// Parses an agent reply, tolerating prose or code fences around the JSON object.
    pub fn from_response(raw: &str) -> Result<Self> {
        let output: AnalystOutput = serde_json::from_str(extract_json_object(raw))?;
        if output.conviction_score > 10 {
            return Err(ModelError::Collaborator(format!(
                "conviction score {} is outside 0..=10",
                output.conviction_score
            )));
        }
        Ok(output)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(AnalystOutput))
    }
}

fn extract_json_object(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw.trim(),
    }
}

pub trait AnalystAgent {
    fn analyze(&self, context: &AnalystContext) -> Result<AnalystOutput>;
}

/// Collects transcripts and a target item, asks the agent for a forecast and
/// writes it into the target's forecasted values.
pub struct AgenticForecast<'a> {
    agent: &'a dyn AnalystAgent,
    transcripts: Vec<String>,
    target_item: Option<String>,
}

impl<'a> AgenticForecast<'a> {
    pub fn new(agent: &'a dyn AnalystAgent) -> Self {
        Self {
            agent,
            transcripts: Vec::new(),
            target_item: None,
        }
    }

    pub fn add_transcript(&mut self, transcript: impl Into<String>) {
        self.transcripts.push(transcript.into());
    }

    pub fn add_transcript_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path.as_ref())?;
        debug!("Loaded transcript {} ({} bytes)", path.as_ref().display(), text.len());
        self.transcripts.push(text);
        Ok(())
    }

    pub fn set_target_item(&mut self, target_item: &str) {
        self.target_item = Some(target_item.to_string());
    }

    pub fn transcripts(&self) -> &[String] {
        &self.transcripts
    }

    pub fn run(&self, company: &mut Company) -> Result<AnalystOutput> {
        let target_item = self
            .target_item
            .as_deref()
            .ok_or_else(|| ModelError::InvalidParameter("target item is not set".to_string()))?;
        if self.transcripts.is_empty() {
            return Err(ModelError::InvalidParameter(
                "no transcripts have been added".to_string(),
            ));
        }
        if company.find_item(target_item).is_none() {
            return Err(ModelError::ItemNotFound(target_item.to_string()));
        }

        info!(
            "Requesting analyst forecast of '{}' for {} from {} transcripts",
            target_item,
            company.name,
            self.transcripts.len()
        );

        let context = AnalystContext {
            company: company.to_document(),
            transcripts: self.transcripts.clone(),
            target_item: target_item.to_string(),
        };
        let output = self.agent.analyze(&context)?;

        let item = company
            .find_item_mut(target_item)
            .ok_or_else(|| ModelError::ItemNotFound(target_item.to_string()))?;
        for (period, value) in &output.forecast {
            item.add_forecasted(period.clone(), *value);
        }
        debug!(
            "Analyst wrote {} periods to '{}' (conviction {})",
            output.forecast.len(),
            target_item,
            output.conviction_score
        );

        Ok(output)
    }
}
