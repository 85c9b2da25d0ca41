use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

use crate::record::{DateParser, DEFAULT_DATE_FORMATS};
use crate::status::{StatusClassifier, Taxonomy, TaxonomyLists, UnrecognizedPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub columns: ColumnMapping,
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Source header for each canonical field
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_identifier_column")]
    pub identifier: String,
    #[serde(default = "default_contract_date_column")]
    pub contract_date: String,
    #[serde(default = "default_closed_date_column")]
    pub closed_date: String,
    #[serde(default = "default_sold_price_column")]
    pub sold_price: String,
    #[serde(default = "default_market_time_column")]
    pub market_time: String,
    #[serde(default = "default_status_column")]
    pub status: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            identifier: default_identifier_column(),
            contract_date: default_contract_date_column(),
            closed_date: default_closed_date_column(),
            sold_price: default_sold_price_column(),
            market_time: default_market_time_column(),
            status: default_status_column(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Required: deployments must choose how unknown tokens are handled
    pub policy: UnrecognizedPolicy,
    #[serde(default = "TaxonomyLists::mls_v1")]
    pub taxonomy: TaxonomyLists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default = "default_trailing_years")]
    pub trailing_years: usize,
    #[serde(default = "default_rolling_quarters")]
    pub rolling_quarters: usize,
    #[serde(default = "default_quarter_window")]
    pub quarter_window: usize,
    #[serde(default = "default_monthly_window")]
    pub monthly_window: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            effective_date: None,
            trailing_years: default_trailing_years(),
            rolling_quarters: default_rolling_quarters(),
            quarter_window: default_quarter_window(),
            monthly_window: default_monthly_window(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;
        let config: Config = toml::from_str(&content).context("Failed to parse config TOML")?;
        Ok(config)
    }

    pub fn classifier(&self) -> Result<StatusClassifier> {
        let taxonomy = Taxonomy::from_lists(&self.classifier.taxonomy)
            .context("Invalid status taxonomy")?;
        Ok(StatusClassifier::new(taxonomy, self.classifier.policy))
    }

    pub fn date_parser(&self) -> DateParser {
        DateParser::new(self.date_formats.clone())
    }
}

fn default_output_dir() -> String {
    "reports".to_string()
}

fn default_date_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect()
}

fn default_identifier_column() -> String {
    "MLS #".to_string()
}

fn default_contract_date_column() -> String {
    "Contract Date".to_string()
}

fn default_closed_date_column() -> String {
    "Closed Date".to_string()
}

fn default_sold_price_column() -> String {
    "Sold Pr".to_string()
}

fn default_market_time_column() -> String {
    "MT".to_string()
}

fn default_status_column() -> String {
    "Stat".to_string()
}

fn default_trailing_years() -> usize {
    5
}

fn default_rolling_quarters() -> usize {
    20
}

fn default_quarter_window() -> usize {
    8
}

fn default_monthly_window() -> usize {
    13
}
