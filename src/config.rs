use anyhow::{bail, Context, Result};
use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const SAMPLE_CONFIG: &str = include_str!("../config-sample.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub dates: DatesConfig,
    pub trello: TrelloConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    pub template: TemplateConfig,
    #[serde(default)]
    pub export: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatesConfig {
    pub from_zone: Tz,
    pub to_zone: Tz,
    pub date_format: String,
    pub datetime_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrelloConfig {
    pub api_url: String,
    pub api_key: String,
    pub api_token: String,
    #[serde(default = "default_actions_limit")]
    pub actions_limit: u32,
}

fn default_actions_limit() -> u32 {
    1000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub http: String,
    #[serde(default)]
    pub https: String,
}

/// Display texts for the workbook, plus the member field used as comment author.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub sheet_opened_cards: String,
    pub sheet_archived_cards: String,
    pub header_list: String,
    pub header_title: String,
    pub header_description: String,
    pub header_start_date: String,
    pub header_due_date: String,
    pub header_last_activity_date: String,
    pub header_labels: String,
    pub header_num: String,
    pub header_url: String,
    pub user_name: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            sheet_opened_cards: "Cards".into(),
            sheet_archived_cards: "Archived cards".into(),
            header_list: "List".into(),
            header_title: "Title".into(),
            header_description: "Description".into(),
            header_start_date: "Start date".into(),
            header_due_date: "Due date".into(),
            header_last_activity_date: "Last activity".into(),
            header_labels: "Labels".into(),
            header_num: "#".into(),
            header_url: "URL".into(),
            user_name: "fullName".into(),
        }
    }
}

impl LabelsConfig {
    pub fn headers(&self) -> [&str; 9] {
        [
            &self.header_list,
            &self.header_title,
            &self.header_description,
            &self.header_start_date,
            &self.header_due_date,
            &self.header_last_activity_date,
            &self.header_labels,
            &self.header_num,
            &self.header_url,
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_dir")]
    pub directory: PathBuf,
    pub file: String,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
        }
    }
}

impl ExportConfig {
    pub fn template_path(&self) -> PathBuf {
        self.template.directory.join(&self.template.file)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: ExportConfig =
            toml::from_str(contents).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, pattern) in [
            ("dates.date_format", &self.dates.date_format),
            ("dates.datetime_format", &self.dates.datetime_format),
        ] {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                bail!("{key} is not a valid date pattern: '{pattern}'");
            }
        }
        if self.proxy.enabled && self.proxy.http.is_empty() && self.proxy.https.is_empty() {
            bail!("proxy.enabled is set but neither proxy.http nor proxy.https is configured");
        }
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    std::env::var_os("TRELLO_EXPORT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load the settings file, writing the bundled sample first when it is missing.
pub fn load_config(path: &Path) -> Result<ExportConfig> {
    if !path.exists() {
        std::fs::write(path, SAMPLE_CONFIG)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        tracing::info!(path = %path.display(), "created settings file from sample");
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    ExportConfig::parse(&contents)
}
