//! Configuration file for the command line tool

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gv_color::ColorSchemeConfig;
use gv_data::{DataFrom, DataSourceNameDict};

/// Contents of a `gridvis` JSON config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisConfig {
    /// SQLite files served as data sources, by path
    pub data_sources: Vec<String>,
    pub data_source_dict: DataSourceNameDict,
    pub data_from: Option<DataFrom>,
    pub color_scheme: ColorSchemeConfig,
    pub fraction_digits: usize,
}

impl Default for VisConfig {
    fn default() -> Self {
        Self {
            data_sources: Vec::new(),
            data_source_dict: DataSourceNameDict::default(),
            data_from: None,
            color_scheme: ColorSchemeConfig::default(),
            fraction_digits: 2,
        }
    }
}

impl VisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Data source to start from: an explicit choice, else the configured
    /// `dataFrom`, else the first configured file
    pub fn initial_data_source(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(|ds| self.data_source_dict.data_source(ds).unwrap_or(ds).to_string())
            .or_else(|| self.data_from.as_ref()?.data_source.clone())
            .or_else(|| self.data_sources.first().cloned())
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_sources: Vec<PathBuf>,
    pub fraction_digits: Option<usize>,
}

impl Overrides {
    pub fn apply(self, mut config: VisConfig) -> VisConfig {
        if !self.data_sources.is_empty() {
            config.data_sources = self
                .data_sources
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            // A data source given on the command line wins over `dataFrom`
            if let Some(data_from) = config.data_from.as_mut() {
                data_from.data_source = None;
            }
        }
        if let Some(digits) = self.fraction_digits {
            config.fraction_digits = digits;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_color::ColorScaleType;

    const CONFIG: &str = r#"{
        "dataSources": ["rivers.db", "lakes.db"],
        "dataSourceDict": {"Rivers": "rivers.db"},
        "colorScheme": {
            "rivers.db": {"flow": {"type": "quantile", "scheme": "schemeBlues[5]"}}
        },
        "fractionDigits": 1
    }"#;

    #[test]
    fn test_parse_config() {
        let config = VisConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.data_sources, vec!["rivers.db", "lakes.db"]);
        assert_eq!(config.fraction_digits, 1);
        assert_eq!(config.data_source_dict.display_name("rivers.db"), "Rivers");
        let definition = config.color_scheme.lookup("rivers.db", "flow").unwrap();
        assert_eq!(definition.kind(), ColorScaleType::Quantile);
        assert!(config.data_from.is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = VisConfig::from_json("{}").unwrap();
        assert_eq!(config.fraction_digits, 2);
        assert!(config.data_sources.is_empty());
        assert_eq!(config.initial_data_source(None), None);
    }

    #[test]
    fn test_initial_data_source_precedence() {
        let mut config = VisConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.initial_data_source(None).as_deref(), Some("rivers.db"));
        assert_eq!(config.initial_data_source(Some("Rivers")).as_deref(), Some("rivers.db"));
        assert_eq!(config.initial_data_source(Some("lakes.db")).as_deref(), Some("lakes.db"));

        config.data_from = Some(DataFrom {
            data_source: Some("lakes.db".into()),
            ..DataFrom::default()
        });
        assert_eq!(config.initial_data_source(None).as_deref(), Some("lakes.db"));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let config = VisConfig::from_json(CONFIG).unwrap();
        let config = Overrides {
            data_sources: vec![PathBuf::from("other.db")],
            fraction_digits: Some(4),
        }
        .apply(config);
        assert_eq!(config.data_sources, vec!["other.db"]);
        assert_eq!(config.fraction_digits, 4);

        let untouched = Overrides::default().apply(VisConfig::from_json(CONFIG).unwrap());
        assert_eq!(untouched.data_sources.len(), 2);
    }

    #[test]
    fn test_command_line_data_source_beats_data_from() {
        let mut config = VisConfig::from_json(CONFIG).unwrap();
        config.data_from = Some(DataFrom {
            data_source: Some("lakes.db".into()),
            variable_name: Some("flow".into()),
            ..DataFrom::default()
        });
        let config = Overrides {
            data_sources: vec![PathBuf::from("other.db")],
            fraction_digits: None,
        }
        .apply(config);
        let data_from = config.data_from.as_ref().unwrap();
        assert_eq!(data_from.data_source, None);
        assert_eq!(data_from.variable_name.as_deref(), Some("flow"));
        assert_eq!(config.initial_data_source(Some("other.db")).as_deref(), Some("other.db"));
        assert_eq!(config.initial_data_source(None).as_deref(), Some("other.db"));
    }
}
