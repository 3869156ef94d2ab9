//! Output formatting for the `extract` command

use anyhow::{Context, Result};
use serde::Serialize;

use crate::extract::{Extraction, LaunchParameters};

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

#[derive(Serialize)]
struct ExtractionReport<'a> {
    recognized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a LaunchParameters>,
}

impl<'a> From<&'a Extraction> for ExtractionReport<'a> {
    fn from(extraction: &'a Extraction) -> Self {
        match extraction {
            Extraction::Matched(params) => Self {
                recognized: true,
                parameters: Some(params),
            },
            Extraction::NotRecognized => Self {
                recognized: false,
                parameters: None,
            },
        }
    }
}

/// Output formatter for extraction results
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_extraction(&self, extraction: &Extraction) -> Result<String> {
        let report = ExtractionReport::from(extraction);
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&report)
                .context("Failed to serialize extraction to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(&report).context("Failed to serialize extraction to YAML")
            }
            OutputFormat::Human => Ok(Self::format_extraction_human(extraction)),
        }
    }

    fn format_extraction_human(extraction: &Extraction) -> String {
        match extraction {
            Extraction::Matched(params) => format!(
                "Tool:            {}\nBuild directory: {}\nConfiguration:   {}\nCommand line:    {}",
                params.tool_path(),
                params.working_directory(),
                params.configuration_token(),
                params.to_command_line()
            ),
            Extraction::NotRecognized => "Not recognized as a build tool command line".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CommandLineExtractor;

    fn matched() -> Extraction {
        CommandLineExtractor::default().extract("tundra2.exe -C t2 win64-msvc-debug-default")
    }

    #[test]
    fn test_json_output() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_extraction(&matched())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["recognized"], true);
        assert_eq!(value["parameters"]["tool_path"], "tundra2.exe");
        assert_eq!(value["parameters"]["working_directory"], "t2");
        assert_eq!(
            value["parameters"]["configuration_token"],
            "win64-msvc-debug-default"
        );
    }

    #[test]
    fn test_json_output_not_recognized() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_extraction(&Extraction::NotRecognized)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["recognized"], false);
        assert!(value.get("parameters").is_none());
    }

    #[test]
    fn test_yaml_output() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format_extraction(&matched())
            .unwrap();
        assert!(output.contains("recognized: true"));
        assert!(output.contains("configuration_token: win64-msvc-debug-default"));
    }

    #[test]
    fn test_human_output() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_extraction(&matched())
            .unwrap();
        assert!(output.contains("Tool:            tundra2.exe"));
        assert!(output.contains("Configuration:   win64-msvc-debug-default"));

        let output = OutputFormatter::new(OutputFormat::Human)
            .format_extraction(&Extraction::NotRecognized)
            .unwrap();
        assert!(output.starts_with("Not recognized"));
    }
}
