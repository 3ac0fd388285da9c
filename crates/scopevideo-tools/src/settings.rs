use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use scopevideo::synth::TestPattern;
use scopevideo::{AcquisitionConfig, DecoderConfig};
use serde::{Deserialize, Serialize};

/// Everything a `--config` file may override. Missing sections and fields
/// keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub decoder: DecoderConfig,
    pub acquisition: AcquisitionConfig,
    /// Timing and levels used by `synth`. Its decoder section is replaced by
    /// the top-level one.
    pub pattern: TestPattern,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut settings = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?;
                serde_json::from_str::<Settings>(&text)
                    .with_context(|| format!("failed to parse config: {}", path.display()))?
            }
            None => Settings::default(),
        };
        settings.pattern.decoder = settings.decoder.clone();
        settings
            .decoder
            .validate()
            .context("invalid decoder configuration")?;
        settings
            .acquisition
            .validate(&settings.decoder.channels)
            .context("invalid acquisition configuration")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings() {
        let settings: Settings = serde_json::from_str(
            r#"{ "decoder": { "short_pulse_gap": 300 }, "pattern": { "drift_per_line": 5 } }"#,
        )
        .unwrap();
        assert_eq!(settings.decoder.short_pulse_gap, 300);
        assert_eq!(settings.acquisition, AcquisitionConfig::default());
        assert_eq!(settings.pattern.drift_per_line, 5);
        assert_eq!(settings.pattern.line_period, 1984);
    }

    #[test]
    fn test_defaults_round_trip_through_json() {
        let json = serde_json::to_string_pretty(&Settings::default()).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Settings::default());
    }
}
