//! # Settings file.
//!
//! All sections are optional; anything missing falls back to its default.
//!
//! ```toml
//! [orchestrator]
//! grace_ms = 1000
//! settle_delay_ms = 2000
//! debounce_ms = 2000
//! tick_interval_ms = 0
//! key_policy = { mode = "honor" }
//!
//! [ffmpeg]
//! binary = "ffmpeg"
//! input_base = "rtmp://localhost:1935/live"
//! output_base = "rtmp://localhost:1935/overlay"
//! default_style = "simple"
//!
//! [files]
//! json = "score.json"
//! text = "score.txt"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{core::Config, error::SettingsError, render::FfmpegConfig, state::ScoreFiles};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub orchestrator: Config,
    pub ffmpeg: FfmpegConfig,
    pub files: ScoreFiles,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a settings file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::{KeyPolicy, StreamKey};

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn sections_are_parsed() {
        let s = Settings::from_toml_str(
            r#"
            [orchestrator]
            debounce_ms = 250
            key_policy = { mode = "fixed", key = "main" }

            [ffmpeg]
            binary = "/opt/ffmpeg/bin/ffmpeg"

            [files]
            text = "/var/lib/overlay/score.txt"
            "#,
        )
        .unwrap();

        assert_eq!(s.orchestrator.debounce, Duration::from_millis(250));
        assert_eq!(s.orchestrator.grace, Config::default().grace);
        assert_eq!(
            s.orchestrator.key_policy,
            KeyPolicy::Fixed {
                key: StreamKey::new("main").unwrap()
            }
        );
        assert_eq!(s.ffmpeg.binary, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(s.ffmpeg.input_base, FfmpegConfig::default().input_base);
        assert!(s.files.json.is_none());
        assert_eq!(
            s.files.text.as_deref(),
            Some(Path::new("/var/lib/overlay/score.txt"))
        );
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Settings::from_toml_str("[orchestrator\n").unwrap_err();
        assert_eq!(err.as_label(), "settings_parse");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(dir.path().join("absent.toml")).await.unwrap_err();
        assert_eq!(err.as_label(), "settings_io");
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rendervisor.toml");
        tokio::fs::write(&path, "[orchestrator]\ntick_interval_ms = 0\n")
            .await
            .unwrap();

        let s = Settings::load(&path).await.unwrap();
        assert!(s.orchestrator.tick().is_none());
    }
}
