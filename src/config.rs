use std::path::PathBuf;

use crate::viz::RendererMode;

pub const CHART_CONFIG_VAR: &str = "PBIX_SCANNER_CHART_CONFIG";
pub const RENDER_MODE_VAR: &str = "PBIX_SCANNER_RENDER_MODE";

/// Runtime settings, read from the environment at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannerConfig {
    /// JSON chart spec applied to every new chart session.
    pub chart_config: Option<PathBuf>,
    pub render_mode: RendererMode,
}

impl ScannerConfig {
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut config = Self::default();
        for (key, value) in vars {
            match key.as_str() {
                CHART_CONFIG_VAR if !value.is_empty() => {
                    config.chart_config = Some(PathBuf::from(value));
                }
                RENDER_MODE_VAR => match value.to_ascii_lowercase().as_str() {
                    "explore" => config.render_mode = RendererMode::Explore,
                    "readonly" | "read-only" => config.render_mode = RendererMode::ReadOnly,
                    other => log::warn!("Ignoring unknown {RENDER_MODE_VAR} value '{other}'"),
                },
                _ => {}
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_variables() {
        let config = ScannerConfig::from_vars(vars(&[("HOME", "/root")]));
        assert_eq!(config, ScannerConfig::default());
        assert_eq!(config.render_mode, RendererMode::Explore);
    }

    #[test]
    fn reads_chart_config_and_mode() {
        let config = ScannerConfig::from_vars(vars(&[
            (CHART_CONFIG_VAR, "/tmp/chart.json"),
            (RENDER_MODE_VAR, "ReadOnly"),
        ]));
        assert_eq!(config.chart_config, Some(PathBuf::from("/tmp/chart.json")));
        assert_eq!(config.render_mode, RendererMode::ReadOnly);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_variables_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("PBIX_SCANNER_TEST_BYTES", OsStr::from_bytes(b"\xff\xfe"));
        let config = ScannerConfig::from_env();
        std::env::remove_var("PBIX_SCANNER_TEST_BYTES");

        assert_eq!(config.render_mode, RendererMode::Explore);
    }

    #[test]
    fn unknown_mode_keeps_default() {
        let config = ScannerConfig::from_vars(vars(&[(RENDER_MODE_VAR, "fancy")]));
        assert_eq!(config.render_mode, RendererMode::Explore);
    }
}
