//! TOML configuration loading and resolution of the effective settings
//!
//! Values come from three layers: the TOML file, the environment (token
//! only) and the command line. Command line values win.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::args::Args;
use super::error::{ConfigError, ConfigResult};
use crate::bundle::{SyncConfig, DEFAULT_API_URL};

pub const TOKEN_ENV_VAR: &str = "BUNDLESYNC_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> ConfigResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::InvalidValue {
                key: "output".to_string(),
                message: format!("'{}' is not one of: text, json", other),
            }),
        }
    }
}

/// Effective configuration of one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub api_url: String,
    pub token: String,
    pub sync: SyncConfig,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub output: OutputFormat,
}

/// Default configuration file location, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Bundlesync").join("bundlesync.toml"))
}

impl Args {
    /// Read the configuration file
    ///
    /// An explicitly named file must exist; a missing default file is not
    /// an error.
    pub fn load_config_file(config_file: Option<&Path>) -> ConfigResult<Option<toml::Table>> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(None),
            },
        };

        log::debug!("Loading configuration from {}", path.display());
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str::<toml::Table>(&contents)
            .map(Some)
            .map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Apply TOML values onto `args`
    pub fn apply_toml_values(args: &mut Self, config: &toml::Table) -> ConfigResult<()> {
        if let Some(api_url) = string_value(config, "api-url")? {
            args.api_url = Some(api_url);
        }
        if let Some(org) = string_value(config, "org")? {
            args.org = Some(org);
        }
        if let Some(token) = string_value(config, "token")? {
            args.token = Some(token);
        }
        if let Some(min_severity) = integer_value(config, "min-severity")? {
            args.min_severity = Some(u8::try_from(min_severity).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "min-severity".to_string(),
                    message: format!("{} is out of range", min_severity),
                }
            })?);
        }
        if let Some(timeout) = integer_value(config, "timeout")? {
            args.timeout = Some(u64::try_from(timeout).map_err(|_| ConfigError::InvalidValue {
                key: "timeout".to_string(),
                message: format!("{} is not a positive number of seconds", timeout),
            })?);
        }
        if let Some(log_level) = string_value(config, "log-level")? {
            args.log_level = Some(log_level);
        }
        if let Some(log_format) = string_value(config, "log-format")? {
            args.log_format = Some(log_format);
        }
        if let Some(log_file) = string_value(config, "log-file")? {
            args.log_file = Some(PathBuf::from(log_file));
        }
        if let Some(color) = config.get("color") {
            let color = color.as_bool().ok_or_else(|| ConfigError::InvalidValue {
                key: "color".to_string(),
                message: "expected true or false".to_string(),
            })?;
            args.color = color;
            args.no_color = !color;
        }
        if let Some(output) = string_value(config, "output")? {
            args.output = Some(output);
        }
        Ok(())
    }

    /// Overlay the values given on the command line
    pub fn merge_command_line(&mut self, cli: Args) {
        let color_override = cli.color_override();
        if cli.project_dir.is_some() {
            self.project_dir = cli.project_dir;
        }
        if cli.config_file.is_some() {
            self.config_file = cli.config_file;
        }
        if cli.api_url.is_some() {
            self.api_url = cli.api_url;
        }
        if cli.org.is_some() {
            self.org = cli.org;
        }
        if cli.token.is_some() {
            self.token = cli.token;
        }
        if cli.min_severity.is_some() {
            self.min_severity = cli.min_severity;
        }
        if cli.timeout.is_some() {
            self.timeout = cli.timeout;
        }
        if cli.log_level.is_some() {
            self.log_level = cli.log_level;
        }
        if cli.log_format.is_some() {
            self.log_format = cli.log_format;
        }
        if cli.log_file.is_some() {
            self.log_file = cli.log_file;
        }
        if let Some(color) = color_override {
            self.color = color;
            self.no_color = !color;
        }
        if cli.output.is_some() {
            self.output = cli.output;
        }
    }

    /// Validate and turn the merged arguments into settings
    pub fn into_settings(self, env_token: Option<String>) -> ConfigResult<Settings> {
        let project_dir = self.project_dir.clone().ok_or(ConfigError::MissingProjectDir)?;
        if !project_dir.is_dir() {
            return Err(ConfigError::ProjectDirNotFound {
                path: project_dir.display().to_string(),
            });
        }

        let token = self
            .token
            .clone()
            .or(env_token)
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let mut sync = SyncConfig::default();
        if let Some(org) = &self.org {
            sync.org = org.clone();
        }
        if let Some(min_severity) = self.min_severity {
            if !(1..=3).contains(&min_severity) {
                return Err(ConfigError::InvalidValue {
                    key: "min-severity".to_string(),
                    message: format!("{} is not between 1 and 3", min_severity),
                });
            }
            sync.min_severity = min_severity;
        }
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "timeout".to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
            sync.analysis_timeout = Duration::from_secs(timeout);
        }

        if let Some(format) = &self.log_format {
            if !matches!(format.as_str(), "text" | "ext" | "json") {
                return Err(ConfigError::InvalidValue {
                    key: "log-format".to_string(),
                    message: format!("'{}' is not one of: text, ext, json", format),
                });
            }
        }
        let log_file = self.log_file.clone().filter(|path| {
            let text = path.to_string_lossy();
            !(text.eq_ignore_ascii_case("none") || text == "-")
        });
        let output = match &self.output {
            Some(output) => OutputFormat::parse(output)?,
            None => OutputFormat::default(),
        };

        Ok(Settings {
            project_dir,
            api_url: self
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token,
            sync,
            color: self.color_override(),
            log_level: self.log_level,
            log_format: self.log_format,
            log_file,
            output,
        })
    }
}

fn string_value(config: &toml::Table, key: &str) -> ConfigResult<Option<String>> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: "expected a string".to_string(),
            }),
    }
}

fn integer_value(config: &toml::Table, key: &str) -> ConfigResult<Option<i64>> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: "expected an integer".to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn table(text: &str) -> toml::Table {
        toml::from_str(text).unwrap()
    }

    fn project_args() -> (tempfile::TempDir, Args) {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            project_dir: Some(dir.path().to_path_buf()),
            ..Args::default()
        };
        (dir, args)
    }

    #[test]
    fn test_toml_values_are_applied() {
        let mut args = Args::default();
        let config = table(
            r#"
            api-url = "https://example.test"
            org = "acme"
            token = "from-file"
            min-severity = 2
            timeout = 90
            color = false
            output = "json"
            "#,
        );

        Args::apply_toml_values(&mut args, &config).unwrap();

        assert_eq!(args.api_url.as_deref(), Some("https://example.test"));
        assert_eq!(args.org.as_deref(), Some("acme"));
        assert_eq!(args.min_severity, Some(2));
        assert_eq!(args.timeout, Some(90));
        assert_eq!(args.color_override(), Some(false));
        assert_eq!(args.output.as_deref(), Some("json"));
    }

    #[test]
    fn test_wrong_toml_type_is_rejected() {
        let mut args = Args::default();
        let result = Args::apply_toml_values(&mut args, &table("timeout = \"soon\""));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "timeout"));
    }

    #[test]
    fn test_command_line_wins_over_file() {
        let mut args = Args::default();
        Args::apply_toml_values(&mut args, &table("org = \"file\"\ncolor = true")).unwrap();

        let cli = Args::try_parse_from(["bundlesync", "--org", "cli", "--no-color", "dir"]).unwrap();
        args.merge_command_line(cli);

        assert_eq!(args.org.as_deref(), Some("cli"));
        assert_eq!(args.color_override(), Some(false));
        assert_eq!(args.project_dir, Some(PathBuf::from("dir")));
    }

    #[test]
    fn test_settings_defaults_and_env_token() {
        let (dir, args) = project_args();

        let settings = args.into_settings(Some("env-token".to_string())).unwrap();

        assert_eq!(settings.project_dir, dir.path());
        assert_eq!(settings.token, "env-token");
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.sync, SyncConfig::default());
        assert_eq!(settings.output, OutputFormat::Text);
    }

    #[test]
    fn test_explicit_token_beats_environment() {
        let (_dir, mut args) = project_args();
        args.token = Some("flag".to_string());

        let settings = args.into_settings(Some("env".to_string())).unwrap();
        assert_eq!(settings.token, "flag");
    }

    #[test]
    fn test_missing_token() {
        let (_dir, args) = project_args();
        assert_eq!(args.into_settings(None), Err(ConfigError::MissingToken));
    }

    #[test]
    fn test_invalid_values() {
        let (_dir, mut args) = project_args();
        args.min_severity = Some(4);
        assert!(matches!(
            args.clone().into_settings(Some("t".to_string())),
            Err(ConfigError::InvalidValue { .. })
        ));

        args.min_severity = None;
        args.timeout = Some(0);
        assert!(matches!(
            args.into_settings(Some("t".to_string())),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_project_dir() {
        let args = Args {
            project_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Args::default()
        };
        assert!(matches!(
            args.into_settings(Some("t".to_string())),
            Err(ConfigError::ProjectDirNotFound { .. })
        ));
        assert_eq!(
            Args::default().into_settings(Some("t".to_string())),
            Err(ConfigError::MissingProjectDir)
        );
    }

    #[test]
    fn test_log_file_none_disables_file_logging() {
        let (_dir, mut args) = project_args();
        args.log_file = Some(PathBuf::from("none"));
        let settings = args.into_settings(Some("t".to_string())).unwrap();
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn test_explicit_config_file_must_exist() {
        let result = Args::load_config_file(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_config_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundlesync.toml");
        std::fs::write(&path, "org = \"acme\"\n").unwrap();

        let config = Args::load_config_file(Some(path.as_path())).unwrap().unwrap();
        assert_eq!(config["org"].as_str(), Some("acme"));

        std::fs::write(&path, "org = \n").unwrap();
        assert!(matches!(
            Args::load_config_file(Some(path.as_path())),
            Err(ConfigError::Parse { .. })
        ));
    }
}
