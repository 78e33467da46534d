use serde::Deserialize;

use crate::error::ArchiveError;

/// Settings of a `FileManager`.
///
/// ```json
/// { "app_name": "UnrealTournament", "config_dir": "/srv/ut/System/" }
/// ```
///
/// Without `config_dir` the directory is derived from the environment.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileManagerConfig {
    pub app_name: String,
    #[serde(default)]
    pub config_dir: Option<String>,
}

impl FileManagerConfig {
    #[must_use]
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            config_dir: None,
        }
    }

    #[must_use]
    pub fn with_config_dir(mut self, config_dir: &str) -> Self {
        self.config_dir = Some(config_dir.to_string());
        self
    }

    /// Read the JSON form of the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - There are I/O errors reading from the provided reader
    /// - The JSON input is invalid or misses `app_name`
    pub fn from_reader(mut reader: impl embedded_io::Read) -> Result<Self, String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match embedded_io::Read::read(&mut reader, &mut chunk) {
                Ok(0) => break,
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(format!("Failed to read file manager config: {e:?}")),
            }
        }
        serde_json::from_slice(&buffer)
            .map_err(|e| format!("Failed to parse file manager config JSON: {e}"))
    }

    /// Settings for `app_name` with the directory taken from the environment.
    ///
    /// # Errors
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    pub fn from_env(app_name: &str) -> Result<Self, ArchiveError> {
        let config = Self::new(app_name);
        let dir = config.resolve_config_dir()?;
        Ok(config.with_config_dir(&dir))
    }

    /// The configuration directory, with a trailing `/`.
    ///
    /// An explicit `config_dir` wins. Otherwise `$XDG_CONFIG_HOME/<app>/System/`,
    /// falling back to `$HOME/.config/<app>/System/`.
    ///
    /// # Errors
    /// Neither `config_dir`, `XDG_CONFIG_HOME` nor `HOME` is available.
    pub fn resolve_config_dir(&self) -> Result<String, ArchiveError> {
        if let Some(dir) = &self.config_dir {
            return Ok(with_trailing_slash(dir));
        }
        config_dir_from(
            &self.app_name,
            std::env::var("XDG_CONFIG_HOME").ok(),
            std::env::var("HOME").ok(),
        )
    }
}

fn with_trailing_slash(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    }
}

fn config_dir_from(
    app_name: &str,
    xdg_config_home: Option<String>,
    home: Option<String>,
) -> Result<String, ArchiveError> {
    match (xdg_config_home.filter(|s| !s.is_empty()), home) {
        (Some(xdg), _) => Ok(format!("{}{app_name}/System/", with_trailing_slash(&xdg))),
        (None, Some(home)) => Ok(format!("{}.config/{app_name}/System/", with_trailing_slash(&home))),
        (None, None) => Err(ArchiveError::ConfigDir {
            path: format!("~/.config/{app_name}/System/"),
            message: "neither XDG_CONFIG_HOME nor HOME is set".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_with_explicit_dir() {
        let input = br#"{"app_name": "ut", "config_dir": "/srv/ut"}"#;
        let config = FileManagerConfig::from_reader(&input[..]).unwrap();
        assert_eq!(config, FileManagerConfig::new("ut").with_config_dir("/srv/ut"));
        assert_eq!(config.resolve_config_dir().unwrap(), "/srv/ut/");
    }

    #[test]
    fn json_without_dir() {
        let input = br#"{"app_name": "ut"}"#;
        let config = FileManagerConfig::from_reader(&input[..]).unwrap();
        assert_eq!(config.config_dir, None);
    }

    #[test]
    fn json_errors_are_reported() {
        let err = FileManagerConfig::from_reader(&b"{"[..]).unwrap_err();
        assert!(err.starts_with("Failed to parse file manager config JSON"), "{err}");

        let err = FileManagerConfig::from_reader(&br#"{"config_dir": "/x"}"#[..]).unwrap_err();
        assert!(err.contains("app_name"), "{err}");
    }

    #[test]
    fn xdg_wins_over_home() {
        let dir = config_dir_from("ut", Some("/x/cfg".to_string()), Some("/home/u".to_string()));
        assert_eq!(dir.unwrap(), "/x/cfg/ut/System/");
    }

    #[test]
    fn home_fallback() {
        let dir = config_dir_from("ut", Some(String::new()), Some("/home/u/".to_string()));
        assert_eq!(dir.unwrap(), "/home/u/.config/ut/System/");
    }

    #[test]
    fn no_environment() {
        let err = config_dir_from("ut", None, None).unwrap_err();
        assert!(matches!(err, ArchiveError::ConfigDir { .. }));
    }
}
