use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use dirs::home_dir;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::error::SessionErr;
use crate::flags::SIFT_API_BASE;
use crate::flags::SIFT_HOME;
use crate::flags::SIFT_SSE_FIXTURE;
use crate::flags::SIFT_STREAM_IDLE_TIMEOUT_MS;
use crate::flags::SIFT_STREAM_PATH;

const CONFIG_TOML_FILE: &str = "config.toml";

/// Application configuration loaded from disk and merged with overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Scheme and host of the backend, e.g. `http://localhost:8000`.
    pub base_url: String,

    /// Path of the streaming endpoint, appended to `base_url`.
    pub stream_path: String,

    /// A stream that stays silent this long fails its turn.
    pub stream_idle_timeout: Duration,

    /// When set, every query replays this SSE file instead of hitting the
    /// backend.
    pub fixture: Option<PathBuf>,

    /// Directory containing `config.toml`. Defaults to `~/.sift`.
    pub sift_home: PathBuf,
}

/// Base config deserialized from `~/.sift/config.toml`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    pub base_url: Option<String>,
    pub stream_path: Option<String>,
    pub stream_idle_timeout_ms: Option<u64>,
    pub fixture: Option<PathBuf>,
}

/// Optional overrides for user configuration (e.g., from CLI flags).
#[derive(Default, Debug, Clone)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub stream_path: Option<String>,
    pub stream_idle_timeout: Option<Duration>,
    pub fixture: Option<PathBuf>,
    pub sift_home: Option<PathBuf>,
}

impl Config {
    /// Load configuration, optionally applying overrides (CLI flags). Merges
    /// `~/.sift/config.toml`, environment flags and any values provided in
    /// `overrides` (highest precedence).
    pub fn load_with_overrides(overrides: ConfigOverrides) -> Result<Self> {
        let sift_home = match overrides.sift_home.clone() {
            Some(home) => home,
            None => find_sift_home()?,
        };
        let cfg = load_config_as_toml(&sift_home)?;
        Ok(Self::load_from_base_config_with_overrides(
            cfg, overrides, sift_home,
        ))
    }

    pub fn load_from_base_config_with_overrides(
        cfg: ConfigToml,
        overrides: ConfigOverrides,
        sift_home: PathBuf,
    ) -> Self {
        let ConfigOverrides {
            base_url,
            stream_path,
            stream_idle_timeout,
            fixture,
            sift_home: _,
        } = overrides;

        Self {
            base_url: base_url
                .or(cfg.base_url)
                .unwrap_or_else(|| SIFT_API_BASE.to_string()),
            stream_path: stream_path
                .or(cfg.stream_path)
                .unwrap_or_else(|| SIFT_STREAM_PATH.to_string()),
            stream_idle_timeout: stream_idle_timeout
                .or(cfg.stream_idle_timeout_ms.map(Duration::from_millis))
                .unwrap_or(*SIFT_STREAM_IDLE_TIMEOUT_MS),
            fixture: fixture
                .or(cfg.fixture)
                .or_else(|| SIFT_SSE_FIXTURE.map(PathBuf::from)),
            sift_home,
        }
    }
}

/// Reads `config.toml` under `sift_home`. A missing file yields the defaults;
/// a file that does not parse is an error.
pub fn load_config_as_toml(sift_home: &Path) -> Result<ConfigToml> {
    let config_toml_path = sift_home.join(CONFIG_TOML_FILE);
    match std::fs::read_to_string(&config_toml_path) {
        Ok(contents) => toml::from_str::<ConfigToml>(&contents).map_err(|e| {
            SessionErr::Config(format!(
                "failed to parse {}: {e}",
                config_toml_path.display()
            ))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %config_toml_path.display(), "no config file; using defaults");
            Ok(ConfigToml::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the path to the sift configuration directory: `$SIFT_HOME` when
/// set, otherwise `~/.sift`. Does not verify that the directory exists.
pub fn find_sift_home() -> std::io::Result<PathBuf> {
    if let Some(home) = *SIFT_HOME {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    let mut p = home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    p.push(".sift");
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_yields_defaults() {
        let home = TempDir::new().unwrap();
        assert_eq!(
            load_config_as_toml(home.path()).unwrap(),
            ConfigToml::default()
        );
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join(CONFIG_TOML_FILE), "base_url = [").unwrap();
        assert_matches!(
            load_config_as_toml(home.path()),
            Err(SessionErr::Config(msg)) if msg.contains("config.toml")
        );
    }

    #[test]
    fn overrides_win_over_config_file() {
        let home = TempDir::new().unwrap();
        std::fs::write(
            home.path().join(CONFIG_TOML_FILE),
            r#"
base_url = "https://search.example"
stream_path = "/stream-blog"
stream_idle_timeout_ms = 300000
"#,
        )
        .unwrap();

        let config = Config::load_with_overrides(ConfigOverrides {
            base_url: Some("http://127.0.0.1:9000".to_string()),
            sift_home: Some(home.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.stream_path, "/stream-blog");
        assert_eq!(config.stream_idle_timeout, Duration::from_millis(300_000));
        assert_eq!(config.sift_home, home.path().to_path_buf());
    }

    #[test]
    fn empty_config_falls_back_to_flag_defaults() {
        let config = Config::load_from_base_config_with_overrides(
            ConfigToml::default(),
            ConfigOverrides::default(),
            PathBuf::from("/tmp/sift"),
        );
        assert_eq!(config.base_url, *SIFT_API_BASE);
        assert_eq!(config.stream_path, *SIFT_STREAM_PATH);
        assert_eq!(config.stream_idle_timeout, *SIFT_STREAM_IDLE_TIMEOUT_MS);
    }
}
