use stamp_core::project::{ManifestError, MANIFEST_FILE};
use stamp_core::{PlainTextTypes, Project, ProjectManifest, StamperConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the state file location.
pub const STATE_ENV: &str = "PATHSTAMP_STATE";
/// Environment variable listing extra plain-text extensions (comma separated).
pub const PLAIN_TEXT_ENV: &str = "PATHSTAMP_PLAIN_TEXT";

/// How long to let a new file settle before stamping it.
const DEFAULT_SETTLE: Duration = Duration::from_millis(200);

/// Daemon configuration, resolved from CLI arguments and environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where processed flags are persisted
    pub state_path: PathBuf,
    /// Extensions classified as plain text in every project
    pub plain_text: PlainTextTypes,
    /// New-file stamper settings
    pub stamper: StamperConfig,
    /// Delay between a creation and its stamp
    pub settle: Duration,
}

impl Config {
    /// Resolve configuration. Explicit arguments win over the environment.
    ///
    /// Environment variables:
    /// - `PATHSTAMP_STATE`: state file path (supports ~ for home directory)
    /// - `PATHSTAMP_PLAIN_TEXT`: extra plain-text extensions, e.g. `md,rst`
    pub fn resolve(state: Option<PathBuf>, allow_duplicates: bool) -> Result<Self, ConfigError> {
        let state_path = match state {
            Some(path) => expand_tilde(&path.to_string_lossy()),
            None => match std::env::var(STATE_ENV) {
                Ok(value) if !value.trim().is_empty() => expand_tilde(value.trim()),
                _ => default_state_path()?,
            },
        };

        let mut plain_text = PlainTextTypes::default();
        if let Ok(value) = std::env::var(PLAIN_TEXT_ENV) {
            plain_text.extend(value.split(',').map(str::trim));
        }

        Ok(Self {
            state_path,
            plain_text,
            stamper: StamperConfig {
                guard_on_create: !allow_duplicates,
            },
            settle: DEFAULT_SETTLE,
        })
    }

    /// Open the project rooted at `base`, reading its manifest if present.
    pub fn load_project(&self, base: &Path) -> Result<Project, ConfigError> {
        let base = base
            .canonicalize()
            .map_err(|e| ConfigError::ProjectDir(base.to_path_buf(), e))?;
        if !base.is_dir() {
            return Err(ConfigError::NotADirectory(base));
        }

        let manifest_path = base.join(MANIFEST_FILE);
        let manifest = match std::fs::read_to_string(&manifest_path) {
            Ok(source) => ProjectManifest::parse(&source)
                .map_err(|e| ConfigError::Manifest(manifest_path.clone(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProjectManifest::default(),
            Err(e) => return Err(ConfigError::ProjectDir(manifest_path, e)),
        };

        Ok(Project::open(base, &manifest, self.plain_text.clone()))
    }
}

fn default_state_path() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join("pathstamp").join("state.json"))
        .ok_or(ConfigError::NoDataDir)
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No data directory available; pass --state or set PATHSTAMP_STATE")]
    NoDataDir,

    #[error("Cannot open project {0}: {1}")]
    ProjectDir(PathBuf, std::io::Error),

    #[error("Project path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("{0}: {1}")]
    Manifest(PathBuf, ManifestError),
}
