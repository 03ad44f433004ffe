//! Projects, their content roots and the registry of open projects.

use crate::comment::PlainTextTypes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Optional per-project settings file at the project base.
pub const MANIFEST_FILE: &str = "pathstamp.yaml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Invalid pathstamp.yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Content root escapes the project: {0}")]
    RootOutsideProject(String),
}

/// Contents of `pathstamp.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ProjectManifest {
    /// Content roots relative to the project base. Empty means "the base".
    pub content_roots: Vec<PathBuf>,
    /// Extra extensions classified as plain text for this project.
    pub plain_text_extensions: Vec<String>,
}

impl ProjectManifest {
    pub fn parse(source: &str) -> Result<Self, ManifestError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let manifest: Self = serde_yaml::from_str(source)?;
        for root in &manifest.content_roots {
            let escapes = root.is_absolute()
                || root
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
            if escapes {
                return Err(ManifestError::RootOutsideProject(
                    root.display().to_string(),
                ));
            }
        }
        Ok(manifest)
    }
}

/// An open project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    name: String,
    id: String,
    base: PathBuf,
    content_roots: Vec<PathBuf>,
    plain_text: PlainTextTypes,
}

impl Project {
    /// Project whose only content root is its base directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self::open(base, &ProjectManifest::default(), PlainTextTypes::default())
    }

    /// Build a project from its base directory and manifest.
    ///
    /// `base` should already be absolute and canonical; the project id is
    /// derived from it.
    pub fn open(
        base: impl Into<PathBuf>,
        manifest: &ProjectManifest,
        mut plain_text: PlainTextTypes,
    ) -> Self {
        let base = base.into();
        let name = base
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string();
        let id = format!("{}.{}", name, location_hash(&base));

        let mut content_roots: Vec<PathBuf> = if manifest.content_roots.is_empty() {
            vec![base.clone()]
        } else {
            manifest
                .content_roots
                .iter()
                .map(|root| base.join(root))
                .collect()
        };
        content_roots.sort();
        content_roots.dedup();

        plain_text.extend(&manifest.plain_text_extensions);

        Self {
            name,
            id,
            base,
            content_roots,
            plain_text,
        }
    }

    /// Replace the content roots (absolute paths).
    #[cfg(test)]
    pub(crate) fn with_content_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.content_roots = roots.into_iter().map(Into::into).collect();
        self.content_roots.sort();
        self.content_roots.dedup();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable identifier used as the settings key.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn content_roots(&self) -> &[PathBuf] {
        &self.content_roots
    }

    pub fn plain_text(&self) -> &PlainTextTypes {
        &self.plain_text
    }

    /// Roots to enumerate for the backfill: nested roots are covered by
    /// their ancestors.
    pub fn scan_roots(&self) -> Vec<&Path> {
        let mut roots: Vec<&Path> = Vec::new();
        for root in &self.content_roots {
            if !roots.iter().any(|r| root.starts_with(r)) {
                roots.push(root);
            }
        }
        roots
    }

    /// The deepest content root containing `path`.
    pub fn content_root_for(&self, path: &Path) -> Option<&Path> {
        self.content_roots
            .iter()
            .filter(|root| path.starts_with(root) && path != root.as_path())
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }

    /// Path written into the header: relative to the nearest content root
    /// with `/` separators, or the absolute path outside every root.
    pub fn render_path(&self, path: &Path) -> String {
        self.content_root_for(path)
            .and_then(|root| path.strip_prefix(root).ok())
            .and_then(slash_path)
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }

    fn depth_of(&self, path: &Path) -> Option<usize> {
        std::iter::once(&self.base)
            .chain(&self.content_roots)
            .filter(|dir| path.starts_with(dir))
            .map(|dir| dir.components().count())
            .max()
    }
}

/// Join normal components with `/`. `None` for empty or non-UTF-8 paths.
fn slash_path(relative: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    let parts = parts?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// First 16 hex characters of the SHA-256 of the project location.
fn location_hash(base: &Path) -> String {
    let digest = Sha256::digest(base.to_string_lossy().as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(16);
    hash
}

/// The set of open projects.
#[derive(Debug, Default, Clone)]
pub struct ProjectRegistry {
    projects: Vec<Project>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project. A project with the same id replaces the old one.
    pub fn open(&mut self, project: Project) {
        self.projects.retain(|p| p.id() != project.id());
        self.projects.push(project);
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// The project owning `path`; with nested projects the innermost wins.
    pub fn project_for(&self, path: &Path) -> Option<&Project> {
        self.projects
            .iter()
            .filter_map(|p| p.depth_of(path).map(|depth| (depth, p)))
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, p)| p)
    }
}
