//! # Project Detection
//!
//! Classifies a directory as one of the supported app kinds and wraps it in a
//! [`Project`]. A directory that is not an app yields [`Project::Outside`], a
//! null object whose read-only methods return defaults.

use crate::constants::PROJECT_FILE;
use crate::models::{InfoGroup, InfoItem, ProjectMetadata};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("This command must be run inside an Ionic project (no '{0}' found).")]
    OutsideProject(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectKind {
    Angular,
    IonicAngular,
    Ionic1,
    Custom,
}

impl ProjectKind {
    pub const ALL: [Self; 4] = [Self::Angular, Self::IonicAngular, Self::Ionic1, Self::Custom];

    /// The value stored in the `type` field of `ionic.config.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Angular => "angular",
            Self::IonicAngular => "ionic-angular",
            Self::Ionic1 => "ionic1",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value.trim())
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Angular => "Ionic Angular",
            Self::IonicAngular => "Ionic Angular (ionic-angular)",
            Self::Ionic1 => "Ionic 1",
            Self::Custom => "Custom",
        }
    }

    /// The npm package whose installed version identifies the framework.
    pub fn framework_package(&self) -> Option<&'static str> {
        match self {
            Self::Angular => Some("@ionic/angular"),
            Self::IonicAngular => Some("ionic-angular"),
            Self::Ionic1 | Self::Custom => None,
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The app the CLI operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Project {
    Outside {
        file_name: String,
    },
    Typed {
        root: PathBuf,
        file_name: String,
        kind: ProjectKind,
    },
}

impl Project {
    pub fn outside() -> Self {
        Self::Outside {
            file_name: PROJECT_FILE.to_string(),
        }
    }

    pub fn is_outside(&self) -> bool {
        matches!(self, Self::Outside { .. })
    }

    pub fn kind(&self) -> Option<ProjectKind> {
        match self {
            Self::Outside { .. } => None,
            Self::Typed { kind, .. } => Some(*kind),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        match self {
            Self::Outside { .. } => None,
            Self::Typed { root, .. } => Some(root),
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            Self::Outside { file_name } | Self::Typed { file_name, .. } => file_name,
        }
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.root().map(|root| root.join(self.file_name()))
    }

    /// Reads the project file. Outside a project this is the default metadata.
    pub fn load(&self) -> Result<ProjectMetadata, ProjectError> {
        let Some(path) = self.file_path() else {
            return Ok(ProjectMetadata::default());
        };
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| ProjectError::Parse { path, source: e })
    }

    /// The root and kind of a real project; an error outside one.
    pub fn require(&self) -> Result<(&Path, ProjectKind), ProjectError> {
        match self {
            Self::Typed { root, kind, .. } => Ok((root, *kind)),
            Self::Outside { file_name } => Err(ProjectError::OutsideProject(file_name.clone())),
        }
    }

    /// Project entries for `ionic info`. Empty outside a project.
    pub fn get_info(&self) -> Vec<InfoItem> {
        let Self::Typed { root, kind, .. } = self else {
            return Vec::new();
        };

        let mut info = vec![InfoItem::new(InfoGroup::Project, "type", kind.display_name())];

        match self.load() {
            Ok(meta) if !meta.name.is_empty() => {
                info.push(InfoItem::new(InfoGroup::Project, "name", meta.name));
            }
            Ok(_) => {}
            Err(e) => log::debug!("Could not read project file for info: {}", e),
        }

        if let Some(package) = kind.framework_package() {
            let package_dir = root.join("node_modules").join(package);
            let version = read_package_version(&package_dir)
                .unwrap_or_else(|| "not installed".to_string());
            info.push(
                InfoItem::new(InfoGroup::Project, package, version)
                    .with_path(package_dir.display().to_string()),
            );
        }
        info
    }
}

/// Classifies `dir` by its marker files, most specific signature first:
///
/// 1. an explicit `type` in `ionic.config.json`;
/// 2. a framework dependency in `package.json`;
/// 3. Ionic 1 layout (`bower.json` or `www/lib/ionic`) next to an `ionic.config.json`.
pub fn determine_type(dir: &Path) -> Option<ProjectKind> {
    let project_file = dir.join(PROJECT_FILE);

    if let Some(declared) = read_json(&project_file)
        .as_ref()
        .and_then(|json| json.get("type"))
        .and_then(Value::as_str)
    {
        match ProjectKind::parse(declared) {
            Some(kind) => return Some(kind),
            None => log::warn!("Unknown project type '{}' in {}", declared, project_file.display()),
        }
    }

    if let Some(package) = read_json(&dir.join("package.json")) {
        if has_dependency(&package, "@ionic/angular") {
            return Some(ProjectKind::Angular);
        }
        if has_dependency(&package, "ionic-angular") {
            return Some(ProjectKind::IonicAngular);
        }
    }

    if project_file.is_file()
        && (dir.join("bower.json").is_file() || dir.join("www").join("lib").join("ionic").is_dir())
    {
        return Some(ProjectKind::Ionic1);
    }

    None
}

/// Builds the project handle for an already-classified directory. Does not
/// touch the filesystem.
pub fn create_from_project_type(dir: &Path, file_name: &str, kind: ProjectKind) -> Project {
    Project::Typed {
        root: dir.to_path_buf(),
        file_name: file_name.to_string(),
        kind,
    }
}

/// Resolves the project for an optional base directory found during bootstrap.
pub fn get_project(project_dir: Option<&Path>) -> Project {
    let Some(dir) = project_dir else {
        return Project::outside();
    };

    match determine_type(dir) {
        Some(kind) => create_from_project_type(dir, PROJECT_FILE, kind),
        None => {
            log::debug!("Could not determine project type for '{}'.", dir.display());
            Project::outside()
        }
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(json) => Some(json),
        Err(e) => {
            log::debug!("Ignoring malformed '{}': {}", path.display(), e);
            None
        }
    }
}

fn has_dependency(package: &Value, name: &str) -> bool {
    ["dependencies", "devDependencies"]
        .iter()
        .any(|section| package.get(*section).and_then(|deps| deps.get(name)).is_some())
}

fn read_package_version(package_dir: &Path) -> Option<String> {
    read_json(&package_dir.join("package.json"))?
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
}
