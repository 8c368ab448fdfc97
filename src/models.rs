// src/models.rs

use crate::constants::{DEFAULT_API_URL, DEFAULT_NPM_CLIENT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// --- Global configuration document (`config.json`) ---

/// The global configuration document.
///
/// Every field is optional on disk; the accessor methods resolve absent keys
/// to their documented defaults. Keys this version does not know about are
/// kept in `extra` so a save never drops them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<bool>,
    #[serde(rename = "npmClient", skip_serializing_if = "Option::is_none")]
    pub npm_client: Option<String>,
    #[serde(skip_serializing_if = "ConfigUrls::is_empty")]
    pub urls: ConfigUrls,
    #[serde(skip_serializing_if = "ConfigTokens::is_empty")]
    pub tokens: ConfigTokens,
    #[serde(skip_serializing_if = "ConfigUser::is_empty")]
    pub user: ConfigUser,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
}

impl ConfigUrls {
    fn is_empty(&self) -> bool {
        self.api.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigTokens {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ConfigTokens {
    fn is_empty(&self) -> bool {
        self.user.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ConfigUser {
    fn is_empty(&self) -> bool {
        self.id.is_none() && self.email.is_none()
    }
}

impl ConfigDocument {
    pub fn is_interactive(&self) -> bool {
        self.interactive.unwrap_or(true)
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry.unwrap_or(true)
    }

    pub fn npm_client(&self) -> &str {
        self.npm_client.as_deref().unwrap_or(DEFAULT_NPM_CLIENT)
    }

    pub fn api_url(&self) -> &str {
        self.urls.api.as_deref().unwrap_or(DEFAULT_API_URL)
    }
}

// --- Flags ---

/// Process-lifetime toggles computed once during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub interactive: bool,
    pub confirm: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            interactive: true,
            confirm: false,
            quiet: false,
            verbose: false,
        }
    }
}

// --- Project file (`ionic.config.json`) ---

/// The contents of a project's `ionic.config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProjectMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pro_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// --- Diagnostics ---

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum InfoGroup {
    Ionic,
    System,
    Environment,
    Project,
}

impl fmt::Display for InfoGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ionic => "ionic",
            Self::System => "system",
            Self::Environment => "environment",
            Self::Project => "project",
        };
        f.write_str(name)
    }
}

/// One line of `ionic info` output.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InfoItem {
    pub group: InfoGroup,
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flair: Option<String>,
}

impl InfoItem {
    pub fn new(group: InfoGroup, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group,
            key: key.into(),
            value: value.into(),
            path: None,
            flair: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_flair(mut self, flair: impl Into<String>) -> Self {
        self.flair = Some(flair.into());
        self
    }
}

// --- Serve ---

/// Where the dev server ended up listening. Produced once the server is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeDetails {
    pub protocol: String,
    pub local_address: String,
    pub external_address: String,
    pub port: u16,
}

impl ServeDetails {
    /// `<protocol>://<external address>:<port>`, the address other devices can reach.
    pub fn external_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.external_address, self.port)
    }

    pub fn local_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.local_address, self.port)
    }
}
