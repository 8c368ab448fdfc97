// src/constants.rs

use std::time::Duration;

/// The name of the project file that marks the root of an Ionic app.
pub const PROJECT_FILE: &str = "ionic.config.json";

/// The name of the global configuration file (inside the config directory).
pub const CONFIG_FILE: &str = "config.json";

/// The name of the default config directory, relative to the user's home.
pub const DEFAULT_CONFIG_DIRNAME: &str = ".ionic";

/// Overrides the config directory when set.
pub const CONFIG_DIRECTORY_ENV: &str = "IONIC_CONFIG_DIRECTORY";

/// Set by a global install that bypassed an unusable local install.
pub const LOCAL_ERROR_ENV: &str = "IONIC_CLI_LOCAL_ERROR";

/// The value of [`LOCAL_ERROR_ENV`] meaning the local install was too old.
pub const ERROR_VERSION_TOO_OLD: &str = "VERSION_TOO_OLD";

/// env_logger filter override.
pub const LOG_ENV: &str = "IONIC_LOG";

pub const DEFAULT_API_URL: &str = "https://api.ionicjs.com";
pub const DEFAULT_NPM_CLIENT: &str = "npm";

// --- Serve ---

pub const BIND_ALL_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8100;
pub const DEFAULT_LIVERELOAD_PORT: u16 = 35729;
pub const DEFAULT_DEV_LOGGER_PORT: u16 = 53703;
pub const BROWSERS: &[&str] = &["safari", "firefox", "google chrome"];

/// How long the dev server has to start accepting connections.
pub const DEV_SERVER_READY_TIMEOUT: Duration = Duration::from_secs(120);

// --- Broadcast ---

pub const BROADCAST_ADDRESS: &str = "255.255.255.255";
pub const BROADCAST_PORT: u16 = 41234;
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(3);

/// Proxy variables surfaced (read-only) in `ionic info`.
pub const PROXY_ENVIRONMENT_VARIABLES: &[&str] = &[
    "http_proxy",
    "HTTP_PROXY",
    "https_proxy",
    "HTTPS_PROXY",
    "IONIC_HTTP_PROXY",
];

/// Variables whose presence means the process runs under CI.
pub const CI_ENVIRONMENT_VARIABLES: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "BUILD_NUMBER",
    "BUILD_ID",
    "RUN_ID",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "TEAMCITY_VERSION",
    "BUILDKITE",
    "TF_BUILD",
];
