// src/system/terminal.rs

use crate::constants::CI_ENVIRONMENT_VARIABLES;
use std::collections::HashMap;
use std::io::{self, IsTerminal};

/// What the process knows about where its output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalInfo {
    /// Both stdin and stdout are attached to a real terminal.
    pub tty: bool,
    /// A continuous-integration environment was detected.
    pub ci: bool,
}

impl TerminalInfo {
    /// Inspects the real stdio handles and the given environment.
    pub fn detect(env: &HashMap<String, String>) -> Self {
        Self {
            tty: io::stdin().is_terminal() && io::stdout().is_terminal(),
            ci: is_ci(env),
        }
    }
}

/// CI is detected when any known CI variable is set to something other than
/// an explicit false value.
pub fn is_ci(env: &HashMap<String, String>) -> bool {
    CI_ENVIRONMENT_VARIABLES.iter().any(|var| {
        env.get(*var)
            .map(|value| {
                let value = value.trim().to_ascii_lowercase();
                !(value.is_empty() || value == "false" || value == "0")
            })
            .unwrap_or(false)
    })
}
