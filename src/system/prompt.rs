// src/system/prompt.rs

use console::Term;
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("User Interface Error: {0}")]
    Dialoguer(#[from] dialoguer::Error),
    #[error("Cannot prompt for '{0}' in non-interactive mode.")]
    NonInteractive(String),
}

/// Asks the user questions, or falls back to defaults when the process is
/// not interactive.
#[derive(Debug, Clone)]
pub struct PromptService {
    interactive: bool,
    confirm: bool,
    output: Term,
}

impl PromptService {
    /// `confirm` pre-answers yes/no questions with "yes" (the `--confirm` flag).
    pub fn new(interactive: bool, confirm: bool) -> Self {
        Self {
            interactive,
            confirm,
            output: Term::stderr(),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// The terminal that interactive progress output is drawn on.
    pub fn output(&self) -> Term {
        self.output.clone()
    }

    pub fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError> {
        if self.confirm {
            return Ok(true);
        }
        if !self.interactive {
            log::debug!("Non-interactive: answering '{}' with {}", message, default);
            return Ok(default);
        }
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .default(default)
            .interact_on(&self.output)?)
    }

    /// Asks for a line of text. Without a terminal the default is used, and a
    /// question with no default is an error.
    pub fn input(&self, message: &str, default: Option<&str>) -> Result<String, PromptError> {
        if !self.interactive {
            return default
                .map(str::to_string)
                .ok_or_else(|| PromptError::NonInteractive(message.to_string()));
        }

        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme).with_prompt(message);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text_on(&self.output)?)
    }

    pub fn password(&self, message: &str) -> Result<String, PromptError> {
        if !self.interactive {
            return Err(PromptError::NonInteractive(message.to_string()));
        }
        Ok(Password::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .interact_on(&self.output)?)
    }
}
