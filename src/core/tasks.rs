//! # Task Chain
//!
//! Sequential, named progress reporting. Each call to [`TaskChain::next`]
//! closes the running step as succeeded and opens a new one; [`TaskChain::end`]
//! closes the last one. At most one step is ever running.
//!
//! Rendering is fixed at construction: an `indicatif` spinner drawn on the
//! prompt terminal when interactive, or timestamped `log` lines otherwise.

use chrono::{DateTime, Local};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::system::prompt::PromptService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub label: String,
    pub started_at: DateTime<Local>,
    pub status: TaskStatus,
    pub elapsed: Option<Duration>,
    started: Instant,
}

enum Renderer {
    Spinner(ProgressBar),
    Lines,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spinner(_) => f.write_str("Spinner"),
            Self::Lines => f.write_str("Lines"),
        }
    }
}

#[derive(Debug, Default)]
struct ChainState {
    entries: Vec<TaskEntry>,
    active: Option<usize>,
}

#[derive(Debug)]
pub struct TaskChain {
    renderer: Renderer,
    state: Mutex<ChainState>,
}

impl TaskChain {
    /// Picks the renderer from the (already resolved) interactivity flag.
    pub fn new(interactive: bool, prompt: &PromptService) -> Self {
        if interactive {
            let target = ProgressDrawTarget::term(prompt.output(), 15);
            Self::with_spinner(ProgressBar::with_draw_target(None, target))
        } else {
            Self::lines()
        }
    }

    /// A chain that renders discrete log lines, for CI and redirected output.
    pub fn lines() -> Self {
        Self {
            renderer: Renderer::Lines,
            state: Mutex::new(ChainState::default()),
        }
    }

    fn with_spinner(bar: ProgressBar) -> Self {
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        Self {
            renderer: Renderer::Spinner(bar),
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.renderer, Renderer::Spinner(_))
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Finishes the running step (if any) as succeeded and starts `label`.
    pub fn next(&self, label: impl Into<String>) {
        let label = label.into();
        let mut state = self.lock();
        self.finish_active(&mut state, TaskStatus::Succeeded);

        let entry = TaskEntry {
            label: label.clone(),
            started_at: Local::now(),
            status: TaskStatus::Running,
            elapsed: None,
            started: Instant::now(),
        };
        state.entries.push(entry);
        state.active = Some(state.entries.len().saturating_sub(1));

        match &self.renderer {
            Renderer::Spinner(bar) => {
                bar.set_message(label);
                bar.enable_steady_tick(Duration::from_millis(80));
            }
            Renderer::Lines => {
                log::info!("[{}] > {}", Local::now().format("%H:%M:%S"), label);
            }
        }
    }

    /// Finishes the running step (if any) as failed.
    pub fn fail(&self) {
        let mut state = self.lock();
        self.finish_active(&mut state, TaskStatus::Failed);
        if let Renderer::Spinner(bar) = &self.renderer {
            bar.disable_steady_tick();
            bar.set_message("");
        }
    }

    /// Finishes the running step (if any) as succeeded and flushes output.
    pub fn end(&self) {
        let mut state = self.lock();
        self.finish_active(&mut state, TaskStatus::Succeeded);
        if let Renderer::Spinner(bar) = &self.renderer {
            bar.disable_steady_tick();
            bar.set_message("");
            bar.tick();
        }
    }

    /// A snapshot of every step started so far, in order.
    pub fn entries(&self) -> Vec<TaskEntry> {
        self.lock().entries.clone()
    }

    pub fn running_count(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.status == TaskStatus::Running)
            .count()
    }

    fn finish_active(&self, state: &mut ChainState, status: TaskStatus) {
        let Some(index) = state.active.take() else {
            return;
        };
        let Some(entry) = state.entries.get_mut(index) else {
            return;
        };

        let elapsed = entry.started.elapsed();
        entry.status = status;
        entry.elapsed = Some(elapsed);

        let verdict = match status {
            TaskStatus::Failed => "failed!",
            _ => "done!",
        };
        match &self.renderer {
            Renderer::Spinner(bar) => {
                let mark = match status {
                    TaskStatus::Failed => "✖".red(),
                    _ => "✔".green(),
                };
                bar.println(format!(
                    "{} {} {}",
                    mark,
                    entry.label,
                    format!("in {}ms", elapsed.as_millis()).dimmed()
                ));
            }
            Renderer::Lines => {
                let line = format!(
                    "[{}] {} - {}",
                    Local::now().format("%H:%M:%S"),
                    entry.label,
                    verdict
                );
                if status == TaskStatus::Failed {
                    log::error!("{}", line);
                } else {
                    log::info!("{}", line);
                }
            }
        }
    }
}
