//! Application context: unified state passed to every command handler.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::ports::{ConfigStore, NoopReporter};
use crate::domain::ProvisionConfig;
use crate::infra::config::YamlConfigStore;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, Reporter, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Global flags from the top-level CLI.
#[derive(Debug, Clone, Default)]
pub struct AppFlags {
    pub config: Option<PathBuf>,
    pub environment: Option<String>,
    pub json: bool,
    pub quiet: bool,
    pub no_color: bool,
    pub yes: bool,
}

/// Constructed once in `Cli::run()` and passed as `&AppContext` to all
/// command handlers.
pub struct AppContext {
    pub output: OutputContext,
    pub mode: OutputMode,
    pub config_store: YamlConfigStore,
    /// Skip interactive prompts.
    ///
    /// Set by `--yes`, or when the `CI` or `OUTPOST_YES` environment
    /// variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    #[must_use]
    pub fn new(flags: AppFlags) -> Self {
        let ci_env = std::env::var_os("CI").is_some() || std::env::var_os("OUTPOST_YES").is_some();
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            mode,
            config_store: YamlConfigStore::new(flags.config, flags.environment),
            non_interactive: flags.yes || ci_env,
        }
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Load and validate `outpost.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or invalid.
    pub fn config(&self) -> Result<ProvisionConfig> {
        self.config_store.load()
    }

    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress sink for services; silent in JSON and quiet modes.
    #[must_use]
    pub fn reporter(&self) -> Reporter<'_> {
        if self.is_json() || self.output.quiet {
            Reporter::Silent(NoopReporter)
        } else {
            Reporter::Terminal(TerminalReporter::new(&self.output))
        }
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is set, returns `default` without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
