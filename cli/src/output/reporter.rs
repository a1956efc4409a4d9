//! `ProgressReporter` implementations for the presentation layer.
//!
//! Services receive a [`Reporter`]; `--quiet` and `--json` select the
//! no-op variant when the context is built, so nothing below checks flags.

use std::cell::RefCell;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::{NoopReporter, ProgressReporter};
use crate::output::{OutputContext, progress};

/// Renders progress on the terminal.
///
/// On a TTY each `step` becomes a spinner that the next `success` or
/// `step` settles; otherwise every event is a plain line.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    active: RefCell<Option<(ProgressBar, String)>>,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            active: RefCell::new(None),
        }
    }

    /// Settle the running spinner, if any, as completed.
    fn settle(&self) {
        if let Some((pb, msg)) = self.active.borrow_mut().take() {
            let tick = "✓".style(self.ctx.styles.success).to_string();
            progress::finish_with(&pb, &tick, &msg);
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.settle();
        if self.ctx.is_tty {
            let pb = progress::spinner(message);
            *self.active.borrow_mut() = Some((pb, message.trim_end_matches("...").to_string()));
        } else {
            println!("  {} {message}", "→".style(self.ctx.styles.info));
        }
    }

    fn success(&self, message: &str) {
        match self.active.borrow_mut().take() {
            Some((pb, _)) => {
                let tick = "✓".style(self.ctx.styles.success).to_string();
                progress::finish_with(&pb, &tick, message);
            }
            None => self.ctx.success(message),
        }
    }

    fn warn(&self, message: &str) {
        match &*self.active.borrow() {
            Some((pb, _)) => pb.suspend(|| self.ctx.warn(message)),
            None => self.ctx.warn(message),
        }
    }

    fn info(&self, message: &str) {
        match &*self.active.borrow() {
            Some((pb, _)) => pb.suspend(|| self.ctx.info(message)),
            None => self.ctx.info(message),
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        // A step still spinning here was interrupted by an error.
        if let Some((pb, _)) = self.active.get_mut().take() {
            pb.finish_and_clear();
        }
    }
}

/// Reporter selected for the current invocation.
pub enum Reporter<'a> {
    Terminal(TerminalReporter<'a>),
    Silent(NoopReporter),
}

impl ProgressReporter for Reporter<'_> {
    fn step(&self, message: &str) {
        match self {
            Self::Terminal(r) => r.step(message),
            Self::Silent(r) => r.step(message),
        }
    }

    fn success(&self, message: &str) {
        match self {
            Self::Terminal(r) => r.success(message),
            Self::Silent(r) => r.success(message),
        }
    }

    fn warn(&self, message: &str) {
        match self {
            Self::Terminal(r) => r.warn(message),
            Self::Silent(r) => r.warn(message),
        }
    }

    fn info(&self, message: &str) {
        match self {
            Self::Terminal(r) => r.info(message),
            Self::Silent(r) => r.info(message),
        }
    }
}
