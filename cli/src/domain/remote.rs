//! Result of a remote command and helpers for describing commands safely.

/// Captured output of a command executed on a remote host.
///
/// A non-zero exit code is a normal result, not an error: callers decide
/// what a failed command means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

impl CommandResult {
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stderr, falling back to stdout when stderr is empty.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Number of leading words kept when a command is named in logs or errors.
const LABEL_WORDS: usize = 3;

/// Short label for a command that never includes arguments past the first
/// few words, so generated passwords do not end up in logs.
#[must_use]
pub fn command_label(command: &str) -> String {
    command
        .split_whitespace()
        .take(LABEL_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}
