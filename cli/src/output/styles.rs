//! Output styles using the owo-colors stylesheet pattern.

use owo_colors::Style;

/// Centralized stylesheet for CLI output colors. Every style is plain
/// until [`Styles::colored`] is used.
#[derive(Debug, Default, Clone, Copy)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Labels in key/value listings and table headers.
    pub dim: Style,
    pub header: Style,
    /// Values the operator is expected to copy, such as connection strings.
    pub highlight: Style,
}

impl Styles {
    #[must_use]
    pub fn colored() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            info: Style::new().blue(),
            dim: Style::new().dimmed(),
            header: Style::new().bold().cyan(),
            highlight: Style::new().bold(),
        }
    }
}
