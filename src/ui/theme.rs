//! Terminal palette for the migrate and wifi consoles.

use owo_colors::Style;
use std::sync::OnceLock;

static PALETTE: OnceLock<Palette> = OnceLock::new();

/// Role-based styles; every role is unstyled when colors are off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    colors: bool,
}

impl Palette {
    /// Colors only on an interactive terminal without `NO_COLOR`
    pub fn detect() -> Self {
        let colors = std::env::var_os("NO_COLOR").is_none() && console::Term::stdout().is_term();
        Self { colors }
    }

    pub fn with_colors(colors: bool) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> bool {
        self.colors
    }

    fn pick(&self, style: Style) -> Style {
        if self.colors { style } else { Style::new() }
    }

    pub fn heading(&self) -> Style {
        self.pick(Style::new().bright_cyan().bold())
    }

    pub fn ok(&self) -> Style {
        self.pick(Style::new().green().bold())
    }

    pub fn fail(&self) -> Style {
        self.pick(Style::new().red().bold())
    }

    pub fn caution(&self) -> Style {
        self.pick(Style::new().yellow())
    }

    /// Field labels and hints
    pub fn muted(&self) -> Style {
        self.pick(Style::new().dimmed())
    }

    /// Play counts and other figures
    pub fn figure(&self) -> Style {
        self.pick(Style::new().bright_magenta().bold())
    }

    /// Network names and addresses
    pub fn network(&self) -> Style {
        self.pick(Style::new().blue().underline())
    }
}

pub fn palette() -> Palette {
    *PALETTE.get_or_init(Palette::detect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use owo_colors::OwoColorize;

    #[test]
    fn test_colored_palette_emits_escapes() {
        let palette = Palette::with_colors(true);
        assert!(palette.colors());
        let text = format!("{}", "42".style(palette.figure()));
        assert!(text.contains("\u{1b}["));
        assert!(text.contains("42"));
    }
}
