//! Terminal output styled by the configured [`Theme`].

use crate::config::Theme;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Heading,
    Success,
    Warning,
    Error,
    Muted,
}

#[derive(Debug, Clone, Copy)]
pub struct Painter {
    theme: Theme,
    color: bool,
}

impl Painter {
    pub fn new(theme: Theme, color: bool) -> Self {
        Self { theme, color }
    }

    /// Colour only when stdout is a terminal and `NO_COLOR` is unset.
    pub fn for_stdout(theme: Theme) -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some();
        let color = std::io::stdout().is_terminal() && !no_color;
        Self::new(theme, color)
    }

    pub fn paint(&self, style: Style, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{}m{text}\x1b[0m", self.code(style))
    }

    fn code(&self, style: Style) -> &'static str {
        match (self.theme, style) {
            (Theme::Light, Style::Heading) => "1;34",
            (Theme::Dark, Style::Heading) => "1;96",
            (Theme::Light, Style::Success) => "32",
            (Theme::Dark, Style::Success) => "92",
            (Theme::Light, Style::Warning) => "33",
            (Theme::Dark, Style::Warning) => "93",
            (Theme::Light, Style::Error) => "31",
            (Theme::Dark, Style::Error) => "91",
            (Theme::Light, Style::Muted) => "90",
            (Theme::Dark, Style::Muted) => "37",
        }
    }

    /// Left-aligned table with a styled header row.
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let line = |cells: Vec<&str>| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, &w)| format!("{c:<w$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = self.paint(Style::Heading, &line(headers.to_vec()));
        for row in rows {
            out.push('\n');
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            out.push_str(&line(cells));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_has_no_escapes() {
        let p = Painter::new(Theme::Dark, false);
        assert_eq!(p.paint(Style::Success, "ok"), "ok");
    }

    #[test]
    fn test_themes_use_different_colours() {
        let light = Painter::new(Theme::Light, true).paint(Style::Heading, "x");
        let dark = Painter::new(Theme::Dark, true).paint(Style::Heading, "x");
        assert_ne!(light, dark);
        assert!(light.starts_with("\x1b[1;34m"));
    }

    #[test]
    fn test_table_alignment() {
        let p = Painter::new(Theme::Light, false);
        let out = p.table(
            &["ID", "NAME"],
            &[
                vec!["S1".into(), "Alice".into()],
                vec!["S100".into(), "Bob".into()],
            ],
        );
        assert_eq!(out, "ID    NAME\nS1    Alice\nS100  Bob");
    }
}
