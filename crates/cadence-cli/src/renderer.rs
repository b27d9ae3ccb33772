//! Terminal output for the markdown produced by `cadence_core::display`.

use std::fmt::Display;

use termimad::{crossterm::style::Color, MadSkin};

/// Prints markdown through termimad, or verbatim when color is disabled.
pub struct TerminalRenderer {
    rich_enabled: bool,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new(rich_enabled: bool) -> Self {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(Color::Cyan);
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.inline_code.set_fg(Color::Green);
        skin.code_block.set_bg(Color::AnsiValue(236));

        Self { rich_enabled, skin }
    }

    pub fn render(&self, content: impl Display) {
        let markdown = content.to_string();
        if !self.rich_enabled {
            print!("{markdown}");
            return;
        }

        // headers keep their hashes so ids and numbering stay visible
        for line in markdown.lines() {
            if line.starts_with('#') {
                println!("\x1b[36m{line}\x1b[0m");
            } else {
                self.skin.print_inline(line);
                println!();
            }
        }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}
