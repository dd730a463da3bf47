//! Terminal rendering for the dice overlay
//!
//! Builds whole frames as strings: a title for the character, and while a
//! roll is on screen a die box with the face value drawn in block digits.
//! Uses crossterm's styling but formats to String so frames can be tested
//! and written in one go.

use crossterm::style::{Attribute, Stylize};

use crate::db::Character;
use crate::sequencer::DisplaySnapshot;

/// Shown when the overlay was opened for an id with no character
pub const NOT_FOUND_MESSAGE: &str = "Character does not exist!";

/// Box drawing characters
pub struct BoxChars;

impl BoxChars {
    pub const TOP_LEFT: &'static str = "╭";
    pub const TOP_RIGHT: &'static str = "╮";
    pub const BOTTOM_LEFT: &'static str = "╰";
    pub const BOTTOM_RIGHT: &'static str = "╯";
    pub const HORIZONTAL: &'static str = "─";
    pub const VERTICAL: &'static str = "│";
}

/// Rows in a block digit
pub const GLYPH_HEIGHT: usize = 5;

fn glyph(c: char) -> [&'static str; GLYPH_HEIGHT] {
    match c {
        '0' => ["███", "█ █", "█ █", "█ █", "███"],
        '1' => ["  █", "  █", "  █", "  █", "  █"],
        '2' => ["███", "  █", "███", "█  ", "███"],
        '3' => ["███", "  █", "███", "  █", "███"],
        '4' => ["█ █", "█ █", "███", "  █", "  █"],
        '5' => ["███", "█  ", "███", "  █", "███"],
        '6' => ["███", "█  ", "███", "█ █", "███"],
        '7' => ["███", "  █", "  █", "  █", "  █"],
        '8' => ["███", "█ █", "███", "█ █", "███"],
        '9' => ["███", "█ █", "███", "  █", "███"],
        '-' => ["   ", "   ", "███", "   ", "   "],
        _ => ["   "; GLYPH_HEIGHT],
    }
}

/// Render a number in block digits, one string per row
pub fn big_number(n: i64) -> Vec<String> {
    let digits = n.to_string();
    (0..GLYPH_HEIGHT)
        .map(|row| {
            digits
                .chars()
                .map(|c| glyph(c)[row])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Unstyled die box around a face value
pub fn die_box(face: i64) -> Vec<String> {
    let rows = big_number(face);
    let content_width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
    let inner = (content_width + 4).max(11);

    let centered = |text: &str| {
        let len = text.chars().count();
        let left = (inner - len) / 2;
        let right = inner - len - left;
        format!(
            "{}{}{}{}{}",
            BoxChars::VERTICAL,
            " ".repeat(left),
            text,
            " ".repeat(right),
            BoxChars::VERTICAL
        )
    };

    let mut lines = Vec::with_capacity(GLYPH_HEIGHT + 4);
    lines.push(format!(
        "{}{}{}",
        BoxChars::TOP_LEFT,
        BoxChars::HORIZONTAL.repeat(inner),
        BoxChars::TOP_RIGHT
    ));
    lines.push(centered(""));
    lines.extend(rows.iter().map(|row| centered(row.as_str())));
    lines.push(centered(""));
    lines.push(format!(
        "{}{}{}",
        BoxChars::BOTTOM_LEFT,
        BoxChars::HORIZONTAL.repeat(inner),
        BoxChars::BOTTOM_RIGHT
    ));
    lines
}

/// Title line for a character's overlay
pub fn title(character: &Character) -> String {
    format!("Dice of {}", character.name)
}

/// Build one frame.
///
/// `None` for the character renders the not-found message; otherwise the
/// title, then the die while a roll is on screen.
pub fn frame(character: Option<&Character>, snapshot: &DisplaySnapshot) -> String {
    let Some(character) = character else {
        return format!("{}", NOT_FOUND_MESSAGE.red().bold());
    };

    let mut lines = vec![format!("{}", title(character).attribute(Attribute::Dim))];

    if let Some(roll) = &snapshot.current {
        lines.push(String::new());
        lines.extend(
            die_box(roll.rolled_number)
                .into_iter()
                .map(|line| format!("{}", line.white().bold())),
        );
    }

    if snapshot.pending > 0 {
        lines.push(String::new());
        lines.push(format!(
            "{}",
            format!("{} more waiting", snapshot.pending).dark_grey()
        ));
    }

    lines.join(ctrl::CRLF)
}

/// Frame prefixed with the control sequences that repaint the screen
pub fn screen(frame: &str) -> String {
    format!("{}{}{}", ctrl::clear_screen(), ctrl::move_to(1, 1), frame)
}

/// Terminal control sequences as strings
pub mod ctrl {
    use crossterm::cursor;
    use crossterm::terminal::{Clear, ClearType};
    use crossterm::Command;

    /// Clear screen
    pub fn clear_screen() -> String {
        let mut buf = String::new();
        let _ = Clear(ClearType::All).write_ansi(&mut buf);
        buf
    }

    /// Hide the cursor while the overlay owns the screen
    pub fn hide_cursor() -> String {
        let mut buf = String::new();
        let _ = cursor::Hide.write_ansi(&mut buf);
        buf
    }

    pub fn show_cursor() -> String {
        let mut buf = String::new();
        let _ = cursor::Show.write_ansi(&mut buf);
        buf
    }

    /// Move cursor to absolute position (1-indexed)
    pub fn move_to(row: u16, col: u16) -> String {
        format!("\x1b[{};{}H", row, col)
    }

    pub const CRLF: &str = "\r\n";
}
