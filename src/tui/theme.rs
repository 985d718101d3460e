//! Colors and styles for the dataset screens.

use ratatui::style::{Color, Modifier, Style};

pub struct Theme;

impl Theme {
    pub const ACCENT: Color = Color::Rgb(45, 212, 191);
    pub const OK: Color = Color::Rgb(132, 204, 22);
    pub const BUSY: Color = Color::Rgb(245, 158, 11);
    pub const FAILURE: Color = Color::Rgb(244, 63, 94);

    pub const FG: Color = Color::Rgb(226, 232, 240);
    pub const FG_MUTED: Color = Color::Rgb(148, 163, 184);
    pub const FG_FAINT: Color = Color::Rgb(71, 85, 105);

    /// List cursor background
    pub const CURSOR_BG: Color = Color::Rgb(30, 41, 59);

    pub const FRAME: Color = Color::Rgb(51, 65, 85);
    pub const FRAME_ACTIVE: Color = Color::Rgb(56, 189, 248);

    pub const fn text() -> Style {
        Style::new().fg(Self::FG)
    }

    pub const fn text_secondary() -> Style {
        Style::new().fg(Self::FG_MUTED)
    }

    pub const fn text_dim() -> Style {
        Style::new().fg(Self::FG_FAINT)
    }

    pub const fn title() -> Style {
        Style::new().fg(Self::ACCENT).add_modifier(Modifier::BOLD)
    }

    pub const fn heading() -> Style {
        Style::new().fg(Self::FG).add_modifier(Modifier::BOLD)
    }

    pub const fn success() -> Style {
        Style::new().fg(Self::OK)
    }

    pub const fn error() -> Style {
        Style::new().fg(Self::FAILURE)
    }

    pub const fn border() -> Style {
        Style::new().fg(Self::FRAME)
    }

    pub const fn border_focused() -> Style {
        Style::new().fg(Self::FRAME_ACTIVE)
    }

    pub const fn cursor_row() -> Style {
        Style::new().bg(Self::CURSOR_BG).add_modifier(Modifier::BOLD)
    }

    /// Column headers in the list and the row modals
    pub const fn table_header() -> Style {
        Style::new()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD.union(Modifier::UNDERLINED))
    }

    pub const fn checked() -> Style {
        Style::new().fg(Self::OK).add_modifier(Modifier::BOLD)
    }

    pub const fn shortcut_key() -> Style {
        Self::title()
    }

    pub const fn shortcut_desc() -> Style {
        Self::text_secondary()
    }

    /// Spinner and "working" labels
    pub const fn active() -> Style {
        Style::new().fg(Self::BUSY).add_modifier(Modifier::BOLD)
    }

    /// Server status tag shown next to a dataset name
    pub const fn badge_status() -> Style {
        Style::new()
            .fg(Color::Black)
            .bg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }
}

pub struct Icons;

impl Icons {
    pub const CHECKED: &'static str = "[x]";
    pub const UNCHECKED: &'static str = "[ ]";
    pub const ERROR: &'static str = "✗";
    pub const OK: &'static str = "✓";
    pub const CURSOR: &'static str = "▌";
    pub const SELECTED: &'static str = "▶";
    const SPINNER: [&'static str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

    pub fn spinner(tick: usize) -> &'static str {
        Self::SPINNER[tick % Self::SPINNER.len()]
    }
}
