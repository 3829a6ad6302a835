//! Color scheme and styling for the TUI dashboard.

use hedged_requests::Strategy;
use ratatui::prelude::*;

pub const HEADER_BG: Color = Color::Rgb(30, 30, 46);
pub const HEADER_FG: Color = Color::Rgb(180, 190, 254);
pub const ACCENT: Color = Color::Rgb(137, 180, 250);

pub const GOOD: Color = Color::Rgb(166, 227, 161);
pub const BAD: Color = Color::Rgb(243, 139, 168);
pub const WARN: Color = Color::Rgb(249, 226, 175);

pub const BORDER: Color = Color::Rgb(69, 71, 90);
pub const TEXT: Color = Color::Rgb(205, 214, 244);
pub const MUTED: Color = Color::Rgb(127, 132, 156);

fn bold(fg: Color) -> Style {
    Style::default().fg(fg).add_modifier(Modifier::BOLD)
}

pub fn header_style() -> Style {
    bold(HEADER_FG).bg(HEADER_BG)
}

pub fn title_style() -> Style {
    bold(TEXT)
}

pub fn table_header_style() -> Style {
    bold(ACCENT)
}

pub fn selected_row_style() -> Style {
    bold(Color::Black).bg(ACCENT)
}

pub fn border_style() -> Style {
    Style::default().fg(BORDER)
}

pub fn text_style() -> Style {
    Style::default().fg(TEXT)
}

pub fn success_style() -> Style {
    bold(GOOD)
}

pub fn error_style() -> Style {
    bold(BAD)
}

pub fn highlight_style() -> Style {
    bold(WARN)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn strategy_style(strategy: Strategy) -> Style {
    match strategy {
        Strategy::Simple => text_style(),
        Strategy::Fanout => highlight_style(),
        Strategy::Hedged => success_style(),
    }
}

/// Colors a latency relative to the stagger delay, i.e. the pool's p99.
pub fn latency_style(ms: f64, stagger_ms: f64) -> Style {
    if ms <= stagger_ms * 1.5 {
        success_style()
    } else if ms <= stagger_ms * 4.0 {
        highlight_style()
    } else {
        error_style()
    }
}
