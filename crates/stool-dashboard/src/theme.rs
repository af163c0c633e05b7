use ratatui::style::{Color, Modifier, Style};
use stool_core::StageCategory;

pub const ACCENT: Color = Color::Rgb(97, 175, 239);
pub const MUTED: Color = Color::Rgb(124, 134, 150);
pub const ERROR: Color = Color::Rgb(224, 108, 117);

pub const COLUMN_HEADER: Style = Style::new()
    .fg(ACCENT)
    .add_modifier(Modifier::BOLD.union(Modifier::UNDERLINED));
pub const CURSOR: Style = Style::new()
    .bg(Color::Rgb(44, 66, 99))
    .fg(Color::Rgb(232, 238, 246))
    .add_modifier(Modifier::BOLD);
pub const BROKEN_BADGE: Style = Style::new().fg(ERROR).add_modifier(Modifier::BOLD);
pub const TAB_ACTIVE: Style = Style::new()
    .fg(Color::Rgb(16, 22, 32))
    .bg(ACCENT)
    .add_modifier(Modifier::BOLD);
pub const TAB_IDLE: Style = Style::new().fg(MUTED);

pub const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Banded rows; a broken stage keeps a red tint until it is replaced.
pub fn row_style(index: usize, broken: bool) -> Style {
    let bg = match (broken, index % 3 == 2) {
        (true, _) => Color::Rgb(48, 24, 28),
        (false, true) => Color::Rgb(26, 32, 44),
        (false, false) => Color::Rgb(20, 24, 33),
    };
    Style::new().bg(bg)
}

pub fn status_color(status: &str) -> Color {
    match status.trim().to_lowercase().as_str() {
        "up" | "running" | "started" => Color::Rgb(152, 195, 121),
        "starting" | "stopping" | "pending" | "building" => Color::Rgb(229, 192, 123),
        "down" | "stopped" => MUTED,
        "broken" | "failed" | "error" => ERROR,
        _ => Color::Rgb(171, 178, 191),
    }
}

pub fn category_color(category: StageCategory) -> Color {
    match category {
        StageCategory::All => ACCENT,
        StageCategory::Trunks => Color::Rgb(152, 195, 121),
        StageCategory::Branches => Color::Rgb(198, 120, 221),
        StageCategory::Workspaces => Color::Rgb(86, 182, 194),
    }
}
