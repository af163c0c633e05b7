use crate::app::InputMode;
use crate::theme;
use chrono::{DateTime, Local};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use stool_core::{CategoryCounts, StageCategory};
use stool_dashboard::{LogPane, TableRow};

pub struct Screen<'a> {
    pub base_url: &'a str,
    pub columns: &'a [String],
    pub rows: &'a [&'a TableRow],
    pub total_rows: usize,
    pub last_error: Option<&'a str>,
    pub last_refreshed: Option<DateTime<Local>>,
    pub status: Option<&'a str>,
    pub query: &'a str,
    pub category: StageCategory,
    pub counts: CategoryCounts,
    pub input_mode: &'a InputMode,
    pub input: &'a str,
    pub show_help: bool,
    pub pane: &'a LogPane,
    pub spinner: &'a str,
}

pub fn render(f: &mut Frame, screen: &Screen<'_>, table_state: &mut TableState) {
    let area = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, screen, layout[0]);
    render_table(f, screen, table_state, layout[1]);
    render_footer(f, screen, layout[2]);

    if screen.pane.is_visible() {
        render_log_pane(f, screen, centered(area, 90, 85));
    } else if screen.show_help {
        render_help(f, centered(area, 60, 70));
    }
}

fn render_header(f: &mut Frame, screen: &Screen<'_>, area: Rect) {
    let refreshed = screen
        .last_refreshed
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let mut spans = vec![
        Span::styled(screen.base_url, Style::default().fg(theme::ACCENT)),
        Span::raw(format!(
            "  stages: {}/{}  refreshed: {refreshed}",
            screen.rows.len(),
            screen.total_rows
        )),
    ];
    if let Some(error) = screen.last_error {
        spans.push(Span::styled(
            format!("  refresh failed: {error}"),
            Style::default().fg(theme::ERROR),
        ));
    }
    let block = Block::default().borders(Borders::ALL).title("Stages");
    let text = vec![Line::from(spans), category_tabs(screen)];
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn category_tabs(screen: &Screen<'_>) -> Line<'static> {
    let mut spans = Vec::with_capacity(StageCategory::TABS.len() * 2);
    for tab in StageCategory::TABS {
        let label = format!(" {tab} {} ", screen.counts.get(tab));
        let style = if tab == screen.category {
            theme::TAB_ACTIVE.bg(theme::category_color(tab))
        } else {
            theme::TAB_IDLE
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn render_table(f: &mut Frame, screen: &Screen<'_>, table_state: &mut TableState, area: Rect) {
    if screen.rows.is_empty() {
        let message = if screen.total_rows > 0 && screen.query.is_empty() {
            format!("No stages in {}", screen.category)
        } else if screen.total_rows > 0 {
            format!("No stages match /{}", screen.query)
        } else if let Some(error) = screen.last_error {
            format!("No stages: {error}")
        } else {
            "No stages".to_string()
        };
        let text = vec![
            Line::from(Span::styled(message, Color::Yellow)),
            Line::from(""),
            Line::from("Press u to refresh, q to quit."),
        ];
        let block = Block::default().borders(Borders::ALL).title("Stages");
        f.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), area);
        return;
    }

    let status_index = screen.columns.iter().position(|column| column == "status");
    let rows: Vec<Row> = screen
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut cells = Vec::with_capacity(row.cells.len() + 1);
            let name = match &row.broken {
                Some(_) => Line::from(vec![
                    Span::raw(row.name.clone()),
                    Span::styled(" [broken]", theme::BROKEN_BADGE),
                ]),
                None => Line::from(row.name.clone()),
            };
            cells.push(Cell::from(name));
            for (column, value) in row.cells.iter().enumerate() {
                let style = if Some(column) == status_index {
                    Style::default().fg(theme::status_color(value))
                } else {
                    Style::default()
                };
                cells.push(Cell::from(Span::styled(value.clone(), style)));
            }
            Row::new(cells).style(theme::row_style(index, row.broken.is_some()))
        })
        .collect();

    let mut widths = vec![Constraint::Length(24)];
    widths.extend(screen.columns.iter().map(|_| Constraint::Min(8)));
    let mut header = vec!["name".to_string()];
    header.extend(screen.columns.iter().cloned());

    let title = match (screen.category, screen.query.is_empty()) {
        (StageCategory::All, true) => "Stages".to_string(),
        (StageCategory::All, false) => format!("Stages /{}", screen.query),
        (category, true) => format!("Stages [{category}]"),
        (category, false) => format!("Stages [{category}] /{}", screen.query),
    };
    let table = Table::new(rows, widths)
        .header(Row::new(header).style(theme::COLUMN_HEADER))
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(theme::CURSOR);
    f.render_stateful_widget(table, area, table_state);
}

fn render_footer(f: &mut Frame, screen: &Screen<'_>, area: Rect) {
    let line = match screen.input_mode {
        InputMode::Search => Line::from(vec![
            Span::styled("search: ", Style::default().fg(theme::ACCENT)),
            Span::raw(screen.query),
        ]),
        InputMode::Arguments(action) => Line::from(vec![
            Span::styled(format!("{action} arguments: "), Style::default().fg(theme::ACCENT)),
            Span::raw(screen.input),
        ]),
        InputMode::Normal => match screen.status {
            Some(status) => Line::from(Span::styled(status, Style::default().fg(theme::MUTED))),
            None => Line::from(Span::styled(
                "s start  S start with arguments  t stop  r restart  D delete  l logs  c tab  / search  ? help  q quit",
                Style::default().fg(theme::MUTED),
            )),
        },
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_log_pane(f: &mut Frame, screen: &Screen<'_>, area: Rect) {
    let pane = screen.pane;
    let title = if pane.is_running() {
        format!("{} {}", pane.title(), screen.spinner)
    } else {
        pane.title().to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);

    let total = pane.text().lines().count().min(u16::MAX as usize) as u16;
    let bottom = total.saturating_sub(inner.height);
    let offset = bottom.saturating_sub(pane.scroll_back());

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(pane.text()).block(block).scroll((offset, 0)),
        area,
    );
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let keys = [
        ("j / Down", "Next stage"),
        ("k / Up", "Previous stage"),
        ("s", "Start"),
        ("S", "Start with arguments"),
        ("t", "Stop"),
        ("r", "Restart (stop, then start)"),
        ("D", "Delete"),
        ("l", "List log files"),
        ("u / F5", "Refresh now"),
        ("c / Tab", "Next category tab"),
        ("/", "Search"),
        ("Esc", "Close log view / clear search"),
        ("?", "Toggle help"),
        ("q", "Quit"),
    ];
    let mut text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(keys.iter().map(|(key, label)| {
        Line::from(vec![
            Span::styled(format!("{key:<10}"), Color::Cyan),
            Span::raw(format!(" {label}")),
        ])
    }));

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
