use crate::tail::LogSink;
use std::collections::HashMap;
use stool_core::{CategoryCounts, ColumnRenderer, LogBuffer, StageCategory, StageRecord, StageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: RowId,
    pub name: String,
    pub cells: Vec<String>,
    pub origin: Option<String>,
    pub broken: Option<String>,
}

impl TableRow {
    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self
                .cells
                .iter()
                .any(|cell| cell.to_lowercase().contains(needle))
    }
}

/// Stage table as drawn by the terminal UI. Rows keep their position;
/// replaced rows get a fresh id in the same slot.
#[derive(Debug, Default)]
pub struct TableView {
    renderer: ColumnRenderer,
    rows: Vec<TableRow>,
    next_id: u64,
    bindings: HashMap<RowId, String>,
}

impl TableView {
    pub fn new(renderer: ColumnRenderer) -> Self {
        Self {
            renderer,
            ..Self::default()
        }
    }

    pub fn columns(&self) -> &[String] {
        self.renderer.columns()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&TableRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Stage an action on this row applies to; `None` while the row's
    /// controls are detached.
    pub fn action_target(&self, id: RowId) -> Option<&str> {
        self.bindings.get(&id).map(String::as_str)
    }

    /// Case-insensitive match over the name and every visible cell.
    pub fn filter(&self, query: &str) -> Vec<&TableRow> {
        self.filter_in(StageCategory::All, query)
    }

    /// Rows on the `category` tab that also match `query`.
    pub fn filter_in(&self, category: StageCategory, query: &str) -> Vec<&TableRow> {
        let needle = query.trim().to_lowercase();
        self.rows
            .iter()
            .filter(|row| category.admits(row.origin.as_deref()))
            .filter(|row| needle.is_empty() || row.matches(&needle))
            .collect()
    }

    pub fn category_counts(&self) -> CategoryCounts {
        CategoryCounts::tally(self.rows.iter().map(|row| row.origin.as_deref()))
    }

    fn build_row(&mut self, record: &StageRecord) -> TableRow {
        self.next_id += 1;
        TableRow {
            id: RowId(self.next_id),
            name: record.name.clone(),
            cells: self.renderer.cells(record),
            origin: record.origin(),
            broken: None,
        }
    }

    fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }
}

impl StageView for TableView {
    type Node = RowId;

    fn insert(&mut self, record: &StageRecord, _representation: &str) -> RowId {
        let row = self.build_row(record);
        let id = row.id;
        self.rows.push(row);
        id
    }

    fn replace(&mut self, node: &RowId, record: &StageRecord, _representation: &str) -> RowId {
        let row = self.build_row(record);
        let id = row.id;
        self.bindings.remove(node);
        match self.position(*node) {
            Some(index) => self.rows[index] = row,
            None => self.rows.push(row),
        }
        id
    }

    fn remove(&mut self, node: &RowId) {
        self.bindings.remove(node);
        self.rows.retain(|row| row.id != *node);
    }

    fn bind_actions(&mut self, node: &RowId) {
        if let Some(row) = self.row(*node) {
            let name = row.name.clone();
            self.bindings.insert(*node, name);
        }
    }

    fn unbind_actions(&mut self, node: &RowId) {
        self.bindings.remove(node);
    }

    fn mark_broken(&mut self, node: &RowId, message: &str) {
        if let Some(index) = self.position(*node) {
            self.rows[index].broken = Some(message.to_string());
        }
    }
}

/// Overlay that shows one process log, or a plain text listing.
#[derive(Debug, Default)]
pub struct LogPane {
    title: String,
    buffer: LogBuffer,
    running: bool,
    visible: bool,
    process_id: Option<String>,
    follow: bool,
    scroll_back: u16,
}

impl LogPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.buffer.clear();
        self.running = false;
        self.process_id = None;
        self.visible = true;
        self.follow = true;
        self.scroll_back = 0;
    }

    pub fn show_text(&mut self, title: impl Into<String>, text: &str) {
        self.open(title);
        self.buffer.push(text);
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.running = false;
        self.process_id = None;
        self.buffer.clear();
        self.scroll_back = 0;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn process_id(&self) -> Option<&str> {
        self.process_id.as_deref()
    }

    pub fn follows_tail(&self) -> bool {
        self.follow
    }

    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
        if self.scroll_back == 0 {
            self.follow = true;
        }
    }
}

impl LogSink for LogPane {
    fn started(&mut self, process_id: &str) {
        self.process_id = Some(process_id.to_string());
        self.running = true;
    }

    fn append(&mut self, data: &str) {
        self.buffer.push(data);
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }

    fn scroll_to_bottom(&mut self) {
        if self.follow {
            self.scroll_back = 0;
        }
    }

    fn buffered_chars(&self) -> usize {
        self.buffer.char_count()
    }

    fn finished(&mut self) {
        self.running = false;
    }

    fn report_failure(&mut self, message: &str) {
        self.running = false;
        self.buffer.push(&format!("failed: {message}\n"));
    }
}
