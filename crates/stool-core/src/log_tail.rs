pub const DEFAULT_LOG_CAP_CHARS: usize = 100_000;

/// One response of the process log endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub data: String,
    pub next_offset: u64,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCursor {
    pub process_id: String,
    pub offset: u64,
    /// Length of the view's text after the last applied chunk.
    pub buffered_chars: usize,
}

impl LogCursor {
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            offset: 0,
            buffered_chars: 0,
        }
    }
}

/// What the view has to do after a chunk arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailStep {
    pub clear_first: bool,
    pub append: Option<String>,
    pub keep_polling: bool,
}

impl TailStep {
    pub fn has_new_data(&self) -> bool {
        self.append.is_some()
    }
}

/// Cursor bookkeeping for one tail session. Pure: the caller performs the
/// fetches and applies the returned steps to its view. The cap is checked
/// against what the view currently shows, which may include output of
/// earlier sessions written to the same view.
#[derive(Debug, Clone)]
pub struct TailState {
    cursor: LogCursor,
    cap_chars: usize,
    finished: bool,
}

impl TailState {
    pub fn new(process_id: impl Into<String>, cap_chars: usize) -> Self {
        Self {
            cursor: LogCursor::new(process_id),
            cap_chars,
            finished: false,
        }
    }

    pub fn cursor(&self) -> &LogCursor {
        &self.cursor
    }

    pub fn process_id(&self) -> &str {
        &self.cursor.process_id
    }

    pub fn offset(&self) -> u64 {
        self.cursor.offset
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `displayed_chars` is the length of the view's text before this chunk.
    pub fn apply(&mut self, chunk: LogChunk, displayed_chars: usize) -> TailStep {
        if self.finished {
            return TailStep::default();
        }

        let mut step = TailStep {
            keep_polling: chunk.running,
            ..TailStep::default()
        };

        // A size marker at or below the cursor carries nothing new.
        if chunk.next_offset > self.cursor.offset {
            self.cursor.offset = chunk.next_offset;
            step.clear_first = displayed_chars > self.cap_chars;
            let kept = if step.clear_first { 0 } else { displayed_chars };
            self.cursor.buffered_chars = kept + chunk.data.chars().count();
            step.append = Some(chunk.data);
        }

        if !chunk.running {
            self.finished = true;
        }
        step
    }
}

/// Text shown in a log view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBuffer {
    text: String,
    chars: usize,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, step: &TailStep) {
        if step.clear_first {
            self.clear();
        }
        if let Some(data) = &step.append {
            self.push(data);
        }
    }

    pub fn push(&mut self, data: &str) {
        self.text.push_str(data);
        self.chars += data.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
