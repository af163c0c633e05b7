use crate::ui;
use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::Backend, widgets::TableState, Terminal};
use std::io;
use std::sync::Arc;
use stool_core::{ActionRequest, StageAction, StageCategory};
use stool_dashboard::{
    ActionInvoker, ActionOutcome, DashboardConfig, HttpBackend, LogPane, RowId, SchedulerHandle,
    SharedController, StageBackend, TailSettings,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Arguments(StageAction),
}

pub struct App {
    pub config: DashboardConfig,
    backend: Arc<HttpBackend>,
    controller: SharedController,
    pane: Arc<Mutex<LogPane>>,
    scheduler: SchedulerHandle,
    invoker: Arc<ActionInvoker<HttpBackend>>,
    pub table_state: TableState,
    pub input_mode: InputMode,
    pub query: String,
    pub category: StageCategory,
    pub input: String,
    pub show_help: bool,
    pub status: Option<String>,
    pub last_refreshed: Option<DateTime<Local>>,
    pub spinner_frame: usize,
    seen_passes: u64,
    action: Option<JoinHandle<ActionOutcome>>,
    view_token: Option<CancellationToken>,
    should_quit: bool,
}

impl App {
    pub fn new(
        config: DashboardConfig,
        backend: Arc<HttpBackend>,
        controller: SharedController,
        scheduler: SchedulerHandle,
    ) -> Self {
        let invoker = ActionInvoker::new(backend.clone(), TailSettings::from_config(&config))
            .with_scheduler(scheduler.clone());
        Self {
            config,
            backend,
            controller,
            pane: Arc::new(Mutex::new(LogPane::new())),
            scheduler,
            invoker: Arc::new(invoker),
            table_state: TableState::default(),
            input_mode: InputMode::Normal,
            query: String::new(),
            category: StageCategory::All,
            input: String::new(),
            show_help: false,
            status: None,
            last_refreshed: None,
            spinner_frame: 0,
            seen_passes: 0,
            action: None,
            view_token: None,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn action_running(&self) -> bool {
        self.action
            .as_ref()
            .map(|join| !join.is_finished())
            .unwrap_or(false)
    }

    pub async fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        let controller = self.controller.clone();
        let pane = self.pane.clone();
        let controller = controller.lock().await;
        let pane = pane.lock().await;

        if controller.passes() != self.seen_passes {
            self.seen_passes = controller.passes();
            self.last_refreshed = Some(Local::now());
        }

        let rows = controller.view().filter_in(self.category, &self.query);
        clamp_selection(&mut self.table_state, rows.len());
        let screen = ui::Screen {
            base_url: &self.config.base_url,
            columns: controller.view().columns(),
            rows: &rows,
            total_rows: controller.view().rows().len(),
            last_error: controller.last_error(),
            last_refreshed: self.last_refreshed,
            status: self.status.as_deref(),
            query: &self.query,
            category: self.category,
            counts: controller.view().category_counts(),
            input_mode: &self.input_mode,
            input: &self.input,
            show_help: self.show_help,
            pane: &pane,
            spinner: crate::theme::SPINNER[self.spinner_frame % crate::theme::SPINNER.len()],
        };
        let table_state = &mut self.table_state;
        terminal.draw(|frame| ui::render(frame, &screen, table_state))?;
        Ok(())
    }

    pub async fn on_tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
        let finished = self
            .action
            .as_ref()
            .map(|join| join.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }
        if let Some(join) = self.action.take() {
            self.status = Some(match join.await {
                Ok(ActionOutcome::Done { process_ids }) => {
                    format!("action finished ({})", process_ids.join(", "))
                }
                Ok(ActionOutcome::Failed { message }) => format!("action failed: {message}"),
                Err(err) => format!("action task aborted: {err}"),
            });
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        match self.input_mode.clone() {
            InputMode::Search => self.handle_search_key(key),
            InputMode::Arguments(action) => self.handle_arguments_key(key, action).await,
            InputMode::Normal => self.handle_normal_key(key).await,
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.query.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => self.input_mode = InputMode::Normal,
            KeyCode::Backspace => {
                self.query.pop();
            }
            KeyCode::Char(c) => self.query.push(c),
            _ => {}
        }
        self.table_state.select(Some(0));
    }

    async fn handle_arguments_key(&mut self, key: KeyEvent, action: StageAction) {
        match key.code {
            KeyCode::Esc => {
                self.input.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                let arguments = std::mem::take(&mut self.input);
                self.input_mode = InputMode::Normal;
                self.trigger(action, arguments).await;
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) {
        let pane_visible = self.pane.lock().await.is_visible();
        if pane_visible {
            self.handle_pane_key(key).await;
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                } else if !self.query.is_empty() {
                    self.query.clear();
                }
            }
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search;
            }
            KeyCode::Tab | KeyCode::Char('c') => {
                self.category = self.category.next();
                self.table_state.select(Some(0));
            }
            KeyCode::Char('u') | KeyCode::F(5) => {
                self.scheduler.request_refresh();
                self.status = Some("refresh requested".to_string());
            }
            KeyCode::Char('s') => self.trigger(StageAction::Start, String::new()).await,
            KeyCode::Char('S') => {
                self.input.clear();
                self.input_mode = InputMode::Arguments(StageAction::Start);
            }
            KeyCode::Char('t') => self.trigger(StageAction::Stop, String::new()).await,
            KeyCode::Char('r') => self.trigger(StageAction::Restart, String::new()).await,
            KeyCode::Char('D') => self.trigger(StageAction::Delete, String::new()).await,
            KeyCode::Char('l') => self.list_logs().await,
            _ => {}
        }
    }

    async fn handle_pane_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.close_pane().await,
            KeyCode::Up | KeyCode::Char('k') => self.pane.lock().await.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.pane.lock().await.scroll_down(1),
            KeyCode::PageUp => self.pane.lock().await.scroll_up(20),
            KeyCode::PageDown => self.pane.lock().await.scroll_down(20),
            KeyCode::End | KeyCode::Char('G') => {
                let mut pane = self.pane.lock().await;
                let back = pane.scroll_back();
                pane.scroll_down(back);
            }
            _ => {}
        }
    }

    /// Stops the log display. A running action keeps going in the
    /// background and its row updates on the next refresh.
    async fn close_pane(&mut self) {
        if let Some(token) = self.view_token.take() {
            token.cancel();
        }
        self.pane.lock().await.close();
        self.scheduler.request_refresh();
    }

    fn move_selection(&mut self, delta: isize) {
        let current = self.table_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).max(0) as usize;
        self.table_state.select(Some(next));
    }

    async fn selected_stage(&self) -> Option<String> {
        let controller = self.controller.lock().await;
        let view = controller.view();
        let rows = view.filter_in(self.category, &self.query);
        let id: RowId = rows.get(self.table_state.selected()?)?.id;
        view.action_target(id).map(str::to_string)
    }

    async fn trigger(&mut self, action: StageAction, arguments: String) {
        if self.action_running() {
            self.status = Some("another action is still running".to_string());
            return;
        }
        let Some(stage) = self.selected_stage().await else {
            self.status = Some("no stage selected".to_string());
            return;
        };

        let request = ActionRequest::new(stage, action).with_arguments(arguments);
        info!("ui_action: {request}");
        let token = CancellationToken::new();
        self.pane.lock().await.open(request.to_string());
        self.view_token = Some(token.clone());
        self.status = Some(format!("running {request}"));

        let invoker = self.invoker.clone();
        let controller = self.controller.clone();
        let pane = self.pane.clone();
        self.action = Some(tokio::spawn(async move {
            invoker.run(request, &controller, pane, token).await
        }));
    }

    async fn list_logs(&mut self) {
        if self.action_running() {
            self.status = Some("another action is still running".to_string());
            return;
        }
        let Some(stage) = self.selected_stage().await else {
            return;
        };
        let title = format!("logs of {stage}");
        self.pane.lock().await.open(title.clone());
        let token = CancellationToken::new();
        self.view_token = Some(token.clone());

        let backend = self.backend.clone();
        let pane = self.pane.clone();
        tokio::spawn(async move {
            let text = match backend.list_stage_logs(&stage).await {
                Ok(files) if files.is_empty() => "no log files\n".to_string(),
                Ok(files) => files.join("\n") + "\n",
                Err(err) => {
                    warn!("stage_logs_error: {stage} {err}");
                    format!("failed: {err}\n")
                }
            };
            let mut pane = pane.lock().await;
            if !token.is_cancelled() {
                pane.show_text(title, &text);
            }
        });
    }

    pub fn shutdown(&mut self) {
        if let Some(token) = self.view_token.take() {
            token.cancel();
        }
        if let Some(join) = self.action.take() {
            join.abort();
        }
    }
}

fn clamp_selection(state: &mut TableState, len: usize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let selected = state.selected().unwrap_or(0).min(len - 1);
    state.select(Some(selected));
}
