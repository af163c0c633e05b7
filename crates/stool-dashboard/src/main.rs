mod app;
mod theme;
mod ui;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use stool_core::{ActionRequest, ColumnRenderer, StageAction, StageCategory};
use stool_dashboard::{
    new_controller, refresh_once, ActionInvoker, ActionOutcome, ConfigOverrides, DashboardConfig,
    HttpBackend, LogSink, PollScheduler, StageBackend, TailSettings,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const TICK_MS: u64 = 200;

#[derive(Parser, Debug)]
#[command(name = "stool-dashboard")]
#[command(about = "Terminal dashboard for a stool server", long_about = None)]
struct Cli {
    /// Base URL of the REST API, e.g. http://localhost:8080/api
    #[arg(long, global = true, default_value = "")]
    url: String,
    #[arg(long, global = true)]
    poll_ms: Option<u64>,
    #[arg(long, global = true)]
    log_poll_ms: Option<u64>,
    /// Characters kept in a log view before it is cleared
    #[arg(long, global = true)]
    log_cap: Option<usize>,
    /// Comma separated fields requested from the server
    #[arg(long, global = true, default_value = "")]
    select: String,
    /// Comma separated columns shown in the table
    #[arg(long, global = true, default_value = "")]
    columns: String,
    /// `path` or `query`
    #[arg(long, global = true, default_value = "")]
    argument_style: String,
    #[arg(long, global = true)]
    http_timeout_secs: Option<u64>,
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive stage table (default)
    Tui,
    /// Print the current stage table once
    Snapshot {
        /// all, trunks, branches or workspaces
        #[arg(long, default_value = "all")]
        category: String,
    },
    /// Run an action on a stage and follow its log
    Run {
        stage: String,
        action: String,
        #[arg(long, default_value = "")]
        arguments: String,
    },
    /// List the log files of a stage
    Logs { stage: String },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            poll_ms: self.poll_ms,
            log_poll_ms: self.log_poll_ms,
            log_cap: self.log_cap,
            select: self.select.clone(),
            columns: self.columns.clone(),
            argument_style: self.argument_style.clone(),
            http_timeout_secs: self.http_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DashboardConfig::from_env(&cli.overrides())
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    let interactive = matches!(cli.command, None | Some(Commands::Tui));
    init_logging(&config, cli.log_file.as_deref(), interactive)?;

    let backend = Arc::new(HttpBackend::new(&config)?);
    match cli.command {
        None | Some(Commands::Tui) => run_tui(config, backend).await,
        Some(Commands::Snapshot { category }) => {
            let category = category.parse::<StageCategory>().map_err(anyhow::Error::msg)?;
            print_snapshot(&config, &backend, category).await
        }
        Some(Commands::Run {
            stage,
            action,
            arguments,
        }) => {
            let action = action.parse::<StageAction>().map_err(anyhow::Error::msg)?;
            let request = ActionRequest::new(stage, action).with_arguments(arguments);
            run_action(&config, backend, request).await
        }
        Some(Commands::Logs { stage }) => {
            for file in backend.list_stage_logs(&stage).await? {
                println!("{file}");
            }
            Ok(())
        }
    }
}

fn init_logging(config: &DashboardConfig, log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let _ = builder.with_ansi(false).with_writer(Mutex::new(file)).try_init();
    } else if config.log_stdout {
        let _ = builder.try_init();
    } else if interactive {
        let _ = builder.with_writer(io::sink).try_init();
    } else {
        let _ = builder.with_writer(io::stderr).try_init();
    }
    Ok(())
}

async fn run_tui(config: DashboardConfig, backend: Arc<HttpBackend>) -> Result<()> {
    let controller = new_controller(&config);
    let scheduler = PollScheduler::new(config.poll_interval);
    let (handle, poll_join) = {
        let backend = backend.clone();
        let controller = controller.clone();
        scheduler.start(move || {
            let backend = backend.clone();
            let controller = controller.clone();
            async move {
                refresh_once(backend.as_ref(), &controller).await;
            }
        })
    };

    let mut app = app::App::new(config, backend, controller, handle.clone());
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app).await;
    restore_terminal(&mut terminal)?;

    app.shutdown();
    handle.stop();
    let _ = poll_join.await;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut app::App,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));

    loop {
        app.draw(terminal).await?;
        tokio::select! {
            _ = ticker.tick() => app.on_tick().await,
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        app.handle_key(key).await;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => break,
            }
        }
        if app.should_quit() {
            break;
        }
    }
    Ok(())
}

async fn print_snapshot(
    config: &DashboardConfig,
    backend: &HttpBackend,
    category: StageCategory,
) -> Result<()> {
    let snapshot = backend.fetch_snapshot().await?;
    let renderer = ColumnRenderer::new(config.columns.iter().cloned());
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "name\t{}", renderer.columns().join("\t"))?;
    for record in snapshot
        .records()
        .iter()
        .filter(|record| category.admits(record.origin().as_deref()))
    {
        writeln!(stdout, "{}\t{}", record.name, renderer.cells(record).join("\t"))?;
    }
    Ok(())
}

/// Streams process output straight to the terminal.
struct StdoutSink;

impl LogSink for StdoutSink {
    fn started(&mut self, process_id: &str) {
        eprintln!("process {process_id}");
    }

    fn append(&mut self, data: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(data.as_bytes());
        let _ = stdout.flush();
    }

    // Output already written cannot be taken back.
    fn clear(&mut self) {}

    fn scroll_to_bottom(&mut self) {}

    fn buffered_chars(&self) -> usize {
        0
    }

    fn finished(&mut self) {}

    fn report_failure(&mut self, message: &str) {
        eprintln!("failed: {message}");
    }
}

async fn run_action(
    config: &DashboardConfig,
    backend: Arc<HttpBackend>,
    request: ActionRequest,
) -> Result<()> {
    let controller = new_controller(config);
    refresh_once(backend.as_ref(), &controller).await;

    let invoker = ActionInvoker::new(backend, TailSettings::from_config(config));
    let sink = Arc::new(tokio::sync::Mutex::new(StdoutSink));
    match invoker
        .run(request, &controller, sink, CancellationToken::new())
        .await
    {
        ActionOutcome::Done { .. } => Ok(()),
        ActionOutcome::Failed { message } => bail!("action failed: {message}"),
    }
}
