//! Interactive TUI dashboard comparing simple, fanout and hedged dispatch.
//!
//! Runs calls against the replica pool and shows, per strategy, the latency
//! distribution observed end to end. Features include:
//! - Per-strategy p50/p99/max latency
//! - Per-replica win and error counts
//! - Batch runs for building up a meaningful tail
//! - Adjustable number of active replicas

mod app;
mod call;
mod env;
mod ui;

use std::time::Duration;

use app::{App, AppEvent};
use call::spawn_dispatch;
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use env::build_dispatcher_from_env;
use tokio::sync::mpsc;
use ui::draw_ui;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let dispatcher = build_dispatcher_from_env()?;
    let mut app = App::new(dispatcher);

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app).await;

    ratatui::restore();

    result
}

async fn run_app(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();

    app.refresh_stats();

    loop {
        while let Ok(ev) = rx.try_recv() {
            match ev {
                AppEvent::DispatchFinished {
                    strategy,
                    replica,
                    latency_ms,
                    ok,
                    message,
                } => {
                    app.set_last_result(strategy, replica, latency_ms, ok, message);
                }
            }
        }

        terminal.draw(|frame| draw_ui(frame, app))?;

        if app.should_run_call() {
            app.mark_batch_call_started();
            spawn_dispatch(app, tx.clone());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            {
                match code {
                    KeyCode::Char('q') => break,
                    KeyCode::Tab => app.toggle_strategy(),
                    KeyCode::Char('r') => spawn_dispatch(app, tx.clone()),
                    KeyCode::Char('b') => app.toggle_batch_mode(),
                    KeyCode::Char('+') | KeyCode::Char('=') => app.increase_replica_count(),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.decrease_replica_count(),
                    KeyCode::Char('[') | KeyCode::Char(',') => app.decrease_batch_count(),
                    KeyCode::Char(']') | KeyCode::Char('.') => app.increase_batch_count(),
                    KeyCode::Char('s') => app.reset_stats(),
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
