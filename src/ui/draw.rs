//! UI rendering functions for the TUI dashboard.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use super::styles::*;
use crate::app::App;
use hedged_requests::Strategy;

pub fn draw_ui(frame: &mut Frame, app: &mut App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(5),
        ])
        .split(frame.area());

    let body_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(main_layout[2]);

    let tables_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(body_layout[0]);

    draw_header(frame, main_layout[0]);
    draw_session_stats(frame, main_layout[1], app);
    draw_strategy_table(frame, tables_layout[0], app);
    draw_replica_table(frame, tables_layout[1], app);
    draw_detail_panel(frame, body_layout[1], app);
    draw_keybinds(frame, main_layout[3]);
}

fn titled(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .title_style(title_style())
        .borders(Borders::ALL)
        .border_style(border_style())
}

fn fmt_ms(ms: Option<f64>) -> String {
    ms.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".into())
}

fn draw_header(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Hedged Requests :: Strategy Comparison ")
        .title_style(header_style())
        .borders(Borders::ALL)
        .border_style(border_style());

    frame.render_widget(block, area);
}

fn draw_session_stats(frame: &mut Frame, area: Rect, app: &App) {
    let uptime = app.session_uptime().as_secs();
    let uptime_str = if uptime < 60 {
        format!("{uptime}s")
    } else {
        format!("{}m {}s", uptime / 60, uptime % 60)
    };
    let success_rate = app.success_rate();

    let line = Line::from(vec![
        Span::raw(format!("Uptime: {uptime_str} ")).style(text_style()),
        Span::raw("│ ").style(muted_style()),
        Span::raw(format!("Calls: {} ", app.total_calls)).style(text_style()),
        Span::raw("│ ").style(muted_style()),
        Span::raw(format!("Success: {} ", app.total_successes)).style(success_style()),
        Span::raw("│ ").style(muted_style()),
        Span::raw(format!("Errors: {} ", app.total_errors)).style(if app.total_errors > 0 {
            error_style()
        } else {
            text_style()
        }),
        Span::raw("│ ").style(muted_style()),
        Span::raw(format!("{:.1} calls/s ", app.calls_per_second())).style(highlight_style()),
        Span::raw("│ ").style(muted_style()),
        Span::raw(format!("Success Rate: {success_rate:.1}%")).style(if success_rate > 99.0 {
            success_style()
        } else {
            error_style()
        }),
    ]);

    frame.render_widget(Paragraph::new(line).block(titled(" Session ")), area);
}

fn draw_strategy_table(frame: &mut Frame, area: Rect, app: &mut App) {
    let stagger_ms = app.stagger_delay().as_secs_f64() * 1000.0;
    let selected = app.strategy;

    let header = Row::new(
        ["Strategy", "Calls", "p50 ms", "p99 ms", "Max ms", "Errors"]
            .into_iter()
            .map(|h| Cell::from(h).style(table_header_style())),
    )
    .bottom_margin(1);

    let mut rows = Vec::with_capacity(Strategy::ALL.len());
    for strategy in Strategy::ALL {
        let Some(stats) = app.strategy_stats.get_mut(&strategy) else {
            continue;
        };
        let p50 = stats.p50_ms();
        let p99 = stats.p99_ms();
        let max = stats.max_ms();

        let cells = vec![
            Cell::from(strategy.name()).style(strategy_style(strategy)),
            Cell::from(stats.latencies.count().to_string()),
            Cell::from(fmt_ms(p50)),
            Cell::from(fmt_ms(p99))
                .style(p99.map(|v| latency_style(v, stagger_ms)).unwrap_or_default()),
            Cell::from(fmt_ms(max)),
            Cell::from(stats.errors.to_string()).style(if stats.errors > 0 {
                error_style()
            } else {
                Style::default()
            }),
        ];

        let mut row = Row::new(cells);
        if strategy == selected {
            row = row.style(selected_row_style());
        }
        rows.push(row);
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Min(6),
        ],
    )
    .header(header)
    .block(titled(" End-to-end Latency "))
    .column_spacing(2);

    frame.render_widget(table, area);
}

fn draw_replica_table(frame: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(
        ["Replica", "Wins", "Avg ms", "Errors", "Win Rate"]
            .into_iter()
            .map(|h| Cell::from(h).style(table_header_style())),
    )
    .bottom_margin(1);

    let total_wins: u64 = app.replica_stats.values().map(|s| s.wins).sum();
    let active = app.active_replicas().len();

    let rows = app.replicas.iter().enumerate().map(|(idx, replica)| {
        let snapshot = app.replica_stats.get(&replica.id);
        let wins = snapshot.map(|s| s.wins).unwrap_or(0);
        let errors = snapshot.map(|s| s.errors).unwrap_or(0);
        let avg_ms = snapshot.map(|s| s.avg_latency_ms).unwrap_or(0.0);

        let win_rate = if total_wins > 0 {
            wins as f64 / total_wins as f64 * 100.0
        } else {
            0.0
        };
        let bar_width: usize = 10;
        let filled = ((win_rate / 100.0) * bar_width as f64) as usize;
        let win_bar = format!(
            "[{}{}] {:.0}%",
            "█".repeat(filled),
            "░".repeat(bar_width.saturating_sub(filled)),
            win_rate
        );

        let row = Row::new(vec![
            Cell::from(replica.id.to_string()),
            Cell::from(wins.to_string()).style(if wins > 0 {
                success_style()
            } else {
                Style::default()
            }),
            Cell::from(format!("{avg_ms:.1}")),
            Cell::from(errors.to_string()).style(if errors > 0 {
                error_style()
            } else {
                Style::default()
            }),
            Cell::from(win_bar),
        ]);

        if idx < active {
            row
        } else {
            row.style(muted_style())
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(17),
        ],
    )
    .header(header)
    .block(titled(" Replicas "))
    .column_spacing(2);

    frame.render_widget(table, area);
}

fn draw_detail_panel(frame: &mut Frame, area: Rect, app: &App) {
    let constraints = if app.batch_mode {
        vec![
            Constraint::Length(7),
            Constraint::Min(0),
            Constraint::Length(3),
        ]
    } else {
        vec![Constraint::Length(7), Constraint::Min(0)]
    };

    let detail_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    draw_config_section(frame, detail_layout[0], app);
    draw_last_call_section(frame, detail_layout[1], app);

    if app.batch_mode {
        draw_batch_progress(frame, detail_layout[2], app);
    }
}

fn draw_config_section(frame: &mut Frame, area: Rect, app: &App) {
    let batch_status = if app.batch_mode {
        format!("ON ({}/{})", app.batch_current, app.batch_count)
    } else {
        format!("OFF (count: {})", app.batch_count)
    };

    let text = vec![
        Line::from(vec![
            Span::raw("Strategy: ").style(muted_style()),
            Span::raw(app.strategy.name()).style(strategy_style(app.strategy)),
        ]),
        Line::from(vec![
            Span::raw("Replicas: ").style(muted_style()),
            Span::raw(format!("{} of {}", app.active_replicas().len(), app.replicas.len()))
                .style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Stagger : ").style(muted_style()),
            Span::raw(format!("{:?}", app.stagger_delay())).style(text_style()),
            Span::raw("  Deadline: ").style(muted_style()),
            Span::raw(format!("{:?}", app.dispatcher.config().overall_timeout))
                .style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Batch   : ").style(muted_style()),
            Span::raw(batch_status).style(if app.batch_mode {
                success_style()
            } else {
                muted_style()
            }),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(titled(" Configuration "))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn draw_last_call_section(frame: &mut Frame, area: Rect, app: &App) {
    let stagger_ms = app.stagger_delay().as_secs_f64() * 1000.0;

    let text = vec![
        Line::from(vec![
            Span::raw("Result  : ").style(muted_style()),
            Span::raw(app.last_message.as_str()).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Strategy: ").style(muted_style()),
            Span::raw(app.last_strategy.map(|s| s.name()).unwrap_or("-")).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Winner  : ").style(muted_style()),
            Span::raw(
                app.last_replica
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".into()),
            )
            .style(success_style()),
        ]),
        Line::from(vec![
            Span::raw("Latency : ").style(muted_style()),
            Span::raw(
                app.last_latency_ms
                    .map(|ms| format!("{ms:.1} ms"))
                    .unwrap_or_else(|| "-".into()),
            )
            .style(
                app.last_latency_ms
                    .map(|ms| latency_style(ms, stagger_ms))
                    .unwrap_or_else(muted_style),
            ),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(titled(" Last Call "))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn draw_batch_progress(frame: &mut Frame, area: Rect, app: &App) {
    let progress = if app.batch_count > 0 {
        (app.batch_current as f64 / app.batch_count as f64 * 100.0) as u16
    } else {
        0
    };

    let gauge = Gauge::default()
        .block(titled(" Batch Progress "))
        .gauge_style(success_style())
        .percent(progress.min(100))
        .label(format!("{}/{}", app.batch_current, app.batch_count));

    frame.render_widget(gauge, area);
}

fn draw_keybinds(frame: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::raw(k).style(highlight_style());
    let label = |l: &'static str| Span::raw(l).style(muted_style());

    let keybinds = vec![
        Line::from(vec![
            label("  "),
            key("Tab"),
            label(" Cycle strategy  │  "),
            key("r"),
            label(" Run call  │  "),
            key("b"),
            label(" Toggle batch  │  "),
            key("s"),
            label(" Reset stats"),
        ]),
        Line::from(vec![
            label("  "),
            key("+/-"),
            label(" Replica count   │  "),
            key(",/."),
            label(" Batch size  │  "),
            key("q"),
            label(" Quit"),
        ]),
    ];

    let paragraph = Paragraph::new(keybinds)
        .block(titled(" Keybinds "))
        .alignment(Alignment::Left);

    frame.render_widget(paragraph, area);
}
