//! Pure drawing functions: everything on screen is derived from [`App`].

use ratatui::{
    prelude::*,
    symbols::Marker,
    text::Line,
    widgets::{
        Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table, Wrap,
        block::{Position, Title},
        canvas::{Canvas, Line as CanvasLine, Rectangle},
    },
};

use crate::analysis::DashboardData;
use crate::frame::{CLOSE, HIGH, LOW, OPEN, Stamp, VOLUME};
use crate::indicators::{EMA_20, SMA_20};
use crate::tickers::ChartType;
use crate::tui::{App, DashboardView, Mode, SuggestionState};

const UP: Color = Color::Rgb(38, 166, 154);
const DOWN: Color = Color::Rgb(239, 83, 80);
const TECH_TABLE_SKIP: usize = 40;

pub fn ui(f: &mut Frame, app: &App) {
    let main_layout = Layout::horizontal([Constraint::Percentage(22), Constraint::Percentage(78)])
        .split(f.size());

    render_sidebar(f, app, main_layout[0]);
    match app.mode {
        Mode::Dashboard => render_dashboard(f, app, main_layout[1]),
        Mode::Forecast => render_forecast(f, app, main_layout[1]),
    }

    if let Some(msg) = app.busy_message() {
        let area = centered_rect(50, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(format!("{}\nPlease wait.", msg))
                .block(Block::default().title("Working").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

// --- Sidebar ---

fn control_line(label: &str, value: String, focused: bool) -> Line<'static> {
    let line = Line::from(format!("{:<14} ‹ {} ›", label, value));
    if focused {
        line.style(Style::default().fg(Color::Yellow).bg(Color::DarkGray))
    } else {
        line
    }
}

fn heading(text: &'static str) -> Line<'static> {
    Line::from(text).style(Style::default().add_modifier(Modifier::BOLD))
}

fn hint(text: &'static str) -> Line<'static> {
    Line::from(text).style(Style::default().fg(Color::DarkGray))
}

fn checkbox(on: bool) -> String {
    if on { "[x]".to_string() } else { "[ ]".to_string() }
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Choose App Mode")
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = [Mode::Dashboard, Mode::Forecast]
        .iter()
        .map(|mode| {
            let marker = if *mode == app.mode { "(•)" } else { "( )" };
            Line::from(format!("{} {}", marker, mode.title()))
        })
        .collect();
    lines.push(Line::from(""));

    match app.mode {
        Mode::Dashboard => {
            let c = &app.dashboard;
            lines.push(heading("Chart Parameters"));
            lines.push(control_line("Company", c.company_name().to_string(), app.focus == 0));
            lines.push(control_line("Time Period", c.period().to_string(), app.focus == 1));
            lines.push(control_line("Chart Type", c.chart_type().label().to_string(), app.focus == 2));
            lines.push(control_line("SMA 20", checkbox(c.sma), app.focus == 3));
            lines.push(control_line("EMA 20", checkbox(c.ema), app.focus == 4));
            lines.push(Line::from(""));
            lines.push(hint("Enter: Update Chart  F5: refresh"));
            lines.push(Line::from(""));
            lines.push(heading("Real-Time Stock Prices"));
            if app.quotes.is_empty() {
                lines.push(hint("Loading..."));
            }
            for q in &app.quotes {
                match &q.quote {
                    Ok(quote) => {
                        let color = if quote.change >= 0.0 { UP } else { DOWN };
                        lines.push(Line::from(q.company.clone()));
                        lines.push(Line::from(vec![
                            Span::raw(format!("  {:.2} {} ", quote.last_price, app.currency)),
                            Span::styled(
                                format!("{:+.2} ({:+.2}%)", quote.change, quote.pct_change),
                                Style::default().fg(color),
                            ),
                        ]));
                    }
                    Err(msg) => lines.push(Line::from(msg.clone()).style(Style::default().fg(Color::DarkGray))),
                }
            }
            lines.push(Line::from(""));
            lines.push(heading("About"));
            lines.push(Line::from(format!(
                "Real-time and historical prices with technical indicators. Refreshes every {}s.",
                app.refresh_every.as_secs()
            )));
        }
        Mode::Forecast => {
            let c = &app.forecast;
            lines.push(heading("Forecast Parameters"));
            lines.push(control_line("Company", c.company_name().to_string(), app.focus == 0));
            lines.push(control_line("Days", c.days().to_string(), app.focus == 1));
            lines.push(control_line("History", c.period().to_string(), app.focus == 2));
            lines.push(Line::from(""));
            lines.push(hint("Enter: Run Forecast"));
            lines.push(hint("g: Get Suggestions"));
        }
    }

    lines.push(Line::from(""));
    lines.push(hint("Tab: mode  ↑↓: select  ←→: change  q: quit"));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

// --- Dashboard ---

fn render_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Mode::Dashboard.title())
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    f.render_widget(block, area);

    match &app.view {
        DashboardView::Idle => f.render_widget(
            Paragraph::new("Pick a company and press Enter to update the chart.").alignment(Alignment::Center),
            inner,
        ),
        DashboardView::Failed(msg) => f.render_widget(
            Paragraph::new(msg.as_str())
                .style(Style::default().fg(Color::Yellow))
                .wrap(Wrap { trim: true }),
            inner,
        ),
        DashboardView::Loaded(data) => render_loaded(f, app, data, inner),
    }
}

fn render_loaded(f: &mut Frame, app: &App, data: &DashboardData, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Percentage(60),
        Constraint::Min(6),
    ])
    .split(area);

    render_metrics(f, app, data, chunks[0]);

    if let Some(warning) = &data.warning {
        f.render_widget(
            Paragraph::new(warning.to_string()).style(Style::default().fg(Color::Yellow)),
            chunks[1],
        );
    }

    let title = format!("{} {} Chart", data.ticker, data.period.as_str().to_uppercase());
    match app.dashboard.chart_type() {
        ChartType::Candlestick => render_candles(f, app, data, &title, chunks[2]),
        ChartType::Line => render_line(f, app, data, &title, chunks[2]),
    }

    let tables = Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)]).split(chunks[3]);
    render_history_table(f, data, tables[0]);
    render_indicator_table(f, data, tables[1]);
}

fn render_metrics(f: &mut Frame, app: &App, data: &DashboardData, area: Rect) {
    let m = &data.metrics;
    let Some(last) = m.last_close else {
        f.render_widget(
            Paragraph::new("Insufficient data to display metrics.").style(Style::default().fg(Color::Red)),
            area,
        );
        return;
    };

    let cols = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
    let change = m.change.unwrap_or(0.0);
    let color = if change >= 0.0 { UP } else { DOWN };
    let price = Line::from(vec![
        Span::raw(format!("{:.2} {}  ", last, app.currency)).bold(),
        Span::styled(
            format!("{:+.2} ({:+.2}%)", change, m.pct_change.unwrap_or(0.0)),
            Style::default().fg(color),
        ),
    ]);
    f.render_widget(
        Paragraph::new(price).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} Last Price", app.dashboard.company_name())),
        ),
        cols[0],
    );

    let or_na = |v: Option<f64>, fmt: &dyn Fn(f64) -> String| v.map_or("N/A".to_string(), fmt);
    let money = |v: f64| format!("{:.2} {}", v, app.currency);
    for (col, (label, value)) in cols[1..].iter().zip([
        ("High", or_na(m.high, &money)),
        ("Low", or_na(m.low, &money)),
        ("Volume", or_na(m.volume, &format_thousands)),
    ]) {
        f.render_widget(
            Paragraph::new(value).block(Block::default().borders(Borders::ALL).title(label)),
            *col,
        );
    }
}

fn x_labels(stamps: &[Stamp], intraday: bool) -> Vec<Span<'static>> {
    let fmt = if intraday { "%d %b %H:%M" } else { "%d %b %Y" };
    match stamps {
        [] => Vec::new(),
        [only] => vec![Span::raw(only.label(fmt))],
        _ => {
            let mid = stamps.len() / 2;
            [0, mid, stamps.len() - 1]
                .iter()
                .map(|&i| Span::raw(stamps[i].label(fmt)))
                .collect()
        }
    }
}

fn y_labels(lo: f64, hi: f64) -> Vec<Span<'static>> {
    [lo, (lo + hi) / 2.0, hi]
        .iter()
        .map(|v| Span::raw(format!("{:.2}", v)))
        .collect()
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.001).max(0.01);
    [lo - pad, hi + pad]
}

fn overlay_series(app: &App, data: &DashboardData) -> Vec<(&'static str, Color, Vec<(f64, f64)>)> {
    let mut out = Vec::new();
    for (enabled, name, label, color) in [
        (app.dashboard.sma, SMA_20, "SMA 20", Color::LightBlue),
        (app.dashboard.ema, EMA_20, "EMA 20", Color::LightMagenta),
    ] {
        if !enabled {
            continue;
        }
        if let Some(values) = data.frame.column(name) {
            let points = values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                .collect();
            out.push((label, color, points));
        }
    }
    out
}

fn render_candles(f: &mut Frame, app: &App, data: &DashboardData, title: &str, area: Rect) {
    let Some(bars) = data.bars.as_ref().filter(|b| !b.is_empty()) else {
        f.render_widget(
            Paragraph::new("Required columns for Candlestick chart are missing.")
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title(title.to_string())),
            area,
        );
        return;
    };

    let overlays = overlay_series(app, data);
    let y = padded_bounds(
        bars.iter()
            .flat_map(|b| [b.low, b.high])
            .chain(overlays.iter().flat_map(|(_, _, pts)| pts.iter().map(|p| p.1))),
    );
    let n = bars.len() as f64;
    let legend: Vec<Span> = overlays
        .iter()
        .map(|(label, color, _)| Span::styled(format!(" {} ", label), Style::default().fg(*color)))
        .collect();

    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string())
                .title(Title::from(Line::from(legend)).position(Position::Bottom)),
        )
        .marker(Marker::Braille)
        .x_bounds([-0.5, n - 0.5])
        .y_bounds(y)
        .paint(|ctx| {
            for (i, bar) in bars.iter().enumerate() {
                let x = i as f64;
                let color = if bar.close >= bar.open { UP } else { DOWN };
                ctx.draw(&CanvasLine {
                    x1: x,
                    y1: bar.low,
                    x2: x,
                    y2: bar.high,
                    color,
                });
                ctx.draw(&Rectangle {
                    x: x - 0.3,
                    y: bar.open.min(bar.close),
                    width: 0.6,
                    height: (bar.close - bar.open).abs(),
                    color,
                });
            }
            for (_, color, points) in &overlays {
                for w in points.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: w[0].0,
                        y1: w[0].1,
                        x2: w[1].0,
                        y2: w[1].1,
                        color: *color,
                    });
                }
            }
        });
    f.render_widget(canvas, area);
}

fn render_line(f: &mut Frame, app: &App, data: &DashboardData, title: &str, area: Rect) {
    let Some(close) = data.frame.column(CLOSE) else {
        f.render_widget(
            Paragraph::new("'Close' column is missing in data.").style(Style::default().fg(Color::Red)),
            area,
        );
        return;
    };
    let close_points: Vec<(f64, f64)> = close
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect();
    let overlays = overlay_series(app, data);

    let y = padded_bounds(
        close_points
            .iter()
            .chain(overlays.iter().flat_map(|(_, _, pts)| pts.iter()))
            .map(|p| p.1),
    );
    let n = data.frame.len().max(2) as f64;

    let mut datasets = vec![
        Dataset::default()
            .name(data.ticker.clone())
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&close_points),
    ];
    for (label, color, points) in &overlays {
        datasets.push(
            Dataset::default()
                .name(*label)
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(*color))
                .data(points),
        );
    }

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .title("Time")
                .bounds([0.0, n - 1.0])
                .labels(x_labels(&data.frame.index, data.period.dashboard_interval().is_intraday())),
        )
        .y_axis(
            Axis::default()
                .title(format!("Price ({})", app.currency))
                .bounds(y)
                .labels(y_labels(y[0], y[1])),
        );
    f.render_widget(chart, area);
}

fn fmt_cell(v: Option<f64>) -> Cell<'static> {
    Cell::from(v.map_or("-".to_string(), |v| format!("{:.2}", v)))
}

fn render_history_table(f: &mut Frame, data: &DashboardData, area: Rect) {
    let visible = area.height.saturating_sub(3) as usize;
    let frame = &data.frame;
    let start = frame.len().saturating_sub(visible);
    let cols: Vec<_> = [OPEN, HIGH, LOW, CLOSE, VOLUME]
        .iter()
        .filter_map(|name| frame.column(name).map(|c| (*name, c)))
        .collect();

    let header = Row::new(
        std::iter::once(Cell::from("Datetime")).chain(cols.iter().map(|(name, _)| Cell::from(*name))),
    )
    .style(Style::default().bg(Color::DarkGray));

    let rows = (start..frame.len()).map(|i| {
        let when = frame.index[i].label("%Y-%m-%d %H:%M");
        Row::new(
            std::iter::once(Cell::from(when)).chain(cols.iter().map(|(name, c)| {
                if *name == VOLUME {
                    Cell::from(c[i].map_or("-".to_string(), format_thousands))
                } else {
                    fmt_cell(c[i])
                }
            })),
        )
    });

    let mut widths = vec![Constraint::Length(17)];
    widths.extend(std::iter::repeat(Constraint::Min(8)).take(cols.len()));
    f.render_widget(
        Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Historical Data")),
        area,
    );
}

fn render_indicator_table(f: &mut Frame, data: &DashboardData, area: Rect) {
    let frame = &data.frame;
    let (Some(sma), Some(ema)) = (frame.column(SMA_20), frame.column(EMA_20)) else {
        f.render_widget(
            Paragraph::new("No indicator data.")
                .block(Block::default().borders(Borders::ALL).title("Technical Indicators")),
            area,
        );
        return;
    };
    let visible = area.height.saturating_sub(3) as usize;
    let start = frame.len().saturating_sub(visible).max(TECH_TABLE_SKIP.min(frame.len()));
    let rows = (start..frame.len()).map(|i| {
        Row::new(vec![
            Cell::from(frame.index[i].label("%Y-%m-%d %H:%M")),
            fmt_cell(sma[i]),
            fmt_cell(ema[i]),
        ])
    });

    f.render_widget(
        Table::new(rows, [Constraint::Length(17), Constraint::Min(8), Constraint::Min(8)])
            .header(Row::new(vec!["Datetime", "SMA_20", "EMA_20"]).style(Style::default().bg(Color::DarkGray)))
            .block(Block::default().borders(Borders::ALL).title("Technical Indicators")),
        area,
    );
}

// --- Forecast ---

fn render_forecast(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Stock Forecasting")
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(14),
        Constraint::Percentage(45),
        Constraint::Min(5),
    ])
    .split(inner);

    match &app.forecast_view {
        None => f.render_widget(
            Paragraph::new("Choose a company and press Enter to run the forecast."),
            chunks[0],
        ),
        Some(Err(msg)) => f.render_widget(
            Paragraph::new(msg.as_str())
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true }),
            chunks[0],
        ),
        Some(Ok(view)) => {
            let rows = view.points.iter().enumerate().map(|(i, p)| {
                Row::new(vec![
                    Cell::from((i + 1).to_string()),
                    Cell::from(p.date.format("%Y-%m-%d").to_string()),
                    Cell::from(format!("{:.4}", p.predicted_pct_change)),
                    Cell::from(format!("{:.4}", p.lower_bound)),
                    Cell::from(format!("{:.4}", p.upper_bound)),
                ])
            });
            f.render_widget(
                Table::new(
                    rows,
                    [
                        Constraint::Length(4),
                        Constraint::Length(12),
                        Constraint::Min(10),
                        Constraint::Min(10),
                        Constraint::Min(10),
                    ],
                )
                .header(
                    Row::new(vec!["#", "Date", "% Change", "Lower Bound", "Upper Bound"])
                        .style(Style::default().bg(Color::DarkGray)),
                )
                .block(Block::default().borders(Borders::ALL).title(format!(
                    "Forecasted Percentage Change for Next {} Days",
                    view.days
                ))),
                chunks[0],
            );

            let series = |pick: fn(&crate::forecasting::ForecastPoint) -> f64| -> Vec<(f64, f64)> {
                view.points.iter().enumerate().map(|(i, p)| (i as f64, pick(p))).collect()
            };
            let mid = series(|p| p.predicted_pct_change);
            let lower = series(|p| p.lower_bound);
            let upper = series(|p| p.upper_bound);
            let y = padded_bounds(lower.iter().chain(upper.iter()).map(|p| p.1));
            let labels: Vec<Span> = view
                .points
                .iter()
                .map(|p| Span::raw(p.date.format("%m-%d").to_string()))
                .collect();

            let datasets = vec![
                Dataset::default()
                    .name("Forecasted Pct Change")
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::Cyan))
                    .data(&mid),
                Dataset::default()
                    .name("Lower")
                    .marker(Marker::Dot)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::DarkGray))
                    .data(&lower),
                Dataset::default()
                    .name("Upper")
                    .marker(Marker::Dot)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::DarkGray))
                    .data(&upper),
            ];
            f.render_widget(
                Chart::new(datasets)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(format!("Forecast of {} Percentage Change", view.company)),
                    )
                    .x_axis(
                        Axis::default()
                            .title("Date")
                            .bounds([0.0, (view.points.len().max(2) - 1) as f64])
                            .labels(labels),
                    )
                    .y_axis(
                        Axis::default()
                            .title("Percentage Change (%)")
                            .bounds(y)
                            .labels(y_labels(y[0], y[1])),
                    ),
                chunks[1],
            );
        }
    }

    let (text, style) = match app.suggestions.get(&app.suggestion_key()) {
        None => ("Press g to get suggestions.".to_string(), Style::default().fg(Color::DarkGray)),
        Some(SuggestionState::Pending) => ("Fetching suggestions...".to_string(), Style::default()),
        Some(SuggestionState::Ready(text)) => (text.clone(), Style::default()),
        Some(SuggestionState::Failed(msg)) => (msg.clone(), Style::default().fg(Color::Red)),
    };
    f.render_widget(
        Paragraph::new(text)
            .style(style)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("A.I Suggestions")),
        chunks[2],
    );
}

// --- Helpers ---

pub fn format_thousands(v: f64) -> String {
    let digits = format!("{:.0}", v.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if v < 0.0 { format!("-{}", out) } else { out }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
