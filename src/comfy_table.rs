use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

use crate::analysis::DashboardData;
use crate::forecasting::ForecastPoint;
use crate::frame::{CLOSE, HIGH, LOW, OPEN, VOLUME};
use crate::indicators::{EMA_20, SMA_20};
use crate::render::format_thousands;
use crate::tickers::NIFTY_50;

const SNAPSHOT_ROWS: usize = 15;

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().enumerate().map(|(i, h)| {
            let cell = Cell::new(h).add_attribute(Attribute::Bold);
            if i == 0 { cell } else { cell.set_alignment(CellAlignment::Right) }
        }));
    table
}

/// Brightness in [0.4, 1.0] relative to the largest move on screen.
fn get_visibility_ratio(current: f64, top: f64) -> f64 {
    let top = if top == 0.0 { 1.0 } else { top };
    (0.4 + 0.6 * (current.abs() / top.abs())).clamp(0.4, 1.0)
}

fn move_color(value: f64, top: f64) -> Color {
    let level = (255.0 * get_visibility_ratio(value, top)) as u8;
    if value >= 0.0 {
        Color::Rgb { r: 0, g: level, b: 0 }
    } else {
        Color::Rgb { r: level, g: 0, b: 0 }
    }
}

fn num(v: Option<f64>) -> Cell {
    Cell::new(v.map_or("-".to_string(), |v| format!("{:.2}", v))).set_alignment(CellAlignment::Right)
}

pub fn tickers_table() -> Table {
    let mut table = styled_table(&["#", "Company", "Ticker"]);
    for (i, (company, ticker)) in NIFTY_50.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(company),
            Cell::new(ticker).fg(Color::Cyan),
        ]);
    }
    table
}

pub fn metrics_table(data: &DashboardData, company: &str, currency: &str) -> Table {
    let m = &data.metrics;
    let money = |v: Option<f64>| v.map_or("N/A".to_string(), |v| format!("{:.2} {}", v, currency));
    let change = m.change.unwrap_or(0.0);

    let mut table = styled_table(&["Metric", "Value"]);
    table.add_row(vec![
        Cell::new(format!("{} Last Price", company)),
        Cell::new(money(m.last_close)).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Change"),
        Cell::new(format!("{:+.2} ({:+.2}%)", change, m.pct_change.unwrap_or(0.0)))
            .fg(move_color(change, change)),
    ]);
    table.add_row(vec![Cell::new("High"), Cell::new(money(m.high))]);
    table.add_row(vec![Cell::new("Low"), Cell::new(money(m.low))]);
    table.add_row(vec![
        Cell::new("Volume"),
        Cell::new(m.volume.map_or("N/A".to_string(), format_thousands)),
    ]);
    table
}

/// The most recent rows with prices, volume and whatever indicators are present.
pub fn history_table(data: &DashboardData, rows: usize) -> Table {
    let frame = &data.frame;
    let price_cols: Vec<_> = [OPEN, HIGH, LOW, CLOSE, SMA_20, EMA_20]
        .iter()
        .filter_map(|name| frame.column(name).map(|c| (*name, c)))
        .collect();
    let volume = frame.column(VOLUME);

    let mut headers = vec!["Datetime"];
    headers.extend(price_cols.iter().map(|(name, _)| *name));
    if volume.is_some() {
        headers.push(VOLUME);
    }
    let mut table = styled_table(&headers);

    let close = frame.column(CLOSE);
    let start = frame.len().saturating_sub(rows);
    let top_move = close.map_or(0.0, |c| {
        (start.max(1)..frame.len())
            .filter_map(|i| Some(c[i]? - c[i - 1]?))
            .fold(0.0_f64, |acc, d| acc.max(d.abs()))
    });

    for i in start..frame.len() {
        let mut cells = vec![Cell::new(frame.index[i].label("%Y-%m-%d %H:%M")).fg(Color::DarkGrey)];
        for (name, values) in &price_cols {
            let mut cell = num(values[i]);
            if *name == CLOSE && i > 0 {
                if let (Some(now), Some(prev)) = (values[i], values[i - 1]) {
                    cell = cell.fg(move_color(now - prev, top_move));
                }
            }
            cells.push(cell);
        }
        if let Some(v) = volume {
            cells.push(Cell::new(v[i].map_or("-".to_string(), format_thousands)).set_alignment(CellAlignment::Right));
        }
        table.add_row(cells);
    }
    table
}

pub fn forecast_table(points: &[ForecastPoint]) -> Table {
    let mut table = styled_table(&["Date", "% Change", "Lower Bound", "Upper Bound"]);
    let top = points
        .iter()
        .fold(0.0_f64, |acc, p| acc.max(p.predicted_pct_change.abs()));
    for p in points {
        table.add_row(vec![
            Cell::new(p.date.format("%Y-%m-%d")),
            Cell::new(format!("{:.4}", p.predicted_pct_change))
                .fg(move_color(p.predicted_pct_change, top))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", p.lower_bound)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", p.upper_bound)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn print_snapshot(data: &DashboardData, company: &str, currency: &str) {
    let title = format!(
        "{} ({}) over {}, {} rows",
        company,
        data.ticker,
        data.period,
        data.frame.len()
    );
    if data.metrics.is_empty() {
        println!("\n{}\nInsufficient data to display metrics.", title);
    } else {
        println!("\n{}\n{}", title, metrics_table(data, company, currency));
    }
    if let Some(warning) = &data.warning {
        println!("{}", warning);
    }
    println!("{}", history_table(data, SNAPSHOT_ROWS));
}

pub fn print_forecast(company: &str, days: usize, points: &[ForecastPoint]) {
    println!(
        "\nForecasted Percentage Change for Next {} Days ({})\n{}",
        days,
        company,
        forecast_table(points)
    );
}
