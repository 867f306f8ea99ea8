use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::analysis::{self, DashboardData, SidebarQuote};
use crate::fetcher::MarketDataClient;
use crate::forecasting::{self, ForecastPoint};
use crate::render;
use crate::storage_utils::AppConfig;
use crate::suggestions::{self, GeminiClient};
use crate::tickers::{
    CHART_TYPES, ChartType, DASHBOARD_PERIODS, FORECAST_HORIZONS, FORECAST_PERIODS, NIFTY_50, Period,
};

// --- Session State ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dashboard,
    Forecast,
}

impl Mode {
    pub fn title(self) -> &'static str {
        match self {
            Mode::Dashboard => "Real Time Stock Dashboard",
            Mode::Forecast => "Stock Forecast",
        }
    }

    fn controls(self) -> usize {
        match self {
            Mode::Dashboard => 5,
            Mode::Forecast => 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardControls {
    pub company: usize,
    pub period: usize,
    pub chart_type: usize,
    pub sma: bool,
    pub ema: bool,
}

impl DashboardControls {
    pub fn company_name(&self) -> &'static str {
        NIFTY_50[self.company].0
    }

    pub fn ticker(&self) -> &'static str {
        NIFTY_50[self.company].1
    }

    pub fn period(&self) -> Period {
        DASHBOARD_PERIODS[self.period]
    }

    pub fn chart_type(&self) -> ChartType {
        CHART_TYPES[self.chart_type]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForecastControls {
    pub company: usize,
    pub horizon: usize,
    pub period: usize,
}

impl ForecastControls {
    pub fn company_name(&self) -> &'static str {
        NIFTY_50[self.company].0
    }

    pub fn ticker(&self) -> &'static str {
        NIFTY_50[self.company].1
    }

    pub fn days(&self) -> usize {
        FORECAST_HORIZONS[self.horizon]
    }

    pub fn period(&self) -> Period {
        FORECAST_PERIODS[self.period]
    }
}

#[derive(Debug, Clone)]
pub enum DashboardView {
    Idle,
    Loaded(Box<DashboardData>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ForecastView {
    pub company: String,
    pub days: usize,
    pub points: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionState {
    Pending,
    Ready(String),
    Failed(String),
}

pub type SuggestionKey = (String, Period);

pub struct App {
    pub mode: Mode,
    pub focus: usize,
    pub dashboard: DashboardControls,
    pub forecast: ForecastControls,
    pub update_chart: bool,
    pub view: DashboardView,
    pub quotes: Vec<SidebarQuote>,
    pub forecast_view: Option<std::result::Result<ForecastView, String>>,
    pub suggestions: HashMap<SuggestionKey, SuggestionState>,
    pub dashboard_loading: bool,
    pub quotes_loading: bool,
    pub forecast_running: bool,
    pub last_refresh: Option<Instant>,
    pub refresh_every: Duration,
    pub currency: String,
}

/// Work the event loop should start in the background.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    LoadDashboard { ticker: String, period: Period },
    LoadQuotes,
    RunForecast { company: String, ticker: String, days: usize, period: Period },
    GetSuggestions { ticker: String, period: Period },
}

/// Results coming back from background tasks.
#[derive(Debug)]
pub enum Update {
    Dashboard((String, Period), std::result::Result<DashboardData, String>),
    Quotes(Vec<SidebarQuote>),
    Forecast(std::result::Result<ForecastView, String>),
    Suggestion(SuggestionKey, std::result::Result<String, String>),
}

impl App {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mode: Mode::Dashboard,
            focus: 0,
            dashboard: DashboardControls::default(),
            forecast: ForecastControls::default(),
            update_chart: false,
            view: DashboardView::Idle,
            quotes: Vec::new(),
            forecast_view: None,
            suggestions: HashMap::new(),
            dashboard_loading: false,
            quotes_loading: false,
            forecast_running: false,
            last_refresh: None,
            refresh_every: config.refresh_interval(),
            currency: config.currency.clone(),
        }
    }

    pub fn busy_message(&self) -> Option<&'static str> {
        match self.mode {
            Mode::Dashboard if self.dashboard_loading => Some("Fetching market data..."),
            Mode::Forecast if self.forecast_running => Some("Running forecast..."),
            Mode::Forecast
                if matches!(self.suggestions.get(&self.suggestion_key()), Some(SuggestionState::Pending)) =>
            {
                Some("Fetching suggestions...")
            }
            _ => None,
        }
    }

    pub fn suggestion_key(&self) -> SuggestionKey {
        (self.forecast.ticker().to_string(), self.forecast.period())
    }

    fn load_dashboard(&mut self) -> Option<Action> {
        if self.dashboard_loading {
            return None;
        }
        self.dashboard_loading = true;
        Some(Action::LoadDashboard {
            ticker: self.dashboard.ticker().to_string(),
            period: self.dashboard.period(),
        })
    }

    fn load_quotes(&mut self) -> Option<Action> {
        if self.quotes_loading {
            return None;
        }
        self.quotes_loading = true;
        Some(Action::LoadQuotes)
    }

    /// Periodic re-poll: quotes always, the chart once "Update Chart" was pressed.
    pub fn tick(&mut self, now: Instant) -> Vec<Action> {
        let due = self
            .last_refresh
            .is_none_or(|last| now.duration_since(last) >= self.refresh_every);
        if !due || self.mode != Mode::Dashboard {
            return Vec::new();
        }
        self.last_refresh = Some(now);
        let mut actions: Vec<Action> = self.load_quotes().into_iter().collect();
        if self.update_chart {
            actions.extend(self.load_dashboard());
        }
        actions
    }

    pub fn apply(&mut self, update: Update) -> Vec<Action> {
        match update {
            Update::Dashboard(key, result) => {
                self.dashboard_loading = false;
                let current = (self.dashboard.ticker().to_string(), self.dashboard.period());
                if key != current {
                    // selection changed while the request was in flight
                    return self.load_dashboard().into_iter().collect();
                }
                self.view = match result {
                    Ok(data) => DashboardView::Loaded(Box::new(data)),
                    Err(msg) => DashboardView::Failed(msg),
                };
            }
            Update::Quotes(quotes) => {
                self.quotes_loading = false;
                self.quotes = quotes;
            }
            Update::Forecast(result) => {
                self.forecast_running = false;
                self.forecast_view = Some(result);
            }
            Update::Suggestion(key, result) => {
                let state = match result {
                    Ok(text) => SuggestionState::Ready(text),
                    Err(msg) => SuggestionState::Failed(msg),
                };
                self.suggestions.insert(key, state);
            }
        }
        Vec::new()
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Vec<Action> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => vec![Action::Quit],
            KeyCode::Tab | KeyCode::BackTab => {
                self.mode = match self.mode {
                    Mode::Dashboard => Mode::Forecast,
                    Mode::Forecast => Mode::Dashboard,
                };
                self.focus = 0;
                Vec::new()
            }
            KeyCode::Up => {
                let n = self.mode.controls();
                self.focus = self.focus.checked_sub(1).unwrap_or(n - 1);
                Vec::new()
            }
            KeyCode::Down => {
                self.focus = (self.focus + 1) % self.mode.controls();
                Vec::new()
            }
            KeyCode::Left => self.step_control(-1),
            KeyCode::Right | KeyCode::Char(' ') => self.step_control(1),
            KeyCode::Enter => match self.mode {
                Mode::Dashboard => {
                    self.update_chart = true;
                    self.load_dashboard().into_iter().collect()
                }
                Mode::Forecast => {
                    if self.forecast_running {
                        return Vec::new();
                    }
                    self.forecast_running = true;
                    vec![Action::RunForecast {
                        company: self.forecast.company_name().to_string(),
                        ticker: self.forecast.ticker().to_string(),
                        days: self.forecast.days(),
                        period: self.forecast.period(),
                    }]
                }
            },
            KeyCode::Char('g') if self.mode == Mode::Forecast => {
                let key = self.suggestion_key();
                if self.suggestions.get(&key) == Some(&SuggestionState::Pending) {
                    return Vec::new();
                }
                self.suggestions.insert(key.clone(), SuggestionState::Pending);
                vec![Action::GetSuggestions {
                    ticker: key.0,
                    period: key.1,
                }]
            }
            KeyCode::F(5) if self.mode == Mode::Dashboard => {
                let mut actions: Vec<Action> = self.load_quotes().into_iter().collect();
                if self.update_chart {
                    actions.extend(self.load_dashboard());
                }
                actions
            }
            _ => Vec::new(),
        }
    }

    fn step_control(&mut self, delta: isize) -> Vec<Action> {
        let cycle = |value: usize, len: usize| (value as isize + delta).rem_euclid(len as isize) as usize;
        match (self.mode, self.focus) {
            (Mode::Dashboard, 0) => self.dashboard.company = cycle(self.dashboard.company, NIFTY_50.len()),
            (Mode::Dashboard, 1) => self.dashboard.period = cycle(self.dashboard.period, DASHBOARD_PERIODS.len()),
            (Mode::Dashboard, 2) => {
                self.dashboard.chart_type = cycle(self.dashboard.chart_type, CHART_TYPES.len());
                return Vec::new();
            }
            (Mode::Dashboard, 3) => {
                self.dashboard.sma = !self.dashboard.sma;
                return Vec::new();
            }
            (Mode::Dashboard, _) => {
                self.dashboard.ema = !self.dashboard.ema;
                return Vec::new();
            }
            (Mode::Forecast, 0) => self.forecast.company = cycle(self.forecast.company, NIFTY_50.len()),
            (Mode::Forecast, 1) => self.forecast.horizon = cycle(self.forecast.horizon, FORECAST_HORIZONS.len()),
            (Mode::Forecast, _) => self.forecast.period = cycle(self.forecast.period, FORECAST_PERIODS.len()),
        }
        // company or period changed: redraw right away once the chart is live
        if self.mode == Mode::Dashboard && self.update_chart {
            return self.load_dashboard().into_iter().collect();
        }
        Vec::new()
    }
}

// --- Background Work ---

#[derive(Clone)]
pub struct Services {
    pub market: Arc<MarketDataClient>,
    pub config: Arc<AppConfig>,
    pub tz: chrono_tz::Tz,
}

fn spawn_action(action: Action, services: &Services, tx: &mpsc::Sender<Update>) {
    let services = services.clone();
    let tx = tx.clone();
    match action {
        Action::Quit => {}
        Action::LoadDashboard { ticker, period } => {
            tokio::spawn(async move {
                let result = analysis::load_dashboard(&services.market, &ticker, period, services.tz)
                    .await
                    .map_err(|e| {
                        tracing::warn!(ticker = %ticker, error = %e, "dashboard load failed");
                        e.to_string()
                    });
                let _ = tx.send(Update::Dashboard((ticker, period), result)).await;
            });
        }
        Action::LoadQuotes => {
            tokio::spawn(async move {
                let quotes = analysis::load_sidebar_quotes(
                    &services.market,
                    &services.config.sidebar_companies,
                    services.tz,
                )
                .await;
                let _ = tx.send(Update::Quotes(quotes)).await;
            });
        }
        Action::RunForecast { company, ticker, days, period } => {
            tokio::spawn(async move {
                let result = forecasting::forecast_pct_change(&services.market, &ticker, days, period, services.tz)
                    .await
                    .map(|points| ForecastView { company, days, points })
                    .map_err(|e| {
                        tracing::warn!(ticker = %ticker, error = %e, "forecast failed");
                        e.to_string()
                    });
                let _ = tx.send(Update::Forecast(result)).await;
            });
        }
        Action::GetSuggestions { ticker, period } => {
            tokio::spawn(async move {
                let result = match GeminiClient::from_env(&services.config.gemini) {
                    Ok(gemini) => {
                        suggestions::get_suggestions(&services.market, &gemini, &ticker, period, services.tz).await
                    }
                    Err(e) => Err(e),
                }
                .map_err(|e| {
                    tracing::error!(ticker = %ticker, error = %e, "suggestion request failed");
                    e.to_string()
                });
                let _ = tx.send(Update::Suggestion((ticker, period), result)).await;
            });
        }
    }
}

// --- TUI ---

pub async fn run_tui(services: Services) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, services).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, services: Services) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<Update>(16);
    let mut app = App::new(&services.config);
    tracing::info!("dashboard started");

    loop {
        for action in app.tick(Instant::now()) {
            spawn_action(action, &services, &tx);
        }

        terminal.draw(|f| render::ui(f, &app))?;

        while let Ok(update) = rx.try_recv() {
            for action in app.apply(update) {
                spawn_action(action, &services, &tx);
            }
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    for action in app.handle_key(key.code) {
                        if action == Action::Quit {
                            tracing::info!("dashboard closed");
                            return Ok(());
                        }
                        spawn_action(action, &services, &tx);
                    }
                }
                // the next draw picks up the new size
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(&AppConfig::default())
    }

    #[test]
    fn enter_starts_chart_and_guards_duplicates() {
        let mut app = app();
        assert!(!app.update_chart);
        let actions = app.handle_key(KeyCode::Enter);
        assert!(app.update_chart);
        assert_eq!(
            actions,
            vec![Action::LoadDashboard {
                ticker: "ADANIPORTS.NS".to_string(),
                period: Period::OneDay
            }]
        );
        assert!(app.handle_key(KeyCode::Enter).is_empty());
        assert_eq!(app.busy_message(), Some("Fetching market data..."));
    }

    #[test]
    fn changing_company_reloads_only_after_update_chart() {
        let mut app = app();
        assert!(app.handle_key(KeyCode::Right).is_empty());
        assert_eq!(app.dashboard.company_name(), "Axis Bank");

        app.handle_key(KeyCode::Enter);
        app.apply(Update::Dashboard(
            ("AXISBANK.NS".to_string(), Period::OneDay),
            Err("offline".to_string()),
        ));
        let actions = app.handle_key(KeyCode::Left);
        assert_eq!(
            actions,
            vec![Action::LoadDashboard {
                ticker: "ADANIPORTS.NS".to_string(),
                period: Period::OneDay
            }]
        );
    }

    #[test]
    fn stale_dashboard_result_triggers_reload() {
        let mut app = app();
        app.handle_key(KeyCode::Enter);
        app.dashboard.company = 1;
        let actions = app.apply(Update::Dashboard(
            ("ADANIPORTS.NS".to_string(), Period::OneDay),
            Err("late".to_string()),
        ));
        assert_eq!(actions.len(), 1);
        assert!(matches!(app.view, DashboardView::Idle));
    }

    #[test]
    fn indicator_and_chart_toggles_do_not_refetch() {
        let mut app = app();
        app.handle_key(KeyCode::Enter);
        app.dashboard_loading = false;
        app.focus = 2;
        assert!(app.handle_key(KeyCode::Right).is_empty());
        assert_eq!(app.dashboard.chart_type(), ChartType::Line);
        app.handle_key(KeyCode::Down);
        assert!(app.handle_key(KeyCode::Char(' ')).is_empty());
        assert!(app.dashboard.sma);
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Char(' '));
        assert!(app.dashboard.ema);
    }

    #[test]
    fn focus_wraps_per_mode() {
        let mut app = app();
        app.handle_key(KeyCode::Up);
        assert_eq!(app.focus, 4);
        app.handle_key(KeyCode::Tab);
        assert_eq!((app.mode, app.focus), (Mode::Forecast, 0));
        app.handle_key(KeyCode::Up);
        assert_eq!(app.focus, 2);
    }

    #[test]
    fn forecast_flow() {
        let mut app = app();
        app.handle_key(KeyCode::Tab);
        app.focus = 1;
        app.handle_key(KeyCode::Right);
        assert_eq!(app.forecast.days(), 5);
        app.focus = 2;
        app.handle_key(KeyCode::Left);
        assert_eq!(app.forecast.period(), Period::FiveYears);

        let actions = app.handle_key(KeyCode::Enter);
        assert_eq!(
            actions,
            vec![Action::RunForecast {
                company: "Adani Ports and SEZ".to_string(),
                ticker: "ADANIPORTS.NS".to_string(),
                days: 5,
                period: Period::FiveYears,
            }]
        );
        assert_eq!(app.busy_message(), Some("Running forecast..."));
        app.apply(Update::Forecast(Err("no data".to_string())));
        assert!(!app.forecast_running);
        assert_eq!(app.forecast_view.as_ref().unwrap().as_ref().unwrap_err(), "no data");
    }

    #[test]
    fn suggestions_are_keyed_by_ticker_and_period() {
        let mut app = app();
        assert!(app.handle_key(KeyCode::Char('g')).is_empty());

        app.handle_key(KeyCode::Tab);
        let actions = app.handle_key(KeyCode::Char('g'));
        assert_eq!(
            actions,
            vec![Action::GetSuggestions {
                ticker: "ADANIPORTS.NS".to_string(),
                period: Period::OneYear
            }]
        );
        assert!(app.handle_key(KeyCode::Char('g')).is_empty());

        let key = app.suggestion_key();
        app.apply(Update::Suggestion(key.clone(), Ok("Hold".to_string())));
        assert_eq!(app.suggestions[&key], SuggestionState::Ready("Hold".to_string()));

        app.focus = 2;
        app.handle_key(KeyCode::Right);
        assert!(app.suggestions.get(&app.suggestion_key()).is_none());
    }

    #[test]
    fn tick_polls_on_interval() {
        let mut app = app();
        let start = Instant::now();
        assert_eq!(app.tick(start), vec![Action::LoadQuotes]);
        app.apply(Update::Quotes(Vec::new()));
        assert!(app.tick(start + Duration::from_secs(30)).is_empty());

        app.handle_key(KeyCode::Enter);
        app.apply(Update::Dashboard(
            ("ADANIPORTS.NS".to_string(), Period::OneDay),
            Err("offline".to_string()),
        ));
        let actions = app.tick(start + Duration::from_secs(61));
        assert_eq!(actions.len(), 2);
        assert!(actions.contains(&Action::LoadQuotes));
    }

    #[test]
    fn quit_keys() {
        let mut app = app();
        assert_eq!(app.handle_key(KeyCode::Char('q')), vec![Action::Quit]);
        assert_eq!(app.handle_key(KeyCode::Esc), vec![Action::Quit]);
    }
}
