mod analytics_source;
mod config;
mod controller;
mod fallback;
mod log_util;
mod snapshot;
mod ui_renderer;

use analytics_source::{BackendStatus, HttpAnalyticsSource};
use chrono::{DateTime, Local};
use color_eyre::{Result, eyre::WrapErr};
use controller::{AnalyticsDataController, DashboardMount};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use dotenvy::dotenv;
use log_util::log_debug;
use ratatui::{DefaultTerminal, Frame};
use snapshot::DashboardState;
use std::{
    sync::{
        Arc,
        mpsc::{self, Receiver, TryRecvError},
    },
    time::Duration,
};
use tokio::{runtime::Runtime, sync::watch};
use ui_renderer::UiRenderer;

pub(crate) const LOADING_FRAMES: [&str; 4] = ["-", "\\", "|", "/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DashboardSection {
    Overview,
    Cuisine,
    MarketGaps,
    Sustainability,
    Awards,
}

impl DashboardSection {
    pub(crate) const ALL: [Self; 5] = [
        Self::Overview,
        Self::Cuisine,
        Self::MarketGaps,
        Self::Sustainability,
        Self::Awards,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Cuisine => "Cuisine Intelligence",
            Self::MarketGaps => "Market Gaps",
            Self::Sustainability => "Sustainability",
            Self::Awards => "Awards",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Overview => 0,
            Self::Cuisine => 1,
            Self::MarketGaps => 2,
            Self::Sustainability => 3,
            Self::Awards => 4,
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    color_eyre::install()?;
    let app = App::new()?;
    let terminal = ratatui::init();
    let result = app.run(terminal);
    ratatui::restore();
    result
}

/// The dashboard application: terminal loop plus the mounted analytics controller.
#[derive(Debug)]
pub struct App {
    /// Is the application running?
    pub(crate) running: bool,
    /// Section currently shown in the body.
    pub(crate) section: DashboardSection,
    /// Latest view state published by the controller.
    pub(crate) dashboard: watch::Receiver<DashboardState>,
    /// Keeps the refresh timer alive; dropped before the runtime.
    mount: Option<DashboardMount>,
    source: HttpAnalyticsSource,
    runtime: Runtime,
    /// Base URL of the analytics backend, shown in the header.
    pub(crate) api_base: String,
    /// Result of the most recent backend probe.
    pub(crate) backend_status: Option<BackendStatus>,
    status_receiver: Option<Receiver<BackendStatus>>,
    /// `last_updated` of the error notice the user dismissed.
    dismissed_notice: Option<DateTime<Local>>,
    /// Startup problems that do not stop the dashboard.
    pub(crate) error: Option<String>,
    /// Spinner frame index for the loading screen and refresh indicator.
    pub(crate) loading_frame: usize,
}

impl App {
    /// Construct a new instance of [`App`] and mount the analytics controller.
    pub fn new() -> Result<Self> {
        let mut aggregated_error: Option<String> = None;

        if let Err(err) = config::initialize() {
            Self::push_error(
                &mut aggregated_error,
                format!("Configuration load failed: {}", err),
            );
        }
        let settings = config::current();

        let runtime = Runtime::new().wrap_err("failed to build tokio runtime")?;
        let source = HttpAnalyticsSource::from_config(&settings)?;
        let controller = AnalyticsDataController::new(Arc::new(source.clone()));
        let mount = {
            let _guard = runtime.enter();
            controller.mount(settings.refresh_interval())?
        };
        let dashboard = controller.subscribe();

        let mut app = Self {
            running: false,
            section: DashboardSection::Overview,
            dashboard,
            mount: Some(mount),
            api_base: source.api_base().to_string(),
            source,
            runtime,
            backend_status: None,
            status_receiver: None,
            dismissed_notice: None,
            error: aggregated_error,
            loading_frame: 0,
        };
        app.probe_backend();
        Ok(app)
    }

    /// Run the application's main loop.
    pub fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.running = true;
        let tick_rate = Duration::from_millis(120);
        while self.running {
            self.poll_status_messages();
            terminal.draw(|frame| self.render(frame))?;
            self.handle_crossterm_events(tick_rate)?;
        }
        self.unmount();
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        UiRenderer::new(self).render(frame);
    }

    /// Snapshot of the controller state for this frame.
    pub(crate) fn dashboard_state(&self) -> DashboardState {
        match self.controller() {
            Some(controller) => controller.state(),
            None => self.dashboard.borrow().clone(),
        }
    }

    fn controller(&self) -> Option<&AnalyticsDataController> {
        self.mount.as_ref().map(DashboardMount::controller)
    }

    /// Error notice text, unless the user dismissed this particular failure.
    pub(crate) fn visible_notice(&self, state: &DashboardState) -> Option<String> {
        notice_for(state, self.dismissed_notice)
    }

    /// Reads the crossterm events and updates the state of [`App`].
    fn handle_crossterm_events(&mut self, tick_rate: Duration) -> Result<()> {
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key_event(key),
                Event::Mouse(_) => {}
                Event::Resize(_, _) => {}
                _ => {}
            }
            self.poll_status_messages();
        } else {
            self.on_tick();
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        let state = self.dashboard.borrow();
        let animating = state.loading || state.refreshing;
        drop(state);
        if animating {
            self.loading_frame = (self.loading_frame + 1) % LOADING_FRAMES.len();
        }
        self.poll_status_messages();
    }

    fn poll_status_messages(&mut self) {
        let mut clear_receiver = false;
        if let Some(receiver) = self.status_receiver.as_ref() {
            match receiver.try_recv() {
                Ok(status) => {
                    clear_receiver = true;
                    log_debug(&format!("App: {}", status.label()));
                    self.backend_status = Some(status);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    clear_receiver = true;
                    self.backend_status = Some(BackendStatus::Disconnected(
                        "status probe worker disconnected".to_string(),
                    ));
                }
            }
        }

        if clear_receiver {
            self.status_receiver = None;
        }
    }

    /// Handles the key events and updates the state of [`App`].
    fn on_key_event(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc | KeyCode::Char('q'))
            | (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            (KeyModifiers::NONE, KeyCode::Char('r') | KeyCode::Char('R'))
            | (KeyModifiers::SHIFT, KeyCode::Char('R')) => self.request_refresh(),
            (KeyModifiers::NONE, KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab) => {
                self.section = self.section.next();
            }
            (KeyModifiers::NONE, KeyCode::Left | KeyCode::Char('h'))
            | (_, KeyCode::BackTab) => {
                self.section = self.section.previous();
            }
            (KeyModifiers::NONE, KeyCode::Char('x')) => self.dismiss_notice(),
            (KeyModifiers::NONE, KeyCode::Char(digit @ '1'..='5')) => {
                let index = digit as usize - '1' as usize;
                if let Some(section) = DashboardSection::from_index(index) {
                    self.section = section;
                }
            }
            _ => {}
        }
    }

    fn request_refresh(&mut self) {
        if self.dashboard.borrow().refreshing {
            log_debug("App: refresh already in progress; ignoring duplicate request");
            return;
        }
        let Some(controller) = self.controller().cloned() else {
            return;
        };
        self.runtime.spawn(async move { controller.refresh().await });
        self.probe_backend();
    }

    fn probe_backend(&mut self) {
        if self.status_receiver.is_some() {
            return;
        }
        let (sender, receiver) = mpsc::channel();
        self.status_receiver = Some(receiver);
        let source = self.source.clone();
        self.runtime.spawn(async move {
            let status = source.check_backend_connection().await;
            let _ = sender.send(status);
        });
    }

    fn dismiss_notice(&mut self) {
        let state = self.dashboard.borrow();
        if state.error.is_some() {
            self.dismissed_notice = state.last_updated;
            log_debug("App: dismissed data source error notice");
        }
    }

    fn unmount(&mut self) {
        if let Some(mount) = self.mount.take() {
            mount.unmount();
        }
    }

    /// Set running to false to quit the application.
    fn quit(&mut self) {
        self.running = false;
    }

    /// Append a message to an optional error slot.
    fn push_error(slot: &mut Option<String>, message: String) {
        if let Some(existing) = slot {
            existing.push_str(" | ");
            existing.push_str(&message);
        } else {
            *slot = Some(message);
        }
    }
}

fn notice_for(state: &DashboardState, dismissed: Option<DateTime<Local>>) -> Option<String> {
    let error = state.error.as_ref()?;
    if dismissed.is_some() && dismissed == state.last_updated {
        return None;
    }
    Some(format!("API Error: {} (using fallback data)", error))
}
