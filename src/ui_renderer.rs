use crate::{
    App, DashboardSection, LOADING_FRAMES,
    snapshot::{AnalyticsSnapshot, DashboardState},
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Paragraph, Row, Table, Tabs, Wrap},
};

pub(crate) struct UiRenderer<'a> {
    app: &'a mut App,
}

impl<'a> UiRenderer<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn render(&mut self, frame: &mut Frame) {
        let state = self.app.dashboard_state();
        match state.data.clone() {
            Some(snapshot) => self.render_dashboard(frame, &state, &snapshot),
            None => self.render_loading(frame),
        }
    }

    fn render_loading(&mut self, frame: &mut Frame) {
        let app = &*self.app;
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(40),
                Constraint::Length(5),
                Constraint::Min(0),
            ])
            .split(frame.area());

        let spinner = LOADING_FRAMES[app.loading_frame % LOADING_FRAMES.len()];
        let text = format!(
            "{} Loading real analytics…\n\nFetching from {}",
            spinner, app.api_base
        );
        frame.render_widget(
            Paragraph::new(text)
                .centered()
                .block(Block::bordered().title(Self::title_line())),
            layout[1],
        );
    }

    fn render_dashboard(
        &mut self,
        frame: &mut Frame,
        state: &DashboardState,
        snapshot: &AnalyticsSnapshot,
    ) {
        let app = &*self.app;
        let notice = app.visible_notice(state);
        let notice_height = if notice.is_some() { 3 } else { 0 };

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(notice_height),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(frame.area());

        frame.render_widget(
            Paragraph::new(Self::header_line(app, state))
                .block(Block::bordered().title(Self::title_line()))
                .centered(),
            layout[0],
        );

        let titles: Vec<Line> = DashboardSection::ALL
            .iter()
            .enumerate()
            .map(|(index, section)| Line::from(format!("{} {}", index + 1, section.label())))
            .collect();
        frame.render_widget(
            Tabs::new(titles)
                .select(app.section.index())
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
                .block(Block::bordered()),
            layout[1],
        );

        if let Some(notice) = notice {
            frame.render_widget(
                Paragraph::new(notice)
                    .style(Style::default().fg(Color::Red))
                    .block(Block::bordered().title(Line::from("Notice (x to dismiss)"))),
                layout[2],
            );
        }

        match app.section {
            DashboardSection::Overview => Self::render_overview(frame, layout[3], snapshot),
            DashboardSection::Cuisine => Self::render_cuisines(frame, layout[3], snapshot),
            DashboardSection::MarketGaps => Self::render_market_gaps(frame, layout[3], snapshot),
            DashboardSection::Sustainability => {
                Self::render_sustainability(frame, layout[3], snapshot)
            }
            DashboardSection::Awards => Self::render_awards(frame, layout[3], snapshot),
        }

        let mut status_lines = Vec::new();
        if let Some(error) = &app.error {
            status_lines.push(format!("Error: {}", error));
        }
        status_lines.push(
            "r refresh • ←/→ or 1-5 switch section • x dismiss notice • Esc, Ctrl-C, or q to quit"
                .to_string(),
        );
        frame.render_widget(
            Paragraph::new(status_lines.join("\n"))
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title(Line::from("Status"))),
            layout[4],
        );
    }

    fn render_overview(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let overview = &snapshot.overview;
        let metrics = [
            ("Restaurants", format_count(overview.total_restaurants)),
            ("Cuisines", format_count(overview.total_cuisines)),
            ("Countries", format_count(overview.total_countries)),
            ("Avg stars", format!("{:.1}★", overview.avg_star_rating)),
            ("Clusters", format_count(overview.total_clusters)),
        ];
        let metric_lines: Vec<Line> = metrics
            .into_iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::raw(format!("{:<12}", label)),
                    Span::raw(value).bold(),
                ])
            })
            .collect();
        frame.render_widget(
            Paragraph::new(metric_lines).block(Block::bordered().title(Line::from("Key metrics"))),
            columns[0],
        );

        let mut highlights = Vec::new();
        if let Some(fastest) = snapshot
            .cuisine_data
            .iter()
            .max_by(|a, b| a.growth.total_cmp(&b.growth))
        {
            highlights.push(format!(
                "Fastest growing cuisine: {} (+{:.1}%)",
                fastest.name, fastest.growth
            ));
        }
        if let Some(gap) = snapshot.market_gaps.iter().max_by_key(|gap| gap.opportunity) {
            highlights.push(format!(
                "Top opportunity: {} ({} / 100)",
                gap.region, gap.opportunity
            ));
        }
        if let Some(leader) = snapshot.sustainability_trends.first() {
            highlights.push(format!(
                "Sustainability leader: {} ({})",
                leader.country, leader.score
            ));
        }
        let new_awards: u32 = snapshot
            .awards_data
            .iter()
            .map(|award| award.new_this_year)
            .sum();
        highlights.push(format!("New awards this year: {}", new_awards));

        frame.render_widget(
            Paragraph::new(highlights.join("\n"))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Highlights"))),
            columns[1],
        );
    }

    fn render_cuisines(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot) {
        let rows = snapshot.cuisine_data.iter().map(|cuisine| {
            Row::new(vec![
                Cell::from(cuisine.name.clone()).style(Style::default().fg(hex_color(&cuisine.color))),
                Cell::from(format_count(cuisine.count)),
                Cell::from(format!("+{:.1}%", cuisine.growth)),
                Cell::from(format!("{:.0}", cuisine.sustainability)),
                Cell::from(format!("{:.1}", cuisine.avg_stars)),
            ])
        });
        Self::render_table(
            frame,
            area,
            "Cuisine Intelligence",
            ["Cuisine", "Restaurants", "Growth", "Sustainability", "Avg stars"],
            rows,
            [
                Constraint::Percentage(30),
                Constraint::Percentage(15),
                Constraint::Percentage(15),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
            ],
        );
    }

    fn render_market_gaps(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot) {
        let rows = snapshot.market_gaps.iter().map(|gap| {
            Row::new(vec![
                Cell::from(gap.region.clone()),
                Cell::from(format!("{}", gap.opportunity)),
                Cell::from(format!("${:.1}M", gap.investment)),
                Cell::from(gap.cuisines.join(", ")),
                Cell::from(format!("{:.0},{:.0}", gap.coords[0], gap.coords[1])),
            ])
        });
        Self::render_table(
            frame,
            area,
            "Market Gaps",
            ["Region", "Opportunity", "Investment", "Cuisines", "Map"],
            rows,
            [
                Constraint::Percentage(25),
                Constraint::Percentage(12),
                Constraint::Percentage(12),
                Constraint::Percentage(39),
                Constraint::Percentage(12),
            ],
        );
    }

    fn render_sustainability(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot) {
        let rows = snapshot.sustainability_trends.iter().map(|trend| {
            Row::new(vec![
                Cell::from(trend.country.clone()),
                Cell::from(format!("{}", trend.score)),
                Cell::from(format!("+{:.1}%", trend.growth)),
                Cell::from(format_count(trend.restaurants)),
                Cell::from(trend.trend.symbol()),
            ])
        });
        Self::render_table(
            frame,
            area,
            "Sustainability",
            ["Country", "Score", "Growth", "Restaurants", "Trend"],
            rows,
            [
                Constraint::Percentage(30),
                Constraint::Percentage(15),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
                Constraint::Percentage(15),
            ],
        );
    }

    fn render_awards(frame: &mut Frame, area: Rect, snapshot: &AnalyticsSnapshot) {
        let rows = snapshot.awards_data.iter().map(|award| {
            Row::new(vec![
                Cell::from(award.award.clone()),
                Cell::from(format_count(award.total)),
                Cell::from(format!("+{}", award.new_this_year)),
                Cell::from(award.category.clone()),
            ])
        });
        Self::render_table(
            frame,
            area,
            "Awards",
            ["Award", "Total", "New this year", "Category"],
            rows,
            [
                Constraint::Percentage(35),
                Constraint::Percentage(20),
                Constraint::Percentage(20),
                Constraint::Percentage(25),
            ],
        );
    }

    fn render_table<'r, const N: usize>(
        frame: &mut Frame,
        area: Rect,
        title: &str,
        headers: [&str; N],
        rows: impl Iterator<Item = Row<'r>>,
        widths: [Constraint; N],
    ) {
        let header = Row::new(headers.map(|label| Cell::from(label.to_string())))
            .style(Style::default().add_modifier(Modifier::BOLD));
        frame.render_widget(
            Table::new(rows.collect::<Vec<_>>(), widths)
                .header(header)
                .block(Block::bordered().title(Line::from(title.to_string()))),
            area,
        );
    }

    fn title_line() -> Line<'static> {
        Line::from("Fork & Star • Analytics Intelligence")
            .bold()
            .blue()
            .centered()
    }

    fn header_line(app: &App, state: &DashboardState) -> Line<'static> {
        let health = if state.error.is_some() {
            Span::raw("●").red()
        } else {
            Span::raw("●").green()
        };
        let updated = state
            .last_updated
            .map(|time| format!("Last updated {}", time.format("%H:%M:%S")))
            .unwrap_or_else(|| "Not updated yet".to_string());
        let refresh = if state.refreshing {
            format!(
                "{} Refreshing…",
                LOADING_FRAMES[app.loading_frame % LOADING_FRAMES.len()]
            )
        } else if state.is_using_fallback() {
            "Showing sample data".to_string()
        } else {
            "Live data".to_string()
        };
        let backend = app
            .backend_status
            .as_ref()
            .map(|status| status.label())
            .unwrap_or_else(|| "checking backend…".to_string());

        Line::from(vec![
            health,
            Span::raw(format!(" {} • {} • {}", updated, refresh, backend)),
        ])
    }
}

/// Parse `#rrggbb` into a terminal colour, falling back to the default foreground.
fn hex_color(value: &str) -> Color {
    let digits = value.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Color::Reset;
    }
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
    };
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Reset,
    }
}

fn format_count(value: u32) -> String {
    let digits = value.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(ch);
    }
    formatted
}
