use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Aggregate counts shown in the overview cards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    #[serde(default)]
    pub total_restaurants: u32,
    #[serde(default)]
    pub total_cuisines: u32,
    #[serde(default)]
    pub total_countries: u32,
    #[serde(default)]
    pub avg_star_rating: f64,
    #[serde(default)]
    pub total_clusters: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuisineRecord {
    pub name: String,
    pub count: u32,
    pub growth: f64,
    pub sustainability: f64,
    pub avg_stars: f64,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketGap {
    pub region: String,
    pub opportunity: u32,
    /// Estimated investment in millions.
    pub investment: f64,
    #[serde(default)]
    pub cuisines: Vec<String>,
    /// Position on the opportunity map, both axes in 0..=100.
    pub coords: [f64; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    #[default]
    Stable,
    Down,
}

impl TrendDirection {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Up => "▲",
            Self::Stable => "■",
            Self::Down => "▼",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainabilityTrend {
    pub country: String,
    pub score: u32,
    pub growth: f64,
    pub restaurants: u32,
    #[serde(default)]
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecord {
    pub award: String,
    pub total: u32,
    pub new_this_year: u32,
    pub category: String,
}

/// One complete analytics payload. Live and fallback data share this shape, so
/// consumers never need to know where a snapshot came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub overview: AnalyticsOverview,
    pub cuisine_data: Vec<CuisineRecord>,
    pub market_gaps: Vec<MarketGap>,
    pub sustainability_trends: Vec<SustainabilityTrend>,
    pub awards_data: Vec<AwardRecord>,
}

/// What the presentation layer reads on every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    /// Current snapshot, swapped wholesale on every fetch resolution.
    pub data: Option<Arc<AnalyticsSnapshot>>,
    /// True until the first snapshot (live or fallback) has been committed.
    pub loading: bool,
    /// True while at least one user-initiated refresh is in flight.
    pub refreshing: bool,
    /// Message from the most recent failed fetch, cleared on success.
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Local>>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            refreshing: false,
            error: None,
            last_updated: None,
        }
    }
}

impl DashboardState {
    pub fn is_using_fallback(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_loading_without_data() {
        let state = DashboardState::default();

        assert!(state.loading);
        assert!(!state.refreshing);
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert!(state.last_updated.is_none());
        assert!(!state.is_using_fallback());
    }

    #[test]
    fn deserializes_upstream_camel_case_payload() {
        let json = r##"{
            "overview": {"totalRestaurants": 10, "totalCuisines": 3, "totalCountries": 2, "avgStarRating": 2.5, "totalClusters": 4},
            "cuisineData": [{"name": "Thai", "count": 5, "growth": 1.5, "sustainability": 80, "avgStars": 2.0, "color": "#84cc16"}],
            "marketGaps": [{"region": "Coastal", "opportunity": 82, "investment": 1.8, "cuisines": ["Seafood"], "coords": [15, 45]}],
            "sustainabilityTrends": [{"country": "Denmark", "score": 94, "growth": 12.3, "restaurants": 23, "trend": "up"}],
            "awardsData": [{"award": "Green Star", "total": 32, "newThisYear": 12, "category": "green"}]
        }"##;

        let snapshot: AnalyticsSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.overview.total_restaurants, 10);
        assert_eq!(snapshot.cuisine_data[0].avg_stars, 2.0);
        assert_eq!(snapshot.market_gaps[0].coords, [15.0, 45.0]);
        assert_eq!(snapshot.sustainability_trends[0].trend, TrendDirection::Up);
        assert_eq!(snapshot.awards_data[0].new_this_year, 12);
    }
}
