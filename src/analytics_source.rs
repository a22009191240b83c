use std::time::Duration;

use crate::{
    config::AppConfig,
    fallback::{self, GapRegion, SUSTAINABILITY_LEADERS},
    log_util,
    snapshot::{
        AnalyticsOverview, AnalyticsSnapshot, AwardRecord, CuisineRecord, SustainabilityTrend,
        TrendDirection,
    },
};
use async_trait::async_trait;
use color_eyre::eyre::{Context, Result, eyre};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const SAMPLE_SCALE: u32 = 50;
const CUISINE_PALETTE: [&str; 12] = [
    "#60a5fa", "#f472b6", "#fbbf24", "#a78bfa", "#34d399", "#10b981", "#ef4444", "#f59e0b",
    "#8b5cf6", "#06b6d4", "#84cc16", "#f97316",
];
const CUISINE_COLORS: [(&str, &str); 12] = [
    ("New Nordic", "#60a5fa"),
    ("Molecular", "#f472b6"),
    ("Japanese", "#fbbf24"),
    ("French", "#a78bfa"),
    ("Mediterranean", "#34d399"),
    ("Plant-Based", "#10b981"),
    ("Italian", "#ef4444"),
    ("American", "#f59e0b"),
    ("Chinese", "#8b5cf6"),
    ("Indian", "#06b6d4"),
    ("Thai", "#84cc16"),
    ("Mexican", "#f97316"),
];

/// The backend has no market gap endpoint; live snapshots carry these estimates.
const ESTIMATED_MARKET_GAPS: [GapRegion; 5] = [
    ("Nordic Excellence", 94, 2.4, &["New Nordic", "Scandinavian"], [25.0, 75.0]),
    ("Asian Innovation Hub", 87, 3.1, &["Japanese", "Korean", "Thai"], [75.0, 25.0]),
    ("Coastal Sustainability", 82, 1.8, &["Seafood", "Mediterranean"], [15.0, 45.0]),
    ("Urban Plant-Based", 78, 1.2, &["Vegan", "Raw"], [65.0, 65.0]),
    ("Molecular Gastronomy", 85, 4.5, &["Molecular", "Experimental"], [45.0, 15.0]),
];

/// Anything able to produce a full analytics snapshot or fail trying.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn fetch_all_analytics(&self) -> Result<AnalyticsSnapshot>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Connected,
    /// The backend answered with a non-success status.
    Error(String),
    Disconnected(String),
}

impl BackendStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Connected => "backend connected".to_string(),
            Self::Error(status) => format!("backend error ({})", status),
            Self::Disconnected(reason) => format!("backend offline: {}", reason),
        }
    }
}

/// Restaurant rows returned by the backend's sample-data endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SampleRestaurant {
    #[serde(rename = "Base_Cuisine", default)]
    pub cuisine: Option<String>,
    #[serde(rename = "Base_Star_Rating", default)]
    pub star_rating: Option<f64>,
    #[serde(rename = "Base_Country", default)]
    pub country: Option<String>,
    #[serde(rename = "Base_Reputation_Label", default)]
    pub reputation_label: Option<String>,
}

/// Builds snapshots from the Fork & Star recommendations API.
#[derive(Debug, Clone)]
pub struct HttpAnalyticsSource {
    client: Client,
    api_base: String,
    cuisine_limit: usize,
    sustainability_limit: usize,
}

impl HttpAnalyticsSource {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("failed to build analytics HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            cuisine_limit: 20,
            sustainability_limit: 10,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut source = Self::new(
            config.api_base_url.as_str(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        source.cuisine_limit = config.cuisine_limit;
        source.sustainability_limit = config.sustainability_limit;
        Ok(source)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Probe the backend root endpoint.
    pub async fn check_backend_connection(&self) -> BackendStatus {
        let endpoint = format!("{}/", self.api_base);
        log_util::log_debug(&format!("AnalyticsSource: probing {}", endpoint));
        match self
            .client
            .get(&endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => BackendStatus::Connected,
            Ok(response) => BackendStatus::Error(format!("HTTP {}", response.status().as_u16())),
            Err(err) => BackendStatus::Disconnected(err.to_string()),
        }
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let endpoint = format!("{}{}", self.api_base, path);
        log_util::log_debug(&format!("AnalyticsSource: GET {}", endpoint));
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .wrap_err_with(|| format!("failed to reach {}", endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            log_util::log_debug(&format!(
                "AnalyticsSource: {} returned {}",
                endpoint, status
            ));
            return Err(eyre!("{} returned {}", path, status));
        }

        response
            .json::<T>()
            .await
            .wrap_err_with(|| format!("malformed JSON from {}", path))
    }
}

#[async_trait]
impl AnalyticsSource for HttpAnalyticsSource {
    async fn fetch_all_analytics(&self) -> Result<AnalyticsSnapshot> {
        let health: Value = self.get_json("/recommendations/health").await?;
        let restaurants: Vec<SampleRestaurant> =
            self.get_json("/recommendations/debug/sample-data").await?;
        log_util::log_debug(&format!(
            "AnalyticsSource: sample data holds {} restaurant(s)",
            restaurants.len()
        ));

        Ok(AnalyticsSnapshot {
            overview: overview_from_health(&health),
            cuisine_data: cuisine_analytics(&restaurants, self.cuisine_limit),
            market_gaps: fallback::market_gaps_from(&ESTIMATED_MARKET_GAPS),
            sustainability_trends: sustainability_trends(&restaurants, self.sustainability_limit),
            awards_data: awards_from_reputation(&restaurants),
        })
    }
}

pub(crate) fn overview_from_health(health: &Value) -> AnalyticsOverview {
    let defaults = fallback::fallback_overview();
    let database_info = health.get("database_info");
    let count = |key: &str, default: u32| {
        database_info
            .and_then(|info| info.get(key))
            .and_then(Value::as_u64)
            .filter(|value| *value > 0)
            .map(|value| u32::try_from(value).unwrap_or(u32::MAX))
            .unwrap_or(default)
    };

    AnalyticsOverview {
        total_restaurants: count("total_records", defaults.total_restaurants),
        total_cuisines: count("unique_restaurants", defaults.total_cuisines),
        ..defaults
    }
}

fn cuisine_color(name: &str, index: usize) -> String {
    CUISINE_COLORS
        .iter()
        .find(|(cuisine, _)| *cuisine == name)
        .map(|(_, color)| *color)
        .unwrap_or(CUISINE_PALETTE[index % CUISINE_PALETTE.len()])
        .to_string()
}

pub(crate) fn cuisine_analytics(restaurants: &[SampleRestaurant], limit: usize) -> Vec<CuisineRecord> {
    // Groups keep first-seen order.
    let mut groups: Vec<(String, u32, Vec<f64>)> = Vec::new();
    for restaurant in restaurants {
        let name = restaurant
            .cuisine
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown");
        let index = match groups.iter().position(|(existing, ..)| existing == name) {
            Some(index) => index,
            None => {
                groups.push((name.to_string(), 0, Vec::new()));
                groups.len() - 1
            }
        };
        let group = &mut groups[index];
        group.1 += 1;
        if let Some(stars) = restaurant.star_rating.filter(|stars| *stars > 0.0) {
            group.2.push(stars);
        }
    }

    groups
        .into_iter()
        .enumerate()
        .take(limit)
        .map(|(index, (name, count, stars))| {
            let avg_stars = if stars.is_empty() {
                0.0
            } else {
                let mean = stars.iter().sum::<f64>() / stars.len() as f64;
                (mean * 10.0).round() / 10.0
            };
            let known = fallback::cuisine_catalog_entry(&name);
            CuisineRecord {
                color: cuisine_color(&name, index),
                count: count.saturating_mul(SAMPLE_SCALE),
                growth: known.as_ref().map(|entry| entry.growth).unwrap_or(0.0),
                sustainability: known.as_ref().map(|entry| entry.sustainability).unwrap_or(0.0),
                avg_stars,
                name,
            }
        })
        .collect()
}

pub(crate) fn sustainability_trends(
    restaurants: &[SampleRestaurant],
    limit: usize,
) -> Vec<SustainabilityTrend> {
    let mut combined: Vec<SustainabilityTrend> = Vec::new();
    let contains = |combined: &[SustainabilityTrend], country: &str| {
        combined
            .iter()
            .any(|trend| trend.country.eq_ignore_ascii_case(country))
    };

    for restaurant in restaurants {
        let Some(country) = restaurant
            .country
            .as_deref()
            .map(str::trim)
            .filter(|country| !country.is_empty())
        else {
            continue;
        };
        if contains(combined.as_slice(), country) {
            continue;
        }
        let sample_count = restaurants
            .iter()
            .filter(|other| {
                other
                    .country
                    .as_deref()
                    .is_some_and(|name| name.trim().eq_ignore_ascii_case(country))
            })
            .count() as u32;
        let trend = match fallback::sustainability_leader(country) {
            Some(mut leader) => {
                leader.restaurants = leader.restaurants.saturating_add(sample_count);
                leader
            }
            None => SustainabilityTrend {
                country: country.to_string(),
                score: 65,
                growth: 0.0,
                restaurants: sample_count.saturating_mul(SAMPLE_SCALE),
                trend: TrendDirection::Stable,
            },
        };
        combined.push(trend);
    }

    for (country, ..) in SUSTAINABILITY_LEADERS {
        if combined.len() >= limit {
            break;
        }
        if contains(combined.as_slice(), country) {
            continue;
        }
        if let Some(leader) = fallback::sustainability_leader(country) {
            combined.push(leader);
        }
    }

    combined.sort_by(|a, b| b.score.cmp(&a.score));
    combined.truncate(limit);
    combined
}

pub(crate) fn awards_from_reputation(restaurants: &[SampleRestaurant]) -> Vec<AwardRecord> {
    let mut michelin = 0u32;
    let mut worlds50 = 0u32;
    let mut green = 0u32;
    let mut bib = 0u32;

    for restaurant in restaurants {
        let label = restaurant
            .reputation_label
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if label.contains("michelin") || label.contains("star") {
            michelin += 1;
        }
        if label.contains("world") || label.contains("best") {
            worlds50 += 1;
        }
        if label.contains("green") || label.contains("sustainable") {
            green += 1;
        }
        if label.contains("bib") || label.contains("gourmand") {
            bib += 1;
        }
    }

    [
        ("Michelin Stars", michelin, 20, 2, "michelin"),
        ("World's 50 Best", worlds50, 15, 1, "worlds50"),
        ("Green Star", green, 10, 3, "green"),
        ("Bib Gourmand", bib, 25, 4, "bib"),
    ]
    .into_iter()
    .map(|(award, hits, total_scale, new_scale, category)| AwardRecord {
        award: award.to_string(),
        total: hits.saturating_mul(total_scale),
        new_this_year: hits.saturating_mul(new_scale),
        category: category.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn restaurant(cuisine: &str, stars: f64, country: &str, label: &str) -> SampleRestaurant {
        SampleRestaurant {
            cuisine: Some(cuisine.to_string()),
            star_rating: Some(stars),
            country: Some(country.to_string()),
            reputation_label: Some(label.to_string()),
        }
    }

    #[test]
    fn overview_reads_database_info_with_defaults() {
        let health = json!({"database_info": {"total_records": 4100, "unique_restaurants": 0}});

        let overview = overview_from_health(&health);

        assert_eq!(overview.total_restaurants, 4100);
        assert_eq!(overview.total_cuisines, 156);
        assert_eq!(overview.total_countries, 67);
        assert_eq!(overview.total_clusters, 8);
    }

    #[test]
    fn cuisine_analytics_groups_in_first_seen_order() {
        let restaurants = vec![
            restaurant("Thai", 2.0, "Thailand", ""),
            restaurant("Japanese", 3.0, "Japan", ""),
            restaurant("Thai", 1.0, "Thailand", ""),
            SampleRestaurant::default(),
        ];

        let cuisines = cuisine_analytics(&restaurants, 20);

        let names: Vec<&str> = cuisines.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Thai", "Japanese", "Unknown"]);
        assert_eq!(cuisines[0].count, 100);
        assert_eq!(cuisines[0].avg_stars, 1.5);
        assert_eq!(cuisines[0].color, "#84cc16");
        assert_eq!(cuisines[1].growth, 12.1);
        assert_eq!(cuisines[2].avg_stars, 0.0);
        assert_eq!(cuisines[2].color, CUISINE_PALETTE[2]);
    }

    #[test]
    fn cuisine_analytics_respects_limit() {
        let restaurants = vec![
            restaurant("Thai", 2.0, "", ""),
            restaurant("French", 2.0, "", ""),
        ];

        assert_eq!(cuisine_analytics(&restaurants, 1).len(), 1);
    }

    #[test]
    fn sustainability_puts_real_countries_first_then_sorts() {
        let restaurants = vec![
            restaurant("French", 2.0, "France", ""),
            restaurant("French", 2.0, "france", ""),
            restaurant("Thai", 2.0, "Thailand", ""),
        ];

        let trends = sustainability_trends(&restaurants, 4);

        assert_eq!(trends.len(), 4);
        let countries: Vec<&str> = trends.iter().map(|t| t.country.as_str()).collect();
        assert_eq!(countries, ["Denmark", "Sweden", "France", "Thailand"]);
        assert_eq!(trends[2].restaurants, 69);
        assert_eq!(trends[3].restaurants, 50);
    }

    #[test]
    fn awards_count_reputation_keywords() {
        let restaurants = vec![
            restaurant("French", 3.0, "France", "Michelin 3 Star"),
            restaurant("Nordic", 2.0, "Denmark", "World's Best, Green Star"),
            restaurant("Thai", 0.0, "Thailand", "Bib Gourmand"),
        ];

        let awards = awards_from_reputation(&restaurants);

        assert_eq!(awards.len(), 4);
        assert_eq!(awards[0].total, 40);
        assert_eq!(awards[0].new_this_year, 4);
        assert_eq!(awards[1].total, 15);
        assert_eq!(awards[2].new_this_year, 3);
        assert_eq!(awards[3].total, 25);
    }

    fn http_source(base: &str) -> HttpAnalyticsSource {
        HttpAnalyticsSource::new(base, Duration::from_secs(5)).unwrap()
    }

    /// Base URL of a port nothing listens on.
    fn unreachable_base() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    async fn mock_get(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_builds_snapshot_from_health_and_sample_data() {
        let server = MockServer::start().await;
        mock_get(
            &server,
            "/recommendations/health",
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "healthy",
                "database_info": {"total_records": 3000, "unique_restaurants": 120}
            })),
        )
        .await;
        mock_get(
            &server,
            "/recommendations/debug/sample-data",
            ResponseTemplate::new(200).set_body_json(json!([
                {
                    "Base_Cuisine": "Japanese",
                    "Base_Star_Rating": 3.0,
                    "Base_Country": "Japan",
                    "Base_Reputation_Label": "Michelin 3 Star"
                },
                {
                    "Base_Cuisine": "Japanese",
                    "Base_Star_Rating": 2.0,
                    "Base_Country": "Denmark",
                    "Base_Reputation_Label": "Green Star"
                }
            ])),
        )
        .await;

        let snapshot = http_source(&server.uri())
            .fetch_all_analytics()
            .await
            .unwrap();

        assert_eq!(snapshot.overview.total_restaurants, 3000);
        assert_eq!(snapshot.overview.total_cuisines, 120);
        assert_eq!(snapshot.cuisine_data.len(), 1);
        assert_eq!(snapshot.cuisine_data[0].name, "Japanese");
        assert_eq!(snapshot.cuisine_data[0].count, 100);
        assert_eq!(snapshot.cuisine_data[0].avg_stars, 2.5);
        assert_eq!(snapshot.market_gaps.len(), 5);
        assert_eq!(snapshot.market_gaps[0].region, "Nordic Excellence");
        assert_eq!(snapshot.sustainability_trends.len(), 10);
        assert_eq!(snapshot.sustainability_trends[0].country, "Denmark");
        assert_eq!(snapshot.sustainability_trends[0].restaurants, 24);
        assert_eq!(snapshot.awards_data[0].total, 40);
        assert_eq!(snapshot.awards_data[2].total, 10);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        mock_get(&server, "/recommendations/health", ResponseTemplate::new(503)).await;

        let err = http_source(&server.uri())
            .fetch_all_analytics()
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "/recommendations/health returned 503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn malformed_payloads_are_errors() {
        let server = MockServer::start().await;
        mock_get(
            &server,
            "/recommendations/health",
            ResponseTemplate::new(200).set_body_string("{not json"),
        )
        .await;

        let err = http_source(&server.uri())
            .fetch_all_analytics()
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "malformed JSON from /recommendations/health");

        let server = MockServer::start().await;
        mock_get(
            &server,
            "/recommendations/health",
            ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})),
        )
        .await;
        mock_get(
            &server,
            "/recommendations/debug/sample-data",
            ResponseTemplate::new(200).set_body_json(json!({"restaurants": []})),
        )
        .await;

        let err = http_source(&server.uri())
            .fetch_all_analytics()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed JSON from /recommendations/debug/sample-data"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let base = unreachable_base();

        let err = http_source(&base).fetch_all_analytics().await.unwrap_err();

        assert!(err.to_string().starts_with("failed to reach"));
    }

    #[tokio::test]
    async fn backend_probe_reports_each_status() {
        let healthy = MockServer::start().await;
        mock_get(&healthy, "/", ResponseTemplate::new(200)).await;
        let failing = MockServer::start().await;
        mock_get(&failing, "/", ResponseTemplate::new(500)).await;

        assert_eq!(
            http_source(&healthy.uri()).check_backend_connection().await,
            BackendStatus::Connected
        );
        assert_eq!(
            http_source(&failing.uri()).check_backend_connection().await,
            BackendStatus::Error("HTTP 500".to_string())
        );
        assert!(matches!(
            http_source(&unreachable_base()).check_backend_connection().await,
            BackendStatus::Disconnected(_)
        ));
    }

    #[test]
    fn backend_status_labels() {
        assert_eq!(BackendStatus::Connected.label(), "backend connected");
        assert_eq!(
            BackendStatus::Error("HTTP 503".to_string()).label(),
            "backend error (HTTP 503)"
        );
    }
}
