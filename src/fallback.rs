use crate::snapshot::{
    AnalyticsOverview, AnalyticsSnapshot, AwardRecord, CuisineRecord, MarketGap,
    SustainabilityTrend, TrendDirection,
};

/// Cuisines with known growth and sustainability figures: (name, count, growth, sustainability, avg stars, color).
pub(crate) const CUISINE_CATALOG: [(&str, u32, f64, f64, f64, &str); 6] = [
    ("New Nordic", 45, 15.3, 92.0, 2.8, "#60a5fa"),
    ("Molecular", 38, 8.7, 71.0, 2.9, "#f472b6"),
    ("Japanese", 127, 12.1, 85.0, 2.4, "#fbbf24"),
    ("French", 89, 3.2, 68.0, 2.7, "#a78bfa"),
    ("Mediterranean", 76, 18.5, 89.0, 2.2, "#34d399"),
    ("Plant-Based", 52, 34.8, 96.0, 2.1, "#10b981"),
];

/// Countries leading on sustainability: (country, score, growth, restaurants, trend).
pub(crate) const SUSTAINABILITY_LEADERS: [(&str, u32, f64, u32, TrendDirection); 15] = [
    ("Denmark", 94, 12.3, 23, TrendDirection::Up),
    ("Sweden", 91, 8.7, 18, TrendDirection::Up),
    ("Norway", 89, 15.2, 14, TrendDirection::Up),
    ("Netherlands", 86, 6.9, 31, TrendDirection::Up),
    ("Switzerland", 85, 5.4, 19, TrendDirection::Up),
    ("Germany", 83, 4.1, 42, TrendDirection::Stable),
    ("Austria", 81, 7.2, 16, TrendDirection::Up),
    ("France", 78, 2.8, 67, TrendDirection::Stable),
    ("United Kingdom", 76, 3.5, 38, TrendDirection::Up),
    ("Belgium", 74, 6.1, 22, TrendDirection::Up),
    ("Japan", 72, 8.9, 85, TrendDirection::Up),
    ("Canada", 70, 9.2, 29, TrendDirection::Up),
    ("Australia", 68, 11.4, 24, TrendDirection::Up),
    ("New Zealand", 67, 13.6, 12, TrendDirection::Up),
    ("Finland", 89, 14.8, 11, TrendDirection::Up),
];

pub(crate) fn fallback_overview() -> AnalyticsOverview {
    AnalyticsOverview {
        total_restaurants: 2847,
        total_cuisines: 156,
        total_countries: 67,
        avg_star_rating: 2.3,
        total_clusters: 8,
    }
}

pub(crate) fn cuisine_catalog_entry(name: &str) -> Option<CuisineRecord> {
    CUISINE_CATALOG
        .iter()
        .find(|(catalog_name, ..)| catalog_name.eq_ignore_ascii_case(name))
        .map(
            |&(name, count, growth, sustainability, avg_stars, color)| CuisineRecord {
                name: name.to_string(),
                count,
                growth,
                sustainability,
                avg_stars,
                color: color.to_string(),
            },
        )
}

pub(crate) fn sustainability_leader(country: &str) -> Option<SustainabilityTrend> {
    SUSTAINABILITY_LEADERS
        .iter()
        .find(|(name, ..)| name.eq_ignore_ascii_case(country))
        .map(|&(name, score, growth, restaurants, trend)| SustainabilityTrend {
            country: name.to_string(),
            score,
            growth,
            restaurants,
            trend,
        })
}

/// Opportunity region: (region, opportunity, investment, cuisines, map coords).
pub(crate) type GapRegion = (&'static str, u32, f64, &'static [&'static str], [f64; 2]);

const SAMPLE_MARKET_GAPS: [GapRegion; 5] = [
    ("Nordic Fine Dining", 94, 2.4, &["New Nordic", "Scandinavian"], [25.0, 75.0]),
    ("Asian Fusion Hub", 87, 3.1, &["Japanese", "Korean", "Thai"], [75.0, 25.0]),
    ("Sustainable Coastal", 82, 1.8, &["Seafood", "Mediterranean"], [15.0, 45.0]),
    ("Urban Plant-Based", 78, 1.2, &["Vegan", "Raw"], [65.0, 65.0]),
    ("Molecular Gastronomy", 85, 4.5, &["Molecular", "Experimental"], [45.0, 15.0]),
];

pub(crate) fn market_gaps_from(regions: &[GapRegion]) -> Vec<MarketGap> {
    regions
        .iter()
        .map(|&(region, opportunity, investment, cuisines, coords)| MarketGap {
            region: region.to_string(),
            opportunity,
            investment,
            cuisines: cuisines.iter().map(|cuisine| cuisine.to_string()).collect(),
            coords,
        })
        .collect()
}

/// Complete sample snapshot substituted when the data source fails.
pub fn fallback_snapshot() -> AnalyticsSnapshot {
    let cuisine_data = CUISINE_CATALOG
        .iter()
        .filter_map(|(name, ..)| cuisine_catalog_entry(name))
        .collect();

    let sustainability_trends = [
        "Denmark",
        "Sweden",
        "Norway",
        "Netherlands",
        "Germany",
        "France",
    ]
    .into_iter()
    .filter_map(sustainability_leader)
    .map(|mut trend| {
        // France is trending down in the sample set, unlike the leader table.
        if trend.country == "France" {
            trend.trend = TrendDirection::Down;
        }
        trend
    })
    .collect();

    let awards_data = [
        ("Michelin Stars", 127, 8, "michelin"),
        ("World's 50 Best", 45, 3, "worlds50"),
        ("Green Star", 32, 12, "green"),
        ("Bib Gourmand", 89, 15, "bib"),
    ]
    .into_iter()
    .map(|(award, total, new_this_year, category)| AwardRecord {
        award: award.to_string(),
        total,
        new_this_year,
        category: category.to_string(),
    })
    .collect();

    AnalyticsSnapshot {
        overview: fallback_overview(),
        cuisine_data,
        market_gaps: market_gaps_from(&SAMPLE_MARKET_GAPS),
        sustainability_trends,
        awards_data,
    }
}
