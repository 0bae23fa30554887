//! Chart rendering
//!
//! Category breakdowns become QuickChart.io pie chart URLs.

use reqwest::Url;
use serde_json::json;
use std::collections::BTreeMap;

/// QuickChart render endpoint
pub const QUICKCHART_URL: &str = "https://quickchart.io/chart";

/// Pie chart URL for a category breakdown; labels come out sorted
#[must_use]
pub fn chart_url(by_category: &BTreeMap<String, f64>) -> String {
    let labels: Vec<&str> = by_category.keys().map(String::as_str).collect();
    let values: Vec<f64> = by_category.values().copied().collect();

    let config = json!({
        "type": "pie",
        "data": {
            "labels": labels,
            "datasets": [{ "data": values }],
        },
    });

    match Url::parse_with_params(QUICKCHART_URL, &[("c", config.to_string())]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}?c={}", QUICKCHART_URL, config),
    }
}
