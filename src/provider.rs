use std::time::Duration;

use async_trait::async_trait;

use crate::config::PROVIDER_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::types::Metrics;

/// External metrics source. Any error — not-found, malformed payload,
/// timeout — is a per-item failure; callers log, count, and move on.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn fetch_metrics(&self, item_id: &str) -> Result<Metrics>;
}

pub struct HttpMetricsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetricsProvider {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl MetricsProvider for HttpMetricsProvider {
    async fn fetch_metrics(&self, item_id: &str) -> Result<Metrics> {
        let url = format!("{}/items/{}/metrics", self.base_url, item_id);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Provider(format!(
                "provider returned {} for item {item_id}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(parse_metrics(&body))
    }
}

/// Map the provider's loosely-shaped JSON onto a typed `Metrics`. The payload
/// mixes camelCase and snake_case keys and reports numbers both as numbers
/// and as strings, so every field is parsed leniently and lands as `None`
/// when absent or unreadable.
pub fn parse_metrics(v: &serde_json::Value) -> Metrics {
    Metrics {
        sales_rank: field_i64(v, &["salesRank", "sales_rank", "rank"]),
        price: field_f64(v, &["price"]),
        rating: field_f64(v, &["rating", "ratingAverage", "rating_average"]),
        rating_count: field_i64(v, &["ratingCount", "rating_count"]),
        review_count: field_i64(v, &["reviewCount", "review_count"]),
        category: v.get("category").and_then(|c| c.as_str()).map(|s| s.to_string()),
    }
}

fn field_i64(v: &serde_json::Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| {
        v.get(k)
            .and_then(|x| x.as_i64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
    })
}

fn field_f64(v: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| {
        v.get(k)
            .and_then(|x| x.as_f64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_numbers() {
        let v = serde_json::json!({
            "salesRank": 1234,
            "price": 9.99,
            "rating": 4.5,
            "ratingCount": 321,
            "reviewCount": 87,
            "category": "mystery"
        });
        let m = parse_metrics(&v);
        assert_eq!(m.sales_rank, Some(1234));
        assert_eq!(m.price, Some(9.99));
        assert_eq!(m.rating, Some(4.5));
        assert_eq!(m.rating_count, Some(321));
        assert_eq!(m.review_count, Some(87));
        assert_eq!(m.category.as_deref(), Some("mystery"));
    }

    #[test]
    fn parses_stringly_typed_numbers() {
        let v = serde_json::json!({ "sales_rank": "5678", "price": "12.50" });
        let m = parse_metrics(&v);
        assert_eq!(m.sales_rank, Some(5678));
        assert_eq!(m.price, Some(12.50));
    }

    #[test]
    fn missing_and_garbage_fields_become_none() {
        let v = serde_json::json!({ "salesRank": "not a number", "rating": null });
        let m = parse_metrics(&v);
        assert_eq!(m, Metrics::default());
        assert!(!m.has_signal());
    }
}
