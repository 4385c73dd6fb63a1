//! Remote indicator and country-detail queries.

mod cache;
mod dispatch;

pub use cache::{DetailCache, Lookup};
pub use dispatch::{QueryDispatcher, QueryUpdate};

use crate::config::ApiConfig;
use crate::error::QueryFailure;
use crate::model::{CountryDetail, IndicatorValue};
use serde_json::Value;
use std::future::Future;
use tracing::debug;

/// A source of indicator tables and country metadata.
pub trait WorldBankApi: Send + Sync + 'static {
    /// Every country's value for `indicator` in `year`
    fn indicator(
        &self,
        indicator: &str,
        year: u16,
    ) -> impl Future<Output = Result<Vec<IndicatorValue>, QueryFailure>> + Send;

    /// Metadata for a two-letter country code
    fn country(&self, iso2: &str) -> impl Future<Output = Result<CountryDetail, QueryFailure>> + Send;
}

/// HTTP client for the World Bank v2 JSON API.
pub struct WorldBankClient {
    http: reqwest::Client,
    base_url: String,
    per_page: u32,
}

impl WorldBankClient {
    pub fn new(config: &ApiConfig) -> Result<Self, QueryFailure> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            per_page: config.per_page.max(1),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, QueryFailure> {
        debug!(url, ?query, "GET");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryFailure::Status(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}

impl WorldBankApi for WorldBankClient {
    async fn indicator(&self, indicator: &str, year: u16) -> Result<Vec<IndicatorValue>, QueryFailure> {
        let url = format!("{}/country/all/indicator/{}", self.base_url, indicator);
        let mut values = Vec::new();
        let mut page = 1u32;

        loop {
            let body = self
                .get_json(
                    &url,
                    &[
                        ("format", "json".to_string()),
                        ("per_page", self.per_page.to_string()),
                        ("date", format!("{year}:{year}")),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            let (pages, mut rows) = parse_indicator_page(body)?;
            values.append(&mut rows);
            if page >= pages {
                break;
            }
            page += 1;
        }

        Ok(values)
    }

    async fn country(&self, iso2: &str) -> Result<CountryDetail, QueryFailure> {
        let url = format!("{}/country/{}", self.base_url, iso2);
        let body = self.get_json(&url, &[("format", "json".to_string())]).await?;
        parse_country(body, iso2)
    }
}

/// Split the `[meta, rows]` envelope, turning the provider's error
/// envelope `[{"message": [...]}]` into [`QueryFailure::Api`].
fn envelope(body: Value) -> Result<(Value, Value), QueryFailure> {
    let Value::Array(mut parts) = body else {
        return Err(QueryFailure::Malformed("expected a JSON array".into()));
    };

    if let Some(messages) = parts.first().and_then(|m| m.get("message")) {
        let text = messages
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|m| m.get("value").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(QueryFailure::Api(if text.is_empty() {
            messages.to_string()
        } else {
            text
        }));
    }

    if parts.is_empty() {
        return Err(QueryFailure::Malformed("empty response".into()));
    }
    let rows = if parts.len() > 1 {
        parts.swap_remove(1)
    } else {
        Value::Null
    };
    Ok((parts.swap_remove(0), rows))
}

/// Numbers may arrive as JSON numbers or strings depending on API version
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|f: &f64| f.is_finite())
}

/// One page of an indicator response: (total pages, values)
pub fn parse_indicator_page(body: Value) -> Result<(u32, Vec<IndicatorValue>), QueryFailure> {
    let (meta, rows) = envelope(body)?;
    let pages = meta.get("pages").and_then(as_number).unwrap_or(1.0).max(1.0) as u32;

    let rows = match rows {
        Value::Null => Vec::new(),
        Value::Array(rows) => rows,
        other => {
            return Err(QueryFailure::Malformed(format!(
                "indicator rows should be an array, got {other}"
            )))
        }
    };

    let values = rows
        .iter()
        .filter_map(|row| {
            let country = row.get("country")?.get("id")?.as_str()?;
            Some(IndicatorValue {
                country: country.to_ascii_uppercase(),
                value: row.get("value").and_then(as_number),
            })
        })
        .collect();

    Ok((pages, values))
}

pub fn parse_country(body: Value, iso2: &str) -> Result<CountryDetail, QueryFailure> {
    let (_, rows) = envelope(body)?;
    let first = match rows {
        Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
        _ => return Err(QueryFailure::NotFound(iso2.to_string())),
    };
    serde_json::from_value(first).map_err(|e| QueryFailure::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_indicator_page() {
        let body = json!([
            {"page": 1, "pages": 2, "per_page": "500", "total": 3},
            [
                {"country": {"id": "US", "value": "United States"}, "value": 100, "date": "1990"},
                {"country": {"id": "FR", "value": "France"}, "value": "50.5", "date": "1990"},
                {"country": {"id": "XK", "value": "Kosovo"}, "value": null, "date": "1990"}
            ]
        ]);
        let (pages, values) = parse_indicator_page(body).unwrap();
        assert_eq!(pages, 2);
        assert_eq!(
            values,
            vec![
                IndicatorValue { country: "US".into(), value: Some(100.0) },
                IndicatorValue { country: "FR".into(), value: Some(50.5) },
                IndicatorValue { country: "XK".into(), value: None },
            ]
        );
    }

    #[test]
    fn test_indicator_without_rows_is_empty() {
        let body = json!([{"page": 0, "pages": 0, "total": 0}, null]);
        let (pages, values) = parse_indicator_page(body).unwrap();
        assert_eq!(pages, 1);
        assert!(values.is_empty());
    }

    #[test]
    fn test_provider_error_envelope() {
        let body = json!([{"message": [{"id": "120", "key": "Invalid value",
                                         "value": "The provided parameter value is not valid"}]}]);
        match parse_indicator_page(body) {
            Err(QueryFailure::Api(text)) => assert!(text.contains("not valid")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_country() {
        let body = json!([
            {"page": 1, "pages": 1, "per_page": "50", "total": 1},
            [{"id": "USA", "iso2Code": "US", "name": "United States",
              "region": {"id": "NAC", "value": "North America"},
              "incomeLevel": {"id": "HIC", "value": "High income"},
              "lendingType": {"id": "LNX", "value": "Not classified"},
              "capitalCity": "Washington D.C.", "longitude": "-77.032", "latitude": "38.8895"}]
        ]);
        let detail = parse_country(body, "US").unwrap();
        assert_eq!(detail.name, "United States");
        assert_eq!(detail.income_level.value, "High income");
    }

    #[test]
    fn test_country_not_found() {
        let body = json!([{"page": 1, "pages": 0, "total": 0}, null]);
        assert!(matches!(parse_country(body, "ZZ"), Err(QueryFailure::NotFound(c)) if c == "ZZ"));
        assert!(matches!(
            parse_country(json!({"oops": true}), "ZZ"),
            Err(QueryFailure::Malformed(_))
        ));
    }
}
