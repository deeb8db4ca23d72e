// src/prices/oracle.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::PriceSettings;
use crate::utils::dates::ISO_DATE_FORMAT;
use crate::utils::error::PriceError;

const CLOSE_COLUMN: &str = "Close";

/// Source of daily closing prices.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Every close the provider holds for `instrument` on exactly `date`.
    /// An empty vector means no trading record for that day.
    async fn closes(&self, instrument: &str, date: NaiveDate) -> Result<Vec<f64>, PriceError>;
}

/// Response of `GET /datasets/{exchange}/{code}/data.json`.
#[derive(Debug, Deserialize)]
struct DatasetDataResponse {
    dataset_data: DatasetData,
}

#[derive(Debug, Deserialize)]
struct DatasetData {
    column_names: Vec<String>,
    data: Vec<Vec<serde_json::Value>>,
}

/// Quandl (Nasdaq Data Link) time-series client for one exchange database.
#[derive(Debug, Clone)]
pub struct QuandlClient {
    http: reqwest::Client,
    settings: PriceSettings,
}

impl QuandlClient {
    pub fn new(settings: PriceSettings) -> Result<Self, PriceError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, settings })
    }

    fn dataset_url(&self, instrument: &str) -> String {
        format!(
            "{}/datasets/{}/{}/data.json",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.exchange,
            instrument
        )
    }
}

#[async_trait]
impl PriceOracle for QuandlClient {
    async fn closes(&self, instrument: &str, date: NaiveDate) -> Result<Vec<f64>, PriceError> {
        let day = date.format(ISO_DATE_FORMAT).to_string();
        let mut query = vec![("start_date", day.clone()), ("end_date", day)];
        if let Some(key) = &self.settings.api_key {
            query.push(("api_key", key.clone()));
        }

        let url = self.dataset_url(instrument);
        tracing::debug!("Requesting {} closes for {} from {}", instrument, date, url);

        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Price provider returned {} for {} on {}", status, instrument, date);
            return Err(PriceError::Http(status));
        }

        let body: DatasetDataResponse = response
            .json()
            .await
            .map_err(|e| PriceError::Parse(e.to_string()))?;
        extract_closes(&body.dataset_data)
    }
}

fn extract_closes(dataset: &DatasetData) -> Result<Vec<f64>, PriceError> {
    let close_idx = dataset
        .column_names
        .iter()
        .position(|c| c == CLOSE_COLUMN)
        .ok_or_else(|| PriceError::Parse(format!("no '{}' column in {:?}", CLOSE_COLUMN, dataset.column_names)))?;

    // Rows without a numeric close do not count as trading records.
    Ok(dataset
        .data
        .iter()
        .filter_map(|row| row.get(close_idx).and_then(serde_json::Value::as_f64))
        .collect())
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::collections::HashMap;

    /// Oracle backed by a fixed table of closes.
    #[derive(Default)]
    pub struct InMemoryOracle {
        closes: HashMap<(String, NaiveDate), Vec<f64>>,
    }

    impl InMemoryOracle {
        pub fn with_close(mut self, instrument: &str, date: &str, close: f64) -> Self {
            let date = crate::utils::dates::parse_iso_date(date).unwrap();
            self.closes
                .entry((instrument.to_string(), date))
                .or_default()
                .push(close);
            self
        }
    }

    #[async_trait]
    impl PriceOracle for InMemoryOracle {
        async fn closes(&self, instrument: &str, date: NaiveDate) -> Result<Vec<f64>, PriceError> {
            Ok(self
                .closes
                .get(&(instrument.to_string(), date))
                .cloned()
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn close_column_is_located_by_name() {
        let response: DatasetDataResponse = serde_json::from_value(json!({
            "dataset_data": {
                "column_names": ["Date", "Open", "High", "Low", "Close", "%Change", "Volume"],
                "data": [["2021-03-12", 60.1, 61.0, 59.5, 60.7, 0.5, 120000]]
            }
        }))
        .unwrap();
        assert_eq!(extract_closes(&response.dataset_data).unwrap(), vec![60.7]);
    }

    #[test]
    fn missing_close_column_is_a_parse_error() {
        let dataset = DatasetData {
            column_names: vec!["Date".into(), "Open".into()],
            data: vec![],
        };
        assert!(matches!(extract_closes(&dataset), Err(PriceError::Parse(_))));
    }

    #[test]
    fn null_closes_are_ignored() {
        let dataset = DatasetData {
            column_names: vec!["Date".into(), "Close".into()],
            data: vec![vec![json!("2021-03-12"), json!(null)]],
        };
        assert!(extract_closes(&dataset).unwrap().is_empty());
    }

    #[test]
    fn dataset_url_uses_exchange_prefix() {
        let client = QuandlClient::new(PriceSettings {
            api_url: "https://example.test/api/v3/".into(),
            ..PriceSettings::default()
        })
        .unwrap();
        assert_eq!(
            client.dataset_url("PKN"),
            "https://example.test/api/v3/datasets/WSE/PKN/data.json"
        );
    }
}
