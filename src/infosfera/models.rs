// src/infosfera/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::error::DispatchError;

/// A single regulatory disclosure published by a listed company.
///
/// Serialized with the keys `company_name`, `content`, `date` (ISO) and `sentiment`.
/// Company name and content are never empty; deserialization enforces it too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDispatch")]
pub struct StockExchangeDispatch {
    company_name: String,
    #[serde(rename = "content")]
    text_content: String,
    date: NaiveDate,
    sentiment: Option<f64>,
}

#[derive(Deserialize)]
struct RawDispatch {
    company_name: String,
    content: String,
    date: NaiveDate,
    #[serde(default)]
    sentiment: Option<f64>,
}

impl TryFrom<RawDispatch> for StockExchangeDispatch {
    type Error = DispatchError;

    fn try_from(raw: RawDispatch) -> Result<Self, Self::Error> {
        let dispatch = StockExchangeDispatch::new(&raw.company_name, &raw.content, raw.date)?;
        Ok(match raw.sentiment {
            Some(score) => dispatch.with_sentiment(score),
            None => dispatch,
        })
    }
}

impl StockExchangeDispatch {
    /// Builds an unannotated dispatch. The company name is trimmed and uppercased.
    pub fn new(company_name: &str, text_content: &str, date: NaiveDate) -> Result<Self, DispatchError> {
        let company_name = company_name.trim().to_uppercase();
        if company_name.is_empty() {
            return Err(DispatchError::EmptyCompanyName);
        }
        if text_content.trim().is_empty() {
            return Err(DispatchError::EmptyContent);
        }
        Ok(Self {
            company_name,
            text_content: text_content.to_string(),
            date,
            sentiment: None,
        })
    }

    /// Attaches the price-movement score computed by the annotation stage.
    pub fn with_sentiment(mut self, score: f64) -> Self {
        self.sentiment = Some(score);
        self
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn text_content(&self) -> &str {
        &self.text_content
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn sentiment(&self) -> Option<f64> {
        self.sentiment
    }
}

/// A company listed both on the disclosure site and by the price provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondingStock {
    pub company_name: String,
    /// Price-provider ticker.
    pub company_code: String,
    /// Disclosure-site internal id, attached by a later enrichment step.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "id_from_number_or_string"
    )]
    pub company_infosfera_id: Option<u64>,
}

impl CorrespondingStock {
    pub fn new(company_name: &str, company_code: &str) -> Self {
        Self {
            company_name: company_name.trim().to_uppercase(),
            company_code: company_code.trim().to_string(),
            company_infosfera_id: None,
        }
    }
}

// Older id tables store the ids as strings.
fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    match Option::<Id>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Id::Number(n)) => Ok(Some(n)),
        Some(Id::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}
