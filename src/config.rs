// src/config.rs
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::infosfera::models::CorrespondingStock;
use crate::utils::error::StorageError;
use crate::utils::files_io::load_json;

pub const DEFAULT_CORRESPONDING_STOCKS_PATH: &str = "data/corresponding_stocks.json";
pub const DEFAULT_COMPANY_LISTING_URL: &str = "http://infostrefa.com/infostrefa/pl/raporty/espi/firmy";
pub const DEFAULT_PRICE_API_URL: &str = "https://data.nasdaq.com/api/v3";
pub const QUANDL_API_KEY_ENV: &str = "QUANDL_API_KEY";

const USER_AGENT: &str = concat!("espi_sentiment/", env!("CARGO_PKG_VERSION"));

/// Lookup tables built from the corresponding-stocks file.
///
/// Loaded once at process start and handed by reference to every stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    stocks: Vec<CorrespondingStock>,
    by_name: HashMap<String, usize>,
}

impl PipelineContext {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let stocks: Vec<CorrespondingStock> = load_json(path.as_ref())?;
        tracing::info!(
            "Loaded {} corresponding stocks from {}",
            stocks.len(),
            path.as_ref().display()
        );
        Ok(Self::from_stocks(stocks))
    }

    /// Builds the lookups. A repeated company name keeps its first entry.
    pub fn from_stocks(stocks: Vec<CorrespondingStock>) -> Self {
        let mut by_name = HashMap::with_capacity(stocks.len());
        for (idx, stock) in stocks.iter().enumerate() {
            if by_name.contains_key(&stock.company_name) {
                tracing::warn!("Duplicate company name {} in corresponding stocks", stock.company_name);
                continue;
            }
            by_name.insert(stock.company_name.clone(), idx);
        }
        Self { stocks, by_name }
    }

    fn stock(&self, company_name: &str) -> Option<&CorrespondingStock> {
        self.by_name.get(company_name).map(|&idx| &self.stocks[idx])
    }

    /// Price-provider ticker for a company.
    pub fn company_code(&self, company_name: &str) -> Option<&str> {
        self.stock(company_name).map(|s| s.company_code.as_str())
    }

    /// Disclosure-site id for a company, when the table carries one.
    pub fn company_id(&self, company_name: &str) -> Option<u64> {
        self.stock(company_name).and_then(|s| s.company_infosfera_id)
    }

    /// Company names in file order.
    pub fn company_names(&self) -> impl Iterator<Item = &str> {
        self.stocks.iter().map(|s| s.company_name.as_str())
    }

    /// Company names at table positions `start..end`, in file order. `None` runs to the end.
    ///
    /// Lets an interrupted scrape resume from the company it stopped at.
    pub fn companies_in_range(&self, start: usize, end: Option<usize>) -> Vec<String> {
        let end = end.unwrap_or(self.len()).min(self.len());
        self.company_names()
            .skip(start)
            .take(end.saturating_sub(start))
            .map(str::to_string)
            .collect()
    }

    pub fn included_companies(&self) -> HashSet<String> {
        self.by_name.keys().cloned().collect()
    }

    /// Dispatch pages often drop the legal-form suffix, so `NAME` also matches `NAME SA`.
    pub fn is_included(&self, company_name: &str) -> bool {
        self.by_name.contains_key(company_name)
            || self.by_name.contains_key(&format!("{} SA", company_name))
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }
}

/// Disclosure-site scraping parameters.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Base URL of the per-company yearly listing pages.
    pub company_listing_url: String,
    /// Requests issued before each pause when scraping by dispatch id.
    pub requests_in_row: usize,
    /// Pause after every `requests_in_row` requests.
    pub batch_pause: Duration,
    /// Pause before each dispatch fetch when scraping a company's listing.
    pub dispatch_pause: Duration,
    pub user_agent: String,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            company_listing_url: DEFAULT_COMPANY_LISTING_URL.to_string(),
            requests_in_row: 10,
            batch_pause: Duration::from_secs(30),
            dispatch_pause: Duration::from_secs(10),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Price-provider parameters.
#[derive(Debug, Clone)]
pub struct PriceSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Exchange database prefix of the instrument codes.
    pub exchange: String,
    /// Market index every company is compared against.
    pub index_code: String,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PRICE_API_URL.to_string(),
            api_key: None,
            exchange: "WSE".to_string(),
            index_code: "WIG".to_string(),
        }
    }
}

impl PriceSettings {
    /// Reads the API key from `QUANDL_API_KEY`, if set.
    pub fn with_env_api_key(mut self) -> Self {
        match std::env::var(QUANDL_API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => self.api_key = Some(key),
            _ => tracing::warn!("{} is not set; price requests are anonymous", QUANDL_API_KEY_ENV),
        }
        self
    }
}
