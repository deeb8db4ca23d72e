// src/infosfera/client.rs
use crate::config::{PipelineContext, ScrapeSettings};
use crate::infosfera::models::StockExchangeDispatch;
use crate::infosfera::parser;
use crate::infosfera::throttle::Throttle;
use crate::utils::error::ScrapeError;
use crate::utils::logging::progress_bar;
use reqwest::header;

// The site only paginates very busy years; one page per year is fetched.
const LISTING_PAGE: u32 = 1;

/// Outcome of a scraping batch. Failed pages are counted, not fatal.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub dispatches: Vec<StockExchangeDispatch>,
    pub failures: usize,
}

impl ScrapeReport {
    fn record(&mut self, url: &str, result: Result<StockExchangeDispatch, ScrapeError>) {
        match result {
            Ok(dispatch) => self.dispatches.push(dispatch),
            Err(e) => {
                tracing::warn!("Skipping dispatch at {}: {}", url, e);
                self.failures += 1;
            }
        }
    }

    fn absorb(&mut self, other: ScrapeReport) {
        self.dispatches.extend(other.dispatches);
        self.failures += other.failures;
    }
}

/// HTTP client for the disclosure site.
pub struct InfosferaClient {
    http: reqwest::Client,
    settings: ScrapeSettings,
}

impl InfosferaClient {
    pub fn new(settings: ScrapeSettings) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { http, settings })
    }

    /// Downloads a page and returns its body. Non-2xx statuses are errors.
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        tracing::debug!("Fetching page: {}", url);

        let response = self.http
            .get(url)
            .header(header::ACCEPT, "text/html,*/*")
            .send()
            .await?; // Propagates reqwest::Error as ScrapeError::Network

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("HTTP error status: {} for URL: {}", status, url);
            return Err(ScrapeError::Http(status));
        }

        let body = response.text().await?;
        tracing::trace!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }

    /// Scrapes a single dispatch page. The result carries no sentiment yet.
    pub async fn scrape_dispatch(&self, url: &str) -> Result<StockExchangeDispatch, ScrapeError> {
        let html = self.fetch_page(url).await?;
        parser::parse_dispatch_page(&html)
    }

    /// Like [`Self::scrape_dispatch`], rejecting companies missing from the reconciliation table.
    pub async fn scrape_dispatch_within(
        &self,
        url: &str,
        context: &PipelineContext,
    ) -> Result<StockExchangeDispatch, ScrapeError> {
        let dispatch = self.scrape_dispatch(url).await?;
        if !context.is_included(dispatch.company_name()) {
            return Err(ScrapeError::ExcludedCompany(dispatch.company_name().to_string()));
        }
        Ok(dispatch)
    }

    /// Scrapes dispatches `url_base + id` for ids in `first_included..first_excluded`.
    ///
    /// Pauses for the configured batch pause after every `requests_in_row` requests.
    pub async fn scrape_dispatches_using_ids(
        &self,
        context: &PipelineContext,
        url_base: &str,
        first_included: u64,
        first_excluded: u64,
    ) -> ScrapeReport {
        let mut report = ScrapeReport::default();
        let mut throttle = Throttle::new(self.settings.requests_in_row, self.settings.batch_pause);
        let pb = progress_bar(first_excluded.saturating_sub(first_included), "dispatches");

        for id in first_included..first_excluded {
            let url = format!("{}{}", url_base, id);
            let result = self.scrape_dispatch_within(&url, context).await;
            report.record(&url, result);
            pb.inc(1);
            throttle.tick().await;
        }

        pb.finish_and_clear();
        tracing::info!(
            "Scraped {} dispatches, no data for {} pages",
            report.dispatches.len(),
            report.failures
        );
        report
    }

    /// Scrapes every dispatch a company published in `year_start..=year_end`.
    ///
    /// Fails up front when the company has no disclosure-site id. A broken listing page
    /// skips its year and a broken dispatch page is skipped; both are counted as failures.
    pub async fn scrape_dispatches_for_company(
        &self,
        context: &PipelineContext,
        company_name: &str,
        year_start: i32,
        year_end: i32,
    ) -> Result<ScrapeReport, ScrapeError> {
        let company_id = context
            .company_id(company_name)
            .ok_or_else(|| ScrapeError::ExcludedCompany(company_name.to_string()))?;

        let mut report = ScrapeReport::default();
        let mut throttle = Throttle::new(1, self.settings.dispatch_pause);

        for year in year_start..=year_end {
            let url = self.listing_url(company_id, year, LISTING_PAGE);
            let days = match self.fetch_listing(&url).await {
                Ok(days) => days,
                Err(e) => {
                    tracing::warn!("Skipping {} listing for {}: {}", year, company_name, e);
                    report.failures += 1;
                    continue;
                }
            };
            tracing::info!("{}: {} days with dispatches in {}", company_name, days.len(), year);

            let pb = progress_bar(days.len() as u64, &format!("{} {}", company_name, year));
            for day in days {
                let mut day_report = ScrapeReport::default();
                for dispatch_url in &day.dispatch_urls {
                    throttle.tick().await;
                    let result = self.scrape_dispatch(dispatch_url).await;
                    day_report.record(dispatch_url, result);
                }
                report.absorb(day_report);
                pb.inc(1);
            }
            pb.finish_and_clear();
        }

        Ok(report)
    }

    async fn fetch_listing(&self, url: &str) -> Result<Vec<parser::DayListing>, ScrapeError> {
        let html = self.fetch_page(url).await?;
        parser::parse_company_listing(&html)
    }

    /// Searches the listing pages of `company_id` for the company's name.
    pub async fn scrape_company_name(
        &self,
        company_id: u64,
        min_year: i32,
        max_year: i32,
    ) -> Result<Option<String>, ScrapeError> {
        for year in min_year..=max_year {
            let url = self.listing_url(company_id, year, LISTING_PAGE);
            let html = self.fetch_page(&url).await?;
            if let Some(name) = parser::company_name_from_listing(&html)? {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    fn listing_url(&self, company_id: u64, year: i32, page: u32) -> String {
        format!(
            "{}/{},{},0,0,{}",
            self.settings.company_listing_url.trim_end_matches('/'),
            company_id,
            year,
            page
        )
    }
}
