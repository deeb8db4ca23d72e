// src/prices/scorer.rs
use chrono::NaiveDate;

use crate::config::PipelineContext;
use crate::prices::oracle::PriceOracle;
use crate::utils::dates::{next_trading_day, previous_trading_day};
use crate::utils::error::{AnnotateError, PriceError};

/// Closing prices on the trading days around a dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePair {
    pub previous_day: f64,
    pub next_day: f64,
}

/// `((x2 - x1) / x1) - ((y2 - y1) / y1)`: the company's return over the
/// ±1 trading day window minus the index's return over the same window.
/// `x` is the company close, `y` the index close, `1` the day before, `2` the day after.
pub fn relative_return_score(x1: f64, x2: f64, y1: f64, y2: f64) -> f64 {
    ((x2 - x1) / x1) - ((y2 - y1) / y1)
}

/// Scores dispatches by how the company moved against a market index.
pub struct PriceMovementScorer<O> {
    oracle: O,
    index_code: String,
}

impl<O: PriceOracle> PriceMovementScorer<O> {
    pub fn new(oracle: O, index_code: impl Into<String>) -> Self {
        Self {
            oracle,
            index_code: index_code.into(),
        }
    }

    /// Closes on the previous and next trading day around `date`.
    pub async fn prices(&self, instrument: &str, date: NaiveDate) -> Result<ClosePair, PriceError> {
        let previous_day = self.single_close(instrument, previous_trading_day(date)).await?;
        let next_day = self.single_close(instrument, next_trading_day(date)).await?;
        Ok(ClosePair { previous_day, next_day })
    }

    /// Relative-movement score of `company_code` against the index for a dispatch on `date`.
    pub async fn score(&self, company_code: &str, date: NaiveDate) -> Result<f64, PriceError> {
        let company = self.prices(company_code, date).await?;
        let index = self.prices(&self.index_code, date).await?;
        let score = relative_return_score(
            company.previous_day,
            company.next_day,
            index.previous_day,
            index.next_day,
        );
        if !score.is_finite() {
            return Err(PriceError::NonFiniteScore {
                instrument: company_code.to_string(),
                date,
            });
        }
        Ok(score)
    }

    /// Resolves the company's ticker first, then scores.
    pub async fn score_company(
        &self,
        context: &PipelineContext,
        company_name: &str,
        date: NaiveDate,
    ) -> Result<f64, AnnotateError> {
        let code = context
            .company_code(company_name)
            .ok_or_else(|| AnnotateError::UnknownCompany(company_name.to_string()))?;
        Ok(self.score(code, date).await?)
    }

    async fn single_close(&self, instrument: &str, date: NaiveDate) -> Result<f64, PriceError> {
        let closes = self.oracle.closes(instrument, date).await?;
        match closes.as_slice() {
            [close] => Ok(*close),
            _ => Err(PriceError::DataUnavailable {
                instrument: instrument.to_string(),
                date,
                records: closes.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infosfera::models::CorrespondingStock;
    use crate::prices::oracle::fakes::InMemoryOracle;
    use crate::utils::dates::parse_iso_date;

    fn scorer() -> PriceMovementScorer<InMemoryOracle> {
        // Dispatch on Monday 2024-01-08: previous trading day is Friday the 5th.
        let oracle = InMemoryOracle::default()
            .with_close("CDR", "2024-01-05", 10.0)
            .with_close("CDR", "2024-01-09", 11.0)
            .with_close("WIG", "2024-01-05", 100.0)
            .with_close("WIG", "2024-01-09", 99.0)
            .with_close("PKN", "2024-01-05", 50.0)
            .with_close("PKN", "2024-01-09", 50.0)
            .with_close("PKN", "2024-01-09", 51.0)
            .with_close("SUSP", "2024-01-05", 0.0)
            .with_close("SUSP", "2024-01-09", 5.0);
        PriceMovementScorer::new(oracle, "WIG")
    }

    #[test]
    fn formula_matches_worked_example() {
        let score = relative_return_score(10.0, 11.0, 100.0, 99.0);
        assert!((score - 0.11).abs() < 1e-12);
    }

    #[tokio::test]
    async fn scores_against_index_around_weekend() {
        let score = scorer().score("CDR", parse_iso_date("2024-01-08").unwrap()).await.unwrap();
        assert!((score - 0.11).abs() < 1e-12, "score was {}", score);
    }

    #[tokio::test]
    async fn missing_day_is_data_unavailable() {
        let err = scorer().score("CDR", parse_iso_date("2024-01-09").unwrap()).await.unwrap_err();
        match err {
            PriceError::DataUnavailable { instrument, records, .. } => {
                assert_eq!(instrument, "CDR");
                assert_eq!(records, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn duplicate_records_are_data_unavailable() {
        let err = scorer().score("PKN", parse_iso_date("2024-01-08").unwrap()).await.unwrap_err();
        assert!(matches!(err, PriceError::DataUnavailable { records: 2, .. }));
    }

    #[tokio::test]
    async fn zero_previous_close_is_not_scored() {
        let err = scorer().score("SUSP", parse_iso_date("2024-01-08").unwrap()).await.unwrap_err();
        assert!(matches!(err, PriceError::NonFiniteScore { instrument, .. } if instrument == "SUSP"));
    }

    #[test]
    fn unknown_company_is_reported_before_price_lookup() {
        let context = PipelineContext::from_stocks(vec![CorrespondingStock::new("CD PROJEKT", "CDR")]);
        let scorer = scorer();
        let date = parse_iso_date("2024-01-08").unwrap();

        let known = tokio_test::block_on(scorer.score_company(&context, "CD PROJEKT", date)).unwrap();
        assert!((known - 0.11).abs() < 1e-12);

        let err = tokio_test::block_on(scorer.score_company(&context, "ORLEN", date)).unwrap_err();
        assert!(matches!(err, AnnotateError::UnknownCompany(name) if name == "ORLEN"));
    }
}
