// src/annotate/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineContext;
use crate::infosfera::models::StockExchangeDispatch;
use crate::prices::{PriceMovementScorer, PriceOracle};
use crate::storage::StorageManager;
use crate::utils::error::{AnnotateError, AppError};
use crate::utils::files_io::load_json;
use crate::utils::logging::progress_bar;

/// Result of annotating one company's dispatches.
#[derive(Debug, Default)]
pub struct AnnotationOutcome {
    pub annotated: Vec<StockExchangeDispatch>,
    /// Dispatches dropped because a close was missing or ambiguous.
    pub unavailable: usize,
    /// Set when an unmapped company stopped the file early.
    pub aborted_on: Option<String>,
}

/// Tally over a whole directory run.
#[derive(Debug, Default)]
pub struct AnnotationSummary {
    pub files: usize,
    pub annotated: usize,
    pub unavailable: usize,
    pub aborted_companies: Vec<String>,
    pub unreadable_files: Vec<PathBuf>,
}

/// Attaches a price-movement score to each dispatch.
///
/// A price gap drops only that dispatch. A company missing from the code table points
/// at a systemic data problem, so the remaining dispatches are not attempted.
pub async fn annotate_dispatches<O: PriceOracle>(
    dispatches: Vec<StockExchangeDispatch>,
    context: &PipelineContext,
    scorer: &PriceMovementScorer<O>,
) -> AnnotationOutcome {
    let mut outcome = AnnotationOutcome::default();
    let pb = progress_bar(dispatches.len() as u64, "dispatches");

    for dispatch in dispatches {
        pb.inc(1);
        match scorer
            .score_company(context, dispatch.company_name(), dispatch.date())
            .await
        {
            Ok(score) => outcome.annotated.push(dispatch.with_sentiment(score)),
            Err(AnnotateError::Price(e)) => {
                tracing::warn!(
                    "{} has no usable prices around {}: {}",
                    dispatch.company_name(),
                    dispatch.date(),
                    e
                );
                outcome.unavailable += 1;
            }
            Err(AnnotateError::UnknownCompany(name)) => {
                tracing::error!("{} not found in company code table. Aborting this company.", name);
                outcome.aborted_on = Some(name);
                break;
            }
        }
    }

    pb.finish_and_clear();
    outcome
}

/// Regular files of `dir`, sorted by name, whose lowercased name prefixes fall
/// within `start_from..=end_with` (each bound compared on its own length).
pub fn select_source_files(dir: &Path, start_from: &str, end_with: &str) -> std::io::Result<Vec<PathBuf>> {
    let start_from = start_from.to_lowercase();
    let end_with = end_with.to_lowercase();

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    Ok(files
        .into_iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            prefix(&name, start_from.chars().count()) >= start_from.as_str()
                && prefix(&name, end_with.chars().count()) <= end_with.as_str()
        })
        .collect())
}

fn prefix(s: &str, chars: usize) -> &str {
    match s.char_indices().nth(chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Annotates every selected dispatch file of `src_dir` into `<stem>_annotated.json` files.
pub async fn annotate_directory<O: PriceOracle>(
    src_dir: &Path,
    storage: &StorageManager,
    context: &PipelineContext,
    scorer: &PriceMovementScorer<O>,
    start_from: &str,
    end_with: &str,
) -> Result<AnnotationSummary, AppError> {
    let files = select_source_files(src_dir, start_from, end_with)?;
    tracing::info!("Annotating {} files from {}", files.len(), src_dir.display());

    let mut summary = AnnotationSummary::default();
    for path in files {
        let dispatches: Vec<StockExchangeDispatch> = match load_json(&path) {
            Ok(dispatches) => dispatches,
            Err(e) => {
                tracing::error!("Cannot read {}: {}", path.display(), e);
                summary.unreadable_files.push(path);
                continue;
            }
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("Annotating {} ({} dispatches)", stem, dispatches.len());

        let outcome = annotate_dispatches(dispatches, context, scorer).await;
        storage.save_annotated(&stem, &outcome.annotated)?;

        summary.files += 1;
        summary.annotated += outcome.annotated.len();
        summary.unavailable += outcome.unavailable;
        summary.aborted_companies.extend(outcome.aborted_on);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infosfera::models::CorrespondingStock;
    use crate::prices::oracle::fakes::InMemoryOracle;
    use crate::utils::dates::parse_iso_date;
    use crate::utils::files_io::write_json;
    use tempfile::TempDir;

    fn dispatch(name: &str, date: &str) -> StockExchangeDispatch {
        StockExchangeDispatch::new(name, "treść raportu", parse_iso_date(date).unwrap()).unwrap()
    }

    fn context() -> PipelineContext {
        PipelineContext::from_stocks(vec![CorrespondingStock::new("CD PROJEKT", "CDR")])
    }

    fn scorer() -> PriceMovementScorer<InMemoryOracle> {
        let oracle = InMemoryOracle::default()
            .with_close("CDR", "2024-01-05", 10.0)
            .with_close("CDR", "2024-01-09", 11.0)
            .with_close("WIG", "2024-01-05", 100.0)
            .with_close("WIG", "2024-01-09", 99.0);
        PriceMovementScorer::new(oracle, "WIG")
    }

    #[tokio::test]
    async fn price_gaps_skip_single_dispatches() {
        let dispatches = vec![
            dispatch("CD PROJEKT", "2024-01-08"),
            dispatch("CD PROJEKT", "2024-02-01"),
            dispatch("CD PROJEKT", "2024-01-08"),
        ];
        let outcome = annotate_dispatches(dispatches, &context(), &scorer()).await;

        assert_eq!(outcome.annotated.len(), 2);
        assert_eq!(outcome.unavailable, 1);
        assert!(outcome.aborted_on.is_none());
        assert!(outcome.annotated.iter().all(|d| d.sentiment().is_some()));
    }

    #[tokio::test]
    async fn unknown_company_aborts_remaining_dispatches() {
        let dispatches = vec![
            dispatch("CD PROJEKT", "2024-01-08"),
            dispatch("ORLEN", "2024-01-08"),
            dispatch("CD PROJEKT", "2024-01-08"),
        ];
        let outcome = annotate_dispatches(dispatches, &context(), &scorer()).await;

        assert_eq!(outcome.annotated.len(), 1);
        assert_eq!(outcome.aborted_on.as_deref(), Some("ORLEN"));
    }

    #[test]
    fn selects_files_by_name_prefix_bounds() {
        let dir = TempDir::new().unwrap();
        for name in ["ALIOR.json", "budimex.json", "CDPROJEKT.json", "ORLEN.json", "ZYWIEC.json"] {
            fs::write(dir.path().join(name), "[]").unwrap();
        }
        fs::create_dir(dir.path().join("cache")).unwrap();

        let names = |start: &str, end: &str| -> Vec<String> {
            select_source_files(dir.path(), start, end)
                .unwrap()
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };

        assert_eq!(names("a", "z").len(), 5);
        assert_eq!(names("b", "c"), vec!["CDPROJEKT.json", "budimex.json"]);
        assert_eq!(names("cd", "o"), vec!["CDPROJEKT.json", "ORLEN.json"]);
    }

    #[tokio::test]
    async fn annotates_directory_into_suffixed_files() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_json(
            src.path().join("CD PROJEKT.json"),
            &vec![dispatch("CD PROJEKT", "2024-01-08"), dispatch("CD PROJEKT", "2024-02-01")],
        )
        .unwrap();
        write_json(src.path().join("ORLEN.json"), &vec![dispatch("ORLEN", "2024-01-08")]).unwrap();
        fs::write(src.path().join("PKOBP.json"), "not json").unwrap();

        let storage = StorageManager::new(out.path()).unwrap();
        let summary = annotate_directory(src.path(), &storage, &context(), &scorer(), "a", "z")
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.annotated, 1);
        assert_eq!(summary.unavailable, 1);
        assert_eq!(summary.aborted_companies, vec!["ORLEN"]);
        assert_eq!(summary.unreadable_files.len(), 1);

        let annotated: Vec<StockExchangeDispatch> =
            load_json(out.path().join("CD PROJEKT_annotated.json")).unwrap();
        assert!((annotated[0].sentiment().unwrap() - 0.11).abs() < 1e-12);
        assert!(out.path().join("ORLEN_annotated.json").exists());
    }
}
