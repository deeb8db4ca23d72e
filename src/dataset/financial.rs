// src/dataset/financial.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::labels::{label, LabeledText, SentimentLabel, Thresholds, FINANCIAL_LABELS};
use crate::dataset::split::{assemble, DatasetSplit, SplitConfig};
use crate::infosfera::models::StockExchangeDispatch;
use crate::storage::ANNOTATED_SUFFIX;
use crate::utils::error::DatasetError;
use crate::utils::files_io::load_json;

pub const DEFAULT_ANNOTATED_DATA_DIR: &str = "data/annotated";

/// Inputs of the financial dataset built from annotated dispatches.
#[derive(Debug, Clone)]
pub struct FinancialDatasetConfig {
    pub thresholds: Thresholds,
    pub split: SplitConfig,
    pub possible_labels: Vec<SentimentLabel>,
    pub annotated_data_dir: PathBuf,
}

impl FinancialDatasetConfig {
    /// Defaults used by the training runs: thresholds of +/-0.2 and the three financial labels.
    pub fn new(annotated_data_dir: impl Into<PathBuf>, shuffle_companies: bool) -> Result<Self, DatasetError> {
        Ok(Self {
            thresholds: Thresholds::new(0.2, -0.2)?,
            split: SplitConfig {
                shuffle_companies,
                ..SplitConfig::default()
            },
            possible_labels: FINANCIAL_LABELS.to_vec(),
            annotated_data_dir: annotated_data_dir.into(),
        })
    }
}

/// Labels every annotated dispatch under `dir` and groups the records by company.
///
/// Only `*_annotated.json` files are read, in name order. Dispatches without a finite
/// sentiment are skipped.
pub fn read_annotated_records(
    dir: &Path,
    thresholds: &Thresholds,
) -> Result<BTreeMap<String, Vec<LabeledText>>, DatasetError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .map_or(false, |n| n.to_string_lossy().ends_with(ANNOTATED_SUFFIX))
        })
        .collect();
    files.sort();

    let mut by_company: BTreeMap<String, Vec<LabeledText>> = BTreeMap::new();
    let mut skipped = 0;
    for path in &files {
        let dispatches: Vec<StockExchangeDispatch> = load_json(path)?;
        for dispatch in dispatches {
            let records = by_company.entry(dispatch.company_name().to_string()).or_default();
            match dispatch.sentiment().filter(|s| s.is_finite()) {
                Some(score) => {
                    let sentiment = label(score, thresholds.positive(), thresholds.negative())?;
                    records.push(LabeledText::new(dispatch.text_content(), sentiment));
                }
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} dispatches without a sentiment score", skipped);
    }
    tracing::info!(
        "Read {} annotated files covering {} companies from {}",
        files.len(),
        by_company.len(),
        dir.display()
    );
    Ok(by_company)
}

/// Validates the configuration, then reads, labels and splits the annotated corpus.
pub fn generate_financial_dataset(config: &FinancialDatasetConfig) -> Result<DatasetSplit, DatasetError> {
    config.split.validate()?;
    if config.possible_labels.is_empty() {
        return Err(DatasetError::Configuration("no possible labels given".to_string()));
    }

    let records = read_annotated_records(&config.annotated_data_dir, &config.thresholds)?;
    assemble(&records, &config.split, &config.possible_labels)
}
