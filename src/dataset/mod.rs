// src/dataset/mod.rs
pub mod financial;
pub mod klej;
pub mod labels;
pub mod metrics;
pub mod split;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use financial::FinancialDatasetConfig;
pub use klej::KlejVariant;
pub use labels::{LabelVocabulary, LabeledText, SentimentLabel, Thresholds};
pub use split::DatasetSplit;

use crate::utils::error::DatasetError;

/// Which corpus to build, with the parameters that corpus needs.
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Klej {
        variant: KlejVariant,
        data_dir: PathBuf,
        labels: Vec<SentimentLabel>,
        validation_fraction: f64,
        seed: u64,
    },
    Financial(FinancialDatasetConfig),
}

impl DatasetSource {
    pub fn name(&self) -> &'static str {
        match self {
            DatasetSource::Klej { variant: KlejVariant::In, .. } => "klej_in",
            DatasetSource::Klej { variant: KlejVariant::Out, .. } => "klej_out",
            DatasetSource::Financial(config) if config.split.shuffle_companies => "financial_mixed",
            DatasetSource::Financial(_) => "financial",
        }
    }

    /// Label set of the built dataset, in encoding order.
    pub fn labels(&self) -> &[SentimentLabel] {
        match self {
            DatasetSource::Klej { labels, .. } => labels,
            DatasetSource::Financial(config) => &config.possible_labels,
        }
    }
}

/// Builds the partitions of `source`. A dataset without a single record is an error.
pub fn build_dataset(source: &DatasetSource) -> Result<DatasetSplit, DatasetError> {
    tracing::info!("Building {} dataset", source.name());
    let split = match source {
        DatasetSource::Klej {
            variant,
            data_dir,
            labels,
            validation_fraction,
            seed,
        } => klej::klej_dataset(data_dir, *variant, labels, *validation_fraction, *seed),
        DatasetSource::Financial(config) => financial::generate_financial_dataset(config),
    }?;

    if split.is_empty() {
        return Err(DatasetError::Configuration(format!(
            "{} dataset has no records with labels {:?}",
            source.name(),
            source.labels()
        )));
    }
    tracing::info!("{} dataset holds {} records", source.name(), split.len());
    Ok(split)
}

/// A record whose label is replaced by its index in the label vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRecord {
    pub text: String,
    pub label: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedSplit {
    pub train: Vec<EncodedRecord>,
    pub validation: Vec<EncodedRecord>,
    pub test: Vec<EncodedRecord>,
}

pub fn encode_split(split: &DatasetSplit, vocabulary: &LabelVocabulary) -> Result<EncodedSplit, DatasetError> {
    let encode = |records: &[LabeledText]| {
        records
            .iter()
            .map(|r| {
                vocabulary
                    .encode(r.label)
                    .map(|label| EncodedRecord {
                        text: r.text.clone(),
                        label,
                    })
                    .ok_or_else(|| DatasetError::Configuration(format!("label '{}' is not in the label set", r.label)))
            })
            .collect::<Result<Vec<_>, _>>()
    };

    Ok(EncodedSplit {
        train: encode(&split.train)?,
        validation: encode(&split.validation)?,
        test: encode(&split.test)?,
    })
}
