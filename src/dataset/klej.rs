// src/dataset/klej.rs
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::labels::{LabeledText, SentimentLabel};
use crate::dataset::split::{stratified_split, DatasetSplit};
use crate::utils::error::DatasetError;

pub const DEFAULT_KLEJ_DATA_DIR: &str = "data";

/// PolEmo2.0 in-domain or out-of-domain corpus of the KLEJ benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlejVariant {
    In,
    Out,
}

impl KlejVariant {
    pub fn dir_name(&self) -> &'static str {
        match self {
            KlejVariant::In => "klej_polemo2.0-in",
            KlejVariant::Out => "klej_polemo2.0-out",
        }
    }

    pub fn path_in(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.dir_name())
    }
}

/// The two labelled files shipped with the corpus. `test_features.tsv` has no labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KlejData {
    pub train: Vec<LabeledText>,
    pub dev: Vec<LabeledText>,
}

fn map_label(raw: &str) -> Option<SentimentLabel> {
    match raw {
        "__label__meta_amb" => Some(SentimentLabel::Ambiguous),
        "__label__meta_plus_m" => Some(SentimentLabel::Positive),
        "__label__meta_zero" => Some(SentimentLabel::Neutral),
        "__label__meta_minus_m" => Some(SentimentLabel::Negative),
        _ => None,
    }
}

/// Reads one `text<TAB>label` file, skipping the header row.
///
/// Rows whose label is unknown or outside `labels` are dropped.
pub fn read_klej_file(path: &Path, labels: &[SentimentLabel]) -> Result<Vec<LabeledText>, DatasetError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut dropped = 0;

    for (idx, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (text, raw_label) = line.rsplit_once('\t').ok_or_else(|| DatasetError::MalformedKlejRow {
            path: path.display().to_string(),
            line: idx + 1,
        })?;

        match map_label(raw_label.trim()).filter(|l| labels.contains(l)) {
            Some(label) => records.push(LabeledText::new(text.trim(), label)),
            None => dropped += 1,
        }
    }

    tracing::debug!("{}: {} records kept, {} dropped", path.display(), records.len(), dropped);
    Ok(records)
}

pub fn read_klej(data_dir: &Path, variant: KlejVariant, labels: &[SentimentLabel]) -> Result<KlejData, DatasetError> {
    let dir = variant.path_in(data_dir);
    Ok(KlejData {
        train: read_klej_file(&dir.join("train.tsv"), labels)?,
        dev: read_klej_file(&dir.join("dev.tsv"), labels)?,
    })
}

/// Train is split (stratified) into train and validation; dev becomes the test partition.
pub fn klej_dataset(
    data_dir: &Path,
    variant: KlejVariant,
    labels: &[SentimentLabel],
    validation_fraction: f64,
    seed: u64,
) -> Result<DatasetSplit, DatasetError> {
    if !(0.0..1.0).contains(&validation_fraction) {
        return Err(DatasetError::Configuration(format!(
            "validation fraction ({}) must be in [0, 1)",
            validation_fraction
        )));
    }

    let data = read_klej(data_dir, variant, labels)?;
    tracing::info!(
        "Loaded {} ({} train, {} dev records)",
        variant.dir_name(),
        data.train.len(),
        data.dev.len()
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let (train, validation) = stratified_split(data.train, validation_fraction, &mut rng);
    Ok(DatasetSplit {
        train,
        validation,
        test: data.dev,
    })
}
