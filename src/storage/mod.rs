// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::dataset::{DatasetSplit, EncodedSplit, LabelVocabulary};
use crate::infosfera::models::{CorrespondingStock, StockExchangeDispatch};
use crate::utils::error::StorageError;
use crate::utils::files_io::write_json;

pub const ANNOTATED_SUFFIX: &str = "_annotated.json";

/// Hyper-parameters and inputs handed to the external classifier trainer.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingJob {
    pub dataset: String,
    pub num_labels: usize,
    pub labels: Vec<String>,
    pub epochs: u32,
    pub batch_size: u32,
    pub eval_batch_size: u32,
    pub warmup_steps: u32,
    pub weight_decay: f64,
    pub logging_steps: u32,
    pub train_file: String,
    pub validation_file: String,
    pub test_file: String,
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes any serializable value to `<base_dir>/<file_name>`.
    pub fn save_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(file_name);
        write_json(&file_path, value)?;
        tracing::info!("Saved {}", file_path.display());
        Ok(file_path)
    }

    pub fn save_corresponding_stocks(&self, file_name: &str, stocks: &[CorrespondingStock]) -> Result<PathBuf, StorageError> {
        self.save_json(file_name, stocks)
    }

    /// Raw dispatches of one company: `<company_name>.json`.
    pub fn save_dispatches(&self, company_name: &str, dispatches: &[StockExchangeDispatch]) -> Result<PathBuf, StorageError> {
        self.save_json(&format!("{}.json", company_name), dispatches)
    }

    /// Annotated dispatches of one input file: `<stem>_annotated.json`.
    pub fn save_annotated(&self, stem: &str, dispatches: &[StockExchangeDispatch]) -> Result<PathBuf, StorageError> {
        self.save_json(&format!("{}{}", stem, ANNOTATED_SUFFIX), dispatches)
    }

    /// Writes `train.json`, `val.json`, `test.json` and `labels.json`.
    pub fn save_dataset(&self, split: &DatasetSplit, vocabulary: &LabelVocabulary) -> Result<Vec<PathBuf>, StorageError> {
        Ok(vec![
            self.save_json("train.json", &split.train)?,
            self.save_json("val.json", &split.validation)?,
            self.save_json("test.json", &split.test)?,
            self.save_json("labels.json", vocabulary.labels())?,
        ])
    }

    /// Writes the integer-encoded splits and the trainer job description.
    pub fn save_training_job(&self, encoded: &EncodedSplit, job: &TrainingJob) -> Result<PathBuf, StorageError> {
        self.save_json(&job.train_file, &encoded.train)?;
        self.save_json(&job.validation_file, &encoded.validation)?;
        self.save_json(&job.test_file, &encoded.test)?;
        self.save_json("training_job.json", job)
    }
}
