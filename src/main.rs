// src/main.rs
mod annotate;
mod config;
mod dataset;
mod infosfera;
mod prices;
mod reconcile;
mod storage;
mod utils;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use config::{PipelineContext, PriceSettings, ScrapeSettings, DEFAULT_CORRESPONDING_STOCKS_PATH};
use dataset::financial::DEFAULT_ANNOTATED_DATA_DIR;
use dataset::klej::DEFAULT_KLEJ_DATA_DIR;
use dataset::metrics::Prediction;
use dataset::{DatasetSource, FinancialDatasetConfig, KlejVariant, LabelVocabulary, LabeledText, SentimentLabel, Thresholds};
use infosfera::InfosferaClient;
use prices::{PriceMovementScorer, QuandlClient};
use reconcile::IdMatchPolicy;
use storage::{StorageManager, TrainingJob};
use utils::files_io::load_json;
use utils::AppError;

const CORRESPONDING_STOCKS_FILE: &str = "corresponding_stocks.json";

/// Command Line Interface for the ESPI dispatch sentiment pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Joins the disclosure-site company table with the price provider's instruments
    Reconcile {
        /// `name;code` table of the disclosure site
        #[arg(long)]
        site_companies: PathBuf,

        /// Price provider metadata CSV (header row, then the instrument code in the first column)
        #[arg(long)]
        provider_metadata: PathBuf,

        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,
    },

    /// Attaches disclosure-site ids to the corresponding stocks
    AttachIds {
        #[arg(long, default_value = DEFAULT_CORRESPONDING_STOCKS_PATH)]
        stocks: PathBuf,

        /// JSON object mapping company names to site ids
        #[arg(long, default_value = "data/company_name_to_id_raw.json")]
        ids: PathBuf,

        #[arg(long, value_enum, default_value_t = IdPolicyArg::DropMissing)]
        policy: IdPolicyArg,

        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,
    },

    /// Scrapes dispatch pages by their numeric id
    ScrapeIds {
        /// Dispatch URL without the trailing id
        #[arg(long)]
        url_base: String,

        #[arg(long)]
        first_included: u64,

        #[arg(long)]
        first_excluded: u64,

        #[arg(long, default_value = DEFAULT_CORRESPONDING_STOCKS_PATH)]
        stocks: PathBuf,

        #[arg(long, default_value = "10")]
        requests_in_row: usize,

        /// Seconds to wait after every batch of requests
        #[arg(long, default_value = "30")]
        pause_secs: u64,

        #[arg(short, long, default_value = "data/raw")]
        output_dir: PathBuf,
    },

    /// Scrapes the yearly dispatch listings of companies (a range of the stocks table when none given)
    ScrapeCompany {
        #[arg(short, long)]
        company: Vec<String>,

        /// First position in the stocks table to scrape
        #[arg(long, default_value = "0", conflicts_with = "company")]
        company_idx_start: usize,

        /// Position in the stocks table to stop before (defaults to the end of the table)
        #[arg(long, conflicts_with = "company")]
        company_idx_end: Option<usize>,

        #[arg(long)]
        year_start: i32,

        #[arg(long)]
        year_end: i32,

        #[arg(long, default_value = DEFAULT_CORRESPONDING_STOCKS_PATH)]
        stocks: PathBuf,

        /// Seconds to wait before every dispatch request
        #[arg(long, default_value = "10")]
        pause_secs: u64,

        #[arg(short, long, default_value = "data/raw")]
        output_dir: PathBuf,
    },

    /// Looks up company names for a range of disclosure-site ids
    ScrapeNames {
        #[arg(long)]
        first_id: u64,

        #[arg(long)]
        last_id: u64,

        #[arg(long)]
        min_year: i32,

        #[arg(long)]
        max_year: i32,

        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,
    },

    /// Scores raw dispatches against the market index
    Annotate {
        #[arg(short, long, default_value = "data/raw")]
        input_dir: PathBuf,

        #[arg(short, long, default_value = DEFAULT_ANNOTATED_DATA_DIR)]
        output_dir: PathBuf,

        /// Lowest file-name prefix to process
        #[arg(long, default_value = "a")]
        start_from: String,

        /// Highest file-name prefix to process
        #[arg(long, default_value = "z")]
        end_with: String,

        #[arg(long, default_value = DEFAULT_CORRESPONDING_STOCKS_PATH)]
        stocks: PathBuf,
    },

    /// Builds a labelled train/validation/test dataset and the trainer job description
    Dataset {
        #[arg(long, value_enum)]
        dataset: DatasetKind,

        #[arg(long, default_value = "0.2", allow_hyphen_values = true)]
        positive_threshold: f64,

        #[arg(long, default_value = "-0.2", allow_hyphen_values = true)]
        negative_threshold: f64,

        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        #[arg(long, default_value = "0.1")]
        val_fraction: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Label set, in encoding order
        #[arg(long, value_delimiter = ',', default_value = "positive,negative,neutral")]
        labels: Vec<SentimentLabel>,

        #[arg(long, default_value = DEFAULT_ANNOTATED_DATA_DIR)]
        annotated_dir: PathBuf,

        #[arg(long, default_value = DEFAULT_KLEJ_DATA_DIR)]
        klej_dir: PathBuf,

        #[arg(long, default_value = "3")]
        epochs: u32,

        #[arg(long, default_value = "8")]
        batch_size: u32,

        #[arg(long, default_value = "8")]
        eval_batch_size: u32,

        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Compares classifier predictions with a saved test split
    Evaluate {
        /// `test.json` written by the dataset command
        #[arg(long)]
        test_file: PathBuf,

        /// JSON array of predicted label names or label ids, in test-file order
        #[arg(long)]
        predictions: PathBuf,

        /// `labels.json` written by the dataset command
        #[arg(long)]
        labels: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum IdPolicyArg {
    DropMissing,
    RetainStrict,
    RetainLenient,
}

impl From<IdPolicyArg> for IdMatchPolicy {
    fn from(arg: IdPolicyArg) -> Self {
        match arg {
            IdPolicyArg::DropMissing => IdMatchPolicy::DropMissing,
            IdPolicyArg::RetainStrict => IdMatchPolicy::RetainStrict,
            IdPolicyArg::RetainLenient => IdMatchPolicy::RetainLenient,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DatasetKind {
    #[value(name = "klej_in")]
    KlejIn,
    #[value(name = "klej_out")]
    KlejOut,
    #[value(name = "financial")]
    Financial,
    #[value(name = "financial_mixed")]
    FinancialMixed,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    let result = run(args.command).await;
    if let Err(e) = &result {
        if e.is_configuration() {
            tracing::error!("Invalid configuration: {}", e);
        }
    }
    result
}

async fn run(command: Command) -> Result<(), AppError> {
    match command {
        Command::Reconcile {
            site_companies,
            provider_metadata,
            output_dir,
        } => {
            let site = reconcile::read_site_companies(&site_companies)?;
            let codes = reconcile::read_provider_codes(&provider_metadata)?;
            let stocks = reconcile::reconcile(&site, &codes);
            StorageManager::new(&output_dir)?.save_corresponding_stocks(CORRESPONDING_STOCKS_FILE, &stocks)?;
            Ok(())
        }

        Command::AttachIds {
            stocks,
            ids,
            policy,
            output_dir,
        } => {
            let corresponding: Vec<infosfera::CorrespondingStock> = load_json(&stocks)?;
            let ids = reconcile::load_company_ids(&ids)?;
            let updated = reconcile::attach_infosfera_ids(corresponding, &ids, policy.into())?;
            tracing::info!("{} companies after attaching site ids", updated.len());
            StorageManager::new(&output_dir)?.save_corresponding_stocks(CORRESPONDING_STOCKS_FILE, &updated)?;
            Ok(())
        }

        Command::ScrapeIds {
            url_base,
            first_included,
            first_excluded,
            stocks,
            requests_in_row,
            pause_secs,
            output_dir,
        } => {
            if requests_in_row == 0 {
                return Err(AppError::Config("--requests-in-row must be positive".to_string()));
            }
            let context = PipelineContext::load(&stocks)?;
            let storage = StorageManager::new(&output_dir)?;
            let client = InfosferaClient::new(ScrapeSettings {
                requests_in_row,
                batch_pause: Duration::from_secs(pause_secs),
                ..ScrapeSettings::default()
            })?;

            let report = client
                .scrape_dispatches_using_ids(&context, &url_base, first_included, first_excluded)
                .await;
            storage.save_dispatches(&format!("dispatches_{}_{}", first_included, first_excluded), &report.dispatches)?;
            println!("Scraped: {}, Failures: {}", report.dispatches.len(), report.failures);
            Ok(())
        }

        Command::ScrapeCompany {
            company,
            company_idx_start,
            company_idx_end,
            year_start,
            year_end,
            stocks,
            pause_secs,
            output_dir,
        } => {
            if year_start > year_end {
                return Err(AppError::Config(format!("year range {}..={} is empty", year_start, year_end)));
            }
            if company_idx_end.map_or(false, |end| end < company_idx_start) {
                return Err(AppError::Config(format!(
                    "company index range {}..{:?} is reversed",
                    company_idx_start, company_idx_end
                )));
            }
            let context = PipelineContext::load(&stocks)?;
            if context.is_empty() {
                return Err(AppError::Config(format!("no corresponding stocks in {}", stocks.display())));
            }
            let storage = StorageManager::new(&output_dir)?;
            let client = InfosferaClient::new(ScrapeSettings {
                dispatch_pause: Duration::from_secs(pause_secs),
                ..ScrapeSettings::default()
            })?;

            let (mut scraped, mut failures, mut aborted) = (0, 0, 0);
            let companies: Vec<String> = if company.is_empty() {
                context.companies_in_range(company_idx_start, company_idx_end)
            } else {
                let included = context.included_companies();
                let mut requested = Vec::with_capacity(company.len());
                for name in company.iter().map(|c| c.trim().to_uppercase()) {
                    if included.contains(&name) {
                        requested.push(name);
                    } else {
                        tracing::error!("{} is not in the corresponding stocks table", name);
                        aborted += 1;
                    }
                }
                requested
            };
            tracing::info!("Scraping {} of {} companies", companies.len(), context.len());

            for name in &companies {
                match client.scrape_dispatches_for_company(&context, name, year_start, year_end).await {
                    Ok(report) => {
                        storage.save_dispatches(name, &report.dispatches)?;
                        scraped += report.dispatches.len();
                        failures += report.failures;
                    }
                    Err(e) => {
                        tracing::error!("Failed to scrape {}: {}", name, e);
                        aborted += 1;
                    }
                }
            }
            println!(
                "Scraped: {}, Failures: {}, Aborted companies: {} (saved to {})",
                scraped,
                failures,
                aborted,
                storage.base_dir().display()
            );
            Ok(())
        }

        Command::ScrapeNames {
            first_id,
            last_id,
            min_year,
            max_year,
            output_dir,
        } => {
            let storage = StorageManager::new(&output_dir)?;
            let client = InfosferaClient::new(ScrapeSettings::default())?;

            let mut names: BTreeMap<String, u64> = BTreeMap::new();
            let mut failures = 0;
            for id in first_id..=last_id {
                match client.scrape_company_name(id, min_year, max_year).await {
                    Ok(Some(name)) => {
                        tracing::info!("{} -> {}", id, name);
                        names.insert(name, id);
                    }
                    Ok(None) => tracing::debug!("No company behind id {}", id),
                    Err(e) => {
                        tracing::warn!("Failed to look up id {}: {}", id, e);
                        failures += 1;
                    }
                }
            }
            storage.save_json("company_name_to_id_raw.json", &names)?;
            println!("Found: {}, Failures: {}", names.len(), failures);
            Ok(())
        }

        Command::Annotate {
            input_dir,
            output_dir,
            start_from,
            end_with,
            stocks,
        } => {
            let context = PipelineContext::load(&stocks)?;
            let storage = StorageManager::new(&output_dir)?;
            let settings = PriceSettings::default().with_env_api_key();
            let index_code = settings.index_code.clone();
            let scorer = PriceMovementScorer::new(QuandlClient::new(settings)?, index_code);

            let summary =
                annotate::annotate_directory(&input_dir, &storage, &context, &scorer, &start_from, &end_with).await?;
            println!(
                "Files: {}, Annotated: {}, Unavailable prices: {}, Aborted companies: {}, Unreadable files: {}",
                summary.files,
                summary.annotated,
                summary.unavailable,
                summary.aborted_companies.len(),
                summary.unreadable_files.len()
            );
            Ok(())
        }

        Command::Dataset {
            dataset: kind,
            positive_threshold,
            negative_threshold,
            test_fraction,
            val_fraction,
            seed,
            labels,
            annotated_dir,
            klej_dir,
            epochs,
            batch_size,
            eval_batch_size,
            output_dir,
        } => {
            // Configuration is checked before any file is touched.
            let source = match kind {
                DatasetKind::KlejIn | DatasetKind::KlejOut => DatasetSource::Klej {
                    variant: if kind == DatasetKind::KlejIn { KlejVariant::In } else { KlejVariant::Out },
                    data_dir: klej_dir,
                    labels,
                    validation_fraction: val_fraction,
                    seed,
                },
                DatasetKind::Financial | DatasetKind::FinancialMixed => {
                    let mut config =
                        FinancialDatasetConfig::new(annotated_dir, kind == DatasetKind::FinancialMixed)?;
                    config.thresholds = Thresholds::new(positive_threshold, negative_threshold)?;
                    config.split.test_fraction = test_fraction;
                    config.split.val_fraction = val_fraction;
                    config.split.random_seed = seed;
                    config.split.validate()?;
                    config.possible_labels = labels;
                    DatasetSource::Financial(config)
                }
            };
            let vocabulary = LabelVocabulary::new(source.labels())?;

            let split = dataset::build_dataset(&source)?;
            let encoded = dataset::encode_split(&split, &vocabulary)?;
            let storage = StorageManager::new(&output_dir)?;
            storage.save_dataset(&split, &vocabulary)?;

            let job = TrainingJob {
                dataset: source.name().to_string(),
                num_labels: vocabulary.len(),
                labels: vocabulary.labels().iter().map(|l| l.to_string()).collect(),
                epochs,
                batch_size,
                eval_batch_size,
                warmup_steps: 500,
                weight_decay: 0.01,
                logging_steps: 10,
                train_file: "train_encoded.json".to_string(),
                validation_file: "val_encoded.json".to_string(),
                test_file: "test_encoded.json".to_string(),
            };
            let job_path = storage.save_training_job(&encoded, &job)?;
            tracing::info!("Dataset files written to {}", storage.base_dir().display());
            println!(
                "Train: {}, Validation: {}, Test: {} (job: {})",
                split.train.len(),
                split.validation.len(),
                split.test.len(),
                job_path.display()
            );
            Ok(())
        }

        Command::Evaluate {
            test_file,
            predictions,
            labels,
        } => {
            let test: Vec<LabeledText> = load_json(&test_file)?;
            let predictions: Vec<Prediction> = load_json(&predictions)?;
            let labels: Vec<SentimentLabel> = load_json(&labels)?;
            let vocabulary = LabelVocabulary::new(&labels)?;
            let predicted = dataset::metrics::resolve_predictions(&predictions, &vocabulary)?;

            let expected: Vec<SentimentLabel> = test.iter().map(|r| r.label).collect();
            let (matrix, report) = dataset::metrics::evaluate(&expected, &predicted, &vocabulary)?;
            println!("Confusion matrix:\n{}", matrix);
            println!("Classification report\n{}", report);
            Ok(())
        }
    }
}
