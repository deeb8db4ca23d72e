// src/reconcile/mod.rs
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::infosfera::models::CorrespondingStock;
use crate::utils::error::{ReconcileError, StorageError};
use crate::utils::files_io::load_json;

/// What to do with companies absent from the disclosure-site id table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdMatchPolicy {
    /// Drop them.
    #[default]
    DropMissing,
    /// Keep them, but demand an id anyway: the first missing id fails the whole join.
    RetainStrict,
    /// Keep them without an id.
    RetainLenient,
}

/// A company row from the disclosure site's name/code table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCompany {
    pub name: String,
    pub code: String,
}

impl SiteCompany {
    pub fn new(name: &str, code: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
        }
    }
}

/// Reads the `name;code` table of the disclosure site (no header row).
pub fn read_site_companies<P: AsRef<Path>>(path: P) -> Result<Vec<SiteCompany>, ReconcileError> {
    let file = std::fs::File::open(path.as_ref()).map_err(csv::Error::from)?;
    read_site_companies_from(file)
}

pub fn read_site_companies_from<R: Read>(reader: R) -> Result<Vec<SiteCompany>, ReconcileError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let mut companies = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        match (record.get(0), record.get(1)) {
            (Some(name), Some(code)) if !name.trim().is_empty() && !code.trim().is_empty() => {
                companies.push(SiteCompany::new(name.trim(), code.trim()));
            }
            _ => tracing::warn!("Skipping incomplete company row {}: {:?}", line + 1, record),
        }
    }
    Ok(companies)
}

/// Reads the instrument codes (first column) of the price provider's metadata file.
pub fn read_provider_codes<P: AsRef<Path>>(path: P) -> Result<HashSet<String>, ReconcileError> {
    let file = std::fs::File::open(path.as_ref()).map_err(csv::Error::from)?;
    read_provider_codes_from(file)
}

/// The first row is the provider's column header (`code,name,...`) and is not a code.
pub fn read_provider_codes_from<R: Read>(reader: R) -> Result<HashSet<String>, ReconcileError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut codes = HashSet::new();
    for record in rdr.records() {
        if let Some(code) = record?.get(0).map(str::trim).filter(|c| !c.is_empty()) {
            codes.insert(code.to_string());
        }
    }
    Ok(codes)
}

/// Inner join on the company code (exact, case-sensitive).
///
/// Names are uppercased; companies on only one side are dropped, and a name repeated
/// after uppercasing keeps its first row.
pub fn reconcile(site: &[SiteCompany], provider_codes: &HashSet<String>) -> Vec<CorrespondingStock> {
    let mut seen = HashSet::new();
    let mut stocks = Vec::new();

    for company in site {
        if !provider_codes.contains(&company.code) {
            tracing::trace!("{} ({}) is not traded at the price provider", company.name, company.code);
            continue;
        }
        let stock = CorrespondingStock::new(&company.name, &company.code);
        if !seen.insert(stock.company_name.clone()) {
            tracing::warn!("Duplicate company name {}, keeping the first code", stock.company_name);
            continue;
        }
        stocks.push(stock);
    }

    tracing::info!(
        "{} of {} disclosure-site companies are traded at the price provider",
        stocks.len(),
        site.len()
    );
    stocks
}

/// Loads the `company name -> site id` table. Ids may be numbers or numeric strings.
pub fn load_company_ids<P: AsRef<Path>>(path: P) -> Result<HashMap<String, u64>, StorageError> {
    let raw: HashMap<String, serde_json::Value> = load_json(path)?;
    raw.into_iter()
        .map(|(name, value)| {
            let id = match &value {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            id.map(|id| (name.trim().to_uppercase(), id)).ok_or_else(|| {
                StorageError::SerializationError(format!("invalid id {} for company {}", value, name))
            })
        })
        .collect()
}

/// Attaches disclosure-site ids by company name.
pub fn attach_infosfera_ids(
    stocks: Vec<CorrespondingStock>,
    ids: &HashMap<String, u64>,
    policy: IdMatchPolicy,
) -> Result<Vec<CorrespondingStock>, ReconcileError> {
    let mut updated = Vec::with_capacity(stocks.len());

    for mut stock in stocks {
        match (ids.get(&stock.company_name), policy) {
            (Some(&id), _) => stock.company_infosfera_id = Some(id),
            (None, IdMatchPolicy::DropMissing) => {
                tracing::debug!("No site id for {}, dropping", stock.company_name);
                continue;
            }
            (None, IdMatchPolicy::RetainStrict) => {
                return Err(ReconcileError::MissingInfosferaId(stock.company_name));
            }
            (None, IdMatchPolicy::RetainLenient) => stock.company_infosfera_id = None,
        }
        updated.push(stock);
    }

    Ok(updated)
}
