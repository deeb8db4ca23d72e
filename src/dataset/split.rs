// src/dataset/split.rs
use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::dataset::labels::{LabeledText, SentimentLabel};
use crate::utils::error::DatasetError;

// Absorbs float noise such as 0.2 / 0.9 * 900 = 200.00000000000003.
const HOLDOUT_EPSILON: f64 = 1e-9;

/// Train, validation and test partitions. Order inside a partition is not significant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSplit {
    pub train: Vec<LabeledText>,
    pub validation: Vec<LabeledText>,
    pub test: Vec<LabeledText>,
}

impl DatasetSplit {
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the financial records are partitioned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub val_fraction: f64,
    /// `false` keeps every company inside one partition; `true` mixes records freely.
    pub shuffle_companies: bool,
    pub random_seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            val_fraction: 0.1,
            shuffle_companies: false,
            random_seed: 42,
        }
    }
}

impl SplitConfig {
    /// Fractions must be non-negative and sum to less than one.
    pub fn validate(&self) -> Result<(), DatasetError> {
        let (test, val) = (self.test_fraction, self.val_fraction);
        if !(test >= 0.0 && val >= 0.0 && test + val < 1.0) {
            return Err(DatasetError::Configuration(format!(
                "test fraction ({}) and validation fraction ({}) must be non-negative and sum to less than one",
                test, val
            )));
        }
        Ok(())
    }
}

/// Splits per-company labelled records into train/validation/test.
///
/// Records whose label is not in `possible_labels` are dropped before any size accounting.
/// See [`SplitConfig::shuffle_companies`] for the two partitioning policies.
pub fn assemble(
    records_by_company: &BTreeMap<String, Vec<LabeledText>>,
    config: &SplitConfig,
    possible_labels: &[SentimentLabel],
) -> Result<DatasetSplit, DatasetError> {
    config.validate()?;

    let filtered: BTreeMap<&str, Vec<LabeledText>> = records_by_company
        .iter()
        .map(|(company, records)| {
            let kept = records
                .iter()
                .filter(|r| possible_labels.contains(&r.label))
                .cloned()
                .collect();
            (company.as_str(), kept)
        })
        .collect();
    let total: usize = filtered.values().map(Vec::len).sum();

    tracing::info!(
        "Assembling {} records from {} companies (shuffle companies: {})",
        total,
        filtered.len(),
        config.shuffle_companies
    );

    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let split = if config.shuffle_companies {
        split_shuffled(filtered, total, config, &mut rng)
    } else {
        split_by_company(filtered, total, config, &mut rng)
    };

    tracing::info!(
        "Split sizes: train {}, validation {}, test {}",
        split.train.len(),
        split.validation.len(),
        split.test.len()
    );
    Ok(split)
}

// Greedy walk over shuffled companies: test first, then validation, the rest is train.
fn split_by_company<R: Rng>(
    mut filtered: BTreeMap<&str, Vec<LabeledText>>,
    total: usize,
    config: &SplitConfig,
    rng: &mut R,
) -> DatasetSplit {
    let mut companies: Vec<&str> = filtered.keys().copied().collect();
    companies.shuffle(rng);

    let mut cursor = 0;
    let mut take_until = |requirement: f64| {
        let mut taken = Vec::new();
        while (taken.len() as f64) < requirement && cursor < companies.len() {
            if let Some(records) = filtered.remove(companies[cursor]) {
                taken.extend(records);
            }
            cursor += 1;
        }
        taken
    };

    let test = take_until(total as f64 * config.test_fraction);
    let validation = take_until(total as f64 * config.val_fraction);
    let train = take_until(f64::INFINITY);

    DatasetSplit { train, validation, test }
}

// Stratified carve-out of validation, then of test from the remainder.
fn split_shuffled<R: Rng>(
    filtered: BTreeMap<&str, Vec<LabeledText>>,
    total: usize,
    config: &SplitConfig,
    rng: &mut R,
) -> DatasetSplit {
    let mut records: Vec<LabeledText> = Vec::with_capacity(total);
    for company_records in filtered.into_values() {
        records.extend(company_records);
    }
    records.shuffle(rng);

    let (train_and_test, validation) = stratified_split(records, config.val_fraction, rng);
    // Rescaled so that test ends up as `test_fraction` of the whole corpus.
    let test_of_remainder = config.test_fraction / (1.0 - config.val_fraction);
    let (train, test) = stratified_split(train_and_test, test_of_remainder, rng);

    DatasetSplit { train, validation, test }
}

/// Label-proportional two-way split. Returns `(kept, held_out)`.
///
/// `held_out` has `ceil(fraction * n)` records; each label gets its proportional share,
/// rounded down, and the leftover slots go to the labels with the largest remainders.
pub fn stratified_split<R: Rng>(
    records: Vec<LabeledText>,
    fraction: f64,
    rng: &mut R,
) -> (Vec<LabeledText>, Vec<LabeledText>) {
    let n = records.len();
    let n_holdout = holdout_size(n, fraction);
    if n_holdout == 0 {
        return (records, Vec::new());
    }

    let mut by_label: BTreeMap<SentimentLabel, Vec<LabeledText>> = BTreeMap::new();
    for record in records {
        by_label.entry(record.label).or_default().push(record);
    }

    // Integer apportionment: floor shares first, then largest remainders (ties by label order).
    let mut shares: Vec<(SentimentLabel, usize, usize)> = by_label
        .iter()
        .map(|(label, group)| {
            let numerator = n_holdout * group.len();
            (*label, numerator / n, numerator % n)
        })
        .collect();
    let assigned: usize = shares.iter().map(|(_, floor, _)| floor).sum();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| shares[b].2.cmp(&shares[a].2));
    for &idx in order.iter().take(n_holdout - assigned) {
        shares[idx].1 += 1;
    }

    let mut kept = Vec::with_capacity(n - n_holdout);
    let mut held_out = Vec::with_capacity(n_holdout);
    for (label, count, _) in shares {
        let mut group = by_label.remove(&label).unwrap_or_default();
        group.shuffle(rng);
        let rest = group.split_off(count.min(group.len()));
        held_out.extend(group);
        kept.extend(rest);
    }

    kept.shuffle(rng);
    held_out.shuffle(rng);
    (kept, held_out)
}

fn holdout_size(n: usize, fraction: f64) -> usize {
    if n == 0 || fraction <= 0.0 {
        return 0;
    }
    let size = (fraction * n as f64 - HOLDOUT_EPSILON).ceil().max(0.0) as usize;
    size.min(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::labels::FINANCIAL_LABELS;
    use std::collections::{HashMap, HashSet};

    fn corpus(companies: &[(&str, usize)]) -> BTreeMap<String, Vec<LabeledText>> {
        let labels = [
            SentimentLabel::Positive,
            SentimentLabel::Neutral,
            SentimentLabel::Negative,
            SentimentLabel::Neutral,
        ];
        companies
            .iter()
            .map(|(name, count)| {
                let records = (0..*count)
                    .map(|i| LabeledText::new(format!("{} dispatch {}", name, i), labels[i % labels.len()]))
                    .collect();
                (name.to_string(), records)
            })
            .collect()
    }

    fn texts(records: &[LabeledText]) -> Vec<String> {
        let mut t: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        t.sort();
        t
    }

    fn company_of(text: &str) -> &str {
        text.split(" dispatch ").next().unwrap()
    }

    #[test]
    fn rejects_invalid_fractions() {
        let data = corpus(&[("A", 3)]);
        for (test, val) in [(0.6, 0.5), (0.5, 0.5), (-0.1, 0.2), (0.2, -0.1), (f64::NAN, 0.1)] {
            let config = SplitConfig { test_fraction: test, val_fraction: val, ..SplitConfig::default() };
            assert!(
                matches!(assemble(&data, &config, &FINANCIAL_LABELS), Err(DatasetError::Configuration(_))),
                "({}, {}) should be rejected",
                test,
                val
            );
        }
    }

    #[test]
    fn company_preserving_split_never_leaks_companies() {
        let data = corpus(&[("A", 5), ("B", 12), ("C", 3), ("D", 7), ("E", 9), ("F", 1), ("G", 4), ("H", 6)]);
        for seed in 0..20 {
            let config = SplitConfig { random_seed: seed, ..SplitConfig::default() };
            let split = assemble(&data, &config, &FINANCIAL_LABELS).unwrap();

            let owners = |records: &[LabeledText]| -> HashSet<String> {
                records.iter().map(|r| company_of(&r.text).to_string()).collect()
            };
            let (train, val, test) = (owners(&split.train), owners(&split.validation), owners(&split.test));
            assert!(train.is_disjoint(&val) && train.is_disjoint(&test) && val.is_disjoint(&test));

            let mut all = split.train.clone();
            all.extend(split.validation.clone());
            all.extend(split.test.clone());
            let expected: Vec<LabeledText> = data.values().flatten().cloned().collect();
            assert_eq!(texts(&all), texts(&expected), "seed {}", seed);
        }
    }

    #[test]
    fn company_preserving_split_meets_size_targets_at_company_granularity() {
        let data = corpus(&[("A", 10), ("B", 10), ("C", 10), ("D", 10), ("E", 10), ("F", 10), ("G", 10), ("H", 10), ("I", 10), ("J", 10)]);
        let split = assemble(&data, &SplitConfig::default(), &FINANCIAL_LABELS).unwrap();
        // 100 records: test needs >= 20, validation >= 10, whole companies of 10.
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.validation.len(), 10);
        assert_eq!(split.train.len(), 70);
    }

    #[test]
    fn company_preserving_split_is_deterministic_per_seed() {
        let data = corpus(&[("A", 5), ("B", 12), ("C", 3), ("D", 7), ("E", 9)]);
        let config = SplitConfig { random_seed: 7, ..SplitConfig::default() };
        let first = assemble(&data, &config, &FINANCIAL_LABELS).unwrap();
        let second = assemble(&data, &config, &FINANCIAL_LABELS).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn labels_outside_the_set_are_filtered_before_sizing() {
        let data = corpus(&[("A", 8), ("B", 8), ("C", 8), ("D", 8), ("E", 8)]);
        let only_neutral = [SentimentLabel::Neutral];
        let split = assemble(&data, &SplitConfig::default(), &only_neutral).unwrap();

        assert_eq!(split.len(), 20);
        let all = split.train.iter().chain(&split.validation).chain(&split.test);
        assert!(all.map(|r| r.label).all(|l| l == SentimentLabel::Neutral));
        // Four neutral records per company: test needs >= 4, validation >= 2.
        assert_eq!(split.test.len(), 4);
        assert_eq!(split.validation.len(), 4);
    }

    #[test]
    fn zero_fractions_put_everything_in_train() {
        let data = corpus(&[("A", 3), ("B", 4)]);
        for shuffle_companies in [false, true] {
            let config = SplitConfig {
                test_fraction: 0.0,
                val_fraction: 0.0,
                shuffle_companies,
                random_seed: 1,
            };
            let split = assemble(&data, &config, &FINANCIAL_LABELS).unwrap();
            assert_eq!((split.train.len(), split.validation.len(), split.test.len()), (7, 0, 0));
        }
    }

    #[test]
    fn shuffled_split_honours_fractions_of_whole_corpus() {
        let data = corpus(&[("A", 250), ("B", 250), ("C", 250), ("D", 250)]);
        let config = SplitConfig {
            test_fraction: 0.2,
            val_fraction: 0.1,
            shuffle_companies: true,
            random_seed: 42,
        };
        let split = assemble(&data, &config, &FINANCIAL_LABELS).unwrap();

        assert_eq!(split.len(), 1000);
        assert_eq!(split.validation.len(), 100);
        assert_eq!(split.test.len(), 200);
        assert_eq!(split.train.len(), 700);

        let mut all = split.train.clone();
        all.extend(split.validation.clone());
        all.extend(split.test.clone());
        let expected: Vec<LabeledText> = data.values().flatten().cloned().collect();
        assert_eq!(texts(&all), texts(&expected));
    }

    #[test]
    fn stratified_split_preserves_label_proportions() {
        // 55 neutral, 35 positive, 10 negative.
        let mut records = Vec::new();
        for (label, count) in [(SentimentLabel::Neutral, 55), (SentimentLabel::Positive, 35), (SentimentLabel::Negative, 10)] {
            records.extend((0..count).map(|i| LabeledText::new(format!("{}-{}", label, i), label)));
        }
        let mut rng = StdRng::seed_from_u64(3);
        let (kept, held_out) = stratified_split(records, 0.25, &mut rng);

        assert_eq!(held_out.len(), 25);
        assert_eq!(kept.len(), 75);
        let mut counts: HashMap<SentimentLabel, usize> = HashMap::new();
        for r in &held_out {
            *counts.entry(r.label).or_default() += 1;
        }
        // Shares 13.75 / 8.75 / 2.5: the two leftover slots go to the larger remainders.
        assert_eq!(counts[&SentimentLabel::Neutral], 14);
        assert_eq!(counts[&SentimentLabel::Positive], 9);
        assert_eq!(counts[&SentimentLabel::Negative], 2);
    }

    #[test]
    fn holdout_size_rounds_up() {
        assert_eq!(holdout_size(10, 0.15), 2);
        assert_eq!(holdout_size(900, 0.2 / 0.9), 200);
        assert_eq!(holdout_size(0, 0.5), 0);
        assert_eq!(holdout_size(5, 0.0), 0);
    }
}
