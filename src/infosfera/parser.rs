// src/infosfera/parser.rs

// --- Imports ---
use crate::infosfera::models::StockExchangeDispatch;
use crate::utils::dates::parse_iso_date;
use crate::utils::error::ScrapeError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

// --- Labels printed in front of the interesting text blocks ---
const COMPANY_NAME_LABEL: &str = "Skrócona nazwa emitenta";
const REPORT_CONTENT_LABEL: &str = "Treść raportu";

// Listing pages carry three tbody sections; dispatches live in the second one.
const LISTING_TBODY_COUNT: usize = 3;
const LISTING_DISPATCH_TBODY: usize = 1;

// --- CSS Selectors (Lazy Static) ---
static TEXT_BLOCK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".nTekst").expect("Failed to compile TEXT_BLOCK_SELECTOR")
});

static DOCUMENT_BLOCK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".nDokument").expect("Failed to compile DOCUMENT_BLOCK_SELECTOR")
});

static TBODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("tbody").expect("Failed to compile TBODY_SELECTOR")
});

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a").expect("Failed to compile ANCHOR_SELECTOR")
});

// --- Regex Patterns (Lazy Static) ---
static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}").expect("Failed to compile ISO_DATE_RE")
});

// Listing rows that open a new day look like "15.03.2021".
static DOTTED_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{2}\.\d{2}\.\d{4}").expect("Failed to compile DOTTED_DATE_RE")
});

/// Dispatches published by one company on one day, as shown on its yearly listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayListing {
    /// Raw text of the row carrying the `DD.MM.YYYY` date.
    pub date_text: String,
    /// Absolute (`http://`) links to the dispatch pages.
    pub dispatch_urls: Vec<String>,
    /// Text of the first link in the day, which names the company.
    pub company_name: Option<String>,
}

/// Extracts company name, report content and document date from a dispatch page.
pub fn parse_dispatch_page(html: &str) -> Result<StockExchangeDispatch, ScrapeError> {
    let document = Html::parse_document(html);

    let mut company_name: Option<String> = None;
    let mut content: Option<String> = None;
    let mut previous_text = String::new();

    // Each value block follows the block holding its label.
    for block in document.select(&TEXT_BLOCK_SELECTOR) {
        let text = block.text().collect::<String>();

        if previous_text.contains(REPORT_CONTENT_LABEL) {
            content = Some(clean_content(&text)?);
        } else if previous_text.contains(COMPANY_NAME_LABEL) {
            company_name = Some(clean_company_name(&text)?);
        }

        previous_text = text;
    }

    let date_text = find_document_date(&document)?;
    let date = parse_iso_date(&date_text)
        .map_err(|_| ScrapeError::UnexpectedLayout(format!("invalid document date '{}'", date_text)))?;

    let company_name = company_name.ok_or(ScrapeError::MissingField("company name"))?;
    let content = content.ok_or(ScrapeError::MissingField("report content"))?;

    tracing::trace!("Parsed dispatch of {} from {}", company_name, date);
    Ok(StockExchangeDispatch::new(&company_name, &content, date)?)
}

/// Splits the dispatch table of a company's yearly listing page into days.
pub fn parse_company_listing(html: &str) -> Result<Vec<DayListing>, ScrapeError> {
    let document = Html::parse_document(html);
    let tbodies: Vec<ElementRef> = document.select(&TBODY_SELECTOR).collect();

    if tbodies.len() != LISTING_TBODY_COUNT {
        return Err(ScrapeError::UnexpectedLayout(format!(
            "expected {} tbody sections on the listing page, found {}",
            LISTING_TBODY_COUNT,
            tbodies.len()
        )));
    }

    let rows: Vec<ElementRef> = tbodies[LISTING_DISPATCH_TBODY]
        .children()
        .filter_map(ElementRef::wrap)
        .collect();

    let date_row_idxs: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| DOTTED_DATE_RE.is_match(&row.text().collect::<String>()))
        .map(|(i, _)| i)
        .collect();

    let mut days = Vec::with_capacity(date_row_idxs.len());
    for (n, &start) in date_row_idxs.iter().enumerate() {
        let end = date_row_idxs.get(n + 1).copied().unwrap_or(rows.len());
        days.push(parse_day(&rows[start..end]));
    }

    tracing::debug!("Listing page contains {} days of dispatches", days.len());
    Ok(days)
}

/// Name of the company a listing page belongs to, if any day names it.
pub fn company_name_from_listing(html: &str) -> Result<Option<String>, ScrapeError> {
    let days = parse_company_listing(html)?;
    Ok(days.into_iter().find_map(|day| day.company_name))
}

fn parse_day(rows: &[ElementRef]) -> DayListing {
    let date_text = rows
        .first()
        .map(|row| row.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut dispatch_urls = Vec::new();
    let mut company_name = None;

    // First row holds the date, the rest hold the dispatches.
    for row in rows.iter().skip(1) {
        let anchors: Vec<ElementRef> = row.select(&ANCHOR_SELECTOR).collect();

        if company_name.is_none() {
            company_name = anchors
                .first()
                .map(|a| a.text().collect::<String>().trim().to_string())
                .filter(|name| !name.is_empty());
        }

        dispatch_urls.extend(
            anchors
                .iter()
                .filter_map(|a| a.value().attr("href"))
                .filter(|href| href.starts_with("http://"))
                .map(str::to_string),
        );
    }

    DayListing {
        date_text,
        dispatch_urls,
        company_name,
    }
}

fn clean_content(text: &str) -> Result<String, ScrapeError> {
    let content = text.trim();
    if content.is_empty() {
        return Err(ScrapeError::EmptyField("report content"));
    }
    Ok(content.to_string())
}

fn clean_company_name(text: &str) -> Result<String, ScrapeError> {
    let name = text.trim().replace('.', "");
    if name.is_empty() {
        return Err(ScrapeError::EmptyField("company name"));
    }
    Ok(name)
}

fn find_document_date(document: &Html) -> Result<String, ScrapeError> {
    document
        .select(&DOCUMENT_BLOCK_SELECTOR)
        .find_map(|block| {
            let text = block.text().collect::<String>();
            ISO_DATE_RE.find(&text).map(|m| m.as_str().to_string())
        })
        .ok_or(ScrapeError::MissingField("document date"))
}
