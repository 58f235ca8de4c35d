//! Normalisation of raw registry tables before identity resolution.
//!
//! Both registries disagree on casing, on "ltd" versus "limited" and on
//! whether company numbers keep their leading zeros. Everything downstream
//! compares names and numbers by equality, so the fixes happen here once.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::types::{CompanyRecord, PscRecord};

/// Width of a registry company number.
pub const COMPANY_NUMBER_WIDTH: usize = 8;

/// Left-pad a company number with zeros to [`COMPANY_NUMBER_WIDTH`].
///
/// Numbers already at or above the width are returned unchanged.
pub fn fill_company_number(number: &str) -> String {
    let number = number.trim();
    format!("{number:0>width$}", width = COMPANY_NUMBER_WIDTH)
}

/// Lowercase, expand "ltd" to "limited" and trim a company or person name.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace("ltd", "limited").trim().to_string()
}

/// Extract the tags of a stringified list such as `"['a', 'b']"`.
///
/// Tags are the odd-indexed pieces when splitting on single quotes, so
/// anything outside quotes (brackets, commas, whitespace) is discarded.
pub fn parse_natures_of_control(raw: &str) -> Vec<String> {
    raw.split('\'')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect()
}

/// Sorted set of every nature-of-control tag present in `records`.
pub fn unique_natures_of_control(records: &[PscRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.natures_of_control.as_deref())
        .flat_map(parse_natures_of_control)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse a registry date in either `YYYY-MM-DD` or `DD/MM/YYYY` form.
pub fn parse_registry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// Concatenate PSC tables and keep rows whose natures of control mention
/// `ownership_filter`, normalising names and company numbers.
#[tracing::instrument(skip_all, fields(tables = tables.len(), filter = %ownership_filter))]
pub fn clean_psc(tables: &[Vec<PscRecord>], ownership_filter: &str) -> Vec<PscRecord> {
    let total: usize = tables.iter().map(Vec::len).sum();

    let cleaned: Vec<PscRecord> = tables
        .iter()
        .flatten()
        .filter(|record| {
            record
                .natures_of_control
                .as_deref()
                .unwrap_or_default()
                .contains(ownership_filter)
        })
        .map(|record| {
            let mut record = record.clone();
            record.name = record.name.as_deref().map(normalize_name);
            record.company_number = fill_company_number(&record.company_number);
            record
        })
        .collect();

    tracing::info!(
        rows_in = total,
        rows_kept = cleaned.len(),
        "cleaned PSC tables"
    );
    cleaned
}

/// Concatenate company tables, normalising names and company numbers.
#[tracing::instrument(skip_all, fields(tables = tables.len()))]
pub fn clean_companies(tables: &[Vec<CompanyRecord>]) -> Vec<CompanyRecord> {
    let cleaned: Vec<CompanyRecord> = tables
        .iter()
        .flatten()
        .map(|record| {
            let mut record = record.clone();
            record.company_name = normalize_name(&record.company_name);
            record.company_number = fill_company_number(&record.company_number);
            record
        })
        .collect();

    tracing::info!(rows = cleaned.len(), "cleaned company tables");
    cleaned
}
