//! Type definitions for the registry tables consumed by the pipeline.
//!
//! Field names follow the registry column headers through serde renames so
//! that collaborators can deserialize rows straight from their loaders.

use serde::{Deserialize, Serialize};

use crate::vocab::{COMPANY_KINDS, HUMAN_KINDS, SUPER_SECURE_KINDS};

/// One row of the persons-with-significant-control registry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PscRecord {
    /// Stringified list of nature-of-control tags, e.g. `"['voting-rights-25-to-50-percent']"`.
    #[serde(default)]
    pub natures_of_control: Option<String>,
    /// Date the control ceased (registry text).
    #[serde(default)]
    pub ceased_on: Option<String>,
    /// Controller name (lowercased after cleaning).
    #[serde(default)]
    pub name: Option<String>,
    /// Country of residence for individuals.
    #[serde(default)]
    pub country_of_residence: Option<String>,
    /// Registry kind, e.g. `individual-person-with-significant-control`.
    #[serde(default)]
    pub kind: Option<String>,
    /// Nationality for individuals.
    #[serde(default)]
    pub nationality: Option<String>,
    /// Date the registry was notified (registry text).
    #[serde(default)]
    pub notified_on: Option<String>,
    /// Year of birth for individuals.
    #[serde(default, rename = "date_of_birth.year")]
    pub birth_year: Option<i32>,
    /// Month of birth for individuals.
    #[serde(default, rename = "date_of_birth.month")]
    pub birth_month: Option<u32>,
    #[serde(default, rename = "name_elements.surname")]
    pub surname: Option<String>,
    #[serde(default, rename = "name_elements.forename")]
    pub forename: Option<String>,
    #[serde(default, rename = "name_elements.title")]
    pub title: Option<String>,
    #[serde(default, rename = "name_elements.middle_name")]
    pub middle_name: Option<String>,
    /// Number of the company this PSC controls (8 chars after cleaning).
    pub company_number: String,
    /// Registration number of a corporate controller, if disclosed.
    #[serde(default, rename = "identification.registration_number")]
    pub registration_number: Option<String>,
    /// Whether the control has ceased.
    #[serde(default)]
    pub ceased: Option<bool>,
    #[serde(default, rename = "address.country")]
    pub address_country: Option<String>,
    #[serde(default, rename = "address.postal_code")]
    pub address_postal_code: Option<String>,
}

impl PscRecord {
    /// Classify the registry `kind` column.
    pub fn psc_kind(&self) -> PscKind {
        PscKind::from_registry(self.kind.as_deref())
    }
}

/// Controller category derived from the registry `kind` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PscKind {
    /// Individual person or beneficial owner.
    Individual,
    /// Corporate entity or legal person.
    Corporate,
    /// Super-secure PSC with withheld details.
    SuperSecure,
    /// Any other or missing kind.
    Other,
}

impl PscKind {
    pub fn from_registry(kind: Option<&str>) -> Self {
        match kind {
            Some(k) if HUMAN_KINDS.contains(&k) => Self::Individual,
            Some(k) if COMPANY_KINDS.contains(&k) => Self::Corporate,
            Some(k) if SUPER_SECURE_KINDS.contains(&k) => Self::SuperSecure,
            _ => Self::Other,
        }
    }
}

/// Former name of a company with the date it changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousName {
    /// Date of change (registry `CONDATE` text).
    pub changed_on: Option<String>,
    pub company_name: String,
}

/// One row of the company registry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    #[serde(rename = "CompanyName")]
    pub company_name: String,
    #[serde(rename = "CompanyNumber")]
    pub company_number: String,
    #[serde(default, rename = "CompanyCategory")]
    pub category: Option<String>,
    #[serde(default, rename = "CompanyStatus")]
    pub status: Option<String>,
    #[serde(default, rename = "CountryOfOrigin")]
    pub country_of_origin: Option<String>,
    #[serde(default, rename = "DissolutionDate")]
    pub dissolution_date: Option<String>,
    /// Incorporation date as registry text (`YYYY-MM-DD` or `DD/MM/YYYY`).
    #[serde(default, rename = "IncorporationDate")]
    pub incorporation_date: Option<String>,
    /// Up to ten former names, most recent first.
    #[serde(default)]
    pub previous_names: Vec<PreviousName>,
    #[serde(default, rename = "SICCodes")]
    pub sic_codes: Vec<String>,
    #[serde(default, rename = "RegAddress.Country")]
    pub registered_country: Option<String>,
    #[serde(default, rename = "RegAddress.PostCode")]
    pub registered_postal_code: Option<String>,
}
