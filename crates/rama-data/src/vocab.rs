//! Registry vocabularies: controller kinds and nature-of-control tags.

/// `kind` values for individual controllers.
pub const HUMAN_KINDS: &[&str] = &[
    "individual-person-with-significant-control",
    "individual-beneficial-owner",
];

/// `kind` values for corporate controllers.
pub const COMPANY_KINDS: &[&str] = &[
    "corporate-entity-person-with-significant-control",
    "corporate-entity-beneficial-owner",
    "legal-person-person-with-significant-control",
];

/// `kind` values for controllers whose details are withheld.
pub const SUPER_SECURE_KINDS: &[&str] = &["super-secure-person-with-significant-control"];

/// Nature-of-control tags that describe a share-ownership stake.
pub const TYPES_OF_OWNERSHIP: &[&str] = &[
    "ownership-of-shares-25-to-50-percent",
    "ownership-of-shares-25-to-50-percent-as-firm",
    "ownership-of-shares-25-to-50-percent-as-trust",
    "ownership-of-shares-50-to-75-percent",
    "ownership-of-shares-50-to-75-percent-as-firm",
    "ownership-of-shares-50-to-75-percent-as-trust",
    "ownership-of-shares-75-to-100-percent",
    "ownership-of-shares-75-to-100-percent-as-firm",
    "ownership-of-shares-75-to-100-percent-as-trust",
    "ownership-of-shares-more-than-25-percent-registered-overseas-entity",
];

/// Families of nature-of-control tags, usable as cleaning filters.
pub const NATURE_PATTERNS: &[&str] = &[
    "ownership-of-shares",
    "part-right-to-share-surplus-assets",
    "right-to-appoint-and-remove-directors",
    "right-to-appoint-and-remove-members",
    "right-to-appoint-and-remove-person",
    "right-to-share-surplus-assets",
    "significant-influence-or-control",
    "voting-rights",
];

/// Default filter applied to PSC rows during cleaning.
pub const DEFAULT_OWNERSHIP_FILTER: &str = "ownership-of-shares";

/// Stake assigned to each percentage band, matched as a substring of the tag.
const BAND_WEIGHTS: &[(&str, f64)] = &[
    ("more-than-25", 0.25),
    ("25-to-50", 0.25),
    ("50-to-75", 0.5),
    ("75-to-100", 0.75),
];

/// Whether `tag` belongs to the share-ownership vocabulary.
pub fn is_ownership_tag(tag: &str) -> bool {
    TYPES_OF_OWNERSHIP.contains(&tag)
}

/// Whether `filter` selects tags from a known nature-of-control family:
/// part of a family name, or a more specific tag within one.
pub fn is_nature_filter(filter: &str) -> bool {
    !filter.is_empty()
        && NATURE_PATTERNS
            .iter()
            .any(|family| family.contains(filter) || filter.starts_with(family))
}

/// Fractional stake of a single ownership tag, if it names a known band.
pub fn band_weight(tag: &str) -> Option<f64> {
    BAND_WEIGHTS
        .iter()
        .find(|(band, _)| tag.contains(band))
        .map(|(_, weight)| *weight)
}
