//! Identity resolution across the PSC and company registries.
//!
//! Neither registry carries a stable identifier for people, and corporate
//! controllers are listed by name while the companies they control are listed
//! by number. This module links the two tables in three passes and gives every
//! real-world participant exactly one integer [`NodeId`]:
//!
//! 1. **Human → company**: individual PSCs on companies present in the
//!    registry. Humans are keyed by `(name, birth year, birth month)`,
//!    companies by `company_number`.
//! 2. **Company → company**: corporate PSCs. Owners are matched by name,
//!    owned companies by number, each falling back to the other key.
//! 3. **Super-secure → company**: withheld controllers, one fresh node per
//!    row, attached to already-known companies where possible.
//!
//! Indices are minted from a single monotonically increasing allocator so
//! the passes occupy consecutive, non-overlapping ranges (see
//! [`IndexRanges`]). Within a pass, an entity that already has an index
//! reuses it; a new one is minted only for entities never seen before.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use rama_data::clean::parse_natures_of_control;
use rama_data::{CompanyRecord, PscKind, PscRecord};
use serde::Serialize;

/// Integer identity of a node in the ownership graph.
pub type NodeId = u64;

/// First index handed out by the allocator.
pub const FIRST_NODE_ID: NodeId = 1;

/// Index ranges consumed by each linking pass, in allocation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexRanges {
    pub humans: Range<NodeId>,
    pub first_pass_companies: Range<NodeId>,
    pub second_pass_companies: Range<NodeId>,
    pub super_secure: Range<NodeId>,
}

impl IndexRanges {
    /// One past the largest index minted by any pass.
    pub fn end(&self) -> NodeId {
        self.super_secure.end
    }
}

/// A human PSC linked to a company they control.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HumanCompanyLink {
    pub idx_human: NodeId,
    pub idx_company: NodeId,
    /// Source PSC row.
    pub human: PscRecord,
    /// Registry row of the controlled company (first row for its number).
    pub company: CompanyRecord,
    pub natures_of_control: Vec<String>,
}

/// A corporate PSC linked to a company it controls.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompanyCompanyLink {
    pub idx_owner: NodeId,
    pub idx_owned: NodeId,
    /// Owner name as listed in the PSC row.
    pub owner_name: String,
    /// Owner number found by looking its name up in the registry.
    pub owner_number: Option<String>,
    pub owned_number: String,
    /// Owned company name from the registry, when registered.
    pub owned_name: Option<String>,
    /// Source PSC row describing the owner.
    pub owner: PscRecord,
    pub natures_of_control: Vec<String>,
}

/// A super-secure PSC linked to the company it controls.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuperSecureLink {
    pub idx_controller: NodeId,
    pub idx_company: NodeId,
    pub company_number: String,
    pub company_name: Option<String>,
    pub controller: PscRecord,
    pub natures_of_control: Vec<String>,
}

/// Output of the three linking passes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResolvedLinks {
    pub human_company: Vec<HumanCompanyLink>,
    pub company_company: Vec<CompanyCompanyLink>,
    pub super_secure: Vec<SuperSecureLink>,
    pub ranges: IndexRanges,
}

/// Monotonic index source shared by all passes.
#[derive(Debug)]
struct IndexAllocator {
    next: NodeId,
}

impl IndexAllocator {
    fn new() -> Self {
        Self {
            next: FIRST_NODE_ID,
        }
    }

    fn mint(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }

    fn mark(&self) -> NodeId {
        self.next
    }
}

/// Companies indexed so far, reachable by either key. First binding wins.
///
/// An id carries at most one company number. `owner_names` only holds names
/// bound while resolving owners; it is the only name fallback for owned
/// companies.
#[derive(Debug, Default)]
struct CompanyIndex {
    by_number: HashMap<String, NodeId>,
    by_name: HashMap<String, NodeId>,
    owner_names: HashMap<String, NodeId>,
    numbered: HashSet<NodeId>,
}

impl CompanyIndex {
    fn by_number(&self, number: &str) -> Option<NodeId> {
        self.by_number.get(number).copied()
    }

    fn by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// An owner-bound id for `name` that has no number yet.
    fn unnumbered_owner(&self, name: &str) -> Option<NodeId> {
        self.owner_names
            .get(name)
            .copied()
            .filter(|id| !self.numbered.contains(id))
    }

    fn record(&mut self, id: NodeId, number: Option<&str>, name: Option<&str>) {
        if let Some(number) = number {
            if !self.numbered.contains(&id) && !self.by_number.contains_key(number) {
                self.by_number.insert(number.to_string(), id);
                self.numbered.insert(id);
            }
        }
        if let Some(name) = name {
            self.by_name.entry(name.to_string()).or_insert(id);
        }
    }

    fn record_owner(&mut self, id: NodeId, name: &str) {
        self.owner_names.entry(name.to_string()).or_insert(id);
        self.by_name.entry(name.to_string()).or_insert(id);
    }
}

/// Lookup over the company registry. The first row for a key wins.
#[derive(Debug)]
pub struct CompanyRegistry<'a> {
    by_number: HashMap<&'a str, &'a CompanyRecord>,
    by_name: HashMap<&'a str, &'a CompanyRecord>,
}

impl<'a> CompanyRegistry<'a> {
    pub fn new(companies: &'a [CompanyRecord]) -> Self {
        let mut by_number = HashMap::new();
        let mut by_name = HashMap::new();
        for company in companies {
            by_number
                .entry(company.company_number.as_str())
                .or_insert(company);
            by_name
                .entry(company.company_name.as_str())
                .or_insert(company);
        }
        Self { by_number, by_name }
    }

    pub fn by_number(&self, number: &str) -> Option<&'a CompanyRecord> {
        self.by_number.get(number).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&'a CompanyRecord> {
        self.by_name.get(name).copied()
    }
}

type HumanKey<'a> = (Option<&'a str>, Option<i32>, Option<u32>);

fn human_key(record: &PscRecord) -> HumanKey<'_> {
    (record.name.as_deref(), record.birth_year, record.birth_month)
}

fn natures(record: &PscRecord) -> Vec<String> {
    record
        .natures_of_control
        .as_deref()
        .map(parse_natures_of_control)
        .unwrap_or_default()
}

/// Run all three linking passes over cleaned tables.
///
/// Both tables must already be normalised (see [`rama_data::clean`]); no
/// case folding or number padding happens here.
#[tracing::instrument(skip_all, fields(psc_rows = psc.len(), company_rows = companies.len()))]
pub fn resolve_links(psc: &[PscRecord], companies: &[CompanyRecord]) -> ResolvedLinks {
    let registry = CompanyRegistry::new(companies);
    let mut allocator = IndexAllocator::new();
    let mut index = CompanyIndex::default();

    let (human_company, humans, first_pass_companies) =
        link_humans(psc, companies, &registry, &mut allocator, &mut index);

    let start = allocator.mark();
    let company_company = link_companies(psc, &registry, &mut allocator, &mut index);
    let second_pass_companies = start..allocator.mark();

    let start = allocator.mark();
    let super_secure = link_super_secure(psc, &registry, &mut allocator, &mut index);
    let super_secure_range = start..allocator.mark();

    let ranges = IndexRanges {
        humans,
        first_pass_companies,
        second_pass_companies,
        super_secure: super_secure_range,
    };

    tracing::info!(
        human_links = human_company.len(),
        company_links = company_company.len(),
        super_secure_links = super_secure.len(),
        max_index = ranges.end().saturating_sub(1),
        "resolved identities"
    );

    ResolvedLinks {
        human_company,
        company_company,
        super_secure,
        ranges,
    }
}

/// First pass: individual PSCs on registered companies.
fn link_humans(
    psc: &[PscRecord],
    companies: &[CompanyRecord],
    registry: &CompanyRegistry<'_>,
    allocator: &mut IndexAllocator,
    index: &mut CompanyIndex,
) -> (Vec<HumanCompanyLink>, Range<NodeId>, Range<NodeId>) {
    let rows: Vec<&PscRecord> = psc
        .iter()
        .filter(|row| row.psc_kind() == PscKind::Individual)
        .filter(|row| registry.by_number(&row.company_number).is_some())
        .collect();

    // Group key -> canonical index, minted in order of first occurrence.
    let start = allocator.mark();
    let mut human_ids: HashMap<HumanKey<'_>, NodeId> = HashMap::new();
    for row in &rows {
        human_ids
            .entry(human_key(row))
            .or_insert_with(|| allocator.mint());
    }
    let humans = start..allocator.mark();

    // Companies are minted in registry order, one per distinct number.
    let linked_numbers: HashSet<&str> =
        rows.iter().map(|r| r.company_number.as_str()).collect();
    let start = allocator.mark();
    for company in companies {
        let number = company.company_number.as_str();
        if linked_numbers.contains(number) && index.by_number(number).is_none() {
            let id = allocator.mint();
            index.record(id, Some(number), Some(&company.company_name));
        }
    }
    let first_pass = start..allocator.mark();

    let links = rows
        .iter()
        .filter_map(|row| {
            let company = registry.by_number(&row.company_number)?;
            Some(HumanCompanyLink {
                idx_human: human_ids[&human_key(row)],
                idx_company: index.by_number(&row.company_number)?,
                human: (*row).clone(),
                company: company.clone(),
                natures_of_control: natures(row),
            })
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        rows = rows.len(),
        humans = humans.end - humans.start,
        companies = first_pass.end - first_pass.start,
        "linked humans to companies"
    );

    (links, humans, first_pass)
}

/// Second pass: corporate PSCs owning companies.
///
/// Owners are resolved for every row before any owned company, so a company
/// named as owner in a later row is already known when it shows up as owned
/// in an earlier one.
fn link_companies(
    psc: &[PscRecord],
    registry: &CompanyRegistry<'_>,
    allocator: &mut IndexAllocator,
    index: &mut CompanyIndex,
) -> Vec<CompanyCompanyLink> {
    let rows: Vec<(&PscRecord, &str)> = psc
        .iter()
        .filter(|row| row.psc_kind() == PscKind::Corporate)
        .filter_map(|row| row.name.as_deref().map(|name| (row, name)))
        .collect();

    let owners: Vec<(NodeId, Option<String>)> = rows
        .iter()
        .map(|(_, name)| {
            let number = registry
                .by_name(name)
                .map(|company| company.company_number.clone());
            let id = resolve_owner(name, number.as_deref(), allocator, index);
            (id, number)
        })
        .collect();

    let owned: Vec<(NodeId, Option<String>)> = rows
        .iter()
        .map(|(row, _)| {
            let name = registry
                .by_number(&row.company_number)
                .map(|company| company.company_name.clone());
            let id = resolve_owned(&row.company_number, name.as_deref(), allocator, index);
            (id, name)
        })
        .collect();

    rows.iter()
        .zip(owners)
        .zip(owned)
        .map(
            |(((row, name), (idx_owner, owner_number)), (idx_owned, owned_name))| {
                CompanyCompanyLink {
                    idx_owner,
                    idx_owned,
                    owner_name: name.to_string(),
                    owner_number,
                    owned_number: row.company_number.clone(),
                    owned_name,
                    owner: (*row).clone(),
                    natures_of_control: natures(row),
                }
            },
        )
        .collect()
}

/// Owner lookup: by name, then by the registry number behind that name.
fn resolve_owner(
    name: &str,
    registry_number: Option<&str>,
    allocator: &mut IndexAllocator,
    index: &mut CompanyIndex,
) -> NodeId {
    let known = index
        .by_name(name)
        .or_else(|| registry_number.and_then(|number| index.by_number(number)));
    let id = match known {
        Some(id) => id,
        None => {
            let id = allocator.mint();
            index.record(id, registry_number, None);
            id
        }
    };
    index.record_owner(id, name);
    id
}

/// Owned lookup: by number, then by an owner bound to the registry name
/// behind that number.
fn resolve_owned(
    number: &str,
    registry_name: Option<&str>,
    allocator: &mut IndexAllocator,
    index: &mut CompanyIndex,
) -> NodeId {
    if let Some(id) = index.by_number(number) {
        index.record(id, None, registry_name);
        return id;
    }
    if let Some(id) = registry_name.and_then(|name| index.unnumbered_owner(name)) {
        index.record(id, Some(number), None);
        return id;
    }
    let id = allocator.mint();
    index.record(id, Some(number), registry_name);
    id
}

/// Third pass: super-secure PSCs. Every row is its own anonymous controller.
fn link_super_secure(
    psc: &[PscRecord],
    registry: &CompanyRegistry<'_>,
    allocator: &mut IndexAllocator,
    index: &mut CompanyIndex,
) -> Vec<SuperSecureLink> {
    let rows: Vec<&PscRecord> = psc
        .iter()
        .filter(|row| row.psc_kind() == PscKind::SuperSecure)
        .collect();

    let controllers: Vec<NodeId> = rows.iter().map(|_| allocator.mint()).collect();

    rows.iter()
        .zip(controllers)
        .map(|(row, idx_controller)| {
            let company_name = registry
                .by_number(&row.company_number)
                .map(|company| company.company_name.clone());
            let idx_company = resolve_owned(
                &row.company_number,
                company_name.as_deref(),
                allocator,
                index,
            );
            SuperSecureLink {
                idx_controller,
                idx_company,
                company_number: row.company_number.clone(),
                company_name,
                controller: (*row).clone(),
                natures_of_control: natures(row),
            }
        })
        .collect()
}
