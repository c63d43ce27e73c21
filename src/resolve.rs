//! Per-criterion resolution and the combination of resolved identifier sets.
//!
//! Each set-valued criterion kind (exact tags, tag patterns, properties,
//! logbooks) resolves to a [`ResolvedSet`]. Content filters (tags, tag
//! patterns, properties) pool their matches by union; logbook membership is
//! then applied as an intersection over that pool. A kind that is present but
//! matches nothing makes the whole query empty, so resolution stops at the
//! first such kind.

use roaring::RoaringTreemap;
use tracing::debug;

use crate::criteria::SearchCriteria;
use crate::error::Result;
use crate::glob::translate;
use crate::interface::QueryContext;
use crate::store::LogStore;

/// Outcome of resolving one criterion kind.
///
/// `Empty` absorbs under both union and intersection: once any present kind
/// is unsatisfiable nothing can bring records back. `Unconstrained` is the
/// identity for both.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSet {
    /// The criterion is absent and restricts nothing.
    Unconstrained,
    /// The criterion is present and matched nothing.
    Empty,
    /// The criterion is present and matched these (non-empty) records.
    Matched(RoaringTreemap),
}

impl ResolvedSet {
    pub fn from_ids(ids: RoaringTreemap) -> Self {
        if ids.is_empty() { Self::Empty } else { Self::Matched(ids) }
    }
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
    pub fn is_constrained(&self) -> bool {
        !matches!(self, Self::Unconstrained)
    }
    pub fn ids(&self) -> Option<&RoaringTreemap> {
        match self {
            Self::Matched(ids) => Some(ids),
            _ => None,
        }
    }
    pub fn union_with(&mut self, other: ResolvedSet) {
        if self.is_empty() {
            return;
        }
        match other {
            Self::Unconstrained => (),
            Self::Empty => *self = Self::Empty,
            Self::Matched(other_ids) => match self {
                Self::Matched(ids) => *ids |= other_ids,
                _ => *self = Self::Matched(other_ids),
            },
        }
    }
    pub fn intersect_with(&mut self, other: &ResolvedSet) {
        if self.is_empty() {
            return;
        }
        match other {
            Self::Unconstrained => (),
            Self::Empty => *self = Self::Empty,
            Self::Matched(other_ids) => {
                if let Self::Matched(ids) = self {
                    // this is instead of the deprecated intersect_with
                    *ids &= other_ids;
                    if ids.is_empty() {
                        *self = Self::Empty;
                    }
                } else {
                    *self = Self::Matched(other_ids.clone());
                }
            }
        }
    }
}

/// What the executor should fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// No set-valued criterion: the whole collection (still filtered and paginated).
    All,
    Ids(RoaringTreemap),
    /// Some criterion was unsatisfiable.
    Nothing,
}

impl Selection {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}

/// Per-kind resolutions waiting to be combined.
#[derive(Debug, Clone)]
pub struct Resolutions {
    pub tags: ResolvedSet,
    pub properties: ResolvedSet,
    pub tag_patterns: ResolvedSet,
    pub logbooks: ResolvedSet,
    pub ids: RoaringTreemap,
}

impl Default for Resolutions {
    fn default() -> Self {
        Self {
            tags: ResolvedSet::Unconstrained,
            properties: ResolvedSet::Unconstrained,
            tag_patterns: ResolvedSet::Unconstrained,
            logbooks: ResolvedSet::Unconstrained,
            ids: RoaringTreemap::new(),
        }
    }
}

/// Merges per-kind resolutions:
/// `(tags ∪ properties ∪ tag_patterns) ∩ logbooks`, then `∪ ids`.
///
/// Unconstrained kinds drop out of both operations, and any empty kind
/// empties the whole result, explicit ids included.
pub fn combine(resolutions: Resolutions) -> Selection {
    let Resolutions { tags, properties, tag_patterns, logbooks, ids } = resolutions;
    let mut pool = ResolvedSet::Unconstrained;
    pool.union_with(tags);
    pool.union_with(properties);
    pool.union_with(tag_patterns);
    pool.intersect_with(&logbooks);
    match pool {
        ResolvedSet::Empty => Selection::Nothing,
        ResolvedSet::Unconstrained if ids.is_empty() => Selection::All,
        ResolvedSet::Unconstrained => Selection::Ids(ids),
        ResolvedSet::Matched(mut matched) => {
            matched |= ids;
            Selection::Ids(matched)
        }
    }
}

// Shared mechanics of tag and logbook resolution: every value must match
// something, and the kind's set is the union of what they match.
fn resolve_names<F>(values: &[String], context: &QueryContext, kind: &str, lookup: F) -> Result<ResolvedSet>
where
    F: Fn(&str) -> Result<RoaringTreemap>,
{
    let mut resolved = ResolvedSet::Unconstrained;
    for value in values {
        context.check(kind)?;
        let ids = lookup(&translate(value))?;
        if ids.is_empty() {
            debug!(kind, value = value.as_str(), "no logs match");
            return Ok(ResolvedSet::Empty);
        }
        resolved.union_with(ResolvedSet::Matched(ids));
    }
    Ok(resolved)
}

pub fn resolve_tags<S: LogStore>(store: &S, context: &QueryContext, tags: &[String]) -> Result<ResolvedSet> {
    resolve_names(tags, context, "tag", |pattern| store.ids_by_tag(pattern))
}

pub fn resolve_logbooks<S: LogStore>(
    store: &S,
    context: &QueryContext,
    logbooks: &[String],
) -> Result<ResolvedSet> {
    resolve_names(logbooks, context, "logbook", |pattern| store.ids_by_logbook(pattern))
}

/// Values of one property are alternatives; distinct property names must all hold.
pub fn resolve_properties<'c, S, I>(store: &S, context: &QueryContext, properties: I) -> Result<ResolvedSet>
where
    S: LogStore,
    I: IntoIterator<Item = (&'c str, &'c [String])>,
{
    let mut resolved = ResolvedSet::Unconstrained;
    for (name, values) in properties {
        let mut by_name = RoaringTreemap::new();
        for value in values {
            context.check("property")?;
            by_name |= store.ids_by_property(name, &translate(value))?;
        }
        resolved.intersect_with(&ResolvedSet::from_ids(by_name));
        if resolved.is_empty() {
            debug!(property = name, "no logs satisfy every property");
            return Ok(ResolvedSet::Empty);
        }
    }
    Ok(resolved)
}

/// Resolves every set-valued criterion of `criteria` against one store
/// session and combines the results, stopping at the first empty kind.
pub fn resolve_selection<S: LogStore>(
    store: &S,
    context: &QueryContext,
    criteria: &SearchCriteria,
) -> Result<Selection> {
    let mut resolutions = Resolutions::default();

    resolutions.tags = resolve_tags(store, context, criteria.tags())?;
    if resolutions.tags.is_empty() {
        return Ok(Selection::Nothing);
    }
    resolutions.properties = resolve_properties(store, context, criteria.properties())?;
    if resolutions.properties.is_empty() {
        return Ok(Selection::Nothing);
    }
    resolutions.tag_patterns = resolve_tags(store, context, criteria.tag_patterns())?;
    if resolutions.tag_patterns.is_empty() {
        return Ok(Selection::Nothing);
    }
    resolutions.logbooks = resolve_logbooks(store, context, criteria.logbooks())?;
    if resolutions.logbooks.is_empty() {
        return Ok(Selection::Nothing);
    }
    // explicit ids need no store round-trip
    resolutions.ids.extend(criteria.ids().iter().copied());

    Ok(combine(resolutions))
}
