//! The concrete-to-equivalence-class index: one [`Inner`] bucket per
//! templatized key, plus the aggregation and status-split machinery that
//! acts on it.

use std::collections::{HashMap, HashSet};

use statecrawl_model::{Aggregation, Link, LinkKind, LinkRef, Links, Page, PageArena, PageId};
use statecrawl_shared::{Result, StateCrawlError};

use crate::unvisited::Unvisited;

/// All concrete pages sharing one templatized key, plus aggregation
/// metadata.
#[derive(Debug)]
struct Inner {
    /// content hash -> canonical page id, for content-based dedup.
    by_content: HashMap<u64, PageId>,
    /// Insertion-ordered membership.
    member_ids: Vec<PageId>,
    /// Identity index used once the bucket enters `StatusSplit` —
    /// membership is then keyed by `PageId` (ExactPage identity) rather
    /// than content hash.
    exact_members: HashMap<PageId, PageId>,
    original: PageId,
    merged: Option<PageId>,
    latest: Option<PageId>,
    aggregation: Aggregation,
}

impl Inner {
    fn new(original: PageId, content_hash: u64) -> Self {
        let mut by_content = HashMap::new();
        by_content.insert(content_hash, original);
        Self {
            by_content,
            member_ids: vec![original],
            exact_members: HashMap::new(),
            original,
            merged: None,
            latest: None,
            aggregation: Aggregation::NotAggreg,
        }
    }
}

/// The page map: dispatches every freshly fetched [`Page`] into its
/// templatized bucket, collapsing duplicates and tracking aggregation.
pub struct PageMap {
    buckets: HashMap<u64, Inner>,
    unvisited: Unvisited,
    similarity_join_threshold: usize,
}

impl PageMap {
    pub fn new(similarity_join_threshold: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            unvisited: Unvisited::new(),
            similarity_join_threshold,
        }
    }

    pub fn unvisited(&self) -> &Unvisited {
        &self.unvisited
    }

    pub fn unvisited_mut(&mut self) -> &mut Unvisited {
        &mut self.unvisited
    }

    /// Mark a link `ignore` and drop it from the unvisited worklist —
    /// the shared tail of every "absorb this routine failure" path.
    pub fn mark_ignore(&mut self, arena: &mut PageArena, page: PageId, link_ref: LinkRef) {
        arena.get_mut(page).links.get_mut(link_ref).ignore = true;
        self.unvisited.remove(page, link_ref);
    }

    /// The central ingest operation. `page` has not yet been inserted
    /// into `arena`; this call allocates it there only when it turns out
    /// to be new content.
    pub fn insert(&mut self, arena: &mut PageArena, page: Page) -> PageId {
        let templatized = page.templatized_hash;
        let content_hash = page.content_hash;

        if !self.buckets.contains_key(&templatized) {
            let id = arena.insert(page);
            register_unvisited(&mut self.unvisited, id, &arena.get(id).links);
            self.buckets.insert(templatized, Inner::new(id, content_hash));
            tracing::debug!(page = id.index(), "new templatized bucket");
            return id;
        }

        let bucket = self.buckets.get_mut(&templatized).expect("checked above");

        if bucket.aggregation == Aggregation::StatusSplit {
            return bucket
                .latest
                .expect("STATUS_SPLIT bucket must have `latest` set by set_latest before insert");
        }

        if let Some(&existing) = bucket.by_content.get(&content_hash) {
            return match bucket.aggregation {
                Aggregation::Aggregated => bucket.merged.expect("AGGREGATED bucket has merged representative"),
                Aggregation::AggregPending | Aggregation::AggregImposs | Aggregation::NotAggreg => existing,
                Aggregation::StatusSplit => unreachable!("handled above"),
            };
        }

        match bucket.aggregation {
            Aggregation::Aggregated => {
                let id = arena.insert(page);
                bucket.by_content.insert(content_hash, id);
                bucket.member_ids.push(id);
                bucket.merged.expect("AGGREGATED bucket has merged representative")
            }
            Aggregation::AggregPending | Aggregation::AggregImposs => {
                let id = arena.insert(page);
                arena.get_mut(id).aggregation = Aggregation::AggregPending;
                bucket.by_content.insert(content_hash, id);
                bucket.member_ids.push(id);
                id
            }
            Aggregation::NotAggreg => {
                let id = arena.insert(page);
                bucket.by_content.insert(content_hash, id);
                bucket.member_ids.push(id);
                register_unvisited(&mut self.unvisited, id, &arena.get(id).links);
                if bucket.member_ids.len() >= self.similarity_join_threshold {
                    bucket.aggregation = Aggregation::AggregPending;
                    tracing::debug!(templatized, "bucket reached similarity-join threshold, now AGGREG_PENDING");
                }
                id
            }
            Aggregation::StatusSplit => unreachable!("handled above"),
        }
    }

    /// Invoked after every successful navigation from `page`.
    pub fn check_aggregatable(&mut self, arena: &mut PageArena, page: PageId) {
        let templatized = arena.get(page).templatized_hash;
        let Some(bucket) = self.buckets.get_mut(&templatized) else {
            return;
        };
        if bucket.aggregation != Aggregation::AggregPending {
            return;
        }

        let real_members: Vec<PageId> = bucket
            .member_ids
            .iter()
            .copied()
            .filter(|&id| arena.get(id).aggregation != Aggregation::AggregPending)
            .collect();

        if !real_members
            .iter()
            .all(|&id| arena.get(id).links.get_unvisited().is_empty())
        {
            return;
        }

        let all_member_ids = bucket.member_ids.clone();
        let original = bucket.original;
        let anchor_count = arena.get(original).links.anchors.len();
        let form_count = arena.get(original).links.forms.len();

        let aggregatable = (0..anchor_count)
            .all(|i| position_aggregatable(arena, &real_members, &all_member_ids, LinkKind::Anchor, i))
            && (0..form_count)
                .all(|i| position_aggregatable(arena, &real_members, &all_member_ids, LinkKind::Form, i));

        let bucket = self.buckets.get_mut(&templatized).expect("still present");
        if aggregatable {
            bucket.aggregation = Aggregation::Aggregated;
            bucket.merged = Some(original);
            tracing::info!(templatized, members = all_member_ids.len(), "bucket aggregated");
            for &member in &all_member_ids {
                arena.get_mut(member).aggregation = Aggregation::Aggregated;
                if member != original {
                    rewrite_back_links(arena, member, original);
                }
            }
        } else {
            bucket.aggregation = Aggregation::AggregImposs;
            tracing::debug!(templatized, "bucket aggregation found impossible");
            for &member in &real_members {
                arena.get_mut(member).aggregation = Aggregation::AggregImposs;
            }
        }
    }

    /// Status-split entry point. Legal only when the bucket's current
    /// aggregation is `NotAggreg` or `StatusSplit`.
    pub fn set_latest(&mut self, arena: &mut PageArena, page: PageId) -> Result<()> {
        let templatized = arena.get(page).templatized_hash;
        let bucket = self
            .buckets
            .get_mut(&templatized)
            .ok_or_else(|| StateCrawlError::invariant("set_latest on an unknown templatized bucket"))?;

        match bucket.aggregation {
            Aggregation::StatusSplit => {
                bucket.exact_members.insert(page, page);
                if !bucket.member_ids.contains(&page) {
                    bucket.member_ids.push(page);
                }
                bucket.latest = Some(page);
                arena.get_mut(page).aggregation = Aggregation::StatusSplit;
                Ok(())
            }
            Aggregation::NotAggreg => {
                if bucket.member_ids.len() != 1 {
                    return Err(StateCrawlError::invariant(
                        "set_latest in NOT_AGGREG state requires exactly one existing member",
                    ));
                }
                let existing = bucket.member_ids[0];
                bucket.exact_members.insert(existing, existing);
                bucket.exact_members.insert(page, page);
                if !bucket.member_ids.contains(&page) {
                    bucket.member_ids.push(page);
                }
                bucket.aggregation = Aggregation::StatusSplit;
                bucket.latest = Some(page);
                arena.get_mut(existing).aggregation = Aggregation::StatusSplit;
                arena.get_mut(page).aggregation = Aggregation::StatusSplit;
                Ok(())
            }
            _ => Err(StateCrawlError::invariant(
                "set_latest is only legal when aggregation is NOT_AGGREG or STATUS_SPLIT",
            )),
        }
    }

    /// Search `page`'s bucket for a sibling whose link at `link_ref`
    /// already resolves to `expected_target`.
    pub fn find_clone(
        &self,
        arena: &PageArena,
        page: PageId,
        link_ref: LinkRef,
        expected_target: PageId,
    ) -> Option<PageId> {
        let templatized = arena.get(page).templatized_hash;
        let bucket = self.buckets.get(&templatized)?;
        bucket
            .member_ids
            .iter()
            .copied()
            .filter(|&member| member != page)
            .find(|&member| {
                let links = &arena.get(member).links;
                let link = match link_ref.kind {
                    LinkKind::Anchor => links.anchors.get(link_ref.index),
                    LinkKind::Form => links.forms.get(link_ref.index),
                };
                link.and_then(|l| l.target) == Some(expected_target)
            })
    }
}

/// Point `predecessor`'s link at `target`, keeping `target.back_links`
/// (and the old target's, if any) in sync. The only place a link's
/// `target` should be assigned outside of page construction.
pub fn link_to(arena: &mut PageArena, predecessor: PageId, link_ref: LinkRef, target: PageId) {
    let old_target = arena.get(predecessor).links.get(link_ref).target;
    if old_target == Some(target) {
        return;
    }
    if let Some(old) = old_target {
        arena.get_mut(old).back_links.retain(|&(p, l)| (p, l) != (predecessor, link_ref));
    }
    arena.get_mut(predecessor).links.get_mut(link_ref).target = Some(target);
    arena.get_mut(target).back_links.push((predecessor, link_ref));
}

pub(crate) fn register_unvisited(unvisited: &mut Unvisited, page: PageId, links: &Links) {
    for (link_ref, link) in links.iter() {
        if !link.ignore && link.is_unresolved() {
            unvisited.add(page, link_ref);
        }
    }
}

fn position_aggregatable(
    arena: &PageArena,
    real_members: &[PageId],
    all_members: &[PageId],
    kind: LinkKind,
    index: usize,
) -> bool {
    let mut targets: HashSet<PageId> = HashSet::new();
    for &member in real_members {
        let link: Option<&Link> = match kind {
            LinkKind::Anchor => arena.get(member).links.anchors.get(index),
            LinkKind::Form => arena.get(member).links.forms.get(index),
        };
        if let Some(target) = link.and_then(|l| l.target) {
            targets.insert(target);
        }
    }
    targets.len() <= 1 || targets.iter().all(|t| all_members.contains(t))
}

fn rewrite_back_links(arena: &mut PageArena, member: PageId, merged: PageId) {
    let back_links = std::mem::take(&mut arena.get_mut(member).back_links);
    for (predecessor, link_ref) in back_links {
        arena.get_mut(predecessor).links.get_mut(link_ref).target = Some(merged);
        arena.get_mut(merged).back_links.push((predecessor, link_ref));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecrawl_model::Link;

    fn page_with_anchors(url: &str, n: usize) -> Page {
        let anchors = (0..n)
            .map(|i| Link::new_anchor(format!("/item?id={i}"), "/html/a".into()))
            .collect();
        Page::new(url.into(), anchors, vec![], vec![])
    }

    #[test]
    fn first_insert_creates_not_aggreg_bucket() {
        let mut arena = PageArena::new();
        let mut map = PageMap::new(3);
        let id = map.insert(&mut arena, page_with_anchors("/item?id=0", 1));
        assert_eq!(arena.get(id).aggregation, Aggregation::NotAggreg);
        assert_eq!(map.unvisited().len(), 1);
    }

    #[test]
    fn reinserting_identical_content_returns_canonical_copy() {
        let mut arena = PageArena::new();
        let mut map = PageMap::new(3);
        let a = map.insert(&mut arena, page_with_anchors("/item?id=0", 1));
        let b = map.insert(&mut arena, page_with_anchors("/item?id=0", 1));
        assert_eq!(a, b);
    }

    #[test]
    fn bucket_flips_to_pending_at_threshold() {
        let mut arena = PageArena::new();
        let mut map = PageMap::new(3);
        map.insert(&mut arena, page_with_anchors("/item?id=1", 1));
        map.insert(&mut arena, page_with_anchors("/item?id=2", 1));
        let third = map.insert(&mut arena, page_with_anchors("/item?id=3", 1));
        // third insertion reaches the threshold of 3 members
        assert_eq!(arena.get(third).aggregation, Aggregation::NotAggreg);
        let fourth = map.insert(&mut arena, page_with_anchors("/item?id=4", 1));
        assert_eq!(arena.get(fourth).aggregation, Aggregation::AggregPending);
    }

    #[test]
    fn find_clone_locates_sibling_with_matching_target() {
        let mut arena = PageArena::new();
        let mut map = PageMap::new(10);
        let a = map.insert(&mut arena, page_with_anchors("/item?id=1", 1));
        let b = map.insert(&mut arena, page_with_anchors("/item?id=2", 1));
        let target = arena.insert(Page::new("http://x/t".into(), vec![], vec![], vec![]));
        arena.get_mut(b).links.anchors[0].target = Some(target);
        arena.get_mut(b).links.anchors[0].nvisits = 1;

        let found = map.find_clone(&arena, a, LinkRef::anchor(0), target);
        assert_eq!(found, Some(b));
    }
}
