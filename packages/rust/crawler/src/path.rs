//! Path-to-unvisited search: breadth-first over the concrete page graph,
//! four passes tried in a fixed order.

use std::collections::{HashSet, VecDeque};

use statecrawl_model::{LinkKind, LinkRef, PageArena, PageId};
use statecrawl_pagemap::Unvisited;

/// One step of a path: the link taken and the page it lands on.
pub type PathStep = (LinkRef, PageId);

/// Find a path from `start` to some page owning an unvisited link,
/// trying (seek, traverse) in the order the spec lists: anchors-only,
/// anchors-seeking-through-anchors-and-forms, forms-only,
/// forms-through-everything. Anchors are idempotent and preferred;
/// forms may mutate server state, so they're used to reach new
/// territory only once pure navigation is exhausted.
pub fn find_path_to_unvisited(
    arena: &PageArena,
    unvisited: &Unvisited,
    start: PageId,
) -> Option<Vec<PathStep>> {
    const PASSES: [(LinkKind, &[LinkKind]); 4] = [
        (LinkKind::Anchor, &[LinkKind::Anchor]),
        (LinkKind::Anchor, &[LinkKind::Anchor, LinkKind::Form]),
        (LinkKind::Form, &[LinkKind::Anchor]),
        (LinkKind::Form, &[LinkKind::Anchor, LinkKind::Form]),
    ];

    for (seek, traverse) in PASSES {
        if let Some(path) = bfs_pass(arena, unvisited, start, seek, traverse) {
            return Some(path);
        }
    }
    None
}

fn bfs_pass(
    arena: &PageArena,
    unvisited: &Unvisited,
    start: PageId,
    seek: LinkKind,
    traverse: &[LinkKind],
) -> Option<Vec<PathStep>> {
    let mut visited: HashSet<PageId> = HashSet::new();
    visited.insert(start);
    let mut queue: VecDeque<(PageId, Vec<PathStep>)> = VecDeque::new();
    queue.push_back((start, Vec::new()));

    while let Some((page, path)) = queue.pop_front() {
        if !path.is_empty() && has_unvisited_of_kind(unvisited, page, seek) {
            return Some(path);
        }

        for (link_ref, link) in arena.get(page).links.iter() {
            if !traverse.contains(&link_ref.kind) {
                continue;
            }
            if !link.is_traversable() {
                continue;
            }
            let Some(target) = link.target else { continue };
            if visited.contains(&target) {
                continue;
            }
            visited.insert(target);
            let mut next_path = path.clone();
            next_path.push((link_ref, target));
            queue.push_back((target, next_path));
        }
    }

    None
}

fn has_unvisited_of_kind(unvisited: &Unvisited, page: PageId, kind: LinkKind) -> bool {
    match kind {
        LinkKind::Anchor => unvisited.anchors_on(page).next().is_some(),
        LinkKind::Form => unvisited.forms_on(page).next().is_some(),
    }
}
