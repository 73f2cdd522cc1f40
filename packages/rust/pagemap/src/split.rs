//! Status-split recovery: cloning a page (and, transitively, its
//! predecessor chain) when a link that was previously resolved yields a
//! different target than remembered.
//!
//! Implemented iteratively against an explicit work stack rather than
//! recursing through the predecessor chain directly, so stack depth does
//! not grow with history length.

use statecrawl_model::{Page, PageArena, PageId, LinkRef};
use statecrawl_shared::{Result, StateCrawlError};

use crate::pagemap::{link_to, register_unvisited, PageMap};

/// Split `page` because its link at `link_ref` now resolves to
/// `new_target` instead of the target remembered from an earlier visit.
/// Returns the page (a sibling clone, or a freshly minted one) whose
/// link now legitimately points at `new_target`.
pub fn split_page(
    arena: &mut PageArena,
    pagemap: &mut PageMap,
    page: PageId,
    link_ref: LinkRef,
    new_target: PageId,
) -> Result<PageId> {
    // Each work item resolves `cur_page`'s link at `cur_link_ref` to point
    // at `cur_target`. `waiting_clone`, when set, is the descendant clone
    // whose own history is finalized once *this* frame's resulting page is
    // known — mirrors the original's
    // `clonedpage.histories.append(clonedprev.histories[-1] + [(clonedprev, prevlinkidx)])`.
    let mut work = vec![(page, link_ref, new_target, None::<PageId>)];
    let mut root_clone = None;
    let mut is_root = true;

    while let Some((cur_page, cur_link_ref, cur_target, waiting_clone)) = work.pop() {
        let result = if let Some(existing) = pagemap.find_clone(arena, cur_page, cur_link_ref, cur_target) {
            tracing::debug!(page = cur_page.index(), "split_page reused existing sibling");
            existing
        } else {
            let clone_id = deep_clone_page(arena, cur_page);

            if let Some(route) = arena.get(cur_page).latest_history().cloned() {
                if let Some(&(pred_page, pred_link_ref)) = route.last() {
                    let pred_nvisits = arena.get(pred_page).links.get(pred_link_ref).nvisits;
                    if pred_nvisits > 1 {
                        work.push((pred_page, pred_link_ref, clone_id, Some(clone_id)));
                    } else {
                        link_to(arena, pred_page, pred_link_ref, clone_id);
                        arena.get_mut(clone_id).push_history(route);
                    }
                }
            }

            link_to(arena, clone_id, cur_link_ref, cur_target);
            arena.get_mut(clone_id).links.get_mut(cur_link_ref).nvisits += 1;

            // The clone starts life with every link fresh; register its
            // *other* links on the worklist too (cur_link_ref is already
            // resolved, so register_unvisited skips it on its own).
            register_unvisited(pagemap.unvisited_mut(), clone_id, &arena.get(clone_id).links);

            pagemap.set_latest(arena, clone_id)?;
            tracing::info!(clone = clone_id.index(), "split_page created clone, bucket entered STATUS_SPLIT");
            clone_id
        };

        // A deferred predecessor frame resolves into `result` (whether a
        // reused sibling or a fresh clone); the descendant that deferred to
        // it gets its history finalized only now, off of `result`'s own
        // history rather than the original, unsplit predecessor's.
        if let Some(child) = waiting_clone {
            let mut route = arena.get(result).latest_history().cloned().unwrap_or_default();
            route.push((result, cur_link_ref));
            arena.get_mut(child).push_history(route);
        }

        // The root frame is always popped first — nothing can be pushed
        // onto `work` before it runs — so this captures the clone for the
        // page this call was actually asked to split, regardless of how
        // many predecessor frames run after it.
        if is_root {
            root_clone = Some(result);
            is_root = false;
        }
    }

    root_clone.ok_or_else(|| StateCrawlError::invariant("split_page produced no clone"))
}

fn deep_clone_page(arena: &mut PageArena, page: PageId) -> PageId {
    let src = arena.get(page);
    let fresh_links = src.links.clone_fresh();
    let cookies = src.cookies.clone();
    let url = src.url.clone();
    let status = src.status;
    let new_page = Page::with_status(url, fresh_links.anchors, fresh_links.forms, cookies, status);
    arena.insert(new_page)
}
