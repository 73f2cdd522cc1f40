//! The State Reducer: folds per-step states into the minimal equivalent
//! labelling.

use std::collections::BTreeMap;

use statecrawl_model::LinkKind;
use statecrawl_shared::{Result, StateCrawlError};

use crate::abstract_types::{AbstractGraph, AbstractPageId, AbstractRequestId, State, Target};

/// Outcome of one reduction pass. `Inconclusive` surfaces the conflicting
/// observation instead of silently coalescing it — see the design note on
/// the reducer's unimplemented branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReduceOutcome {
    Reduced { final_canonical_state: State },
    Inconclusive {
        page: AbstractPageId,
        conflicting_prior_state: State,
        conflicting_new_state: State,
    },
}

/// Run one reduction pass over `graph`, rewriting every target map's keys
/// to canonical states in place. On [`ReduceOutcome::Inconclusive`] the
/// graph is left unmodified — callers should retry after finer
/// clustering or declare the pass inconclusive (see driver).
pub fn reduce_states(graph: &mut AbstractGraph) -> Result<ReduceOutcome> {
    let Some(head_req) = graph.head_request else {
        return Ok(ReduceOutcome::Reduced {
            final_canonical_state: 0,
        });
    };
    let max_state = graph.final_state.unwrap_or(0);
    let mut statemap: Vec<State> = (0..=max_state).collect();

    let mut stack: Vec<(AbstractRequestId, AbstractPageId)> = Vec::new();
    let mut curr_req = head_req;
    let mut curr_state: State = 0;

    loop {
        let respage = graph.requests[curr_req]
            .targets
            .get(&curr_state)
            .ok_or_else(|| StateCrawlError::invariant("abstract request has no target for current state"))?
            .target;
        stack.push((curr_req, respage));

        let newstate = curr_state + 1;
        if (newstate as usize) < statemap.len() {
            statemap[newstate as usize] = curr_state;
        }

        let chosen_page = if graph.pages[respage].statelinkmap.contains_key(&newstate) {
            Some(respage)
        } else if newstate == max_state {
            None
        } else {
            let mut found = None;
            while let Some(&(_, page)) = stack.last() {
                if graph.pages[page].statelinkmap.contains_key(&newstate) {
                    found = Some(page);
                    break;
                }
                stack.pop();
            }
            found
        };

        let Some(page) = chosen_page else {
            break;
        };

        let link_ref = graph.pages[page].statelinkmap[&newstate];
        let chosen_link = match link_ref.kind {
            LinkKind::Anchor => &graph.pages[page].anchors[link_ref.index],
            LinkKind::Form => &graph.pages[page].forms[link_ref.index],
        };
        let chosen_target = chosen_link
            .targets
            .get(&newstate)
            .expect("statelinkmap entry implies a target is recorded at this state")
            .target;

        for (&prior_state, prior_target) in chosen_link.targets.iter() {
            if prior_state < newstate
                && prior_target.target != chosen_target
                && min_mapped(&statemap, prior_state) != min_mapped(&statemap, newstate)
            {
                return Ok(ReduceOutcome::Inconclusive {
                    page,
                    conflicting_prior_state: prior_state,
                    conflicting_new_state: newstate,
                });
            }
        }

        curr_req = chosen_target;
        curr_state = newstate;

        if curr_state == max_state {
            break;
        }
    }

    for s in 0..statemap.len() {
        statemap[s] = min_mapped(&statemap, s as State);
    }

    for req in &mut graph.requests {
        req.targets = collapse_targets(&req.targets, &statemap);
    }
    for page in &mut graph.pages {
        for link in page.anchors.iter_mut().chain(page.forms.iter_mut()) {
            link.targets = collapse_targets(&link.targets, &statemap);
        }
    }

    Ok(ReduceOutcome::Reduced {
        final_canonical_state: statemap[max_state as usize],
    })
}

fn min_mapped(statemap: &[State], s: State) -> State {
    let mut cur = s;
    loop {
        let next = statemap[cur as usize];
        if next == cur {
            return cur;
        }
        cur = next;
    }
}

fn collapse_targets<T: Copy + Eq>(
    targets: &BTreeMap<State, Target<T>>,
    statemap: &[State],
) -> BTreeMap<State, Target<T>> {
    let mut out: BTreeMap<State, Target<T>> = BTreeMap::new();
    for (&state, t) in targets {
        let canonical = statemap[state as usize];
        let canonical_next = statemap
            .get(t.next_state as usize)
            .copied()
            .unwrap_or(t.next_state);
        out.entry(canonical)
            .and_modify(|existing| existing.nvisits += t.nvisits)
            .or_insert(Target {
                target: t.target,
                next_state: canonical_next,
                nvisits: t.nvisits,
            });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_abstract_graph;
    use crate::cluster::simple_pass;
    use statecrawl_model::{Link, LinkRef, NavLog, Page, PageArena};

    fn linear_chain() -> AbstractGraph {
        let mut arena = PageArena::new();
        let mut navlog = NavLog::new();

        let a = arena.insert(Page::new(
            "/a".into(),
            vec![Link::new_anchor("/b".into(), "/html/a".into())],
            vec![],
            vec![],
        ));
        let b = arena.insert(Page::new(
            "/b".into(),
            vec![Link::new_anchor("/c".into(), "/html/a".into())],
            vec![],
            vec![],
        ));
        let c = arena.insert(Page::new("/c".into(), vec![], vec![], vec![]));
        arena.get_mut(a).links.anchors[0].target = Some(b);
        arena.get_mut(a).links.anchors[0].nvisits = 1;
        arena.get_mut(b).links.anchors[0].target = Some(c);
        arena.get_mut(b).links.anchors[0].nvisits = 1;

        let open = navlog.open(a);
        let r1 = navlog.navigate(open, (a, LinkRef::anchor(0)), b);
        navlog.navigate(r1, (b, LinkRef::anchor(0)), c);

        let clustering = simple_pass(&arena, &navlog);
        build_abstract_graph(&arena, &navlog, &clustering).unwrap()
    }

    #[test]
    fn reduces_linear_chain_without_conflict() {
        let mut graph = linear_chain();
        let outcome = reduce_states(&mut graph).unwrap();
        assert!(matches!(outcome, ReduceOutcome::Reduced { .. }));
    }

    #[test]
    fn reduction_is_idempotent() {
        let mut graph = linear_chain();
        let first = reduce_states(&mut graph).unwrap();
        let second = reduce_states(&mut graph).unwrap();
        assert_eq!(first, second);
    }
}
