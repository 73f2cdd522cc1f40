//! The Abstract Graph Builder: walks the navigation history and
//! constructs `AbstractRequest --[state]--> AbstractPage --[link,state]-->
//! AbstractRequest`.

use std::collections::HashMap;

use statecrawl_model::{strip_query, urlvector, Link, LinkKind, LinkPayload, LinkRef, NavLog, PageArena};
use statecrawl_shared::{Result, StateCrawlError};

use crate::abstract_types::{AbstractGraph, AbstractRequest, AbstractRequestId, State, Target};
use crate::cluster::SimpleClustering;

/// Walk `navlog` head to tail, building the abstract graph over
/// `clustering`'s abstract pages.
///
/// Each forward navigation record already carries its own `(source page,
/// link)` in `via`, so — unlike a model that must search every link's
/// visit log to find which one led to a given record — this builder reads
/// the source link directly off the record instead of re-deriving it.
/// Pure `back` records carry no `via` and contribute no new abstract-link
/// transition; the next forward record (wherever it occurs) supplies one
/// when the walk reaches it.
pub fn build_abstract_graph(
    arena: &PageArena,
    navlog: &NavLog,
    clustering: &SimpleClustering,
) -> Result<AbstractGraph> {
    let mut graph = AbstractGraph {
        pages: clustering.pages.clone(),
        requests: Vec::new(),
        head_request: None,
        final_state: None,
    };

    let Some(head) = navlog.head() else {
        return Ok(graph);
    };

    let mut request_index: HashMap<String, AbstractRequestId> = HashMap::new();
    let first_page = arena.get(navlog.get(head).page);
    let first_key = format!("OPEN {}", canonical_url_key(&first_page.url));
    let mut curr_req = get_or_create_request(&mut graph, &mut request_index, first_key);
    graph.head_request = Some(curr_req);

    let mut laststate: State = 0;
    let mut record_id = head;

    loop {
        let record = navlog.get(record_id);
        let page_id = record.page;
        let abs_page_id = *clustering
            .page_to_abstract
            .get(&page_id)
            .ok_or_else(|| StateCrawlError::invariant("record's page missing from clustering"))?;

        // A `back` record repositions the cursor but introduces no new
        // state of its own — it never gets a target entry written for
        // it, and `laststate` only advances at a forward record.
        if !record.is_back {
            let req = &mut graph.requests[curr_req];
            if req.targets.contains_key(&laststate) {
                return Err(StateCrawlError::invariant(
                    "a state was used as the key of two targets on the same abstract request",
                ));
            }
            req.targets.insert(
                laststate,
                Target {
                    target: abs_page_id,
                    next_state: laststate + 1,
                    nvisits: 1,
                },
            );
            laststate += 1;
        }

        let Some(next_id) = record.next else {
            graph.final_state = Some(laststate - 1);
            break;
        };

        let next_record = navlog.get(next_id);
        if next_record.is_back {
            record_id = next_id;
            continue;
        }

        let (via_page, via_link_ref) = next_record
            .via
            .ok_or_else(|| StateCrawlError::invariant("forward navigation record missing `via`"))?;
        debug_assert_eq!(via_page, page_id);

        let link = arena.get(via_page).links.get(via_link_ref);
        let next_key = canonical_link_key(link);
        let next_req = get_or_create_request(&mut graph, &mut request_index, next_key);

        {
            let abs_link = match via_link_ref.kind {
                LinkKind::Anchor => &mut graph.pages[abs_page_id].anchors[via_link_ref.index],
                LinkKind::Form => &mut graph.pages[abs_page_id].forms[via_link_ref.index],
            };
            let entry = abs_link.targets.entry(laststate).or_insert(Target {
                target: next_req,
                next_state: laststate,
                nvisits: 0,
            });
            entry.nvisits += 1;
        }
        graph.pages[abs_page_id]
            .statelinkmap
            .insert(laststate, via_link_ref);

        curr_req = next_req;
        record_id = next_id;
    }

    Ok(graph)
}

fn get_or_create_request(
    graph: &mut AbstractGraph,
    index: &mut HashMap<String, AbstractRequestId>,
    key: String,
) -> AbstractRequestId {
    if let Some(&id) = index.get(&key) {
        return id;
    }
    let id = graph.requests.len();
    graph.requests.push(AbstractRequest {
        id,
        canonical: key.clone(),
        targets: Default::default(),
    });
    index.insert(key, id);
    id
}

fn canonical_url_key(url: &str) -> String {
    let path = strip_query(url);
    let query = url.find('?').map(|i| &url[i + 1..]).unwrap_or("");
    let v = urlvector(path, query);
    format!("GET {:?} {:?}", v.segments, v.query_keys)
}

fn canonical_link_key(link: &Link) -> String {
    match &link.payload {
        LinkPayload::Anchor { href, .. } => format!("GET {}", canonical_url_key(href)),
        LinkPayload::Form {
            method,
            action,
            text_fields,
            textarea_fields,
            select_fields,
        } => {
            let mut fields: Vec<&str> = text_fields
                .iter()
                .chain(textarea_fields.iter())
                .chain(select_fields.iter())
                .map(String::as_str)
                .collect();
            fields.sort_unstable();
            format!("{} {} [{}]", method.to_uppercase(), action, fields.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::simple_pass;
    use statecrawl_model::{NavLog, Page, PageArena};

    #[test]
    fn linear_chain_produces_one_request_per_distinct_link() {
        let mut arena = PageArena::new();
        let mut navlog = NavLog::new();

        let a = arena.insert(Page::new(
            "/a".into(),
            vec![Link::new_anchor("/b".into(), "/html/a".into())],
            vec![],
            vec![],
        ));
        let b = arena.insert(Page::new("/b".into(), vec![], vec![], vec![]));
        arena.get_mut(a).links.anchors[0].target = Some(b);
        arena.get_mut(a).links.anchors[0].nvisits = 1;

        let open = navlog.open(a);
        navlog.navigate(open, (a, LinkRef::anchor(0)), b);

        let clustering = simple_pass(&arena, &navlog);
        let graph = build_abstract_graph(&arena, &navlog, &clustering).unwrap();

        assert_eq!(graph.requests.len(), 2);
        assert_eq!(graph.pages.len(), 2);
        assert_eq!(graph.final_state, Some(1));
    }

    #[test]
    fn trivial_singleton_has_one_state() {
        let mut arena = PageArena::new();
        let mut navlog = NavLog::new();
        let a = arena.insert(Page::new("/a".into(), vec![], vec![], vec![]));
        navlog.open(a);

        let clustering = simple_pass(&arena, &navlog);
        let graph = build_abstract_graph(&arena, &navlog, &clustering).unwrap();

        assert_eq!(graph.requests.len(), 1);
        assert_eq!(graph.final_state, Some(0));
    }

    #[test]
    fn back_then_branch_contributes_no_state_or_target_of_its_own() {
        // open A -> navigate a1 -> B -> back -> A -> navigate a2 -> C
        let mut arena = PageArena::new();
        let mut navlog = NavLog::new();

        let a = arena.insert(Page::new(
            "/a".into(),
            vec![
                Link::new_anchor("/b".into(), "/html/a1".into()),
                Link::new_anchor("/c".into(), "/html/a2".into()),
            ],
            vec![],
            vec![],
        ));
        let b = arena.insert(Page::new("/b".into(), vec![], vec![], vec![]));
        let c = arena.insert(Page::new("/c".into(), vec![], vec![], vec![]));
        arena.get_mut(a).links.anchors[0].target = Some(b);
        arena.get_mut(a).links.anchors[0].nvisits = 1;
        arena.get_mut(a).links.anchors[1].target = Some(c);
        arena.get_mut(a).links.anchors[1].nvisits = 1;

        let open = navlog.open(a);
        let to_b = navlog.navigate(open, (a, LinkRef::anchor(0)), b);
        let back = navlog.back(to_b, open);
        navlog.navigate(back, (a, LinkRef::anchor(1)), c);

        let clustering = simple_pass(&arena, &navlog);
        let graph = build_abstract_graph(&arena, &navlog, &clustering).unwrap();

        // Three real states: A (open), B, C. The back contributes none.
        assert_eq!(graph.final_state, Some(2));

        let abs_a = clustering.page_to_abstract[&a];
        let a1_target = graph.pages[abs_a].anchors[0].targets.get(&1).expect("a1 resolves at state 1");
        let a2_target = graph.pages[abs_a].anchors[1].targets.get(&2).expect("a2 resolves at state 2");

        let req_a1 = &graph.requests[a1_target.target];
        assert_eq!(req_a1.targets.len(), 1);
        assert!(req_a1.targets.contains_key(&1));

        let req_a2 = &graph.requests[a2_target.target];
        assert_eq!(req_a2.targets.len(), 1);
        assert!(req_a2.targets.contains_key(&2));
    }
}
