//! The Page Clusterer: partitions navigation records into [`AbstractPage`]
//! buckets by a content-derived signature.

use std::collections::{HashMap, HashSet};

use statecrawl_model::{LinkPayload, NavLog, Page, PageArena, PageId, strip_query, content_hash};

use crate::abstract_types::{AbstractLink, AbstractPage};

/// Result of the simple pass — the authoritative clustering the graph
/// builder consumes.
#[derive(Debug, Default)]
pub struct SimpleClustering {
    pub page_to_abstract: HashMap<PageId, usize>,
    pub pages: Vec<AbstractPage>,
}

/// Bucket records by `hash(request path, anchors fingerprint, forms
/// fingerprint)`. Every bucket becomes one [`AbstractPage`].
pub fn simple_pass(arena: &PageArena, navlog: &NavLog) -> SimpleClustering {
    let mut sig_to_abstract: HashMap<u64, usize> = HashMap::new();
    let mut page_to_abstract: HashMap<PageId, usize> = HashMap::new();
    let mut pages: Vec<AbstractPage> = Vec::new();

    for (record_id, record) in navlog.iter() {
        let page_id = record.page;
        let abs_id = if let Some(&id) = page_to_abstract.get(&page_id) {
            id
        } else {
            let sig = cluster_signature(arena.get(page_id));
            *sig_to_abstract.entry(sig).or_insert_with(|| {
                let p = arena.get(page_id);
                let id = pages.len();
                pages.push(AbstractPage {
                    id,
                    members: Vec::new(),
                    anchors: vec![AbstractLink::default(); p.links.anchors.len()],
                    forms: vec![AbstractLink::default(); p.links.forms.len()],
                    statelinkmap: Default::default(),
                });
                id
            })
        };
        page_to_abstract.insert(page_id, abs_id);
        pages[abs_id].members.push(record_id);
    }

    SimpleClustering {
        page_to_abstract,
        pages,
    }
}

fn cluster_signature(page: &Page) -> u64 {
    let path = strip_query(&page.url);
    let anchors_fingerprint = page
        .links
        .anchors
        .iter()
        .map(|l| match &l.payload {
            LinkPayload::Anchor { dom_path, href } => format!("{dom_path}:{}", strip_query(href)),
            _ => unreachable!("anchors vec holds only Anchor payloads"),
        })
        .collect::<Vec<_>>()
        .join("|");
    let forms_fingerprint = page
        .links
        .forms
        .iter()
        .map(|l| match &l.payload {
            LinkPayload::Form {
                method,
                action,
                text_fields,
                textarea_fields,
                select_fields,
            } => format!(
                "{method}:{action}:{}:{}:{}",
                text_fields.join(","),
                textarea_fields.join(","),
                select_fields.join(",")
            ),
            _ => unreachable!("forms vec holds only Form payloads"),
        })
        .collect::<Vec<_>>()
        .join("|");

    content_hash(&[
        path.as_bytes(),
        anchors_fingerprint.as_bytes(),
        forms_fingerprint.as_bytes(),
    ])
}

/// Diagnostic median bucket size at one level of the level-pass tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStats {
    pub level: usize,
    pub median_bucket_size: usize,
}

/// Level pass: a recursive classifier keyed by each page's link vector
/// (DOM path / action, then stripped href, level by level). Diagnostic
/// only — not required for correctness, and not consumed by the graph
/// builder.
pub fn level_pass(arena: &PageArena, navlog: &NavLog) -> Vec<LevelStats> {
    let mut seen = HashSet::new();
    let mut vectors: Vec<Vec<String>> = Vec::new();

    for (_, record) in navlog.iter() {
        if seen.insert(record.page) {
            vectors.push(links_vector(arena.get(record.page)));
        }
    }

    let max_level = vectors.iter().map(|v| v.len()).max().unwrap_or(0);
    let mut stats = Vec::with_capacity(max_level);

    for level in 1..=max_level {
        let mut groups: HashMap<Vec<String>, usize> = HashMap::new();
        for v in &vectors {
            let prefix: Vec<String> = v.iter().take(level).cloned().collect();
            *groups.entry(prefix).or_insert(0) += 1;
        }
        let mut sizes: Vec<usize> = groups.into_values().collect();
        sizes.sort_unstable();
        let median = sizes.get(sizes.len() / 2).copied().unwrap_or(0);
        stats.push(LevelStats {
            level,
            median_bucket_size: median,
        });
    }

    stats
}

fn links_vector(page: &Page) -> Vec<String> {
    let mut tokens = Vec::new();
    for (_, link) in page.links.iter() {
        match &link.payload {
            LinkPayload::Anchor { href, dom_path } => {
                tokens.push(dom_path.clone());
                tokens.push(strip_query(href).to_string());
            }
            LinkPayload::Form { method, action, .. } => {
                tokens.push(format!("{method}:{action}"));
            }
        }
    }
    tokens
}
