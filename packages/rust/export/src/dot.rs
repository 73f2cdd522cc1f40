//! Graphviz `dot` rendering of the final Page Map: one node per concrete
//! page (excluding `AGGREG_PENDING` — a half-explored bucket has nothing
//! settled to show), one edge per resolved outgoing link.

use std::collections::BTreeMap;
use std::io::Write;

use statecrawl_model::{Aggregation, LinkPayload, PageArena, PageId};
use statecrawl_shared::{Result, StateCrawlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeColor {
    Anchor,
    FormGet,
    FormPost,
}

impl EdgeColor {
    fn dot_name(self) -> &'static str {
        match self {
            EdgeColor::Anchor => "black",
            EdgeColor::FormGet => "blue",
            EdgeColor::FormPost => "purple",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey {
    from: PageId,
    to: PageId,
    color: EdgeColor,
    dotted: bool,
}

/// Render `arena`'s current state as Graphviz `dot` source.
pub fn render_dot(arena: &PageArena) -> String {
    let mut out = String::new();
    out.push_str("digraph statecrawl {\n");

    for (id, page) in arena.iter() {
        if page.aggregation == Aggregation::AggregPending {
            continue;
        }
        let color = match page.aggregation {
            Aggregation::Aggregated => Some("green"),
            Aggregation::AggregImposs => Some("red"),
            _ => None,
        };
        let label = escape(&page.url);
        match color {
            Some(c) => out.push_str(&format!(
                "  p{} [label=\"{label}\", style=filled, fillcolor={c}];\n",
                id.index()
            )),
            None => out.push_str(&format!("  p{} [label=\"{label}\"];\n", id.index())),
        }
    }

    let mut edges: BTreeMap<EdgeKey, u32> = BTreeMap::new();
    for (id, page) in arena.iter() {
        if page.aggregation == Aggregation::AggregPending {
            continue;
        }
        for (_link_ref, link) in page.links.iter() {
            let Some(target) = link.target else { continue };
            if arena.get(target).aggregation == Aggregation::AggregPending {
                continue;
            }
            let color = match &link.payload {
                LinkPayload::Anchor { .. } => EdgeColor::Anchor,
                LinkPayload::Form { method, .. } if method.eq_ignore_ascii_case("get") => EdgeColor::FormGet,
                LinkPayload::Form { .. } => EdgeColor::FormPost,
            };
            let key = EdgeKey {
                from: id,
                to: target,
                color,
                dotted: link.nvisits == 0,
            };
            *edges.entry(key).or_insert(0) += 1;
        }
    }

    for (key, count) in &edges {
        let style = if key.dotted { "dotted" } else { "solid" };
        out.push_str(&format!(
            "  p{} -> p{} [color={}, style={}, label=\"{}\"];\n",
            key.from.index(),
            key.to.index(),
            key.color.dot_name(),
            style,
            count
        ));
    }

    out.push_str("}\n");
    out
}

/// Render and write the `dot` source to `path`.
pub fn write_dot(arena: &PageArena, path: &std::path::Path) -> Result<()> {
    let source = render_dot(arena);
    let mut file = std::fs::File::create(path).map_err(|e| StateCrawlError::io(path, e))?;
    file.write_all(source.as_bytes())
        .map_err(|e| StateCrawlError::io(path, e))?;
    tracing::info!(path = %path.display(), "wrote graph export");
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecrawl_model::{Link, Page};

    #[test]
    fn renders_one_node_per_concrete_page() {
        let mut arena = PageArena::new();
        let a = arena.insert(Page::new(
            "/a".into(),
            vec![Link::new_anchor("/b".into(), "/html/a".into())],
            vec![],
            vec![],
        ));
        let b = arena.insert(Page::new("/b".into(), vec![], vec![], vec![]));
        arena.get_mut(a).links.anchors[0].target = Some(b);
        arena.get_mut(a).links.anchors[0].nvisits = 1;

        let dot = render_dot(&arena);
        assert!(dot.contains("p0"));
        assert!(dot.contains("p1"));
        assert!(dot.contains("color=black"));
        assert!(dot.contains("style=solid"));
    }

    #[test]
    fn excludes_aggreg_pending_pages_and_their_edges() {
        let mut arena = PageArena::new();
        let a = arena.insert(Page::new(
            "/a".into(),
            vec![Link::new_anchor("/b".into(), "/html/a".into())],
            vec![],
            vec![],
        ));
        let b = arena.insert(Page::new("/b".into(), vec![], vec![], vec![]));
        arena.get_mut(b).aggregation = Aggregation::AggregPending;
        arena.get_mut(a).links.anchors[0].target = Some(b);
        arena.get_mut(a).links.anchors[0].nvisits = 1;

        let dot = render_dot(&arena);
        assert!(!dot.contains("p1 "));
        assert!(!dot.contains("p0 -> p1"));
    }

    #[test]
    fn colors_aggregated_green_and_impossible_red() {
        let mut arena = PageArena::new();
        let a = arena.insert(Page::new("/a".into(), vec![], vec![], vec![]));
        arena.get_mut(a).aggregation = Aggregation::Aggregated;
        let b = arena.insert(Page::new("/b".into(), vec![], vec![], vec![]));
        arena.get_mut(b).aggregation = Aggregation::AggregImposs;

        let dot = render_dot(&arena);
        assert!(dot.contains("fillcolor=green"));
        assert!(dot.contains("fillcolor=red"));
    }

    #[test]
    fn collapses_parallel_edges_into_one_labelled_edge() {
        let mut arena = PageArena::new();
        let a = arena.insert(Page::new(
            "/a".into(),
            vec![
                Link::new_anchor("/b".into(), "/html/a[0]".into()),
                Link::new_anchor("/b".into(), "/html/a[1]".into()),
            ],
            vec![],
            vec![],
        ));
        let b = arena.insert(Page::new("/b".into(), vec![], vec![], vec![]));
        for anchor in &mut arena.get_mut(a).links.anchors {
            anchor.target = Some(b);
            anchor.nvisits = 1;
        }

        let dot = render_dot(&arena);
        assert_eq!(dot.matches("p0 -> p1").count(), 1);
        assert!(dot.contains("label=\"2\""));
    }
}
