//! The concrete `Page`: one fetched document, keyed two different ways.

use crate::aggregation::Aggregation;
use crate::arena::PageId;
use crate::link::{Link, LinkRef, LinkPayload, Route};
use crate::links::Links;
use crate::vector::{content_hash, strip_query};

/// A fetched page. Identity is content-derived (`content_hash`); a second,
/// coarser hash (`templatized_hash`) groups URL-variant siblings by
/// ignoring anchor query strings — see the page map's inner buckets.
#[derive(Debug, Clone)]
pub struct Page {
    /// Set once the page is inserted into a [`crate::arena::PageArena`].
    pub id: Option<PageId>,
    pub url: String,
    pub links: Links,
    pub cookies: Vec<String>,
    /// HTTP status of the response that produced this page. Synthetic
    /// error-placeholder pages (see the crawl driver) use their status
    /// code as a stand-in URL.
    pub status: u16,

    /// Unordered set of `(predecessor page, link index)` back-links.
    /// Invariant: for every `(p, i)` here, `arena[p].links[i].target == self.id`.
    pub back_links: Vec<(PageId, LinkRef)>,

    /// Every route by which this page has been reached, oldest first.
    /// Monotonically grows; `split_page` copies the relevant suffix onto
    /// a clone rather than truncating this list.
    pub histories: Vec<Route>,

    /// Mirrors the owning inner bucket's aggregation status.
    pub aggregation: Aggregation,

    pub content_hash: u64,
    pub templatized_hash: u64,
}

impl Page {
    pub fn new(url: String, anchors: Vec<Link>, forms: Vec<Link>, cookies: Vec<String>) -> Self {
        Self::with_status(url, anchors, forms, cookies, 200)
    }

    pub fn with_status(
        url: String,
        anchors: Vec<Link>,
        forms: Vec<Link>,
        cookies: Vec<String>,
        status: u16,
    ) -> Self {
        let links = Links::new(anchors, forms);
        let content_hash = compute_content_hash(&url, &links, &cookies);
        let templatized_hash = compute_templatized_hash(&links, &cookies);
        Self {
            id: None,
            url,
            links,
            cookies,
            status,
            back_links: Vec::new(),
            histories: Vec::new(),
            aggregation: Aggregation::default(),
            content_hash,
            templatized_hash,
        }
    }

    /// A synthetic page standing in for a failing HTTP status — its URL
    /// is the status code, per the error-handling design (§7 "HTTP
    /// error").
    pub fn synthetic_status(status: u16) -> Self {
        Self::with_status(status.to_string(), Vec::new(), Vec::new(), Vec::new(), status)
    }

    pub fn id(&self) -> PageId {
        self.id.expect("page not yet inserted into an arena")
    }

    /// Append a route snapshot — called whenever this page is reached via
    /// a newly-discovered path.
    pub fn push_history(&mut self, route: Route) {
        self.histories.push(route);
    }

    /// The most recently recorded route, used by `split_page`'s backward
    /// propagation.
    pub fn latest_history(&self) -> Option<&Route> {
        self.histories.last()
    }
}

fn link_payload_bytes(payload: &LinkPayload, strip_anchor_query: bool) -> Vec<u8> {
    match payload {
        LinkPayload::Anchor { href, dom_path } => {
            let href = if strip_anchor_query {
                strip_query(href)
            } else {
                href.as_str()
            };
            format!("A|{dom_path}|{href}").into_bytes()
        }
        LinkPayload::Form {
            method,
            action,
            text_fields,
            textarea_fields,
            select_fields,
        } => format!(
            "F|{method}|{action}|{}|{}|{}",
            text_fields.join(","),
            textarea_fields.join(","),
            select_fields.join(",")
        )
        .into_bytes(),
    }
}

fn compute_content_hash(url: &str, links: &Links, cookies: &[String]) -> u64 {
    let mut parts: Vec<Vec<u8>> = vec![url.as_bytes().to_vec()];
    for (_, link) in links.iter() {
        parts.push(link_payload_bytes(&link.payload, false));
    }
    for cookie in cookies {
        parts.push(cookie.as_bytes().to_vec());
    }
    let refs: Vec<&[u8]> = parts.iter().map(|p| p.as_slice()).collect();
    content_hash(&refs)
}

/// Templatized hash over *stripped* anchor hashes (query strings dropped)
/// plus unmodified form fingerprints and cookies.
fn compute_templatized_hash(links: &Links, cookies: &[String]) -> u64 {
    let mut parts: Vec<Vec<u8>> = Vec::new();
    for (_, link) in links.iter() {
        parts.push(link_payload_bytes(&link.payload, true));
    }
    for cookie in cookies {
        parts.push(cookie.as_bytes().to_vec());
    }
    let refs: Vec<&[u8]> = parts.iter().map(|p| p.as_slice()).collect();
    content_hash(&refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_anchor(href: &str) -> Page {
        Page::new(
            "http://x/item".into(),
            vec![Link::new_anchor(href.into(), "/html/a".into())],
            vec![],
            vec![],
        )
    }

    #[test]
    fn templatized_hash_ignores_anchor_query() {
        let p1 = page_with_anchor("/item?id=1");
        let p2 = page_with_anchor("/item?id=2");
        assert_eq!(p1.templatized_hash, p2.templatized_hash);
    }

    #[test]
    fn content_hash_distinguishes_anchor_query() {
        let p1 = page_with_anchor("/item?id=1");
        let p2 = page_with_anchor("/item?id=2");
        assert_ne!(p1.content_hash, p2.content_hash);
    }

    #[test]
    fn templatized_hash_distinguishes_cookies() {
        let p1 = Page::new("http://x/item".into(), vec![], vec![], vec!["session=a".into()]);
        let p2 = Page::new("http://x/item".into(), vec![], vec![], vec!["session=b".into()]);
        assert_ne!(p1.templatized_hash, p2.templatized_hash);
    }

    #[test]
    fn synthetic_status_page_uses_code_as_url() {
        let page = Page::synthetic_status(404);
        assert_eq!(page.url, "404");
        assert_eq!(page.status, 404);
    }
}
