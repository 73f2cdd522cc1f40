//! Pure functions turning a URL or DOM path into a canonical, comparable
//! form: the URL/Link Vectorizer.

use sha2::{Digest, Sha256};

/// `(path segments..., sorted query keys, corresponding values)`. If the
/// query string is empty, only the path segments are returned — the
/// second and third elements are empty vecs, distinguishable from "one
/// empty-string key" by being zero-length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlVector {
    pub segments: Vec<String>,
    pub query_keys: Vec<String>,
    pub query_values: Vec<String>,
}

/// Split a URL (or a request's path+query) into its vector form.
pub fn urlvector(path: &str, query: &str) -> UrlVector {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    if query.is_empty() {
        return UrlVector {
            segments,
            query_keys: Vec::new(),
            query_values: Vec::new(),
        };
    }

    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    pairs.sort();

    let query_keys = pairs.iter().map(|(k, _)| k.clone()).collect();
    let query_values = pairs.into_iter().map(|(_, v)| v).collect();

    UrlVector {
        segments,
        query_keys,
        query_values,
    }
}

/// Strip bracketed positional predicates (`[3]`) from an XPath-like DOM
/// path, so siblings with the same tag collapse to the same path.
pub fn canonical_dom_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '[' {
            for c2 in chars.by_ref() {
                if c2 == ']' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// SHA-256 over an arbitrary sequence of byte-representable parts,
/// returned as a stable `u64` (first 8 bytes) for use as a hash-map key.
pub fn content_hash(parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update([0u8]); // separator to avoid part-boundary collisions
    }
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[0..8].try_into().expect("sha256 digest >= 8 bytes"))
}

/// Drop the query string from a raw href, for templatized hashing.
pub fn strip_query(href: &str) -> &str {
    match href.find('?') {
        Some(idx) => &href[..idx],
        None => href,
    }
}
