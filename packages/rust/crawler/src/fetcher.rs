//! The Fetcher contract: `open`/`click`/`submit`/`back`, plus the default
//! non-JS HTTP+DOM implementation.
//!
//! `EmptyHistory`, `UnsubmittableForm`, and a failing HTTP status are
//! routine, link-scoped signals — not the crate's fatal `StateCrawlError`
//! — so the driver can match on them directly instead of unwinding.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use statecrawl_model::{canonical_dom_path, Link, Page};
use thiserror::Error;
use url::Url;

/// Link-scoped failure from one fetch action. Never wraps a
/// [`statecrawl_shared::StateCrawlError`] — these are expected, routine
/// outcomes the driver absorbs per link, not structural failures.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("back() called with no prior history")]
    EmptyHistory,
    #[error("form has no submit control")]
    UnsubmittableForm,
    #[error("request failed with HTTP {status}")]
    Http { status: u16, page: Page },
    #[error("network error: {0}")]
    Network(String),
}

/// Result of one fetch action: the newly-rendered page, ready for
/// `PageMap::insert`.
#[derive(Debug)]
pub struct FetchedPage {
    pub page: Page,
}

/// A single navigation action the driver can ask a [`Fetcher`] to perform.
#[derive(Debug, Clone)]
pub enum Action {
    Click { href: String },
    Submit {
        method: String,
        action: String,
        params: BTreeMap<String, String>,
    },
    Back,
}

/// Abstraction over "perform one browser action and observe the
/// resulting page". Swappable — the shipped [`HttpFetcher`] is a non-JS
/// HTTP+DOM implementation; a `MockFetcher` replays literal fixture
/// graphs in tests.
#[async_trait::async_trait]
pub trait Fetcher {
    async fn open(&mut self, url: &str) -> Result<FetchedPage, FetchError>;
    async fn perform(&mut self, action: Action) -> Result<FetchedPage, FetchError>;
}

/// Non-JS HTTP client backed by `reqwest` + `scraper`. Cookies persist
/// for the lifetime of the fetcher via `reqwest`'s own cookie jar.
pub struct HttpFetcher {
    client: Client,
    history: Vec<Url>,
    current: Option<Url>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, request_timeout_secs: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            history: Vec::new(),
            current: None,
        })
    }

    async fn fetch(&mut self, url: Url) -> Result<FetchedPage, FetchError> {
        tracing::debug!(%url, "fetching page");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "request failed");
            return Err(FetchError::Http {
                status: status.as_u16(),
                page: Page::synthetic_status(status.as_u16()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("{url}: body read failed: {e}")))?;

        let doc = Html::parse_document(&body);
        let (anchors, forms) = extract_links(&doc, &url);
        let page = Page::with_status(url.to_string(), anchors, forms, Vec::new(), status.as_u16());

        self.history.push(url.clone());
        self.current = Some(url);

        Ok(FetchedPage { page })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn open(&mut self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::Network(format!("{url}: {e}")))?;
        self.history.clear();
        self.fetch(parsed).await
    }

    async fn perform(&mut self, action: Action) -> Result<FetchedPage, FetchError> {
        match action {
            Action::Click { href } => {
                let base = self
                    .current
                    .clone()
                    .ok_or(FetchError::EmptyHistory)?;
                let target = base
                    .join(&href)
                    .map_err(|e| FetchError::Network(format!("{href}: {e}")))?;
                self.fetch(target).await
            }
            Action::Submit { method, action, params } => {
                let base = self
                    .current
                    .clone()
                    .ok_or(FetchError::EmptyHistory)?;
                let target = base
                    .join(&action)
                    .map_err(|e| FetchError::Network(format!("{action}: {e}")))?;

                if method.eq_ignore_ascii_case("get") {
                    let mut target = target;
                    {
                        let mut qp = target.query_pairs_mut();
                        for (k, v) in &params {
                            qp.append_pair(k, v);
                        }
                    }
                    self.fetch(target).await
                } else {
                    tracing::debug!(%target, "submitting form");
                    let response = self
                        .client
                        .post(target.clone())
                        .form(&params)
                        .send()
                        .await
                        .map_err(|e| FetchError::Network(format!("{target}: {e}")))?;

                    let status = response.status();
                    if !status.is_success() {
                        return Err(FetchError::Http {
                            status: status.as_u16(),
                            page: Page::synthetic_status(status.as_u16()),
                        });
                    }
                    let body = response
                        .text()
                        .await
                        .map_err(|e| FetchError::Network(format!("{target}: body read failed: {e}")))?;
                    let doc = Html::parse_document(&body);
                    let (anchors, forms) = extract_links(&doc, &target);
                    let page = Page::with_status(target.to_string(), anchors, forms, Vec::new(), status.as_u16());
                    self.history.push(target.clone());
                    self.current = Some(target);
                    Ok(FetchedPage { page })
                }
            }
            Action::Back => {
                self.history.pop().ok_or(FetchError::EmptyHistory)?;
                let Some(&prev) = self.history.last() else {
                    return Err(FetchError::EmptyHistory);
                };
                let prev = prev.clone();
                self.fetch(prev).await
            }
        }
    }
}

/// `<a href>` for anchors, `<form>` with a recognized submit control for
/// forms. A form with no `<input type=submit>`/`<input type=image>`/
/// `<button type=submit>` is not extracted as a traversable link at all —
/// `UnsubmittableForm` only fires when the driver submits a form whose
/// control disappeared between extraction and submission (e.g. a
/// JS-toggled control); the common case is filtered out here.
fn extract_links(doc: &Html, base: &Url) -> (Vec<Link>, Vec<Link>) {
    let mut anchors = Vec::new();
    let anchor_sel = Selector::parse("a[href]").expect("static selector");
    for el in doc.select(&anchor_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let mut resolved = resolved;
        resolved.set_fragment(None);
        let dom_path = canonical_dom_path(&element_path(&el));
        anchors.push(Link::new_anchor(resolved.to_string(), dom_path));
    }

    let mut forms = Vec::new();
    let form_sel = Selector::parse("form").expect("static selector");
    let submit_sel = Selector::parse("input[type=submit], input[type=image], button[type=submit]")
        .expect("static selector");
    for form_el in doc.select(&form_sel) {
        if form_el.select(&submit_sel).next().is_none() {
            continue;
        }
        let method = form_el
            .value()
            .attr("method")
            .unwrap_or("get")
            .to_lowercase();
        let action = form_el.value().attr("action").unwrap_or("").to_string();
        let action = base
            .join(&action)
            .map(|u| u.to_string())
            .unwrap_or(action);

        let mut text_fields = Vec::new();
        let mut textarea_fields = Vec::new();
        let mut select_fields = Vec::new();

        let input_sel = Selector::parse("input[name]").expect("static selector");
        for input in form_el.select(&input_sel) {
            let ty = input.value().attr("type").unwrap_or("text");
            if matches!(ty, "submit" | "image" | "button" | "reset") {
                continue;
            }
            if let Some(name) = input.value().attr("name") {
                text_fields.push(name.to_string());
            }
        }
        let textarea_sel = Selector::parse("textarea[name]").expect("static selector");
        for el in form_el.select(&textarea_sel) {
            if let Some(name) = el.value().attr("name") {
                textarea_fields.push(name.to_string());
            }
        }
        let select_sel = Selector::parse("select[name]").expect("static selector");
        for el in form_el.select(&select_sel) {
            if let Some(name) = el.value().attr("name") {
                select_fields.push(name.to_string());
            }
        }

        forms.push(Link::new_form(method, action, text_fields, textarea_fields, select_fields));
    }

    (anchors, forms)
}

/// A coarse XPath-like path for an element, built from tag names and
/// sibling position — good enough for `canonical_dom_path` to collapse.
fn element_path(el: &scraper::ElementRef) -> String {
    let mut segments = Vec::new();
    let mut node = Some(*el);
    while let Some(n) = node {
        let index = n
            .prev_siblings()
            .filter_map(scraper::ElementRef::wrap)
            .filter(|s| s.value().name() == n.value().name())
            .count();
        segments.push(format!("{}[{}]", n.value().name(), index));
        node = n.parent().and_then(scraper::ElementRef::wrap);
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}
