//! The Crawl Driver: the per-step loop that asks a [`Fetcher`] to act,
//! canonicalizes the result through the Page Map, and keeps the
//! navigation log in sync.

use thiserror::Error;

use statecrawl_model::{Link, LinkPayload, LinkRef, NavLog, PageArena, PageId, RecordId};
use statecrawl_pagemap::{link_to, split_page, PageMap};
use statecrawl_shared::{FormFiller, Result as SharedResult, StateCrawlError};

use crate::fetcher::{Action, FetchError, Fetcher};
use crate::path::find_path_to_unvisited;

/// Outcome of one fatal (non-absorbed) driver error.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Invariant(#[from] StateCrawlError),
    #[error("fetcher reported an unexpected error: {0}")]
    Fetch(#[from] FetchError),
}

/// Result of one `step()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The crawl can keep going.
    Continued,
    /// Unvisited is empty, or the crawl ran out of history to back up
    /// through — this start URL's crawl is over.
    Done,
}

/// Drives one crawl from a single start URL against a [`Fetcher`],
/// threading the arena, page map, and navigation log through each step.
pub struct CrawlDriver<F: Fetcher> {
    fetcher: F,
    arena: PageArena,
    pagemap: PageMap,
    navlog: NavLog,
    form_filler: FormFiller,
    cursor: PageId,
    cursor_record: RecordId,
}

impl<F: Fetcher> CrawlDriver<F> {
    /// Fetch `start_url` and seed the navigation log. The returned driver
    /// is positioned at the start page, ready for `step()`.
    pub async fn open(
        mut fetcher: F,
        start_url: &str,
        similarity_join_threshold: usize,
        form_filler: FormFiller,
    ) -> Result<Self, DriverError> {
        let mut arena = PageArena::new();
        let mut pagemap = PageMap::new(similarity_join_threshold);

        let fetched = fetcher.open(start_url).await?;
        let page_id = pagemap.insert(&mut arena, fetched.page);

        let mut navlog = NavLog::new();
        let cursor_record = navlog.open(page_id);

        Ok(Self {
            fetcher,
            arena,
            pagemap,
            navlog,
            form_filler,
            cursor: page_id,
            cursor_record,
        })
    }

    pub fn arena(&self) -> &PageArena {
        &self.arena
    }

    pub fn navlog(&self) -> &NavLog {
        &self.navlog
    }

    pub fn pagemap(&self) -> &PageMap {
        &self.pagemap
    }

    /// Run the crawl to completion, one `step()` at a time.
    pub async fn run(&mut self) -> Result<(), DriverError> {
        loop {
            if self.step().await? == StepOutcome::Done {
                return Ok(());
            }
        }
    }

    /// One iteration of the driver's loop (spec's crawl-driver steps
    /// 1-6): decide an action, perform it, canonicalize the result, and
    /// update bookkeeping.
    pub async fn step(&mut self) -> Result<StepOutcome, DriverError> {
        let via = self.navlog.get(self.cursor_record).via;
        let action = self.process(self.cursor, via);

        match action {
            Some(link_ref) => match self.traverse(self.cursor, link_ref).await? {
                TraverseOutcome::Advanced => {}
                TraverseOutcome::Absorbed => {}
            },
            None => {
                if self.pagemap.unvisited().is_empty() {
                    return Ok(StepOutcome::Done);
                }
                match find_path_to_unvisited(&self.arena, self.pagemap.unvisited(), self.cursor) {
                    Some(path) => {
                        for (link_ref, _expected) in path {
                            if self.traverse(self.cursor, link_ref).await? == TraverseOutcome::Absorbed {
                                break;
                            }
                        }
                    }
                    None => {
                        if self.back().await? == StepOutcome::Done {
                            return Ok(StepOutcome::Done);
                        }
                    }
                }
            }
        }

        Ok(StepOutcome::Continued)
    }

    /// Step 1: if `page`'s bucket is still `AGGREG_PENDING`, mark the
    /// link we arrived here via as `ignore` on the predecessor (forcing
    /// a `back`) and return no action. Otherwise return the first
    /// unvisited link.
    fn process(&mut self, page: PageId, via: Option<(PageId, LinkRef)>) -> Option<LinkRef> {
        if self.arena.get(page).aggregation == statecrawl_model::Aggregation::AggregPending {
            if let Some((pred, pred_link)) = via {
                self.pagemap.mark_ignore(&mut self.arena, pred, pred_link);
            }
            None
        } else {
            self.arena.get(page).links.first_unvisited()
        }
    }

    /// Follow `link_ref` from `from`: perform the fetch, canonicalize
    /// the result, and keep the page map / navigation log in sync.
    /// Handles the §4.4 closing note: when the resolved target
    /// disagrees with a previously-recorded one, either overwrite (one
    /// prior visit) or recursively split (more than one).
    async fn traverse(&mut self, from: PageId, link_ref: LinkRef) -> Result<TraverseOutcome, DriverError> {
        let link = self.arena.get(from).links.get(link_ref).clone();
        let action = build_action(&link, &self.form_filler);

        let fetched = match self.fetcher.perform(action).await {
            Ok(fetched) => fetched,
            Err(FetchError::Http { status: _, page }) => crate::fetcher::FetchedPage { page },
            Err(FetchError::UnsubmittableForm) | Err(FetchError::Network(_)) => {
                tracing::debug!(?link_ref, "absorbing routine fetch failure, marking link ignore");
                self.pagemap.mark_ignore(&mut self.arena, from, link_ref);
                return Ok(TraverseOutcome::Absorbed);
            }
            Err(e @ FetchError::EmptyHistory) => return Err(e.into()),
        };

        let new_page_id = self.pagemap.insert(&mut self.arena, fetched.page);

        let old_target = self.arena.get(from).links.get(link_ref).target;
        let prior_nvisits = self.arena.get(from).links.get(link_ref).nvisits;

        let effective_from = match old_target {
            Some(old) if old != new_page_id => {
                if prior_nvisits <= 1 {
                    link_to(&mut self.arena, from, link_ref, new_page_id);
                    from
                } else {
                    split_page(&mut self.arena, &mut self.pagemap, from, link_ref, new_page_id)?
                }
            }
            _ => from,
        };

        // split_page already resolved the clone's own link and bumped
        // its nvisits; every other path still needs both done here.
        let already_resolved_by_split = effective_from != from;
        if !already_resolved_by_split {
            link_to(&mut self.arena, effective_from, link_ref, new_page_id);
            self.arena.get_mut(effective_from).links.get_mut(link_ref).nvisits += 1;
        }
        self.pagemap.unvisited_mut().remove(effective_from, link_ref);

        self.arena
            .get_mut(new_page_id)
            .push_history(vec![(effective_from, link_ref)]);

        let new_record = self
            .navlog
            .navigate(self.cursor_record, (effective_from, link_ref), new_page_id);

        self.pagemap.check_aggregatable(&mut self.arena, effective_from);

        self.cursor = new_page_id;
        self.cursor_record = new_record;

        Ok(TraverseOutcome::Advanced)
    }

    /// Pop one step of history. `EmptyHistory` terminates this start
    /// URL's crawl (spec §7).
    ///
    /// A `back` record's own `prev` points at the chronologically
    /// preceding record (the forward step we just came from), not at
    /// an earlier point in history — so repeated `back()`s resolve
    /// through the `backto` chain to find the forward frame we're
    /// virtually sitting on before looking at *its* `prev`.
    async fn back(&mut self) -> Result<StepOutcome, DriverError> {
        let forward_id = self.virtual_forward_record();
        let Some(backto_id) = self.navlog.get(forward_id).prev else {
            return Ok(StepOutcome::Done);
        };

        match self.fetcher.perform(Action::Back).await {
            Ok(_) => {}
            Err(FetchError::EmptyHistory) => return Ok(StepOutcome::Done),
            Err(e) => return Err(e.into()),
        }

        self.cursor = self.navlog.get(backto_id).page;
        self.cursor_record = self.navlog.back(self.cursor_record, backto_id);
        Ok(StepOutcome::Continued)
    }

    /// The forward (`open`/`navigate`) record the cursor is virtually
    /// positioned on: itself, unless the cursor is already a `back`
    /// record, in which case the record it backed onto.
    fn virtual_forward_record(&self) -> RecordId {
        let record = self.navlog.get(self.cursor_record);
        if record.is_back {
            record.backto.expect("is_back record always carries backto")
        } else {
            self.cursor_record
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraverseOutcome {
    Advanced,
    Absorbed,
}

fn build_action(link: &Link, form_filler: &FormFiller) -> Action {
    match &link.payload {
        LinkPayload::Anchor { href, .. } => Action::Click { href: href.clone() },
        LinkPayload::Form { method, action, .. } => {
            let field_names = link.payload.field_names();
            let params = form_filler.get(field_names).cloned().unwrap_or_default();
            Action::Submit {
                method: method.clone(),
                action: action.clone(),
                params,
            }
        }
    }
}

/// Surfaces `StateCrawlError`s produced while driving so `apps/cli` can
/// report them with `color_eyre` without depending on this crate's
/// `DriverError` type directly.
pub fn into_shared_result<T>(result: Result<T, DriverError>) -> SharedResult<T> {
    result.map_err(|e| match e {
        DriverError::Invariant(inner) => inner,
        DriverError::Fetch(fetch_err) => StateCrawlError::invariant(fetch_err.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchedPage;
    use statecrawl_model::{Aggregation, Page};
    use std::collections::VecDeque;

    /// In-memory fetcher replaying a literal fixture graph: a map from
    /// URL to canned HTML, navigated with a simple stack for `back()`.
    struct MockFetcher {
        pages: std::collections::HashMap<String, (Vec<Link>, Vec<Link>)>,
        history: Vec<String>,
        current: Option<String>,
        queued_status: VecDeque<(String, u16)>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                pages: std::collections::HashMap::new(),
                history: Vec::new(),
                current: None,
                queued_status: VecDeque::new(),
            }
        }

        fn with_page(mut self, url: &str, anchors: Vec<Link>, forms: Vec<Link>) -> Self {
            self.pages.insert(url.to_string(), (anchors, forms));
            self
        }

        fn page_for(&self, url: &str) -> Page {
            let (anchors, forms) = self.pages.get(url).cloned().unwrap_or_default();
            Page::new(url.to_string(), anchors, forms, vec![])
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for MockFetcher {
        async fn open(&mut self, url: &str) -> Result<FetchedPage, FetchError> {
            self.history.clear();
            self.history.push(url.to_string());
            self.current = Some(url.to_string());
            Ok(FetchedPage { page: self.page_for(url) })
        }

        async fn perform(&mut self, action: Action) -> Result<FetchedPage, FetchError> {
            match action {
                Action::Click { href } => {
                    if let Some(status) = self.status_for(&href) {
                        return Err(FetchError::Http {
                            status,
                            page: Page::synthetic_status(status),
                        });
                    }
                    self.history.push(href.clone());
                    self.current = Some(href.clone());
                    Ok(FetchedPage { page: self.page_for(&href) })
                }
                Action::Submit { action, .. } => {
                    if !self.pages.contains_key(&action) {
                        return Err(FetchError::UnsubmittableForm);
                    }
                    self.history.push(action.clone());
                    self.current = Some(action.clone());
                    Ok(FetchedPage { page: self.page_for(&action) })
                }
                Action::Back => {
                    self.history.pop().ok_or(FetchError::EmptyHistory)?;
                    let prev = self.history.last().cloned().ok_or(FetchError::EmptyHistory)?;
                    self.current = Some(prev.clone());
                    Ok(FetchedPage { page: self.page_for(&prev) })
                }
            }
        }
    }

    impl MockFetcher {
        fn status_for(&self, url: &str) -> Option<u16> {
            self.queued_status.iter().find(|(u, _)| u == url).map(|(_, s)| *s)
        }
    }

    #[tokio::test]
    async fn trivial_singleton_terminates_immediately() {
        let fetcher = MockFetcher::new().with_page("/a", vec![], vec![]);
        let mut driver = CrawlDriver::open(fetcher, "/a", 3, FormFiller::new()).await.unwrap();
        driver.run().await.unwrap();
        assert_eq!(driver.arena().len(), 1);
        assert_eq!(driver.navlog().len(), 1);
    }

    #[tokio::test]
    async fn linear_chain_visits_every_page_and_backs_out() {
        let fetcher = MockFetcher::new()
            .with_page("/a", vec![Link::new_anchor("/b".into(), "/html/a".into())], vec![])
            .with_page("/b", vec![Link::new_anchor("/c".into(), "/html/a".into())], vec![])
            .with_page("/c", vec![], vec![]);

        let mut driver = CrawlDriver::open(fetcher, "/a", 3, FormFiller::new()).await.unwrap();
        driver.run().await.unwrap();

        assert_eq!(driver.arena().len(), 3);
        assert!(driver.pagemap().unvisited().is_empty());
    }

    #[tokio::test]
    async fn http_error_produces_synthetic_placeholder_node() {
        let mut fetcher = MockFetcher::new()
            .with_page("/a", vec![Link::new_anchor("/missing".into(), "/html/a".into())], vec![]);
        fetcher.queued_status.push_back(("/missing".to_string(), 404));

        let mut driver = CrawlDriver::open(fetcher, "/a", 3, FormFiller::new()).await.unwrap();
        driver.run().await.unwrap();

        assert!(driver.arena().iter().any(|(_, p)| p.url == "404"));
    }

    #[tokio::test]
    async fn unsubmittable_form_is_ignored_and_crawl_continues() {
        let fetcher = MockFetcher::new().with_page(
            "/a",
            vec![Link::new_anchor("/b".into(), "/html/a".into())],
            vec![Link::new_form(
                "post".into(),
                "/nonexistent".into(),
                vec!["q".into()],
                vec![],
                vec![],
            )],
        ).with_page("/b", vec![], vec![]);

        let mut driver = CrawlDriver::open(fetcher, "/a", 3, FormFiller::new()).await.unwrap();
        driver.run().await.unwrap();

        assert!(driver.pagemap().unvisited().is_empty());
        assert_eq!(driver.arena().len(), 2);
    }

    #[tokio::test]
    async fn four_identically_shaped_siblings_aggregate_into_one_representative() {
        let back_anchor = || Link::new_anchor("/a".into(), "/html/back".into());
        let fetcher = MockFetcher::new()
            .with_page(
                "/a",
                vec![
                    Link::new_anchor("/item?id=0".into(), "/html/item0".into()),
                    Link::new_anchor("/item?id=1".into(), "/html/item1".into()),
                    Link::new_anchor("/item?id=2".into(), "/html/item2".into()),
                    Link::new_anchor("/item?id=3".into(), "/html/item3".into()),
                ],
                vec![],
            )
            .with_page("/item?id=0", vec![back_anchor()], vec![])
            .with_page("/item?id=1", vec![back_anchor()], vec![])
            .with_page("/item?id=2", vec![back_anchor()], vec![])
            .with_page("/item?id=3", vec![back_anchor()], vec![]);

        let mut driver = CrawlDriver::open(fetcher, "/a", 3, FormFiller::new()).await.unwrap();
        driver.run().await.unwrap();

        assert!(driver.pagemap().unvisited().is_empty());

        let (item0_id, _) = driver
            .arena()
            .iter()
            .find(|(_, p)| p.url == "/item?id=0")
            .expect("original item page stays in the arena");
        assert_eq!(driver.arena().get(item0_id).aggregation, Aggregation::Aggregated);

        let (a_id, _) = driver.arena().iter().find(|(_, p)| p.url == "/a").unwrap();
        for anchor in &driver.arena().get(a_id).links.anchors {
            assert_eq!(anchor.target, Some(item0_id), "every sibling anchor should collapse onto the representative");
        }
    }

    #[tokio::test]
    async fn link_resolving_to_a_new_target_after_repeat_visits_splits_the_predecessor() {
        let fetcher = MockFetcher::new()
            .with_page("/a", vec![Link::new_anchor("/admin".into(), "/html/admin".into())], vec![])
            .with_page("/admin", vec![], vec![]);

        let mut driver = CrawlDriver::open(fetcher, "/a", 3, FormFiller::new()).await.unwrap();
        let (a_id, _) = driver.arena().iter().find(|(_, p)| p.url == "/a").unwrap();
        let admin_ref = LinkRef::anchor(0);

        driver.traverse(a_id, admin_ref).await.unwrap();
        let deny_id = driver.arena().get(a_id).links.get(admin_ref).target.unwrap();

        driver.traverse(a_id, admin_ref).await.unwrap();
        assert_eq!(driver.arena().get(a_id).links.get(admin_ref).nvisits, 2);
        assert_eq!(driver.arena().get(a_id).aggregation, Aggregation::NotAggreg);

        driver.fetcher.pages.insert(
            "/admin".to_string(),
            (vec![Link::new_anchor("/dashboard".into(), "/html/dash".into())], vec![]),
        );
        driver.traverse(a_id, admin_ref).await.unwrap();

        assert_eq!(driver.arena().get(a_id).aggregation, Aggregation::StatusSplit);
        assert_eq!(driver.arena().get(a_id).links.get(admin_ref).target, Some(deny_id));

        let (clone_id, _) = driver
            .arena()
            .iter()
            .find(|&(id, p)| id != a_id && p.url == "/a")
            .expect("split_page produces a sibling clone of the predecessor");
        assert_eq!(driver.arena().get(clone_id).aggregation, Aggregation::StatusSplit);
        let panel_id = driver.arena().get(clone_id).links.get(admin_ref).target.unwrap();
        assert_ne!(panel_id, deny_id);
    }
}
