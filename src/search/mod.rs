use std::time::{Duration, Instant};

use crate::config::SearchOptions;
use crate::lookup::{SongLookup, TrackHit};

const MIN_QUERY_CHARS: usize = 2;

/// Debounced song search for one input box. Keystrokes arrive through
/// [`SearchBox::on_query_change`]; the owning event loop calls
/// [`SearchBox::poll`] until the settle window elapses, at which point
/// exactly one lookup is issued for the latest query. Lookup failures
/// degrade to an empty suggestion list and never reach the caller.
pub struct SearchBox {
    debounce: Duration,
    result_limit: usize,
    pending: Option<PendingQuery>,
    results: Vec<TrackHit>,
    selected: Option<TrackHit>,
    // Display text of the last selected suggestion. Setting the input to
    // the chosen title re-fires the change handler; this sentinel keeps
    // that echo from searching again. Compared by exact equality.
    suppress_query: Option<String>,
}

#[derive(Debug)]
struct PendingQuery {
    query: String,
    since: Instant,
}

impl SearchBox {
    pub fn new(options: &SearchOptions) -> Self {
        Self {
            debounce: options.debounce(),
            result_limit: options.result_limit,
            pending: None,
            results: Vec::new(),
            selected: None,
            suppress_query: None,
        }
    }

    /// Feed the current contents of the search input, once per change.
    pub fn on_query_change(&mut self, query: &str) {
        if query.trim().is_empty() {
            self.results.clear();
            self.cancel_pending();
            return;
        }

        if self.suppress_query.as_deref() == Some(query) {
            self.results.clear();
            self.cancel_pending();
            return;
        }
        // The first divergent keystroke re-arms search, so deleting and
        // retyping a selected title manually searches again.
        self.suppress_query = None;
        self.selected = None;

        if query.chars().count() < MIN_QUERY_CHARS {
            self.results.clear();
            self.cancel_pending();
            return;
        }

        self.restart_timer(query);
    }

    /// Issue the lookup once the settle window has elapsed. Returns true
    /// when the result list was refreshed (possibly to empty).
    pub fn poll(&mut self, lookup: &dyn SongLookup) -> bool {
        let ready = self
            .pending
            .as_ref()
            .map(|pending| pending.since.elapsed() >= self.debounce)
            .unwrap_or(false);
        if !ready {
            return false;
        }
        let pending = self.pending.take().expect("pending query checked above");
        match lookup.search(&pending.query, self.result_limit) {
            Ok(hits) => self.results = hits,
            Err(err) => {
                tracing::warn!(?err, query = %pending.query, "song search failed");
                self.results.clear();
            }
        }
        true
    }

    /// Record a chosen suggestion: remembers the track for the compose
    /// flow and arms the suppress sentinel with its display title.
    pub fn select(&mut self, hit: TrackHit) {
        self.suppress_query = Some(hit.track_name.clone());
        self.selected = Some(hit);
        self.results.clear();
        self.cancel_pending();
    }

    pub fn results(&self) -> &[TrackHit] {
        &self.results
    }

    pub fn selected(&self) -> Option<&TrackHit> {
        self.selected.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn restart_timer(&mut self, query: &str) {
        self.cancel_pending();
        self.pending = Some(PendingQuery {
            query: query.to_string(),
            since: Instant::now(),
        });
    }

    fn cancel_pending(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupError;
    use std::cell::RefCell;

    struct RecordingLookup {
        terms: RefCell<Vec<String>>,
        fail: bool,
    }

    impl RecordingLookup {
        fn new() -> Self {
            Self {
                terms: RefCell::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                terms: RefCell::new(Vec::new()),
                fail: true,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.terms.borrow().clone()
        }
    }

    impl SongLookup for RecordingLookup {
        fn search(&self, term: &str, _limit: usize) -> Result<Vec<TrackHit>, LookupError> {
            self.terms.borrow_mut().push(term.to_string());
            if self.fail {
                return Err(LookupError::Status(502));
            }
            Ok(vec![hit(term)])
        }
    }

    fn hit(title: &str) -> TrackHit {
        TrackHit {
            track_id: 1,
            track_name: title.to_string(),
            artist_name: "Artist".to_string(),
            artwork_url: None,
            preview_url: None,
        }
    }

    fn immediate_box() -> SearchBox {
        SearchBox::new(&SearchOptions {
            debounce_ms: 0,
            result_limit: 5,
        })
    }

    #[test]
    fn rapid_keystrokes_issue_one_lookup_for_the_latest_query() {
        let lookup = RecordingLookup::new();
        let mut search = immediate_box();

        search.on_query_change("a");
        search.on_query_change("ab");
        search.on_query_change("abc");
        assert!(search.poll(&lookup));
        assert!(!search.poll(&lookup));

        assert_eq!(lookup.calls(), vec!["abc"]);
        assert_eq!(search.results().len(), 1);
    }

    #[test]
    fn single_char_query_clears_results_without_a_lookup() {
        let lookup = RecordingLookup::new();
        let mut search = immediate_box();

        search.on_query_change("ab");
        assert!(search.poll(&lookup));
        assert!(!search.results().is_empty());

        search.on_query_change("a");
        assert!(!search.poll(&lookup));
        assert!(search.results().is_empty());
        assert_eq!(lookup.calls(), vec!["ab"]);
    }

    #[test]
    fn whitespace_query_cancels_the_pending_timer() {
        let lookup = RecordingLookup::new();
        let mut search = immediate_box();

        search.on_query_change("lucky");
        search.on_query_change("   ");
        assert!(!search.poll(&lookup));
        assert!(lookup.calls().is_empty());
    }

    #[test]
    fn unsettled_timer_does_not_fire() {
        let lookup = RecordingLookup::new();
        let mut search = SearchBox::new(&SearchOptions {
            debounce_ms: 60_000,
            result_limit: 5,
        });

        search.on_query_change("lucky");
        assert!(search.has_pending());
        assert!(!search.poll(&lookup));
        assert!(lookup.calls().is_empty());
    }

    #[test]
    fn selection_echo_is_suppressed_but_manual_retype_searches() {
        let lookup = RecordingLookup::new();
        let mut search = immediate_box();

        search.on_query_change("lucky");
        search.poll(&lookup);
        let chosen = search.results()[0].clone();
        search.select(chosen);
        assert!(search.selected().is_some());

        // The UI sets the input to the chosen title, re-firing the
        // change handler. No new lookup.
        search.on_query_change("lucky");
        assert!(!search.poll(&lookup));
        assert_eq!(lookup.calls(), vec!["lucky"]);
        assert!(search.selected().is_some());

        // User deletes a character, then retypes the full title before
        // the settle window for "luck" is ever polled.
        search.on_query_change("luck");
        search.on_query_change("lucky");
        assert!(search.poll(&lookup));
        assert_eq!(lookup.calls(), vec!["lucky", "lucky"]);
    }

    #[test]
    fn typing_after_selection_resets_the_selected_track() {
        let lookup = RecordingLookup::new();
        let mut search = immediate_box();

        search.on_query_change("lucky");
        search.poll(&lookup);
        let chosen = search.results()[0].clone();
        search.select(chosen);

        search.on_query_change("stranger");
        assert!(search.selected().is_none());
    }

    #[test]
    fn lookup_failure_publishes_an_empty_list() {
        let lookup = RecordingLookup::failing();
        let mut search = immediate_box();

        search.on_query_change("lucky");
        assert!(search.poll(&lookup));
        assert!(search.results().is_empty());
        assert_eq!(lookup.calls(), vec!["lucky"]);
    }

    #[test]
    fn selection_clears_results_and_pending() {
        let lookup = RecordingLookup::new();
        let mut search = immediate_box();

        search.on_query_change("lucky");
        search.poll(&lookup);
        let chosen = search.results()[0].clone();
        search.on_query_change("lucky s");
        search.select(chosen);

        assert!(search.results().is_empty());
        assert!(!search.has_pending());
    }
}
