// Keeps the address bar, the search form and the last fetched parameters in step,
// and decides when a fetch is actually due

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::api::{AccommodationApi, ApiError};
use crate::config::ClientConfig;
use crate::results::SearchResults;
use crate::search_params::{
    parse_from_query, query_from_url, SearchForm, SearchParams, ValidationErrors,
};
use crate::store::{Action, AppStore};

/// Permission to run one fetch. Only the most recently issued ticket can
/// land its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    params: SearchParams,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Applied,
    Failed(ApiError),
    // Superseded by a newer parameter set; the result was dropped
    Stale,
}

#[derive(Debug, Default)]
pub struct SearchStateSync {
    form: SearchForm,
    current: Option<SearchParams>,
    generation: u64,
    in_flight: Option<FetchTicket>,
    loaded: Option<SearchParams>,
    results: Option<SearchResults>,
    last_error: Option<ApiError>,
}

impl SearchStateSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SearchParams> {
        self.current.as_ref()
    }

    pub fn form(&self) -> &SearchForm {
        &self.form
    }

    // Form edits stay local until submitted
    pub fn form_mut(&mut self) -> &mut SearchForm {
        &mut self.form
    }

    pub fn results(&self) -> Option<&SearchResults> {
        self.results.as_ref()
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn results_are_current(&self) -> bool {
        self.loaded.is_some() && self.loaded == self.current
    }

    /// Initial-load path: seeds the form from the query and, when the query
    /// holds a complete parameter set, adopts it and asks for a fetch.
    pub fn load_from_query(&mut self, query: &HashMap<String, String>) -> Option<FetchTicket> {
        self.form = SearchForm::from_query(query);

        let Some(params) = parse_from_query(query) else {
            debug!("Query does not hold a complete search, not fetching");
            return None;
        };
        self.on_params_change(params)
    }

    /// Validates and adopts `params`. On failure nothing changes.
    pub fn submit(&mut self, params: SearchParams) -> Result<SearchParams, ValidationErrors> {
        if let Err(errors) = params.validate() {
            debug!("Search rejected, invalid fields: {:?}", errors.fields());
            return Err(errors);
        }

        if self.current.as_ref() != Some(&params) {
            // A fetch for the old parameters can no longer land
            self.generation += 1;
            self.in_flight = None;
        }
        self.form = SearchForm::from(&params);
        self.current = Some(params.clone());
        Ok(params)
    }

    pub fn submit_form(&mut self) -> Result<Option<FetchTicket>, ValidationErrors> {
        let params = self.form.to_params()?;
        let params = self.submit(params)?;
        Ok(self.on_params_change(params))
    }

    /// Issues a ticket once per distinct complete parameter set. Parameters
    /// already in flight, or whose results are already held, do not refetch.
    pub fn on_params_change(&mut self, params: SearchParams) -> Option<FetchTicket> {
        if params.validate().is_err() {
            return None;
        }
        self.current = Some(params.clone());

        if self
            .in_flight
            .as_ref()
            .map_or(false, |ticket| ticket.params == params)
        {
            debug!("Fetch for {} already in flight", params.location);
            return None;
        }

        // Anything still in flight is for other parameters now
        self.generation += 1;
        self.in_flight = None;

        if self.loaded.as_ref() == Some(&params) {
            debug!("Results for {} already loaded", params.location);
            return None;
        }

        let ticket = FetchTicket {
            generation: self.generation,
            params,
        };
        self.in_flight = Some(ticket.clone());
        info!(
            "Fetching accommodations in {} ({} to {}), generation {}",
            ticket.params.location, ticket.params.arrival, ticket.params.departure, ticket.generation
        );
        Some(ticket)
    }

    /// Releases a ticket whose fetch never completed. A newer ticket is left
    /// alone.
    pub fn abandon(&mut self, ticket: &FetchTicket) {
        if self.in_flight.as_ref() == Some(ticket) {
            debug!(
                "Fetch for {} abandoned (generation {})",
                ticket.params.location, ticket.generation
            );
            self.in_flight = None;
        }
    }

    /// Lands a fetch result, unless a newer parameter set has taken over.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<SearchResults, ApiError>,
    ) -> FetchOutcome {
        let is_latest = self.in_flight.as_ref() == Some(ticket)
            && self.current.as_ref() == Some(&ticket.params);
        if !is_latest {
            debug!(
                "Discarding stale results for {} (generation {})",
                ticket.params.location, ticket.generation
            );
            return FetchOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(results) => {
                info!(
                    "Loaded {} accommodations for {}",
                    results.accommodations.len(),
                    ticket.params.location
                );
                self.loaded = Some(ticket.params.clone());
                self.results = Some(results);
                self.last_error = None;
                FetchOutcome::Applied
            }
            Err(e) => {
                warn!("Search for {} failed: {}", ticket.params.location, e);
                self.last_error = Some(e.clone());
                FetchOutcome::Failed(e)
            }
        }
    }
}

// Abandons the ticket if the fetch future is dropped before it completes
struct InFlightGuard<'a> {
    sync: &'a Mutex<SearchStateSync>,
    ticket: &'a FetchTicket,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.sync.lock().abandon(self.ticket);
    }
}

pub struct SearchService<A: AccommodationApi> {
    api: Arc<A>,
    timeout: Duration,
}

impl<A: AccommodationApi> SearchService<A> {
    pub fn new(api: Arc<A>, config: &ClientConfig) -> Self {
        Self {
            api,
            timeout: config.timeout(),
        }
    }

    pub async fn fetch(&self, ticket: &FetchTicket) -> Result<SearchResults, ApiError> {
        tokio::time::timeout(self.timeout, self.api.search(ticket.params()))
            .await
            .map_err(|_| ApiError::Timeout(self.timeout.as_millis() as u64))?
    }
}

/// Drives the sync state against the search API and mirrors adopted
/// parameters into the app store. The lock is never held across a fetch, so
/// a newer submission can supersede one still running.
pub struct SearchSession<A: AccommodationApi> {
    store: Arc<AppStore>,
    sync: Mutex<SearchStateSync>,
    service: SearchService<A>,
}

impl<A: AccommodationApi> SearchSession<A> {
    pub fn new(store: Arc<AppStore>, api: Arc<A>, config: &ClientConfig) -> Self {
        Self {
            store,
            sync: Mutex::new(SearchStateSync::new()),
            service: SearchService::new(api, config),
        }
    }

    pub fn current(&self) -> Option<SearchParams> {
        self.sync.lock().current().cloned()
    }

    pub fn results(&self) -> Option<SearchResults> {
        self.sync.lock().results().cloned()
    }

    pub fn is_fetching(&self) -> bool {
        self.sync.lock().is_fetching()
    }

    pub fn last_error(&self) -> Option<ApiError> {
        self.sync.lock().last_error().cloned()
    }

    pub fn form(&self) -> SearchForm {
        self.sync.lock().form().clone()
    }

    pub fn edit_form(&self, edit: impl FnOnce(&mut SearchForm)) {
        edit(self.sync.lock().form_mut());
    }

    pub fn current_url(&self, base: &Url) -> Option<Url> {
        self.current().map(|params| params.search_url(base))
    }

    /// Navigation to `url`. Returns `None` when no fetch was due.
    pub async fn load_url(&self, url: &Url) -> Option<FetchOutcome> {
        let ticket = self.sync.lock().load_from_query(&query_from_url(url));
        self.dispatch_and_run(ticket).await
    }

    pub async fn submit(
        &self,
        params: SearchParams,
    ) -> Result<Option<FetchOutcome>, ValidationErrors> {
        let ticket = {
            let mut sync = self.sync.lock();
            let params = sync.submit(params)?;
            sync.on_params_change(params)
        };
        Ok(self.dispatch_and_run(ticket).await)
    }

    pub async fn submit_form(&self) -> Result<Option<FetchOutcome>, ValidationErrors> {
        let ticket = self.sync.lock().submit_form()?;
        Ok(self.dispatch_and_run(ticket).await)
    }

    async fn dispatch_and_run(&self, ticket: Option<FetchTicket>) -> Option<FetchOutcome> {
        if let Some(params) = self.current() {
            self.store.dispatch(Action::SetSearchParams(params));
        }
        match ticket {
            Some(ticket) => Some(self.run(ticket).await),
            None => None,
        }
    }

    async fn run(&self, ticket: FetchTicket) -> FetchOutcome {
        let in_flight = InFlightGuard {
            sync: &self.sync,
            ticket: &ticket,
        };
        let result = self.service.fetch(&ticket).await;
        std::mem::forget(in_flight);

        self.sync.lock().complete(&ticket, result)
    }
}
