// Application state container with a single reducing entry point

use parking_lot::RwLock;
use tracing::debug;

use crate::booking::{BookingInfo, OrganizerInfo};
use crate::config::DEFAULT_BASE_CURRENCY;
use crate::search_params::SearchParams;

#[derive(Debug, Clone, PartialEq)]
pub struct UserSettings {
    pub preferred_currency_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub search_params: Option<SearchParams>,
    pub selected_facility_id: Option<String>,
    pub organizer_info: Option<OrganizerInfo>,
    pub booking_info: Option<BookingInfo>,
    pub user_settings: UserSettings,
    base_currency_code: String,
}

impl AppState {
    pub fn new(base_currency_code: impl Into<String>) -> Self {
        let base_currency_code = base_currency_code.into();
        Self {
            search_params: None,
            selected_facility_id: None,
            organizer_info: None,
            booking_info: None,
            user_settings: UserSettings {
                preferred_currency_code: base_currency_code.clone(),
            },
            base_currency_code,
        }
    }

    pub fn base_currency_code(&self) -> &str {
        &self.base_currency_code
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_CURRENCY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetSearchParams(SearchParams),
    SetSelectedFacilityId(Option<String>),
    SetOrganizerInfo(OrganizerInfo),
    SetBookingInfo(BookingInfo),
    // None falls back to the base currency: a currency is always set
    SetPreferredCurrency(Option<String>),
    ResetCheckout,
}

pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::SetSearchParams(params) => {
            // A new search invalidates the facility picked from the old results
            if next.search_params.as_ref() != Some(&params) {
                next.selected_facility_id = None;
            }
            next.search_params = Some(params);
        }
        Action::SetSelectedFacilityId(id) => next.selected_facility_id = id,
        Action::SetOrganizerInfo(info) => next.organizer_info = Some(info),
        Action::SetBookingInfo(info) => next.booking_info = Some(info),
        Action::SetPreferredCurrency(code) => {
            next.user_settings.preferred_currency_code = code
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| next.base_currency_code.clone());
        }
        Action::ResetCheckout => {
            next.organizer_info = None;
            next.booking_info = None;
        }
    }
    next
}

/// Shared handle to the application state. `dispatch` is the only writer;
/// readers take a snapshot.
#[derive(Debug, Default)]
pub struct AppStore {
    state: RwLock<AppState>,
}

impl AppStore {
    pub fn new(initial: AppState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    pub fn dispatch(&self, action: Action) {
        debug!("dispatch {:?}", action);
        let mut state = self.state.write();
        let next = reduce(&state, action);
        *state = next;
    }

    pub fn snapshot(&self) -> AppState {
        self.state.read().clone()
    }

    pub fn select_facility(&self, facility_id: Option<&str>) {
        self.dispatch(Action::SetSelectedFacilityId(
            facility_id.map(str::to_string),
        ));
    }
}
