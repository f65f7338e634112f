// Client-side state for the accommodation search and group checkout flow

pub mod api;
pub mod booking;
pub mod config;
pub mod coordinates;
pub mod results;
pub mod search_params;
pub mod search_sync;
pub mod store;

// Re-export key types for convenience
pub use api::{
    AccommodationApi, ApiError, ClientError, GeocodingApi, GroupBookingApi, HttpApiClient,
};
pub use booking::{
    resolve_mode, BookingConfirmation, BookingError, BookingInfo, BookingMode, CheckoutSession,
    CheckoutStatus, GroupBookingRequest, OfferIdAndQuantity, OrganizerInfo,
};
pub use config::ClientConfig;
pub use coordinates::{CoordinatesCache, LatLng, MapLocator};
pub use results::{Accommodation, FacilityIntroduction, ResultsIndex, SearchResults};
pub use search_params::{parse_from_query, SearchForm, SearchParams, ValidationErrors};
pub use search_sync::{FetchOutcome, FetchTicket, SearchSession, SearchStateSync};
pub use store::{Action, AppState, AppStore};
