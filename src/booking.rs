// Booking mode resolution and the group-booking checkout flow

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, GroupBookingApi};
use crate::config::ClientConfig;
use crate::store::{Action, AppStore};

pub const BOOKING_FAILED_MESSAGE: &str = "Something went wrong with your booking. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferIdAndQuantity {
    pub offer_id: String,
    pub quantity: u32,
}

impl OfferIdAndQuantity {
    pub fn new(offer_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            offer_id: offer_id.into(),
            quantity,
        }
    }
}

pub type OfferSelection = Vec<OfferIdAndQuantity>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingMode {
    Group,
    Normal,
    Undetermined,
}

pub fn total_room_count(offers: &[OfferIdAndQuantity]) -> u32 {
    offers
        .iter()
        .fold(0u32, |total, offer| total.saturating_add(offer.quantity))
}

/// `Group` once the requested rooms exceed `group_room_threshold`.
/// No selection at all leaves the mode undetermined.
pub fn resolve_mode(offers: Option<&[OfferIdAndQuantity]>, group_room_threshold: u32) -> BookingMode {
    match offers {
        None => BookingMode::Undetermined,
        Some(offers) if total_room_count(offers) > group_room_threshold => BookingMode::Group,
        Some(_) => BookingMode::Normal,
    }
}

/// Organizer contact details. Anything beyond the named fields (invoice
/// data and the like) is carried through to the booking API untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInfo {
    #[serde(default)]
    pub offers: Option<OfferSelection>,
    #[serde(default)]
    pub guest_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBookingRequest {
    #[serde(flatten)]
    pub organizer: OrganizerInfo,
    pub offers: OfferSelection,
    pub guest_count: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBookingResponse {
    #[serde(default)]
    pub deposit_options: Option<Value>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub request_id: String,
    pub deposit_options: Value,
    pub extra: Map<String, Value>,
}

impl TryFrom<GroupBookingResponse> for BookingConfirmation {
    type Error = ApiError;

    fn try_from(response: GroupBookingResponse) -> Result<Self, Self::Error> {
        let deposit_options = response
            .deposit_options
            .filter(|v| !v.is_null())
            .ok_or_else(|| ApiError::MalformedResponse("missing depositOptions".to_string()))?;
        let request_id = response
            .request_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("missing requestId".to_string()))?;

        Ok(Self {
            request_id,
            deposit_options,
            extra: response.extra,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Missing information to do a booking. Please try again from the beginning")]
    MissingInput,

    #[error("Something went wrong with your booking. Please try again.")]
    BookingRequestFailed {
        #[source]
        source: ApiError,
    },

    #[error("A booking request is already being submitted")]
    SubmissionInProgress,

    #[error("This booking has already been confirmed")]
    AlreadyConfirmed,
}

/// Assembles the request body, or `MissingInput` when organizer info, the
/// offer selection or the guest count is absent. An offer with quantity 0
/// counts as an incomplete selection.
pub fn build_group_booking_request(
    organizer_info: Option<&OrganizerInfo>,
    booking_info: Option<&BookingInfo>,
) -> Result<GroupBookingRequest, BookingError> {
    let organizer = organizer_info.ok_or(BookingError::MissingInput)?;
    let booking = booking_info.ok_or(BookingError::MissingInput)?;
    let offers = booking
        .offers
        .as_ref()
        .filter(|offers| !offers.is_empty() && offers.iter().all(|o| o.quantity > 0))
        .ok_or(BookingError::MissingInput)?;
    let guest_count = booking
        .guest_count
        .filter(|count| *count > 0)
        .ok_or(BookingError::MissingInput)?;

    Ok(GroupBookingRequest {
        organizer: organizer.clone(),
        offers: offers.clone(),
        guest_count,
    })
}

pub async fn submit_group_booking<B: GroupBookingApi + ?Sized>(
    api: &B,
    organizer_info: Option<&OrganizerInfo>,
    booking_info: Option<&BookingInfo>,
    timeout: Duration,
) -> Result<BookingConfirmation, BookingError> {
    let request = build_group_booking_request(organizer_info, booking_info)?;

    let response = tokio::time::timeout(timeout, api.request_group_booking(&request))
        .await
        .map_err(|_| ApiError::Timeout(timeout.as_millis() as u64))
        .and_then(|result| result)
        .map_err(|source| BookingError::BookingRequestFailed { source })?;

    BookingConfirmation::try_from(response)
        .map_err(|source| BookingError::BookingRequestFailed { source })
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutStatus {
    NotStarted,
    InfoCollected,
    Submitting,
    Confirmed(BookingConfirmation),
}

#[derive(Debug, Default)]
struct CheckoutProgress {
    submitting: bool,
    confirmation: Option<BookingConfirmation>,
    last_error: Option<BookingError>,
}

// Clears the submitting flag when a submit future is dropped mid-request
struct SubmittingGuard<'a> {
    progress: &'a Mutex<CheckoutProgress>,
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.progress.lock().submitting = false;
    }
}

/// Checkout for one booking session. Organizer and booking info live in the
/// shared store; submission progress lives here.
pub struct CheckoutSession<B: GroupBookingApi> {
    store: Arc<AppStore>,
    api: Arc<B>,
    group_room_threshold: u32,
    timeout: Duration,
    progress: Mutex<CheckoutProgress>,
}

impl<B: GroupBookingApi> CheckoutSession<B> {
    pub fn new(store: Arc<AppStore>, api: Arc<B>, config: &ClientConfig) -> Self {
        Self {
            store,
            api,
            group_room_threshold: config.group_room_threshold,
            timeout: config.timeout(),
            progress: Mutex::new(CheckoutProgress::default()),
        }
    }

    pub fn booking_mode(&self) -> BookingMode {
        let state = self.store.snapshot();
        resolve_mode(
            state
                .booking_info
                .as_ref()
                .and_then(|info| info.offers.as_deref()),
            self.group_room_threshold,
        )
    }

    pub fn organizer_info(&self) -> Option<OrganizerInfo> {
        self.store.snapshot().organizer_info
    }

    pub fn booking_info(&self) -> Option<BookingInfo> {
        self.store.snapshot().booking_info
    }

    pub fn set_organizer_info(&self, info: OrganizerInfo) {
        self.store.dispatch(Action::SetOrganizerInfo(info));
    }

    pub fn set_booking_info(&self, info: BookingInfo) {
        self.store.dispatch(Action::SetBookingInfo(info));
    }

    pub fn last_error(&self) -> Option<BookingError> {
        self.progress.lock().last_error.clone()
    }

    pub fn status(&self) -> CheckoutStatus {
        let progress = self.progress.lock();
        if let Some(confirmation) = &progress.confirmation {
            return CheckoutStatus::Confirmed(confirmation.clone());
        }
        if progress.submitting {
            return CheckoutStatus::Submitting;
        }
        drop(progress);

        let state = self.store.snapshot();
        if state.organizer_info.is_some() && state.booking_info.is_some() {
            CheckoutStatus::InfoCollected
        } else {
            CheckoutStatus::NotStarted
        }
    }

    /// Sends the group booking request. A failure leaves the collected info in
    /// place so the user can resubmit; nothing is retried automatically.
    pub async fn submit(&self) -> Result<BookingConfirmation, BookingError> {
        {
            let mut progress = self.progress.lock();
            if progress.confirmation.is_some() {
                return Err(BookingError::AlreadyConfirmed);
            }
            if progress.submitting {
                return Err(BookingError::SubmissionInProgress);
            }
            progress.submitting = true;
        }
        let submitting = SubmittingGuard {
            progress: &self.progress,
        };

        let state = self.store.snapshot();
        let mode = self.booking_mode();
        if mode != BookingMode::Group {
            debug!("Submitting group booking request while in {:?} mode", mode);
        }

        let result = submit_group_booking(
            self.api.as_ref(),
            state.organizer_info.as_ref(),
            state.booking_info.as_ref(),
            self.timeout,
        )
        .await;
        // Flag and outcome change under one lock from here
        std::mem::forget(submitting);

        let mut progress = self.progress.lock();
        progress.submitting = false;
        match result {
            Ok(confirmation) => {
                info!(
                    "Group booking request {} accepted",
                    confirmation.request_id
                );
                progress.last_error = None;
                progress.confirmation = Some(confirmation.clone());
                Ok(confirmation)
            }
            Err(BookingError::MissingInput) => {
                error!("Group booking submitted without organizer info, offers or guest count");
                progress.last_error = Some(BookingError::MissingInput);
                Err(BookingError::MissingInput)
            }
            Err(e) => {
                warn!("Group booking request failed: {:?}", e);
                progress.last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}
