// External collaborators: coordinate lookup, accommodation search and group booking.
// Each sits behind an async trait so the state layer never sees transport details.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::booking::{GroupBookingRequest, GroupBookingResponse};
use crate::config::ClientConfig;
use crate::coordinates::PlaceRecord;
use crate::results::SearchResults;
use crate::search_params::SearchParams;

pub const SEARCH_PATH: &str = "/api/hotels/search";
pub const GROUP_BOOKING_PATH: &str = "/api/groups/bookingRequest";

const USER_AGENT: &str = concat!("stay_search/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },
}

impl ApiError {
    // Transport-class failures are shown as a dismissible banner
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_) | ApiError::Timeout(_) | ApiError::ApiResponseError { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[async_trait]
pub trait GeocodingApi: Send + Sync + 'static {
    // An empty list is a valid "not found" answer
    async fn lookup(&self, place: &str) -> Result<Vec<PlaceRecord>, ApiError>;
}

#[async_trait]
pub trait AccommodationApi: Send + Sync + 'static {
    async fn search(&self, params: &SearchParams) -> Result<SearchResults, ApiError>;
}

#[async_trait]
pub trait GroupBookingApi: Send + Sync + 'static {
    async fn request_group_booking(
        &self,
        request: &GroupBookingRequest,
    ) -> Result<GroupBookingResponse, ApiError>;
}

/// `reqwest`-backed client for all three collaborators. Cookies are kept so
/// booking requests go out with the session's credentials.
pub struct HttpApiClient {
    http: Client,
    config: ClientConfig,
}

impl HttpApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.config.timeout_ms)
        } else if error.is_decode() {
            ApiError::MalformedResponse(error.to_string())
        } else if let Some(status) = error.status() {
            ApiError::ApiResponseError {
                status_code: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            ApiError::NetworkError(error.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let path = response.url().path().to_string();
            warn!("{} responded with {}", path, status);
            let message = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Could not read error body from {}: {}", path, e);
                    String::new()
                }
            };
            return Err(ApiError::ApiResponseError {
                status_code: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| self.transport_error(e))
    }
}

#[async_trait]
impl GeocodingApi for HttpApiClient {
    async fn lookup(&self, place: &str) -> Result<Vec<PlaceRecord>, ApiError> {
        debug!("Looking up coordinates for {:?}", place);

        let response = self
            .http
            .get(&self.config.geocoding_url)
            .query(&[("format", "json"), ("q", place)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.read_json(response).await
    }
}

#[async_trait]
impl AccommodationApi for HttpApiClient {
    async fn search(&self, params: &SearchParams) -> Result<SearchResults, ApiError> {
        debug!("Searching accommodations in {}", params.location);

        let response = self
            .http
            .post(self.config.backend_endpoint(SEARCH_PATH))
            .json(params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.read_json(response).await
    }
}

#[async_trait]
impl GroupBookingApi for HttpApiClient {
    async fn request_group_booking(
        &self,
        request: &GroupBookingRequest,
    ) -> Result<GroupBookingResponse, ApiError> {
        debug!(
            "Requesting group booking for {} offers",
            request.offers.len()
        );

        let response = self
            .http
            .post(self.config.backend_endpoint(GROUP_BOOKING_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.read_json(response).await
    }
}
