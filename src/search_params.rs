// Search parameters: the validated filter set behind every accommodation query,
// plus its two other representations (URL query string and editable form draft)

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOCATION_KEY: &str = "location";
pub const ARRIVAL_KEY: &str = "arrival";
pub const DEPARTURE_KEY: &str = "departure";
pub const ROOM_COUNT_KEY: &str = "roomCount";
pub const ADULT_COUNT_KEY: &str = "adultCount";
pub const CHILD_COUNT_KEY: &str = "childCount";

const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

const DEFAULT_ROOM_COUNT: u32 = 1;
const DEFAULT_ADULT_COUNT: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub location: String,
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
    pub room_count: u32,
    pub adult_count: u32,
    #[serde(default)]
    pub child_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Location,
    Arrival,
    Departure,
    RoomCount,
    AdultCount,
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchField::Location => LOCATION_KEY,
            SearchField::Arrival => ARRIVAL_KEY,
            SearchField::Departure => DEPARTURE_KEY,
            SearchField::RoomCount => ROOM_COUNT_KEY,
            SearchField::AdultCount => ADULT_COUNT_KEY,
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: SearchField,
    pub message: &'static str,
}

/// Schema-style validation result: every failing field, in form order.
#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("Fill in your destination, dates and the amount of rooms/guests.")]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: SearchField, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: SearchField) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn fields(&self) -> Vec<SearchField> {
        self.errors.iter().map(|e| e.field).collect()
    }

    pub fn message_for(&self, field: SearchField) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn check_fields(
    location: &str,
    arrival: Option<NaiveDate>,
    departure: Option<NaiveDate>,
    room_count: Option<u32>,
    adult_count: Option<u32>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if location.trim().is_empty() {
        errors.push(SearchField::Location, "Location is required");
    }
    if arrival.is_none() {
        errors.push(SearchField::Arrival, "Pick a start date");
    }
    if departure.is_none() {
        errors.push(SearchField::Departure, "Pick an end date");
    }
    if let (Some(arrival), Some(departure)) = (arrival, departure) {
        if arrival >= departure {
            errors.push(SearchField::Arrival, "Arrival must be before departure");
            errors.push(SearchField::Departure, "Departure must be after arrival");
        }
    }
    if !room_count.map_or(false, |n| n > 0) {
        errors.push(SearchField::RoomCount, "Should be more than 0");
    }
    if !adult_count.map_or(false, |n| n > 0) {
        errors.push(SearchField::AdultCount, "Should be more than 0");
    }

    errors
}

// Accepts plain ISO dates and full RFC 3339 timestamps (date part only)
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, QUERY_DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

fn non_blank<'a>(query: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    query
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Reads search parameters from address-bar query pairs.
///
/// Returns `None` unless location, both dates and both required counts are
/// present and well formed and the stay is at least one night.
pub fn parse_from_query(query: &HashMap<String, String>) -> Option<SearchParams> {
    let location = non_blank(query, LOCATION_KEY)?.trim().to_string();
    let arrival = parse_date(non_blank(query, ARRIVAL_KEY)?)?;
    let departure = parse_date(non_blank(query, DEPARTURE_KEY)?)?;
    let room_count = parse_positive(non_blank(query, ROOM_COUNT_KEY)?)?;
    let adult_count = parse_positive(non_blank(query, ADULT_COUNT_KEY)?)?;
    let child_count = match non_blank(query, CHILD_COUNT_KEY) {
        Some(raw) => raw.trim().parse::<u32>().ok()?,
        None => 0,
    };

    if arrival >= departure {
        return None;
    }

    Some(SearchParams {
        location,
        arrival,
        departure,
        room_count,
        adult_count,
        child_count,
    })
}

/// Collects the query pairs of a page URL. The first occurrence of a
/// repeated key wins.
pub fn query_from_url(url: &Url) -> HashMap<String, String> {
    let mut query = HashMap::new();
    for (key, value) in url.query_pairs() {
        query
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    query
}

impl SearchParams {
    pub fn from_query(query: &HashMap<String, String>) -> Option<Self> {
        parse_from_query(query)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        check_fields(
            &self.location,
            Some(self.arrival),
            Some(self.departure),
            Some(self.room_count),
            Some(self.adult_count),
        )
        .into_result()
    }

    pub fn nights(&self) -> i64 {
        (self.departure - self.arrival).num_days()
    }

    pub fn guest_count(&self) -> u32 {
        self.adult_count.saturating_add(self.child_count)
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (LOCATION_KEY, self.location.clone()),
            (ARRIVAL_KEY, self.arrival.format(QUERY_DATE_FORMAT).to_string()),
            (
                DEPARTURE_KEY,
                self.departure.format(QUERY_DATE_FORMAT).to_string(),
            ),
            (ROOM_COUNT_KEY, self.room_count.to_string()),
            (ADULT_COUNT_KEY, self.adult_count.to_string()),
            (CHILD_COUNT_KEY, self.child_count.to_string()),
        ]
    }

    /// The bookmarkable results-page URL for these parameters.
    pub fn search_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(self.to_query_pairs());
        url
    }
}

/// Editable draft behind the search form. Edits never reach the fetch layer;
/// only `to_params` on submission does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchForm {
    pub location: String,
    pub arrival: Option<NaiveDate>,
    pub departure: Option<NaiveDate>,
    pub room_count: Option<u32>,
    pub adult_count: Option<u32>,
    pub child_count: u32,
}

impl Default for SearchForm {
    fn default() -> Self {
        Self {
            location: String::new(),
            arrival: None,
            departure: None,
            room_count: Some(DEFAULT_ROOM_COUNT),
            adult_count: Some(DEFAULT_ADULT_COUNT),
            child_count: 0,
        }
    }
}

impl From<&SearchParams> for SearchForm {
    fn from(params: &SearchParams) -> Self {
        Self {
            location: params.location.clone(),
            arrival: Some(params.arrival),
            departure: Some(params.departure),
            room_count: Some(params.room_count),
            adult_count: Some(params.adult_count),
            child_count: params.child_count,
        }
    }
}

impl SearchForm {
    /// Seeds the form from the address bar, filling defaults for anything
    /// missing or malformed.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            location: query.get(LOCATION_KEY).cloned().unwrap_or_default(),
            arrival: query.get(ARRIVAL_KEY).and_then(|v| parse_date(v)),
            departure: query.get(DEPARTURE_KEY).and_then(|v| parse_date(v)),
            room_count: query
                .get(ROOM_COUNT_KEY)
                .and_then(|v| parse_positive(v))
                .or(defaults.room_count),
            adult_count: query
                .get(ADULT_COUNT_KEY)
                .and_then(|v| parse_positive(v))
                .or(defaults.adult_count),
            child_count: query
                .get(CHILD_COUNT_KEY)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.child_count),
        }
    }

    pub fn set_date_range(&mut self, arrival: NaiveDate, departure: NaiveDate) {
        self.arrival = Some(arrival);
        self.departure = Some(departure);
    }

    pub fn clear_date_range(&mut self) {
        self.arrival = None;
        self.departure = None;
    }

    /// Moves past dates forward: arrival to `today`, departure to the day after.
    pub fn clamp_dates(&mut self, today: NaiveDate) {
        let tomorrow = today.succ_opt().unwrap_or(today);
        if let Some(arrival) = self.arrival {
            if arrival < today {
                self.arrival = Some(today);
            }
        }
        if let Some(departure) = self.departure {
            if departure < tomorrow {
                self.departure = Some(tomorrow);
            }
        }
    }

    pub fn to_params(&self) -> Result<SearchParams, ValidationErrors> {
        let errors = check_fields(
            &self.location,
            self.arrival,
            self.departure,
            self.room_count,
            self.adult_count,
        );

        match (self.arrival, self.departure, self.room_count, self.adult_count) {
            (Some(arrival), Some(departure), Some(room_count), Some(adult_count))
                if errors.is_empty() =>
            {
                Ok(SearchParams {
                    location: self.location.trim().to_string(),
                    arrival,
                    departure,
                    room_count,
                    adult_count,
                    child_count: self.child_count,
                })
            }
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn berlin_query() -> HashMap<String, String> {
        query(&[
            ("location", "Berlin"),
            ("arrival", "2024-05-01"),
            ("departure", "2024-05-03"),
            ("roomCount", "1"),
            ("adultCount", "2"),
        ])
    }

    fn berlin() -> SearchParams {
        SearchParams {
            location: "Berlin".to_string(),
            arrival: date(2024, 5, 1),
            departure: date(2024, 5, 3),
            room_count: 1,
            adult_count: 2,
            child_count: 0,
        }
    }

    #[test]
    fn test_parse_complete_query() {
        assert_eq!(parse_from_query(&berlin_query()), Some(berlin()));
    }

    #[test_case("location"; "missing location")]
    #[test_case("arrival"; "missing arrival")]
    #[test_case("departure"; "missing departure")]
    #[test_case("roomCount"; "missing room count")]
    #[test_case("adultCount"; "missing adult count")]
    fn test_parse_rejects_missing_key(key: &str) {
        let mut query = berlin_query();
        query.remove(key);
        assert_eq!(parse_from_query(&query), None);
    }

    #[test_case("arrival", "2024-02-30"; "impossible calendar date")]
    #[test_case("departure", "next week"; "free text date")]
    #[test_case("roomCount", "0"; "zero rooms")]
    #[test_case("adultCount", "-1"; "negative adults")]
    #[test_case("adultCount", "two"; "non numeric adults")]
    #[test_case("location", "   "; "blank location")]
    #[test_case("childCount", "many"; "malformed child count")]
    fn test_parse_rejects_malformed_value(key: &str, value: &str) {
        let mut query = berlin_query();
        query.insert(key.to_string(), value.to_string());
        assert_eq!(parse_from_query(&query), None);
    }

    #[test]
    fn test_parse_rejects_reversed_dates() {
        let mut query = berlin_query();
        query.insert("departure".to_string(), "2024-05-01".to_string());
        assert_eq!(parse_from_query(&query), None);
    }

    #[test]
    fn test_parse_accepts_rfc3339_timestamps() {
        let mut query = berlin_query();
        query.insert(
            "arrival".to_string(),
            "2024-05-01T00:00:00+02:00".to_string(),
        );
        query.insert("childCount".to_string(), "1".to_string());

        let params = parse_from_query(&query).unwrap();
        assert_eq!(params.arrival, date(2024, 5, 1));
        assert_eq!(params.child_count, 1);
        assert_eq!(params.guest_count(), 3);
    }

    #[test]
    fn test_guest_count_saturates() {
        let mut query = berlin_query();
        query.insert("adultCount".to_string(), u32::MAX.to_string());
        query.insert("childCount".to_string(), "1".to_string());

        let params = parse_from_query(&query).unwrap();
        assert_eq!(params.guest_count(), u32::MAX);
    }

    #[test]
    fn test_validate_names_both_date_fields() {
        let params = SearchParams {
            departure: date(2024, 5, 1),
            ..berlin()
        };
        let errors = params.validate().unwrap_err();
        assert_eq!(
            errors.fields(),
            vec![SearchField::Arrival, SearchField::Departure]
        );
    }

    #[test]
    fn test_validate_enumerates_every_failure() {
        let params = SearchParams {
            location: String::new(),
            room_count: 0,
            adult_count: 0,
            ..berlin()
        };
        let errors = params.validate().unwrap_err();
        assert_eq!(
            errors.fields(),
            vec![
                SearchField::Location,
                SearchField::RoomCount,
                SearchField::AdultCount
            ]
        );
        assert_eq!(
            errors.message_for(SearchField::Location),
            Some("Location is required")
        );
    }

    #[test]
    fn test_search_url_is_readable_back() {
        let base = Url::parse("https://stays.example.com/search").unwrap();
        let url = berlin().search_url(&base);

        assert_eq!(url.path(), "/search");
        assert!(url.as_str().contains("arrival=2024-05-01"));
        assert_eq!(parse_from_query(&query_from_url(&url)), Some(berlin()));
    }

    #[test]
    fn test_query_from_url_keeps_first_duplicate() {
        let url =
            Url::parse("https://stays.example.com/search?location=Paris&location=Rome").unwrap();
        assert_eq!(query_from_url(&url)["location"], "Paris");
    }

    #[test]
    fn test_form_defaults_from_empty_query() {
        let form = SearchForm::from_query(&HashMap::new());
        assert_eq!(form, SearchForm::default());
        assert_eq!(form.adult_count, Some(2));
        assert_eq!(form.room_count, Some(1));
        assert_eq!(form.arrival, None);
    }

    #[test]
    fn test_form_without_dates_fails_validation() {
        let form = SearchForm {
            location: "Vienna".to_string(),
            ..Default::default()
        };
        let errors = form.to_params().unwrap_err();
        assert_eq!(
            errors.fields(),
            vec![SearchField::Arrival, SearchField::Departure]
        );
    }

    #[test]
    fn test_form_to_params_trims_location() {
        let mut form = SearchForm::from_query(&berlin_query());
        form.location = "  Berlin ".to_string();
        assert_eq!(form.to_params(), Ok(berlin()));
    }

    #[test]
    fn test_clamp_dates_moves_past_dates_forward() {
        let mut form = SearchForm::default();
        form.set_date_range(date(2024, 4, 1), date(2024, 4, 2));
        form.clamp_dates(date(2024, 4, 10));

        assert_eq!(form.arrival, Some(date(2024, 4, 10)));
        assert_eq!(form.departure, Some(date(2024, 4, 11)));
    }

    #[test]
    fn test_clamp_dates_keeps_future_dates() {
        let mut form = SearchForm::default();
        form.set_date_range(date(2024, 6, 1), date(2024, 6, 4));
        form.clamp_dates(date(2024, 4, 10));

        assert_eq!(form.arrival, Some(date(2024, 6, 1)));
        assert_eq!(form.departure, Some(date(2024, 6, 4)));
    }
}
