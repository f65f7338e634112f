// Search results: accommodation list kept in sync with the map markers,
// and the data behind a facility's introduction block

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::coordinates::LatLng;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<LatLng>,
    #[serde(default)]
    pub media: Vec<Photo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub accommodation_id: String,
    #[serde(default)]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResults {
    pub accommodations: Vec<Accommodation>,
    pub offers: Vec<Offer>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.accommodations.is_empty()
    }

    pub fn offers_for<'a>(&'a self, accommodation_id: &'a str) -> impl Iterator<Item = &'a Offer> {
        self.offers
            .iter()
            .filter(move |o| o.accommodation_id == accommodation_id)
    }

    pub fn cheapest_offer(&self, accommodation_id: &str) -> Option<&Offer> {
        self.offers
            .iter()
            .filter(|o| o.accommodation_id == accommodation_id && o.price.is_some())
            .min_by(|a, b| {
                let a = a.price.as_ref().map_or(f64::MAX, |p| p.amount);
                let b = b.price.as_ref().map_or(f64::MAX, |p| p.amount);
                a.total_cmp(&b)
            })
    }
}

// Cards are hidden while a fetch is running and when there is nothing to show
pub fn visible_results(results: Option<&SearchResults>, is_fetching: bool) -> &[Accommodation] {
    match results {
        Some(results) if !is_fetching => &results.accommodations,
        _ => &[],
    }
}

/// Facility id to list position, rebuilt only when the list itself changes.
#[derive(Debug, Clone, Default)]
pub struct ResultsIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ResultsIndex {
    pub fn new(accommodations: &[Accommodation]) -> Self {
        let ids: Vec<String> = accommodations.iter().map(|a| a.id.clone()).collect();
        let mut positions = HashMap::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            positions.entry(id.clone()).or_insert(idx);
        }
        Self { ids, positions }
    }

    pub fn is_current(&self, accommodations: &[Accommodation]) -> bool {
        self.ids.len() == accommodations.len()
            && self
                .ids
                .iter()
                .zip(accommodations)
                .all(|(id, a)| *id == a.id)
    }

    // Returns true when the index had to be rebuilt
    pub fn refresh(&mut self, accommodations: &[Accommodation]) -> bool {
        if self.is_current(accommodations) {
            return false;
        }
        *self = Self::new(accommodations);
        true
    }

    pub fn position(&self, facility_id: &str) -> Option<usize> {
        self.positions.get(facility_id).copied()
    }

    pub fn scroll_target(&self, selected_facility_id: Option<&str>) -> Option<usize> {
        selected_facility_id.and_then(|id| self.position(id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub facility_id: String,
    pub position: LatLng,
    pub selected: bool,
}

pub fn map_markers(
    accommodations: &[Accommodation],
    selected_facility_id: Option<&str>,
) -> Vec<MapMarker> {
    accommodations
        .iter()
        .filter_map(|a| {
            a.location.map(|position| MapMarker {
                facility_id: a.id.clone(),
                position,
                selected: selected_facility_id == Some(a.id.as_str()),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacilityIntroduction {
    pub name: String,
    pub main_image: Option<Photo>,
    pub detail_images: Vec<Photo>,
}

impl From<&Accommodation> for FacilityIntroduction {
    fn from(facility: &Accommodation) -> Self {
        let mut images = facility.media.clone();
        // Widest first; ties keep their original order
        images.sort_by(|a, b| b.width.cmp(&a.width));

        let mut images = images.into_iter();
        let main_image = images.next();

        Self {
            name: facility.name.clone(),
            main_image,
            detail_images: images.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(url: &str, width: u32) -> Photo {
        Photo {
            url: url.to_string(),
            width,
            height: 400,
        }
    }

    fn facility(id: &str, location: Option<LatLng>) -> Accommodation {
        Accommodation {
            id: id.to_string(),
            name: format!("Hotel {id}"),
            location,
            media: vec![],
        }
    }

    #[test]
    fn test_results_deserialize_leniently() {
        let results: SearchResults = serde_json::from_str(
            r#"{"accommodations": [{"id": "f1", "name": "Days Inn"}]}"#,
        )
        .unwrap();
        assert_eq!(results.accommodations.len(), 1);
        assert!(results.offers.is_empty());
        assert!(results.accommodations[0].media.is_empty());
    }

    #[test]
    fn test_cheapest_offer() {
        let results = SearchResults {
            accommodations: vec![facility("f1", None)],
            offers: vec![
                Offer {
                    id: "o1".to_string(),
                    accommodation_id: "f1".to_string(),
                    price: Some(Price {
                        amount: 120.5,
                        currency: "EUR".to_string(),
                    }),
                },
                Offer {
                    id: "o2".to_string(),
                    accommodation_id: "f1".to_string(),
                    price: Some(Price {
                        amount: 84.82,
                        currency: "EUR".to_string(),
                    }),
                },
                Offer {
                    id: "o3".to_string(),
                    accommodation_id: "f2".to_string(),
                    price: None,
                },
            ],
        };

        assert_eq!(results.cheapest_offer("f1").map(|o| o.id.as_str()), Some("o2"));
        assert_eq!(results.cheapest_offer("f2"), None);
        assert_eq!(results.offers_for("f1").count(), 2);
    }

    #[test]
    fn test_visible_results_hidden_while_fetching() {
        let results = SearchResults {
            accommodations: vec![facility("f1", None)],
            offers: vec![],
        };
        assert_eq!(visible_results(Some(&results), false).len(), 1);
        assert!(visible_results(Some(&results), true).is_empty());
        assert!(visible_results(None, false).is_empty());
    }

    #[test]
    fn test_index_positions_and_scroll_target() {
        let list = vec![facility("a", None), facility("b", None), facility("c", None)];
        let index = ResultsIndex::new(&list);

        assert_eq!(index.position("c"), Some(2));
        assert_eq!(index.scroll_target(Some("b")), Some(1));
        assert_eq!(index.scroll_target(Some("zzz")), None);
        assert_eq!(index.scroll_target(None), None);
    }

    #[test]
    fn test_index_refresh_only_on_list_change() {
        let list = vec![facility("a", None), facility("b", None)];
        let mut index = ResultsIndex::new(&list);

        assert!(!index.refresh(&list));

        let reordered = vec![facility("b", None), facility("a", None)];
        assert!(index.refresh(&reordered));
        assert_eq!(index.position("b"), Some(0));
    }

    #[test]
    fn test_map_markers_follow_selection() {
        let here = LatLng { lat: 52.5, lon: 13.4 };
        let list = vec![facility("a", Some(here)), facility("b", None), facility("c", Some(here))];

        let markers = map_markers(&list, Some("c"));
        assert_eq!(markers.len(), 2);
        assert!(!markers[0].selected);
        assert!(markers[1].selected);
        assert_eq!(markers[1].facility_id, "c");
    }

    #[test]
    fn test_facility_introduction_picks_widest_image() {
        let mut hotel = facility("f1", None);
        hotel.media = vec![
            photo("small.jpg", 320),
            photo("large.jpg", 1920),
            photo("medium-1.jpg", 800),
            photo("medium-2.jpg", 800),
        ];

        let intro = FacilityIntroduction::from(&hotel);
        assert_eq!(intro.name, "Hotel f1");
        assert_eq!(intro.main_image.map(|p| p.url), Some("large.jpg".to_string()));
        let rest: Vec<_> = intro.detail_images.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(rest, vec!["medium-1.jpg", "medium-2.jpg", "small.jpg"]);
    }

    #[test]
    fn test_facility_without_media() {
        let intro = FacilityIntroduction::from(&facility("f2", None));
        assert_eq!(intro.main_image, None);
        assert!(intro.detail_images.is_empty());
    }
}
