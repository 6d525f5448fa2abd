//! Search request and fuzziness flags.
//!
//! Every field maps one-to-one onto a URL query parameter of `GET /search`.

use serde::{Deserialize, Serialize};

use crate::types::roles::{EventType, Relative};

/// Default page size.
pub const DEFAULT_SIZE: usize = 10;
/// Largest allowed page size.
pub const MAX_SIZE: usize = 100;
/// Largest allowed offset.
pub const MAX_FROM: usize = 1000;

/// Name fuzziness bitmask (combinable).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameFuzziness(pub u32);

impl NameFuzziness {
    pub const DEFAULT: NameFuzziness = NameFuzziness(0);
    pub const EXACT: NameFuzziness = NameFuzziness(1);
    pub const VARIANTS: NameFuzziness = NameFuzziness(2);
    pub const SOUNDS_LIKE_NARROW: NameFuzziness = NameFuzziness(4);
    pub const SOUNDS_LIKE_BROAD: NameFuzziness = NameFuzziness(8);
    pub const LEVENSHTEIN: NameFuzziness = NameFuzziness(16);
    pub const INITIALS: NameFuzziness = NameFuzziness(32);

    pub fn is_default(&self) -> bool {
        self.0 == 0
    }

    /// Whether the flag is enabled; the default enables every flag.
    pub fn enables(&self, flag: NameFuzziness) -> bool {
        self.is_default() || self.0 & flag.0 != 0
    }
}

impl std::ops::BitOr for NameFuzziness {
    type Output = NameFuzziness;

    fn bitor(self, rhs: Self) -> Self::Output {
        NameFuzziness(self.0 | rhs.0)
    }
}

/// Date fuzziness (exclusive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateFuzziness(pub u32);

impl DateFuzziness {
    pub const DEFAULT: DateFuzziness = DateFuzziness(0);
    pub const EXACT: DateFuzziness = DateFuzziness(1);
    pub const ONE: DateFuzziness = DateFuzziness(2);
    pub const TWO: DateFuzziness = DateFuzziness(4);
    pub const FIVE: DateFuzziness = DateFuzziness(8);
    pub const TEN: DateFuzziness = DateFuzziness(16);

    pub fn is_default(&self) -> bool {
        self.0 == 0
    }

    /// Year range around the requested year; `None` for exact matching.
    pub fn range_years(&self) -> Option<i64> {
        match *self {
            DateFuzziness::EXACT => None,
            DateFuzziness::ONE => Some(1),
            DateFuzziness::TWO => Some(2),
            DateFuzziness::TEN => Some(10),
            // Default and Five share the same range; unknown values fall back to it.
            _ => Some(5),
        }
    }
}

/// Place fuzziness bitmask (combinable).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceFuzziness(pub u32);

impl PlaceFuzziness {
    pub const DEFAULT: PlaceFuzziness = PlaceFuzziness(0);
    pub const EXACT: PlaceFuzziness = PlaceFuzziness(1);
    pub const HIGHER_JURISDICTIONS: PlaceFuzziness = PlaceFuzziness(2);
    /// Declared for wire compatibility; nearby matching is not implemented.
    pub const NEARBY: PlaceFuzziness = PlaceFuzziness(4);

    pub fn is_default(&self) -> bool {
        self.0 == 0
    }

    pub fn enables(&self, flag: PlaceFuzziness) -> bool {
        self.is_default() || self.0 & flag.0 != 0
    }
}

/// A genealogical search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub given: Option<String>,
    pub given_fuzziness: NameFuzziness,
    pub surname: Option<String>,
    pub surname_fuzziness: NameFuzziness,

    pub father_given: Option<String>,
    pub father_given_fuzziness: NameFuzziness,
    pub father_surname: Option<String>,
    pub father_surname_fuzziness: NameFuzziness,
    pub mother_given: Option<String>,
    pub mother_given_fuzziness: NameFuzziness,
    pub mother_surname: Option<String>,
    pub mother_surname_fuzziness: NameFuzziness,
    pub spouse_given: Option<String>,
    pub spouse_given_fuzziness: NameFuzziness,
    pub spouse_surname: Option<String>,
    pub spouse_surname_fuzziness: NameFuzziness,
    pub other_given: Option<String>,
    pub other_given_fuzziness: NameFuzziness,
    pub other_surname: Option<String>,
    pub other_surname_fuzziness: NameFuzziness,

    pub birth_date: Option<String>,
    pub birth_date_fuzziness: DateFuzziness,
    pub birth_place: Option<String>,
    pub birth_place_fuzziness: PlaceFuzziness,
    pub marriage_date: Option<String>,
    pub marriage_date_fuzziness: DateFuzziness,
    pub marriage_place: Option<String>,
    pub marriage_place_fuzziness: PlaceFuzziness,
    pub residence_date: Option<String>,
    pub residence_date_fuzziness: DateFuzziness,
    pub residence_place: Option<String>,
    pub residence_place_fuzziness: PlaceFuzziness,
    pub death_date: Option<String>,
    pub death_date_fuzziness: DateFuzziness,
    pub death_place: Option<String>,
    pub death_place_fuzziness: PlaceFuzziness,
    pub any_date: Option<String>,
    pub any_date_fuzziness: DateFuzziness,
    pub any_place: Option<String>,
    pub any_place_fuzziness: PlaceFuzziness,

    pub keywords: Option<String>,
    #[serde(rename = "book_title")]
    pub book_title: Option<String>,
    #[serde(rename = "book_author")]
    pub book_author: Option<String>,

    pub society_id: Option<u32>,
    pub category: Option<String>,
    pub collection: Option<String>,
    pub collection_place1: Option<String>,
    pub collection_place2: Option<String>,
    pub collection_place3: Option<String>,

    pub category_facet: bool,
    pub collection_facet: bool,
    pub collection_place1_facet: bool,
    pub collection_place2_facet: bool,
    pub collection_place3_facet: bool,

    pub from: Option<usize>,
    pub size: Option<usize>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SearchRequest {
    /// Principal given name and its fuzziness.
    pub fn given(&self) -> Option<(&str, NameFuzziness)> {
        non_blank(&self.given).map(|v| (v, self.given_fuzziness))
    }

    /// Principal surname and its fuzziness.
    pub fn surname(&self) -> Option<(&str, NameFuzziness)> {
        non_blank(&self.surname).map(|v| (v, self.surname_fuzziness))
    }

    /// Given name of a relative and its fuzziness.
    pub fn relative_given(&self, relative: Relative) -> Option<(&str, NameFuzziness)> {
        let (value, fuzziness) = match relative {
            Relative::Father => (&self.father_given, self.father_given_fuzziness),
            Relative::Mother => (&self.mother_given, self.mother_given_fuzziness),
            Relative::Spouse => (&self.spouse_given, self.spouse_given_fuzziness),
            Relative::Other => (&self.other_given, self.other_given_fuzziness),
        };
        non_blank(value).map(|v| (v, fuzziness))
    }

    /// Surname of a relative and its fuzziness.
    pub fn relative_surname(&self, relative: Relative) -> Option<(&str, NameFuzziness)> {
        let (value, fuzziness) = match relative {
            Relative::Father => (&self.father_surname, self.father_surname_fuzziness),
            Relative::Mother => (&self.mother_surname, self.mother_surname_fuzziness),
            Relative::Spouse => (&self.spouse_surname, self.spouse_surname_fuzziness),
            Relative::Other => (&self.other_surname, self.other_surname_fuzziness),
        };
        non_blank(value).map(|v| (v, fuzziness))
    }

    /// Date of an event and its fuzziness. `Other` events are only reachable through any-date.
    pub fn event_date(&self, event: EventType) -> Option<(&str, DateFuzziness)> {
        let (value, fuzziness) = match event {
            EventType::Birth => (&self.birth_date, self.birth_date_fuzziness),
            EventType::Marriage => (&self.marriage_date, self.marriage_date_fuzziness),
            EventType::Residence => (&self.residence_date, self.residence_date_fuzziness),
            EventType::Death => (&self.death_date, self.death_date_fuzziness),
            EventType::Other => return None,
        };
        non_blank(value).map(|v| (v, fuzziness))
    }

    /// Place of an event and its fuzziness. `Other` events are only reachable through any-place.
    pub fn event_place(&self, event: EventType) -> Option<(&str, PlaceFuzziness)> {
        let (value, fuzziness) = match event {
            EventType::Birth => (&self.birth_place, self.birth_place_fuzziness),
            EventType::Marriage => (&self.marriage_place, self.marriage_place_fuzziness),
            EventType::Residence => (&self.residence_place, self.residence_place_fuzziness),
            EventType::Death => (&self.death_place, self.death_place_fuzziness),
            EventType::Other => return None,
        };
        non_blank(value).map(|v| (v, fuzziness))
    }

    pub fn any_date(&self) -> Option<(&str, DateFuzziness)> {
        non_blank(&self.any_date).map(|v| (v, self.any_date_fuzziness))
    }

    pub fn any_place(&self) -> Option<(&str, PlaceFuzziness)> {
        non_blank(&self.any_place).map(|v| (v, self.any_place_fuzziness))
    }

    /// Free-text fields keyed by their index field name.
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("keywords", &self.keywords),
            ("book_title", &self.book_title),
            ("book_author", &self.book_author),
        ]
        .into_iter()
        .filter_map(|(field, value)| non_blank(value).map(|v| (field, v)))
        .collect()
    }

    pub fn category(&self) -> Option<&str> {
        non_blank(&self.category)
    }

    pub fn collection(&self) -> Option<&str> {
        non_blank(&self.collection)
    }

    /// Collection place filter at level 1..=3.
    pub fn collection_place(&self, level: usize) -> Option<&str> {
        match level {
            1 => non_blank(&self.collection_place1),
            2 => non_blank(&self.collection_place2),
            3 => non_blank(&self.collection_place3),
            _ => None,
        }
    }

    /// Offset clamped to `[0, MAX_FROM]`.
    pub fn clamped_from(&self) -> usize {
        self.from.unwrap_or(0).min(MAX_FROM)
    }

    /// Page size clamped to `[0, MAX_SIZE]`, defaulting to `DEFAULT_SIZE`.
    pub fn clamped_size(&self) -> usize {
        self.size.unwrap_or(DEFAULT_SIZE).min(MAX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_fuzziness_default_enables_all() {
        let f = NameFuzziness::DEFAULT;
        assert!(f.enables(NameFuzziness::VARIANTS));
        assert!(f.enables(NameFuzziness::INITIALS));

        let f = NameFuzziness::VARIANTS | NameFuzziness::INITIALS;
        assert!(f.enables(NameFuzziness::VARIANTS));
        assert!(!f.enables(NameFuzziness::LEVENSHTEIN));
    }

    #[test]
    fn test_date_ranges() {
        assert_eq!(DateFuzziness::DEFAULT.range_years(), Some(5));
        assert_eq!(DateFuzziness::EXACT.range_years(), None);
        assert_eq!(DateFuzziness::ONE.range_years(), Some(1));
        assert_eq!(DateFuzziness::TWO.range_years(), Some(2));
        assert_eq!(DateFuzziness::FIVE.range_years(), Some(5));
        assert_eq!(DateFuzziness::TEN.range_years(), Some(10));
    }

    #[test]
    fn test_paging_is_clamped() {
        let mut req = SearchRequest::default();
        assert_eq!(req.clamped_from(), 0);
        assert_eq!(req.clamped_size(), DEFAULT_SIZE);

        req.from = Some(5000);
        req.size = Some(1000);
        assert_eq!(req.clamped_from(), MAX_FROM);
        assert_eq!(req.clamped_size(), MAX_SIZE);
    }

    #[test]
    fn test_deserializes_query_parameter_names() {
        let req: SearchRequest = serde_json::from_value(serde_json::json!({
            "given": "Fred",
            "surnameFuzziness": 1,
            "birthDate": "1900",
            "book_title": "Ledger",
            "collectionPlace2Facet": true,
            "societyId": 4
        }))
        .unwrap();

        assert_eq!(req.given(), Some(("Fred", NameFuzziness::DEFAULT)));
        assert_eq!(req.surname_fuzziness, NameFuzziness::EXACT);
        assert_eq!(req.event_date(EventType::Birth), Some(("1900", DateFuzziness::DEFAULT)));
        assert_eq!(req.text_fields(), vec![("book_title", "Ledger")]);
        assert!(req.collection_place2_facet);
        assert_eq!(req.society_id, Some(4));
    }

    #[test]
    fn test_blank_values_are_absent() {
        let req = SearchRequest {
            given: Some("  ".to_string()),
            collection_place1: Some(String::new()),
            ..Default::default()
        };
        assert!(req.given().is_none());
        assert!(req.collection_place(1).is_none());
    }
}
