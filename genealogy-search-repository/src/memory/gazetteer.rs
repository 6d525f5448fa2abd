use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use genealogy_search_shared::{
    DomainError, NameType, NameVariants, Place, PlaceSettings, PlaceWord,
};

use crate::interfaces::{Gazetteer, NameVariantsSource};

/// In-memory gazetteer and name-variant tables.
///
/// Records how many lookups were issued and how large each batch was, so batching can be
/// asserted in tests.
#[derive(Default)]
pub struct InMemoryGazetteer {
    places: HashMap<u32, Place>,
    words: HashMap<String, BTreeSet<u32>>,
    settings: PlaceSettings,
    given_variants: HashMap<String, Vec<String>>,
    surname_variants: HashMap<String, Vec<String>>,
    place_calls: AtomicUsize,
    word_calls: AtomicUsize,
    place_batches: Mutex<Vec<usize>>,
    word_batches: Mutex<Vec<usize>>,
}

/// Lowercase words of a place name, as stored in the word index.
fn name_words(name: &str) -> impl Iterator<Item = String> + '_ {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

impl InMemoryGazetteer {
    pub fn new(settings: PlaceSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Add a place and index the words of its name and alternate names.
    pub fn with_place(mut self, place: Place) -> Self {
        let names = std::iter::once(place.name.clone()).chain(place.alt_names.iter().cloned());
        for name in names.collect::<Vec<_>>() {
            for word in name_words(&name) {
                self.words.entry(word).or_default().insert(place.id);
            }
        }
        self.places.insert(place.id, place);
        self
    }

    pub fn with_places(self, places: impl IntoIterator<Item = Place>) -> Self {
        places.into_iter().fold(self, Self::with_place)
    }

    pub fn with_name_variants(
        mut self,
        name_type: NameType,
        name: impl Into<String>,
        variants: Vec<String>,
    ) -> Self {
        let table = match name_type {
            NameType::Given => &mut self.given_variants,
            NameType::Surname => &mut self.surname_variants,
        };
        table.insert(name.into(), variants);
        self
    }

    /// Number of `select_places_by_id` calls so far.
    pub fn place_calls(&self) -> usize {
        self.place_calls.load(Ordering::SeqCst)
    }

    /// Number of `select_place_words_by_word` calls so far.
    pub fn word_calls(&self) -> usize {
        self.word_calls.load(Ordering::SeqCst)
    }

    /// Sizes of every place-by-ID batch, in call order.
    pub fn place_batch_sizes(&self) -> Vec<usize> {
        self.place_batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Sizes of every place-word batch, in call order.
    pub fn word_batch_sizes(&self) -> Vec<usize> {
        self.word_batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Gazetteer for InMemoryGazetteer {
    async fn select_places_by_id(&self, ids: &[u32]) -> Result<Vec<Place>, DomainError> {
        self.place_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut batches) = self.place_batches.lock() {
            batches.push(ids.len());
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.places.get(id))
            .cloned()
            .collect())
    }

    async fn select_place_words_by_word(
        &self,
        words: &[String],
    ) -> Result<Vec<PlaceWord>, DomainError> {
        self.word_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut batches) = self.word_batches.lock() {
            batches.push(words.len());
        }
        Ok(words
            .iter()
            .filter_map(|word| {
                self.words.get(word).map(|ids| PlaceWord {
                    word: word.clone(),
                    ids: ids.iter().copied().collect(),
                })
            })
            .collect())
    }

    async fn select_place_settings(&self) -> Result<PlaceSettings, DomainError> {
        Ok(self.settings.clone())
    }
}

#[async_trait]
impl NameVariantsSource for InMemoryGazetteer {
    async fn select_name_variants(
        &self,
        name_type: NameType,
        name: &str,
    ) -> Result<NameVariants, DomainError> {
        let table = match name_type {
            NameType::Given => &self.given_variants,
            NameType::Surname => &self.surname_variants,
        };
        table
            .get(name)
            .map(|variants| NameVariants {
                name: name.to_string(),
                variants: variants.clone(),
            })
            .ok_or_else(|| DomainError::not_found(format!("{}_variants", name_type.as_str()), name))
    }
}
