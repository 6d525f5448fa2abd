//! Place standardization against the gazetteer.
//!
//! Free text such as `"Autauga Co., AL, USA"` is split into comma-separated levels, each
//! level is normalized (folded, lowercased, abbreviations expanded, noise words dropped),
//! and candidate places are found by intersecting the place-word index for the most
//! specific level that has any match. Candidates are scored by the level weights of their
//! country's size class, a primary-name bonus, every less specific level found among their
//! ancestors, and a bonus when they lie inside the default container.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use genealogy_search_repository::Gazetteer;
use genealogy_search_shared::{DomainError, Place, PlaceSettings};

use crate::standardize::batcher::{BatchLoader, Batcher, BatcherConfig};
use crate::text::fold_lower;

/// Upper bound on ancestor hops when walking a place's hierarchy.
const MAX_ANCESTOR_DEPTH: usize = 10;

/// Loads places by ID for the place batcher.
struct PlaceLoader(Arc<dyn Gazetteer>);

#[async_trait]
impl BatchLoader<u32, Place> for PlaceLoader {
    async fn load(&self, ids: Vec<u32>) -> Result<HashMap<u32, Place>, DomainError> {
        let places = self.0.select_places_by_id(&ids).await?;
        Ok(places.into_iter().map(|p| (p.id, p)).collect())
    }
}

/// Loads place IDs by word for the place-word batcher.
///
/// Every requested word gets an entry, empty when the gazetteer does not know it, so
/// unknown words are cached too.
struct PlaceWordLoader(Arc<dyn Gazetteer>);

#[async_trait]
impl BatchLoader<String, Vec<u32>> for PlaceWordLoader {
    async fn load(&self, words: Vec<String>) -> Result<HashMap<String, Vec<u32>>, DomainError> {
        let mut found: HashMap<String, Vec<u32>> = self
            .0
            .select_place_words_by_word(&words)
            .await?
            .into_iter()
            .map(|w| (w.word, w.ids))
            .collect();
        for word in words {
            found.entry(word).or_default();
        }
        Ok(found)
    }
}

/// One normalized level of the input text.
#[derive(Debug, Clone, PartialEq)]
struct Level {
    /// Every normalized word.
    words: Vec<String>,
    /// Words used for the word-index lookup (type words removed unless nothing else is left).
    lookup: Vec<String>,
}

/// A scored candidate.
#[derive(Debug)]
struct Candidate {
    place: Place,
    score: f64,
}

/// Resolves free-text places to gazetteer entries.
pub struct PlaceStandardizer {
    places: Batcher<u32, Place>,
    words: Batcher<String, Vec<u32>>,
    settings: PlaceSettings,
}

impl PlaceStandardizer {
    /// Create a standardizer, reading the place settings from the gazetteer.
    pub async fn new(gazetteer: Arc<dyn Gazetteer>) -> Result<Self, DomainError> {
        let settings = gazetteer.select_place_settings().await?;
        Ok(Self::with_settings(
            gazetteer,
            settings,
            BatcherConfig::default(),
        ))
    }

    /// Create a standardizer with explicit settings and batching configuration.
    ///
    /// Spawns the two batcher listener tasks, so it must be called from within a tokio
    /// runtime.
    pub fn with_settings(
        gazetteer: Arc<dyn Gazetteer>,
        settings: PlaceSettings,
        config: BatcherConfig,
    ) -> Self {
        let places = Batcher::spawn(
            "place",
            Arc::new(PlaceLoader(Arc::clone(&gazetteer))),
            config.clone(),
        );
        let words = Batcher::spawn("place_word", Arc::new(PlaceWordLoader(gazetteer)), config);
        Self {
            places,
            words,
            settings,
        }
    }

    pub fn settings(&self) -> &PlaceSettings {
        &self.settings
    }

    /// Look up one place by ID.
    pub async fn get_place(&self, id: u32) -> Result<Option<Place>, DomainError> {
        self.places.get(id).await
    }

    /// Look up several places by ID; unknown IDs are omitted.
    pub async fn get_places(&self, ids: &[u32]) -> Result<HashMap<u32, Place>, DomainError> {
        self.places.get_many(ids).await
    }

    /// IDs of the places whose names contain `word`; empty when unknown.
    pub async fn get_place_word(&self, word: &str) -> Result<Vec<u32>, DomainError> {
        Ok(self
            .words
            .get(word.to_string())
            .await?
            .unwrap_or_default())
    }

    /// Stop both batchers.
    pub fn shutdown(&self) {
        self.places.shutdown();
        self.words.shutdown();
    }

    /// Resolve free text to a place.
    ///
    /// # Arguments
    ///
    /// * `text` - Comma-separated place text, most specific level first
    /// * `default_container` - Place the text is expected to lie in, if known
    ///
    /// # Returns
    ///
    /// * `Ok(Place)` - The best match, or a synthetic leaf under `default_container` when
    ///   nothing matches
    /// * `Err(DomainError::NotFound)` - When nothing matches and there is no container
    pub async fn standardize(
        &self,
        text: &str,
        default_container: Option<&Place>,
    ) -> Result<Place, DomainError> {
        let levels = self.normalize_levels(text);

        for (index, level) in levels.iter().enumerate() {
            let ids = self.candidate_ids(level).await?;
            if ids.is_empty() {
                continue;
            }
            let mut candidates = Vec::with_capacity(ids.len());
            for place in self.get_places(&ids).await?.into_values() {
                let score = self
                    .score(&place, level, &levels[index + 1..], default_container)
                    .await?;
                candidates.push(Candidate { place, score });
            }

            let best = candidates.into_iter().max_by(|a, b| {
                a.score
                    .total_cmp(&b.score)
                    .then(a.place.count.cmp(&b.place.count))
                    .then(b.place.id.cmp(&a.place.id))
            });
            if let Some(best) = best {
                debug!(text = %text, place_id = best.place.id, score = best.score, "Standardized place");
                return Ok(best.place);
            }
        }

        match default_container {
            Some(container) => Ok(synthetic_leaf(text, container)),
            None => Err(DomainError::not_found("place", text)),
        }
    }

    fn normalize_levels(&self, text: &str) -> Vec<Level> {
        text.split(',')
            .map(|raw| self.normalize_level(raw))
            .filter(|level| !level.words.is_empty())
            .collect()
    }

    fn normalize_level(&self, raw: &str) -> Level {
        let folded = fold_lower(raw);
        let words: Vec<String> = folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| {
                self.settings
                    .abbreviations
                    .get(w)
                    .cloned()
                    .unwrap_or_else(|| w.to_string())
            })
            .flat_map(|w| w.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|w| !self.settings.noise_words.contains(w))
            .collect();

        let lookup: Vec<String> = words
            .iter()
            .filter(|w| !self.settings.type_words.contains(w))
            .cloned()
            .collect();
        let lookup = if lookup.is_empty() {
            words.clone()
        } else {
            lookup
        };

        Level { words, lookup }
    }

    /// Places containing every lookup word of the level.
    async fn candidate_ids(&self, level: &Level) -> Result<Vec<u32>, DomainError> {
        let unique: Vec<String> = level
            .lookup
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let found = self.words.get_many(&unique).await?;

        let mut ids: Option<BTreeSet<u32>> = None;
        for word in &unique {
            let word_ids: BTreeSet<u32> = found
                .get(word)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default();
            ids = Some(match ids {
                Some(current) => current.intersection(&word_ids).copied().collect(),
                None => word_ids,
            });
        }
        Ok(ids.unwrap_or_default().into_iter().collect())
    }

    fn name_words(&self, name: &str) -> Vec<String> {
        self.normalize_level(name).lookup
    }

    /// Whether a place's own name or any alternate name covers the level.
    fn covers(&self, place: &Place, level: &Level) -> bool {
        std::iter::once(&place.name)
            .chain(place.alt_names.iter())
            .any(|name| {
                let words: HashSet<String> = self.name_words(name).into_iter().collect();
                level.lookup.iter().all(|w| words.contains(w))
            })
    }

    async fn ancestors(&self, place: &Place) -> Result<Vec<Place>, DomainError> {
        let mut seen: HashSet<u32> = HashSet::from([place.id]);
        let mut frontier: Vec<u32> = place.parent_ids().collect();
        let mut ancestors = Vec::new();

        for _ in 0..MAX_ANCESTOR_DEPTH {
            frontier.retain(|id| seen.insert(*id));
            if frontier.is_empty() {
                break;
            }
            let parents = self.get_places(&frontier).await?;
            frontier = parents.values().flat_map(|p| p.parent_ids()).collect();
            ancestors.extend(parents.into_values());
        }
        Ok(ancestors)
    }

    async fn score(
        &self,
        place: &Place,
        level: &Level,
        higher_levels: &[Level],
        default_container: Option<&Place>,
    ) -> Result<f64, DomainError> {
        let settings = &self.settings;
        let mut score = settings.level_weight(place.country_id, place.level);
        if self.name_words(&place.name) == level.lookup {
            score += settings.primary_match_weight;
        }

        if higher_levels.is_empty() && default_container.is_none() {
            return Ok(score);
        }

        let ancestors = self.ancestors(place).await?;
        for higher in higher_levels {
            if let Some(matched) = ancestors.iter().find(|a| self.covers(a, higher)) {
                score += settings.level_weight(matched.country_id, matched.level);
            }
        }
        if let Some(container) = default_container {
            if place.id == container.id || ancestors.iter().any(|a| a.id == container.id) {
                score += settings.level_weight(container.country_id, container.level);
            }
        }
        Ok(score)
    }

    /// Accumulated levels of a standardized place, least specific first.
    ///
    /// # Examples
    ///
    /// ```
    /// use genealogy_search::standardize::PlaceStandardizer;
    ///
    /// assert_eq!(
    ///     PlaceStandardizer::place_levels("Autauga, Alabama, United States"),
    ///     vec!["United States", "United States,Alabama", "United States,Alabama,Autauga"],
    /// );
    /// ```
    pub fn place_levels(std_place: &str) -> Vec<String> {
        let mut levels = Vec::new();
        let mut current = String::new();
        for component in Self::place_facets(std_place) {
            if !current.is_empty() {
                current.push(',');
            }
            current.push_str(&component);
            levels.push(current.clone());
        }
        levels
    }

    /// Individual components of a standardized place, least specific first.
    pub fn place_facets(std_place: &str) -> Vec<String> {
        std_place
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .rev()
            .map(str::to_string)
            .collect()
    }
}

/// A place for text the gazetteer does not know, attached below its container.
fn synthetic_leaf(text: &str, container: &Place) -> Place {
    let leaf = text
        .split(',')
        .map(str::trim)
        .find(|c| !c.is_empty())
        .unwrap_or(text)
        .to_string();
    Place {
        id: 0,
        full_name: format!("{}, {}", leaf, container.full_name),
        name: leaf,
        located_in_id: container.id,
        level: container.level + 1,
        country_id: container.country_id,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genealogy_search_repository::InMemoryGazetteer;
    use std::collections::BTreeMap;

    fn place(id: u32, name: &str, full_name: &str, parent: u32, level: u32, count: u32) -> Place {
        Place {
            id,
            name: name.to_string(),
            full_name: full_name.to_string(),
            located_in_id: parent,
            level,
            country_id: 1,
            count,
            ..Default::default()
        }
    }

    fn settings() -> PlaceSettings {
        let mut abbreviations = BTreeMap::new();
        abbreviations.insert("al".to_string(), "alabama".to_string());
        abbreviations.insert("co".to_string(), "county".to_string());
        PlaceSettings {
            abbreviations,
            type_words: vec!["county".to_string()],
            noise_words: vec!["of".to_string()],
            large_country_ids: vec![1],
            large_level_weights: vec![1.0, 2.0, 3.0, 4.0],
            primary_match_weight: 1.0,
            us_country_id: 1,
            ..Default::default()
        }
    }

    fn gazetteer() -> Arc<InMemoryGazetteer> {
        let mut us = place(1, "United States", "United States", 0, 1, 100);
        us.alt_names = vec!["USA".to_string()];
        let mut places = vec![
            us,
            place(2, "Alabama", "Alabama, United States", 1, 2, 50),
            place(3, "Autauga", "Autauga, Alabama, United States", 2, 3, 5),
            place(4, "Georgia", "Georgia, United States", 1, 2, 60),
            place(5, "Autauga", "Autauga, Georgia, United States", 4, 3, 9),
        ];
        for id in 10..40 {
            places.push(place(id, &format!("Town{}", id), "", 2, 4, 1));
        }
        Arc::new(InMemoryGazetteer::new(settings()).with_places(places))
    }

    #[tokio::test(start_paused = true)]
    async fn test_higher_levels_disambiguate() {
        let standardizer = PlaceStandardizer::new(gazetteer()).await.unwrap();

        let place = standardizer.standardize("Autauga, Alabama", None).await.unwrap();
        assert_eq!(place.id, 3);
        assert_eq!(place.full_name, "Autauga, Alabama, United States");

        let place = standardizer.standardize("Autauga", None).await.unwrap();
        assert_eq!(place.id, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abbreviations_type_words_and_alt_names() {
        let standardizer = PlaceStandardizer::new(gazetteer()).await.unwrap();

        let place = standardizer
            .standardize("Autauga Co., AL, USA", None)
            .await
            .unwrap();
        assert_eq!(place.id, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_container_breaks_ties() {
        let standardizer = PlaceStandardizer::new(gazetteer()).await.unwrap();
        let alabama = standardizer.get_place(2).await.unwrap().unwrap();

        let place = standardizer
            .standardize("Autauga", Some(&alabama))
            .await
            .unwrap();
        assert_eq!(place.id, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_leaf_falls_back_to_known_level() {
        let standardizer = PlaceStandardizer::new(gazetteer()).await.unwrap();

        let place = standardizer
            .standardize("Nowhereville, Alabama", None)
            .await
            .unwrap();
        assert_eq!(place.id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthetic_leaf_under_container() {
        let standardizer = PlaceStandardizer::new(gazetteer()).await.unwrap();
        let alabama = standardizer.get_place(2).await.unwrap().unwrap();

        let place = standardizer
            .standardize("Nowhereville", Some(&alabama))
            .await
            .unwrap();
        assert_eq!(place.id, 0);
        assert_eq!(place.full_name, "Nowhereville, Alabama, United States");
        assert_eq!(place.level, 3);
        assert_eq!(place.located_in_id, 2);

        let err = standardizer.standardize("Nowhereville", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simultaneous_place_lookups_share_batches() {
        let gazetteer = gazetteer();
        let standardizer = PlaceStandardizer::with_settings(
            gazetteer.clone(),
            settings(),
            BatcherConfig::default(),
        );

        let ids: Vec<u32> = (1..=5).chain(10..43).collect();
        assert_eq!(ids.len(), 38);
        let results =
            futures::future::join_all(ids.iter().map(|id| standardizer.get_place(*id))).await;

        for (id, result) in ids.iter().zip(results) {
            let found = result.unwrap();
            if *id < 40 {
                assert_eq!(found.unwrap().id, *id);
            } else {
                assert!(found.is_none());
            }
        }
        let mut batches = gazetteer.place_batch_sizes();
        batches.sort_unstable();
        assert_eq!(batches, vec![18, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simultaneous_word_lookups_share_batches() {
        let gazetteer = gazetteer();
        let standardizer = PlaceStandardizer::with_settings(
            gazetteer.clone(),
            settings(),
            BatcherConfig::default(),
        );

        let words: Vec<String> = (10..48).map(|id| format!("town{}", id)).collect();
        let results =
            futures::future::join_all(words.iter().map(|w| standardizer.get_place_word(w))).await;

        assert_eq!(results[0].as_ref().unwrap(), &vec![10]);
        assert!(results[37].as_ref().unwrap().is_empty());
        let mut batches = gazetteer.word_batch_sizes();
        batches.sort_unstable();
        assert_eq!(batches, vec![18, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_words_are_cached() {
        let gazetteer = gazetteer();
        let standardizer = PlaceStandardizer::with_settings(
            gazetteer.clone(),
            settings(),
            BatcherConfig::default(),
        );

        assert!(standardizer.get_place_word("atlantis").await.unwrap().is_empty());
        assert!(standardizer.get_place_word("atlantis").await.unwrap().is_empty());
        assert_eq!(standardizer.get_place_word("alabama").await.unwrap(), vec![2]);
        assert_eq!(standardizer.get_place_word("alabama").await.unwrap(), vec![2]);
        assert_eq!(gazetteer.word_calls(), 2);
    }

    #[test]
    fn test_place_levels_and_facets() {
        assert_eq!(
            PlaceStandardizer::place_levels("Autauga, Alabama, United States"),
            vec![
                "United States".to_string(),
                "United States,Alabama".to_string(),
                "United States,Alabama,Autauga".to_string(),
            ]
        );
        assert_eq!(
            PlaceStandardizer::place_facets("Autauga, Alabama, United States"),
            vec![
                "United States".to_string(),
                "Alabama".to_string(),
                "Autauga".to_string(),
            ]
        );
        assert!(PlaceStandardizer::place_levels(" , ").is_empty());
    }
}
