//! Record processor implementation.
//!
//! Builds the [`IndexedDocument`]s for each role found on a record: the role's names, the
//! names of its relatives (on the record and, for the principal, in its household), its
//! standardized events, and the collection and tenant fields shared by every document of
//! the post.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use genealogy_search_shared::{
    Category, Collection, DomainError, EventFields, EventType, IndexedDocument, IxField, Place,
    Post, Record, Relative, RelativeNames, Role, MAX_COLLECTION_PLACE_LEVELS, MAX_PLACE_LEVELS,
    PRIVACY_PUBLIC,
};

use crate::household::{HouseholdHeaders, HouseholdIndex};
use crate::processor::relative_roles::relative_roles;
use crate::standardize::{parse_std_date, standardize_date, PlaceStandardizer};

/// Headers feeding each index field for one role.
type RoleFields<'a> = BTreeMap<IxField, Vec<&'a str>>;

/// Everything shared by the documents of one post.
pub struct PostScope<'a> {
    pub post: &'a Post,
    pub collection: &'a Collection,
    pub categories: Vec<String>,
    /// Standardized collection location, used as the container for place text.
    pub container: Option<Place>,
    pub collection_places: Vec<String>,
    roles: BTreeMap<Role, RoleFields<'a>>,
    /// Levels for each place text standardized so far; `None` when it did not resolve.
    places: HashMap<String, Option<Vec<String>>>,
}

impl<'a> PostScope<'a> {
    /// Roles the collection maps at least one column to.
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.keys().copied()
    }

    fn fields(&self, role: Role) -> Option<&RoleFields<'a>> {
        self.roles.get(&role)
    }
}

/// Group the collection's mappings by role, sharing marriage fields with the partner role
/// when a role has none of its own.
fn role_fields(collection: &Collection) -> BTreeMap<Role, RoleFields<'_>> {
    let mut roles: BTreeMap<Role, RoleFields<'_>> = BTreeMap::new();
    for mapping in &collection.mappings {
        roles
            .entry(mapping.ix_role)
            .or_default()
            .entry(mapping.ix_field)
            .or_default()
            .push(mapping.header.as_str());
    }

    let mut shared: Vec<(Role, IxField, Vec<&str>)> = Vec::new();
    for (role, fields) in &roles {
        let Some(partner) = role.marriage_partner() else {
            continue;
        };
        for (field, headers) in fields.iter().filter(|(f, _)| f.is_marriage_field()) {
            let partner_has = roles
                .get(&partner)
                .is_some_and(|p| p.contains_key(field));
            if !partner_has {
                shared.push((partner, *field, headers.clone()));
            }
        }
    }
    for (role, field, headers) in shared {
        roles.entry(role).or_default().insert(field, headers);
    }
    roles
}

fn values<'r>(record: &'r Record, fields: &RoleFields<'_>, field: IxField) -> Vec<&'r str> {
    fields
        .get(&field)
        .map(|headers| headers.iter().filter_map(|h| record.value(h)).collect())
        .unwrap_or_default()
}

fn joined(record: &Record, fields: &RoleFields<'_>, field: IxField) -> String {
    values(record, fields, field).join(" ")
}

/// Append the whitespace-separated tokens of `value` not already present.
fn push_unique(tokens: &mut Vec<String>, value: &str) {
    for token in value.split_whitespace() {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
}

/// Turns records into search documents.
pub struct RecordProcessor {
    standardizer: Arc<PlaceStandardizer>,
}

impl RecordProcessor {
    pub fn new(standardizer: Arc<PlaceStandardizer>) -> Self {
        Self { standardizer }
    }

    /// Prepare the fields shared by every document of a post.
    ///
    /// An unresolvable collection location is logged and leaves the container and
    /// collection place facets empty.
    pub async fn scope<'a>(
        &self,
        post: &'a Post,
        collection: &'a Collection,
        categories: &[Category],
    ) -> Result<PostScope<'a>, DomainError> {
        let mut container = None;
        let mut collection_places = Vec::new();

        if let Some(location) = collection.location.as_deref().filter(|l| !l.trim().is_empty()) {
            match self.standardizer.standardize(location, None).await {
                Ok(place) => {
                    collection_places = PlaceStandardizer::place_facets(&place.full_name);
                    collection_places.truncate(MAX_COLLECTION_PLACE_LEVELS);
                    container = Some(place);
                }
                Err(e) if e.is_not_found() => {
                    warn!(
                        collection_id = collection.id,
                        location = %location,
                        "Collection location did not resolve"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(PostScope {
            post,
            collection,
            categories: categories.iter().map(|c| c.name.clone()).collect(),
            container,
            collection_places,
            roles: role_fields(collection),
            places: HashMap::new(),
        })
    }

    /// Build the documents for every role on `record` that carries a name.
    ///
    /// # Arguments
    ///
    /// * `scope` - Post-wide fields from [`RecordProcessor::scope`]
    /// * `record` - The record to process
    /// * `households` - The post's households, used for the principal's relatives
    ///
    /// # Returns
    ///
    /// The documents in role order; empty when no role has a name.
    #[instrument(skip_all, fields(record_id = record.id))]
    pub async fn process_record(
        &self,
        scope: &mut PostScope<'_>,
        record: &Record,
        households: &HouseholdIndex<'_>,
    ) -> Result<Vec<IndexedDocument>, DomainError> {
        let mut documents = Vec::new();
        let roles: Vec<Role> = scope.roles().collect();

        for role in roles {
            if let Some(doc) = self.process_role(scope, record, role, households).await? {
                documents.push(doc);
            }
        }

        debug!(documents = documents.len(), "Processed record");
        Ok(documents)
    }

    async fn process_role(
        &self,
        scope: &mut PostScope<'_>,
        record: &Record,
        role: Role,
        households: &HouseholdIndex<'_>,
    ) -> Result<Option<IndexedDocument>, DomainError> {
        let Some(fields) = scope.fields(role).cloned() else {
            return Ok(None);
        };
        let given = joined(record, &fields, IxField::Given);
        let surname = joined(record, &fields, IxField::Surname);
        if given.is_empty() && surname.is_empty() {
            return Ok(None);
        }

        let relatives = self.relatives(scope, record, role, households);
        let mut events = BTreeMap::new();
        for event in EventType::ALL {
            let event_fields = self.event_fields(scope, record, &fields, event).await?;
            if !event_fields.is_empty() {
                events.insert(event, event_fields);
            }
        }
        let keywords = Some(joined(record, &fields, IxField::Keywords)).filter(|k| !k.is_empty());

        let collection = scope.collection;
        Ok(Some(IndexedDocument {
            id: role.document_id(record.id),
            given,
            surname,
            relatives,
            events,
            keywords,
            post: scope.post.id,
            category: scope.categories.clone(),
            collection: collection.name.clone(),
            collection_id: collection.id,
            society_id: collection.society_id,
            collection_places: scope.collection_places.clone(),
            last_modified: Utc::now().timestamp_millis().to_string(),
            privacy: collection
                .privacy_level
                .is_public_search()
                .then(|| PRIVACY_PUBLIC.to_string()),
        }))
    }

    fn relatives(
        &self,
        scope: &PostScope<'_>,
        record: &Record,
        role: Role,
        households: &HouseholdIndex<'_>,
    ) -> BTreeMap<Relative, RelativeNames> {
        let mut given: BTreeMap<Relative, Vec<String>> = BTreeMap::new();
        let mut surname: BTreeMap<Relative, Vec<String>> = BTreeMap::new();

        for relative in Relative::ALL {
            for source in relative_roles(role, relative) {
                if let Some(fields) = scope.fields(*source) {
                    for value in values(record, fields, IxField::Given) {
                        push_unique(given.entry(relative).or_default(), value);
                    }
                    for value in values(record, fields, IxField::Surname) {
                        push_unique(surname.entry(relative).or_default(), value);
                    }
                }
            }
        }

        let relationship = scope.collection.household_relationship_header.as_deref();
        if let (Role::Principal, Some(relationship), Some(principal)) =
            (role, relationship, scope.fields(Role::Principal))
        {
            let headers = HouseholdHeaders {
                relationship,
                gender: scope.collection.gender_header.as_deref(),
            };
            for (relative, members) in households.relatives_of(record, headers) {
                for member in members {
                    for value in values(member, principal, IxField::Given) {
                        push_unique(given.entry(relative).or_default(), value);
                    }
                    for value in values(member, principal, IxField::Surname) {
                        push_unique(surname.entry(relative).or_default(), value);
                    }
                }
            }
        }

        Relative::ALL
            .into_iter()
            .map(|relative| {
                let names = RelativeNames {
                    given: given.remove(&relative).unwrap_or_default().join(" "),
                    surname: surname.remove(&relative).unwrap_or_default().join(" "),
                };
                (relative, names)
            })
            .filter(|(_, names)| !names.is_empty())
            .collect()
    }

    async fn event_fields(
        &self,
        scope: &mut PostScope<'_>,
        record: &Record,
        fields: &RoleFields<'_>,
        event: EventType,
    ) -> Result<EventFields, DomainError> {
        let mut result = EventFields::default();

        let date_header = fields
            .get(&event.date_field())
            .and_then(|headers| headers.iter().find(|h| record.value(h).is_some()));
        if let Some(header) = date_header {
            let std = match record.std_value(header) {
                Some(std) => std.to_string(),
                None => standardize_date(record.value(header).unwrap_or_default()),
            };
            match parse_std_date(&std) {
                Some(parsed) => {
                    result.date_std = parsed.dates;
                    result.year = parsed.years;
                }
                None => debug!(header = %header, value = %std, "Unparsable standardized date"),
            }
        }

        let place_header = fields
            .get(&event.place_field())
            .and_then(|headers| headers.iter().find(|h| record.value(h).is_some()));
        if let Some(header) = place_header {
            let raw = record.value(header).unwrap_or_default();
            let levels = match record.std_value(header) {
                Some(std) => Some(PlaceStandardizer::place_levels(std)),
                None => self.standardized_levels(scope, raw).await?,
            };
            if let Some(mut levels) = levels.filter(|l| !l.is_empty()) {
                levels.truncate(MAX_PLACE_LEVELS);
                result.place = Some(raw.to_string());
                result.place_levels = levels;
            }
        }

        Ok(result)
    }

    /// Levels of a standardized place text, resolving each distinct text once per post.
    async fn standardized_levels(
        &self,
        scope: &mut PostScope<'_>,
        raw: &str,
    ) -> Result<Option<Vec<String>>, DomainError> {
        if let Some(levels) = scope.places.get(raw) {
            return Ok(levels.clone());
        }
        let levels = match self
            .standardizer
            .standardize(raw, scope.container.as_ref())
            .await
        {
            Ok(place) => Some(PlaceStandardizer::place_levels(&place.full_name)),
            Err(e) if e.is_not_found() => {
                debug!(place = %raw, "Place did not resolve");
                None
            }
            Err(e) => return Err(e),
        };
        scope.places.insert(raw.to_string(), levels.clone());
        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::BatcherConfig;
    use genealogy_search_repository::InMemoryGazetteer;
    use genealogy_search_shared::{
        CollectionMapping, ImagesStatus, PlaceSettings, PostStatus, PrivacyLevel, RecordHousehold,
    };

    fn standardizer() -> Arc<PlaceStandardizer> {
        let place = |id: u32, name: &str, full_name: &str, parent: u32, level: u32| Place {
            id,
            name: name.to_string(),
            full_name: full_name.to_string(),
            located_in_id: parent,
            level,
            country_id: 1,
            ..Default::default()
        };
        let gazetteer = InMemoryGazetteer::new(PlaceSettings::default()).with_places(vec![
            place(1, "United States", "United States", 0, 1),
            place(2, "Alabama", "Alabama, United States", 1, 2),
            place(3, "Autauga", "Autauga, Alabama, United States", 2, 3),
        ]);
        Arc::new(PlaceStandardizer::with_settings(
            Arc::new(gazetteer),
            PlaceSettings::default(),
            BatcherConfig::default(),
        ))
    }

    fn collection(mappings: Vec<CollectionMapping>) -> Collection {
        Collection {
            id: 2,
            society_id: 1,
            name: "Bedrock census".to_string(),
            category_ids: vec![1],
            mappings,
            household_number_header: Some("Household".to_string()),
            household_relationship_header: Some("Relationship".to_string()),
            gender_header: Some("Gender".to_string()),
            image_path_header: None,
            citation_template: String::new(),
            location: Some("Alabama".to_string()),
            privacy_level: PrivacyLevel::PUBLIC,
            last_modified: Utc::now(),
        }
    }

    fn post() -> Post {
        Post {
            id: 3,
            society_id: 1,
            collection_id: 2,
            name: "1900".to_string(),
            records_key: String::new(),
            images_key: String::new(),
            post_status: PostStatus::Publishing,
            images_status: ImagesStatus::ToLoad,
            post_error: None,
            last_modified: Utc::now(),
        }
    }

    fn category() -> Category {
        Category {
            id: 1,
            society_id: 1,
            name: "Census".to_string(),
            last_modified: Utc::now(),
        }
    }

    fn record(id: u32, data: &[(&str, &str)]) -> Record {
        Record {
            id,
            society_id: 1,
            post_id: 3,
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ix_hash: None,
            last_modified: Utc::now(),
        }
    }

    fn marriage_mappings() -> Vec<CollectionMapping> {
        vec![
            CollectionMapping::new("Given", Role::Principal, IxField::Given),
            CollectionMapping::new("Surname", Role::Principal, IxField::Surname),
            CollectionMapping::new("Birth Date", Role::Principal, IxField::BirthDate),
            CollectionMapping::new("Birth Place", Role::Principal, IxField::BirthPlace),
            CollectionMapping::new("Marriage Date", Role::Principal, IxField::MarriageDate),
            CollectionMapping::new("Marriage Place", Role::Principal, IxField::MarriagePlace),
            CollectionMapping::new("Spouse Given", Role::Spouse, IxField::Given),
            CollectionMapping::new("Spouse Surname", Role::Spouse, IxField::Surname),
            CollectionMapping::new("Father Given", Role::Father, IxField::Given),
            CollectionMapping::new("Mother Given", Role::Mother, IxField::Given),
            CollectionMapping::new("Notes", Role::Principal, IxField::Keywords),
        ]
    }

    async fn process(
        processor: &RecordProcessor,
        collection: &Collection,
        records: &[Record],
        households: &[RecordHousehold],
    ) -> Vec<IndexedDocument> {
        let post = post();
        let categories = vec![category()];
        let mut scope = processor
            .scope(&post, collection, &categories)
            .await
            .unwrap();
        let index = HouseholdIndex::new(households, records);
        let mut documents = Vec::new();
        for record in records {
            documents.extend(
                processor
                    .process_record(&mut scope, record, &index)
                    .await
                    .unwrap(),
            );
        }
        documents
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_fan_out_and_relatives() {
        let processor = RecordProcessor::new(standardizer());
        let collection = collection(marriage_mappings());
        let records = vec![record(
            7,
            &[
                ("Given", "Fred"),
                ("Surname", "Flintstone"),
                ("Spouse Given", "Wilma"),
                ("Spouse Surname", "Slaghoople"),
                ("Father Given", "Ed"),
                ("Mother Given", ""),
                ("Notes", "quarry worker"),
            ],
        )];

        let docs = process(&processor, &collection, &records, &[]).await;
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "7_f", "7_s"]);

        let principal = &docs[0];
        assert_eq!(principal.relative(Relative::Spouse).given, "Wilma");
        assert_eq!(principal.relative(Relative::Father).given, "Ed");
        assert!(principal.relative(Relative::Mother).is_empty());
        assert_eq!(principal.keywords.as_deref(), Some("quarry worker"));
        assert_eq!(principal.category, vec!["Census".to_string()]);
        assert_eq!(principal.collection_places, vec!["United States", "Alabama"]);
        assert_eq!(principal.privacy.as_deref(), Some(PRIVACY_PUBLIC));
        assert_eq!(principal.post, 3);

        let father = &docs[1];
        assert_eq!(father.relative(Relative::Other).given, "Fred");
        assert!(father.keywords.is_none());

        let spouse = &docs[2];
        assert_eq!(spouse.relative(Relative::Spouse).surname, "Flintstone");
        assert_eq!(spouse.relative(Relative::Other).given, "Ed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_names_skip_document() {
        let processor = RecordProcessor::new(standardizer());
        let collection = collection(marriage_mappings());
        let records = vec![record(8, &[("Given", " "), ("Spouse Given", "Betty")])];

        let docs = process(&processor, &collection, &records, &[]).await;
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["8_s"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_marriage_fields_are_mirrored_to_spouse() {
        let processor = RecordProcessor::new(standardizer());
        let collection = collection(marriage_mappings());
        let records = vec![record(
            9,
            &[
                ("Given", "Fred"),
                ("Spouse Given", "Wilma"),
                ("Marriage Date", "1920"),
                ("Marriage Date_std", "19200614"),
                ("Marriage Place", "Autauga"),
                ("Marriage Place_std", "Autauga, Alabama, United States"),
            ],
        )];

        let docs = process(&processor, &collection, &records, &[]).await;
        assert_eq!(docs.len(), 2);
        for doc in &docs {
            let marriage = &doc.events[&EventType::Marriage];
            assert_eq!(marriage.date_std, vec![19200614]);
            assert_eq!(marriage.year, vec![1920]);
            assert_eq!(marriage.place.as_deref(), Some("Autauga"));
            assert_eq!(
                marriage.place_levels,
                vec![
                    "United States",
                    "United States,Alabama",
                    "United States,Alabama,Autauga"
                ]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_raw_values_are_standardized() {
        let processor = RecordProcessor::new(standardizer());
        let collection = collection(marriage_mappings());
        let records = vec![record(
            10,
            &[
                ("Given", "Pebbles"),
                ("Birth Date", "abt 1900"),
                ("Birth Place", "Autauga"),
            ],
        )];

        let docs = process(&processor, &collection, &records, &[]).await;
        let birth = &docs[0].events[&EventType::Birth];
        assert_eq!(birth.date_std, vec![19000000]);
        assert_eq!(birth.year, vec![1898, 1899, 1900, 1901, 1902]);
        assert_eq!(birth.place_levels.len(), 3);
        assert_eq!(birth.place_levels[2], "United States,Alabama,Autauga");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparsable_values_are_omitted() {
        let processor = RecordProcessor::new(standardizer());
        let collection = collection(marriage_mappings());
        let records = vec![record(
            11,
            &[
                ("Given", "Dino"),
                ("Birth Date", "sometime"),
                ("Birth Date_std", "garbage"),
                ("Birth Place", "Somewhere"),
                ("Birth Place_std", " "),
            ],
        )];

        let docs = process(&processor, &collection, &records, &[]).await;
        // "Somewhere" is not in the gazetteer, so it becomes a leaf under Alabama.
        let birth = &docs[0].events[&EventType::Birth];
        assert!(birth.date_std.is_empty());
        assert_eq!(birth.place_levels[2], "United States,Alabama,Somewhere");
    }

    #[tokio::test(start_paused = true)]
    async fn test_household_supplies_principal_relatives() {
        let processor = RecordProcessor::new(standardizer());
        let collection = collection(vec![
            CollectionMapping::new("Given", Role::Principal, IxField::Given),
            CollectionMapping::new("Surname", Role::Principal, IxField::Surname),
        ]);
        let member = |id: u32, given: &str, rel: &str, gender: &str| {
            record(
                id,
                &[
                    ("Given", given),
                    ("Surname", "Flintstone"),
                    ("Relationship", rel),
                    ("Gender", gender),
                    ("Household", "H1"),
                ],
            )
        };
        let records = vec![
            member(1, "Fred", "head", "male"),
            member(2, "Wilma", "wife", "female"),
            member(3, "Pebbles", "child", "female"),
        ];
        let households = vec![RecordHousehold {
            society_id: 1,
            post_id: 3,
            household_id: "H1".to_string(),
            record_ids: vec![1, 2, 3],
            last_modified: Utc::now(),
        }];

        let docs = process(&processor, &collection, &records, &households).await;
        let pebbles = docs.iter().find(|d| d.id == "3").unwrap();
        assert_eq!(pebbles.relative(Relative::Father).given, "Fred");
        assert_eq!(pebbles.relative(Relative::Mother).given, "Wilma");
        assert_eq!(pebbles.relative(Relative::Father).surname, "Flintstone");

        let fred = docs.iter().find(|d| d.id == "1").unwrap();
        assert_eq!(fred.relative(Relative::Spouse).given, "Wilma");
        assert_eq!(fred.relative(Relative::Other).given, "Pebbles");
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_search_collections_omit_privacy() {
        let processor = RecordProcessor::new(standardizer());
        let mut collection = collection(marriage_mappings());
        collection.privacy_level = PrivacyLevel::PRIVATE_SEARCH;
        collection.location = None;
        let records = vec![record(12, &[("Given", "Bamm-Bamm")])];

        let docs = process(&processor, &collection, &records, &[]).await;
        assert!(docs[0].privacy.is_none());
        assert!(docs[0].collection_places.is_empty());
    }
}
