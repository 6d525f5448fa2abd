//! Household grouping and relative inference.
//!
//! Census-style collections list one person per record and tie records together with a
//! household number and a relationship-to-head column. The resolver groups a post's records
//! by household and, for a given record, finds the household members that stand as its
//! father, mother, spouse or other relative.

use std::collections::{BTreeMap, HashMap};

use genealogy_search_shared::{Record, RecordHousehold, Relative};

/// A record's relationship to the head of its household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelToHead {
    Head,
    Father,
    Mother,
    Spouse,
    Husband,
    Wife,
    Child,
    Son,
    Daughter,
    Other,
}

impl RelToHead {
    /// Parse a relationship column value; anything unrecognized is `Other`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "head" => RelToHead::Head,
            "father" => RelToHead::Father,
            "mother" => RelToHead::Mother,
            "spouse" => RelToHead::Spouse,
            "husband" => RelToHead::Husband,
            "wife" => RelToHead::Wife,
            "child" => RelToHead::Child,
            "son" => RelToHead::Son,
            "daughter" => RelToHead::Daughter,
            _ => RelToHead::Other,
        }
    }

    fn is_head_or_spouse(&self) -> bool {
        matches!(
            self,
            RelToHead::Head | RelToHead::Spouse | RelToHead::Husband | RelToHead::Wife
        )
    }
}

use RelToHead::*;

const NONE: &[RelToHead] = &[];
const ALL: &[RelToHead] = &[
    Head, Father, Mother, Spouse, Husband, Wife, Child, Son, Daughter, Other,
];
const SPOUSES: &[RelToHead] = &[Spouse, Husband, Wife];

/// Relationships to head whose records supply `relative`'s name for a record standing as
/// `rel` in the household.
pub fn relationships_to_head(rel: RelToHead, relative: Relative) -> &'static [RelToHead] {
    match (rel, relative) {
        (Head, Relative::Father) => &[Father],
        (Head, Relative::Mother) => &[Mother],
        (Head, Relative::Spouse) => SPOUSES,
        (Head, Relative::Other) => &[Child, Son, Daughter, Other],

        (Spouse | Husband | Wife, Relative::Spouse) => &[Head],
        (Spouse | Husband | Wife, Relative::Other) => &[Child, Son, Daughter, Father, Mother, Other],
        (Spouse | Husband | Wife, _) => NONE,

        (Child | Son | Daughter, Relative::Father) => &[Head, Spouse, Husband],
        (Child | Son | Daughter, Relative::Mother) => &[Head, Spouse, Wife],
        (Child | Son | Daughter, Relative::Spouse) => NONE,
        (Child | Son | Daughter, Relative::Other) => {
            &[Child, Son, Daughter, Father, Mother, Other]
        }

        (Father, Relative::Spouse) => &[Mother],
        (Father, Relative::Other) => &[Head, Spouse, Husband, Wife, Child, Son, Daughter, Other],
        (Mother, Relative::Spouse) => &[Father],
        (Mother, Relative::Other) => &[Head, Spouse, Husband, Wife, Child, Son, Daughter, Other],
        (Father | Mother, _) => NONE,

        (Other, Relative::Other) => ALL,
        (Other, _) => NONE,
    }
}

fn is_female(gender: &str) -> bool {
    matches!(gender.trim().to_lowercase().as_str(), "female" | "f")
}

fn is_male(gender: &str) -> bool {
    matches!(gender.trim().to_lowercase().as_str(), "male" | "m")
}

/// Column headers a collection uses for household data.
#[derive(Debug, Clone, Copy)]
pub struct HouseholdHeaders<'a> {
    pub relationship: &'a str,
    pub gender: Option<&'a str>,
}

/// A post's records grouped by household.
#[derive(Debug, Default)]
pub struct HouseholdIndex<'a> {
    households: HashMap<&'a str, Vec<&'a Record>>,
    membership: HashMap<u32, &'a str>,
}

impl<'a> HouseholdIndex<'a> {
    /// Group `records` by the post's household entries.
    ///
    /// Members keep the order of the household's record IDs; IDs with no matching record
    /// are dropped.
    pub fn new(households: &'a [RecordHousehold], records: &'a [Record]) -> Self {
        let by_id: HashMap<u32, &Record> = records.iter().map(|r| (r.id, r)).collect();
        let mut index = HouseholdIndex::default();

        for household in households {
            let key = household.household_id.as_str();
            let members: Vec<&Record> = household
                .record_ids
                .iter()
                .filter_map(|id| by_id.get(id).copied())
                .collect();
            for member in &members {
                index.membership.insert(member.id, key);
            }
            index.households.insert(key, members);
        }
        index
    }

    /// Members of a household, in record-ID order of the household entry.
    pub fn household(&self, key: &str) -> &[&'a Record] {
        self.households.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The household a record belongs to, if any.
    pub fn household_of(&self, record_id: u32) -> Option<&'a str> {
        self.membership.get(&record_id).copied()
    }

    pub fn len(&self) -> usize {
        self.households.len()
    }

    pub fn is_empty(&self) -> bool {
        self.households.is_empty()
    }

    /// Household members that stand as each relative of `record`.
    pub fn relatives_of(
        &self,
        record: &Record,
        headers: HouseholdHeaders<'_>,
    ) -> BTreeMap<Relative, Vec<&'a Record>> {
        let mut relatives = BTreeMap::new();
        let Some(key) = self.household_of(record.id) else {
            return relatives;
        };
        let rel = rel_to_head(record, headers);

        for relative in Relative::ALL {
            let wanted = relationships_to_head(rel, relative);
            if wanted.is_empty() {
                continue;
            }
            let members: Vec<&Record> = self
                .household(key)
                .iter()
                .copied()
                .filter(|member| member.id != record.id)
                .filter(|member| {
                    let member_rel = rel_to_head(member, headers);
                    wanted.contains(&member_rel)
                        && passes_gender_guard(member, member_rel, relative, headers)
                })
                .collect();
            if !members.is_empty() {
                relatives.insert(relative, members);
            }
        }
        relatives
    }
}

fn rel_to_head(record: &Record, headers: HouseholdHeaders<'_>) -> RelToHead {
    record
        .value(headers.relationship)
        .map(RelToHead::parse)
        .unwrap_or(RelToHead::Other)
}

/// A head or spouse only stands as father when not female and as mother when not male.
fn passes_gender_guard(
    candidate: &Record,
    candidate_rel: RelToHead,
    relative: Relative,
    headers: HouseholdHeaders<'_>,
) -> bool {
    if !candidate_rel.is_head_or_spouse() {
        return true;
    }
    let Some(gender) = headers.gender.and_then(|h| candidate.value(h)) else {
        return true;
    };
    match relative {
        Relative::Father => !is_female(gender),
        Relative::Mother => !is_male(gender),
        _ => true,
    }
}
