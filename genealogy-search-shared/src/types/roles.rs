//! Roles, indexable fields, event types and relative kinds.
//!
//! The role table is fixed: the principal's document key is the bare record ID, every other
//! role appends `_<suffix>`.

use serde::{Deserialize, Serialize};

/// The kin-role a record row plays in a collection mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Principal,
    Father,
    Mother,
    Spouse,
    Bride,
    Groom,
    BrideFather,
    BrideMother,
    GroomFather,
    GroomMother,
    Other,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Principal,
        Role::Father,
        Role::Mother,
        Role::Spouse,
        Role::Bride,
        Role::Groom,
        Role::BrideFather,
        Role::BrideMother,
        Role::GroomFather,
        Role::GroomMother,
        Role::Other,
    ];

    /// Document-key suffix for this role.
    pub fn suffix(&self) -> &'static str {
        match self {
            Role::Principal => "",
            Role::Father => "f",
            Role::Mother => "m",
            Role::Spouse => "s",
            Role::Bride => "b",
            Role::Groom => "g",
            Role::BrideFather => "bf",
            Role::BrideMother => "bm",
            Role::GroomFather => "gf",
            Role::GroomMother => "gm",
            Role::Other => "o",
        }
    }

    /// Reverse of [`Role::suffix`].
    pub fn from_suffix(suffix: &str) -> Option<Role> {
        Role::ALL.iter().copied().find(|r| r.suffix() == suffix)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Principal => "principal",
            Role::Father => "father",
            Role::Mother => "mother",
            Role::Spouse => "spouse",
            Role::Bride => "bride",
            Role::Groom => "groom",
            Role::BrideFather => "brideFather",
            Role::BrideMother => "brideMother",
            Role::GroomFather => "groomFather",
            Role::GroomMother => "groomMother",
            Role::Other => "other",
        }
    }

    /// The role whose marriage fields this role shares.
    pub fn marriage_partner(&self) -> Option<Role> {
        match self {
            Role::Principal => Some(Role::Spouse),
            Role::Spouse => Some(Role::Principal),
            Role::Father => Some(Role::Mother),
            Role::Mother => Some(Role::Father),
            Role::Bride => Some(Role::Groom),
            Role::Groom => Some(Role::Bride),
            Role::BrideFather => Some(Role::BrideMother),
            Role::BrideMother => Some(Role::BrideFather),
            Role::GroomFather => Some(Role::GroomMother),
            Role::GroomMother => Some(Role::GroomFather),
            Role::Other => None,
        }
    }

    /// Document ID for a record playing this role.
    pub fn document_id(&self, record_id: u32) -> String {
        match self {
            Role::Principal => record_id.to_string(),
            _ => format!("{}_{}", record_id, self.suffix()),
        }
    }

    /// Split a document ID into its record ID and role.
    pub fn parse_document_id(doc_id: &str) -> Option<(u32, Role)> {
        let (record, suffix) = match doc_id.split_once('_') {
            Some((record, suffix)) => (record, suffix),
            None => (doc_id, ""),
        };
        let record_id = record.parse::<u32>().ok()?;
        let role = Role::from_suffix(suffix)?;
        Some((record_id, role))
    }
}

/// The indexable field a mapped column feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IxField {
    Given,
    Surname,
    BirthDate,
    BirthPlace,
    MarriageDate,
    MarriagePlace,
    ResidenceDate,
    ResidencePlace,
    DeathDate,
    DeathPlace,
    OtherDate,
    OtherPlace,
    Keywords,
}

impl IxField {
    pub fn is_marriage_field(&self) -> bool {
        matches!(self, IxField::MarriageDate | IxField::MarriagePlace)
    }
}

/// Event types carried on an indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Birth,
    Marriage,
    Residence,
    Death,
    Other,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::Birth,
        EventType::Marriage,
        EventType::Residence,
        EventType::Death,
        EventType::Other,
    ];

    /// Field-name prefix (`birth`, `marriage`, ...).
    pub fn prefix(&self) -> &'static str {
        match self {
            EventType::Birth => "birth",
            EventType::Marriage => "marriage",
            EventType::Residence => "residence",
            EventType::Death => "death",
            EventType::Other => "other",
        }
    }

    pub fn date_field(&self) -> IxField {
        match self {
            EventType::Birth => IxField::BirthDate,
            EventType::Marriage => IxField::MarriageDate,
            EventType::Residence => IxField::ResidenceDate,
            EventType::Death => IxField::DeathDate,
            EventType::Other => IxField::OtherDate,
        }
    }

    pub fn place_field(&self) -> IxField {
        match self {
            EventType::Birth => IxField::BirthPlace,
            EventType::Marriage => IxField::MarriagePlace,
            EventType::Residence => IxField::ResidencePlace,
            EventType::Death => IxField::DeathPlace,
            EventType::Other => IxField::OtherPlace,
        }
    }
}

/// Relatives named on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relative {
    Father,
    Mother,
    Spouse,
    Other,
}

impl Relative {
    pub const ALL: [Relative; 4] = [
        Relative::Father,
        Relative::Mother,
        Relative::Spouse,
        Relative::Other,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Relative::Father => "father",
            Relative::Mother => "mother",
            Relative::Spouse => "spouse",
            Relative::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids() {
        assert_eq!(Role::Principal.document_id(12), "12");
        assert_eq!(Role::BrideFather.document_id(12), "12_bf");
        assert_eq!(Role::Other.document_id(7), "7_o");
    }

    #[test]
    fn test_parse_document_id() {
        assert_eq!(Role::parse_document_id("12"), Some((12, Role::Principal)));
        assert_eq!(Role::parse_document_id("12_gm"), Some((12, Role::GroomMother)));
        assert_eq!(Role::parse_document_id("12_zz"), None);
        assert_eq!(Role::parse_document_id("abc"), None);
    }

    #[test]
    fn test_suffixes_are_unique() {
        for a in Role::ALL {
            for b in Role::ALL {
                if a != b {
                    assert_ne!(a.suffix(), b.suffix());
                }
            }
        }
    }

    #[test]
    fn test_marriage_partner_is_symmetric() {
        for role in Role::ALL {
            if let Some(partner) = role.marriage_partner() {
                assert_eq!(partner.marriage_partner(), Some(role));
            }
        }
    }

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&Role::BrideFather).unwrap();
        assert_eq!(json, "\"brideFather\"");
        let field: IxField = serde_json::from_str("\"residencePlace\"").unwrap();
        assert_eq!(field, IxField::ResidencePlace);
    }
}
