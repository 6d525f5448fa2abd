//! Name-variant reference data.

use serde::{Deserialize, Serialize};

/// Which variant table a name is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameType {
    Given,
    Surname,
}

impl NameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameType::Given => "given",
            NameType::Surname => "surname",
        }
    }
}

/// Known spelling and phonetic variants of a normalized name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameVariants {
    pub name: String,
    pub variants: Vec<String>,
}
