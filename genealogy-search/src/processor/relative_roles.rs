//! Which roles on a record supply the names of a role's relatives.

use genealogy_search_shared::{Relative, Role};

use Role::*;

const NONE: &[Role] = &[];

/// Roles whose names become `relative`'s names on the document for `role`.
///
/// # Examples
///
/// ```
/// use genealogy_search::processor::relative_roles;
/// use genealogy_search_shared::{Relative, Role};
///
/// assert_eq!(relative_roles(Role::Bride, Relative::Father), &[Role::BrideFather]);
/// assert_eq!(relative_roles(Role::Father, Relative::Spouse), &[Role::Mother]);
/// ```
pub fn relative_roles(role: Role, relative: Relative) -> &'static [Role] {
    match (role, relative) {
        (Principal, Relative::Father) => &[Father],
        (Principal, Relative::Mother) => &[Mother],
        (Principal, Relative::Spouse) => &[Spouse],
        (Principal, Relative::Other) => &[
            Bride,
            Groom,
            BrideFather,
            BrideMother,
            GroomFather,
            GroomMother,
            Other,
        ],

        (Father, Relative::Spouse) => &[Mother],
        (Mother, Relative::Spouse) => &[Father],
        (Father | Mother, Relative::Other) => &[Principal],
        (Father | Mother, _) => NONE,

        (Spouse, Relative::Spouse) => &[Principal],
        (Spouse, Relative::Other) => &[Father, Mother],
        (Spouse, _) => NONE,

        (Bride, Relative::Father) => &[BrideFather],
        (Bride, Relative::Mother) => &[BrideMother],
        (Bride, Relative::Spouse) => &[Groom],
        (Bride, Relative::Other) => &[GroomFather, GroomMother, Other],

        (Groom, Relative::Father) => &[GroomFather],
        (Groom, Relative::Mother) => &[GroomMother],
        (Groom, Relative::Spouse) => &[Bride],
        (Groom, Relative::Other) => &[BrideFather, BrideMother, Other],

        (BrideFather, Relative::Spouse) => &[BrideMother],
        (BrideMother, Relative::Spouse) => &[BrideFather],
        (GroomFather, Relative::Spouse) => &[GroomMother],
        (GroomMother, Relative::Spouse) => &[GroomFather],
        (BrideFather | BrideMother | GroomFather | GroomMother, Relative::Other) => {
            &[Bride, Groom]
        }
        (BrideFather | BrideMother | GroomFather | GroomMother, _) => NONE,

        (Other, Relative::Other) => &[Principal, Bride, Groom],
        (Other, _) => NONE,
    }
}
