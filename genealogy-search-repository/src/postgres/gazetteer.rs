use async_trait::async_trait;
use sqlx::{types::Json, Row};

use genealogy_search_shared::{
    DomainError, NameType, NameVariants, Place, PlaceSettings, PlaceWord,
};

use super::{from_db_id, to_db_ids, PostgresStore};
use crate::errors::from_sqlx;
use crate::interfaces::{Gazetteer, NameVariantsSource};

/// The singleton settings row.
const PLACE_SETTINGS_ID: i32 = 1;

#[async_trait]
impl Gazetteer for PostgresStore {
    async fn select_places_by_id(&self, ids: &[u32]) -> Result<Vec<Place>, DomainError> {
        let rows = sqlx::query("SELECT id, body FROM place WHERE id = ANY($1)")
            .bind(to_db_ids(ids))
            .fetch_all(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "place", format!("{:?}", ids)))?;

        let mut places = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i32 = row.try_get("id").map_err(|e| from_sqlx(e, "place", 0))?;
            let body: Json<Place> = row
                .try_get("body")
                .map_err(|e| from_sqlx(e, "place", id))?;
            let mut place = body.0;
            place.id = from_db_id(id);
            places.push(place);
        }
        Ok(places)
    }

    async fn select_place_words_by_word(
        &self,
        words: &[String],
    ) -> Result<Vec<PlaceWord>, DomainError> {
        let rows = sqlx::query("SELECT word, ids FROM place_word WHERE word = ANY($1)")
            .bind(words)
            .fetch_all(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "place_word", words.join(",")))?;

        rows.iter()
            .map(|row| {
                let word: String = row.try_get("word")?;
                let ids: Vec<i32> = row.try_get("ids")?;
                Ok(PlaceWord {
                    word,
                    ids: ids.into_iter().map(from_db_id).collect(),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| from_sqlx(e, "place_word", 0))
    }

    async fn select_place_settings(&self) -> Result<PlaceSettings, DomainError> {
        let row = sqlx::query("SELECT body FROM place_settings WHERE id = $1")
            .bind(PLACE_SETTINGS_ID)
            .fetch_one(self.pool())
            .await
            .map_err(|e| from_sqlx(e, "place_settings", PLACE_SETTINGS_ID))?;
        let body: Json<PlaceSettings> = row
            .try_get("body")
            .map_err(|e| from_sqlx(e, "place_settings", PLACE_SETTINGS_ID))?;
        Ok(body.0)
    }
}

#[async_trait]
impl NameVariantsSource for PostgresStore {
    async fn select_name_variants(
        &self,
        name_type: NameType,
        name: &str,
    ) -> Result<NameVariants, DomainError> {
        let sql = match name_type {
            NameType::Given => "SELECT name, variants FROM givenname_variants WHERE name = $1",
            NameType::Surname => "SELECT name, variants FROM surname_variants WHERE name = $1",
        };
        let entity = format!("{}_variants", name_type.as_str());
        let row = sqlx::query(sql)
            .bind(name)
            .fetch_one(self.pool())
            .await
            .map_err(|e| from_sqlx(e, &entity, name))?;

        Ok(NameVariants {
            name: row.try_get("name").map_err(|e| from_sqlx(e, &entity, name))?,
            variants: row
                .try_get("variants")
                .map_err(|e| from_sqlx(e, &entity, name))?,
        })
    }
}
