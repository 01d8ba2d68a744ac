use std::sync::Arc;

use diesel::prelude::*;

use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::schema::{item_mapping, item_volumes};

use super::suggestions_model::VolumeCandidate;

pub trait SuggestionRepositoryTrait: Send + Sync {
    /// Items with volume figures joined to their catalog entry. Items that
    /// never traded on one side of the book are excluded up front.
    fn get_volume_candidates(&self) -> Result<Vec<VolumeCandidate>>;
}

pub struct SuggestionRepository {
    pool: Arc<DbPool>,
}

impl SuggestionRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl SuggestionRepositoryTrait for SuggestionRepository {
    fn get_volume_candidates(&self) -> Result<Vec<VolumeCandidate>> {
        let mut conn = get_connection(&self.pool)?;

        let candidates = item_volumes::table
            .inner_join(item_mapping::table)
            .filter(item_volumes::high_price_volume.ge(1))
            .filter(item_volumes::low_price_volume.ge(1))
            .select((
                item_volumes::item_id,
                item_mapping::name,
                item_mapping::icon,
                item_volumes::high_price,
                item_volumes::low_price,
                item_volumes::high_price_volume,
                item_volumes::low_price_volume,
                item_volumes::hourly_high_price_volume,
                item_volumes::hourly_low_price_volume,
            ))
            .load::<VolumeCandidate>(&mut conn)?;

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use chrono::Utc;

    fn seed_item(conn: &mut crate::db::DbConnection, id: i32, name: &str) {
        diesel::insert_into(item_mapping::table)
            .values((
                item_mapping::id.eq(id),
                item_mapping::name.eq(name),
                item_mapping::icon.eq(Some(format!("{}.png", name))),
                item_mapping::buy_limit.eq(Some(100)),
                item_mapping::members.eq(false),
            ))
            .execute(conn)
            .unwrap();
    }

    fn seed_volumes(
        conn: &mut crate::db::DbConnection,
        item_id: i32,
        high_volume: i64,
        low_volume: i64,
    ) {
        diesel::insert_into(item_volumes::table)
            .values((
                item_volumes::item_id.eq(item_id),
                item_volumes::high_price.eq(Some(120_i64)),
                item_volumes::low_price.eq(Some(100_i64)),
                item_volumes::high_price_volume.eq(high_volume),
                item_volumes::low_price_volume.eq(low_volume),
                item_volumes::hourly_high_price_volume.eq(10_i64),
                item_volumes::hourly_low_price_volume.eq(8_i64),
                item_volumes::last_updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
            .unwrap();
    }

    #[test]
    fn test_candidates_join_catalog_metadata() {
        let pool = create_test_pool();
        let repository = SuggestionRepository::new(pool.clone());

        let mut conn = get_connection(&pool).unwrap();
        seed_item(&mut conn, 4151, "Abyssal whip");
        seed_volumes(&mut conn, 4151, 500, 450);
        drop(conn);

        let candidates = repository.get_volume_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].item_id, 4151);
        assert_eq!(candidates[0].name, "Abyssal whip");
        assert_eq!(candidates[0].icon.as_deref(), Some("Abyssal whip.png"));
        assert_eq!(candidates[0].high_price, Some(120));
    }

    #[test]
    fn test_one_sided_items_are_excluded() {
        let pool = create_test_pool();
        let repository = SuggestionRepository::new(pool.clone());

        let mut conn = get_connection(&pool).unwrap();
        seed_item(&mut conn, 1, "Traded");
        seed_volumes(&mut conn, 1, 500, 450);
        seed_item(&mut conn, 2, "Buy only");
        seed_volumes(&mut conn, 2, 500, 0);
        seed_item(&mut conn, 3, "Sell only");
        seed_volumes(&mut conn, 3, 0, 450);
        drop(conn);

        let candidates = repository.get_volume_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].item_id, 1);
    }

    #[test]
    fn test_volumes_without_catalog_entry_are_excluded() {
        let pool = create_test_pool();
        let repository = SuggestionRepository::new(pool.clone());

        let mut conn = get_connection(&pool).unwrap();
        seed_volumes(&mut conn, 99, 500, 450);
        drop(conn);

        assert!(repository.get_volume_candidates().unwrap().is_empty());
    }
}
