use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, FromJsonQueryResult, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Advisory exclusive lease over one order's packing work.
///
/// Progress is a whole JSON document replaced on every write; partial-field
/// updates are not supported.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packing_leases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_number: String,
    #[sea_orm(unique)]
    pub holder: Uuid,
    #[sea_orm(column_type = "Json")]
    pub progress: PackingProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-product packing counters for one order, keyed by product code.
/// Entries with `needed == 0` are never created.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
pub struct PackingProgress(pub BTreeMap<String, ItemProgress>);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub needed: i32,
    pub scanned: i32,
    pub sku: String,
    pub manufacturer_code: Option<String>,
}

impl PackingProgress {
    /// True once every entry reached its needed count.
    pub fn is_complete(&self) -> bool {
        self.0.values().all(|item| item.scanned >= item.needed)
    }

    /// Finds the product code whose sku or manufacturer code matches the
    /// already-normalized scan.
    pub fn match_code(&self, normalized: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, item)| {
                crate::services::normalize_sku(&item.sku) == normalized
                    || item
                        .manufacturer_code
                        .as_deref()
                        .map(crate::services::normalize_sku)
                        .as_deref()
                        == Some(normalized)
            })
            .map(|(code, _)| code.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(now);
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> PackingProgress {
        let mut map = BTreeMap::new();
        map.insert(
            "100".to_string(),
            ItemProgress {
                needed: 2,
                scanned: 1,
                sku: "00100".to_string(),
                manufacturer_code: Some("FAB-9".to_string()),
            },
        );
        map.insert(
            "200".to_string(),
            ItemProgress {
                needed: 1,
                scanned: 1,
                sku: "200".to_string(),
                manufacturer_code: None,
            },
        );
        PackingProgress(map)
    }

    #[test]
    fn completeness_requires_every_entry() {
        let mut p = progress();
        assert!(!p.is_complete());
        p.0.get_mut("100").unwrap().scanned = 2;
        assert!(p.is_complete());
    }

    #[test]
    fn matches_by_sku_and_manufacturer_code() {
        let p = progress();
        assert_eq!(p.match_code("100"), Some("100"));
        assert_eq!(p.match_code("FAB-9"), Some("100"));
        assert_eq!(p.match_code("999"), None);
    }
}
