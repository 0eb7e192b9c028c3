use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line item of an order, unique per (order, product code, sku).
///
/// `quantity_done` moves only through the work ledger's atomic allocation
/// primitive and is monotonically non-decreasing. `status` is `done` iff
/// `quantity_done >= quantity_required`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_code: String,
    pub sku: String,
    pub description: Option<String>,
    pub quantity_required: i32,
    pub quantity_done: i32,
    /// pending or done
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_DONE: &str = "done";

impl Model {
    pub fn is_done(&self) -> bool {
        self.quantity_done >= self.quantity_required
    }

    pub fn remaining(&self) -> i32 {
        (self.quantity_required - self.quantity_done).max(0)
    }
}

/// The status string a line should carry for the given counters.
pub fn status_for(quantity_done: i32, quantity_required: i32) -> &'static str {
    if quantity_done >= quantity_required {
        STATUS_DONE
    } else {
        STATUS_PENDING
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductCode",
        to = "super::product::Column::Code"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

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
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_flips_exactly_at_required() {
        assert_eq!(status_for(0, 3), STATUS_PENDING);
        assert_eq!(status_for(2, 3), STATUS_PENDING);
        assert_eq!(status_for(3, 3), STATUS_DONE);
        assert_eq!(status_for(4, 3), STATUS_DONE);
    }
}
