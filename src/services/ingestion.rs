use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{order, order_line, product},
    errors::ServiceError,
    services::order_status::OrderBucket,
};

/// Rows are written in slices of this size to keep statements bounded.
const UPSERT_CHUNK_SIZE: usize = 200;

/// A normalized product row handed over by the (external) spreadsheet
/// ingestion layer.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductImport {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub manufacturer_code: Option<String>,
    #[validate(length(min = 1))]
    pub description: String,
    pub reference: Option<String>,
    pub unit: Option<String>,
    pub department_code: i32,
    pub department: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A normalized order with its line items.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderImport {
    #[validate(length(min = 1, max = 50))]
    pub order_number: String,
    pub buyer: Option<String>,
    pub platform: Option<String>,
    pub placed_at: Option<DateTime<Utc>>,
    pub total_amount: Option<Decimal>,
    #[validate]
    pub lines: Vec<OrderLineImport>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderLineImport {
    #[validate(length(min = 1, max = 32))]
    pub product_code: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub quantity_required: i32,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct ProductUpsertReport {
    pub total: usize,
    pub inserted: u64,
    pub updated: u64,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct OrderUpsertReport {
    pub orders_inserted: u64,
    pub orders_updated: u64,
    pub lines_inserted: u64,
    pub lines_updated: u64,
}

/// Boundary with bulk ingestion: insert-or-update batches keyed by natural
/// keys. Parsing and column mapping stay outside the core; this service only
/// sees normalized rows.
#[derive(Clone)]
pub struct IngestionService {
    db: Arc<DatabaseConnection>,
}

impl IngestionService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Upserts catalog rows by product code.
    #[instrument(skip(self, batch), fields(rows = batch.len()))]
    pub async fn upsert_products(
        &self,
        batch: Vec<ProductImport>,
    ) -> Result<ProductUpsertReport, ServiceError> {
        for row in &batch {
            row.validate()?;
        }

        let mut report = ProductUpsertReport {
            total: batch.len(),
            ..Default::default()
        };

        for chunk in batch.chunks(UPSERT_CHUNK_SIZE) {
            let codes: Vec<&str> = chunk.iter().map(|r| r.code.as_str()).collect();
            let existing: Vec<String> = product::Entity::find()
                .select_only()
                .column(product::Column::Code)
                .filter(product::Column::Code.is_in(codes))
                .into_tuple()
                .all(&*self.db)
                .await?;

            let now = Utc::now();
            let models: Vec<product::ActiveModel> = chunk
                .iter()
                .map(|row| product::ActiveModel {
                    code: Set(row.code.clone()),
                    manufacturer_code: Set(row.manufacturer_code.clone()),
                    description: Set(row.description.clone()),
                    reference: Set(row.reference.clone()),
                    unit: Set(row.unit.clone()),
                    department_code: Set(row.department_code),
                    department: Set(row.department.clone()),
                    active: Set(row.active),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                })
                .collect();

            product::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::column(product::Column::Code)
                        .update_columns([
                            product::Column::ManufacturerCode,
                            product::Column::Description,
                            product::Column::Reference,
                            product::Column::Unit,
                            product::Column::DepartmentCode,
                            product::Column::Department,
                            product::Column::Active,
                            product::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec(&*self.db)
                .await?;

            let chunk_updated = existing.len() as u64;
            report.updated += chunk_updated;
            report.inserted += chunk.len() as u64 - chunk_updated;
        }

        info!(
            total = report.total,
            inserted = report.inserted,
            updated = report.updated,
            "product batch ingested"
        );
        Ok(report)
    }

    /// Upserts orders and their lines by natural keys.
    ///
    /// Re-imports merge `quantity_required` and recompute line status, but
    /// never touch `quantity_done` and never regress the order's bucket.
    #[instrument(skip(self, batch), fields(orders = batch.len()))]
    pub async fn upsert_orders(
        &self,
        batch: Vec<OrderImport>,
    ) -> Result<OrderUpsertReport, ServiceError> {
        for row in &batch {
            row.validate()?;
            if row.lines.is_empty() {
                return Err(ServiceError::InvalidInput(format!(
                    "order {} has no line items",
                    row.order_number
                )));
            }
        }

        let mut report = OrderUpsertReport::default();
        let txn = self.db.begin().await?;

        for import in &batch {
            let unit_count: i32 = import.lines.iter().map(|l| l.quantity_required).sum();
            let is_kit = import.lines.len() > 1;

            let existing = order::Entity::find()
                .filter(order::Column::OrderNumber.eq(&import.order_number))
                .one(&txn)
                .await?;

            let order_id = match existing {
                None => {
                    let id = Uuid::new_v4();
                    order::ActiveModel {
                        id: Set(id),
                        order_number: Set(import.order_number.clone()),
                        buyer: Set(import.buyer.clone()),
                        platform: Set(import.platform.clone()),
                        placed_at: Set(import.placed_at),
                        is_kit: Set(is_kit),
                        status_bucket: Set(OrderBucket::Pending.as_str().to_string()),
                        checked: Set(false),
                        total_amount: Set(import.total_amount.unwrap_or_default()),
                        unit_count: Set(unit_count),
                        manifest_id: Set(None),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?;
                    report.orders_inserted += 1;
                    id
                }
                Some(found) => {
                    let id = found.id;
                    let mut active: order::ActiveModel = found.into();
                    active.buyer = Set(import.buyer.clone());
                    active.platform = Set(import.platform.clone());
                    active.placed_at = Set(import.placed_at);
                    if let Some(total) = import.total_amount {
                        active.total_amount = Set(total);
                    }
                    active.updated_at = Set(Some(Utc::now()));
                    active.update(&txn).await?;
                    report.orders_updated += 1;
                    id
                }
            };

            for line in &import.lines {
                let existing_line = order_line::Entity::find()
                    .filter(order_line::Column::OrderId.eq(order_id))
                    .filter(order_line::Column::ProductCode.eq(&line.product_code))
                    .filter(order_line::Column::Sku.eq(&line.sku))
                    .one(&txn)
                    .await?;

                match existing_line {
                    None => {
                        order_line::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            order_id: Set(order_id),
                            product_code: Set(line.product_code.clone()),
                            sku: Set(line.sku.clone()),
                            description: Set(line.description.clone()),
                            quantity_required: Set(line.quantity_required),
                            quantity_done: Set(0),
                            status: Set(
                                order_line::status_for(0, line.quantity_required).to_string()
                            ),
                            ..Default::default()
                        }
                        .insert(&txn)
                        .await?;
                        report.lines_inserted += 1;
                    }
                    Some(found) => {
                        let quantity_done = found.quantity_done;
                        let mut active: order_line::ActiveModel = found.into();
                        active.description = Set(line.description.clone());
                        active.quantity_required = Set(line.quantity_required);
                        active.status = Set(order_line::status_for(
                            quantity_done,
                            line.quantity_required,
                        )
                        .to_string());
                        active.updated_at = Set(Some(Utc::now()));
                        active.update(&txn).await?;
                        report.lines_updated += 1;
                    }
                }
            }

            // Kit classification follows the merged line set, not the incoming
            // batch: a re-import that adds a line can turn an order into a kit.
            let merged_required: Vec<i32> = order_line::Entity::find()
                .select_only()
                .column(order_line::Column::QuantityRequired)
                .filter(order_line::Column::OrderId.eq(order_id))
                .into_tuple()
                .all(&txn)
                .await?;
            order::ActiveModel {
                id: Set(order_id),
                is_kit: Set(merged_required.len() > 1),
                unit_count: Set(merged_required.iter().sum()),
                ..Default::default()
            }
            .update(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(
            orders_inserted = report.orders_inserted,
            orders_updated = report.orders_updated,
            lines_inserted = report.lines_inserted,
            lines_updated = report.lines_updated,
            "order batch ingested"
        );
        Ok(report)
    }
}
