//! Postgres persistence for documents, warehouse pools and item history
//!
//! Catalog entries and documents are stored as JSONB rows, one table per
//! kind. Pools live in `warehouse_inventory`, one row per warehouse, item,
//! pickup and pool. Each commit runs in a single database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    Booking, CreditNote, EndpointKind, Item, ItemHistory, ItemHistoryQuery, ItemPrice, Order,
    Party, Pool, PoolKey, Purchase, Sale, TotalSale, Warehouse,
};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Changes, PoolRow, Repository, StoreState, Write};
use crate::error::{AppError, AppResult};

#[derive(Debug, FromRow)]
struct PoolRecord {
    warehouse_id: Uuid,
    item_id: Uuid,
    pickup: Option<String>,
    pool: String,
    quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct PriceRecord {
    item_id: Uuid,
    pickup: Option<String>,
    rate: Decimal,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct HistoryRecord {
    id: Uuid,
    organization_id: Uuid,
    item_id: Uuid,
    pickup: Option<String>,
    warehouse_id: Uuid,
    source_kind: String,
    source_id: Uuid,
    destination_kind: String,
    destination_id: Uuid,
    quantity: Decimal,
    created_at: DateTime<Utc>,
}

fn endpoint(kind: &str) -> AppResult<EndpointKind> {
    EndpointKind::parse(kind)
        .ok_or_else(|| AppError::Internal(format!("Unknown endpoint kind '{}' in item_history", kind)))
}

impl TryFrom<PoolRecord> for PoolRow {
    type Error = AppError;

    fn try_from(record: PoolRecord) -> AppResult<Self> {
        let pool = Pool::parse(&record.pool).ok_or_else(|| {
            AppError::Internal(format!("Unknown pool '{}' in warehouse_inventory", record.pool))
        })?;
        Ok(PoolRow {
            key: PoolKey::new(record.warehouse_id, record.item_id, record.pickup),
            pool,
            quantity: record.quantity,
        })
    }
}

impl TryFrom<HistoryRecord> for ItemHistory {
    type Error = AppError;

    fn try_from(record: HistoryRecord) -> AppResult<Self> {
        Ok(ItemHistory {
            id: record.id,
            organization_id: record.organization_id,
            item_id: record.item_id,
            pickup: record.pickup,
            warehouse_id: record.warehouse_id,
            source_kind: endpoint(&record.source_kind)?,
            source_id: record.source_id,
            destination_kind: endpoint(&record.destination_kind)?,
            destination_id: record.destination_id,
            quantity: record.quantity,
            created_at: record.created_at,
        })
    }
}

/// Repository backed by the tables of `backend/migrations`
#[derive(Clone)]
pub struct PgRepository {
    db: PgPool,
}

impl PgRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn documents<T>(&self, table: &'static str) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Unpin + 'static,
    {
        let statement = format!("SELECT document FROM {} ORDER BY created_at, id", table);
        let rows: Vec<Json<T>> = sqlx::query_scalar(&statement)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|Json(document)| document).collect())
    }
}

async fn upsert<T>(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    id: Uuid,
    organization_id: Uuid,
    document: &T,
) -> AppResult<()>
where
    T: Serialize + Sync,
{
    let statement = format!(
        r#"
        INSERT INTO {} (id, organization_id, document, created_at, updated_at)
        VALUES ($1, $2, $3, NOW(), NOW())
        ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()
        "#,
        table
    );
    sqlx::query(&statement)
        .bind(id)
        .bind(organization_id)
        .bind(Json(document))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn remove(tx: &mut Transaction<'_, Postgres>, table: &'static str, id: Uuid) -> AppResult<()> {
    let statement = format!("DELETE FROM {} WHERE id = $1", table);
    sqlx::query(&statement).bind(id).execute(&mut **tx).await?;
    Ok(())
}

async fn apply_write(tx: &mut Transaction<'_, Postgres>, write: &Write) -> AppResult<()> {
    match write {
        Write::Item(item) => upsert(tx, "items", item.id, item.organization_id, item).await,
        Write::Warehouse(warehouse) => {
            upsert(tx, "warehouses", warehouse.id, warehouse.organization_id, warehouse).await
        }
        Write::Party(party) => upsert(tx, "parties", party.id, party.organization_id, party).await,
        Write::Price(price) => {
            sqlx::query(
                r#"
                INSERT INTO item_prices (item_id, pickup, rate, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT ON CONSTRAINT item_prices_key
                DO UPDATE SET rate = EXCLUDED.rate, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(price.item_id)
            .bind(&price.pickup)
            .bind(price.rate)
            .bind(price.updated_at)
            .execute(&mut **tx)
            .await?;
            Ok(())
        }
        Write::Order(order) => upsert(tx, "orders", order.id, order.organization_id, order).await,
        Write::RemoveOrder(id) => remove(tx, "orders", *id).await,
        Write::Purchase(purchase) => {
            upsert(tx, "purchases", purchase.id, purchase.organization_id, purchase).await
        }
        Write::RemovePurchase(id) => remove(tx, "purchases", *id).await,
        Write::Booking(booking) => {
            upsert(tx, "bookings", booking.id, booking.organization_id, booking).await
        }
        Write::RemoveBooking(id) => remove(tx, "bookings", *id).await,
        Write::Sale(sale) => upsert(tx, "sales", sale.id, sale.organization_id, sale).await,
        Write::RemoveSale(id) => remove(tx, "sales", *id).await,
        Write::TotalSale(total_sale) => {
            upsert(
                tx,
                "total_sales",
                total_sale.id,
                total_sale.organization_id,
                total_sale,
            )
            .await
        }
        Write::CreditNote(note) => {
            upsert(tx, "credit_notes", note.id, note.organization_id, note).await
        }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn load(&self) -> AppResult<StoreState> {
        let mut state = StoreState::default();

        for item in self.documents::<Item>("items").await? {
            state.items.insert(item.id, item);
        }
        for warehouse in self.documents::<Warehouse>("warehouses").await? {
            state.warehouses.insert(warehouse.id, warehouse);
        }
        for party in self.documents::<Party>("parties").await? {
            state.parties.insert(party.id, party);
        }
        for order in self.documents::<Order>("orders").await? {
            state.orders.insert(order.id, order);
        }
        for purchase in self.documents::<Purchase>("purchases").await? {
            state.purchases.insert(purchase.id, purchase);
        }
        for booking in self.documents::<Booking>("bookings").await? {
            state.bookings.insert(booking.id, booking);
        }
        for sale in self.documents::<Sale>("sales").await? {
            state.sales.insert(sale.id, sale);
        }
        for total_sale in self.documents::<TotalSale>("total_sales").await? {
            state.total_sales.insert(total_sale.id, total_sale);
        }
        for note in self.documents::<CreditNote>("credit_notes").await? {
            state.credit_notes.insert(note.id, note);
        }

        let prices = sqlx::query_as::<_, PriceRecord>(
            "SELECT item_id, pickup, rate, updated_at FROM item_prices",
        )
        .fetch_all(&self.db)
        .await?;
        for price in prices {
            state.prices.insert(
                (price.item_id, price.pickup.clone()),
                ItemPrice {
                    item_id: price.item_id,
                    pickup: price.pickup,
                    rate: price.rate,
                    updated_at: price.updated_at,
                },
            );
        }

        let rows = sqlx::query_as::<_, PoolRecord>(
            "SELECT warehouse_id, item_id, pickup, pool, quantity FROM warehouse_inventory",
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(PoolRow::try_from)
        .collect::<AppResult<Vec<_>>>()?;
        state.ledger.write_rows(&rows);

        Ok(state)
    }

    async fn persist(&self, changes: &Changes) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for row in &changes.rows {
            sqlx::query(
                r#"
                INSERT INTO warehouse_inventory (warehouse_id, item_id, pickup, pool, quantity, updated_at)
                VALUES ($1, $2, $3, $4, $5, NOW())
                ON CONFLICT ON CONSTRAINT warehouse_inventory_slot
                DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
                "#,
            )
            .bind(row.key.warehouse_id)
            .bind(row.key.item_id)
            .bind(&row.key.pickup)
            .bind(row.pool.as_str())
            .bind(row.quantity)
            .execute(&mut *tx)
            .await?;
        }

        for write in &changes.writes {
            apply_write(&mut tx, write).await?;
        }

        for record in &changes.history {
            sqlx::query(
                r#"
                INSERT INTO item_history (
                    id, organization_id, item_id, pickup, warehouse_id,
                    source_kind, source_id, destination_kind, destination_id,
                    quantity, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(record.id)
            .bind(record.organization_id)
            .bind(record.item_id)
            .bind(&record.pickup)
            .bind(record.warehouse_id)
            .bind(record.source_kind.as_str())
            .bind(record.source_id)
            .bind(record.destination_kind.as_str())
            .bind(record.destination_id)
            .bind(record.quantity)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn history(&self, query: &ItemHistoryQuery) -> AppResult<Vec<ItemHistory>> {
        sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, organization_id, item_id, pickup, warehouse_id,
                   source_kind, source_id, destination_kind, destination_id,
                   quantity, created_at
            FROM item_history
            WHERE ($1::uuid IS NULL OR item_id = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
              AND ($3::uuid IS NULL OR source_id = $3 OR destination_id = $3)
            ORDER BY seq
            "#,
        )
        .bind(query.item_id)
        .bind(query.warehouse_id)
        .bind(query.document_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(ItemHistory::try_from)
        .collect()
    }
}
