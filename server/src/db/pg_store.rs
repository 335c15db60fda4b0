// comanda_server/src/db/pg_store.rs

//! Postgres-backed `OrderStore`.
//!
//! Every mutation is a single `UPDATE ... WHERE id = $1 AND status = ANY(...)`,
//! so the status guard and the write commit together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use comanda::error::{OrderError, OrderResult};
use comanda::model::{LineItem, Order, OrderId, OrderStatus, StatusEntry};
use comanda::store::{EtaUpdate, OrderQuery, OrderStore, OrderUpdate};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

const ORDER_COLUMNS: &str = "id, stripe_session_id, payment_intent_id, user_id, guest_id, customer_name, \
  customer_email, customer_phone, items, total_amount, status, prep_time_minutes, created_at, updated_at, \
  estimated_ready_at, status_history, refund_id, refunded_at";

#[derive(Debug, FromRow)]
struct OrderRow {
  id: OrderId,
  stripe_session_id: Option<String>,
  payment_intent_id: Option<String>,
  user_id: Option<String>,
  guest_id: Option<String>,
  customer_name: Option<String>,
  customer_email: Option<String>,
  customer_phone: Option<String>,
  items: Json<Vec<LineItem>>,
  total_amount: Decimal,
  status: String,
  prep_time_minutes: i32,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
  estimated_ready_at: Option<DateTime<Utc>>,
  status_history: Json<Vec<StatusEntry>>,
  refund_id: Option<String>,
  refunded_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
  type Error = OrderError;

  fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
    let status = row
      .status
      .parse::<OrderStatus>()
      .map_err(|e| storage(anyhow::anyhow!("order {}: {}", row.id, e)))?;
    let prep_time_minutes = u32::try_from(row.prep_time_minutes)
      .map_err(|e| storage(anyhow::anyhow!("order {}: bad prep time: {}", row.id, e)))?;
    Ok(Order {
      id: row.id,
      stripe_session_id: row.stripe_session_id,
      payment_intent_id: row.payment_intent_id,
      user_id: row.user_id,
      guest_id: row.guest_id,
      customer_name: row.customer_name,
      customer_email: row.customer_email,
      customer_phone: row.customer_phone,
      items: row.items.0,
      total_amount: row.total_amount,
      status,
      prep_time_minutes,
      created_at: row.created_at,
      updated_at: row.updated_at,
      estimated_ready_at: row.estimated_ready_at,
      status_history: row.status_history.0,
      refund_id: row.refund_id,
      refunded_at: row.refunded_at,
    })
  }
}

fn storage(source: anyhow::Error) -> OrderError {
  OrderError::Storage { source }
}

fn db_error(err: sqlx::Error) -> OrderError {
  storage(anyhow::Error::new(err))
}

fn rows_to_orders(rows: Vec<OrderRow>) -> OrderResult<Vec<Order>> {
  rows.into_iter().map(Order::try_from).collect()
}

fn minutes_column(minutes: u32) -> OrderResult<i32> {
  i32::try_from(minutes).map_err(|_| OrderError::Validation(format!("prep time {} is out of range", minutes)))
}

#[derive(Debug, Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  async fn fetch_one_where(&self, clause: &str, value: impl ToString) -> OrderResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE {}", ORDER_COLUMNS, clause);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(value.to_string())
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    row.map(Order::try_from).transpose()
  }
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(skip(self, order), fields(order_id = %order.id))]
  async fn insert(&self, order: Order) -> OrderResult<Order> {
    let sql = format!(
      "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
      ORDER_COLUMNS
    );
    let result = sqlx::query(&sql)
      .bind(order.id)
      .bind(&order.stripe_session_id)
      .bind(&order.payment_intent_id)
      .bind(&order.user_id)
      .bind(&order.guest_id)
      .bind(&order.customer_name)
      .bind(&order.customer_email)
      .bind(&order.customer_phone)
      .bind(Json(&order.items))
      .bind(order.total_amount)
      .bind(order.status.as_str())
      .bind(minutes_column(order.prep_time_minutes)?)
      .bind(order.created_at)
      .bind(order.updated_at)
      .bind(order.estimated_ready_at)
      .bind(Json(&order.status_history))
      .bind(&order.refund_id)
      .bind(order.refunded_at)
      .execute(&self.pool)
      .await;

    match result {
      Ok(_) => {
        debug!("Order stored.");
        Ok(order)
      }
      Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(OrderError::DuplicateKey {
        session_id: order.stripe_session_id.clone().unwrap_or_default(),
      }),
      Err(e) => Err(db_error(e)),
    }
  }

  async fn get(&self, id: OrderId) -> OrderResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    row.map(Order::try_from).transpose()
  }

  async fn get_by_session(&self, session_id: &str) -> OrderResult<Option<Order>> {
    self.fetch_one_where("stripe_session_id = $1", session_id).await
  }

  #[instrument(skip(self))]
  async fn find(&self, query: &OrderQuery) -> OrderResult<Vec<Order>> {
    let order_by = "ORDER BY created_at DESC, id DESC";
    let rows = match query {
      OrderQuery::ById(id) => {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&sql).bind(*id).fetch_all(&self.pool).await
      }
      OrderQuery::BySession(session_id) => {
        let sql = format!("SELECT {} FROM orders WHERE stripe_session_id = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRow>(&sql).bind(session_id).fetch_all(&self.pool).await
      }
      OrderQuery::ByGuest(guest_id) => {
        let sql = format!("SELECT {} FROM orders WHERE guest_id = $1 {}", ORDER_COLUMNS, order_by);
        sqlx::query_as::<_, OrderRow>(&sql).bind(guest_id).fetch_all(&self.pool).await
      }
      OrderQuery::ByEmail(email) => {
        let sql = format!(
          "SELECT {} FROM orders WHERE customer_email <> '' AND lower(customer_email) = lower($1) {}",
          ORDER_COLUMNS, order_by
        );
        sqlx::query_as::<_, OrderRow>(&sql)
          .bind(email.trim())
          .fetch_all(&self.pool)
          .await
      }
      OrderQuery::Recent { limit } => {
        let sql = format!("SELECT {} FROM orders {} LIMIT $1", ORDER_COLUMNS, order_by);
        sqlx::query_as::<_, OrderRow>(&sql)
          .bind(i64::try_from(*limit).unwrap_or(i64::MAX))
          .fetch_all(&self.pool)
          .await
      }
    }
    .map_err(db_error)?;
    rows_to_orders(rows)
  }

  #[instrument(skip(self, update), fields(order_id = %id))]
  async fn apply(&self, id: OrderId, update: OrderUpdate) -> OrderResult<Order> {
    let (eta_mode, eta_at) = match update.eta {
      EtaUpdate::Keep => ("keep", None),
      EtaUpdate::Set(at) => ("set", Some(at)),
      EtaUpdate::RebaseIfSet(at) => ("rebase", Some(at)),
    };
    let allowed: Vec<String> = update.guard.allowed().iter().map(|s| s.as_str().to_string()).collect();
    let appended: Vec<StatusEntry> = update.history.iter().cloned().collect();
    let prep = update.prep_time_minutes.map(minutes_column).transpose()?;

    let sql = format!(
      "UPDATE orders SET \
         status = COALESCE($2, status), \
         prep_time_minutes = COALESCE($3, prep_time_minutes), \
         estimated_ready_at = CASE $4::text \
           WHEN 'set' THEN $5::timestamptz \
           WHEN 'rebase' THEN CASE WHEN estimated_ready_at IS NULL THEN NULL ELSE $5::timestamptz END \
           ELSE estimated_ready_at END, \
         refund_id = COALESCE($6, refund_id), \
         refunded_at = COALESCE($7, refunded_at), \
         status_history = status_history || $8::jsonb, \
         updated_at = $9 \
       WHERE id = $1 AND status = ANY($10) \
       RETURNING {}",
      ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .bind(update.status.map(|s| s.as_str()))
      .bind(prep)
      .bind(eta_mode)
      .bind(eta_at)
      .bind(update.refund.as_ref().map(|r| r.refund_id.clone()))
      .bind(update.refund.as_ref().map(|r| r.refunded_at))
      .bind(Json(appended))
      .bind(update.updated_at)
      .bind(&allowed)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;

    if let Some(row) = row {
      return Order::try_from(row);
    }

    // Guard rejected the write or the order is gone; report which.
    let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    match current {
      None => Err(OrderError::not_found(format!("order {}", id))),
      Some(raw) => {
        let from = raw
          .parse::<OrderStatus>()
          .map_err(|e| storage(anyhow::anyhow!("order {}: {}", id, e)))?;
        Err(OrderError::InvalidTransition {
          from,
          to: update.status.unwrap_or(from),
        })
      }
    }
  }
}
