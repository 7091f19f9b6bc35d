//! Low-level Postgres queries.
//!
//! Simple functions taking a `&mut PgConnection` rather than stateful structs. Callers obtain a
//! connection from the pool, or open a transaction and pass `&mut *tx` when atomicity matters.

use sqlx::{postgres::PgPoolOptions, PgPool};

pub mod audit;
pub mod methods;
pub mod orders;
pub mod tags;
pub mod transactions;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    transaction_id  BIGINT PRIMARY KEY,
    charge_point_id TEXT NOT NULL DEFAULT '',
    connector_id    BIGINT NOT NULL DEFAULT 0,
    id_tag          TEXT NOT NULL DEFAULT '',
    meter_start     BIGINT NOT NULL DEFAULT 0,
    meter_stop      BIGINT NOT NULL DEFAULT 0,
    is_finished     BOOLEAN NOT NULL DEFAULT FALSE,
    payment_amount  BIGINT NOT NULL DEFAULT 0,
    payment_billed  BIGINT NOT NULL DEFAULT 0,
    payment_order   BIGINT NOT NULL DEFAULT 0,
    payment_error   TEXT NOT NULL DEFAULT '',
    payment_orders  JSONB NOT NULL DEFAULT '[]',
    user_tag        JSONB,
    payment_method  JSONB
);

CREATE TABLE IF NOT EXISTS payment_orders (
    "order"        BIGINT PRIMARY KEY,
    transaction_id BIGINT NOT NULL DEFAULT 0,
    user_id        TEXT NOT NULL DEFAULT '',
    user_name      TEXT NOT NULL DEFAULT '',
    amount         BIGINT NOT NULL DEFAULT 0,
    identifier     TEXT NOT NULL DEFAULT '',
    is_completed   BOOLEAN NOT NULL DEFAULT FALSE,
    result         TEXT NOT NULL DEFAULT '',
    time_opened    TIMESTAMPTZ NOT NULL,
    time_closed    TIMESTAMPTZ,
    currency       TEXT NOT NULL DEFAULT '',
    date           TEXT NOT NULL DEFAULT '',
    refund_amount  BIGINT NOT NULL DEFAULT 0,
    refund_time    TIMESTAMPTZ,
    description    TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS payment_orders_open_by_transaction
    ON payment_orders (transaction_id) WHERE NOT is_completed;
CREATE INDEX IF NOT EXISTS payment_orders_by_time_opened
    ON payment_orders (time_opened DESC, "order" DESC);

CREATE TABLE IF NOT EXISTS payment_methods (
    id           BIGSERIAL PRIMARY KEY,
    identifier   TEXT NOT NULL,
    user_id      TEXT NOT NULL,
    user_name    TEXT NOT NULL DEFAULT '',
    is_default   BOOLEAN NOT NULL DEFAULT FALSE,
    fail_count   BIGINT NOT NULL DEFAULT 0,
    cof_tid      TEXT NOT NULL DEFAULT '',
    card_brand   TEXT NOT NULL DEFAULT '',
    card_country TEXT NOT NULL DEFAULT '',
    expiry_date  TEXT NOT NULL DEFAULT '',
    description  TEXT NOT NULL DEFAULT '',
    UNIQUE (identifier, user_id)
);

CREATE TABLE IF NOT EXISTS user_tags (
    id_tag   TEXT PRIMARY KEY,
    user_id  TEXT NOT NULL DEFAULT '',
    username TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS payment (
    id          BIGSERIAL PRIMARY KEY,
    ds_order    TEXT NOT NULL DEFAULT '',
    received_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    parameters  JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS payment_log (
    id       BIGSERIAL PRIMARY KEY,
    time     TIMESTAMPTZ NOT NULL,
    category TEXT NOT NULL,
    level    TEXT NOT NULL,
    text     TEXT NOT NULL
);
"#;

pub async fn new_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Creates the six collections idempotently. Safe to run on every startup.
pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
