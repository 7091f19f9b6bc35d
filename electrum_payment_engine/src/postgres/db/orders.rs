use sqlx::PgConnection;

use crate::db_types::PaymentOrder;

pub async fn fetch_order(number: i64, conn: &mut PgConnection) -> Result<Option<PaymentOrder>, sqlx::Error> {
    sqlx::query_as(r#"SELECT * FROM payment_orders WHERE "order" = $1"#).bind(number).fetch_optional(conn).await
}

/// Returns the open order for a transaction, if any. At most one order per transaction is
/// in flight, so the first match is the match.
pub async fn fetch_incomplete_by_transaction(
    transaction_id: i64,
    conn: &mut PgConnection,
) -> Result<Option<PaymentOrder>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT * FROM payment_orders WHERE transaction_id = $1 AND NOT is_completed ORDER BY "order" LIMIT 1"#,
    )
    .bind(transaction_id)
    .fetch_optional(conn)
    .await
}

pub async fn upsert_order(order: &PaymentOrder, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO payment_orders (
            "order", transaction_id, user_id, user_name, amount, identifier, is_completed,
            result, time_opened, time_closed, currency, date, refund_amount, refund_time, description
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT ("order") DO UPDATE SET
            transaction_id = EXCLUDED.transaction_id,
            user_id = EXCLUDED.user_id,
            user_name = EXCLUDED.user_name,
            amount = EXCLUDED.amount,
            identifier = EXCLUDED.identifier,
            is_completed = EXCLUDED.is_completed,
            result = EXCLUDED.result,
            time_opened = EXCLUDED.time_opened,
            time_closed = EXCLUDED.time_closed,
            currency = EXCLUDED.currency,
            date = EXCLUDED.date,
            refund_amount = EXCLUDED.refund_amount,
            refund_time = EXCLUDED.refund_time,
            description = EXCLUDED.description
        "#,
    )
    .bind(order.order)
    .bind(order.transaction_id)
    .bind(&order.user_id)
    .bind(&order.user_name)
    .bind(order.amount.value())
    .bind(&order.identifier)
    .bind(order.is_completed)
    .bind(&order.result)
    .bind(order.time_opened)
    .bind(order.time_closed)
    .bind(&order.currency)
    .bind(&order.date)
    .bind(order.refund_amount.value())
    .bind(order.refund_time)
    .bind(&order.description)
    .execute(conn)
    .await?;
    Ok(())
}

/// Most recently opened order; ties (same open timestamp) go to the higher order number so
/// allocation stays monotonic.
pub async fn fetch_last_order(conn: &mut PgConnection) -> Result<Option<PaymentOrder>, sqlx::Error> {
    sqlx::query_as(r#"SELECT * FROM payment_orders ORDER BY time_opened DESC, "order" DESC LIMIT 1"#)
        .fetch_optional(conn)
        .await
}
