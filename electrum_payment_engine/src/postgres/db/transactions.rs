use sqlx::{types::Json, PgConnection};

use crate::db_types::Transaction;

pub async fn fetch_transaction(id: i64, conn: &mut PgConnection) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE transaction_id = $1").bind(id).fetch_optional(conn).await
}

/// Writes only the billing view; every other column belongs to the charging service.
pub async fn update_billing(transaction: &Transaction, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET payment_order = $1, payment_error = $2, payment_billed = $3, payment_orders = $4
        WHERE transaction_id = $5
        "#,
    )
    .bind(transaction.payment_order)
    .bind(&transaction.payment_error)
    .bind(transaction.payment_billed.value())
    .bind(Json(&transaction.payment_orders))
    .bind(transaction.transaction_id)
    .execute(conn)
    .await?;
    Ok(())
}
