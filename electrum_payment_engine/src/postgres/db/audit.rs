use sqlx::{types::Json, PgConnection};

use crate::db_types::{LogRecord, PaymentParameters};

/// Raw replies are appended as received, keyed by the order number they carry.
pub async fn insert_payment_result(reply: &PaymentParameters, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO payment (ds_order, parameters) VALUES ($1, $2)")
        .bind(&reply.order)
        .bind(Json(reply))
        .execute(conn)
        .await?;
    Ok(())
}

/// Appends a log record; with a positive cap, rows older than the newest `cap` are dropped.
pub async fn insert_log_message(record: &LogRecord, cap: i64, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO payment_log (time, category, level, text) VALUES ($1, $2, $3, $4)")
        .bind(record.time)
        .bind(&record.category)
        .bind(&record.level)
        .bind(&record.text)
        .execute(&mut *conn)
        .await?;
    if cap > 0 {
        sqlx::query("DELETE FROM payment_log WHERE id <= (SELECT MAX(id) FROM payment_log) - $1")
            .bind(cap)
            .execute(conn)
            .await?;
    }
    Ok(())
}
