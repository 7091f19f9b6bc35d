use epg_common::mask;
use sqlx::PgConnection;

use crate::{db_types::PaymentMethod, traits::PaymentStoreError};

/// Best available method for a user: the default when it has no recorded failures, otherwise the
/// method with the lowest fail count, insertion order breaking ties.
pub async fn fetch_best_method(
    user_id: &str,
    conn: &mut PgConnection,
) -> Result<Option<PaymentMethod>, sqlx::Error> {
    let default: Option<PaymentMethod> =
        sqlx::query_as("SELECT * FROM payment_methods WHERE user_id = $1 AND is_default")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    match default {
        Some(method) if method.fail_count == 0 => Ok(Some(method)),
        _ => {
            sqlx::query_as("SELECT * FROM payment_methods WHERE user_id = $1 ORDER BY fail_count, id LIMIT 1")
                .bind(user_id)
                .fetch_optional(conn)
                .await
        },
    }
}

pub async fn fetch_method_by_identifier(
    identifier: &str,
    conn: &mut PgConnection,
) -> Result<Option<PaymentMethod>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_methods WHERE identifier = $1 ORDER BY id LIMIT 1")
        .bind(identifier)
        .fetch_optional(conn)
        .await
}

pub async fn update_fail_count(identifier: &str, count: i64, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_methods SET fail_count = $2 WHERE identifier = $1")
        .bind(identifier)
        .bind(count)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_method(method: &PaymentMethod, conn: &mut PgConnection) -> Result<(), PaymentStoreError> {
    sqlx::query(
        r#"
        INSERT INTO payment_methods (
            identifier, user_id, user_name, is_default, fail_count, cof_tid,
            card_brand, card_country, expiry_date, description
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&method.identifier)
    .bind(&method.user_id)
    .bind(&method.user_name)
    .bind(method.is_default)
    .bind(method.fail_count)
    .bind(&method.cof_tid)
    .bind(&method.card_brand)
    .bind(&method.card_country)
    .bind(&method.expiry_date)
    .bind(&method.description)
    .execute(conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PaymentStoreError::DuplicatePaymentMethod(mask(&method.identifier))
        },
        _ => e.into(),
    })?;
    Ok(())
}
