use sqlx::PgConnection;

use crate::db_types::UserTag;

pub async fn fetch_user_tag(id_tag: &str, conn: &mut PgConnection) -> Result<Option<UserTag>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM user_tags WHERE id_tag = $1").bind(id_tag).fetch_optional(conn).await
}
