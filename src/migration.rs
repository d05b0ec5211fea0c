//! Idempotent DDL for the todo table.

use crate::error::AppError;
use sqlx::PgPool;

const CREATE_TODO_TABLE: &str = "CREATE TABLE IF NOT EXISTS todo (
    id UUID PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL
)";

/// Create the `todo` table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query(CREATE_TODO_TABLE).execute(pool).await?;
    tracing::info!("todo schema ready");
    Ok(())
}
