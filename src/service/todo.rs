//! Todo persistence against PostgreSQL.

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTodoRequest {
    pub title: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateTodoResponse {
    pub id: Uuid,
}

/// Storage for todos. Implementations must be safe to share across request tasks.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create(&self, todo: &Todo) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, AppError>;

    /// All todos ordered by title, then id.
    async fn list(&self) -> Result<Vec<Todo>, AppError>;

    /// Returns the number of rows removed.
    async fn delete(&self, id: Uuid) -> Result<u64, AppError>;

    async fn delete_all(&self) -> Result<u64, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Clone, Debug)]
pub struct PgTodoStore {
    pool: PgPool,
}

impl PgTodoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn create(&self, todo: &Todo) -> Result<(), AppError> {
        sqlx::query("INSERT INTO todo (id, title, content) VALUES ($1, $2, $3)")
            .bind(todo.id)
            .bind(&todo.title)
            .bind(&todo.content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, AppError> {
        let row = sqlx::query_as::<_, Todo>("SELECT id, title, content FROM todo WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Todo>, AppError> {
        let rows = sqlx::query_as::<_, Todo>("SELECT id, title, content FROM todo ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM todo WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM todo").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
