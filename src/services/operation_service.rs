//! services/operation_service.rs
//! Store durable de operaciones (SQLite). Cada transición de estado es un
//! único UPDATE condicionado al estado previo, así dos ejecutores nunca
//! pisan el mismo registro y un registro terminal no se vuelve a tocar.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use thiserror::Error;
use uuid::Uuid;

use crate::models::operation_model::{
    ListOperationsResponse, NewOperation, OperationRecord, OperationStatus, OperationType,
};

const SELECT_COLUMNS: &str = r#"
    id, operation_type, work_key, status, result, error_code, error_message,
    work_payload, parent_operation_id, retry_count, created_at, updated_at
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Operation not found: {0}")]
    NotFound(String),

    /// `existing_id` puede faltar si la operación viva terminó en failed
    /// entre el INSERT rechazado y la búsqueda.
    #[error("Ya existe una operación activa para '{work_key}'")]
    Conflict {
        existing_id: Option<String>,
        work_key: String,
    },

    #[error("Solo se pueden reintentar operaciones fallidas (status actual: {0})")]
    NotRetriable(OperationStatus),

    #[error("Registro de operación corrupto: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug)]
pub struct OperationService {
    db_pool: Pool<Sqlite>,
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("fecha inválida '{raw}': {e}")))
}

fn row_to_record(row: &SqliteRow) -> Result<OperationRecord, StoreError> {
    let operation_type: String = row.try_get("operation_type")?;
    let status: String = row.try_get("status")?;
    let result: Option<String> = row.try_get("result")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let result = result
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("result no es JSON: {e}")))?;

    Ok(OperationRecord {
        id: row.try_get("id")?,
        operation_type: operation_type.parse().map_err(StoreError::Corrupt)?,
        work_key: row.try_get("work_key")?,
        status: status.parse().map_err(StoreError::Corrupt)?,
        result,
        error_code: row.try_get("error_code")?,
        error_message: row.try_get("error_message")?,
        parent_operation_id: row.try_get("parent_operation_id")?,
        retry_count: row.try_get("retry_count")?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        work_payload: row.try_get("work_payload")?,
    })
}

impl OperationService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        OperationService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo en migraciones de 'operations'")?;
        Ok(())
    }

    /// Crea la operación en DB con estado "pending". No llama a nada externo.
    /// Si ya hay una operación viva para el mismo (tipo, work_key) => Conflict.
    pub async fn create_operation(&self, new_op: NewOperation) -> Result<OperationRecord, StoreError> {
        let op_id = Uuid::new_v4().to_string();
        let now = now_string();

        let inserted = sqlx::query(
            r#"
            INSERT INTO operations (
                id, operation_type, work_key, status, result, error_code, error_message,
                work_payload, parent_operation_id, retry_count, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, 'pending', NULL, NULL, NULL, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&op_id)
        .bind(new_op.operation_type.as_str())
        .bind(&new_op.work_key)
        .bind(&new_op.work_payload)
        .bind(&new_op.parent_operation_id)
        .bind(new_op.retry_count)
        .bind(&now)
        .execute(&self.db_pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let existing = self
                    .find_active(new_op.operation_type, &new_op.work_key)
                    .await?;
                return Err(StoreError::Conflict {
                    existing_id: existing.map(|op| op.id),
                    work_key: new_op.work_key,
                });
            }
            Err(e) => return Err(e.into()),
        }

        log::info!(
            "Operación {} creada (type={}, work_key={})",
            op_id,
            new_op.operation_type,
            new_op.work_key
        );
        self.get_operation(&op_id).await
    }

    /// Obtiene la info de una operación
    pub async fn get_operation(&self, op_id: &str) -> Result<OperationRecord, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM operations WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(op_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(op_id.to_string()))?;

        row_to_record(&row)
    }

    /// Operación no fallida para una unidad de trabajo (como mucho hay una)
    pub async fn find_active(
        &self,
        op_type: OperationType,
        work_key: &str,
    ) -> Result<Option<OperationRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM operations \
             WHERE operation_type = ?1 AND work_key = ?2 AND status <> 'failed'"
        );
        let row = sqlx::query(&sql)
            .bind(op_type.as_str())
            .bind(work_key)
            .fetch_optional(&self.db_pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Lista operaciones con paginación (más recientes primero)
    pub async fn list_operations(&self, page: u64, page_size: u64) -> Result<ListOperationsResponse> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        // page viene del cliente: sin overflow y dentro de i64
        let offset = (page - 1).saturating_mul(page_size).min(i64::MAX as u64) as i64;

        // total
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM operations")
            .fetch_one(&self.db_pool)
            .await
            .context("Fallo al contar operaciones")?;

        // items
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM operations ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar operaciones")?;

        let items = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListOperationsResponse {
            total: total as u64,
            page,
            page_size,
            items,
        })
    }

    /// pending -> processing. Devuelve false si la operación ya no estaba
    /// en "pending" (despacho duplicado): en ese caso no se modifica nada.
    pub async fn mark_processing(&self, op_id: &str) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE operations
            SET status = 'processing',
                updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(op_id)
        .bind(now_string())
        .execute(&self.db_pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    /// processing -> completed, escribiendo el resultado en el mismo UPDATE
    pub async fn complete_operation(
        &self,
        op_id: &str,
        result: &serde_json::Value,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE operations
            SET status = 'completed',
                result = ?2,
                updated_at = ?3
            WHERE id = ?1 AND status = 'processing'
            "#,
        )
        .bind(op_id)
        .bind(result.to_string())
        .bind(now_string())
        .execute(&self.db_pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    /// processing -> failed, con código y mensaje ya saneados
    pub async fn fail_operation(
        &self,
        op_id: &str,
        error_code: &str,
        error_message: &str,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE operations
            SET status = 'failed',
                error_code = ?2,
                error_message = ?3,
                updated_at = ?4
            WHERE id = ?1 AND status = 'processing'
            "#,
        )
        .bind(op_id)
        .bind(error_code)
        .bind(error_message)
        .bind(now_string())
        .execute(&self.db_pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    /// Crea una operación nueva a partir de una fallida (la original no se toca)
    pub async fn retry_operation(&self, op_id: &str) -> Result<OperationRecord, StoreError> {
        let original = self.get_operation(op_id).await?;
        if original.status != OperationStatus::Failed {
            return Err(StoreError::NotRetriable(original.status));
        }

        let new_op = NewOperation {
            operation_type: original.operation_type,
            work_key: original.work_key.clone(),
            work_payload: original.work_payload.clone(),
            parent_operation_id: Some(original.id.clone()),
            retry_count: original.retry_count + 1,
        };
        let created = self.create_operation(new_op).await?;

        log::info!(
            "Reintento manual: {} -> {} (retry_count={})",
            original.id,
            created.id,
            created.retry_count
        );
        Ok(created)
    }

    /// Cantidad de operaciones por estado
    pub async fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS cnt FROM operations GROUP BY status")
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al contar operaciones por estado")?;

        let mut counts = HashMap::new();
        for row in rows {
            counts.insert(row.try_get::<String, _>("status")?, row.try_get::<i64, _>("cnt")?);
        }
        Ok(counts)
    }
}
