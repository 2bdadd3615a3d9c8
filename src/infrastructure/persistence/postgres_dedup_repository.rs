use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::time::Duration;
use tracing::debug;

use crate::application::dto::{FileFilter, PageRequest};
use crate::application::ports::{
    BlobRecordStore, DecrementOutcome, DedupRepository, DedupTransaction, MetadataStore,
    NewBlobRecord, RecordPage, RecordSummary, RepositoryError,
};
use crate::domain::entities::{AggregateMetadata, BlobRecord, MetadataDelta};
use crate::domain::value_objects::{BlobId, ContentHash, StorageLocator};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const RECORD_COLUMNS: &str =
    "id, fingerprint, byte_size, reference_count, label, content_type, locator, created_at";

const METADATA_COLUMNS: &str = "total_references, unique_blobs, duplicates_avoided, bytes_saved";

/// Map SQLSTATE codes onto the retry semantics the engine relies on
fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => return RepositoryError::Conflict(db_err.message().to_string()),
            // serialization_failure, deadlock_detected, lock_not_available
            Some("40001") | Some("40P01") | Some("55P03") => {
                return RepositoryError::Transient(db_err.message().to_string())
            }
            // check_violation
            Some("23514") => {
                return RepositoryError::ConstraintViolation(db_err.message().to_string())
            }
            _ => {}
        }
    }
    if matches!(err, sqlx::Error::PoolTimedOut) {
        return RepositoryError::Transient("connection pool timed out".to_string());
    }
    RepositoryError::Database(err)
}

fn to_db_size(value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::SerializationError(format!("{} overflows BIGINT", value)))
}

/// PostgreSQL implementation of the deduplication store
pub struct PostgresDedupRepository {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresDedupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::with_lock_timeout(pool, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Recompute the counters derivable from `blob_records` and store them.
    ///
    /// Counting and writing happen in one serializable statement, so a
    /// mutation committed concurrently is either fully counted or makes the
    /// repair fail with a retryable error. `duplicates_avoided` and
    /// `bytes_saved` are historical and left as is.
    pub async fn repair_counters(&self) -> Result<AggregateMetadata, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        ensure_metadata_row(&mut tx).await?;

        let row = sqlx::query_as::<_, MetadataRow>(&format!(
            "UPDATE aggregate_metadata SET \
                unique_blobs = (SELECT COUNT(*) FROM blob_records), \
                total_references = (SELECT COALESCE(SUM(reference_count), 0) FROM blob_records) \
             WHERE id = $1 RETURNING {}",
            METADATA_COLUMNS
        ))
        .bind(AggregateMetadata::SINGLETON_ID)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        row.into_domain()
    }
}

async fn ensure_metadata_row(conn: &mut sqlx::PgConnection) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO aggregate_metadata (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(AggregateMetadata::SINGLETON_ID)
        .execute(conn)
        .await
        .map_err(classify)?;
    Ok(())
}

async fn load_metadata(
    conn: &mut sqlx::PgConnection,
) -> Result<AggregateMetadata, RepositoryError> {
    ensure_metadata_row(&mut *conn).await?;
    let row = sqlx::query_as::<_, MetadataRow>(&format!(
        "SELECT {} FROM aggregate_metadata WHERE id = $1",
        METADATA_COLUMNS
    ))
    .bind(AggregateMetadata::SINGLETON_ID)
    .fetch_one(conn)
    .await
    .map_err(classify)?;
    row.into_domain()
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    filter: &FileFilter,
) -> Result<(), RepositoryError> {
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let escaped = search
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        builder.push(" AND label ILIKE ");
        builder.push_bind(format!("%{}%", escaped));
    }

    if let Some(content_type) = &filter.content_type {
        builder.push(" AND content_type = ");
        builder.push_bind(content_type.clone());
    }

    if let Some(min_size) = filter.min_size {
        builder.push(" AND byte_size >= ");
        builder.push_bind(to_db_size(min_size)?);
    }

    if let Some(max_size) = filter.max_size {
        builder.push(" AND byte_size <= ");
        builder.push_bind(to_db_size(max_size)?);
    }

    if let Some(created_on) = filter.created_on {
        builder.push(" AND (created_at AT TIME ZONE 'UTC')::date = ");
        builder.push_bind(created_on);
    }

    Ok(())
}

#[async_trait]
impl DedupRepository for PostgresDedupRepository {
    async fn begin(&self) -> Result<Box<dyn DedupTransaction>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        Ok(Box::new(PostgresDedupTransaction { tx }))
    }

    async fn find_by_id(&self, id: &BlobId) -> Result<Option<BlobRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, BlobRecordRow>(&format!(
            "SELECT {} FROM blob_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.map(BlobRecordRow::into_domain).transpose()
    }

    async fn list(
        &self,
        filter: &FileFilter,
        page: PageRequest,
    ) -> Result<RecordPage, RepositoryError> {
        let mut count_builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blob_records WHERE 1=1");
        push_filters(&mut count_builder, filter)?;
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        let mut query_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM blob_records WHERE 1=1",
            RECORD_COLUMNS
        ));
        push_filters(&mut query_builder, filter)?;
        query_builder.push(" ORDER BY created_at DESC, id DESC");
        query_builder.push(" LIMIT ");
        query_builder.push_bind(page.limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(page.offset);

        let rows: Vec<BlobRecordRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        let records = rows
            .into_iter()
            .map(BlobRecordRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage {
            records,
            total: total.max(0) as u64,
        })
    }

    async fn metadata(&self) -> Result<AggregateMetadata, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(classify)?;
        load_metadata(&mut conn).await
    }

    async fn summarize(&self) -> Result<RecordSummary, RepositoryError> {
        let (unique_blobs, total_references) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*)::BIGINT, COALESCE(SUM(reference_count), 0)::BIGINT
            FROM blob_records
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(RecordSummary {
            unique_blobs: unique_blobs.max(0) as u64,
            total_references: total_references.max(0) as u64,
        })
    }

    async fn locator_in_use(&self, locator: &StorageLocator) -> Result<bool, RepositoryError> {
        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM blob_records WHERE locator = $1)")
                .bind(locator.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(classify)?;
        Ok(in_use)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// A serializable transaction over `blob_records` and `aggregate_metadata`.
///
/// Dropping it without calling `commit` rolls back (sqlx semantics).
pub struct PostgresDedupTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresDedupTransaction {
    async fn fetch_record(
        &mut self,
        sql: &str,
        id: &BlobId,
    ) -> Result<Option<BlobRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, BlobRecordRow>(sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)?;
        row.map(BlobRecordRow::into_domain).transpose()
    }
}

#[async_trait]
impl BlobRecordStore for PostgresDedupTransaction {
    async fn find_by_fingerprint(
        &mut self,
        fingerprint: &ContentHash,
    ) -> Result<Option<BlobRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, BlobRecordRow>(&format!(
            "SELECT {} FROM blob_records WHERE fingerprint = $1",
            RECORD_COLUMNS
        ))
        .bind(fingerprint.as_hex())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.map(BlobRecordRow::into_domain).transpose()
    }

    async fn find_by_id(&mut self, id: &BlobId) -> Result<Option<BlobRecord>, RepositoryError> {
        self.fetch_record(
            &format!("SELECT {} FROM blob_records WHERE id = $1", RECORD_COLUMNS),
            id,
        )
        .await
    }

    async fn create(&mut self, record: NewBlobRecord) -> Result<BlobRecord, RepositoryError> {
        let record = record.into_record();

        let row = sqlx::query_as::<_, BlobRecordRow>(&format!(
            r#"
            INSERT INTO blob_records (
                id, fingerprint, byte_size, reference_count, label, content_type, locator, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(record.id().as_uuid())
        .bind(record.fingerprint().as_hex())
        .bind(to_db_size(record.byte_size())?)
        .bind(record.reference_count())
        .bind(record.label())
        .bind(record.content_type())
        .bind(record.locator().as_str())
        .bind(record.created_at())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;

        debug!(fingerprint = %record.fingerprint().short(), "Blob record inserted");
        row.into_domain()
    }

    async fn increment_reference(&mut self, id: &BlobId) -> Result<BlobRecord, RepositoryError> {
        self.fetch_record(
            &format!(
                "UPDATE blob_records SET reference_count = reference_count + 1 \
                 WHERE id = $1 RETURNING {}",
                RECORD_COLUMNS
            ),
            id,
        )
        .await?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn decrement_reference(
        &mut self,
        id: &BlobId,
    ) -> Result<DecrementOutcome, RepositoryError> {
        let retained = self
            .fetch_record(
                &format!(
                    "UPDATE blob_records SET reference_count = reference_count - 1 \
                     WHERE id = $1 AND reference_count > 1 RETURNING {}",
                    RECORD_COLUMNS
                ),
                id,
            )
            .await?;
        if let Some(record) = retained {
            return Ok(DecrementOutcome::Retained(record));
        }

        // Last reference: remove the row rather than storing a zero count
        self.fetch_record(
            &format!(
                "DELETE FROM blob_records WHERE id = $1 RETURNING {}",
                RECORD_COLUMNS
            ),
            id,
        )
        .await?
        .map(DecrementOutcome::Destroyed)
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn delete_unconditionally(
        &mut self,
        id: &BlobId,
    ) -> Result<BlobRecord, RepositoryError> {
        self.fetch_record(
            &format!(
                "DELETE FROM blob_records WHERE id = $1 RETURNING {}",
                RECORD_COLUMNS
            ),
            id,
        )
        .await?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl MetadataStore for PostgresDedupTransaction {
    async fn get_or_init(&mut self) -> Result<AggregateMetadata, RepositoryError> {
        load_metadata(&mut self.tx).await
    }

    async fn apply_delta(
        &mut self,
        delta: &MetadataDelta,
    ) -> Result<AggregateMetadata, RepositoryError> {
        ensure_metadata_row(&mut self.tx).await?;

        // Negative results trip the >= 0 check constraints (23514)
        let row = sqlx::query_as::<_, MetadataRow>(&format!(
            r#"
            UPDATE aggregate_metadata
            SET total_references = total_references + $1,
                unique_blobs = unique_blobs + $2,
                duplicates_avoided = duplicates_avoided + $3,
                bytes_saved = bytes_saved + $4
            WHERE id = $5
            RETURNING {}
            "#,
            METADATA_COLUMNS
        ))
        .bind(delta.total_references)
        .bind(delta.unique_blobs)
        .bind(delta.duplicates_avoided)
        .bind(delta.bytes_saved)
        .bind(AggregateMetadata::SINGLETON_ID)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.into_domain()
    }
}

#[async_trait]
impl DedupTransaction for PostgresDedupTransaction {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await.map_err(classify)
    }
}

#[derive(sqlx::FromRow)]
struct BlobRecordRow {
    id: uuid::Uuid,
    fingerprint: String,
    byte_size: i64,
    reference_count: i64,
    label: String,
    content_type: String,
    locator: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl BlobRecordRow {
    fn into_domain(self) -> Result<BlobRecord, RepositoryError> {
        let byte_size = u64::try_from(self.byte_size).map_err(|_| {
            RepositoryError::SerializationError(format!("negative byte_size {}", self.byte_size))
        })?;

        Ok(BlobRecord::reconstruct(
            BlobId::from_uuid(self.id),
            ContentHash::from_hex(self.fingerprint.trim_end().to_string())?,
            byte_size,
            self.reference_count,
            self.label,
            self.content_type,
            StorageLocator::new(self.locator)?,
            self.created_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct MetadataRow {
    total_references: i64,
    unique_blobs: i64,
    duplicates_avoided: i64,
    bytes_saved: i64,
}

impl MetadataRow {
    fn into_domain(self) -> Result<AggregateMetadata, RepositoryError> {
        let counter = |value: i64, name: &str| {
            u64::try_from(value).map_err(|_| {
                RepositoryError::SerializationError(format!("negative {} {}", name, value))
            })
        };

        Ok(AggregateMetadata::new(
            counter(self.total_references, "total_references")?,
            counter(self.unique_blobs, "unique_blobs")?,
            counter(self.duplicates_avoided, "duplicates_avoided")?,
            counter(self.bytes_saved, "bytes_saved")?,
        ))
    }
}
