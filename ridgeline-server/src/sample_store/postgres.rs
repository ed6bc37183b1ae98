//! PostgreSQL implementation of the sample store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridgeline_core::{
    Descriptor, FeatureRepresentation, Identity, NewSample, RecordStore, SampleId, SampleRecord,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::StoreError;
use crate::config::Config;

const KIND_DESCRIPTOR: &str = "descriptor";
const KIND_RAW_IMAGE: &str = "raw_image";

/// PostgreSQL-backed sample store.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct SampleRow {
    id: Uuid,
    first_name: String,
    middle_name: Option<String>,
    last_name: String,
    profile_image: Option<Vec<u8>>,
    feature_kind: Option<String>,
    descriptor_format: Option<String>,
    descriptor: Option<serde_json::Value>,
    fingerprint_image: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl From<SampleRow> for SampleRecord {
    fn from(row: SampleRow) -> Self {
        let features = match (row.feature_kind.as_deref(), row.descriptor_format, row.descriptor) {
            (Some(KIND_DESCRIPTOR), Some(format), Some(descriptor)) => {
                Some(FeatureRepresentation::Descriptor {
                    format,
                    descriptor: Descriptor::new(descriptor),
                })
            }
            (Some(KIND_RAW_IMAGE), _, _) => row
                .fingerprint_image
                .map(|image| FeatureRepresentation::RawImage { image }),
            _ => None,
        };

        Self {
            id: SampleId::from_uuid(row.id),
            identity: Identity {
                first_name: row.first_name,
                middle_name: row.middle_name,
                last_name: row.last_name,
            },
            profile_image: row.profile_image,
            features,
            created_at: row.created_at,
        }
    }
}

/// Feature columns of one insert.
struct FeatureColumns {
    kind: Option<&'static str>,
    format: Option<String>,
    descriptor: Option<serde_json::Value>,
    image: Option<Vec<u8>>,
}

impl From<Option<FeatureRepresentation>> for FeatureColumns {
    fn from(features: Option<FeatureRepresentation>) -> Self {
        match features {
            Some(FeatureRepresentation::Descriptor { format, descriptor }) => Self {
                kind: Some(KIND_DESCRIPTOR),
                format: Some(format),
                descriptor: Some(descriptor.into_value()),
                image: None,
            },
            Some(FeatureRepresentation::RawImage { image }) => Self {
                kind: Some(KIND_RAW_IMAGE),
                format: None,
                descriptor: None,
                image: Some(image),
            },
            None => Self {
                kind: None,
                format: None,
                descriptor: None,
                image: None,
            },
        }
    }
}

impl PostgresRecordStore {
    /// Connect with the pool bounds from `config` and run migrations.
    pub async fn connect(database_url: &str, config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "Sample store connected and migrations applied"
        );

        Ok(Self { pool })
    }

    async fn insert_sample(&self, sample: NewSample) -> Result<SampleId, StoreError> {
        let id = SampleId::new();
        let columns = FeatureColumns::from(sample.features);

        sqlx::query(
            r#"
            INSERT INTO samples (
                id, first_name, middle_name, last_name, profile_image,
                feature_kind, descriptor_format, descriptor, fingerprint_image
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id.as_uuid())
        .bind(&sample.identity.first_name)
        .bind(&sample.identity.middle_name)
        .bind(&sample.identity.last_name)
        .bind(&sample.profile_image)
        .bind(columns.kind)
        .bind(&columns.format)
        .bind(&columns.descriptor)
        .bind(&columns.image)
        .execute(&self.pool)
        .await?;

        tracing::debug!(sample_id = %id, "Stored sample");
        Ok(id)
    }

    async fn scan(&self) -> Result<Vec<SampleRecord>, StoreError> {
        let rows: Vec<SampleRow> = sqlx::query_as(
            r#"
            SELECT id, first_name, middle_name, last_name, profile_image,
                   feature_kind, descriptor_format, descriptor, fingerprint_image, created_at
            FROM samples
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn insert(&self, sample: NewSample) -> ridgeline_core::Result<SampleId> {
        Ok(self.insert_sample(sample).await?)
    }

    async fn scan_all(&self) -> ridgeline_core::Result<Vec<SampleRecord>> {
        Ok(self.scan().await?)
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn check_health(&self) -> ridgeline_core::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
