use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use super::{
    folder_of, MediaContent, MediaStore, NewMedia, SearchQuery, SortKey, StoreError, StoredMedia,
};
use crate::config::S3Config;
use crate::utils::s3::{create_s3_client, object_url, verify_bucket};

// Characters escaped in the `x-amz-copy-source` header; `/` stays literal.
const COPY_SOURCE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'+')
    .add(b'?')
    .add(b'&')
    .add(b'=');

const SELECT_MEDIA: &str = "
    SELECT
        m.public_id,
        m.folder,
        m.content_type,
        m.bytes,
        m.format,
        m.width,
        m.height,
        m.created_at,
        m.uploaded_at,
        COALESCE(array_agg(t.tag ORDER BY t.tag) FILTER (WHERE t.tag IS NOT NULL), '{}') AS tags
    FROM
        media m
        LEFT JOIN media_tags t ON t.public_id = m.public_id
";

#[derive(sqlx::FromRow)]
struct MediaRow {
    public_id: String,
    folder: String,
    content_type: String,
    bytes: i64,
    format: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    created_at: DateTime<Utc>,
    uploaded_at: DateTime<Utc>,
    tags: Vec<String>,
}

/// Bytes in S3 (key = public id), metadata and tags in Postgres.
pub struct CloudMediaStore {
    s3: Client,
    s3_config: S3Config,
    db: PgPool,
}

impl CloudMediaStore {
    pub async fn connect(database_url: &str, s3_config: &S3Config) -> Result<Self, StoreError> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&db).await?;
        info!("Media schema up to date");

        let s3 = create_s3_client(s3_config).await;
        verify_bucket(&s3, &s3_config.bucket).await;

        Ok(CloudMediaStore {
            s3,
            s3_config: s3_config.clone(),
            db,
        })
    }

    fn to_media(&self, row: MediaRow) -> StoredMedia {
        StoredMedia {
            url: self.public_url(&row.public_id),
            public_id: row.public_id,
            folder: row.folder,
            content_type: row.content_type,
            bytes: row.bytes.max(0) as u64,
            format: row.format,
            width: row.width.map(|w| w.max(0) as u32),
            height: row.height.map(|h| h.max(0) as u32),
            tags: row.tags,
            created_at: row.created_at,
            uploaded_at: row.uploaded_at,
        }
    }

    async fn exists(&self, public_id: &str) -> Result<bool, StoreError> {
        let found: Option<(String,)> = sqlx::query_as("SELECT public_id FROM media WHERE public_id = $1")
            .bind(public_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(found.is_some())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        match self
            .s3
            .delete_object()
            .bucket(&self.s3_config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(service_err)) if service_err.err().code() == Some("NoSuchKey") => {
                // The row is the source of truth; a missing object is not worth failing for.
                warn!("S3 object already gone: {key}");
                Ok(())
            }
            Err(e) => Err(StoreError::ObjectStorage(format!(
                "failed to delete {key}: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }
}

#[async_trait]
impl MediaStore for CloudMediaStore {
    async fn upload(&self, media: NewMedia) -> Result<StoredMedia, StoreError> {
        if self.exists(&media.public_id).await? {
            return Err(StoreError::AlreadyExists(media.public_id));
        }

        let bytes = media.data.len() as i64;

        self.s3
            .put_object()
            .bucket(&self.s3_config.bucket)
            .key(&media.public_id)
            .content_type(&media.content_type)
            .body(ByteStream::from(media.data))
            .send()
            .await
            .map_err(|e| {
                StoreError::ObjectStorage(format!(
                    "failed to upload {}: {}",
                    media.public_id,
                    DisplayErrorContext(&e)
                ))
            })?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "
            INSERT INTO media
                (public_id, folder, content_type, bytes, format, width, height)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&media.public_id)
        .bind(&media.folder)
        .bind(&media.content_type)
        .bind(bytes)
        .bind(media.format.as_deref())
        .bind(media.width.map(|w| w as i32))
        .bind(media.height.map(|h| h as i32))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "
            INSERT INTO media_tags (public_id, tag)
            SELECT $1, tag FROM UNNEST($2::text[]) AS tag
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(&media.public_id)
        .bind(&media.tags)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Stored {} ({bytes} bytes)", media.public_id);

        self.resource(&media.public_id).await
    }

    async fn resource(&self, public_id: &str) -> Result<StoredMedia, StoreError> {
        let row: Option<MediaRow> = sqlx::query_as(&format!(
            "{SELECT_MEDIA} WHERE m.public_id = $1 GROUP BY m.public_id"
        ))
        .bind(public_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| self.to_media(row))
            .ok_or_else(|| StoreError::NotFound(public_id.to_string()))
    }

    async fn fetch(&self, public_id: &str) -> Result<MediaContent, StoreError> {
        let media = self.resource(public_id).await?;

        let object = self
            .s3
            .get_object()
            .bucket(&self.s3_config.bucket)
            .key(public_id)
            .send()
            .await
            .map_err(|e| {
                StoreError::ObjectStorage(format!(
                    "failed to fetch {public_id}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| StoreError::ObjectStorage(format!("failed to read {public_id}: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(MediaContent {
            content_type: media.content_type,
            data,
        })
    }

    async fn add_tag(&self, tag: &str, public_ids: &[String]) -> Result<(), StoreError> {
        sqlx::query(
            "
            INSERT INTO media_tags (public_id, tag)
            SELECT public_id, $1 FROM media WHERE public_id = ANY($2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(tag)
        .bind(public_ids)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn remove_tag(&self, tag: &str, public_ids: &[String]) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM media_tags WHERE tag = $1 AND public_id = ANY($2)")
            .bind(tag)
            .bind(public_ids)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn remove_all_tags(&self, public_id: &str) -> Result<(), StoreError> {
        if !self.exists(public_id).await? {
            return Err(StoreError::NotFound(public_id.to_string()));
        }

        sqlx::query("DELETE FROM media_tags WHERE public_id = $1")
            .bind(public_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<StoredMedia, StoreError> {
        if !self.exists(from).await? {
            return Err(StoreError::NotFound(from.to_string()));
        }
        if self.exists(to).await? {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }

        let copy_source = format!(
            "{}/{}",
            self.s3_config.bucket,
            utf8_percent_encode(from, COPY_SOURCE)
        );

        self.s3
            .copy_object()
            .bucket(&self.s3_config.bucket)
            .copy_source(copy_source)
            .key(to)
            .send()
            .await
            .map_err(|e| {
                StoreError::ObjectStorage(format!(
                    "failed to copy {from} to {to}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        sqlx::query(
            "
            UPDATE media
            SET public_id = $2, folder = $3, uploaded_at = now()
            WHERE public_id = $1
            ",
        )
        .bind(from)
        .bind(to)
        .bind(folder_of(to))
        .execute(&self.db)
        .await?;

        self.delete_object(from).await?;

        self.resource(to).await
    }

    async fn destroy(&self, public_id: &str) -> Result<(), StoreError> {
        if !self.exists(public_id).await? {
            return Err(StoreError::NotFound(public_id.to_string()));
        }

        self.delete_object(public_id).await?;

        sqlx::query("DELETE FROM media WHERE public_id = $1")
            .bind(public_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<StoredMedia>, StoreError> {
        let order = match query.sort_by {
            SortKey::CreatedAt => "m.created_at",
            SortKey::UploadedAt => "m.uploaded_at",
        };

        let rows: Vec<MediaRow> = sqlx::query_as(&format!(
            "
            {SELECT_MEDIA}
            WHERE
                ($1::text IS NULL OR m.folder = $1) AND
                (cardinality($2::text[]) = 0 OR EXISTS (
                    SELECT 1 FROM media_tags f
                    WHERE f.public_id = m.public_id AND f.tag = ANY($2)
                ))
            GROUP BY m.public_id
            ORDER BY {order} DESC, m.public_id
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(query.folder.as_deref())
        .bind(&query.any_tags)
        .bind(i64::try_from(query.max_results).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|row| self.to_media(row)).collect())
    }

    fn public_url(&self, public_id: &str) -> String {
        object_url(&self.s3_config, public_id)
    }
}
