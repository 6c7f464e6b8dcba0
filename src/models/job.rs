use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::normalize::normalize_text;

/// Stable key for a listing: `<source prefix>_<native id>`, or a hash of
/// company and title when the source gives no id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct JobIdentity(String);

impl JobIdentity {
    pub fn native(prefix: &str, id: &str) -> Self {
        JobIdentity(format!("{prefix}_{id}"))
    }

    /// Fallback identity. Two postings with the same company and title
    /// collide; that is accepted.
    pub fn derived(prefix: &str, company: &str, title: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_text(company).as_bytes());
        hasher.update(b"|");
        hasher.update(normalize_text(title).as_bytes());
        let digest = hex::encode(hasher.finalize());
        JobIdentity(format!("{prefix}_h{}", &digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job as extracted from one source item, before it is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedJob {
    pub identity: JobIdentity,
    pub source: String,
    pub company: String,
    pub title: String,
    pub link: String,
    pub source_term: String,
    pub posted_at: DateTime<Utc>,
}

impl CollectedJob {
    pub fn into_record(self, first_seen_at: DateTime<Utc>) -> JobRecord {
        JobRecord {
            job_id: self.identity,
            source: self.source,
            company: self.company,
            title: self.title,
            link: self.link,
            search_term: self.source_term,
            posted_ts: self.posted_at.timestamp(),
            first_seen_at,
        }
    }
}

/// A persisted job. Written once on first sighting, never updated.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobRecord {
    pub job_id: JobIdentity,
    pub source: String,
    pub company: String,
    pub title: String,
    pub link: String,
    pub search_term: String,
    pub posted_ts: i64,
    pub first_seen_at: DateTime<Utc>,
}

impl JobRecord {
    pub async fn exists(pool: &SqlitePool, identity: &JobIdentity) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM jobs WHERE job_id = $1")
            .bind(identity)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a new record. The primary key makes this atomic: a second
    /// writer for the same identity gets `DuplicateIdentity`.
    pub async fn insert(pool: &SqlitePool, record: &JobRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO jobs (job_id, source, company, title, link, search_term, posted_ts, first_seen_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.job_id)
        .bind(&record.source)
        .bind(&record.company)
        .bind(&record.title)
        .bind(&record.link)
        .bind(&record.search_term)
        .bind(record.posted_ts)
        .bind(record.first_seen_at)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_insert(e, record.job_id.as_str()))?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn get(
        pool: &SqlitePool,
        identity: &JobIdentity,
    ) -> Result<Option<JobRecord>, StoreError> {
        let job = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE job_id = $1")
            .bind(identity)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Most recently first-seen jobs, optionally for one source.
    pub async fn recent(
        pool: &SqlitePool,
        source: Option<&str>,
        limit: i64,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE ($1 IS NULL OR source = $1) ORDER BY first_seen_at DESC, job_id LIMIT $2",
        )
        .bind(source)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }
}
