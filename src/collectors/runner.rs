use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::collectors::SourceAdapter;
use crate::error::StoreError;
use crate::models::job::JobRecord;
use crate::normalize::is_recent;
use crate::notify::{Notifier, format_digest};

#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Recency window.
    pub window: Duration,
    /// Page bound per search term.
    pub max_pages: usize,
    pub parallel: bool,
    pub max_job_lines: usize,
}

/// Counts for one source in one cycle.
#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub source: String,
    pub checked: u32,
    pub inserted: u32,
    pub too_old: u32,
    pub duplicates: u32,
    pub parse_errors: u32,
    pub pages: u32,
    pub new_jobs: Vec<JobRecord>,
    /// Set when the source failed; counts are then partial.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub window: Duration,
    pub sources: Vec<SourceReport>,
}

impl Summary {
    pub fn total_checked(&self) -> u32 {
        self.sources.iter().map(|s| s.checked).sum()
    }

    pub fn total_inserted(&self) -> u32 {
        self.sources.iter().map(|s| s.inserted).sum()
    }

    pub fn new_jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.sources.iter().flat_map(|s| s.new_jobs.iter())
    }
}

/// Drive one source through all its terms and pages.
///
/// A transport failure ends the source with partial counts and the error
/// recorded. Only storage failures are returned as `Err`.
pub async fn run_source(
    adapter: &dyn SourceAdapter,
    pool: &SqlitePool,
    settings: &ScanSettings,
    now: DateTime<Utc>,
) -> Result<SourceReport, StoreError> {
    let mut report = SourceReport {
        source: adapter.name().to_string(),
        ..SourceReport::default()
    };

    'terms: for term in adapter.terms() {
        let term = term.as_deref();
        let mut offset = 0;

        for _ in 0..settings.max_pages {
            let page = match adapter.fetch(term, offset).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(term, offset, "Fetch failed, skipping rest of source: {e}");
                    report.error = Some(e.to_string());
                    break 'terms;
                }
            };
            report.pages += 1;

            if page.items.is_empty() {
                break;
            }

            for raw in &page.items {
                report.checked += 1;

                let job = match adapter.extract(raw, term) {
                    Ok(job) => job,
                    Err(e) => {
                        tracing::debug!(term, "Skipping malformed item: {e}");
                        report.parse_errors += 1;
                        continue;
                    }
                };

                if !is_recent(job.posted_at, now, settings.window) {
                    report.too_old += 1;
                    continue;
                }

                if JobRecord::exists(pool, &job.identity).await? {
                    report.duplicates += 1;
                    continue;
                }

                let record = job.into_record(now);
                match JobRecord::insert(pool, &record).await {
                    Ok(()) => {
                        tracing::debug!(job_id = %record.job_id, "New job: {}", record.title);
                        report.inserted += 1;
                        report.new_jobs.push(record);
                    }
                    Err(StoreError::DuplicateIdentity(_)) => report.duplicates += 1,
                    Err(e) => return Err(e),
                }
            }

            offset += page.items.len();
            if page.has_more == Some(false) {
                break;
            }
        }
    }

    if report.parse_errors > 0 {
        tracing::warn!("{} malformed items skipped", report.parse_errors);
    }
    tracing::info!(
        checked = report.checked,
        inserted = report.inserted,
        too_old = report.too_old,
        duplicates = report.duplicates,
        pages = report.pages,
        failed = report.error.is_some(),
        "Source finished"
    );

    Ok(report)
}

/// Run one cycle over all sources and send a single digest.
///
/// A storage failure aborts the cycle before anything is sent. A failed
/// notification is logged and does not fail the cycle.
pub async fn run_all(
    adapters: &[Arc<dyn SourceAdapter>],
    pool: &SqlitePool,
    settings: &ScanSettings,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Result<Summary, StoreError> {
    let cycle_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("cycle", %cycle_id);

    async {
        tracing::info!(sources = adapters.len(), parallel = settings.parallel, "Cycle started");

        let sources = if settings.parallel {
            run_parallel(adapters, pool, settings, now).await?
        } else {
            let mut reports = Vec::with_capacity(adapters.len());
            for adapter in adapters {
                let span = tracing::info_span!("source", source = adapter.name());
                reports.push(
                    run_source(adapter.as_ref(), pool, settings, now)
                        .instrument(span)
                        .await?,
                );
            }
            reports
        };

        let summary = Summary {
            window: settings.window,
            sources,
        };
        tracing::info!(
            checked = summary.total_checked(),
            inserted = summary.total_inserted(),
            "Cycle complete"
        );

        let digest = format_digest(&summary, settings.max_job_lines);
        if let Err(e) = notifier.notify(&digest).await {
            tracing::error!("Failed to send digest: {e}");
        }

        Ok::<_, StoreError>(summary)
    }
    .instrument(span)
    .await
}

async fn run_parallel(
    adapters: &[Arc<dyn SourceAdapter>],
    pool: &SqlitePool,
    settings: &ScanSettings,
    now: DateTime<Utc>,
) -> Result<Vec<SourceReport>, StoreError> {
    let handles: Vec<_> = adapters
        .iter()
        .map(|adapter| {
            let adapter = adapter.clone();
            let pool = pool.clone();
            let settings = settings.clone();
            let span = tracing::info_span!("source", source = adapter.name());
            let name = adapter.name().to_string();
            let handle = tokio::spawn(
                async move { run_source(adapter.as_ref(), &pool, &settings, now).await }
                    .instrument(span),
            );
            (name, handle)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    let mut pending = handles.into_iter();
    while let Some((name, handle)) = pending.next() {
        match handle.await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(e)) => {
                for (_, rest) in pending {
                    rest.abort();
                }
                return Err(e);
            }
            Err(e) => {
                tracing::error!(source = %name, "Source task failed: {e}");
                reports.push(SourceReport {
                    source: name,
                    error: Some(format!("task failed: {e}")),
                    ..SourceReport::default()
                });
            }
        }
    }
    Ok(reports)
}
