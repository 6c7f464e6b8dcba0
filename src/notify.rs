use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;

use crate::collectors::runner::Summary;
use crate::error::NotifyError;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Delivery channel for the per-cycle digest.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// Sends messages through the Telegram Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bot_token,
            chat_id,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.bot_token);
        let resp = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", text),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no chat credentials are configured: the digest goes to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!("Digest:\n{text}");
        Ok(())
    }
}

/// Telegram when both credentials are set, otherwise the log.
pub fn configured(
    bot_token: Option<&str>,
    chat_id: Option<&str>,
    timeout: Duration,
) -> Result<Box<dyn Notifier>, NotifyError> {
    match (bot_token, chat_id) {
        (Some(token), Some(chat_id)) => Ok(Box::new(TelegramNotifier::new(
            token.to_string(),
            chat_id.to_string(),
            timeout,
        )?)),
        _ => {
            tracing::warn!("BOT_TOKEN or CHAT_ID not set, messages will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}

/// Render the cycle digest: per-source counts, totals and at most
/// `max_job_lines` of the newly found jobs.
pub fn format_digest(summary: &Summary, max_job_lines: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job scan (last {}h)", summary.window.num_hours());
    out.push('\n');

    for report in &summary.sources {
        match &report.error {
            None => {
                let _ = writeln!(
                    out,
                    "{}: checked {}, new {}",
                    report.source, report.checked, report.inserted
                );
            }
            Some(error) => {
                let _ = writeln!(
                    out,
                    "{}: FAILED (checked {}, new {}): {error}",
                    report.source, report.checked, report.inserted
                );
            }
        }
    }

    out.push('\n');
    let _ = writeln!(out, "Total checked: {}", summary.total_checked());
    let _ = writeln!(out, "New inserted: {}", summary.total_inserted());

    let new_jobs: Vec<_> = summary.new_jobs().collect();
    if !new_jobs.is_empty() && max_job_lines > 0 {
        out.push_str("\nNew jobs:\n");
        for job in new_jobs.iter().take(max_job_lines) {
            let _ = writeln!(out, "- {} | {} | {}", job.company, job.title, job.link);
        }
        if new_jobs.len() > max_job_lines {
            let _ = writeln!(out, "...and {} more", new_jobs.len() - max_job_lines);
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::runner::SourceReport;
    use crate::models::job::{CollectedJob, JobIdentity};
    use chrono::{DateTime, Utc};

    fn job(n: u32) -> crate::models::job::JobRecord {
        let now: DateTime<Utc> = DateTime::from_timestamp(1_771_200_000, 0).expect("ts");
        CollectedJob {
            identity: JobIdentity::native("ms", &n.to_string()),
            source: "microsoft".to_string(),
            company: "Microsoft".to_string(),
            title: format!("Data Engineer {n}"),
            link: format!("https://apply.careers.microsoft.com/careers/job/{n}"),
            source_term: "Data".to_string(),
            posted_at: now,
        }
        .into_record(now)
    }

    fn summary() -> Summary {
        Summary {
            window: chrono::Duration::hours(24),
            sources: vec![
                SourceReport {
                    source: "microsoft".to_string(),
                    checked: 40,
                    inserted: 3,
                    new_jobs: (1..=3).map(job).collect(),
                    ..SourceReport::default()
                },
                SourceReport {
                    source: "amazon".to_string(),
                    checked: 10,
                    error: Some("HTTP status 503 from https://www.amazon.jobs".to_string()),
                    ..SourceReport::default()
                },
            ],
        }
    }

    #[test]
    fn digest_lists_sources_totals_and_jobs() {
        let text = format_digest(&summary(), 10);

        assert!(text.starts_with("Job scan (last 24h)"));
        assert!(text.contains("microsoft: checked 40, new 3"));
        assert!(text.contains("amazon: FAILED (checked 10, new 0): HTTP status 503"));
        assert!(text.contains("Total checked: 50"));
        assert!(text.contains("New inserted: 3"));
        assert!(text.contains(
            "- Microsoft | Data Engineer 2 | https://apply.careers.microsoft.com/careers/job/2"
        ));
        assert!(!text.contains("more"));
    }

    #[test]
    fn digest_caps_job_lines() {
        let text = format_digest(&summary(), 2);
        assert!(text.contains("Data Engineer 2"));
        assert!(!text.contains("Data Engineer 3"));
        assert!(text.ends_with("...and 1 more"));
    }

    #[tokio::test]
    async fn missing_credentials_fall_back_to_log() {
        let notifier = configured(None, Some("12345"), Duration::from_secs(1)).unwrap();
        notifier.notify("jobwatch is live and working").await.unwrap();
    }

    #[test]
    fn failed_source_is_never_reported_as_success() {
        let text = format_digest(&summary(), 0);
        assert!(!text.contains("amazon: checked"));
        assert!(!text.contains("New jobs"));
    }
}
