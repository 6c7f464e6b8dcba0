use clap::Parser;

use crate::collectors::amazon::AmazonSettings;
use crate::collectors::jpmc::JpmcSettings;
use crate::collectors::microsoft::MicrosoftSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobwatch", about = "Poll employer career APIs for new job postings")]
pub struct Config {
    /// Database connection URL for the dedup store
    #[arg(long, env = "JOBWATCH_DATABASE_URL", default_value = "sqlite://jobwatch.db")]
    pub database_url: String,

    /// Only listings posted within this many hours are reported
    #[arg(long, env = "JOBWATCH_WINDOW_HOURS", default_value = "24")]
    pub window_hours: u32,

    /// Maximum pages fetched per search term
    #[arg(long, env = "JOBWATCH_MAX_PAGES", default_value = "5")]
    pub max_pages: usize,

    /// Per-request timeout for source APIs and the notifier
    #[arg(long, env = "JOBWATCH_REQUEST_TIMEOUT_SECS", default_value = "20")]
    pub request_timeout_secs: u64,

    /// Maximum new jobs listed in the digest message
    #[arg(long, env = "JOBWATCH_MAX_JOB_LINES", default_value = "10")]
    pub max_job_lines: usize,

    /// Run sources concurrently instead of one after another
    #[arg(long, env = "JOBWATCH_PARALLEL")]
    pub parallel: bool,

    /// Restrict the cycle to these sources (default: all)
    #[arg(long = "source", value_delimiter = ',')]
    pub only_sources: Vec<String>,

    /// Emit logs as JSON
    #[arg(long, env = "JOBWATCH_LOG_JSON")]
    pub log_json: bool,

    /// Telegram bot token; the digest is only logged when unset
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Telegram chat to deliver the digest to
    #[arg(long, env = "CHAT_ID")]
    pub chat_id: Option<String>,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Run one scan cycle (default when no subcommand given)
    Scan,
    /// Create the jobs table if it does not exist
    Init,
    /// Print the most recently discovered jobs
    Recent {
        /// Number of jobs to print
        #[arg(long, default_value = "20")]
        limit: i64,

        /// Only jobs from this source
        #[arg(long)]
        source: Option<String>,

        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Send one message through the configured notifier
    NotifyTest {
        /// Message text
        #[arg(long, default_value = "jobwatch is live and working")]
        message: String,
    },
}

/// Per-source search settings.
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Microsoft careers search terms
    #[arg(
        long,
        env = "MICROSOFT_TERMS",
        value_delimiter = ',',
        default_value = "Data,Analytics,Data Engineer,Azure,Power BI,Databricks"
    )]
    pub microsoft_terms: Vec<String>,

    /// Microsoft careers location filter
    #[arg(long, env = "MICROSOFT_LOCATION", default_value = "India, Telangana, Hyderabad")]
    pub microsoft_location: String,

    /// Amazon jobs search terms
    #[arg(
        long,
        env = "AMAZON_TERMS",
        value_delimiter = ',',
        default_value = "Data Engineer,Business Intelligence Engineer,Data Analyst"
    )]
    pub amazon_terms: Vec<String>,

    /// Amazon jobs location filter
    #[arg(long, env = "AMAZON_LOCATION", default_value = "Hyderabad, Telangana, IND")]
    pub amazon_location: String,

    /// JPMorgan keywords (default: no keyword, the whole location feed)
    #[arg(long, env = "JPMC_TERMS", value_delimiter = ',')]
    pub jpmc_terms: Vec<String>,

    /// JPMorgan Oracle HCM location id
    #[arg(long, env = "JPMC_LOCATION_ID", default_value = "300000081155702")]
    pub jpmc_location_id: String,

    /// JPMorgan search radius in miles
    #[arg(long, env = "JPMC_RADIUS", default_value = "25")]
    pub jpmc_radius: u32,

    /// Label recorded as the search term for JPMorgan jobs found without a keyword
    #[arg(long, env = "JPMC_LOCATION_LABEL", default_value = "Hyderabad")]
    pub jpmc_location_label: String,
}

impl Config {
    /// Resolve the command, defaulting to Scan if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Scan)
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.window_hours))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

impl SourceArgs {
    pub fn microsoft_settings(&self) -> MicrosoftSettings {
        MicrosoftSettings {
            terms: non_empty(&self.microsoft_terms),
            location: self.microsoft_location.clone(),
            ..MicrosoftSettings::default()
        }
    }

    pub fn amazon_settings(&self) -> AmazonSettings {
        AmazonSettings {
            terms: non_empty(&self.amazon_terms),
            location: self.amazon_location.clone(),
            ..AmazonSettings::default()
        }
    }

    pub fn jpmc_settings(&self) -> JpmcSettings {
        JpmcSettings {
            terms: non_empty(&self.jpmc_terms),
            location_id: self.jpmc_location_id.clone(),
            radius_miles: self.jpmc_radius,
            location_label: self.jpmc_location_label.clone(),
            ..JpmcSettings::default()
        }
    }
}

fn non_empty(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
