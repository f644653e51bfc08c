// Configuration: everything the submission client and batch driver need,
// built from environment variables with production defaults. Secrets
// (the SFTP password) come from the environment only and are never
// baked into the binary.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::schedule::BatchMonth;
use crate::template::{TemplateSpec, TemplateTable};

const DEFAULT_ENDPOINT: &str = "https://reporting-api.astrapay.com/report-service/regenerate";
const DEFAULT_SFTP_HOST: &str = "cdp-sftp.astrafinancial.co.id";
const DEFAULT_SFTP_PORT: u16 = 2225;
const DEFAULT_SFTP_USERNAME: &str = "astrapayapp";
const DEFAULT_SFTP_KEY: &str = "/home/report-service-prd/.ssh/id_rsa";
const DEFAULT_USER_ID: u64 = 32_729_867;
const DEFAULT_USER_NAME: &str = "Report AstraPay to AID";
const DEFAULT_MASTER_DESTINATION: &str = "/astrapayapp/new_pipeline_ap/master_user_astrapay/";
const DEFAULT_TRANSACTION_DESTINATION: &str =
    "/astrapayapp/new_pipeline_ap/transaction_astrapay/";

/// SFTP delivery target the report service pushes generated files to.
#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Read from `AIDREPORT_SFTP_PASSWORD`; empty when key auth is used.
    pub password: String,
    /// Path to the private key on the report-service host.
    pub private_key: String,
}

/// The requesting-user descriptor the report service expects in payloads.
#[derive(Debug, Clone)]
pub struct UserConfig {
    pub id: u64,
    pub name: String,
}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Regenerate endpoint URL.
    pub endpoint: String,
    /// Deadline for a single HTTP attempt.
    pub request_timeout: Duration,
    /// Maximum attempts per submission, at least 1.
    pub max_retries: u32,
    /// Fixed pause between retry attempts.
    pub retry_delay: Duration,
    /// Pause between consecutive batch requests.
    pub request_pause: Duration,
    pub sftp: SftpConfig,
    pub user: UserConfig,
    pub templates: TemplateTable,
    /// Months the batch option covers with daily ranges.
    pub batch_months: Vec<BatchMonth>,
}

impl Config {
    /// Build a `Config` from `AIDREPORT_*` environment variables,
    /// falling back to the production defaults. Unparseable values are
    /// logged and replaced by the default rather than aborting startup.
    pub fn from_env() -> Self {
        let templates = TemplateTable::new(vec![
            TemplateSpec {
                id: env_parse("AIDREPORT_MASTER_TEMPLATE_ID", 19),
                label: "Master User AID".into(),
                destination: env_or("AIDREPORT_MASTER_DESTINATION", DEFAULT_MASTER_DESTINATION),
            },
            TemplateSpec {
                id: env_parse("AIDREPORT_TRANSACTION_TEMPLATE_ID", 26),
                label: "Transaction Astrapay AID".into(),
                destination: env_or(
                    "AIDREPORT_TRANSACTION_DESTINATION",
                    DEFAULT_TRANSACTION_DESTINATION,
                ),
            },
        ]);

        let batch_months = match env::var("AIDREPORT_BATCH_MONTHS") {
            Ok(raw) => parse_batch_months(&raw).unwrap_or_else(|| {
                warn!("ignoring AIDREPORT_BATCH_MONTHS={raw}: expected e.g. 2025-09,2025-10");
                default_batch_months()
            }),
            Err(_) => default_batch_months(),
        };

        Config {
            endpoint: env_or("AIDREPORT_API_URL", DEFAULT_ENDPOINT),
            request_timeout: Duration::from_secs(env_parse(
                "AIDREPORT_REQUEST_TIMEOUT_SECS",
                300u64,
            )),
            max_retries: env_parse("AIDREPORT_MAX_RETRIES", 3u32).max(1),
            retry_delay: Duration::from_secs(env_parse("AIDREPORT_RETRY_DELAY_SECS", 30u64)),
            request_pause: Duration::from_secs(env_parse("AIDREPORT_REQUEST_PAUSE_SECS", 60u64)),
            sftp: SftpConfig {
                host: env_or("AIDREPORT_SFTP_HOST", DEFAULT_SFTP_HOST),
                port: env_parse("AIDREPORT_SFTP_PORT", DEFAULT_SFTP_PORT),
                username: env_or("AIDREPORT_SFTP_USERNAME", DEFAULT_SFTP_USERNAME),
                password: env::var("AIDREPORT_SFTP_PASSWORD").unwrap_or_default(),
                private_key: env_or("AIDREPORT_SFTP_KEY", DEFAULT_SFTP_KEY),
            },
            user: UserConfig {
                id: env_parse("AIDREPORT_USER_ID", DEFAULT_USER_ID),
                name: env_or("AIDREPORT_USER_NAME", DEFAULT_USER_NAME),
            },
            templates,
            batch_months,
        }
    }
}

fn default_batch_months() -> Vec<BatchMonth> {
    vec![
        BatchMonth {
            year: 2025,
            month: 9,
        },
        BatchMonth {
            year: 2025,
            month: 10,
        },
    ]
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring {key}={raw}: expected a value like {default}");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a comma-separated list of `YYYY-MM` months.
fn parse_batch_months(raw: &str) -> Option<Vec<BatchMonth>> {
    let mut months = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (year, month) = part.split_once('-')?;
        let year: i32 = year.trim().parse().ok()?;
        let month: u32 = month.trim().parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        months.push(BatchMonth { year, month });
    }
    if months.is_empty() {
        None
    } else {
        Some(months)
    }
}
