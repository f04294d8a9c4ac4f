use crate::error::{Result, ScrapeError};
use crate::scrapers::types::{RendererOptions, SiteProfile};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const MAX_WORKERS: usize = 5;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "property-scout",
    version,
    about = "Scrape batdongsan.com.vn listings into a CSV dataset"
)]
pub struct Cli {
    /// Listing search URLs to paginate (first page of each search)
    #[arg(value_name = "URL", env = "SCOUT_URLS", value_delimiter = ',', required = true)]
    pub urls: Vec<String>,

    /// Number of parallel browser instances
    #[arg(short, long, value_name = "N", default_value_t = 2)]
    pub workers: usize,

    /// Stop after this many listing pages per URL
    #[arg(long, value_name = "N")]
    pub max_pages: Option<u32>,

    #[arg(short, long, value_name = "DIR", default_value = "scraped_data")]
    pub output_dir: PathBuf,

    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub load_timeout_secs: u64,

    /// Pause after each navigation before reading the page
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub settle_ms: u64,

    /// Show the browser windows
    #[arg(long, default_value_t = false)]
    pub headful: bool,

    /// Let the browser load images
    #[arg(long, default_value_t = false)]
    pub show_images: bool,

    /// Cloud Storage bucket to copy the dataset to
    #[arg(long, env = "GCS_BUCKET")]
    pub gcs_bucket: Option<String>,

    /// Service-account key file used to mint upload tokens
    #[arg(long, value_name = "FILE", env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub gcs_credentials: Option<PathBuf>,

    /// Fixed OAuth access token; takes precedence over --gcs-credentials
    #[arg(long, env = "GCS_ACCESS_TOKEN", hide_env_values = true)]
    pub gcs_token: Option<String>,

    #[arg(long, default_value = "scraped_data")]
    pub gcs_prefix: String,

    #[arg(long, env = "GCS_ENDPOINT")]
    pub gcs_endpoint: Option<String>,

    /// Also write the records as pretty JSON to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
}

/// How uploads authenticate against Cloud Storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcsAuth {
    ServiceAccount(PathBuf),
    Token(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub auth: GcsAuth,
    pub prefix: String,
    pub endpoint: Option<String>,
}

/// Everything one scrape run needs, passed explicitly to each component
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_urls: Vec<String>,
    pub workers: usize,
    pub max_pages: Option<u32>,
    pub output_dir: PathBuf,
    pub renderer: RendererOptions,
    pub profile: SiteProfile,
    pub storage: Option<GcsConfig>,
}

impl ScrapeConfig {
    pub fn new(base_urls: Vec<String>) -> Self {
        Self {
            base_urls,
            workers: 2,
            max_pages: None,
            output_dir: PathBuf::from("scraped_data"),
            renderer: RendererOptions::default(),
            profile: SiteProfile::default(),
            storage: None,
        }
    }

    pub fn from_cli(cli: Cli) -> Result<Self> {
        let auth = match (cli.gcs_token, cli.gcs_credentials) {
            (Some(token), _) => Some(GcsAuth::Token(token)),
            (None, Some(key_file)) => Some(GcsAuth::ServiceAccount(key_file)),
            (None, None) => None,
        };

        // Credentials alone are ignored; GOOGLE_APPLICATION_CREDENTIALS is often set globally
        let storage = match (cli.gcs_bucket, auth) {
            (Some(bucket), Some(auth)) => Some(GcsConfig {
                bucket,
                auth,
                prefix: cli.gcs_prefix,
                endpoint: cli.gcs_endpoint,
            }),
            (Some(_), None) => {
                return Err(ScrapeError::Config(
                    "--gcs-bucket needs --gcs-credentials or --gcs-token".to_string(),
                ))
            }
            (None, _) => None,
        };

        let config = Self {
            base_urls: cli
                .urls
                .iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            workers: cli.workers,
            max_pages: cli.max_pages,
            output_dir: cli.output_dir,
            renderer: RendererOptions {
                headless: !cli.headful,
                block_images: !cli.show_images,
                incognito: true,
                load_timeout: Duration::from_secs(cli.load_timeout_secs),
                settle_delay: Duration::from_millis(cli.settle_ms),
            },
            profile: SiteProfile::default(),
            storage,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_urls.is_empty() {
            return Err(ScrapeError::Config("at least one URL is required".to_string()));
        }

        for raw in &self.base_urls {
            let url = Url::parse(raw)
                .map_err(|e| ScrapeError::Config(format!("'{}' is not a valid URL: {}", raw, e)))?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(ScrapeError::Config(format!(
                    "'{}' must be an absolute http(s) URL",
                    raw
                )));
            }
        }

        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(ScrapeError::Config(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }

        if self.max_pages == Some(0) {
            return Err(ScrapeError::Config("max pages must be at least 1".to_string()));
        }

        if self.renderer.load_timeout.is_zero() {
            return Err(ScrapeError::Config("load timeout must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse `args`, ignoring any storage credentials in the test environment
    fn parse(args: &[&str]) -> Cli {
        let cli =
            Cli::try_parse_from(std::iter::once("property-scout").chain(args.iter().copied())).unwrap();
        let flag = |name: &str| args.contains(&name);
        Cli {
            gcs_bucket: cli.gcs_bucket.filter(|_| flag("--gcs-bucket")),
            gcs_credentials: cli.gcs_credentials.filter(|_| flag("--gcs-credentials")),
            gcs_token: cli.gcs_token.filter(|_| flag("--gcs-token")),
            ..cli
        }
    }

    #[test]
    fn cli_defaults() {
        let config = ScrapeConfig::from_cli(parse(&["https://batdongsan.com.vn/ban-nha"])).unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.max_pages, None);
        assert_eq!(config.output_dir, PathBuf::from("scraped_data"));
        assert!(config.renderer.headless);
        assert!(config.renderer.block_images);
        assert_eq!(config.renderer.load_timeout, Duration::from_secs(30));
        assert_eq!(config.renderer.settle_delay, Duration::from_secs(1));
        assert_eq!(config.storage, None);
    }

    #[test]
    fn cli_accepts_storage_and_limits() {
        let config = ScrapeConfig::from_cli(parse(&[
            "https://batdongsan.com.vn/a",
            "https://batdongsan.com.vn/b",
            "--workers",
            "4",
            "--max-pages",
            "3",
            "--gcs-bucket",
            "listings",
            "--gcs-token",
            "ya29.token",
        ]))
        .unwrap();

        assert_eq!(config.base_urls.len(), 2);
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_pages, Some(3));
        let storage = config.storage.unwrap();
        assert_eq!(storage.bucket, "listings");
        assert_eq!(storage.auth, GcsAuth::Token("ya29.token".to_string()));
        assert_eq!(storage.prefix, "scraped_data");
    }

    #[test]
    fn service_account_key_authenticates_uploads() {
        let config = ScrapeConfig::from_cli(parse(&[
            "https://batdongsan.com.vn/a",
            "--gcs-bucket",
            "listings",
            "--gcs-credentials",
            "/etc/scout/sa.json",
        ]))
        .unwrap();
        assert_eq!(
            config.storage.unwrap().auth,
            GcsAuth::ServiceAccount(PathBuf::from("/etc/scout/sa.json"))
        );

        let config = ScrapeConfig::from_cli(parse(&[
            "https://batdongsan.com.vn/a",
            "--gcs-bucket",
            "listings",
            "--gcs-credentials",
            "/etc/scout/sa.json",
            "--gcs-token",
            "ya29.token",
        ]))
        .unwrap();
        assert_eq!(
            config.storage.unwrap().auth,
            GcsAuth::Token("ya29.token".to_string())
        );
    }

    #[test]
    fn credentials_without_bucket_disable_upload() {
        let config = ScrapeConfig::from_cli(parse(&[
            "https://batdongsan.com.vn/a",
            "--gcs-credentials",
            "/etc/scout/sa.json",
        ]))
        .unwrap();
        assert_eq!(config.storage, None);
    }

    #[test]
    fn bucket_without_credentials_is_rejected() {
        let cli = parse(&["https://batdongsan.com.vn/a", "--gcs-bucket", "listings"]);
        assert!(matches!(ScrapeConfig::from_cli(cli), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn rejects_relative_urls_and_bad_worker_counts() {
        assert!(ScrapeConfig::new(vec!["/ban-nha".to_string()]).validate().is_err());
        assert!(ScrapeConfig::new(vec!["ftp://x.com/a".to_string()]).validate().is_err());
        assert!(ScrapeConfig::new(vec![]).validate().is_err());

        let mut config = ScrapeConfig::new(vec!["https://batdongsan.com.vn/a".to_string()]);
        assert!(config.validate().is_ok());
        config.workers = 0;
        assert!(config.validate().is_err());
        config.workers = 6;
        assert!(config.validate().is_err());
        config.workers = 5;
        config.max_pages = Some(0);
        assert!(config.validate().is_err());
    }
}
