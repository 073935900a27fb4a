use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root directory for per-job artifact directories.
    pub artifact_root: PathBuf,
    /// Cache TTL in seconds; also governs artifact lifetime (default: 7 days).
    pub cache_ttl_secs: i64,
    /// Number of concurrent workers, i.e. the bound on simultaneous
    /// producer invocations (default: `5`, clamped to at least 1).
    pub worker_concurrency: usize,
    /// Producer executable.
    pub producer_command: String,
    /// Producer arguments; `{url}` and `{dir}` placeholders are substituted
    /// per invocation.
    pub producer_args: Vec<String>,
    /// Hard wall-clock timeout for one producer invocation.
    pub producer_timeout_secs: u64,
    /// Retention window for result-tracker entries, independent of the
    /// cache TTL (default: 1 hour).
    pub result_retention_secs: i64,
    /// External base address used to construct artifact URLs.
    pub public_base_url: String,
    /// How often the background janitor runs (default: 60 seconds).
    pub janitor_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `ARTIFACT_ROOT`         | `./artifacts`              |
    /// | `CACHE_TTL_SECS`        | `604800` (7 days)          |
    /// | `WORKER_CONCURRENCY`    | `5`                        |
    /// | `PRODUCER_COMMAND`      | `yt-dlp`                   |
    /// | `PRODUCER_ARGS`         | `-P,{dir},{url}`           |
    /// | `PRODUCER_TIMEOUT_SECS` | `600`                      |
    /// | `RESULT_RETENTION_SECS` | `3600`                     |
    /// | `PUBLIC_BASE_URL`       | `http://localhost:3000`    |
    /// | `JANITOR_INTERVAL_SECS` | `60`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let artifact_root =
            PathBuf::from(std::env::var("ARTIFACT_ROOT").unwrap_or_else(|_| "./artifacts".into()));

        let cache_ttl_secs: i64 = std::env::var("CACHE_TTL_SECS")
            .unwrap_or_else(|_| "604800".into())
            .parse()
            .expect("CACHE_TTL_SECS must be a valid i64");

        let worker_concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "5".into())
            .parse::<usize>()
            .expect("WORKER_CONCURRENCY must be a valid usize")
            .max(1);

        let producer_command =
            std::env::var("PRODUCER_COMMAND").unwrap_or_else(|_| "yt-dlp".into());

        let producer_args: Vec<String> = std::env::var("PRODUCER_ARGS")
            .unwrap_or_else(|_| "-P,{dir},{url}".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let producer_timeout_secs: u64 = std::env::var("PRODUCER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("PRODUCER_TIMEOUT_SECS must be a valid u64");

        let result_retention_secs: i64 = std::env::var("RESULT_RETENTION_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("RESULT_RETENTION_SECS must be a valid i64");

        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let janitor_interval_secs: u64 = std::env::var("JANITOR_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("JANITOR_INTERVAL_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            artifact_root,
            cache_ttl_secs,
            worker_concurrency,
            producer_command,
            producer_args,
            producer_timeout_secs,
            result_retention_secs,
            public_base_url,
            janitor_interval_secs,
        }
    }

    /// Producer timeout as a [`Duration`].
    pub fn producer_timeout(&self) -> Duration {
        Duration::from_secs(self.producer_timeout_secs)
    }

    /// Cache TTL as a [`Duration`] (used by the startup sweep).
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.max(0) as u64)
    }
}
