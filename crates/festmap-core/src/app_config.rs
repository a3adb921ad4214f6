use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide settings, built once at startup and passed down explicitly.
#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub github_token: String,
    pub github_owner: String,
    pub github_repo: String,
    pub github_branch: String,
    pub github_path: String,
    pub github_api_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// CORS origins allowed to submit. Empty means "any" outside production.
    pub allowed_origins: Vec<String>,
    pub backup_dir: PathBuf,
    pub backup_retain: usize,
    pub cache_path: PathBuf,
    pub max_upload_bytes: usize,
    pub sync_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("github_token", &"[redacted]")
            .field("github_owner", &self.github_owner)
            .field("github_repo", &self.github_repo)
            .field("github_branch", &self.github_branch)
            .field("github_path", &self.github_path)
            .field("github_api_url", &self.github_api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("allowed_origins", &self.allowed_origins)
            .field("backup_dir", &self.backup_dir)
            .field("backup_retain", &self.backup_retain)
            .field("cache_path", &self.cache_path)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("sync_cron", &self.sync_cron)
            .finish()
    }
}
