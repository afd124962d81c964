use std::path::PathBuf;

/// Hosted project coordinates.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project origin, e.g. `https://abc.supabase.co`.
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        Self {
            url,
            anon_key: anon_key.into(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }
}

/// Settings of the self-contained SQLite backend.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// None keeps everything in memory.
    pub db_path: Option<PathBuf>,
    pub storage_dir: PathBuf,
    pub jwt_secret: String,
    /// Sign-up confirms the email straight away instead of waiting for `confirm_email`.
    pub auto_confirm: bool,
    /// Prefix of public object URLs. Defaults to a `file://` URL of `storage_dir`.
    pub public_base: Option<String>,
}

impl LocalConfig {
    pub fn in_memory(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: None,
            storage_dir: storage_dir.into(),
            jwt_secret: "dev-secret-change-me".into(),
            auto_confirm: true,
            public_base: None,
        }
    }

    pub fn public_base(&self) -> String {
        match &self.public_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("file://{}", self.storage_dir.display()),
        }
    }
}
