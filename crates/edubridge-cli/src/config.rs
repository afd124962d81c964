use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::info;

use edubridge_backend::{Backend, BackendConfig, LocalBackend, LocalConfig, RemoteBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub kind: BackendKind,
    pub remote: Option<BackendConfig>,
    pub local: LocalConfig,
    pub site_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let kind = match var("EDUBRIDGE_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("local") => BackendKind::Local,
            Some("remote") => BackendKind::Remote,
            Some(other) => bail!("EDUBRIDGE_BACKEND must be 'local' or 'remote', got '{}'", other),
        };

        let remote = match (var("EDUBRIDGE_URL"), var("EDUBRIDGE_ANON_KEY")) {
            (Some(url), Some(key)) => Some(BackendConfig::new(url, key)),
            _ if kind == BackendKind::Remote => {
                bail!("EDUBRIDGE_URL and EDUBRIDGE_ANON_KEY are required for the remote backend")
            }
            _ => None,
        };

        let auto_confirm = match var("EDUBRIDGE_AUTO_CONFIRM") {
            Some(value) => value
                .trim()
                .parse::<bool>()
                .with_context(|| format!("EDUBRIDGE_AUTO_CONFIRM: '{}'", value))?,
            None => true,
        };
        let local = LocalConfig {
            db_path: Some(PathBuf::from(
                var("EDUBRIDGE_DB_PATH").unwrap_or_else(|| "edubridge.db".into()),
            )),
            storage_dir: PathBuf::from(
                var("EDUBRIDGE_STORAGE_DIR").unwrap_or_else(|| "edubridge-storage".into()),
            ),
            jwt_secret: var("EDUBRIDGE_JWT_SECRET").unwrap_or_else(|| "dev-secret-change-me".into()),
            auto_confirm,
            public_base: None,
        };

        Ok(Self {
            kind,
            remote,
            local,
            site_url: var("EDUBRIDGE_SITE_URL").unwrap_or_else(|| "http://localhost:3000".into()),
        })
    }
}

/// The backend the views talk to, plus the local handle when there is one
/// (the shell's `confirm` command needs it).
pub fn connect(config: &Config) -> anyhow::Result<(Arc<dyn Backend>, Option<LocalBackend>)> {
    match (config.kind, &config.remote) {
        (BackendKind::Remote, Some(remote)) => {
            let remote = RemoteBackend::new(remote.clone());
            info!(url = %remote.config().url, "Using hosted backend");
            let backend: Arc<dyn Backend> = Arc::new(remote);
            Ok((backend, None))
        }
        (BackendKind::Remote, None) => bail!("remote backend is not configured"),
        (BackendKind::Local, _) => {
            let local = LocalBackend::open(&config.local).context("opening local backend")?;
            info!(
                db = %config.local.db_path.as_deref().unwrap_or(std::path::Path::new(":memory:")).display(),
                storage = %config.local.storage_dir.display(),
                "Using local backend"
            );
            let backend: Arc<dyn Backend> = Arc::new(local.clone());
            Ok((backend, Some(local)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_local_backend() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.kind, BackendKind::Local);
        assert!(config.local.auto_confirm);
        assert_eq!(config.local.db_path, Some(PathBuf::from("edubridge.db")));
        assert!(config.remote.is_none());
    }

    #[test]
    fn remote_needs_url_and_key() {
        assert!(Config::from_lookup(lookup(&[("EDUBRIDGE_BACKEND", "remote")])).is_err());

        let config = Config::from_lookup(lookup(&[
            ("EDUBRIDGE_BACKEND", "remote"),
            ("EDUBRIDGE_URL", "https://abc.supabase.co/"),
            ("EDUBRIDGE_ANON_KEY", "anon"),
            ("EDUBRIDGE_SITE_URL", "https://edubridgepeople.com"),
        ]))
        .unwrap();
        assert_eq!(config.remote.unwrap().url, "https://abc.supabase.co");
        assert_eq!(config.site_url, "https://edubridgepeople.com");
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(Config::from_lookup(lookup(&[("EDUBRIDGE_BACKEND", "firebase")])).is_err());
        assert!(Config::from_lookup(lookup(&[("EDUBRIDGE_AUTO_CONFIRM", "sometimes")])).is_err());
    }
}
