use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::config_dir;
use crate::error::Result;

/// Identity of the logged-in user and the bearer token for API and socket
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Credentials {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl Credentials {
    pub fn new(user_id: &str, token: &str) -> Self {
        Credentials {
            user_id: user_id.to_string(),
            token: Some(BASE64.encode(token)),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.as_ref().map(|encoded| {
            String::from_utf8(BASE64.decode(encoded).unwrap_or_default()).unwrap_or_default()
        })
    }
}

fn credentials_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("credentials.json"))
}

pub fn save_credentials(credentials: &Credentials) -> Result<()> {
    save_credentials_to(&credentials_path()?, credentials)
}

pub fn save_credentials_to(path: &Path, credentials: &Credentials) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, credentials)?;

    info!("Credentials saved for {}", credentials.user_id);
    Ok(())
}

pub fn load_credentials() -> Result<Option<Credentials>> {
    load_credentials_from(&credentials_path()?)
}

pub fn load_credentials_from(path: &Path) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let credentials: Credentials = serde_json::from_reader(file)?;
    info!("Loaded credentials for {} from {}", credentials.user_id, path.display());

    Ok(Some(credentials))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_not_stored_in_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        save_credentials_to(&path, &Credentials::new("user-7", "s3cret-token")).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("s3cret-token"));

        let loaded = load_credentials_from(&path).unwrap().expect("credentials present");
        assert_eq!(loaded.user_id, "user-7");
        assert_eq!(loaded.token().as_deref(), Some("s3cret-token"));
    }

    #[test]
    fn test_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_credentials_from(&dir.path().join("none.json")).unwrap().is_none());
    }
}
