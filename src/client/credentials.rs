use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Credential file name inside the data directory
const CREDENTIAL_FILE: &str = "credentials.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

/// Durable storage for the refresh credential. The access credential is
/// deliberately never written here: it lives only in process memory.
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location under the OS data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("atelier").join(CREDENTIAL_FILE))
    }

    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("failed to read credential file")?;
        let stored: StoredCredentials =
            serde_json::from_str(&contents).context("failed to parse credential file")?;
        Ok(Some(stored.refresh_token))
    }

    pub fn save(&self, refresh_token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredCredentials {
            refresh_token: refresh_token.to_string(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, contents).context("failed to write credential file")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("failed to remove credential file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = CredentialFile::new(dir.path().join("creds.json"));

        assert_eq!(file.load().unwrap(), None);
        file.save("refresh-abc").unwrap();
        assert_eq!(file.load().unwrap().as_deref(), Some("refresh-abc"));
        file.clear().unwrap();
        assert_eq!(file.load().unwrap(), None);
        // clearing twice is fine
        file.clear().unwrap();
    }
}
