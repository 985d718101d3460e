//! Remembered session storage
//!
//! Keeps the credential between runs. The bearer token is encrypted at rest
//! with AES-256-GCM under a per-installation key file.

use super::Credential;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

const SESSION_FILE: &str = "session.json";
const KEY_FILE: &str = ".session_key";
const KEY_SIZE: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    identity: String,
    token: SealedToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// Bearer token as stored: both halves base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedToken {
    nonce: String,
    ciphertext: String,
}

/// Per-installation key for the stored token.
struct SessionKey(Aes256Gcm);

impl SessionKey {
    fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() != KEY_SIZE {
            anyhow::bail!("session key must be {} bytes, found {}", KEY_SIZE, bytes.len());
        }
        Ok(Self(Aes256Gcm::new_from_slice(bytes)?))
    }

    fn seal(&self, token: &str) -> anyhow::Result<SealedToken> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .0
            .encrypt(&nonce, token.as_bytes())
            .map_err(|e| anyhow::anyhow!("Token encryption failed: {}", e))?;

        Ok(SealedToken {
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    fn open(&self, sealed: &SealedToken) -> anyhow::Result<String> {
        let nonce = BASE64.decode(&sealed.nonce)?;
        if nonce.len() != 12 {
            anyhow::bail!("stored nonce has the wrong length");
        }
        let ciphertext = BASE64.decode(&sealed.ciphertext)?;

        let token = self
            .0
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|e| anyhow::anyhow!("Token decryption failed: {}", e))?;
        Ok(String::from_utf8(token)?)
    }
}

pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }

    /// Read the key file, or create one (owner-only on unix) when it is
    /// missing or unreadable as a key.
    async fn key(&self) -> anyhow::Result<SessionKey> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.key_path();

        if fs::try_exists(&path).await? {
            let encoded = fs::read_to_string(&path).await?;
            match BASE64
                .decode(encoded.trim())
                .map_err(anyhow::Error::from)
                .and_then(|bytes| SessionKey::from_bytes(&bytes))
            {
                Ok(key) => return Ok(key),
                Err(e) => warn!("Replacing unusable session key: {}", e),
            }
        }

        let bytes: [u8; KEY_SIZE] = rand::random();
        fs::write(&path, BASE64.encode(bytes)).await?;
        restrict_to_owner(&path).await?;
        info!(path = %path.display(), "Created session key");
        SessionKey::from_bytes(&bytes)
    }

    /// Load the remembered credential. Expired or undecryptable sessions
    /// are removed and reported as absent.
    pub async fn load(&self) -> anyhow::Result<Option<Credential>> {
        let path = self.session_path();
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let stored: StoredSession = serde_json::from_str(&content)?;
        let key = self.key().await?;

        let token = match key.open(&stored.token) {
            Ok(token) => token,
            Err(e) => {
                warn!("Stored session could not be decrypted, discarding: {}", e);
                self.clear().await?;
                return Ok(None);
            }
        };

        let credential = Credential {
            identity: stored.identity,
            token,
            profile: stored.profile,
            expires_at: stored.expires_at,
        };

        if credential.is_expired() {
            info!(identity = %credential.identity, "Stored session has expired");
            self.clear().await?;
            return Ok(None);
        }

        info!(identity = %credential.identity, "Loaded stored session");
        Ok(Some(credential))
    }

    pub async fn save(&self, credential: &Credential) -> anyhow::Result<()> {
        let key = self.key().await?;

        let stored = StoredSession {
            identity: credential.identity.clone(),
            token: key.seal(&credential.token)?,
            profile: credential.profile.clone(),
            expires_at: credential.expires_at,
        };

        let content = serde_json::to_string_pretty(&stored)?;
        let path = self.session_path();
        fs::write(&path, content).await?;
        restrict_to_owner(&path).await?;

        info!(path = %path.display(), "Saved session");
        Ok(())
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        let path = self.session_path();
        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
            info!("Removed stored session");
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn credential(expires_at: Option<DateTime<Utc>>) -> Credential {
        Credential {
            identity: "ana@example.com".to_string(),
            token: "secret-bearer-token".to_string(),
            profile: Some(serde_json::json!({"email": "ana@example.com"})),
            expires_at,
        }
    }

    #[tokio::test]
    async fn session_survives_a_restart() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().to_path_buf());

        let cred = credential(Some(Utc::now() + Duration::hours(1)));
        store.save(&cred).await.unwrap();

        let raw = std::fs::read_to_string(temp_dir.path().join(SESSION_FILE)).unwrap();
        assert!(!raw.contains("secret-bearer-token"));

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.token, cred.token);
        assert_eq!(loaded.identity, cred.identity);
    }

    #[tokio::test]
    async fn expired_session_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().to_path_buf());

        store
            .save(&credential(Some(Utc::now() - Duration::minutes(5))))
            .await
            .unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(!temp_dir.path().join(SESSION_FILE).exists());
    }

    #[tokio::test]
    async fn clear_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().to_path_buf());

        assert!(store.load().await.unwrap().is_none());
        store.save(&credential(None)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn key_is_reused_between_runs() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().to_path_buf());

        let sealed = store.key().await.unwrap().seal("bearer-xyz").unwrap();
        assert_ne!(sealed.ciphertext, "bearer-xyz");

        let reopened = CredentialStore::new(temp_dir.path().to_path_buf());
        assert_eq!(reopened.key().await.unwrap().open(&sealed).unwrap(), "bearer-xyz");
    }

    #[tokio::test]
    async fn lost_key_discards_the_session() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::new(temp_dir.path().to_path_buf());
        store.save(&credential(None)).await.unwrap();

        std::fs::remove_file(temp_dir.path().join(KEY_FILE)).unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(!temp_dir.path().join(SESSION_FILE).exists());
    }
}
