// src/credential/mod.rs
// Stored key material -> one-shot SSH authentication method
//
// Nothing in this module may log or format the key text itself.

use std::fmt;
use std::sync::Arc;

use russh::keys::ssh_key::Algorithm;
use russh::keys::{HashAlg, PrivateKey, PrivateKeyWithHashAlg};
use tracing::debug;

use crate::directory::TargetDescriptor;

/// Private key text as stored in the directory. `Debug` never shows it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialMaterial(Option<String>);

impl CredentialMaterial {
    pub fn new(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    /// Whitespace-only counts as absent.
    pub fn is_present(&self) -> bool {
        self.0.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    fn expose(&self) -> Option<&str> {
        self.0.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl From<Option<String>> for CredentialMaterial {
    fn from(value: Option<String>) -> Self {
        Self(value)
    }
}

impl fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_present() {
            f.write_str("CredentialMaterial(<redacted>)")
        } else {
            f.write_str("CredentialMaterial(<absent>)")
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no private key stored for host {host}")]
    Missing { host: String },

    #[error("invalid private key stored for host {host}: {reason}")]
    Malformed { host: String, reason: String },
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// A parsed key good for exactly one client authentication. Not `Clone`.
pub struct AuthMethod {
    key: PrivateKey,
}

impl AuthMethod {
    pub fn algorithm(&self) -> String {
        self.key.algorithm().to_string()
    }

    pub fn public_fingerprint(&self) -> String {
        self.key.public_key().fingerprint(HashAlg::Sha256).to_string()
    }

    /// Consumes the method into what `russh` wants for publickey auth.
    /// RSA keys are offered with SHA-256 signatures; `ssh-rsa` (SHA-1) is
    /// disabled on most current servers.
    pub fn into_russh(self) -> PrivateKeyWithHashAlg {
        let hash = match self.key.algorithm() {
            Algorithm::Rsa { .. } => Some(HashAlg::Sha256),
            _ => None,
        };
        PrivateKeyWithHashAlg::new(Arc::new(self.key), hash)
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMethod")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Stateless; every session re-parses so rotated keys take effect at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialResolver;

impl CredentialResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, target: &TargetDescriptor) -> CredentialResult<AuthMethod> {
        let Some(text) = target.credential.expose() else {
            debug!(host = %target.host, credential = "missing", "no key material for target");
            return Err(CredentialError::Missing {
                host: target.host.clone(),
            });
        };

        match russh::keys::decode_secret_key(text.trim(), None) {
            Ok(key) => {
                debug!(host = %target.host, credential = "present", algorithm = %key.algorithm(), "key material decoded");
                Ok(AuthMethod { key })
            }
            Err(e) => {
                let reason = match e {
                    russh::keys::Error::KeyIsEncrypted => "key is passphrase protected".to_string(),
                    other => other.to_string(),
                };
                debug!(host = %target.host, credential = "malformed", "key material rejected");
                Err(CredentialError::Malformed {
                    host: target.host.clone(),
                    reason,
                })
            }
        }
    }
}
