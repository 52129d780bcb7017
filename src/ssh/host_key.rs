// src/ssh/host_key.rs
// Host identity verification for outbound dials

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Decides whether a server's host key is trusted.
///
/// Fingerprints use the OpenSSH `SHA256:<base64>` form.
pub trait HostKeyVerifier: Send + Sync {
    fn verify(&self, host: &str, port: u16, fingerprint: &str) -> bool;
}

/// Trusts every host key. Each dial logs the presented fingerprint so an
/// operator can still reconstruct what was accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAnyHostKey;

impl HostKeyVerifier for AcceptAnyHostKey {
    fn verify(&self, host: &str, port: u16, fingerprint: &str) -> bool {
        warn!(
            host = %host,
            port,
            fingerprint = %fingerprint,
            "accepting unverified SSH host key (host key policy: accept-any)"
        );
        true
    }
}

/// Only fingerprints listed for a host are accepted; unknown hosts are refused.
///
/// File format, one entry per line:
///
/// ```text
/// # comment
/// 10.0.0.5 SHA256:LLFla/D//8Zv6vePZ3Iobp8IMkChEtJwSktBUu7bfGc
/// bastion.internal:2222 SHA256:...
/// ```
#[derive(Debug, Default, Clone)]
pub struct PinnedHostKeys {
    entries: HashMap<String, HashSet<String>>,
}

impl PinnedHostKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&mut self, host: &str, fingerprint: &str) {
        self.entries
            .entry(host.trim().to_ascii_lowercase())
            .or_default()
            .insert(fingerprint.trim().to_string());
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut pins = Self::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(host), Some(fingerprint), None) = (parts.next(), parts.next(), parts.next())
            else {
                bail!("line {}: expected `<host[:port]> SHA256:<fingerprint>`", idx + 1);
            };
            if !fingerprint.starts_with("SHA256:") {
                bail!("line {}: fingerprint must start with SHA256:", idx + 1);
            }
            pins.pin(host, fingerprint);
        }
        Ok(pins)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read known hosts file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid known hosts file {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HostKeyVerifier for PinnedHostKeys {
    fn verify(&self, host: &str, port: u16, fingerprint: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let with_port = format!("{}:{}", host, port);

        let known = self
            .entries
            .get(&with_port)
            .or_else(|| self.entries.get(&host));

        match known {
            Some(fingerprints) if fingerprints.contains(fingerprint) => true,
            Some(_) => {
                warn!(host = %host, port, fingerprint = %fingerprint, "SSH host key mismatch; refusing connection");
                false
            }
            None => {
                warn!(host = %host, port, fingerprint = %fingerprint, "no pinned SSH host key; refusing connection");
                false
            }
        }
    }
}
