//! Self-signed TLS material via openssl

use std::path::PathBuf;
use std::sync::Arc;

use hm_core::ManagerError;

use crate::system::{CommandRunner, Invocation};

/// RSA modulus size of generated keys
const KEY_BITS: u32 = 4096;

/// Certificate validity
const VALID_DAYS: u32 = 365;

/// Where the certificate and key live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Produces the server's self-signed certificate.
///
/// Paths are fixed, so every call overwrites the previous pair.
pub struct CertificateProvisioner {
    cert_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl CertificateProvisioner {
    pub fn new(cert_dir: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self { cert_dir, runner }
    }

    pub fn paths(&self) -> CertificatePaths {
        CertificatePaths {
            cert: self.cert_dir.join("cert.pem"),
            key: self.cert_dir.join("key.pem"),
        }
    }

    /// Generate a certificate for `/CN=<subject>`
    pub async fn self_signed(&self, subject: &str) -> Result<CertificatePaths, ManagerError> {
        tokio::fs::create_dir_all(&self.cert_dir).await?;
        let paths = self.paths();

        let invocation = Invocation::new("openssl").args([
            "req".to_string(),
            "-x509".to_string(),
            "-newkey".to_string(),
            format!("rsa:{}", KEY_BITS),
            "-keyout".to_string(),
            paths.key.display().to_string(),
            "-out".to_string(),
            paths.cert.display().to_string(),
            "-days".to_string(),
            VALID_DAYS.to_string(),
            "-nodes".to_string(),
            "-subj".to_string(),
            format!("/CN={}", subject),
        ]);

        if let Err(e) = self.runner.run_checked(&invocation).await {
            tracing::error!("Certificate generation for {} failed: {}", subject, e);
            return Err(e.into());
        }

        tracing::info!("Generated self-signed certificate for {}", subject);
        Ok(paths)
    }
}
