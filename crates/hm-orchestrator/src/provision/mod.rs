//! Provisioning of artifacts produced by external tools

pub mod cert;
pub mod installer;

pub use cert::{CertificatePaths, CertificateProvisioner};
pub use installer::BinaryInstaller;
