//! Server and client orchestration

pub mod client;
pub mod rollback;
pub mod server;

pub use client::{ClientOrchestrator, CreatedClient, NewClient, RemovedClient};
pub use rollback::Rollback;
pub use server::{ServerInfo, ServerOrchestrator, ServerSetup, ServerStatus, SetupOutcome};

use hm_core::ManagerError;

/// Longest accepted host or domain name
const MAX_HOST_LEN: usize = 253;

/// Characters allowed in caller-supplied passwords.
///
/// Passwords are written unquoted into YAML, so indicator characters are out.
fn is_password_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '+' | '=')
}

/// Validate an integer port in `[min, 65535]`
pub(crate) fn port_in_range(value: i64, min: u16, message: &str) -> Result<u16, ManagerError> {
    match u16::try_from(value) {
        Ok(port) if port >= min => Ok(port),
        _ => Err(ManagerError::Validation(message.to_string())),
    }
}

/// Validate a remote host: DNS name, IPv4, or bracket-free IPv6
pub(crate) fn validate_host(host: &str) -> Result<(), ManagerError> {
    let ok = !host.is_empty()
        && host.len() <= MAX_HOST_LEN
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
    if ok {
        Ok(())
    } else {
        Err(ManagerError::Validation("Invalid server address".to_string()))
    }
}

/// Validate a certificate subject domain
pub(crate) fn validate_domain(domain: &str) -> Result<(), ManagerError> {
    let ok = domain.len() <= MAX_HOST_LEN
        && !domain.starts_with('-')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'));
    if ok {
        Ok(())
    } else {
        Err(ManagerError::Validation("Invalid domain".to_string()))
    }
}

/// Use the caller's password or generate one of `len` characters
pub(crate) fn password_or_generate(given: Option<&str>, len: usize) -> Result<String, ManagerError> {
    match given.map(str::trim).filter(|p| !p.is_empty()) {
        Some(password) if password.chars().all(is_password_char) => Ok(password.to_string()),
        Some(_) => Err(ManagerError::Validation(
            "Password may only contain letters, digits and - _ . ~ + =".to_string(),
        )),
        None => Ok(hm_core::alloc::random_password(len)),
    }
}
