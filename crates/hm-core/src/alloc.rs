//! Identifier, port and credential allocation
//!
//! The allocators are pure: they look at the ids/ports currently in the
//! store and return the smallest free candidate. Callers must hold the store
//! writer lock between allocating and persisting, otherwise two concurrent
//! requests can be handed the same value.

use std::collections::HashSet;
use std::ops::Range;

use rand::distributions::{Alphanumeric, DistString};

use crate::error::AllocError;
use crate::types::ClientId;

/// Slot numbers handed out for `client<N>` ids
pub const CLIENT_SLOTS: Range<u32> = 1..99;

/// Local SOCKS5 ports handed out automatically
pub const LOCAL_PORTS: Range<u16> = 1081..1100;

/// Smallest custom SOCKS5 port a caller may request
pub const MIN_CUSTOM_PORT: u16 = 1024;

/// Length of generated client passwords
pub const CLIENT_PASSWORD_LEN: usize = 12;

/// Length of generated server passwords
pub const SERVER_PASSWORD_LEN: usize = 16;

/// Pick the lowest free `client<N>` id
pub fn next_client_id<'a, I>(existing: I) -> Result<ClientId, AllocError>
where
    I: IntoIterator<Item = &'a ClientId>,
{
    let used: HashSet<u32> = existing.into_iter().filter_map(ClientId::number).collect();

    CLIENT_SLOTS
        .clone()
        .find(|n| !used.contains(n))
        .map(ClientId::numbered)
        .ok_or_else(|| AllocError::Exhausted {
            kind: "client id",
            fallback: ClientId::numbered(CLIENT_SLOTS.end).to_string(),
        })
}

/// Pick the lowest free SOCKS5 port in [`LOCAL_PORTS`]
pub fn next_available_port<I>(used: I) -> Result<u16, AllocError>
where
    I: IntoIterator<Item = u16>,
{
    let used: HashSet<u16> = used.into_iter().collect();

    LOCAL_PORTS
        .clone()
        .find(|p| !used.contains(p))
        .ok_or_else(|| AllocError::Exhausted {
            kind: "port",
            fallback: LOCAL_PORTS.start.to_string(),
        })
}

/// Generate a random alphanumeric password from a CSPRNG
pub fn random_password(length: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), length)
}
