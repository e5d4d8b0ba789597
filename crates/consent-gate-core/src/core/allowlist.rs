// crates/consent-gate-core/src/core/allowlist.rs
// ============================================================================
// Module: Consent Gate Allowlist Entries
// Description: Single IP or CIDR range entries for origin filtering.
// Purpose: Parse and match IPv4/IPv6 networks without external dependencies.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! An allowlist entry is either a single address (`10.1.2.3`, `::1`) or a CIDR
//! range (`10.0.0.0/8`, `fd00::/8`). Host bits beyond the prefix are ignored
//! when matching. IPv4-mapped IPv6 peers (`::ffff:10.1.2.3`) are matched
//! against IPv4 entries so dual-stack listeners behave like IPv4 ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::str::FromStr;

use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Single address or CIDR range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowlistEntry {
    /// IPv4 network.
    V4 {
        /// Network address (host bits may be set).
        network: Ipv4Addr,
        /// Prefix length in bits (0..=32).
        prefix: u8,
    },
    /// IPv6 network.
    V6 {
        /// Network address (host bits may be set).
        network: Ipv6Addr,
        /// Prefix length in bits (0..=128).
        prefix: u8,
    },
}

/// Allowlist entry parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowlistError {
    /// Address portion is not a valid IP address.
    #[error("invalid allowlist address: {0}")]
    InvalidAddress(String),
    /// Prefix length is not a number or exceeds the address width.
    #[error("invalid allowlist prefix: {0}")]
    InvalidPrefix(String),
}

// ============================================================================
// SECTION: Parsing and Matching
// ============================================================================

impl AllowlistEntry {
    /// Parses an address or CIDR string.
    ///
    /// # Errors
    ///
    /// Returns [`AllowlistError`] when the address or prefix is invalid.
    pub fn parse(value: &str) -> Result<Self, AllowlistError> {
        let trimmed = value.trim();
        let (address, prefix) = match trimmed.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (trimmed, None),
        };
        let ip = IpAddr::from_str(address)
            .map_err(|_| AllowlistError::InvalidAddress(value.to_string()))?;
        let max_prefix: u8 = if ip.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            None => max_prefix,
            Some(raw) => {
                let parsed = raw
                    .parse::<u8>()
                    .map_err(|_| AllowlistError::InvalidPrefix(value.to_string()))?;
                if parsed > max_prefix {
                    return Err(AllowlistError::InvalidPrefix(value.to_string()));
                }
                parsed
            }
        };
        Ok(match ip {
            IpAddr::V4(network) => Self::V4 {
                network,
                prefix,
            },
            IpAddr::V6(network) => Self::V6 {
                network,
                prefix,
            },
        })
    }

    /// Returns true when `addr` falls inside this entry.
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = canonical_ip(addr);
        match (self, addr) {
            (
                Self::V4 {
                    network,
                    prefix,
                },
                IpAddr::V4(candidate),
            ) => {
                let mask = v4_mask(*prefix);
                u32::from(*network) & mask == u32::from(candidate) & mask
            }
            (
                Self::V6 {
                    network,
                    prefix,
                },
                IpAddr::V6(candidate),
            ) => {
                let mask = v6_mask(*prefix);
                u128::from(*network) & mask == u128::from(candidate) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for AllowlistEntry {
    type Err = AllowlistError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for AllowlistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 {
                network,
                prefix,
            } => write!(f, "{network}/{prefix}"),
            Self::V6 {
                network,
                prefix,
            } => write!(f, "{network}/{prefix}"),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Unwraps IPv4-mapped IPv6 addresses.
#[must_use]
pub fn canonical_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        IpAddr::V4(_) => addr,
    }
}

/// Builds an IPv4 network mask for a prefix length.
fn v4_mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}

/// Builds an IPv6 network mask for a prefix length.
fn v6_mask(prefix: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
