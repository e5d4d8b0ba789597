// crates/consent-gate-core/src/core/allowlist/tests.rs
// ============================================================================
// Module: Allowlist Entry Tests
// Description: Unit and property tests for IP/CIDR parsing and matching.
// Purpose: Validate containment for IPv4, IPv6, and mapped addresses.
// Dependencies: consent-gate-core, proptest
// ============================================================================

//! ## Overview
//! Validates allowlist parsing rejects malformed entries and that CIDR
//! containment matches the network mask exactly.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::Ipv4Addr;

use proptest::prelude::*;

use super::AllowlistEntry;
use super::AllowlistError;

// ============================================================================
// SECTION: Parsing Tests
// ============================================================================

#[test]
fn parse_single_address_uses_full_prefix() {
    let entry = AllowlistEntry::parse("10.1.2.3").unwrap();
    assert_eq!(entry.to_string(), "10.1.2.3/32");
    let entry = AllowlistEntry::parse("::1").unwrap();
    assert_eq!(entry.to_string(), "::1/128");
}

#[test]
fn parse_rejects_invalid_address() {
    let err = AllowlistEntry::parse("10.0.0.300/8").expect_err("expected address rejection");
    assert!(matches!(err, AllowlistError::InvalidAddress(_)));
}

#[test]
fn parse_rejects_oversized_prefix() {
    let err = AllowlistEntry::parse("10.0.0.0/33").expect_err("expected prefix rejection");
    assert!(matches!(err, AllowlistError::InvalidPrefix(_)));
    let err = AllowlistEntry::parse("fd00::/129").expect_err("expected prefix rejection");
    assert!(matches!(err, AllowlistError::InvalidPrefix(_)));
}

#[test]
fn parse_rejects_non_numeric_prefix() {
    let err = AllowlistEntry::parse("10.0.0.0/eight").expect_err("expected prefix rejection");
    assert!(matches!(err, AllowlistError::InvalidPrefix(_)));
}

// ============================================================================
// SECTION: Matching Tests
// ============================================================================

#[test]
fn ten_slash_eight_admits_inside_and_rejects_outside() {
    let entry = AllowlistEntry::parse("10.0.0.0/8").unwrap();
    assert!(entry.contains("10.1.2.3".parse().unwrap()));
    assert!(!entry.contains("192.168.1.1".parse().unwrap()));
}

#[test]
fn host_bits_in_entry_are_ignored() {
    let entry = AllowlistEntry::parse("192.168.7.99/16").unwrap();
    assert!(entry.contains("192.168.200.1".parse().unwrap()));
    assert!(!entry.contains("192.169.0.1".parse().unwrap()));
}

#[test]
fn zero_prefix_matches_every_address_of_the_family() {
    let v4 = AllowlistEntry::parse("0.0.0.0/0").unwrap();
    assert!(v4.contains("203.0.113.9".parse().unwrap()));
    assert!(!v4.contains("2001:db8::1".parse().unwrap()));
    let v6 = AllowlistEntry::parse("::/0").unwrap();
    assert!(v6.contains("2001:db8::1".parse().unwrap()));
}

#[test]
fn ipv6_prefix_matches() {
    let entry = AllowlistEntry::parse("2001:db8::/32").unwrap();
    assert!(entry.contains("2001:db8:ffff::1".parse().unwrap()));
    assert!(!entry.contains("2001:db9::1".parse().unwrap()));
}

#[test]
fn ipv4_mapped_peer_matches_ipv4_entry() {
    let entry = AllowlistEntry::parse("10.0.0.0/8").unwrap();
    assert!(entry.contains("::ffff:10.9.8.7".parse().unwrap()));
}

// ============================================================================
// SECTION: Property Tests
// ============================================================================

proptest! {
    #[test]
    fn v4_containment_matches_mask(network in any::<u32>(), candidate in any::<u32>(), prefix in 0u8..=32) {
        let entry = AllowlistEntry::V4 {
            network: Ipv4Addr::from(network),
            prefix,
        };
        let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - u32::from(prefix)) };
        let expected = network & mask == candidate & mask;
        prop_assert_eq!(entry.contains(IpAddr::V4(Ipv4Addr::from(candidate))), expected);
    }

    #[test]
    fn network_address_is_always_contained(network in any::<u32>(), prefix in 0u8..=32) {
        let entry = AllowlistEntry::V4 {
            network: Ipv4Addr::from(network),
            prefix,
        };
        prop_assert!(entry.contains(IpAddr::V4(Ipv4Addr::from(network))));
    }
}
