//! DHCP lease files
//!
//! Two on-disk formats are understood:
//! - dnsmasq lease file, shared by IPv4 and IPv6:
//!   `<expiry> <mac> <addr> <hostname> <client-id/duid>`
//! - relay daemon host file, IPv6 only, one comment line per lease:
//!   `# <iface> <duid> <iaid> <hostname> <expiry> <id> <length> <addr>`
//!
//! Expiry is reported as seconds remaining relative to `now`, so leases that
//! already ran out come back negative.

use super::leading_int;
use serde::Serialize;

/// IPv4 lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseV4 {
    #[serde(rename = "expires")]
    pub expires_sec: i64,
    pub macaddr: String,
    pub ipaddr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// IPv6 lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseV6 {
    #[serde(rename = "expires")]
    pub expires_sec: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddr: Option<String>,
    pub ip6addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// `*` stands for "no value" in dnsmasq IPv4 rows
fn present_v4(token: &str) -> Option<String> {
    (token != "*").then(|| token.to_string())
}

/// `*` and `-` stand for "no value" in IPv6 rows of both formats
fn present(token: &str) -> Option<String> {
    match token {
        "*" | "-" => None,
        value => Some(value.to_string()),
    }
}

fn remaining(expiry: &str, now: i64) -> i64 {
    leading_int(expiry).saturating_sub(now)
}

/// IPv4 row of a dnsmasq lease file; IPv6 rows are skipped
pub fn parse_dnsmasq_v4(line: &str, now: i64) -> Option<LeaseV4> {
    let mut tokens = line.split_whitespace();
    let expiry = tokens.next()?;
    let mac = tokens.next()?;
    let addr = tokens.next()?;
    let name = tokens.next()?;

    if addr.contains(':') {
        return None;
    }

    Some(LeaseV4 {
        expires_sec: remaining(expiry, now),
        macaddr: mac.to_string(),
        ipaddr: addr.to_string(),
        hostname: present_v4(name),
    })
}

/// IPv6 row of a dnsmasq lease file; IPv4 rows are skipped
pub fn parse_dnsmasq_v6(line: &str, now: i64) -> Option<LeaseV6> {
    let mut tokens = line.split_whitespace();
    let expiry = tokens.next()?;
    let mac = tokens.next()?;
    let addr = tokens.next()?;
    let name = tokens.next()?;
    let duid = tokens.next()?;

    if !addr.contains(':') {
        return None;
    }

    Some(LeaseV6 {
        expires_sec: remaining(expiry, now),
        duid: present(duid),
        macaddr: Some(mac.to_string()),
        ip6addr: addr.to_string(),
        hostname: present(name),
    })
}

/// Lease line of the relay daemon host file
pub fn parse_relay_lease(line: &str, now: i64) -> Option<LeaseV6> {
    let body = line.strip_prefix("# ")?;
    let mut tokens = body.split_whitespace();

    let _iface = tokens.next()?;
    let duid = tokens.next()?;
    let _iaid = tokens.next()?;
    let name = tokens.next()?;
    let expiry = tokens.next()?;
    let _id = tokens.next()?;
    let _length = tokens.next()?;
    let addr = tokens.next()?;

    Some(LeaseV6 {
        expires_sec: remaining(expiry, now),
        duid: Some(duid.to_string()),
        macaddr: None,
        ip6addr: addr.to_string(),
        hostname: present(name),
    })
}

pub fn parse_dhcp_leases(text: &str, now: i64) -> Vec<LeaseV4> {
    text.lines()
        .filter_map(|line| parse_dnsmasq_v4(line, now))
        .collect()
}

pub fn parse_dnsmasq_leases6(text: &str, now: i64) -> Vec<LeaseV6> {
    text.lines()
        .filter_map(|line| parse_dnsmasq_v6(line, now))
        .collect()
}

pub fn parse_relay_leases(text: &str, now: i64) -> Vec<LeaseV6> {
    text.lines()
        .filter_map(|line| parse_relay_lease(line, now))
        .collect()
}
