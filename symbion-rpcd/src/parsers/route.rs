//! Kernel routing tables (`/proc/net/route`, `/proc/net/ipv6_route`)
//!
//! IPv4 addresses are printed by the kernel as the raw network-order word in
//! host byte order; IPv6 addresses as 32 hex digits in network order.
//! Rows with malformed hex fields are skipped.

use super::leading_int;
use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};

/// RTF_UP
const ROUTE_UP: u32 = 0x0001;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteV4 {
    pub target: String,
    pub nexthop: String,
    pub metric: u32,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteV6 {
    pub target: String,
    pub source: String,
    pub nexthop: String,
    pub metric: u32,
    pub device: String,
}

pub fn decode_hex_ipv4(hex: &str) -> Option<Ipv4Addr> {
    let raw = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(raw.to_ne_bytes()))
}

/// Prefix length of a kernel-printed netmask: leading set bits in host order
pub fn hex_mask_prefix(hex: &str) -> Option<u32> {
    let raw = u32::from_str_radix(hex, 16).ok()?;
    Some(u32::from_be_bytes(raw.to_ne_bytes()).leading_ones())
}

/// Dotted-quad, with `/prefix` when a mask is supplied
pub fn format_hex_ipv4(addr: &str, mask: Option<&str>) -> Option<String> {
    let addr = decode_hex_ipv4(addr)?;
    match mask {
        Some(mask) => Some(format!("{}/{}", addr, hex_mask_prefix(mask)?)),
        None => Some(addr.to_string()),
    }
}

pub fn decode_hex_ipv6(hex: &str) -> Option<Ipv6Addr> {
    if hex.len() != 32 || !hex.is_ascii() {
        return None;
    }

    let mut octets = [0u8; 16];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(Ipv6Addr::from(octets))
}

/// Canonical IPv6 text, with `/prefix` when a hex prefix length is supplied
pub fn format_hex_ipv6(addr: &str, prefix: Option<&str>) -> Option<String> {
    let addr = decode_hex_ipv6(addr)?;
    match prefix {
        Some(prefix) => Some(format!("{}/{}", addr, u32::from_str_radix(prefix, 16).ok()?)),
        None => Some(addr.to_string()),
    }
}

/// `Iface Destination Gateway Flags RefCnt Use Metric Mask ...`
pub fn parse_route_line(line: &str) -> Option<RouteV4> {
    let mut tokens = line.split_whitespace();
    let device = tokens.next()?;
    let destination = tokens.next()?;
    let gateway = tokens.next()?;
    let _flags = tokens.next()?;
    let _refcnt = tokens.next()?;
    let _use = tokens.next()?;
    let metric = tokens.next()?;
    let mask = tokens.next()?;

    Some(RouteV4 {
        target: format_hex_ipv4(destination, Some(mask))?,
        nexthop: format_hex_ipv4(gateway, None)?,
        metric: u32::try_from(leading_int(metric)).unwrap_or(0),
        device: device.to_string(),
    })
}

/// Header line first, then one route per line
pub fn parse_route_table(text: &str) -> Vec<RouteV4> {
    text.lines().skip(1).filter_map(parse_route_line).collect()
}

/// `dest dest_plen src src_plen nexthop metric refcnt use flags device`;
/// only routes that are up are returned
pub fn parse_route6_line(line: &str) -> Option<RouteV6> {
    let mut tokens = line.split_whitespace();
    let destination = tokens.next()?;
    let dest_prefix = tokens.next()?;
    let source = tokens.next()?;
    let source_prefix = tokens.next()?;
    let nexthop = tokens.next()?;
    let metric = tokens.next()?;
    let _refcnt = tokens.next()?;
    let _use = tokens.next()?;
    let flags = tokens.next()?;
    let device = tokens.next()?;

    let flags = u32::from_str_radix(flags, 16).ok()?;
    if flags & ROUTE_UP == 0 {
        return None;
    }

    Some(RouteV6 {
        target: format_hex_ipv6(destination, Some(dest_prefix))?,
        source: format_hex_ipv6(source, Some(source_prefix))?,
        nexthop: format_hex_ipv6(nexthop, None)?,
        metric: u32::from_str_radix(metric, 16).ok()?,
        device: device.to_string(),
    })
}

pub fn parse_route6_table(text: &str) -> Vec<RouteV6> {
    text.lines().filter_map(parse_route6_line).collect()
}
