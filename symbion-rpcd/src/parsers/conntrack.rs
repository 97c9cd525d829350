//! Connection tracking table (`/proc/net/nf_conntrack`) and counters
//!
//! A table line carries positional fields followed by `key=value` tokens for
//! the original tuple and then the reply tuple:
//! ```text
//! ipv4 2 tcp 6 7440 ESTABLISHED src=10.0.0.2 dst=1.1.1.1 sport=51000 dport=443 packets=12 bytes=1800 src=1.1.1.1 dst=10.0.0.2 sport=443 dport=51000 packets=10 bytes=9000 [ASSURED] mark=0 use=2
//! ```
//! Addresses and ports are taken from the first (original) tuple; the two
//! packet/byte counters are the rx and tx directions in that order.

use super::leading_int;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConntrackRecord {
    pub ipv6: bool,
    pub protocol: u32,
    pub expires: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dport: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_packets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_packets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_bytes: Option<u64>,
}

/// Table size counters; either file may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConntrackCounters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

/// Keyed fields of one line, each filled at most once
#[derive(Debug, Default)]
struct FlowFields {
    src: Option<String>,
    dest: Option<String>,
    sport: Option<u32>,
    dport: Option<u32>,
    packets: Directional,
    bytes: Directional,
}

/// First value seen is rx, second is tx, later ones are ignored
#[derive(Debug, Default, Clone, Copy)]
struct Directional {
    rx: Option<u64>,
    tx: Option<u64>,
}

impl Directional {
    fn record(&mut self, value: u64) {
        if self.rx.is_none() {
            self.rx = Some(value);
        } else if self.tx.is_none() {
            self.tx = Some(value);
        }
    }
}

fn fill_once<T>(slot: &mut Option<T>, value: impl FnOnce() -> T) {
    if slot.is_none() {
        *slot = Some(value());
    }
}

fn counter(value: &str) -> u64 {
    u64::try_from(leading_int(value)).unwrap_or(0)
}

fn port(value: &str) -> u32 {
    u32::try_from(leading_int(value)).unwrap_or(0)
}

impl FlowFields {
    fn absorb(&mut self, token: &str) {
        if token.starts_with('[') {
            return;
        }

        let Some((key, value)) = token.split_once('=') else {
            return;
        };

        match key {
            "src" => fill_once(&mut self.src, || value.to_string()),
            "dst" => fill_once(&mut self.dest, || value.to_string()),
            "sport" => fill_once(&mut self.sport, || port(value)),
            "dport" => fill_once(&mut self.dport, || port(value)),
            "packets" => self.packets.record(counter(value)),
            "bytes" => self.bytes.record(counter(value)),
            _ => {}
        }
    }
}

/// Parse one table line; `None` when the positional fields are missing
pub fn parse_conntrack_line(line: &str) -> Option<ConntrackRecord> {
    let mut tokens = line.split_whitespace();
    let family = tokens.next()?;
    let _family_number = tokens.next()?;
    let _protocol_name = tokens.next()?;
    let protocol = tokens.next()?;
    let expires = tokens.next()?;

    let mut fields = FlowFields::default();
    for token in tokens {
        fields.absorb(token);
    }

    Some(ConntrackRecord {
        ipv6: family == "ipv6",
        protocol: u32::try_from(leading_int(protocol)).unwrap_or(0),
        expires: leading_int(expires),
        src: fields.src,
        dest: fields.dest,
        sport: fields.sport,
        dport: fields.dport,
        rx_packets: fields.packets.rx,
        tx_packets: fields.packets.tx,
        rx_bytes: fields.bytes.rx,
        tx_bytes: fields.bytes.tx,
    })
}

pub fn parse_conntrack_table(text: &str) -> Vec<ConntrackRecord> {
    text.lines().filter_map(parse_conntrack_line).collect()
}

/// Single-value counter file such as `nf_conntrack_count`
pub fn parse_counter(text: &str) -> Option<u64> {
    text.lines().next()?.trim().parse().ok()
}
