//! Neighbour table from `/proc/net/arp`

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArpRecord {
    pub ipaddr: String,
    pub macaddr: String,
    pub device: String,
}

/// `IP address  HW type  Flags  HW address  Mask  Device`
pub fn parse_arp_line(line: &str) -> Option<ArpRecord> {
    let mut tokens = line.split_whitespace();
    let addr = tokens.next()?;
    let _hw_type = tokens.next()?;
    let _flags = tokens.next()?;
    let mac = tokens.next()?;
    let _mask = tokens.next()?;
    let device = tokens.next()?;

    Some(ArpRecord {
        ipaddr: addr.to_string(),
        macaddr: mac.to_string(),
        device: device.to_string(),
    })
}

/// The first line is the column header and is always skipped
pub fn parse_arp_table(text: &str) -> Vec<ArpRecord> {
    text.lines().skip(1).filter_map(parse_arp_line).collect()
}
