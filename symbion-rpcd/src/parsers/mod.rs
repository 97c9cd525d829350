//! Line-record parsers for OS text artifacts
//!
//! Each submodule turns one loosely structured source into typed records:
//! - Process snapshot (`top -bn1`)
//! - Init script headers, authorized keys
//! - DHCP leases in dnsmasq and relay formats
//! - ARP, IPv4 and IPv6 routing tables
//! - Connection tracking table and counters
//!
//! Parsers are pure: they take the source text and return records in source
//! order. A line that lacks a required token yields nothing; it never aborts
//! the scan.

pub mod arp;
pub mod conntrack;
pub mod initscript;
pub mod leases;
pub mod process;
pub mod route;
pub mod sshkeys;

/// Lenient integer parse: optional sign followed by leading digits.
///
/// Kernel and busybox columns carry suffixes such as `12%`, so trailing
/// garbage is ignored and a value without digits reads as zero.
pub fn leading_int(token: &str) -> i64 {
    let token = token.trim_start();
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });

    if negative {
        -value
    } else {
        value
    }
}

/// Apply a line parser to every line, dropping the ones it rejects
pub fn parse_lines<T, F>(text: &str, parse: F) -> Vec<T>
where
    F: FnMut(&str) -> Option<T>,
{
    text.lines().filter_map(parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("42"), 42);
        assert_eq!(leading_int("12%"), 12);
        assert_eq!(leading_int("  7\n"), 7);
        assert_eq!(leading_int("-5"), -5);
        assert_eq!(leading_int("+3"), 3);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
    }

    #[test]
    fn test_parse_lines_skips_rejected() {
        let values = parse_lines("1\nx\n3\n", |line| line.parse::<u32>().ok());
        assert_eq!(values, vec![1, 3]);
    }
}
