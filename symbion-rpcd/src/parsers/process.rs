//! Process table parsing for `busybox top -bn1` snapshots
//!
//! Data rows look like:
//! ```text
//!  1234     1 root     S     1524   1%   0% /sbin/procd
//!   812   801 nobody   SW<      0   0%   0% [kworker/0:1H]
//! ```
//! The STAT column is three characters wide and may contain spaces, so it is
//! cut at a fixed width before the remaining columns are tokenized. Banner
//! and header lines do not start with a number and are skipped.

use super::{leading_int, parse_lines};
use serde::{Serialize, Serializer};

/// One running process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    pub user: String,
    #[serde(rename = "stat")]
    pub state: String,
    #[serde(rename = "vsize", serialize_with = "kib_as_bytes")]
    pub vsize_kb: u64,
    #[serde(rename = "vsize_percent")]
    pub vsize_pct: u32,
    #[serde(rename = "cpu_percent")]
    pub cpu_pct: u32,
    pub command: String,
}

fn kib_as_bytes<S: Serializer>(kib: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(kib.saturating_mul(1024))
}

const STAT_WIDTH: usize = 3;

/// Whitespace tokenizer that can also hand out fixed-width fields
struct Columns<'a> {
    rest: &'a str,
}

impl<'a> Columns<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn skip_blanks(&mut self) {
        self.rest = self.rest.trim_start_matches([' ', '\t']);
    }

    fn token(&mut self) -> Option<&'a str> {
        self.skip_blanks();
        if self.rest.is_empty() {
            return None;
        }

        let end = self.rest.find([' ', '\t']).unwrap_or(self.rest.len());
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(token)
    }

    /// Take `width` characters starting at the next non-blank, padding
    /// with spaces, then drop the separator that follows.
    fn fixed(&mut self, width: usize) -> Option<String> {
        self.skip_blanks();
        if self.rest.is_empty() {
            return None;
        }

        let mut chars = self.rest.char_indices();
        let mut field = String::with_capacity(width);
        for _ in 0..width {
            match chars.next() {
                Some((_, c)) => field.push(c),
                None => field.push(' '),
            }
        }

        // the column separator following the field
        chars.next();
        self.rest = chars.as_str();
        Some(field)
    }

    fn remainder(&self) -> &'a str {
        self.rest.trim_start_matches([' ', '\t']).trim_end()
    }
}

/// Parse one snapshot row; `None` for anything that is not a complete row
pub fn parse_process_line(line: &str) -> Option<ProcessRecord> {
    let mut cols = Columns::new(line);

    let pid = cols.token()?;
    if !pid.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let pid: u32 = pid.parse().ok()?;

    let ppid = cols.token()?;
    let user = cols.token()?;
    let state = cols.fixed(STAT_WIDTH)?;

    let vsize = cols.token()?;
    let vsize_pct = cols.token()?;
    let cpu_pct = cols.token()?;

    let command = cols.remainder();
    if command.is_empty() {
        return None;
    }

    Some(ProcessRecord {
        pid,
        ppid: to_u32(leading_int(ppid)),
        user: user.to_string(),
        state,
        vsize_kb: u64::try_from(leading_int(vsize)).unwrap_or(0),
        vsize_pct: to_u32(leading_int(vsize_pct)),
        cpu_pct: to_u32(leading_int(cpu_pct)),
        command: command.to_string(),
    })
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub fn parse_process_table(text: &str) -> Vec<ProcessRecord> {
    parse_lines(text, parse_process_line)
}
