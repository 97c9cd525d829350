//! Init script metadata
//!
//! Only scripts built on the rc.common framework are listed. Their start and
//! stop order comes from `START=`/`STOP=` assignments; the scan ends at the
//! first `STOP=` with a value.

use super::leading_int;
use serde::Serialize;

/// Marker expected on the first line of a managed init script
pub const RC_COMMON_MARKER: &str = "/etc/rc.common";

/// Ordering metadata read from an init script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitScriptHeader {
    pub start: Option<i64>,
    pub stop: Option<i64>,
}

impl InitScriptHeader {
    /// Name of the rc.d start link that marks the script as enabled
    pub fn start_link(&self, name: &str) -> Option<String> {
        self.start
            .filter(|n| *n >= 0)
            .map(|n| format!("S{:02}{}", n, name))
    }
}

/// One init script as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitScriptRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
    pub enabled: bool,
}

impl InitScriptRecord {
    /// A script without a start order is never enabled
    pub fn new(name: &str, header: InitScriptHeader, start_link_present: bool) -> Self {
        Self {
            name: name.to_string(),
            start: header.start,
            stop: header.stop,
            enabled: header.start_link(name).is_some() && start_link_present,
        }
    }
}

/// Parse a script body; `None` when it is not an rc.common script
pub fn parse_init_script(content: &str) -> Option<InitScriptHeader> {
    let mut lines = content.lines();
    let first = lines.next()?;
    if !first.contains(RC_COMMON_MARKER) {
        return None;
    }

    let mut header = InitScriptHeader::default();
    for line in lines {
        let mut words = line
            .split(['=', ' ', '\t'])
            .filter(|word| !word.is_empty());

        let (Some(key), Some(value)) = (words.next(), words.next()) else {
            continue;
        };

        match key {
            "START" => header.start = Some(leading_int(value)),
            "STOP" => {
                header.stop = Some(leading_int(value));
                break;
            }
            _ => {}
        }
    }

    Some(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREWALL: &str = "\
#!/bin/sh /etc/rc.common
# Copyright (C) 2008-2010 OpenWrt.org

START=19
STOP=90

boot() {
\tstart
}
";

    #[test]
    fn test_start_and_stop() {
        let header = parse_init_script(FIREWALL).unwrap();
        assert_eq!(header.start, Some(19));
        assert_eq!(header.stop, Some(90));
        assert_eq!(header.start_link("firewall").as_deref(), Some("S19firewall"));
    }

    #[test]
    fn test_foreign_script_is_skipped() {
        assert!(parse_init_script("#!/bin/sh\nSTART=10\n").is_none());
        assert!(parse_init_script("").is_none());
    }

    #[test]
    fn test_scan_stops_at_first_stop() {
        let script = "#!/bin/sh /etc/rc.common\nSTOP=10\nSTART=50\n";
        let header = parse_init_script(script).unwrap();
        assert_eq!(header.stop, Some(10));
        assert_eq!(header.start, None);
    }

    #[test]
    fn test_assignment_spacing_variants() {
        let script = "#!/bin/sh /etc/rc.common\n  START = 5\n\tSTOP=\n";
        let header = parse_init_script(script).unwrap();
        assert_eq!(header.start, Some(5));
        assert_eq!(header.stop, None);
        assert_eq!(header.start_link("boot").as_deref(), Some("S05boot"));
    }

    #[test]
    fn test_missing_start_forces_disabled() {
        let script = "#!/bin/sh /etc/rc.common\nUSE_PROCD=1\n";
        let header = parse_init_script(script).unwrap();
        let record = InitScriptRecord::new("odhcpd", header, true);
        assert!(!record.enabled);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({"name": "odhcpd", "enabled": false})
        );
    }

    #[test]
    fn test_enabled_requires_start_link() {
        let header = parse_init_script(FIREWALL).unwrap();
        assert!(InitScriptRecord::new("firewall", header, true).enabled);
        assert!(!InitScriptRecord::new("firewall", header, false).enabled);
    }
}
