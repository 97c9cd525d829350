//! System settings lookup (UCI)
//!
//! Handlers discover a few paths and sizes from the system configuration:
//! - log source and size (`system` package, `system` section)
//! - dnsmasq lease file (`dhcp` package, `dnsmasq` section)
//!
//! Lookups resolve against the first section of the requested type, the way
//! the system's own tools read these options.

use crate::parsers::leading_int;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_SYSLOG_FILE: &str = "/var/log/messages";

/// Key/value configuration service
pub trait SettingsLookup: Send + Sync {
    fn lookup(&self, package: &str, section_type: &str, option: &str) -> Option<String>;

    /// Whether `package` can be loaded at all
    fn has_package(&self, package: &str) -> bool;
}

/// Reads UCI packages from a configuration directory (normally `/etc/config`)
#[derive(Debug, Clone)]
pub struct UciStore {
    dir: PathBuf,
}

impl UciStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SettingsLookup for UciStore {
    fn lookup(&self, package: &str, section_type: &str, option: &str) -> Option<String> {
        let path = self.dir.join(package);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("Settings package {} unavailable: {}", path.display(), e);
                return None;
            }
        };

        find_option(&text, section_type, option)
    }

    fn has_package(&self, package: &str) -> bool {
        self.dir.join(package).is_file()
    }
}

/// Split a UCI line into words, honouring single and double quotes
fn uci_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '#' if !in_word => break,
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if in_word {
        words.push(current);
    }
    words
}

/// Value of `option` in the first section of `section_type`
pub fn find_option(text: &str, section_type: &str, option: &str) -> Option<String> {
    let mut in_section = false;
    let mut seen_section = false;

    for line in text.lines() {
        let words = uci_words(line);
        match words.first().map(String::as_str) {
            Some("config") => {
                if seen_section {
                    return None;
                }
                in_section = words.get(1).map(String::as_str) == Some(section_type);
                seen_section = in_section;
            }
            Some("option") if in_section => {
                if words.get(1).map(String::as_str) == Some(option) {
                    return words.get(2).cloned();
                }
            }
            _ => {}
        }
    }

    None
}

/// Where the system log comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// Log file; the whole file is the requested size
    File(PathBuf),
    /// Log daemon output, `requested` bytes (0 selects the default)
    Stream { requested: usize },
}

/// `None` when the `system` package is missing
pub fn system_log_source(settings: &dyn SettingsLookup) -> Option<LogSource> {
    if !settings.has_package("system") {
        return None;
    }

    let log_type = settings.lookup("system", "system", "log_type");

    if log_type.as_deref() == Some("file") {
        let path = settings
            .lookup("system", "system", "log_file")
            .unwrap_or_else(|| DEFAULT_SYSLOG_FILE.to_string());
        return Some(LogSource::File(PathBuf::from(path)));
    }

    let requested = settings
        .lookup("system", "system", "log_size")
        .and_then(|kib| usize::try_from(leading_int(&kib)).ok())
        .map(|kib| kib.saturating_mul(1024))
        .unwrap_or(0);

    Some(LogSource::Stream { requested })
}

/// dnsmasq lease file, when configured
pub fn dhcp_lease_file(settings: &dyn SettingsLookup) -> Option<PathBuf> {
    settings
        .lookup("dhcp", "dnsmasq", "leasefile")
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SYSTEM: &str = "\
config system
\toption hostname 'OpenWrt'
\toption log_size '64'
\toption timezone \"UTC\"

config timeserver 'ntp'
\tlist server '0.openwrt.pool.ntp.org'
";

    const DHCP: &str = "\
config dnsmasq
\toption domainneeded '1'
\toption leasefile '/tmp/dhcp.leases' # runtime
\toption resolvfile '/tmp/resolv.conf.auto'

config dnsmasq 'second'
\toption leasefile '/tmp/other.leases'
";

    #[test]
    fn test_uci_words() {
        assert_eq!(uci_words("\toption hostname 'Open Wrt'"), vec!["option", "hostname", "Open Wrt"]);
        assert_eq!(uci_words("config dnsmasq # comment"), vec!["config", "dnsmasq"]);
        assert_eq!(uci_words("option empty ''"), vec!["option", "empty", ""]);
        assert!(uci_words("# only a comment").is_empty());
    }

    #[test]
    fn test_first_section_wins() {
        assert_eq!(
            find_option(DHCP, "dnsmasq", "leasefile").as_deref(),
            Some("/tmp/dhcp.leases")
        );
        assert_eq!(find_option(DHCP, "dnsmasq", "missing"), None);
        assert_eq!(find_option(SYSTEM, "system", "timezone").as_deref(), Some("UTC"));
        assert_eq!(find_option(SYSTEM, "timeserver", "server"), None);
    }

    #[test]
    fn test_store_reads_packages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system"), SYSTEM).unwrap();
        fs::write(dir.path().join("dhcp"), DHCP).unwrap();

        let store = UciStore::new(dir.path());
        assert_eq!(store.lookup("system", "system", "hostname").as_deref(), Some("OpenWrt"));
        assert_eq!(store.lookup("network", "interface", "proto"), None);

        assert_eq!(
            dhcp_lease_file(&store),
            Some(PathBuf::from("/tmp/dhcp.leases"))
        );
        assert_eq!(
            system_log_source(&store),
            Some(LogSource::Stream { requested: 64 * 1024 })
        );
    }

    #[test]
    fn test_oversized_log_size_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let store = UciStore::new(dir.path());

        fs::write(
            dir.path().join("system"),
            "config system\n\toption log_size '99999999999999999999'\n",
        )
        .unwrap();
        assert_eq!(
            system_log_source(&store),
            Some(LogSource::Stream { requested: usize::MAX })
        );

        fs::write(dir.path().join("system"), "config system\n\toption log_size '-5'\n").unwrap();
        assert_eq!(system_log_source(&store), Some(LogSource::Stream { requested: 0 }));
    }

    #[test]
    fn test_file_log_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = UciStore::new(dir.path());

        fs::write(dir.path().join("system"), "config system\n\toption log_type 'file'\n").unwrap();
        assert_eq!(
            system_log_source(&store),
            Some(LogSource::File(PathBuf::from(DEFAULT_SYSLOG_FILE)))
        );

        fs::write(
            dir.path().join("system"),
            "config system\n\toption log_type 'file'\n\toption log_file '/tmp/log/system.log'\n",
        )
        .unwrap();
        assert_eq!(
            system_log_source(&store),
            Some(LogSource::File(PathBuf::from("/tmp/log/system.log")))
        );
    }

    #[test]
    fn test_missing_package() {
        let dir = tempfile::tempdir().unwrap();
        let store = UciStore::new(dir.path());
        assert!(!store.has_package("system"));
        assert_eq!(system_log_source(&store), None);
        assert_eq!(dhcp_lease_file(&store), None);

        fs::write(dir.path().join("system"), "config system\n").unwrap();
        assert_eq!(system_log_source(&store), Some(LogSource::Stream { requested: 0 }));
    }
}
