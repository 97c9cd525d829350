//! Bounded tail reader for log sources
//!
//! Log sources are either regular files or the stdout of a log command, so the
//! reader only ever moves forward. It consumes the source in chunks no larger
//! than the hard cap and keeps the most recent bytes, which keeps memory and
//! the amount read from a live stream bounded.

use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Tail size used when the caller asks for zero bytes
pub const DEFAULT_LOG_SIZE: usize = 16 * 1024;

/// Upper bound on the size of a returned log
pub const MAX_LOG_SIZE: usize = 128 * 1024;

/// Size policy for tail reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailLimits {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for TailLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_LOG_SIZE,
            max_size: MAX_LOG_SIZE,
        }
    }
}

/// Raw log bytes; not guaranteed to be valid UTF-8
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBlob(Vec<u8>);

impl LogBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl Serialize for LogBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Read the tail of `source`.
///
/// `requested == 0` selects the default size. At most `requested` bytes are
/// consumed when the source length is unknown (pipes); when `available` is
/// known (regular files) the whole source is consumed so the result is its
/// true tail. The result holds the last `min(requested, max_size)` bytes of
/// what was consumed.
pub async fn read_tail<R>(
    mut source: R,
    requested: usize,
    available: Option<u64>,
    limits: TailLimits,
) -> io::Result<LogBlob>
where
    R: AsyncRead + Unpin,
{
    let requested = if requested == 0 {
        limits.default_size
    } else {
        requested
    };
    let keep = requested.min(limits.max_size);
    if keep == 0 {
        return Ok(LogBlob::default());
    }

    let mut remaining = available.unwrap_or(requested as u64);
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(keep);
    let mut chunk = vec![0u8; keep];
    let mut consumed = 0u64;

    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(keep, |r| r.min(keep));
        let n = source.read(&mut chunk[..want]).await?;
        if n == 0 {
            break;
        }

        remaining -= n as u64;
        consumed += n as u64;

        tail.extend(&chunk[..n]);
        let excess = tail.len().saturating_sub(keep);
        tail.drain(..excess);
    }

    debug!("Log tail: consumed {} bytes, kept {}", consumed, tail.len());
    Ok(LogBlob(tail.into()))
}
