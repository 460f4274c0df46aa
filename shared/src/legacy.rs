//! Generation 1 text protocol helpers.
//!
//! Generation 1 carries XOR-enciphered ASCII. Replies are either a single
//! direct value, a sentinel, an indexed list (`<count>\t<item>\t<item>...`) or
//! an unindexed newline-delimited list such as log text, which carries no
//! length at all.

use crate::error::FrameError;

pub const SUCCESS: &str = "SUCCESS";
pub const FAIL: &str = "FAIL";
pub const EMPTY: &str = "EMPTY";

/// Length of the XOR key the server sends right after accepting a socket.
pub const KEY_LEN: usize = 4;

/// How the end of a generation 1 reply is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseFormat {
    /// One read is the whole reply.
    Direct,
    /// Tab-delimited entries with a leading declared count.
    IndexedList,
    /// Newline-delimited text with no declared length.
    UnindexedList,
}

/// Builds the login line for `password`.
pub fn login_line(password: &str) -> String {
    format!("login {}", password)
}

/// Reports whether an indexed list reply has fully arrived.
///
/// The reply is complete once the number of tab-delimited entries after the
/// declared count reaches that count. A declared count of zero is complete
/// immediately. A payload whose first field is not a number yet (or is still
/// being received) is incomplete unless it is a sentinel.
pub fn indexed_list_complete(payload: &str) -> bool {
    if is_sentinel(payload) {
        return true;
    }

    let mut fields = payload.split('\t');
    let declared = match fields.next().map(str::trim) {
        Some(count) => match count.parse::<usize>() {
            Ok(n) => n,
            Err(_) => return false,
        },
        None => return false,
    };

    if declared == 0 {
        return true;
    }

    // Entries count once their closing tab has arrived; the last field is
    // either empty or still being received.
    let mut entries: Vec<&str> = fields.collect();
    entries.pop();
    entries.iter().filter(|f| !f.is_empty()).count() >= declared
}

/// Splits a complete indexed list reply into its entries.
pub fn parse_indexed_list(payload: &str) -> Result<Vec<String>, FrameError> {
    if payload == EMPTY {
        return Ok(Vec::new());
    }

    let mut fields = payload.split('\t');
    let head = fields.next().unwrap_or_default().trim();
    let declared: usize = head
        .parse()
        .map_err(|_| FrameError::BadCount(head.to_string()))?;

    Ok(fields
        .filter(|f| !f.is_empty())
        .take(declared)
        .map(str::to_string)
        .collect())
}

/// Maps a sentinel reply to `Ok(())`, `FAIL` to `Err(payload)`.
pub fn ack(payload: &str) -> Result<(), String> {
    match payload.trim() {
        SUCCESS => Ok(()),
        other => Err(other.to_string()),
    }
}

pub fn is_sentinel(payload: &str) -> bool {
    matches!(payload.trim(), SUCCESS | FAIL | EMPTY)
}

/// Splits unindexed text into its lines, dropping the `EMPTY` sentinel and
/// blank lines.
pub fn split_unindexed(payload: &str) -> Vec<&str> {
    if payload.trim() == EMPTY {
        return Vec::new();
    }
    payload
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Reverses the escaping of embedded newlines inside a single log entry.
pub fn unescape_entry(entry: &str) -> String {
    entry.replace("\\n", "\n")
}

/// Escapes embedded newlines so an entry fits on one line.
pub fn escape_entry(entry: &str) -> String {
    entry.replace('\n', "\\n")
}
