//! Parsing of the address and name lists entered by the operator.
//!
//! Addresses and names arrive as two parallel, newline-separated lists. Each
//! address is paired with the name on the same line; a missing or blank name
//! falls back to the address itself. Blank address lines are skipped, and an
//! address that fails the basic format check is rejected on its own without
//! affecting the other lines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitor::Target;

/// Longest accepted address (maximum DNS name length).
pub const MAX_ADDRESS_LEN: usize = 253;

/// Reasons an address line is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address is longer than {MAX_ADDRESS_LEN} characters")]
    TooLong,

    #[error("address must not start with '-'")]
    LeadingDash,

    #[error("address contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Basic format check for a host name or IP address.
///
/// Accepts IPv4/IPv6 literals and host names; this does not resolve or
/// otherwise verify the address.
pub fn validate_address(address: &str) -> Result<(), AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    if address.len() > MAX_ADDRESS_LEN {
        return Err(AddressError::TooLong);
    }
    if address.starts_with('-') {
        return Err(AddressError::LeadingDash);
    }
    match address
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '_' | '%')))
    {
        Some(c) => Err(AddressError::InvalidChar(c)),
        None => Ok(()),
    }
}

/// An input line that could not become a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLine {
    /// 1-based line number in the address list.
    pub line: usize,
    /// The trimmed line content.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Targets built from operator input, plus the lines that were rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInput {
    pub targets: Vec<Target>,
    pub rejected: Vec<RejectedLine>,
}

/// Pair each address with the name at the same position.
pub fn pair_targets<A, N>(addresses: &[A], names: &[N]) -> ParsedInput
where
    A: AsRef<str>,
    N: AsRef<str>,
{
    let mut parsed = ParsedInput::default();

    for (idx, raw) in addresses.iter().enumerate() {
        let address = raw.as_ref().trim();
        if address.is_empty() {
            continue;
        }

        if let Err(e) = validate_address(address) {
            tracing::warn!(line = idx + 1, address = %address, error = %e, "Rejected address");
            parsed.rejected.push(RejectedLine {
                line: idx + 1,
                value: address.to_string(),
                reason: e.to_string(),
            });
            continue;
        }

        let name = names.get(idx).map(|n| n.as_ref().trim()).unwrap_or("");
        parsed.targets.push(Target::new(address, name));
    }

    parsed
}

/// Parse the two newline-separated text lists.
pub fn parse_text_lists(addresses: &str, names: &str) -> ParsedInput {
    let addresses: Vec<&str> = addresses.lines().collect();
    let names: Vec<&str> = names.lines().collect();
    pair_targets(&addresses, &names)
}
