//! Contact records and contact-line parsing

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag prepended to every stored display name.
pub const NAME_TAG: &str = "RT";

/// A line is a name followed by a single numeric token, optionally
/// `+`-prefixed. The name capture is greedy up to the last whitespace.
static CONTACT_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)\s(\+?\d+)$").expect("valid contact line regex"));

/// A single collected contact
///
/// The display name is upper-cased and tagged at construction; the number is
/// kept exactly as it was typed, including a leading `+` if present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Tagged, upper-cased display name (e.g. "RT ALICE")
    pub display_name: String,
    /// Phone number verbatim as matched
    pub number: String,
}

impl ContactRecord {
    /// Create a record from a raw name and number, enforcing the
    /// tagged-uppercase invariant on the name.
    pub fn new(name: impl AsRef<str>, number: impl Into<String>) -> Self {
        Self {
            display_name: format!("{} {}", NAME_TAG, name.as_ref().to_uppercase()),
            number: number.into(),
        }
    }
}

/// Why a line failed contact classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("line does not match `Name +Number`")]
    NoMatch,
}

/// Classify a free-text line as a contact entry.
///
/// Returns the parsed record, or the reason the line does not have the
/// `Name +Number` shape. Never panics; a failed parse is an expected
/// outcome, not an error condition.
pub fn parse_contact_line(line: &str) -> Result<ContactRecord, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let caps = CONTACT_LINE_RE.captures(trimmed).ok_or(ParseError::NoMatch)?;
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let number = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    Ok(ContactRecord::new(name, number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plus_prefixed_number() {
        let record = parse_contact_line("Alice +15551234").unwrap();
        assert_eq!(record.display_name, "RT ALICE");
        assert_eq!(record.number, "+15551234");
    }

    #[test]
    fn test_parse_bare_number() {
        let record = parse_contact_line("bob 15559999").unwrap();
        assert_eq!(record.display_name, "RT BOB");
        assert_eq!(record.number, "15559999");
    }

    #[test]
    fn test_parse_multi_token_name() {
        let record = parse_contact_line("John van der Berg +4917612345").unwrap();
        assert_eq!(record.display_name, "RT JOHN VAN DER BERG");
        assert_eq!(record.number, "+4917612345");
    }

    #[test]
    fn test_parse_trims_surrounding_whitespace() {
        let record = parse_contact_line("  Carol 5550001  ").unwrap();
        assert_eq!(record.display_name, "RT CAROL");
        assert_eq!(record.number, "5550001");
    }

    #[test]
    fn test_parse_name_keeps_inner_digits_out_of_number() {
        // Greedy name capture: only the last token can be the number.
        let record = parse_contact_line("Agent 47 5550047").unwrap();
        assert_eq!(record.display_name, "RT AGENT 47");
        assert_eq!(record.number, "5550047");
    }

    #[test]
    fn test_parse_rejects_missing_number() {
        assert_eq!(parse_contact_line("just a name"), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_parse_rejects_number_only() {
        // No whitespace-separated name before the numeric token.
        assert_eq!(parse_contact_line("+15551234"), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_parse_rejects_trailing_non_digits() {
        assert_eq!(parse_contact_line("Alice +1555x234"), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_parse_rejects_empty_line() {
        assert_eq!(parse_contact_line("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_record_constructor_enforces_tag() {
        let record = ContactRecord::new("dave", "123");
        assert_eq!(record.display_name, "RT DAVE");
    }
}
