use crate::{Error, Result};

/// JID suffix for individual WhatsApp accounts.
pub const JID_SUFFIX: &str = "@c.us";

const MIN_DIGITS: usize = 8;

/// Normalize a human-entered phone number into a WhatsApp JID: strip
/// everything but digits and append the account suffix. Accepts numbers
/// already in JID form.
pub fn normalize_jid(recipient: &str) -> Result<String> {
    let local = recipient
        .split_once('@')
        .map_or(recipient, |(local, _)| local);
    let digits: String = local.chars().filter(char::is_ascii_digit).collect();

    if digits.len() < MIN_DIGITS {
        return Err(Error::invalid_recipient(format!(
            "{recipient:?} has fewer than {MIN_DIGITS} digits"
        )));
    }

    Ok(format!("{digits}{JID_SUFFIX}"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(
            normalize_jid("+49 (171) 555-0123").unwrap(),
            "491715550123@c.us"
        );
    }

    #[test]
    fn accepts_existing_jid() {
        assert_eq!(normalize_jid("491715550123@c.us").unwrap(), "491715550123@c.us");
    }

    #[test]
    fn rejects_short_numbers() {
        assert!(normalize_jid("555-0123").is_err());
        assert!(normalize_jid("").is_err());
    }
}
