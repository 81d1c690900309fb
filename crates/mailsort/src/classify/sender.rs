//! Sender address extraction from From headers

use std::sync::LazyLock;

use regex::Regex;

/// `<user@host>` in angle brackets
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>]*@[^<>]*)>").expect("valid regex"));

/// Bare address-shaped token
static BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^<>\s,;"]+@[^<>\s,;"]+"#).expect("valid regex"));

/// Extract the sender address from a From header value, lower-cased
///
/// The last angle-bracketed address wins; without one, the last bare
/// address-shaped token is used.
pub fn sender_address(from: &str) -> Option<String> {
    let from = from.to_lowercase();

    let address = BRACKETED
        .captures_iter(&from)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .or_else(|| BARE.find_iter(&from).last().map(|m| m.as_str()))?;

    let address = address.trim();
    (!address.is_empty()).then(|| address.to_string())
}

/// Host part of an address: the text after the final `@`
pub fn fqdn(address: &str) -> Option<&str> {
    let (_, host) = address.rsplit_once('@')?;
    let host = host.trim().trim_end_matches('.');
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_address() {
        assert_eq!(
            sender_address("Shop Name <News@Mail.Example.co.uk>").as_deref(),
            Some("news@mail.example.co.uk")
        );
    }

    #[test]
    fn test_last_bracketed_address_wins() {
        assert_eq!(
            sender_address("\"a@b.com\" <first@one.com>, Other <second@two.com>").as_deref(),
            Some("second@two.com")
        );
    }

    #[test]
    fn test_bare_address() {
        assert_eq!(sender_address("alerts@bank.example").as_deref(), Some("alerts@bank.example"));
        assert_eq!(
            sender_address("\"Billing\" billing@shop.example, ").as_deref(),
            Some("billing@shop.example")
        );
    }

    #[test]
    fn test_no_address() {
        assert_eq!(sender_address("Mailer Daemon"), None);
        assert_eq!(sender_address(""), None);
    }

    #[test]
    fn test_fqdn_after_final_at() {
        assert_eq!(fqdn("weird@name@host.example.com"), Some("host.example.com"));
        assert_eq!(fqdn("user@"), None);
        assert_eq!(fqdn("nobody"), None);
    }
}
