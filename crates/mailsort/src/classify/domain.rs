//! Registrable domain lookup via the public suffix list

/// First label of the registrable domain of `fqdn`
///
/// `mail.example.co.uk` → `example`. Hosts the suffix list cannot split
/// (bare suffixes, single labels, IP literals) fall back to the whole FQDN.
pub fn registrable_label(fqdn: &str) -> &str {
    let Some(registrable) = psl::domain_str(fqdn) else {
        return fqdn;
    };
    let suffix_len = psl::suffix_str(registrable).map_or(0, str::len);
    registrable
        .len()
        .checked_sub(suffix_len + 1)
        .and_then(|end| registrable.get(..end))
        .filter(|label| !label.is_empty())
        .unwrap_or(fqdn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_label_suffix() {
        assert_eq!(registrable_label("mail.example.co.uk"), "example");
    }

    #[test]
    fn test_plain_suffix() {
        assert_eq!(registrable_label("news.shop.example.com"), "example");
        assert_eq!(registrable_label("github.com"), "github");
    }

    #[test]
    fn test_unsplittable_host_falls_back() {
        assert_eq!(registrable_label("localhost"), "localhost");
        assert_eq!(registrable_label("co.uk"), "co.uk");
    }
}
