//! Forwarding-header chain extraction.
//!
//! # Responsibilities
//! - Split a raw forwarding header value into address-like tokens
//! - Preserve header order (oldest hop first)
//!
//! # Design Decisions
//! - A token is a maximal run of `[0-9A-Fa-f.:]`, everything else separates
//! - No well-formedness check here: malformed tokens fail later in
//!   numeric resolution
//! - Tokens borrow from the header value, nothing is copied

/// Ordered address tokens taken from one forwarding header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressChain<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> AddressChain<'a> {
    /// Tokens in header order.
    pub fn tokens(&self) -> &[&'a str] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate from the most recently appended hop back to the first.
    pub fn iter_rev(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.tokens.iter().rev().copied()
    }
}

fn is_address_char(c: char) -> bool {
    c.is_ascii_hexdigit() || c == '.' || c == ':'
}

/// Tokenize a forwarding header value.
pub fn extract(raw: &str) -> AddressChain<'_> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, c) in raw.char_indices() {
        match (start, is_address_char(c)) {
            (None, true) => start = Some(idx),
            (Some(base), false) => {
                tokens.push(&raw[base..idx]);
                start = None;
            }
            _ => {}
        }
    }

    // ran off the end while inside a token
    if let Some(base) = start {
        tokens.push(&raw[base..]);
    }

    AddressChain { tokens }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_leading_and_trailing_separators() {
        let chain = extract("  , 192.168.1.1,10.0.0.1 ;");
        assert_eq!(chain.tokens(), &["192.168.1.1", "10.0.0.1"]);
    }

    #[test]
    fn empty_input_yields_empty_chain() {
        assert!(extract("").is_empty());
        assert!(extract(" ,;, ").is_empty());
    }

    #[test]
    fn token_at_end_of_input_is_emitted() {
        let chain = extract("203.0.113.5, 10.0.0.232");
        assert_eq!(chain.tokens(), &["203.0.113.5", "10.0.0.232"]);
    }

    #[test]
    fn ipv6_literals_survive() {
        let chain = extract("2001:db8::1, [::ffff:10.0.0.1]");
        assert_eq!(chain.tokens(), &["2001:db8::1", "::ffff:10.0.0.1"]);
    }

    #[test]
    fn non_address_letters_split_tokens() {
        // 'g'..'z' and non-ascii are separators, hex letters are not
        let chain = extract("for=10.0.0.1;proto=http, café12");
        assert_eq!(chain.tokens(), &["f", "10.0.0.1", "caf", "12"]);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let chain = extract("10.0.0.1 10.0.0.1");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.iter_rev().collect::<Vec<_>>(), vec!["10.0.0.1", "10.0.0.1"]);
    }
}
