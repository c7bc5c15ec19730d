//! Header normalization for thread matching.
//!
//! Subjects and addresses arrive in every shape mail clients produce;
//! matching works on canonical forms. All functions here are pure and
//! total — malformed input degrades to a best-effort result, never an
//! error.

const REPLY_PREFIXES: &[&str] = &["re:", "fwd:", "fw:"];
const FORWARD_PREFIXES: &[&str] = &["fwd:", "fw:"];

/// Canonicalize a subject for fuzzy matching.
///
/// Strips a single leading `re:`/`fwd:`/`fw:` token case-insensitively,
/// collapses whitespace runs, trims, and lower-cases. One application
/// removes at most one prefix token: `"Re: Re: Hi"` normalizes to
/// `"re: hi"`, not `"hi"`.
#[must_use]
pub fn normalize_subject(subject: &str) -> String {
    let stripped = strip_one_prefix(subject, REPLY_PREFIXES);
    let collapsed: Vec<&str> = stripped.split_whitespace().collect();
    collapsed.join(" ").to_lowercase()
}

/// Strip a single leading `fwd:`/`fw:` token from a forwarded subject.
///
/// Used to recover the original email's subject from a forwarded copy;
/// `re:` prefixes are left alone.
#[must_use]
pub fn strip_forward_prefix(subject: &str) -> &str {
    strip_one_prefix(subject, FORWARD_PREFIXES).trim_start()
}

/// Extract the bare address from a `From`-style header value.
///
/// `"Jane Doe <jane@x.com>"` yields `"jane@x.com"`; anything without an
/// angle-bracketed address is trimmed and lower-cased as-is.
#[must_use]
pub fn extract_email_address(raw: &str) -> String {
    if let Some(open) = raw.rfind('<')
        && let Some(close) = raw[open..].find('>')
    {
        return raw[open + 1..open + close].trim().to_lowercase();
    }
    raw.trim().to_lowercase()
}

/// Extract the display-name part of a `From`-style header value, if any.
///
/// `"Jane Doe <jane@x.com>"` yields `Some("Jane Doe")`; quotes around the
/// name are dropped. Bare addresses yield `None`.
#[must_use]
pub fn sender_display_name(raw: &str) -> Option<&str> {
    let open = raw.rfind('<')?;
    let name = raw[..open].trim().trim_matches('"').trim();
    if name.is_empty() { None } else { Some(name) }
}

fn strip_one_prefix<'a>(subject: &'a str, prefixes: &[&str]) -> &'a str {
    let trimmed = subject.trim_start();
    for prefix in prefixes {
        if let Some(head) = trimmed.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            return &trimmed[prefix.len()..];
        }
    }
    trimmed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_reply_prefix() {
        assert_eq!(normalize_subject("Re: Hello World"), "hello world");
        assert_eq!(normalize_subject("RE: Hello"), "hello");
        assert_eq!(normalize_subject("Fwd: Hello"), "hello");
        assert_eq!(normalize_subject("FW: Hello"), "hello");
    }

    #[test]
    fn test_normalize_strips_only_one_prefix() {
        assert_eq!(normalize_subject("Re: Re: Hi"), "re: hi");
        assert_eq!(normalize_subject("Fwd: Re: Hi"), "re: hi");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_subject("  Billing \t question \n here "), "billing question here");
        assert_eq!(normalize_subject("Re:   spaced   out"), "spaced out");
    }

    #[test]
    fn test_normalize_leaves_prefix_lookalikes() {
        // "reply:" starts with "re" but is not the "re:" token.
        assert_eq!(normalize_subject("Reply: soon"), "reply: soon");
        assert_eq!(normalize_subject("forward this"), "forward this");
    }

    #[test]
    fn test_normalize_empty_and_prefix_only() {
        assert_eq!(normalize_subject(""), "");
        assert_eq!(normalize_subject("Re:"), "");
        assert_eq!(normalize_subject("   "), "");
    }

    #[test]
    fn test_normalize_multibyte_subject() {
        assert_eq!(normalize_subject("Ré: Ça va"), "ré: ça va");
        assert_eq!(normalize_subject("日本語の件名"), "日本語の件名");
    }

    #[test]
    fn test_strip_forward_prefix() {
        assert_eq!(strip_forward_prefix("Fwd: Billing question"), "Billing question");
        assert_eq!(strip_forward_prefix("FW: Billing"), "Billing");
        assert_eq!(strip_forward_prefix("Re: not forwarded"), "Re: not forwarded");
        assert_eq!(strip_forward_prefix("Fwd: Fwd: twice"), "Fwd: twice");
    }

    #[test]
    fn test_extract_bracketed_address() {
        assert_eq!(extract_email_address("Jane Doe <jane@x.com>"), "jane@x.com");
        assert_eq!(extract_email_address("<jane@x.com>"), "jane@x.com");
        assert_eq!(extract_email_address("Jane <Jane@X.COM>"), "jane@x.com");
    }

    #[test]
    fn test_extract_bare_address() {
        assert_eq!(extract_email_address("JANE@X.com"), "jane@x.com");
        assert_eq!(extract_email_address("  jane@x.com  "), "jane@x.com");
    }

    #[test]
    fn test_extract_unclosed_bracket_degrades() {
        assert_eq!(extract_email_address("Jane <jane@x.com"), "jane <jane@x.com");
    }

    #[test]
    fn test_sender_display_name() {
        assert_eq!(sender_display_name("Jane Doe <jane@x.com>"), Some("Jane Doe"));
        assert_eq!(sender_display_name("\"Doe, Jane\" <jane@x.com>"), Some("Doe, Jane"));
        assert_eq!(sender_display_name("<jane@x.com>"), None);
        assert_eq!(sender_display_name("jane@x.com"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalized_subject_is_trimmed_and_lowercase(s in "\\PC*") {
                let normalized = normalize_subject(&s);
                prop_assert_eq!(normalized.clone(), normalized.trim().to_string());
                prop_assert_eq!(normalized.clone(), normalized.to_lowercase());
                prop_assert!(!normalized.contains("  "));
            }

            #[test]
            fn extracted_address_is_trimmed_and_lowercase(s in "\\PC*") {
                let addr = extract_email_address(&s);
                prop_assert_eq!(addr.clone(), addr.trim().to_string());
                prop_assert_eq!(addr.clone(), addr.to_lowercase());
            }

            #[test]
            fn bracketed_address_always_recovered(
                name in "[A-Za-z ]{0,20}",
                local in "[a-z0-9.]{1,10}",
                host in "[a-z0-9.]{1,10}",
            ) {
                let raw = format!("{name} <{local}@{host}>");
                prop_assert_eq!(extract_email_address(&raw), format!("{local}@{host}"));
            }
        }
    }
}
