//! Utility functions for the Weft templating runtime

/// Convert a camelCased property name to its hyphenated attribute form:
/// `firstName` -> `first-name`. Already-hyphenated input passes through.
pub fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a hyphenated attribute name to its camelCased property form:
/// `first-name` -> `firstName`.
pub fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Valid resource/property identifier: letters, digits, '-', '_', starting
/// with a letter or '_'.
pub fn is_valid_resource_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyphenate() {
        assert_eq!(hyphenate("firstName"), "first-name");
        assert_eq!(hyphenate("URL"), "u-r-l");
        assert_eq!(hyphenate("already-done"), "already-done");
        assert_eq!(hyphenate("value"), "value");
    }

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("first-name"), "firstName");
        assert_eq!(camelize("value"), "value");
        assert_eq!(camelize("a-b-c"), "aBC");
    }

    #[test]
    fn test_round_trip() {
        assert_eq!(hyphenate(&camelize("my-button")), "my-button");
    }

    #[test]
    fn test_is_valid_resource_name() {
        assert!(is_valid_resource_name("my-element"));
        assert!(is_valid_resource_name("_x"));
        assert!(!is_valid_resource_name("9lives"));
        assert!(!is_valid_resource_name(""));
        assert!(!is_valid_resource_name("a b"));
    }
}
