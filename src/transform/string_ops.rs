//! String helpers available to column transform expressions.

use std::borrow::Cow;

use heck::{ToLowerCamelCase, ToSnakeCase, ToTitleCase, ToUpperCamelCase};
use regex::Regex;

/// Single-argument string operations, registered as expression functions under
/// their [`name`](UnaryStringOp::name).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryStringOp {
    Lowercase,
    Uppercase,
    Trim,
    SnakeCase,
    CamelCase,
    PascalCase,
    TitleCase,
}

impl UnaryStringOp {
    pub const ALL: [UnaryStringOp; 7] = [
        UnaryStringOp::Lowercase,
        UnaryStringOp::Uppercase,
        UnaryStringOp::Trim,
        UnaryStringOp::SnakeCase,
        UnaryStringOp::CamelCase,
        UnaryStringOp::PascalCase,
        UnaryStringOp::TitleCase,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UnaryStringOp::Lowercase => "lowercase",
            UnaryStringOp::Uppercase => "uppercase",
            UnaryStringOp::Trim => "trim",
            UnaryStringOp::SnakeCase => "snake_case",
            UnaryStringOp::CamelCase => "camel_case",
            UnaryStringOp::PascalCase => "pascal_case",
            UnaryStringOp::TitleCase => "title_case",
        }
    }

    pub fn apply(self, input: &str) -> Cow<'_, str> {
        match self {
            UnaryStringOp::Lowercase => {
                if input.chars().all(|ch| !ch.is_uppercase()) {
                    Cow::Borrowed(input)
                } else {
                    Cow::Owned(input.to_lowercase())
                }
            }
            UnaryStringOp::Uppercase => {
                if input.chars().all(|ch| !ch.is_lowercase()) {
                    Cow::Borrowed(input)
                } else {
                    Cow::Owned(input.to_uppercase())
                }
            }
            UnaryStringOp::Trim => Cow::Borrowed(input.trim()),
            UnaryStringOp::SnakeCase => owned_if_changed(input, input.to_snake_case()),
            UnaryStringOp::CamelCase => owned_if_changed(input, input.to_lower_camel_case()),
            UnaryStringOp::PascalCase => owned_if_changed(input, input.to_upper_camel_case()),
            UnaryStringOp::TitleCase => owned_if_changed(input, input.to_title_case()),
        }
    }
}

fn owned_if_changed(input: &str, converted: String) -> Cow<'_, str> {
    if converted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(converted)
    }
}

/// Returns `length` characters starting at character `start`.
pub fn substring(value: &str, start: usize, length: usize) -> &str {
    let mut indices = value.char_indices().map(|(idx, _)| idx).chain([value.len()]);
    let Some(start_byte) = indices.nth(start) else {
        return "";
    };
    if length == 0 {
        return "";
    }
    let end_byte = indices.nth(length - 1).unwrap_or(value.len());
    &value[start_byte..end_byte]
}

pub fn regex_replace<'a>(value: &'a str, regex: &Regex, replacement: &str) -> Cow<'a, str> {
    regex.replace_all(value, replacement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_ops_borrow_when_unchanged() {
        assert!(matches!(UnaryStringOp::Lowercase.apply("abc"), Cow::Borrowed(_)));
        assert_eq!(UnaryStringOp::Uppercase.apply("abc"), "ABC");
        assert_eq!(UnaryStringOp::SnakeCase.apply("Foo Bar"), "foo_bar");
        assert_eq!(UnaryStringOp::PascalCase.apply("foo_bar"), "FooBar");
        assert_eq!(UnaryStringOp::TitleCase.apply("foo_bar"), "Foo Bar");
        assert_eq!(UnaryStringOp::Trim.apply("  x "), "x");
    }

    #[test]
    fn substring_counts_characters() {
        assert_eq!(substring("résumé", 1, 3), "ésu");
        assert_eq!(substring("abc", 1, 10), "bc");
        assert_eq!(substring("abc", 3, 1), "");
        assert_eq!(substring("abc", 7, 1), "");
        assert_eq!(substring("abc", 0, 0), "");
    }

    #[test]
    fn regex_replace_rewrites_all_matches() {
        let digits = Regex::new(r"\d").unwrap();
        assert_eq!(regex_replace("a1b2", &digits, "#"), "a#b#");
        assert!(matches!(regex_replace("ab", &digits, "#"), Cow::Borrowed(_)));
    }
}
