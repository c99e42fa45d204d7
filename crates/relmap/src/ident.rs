//! Validated SQL identifiers for table, column and alias names.
//!
//! Names come from record metadata, so a malformed one is a configuration
//! error reported when the entity metadata is built, never at execution.
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts (`"CamelCase"`) allow anything except NUL; `""` escapes `"`
//! - Dotted names (`public.users`) are allowed for tables only

use crate::error::{OrmError, OrmResult};

/// One `.`-separated part of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Written bare in metadata; the dialect decides whether it needs quoting.
    Unquoted(String),
    /// Written in double quotes in metadata; always rendered quoted.
    Quoted(String),
}

impl IdentPart {
    pub fn name(&self) -> &str {
        match self {
            IdentPart::Unquoted(s) | IdentPart::Quoted(s) => s,
        }
    }
}

/// A parsed SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

fn invalid(name: &str, reason: impl std::fmt::Display) -> OrmError {
    OrmError::config(format!("invalid identifier {name:?}: {reason}"))
}

impl Ident {
    /// Parse a possibly dotted, possibly quoted identifier.
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(invalid(s, "empty"));
        }
        if s.contains('\0') {
            return Err(invalid(s, "contains NUL"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') if chars.peek().is_some() => {}
                    Some('.') => return Err(invalid(s, "trailing '.'")),
                    Some(c) => return Err(invalid(s, format!("expected '.', got '{c}'"))),
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => return Err(invalid(s, "unclosed quote")),
                    }
                }
                if name.is_empty() {
                    return Err(invalid(s, "empty quoted part"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(invalid(s, format!("unexpected character '{c}'")));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(invalid(s, "empty part"));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        Ok(Self { parts })
    }

    /// Parse a single-part identifier (column or alias).
    pub fn simple(s: &str) -> OrmResult<Self> {
        let ident = Self::parse(s)?;
        if ident.parts.len() != 1 {
            return Err(invalid(s, "dotted names are not allowed here"));
        }
        Ok(ident)
    }

    pub fn parts(&self) -> &[IdentPart] {
        &self.parts
    }

    /// The last part's bare name (`users` for `public.users`).
    pub fn last_name(&self) -> &str {
        self.parts.last().map(IdentPart::name).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_and_quoted_parts() {
        let ident = Ident::parse(r#"public."UserTable""#).unwrap();
        assert_eq!(
            ident.parts(),
            [
                IdentPart::Unquoted("public".into()),
                IdentPart::Quoted("UserTable".into())
            ]
        );
        assert_eq!(ident.last_name(), "UserTable");
    }

    #[test]
    fn quoted_part_unescapes_double_quotes() {
        let ident = Ident::parse(r#""has""quote""#).unwrap();
        assert_eq!(ident.parts(), [IdentPart::Quoted("has\"quote".into())]);
    }

    #[test]
    fn dollar_is_allowed_after_the_first_char() {
        assert!(Ident::parse("my_var$1").is_ok());
        assert!(Ident::parse("$var").is_err());
    }

    #[test]
    fn rejects_malformed_names_as_config_errors() {
        for bad in ["", "1table", "my table", "schema..table", "schema.", "\"unclosed"] {
            let err = Ident::parse(bad).unwrap_err();
            assert!(matches!(err, OrmError::Config(_)), "{bad:?}");
        }
    }

    #[test]
    fn simple_rejects_dotted_names() {
        assert!(Ident::simple("firstName").is_ok());
        assert!(Ident::simple("a.b").is_err());
    }
}
