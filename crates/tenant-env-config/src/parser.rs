//! Minimal `KEY=VALUE` env-file grammar.
//!
//! One pair per line, split on the first `=`. A `#` at the start of a line or
//! after whitespace starts a comment that runs to the end of the line; a `#`
//! glued to preceding text (`URL=/a#frag`) belongs to the value. Blank lines
//! are skipped. Keys and values are trimmed; there is no quoting, escaping,
//! interpolation, or multi-line value support. A later duplicate key replaces
//! an earlier one.

use crate::ConfigValues;
use crate::ParseError;

const BOM: char = '\u{feff}';

/// Parse env-file contents. `origin` names the source in errors.
pub fn parse_env(origin: &str, contents: &str) -> Result<ConfigValues, ParseError> {
    let contents = contents.strip_prefix(BOM).unwrap_or(contents);
    let mut values = ConfigValues::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let number = index + 1;
        let Some((key, value)) = line.split_once('=') else {
            return Err(ParseError::MissingSeparator {
                origin: origin.to_string(),
                line: number,
                content: line.to_string(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::EmptyKey {
                origin: origin.to_string(),
                line: number,
            });
        }
        if key.chars().any(char::is_whitespace) {
            return Err(ParseError::InvalidKey {
                origin: origin.to_string(),
                line: number,
                key: key.to_string(),
            });
        }
        values.insert(key.to_string(), strip_comment(value).trim().to_string());
    }
    Ok(values)
}

/// Cut `value` at the first `#` that follows whitespace.
fn strip_comment(value: &str) -> &str {
    let mut after_space = false;
    for (index, ch) in value.char_indices() {
        if ch == '#' && after_space {
            return &value[..index];
        }
        after_space = ch.is_whitespace();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::parse_env;
    use crate::{ConfigValues, ParseError};
    use pretty_assertions::assert_eq;

    fn values(pairs: &[(&str, &str)]) -> ConfigValues {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn parses_pairs_and_trims_whitespace() {
        let parsed = parse_env("env", "APP_NAME = Alpha \n  FEATURE_X=on\n").expect("parse");
        assert_eq!(parsed, values(&[("APP_NAME", "Alpha"), ("FEATURE_X", "on")]));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let parsed = parse_env("env", "# comment\n\n   \n  # indented\nAPP_NAME=Gamma\n")
            .expect("parse");
        assert_eq!(parsed, values(&[("APP_NAME", "Gamma")]));
    }

    #[test]
    fn keeps_hash_and_equals_inside_values() {
        let parsed = parse_env("env", "URL=https://a.test/?x=1#frag\nCOLOR=#fff\nEMPTY=\n")
            .expect("parse");
        assert_eq!(
            parsed,
            values(&[
                ("COLOR", "#fff"),
                ("EMPTY", ""),
                ("URL", "https://a.test/?x=1#frag")
            ])
        );
    }

    #[test]
    fn strips_trailing_comments() {
        let parsed = parse_env(
            "env",
            "APP_NAME=Alpha # tenant name\nREGION=eu\t#primary\nBLANK= # unset\n",
        )
        .expect("parse");
        assert_eq!(
            parsed,
            values(&[("APP_NAME", "Alpha"), ("BLANK", ""), ("REGION", "eu")])
        );
    }

    #[test]
    fn later_duplicate_wins() {
        let parsed = parse_env("env", "A=1\nA=2\n").expect("parse");
        assert_eq!(parsed, values(&[("A", "2")]));
    }

    #[test]
    fn handles_crlf_and_bom() {
        let parsed = parse_env("env", "\u{feff}A=1\r\nB=2\r\n").expect("parse");
        assert_eq!(parsed, values(&[("A", "1"), ("B", "2")]));
    }

    #[test]
    fn missing_separator_names_the_line() {
        let err = parse_env("env.alpha", "A=1\n# note\nNOVALUE\n").expect_err("malformed");
        assert_eq!(
            err,
            ParseError::MissingSeparator {
                origin: "env.alpha".to_string(),
                line: 3,
                content: "NOVALUE".to_string(),
            }
        );
        assert_eq!(err.line(), 3);
        assert!(err.to_string().contains("env.alpha:3"));
    }

    #[test]
    fn rejects_empty_and_spaced_keys() {
        let err = parse_env("env", "=value").expect_err("empty key");
        assert_eq!(
            err,
            ParseError::EmptyKey {
                origin: "env".to_string(),
                line: 1
            }
        );

        let err = parse_env("env", "OK=1\nMY KEY=1").expect_err("spaced key");
        assert_eq!(err.line(), 2);
        assert!(matches!(err, ParseError::InvalidKey { .. }));
    }
}
