//! Keyword-argument strings such as `input=py, caption={A, B}`.

use crate::error::ParseError;

/// Ordered `key=value` pairs from an optional argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Kwargs {
    pairs: Vec<(String, String)>,
}

impl Kwargs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Tokenize a keyword-argument string.
///
/// Commas and equals signs only split at brace and bracket depth zero. A
/// value wrapped entirely in one brace group loses that outer group.
pub fn parse_kwargs(input: &str) -> Result<Kwargs, ParseError> {
    let mut pairs = Vec::new();

    for piece in split_top_level(input, ',')? {
        if piece.trim().is_empty() {
            continue;
        }
        let parts = split_top_level(piece, '=')?;
        let key = parts[0];
        let value = if parts.len() > 1 {
            piece[key.len() + 1..].trim()
        } else {
            ""
        };
        pairs.push((key.trim().to_string(), unwrap_group(value).to_string()));
    }

    Ok(Kwargs { pairs })
}

/// Split at `sep` occurring outside braces and brackets.
pub fn split_top_level(input: &str, sep: char) -> Result<Vec<&str>, ParseError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ParseError::UnbalancedBraces(input.to_string()));
                }
            }
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedBraces(input.to_string()));
    }
    parts.push(&input[start..]);
    Ok(parts)
}

/// Strip one outer brace group if it spans the whole value.
fn unwrap_group(value: &str) -> &str {
    if !value.starts_with('{') || !value.ends_with('}') {
        return value;
    }
    let mut depth = 0;
    for (i, c) in value.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return if i == value.len() - 1 {
                        &value[1..i]
                    } else {
                        value
                    };
                }
            }
            _ => {}
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_pairs() {
        let kw = parse_kwargs("input=py, output=both,format=png").unwrap();
        assert_eq!(kw.get("input"), Some("py"));
        assert_eq!(kw.get("output"), Some("both"));
        assert_eq!(kw.get("format"), Some("png"));
        assert_eq!(kw.get("caption"), None);
    }

    #[test]
    fn test_braced_value_keeps_inner_commas() {
        let kw = parse_kwargs("caption={Reading data, the {\\em fast} way}, input=r").unwrap();
        assert_eq!(kw.get("caption"), Some("Reading data, the {\\em fast} way"));
        assert_eq!(kw.get("input"), Some("r"));
    }

    #[test]
    fn test_value_with_equals_and_brackets() {
        let kw = parse_kwargs("title={a=b}, opts=[x,y]").unwrap();
        assert_eq!(kw.get("title"), Some("a=b"));
        assert_eq!(kw.get("opts"), Some("[x,y]"));
    }

    #[test]
    fn test_bare_key_and_empty_input() {
        let kw = parse_kwargs("draft").unwrap();
        assert_eq!(kw.get("draft"), Some(""));
        assert!(parse_kwargs("  ").unwrap().is_empty());
    }

    #[test]
    fn test_partial_group_is_not_unwrapped() {
        let kw = parse_kwargs("caption={a} and {b}").unwrap();
        assert_eq!(kw.get("caption"), Some("{a} and {b}"));
    }

    #[test]
    fn test_unbalanced_is_error() {
        assert!(parse_kwargs("caption={oops").is_err());
        assert!(parse_kwargs("caption=oops}").is_err());
    }
}
