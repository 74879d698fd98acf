// 🔤 Command Parser
// Turns one console line into verb + arguments
//
// Value grammar for `create` parameters:
//   key="value"   → string (\" unescaped to ", _ becomes a space)
//   key=-12       → integer   ^[+-]?\d+$
//   key=3.25      → float     ^[+-]?\d+\.\d+$
//   anything else → dropped

use crate::entities::AttrValue;
use once_cell::sync::Lazy;
use regex::Regex;

static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("valid int regex"));
static FLOAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+\.\d+$").expect("valid float regex"));
static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid key regex"));
static SHORTHAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_]+)\((.*)\)$").expect("valid shorthand regex")
});

// ============================================================================
// SCALARS
// ============================================================================

pub fn parse_int(raw: &str) -> Option<i64> {
    if INT_RE.is_match(raw) {
        raw.parse().ok()
    } else {
        None
    }
}

pub fn parse_float(raw: &str) -> Option<f64> {
    if FLOAT_RE.is_match(raw) {
        raw.parse().ok().filter(|x: &f64| x.is_finite())
    } else {
        None
    }
}

/// Parse one `key=value` parameter of a `create` command
///
/// Returns None for anything that should be silently dropped.
pub fn parse_create_param(token: &str) -> Option<(String, AttrValue)> {
    let (key, raw) = token.split_once('=')?;
    if !KEY_RE.is_match(key) {
        return None;
    }

    if let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        if has_bare_quote(inner) {
            return None;
        }
        let value = inner.replace("\\\"", "\"").replace('_', " ");
        return Some((key.to_string(), AttrValue::Str(value)));
    }

    parse_int(raw)
        .map(AttrValue::Int)
        .or_else(|| parse_float(raw).map(AttrValue::Float))
        .map(|value| (key.to_string(), value))
}

fn has_bare_quote(s: &str) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return true,
            _ => escaped = false,
        }
    }
    false
}

/// Typed value for `update`: quoted → string, otherwise number if it parses
pub fn parse_update_value(token: &Token) -> AttrValue {
    if token.quoted {
        return AttrValue::Str(token.text.clone());
    }
    parse_int(&token.text)
        .map(AttrValue::Int)
        .or_else(|| parse_float(&token.text).map(AttrValue::Float))
        .unwrap_or_else(|| AttrValue::Str(token.text.clone()))
}

// ============================================================================
// TOKENS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    /// Token was wrapped in double quotes
    pub quoted: bool,
}

/// Split off the first word of a line
pub fn split_verb(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    }
}

/// Read one whitespace-delimited token, honoring double quotes
///
/// Returns the token and the unread remainder.
pub fn next_token(input: &str) -> Option<(Token, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }

    if let Some(body) = input.strip_prefix('"') {
        let mut text = String::new();
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        text.push(next);
                    }
                }
                '"' => {
                    let rest = &body[i + 1..];
                    return Some((Token { text, quoted: true }, rest));
                }
                _ => text.push(c),
            }
        }
        // Unterminated: take everything
        return Some((Token { text, quoted: true }, ""));
    }

    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((
        Token {
            text: input[..end].to_string(),
            quoted: false,
        },
        &input[end..],
    ))
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while let Some((token, remaining)) = next_token(rest) {
        tokens.push(token);
        rest = remaining;
    }
    tokens
}

// ============================================================================
// SHORTHAND: ClassName.verb(args)
// ============================================================================

const SHORTHAND_VERBS: [&str; 5] = ["all", "count", "show", "destroy", "update"];

/// Rewrite `Class.verb(a, b, ...)` into `verb Class a b ...`
///
/// Returns None when the line isn't shorthand or the verb isn't supported.
pub fn rewrite_shorthand(line: &str) -> Option<String> {
    let caps = SHORTHAND_RE.captures(line.trim())?;
    let class = caps.get(1)?.as_str();
    let verb = caps.get(2)?.as_str();
    let args = caps.get(3)?.as_str();

    if !SHORTHAND_VERBS.contains(&verb) {
        return None;
    }

    let mut parts = vec![verb.to_string(), class.to_string()];
    parts.extend(split_call_args(args));
    Some(parts.join(" "))
}

/// Split call arguments on commas that sit outside quotes and braces
pub fn split_call_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;

    for c in args.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '{' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            '}' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if !in_quotes && depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out.retain(|arg| !arg.is_empty());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_grammar() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("4.2"), None);
        assert_eq!(parse_int("12a"), None);
        assert_eq!(parse_int("99999999999999999999"), None);

        assert_eq!(parse_float("3.14"), Some(3.14));
        assert_eq!(parse_float("-0.5"), Some(-0.5));
        assert_eq!(parse_float("3."), None);
        assert_eq!(parse_float(".5"), None);
        assert_eq!(parse_float("1e5"), None);
    }

    #[test]
    fn test_overflowing_float_is_dropped() {
        let huge = format!("{}.0", "9".repeat(400));
        assert_eq!(parse_float(&huge), None);
        assert_eq!(parse_create_param(&format!("score={}", huge)), None);
        assert_eq!(parse_float("1797693134862315.5"), Some(1797693134862315.5));
    }

    #[test]
    fn test_create_params() {
        assert_eq!(
            parse_create_param(r#"name="My_little_house""#),
            Some(("name".to_string(), AttrValue::from("My little house")))
        );
        assert_eq!(
            parse_create_param(r#"name="say_\"hi\"""#),
            Some(("name".to_string(), AttrValue::from("say \"hi\"")))
        );
        assert_eq!(
            parse_create_param("number_rooms=4"),
            Some(("number_rooms".to_string(), AttrValue::Int(4)))
        );
        assert_eq!(
            parse_create_param("latitude=37.773972"),
            Some(("latitude".to_string(), AttrValue::Float(37.773972)))
        );
    }

    #[test]
    fn test_create_params_dropped() {
        assert_eq!(parse_create_param("name=California"), None);
        assert_eq!(parse_create_param("noequals"), None);
        assert_eq!(parse_create_param("=5"), None);
        assert_eq!(parse_create_param(r#"name="unterminated"#), None);
        assert_eq!(parse_create_param(r#"name="bad"quote""#), None);
        assert_eq!(parse_create_param("9lives=1"), None);
    }

    #[test]
    fn test_tokenize_with_quotes() {
        let tokens = tokenize(r#"State abc name "New \"York\" City""#);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["State", "abc", "name", "New \"York\" City"]);
        assert!(!tokens[0].quoted);
        assert!(tokens[3].quoted);

        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_update_value_typing() {
        let quoted = Token { text: "89".to_string(), quoted: true };
        let bare = Token { text: "89".to_string(), quoted: false };
        let word = Token { text: "Nevada".to_string(), quoted: false };

        assert_eq!(parse_update_value(&quoted), AttrValue::from("89"));
        assert_eq!(parse_update_value(&bare), AttrValue::Int(89));
        assert_eq!(parse_update_value(&word), AttrValue::from("Nevada"));
    }

    #[test]
    fn test_split_verb() {
        assert_eq!(split_verb("  show State 1 "), ("show", "State 1"));
        assert_eq!(split_verb("all"), ("all", ""));
        assert_eq!(split_verb(""), ("", ""));
    }

    #[test]
    fn test_rewrite_shorthand() {
        assert_eq!(rewrite_shorthand("User.all()"), Some("all User".to_string()));
        assert_eq!(rewrite_shorthand("User.count()"), Some("count User".to_string()));
        assert_eq!(
            rewrite_shorthand(r#"User.show("246c227a")"#),
            Some(r#"show User "246c227a""#.to_string())
        );
        assert_eq!(
            rewrite_shorthand(r#"User.update("38f2", "first_name", "John, Jr")"#),
            Some(r#"update User "38f2" "first_name" "John, Jr""#.to_string())
        );
        assert_eq!(
            rewrite_shorthand(r#"User.update("38f2", {"first_name": "John", "age": 89})"#),
            Some(r#"update User "38f2" {"first_name": "John", "age": 89}"#.to_string())
        );

        assert_eq!(rewrite_shorthand("User.fly()"), None);
        assert_eq!(rewrite_shorthand("show User 1"), None);
    }
}
