//! Minimal RFC 8288 `Link` header tokenizer.

use crate::error::MalformedCursorError;

/// One `<uri>; rel="..."` entry of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkEntry {
    pub uri: String,
    pub rels: Vec<String>,
}

impl LinkEntry {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.iter().any(|candidate| candidate == rel)
    }
}

/// Splits a `Link` header into its entries. Relation types are lowercased.
pub(crate) fn parse(value: &str) -> Result<Vec<LinkEntry>, MalformedCursorError> {
    let mut entries = Vec::new();
    let mut rest = value;
    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }
        let Some(inner) = rest.strip_prefix('<') else {
            return Err(syntax("expected '<' at start of link"));
        };
        let Some(end) = inner.find('>') else {
            return Err(syntax("unterminated link target"));
        };
        let uri = inner[..end].trim().to_string();
        rest = &inner[end + 1..];

        let mut rels = Vec::new();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() || rest.starts_with(',') {
                break;
            }
            let Some(param) = rest.strip_prefix(';') else {
                return Err(syntax("expected ';' or ',' after link target"));
            };
            let (name, value, remaining) = parse_param(param)?;
            if name.eq_ignore_ascii_case("rel") {
                rels.extend(value.split_whitespace().map(str::to_ascii_lowercase));
            }
            rest = remaining;
        }
        entries.push(LinkEntry { uri, rels });
    }
    Ok(entries)
}

fn parse_param(input: &str) -> Result<(&str, String, &str), MalformedCursorError> {
    let input = input.trim_start();
    let name_end = input
        .find(|c: char| c == '=' || c == ';' || c == ',')
        .unwrap_or(input.len());
    let name = input[..name_end].trim();
    if name.is_empty() {
        return Err(syntax("empty link parameter name"));
    }
    let rest = &input[name_end..];
    let Some(rest) = rest.strip_prefix('=') else {
        return Ok((name, String::new(), rest));
    };
    let rest = rest.trim_start();
    if let Some(quoted) = rest.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = quoted.char_indices();
        while let Some((idx, ch)) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                '"' => return Ok((name, value, &quoted[idx + 1..])),
                other => value.push(other),
            }
        }
        return Err(syntax("unterminated quoted parameter"));
    }
    let value_end = rest
        .find(|c: char| c == ';' || c == ',')
        .unwrap_or(rest.len());
    Ok((name, rest[..value_end].trim().to_string(), &rest[value_end..]))
}

fn syntax(reason: &str) -> MalformedCursorError {
    MalformedCursorError::Syntax(reason.to_string())
}
