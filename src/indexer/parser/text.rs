// Text refinement helpers shared by the language extractors

use tree_sitter::Node;

/// Source text covered by `node`
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

pub fn field_text<'s>(node: Node<'_>, field: &str, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name(field).map(|n| node_text(n, source))
}

/// Contents of the bracket group opening at byte `open`, honouring nesting.
/// Returns the inner text and the byte index just past the closing bracket.
pub fn balanced_group(text: &str, open: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    let opener = *bytes.get(open)?;
    let closer = match opener {
        b'(' => b')',
        b'{' => b'}',
        b'[' => b']',
        b'<' => b'>',
        _ => return None,
    };

    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == opener {
            depth += 1;
        } else if b == closer {
            depth -= 1;
            if depth == 0 {
                return Some((&text[open + 1..i], i + 1));
            }
        }
    }
    None
}

/// Trimmed text of every named child, in source order
pub fn child_texts(node: Node<'_>, source: &str) -> Vec<String> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !c.is_extra())
        .map(|c| node_text(c, source).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Collapse runs of whitespace into single spaces.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of `node` up to its first `{`, trimmed
pub fn header<'s>(text: &'s str) -> &'s str {
    text.split('{').next().unwrap_or(text).trim()
}

/// Parameter text of the first parenthesised group at or after `from`.
pub fn params_after(text: &str, from: usize) -> Option<(&str, usize)> {
    let open = text.get(from..)?.find('(')? + from;
    balanced_group(text, open)
}

/// Split a parameter list on top-level commas, trimming each entry.
pub fn split_params(inner: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = ' ';

    for (i, c) in inner.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            // `->` and `=>` are arrows, not closing brackets
            '>' if prev == '-' || prev == '=' => {}
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth == 0 => {
                params.push(inner[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
        prev = c;
    }
    params.push(inner[start..].trim().to_string());
    params.retain(|p| !p.is_empty());
    params
}

/// Text between the outermost braces, trimmed
pub fn brace_body(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| text[open + 1..close].trim())
}

/// Strip a leading keyword and trailing semicolon: `package a.b;` -> `a.b`
pub fn strip_keyword<'s>(text: &'s str, keyword: &str) -> &'s str {
    let text = text.trim();
    let text = text.strip_prefix(keyword).unwrap_or(text);
    text.trim().trim_end_matches(';').trim()
}
