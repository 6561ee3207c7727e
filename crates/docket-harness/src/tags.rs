//! `// @tags: [...]` annotations in a script's leading comment block.
//!
//! Tags are metadata for suite selection. The runner never interprets them;
//! `does_not_support_stepdowns` and unknown tags alike are carried through.

const MARKER: &str = "@tags:";

/// Tags declared in the leading `//` comment lines of `source`.
///
/// The list may span several comment lines. Quotes around tags are optional.
pub fn parse_tags(source: &str) -> Vec<String> {
    let header: Vec<&str> = source
        .lines()
        .map(str::trim)
        .take_while(|line| line.is_empty() || line.starts_with("//"))
        .filter_map(|line| line.strip_prefix("//"))
        .collect();
    let header = header.join("\n");

    let Some(start) = header.find(MARKER) else {
        return Vec::new();
    };
    let rest = &header[start + MARKER.len()..];
    let Some(open) = rest.find('[') else {
        return Vec::new();
    };
    let body = &rest[open + 1..];
    let body = match body.find(']') {
        Some(close) => &body[..close],
        None => body,
    };

    body.split([',', '\n'])
        .map(|tag| tag.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
