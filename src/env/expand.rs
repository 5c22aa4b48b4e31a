// src/env/expand.rs

//! `$NAME` / `${NAME}` variable expansion.
//!
//! A `$` that is not followed by a valid reference is kept literally, and
//! `\$` always yields a literal `$` (the parser emits it for single-quoted
//! text). Unset variables expand to the empty string.

pub(crate) fn expand_with<'a, F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'$') {
            out.push_str(&input[literal_start..i]);
            out.push('$');
            i += 2;
            literal_start = i;
            continue;
        }
        if bytes[i] == b'$' {
            if let Some((name, consumed)) = parse_reference(&input[i + 1..]) {
                out.push_str(&input[literal_start..i]);
                out.push_str(lookup(name).unwrap_or(""));
                i += 1 + consumed;
                literal_start = i;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&input[literal_start..]);
    out
}

/// Parse the text following a `$`. Returns the variable name and how many
/// bytes of `rest` the reference spans.
fn parse_reference(rest: &str) -> Option<(&str, usize)> {
    if let Some(braced) = rest.strip_prefix('{') {
        let end = braced.find('}')?;
        let name = &braced[..end];
        return is_valid_name(name).then_some((name, end + 2));
    }

    let len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    let name = &rest[..len];
    is_valid_name(name).then_some((name, len))
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
