//! Bracket-matching helpers for manifests that structured parsing rejects.

const INVISIBLE_PREFIX: &[char] = &['\u{FEFF}', '\u{200B}', '\u{200E}', '\u{200F}', '\0'];

/// Strips a byte-order mark, zero-width marks and leading control characters
/// other than whitespace.
pub fn sanitize_json(text: &str) -> &str {
    text.trim_start_matches(INVISIBLE_PREFIX)
        .trim_start_matches(|c: char| c.is_control() && !matches!(c, '\r' | '\n' | '\t'))
}

/// The `[...]` array following the first `"key"` (case-insensitive), by
/// bracket depth. `None` when the key or a balanced array is missing.
pub fn extract_top_level_array<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{}\"", key).to_ascii_lowercase();
    let key_at = json.to_ascii_lowercase().find(&needle)?;
    let open = key_at + json[key_at..].find('[')?;

    let mut depth = 0i32;
    for (offset, byte) in json.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'[' => depth += 1,
            b']' => depth -= 1,
            _ => {}
        }
        if depth == 0 {
            return Some(&json[open..=open + offset]);
        }
    }
    None
}

/// The `{...}` objects directly inside an array text, by brace depth.
/// Stops at the first element that is not an object or is unbalanced.
pub fn split_top_level_objects(array: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let bytes = array.as_bytes();
    let Some(open) = array.find('[') else {
        return objects;
    };
    let mut i = open + 1;

    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'{' {
            break;
        }

        let start = i;
        let mut depth = 0i32;
        while i < bytes.len() {
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            i += 1;
            if depth == 0 {
                break;
            }
        }
        if depth != 0 {
            break;
        }
        objects.push(&array[start..i]);
    }
    objects
}
