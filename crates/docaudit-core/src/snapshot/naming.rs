//! Output key naming for snapshot fields

use crate::model::FieldTag;

/// Resolve the snapshot key for a field
///
/// Precedence: storage name, then external name, then the snake-cased
/// serialized field name.
pub(crate) fn output_key(field: &str, tag: Option<&FieldTag>) -> String {
    match tag {
        Some(FieldTag {
            storage: Some(name),
            ..
        }) => (*name).to_string(),
        Some(FieldTag {
            external: Some(name),
            ..
        }) => (*name).to_string(),
        _ => to_snake_case(field),
    }
}

/// Convert an identifier to lower-case, underscore-separated form
///
/// An uppercase letter gets a leading underscore unless it is the first
/// character, follows an underscore, or continues an acronym run (previous
/// char not lowercase and next char not lowercase).
///
/// `"UserID"` becomes `"user_id"`, `"HTTPServer"` becomes `"http_server"`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev != '_' && (prev.is_lowercase() || next_is_lower) {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}
