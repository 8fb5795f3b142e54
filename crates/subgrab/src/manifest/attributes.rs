use std::collections::HashMap;

/// Parse an HLS attribute list (`KEY=VALUE,KEY="quoted, value"`).
///
/// Keys are upper-cased; quotes are removed from quoted values. Commas inside
/// quoted values do not split attributes.
pub(crate) fn parse_attribute_list(input: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim_matches(|c: char| c == ',' || c.is_whitespace());
        let after = after.trim_start();

        let (value, remainder) = match after.strip_prefix('"') {
            Some(quoted) => match quoted.split_once('"') {
                Some((value, remainder)) => {
                    let remainder = remainder.trim_start();
                    (value, remainder.strip_prefix(',').unwrap_or(remainder))
                }
                None => (quoted, ""),
            },
            None => match after.split_once(',') {
                Some((value, remainder)) => (value.trim(), remainder),
                None => (after.trim(), ""),
            },
        };

        if !key.is_empty() {
            attrs.insert(key.to_ascii_uppercase(), value.to_string());
        }
        rest = remainder.trim_start();
    }

    attrs
}
