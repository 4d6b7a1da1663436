//! Total coercion helpers over `serde_json::Value`.
//!
//! None of these panic; every mismatch comes back as `None` and the caller
//! decides on the documented default.

use serde_json::Value;

/// Keys accepted as the numeric payload of a wrapper object, in order.
const NUMERIC_WRAPPER_KEYS: &[&str] = &["value", "score", "total", "bonus", "maximum"];

/// Keys accepted as the display name of a wrapper object, in order.
const NAME_KEYS: &[&str] = &["name", "full_name", "base_name", "label", "title"];

/// Walk a dot-separated path through nested objects.
///
/// A `null` at the end of the path counts as missing.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Coerce a value to an integer.
///
/// Accepts integers, floats (floored), numeric strings such as `"+3"` or
/// `"14"`, and wrapper objects carrying one of the numeric wrapper keys.
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        Value::String(s) => {
            let trimmed = s.trim().trim_start_matches('+');
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f.floor() as i64))
        }
        Value::Object(map) => NUMERIC_WRAPPER_KEYS
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(as_int),
        _ => None,
    }
}

/// Coerce a value to a boolean (`true`/`false`, 0/1, "yes"/"no").
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a value to display text: strings directly, wrapper objects via
/// their name key, numbers via their decimal form.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => NAME_KEYS
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(as_text),
        _ => None,
    }
}

/// First non-null field among `keys` of an object.
pub fn field<'a>(map: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| map.get(*k))
        .filter(|v| !v.is_null())
}

/// Normalize a display name into a path segment.
///
/// `"Great Weapon Master"` becomes `"great_weapon_master"`. Runs of
/// non-alphanumeric characters collapse into one underscore.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Parse a hit die given as `10`, `"d10"` or `"1d10"`.
pub fn parse_hit_die(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => {
            let digits = s.rsplit(|c: char| c == 'd' || c == 'D').next().unwrap_or(s);
            digits.trim().parse::<i64>().ok()
        }
        other => as_int(other),
    }
    .filter(|d| *d > 0)
}

/// Extract the first run of digits from a key such as `"level_3"` or `"3rd"`.
pub fn leading_number(key: &str) -> Option<i64> {
    let digits: String = key
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested_and_null() {
        let v = json!({"a": {"b": {"c": 3}, "n": null}});
        assert_eq!(lookup(&v, "a.b.c"), Some(&json!(3)));
        assert_eq!(lookup(&v, "a.n"), None);
        assert_eq!(lookup(&v, "a.b.c.d"), None);
        assert_eq!(lookup(&v, "x"), None);
    }

    #[test]
    fn test_as_int_variants() {
        assert_eq!(as_int(&json!(14)), Some(14));
        assert_eq!(as_int(&json!(14.7)), Some(14));
        assert_eq!(as_int(&json!("+3")), Some(3));
        assert_eq!(as_int(&json!({"score": 16})), Some(16));
        assert_eq!(as_int(&json!({"maximum": {"value": 44}})), Some(44));
        assert_eq!(as_int(&json!("abc")), None);
        assert_eq!(as_int(&json!([1])), None);
    }

    #[test]
    fn test_as_bool_variants() {
        assert_eq!(as_bool(&json!(true)), Some(true));
        assert_eq!(as_bool(&json!(0)), Some(false));
        assert_eq!(as_bool(&json!("yes")), Some(true));
        assert_eq!(as_bool(&json!("maybe")), None);
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Great Weapon Master"), "great_weapon_master");
        assert_eq!(slug("  Sleight of Hand "), "sleight_of_hand");
        assert_eq!(slug("Potion (Healing) x2"), "potion_healing_x2");
        assert_eq!(slug("---"), "");
    }

    #[test]
    fn test_parse_hit_die() {
        assert_eq!(parse_hit_die(&json!("d10")), Some(10));
        assert_eq!(parse_hit_die(&json!("1d12")), Some(12));
        assert_eq!(parse_hit_die(&json!(8)), Some(8));
        assert_eq!(parse_hit_die(&json!("dX")), None);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("level_3"), Some(3));
        assert_eq!(leading_number("3rd"), Some(3));
        assert_eq!(leading_number("cantrips"), None);
    }
}
