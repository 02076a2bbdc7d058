use regex::Regex;
use std::sync::LazyLock;

const UTF8_BOM: char = '\u{feff}';

static ESCAPED_CONTROL_CHARACTER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\\u00[01][0-9a-fA-F]"));

/// Repairs the defects of Web API responses that break JSON parsing.
///
/// Escaped control characters (`\u0000` to `\u001f`) become `?`, escaped and raw line breaks
/// are removed, and a leading UTF-8 byte order mark is stripped.
pub fn sanitize(payload: &str) -> String {
    let payload = payload.strip_prefix(UTF8_BOM).unwrap_or(payload);
    let payload = match ESCAPED_CONTROL_CHARACTER.as_ref() {
        Ok(regex) => regex.replace_all(payload, "?"),
        Err(_) => payload.into(),
    };
    payload
        .replace("\\n", "")
        .replace("\\r", "")
        .replace(['\n', '\r'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_character_escapes_are_replaced() {
        assert_eq!(
            sanitize(r#"{"a":"x\u0007y\u001Fz "}"#),
            r#"{"a":"x?y?z "}"#
        );
    }

    #[test]
    fn line_breaks_are_removed() {
        assert_eq!(
            sanitize("{\"a\":\r\n\"line\\none\\rtwo\"}"),
            r#"{"a":"lineonetwo"}"#
        );
    }

    #[test]
    fn bom_is_stripped() {
        assert_eq!(sanitize("\u{feff}{}"), "{}");
    }
}
