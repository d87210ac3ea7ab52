use std::sync::OnceLock;

use regex::Regex;

const VARIABLE_TAG: &str = "VARIABLE:";

/// Rewrites raw variable markers `{{{name}}}` into the portable
/// `{{{VARIABLE:name}}}` form used by intermediate exports. Values already
/// carrying the portable form pass through unchanged.
pub fn encode_intermediate(value: &str) -> String {
    marker_regex()
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if name.starts_with(VARIABLE_TAG) {
                caps[0].to_string()
            } else {
                format!("{{{{{{{}{}}}}}}}", VARIABLE_TAG, name)
            }
        })
        .into_owned()
}

/// Inverse of [`encode_intermediate`]. Identity for values without portable
/// markers, so it is safe to apply to every deserialized document.
pub fn decode_intermediate(value: &str) -> String {
    marker_regex()
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match name.strip_prefix(VARIABLE_TAG) {
                Some(raw_name) => format!("{{{{{{{}}}}}}}", raw_name),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\{\{\{([^{}]+)\}\}\}").expect("marker regex must compile")
    })
}

#[cfg(test)]
mod marker_tests {
    use super::*;

    #[test]
    fn encode_wraps_raw_markers_and_leaves_plain_text_alone() {
        assert_eq!(
            encode_intermediate("add {{{vNum}}} to {{{vTotal}}}"),
            "add {{{VARIABLE:vNum}}} to {{{VARIABLE:vTotal}}}"
        );
        assert_eq!(encode_intermediate("no markers here"), "no markers here");
    }

    #[test]
    fn encode_is_idempotent_on_already_portable_values() {
        let portable = "use {{{VARIABLE:vNum}}}";
        assert_eq!(encode_intermediate(portable), portable);
        assert_eq!(
            encode_intermediate(&encode_intermediate("{{{vNum}}}")),
            "{{{VARIABLE:vNum}}}"
        );
    }

    #[test]
    fn decode_restores_raw_markers_and_ignores_raw_input() {
        assert_eq!(decode_intermediate("{{{VARIABLE:vNum}}}"), "{{{vNum}}}");
        assert_eq!(decode_intermediate("{{{vNum}}}"), "{{{vNum}}}");
        assert_eq!(
            decode_intermediate(&encode_intermediate("a {{{v}}} b")),
            "a {{{v}}} b"
        );
    }
}
