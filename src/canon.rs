use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip diacritics, collapse whitespace runs, trim.
///
/// Total and idempotent: `canon(&canon(s)) == canon(s)`.
pub fn canon(input: &str) -> String {
    let stripped: String = input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    // Lowercasing can emit new combining marks (e.g. U+0130), so strip again.
    let stripped: String = stripped.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents_and_case() {
        assert_eq!(canon("  Università   di  PERUGIA "), "universita di perugia");
        assert_eq!(canon("Se entri è GRATIS"), "se entri e gratis");
    }

    #[test]
    fn empty_and_blank_inputs_collapse_to_empty() {
        assert_eq!(canon(""), "");
        assert_eq!(canon(" \t\n "), "");
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let samples = [
            "Corso Full SSM 2026 Promo 40%",
            "İstanbul Ünİversitesi",
            "  ÀÉÎÕÜ  ñ ç  ",
            "1° anno",
            "Ǆemal",
            "",
        ];
        for sample in samples {
            let once = canon(sample);
            assert_eq!(canon(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn capitalize_only_touches_first_char() {
        assert_eq!(capitalize("tiktok ads"), "Tiktok ads");
        assert_eq!(capitalize("école"), "École");
        assert_eq!(capitalize(""), "");
    }
}
