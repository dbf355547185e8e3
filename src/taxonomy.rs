pub const UNSPECIFIED: &str = "Unspecified";
pub const OTHER: &str = "Other";

struct FamilyRule {
    required: &'static [&'static str],
    free_offer: Option<&'static str>,
    scholarship: Option<&'static str>,
    /// `(percentage, label)` checked in order once a promo marker matched.
    promo_tiers: &'static [(&'static str, &'static str)],
    promo: Option<&'static str>,
    default: &'static str,
}

/// First matching family wins.
const FAMILY_RULES: &[FamilyRule] = &[
    FamilyRule {
        required: &["full", "ssm", "2026"],
        free_offer: Some("Full 2026 – Free if admitted"),
        scholarship: Some("Full 2026 – Scholarship"),
        promo_tiers: &[
            ("65%", "Full 2026 – Promo 65%"),
            ("40%", "Full 2026 – Promo 40%"),
            ("30%", "Full 2026 – Promo 30%"),
        ],
        promo: Some("Full 2026 – Promo"),
        default: "Full 2026 – Other",
    },
    FamilyRule {
        required: &["academy", "2026"],
        free_offer: Some("Academy 2026 – Free if admitted"),
        scholarship: None,
        promo_tiers: &[("40%", "Academy 2026 – Promo 40%")],
        promo: Some("Academy 2026 – Promo"),
        default: "Academy 2026 – Other",
    },
    FamilyRule {
        required: &["focus", "2025"],
        free_offer: None,
        scholarship: None,
        promo_tiers: &[],
        promo: None,
        default: "Focus SSM 2025",
    },
    FamilyRule {
        required: &["biennale", "2027"],
        free_offer: None,
        scholarship: None,
        promo_tiers: &[],
        promo: None,
        default: "Biennale SSM 2027",
    },
    FamilyRule {
        required: &["one more time", "2026"],
        free_offer: None,
        scholarship: None,
        promo_tiers: &[],
        promo: None,
        default: "One More Time SSM 2026",
    },
    FamilyRule {
        required: &["on demand pro"],
        free_offer: None,
        scholarship: None,
        promo_tiers: &[],
        promo: None,
        default: "On Demand Pro",
    },
];

fn has_free_offer(s: &str) -> bool {
    s.contains("gratis") && (s.contains("se entri") || s.contains(" entri "))
}

fn has_scholarship(s: &str) -> bool {
    s.contains("borsa") && s.contains("studio")
}

fn has_promo(s: &str) -> bool {
    s.contains("promo") || s.contains("sconto")
}

fn matching_rule(canonical: &str) -> Option<&'static FamilyRule> {
    FAMILY_RULES
        .iter()
        .find(|rule| rule.required.iter().all(|token| canonical.contains(token)))
}

/// Macro-category label for an already canonicalized course name.
pub fn course_macro(canonical: &str) -> &'static str {
    if canonical.is_empty() {
        return UNSPECIFIED;
    }
    let Some(rule) = matching_rule(canonical) else {
        return OTHER;
    };

    if let Some(label) = rule.free_offer.filter(|_| has_free_offer(canonical)) {
        return label;
    }
    if let Some(label) = rule.scholarship.filter(|_| has_scholarship(canonical)) {
        return label;
    }
    if let Some(promo) = rule.promo.filter(|_| has_promo(canonical)) {
        return rule
            .promo_tiers
            .iter()
            .find(|(pct, _)| canonical.contains(pct))
            .map(|(_, label)| *label)
            .unwrap_or(promo);
    }
    rule.default
}
