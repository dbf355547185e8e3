use crate::config::ListIds;
use crate::models::Contact;

pub const COURSE_ATTR: &str = "CORSO_ACQUISTATO";
pub const BIRTH_DATE_ATTR: &str = "DATA_DI_NASCITA";
pub const UNIVERSITY_ATTR: &str = "ATENEO";
pub const SOURCE_ATTR: &str = "FONTE";
pub const COHORT_ATTR: &str = "ANNO";
pub const LAST_SIMULATION_ATTR: &str = "ULTIMA_SIMULAZIONE";

/// Courses containing this phrase are need-based scholarships.
pub const SCHOLARSHIP_MARKER: &str = "borsa di studio";

pub fn is_enrolled(contact: &Contact) -> bool {
    !contact.attribute(COURSE_ATTR).trim().is_empty()
}

pub fn is_paying(contact: &Contact) -> bool {
    is_enrolled(contact)
        && !contact
            .attribute(COURSE_ATTR)
            .to_lowercase()
            .contains(SCHOLARSHIP_MARKER)
}

pub fn is_platform_member(contact: &Contact, lists: &ListIds) -> bool {
    contact.in_list(lists.platform)
}

pub fn is_webinar_participant(contact: &Contact, lists: &ListIds) -> bool {
    contact.in_list(lists.webinar)
}

pub fn has_complete_profile(contact: &Contact) -> bool {
    !contact.attribute(BIRTH_DATE_ATTR).trim().is_empty()
}

/// Belongs to at least one marketing list.
pub fn is_crm_user(contact: &Contact) -> bool {
    !contact.list_ids.is_empty()
}

pub fn has_simulation(contact: &Contact) -> bool {
    !contact.attribute(LAST_SIMULATION_ATTR).trim().is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactFacts {
    pub enrolled: bool,
    pub paying: bool,
    pub platform_member: bool,
    pub webinar: bool,
    pub profiled: bool,
    pub crm_user: bool,
    pub simulated: bool,
}

impl ContactFacts {
    pub fn of(contact: &Contact, lists: &ListIds) -> Self {
        Self {
            enrolled: is_enrolled(contact),
            paying: is_paying(contact),
            platform_member: is_platform_member(contact, lists),
            webinar: is_webinar_participant(contact, lists),
            profiled: has_complete_profile(contact),
            crm_user: is_crm_user(contact),
            simulated: has_simulation(contact),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(json: &str) -> Contact {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn predicates_are_total_on_empty_records() {
        let lists = ListIds::default();
        for raw in [
            r#"{}"#,
            r#"{"attributes": null, "listIds": null}"#,
            r#"{"id": "abc", "attributes": {"CORSO_ACQUISTATO": null}}"#,
            r#"{"attributes": {"CORSO_ACQUISTATO": {"nested": true}}}"#,
        ] {
            let facts = ContactFacts::of(&contact(raw), &lists);
            assert!(!facts.enrolled);
            assert!(!facts.paying);
            assert!(!facts.platform_member);
            assert!(!facts.webinar);
            assert!(!facts.profiled);
            assert!(!facts.crm_user);
        }
    }

    #[test]
    fn whitespace_course_is_not_enrolled() {
        let c = contact(r#"{"attributes": {"CORSO_ACQUISTATO": "   "}}"#);
        assert!(!is_enrolled(&c));
        assert!(!is_paying(&c));
    }

    #[test]
    fn scholarship_course_is_enrolled_but_not_paying() {
        let c = contact(r#"{"attributes": {"CORSO_ACQUISTATO": "Full SSM 2026 Borsa di Studio"}}"#);
        assert!(is_enrolled(&c));
        assert!(!is_paying(&c));

        let paid = contact(r#"{"attributes": {"CORSO_ACQUISTATO": "Full SSM 2026 Promo 40%"}}"#);
        assert!(is_paying(&paid));
    }

    #[test]
    fn list_membership_uses_configured_ids() {
        let c = contact(r#"{"listIds": [6, 69]}"#);
        let lists = ListIds::default();
        assert!(is_platform_member(&c, &lists));
        assert!(is_webinar_participant(&c, &lists));

        let other = ListIds {
            platform: 7,
            webinar: 70,
        };
        assert!(!is_platform_member(&c, &other));
        assert!(!is_webinar_participant(&c, &other));
    }

    #[test]
    fn numeric_birth_date_counts_as_profile() {
        let c = contact(r#"{"attributes": {"DATA_DI_NASCITA": 2001}}"#);
        assert!(has_complete_profile(&c));
    }
}
