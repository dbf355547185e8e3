use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Contact;

/// Attribute keys holding direct identifiers.
pub const SENSITIVE_ATTRIBUTES: &[&str] = &[
    "SMS",
    "WHATSAPP",
    "LANDLINE",
    "EXT_ID",
    "LANDLINE_NUMBER",
    "WHATSAPP_NUMBER",
    "SMS_NUMBER",
    "NOME",
    "COGNOME",
];

/// A contact with its email and every sensitive attribute removed.
///
/// Only obtainable through [`scrub`] or deserialization, which scrubs
/// again, so a value of this type never carries PII keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScrubbedContact(Contact);

impl ScrubbedContact {
    pub fn as_contact(&self) -> &Contact {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ScrubbedContact {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Contact::deserialize(deserializer).map(scrub_owned)
    }
}

pub fn scrub(contact: &Contact) -> ScrubbedContact {
    scrub_owned(contact.clone())
}

fn scrub_owned(mut contact: Contact) -> ScrubbedContact {
    contact.email = None;
    for key in SENSITIVE_ATTRIBUTES {
        contact.attributes.remove(*key);
    }
    ScrubbedContact(contact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn full_contact() -> Contact {
        serde_json::from_str(
            r#"{
                "id": 42,
                "email": "mario.rossi@example.com",
                "attributes": {
                    "NOME": "Mario",
                    "COGNOME": "Rossi",
                    "SMS": "+39333",
                    "WHATSAPP": "+39333",
                    "LANDLINE_NUMBER": "06123",
                    "EXT_ID": "x-1",
                    "ATENEO": "Sapienza",
                    "CORSO_ACQUISTATO": "Focus 2025"
                },
                "listIds": [6]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn removes_every_sensitive_key() {
        let scrubbed = scrub(&full_contact());
        let value = serde_json::to_value(&scrubbed).unwrap();

        assert!(value.get("email").is_none());
        for key in SENSITIVE_ATTRIBUTES {
            assert!(value["attributes"].get(*key).is_none(), "{key} survived");
        }
        assert_eq!(value["attributes"]["ATENEO"], Value::from("Sapienza"));
        assert_eq!(value["listIds"], serde_json::json!([6]));
    }

    #[test]
    fn absent_fields_are_a_no_op() {
        let bare: Contact = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        let scrubbed = scrub(&bare);
        assert!(scrubbed.as_contact().email.is_none());
        assert!(scrubbed.as_contact().attributes.is_empty());
    }

    #[test]
    fn input_is_left_untouched() {
        let original = full_contact();
        let before = original.clone();
        let _ = scrub(&original);
        assert_eq!(original, before);
        assert!(original.email.is_some());
    }

    #[test]
    fn deserializing_scrubs_again() {
        let raw = serde_json::to_string(&full_contact()).unwrap();
        let scrubbed: ScrubbedContact = serde_json::from_str(&raw).unwrap();
        assert!(scrubbed.as_contact().email.is_none());
        assert!(!scrubbed.as_contact().attributes.contains_key("NOME"));
    }
}
