use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::config::CrmSettings;
use crate::models::Contact;

const USER_AGENT: &str = concat!("funnel-snapshot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("CRM returned HTTP {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("malformed CRM response from {url}: {message}")]
    Malformed { url: String, message: String },
}

/// One page of the list-contacts endpoint. A body without a `contacts`
/// key is an empty page.
#[derive(Debug, Default)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    /// Records on the page that could not be read as a contact.
    pub skipped: usize,
}

impl ContactPage {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self {
            contacts,
            skipped: 0,
        }
    }

    /// Records the CRM returned, readable or not.
    pub fn received(&self) -> usize {
        self.contacts.len() + self.skipped
    }
}

/// The paginated "list contacts" operation the pipeline depends on.
pub trait ContactSource {
    async fn list_contacts(&self, limit: usize, offset: usize) -> Result<ContactPage, CrmError>;
}

pub struct CrmClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CrmClient {
    pub fn new(settings: &CrmSettings) -> Result<Self, CrmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CrmError::Network {
                url: settings.base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

fn malformed(url: &str, message: impl Into<String>) -> CrmError {
    CrmError::Malformed {
        url: url.to_string(),
        message: message.into(),
    }
}

/// A body that is not an object, or whose `contacts` is not an array, is
/// malformed. Individual unreadable records are skipped with a warning.
pub fn parse_page(url: &str, body: &str) -> Result<ContactPage, CrmError> {
    let value: Value = serde_json::from_str(body).map_err(|e| malformed(url, e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(malformed(url, "response body is not a JSON object"));
    };
    let records = match object.remove("contacts") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(records)) => records,
        Some(_) => return Err(malformed(url, "`contacts` is not an array")),
    };

    let mut page = ContactPage::default();
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Contact>(record) {
            Ok(contact) => page.contacts.push(contact),
            Err(err) => {
                tracing::warn!(url, index, error = %err, "Skipping unreadable contact record");
                page.skipped += 1;
            }
        }
    }
    Ok(page)
}

impl ContactSource for CrmClient {
    async fn list_contacts(&self, limit: usize, offset: usize) -> Result<ContactPage, CrmError> {
        let url = format!("{}?limit={}&offset={}", self.base_url, limit, offset);
        tracing::debug!(url = %url, "Requesting contact page");

        let response = self
            .http_client
            .get(&url)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrmError::Timeout { url: url.clone() }
                } else {
                    CrmError::Network {
                        url: url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CrmError::Timeout { url: url.clone() }
            } else {
                CrmError::Network {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })?;
        parse_page(&url, &body)
    }
}

/// Fetch every contact, page by page, in request order.
pub async fn fetch_all_contacts<S: ContactSource>(
    source: &S,
    page_size: usize,
    page_delay: Duration,
) -> Result<Vec<Contact>, CrmError> {
    let mut contacts = Vec::new();
    let mut offset = 0usize;
    let mut pages = 0usize;

    loop {
        let page = source.list_contacts(page_size, offset).await?;
        pages += 1;
        let received = page.received();
        contacts.extend(page.contacts);
        tracing::debug!(page = pages, offset, received, total = contacts.len(), "Contact page received");

        if received < page_size {
            break;
        }
        offset += page_size;
        if !page_delay.is_zero() {
            tokio::time::sleep(page_delay).await;
        }
    }

    tracing::info!(pages, total = contacts.len(), "Fetched all contacts");
    Ok(contacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves `total` synthetic contacts, optionally failing one page.
    struct FakeSource {
        total: usize,
        fail_at_offset: Option<usize>,
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl FakeSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_at_offset: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ContactSource for FakeSource {
        async fn list_contacts(&self, limit: usize, offset: usize) -> Result<ContactPage, CrmError> {
            self.calls.lock().unwrap().push((limit, offset));
            if self.fail_at_offset == Some(offset) {
                return Err(CrmError::Timeout {
                    url: format!("fake?offset={offset}"),
                });
            }
            let end = (offset + limit).min(self.total);
            let contacts = (offset..end)
                .map(|i| serde_json::from_value(serde_json::json!({ "id": i })).unwrap())
                .collect();
            Ok(ContactPage::new(contacts))
        }
    }

    #[tokio::test]
    async fn stops_on_short_page() {
        let source = FakeSource::new(25);
        let contacts = fetch_all_contacts(&source, 10, Duration::ZERO).await.unwrap();

        assert_eq!(contacts.len(), 25);
        assert_eq!(*source.calls.lock().unwrap(), vec![(10, 0), (10, 10), (10, 20)]);
    }

    #[tokio::test]
    async fn exact_multiple_needs_a_trailing_empty_page() {
        let source = FakeSource::new(20);
        let contacts = fetch_all_contacts(&source, 10, Duration::ZERO).await.unwrap();

        assert_eq!(contacts.len(), 20);
        assert_eq!(source.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_crm_is_one_request() {
        let source = FakeSource::new(0);
        let contacts = fetch_all_contacts(&source, 10, Duration::ZERO).await.unwrap();
        assert!(contacts.is_empty());
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_page_aborts_the_fetch() {
        let source = FakeSource {
            fail_at_offset: Some(10),
            ..FakeSource::new(30)
        };
        let err = fetch_all_contacts(&source, 10, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, CrmError::Timeout { .. }));
    }

    #[test]
    fn page_parsing_rejects_non_objects() {
        assert!(matches!(
            parse_page("u", "[1, 2]"),
            Err(CrmError::Malformed { .. })
        ));
        assert!(matches!(parse_page("u", "<html>"), Err(CrmError::Malformed { .. })));
        assert!(parse_page("u", "{}").unwrap().contacts.is_empty());

        let page = parse_page("u", r#"{"contacts": [{"id": 1, "listIds": [6]}], "count": 1}"#).unwrap();
        assert_eq!(page.contacts.len(), 1);
    }

    #[test]
    fn bad_records_do_not_sink_the_page() {
        let body = r#"{"contacts": [
            {"id": 1, "attributes": {"CORSO_ACQUISTATO": "Focus 2025"}, "listIds": [6]},
            {"id": 2, "attributes": []},
            {"listIds": ["69"]},
            {"id": null},
            42,
            "not a contact"
        ]}"#;
        let page = parse_page("u", body).unwrap();

        assert_eq!(page.contacts.len(), 4);
        assert_eq!(page.skipped, 2);
        assert_eq!(page.received(), 6);
        assert_eq!(page.contacts[0].attribute("CORSO_ACQUISTATO"), "Focus 2025");
        assert!(page.contacts[1].attributes.is_empty());
        assert!(page.contacts[2].in_list(69));

        assert!(matches!(
            parse_page("u", r#"{"contacts": {"id": 1}}"#),
            Err(CrmError::Malformed { .. })
        ));
    }

    /// Full pages made short by skipped records must not end the listing.
    struct SkippingSource;

    impl ContactSource for SkippingSource {
        async fn list_contacts(&self, limit: usize, offset: usize) -> Result<ContactPage, CrmError> {
            let body = match offset {
                0 => r#"{"contacts": [{"id": 1}, 7]}"#,
                _ => r#"{"contacts": [{"id": 3}]}"#,
            };
            assert_eq!(limit, 2);
            parse_page("fake", body)
        }
    }

    #[tokio::test]
    async fn skipped_records_count_towards_page_length() {
        let contacts = fetch_all_contacts(&SkippingSource, 2, Duration::ZERO).await.unwrap();
        assert_eq!(contacts.len(), 2);
    }

    #[test]
    fn client_builds_from_settings() {
        let settings = CrmSettings::new(
            "key".to_string(),
            crate::config::DEFAULT_API_URL.to_string(),
            1000,
            Duration::from_secs(30),
            Duration::from_millis(100),
        )
        .unwrap();
        assert!(CrmClient::new(&settings).is_ok());
    }
}
