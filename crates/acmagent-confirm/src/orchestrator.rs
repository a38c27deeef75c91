//! Confirmation orchestrator: one attempt, from folder selection through
//! form submission, over a freshly opened mailbox session.

use std::sync::Arc;

use tracing::{info, warn};

use acmagent_core::{CandidatePolicy, MailboxCredentials};

use crate::error::{AttemptOutcome, ConfirmError};
use crate::mailbox::{Mailbox, MailboxConnector, MessageId, SearchCriteria, SearchStatus};
use crate::page::ConfirmationPage;
use crate::parser::{extract_confirmation_link, extract_html_body};

/// Folder the issuer's emails land in.
pub const EMAIL_FOLDER: &str = "Inbox";

/// Sender display name of the issuer's emails.
pub const ISSUER_SENDER: &str = "Amazon Certificates";

/// `id` of the anchor carrying the confirmation link.
pub const APPROVAL_ANCHOR_ID: &str = "approval_url";

#[derive(Clone, Debug)]
pub struct ConfirmSettings {
    pub folder: String,
    pub sender: String,
    pub anchor_id: String,
    pub policy: CandidatePolicy,
}

impl Default for ConfirmSettings {
    fn default() -> Self {
        Self {
            folder: EMAIL_FOLDER.to_string(),
            sender: ISSUER_SENDER.to_string(),
            anchor_id: APPROVAL_ANCHOR_ID.to_string(),
            policy: CandidatePolicy::default(),
        }
    }
}

/// A successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed {
    pub message_id: MessageId,
    pub approval_link: String,
}

/// Runs confirmation attempts. Each call opens its own session and
/// closes it before returning.
pub struct Confirmer {
    connector: Arc<dyn MailboxConnector>,
    page: Arc<dyn ConfirmationPage>,
    credentials: MailboxCredentials,
    settings: ConfirmSettings,
}

impl Confirmer {
    pub fn new(
        connector: Arc<dyn MailboxConnector>,
        page: Arc<dyn ConfirmationPage>,
        credentials: MailboxCredentials,
    ) -> Self {
        Self {
            connector,
            page,
            credentials,
            settings: ConfirmSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ConfirmSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ConfirmSettings {
        &self.settings
    }

    /// One full attempt for `certificate_id`.
    pub async fn confirm_certificate(&self, certificate_id: &str) -> Result<Confirmed, ConfirmError> {
        let mut mailbox = self.connector.open(&self.credentials).await?;
        let result = self.run(mailbox.as_mut(), certificate_id).await;
        mailbox.close().await;
        result
    }

    async fn run(
        &self,
        mailbox: &mut dyn Mailbox,
        certificate_id: &str,
    ) -> Result<Confirmed, ConfirmError> {
        let no_match = || ConfirmError::NoMatchingEmail {
            certificate_id: certificate_id.to_string(),
            folder: self.settings.folder.clone(),
        };

        mailbox.select_folder(&self.settings.folder).await?;

        let criteria = SearchCriteria::for_certificate(&self.settings.sender, certificate_id);
        let result = mailbox.search(&criteria).await?;
        if let SearchStatus::Failed(state) = result.status {
            return Err(ConfirmError::Fatal { state });
        }
        if result.ids.is_empty() {
            info!(certificate_id, folder = %self.settings.folder, "No matching email found");
            return Err(no_match());
        }

        info!(count = result.ids.len(), "Found matching emails");

        let mut last_error = None;
        for id in &result.ids {
            match self.confirm_candidate(mailbox, id).await {
                Ok(approval_link) => {
                    return Ok(Confirmed {
                        message_id: id.clone(),
                        approval_link,
                    })
                }
                Err(e)
                    if self.settings.policy == CandidatePolicy::TryNext
                        && e.outcome() == AttemptOutcome::TransientParseOrProtocolFailure =>
                {
                    warn!(message_id = %id, error = %e, "Candidate failed, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(no_match))
    }

    async fn confirm_candidate(
        &self,
        mailbox: &mut dyn Mailbox,
        id: &MessageId,
    ) -> Result<String, ConfirmError> {
        let message = mailbox.fetch_and_mark_read(id).await?;
        let html = extract_html_body(&message)?;
        let link = extract_confirmation_link(&html, &self.settings.anchor_id)?;

        let payload = self.page.fetch_confirmation_form(&link).await?;
        self.page.submit_form(&payload).await?;
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{RawMessage, SearchResult};
    use crate::page::FormPayload;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Everything the fake mailbox saw, shared with the test body.
    #[derive(Default)]
    struct Journal {
        pub events: Vec<String>,
        pub opens: usize,
        pub closes: usize,
    }

    #[derive(Clone)]
    struct FakeConnector {
        pub ids: Vec<&'static str>,
        pub status: SearchStatus,
        pub messages: HashMap<&'static str, String>,
        pub fail_open: bool,
        pub fail_select: bool,
        pub journal: Arc<Mutex<Journal>>,
    }

    impl FakeConnector {
        pub fn new(ids: Vec<&'static str>) -> Self {
            Self {
                ids,
                status: SearchStatus::Ok,
                messages: HashMap::new(),
                fail_open: false,
                fail_select: false,
                journal: Arc::default(),
            }
        }

        pub fn with_message(mut self, id: &'static str, raw: String) -> Self {
            self.messages.insert(id, raw);
            self
        }

        fn log(&self, event: String) {
            self.journal.lock().unwrap().events.push(event);
        }
    }

    struct FakeMailbox(FakeConnector);

    #[async_trait]
    impl MailboxConnector for FakeConnector {
        async fn open(
            &self,
            credentials: &MailboxCredentials,
        ) -> Result<Box<dyn Mailbox>, ConfirmError> {
            if self.fail_open {
                return Err(ConfirmError::Connection {
                    server: credentials.server().to_string(),
                    reason: "refused".into(),
                });
            }
            self.journal.lock().unwrap().opens += 1;
            Ok(Box::new(FakeMailbox(self.clone())))
        }
    }

    #[async_trait]
    impl Mailbox for FakeMailbox {
        async fn select_folder(&mut self, name: &str) -> Result<(), ConfirmError> {
            self.0.log(format!("select {name}"));
            if self.0.fail_select {
                return Err(ConfirmError::Connection {
                    server: "imap.example.com".into(),
                    reason: "broken pipe".into(),
                });
            }
            Ok(())
        }

        async fn search(
            &mut self,
            criteria: &SearchCriteria,
        ) -> Result<SearchResult, ConfirmError> {
            self.0.log(format!("search {}", criteria.to_imap()));
            Ok(SearchResult {
                status: self.0.status.clone(),
                ids: self.0.ids.iter().map(|id| MessageId::new(*id)).collect(),
            })
        }

        async fn fetch(&mut self, id: &MessageId) -> Result<RawMessage, ConfirmError> {
            self.0.log(format!("fetch {id}"));
            let raw = self
                .0
                .messages
                .get(id.as_str())
                .ok_or_else(|| ConfirmError::Fetch {
                    message_id: id.to_string(),
                    reason: "gone".into(),
                })?;
            Ok(RawMessage {
                id: id.clone(),
                bytes: raw.as_bytes().to_vec(),
            })
        }

        async fn mark_read(&mut self, id: &MessageId) -> Result<(), ConfirmError> {
            self.0.log(format!("seen {id}"));
            Ok(())
        }

        async fn close(&mut self) {
            self.0.journal.lock().unwrap().closes += 1;
        }
    }

    #[derive(Default)]
    struct FakePage {
        pub forms: HashMap<String, FormPayload>,
        pub submitted: Mutex<Vec<FormPayload>>,
        pub reject_submit: bool,
    }

    impl FakePage {
        pub fn with_form(mut self, url: &str, fields: &[(&str, &str)]) -> Self {
            let payload = fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.forms.insert(url.to_string(), payload);
            self
        }
    }

    #[async_trait]
    impl ConfirmationPage for FakePage {
        async fn fetch_confirmation_form(&self, url: &str) -> Result<FormPayload, ConfirmError> {
            self.forms
                .get(url)
                .cloned()
                .ok_or_else(|| ConfirmError::ExpiredOrMissingForm { url: url.to_string() })
        }

        async fn submit_form(&self, payload: &FormPayload) -> Result<(), ConfirmError> {
            if self.reject_submit {
                return Err(ConfirmError::SubmissionFailed {
                    url: "https://certificates.amazon.com/approvals".into(),
                    status: 500,
                });
            }
            self.submitted.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn html_message(link: &str) -> String {
        format!(
            "From: Amazon Certificates <no-reply@certificates.amazon.com>\r\n\
Content-Type: multipart/alternative; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
Content-Type: text/plain\r\n\
\r\n\
Certificate identifier: 1234\r\n\
--B\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><a id=\"approval_url\" href=\"{link}\">Approve</a></body></html>\r\n\
--B--\r\n"
        )
    }

    fn plain_message() -> String {
        "Content-Type: text/plain\r\n\r\nCertificate identifier: 1234\r\n".to_string()
    }

    fn credentials() -> MailboxCredentials {
        MailboxCredentials::new("imap.example.com", "user", "secret").unwrap()
    }

    fn confirmer(connector: &FakeConnector, page: Arc<FakePage>) -> Confirmer {
        Confirmer::new(Arc::new(connector.clone()), page, credentials())
    }

    fn events(connector: &FakeConnector) -> Vec<String> {
        connector.journal.lock().unwrap().events.clone()
    }

    fn closes(connector: &FakeConnector) -> usize {
        connector.journal.lock().unwrap().closes
    }

    #[tokio::test]
    async fn test_no_results_is_no_matching_email() {
        let connector = FakeConnector::new(vec![]);
        let err = confirmer(&connector, Arc::default())
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::NoMatchingEmail { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to find email for certificate 1234 in Inbox folder"
        );
        assert_eq!(closes(&connector), 1);
        assert_eq!(
            events(&connector),
            vec![
                "select Inbox".to_string(),
                "search (UNSEEN FROM \"Amazon Certificates\" BODY \"Certificate identifier: 1234\")"
                    .to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_end_to_end_confirmation() {
        let connector =
            FakeConnector::new(vec!["7"]).with_message("7", html_message("https://x/y"));
        let page = Arc::new(FakePage::default().with_form("https://x/y", &[("token", "abc")]));

        let confirmed = confirmer(&connector, page.clone())
            .confirm_certificate("1234")
            .await
            .unwrap();

        assert_eq!(confirmed.message_id, MessageId::new("7"));
        assert_eq!(confirmed.approval_link, "https://x/y");

        let seen = events(&connector).iter().filter(|e| *e == "seen 7").count();
        assert_eq!(seen, 1);

        let submitted = page.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let expected: FormPayload = [("token".to_string(), "abc".to_string())].into();
        assert_eq!(submitted[0], expected);
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_marked_read_before_parse_failure() {
        let connector = FakeConnector::new(vec!["3"]).with_message(
            "3",
            "Content-Type: text/html\r\n\r\n<p>no link here</p>\r\n".to_string(),
        );

        let err = confirmer(&connector, Arc::default())
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::MissingConfirmationLink { .. }));
        let log = events(&connector);
        assert_eq!(&log[2..], &["fetch 3".to_string(), "seen 3".to_string()]);
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_bad_candidate() {
        let connector = FakeConnector::new(vec!["1", "2"])
            .with_message("1", plain_message())
            .with_message("2", html_message("https://x/y"));
        let page = Arc::new(FakePage::default().with_form("https://x/y", &[]));

        let err = confirmer(&connector, page.clone())
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::UnsupportedContentType { ref message_id } if message_id == "1"));
        assert!(!events(&connector).contains(&"fetch 2".to_string()));
        assert!(page.submitted.lock().unwrap().is_empty());
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_try_next_falls_through_to_valid_candidate() {
        let connector = FakeConnector::new(vec!["1", "2"])
            .with_message("1", plain_message())
            .with_message("2", html_message("https://x/y"));
        let page = Arc::new(FakePage::default().with_form("https://x/y", &[]));

        let confirmed = confirmer(&connector, page.clone())
            .with_settings(ConfirmSettings {
                policy: CandidatePolicy::TryNext,
                ..ConfirmSettings::default()
            })
            .confirm_certificate("1234")
            .await
            .unwrap();

        assert_eq!(confirmed.message_id, MessageId::new("2"));
        assert_eq!(page.submitted.lock().unwrap().len(), 1);
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_try_next_reports_last_failure() {
        let connector = FakeConnector::new(vec!["1", "2"])
            .with_message("1", plain_message())
            .with_message("2", html_message("https://expired"));

        let err = confirmer(&connector, Arc::default())
            .with_settings(ConfirmSettings {
                policy: CandidatePolicy::TryNext,
                ..ConfirmSettings::default()
            })
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::ExpiredOrMissingForm { ref url } if url == "https://expired"));
    }

    #[tokio::test]
    async fn test_submission_failure_propagates() {
        let connector =
            FakeConnector::new(vec!["7"]).with_message("7", html_message("https://x/y"));
        let page = Arc::new(FakePage {
            reject_submit: true,
            ..FakePage::default().with_form("https://x/y", &[])
        });

        let err = confirmer(&connector, page)
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::SubmissionFailed { status: 500, .. }));
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_rejected_search_is_fatal() {
        let mut connector = FakeConnector::new(vec![]);
        connector.status = SearchStatus::Failed("NO".into());

        let err = confirmer(&connector, Arc::default())
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::Fatal { ref state } if state == "NO"));
        assert_eq!(err.outcome(), AttemptOutcome::FatalFailure);
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_select_failure_closes_session() {
        let mut connector = FakeConnector::new(vec!["1"]);
        connector.fail_select = true;

        let err = confirmer(&connector, Arc::default())
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfirmError::Connection { .. }));
        assert_eq!(closes(&connector), 1);
    }

    #[tokio::test]
    async fn test_open_failure_has_no_session_to_close() {
        let mut connector = FakeConnector::new(vec![]);
        connector.fail_open = true;

        let err = confirmer(&connector, Arc::default())
            .confirm_certificate("1234")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("imap.example.com"));
        assert_eq!(closes(&connector), 0);
    }

    #[tokio::test]
    async fn test_each_attempt_opens_fresh_session() {
        let connector = FakeConnector::new(vec![]);
        let confirmer = confirmer(&connector, Arc::default());

        let _ = confirmer.confirm_certificate("1234").await;
        let _ = confirmer.confirm_certificate("1234").await;

        let journal = connector.journal.lock().unwrap();
        assert_eq!(journal.opens, 2);
        assert_eq!(journal.closes, 2);
    }
}
