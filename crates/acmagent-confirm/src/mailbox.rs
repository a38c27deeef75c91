//! Mailbox session: the seam between the orchestrator and the mail server.
//!
//! `Mailbox` is one authenticated connection; `MailboxConnector` opens
//! them. The IMAP implementations wrap [`ImapClient`] and translate its
//! errors into [`ConfirmError`] kinds.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use acmagent_core::MailboxCredentials;

use crate::error::ConfirmError;
use crate::imap::{quote, ImapClient};

/// Default IMAP port (SSL).
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Opaque server-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw RFC 5322 bytes of one fetched message.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: MessageId,
    pub bytes: Vec<u8>,
}

/// Conjunctive search filter: unread, from `sender`, body containing `body_contains`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub sender: String,
    pub body_contains: String,
}

impl SearchCriteria {
    /// Criteria for the issuer's validation email for one certificate.
    pub fn for_certificate(sender: &str, certificate_id: &str) -> Self {
        Self {
            sender: sender.to_string(),
            body_contains: format!("Certificate identifier: {}", certificate_id),
        }
    }

    /// IMAP SEARCH key list.
    pub fn to_imap(&self) -> String {
        format!(
            "(UNSEEN FROM {} BODY {})",
            quote(&self.sender),
            quote(&self.body_contains)
        )
    }
}

/// Whether the server accepted the search, independent of how many ids it returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    Ok,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub status: SearchStatus,
    pub ids: Vec<MessageId>,
}

/// One authenticated mailbox connection.
#[async_trait]
pub trait Mailbox: Send {
    async fn select_folder(&mut self, name: &str) -> Result<(), ConfirmError>;

    /// Never fails on "nothing found"; a rejected search is reported in
    /// [`SearchResult::status`].
    async fn search(&mut self, criteria: &SearchCriteria) -> Result<SearchResult, ConfirmError>;

    /// Retrieve a message without changing its flags.
    async fn fetch(&mut self, id: &MessageId) -> Result<RawMessage, ConfirmError>;

    async fn mark_read(&mut self, id: &MessageId) -> Result<(), ConfirmError>;

    /// Best effort, idempotent. Never fails.
    async fn close(&mut self);

    /// Fetch, then mark read before anything interprets the body, so a
    /// message is never presented twice.
    async fn fetch_and_mark_read(&mut self, id: &MessageId) -> Result<RawMessage, ConfirmError> {
        let message = self.fetch(id).await?;
        self.mark_read(id).await?;
        Ok(message)
    }
}

/// Opens authenticated sessions.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    async fn open(&self, credentials: &MailboxCredentials)
        -> Result<Box<dyn Mailbox>, ConfirmError>;
}

// ─────────────────────────────────────────────
// IMAP implementation
// ─────────────────────────────────────────────

/// Connects over IMAP(S) and logs in.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    port: u16,
    use_ssl: bool,
}

impl ImapConnector {
    pub fn new(port: u16, use_ssl: bool) -> Self {
        Self { port, use_ssl }
    }
}

impl Default for ImapConnector {
    fn default() -> Self {
        Self::new(DEFAULT_IMAP_PORT, true)
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn open(
        &self,
        credentials: &MailboxCredentials,
    ) -> Result<Box<dyn Mailbox>, ConfirmError> {
        let server = credentials.server();
        info!(server = %server, port = self.port, "Establishing connection with IMAP server");

        let connection_error = |e: anyhow::Error| ConfirmError::Connection {
            server: server.to_string(),
            reason: e.to_string(),
        };

        let client = ImapClient::connect(server, self.port, self.use_ssl)
            .await
            .map_err(connection_error)?;
        let mut session = ImapMailbox::new(client, server);
        if let Err(e) = session
            .client
            .login(credentials.username(), credentials.password())
            .await
        {
            session.close().await;
            return Err(connection_error(e));
        }
        Ok(Box::new(session))
    }
}

/// Authenticated IMAP session.
pub struct ImapMailbox {
    client: ImapClient,
    server: String,
    closed: bool,
}

impl ImapMailbox {
    pub fn new(client: ImapClient, server: &str) -> Self {
        Self {
            client,
            server: server.to_string(),
            closed: false,
        }
    }

    fn seqnum(id: &MessageId) -> Result<u32, ConfirmError> {
        id.as_str().parse().map_err(|_| ConfirmError::Fetch {
            message_id: id.to_string(),
            reason: "not an IMAP sequence number".into(),
        })
    }

    fn connection_error(&self, e: anyhow::Error) -> ConfirmError {
        ConfirmError::Connection {
            server: self.server.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn select_folder(&mut self, name: &str) -> Result<(), ConfirmError> {
        match self.client.select(name).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.connection_error(e)),
        }
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<SearchResult, ConfirmError> {
        let response = match self.client.search(&criteria.to_imap()).await {
            Ok(r) => r,
            Err(e) => return Err(self.connection_error(e)),
        };

        let status = if response.completion.is_ok() {
            SearchStatus::Ok
        } else {
            SearchStatus::Failed(format!(
                "{:?} {}",
                response.completion.status, response.completion.text
            ))
        };
        let ids = response
            .seqnums
            .iter()
            .map(|n| MessageId::new(n.to_string()))
            .collect();

        Ok(SearchResult { status, ids })
    }

    async fn fetch(&mut self, id: &MessageId) -> Result<RawMessage, ConfirmError> {
        let seqnum = Self::seqnum(id)?;
        let bytes = self
            .client
            .fetch_message(seqnum)
            .await
            .map_err(|e| ConfirmError::Fetch {
                message_id: id.to_string(),
                reason: e.to_string(),
            })?;
        debug!(message_id = %id, size = bytes.len(), "Fetched email");
        Ok(RawMessage {
            id: id.clone(),
            bytes,
        })
    }

    async fn mark_read(&mut self, id: &MessageId) -> Result<(), ConfirmError> {
        let seqnum = Self::seqnum(id)?;
        self.client
            .store_seen(seqnum)
            .await
            .map_err(|e| ConfirmError::Fetch {
                message_id: id.to_string(),
                reason: format!("failed to mark email as read: {e}"),
            })?;
        debug!(message_id = %id, "Marked email as read");
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!(server = %self.server, "Closing connection with IMAP server");
        if let Err(e) = self.client.logout().await {
            warn!(server = %self.server, error = %e, "IMAP logout error (ignored)");
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imap::tests::client_for;

    #[test]
    fn test_search_criteria_for_certificate() {
        let criteria = SearchCriteria::for_certificate(
            "Amazon Certificates",
            "12345678-1234-1234-1234-123456789012",
        );
        assert_eq!(
            criteria.to_imap(),
            "(UNSEEN FROM \"Amazon Certificates\" \
             BODY \"Certificate identifier: 12345678-1234-1234-1234-123456789012\")"
        );
    }

    #[test]
    fn test_message_id_display() {
        assert_eq!(MessageId::new("42").to_string(), "42");
    }

    #[tokio::test]
    async fn test_search_maps_ids_and_status() {
        let (client, _server) = client_for(Box::new(|tag, _| {
            format!("* SEARCH 4 9\r\n{tag} OK SEARCH completed\r\n")
        }))
        .await;
        let mut session = ImapMailbox::new(client, "imap.example.com");

        let criteria = SearchCriteria::for_certificate("Amazon Certificates", "abc");
        let result = session.search(&criteria).await.unwrap();
        assert_eq!(result.status, SearchStatus::Ok);
        assert_eq!(result.ids, vec![MessageId::new("4"), MessageId::new("9")]);
    }

    #[tokio::test]
    async fn test_search_rejected_is_failed_status() {
        let (client, _server) = client_for(Box::new(|tag, _| {
            format!("{tag} BAD Could not parse command\r\n")
        }))
        .await;
        let mut session = ImapMailbox::new(client, "imap.example.com");

        let criteria = SearchCriteria::for_certificate("Amazon Certificates", "abc");
        let result = session.search(&criteria).await.unwrap();
        assert!(matches!(result.status, SearchStatus::Failed(ref s) if s.contains("Bad")));
        assert!(result.ids.is_empty());
    }

    #[tokio::test]
    async fn test_select_failure_is_connection_error() {
        let (client, _server) = client_for(Box::new(|tag, _| {
            format!("{tag} NO Mailbox does not exist\r\n")
        }))
        .await;
        let mut session = ImapMailbox::new(client, "imap.example.com");

        let err = session.select_folder("Inbox").await.unwrap_err();
        assert!(
            matches!(err, ConfirmError::Connection { ref server, .. } if server == "imap.example.com")
        );
    }

    #[tokio::test]
    async fn test_fetch_and_mark_read_order() {
        let body = "Content-Type: text/plain\r\n\r\nhi\r\n";
        let (client, server) = client_for(Box::new(move |tag, cmd| {
            if cmd.starts_with("FETCH") {
                format!(
                    "* 2 FETCH (BODY[] {{{}}}\r\n{})\r\n{tag} OK done\r\n",
                    body.len(),
                    body
                )
            } else {
                format!("{tag} OK done\r\n")
            }
        }))
        .await;
        let mut session = ImapMailbox::new(client, "imap.example.com");

        let message = session.fetch_and_mark_read(&MessageId::new("2")).await.unwrap();
        assert_eq!(message.bytes, body.as_bytes());
        session.close().await;

        let commands = server.await.unwrap();
        assert_eq!(
            commands,
            vec!["FETCH 2 (BODY.PEEK[])", "STORE 2 +FLAGS (\\Seen)", "LOGOUT"]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fetch_error() {
        let (client, _server) = client_for(Box::new(|tag, _| {
            format!("{tag} NO Message expunged\r\n")
        }))
        .await;
        let mut session = ImapMailbox::new(client, "imap.example.com");

        let err = session.fetch(&MessageId::new("3")).await.unwrap_err();
        assert!(matches!(err, ConfirmError::Fetch { ref message_id, .. } if message_id == "3"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, server) = client_for(Box::new(|tag, _| {
            format!("* BYE logging out\r\n{tag} OK LOGOUT completed\r\n")
        }))
        .await;
        let mut session = ImapMailbox::new(client, "imap.example.com");

        session.close().await;
        session.close().await;

        let commands = server.await.unwrap();
        assert_eq!(commands, vec!["LOGOUT"]);
    }

    #[tokio::test]
    async fn test_connect_failure_names_server() {
        let connector = ImapConnector::new(1, false);
        let creds = MailboxCredentials::new("127.0.0.1", "user", "pass").unwrap();
        let err = connector.open(&creds).await.err().unwrap();
        assert!(err.to_string().contains("\"127.0.0.1\""));
        assert!(matches!(err, ConfirmError::Connection { .. }));
    }

    /// Accepts one connection, writes `reply` in plaintext, then hangs up.
    async fn plaintext_listener(reply: &'static [u8]) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = tokio::io::AsyncWriteExt::write_all(&mut socket, reply).await;
        });
        port
    }

    #[tokio::test]
    async fn test_tls_handshake_failure_is_connection_error() {
        let port = plaintext_listener(b"* OK IMAP4rev1 plaintext only\r\n").await;
        let creds = MailboxCredentials::new("127.0.0.1", "user", "pass").unwrap();

        let err = ImapConnector::new(port, true).open(&creds).await.err().unwrap();
        assert!(
            matches!(err, ConfirmError::Connection { ref server, .. } if server == "127.0.0.1")
        );
        assert!(err.to_string().contains("\"127.0.0.1\""));
    }

    #[tokio::test]
    async fn test_tls_peer_hangup_is_connection_error() {
        let port = plaintext_listener(b"").await;
        let creds = MailboxCredentials::new("127.0.0.1", "user", "pass").unwrap();

        let err = ImapConnector::new(port, true).open(&creds).await.err().unwrap();
        assert!(
            matches!(err, ConfirmError::Connection { ref server, .. } if server == "127.0.0.1")
        );
    }
}
