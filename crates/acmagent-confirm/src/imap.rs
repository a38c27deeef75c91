//! Minimal async IMAP client (raw TCP + TLS).
//!
//! Supports only the commands the confirmation workflow needs:
//! LOGIN, SELECT, SEARCH, FETCH, STORE, LOGOUT.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// Async read+write stream marker.
pub(crate) trait ImapStream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}
impl<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send> ImapStream for T {}

/// Result code of a tagged completion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

/// Tagged completion line, e.g. `A0003 NO [TRYCREATE] Mailbox doesn't exist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: Status,
    pub text: String,
}

impl Completion {
    fn parse(tag: &str, line: &str) -> anyhow::Result<Self> {
        let rest = line
            .strip_prefix(tag)
            .ok_or_else(|| anyhow::anyhow!("unexpected completion line: {}", line))?
            .trim_start();
        let (code, text) = rest.split_once(' ').unwrap_or((rest, ""));
        let status = match code.to_ascii_uppercase().as_str() {
            "OK" => Status::Ok,
            "NO" => Status::No,
            "BAD" => Status::Bad,
            other => anyhow::bail!("unknown completion status '{}'", other),
        };
        Ok(Self {
            status,
            text: text.to_string(),
        })
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Fail unless the server answered OK.
    fn ensure_ok(self, command: &str) -> anyhow::Result<Self> {
        if !self.is_ok() {
            anyhow::bail!("IMAP {} failed: {:?} {}", command, self.status, self.text);
        }
        Ok(self)
    }
}

/// SEARCH answer: completion plus any sequence numbers the server listed.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub completion: Completion,
    pub seqnums: Vec<u32>,
}

/// Quote a string as an IMAP quoted-string.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

pub struct ImapClient {
    reader: BufReader<tokio::io::ReadHalf<Box<dyn ImapStream>>>,
    writer: tokio::io::WriteHalf<Box<dyn ImapStream>>,
    tag_counter: u32,
}

impl ImapClient {
    /// Connect to an IMAP server (plain or IMAPS/TLS) and read the greeting.
    pub async fn connect(host: &str, port: u16, use_ssl: bool) -> anyhow::Result<Self> {
        let tcp = tokio::net::TcpStream::connect((host, port)).await?;

        let stream: Box<dyn ImapStream> = if use_ssl {
            let mut root_store = rustls::RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            // Pin the provider: reqwest and rustls can both compile one in.
            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let config = rustls::ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .map_err(|e| anyhow::anyhow!("TLS setup failed: {}", e))?
                .with_root_certificates(root_store)
                .with_no_client_auth();

            let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
            let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|e| anyhow::anyhow!("invalid server name '{}': {}", host, e))?;
            Box::new(connector.connect(server_name, tcp).await?)
        } else {
            Box::new(tcp)
        };

        Self::from_stream(stream).await
    }

    /// Wrap an already-connected stream and consume the server greeting.
    pub(crate) async fn from_stream(stream: Box<dyn ImapStream>) -> anyhow::Result<Self> {
        let (read, write) = tokio::io::split(stream);
        let mut client = Self {
            reader: BufReader::new(read),
            writer: write,
            tag_counter: 0,
        };

        let greeting = client.read_line().await?;
        if !greeting.to_ascii_uppercase().starts_with("* OK") {
            anyhow::bail!("unexpected IMAP greeting: {}", greeting);
        }
        debug!(greeting = %greeting, "IMAP connected");

        Ok(client)
    }

    async fn read_line(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            anyhow::bail!("IMAP connection closed unexpectedly");
        }
        Ok(line
            .trim_end_matches("\r\n")
            .trim_end_matches('\n')
            .to_string())
    }

    async fn read_exact(&mut self, n: usize) -> anyhow::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Send a tagged IMAP command. Returns the tag.
    async fn send_command(&mut self, cmd: &str) -> anyhow::Result<String> {
        self.tag_counter += 1;
        let tag = format!("A{:04}", self.tag_counter);
        let line = format!("{} {}\r\n", tag, cmd);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(tag)
    }

    /// Read responses until the tagged completion line.
    async fn read_response(&mut self, tag: &str) -> anyhow::Result<(Vec<String>, Completion)> {
        let mut untagged = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.starts_with(tag) {
                return Ok((untagged, Completion::parse(tag, &line)?));
            }
            untagged.push(line);
        }
    }

    pub async fn login(&mut self, user: &str, pass: &str) -> anyhow::Result<()> {
        let cmd = format!("LOGIN {} {}", quote(user), quote(pass));
        let tag = self.send_command(&cmd).await?;
        let (_, completion) = self.read_response(&tag).await?;
        completion.ensure_ok("LOGIN")?;
        Ok(())
    }

    pub async fn select(&mut self, mailbox: &str) -> anyhow::Result<()> {
        let tag = self.send_command(&format!("SELECT {}", quote(mailbox))).await?;
        let (_, completion) = self.read_response(&tag).await?;
        completion.ensure_ok("SELECT")?;
        Ok(())
    }

    /// SEARCH with a pre-built criteria string. A NO/BAD answer is returned,
    /// not raised, so the caller can tell it apart from an empty result.
    pub async fn search(&mut self, criteria: &str) -> anyhow::Result<SearchResponse> {
        let tag = self.send_command(&format!("SEARCH {}", criteria)).await?;
        let (lines, completion) = self.read_response(&tag).await?;

        let seqnums = lines
            .iter()
            .filter(|line| line.to_ascii_uppercase().starts_with("* SEARCH"))
            .flat_map(|line| {
                line.split_whitespace()
                    .skip(2) // skip "* SEARCH"
                    .filter_map(|s| s.parse::<u32>().ok())
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(SearchResponse {
            completion,
            seqnums,
        })
    }

    /// FETCH the full message without touching its flags.
    pub async fn fetch_message(&mut self, seqnum: u32) -> anyhow::Result<Vec<u8>> {
        let tag = self
            .send_command(&format!("FETCH {} (BODY.PEEK[])", seqnum))
            .await?;

        let mut email_data = None;

        loop {
            let line = self.read_line().await?;

            if line.starts_with(&tag) {
                Completion::parse(&tag, &line)?.ensure_ok("FETCH")?;
                break;
            }

            // Untagged FETCH response: * N FETCH (BODY[] {size}
            if line.starts_with("* ") && line.to_ascii_uppercase().contains("FETCH") {
                if let Some(size) = literal_size(&line) {
                    email_data = Some(self.read_exact(size).await?);
                    // Closing ")" after the literal
                    let _closing = self.read_line().await?;
                }
            }
        }

        email_data.ok_or_else(|| anyhow::anyhow!("FETCH {} returned no message body", seqnum))
    }

    /// STORE +FLAGS (\Seen)
    pub async fn store_seen(&mut self, seqnum: u32) -> anyhow::Result<()> {
        let cmd = format!("STORE {} +FLAGS (\\Seen)", seqnum);
        let tag = self.send_command(&cmd).await?;
        let (_, completion) = self.read_response(&tag).await?;
        completion.ensure_ok("STORE")?;
        Ok(())
    }

    pub async fn logout(&mut self) -> anyhow::Result<()> {
        let tag = self.send_command("LOGOUT").await?;
        // Server may send * BYE before the tagged OK
        self.read_response(&tag).await?;
        Ok(())
    }
}

/// Size of a trailing `{N}` literal marker.
fn literal_size(line: &str) -> Option<usize> {
    let start = line.rfind('{')?;
    let end = line.rfind('}')?;
    if end <= start {
        return None;
    }
    line[start + 1..end].parse().ok()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
