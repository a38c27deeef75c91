//! HTML body extraction and confirmation link lookup.

use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ConfirmError;
use crate::mailbox::RawMessage;

/// Decoded HTML body of a message.
///
/// Multi-part: the first `text/html` part found depth-first, attachments
/// skipped. Single-part: the body itself when it is `text/html`.
pub fn extract_html_body(message: &RawMessage) -> Result<String, ConfirmError> {
    let unsupported = || ConfirmError::UnsupportedContentType {
        message_id: message.id.to_string(),
    };

    let parsed = mailparse::parse_mail(&message.bytes).map_err(|_| unsupported())?;
    debug!(
        message_id = %message.id,
        subject = %parsed.headers.get_first_value("Subject").unwrap_or_default(),
        "Opening email"
    );

    let part = if parsed.subparts.is_empty() {
        Some(&parsed).filter(|p| is_html(p))
    } else {
        find_html_part(&parsed)
    };

    let body = part
        .and_then(|p| p.get_body().ok())
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(unsupported)?;

    debug!(message_id = %message.id, "Reading email HTML body");
    Ok(body)
}

fn is_html(part: &ParsedMail<'_>) -> bool {
    part.ctype.mimetype.eq_ignore_ascii_case("text/html")
}

fn find_html_part<'a>(mail: &'a ParsedMail<'a>) -> Option<&'a ParsedMail<'a>> {
    for part in &mail.subparts {
        if part.get_content_disposition().disposition == DispositionType::Attachment {
            continue;
        }
        if !part.subparts.is_empty() {
            if let Some(found) = find_html_part(part) {
                return Some(found);
            }
        } else if is_html(part) {
            return Some(part);
        }
    }
    None
}

/// `href` of the `<a>` element whose id is `anchor_id`.
pub fn extract_confirmation_link(html: &str, anchor_id: &str) -> Result<String, ConfirmError> {
    let missing = || ConfirmError::MissingConfirmationLink {
        anchor_id: anchor_id.to_string(),
    };

    let selector = Selector::parse(&format!("a[id=\"{}\"]", anchor_id)).map_err(|_| missing())?;
    let document = Html::parse_document(html);

    let href = document
        .select(&selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or_else(missing)?;

    debug!(url = %href, "Found confirmation url");
    Ok(href.to_string())
}
