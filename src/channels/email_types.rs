//! Email helpers: HTML stripping, address extraction, raw MIME parsing.

use chrono::{DateTime, Utc};
use mail_parser::{HeaderValue, MessageParser};

/// Fields recovered from a raw RFC 822 message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEmail {
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub to_address: Option<String>,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    /// `Message-ID` header.
    pub message_id: Option<String>,
    /// First `References` entry, else `In-Reply-To`.
    pub thread_id: Option<String>,
    pub has_attachments: bool,
}

/// Parse a raw message source. Returns `None` if nothing parseable is found.
pub fn parse_raw(source: &str) -> Option<RawEmail> {
    let parsed = MessageParser::default().parse(source.as_bytes())?;

    let sender = parsed.from().and_then(|addr| addr.first());
    let from_address = sender
        .and_then(|a| a.address())
        .map(str::to_string);

    // Headerless input parses as a body-only message; treat as garbage.
    if from_address.is_none() && parsed.subject().is_none() && parsed.message_id().is_none() {
        return None;
    }

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
        .map(|d| d.with_timezone(&Utc));

    let thread_id =
        first_text(parsed.references()).or_else(|| first_text(parsed.in_reply_to()));

    Some(RawEmail {
        from_address,
        from_name: sender.and_then(|a| a.name()).map(str::to_string),
        to_address: extract_addresses(parsed.to()).into_iter().next(),
        subject: parsed.subject().map(str::to_string),
        text_body: parsed.body_text(0).map(|t| t.trim().to_string()),
        html_body: parsed.body_html(0).map(|h| h.to_string()),
        received_at,
        message_id: parsed.message_id().map(str::to_string),
        thread_id,
        has_attachments: parsed.attachment_count() > 0,
    })
}

fn first_text(value: &HeaderValue) -> Option<String> {
    value
        .as_text()
        .map(str::to_string)
        .or_else(|| {
            value
                .as_text_list()
                .and_then(|list| list.first())
                .map(|s| s.to_string())
        })
        .filter(|s| !s.trim().is_empty())
}

/// Strip HTML tags from content (basic).
///
/// Tag boundaries become whitespace, common entities are decoded, and
/// whitespace is normalized.
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                result.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract email addresses from an optional mail_parser Address field.
///
/// Returns an empty vec if the address is None.
pub fn extract_addresses(addr: Option<&mail_parser::Address>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        mail_parser::Address::List(addrs) => addrs
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    }
}
