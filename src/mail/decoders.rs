use anyhow::{Context, Result};
use base64::Engine as _;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::domain::message::MessagePart;
use crate::mail::clean::html_to_text;

/// Gmail sends base64url, sometimes padded and sometimes not.
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn decode_body_data(data: &str) -> Result<String> {
    let bytes = GMAIL_BASE64
        .decode(data.trim())
        .context("message body is not valid base64url")?;
    String::from_utf8(bytes).context("message body is not valid UTF-8")
}

/// Body text of a message payload.
///
/// A payload carrying its own data is a single-part message and is decoded
/// as is; otherwise the part tree is walked.
pub fn message_body(payload: &MessagePart) -> Result<String> {
    match payload.data() {
        Some(data) if payload.parts.is_empty() => decode_body_data(data),
        _ => extract_parts(&payload.parts),
    }
}

/// Concatenate the text leaves of a part tree, pre-order, first child first.
///
/// Containers contribute only their children. `text/plain` and `text/html`
/// leaves with data are decoded (HTML rendered to text) and each followed by
/// a newline; everything else is skipped.
pub fn extract_parts(parts: &[MessagePart]) -> Result<String> {
    let mut body = String::new();
    for part in parts {
        append_part(part, &mut body)?;
    }
    Ok(body)
}

fn append_part(part: &MessagePart, body: &mut String) -> Result<()> {
    if !part.parts.is_empty() {
        for child in &part.parts {
            append_part(child, body)?;
        }
        return Ok(());
    }

    let Some(data) = part.data() else {
        return Ok(());
    };

    let text = match part.mime_type.to_ascii_lowercase().as_str() {
        "text/plain" => decode_body_data(data)?,
        "text/html" => html_to_text(&decode_body_data(data)?)?,
        _ => return Ok(()),
    };
    body.push_str(&text);
    body.push('\n');
    Ok(())
}
