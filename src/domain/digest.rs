/// One newsletter in a day's digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// The day's collected newsletter text for one identity.
#[derive(Debug, Clone)]
pub struct Digest {
    pub entries: Vec<DigestEntry>,
    pub text: String,
}

impl Digest {
    pub fn new(entries: Vec<DigestEntry>) -> Self {
        let text = render_text(&entries);
        Self { entries, text }
    }
}

/// `NEWSLETTER n` marker line followed by the body, entries back to back.
pub fn render_text(entries: &[DigestEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!("NEWSLETTER {}\n", i + 1));
        out.push_str(&entry.body);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(body: &str) -> DigestEntry {
        DigestEntry {
            subject: "s".into(),
            sender: "f".into(),
            body: body.into(),
        }
    }

    #[test]
    fn renders_numbered_markers_without_separator() {
        let text = render_text(&[entry("first"), entry("second")]);
        assert_eq!(text, "NEWSLETTER 1\nfirstNEWSLETTER 2\nsecond");
    }

    #[test]
    fn empty_digest_renders_nothing() {
        assert_eq!(Digest::new(vec![]).text, "");
    }
}
