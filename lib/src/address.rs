//! Address normalization for outgoing header fields.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Characters that force a display name to be quoted
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// Normalize an address for inclusion in a header field.
///
/// Non-ASCII display names and local parts are written as RFC 2047
/// encoded-words in `encoding`, non-ASCII domains are IDNA encoded.
/// The result never contains CR or LF.
pub fn sanitize_address(addr: &str, encoding: &str) -> String {
    let sanitized = match parse(addr) {
        Some((name, address)) => {
            let address = encode_address(&address, encoding);

            match name {
                Some(name) if !name.is_empty() => {
                    format!("{} <{}>", encode_display_name(&name, encoding), address)
                }
                _ => address,
            }
        }
        None => addr.trim().to_string(),
    };

    sanitized.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Split `addr` into display name and address, if it holds exactly one mailbox
fn parse(addr: &str) -> Option<(Option<String>, String)> {
    let info = mailparse::addrparse(addr).ok()?.extract_single_info()?;

    if info.addr.is_empty() {
        return None;
    }

    Some((info.display_name, info.addr))
}

fn encode_address(address: &str, encoding: &str) -> String {
    if address.is_ascii() {
        return address.to_string();
    }

    match address.split_once('@') {
        Some((local, domain)) => {
            let local = if local.is_ascii() {
                local.to_string()
            } else {
                encoded_word(local, encoding)
            };
            let domain = idna::domain_to_ascii(domain).unwrap_or_else(|_| {
                log::warn!("Could not IDNA encode domain {}", domain);
                domain.to_string()
            });

            format!("{}@{}", local, domain)
        }
        None => encoded_word(address, encoding),
    }
}

fn encode_display_name(name: &str, encoding: &str) -> String {
    if !name.is_ascii() {
        return encoded_word(name, encoding);
    }

    if name.contains(SPECIALS) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        name.to_string()
    }
}

/// Longest encoded-word allowed in a header line (RFC 2047 section 2)
const MAX_ENCODED_WORD: usize = 75;

/// Labels the WHATWG registry folds into windows-1252 but which name
/// plain 7-bit ASCII
const ASCII_LABELS: &[&str] = &[
    "ansi_x3.4-1968",
    "ascii",
    "cp367",
    "csascii",
    "ibm367",
    "iso-ir-6",
    "iso646-us",
    "iso_646.irv:1991",
    "us",
    "us-ascii",
];

const WINDOWS_1252_LABELS: &[&str] = &["windows-1252", "cp1252", "x-cp1252"];

/// Charset of an encoded-word, together with the label written into it
enum Charset {
    Utf8,
    /// ISO-8859-1 proper, without the windows-1252 C1 replacements
    Latin1,
    Other(&'static Encoding),
}

impl Charset {
    fn for_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();

        if ASCII_LABELS.contains(&label.as_str()) {
            return Charset::Utf8;
        }

        match Encoding::for_label(label.as_bytes()) {
            None => Charset::Utf8,
            Some(enc) if enc == UTF_8 => Charset::Utf8,
            Some(enc) if enc == WINDOWS_1252 && !WINDOWS_1252_LABELS.contains(&label.as_str()) => {
                Charset::Latin1
            }
            Some(enc) => Charset::Other(enc),
        }
    }

    fn name(&self) -> &'static str {
        match *self {
            Charset::Utf8 => "utf-8",
            Charset::Latin1 => "iso-8859-1",
            Charset::Other(enc) => enc.name(),
        }
    }

    /// Bytes of `text` in this charset, or `None` if it cannot represent them
    fn encode(&self, text: &str) -> Option<Vec<u8>> {
        match *self {
            Charset::Utf8 => Some(text.as_bytes().to_vec()),
            Charset::Latin1 => text
                .chars()
                .map(|c| match c as u32 {
                    0x80..=0x9f => None,
                    n if n <= 0xff => Some(n as u8),
                    _ => None,
                })
                .collect(),
            Charset::Other(enc) => {
                let (bytes, used, unmappable) = enc.encode(text);

                if unmappable || used != enc {
                    None
                } else {
                    Some(bytes.into_owned())
                }
            }
        }
    }
}

/// RFC 2047 `B` encoding of `text` in `encoding`.
///
/// Falls back to UTF-8 when the charset is unknown or cannot represent the
/// text. Long text is split over several space separated encoded-words, none
/// longer than 75 characters.
fn encoded_word(text: &str, encoding: &str) -> String {
    let charset = match Charset::for_label(encoding) {
        charset if charset.encode(text).is_some() => charset,
        _ => Charset::Utf8,
    };

    // `=?` charset `?b?` ... `?=`
    let overhead = charset.name().len() + 7;
    let max_bytes = (MAX_ENCODED_WORD.saturating_sub(overhead) / 4 * 3).max(3);

    let word = |chunk: &str| {
        let bytes = charset.encode(chunk).unwrap_or_default();
        format!("=?{}?b?{}?=", charset.name(), STANDARD.encode(&bytes))
    };

    let mut words = Vec::new();
    let mut chunk = String::new();

    for c in text.chars() {
        chunk.push(c);

        let len = charset.encode(&chunk).map_or(0, |bytes| bytes.len());
        if len > max_bytes && chunk.chars().count() > 1 {
            chunk.pop();
            words.push(word(&chunk));
            chunk.clear();
            chunk.push(c);
        }
    }

    if !chunk.is_empty() {
        words.push(word(&chunk));
    }

    words.join(" ")
}
