//! Low-level PyON framing.
//!
//! A framed message looks like this on the wire, with either CRLF or bare LF
//! line terminators:
//!
//! ```text
//! PyON 1 <message-type>
//! <payload>
//! ---
//! ```
//!
//! [`PyonFramer::extract`] pulls at most one complete message off the front
//! of an accumulation buffer. It never performs I/O and never fails: an
//! incomplete buffer simply yields `None` and is left untouched.

use crate::message::{Message, MessageIdentifier};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

/// Header token that opens every message.
pub const HEADER: &[u8] = b"PyON 1 ";

const CRLF: &[u8] = b"\r\n";
const LF: &[u8] = b"\n";
const FOOTER_MARK: &[u8] = b"\n---";

/// PyON literals and their JSON spellings, as they appear after a key.
const LITERALS: [(&str, &str); 3] = [(": None", ": null"), (": True", ": true"), (": False", ": false")];

/// Which span of a framed message becomes [`Message::text`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMode {
    /// The whole framed block, header through footer, verbatim.
    Canonical,
    /// Only the body, with PyON literals rewritten to JSON.
    #[default]
    Converted,
}

/// Line terminator convention used when building frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    CrLf,
    Lf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::CrLf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

/// Byte offsets of one complete message inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameBounds {
    header_start: usize,
    type_start: usize,
    type_end: usize,
    body_start: usize,
    footer_start: usize,
    footer_end: usize,
}

/// Stateless PyON message extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PyonFramer {
    mode: PayloadMode,
}

impl PyonFramer {
    /// Create a framer producing payloads in the given mode.
    pub fn new(mode: PayloadMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PayloadMode {
        self.mode
    }

    /// Extract one complete message from the front of `buffer`.
    ///
    /// On success everything up to and including the footer is removed from
    /// `buffer`, including any bytes that preceded the header (the daemon's
    /// greeting banner and prompts). Returns `None`, leaving `buffer`
    /// byte-identical, when no complete message is present yet.
    pub fn extract(&self, buffer: &mut BytesMut) -> Option<Message> {
        let bounds = locate_frame(buffer)?;

        let message_type =
            String::from_utf8_lossy(&buffer[bounds.type_start..bounds.type_end]).into_owned();
        let text = match self.mode {
            PayloadMode::Canonical => {
                String::from_utf8_lossy(&buffer[bounds.header_start..bounds.footer_end]).into_owned()
            }
            PayloadMode::Converted => {
                // An empty body shares its line terminator with the footer.
                let body_start = bounds.body_start.min(bounds.footer_start);
                convert_literals(&String::from_utf8_lossy(
                    &buffer[body_start..bounds.footer_start],
                ))
            }
        };

        buffer.advance(bounds.footer_end);
        tracing::trace!(
            message_type = %message_type,
            consumed = bounds.footer_end,
            remaining = buffer.len(),
            "Extracted PyON message"
        );

        Some(Message::new(MessageIdentifier::now(message_type), text))
    }
}

/// Extract one message from `buffer` with a throwaway framer.
pub fn extract(buffer: &mut BytesMut, mode: PayloadMode) -> Option<Message> {
    PyonFramer::new(mode).extract(buffer)
}

/// Build a framed message, as the daemon would send it.
pub fn frame_message(message_type: &str, body: &str, ending: LineEnding) -> Vec<u8> {
    let eol = ending.as_str();
    format!("PyON 1 {message_type}{eol}{body}{eol}---{eol}").into_bytes()
}

/// Rewrite `": None"`, `": True"` and `": False"` to their JSON spellings.
///
/// Occurrences inside single- or double-quoted string literals are left
/// alone; outside strings the result matches plain substring replacement
/// byte for byte.
pub fn convert_literals(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    // Quote that opened the string literal being scanned.
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == open {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' => quote = Some(b),
            b':' => {
                let rest = &bytes[i..];
                if let Some((from, to)) = LITERALS
                    .iter()
                    .find(|(from, _)| rest.starts_with(from.as_bytes()))
                {
                    out.push_str(&text[copied..i]);
                    out.push_str(to);
                    i += from.len();
                    copied = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    out.push_str(&text[copied..]);
    out
}

/// Find the bounds of the first complete message in `buf`.
fn locate_frame(buf: &[u8]) -> Option<FrameBounds> {
    let header_start = find(buf, HEADER, 0)?;
    let type_start = header_start + HEADER.len();
    let (type_end, terminator_len) = find_line_end(buf, type_start)?;
    let (footer_start, footer_len) = find_footer(buf, type_end)?;

    Some(FrameBounds {
        header_start,
        type_start,
        type_end,
        body_start: type_end + terminator_len,
        footer_start,
        footer_end: footer_start + footer_len,
    })
}

/// Position and length of the first line terminator at or after `from`.
/// A CR directly before the LF makes it a CRLF terminator.
fn find_line_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let lf = find(buf, LF, from)?;
    if lf > from && buf[lf - 1] == b'\r' {
        Some((lf - 1, CRLF.len()))
    } else {
        Some((lf, LF.len()))
    }
}

/// Position and length of the first `<eol>---<eol>` footer at or after
/// `from`. At each candidate the CRLF form is tried before the LF form.
fn find_footer(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut pos = from;
    while let Some(mark) = find(buf, FOOTER_MARK, pos) {
        let after = &buf[mark + FOOTER_MARK.len()..];
        if mark > from && buf[mark - 1] == b'\r' && after.starts_with(CRLF) {
            return Some((mark - 1, CRLF.len() + 3 + CRLF.len()));
        }
        if after.starts_with(LF) {
            return Some((mark, LF.len() + 3 + LF.len()));
        }
        pos = mark + 1;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
