//! Syntax layer of the report decoder
//!
//! Turns the raw XML document into a small element tree. Two normalizations
//! happen here so the typed layer never has to care about them:
//!
//! - **Attributes are merged into children**: `<service type="5">` and
//!   `<service><type>5</type></service>` produce the same tree.
//! - **Leaf text is coerced**: text that parses as a finite number becomes a
//!   [`Scalar::Number`] (the raw text is kept), everything else stays text.
//!
//! Lookups by tag always see every matching child, so one `<service>` and
//! twenty `<service>` elements are handled by the same code path.
//!
//! Before any of that, [`transcode`] turns the raw bytes into text using the
//! byte order mark or the charset named in the XML declaration. Monit agents
//! declare `ISO-8859-1`.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::DecodeError;

/// A leaf value with numeric coercion applied
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Text that looked like a number
    Number { value: f64, raw: String },
    /// Anything else
    Text(String),
}

impl Scalar {
    /// Coerce raw leaf text
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Scalar::Number {
                value,
                raw: trimmed.to_string(),
            },
            _ => Scalar::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number { value, .. } => Some(*value),
            Scalar::Text(_) => None,
        }
    }

    /// The original text, whether or not it was numeric
    pub fn as_str(&self) -> &str {
        match self {
            Scalar::Number { raw, .. } => raw,
            Scalar::Text(text) => text,
        }
    }
}

/// One element of the parsed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub value: Option<Scalar>,
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            value: None,
            children: Vec::new(),
        }
    }

    fn leaf(name: String, raw: &str) -> Self {
        Self {
            name,
            value: Some(Scalar::coerce(raw)),
            children: Vec::new(),
        }
    }

    /// First child with the given tag
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every child with the given tag, in document order
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Walk a path of tags, taking the first match at each level
    pub fn find(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |element, name| element.child(name))
    }

    /// Non-empty text at `path`
    pub fn text_at(&self, path: &[&str]) -> Option<&str> {
        self.find(path)
            .and_then(|e| e.value.as_ref())
            .map(Scalar::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    /// Numeric value at `path`; `None` when absent or not numeric
    pub fn number_at(&self, path: &[&str]) -> Option<f64> {
        self.find(path)
            .and_then(|e| e.value.as_ref())
            .and_then(Scalar::as_f64)
    }

    /// Elements named `name` found directly below this element or below the
    /// plural wrapper `wrapper` (e.g. `<services><service/></services>`)
    pub fn collect<'a>(&'a self, wrapper: &'a str, name: &'a str) -> Vec<&'a Element> {
        let direct = self.children(name);
        let wrapped = self
            .children(wrapper)
            .flat_map(move |w| w.children(name));
        direct.chain(wrapped).collect()
    }
}

/// How far into the payload the XML declaration may end
const DECLARATION_WINDOW: usize = 256;

/// Decode the payload into text
///
/// A byte order mark wins over the declaration; without either the payload
/// is taken as UTF-8. Bytes that are invalid in the chosen charset are an
/// [`DecodeError::Encoding`] error, never replaced.
pub fn transcode(payload: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
    let (encoding, body) = match Encoding::for_bom(payload) {
        Some((encoding, bom_len)) => (encoding, &payload[bom_len..]),
        None => (declared_encoding(payload).unwrap_or(UTF_8), payload),
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or(DecodeError::Encoding)
}

/// Charset from `<?xml ... encoding="..."?>`, if it names one we can read
/// byte-wise
fn declared_encoding(payload: &[u8]) -> Option<&'static Encoding> {
    let head = &payload[..payload.len().min(DECLARATION_WINDOW)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let declaration = std::str::from_utf8(&head[..end]).ok()?;

    let (_, rest) = declaration.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = rest[1..].split(quote).next()?;

    // The declaration itself was readable as ASCII, so a UTF-16 label is a lie
    Encoding::for_label(label.trim().as_bytes()).filter(|e| e.is_ascii_compatible())
}

/// Parse a document into its root element
pub fn parse_document(payload: &str) -> Result<Element, DecodeError> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    // Open elements together with the text collected for them so far
    let mut stack: Vec<(Element, String)> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| DecodeError::Syntax {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                let element = open_element(&start, reader.buffer_position() as u64)?;
                if stack.is_empty() && root.is_some() {
                    return Err(DecodeError::MultipleRoots);
                }
                stack.push((element, String::new()));
            }
            Event::Empty(start) => {
                let element = open_element(&start, reader.buffer_position() as u64)?;
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(DecodeError::MultipleRoots),
                }
            }
            Event::End(_) => {
                let Some((mut element, text)) = stack.pop() else {
                    return Err(DecodeError::Syntax {
                        position: reader.buffer_position() as u64,
                        message: "unexpected closing tag".to_string(),
                    });
                };
                if !text.trim().is_empty() {
                    element.value = Some(Scalar::coerce(&text));
                }
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| DecodeError::Syntax {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })?;
                append_text(&mut stack, &text, reader.buffer_position() as u64)?;
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(|_| DecodeError::Encoding)?;
                append_text(&mut stack, text, reader.buffer_position() as u64)?;
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some((open, _)) = stack.last() {
        return Err(DecodeError::Syntax {
            position: payload.len() as u64,
            message: format!("unclosed element <{}>", open.name),
        });
    }

    root.ok_or(DecodeError::EmptyDocument)
}

fn open_element(start: &BytesStart<'_>, position: u64) -> Result<Element, DecodeError> {
    let name = utf8(start.local_name().as_ref())?.to_string();
    let mut element = Element::new(name);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DecodeError::Syntax {
            position,
            message: e.to_string(),
        })?;
        let key = utf8(attribute.key.local_name().as_ref())?.to_string();
        let value = attribute.unescape_value().map_err(|e| DecodeError::Syntax {
            position,
            message: e.to_string(),
        })?;
        element.children.push(Element::leaf(key, &value));
    }

    Ok(element)
}

fn append_text(
    stack: &mut [(Element, String)],
    text: &str,
    position: u64,
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some((_, buffer)) => {
            buffer.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(DecodeError::Syntax {
            position,
            message: "text outside of the root element".to_string(),
        }),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(bytes).map_err(|_| DecodeError::Encoding)
}
