//! Encoder and decoder for XML-RPC documents.
//!
//! Decoding follows a lenient policy: struct members missing their name or
//! value are skipped, unknown scalar tags read as strings, and a `<value>`
//! without a type element is a string. Encoding walks the [`Value`] shape and
//! writes compact markup with a UTF-8 declaration.

use crate::error::ProtocolError;
use crate::message::{Fault, MethodResponse, Request, ResponseMode};
use crate::value::{Members, Scalar, ScalarKind, Value};
use crate::xml::Element;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;

/// Reads wire documents into requests and responses.
pub struct Decoder;

impl Decoder {
    /// Decodes a `methodCall` document.
    pub fn decode_request(input: &[u8]) -> Result<Request, ProtocolError> {
        let root = Element::parse(input)?;
        expect_root(&root, "methodCall")?;

        let method_name = root
            .child("methodName")
            .map(|name| name.text().trim())
            .filter(|name| !name.is_empty())
            .ok_or(ProtocolError::MissingMethodName)?;

        let params = match root.child("params") {
            Some(list) => list
                .children_named("param")
                .filter_map(|param| param.child("value"))
                .map(read_value)
                .collect(),
            None => Vec::new(),
        };

        Ok(Request {
            method_name: method_name.to_string(),
            params,
        })
    }

    /// Decodes a response in either envelope, including fault responses.
    pub fn decode_response(input: &[u8]) -> Result<MethodResponse, ProtocolError> {
        let root = Element::parse(input)?;
        match root.name() {
            "methodResponse" => {
                if let Some(fault) = root.child("fault") {
                    let value = fault
                        .child("value")
                        .ok_or(ProtocolError::MissingElement("value"))?;
                    return read_fault(&read_value(value)).map(MethodResponse::Fault);
                }
                let value = root
                    .child("params")
                    .and_then(|params| params.child("param"))
                    .and_then(|param| param.child("value"));
                match value {
                    Some(value) if value.children().is_empty() && value.text().is_empty() => {
                        Ok(MethodResponse::Success(None))
                    }
                    Some(value) => Ok(MethodResponse::Success(Some(read_value(value)))),
                    None => Ok(MethodResponse::Success(None)),
                }
            }
            "response" => match root.first_child() {
                Some(typed) => {
                    let value = read_typed(typed);
                    match read_fault(&value) {
                        Ok(fault) => Ok(MethodResponse::Fault(fault)),
                        Err(_) => Ok(MethodResponse::Success(Some(value))),
                    }
                }
                None => Ok(MethodResponse::Success(None)),
            },
            other => Err(ProtocolError::UnexpectedElement {
                expected: "methodResponse",
                found: other.to_string(),
            }),
        }
    }
}

fn expect_root(root: &Element, expected: &'static str) -> Result<(), ProtocolError> {
    if root.name() == expected {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedElement {
            expected,
            found: root.name().to_string(),
        })
    }
}

/// Reads the contents of a `<value>` element.
fn read_value(value: &Element) -> Value {
    match value.first_child() {
        Some(typed) => read_typed(typed),
        None => Value::Scalar(Scalar::string(value.text())),
    }
}

/// Reads a kind-tagged element: `array`, `struct`, or a scalar tag.
fn read_typed(element: &Element) -> Value {
    match element.name() {
        "array" => Value::Array(
            element
                .child("data")
                .map(|data| data.children_named("value").map(read_value).collect())
                .unwrap_or_default(),
        ),
        "struct" => Value::Struct(read_members(element)),
        tag => Value::Scalar(Scalar::new(ScalarKind::from_tag(tag), element.text())),
    }
}

fn read_members(element: &Element) -> Members {
    let mut members = Members::new();
    for member in element.children_named("member") {
        let (Some(name), Some(value)) = (member.child("name"), member.child("value")) else {
            continue;
        };
        members.insert(name.text().trim(), read_value(value));
    }
    members
}

fn read_fault(value: &Value) -> Result<Fault, ProtocolError> {
    let members = value
        .as_struct()
        .filter(|m| m.len() == 2)
        .ok_or(ProtocolError::MissingElement("struct"))?;
    let code = members
        .get("faultCode")
        .and_then(Value::as_scalar)
        .ok_or(ProtocolError::MissingElement("faultCode"))?
        .as_i32()?;
    let message = members
        .get("faultString")
        .and_then(Value::as_scalar)
        .ok_or(ProtocolError::MissingElement("faultString"))?;
    Ok(Fault::new(code, message.as_str()))
}

/// Writes requests and responses as wire documents.
pub struct Encoder;

impl Encoder {
    /// Encodes a successful result. `None` writes an empty value.
    pub fn encode_response(
        value: Option<&Value>,
        mode: ResponseMode,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut w = DocumentWriter::new()?;
        match mode {
            ResponseMode::Wrapped => {
                w.start("methodResponse")?;
                w.start("params")?;
                w.start("param")?;
                w.start("value")?;
                if let Some(value) = value {
                    w.value(value)?;
                }
                w.end("value")?;
                w.end("param")?;
                w.end("params")?;
                w.end("methodResponse")?;
            }
            ResponseMode::Bare => {
                w.start("response")?;
                if let Some(value) = value {
                    w.value(value)?;
                }
                w.end("response")?;
            }
        }
        Ok(w.finish())
    }

    /// Encodes a fault.
    ///
    /// Wrapped mode uses the standard `methodResponse/fault` envelope; bare
    /// mode places the fault struct directly under `<response>`.
    pub fn encode_fault(fault: &Fault, mode: ResponseMode) -> Result<Vec<u8>, ProtocolError> {
        let value = fault.to_value();
        let mut w = DocumentWriter::new()?;
        match mode {
            ResponseMode::Wrapped => {
                w.start("methodResponse")?;
                w.start("fault")?;
                w.start("value")?;
                w.value(&value)?;
                w.end("value")?;
                w.end("fault")?;
                w.end("methodResponse")?;
            }
            ResponseMode::Bare => {
                w.start("response")?;
                w.value(&value)?;
                w.end("response")?;
            }
        }
        Ok(w.finish())
    }

    /// Encodes a `methodCall` document.
    pub fn encode_call(request: &Request) -> Result<Vec<u8>, ProtocolError> {
        let mut w = DocumentWriter::new()?;
        w.start("methodCall")?;
        w.leaf("methodName", &request.method_name)?;
        w.start("params")?;
        for param in &request.params {
            w.start("param")?;
            w.start("value")?;
            w.value(param)?;
            w.end("value")?;
            w.end("param")?;
        }
        w.end("params")?;
        w.end("methodCall")?;
        Ok(w.finish())
    }
}

struct DocumentWriter {
    inner: Writer<Vec<u8>>,
}

impl DocumentWriter {
    fn new() -> Result<Self, ProtocolError> {
        let mut inner = Writer::new(Vec::with_capacity(512));
        inner.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(Self { inner })
    }

    fn start(&mut self, tag: &str) -> Result<(), ProtocolError> {
        self.inner.write_event(Event::Start(BytesStart::new(tag)))?;
        Ok(())
    }

    fn end(&mut self, tag: &str) -> Result<(), ProtocolError> {
        self.inner.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn leaf(&mut self, tag: &str, text: &str) -> Result<(), ProtocolError> {
        self.start(tag)?;
        if !text.is_empty() {
            let text = xml_text(text);
            self.inner.write_event(Event::Text(BytesText::new(&text)))?;
        }
        self.end(tag)
    }

    fn value(&mut self, value: &Value) -> Result<(), ProtocolError> {
        match value {
            Value::Scalar(scalar) if scalar.kind() == ScalarKind::Double => {
                if !scalar.as_f64().is_ok_and(f64::is_finite) {
                    return Err(ProtocolError::NonFiniteDouble(scalar.text().to_string()));
                }
                self.leaf(scalar.kind().tag(), scalar.text())
            }
            Value::Scalar(scalar) => self.leaf(scalar.kind().tag(), scalar.text()),
            Value::Array(items) => {
                self.start("array")?;
                self.start("data")?;
                for item in items {
                    self.start("value")?;
                    self.value(item)?;
                    self.end("value")?;
                }
                self.end("data")?;
                self.end("array")
            }
            Value::Struct(members) => {
                self.start("struct")?;
                for (name, member) in members.iter() {
                    self.start("member")?;
                    self.leaf("name", name)?;
                    self.start("value")?;
                    self.value(member)?;
                    self.end("value")?;
                    self.end("member")?;
                }
                self.end("struct")
            }
        }
    }

    fn finish(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

/// Replaces characters that XML 1.0 does not allow in documents with U+FFFD.
fn xml_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if is_xml_char(c) { c } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}
