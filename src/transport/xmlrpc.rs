//! SD-011: XML-RPC wire codec.
//!
//! Encodes `methodCall` documents from JSON values and decodes
//! `methodResponse` documents (params or fault) back into JSON values.
//! Only the subset of XML the protocol uses is understood: elements,
//! text, the five named entities and numeric character references.

use super::RpcError;
use base64::Engine;
use serde_json::{Map, Number, Value};

// ============================================================================
// Encoding
// ============================================================================

/// Encode a method call.
pub fn encode_call(method: &str, params: &[Value]) -> Result<String, RpcError> {
    let valid_name = !method.is_empty()
        && method
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '/'));
    if !valid_name {
        return Err(RpcError::Encode(format!("invalid method name '{}'", method)));
    }

    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>");
    out.push_str(&format!("<methodName>{}</methodName><params>", method));
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    Ok(out)
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => out.push_str(&format!("<int>{}</int>", i)),
            Some(i) => out.push_str(&format!("<i8>{}</i8>", i)),
            None => out.push_str(&format!("<double>{}</double>", n)),
        },
        Value::String(s) => out.push_str(&format!("<string>{}</string>", escape(s))),
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str(&format!("<member><name>{}</name>", escape(name)));
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// Decoding
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

/// Decode a method response into its single return value.
pub fn decode_response(xml: &str) -> Result<Value, RpcError> {
    let tokens = tokenize(xml)?;
    let mut p = Parser { tokens, pos: 0 };
    p.expect_open("methodResponse")?;
    match p.next_tag()? {
        Token::Open(name) if name == "params" => {
            p.expect_open("param")?;
            let value = p.value()?;
            p.expect_close("param")?;
            p.expect_close("params")?;
            p.expect_close("methodResponse")?;
            Ok(value)
        }
        Token::Open(name) if name == "fault" => {
            let fault = p.value()?;
            Err(fault_error(&fault))
        }
        other => Err(decode_err(format!("unexpected {:?} in methodResponse", other))),
    }
}

fn fault_error(fault: &Value) -> RpcError {
    let code = fault.get("faultCode").and_then(Value::as_i64).unwrap_or(0);
    let message = match fault.get("faultString") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unknown fault".to_string(),
    };
    RpcError::Fault { code, message }
}

fn decode_err(msg: impl Into<String>) -> RpcError {
    RpcError::Decode(msg.into())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Result<Token, RpcError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| decode_err("unexpected end of document"))?;
        self.pos += 1;
        Ok(tok)
    }

    /// Next token that is not whitespace-only text.
    fn next_tag(&mut self) -> Result<Token, RpcError> {
        loop {
            match self.next()? {
                Token::Text(t) if t.trim().is_empty() => continue,
                tok => return Ok(tok),
            }
        }
    }

    fn expect_open(&mut self, name: &str) -> Result<(), RpcError> {
        match self.next_tag()? {
            Token::Open(n) if n == name => Ok(()),
            other => Err(decode_err(format!("expected <{}>, got {:?}", name, other))),
        }
    }

    fn expect_close(&mut self, name: &str) -> Result<(), RpcError> {
        match self.next_tag()? {
            Token::Close(n) if n == name => Ok(()),
            other => Err(decode_err(format!("expected </{}>, got {:?}", name, other))),
        }
    }

    /// Text content up to the closing tag `name`; empty when there is none.
    fn text_until(&mut self, name: &str) -> Result<String, RpcError> {
        match self.next()? {
            Token::Text(t) => {
                self.expect_close(name)?;
                Ok(t)
            }
            Token::Close(n) if n == name => Ok(String::new()),
            other => Err(decode_err(format!("expected text in <{}>, got {:?}", name, other))),
        }
    }

    /// Parse `<value>…</value>`.
    fn value(&mut self) -> Result<Value, RpcError> {
        self.expect_open("value")?;
        let value = match self.next()? {
            Token::Close(n) if n == "value" => return Ok(Value::String(String::new())),
            Token::Text(t) => match self.next()? {
                Token::Close(n) if n == "value" => return Ok(Value::String(t)),
                Token::Open(tag) if t.trim().is_empty() => self.typed(&tag)?,
                Token::Empty(tag) if t.trim().is_empty() => empty_typed(&tag)?,
                other => return Err(decode_err(format!("unexpected {:?} in <value>", other))),
            },
            Token::Open(tag) => self.typed(&tag)?,
            Token::Empty(tag) => empty_typed(&tag)?,
            Token::Close(other) => {
                return Err(decode_err(format!("unexpected </{}> in <value>", other)))
            }
        };
        self.expect_close("value")?;
        Ok(value)
    }

    fn typed(&mut self, tag: &str) -> Result<Value, RpcError> {
        match tag {
            "string" | "dateTime.iso8601" => Ok(Value::String(self.text_until(tag)?)),
            "int" | "i4" | "i8" => {
                let text = self.text_until(tag)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| decode_err(format!("bad integer '{}'", text)))
            }
            "double" => {
                let text = self.text_until(tag)?;
                text.trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| decode_err(format!("bad double '{}'", text)))
            }
            "boolean" => match self.text_until(tag)?.trim() {
                "1" => Ok(Value::Bool(true)),
                "0" => Ok(Value::Bool(false)),
                other => Err(decode_err(format!("bad boolean '{}'", other))),
            },
            "base64" => {
                let text = self.text_until(tag)?;
                let compact: String = text.split_whitespace().collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                    .map_err(|e| decode_err(format!("bad base64: {}", e)))
            }
            "nil" => {
                self.expect_close("nil")?;
                Ok(Value::Null)
            }
            "array" => self.array(),
            "struct" => self.structure(),
            other => Err(decode_err(format!("unknown value type <{}>", other))),
        }
    }

    fn array(&mut self) -> Result<Value, RpcError> {
        let mut items = Vec::new();
        match self.next_tag()? {
            Token::Empty(n) if n == "data" => {}
            Token::Open(n) if n == "data" => loop {
                if matches!(self.peek_tag(), Some(Token::Close(n)) if n == "data") {
                    self.next_tag()?;
                    break;
                }
                items.push(self.value()?);
            },
            other => return Err(decode_err(format!("expected <data>, got {:?}", other))),
        }
        self.expect_close("array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self) -> Result<Value, RpcError> {
        let mut members = Map::new();
        loop {
            match self.next_tag()? {
                Token::Close(n) if n == "struct" => break,
                Token::Open(n) if n == "member" => {
                    self.expect_open("name")?;
                    let name = self.text_until("name")?;
                    let value = self.value()?;
                    self.expect_close("member")?;
                    members.insert(name, value);
                }
                other => return Err(decode_err(format!("unexpected {:?} in <struct>", other))),
            }
        }
        Ok(Value::Object(members))
    }

    fn peek_tag(&self) -> Option<&Token> {
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .find(|t| !matches!(t, Token::Text(s) if s.trim().is_empty()))
    }
}

fn empty_typed(tag: &str) -> Result<Value, RpcError> {
    match tag {
        "nil" => Ok(Value::Null),
        "string" => Ok(Value::String(String::new())),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Object(Map::new())),
        other => Err(decode_err(format!("empty <{}/> has no value", other))),
    }
}

/// Split a response body into tags and text.
///
/// Accepts the subset XML-RPC servers produce: elements without namespaces,
/// attributes (ignored), the five predefined entities plus numeric character
/// references, CDATA sections, comments, processing instructions and a
/// `<!DOCTYPE …>` declaration without an internal subset (skipped).
fn tokenize(xml: &str) -> Result<Vec<Token>, RpcError> {
    let mut tokens = Vec::new();
    let mut rest = xml;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<?") {
            rest = skip_past(after, "?>")?;
        } else if let Some(after) = rest.strip_prefix("<!--") {
            rest = skip_past(after, "-->")?;
        } else if let Some(after) = rest.strip_prefix("<![CDATA[") {
            let end = after
                .find("]]>")
                .ok_or_else(|| decode_err("unterminated CDATA section"))?;
            push_text(&mut tokens, &after[..end]);
            rest = &after[end + 3..];
        } else if let Some(after) = rest.strip_prefix("<!") {
            if after.split('>').next().is_some_and(|decl| decl.contains('[')) {
                return Err(decode_err("DOCTYPE internal subset is not supported"));
            }
            rest = skip_past(after, ">")?;
        } else if let Some(after) = rest.strip_prefix('<') {
            let end = after
                .find('>')
                .ok_or_else(|| decode_err("unterminated tag"))?;
            let inner = &after[..end];
            rest = &after[end + 1..];
            if let Some(name) = inner.strip_prefix('/') {
                tokens.push(Token::Close(tag_name(name)));
            } else if let Some(name) = inner.strip_suffix('/') {
                tokens.push(Token::Empty(tag_name(name)));
            } else {
                tokens.push(Token::Open(tag_name(inner)));
            }
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            push_text(&mut tokens, &unescape(&rest[..end])?);
            rest = &rest[end..];
        }
    }
    Ok(tokens)
}

/// Append text, joining it to a preceding text token (CDATA splits runs).
fn push_text(tokens: &mut Vec<Token>, text: &str) {
    match tokens.last_mut() {
        Some(Token::Text(prev)) => prev.push_str(text),
        _ => tokens.push(Token::Text(text.to_string())),
    }
}

fn skip_past<'a>(s: &'a str, terminator: &str) -> Result<&'a str, RpcError> {
    s.find(terminator)
        .map(|i| &s[i + terminator.len()..])
        .ok_or_else(|| decode_err(format!("missing '{}'", terminator)))
}

fn tag_name(inner: &str) -> String {
    inner.split_whitespace().next().unwrap_or_default().to_string()
}

fn unescape(text: &str) -> Result<String, RpcError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| decode_err("unterminated entity"))?;
        let entity = &after[..semi];
        let ch = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| decode_err(format!("unknown entity '&{};'", entity)))?
            }
        };
        out.push(ch);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
