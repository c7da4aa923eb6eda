use std::{fmt, mem};

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;

use crate::error::HttpDecodeError;

const USER_AGENT: &str = concat!("client_core/", env!("CARGO_PKG_VERSION"));
const MAX_HEADERS: usize = 64;
const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request as it will be written to the socket, minus per-connection headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub target: String,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            target: target.into(),
            body: None,
        }
    }

    pub fn post_json<T: Serialize>(
        target: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Self::with_json(Method::Post, target, body)
    }

    pub fn put_json<T: Serialize>(
        target: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Self::with_json(Method::Put, target, body)
    }

    fn with_json<T: Serialize>(
        method: Method,
        target: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method,
            target: target.into(),
            body: Some(Bytes::from(serde_json::to_vec(body)?)),
        })
    }

    /// Serializes the request. The token is attached here so queued requests
    /// pick up whatever session is current when they hit the wire.
    pub fn encode(&self, host: &str, access_token: Option<&str>) -> Vec<u8> {
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: {USER_AGENT}\r\nAccept: */*\r\nConnection: keep-alive\r\n",
            self.method, self.target
        );
        if let Some(token) = access_token {
            head.push_str(&format!("Authorization: Bearer {token}\r\n"));
        }
        let body = self.body.as_deref().unwrap_or_default();
        if self.body.is_some() {
            head.push_str("Content-Type: application/json\r\n");
        }
        if self.body.is_some() || self.method != Method::Get {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut out = Vec::with_capacity(head.len() + body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Body as text, for diagnostics.
    pub fn body_text(&self) -> String {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    NeedMoreData,
    /// Body bytes decoded by this call; the decoder keeps accumulating them.
    BodyChunk(Bytes),
    Complete(HttpResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkPhase {
    Size,
    Data { remaining: usize },
    DataEnd,
    Trailers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Head,
    Length { remaining: usize },
    Chunked(ChunkPhase),
}

enum Step {
    Progress,
    Stalled,
    Complete,
}

/// Incremental HTTP/1.1 response decoder.
///
/// Bytes may arrive in any split. Bytes past the end of one response stay
/// buffered and start the next one.
#[derive(Debug)]
pub struct ResponseDecoder {
    pending: BytesMut,
    phase: Phase,
    status: u16,
    headers: Vec<(String, String)>,
    body: BytesMut,
    completed: u64,
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::new(),
            phase: Phase::Head,
            status: 0,
            headers: Vec::new(),
            body: BytesMut::new(),
            completed: 0,
        }
    }

    pub fn feed(&mut self, input: &[u8]) -> Result<DecodeOutcome, HttpDecodeError> {
        self.pending.extend_from_slice(input);
        let body_before = self.body.len();

        loop {
            match self.step()? {
                Step::Progress => continue,
                Step::Stalled => break,
                Step::Complete => return Ok(DecodeOutcome::Complete(self.finish())),
            }
        }

        if self.body.len() > body_before {
            Ok(DecodeOutcome::BodyChunk(Bytes::copy_from_slice(
                &self.body[body_before..],
            )))
        } else {
            Ok(DecodeOutcome::NeedMoreData)
        }
    }

    /// True when no partial response is held.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Head && self.pending.is_empty() && self.body.is_empty()
    }

    pub fn has_buffered_input(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn completed_responses(&self) -> u64 {
        self.completed
    }

    /// Drops the current message state. Leftover input is kept.
    pub fn reset(&mut self) {
        self.phase = Phase::Head;
        self.status = 0;
        self.headers.clear();
        self.body.clear();
    }

    /// Drops everything, including buffered input; used when the socket goes away.
    pub fn clear(&mut self) {
        self.reset();
        self.pending.clear();
    }

    fn finish(&mut self) -> HttpResponse {
        let response = HttpResponse {
            status: self.status,
            headers: mem::take(&mut self.headers),
            body: self.body.split().freeze(),
        };
        self.completed += 1;
        self.reset();
        response
    }

    fn step(&mut self) -> Result<Step, HttpDecodeError> {
        match self.phase {
            Phase::Head => self.step_head(),
            Phase::Length { remaining } => {
                if remaining == 0 {
                    return Ok(Step::Complete);
                }
                let taken = self.take_body(remaining);
                if taken == 0 {
                    return Ok(Step::Stalled);
                }
                self.phase = Phase::Length {
                    remaining: remaining - taken,
                };
                Ok(Step::Progress)
            }
            Phase::Chunked(chunk) => self.step_chunked(chunk),
        }
    }

    fn step_head(&mut self) -> Result<Step, HttpDecodeError> {
        let parsed = {
            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
            let mut response = httparse::Response::new(&mut headers);
            match response.parse(&self.pending)? {
                httparse::Status::Partial => None,
                httparse::Status::Complete(head_len) => {
                    let status = response.code.unwrap_or_default();
                    let headers: Vec<(String, String)> = response
                        .headers
                        .iter()
                        .map(|h| {
                            (
                                h.name.to_string(),
                                String::from_utf8_lossy(h.value).trim().to_string(),
                            )
                        })
                        .collect();
                    Some((head_len, status, headers))
                }
            }
        };

        let Some((head_len, status, headers)) = parsed else {
            if self.pending.len() > MAX_HEAD_BYTES {
                return Err(HttpDecodeError::HeadTooLarge {
                    limit: MAX_HEAD_BYTES,
                });
            }
            return Ok(Step::Stalled);
        };

        self.pending.advance(head_len);
        if (100..200).contains(&status) {
            // Interim response; the real head follows.
            return Ok(Step::Progress);
        }

        self.phase = framing_for(status, &headers)?;
        self.status = status;
        self.headers = headers;
        Ok(Step::Progress)
    }

    fn step_chunked(&mut self, chunk: ChunkPhase) -> Result<Step, HttpDecodeError> {
        match chunk {
            ChunkPhase::Size => {
                let Some(line) = self.take_line()? else {
                    return Ok(Step::Stalled);
                };
                let size_text = line.split(';').next().unwrap_or_default().trim();
                let size = usize::from_str_radix(size_text, 16)
                    .map_err(|_| HttpDecodeError::Chunk("invalid chunk size"))?;
                self.phase = Phase::Chunked(if size == 0 {
                    ChunkPhase::Trailers
                } else {
                    ChunkPhase::Data { remaining: size }
                });
                Ok(Step::Progress)
            }
            ChunkPhase::Data { remaining } => {
                let taken = self.take_body(remaining);
                if taken == 0 {
                    return Ok(Step::Stalled);
                }
                self.phase = Phase::Chunked(if taken == remaining {
                    ChunkPhase::DataEnd
                } else {
                    ChunkPhase::Data {
                        remaining: remaining - taken,
                    }
                });
                Ok(Step::Progress)
            }
            ChunkPhase::DataEnd => {
                if self.pending.len() < 2 {
                    return Ok(Step::Stalled);
                }
                if &self.pending[..2] != b"\r\n" {
                    return Err(HttpDecodeError::Chunk("missing CRLF after chunk data"));
                }
                self.pending.advance(2);
                self.phase = Phase::Chunked(ChunkPhase::Size);
                Ok(Step::Progress)
            }
            ChunkPhase::Trailers => match self.take_line()? {
                None => Ok(Step::Stalled),
                Some(line) if line.is_empty() => Ok(Step::Complete),
                Some(_) => Ok(Step::Progress),
            },
        }
    }

    fn take_body(&mut self, remaining: usize) -> usize {
        let taken = remaining.min(self.pending.len());
        if taken > 0 {
            let data = self.pending.split_to(taken);
            self.body.extend_from_slice(&data);
        }
        taken
    }

    fn take_line(&mut self) -> Result<Option<String>, HttpDecodeError> {
        let Some(end) = self.pending.windows(2).position(|w| w == b"\r\n") else {
            if self.pending.len() > MAX_CHUNK_LINE_BYTES {
                return Err(HttpDecodeError::Chunk("line too long"));
            }
            return Ok(None);
        };
        let line = String::from_utf8_lossy(&self.pending[..end]).into_owned();
        self.pending.advance(end + 2);
        Ok(Some(line))
    }
}

fn framing_for(status: u16, headers: &[(String, String)]) -> Result<Phase, HttpDecodeError> {
    if status == 204 || status == 304 {
        return Ok(Phase::Length { remaining: 0 });
    }

    let chunked = headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("transfer-encoding")
            && value
                .rsplit(',')
                .next()
                .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    });
    if chunked {
        return Ok(Phase::Chunked(ChunkPhase::Size));
    }

    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value);
    match length {
        Some(value) => value
            .parse::<usize>()
            .map(|remaining| Phase::Length { remaining })
            .map_err(|_| HttpDecodeError::ContentLength(value.clone())),
        None => Err(HttpDecodeError::MissingFraming),
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
