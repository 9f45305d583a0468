// Minimal HTTP/1.1 request reader and response writer
// One request per connection, no keep-alive, no chunked bodies

use crate::error::RequestError;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const PLAIN_TEXT_FORM: &str = "text/plain";

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    /// Header names are stored lower-cased; the last occurrence wins.
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Path with any query string removed.
    pub fn route_path(&self) -> &str {
        self.path.split_once('?').map_or(&self.path, |(path, _)| path)
    }

    /// Decode the body as form fields.
    ///
    /// `text/plain` bodies hold one `key=value` pair per line, anything else is
    /// treated as `&`-separated pairs. Values only get `+` turned into spaces.
    pub fn form_fields(&self) -> Result<HashMap<String, String>, RequestError> {
        let body = self.body.as_ref().ok_or_else(|| {
            RequestError::MissingOrUnparsableHeader("Content-Length".to_string())
        })?;
        let content_type = self
            .header("Content-Type")
            .ok_or_else(|| RequestError::MissingOrUnparsableHeader("Content-Type".to_string()))?;

        let text = std::str::from_utf8(body)
            .map_err(|_| RequestError::MalformedFormField("body is not UTF-8".to_string()))?;

        let pieces: Vec<&str> = if content_type == PLAIN_TEXT_FORM {
            text.split("\r\n").collect()
        } else {
            text.split('&').collect()
        };

        let mut fields = HashMap::new();
        for piece in pieces {
            if piece.is_empty() {
                continue;
            }
            let (key, value) = piece
                .split_once('=')
                .ok_or_else(|| RequestError::MalformedFormField(piece.to_string()))?;
            fields.insert(key.to_string(), value.replace('+', " "));
        }
        Ok(fields)
    }
}

/// Read one request off a buffered stream.
pub async fn read_request<R>(reader: &mut R) -> Result<HttpRequest, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let request_line = match read_line(reader).await? {
        Some(line) => line,
        None => return Err(RequestError::MalformedRequestLine(String::new())),
    };
    let request_line = String::from_utf8(request_line)
        .map_err(|e| RequestError::MalformedRequestLine(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;

    let mut parts = request_line.split_whitespace();
    let (method, path) = match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => (method.to_string(), path.to_string()),
        _ => {
            return Err(RequestError::MalformedRequestLine(
                request_line.trim_end().to_string(),
            ))
        }
    };

    let headers = read_headers(reader).await?;

    let mut request = HttpRequest {
        method,
        path,
        headers,
        body: None,
    };

    if let Some(length) = request.header("Content-Length") {
        let unparsable =
            || RequestError::MissingOrUnparsableHeader(format!("Content-Length: {length}"));
        // usize::from_str would also take a leading '+'
        if length.is_empty() || !length.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unparsable());
        }
        let expected: usize = length.parse().map_err(|_| unparsable())?;
        request.body = Some(read_body(reader, expected).await?);
    }

    Ok(request)
}

async fn read_headers<R>(reader: &mut R) -> Result<HashMap<String, String>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = HashMap::new();
    loop {
        let line = read_line(reader).await?.ok_or(RequestError::UnexpectedEof)?;
        let line = String::from_utf8_lossy(&line);
        if line == "\r\n" || line == "\n" {
            return Ok(headers);
        }
        let (key, value) = line.split_once(": ").ok_or_else(|| {
            RequestError::MissingOrUnparsableHeader(line.trim_end().to_string())
        })?;
        headers.insert(key.to_ascii_lowercase(), value.trim().to_string());
    }
}

async fn read_body<R>(reader: &mut R, expected: usize) -> Result<Bytes, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::with_capacity(expected.min(64 * 1024));
    (&mut *reader)
        .take(expected as u64)
        .read_to_end(&mut body)
        .await?;
    if body.len() < expected {
        return Err(RequestError::BodyReadShortfall {
            expected,
            read: body.len(),
        });
    }
    Ok(Bytes::from(body))
}

/// Returns the raw line including its terminator, or `None` at end of stream.
async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = reader.read_until(b'\n', &mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        303 => "See Other",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    /// Extra headers, written before the framing headers.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn html(body: impl Into<Bytes>) -> Self {
        Self::new(200, crate::mime_types::HTML, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn redirect(location: &str) -> Self {
        Self::new(303, crate::mime_types::HTML, Bytes::new()).with_header("Location", location)
    }

    pub fn forbidden_no_game() -> Self {
        Self::new(
            403,
            crate::mime_types::HTML,
            Bytes::from_static(b"<h1>403 Forbidden</h1><p>No active game</p>"),
        )
    }

    pub fn bad_request() -> Self {
        Self::new(400, crate::mime_types::PLAIN_TEXT, Bytes::from_static(b"Bad Request"))
    }

    pub fn forbidden() -> Self {
        Self::new(403, crate::mime_types::PLAIN_TEXT, Bytes::from_static(b"Forbidden"))
    }

    pub fn not_found() -> Self {
        Self::new(404, crate::mime_types::PLAIN_TEXT, Bytes::from_static(b"Not Found"))
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            405,
            crate::mime_types::PLAIN_TEXT,
            Bytes::from_static(b"Method Not Allowed"),
        )
    }

    pub fn internal_error() -> Self {
        Self::new(
            500,
            crate::mime_types::PLAIN_TEXT,
            Bytes::from_static(b"Internal Server Error"),
        )
    }

    /// Serialize the whole response; Content-Length always comes from the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.body.len());

        buf.extend_from_slice(b"HTTP/1.1 ");
        buf.extend_from_slice(self.status.to_string().as_bytes());
        buf.extend_from_slice(b" ");
        buf.extend_from_slice(status_text(self.status).as_bytes());
        buf.extend_from_slice(b"\r\n");

        for (name, value) in &self.headers {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }

        buf.extend_from_slice(b"Content-Type: ");
        buf.extend_from_slice(self.content_type.as_bytes());
        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(b"Content-Length: ");
        buf.extend_from_slice(self.body.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(b"Connection: close\r\n");

        // End headers
        buf.extend_from_slice(b"\r\n");

        buf.extend_from_slice(&self.body);
        buf
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}
