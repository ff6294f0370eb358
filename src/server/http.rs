//! Minimal HTTP/1.1 framing: one request line plus headers in, one response out.

use std::{
    fs,
    io::BufRead,
    path::{Component, Path},
};

use crate::error::{Error, Result};

/// Request targets starting with this prefix carry a query
pub const QUERY_PREFIX: &str = "/sql-air?query=";

/// The parts of a request the server looks at
#[derive(Debug, PartialEq)]
pub struct Request {
    pub method: String,
    pub target: String,
}

impl Request {
    /// The decoded query, if this is a query request
    pub fn query(&self) -> Option<Result<String>> {
        self.target.strip_prefix(QUERY_PREFIX).map(percent_decode)
    }
}

/// Reads the request line and skips the header block (up to the empty line).
///
/// Returns None when the peer sent nothing.
pub fn read_request(reader: &mut impl BufRead) -> Result<Option<Request>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header)? == 0 || header.trim_end_matches(['\r', '\n']).is_empty() {
            break;
        }
    }

    if target.is_empty() {
        return Ok(None);
    }
    Ok(Some(Request { method, target }))
}

/// Decodes `%XX` escapes and `+` (space); a malformed escape is kept as is
pub fn percent_decode(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 2;
                }
                _ => out.push(b'%'),
            },
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).map_err(|e| Error::Parse(format!("query is not valid UTF-8: {}", e)))
}

fn hex(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Builds a complete response; Content-Length is the exact body size
pub fn response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {}\r\n\
         Server: localhost\r\n\
         Connection: Close\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\r\n",
        status,
        content_type,
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Serves a file below `root`; anything missing or outside it is a 404
pub fn static_file(root: &Path, target: &str) -> Vec<u8> {
    let path = target.split('?').next().unwrap_or_default().trim_start_matches('/');
    let path = Path::new(if path.is_empty() { "index.html" } else { path });
    let inside_root = path.components().all(|c| matches!(c, Component::Normal(_)));
    if inside_root {
        if let Ok(data) = fs::read(root.join(path)) {
            return response("200 OK", content_type(path), &data);
        }
    }
    response("404 Not Found", "text/plain", b"404 Not Found\n")
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use super::{Request, percent_decode, read_request, response, static_file};
    use crate::error::Result;

    #[test]
    fn test_read_request() -> Result<()> {
        let raw = "GET /sql-air?query=select%20*%20from%20a.csv HTTP/1.1\r\nHost: x\r\nAccept: */*\r\n\r\nleftover";
        let mut reader = BufReader::new(raw.as_bytes());
        let request = read_request(&mut reader)?.expect("request");
        assert_eq!(
            request,
            Request {
                method: "GET".into(),
                target: "/sql-air?query=select%20*%20from%20a.csv".into(),
            }
        );
        assert_eq!(request.query(), Some(Ok("select * from a.csv".to_string())));

        assert_eq!(read_request(&mut BufReader::new("".as_bytes()))?, None);
        Ok(())
    }

    #[test]
    fn test_percent_decode() -> Result<()> {
        assert_eq!(percent_decode("a+b%3D%27c%27")?, "a b='c'");
        assert_eq!(percent_decode("100%")?, "100%");
        assert_eq!(percent_decode("%zz%4")?, "%zz%4");
        assert_eq!(percent_decode("caf%C3%A9")?, "café");
        assert!(percent_decode("%FF").is_err());
        Ok(())
    }

    #[test]
    fn test_response() {
        let out = String::from_utf8(response("200 OK", "text/plain", "héllo".as_bytes())).unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Length: 6\r\n"));
        assert!(out.ends_with("\r\n\r\nhéllo"));
    }

    #[test]
    fn test_static_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("index.html"), "<p>hi</p>")?;

        let ok = String::from_utf8(static_file(dir.path(), "/"))?;
        assert!(ok.starts_with("HTTP/1.1 200 OK"));
        assert!(ok.contains("Content-Type: text/html"));
        assert!(ok.ends_with("<p>hi</p>"));

        for target in ["/missing.txt", "/../index.html", "//etc/passwd"] {
            let nf = String::from_utf8(static_file(dir.path(), target))?;
            assert!(nf.starts_with("HTTP/1.1 404 Not Found"), "{}", target);
        }
        Ok(())
    }
}
