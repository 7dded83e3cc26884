use crate::sandbox::SandboxResponse;
use std::io::{self, Write};

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Serialize a response onto the connection: status line, headers in
/// insertion order, one `Set-Cookie` line per outgoing cookie, blank line,
/// body. The caller closes the connection afterwards (no keep-alive).
pub fn write_response<W: Write>(w: &mut W, resp: &SandboxResponse) -> io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        resp.status,
        status_reason(resp.status)
    );
    for (name, value) in &resp.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    for cookie in &resp.cookies {
        head.push_str("Set-Cookie: ");
        head.push_str(cookie);
        head.push_str("\r\n");
    }
    if resp.get_header("content-length").is_none() {
        head.push_str(&format!("Content-Length: {}\r\n", resp.body.len()));
    }
    head.push_str("\r\n");
    w.write_all(head.as_bytes())?;
    w.write_all(&resp.body)?;
    w.flush()
}

/// Fixed minimal HTML error responses for 400/404/500.
pub fn error_page(status: u16, detail: Option<&str>) -> SandboxResponse {
    let reason = status_reason(status);
    let message = match (status, detail) {
        (_, Some(detail)) => detail.to_string(),
        (400, None) => "The request could not be understood.".to_string(),
        (404, None) => "The requested resource was not found.".to_string(),
        (500, None) => "The server encountered an internal error.".to_string(),
        (_, None) => reason.to_string(),
    };
    let body = format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>{status} {reason}</title></head>\
         <body><h1>{status} {reason}</h1><p>{message}</p></body></html>"
    );
    SandboxResponse {
        status,
        headers: vec![
            (
                "Content-Type".to_string(),
                "text/html; charset=UTF-8".to_string(),
            ),
            ("Connection".to_string(), "close".to_string()),
        ],
        cookies: Vec::new(),
        body: body.into_bytes(),
    }
}
