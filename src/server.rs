//! HTTP front end
//!
//! Minimal HTTP/1.1 handling on tokio: one task per connection, one request
//! per connection, JSON in and out.
//!
//! Routes:
//! - `POST /ask`, `POST /api/ask`  body `{"question": "..."}`
//! - `GET /api/health`
//! - `GET /api/schema`
//! - `OPTIONS *` (CORS preflight)

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::schema::SchemaDescriptor;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_BYTES: usize = 1_000_000;

pub struct AppState {
    pub pipeline: Pipeline,
    pub schema: Arc<SchemaDescriptor>,
}

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

/// Accept connections forever, one task each.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from {}", addr);
        tokio::spawn(handle_connection(stream, state.clone()));
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    let response = match read_request(&mut stream).await {
        ReadOutcome::Request(request) => handle_request(&request, &state).await,
        ReadOutcome::TooLarge => {
            warn!("Request exceeds {} bytes", MAX_REQUEST_BYTES);
            create_response(413, &error_body("payload_too_large", "request body is too large"))
        }
        ReadOutcome::Closed => return,
    };

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!("Failed to write response: {}", e);
    }
}

enum ReadOutcome {
    Request(String),
    TooLarge,
    Closed,
}

/// How much of a request the buffer holds.
#[derive(Debug, PartialEq, Eq)]
enum Framing {
    Partial,
    Complete,
    TooLarge,
}

async fn read_request(stream: &mut TcpStream) -> ReadOutcome {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(READ_TIMEOUT, async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                return Ok::<_, std::io::Error>(Framing::Partial);
            }
            buffer.extend_from_slice(&temp_buf[..n]);
            match framing(&buffer) {
                Framing::Partial => continue,
                done => return Ok(done),
            }
        }
    })
    .await;

    match read_result {
        Err(_) => {
            warn!("Request read timeout");
            return ReadOutcome::Closed;
        }
        Ok(Err(e)) => {
            warn!("Failed to read from stream: {}", e);
            return ReadOutcome::Closed;
        }
        Ok(Ok(Framing::TooLarge)) => return ReadOutcome::TooLarge,
        Ok(Ok(_)) => {}
    }

    if buffer.is_empty() {
        return ReadOutcome::Closed;
    }

    match String::from_utf8(buffer) {
        Ok(request) => ReadOutcome::Request(request),
        Err(e) => {
            warn!("Failed to parse request as UTF-8: {}", e);
            ReadOutcome::Closed
        }
    }
}

/// Byte offset where the header block ends, once it has arrived.
fn headers_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Headers received and, if a Content-Length was sent, the whole body too.
/// Anything that cannot fit in `MAX_REQUEST_BYTES` is refused early.
fn framing(buffer: &[u8]) -> Framing {
    let Some(end) = headers_end(buffer) else {
        return if buffer.len() > MAX_REQUEST_BYTES {
            Framing::TooLarge
        } else {
            Framing::Partial
        };
    };

    let headers = String::from_utf8_lossy(&buffer[..end]);
    match extract_content_length(&headers) {
        Some(length) if end + 4 + length > MAX_REQUEST_BYTES => Framing::TooLarge,
        Some(length) if buffer.len() < end + 4 + length => Framing::Partial,
        _ => Framing::Complete,
    }
}

fn extract_content_length(headers: &str) -> Option<usize> {
    for line in headers.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

pub async fn handle_request(request: &str, state: &AppState) -> String {
    let request_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, r#"{"error":"bad_request"}"#);
    }

    let method = parts[0];
    let path = parts[1].split('?').next().unwrap_or("/");
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    debug!("Request: {} {}", method, path);

    let body = request
        .find("\r\n\r\n")
        .map(|start| request[start + 4..].trim())
        .unwrap_or("");

    match (method, path) {
        ("OPTIONS", _) => create_response(204, ""),
        ("GET", "/api/health") => create_response(200, r#"{"status":"ok"}"#),
        ("GET", "/api/schema") => match serde_json::to_string(state.schema.as_ref()) {
            Ok(json) => create_response(200, &json),
            Err(e) => create_response(500, &error_body("internal_error", &e.to_string())),
        },
        ("POST", "/ask") | ("POST", "/api/ask") => handle_ask(body, state).await,
        _ => create_response(404, r#"{"error":"not_found"}"#),
    }
}

async fn handle_ask(body: &str, state: &AppState) -> String {
    let ask: AskRequest = match serde_json::from_str(body) {
        Ok(ask) => ask,
        Err(e) => return create_response(400, &error_body("invalid_json", &e.to_string())),
    };

    let question = ask.question.trim();
    if question.is_empty() {
        return create_response(400, &error_body("question_required", "question must not be empty"));
    }

    let response = state.pipeline.run(question).await;
    match serde_json::to_string(&response) {
        Ok(json) => create_response(response.status_code(), &json),
        Err(e) => create_response(500, &error_body("internal_error", &e.to_string())),
    }
}

fn error_body(error: &str, message: &str) -> String {
    serde_json::json!({ "error": error, "message": message }).to_string()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        _ => "Internal Server Error",
    }
}

fn create_response(status: u16, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text(status),
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::pipeline::PipelineOptions;
    use crate::store::Store;

    fn state(replies: Vec<std::result::Result<String, crate::llm::LlmError>>) -> AppState {
        let schema = Arc::new(SchemaDescriptor::products());
        let store = Store::in_memory(&schema).unwrap();
        let client = Arc::new(ScriptedClient::new(replies));
        AppState {
            pipeline: Pipeline::new(client, schema.clone(), store, PipelineOptions::default()),
            schema,
        }
    }

    fn post(path: &str, body: &str) -> String {
        format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            path,
            body.len(),
            body
        )
    }

    fn split(response: &str) -> (String, serde_json::Value) {
        let status_line = response.lines().next().unwrap().to_string();
        let body = &response[response.find("\r\n\r\n").unwrap() + 4..];
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(body).unwrap()
        };
        (status_line, json)
    }

    #[test]
    fn test_framing() {
        assert_eq!(framing(b"POST /ask HTTP/1.1\r\nContent-Length: 5\r\n"), Framing::Partial);
        assert_eq!(
            framing(b"POST /ask HTTP/1.1\r\nContent-Length: 5\r\n\r\n{}"),
            Framing::Partial
        );
        assert_eq!(
            framing(b"POST /ask HTTP/1.1\r\ncontent-length: 2\r\n\r\n{}"),
            Framing::Complete
        );
        assert_eq!(framing(b"GET /api/health HTTP/1.1\r\n\r\n"), Framing::Complete);
    }

    #[test]
    fn test_framing_counts_raw_header_bytes() {
        let request = b"POST /ask HTTP/1.1\r\nX-Name: \xff\xfe\xff\r\nContent-Length: 2\r\n\r\n{}";
        assert_eq!(framing(request), Framing::Complete);
    }

    #[test]
    fn test_framing_refuses_oversized_requests() {
        let declared = format!("POST /ask HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_REQUEST_BYTES);
        assert_eq!(framing(declared.as_bytes()), Framing::TooLarge);

        let endless_headers = vec![b'a'; MAX_REQUEST_BYTES + 1];
        assert_eq!(framing(&endless_headers), Framing::TooLarge);
    }

    #[tokio::test]
    async fn test_health_and_schema() {
        let state = state(vec![]);
        let (status, json) = split(&handle_request("GET /api/health HTTP/1.1\r\n\r\n", &state).await);
        assert_eq!(status, "HTTP/1.1 200 OK");
        assert_eq!(json["status"], "ok");

        let (status, json) = split(&handle_request("GET /api/schema/ HTTP/1.1\r\n\r\n", &state).await);
        assert_eq!(status, "HTTP/1.1 200 OK");
        assert_eq!(json["tables"][0]["name"], "products");
    }

    #[tokio::test]
    async fn test_ask_success() {
        let state = state(vec![
            Ok("SELECT COUNT(*) FROM products WHERE category = 'Furniture'".to_string()),
            Ok("There are 8 furniture products.".to_string()),
        ]);
        let response = handle_request(&post("/ask", r#"{"question":"How much furniture?"}"#), &state).await;
        let (status, json) = split(&response);
        assert_eq!(status, "HTTP/1.1 200 OK");
        assert_eq!(json["rows"][0]["COUNT(*)"], 8);
        assert_eq!(json["explanation"], "There are 8 furniture products.");
        assert!(response.contains("Access-Control-Allow-Origin: *"));
    }

    #[tokio::test]
    async fn test_ask_guard_rejection_is_422() {
        let state = state(vec![Ok("SELECT * FROM users".to_string())]);
        let response = handle_request(&post("/api/ask", r#"{"question":"list users"}"#), &state).await;
        let (status, json) = split(&response);
        assert_eq!(status, "HTTP/1.1 422 Unprocessable Entity");
        assert_eq!(json["error"], "unknown_table");
        assert_eq!(json["raw"], "SELECT * FROM users");
    }

    #[tokio::test]
    async fn test_ask_bad_input() {
        let state = state(vec![]);
        let (status, json) = split(&handle_request(&post("/ask", "not json"), &state).await);
        assert_eq!(status, "HTTP/1.1 400 Bad Request");
        assert_eq!(json["error"], "invalid_json");

        let (status, json) = split(&handle_request(&post("/ask", r#"{"question":"  "}"#), &state).await);
        assert_eq!(status, "HTTP/1.1 400 Bad Request");
        assert_eq!(json["error"], "question_required");
    }

    #[tokio::test]
    async fn test_unknown_route_and_preflight() {
        let state = state(vec![]);
        let (status, _) = split(&handle_request("GET /nope HTTP/1.1\r\n\r\n", &state).await);
        assert_eq!(status, "HTTP/1.1 404 Not Found");

        let (status, _) = split(&handle_request("OPTIONS /ask HTTP/1.1\r\n\r\n", &state).await);
        assert_eq!(status, "HTTP/1.1 204 No Content");
    }
}
