// In-process HTTP stub for exercising the blocking client end to end.
// One thread accepts connections and answers each with the handler's reply,
// closing the connection afterwards.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use vmfleet_cli::api::{ApiClient, RetryPolicy};
use vmfleet_cli::config::Config;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }
}

type Handler = dyn Fn(&Recorded) -> Reply + Send + Sync;

pub struct StubServer {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let url = format!("http://{}", listener.local_addr().expect("stub address"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let handler: Arc<Handler> = Arc::new(handler);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, handler.as_ref(), &log);
            }
        });

        Self { url, requests }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("request log").clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// A client pointed at this stub, with millisecond retry delays.
    pub fn client(&self) -> ApiClient {
        let url = self.url.clone();
        let config = Config::from_lookup(move |key| match key {
            "DEMO_API_BASE_URL" => Some(url.clone()),
            "DEMO_API_MAX_RETRIES" => Some("2".into()),
            _ => None,
        })
        .expect("stub config");
        ApiClient::new(&config)
            .expect("stub client")
            .with_retry(RetryPolicy::new(2).with_base_delay(Duration::from_millis(5)))
    }

    pub fn authed_client(&self) -> ApiClient {
        let mut client = self.client();
        client.set_token("test-token");
        client
    }
}

/// Read one request, record it, then answer. Recording comes first so a
/// test sees the request as soon as the client returns.
fn serve(mut stream: TcpStream, handler: &Handler, log: &Mutex<Vec<Recorded>>) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            match name.to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().unwrap_or(0),
                "authorization" => authorization = Some(value.to_string()),
                _ => {}
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;

    let request = Recorded {
        method,
        path,
        authorization,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let reply = handler(&request);
    log.lock().ok()?.push(request);
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reason(reply.status),
        reply.body.len(),
        reply.body
    );
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

pub fn user_json(id: i64, name: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "email": email,
        "created_at": 1_700_000_000_000_i64,
    })
}

pub fn vm_json(id: i64, user_id: i64, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": user_id,
        "name": format!("web-Falcon{id}"),
        "operating_system": "Ubuntu 22.04 LTS",
        "cpu_cores": 4,
        "ram_gb": 8,
        "disk_gb": 100,
        "status": status,
        "created_at": 1_700_000_000_000_i64,
    })
}
