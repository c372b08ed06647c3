use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use serde_json::{Value, json};

use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::vendor_http::{
    TransportError, VendorRequest, VendorResponse, VendorTransport,
};
use crate::domain::credential::{Clock, TimestampMs};

static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn open_test_connection(test_name: &str) -> Connection {
    let template = ensure_template_db();
    let test_db_path = unique_test_db_path(test_name);

    if let Some(parent) = test_db_path.parent() {
        std::fs::create_dir_all(parent).expect("test db dir should be creatable");
    }

    std::fs::copy(&template, &test_db_path).expect("template db should be copied");
    open_connection(test_db_path.to_string_lossy().as_ref()).expect("test db should open")
}

fn ensure_template_db() -> PathBuf {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH
        .get_or_init(|| {
            let template_path = std::env::var("TEST_DB_TEMPLATE_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_template_path);

            if let Some(parent) = template_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).expect("template parent dir should be creatable");
            }

            let mut connection = open_connection(template_path.to_string_lossy().as_ref())
                .expect("template db opens");
            run_migrations(&mut connection).expect("template migrations should succeed");

            template_path
        })
        .clone()
}

fn default_template_path() -> PathBuf {
    Path::new("./target/testdb/solar_sync_template.db").to_path_buf()
}

fn unique_test_db_path(test_name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    Path::new("./target/testdb")
        .join(format!("{test_name}-{now}-{counter}.sqlite"))
        .to_path_buf()
}

#[derive(Debug, Clone)]
pub struct CannedResponse {
    status: u16,
    body: String,
}

impl CannedResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub fn path(&self) -> &str {
        self.request_line.split_whitespace().nth(1).unwrap_or("")
    }
}

/// Serves the given responses in order, one connection each, and records
/// what it received. `finish` waits until every response has been served.
pub struct HttpResponder {
    addr: SocketAddr,
    handle: JoinHandle<Vec<CapturedRequest>>,
}

impl HttpResponder {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn finish(self) -> Vec<CapturedRequest> {
        self.handle
            .join()
            .expect("responder thread should terminate cleanly")
    }
}

pub fn spawn_http_responder(responses: Vec<CannedResponse>) -> HttpResponder {
    let listener = TcpListener::bind("127.0.0.1:0").expect("responder should bind");
    let addr = listener.local_addr().expect("addr should be available");

    let handle = std::thread::spawn(move || {
        let mut captured = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().expect("responder should accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .expect("read timeout should be configurable");
            captured.push(read_request(&mut stream));
            write_response(&mut stream, &response);
        }
        captured
    });

    HttpResponder { addr, handle }
}

fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];

    let header_end = loop {
        if let Some(index) = find_header_end(&buffer) {
            break index;
        }
        let size = stream.read(&mut chunk).expect("request should be readable");
        assert!(size > 0, "connection closed before headers were complete");
        buffer.extend_from_slice(&chunk[..size]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        let size = stream.read(&mut chunk).expect("body should be readable");
        assert!(size > 0, "connection closed before body was complete");
        buffer.extend_from_slice(&chunk[..size]);
    }

    CapturedRequest {
        request_line,
        headers,
        body: String::from_utf8_lossy(&buffer[body_start..body_start + content_length])
            .to_string(),
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

fn write_response(stream: &mut TcpStream, response: &CannedResponse) {
    let payload = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    stream
        .write_all(payload.as_bytes())
        .expect("response should be writable");
    stream.flush().expect("response should flush");
}

/// Clock whose reading is set by the test.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn at(now_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicI64::new(now_ms),
        })
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimestampMs {
        TimestampMs(self.now_ms.load(Ordering::SeqCst))
    }
}

/// Replays queued transport results in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<VendorResponse, TransportError>>>,
    requests: Mutex<Vec<VendorRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(VendorResponse { status, body }))
    }

    pub fn fail(&self, error: TransportError) -> &Self {
        self.push(Err(error))
    }

    pub fn token(&self, token: &str, expires_in: i64) -> &Self {
        self.respond(
            200,
            json!({"access_token": token, "expires_in": expires_in, "token_type": "bearer"}),
        )
    }

    pub fn requests(&self) -> Vec<VendorRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.path)
            .collect()
    }

    fn push(&self, result: Result<VendorResponse, TransportError>) -> &Self {
        self.responses.lock().expect("responses lock").push_back(result);
        self
    }
}

impl VendorTransport for ScriptedTransport {
    fn send(&self, request: &VendorRequest) -> Result<VendorResponse, TransportError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted response left".into())))
    }
}
