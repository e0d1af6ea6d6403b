use std::hint::black_box;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::GzEncoder;
use futures_util::{future::join_all, stream};
use fetchr::prelude::{Client, RequestOptions, RequestParts, StreamBody};
use serde_json::json;
use tokio::runtime::Runtime;

#[derive(Clone)]
struct CannedResponse {
    headers: Vec<(&'static str, &'static str)>,
    body: Vec<u8>,
}

struct BenchmarkServer {
    base_url: String,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl BenchmarkServer {
    fn start(response: CannedResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind benchmark server");
        let authority = listener
            .local_addr()
            .expect("read benchmark server address");
        listener
            .set_nonblocking(true)
            .expect("set benchmark listener nonblocking");

        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let join = thread::spawn(move || {
            while !stop_for_thread.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let response = response.clone();
                        thread::spawn(move || serve_connection(stream, &response));
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(1));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            base_url: format!("http://{authority}"),
            stop,
            join: Some(join),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for BenchmarkServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

// Every request arrives on its own connection and is answered with `Connection: close`.
fn serve_connection(mut stream: TcpStream, response: &CannedResponse) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    if drain_request(&mut stream).is_err() {
        return;
    }

    let mut raw = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.body.len()
    )
    .into_bytes();
    for (name, value) in &response.headers {
        raw.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(&response.body);
    let _ = stream.write_all(&raw);
    let _ = stream.flush();
}

fn drain_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 16 * 1024];
    let header_end = loop {
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        raw.extend_from_slice(&chunk[..read]);
        if let Some(position) = find(&raw, b"\r\n\r\n") {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
    let chunked = head.contains("transfer-encoding: chunked");
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    loop {
        let complete = if chunked {
            find(&raw[body_start..], b"0\r\n\r\n").is_some()
        } else {
            raw.len() >= body_start + content_length
        };
        if complete {
            return Ok(());
        }
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        raw.extend_from_slice(&chunk[..read]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn benchmark_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("build benchmark runtime")
}

fn benchmark_client() -> Client {
    Client::builder()
        .default_retries(0)
        .try_build()
        .expect("build benchmark client")
}

fn bench_normalize(c: &mut Criterion) {
    let client = benchmark_client();

    let mut group = c.benchmark_group("normalize");
    group.bench_function("url_with_query", |b| {
        b.iter(|| {
            let descriptor = client
                .normalize(
                    black_box("https://api.example.com/v1/items?stale=1"),
                    RequestOptions::new()
                        .query(json!({"page": 2, "q": "rust"}))
                        .header("x-request-id", "bench"),
                )
                .expect("normalize url");
            black_box(descriptor);
        });
    });
    group.bench_function("parts_with_form_body", |b| {
        b.iter(|| {
            let descriptor = client
                .normalize(
                    RequestParts::new("localhost").port(8080).path("/submit"),
                    RequestOptions::new()
                        .body(json!({"name": "fetchr", "kind": "bench"}))
                        .auth("user:secret"),
                )
                .expect("normalize parts");
            black_box(descriptor);
        });
    });
    group.finish();
}

fn bench_get_latency(c: &mut Criterion) {
    let plain = BenchmarkServer::start(CannedResponse {
        headers: vec![("Content-Type", "application/json")],
        body: br#"{"ok":true}"#.to_vec(),
    });
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&vec![b'a'; 64 * 1024])
        .expect("compress benchmark payload");
    let gzip = BenchmarkServer::start(CannedResponse {
        headers: vec![("Content-Encoding", "gzip")],
        body: encoder.finish().expect("finish gzip payload"),
    });
    let runtime = benchmark_runtime();
    let client = benchmark_client();

    let mut group = c.benchmark_group("get_latency");
    group.sample_size(60);
    group.bench_function("json_200", |b| {
        b.to_async(&runtime).iter(|| async {
            let response = client
                .get(plain.url("/v1/ping"), RequestOptions::new().json(true))
                .await
                .expect("json get should succeed");
            black_box(response.status());
        });
    });
    group.bench_function("gzip_64k", |b| {
        b.to_async(&runtime).iter(|| async {
            let response = client
                .get(gzip.url("/v1/blob"), RequestOptions::new())
                .await
                .expect("gzip get should succeed");
            black_box(response.text().len());
        });
    });
    group.finish();
}

fn bench_concurrent_get_throughput(c: &mut Criterion) {
    let server = BenchmarkServer::start(CannedResponse {
        headers: Vec::new(),
        body: b"pong".to_vec(),
    });
    let runtime = benchmark_runtime();
    let client = benchmark_client();

    let mut group = c.benchmark_group("concurrent_get_throughput");
    group.sample_size(30);
    for concurrency in [8_usize, 32] {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &concurrency,
            |b, &concurrency| {
                b.to_async(&runtime).iter(|| async {
                    let requests = (0..concurrency)
                        .map(|_| client.get(server.url("/v1/ping"), RequestOptions::new()));
                    for response in join_all(requests).await {
                        black_box(
                            response
                                .expect("concurrent get should succeed")
                                .status(),
                        );
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_upload_modes(c: &mut Criterion) {
    const PAYLOAD_BYTES: usize = 256 * 1024;
    const CHUNK_BYTES: usize = 16 * 1024;

    let server = BenchmarkServer::start(CannedResponse {
        headers: Vec::new(),
        body: b"stored".to_vec(),
    });
    let runtime = benchmark_runtime();
    let client = benchmark_client();
    let payload = Bytes::from(vec![b'x'; PAYLOAD_BYTES]);

    let mut group = c.benchmark_group("upload_256k");
    group.sample_size(30);
    group.throughput(Throughput::Bytes(PAYLOAD_BYTES as u64));
    group.bench_function("buffered", |b| {
        b.to_async(&runtime).iter(|| async {
            let response = client
                .post(server.url("/v1/upload"), RequestOptions::new().body(payload.clone()))
                .await
                .expect("buffered upload should succeed");
            black_box(response.status());
        });
    });
    group.bench_function("streamed", |b| {
        b.to_async(&runtime).iter(|| async {
            let chunks: Vec<Result<Bytes, std::io::Error>> = payload
                .chunks(CHUNK_BYTES)
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect();
            let response = client
                .post(
                    server.url("/v1/upload"),
                    RequestOptions::new().body(StreamBody::new(stream::iter(chunks))),
                )
                .await
                .expect("streamed upload should succeed");
            black_box(response.status());
        });
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5));
    targets = bench_normalize, bench_get_latency, bench_concurrent_get_throughput, bench_upload_modes
);
criterion_main!(benches);
