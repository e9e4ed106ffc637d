use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use tollgate::middleware::{ProfilingStage, RateLimiter};
use tollgate::testing::RecordingSink;
use tollgate::{Method, RateLimitConfig, Request, Response, Router, StatusCode, serve_with_shutdown};

async fn roundtrip(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
}

#[tokio::test]
async fn serves_pipeline_over_tcp() {
    let sink = RecordingSink::new();
    let app = Router::new()
        .on(Method::GET, "/products/{id}", |req: Request| async move {
            Response::json(format!(r#"{{"id":"{}"}}"#, req.param("id").unwrap_or_default()))
        })
        .on(Method::POST, "/products", |req: Request| async move {
            if req.body().is_empty() {
                return Err(std::io::Error::other("empty payload"));
            }
            Ok(StatusCode::CREATED)
        })
        .layer(RateLimiter::new(RateLimitConfig::new(4, Duration::from_secs(60))).unwrap())
        .layer(ProfilingStage::new().with_sink(sink.clone()))
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(listener, app, async move {
        let _ = stopped.await;
    }));

    let res = roundtrip(addr, &get("/products/42")).await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with(r#"{"id":"42"}"#), "{res}");

    let res = roundtrip(addr, &get("/nowhere")).await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found"), "{res}");

    let res = roundtrip(
        addr,
        "POST /products HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 500 Internal Server Error"), "{res}");

    let res = roundtrip(
        addr,
        "POST /products HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 2\r\n\r\n{}",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 201 Created"), "{res}");

    let res = roundtrip(addr, &get("/products/42")).await;
    assert!(res.starts_with("HTTP/1.1 429 Too Many Requests"), "{res}");
    assert!(res.to_ascii_lowercase().contains("retry-after: "), "{res}");
    assert!(res.ends_with("Rate limit exceeded. Try again later."), "{res}");

    // The four admitted requests were timed, the faulting one included.
    assert_eq!(sink.timings().len(), 4);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
