use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tollgate::events::PipelineEvent;
use tollgate::middleware::{
    ActionHook, ActionHookStage, Guard, Middleware, ProfilingStage, RateLimiter, Scope,
};
use tollgate::testing::{ManualClock, RecordingSink};
use tollgate::{Method, RateLimitConfig, Request, Response, Router, StatusCode};

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl ActionHook for Recorder {
    async fn before(&self, _req: &Request) -> Option<Response> {
        self.log.lock().push(format!("{}.pre", self.name));
        None
    }

    async fn after(&self, _req: &Request, _res: &Response) {
        self.log.lock().push(format!("{}.post", self.name));
    }
}

fn recorder(name: &'static str, log: &Log) -> ActionHookStage<Recorder> {
    ActionHookStage::new(Recorder { name, log: Arc::clone(log) })
}

fn from(addr: &str) -> tollgate::RequestBuilder {
    Request::builder().remote_addr(addr.parse().unwrap())
}

#[tokio::test]
async fn five_requests_per_ten_seconds() {
    let clock = ManualClock::default();
    let sink = RecordingSink::new();
    let limiter = Arc::new(
        RateLimiter::with_clock(RateLimitConfig::new(5, Duration::from_secs(10)), clock.clone())
            .unwrap()
            .with_sink(sink.clone()),
    );

    let app = Router::new()
        .on(Method::GET, "/products", |_req: Request| async { "[]" })
        .shared_layer(Scope::Global, limiter.clone())
        .build()
        .unwrap();

    for _ in 0..5 {
        clock.advance(Duration::from_millis(100));
        let res = app.call(from("192.168.1.20:5000").path("/products")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    clock.advance(Duration::from_millis(100));
    let res = app.call(from("192.168.1.20:5000").path("/products")).await.unwrap();
    assert_eq!(res.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body(), b"Rate limit exceeded. Try again later.");
    assert_eq!(
        sink.events(),
        vec![PipelineEvent::RateLimitRejected {
            address: Some("192.168.1.20:5000".parse().unwrap()),
            route: "/products".to_owned(),
        }]
    );

    clock.advance(Duration::from_secs(11));
    let res = app.call(from("192.168.1.20:5000").path("/products")).await.unwrap();
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(limiter.snapshot().count, 1);
}

#[tokio::test]
async fn rejected_requests_are_not_profiled_or_hooked() {
    let clock = ManualClock::default();
    let sink = RecordingSink::new();
    let log = Log::default();

    let app = Router::new()
        .on(Method::GET, "/products", |_req: Request| async { "[]" })
        .layer(
            RateLimiter::with_clock(RateLimitConfig::new(1, Duration::from_secs(10)), clock.clone())
                .unwrap()
                .with_sink(sink.clone()),
        )
        .layer(ProfilingStage::new().with_clock(clock.clone()).with_sink(sink.clone()))
        .layer(recorder("A", &log))
        .build()
        .unwrap();

    app.call(Request::builder().path("/products")).await.unwrap();
    let res = app.call(Request::builder().path("/products")).await.unwrap();

    assert_eq!(res.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(sink.timings().len(), 1);
    assert_eq!(sink.rejections(), 1);
    assert_eq!(*log.lock(), ["A.pre", "A.post"]);
}

#[tokio::test]
async fn global_hooks_wrap_route_hooks() {
    let log = Log::default();
    let handler_log = Arc::clone(&log);

    let app = Router::new()
        .on(Method::GET, "/products/{id}", move |req: Request| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().push("handler".to_owned());
                Response::text(req.param("id").unwrap_or_default().to_owned())
            }
        })
        .route_layer(Method::GET, "/products/{id}", recorder("B", &log))
        .layer(recorder("A", &log))
        .build()
        .unwrap();

    let res = app.call(Request::builder().path("/products/7")).await.unwrap();

    assert_eq!(res.body(), b"7");
    assert_eq!(*log.lock(), ["A.pre", "B.pre", "handler", "B.post", "A.post"]);
}

#[tokio::test]
async fn broad_short_circuit_skips_narrow_stages_and_handler() {
    let log = Log::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let app = Router::new()
        .on(Method::DELETE, "/products/{id}", move |_req: Request| {
            let calls = Arc::clone(&counted);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                StatusCode::NO_CONTENT
            }
        })
        .layer(ActionHookStage::new(Guard::new(|req: &Request| {
            req.header("x-api-key")
                .is_none()
                .then(|| Response::status(StatusCode::UNAUTHORIZED))
        })))
        .route_layer(Method::DELETE, "/products/{id}", recorder("B", &log))
        .build()
        .unwrap();

    for _ in 0..3 {
        let res = app
            .call(Request::builder().method(Method::DELETE).path("/products/1"))
            .await
            .unwrap();
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(log.lock().is_empty());

    let res = app
        .call(
            Request::builder()
                .method(Method::DELETE)
                .path("/products/1")
                .header("x-api-key", "secret"),
        )
        .await
        .unwrap();
    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*log.lock(), ["B.pre", "B.post"]);
}

#[tokio::test]
async fn global_after_skipped_when_route_guard_answers() {
    let log = Log::default();
    let sink = RecordingSink::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let app = Router::new()
        .on(Method::GET, "/products/{id}", move |_req: Request| {
            let calls = Arc::clone(&counted);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                "found"
            }
        })
        .layer(
            ActionHookStage::new(Recorder { name: "A", log: Arc::clone(&log) })
                .with_sink(sink.clone()),
        )
        .route_layer(
            Method::GET,
            "/products/{id}",
            ActionHookStage::new(Guard::new(|req: &Request| {
                (req.param("id") == Some("1")).then(|| Response::status(StatusCode::NOT_FOUND))
            })),
        )
        .build()
        .unwrap();

    let res = app.call(Request::builder().path("/products/1")).await.unwrap();
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(*log.lock(), ["A.pre"]);
    assert!(sink.events().is_empty());

    let res = app.call(Request::builder().path("/products/2")).await.unwrap();
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(*log.lock(), ["A.pre", "A.pre", "A.post"]);
    assert_eq!(
        sink.events(),
        vec![PipelineEvent::ActionExecuted { route: "/products/2".to_owned() }]
    );
}

#[tokio::test]
async fn route_hook_skips_other_methods_on_same_path() {
    let log = Log::default();

    let app = Router::new()
        .on(Method::GET, "/products/{id}", |_req: Request| async { "product" })
        .on(Method::DELETE, "/products/{id}", |_req: Request| async { StatusCode::NO_CONTENT })
        .layer(recorder("A", &log))
        .route_layer(Method::GET, "/products/{id}", recorder("B", &log))
        .build()
        .unwrap();

    app.call(Request::builder().method(Method::DELETE).path("/products/1"))
        .await
        .unwrap();
    assert_eq!(*log.lock(), ["A.pre", "A.post"]);

    log.lock().clear();
    app.call(Request::builder().path("/products/1")).await.unwrap();
    assert_eq!(*log.lock(), ["A.pre", "B.pre", "B.post", "A.post"]);
}

#[tokio::test]
async fn handler_fault_is_timed_and_propagated() {
    let clock = ManualClock::default();
    let sink = RecordingSink::new();
    let log = Log::default();
    let slow = clock.clone();

    let app = Router::new()
        .on(Method::POST, "/products", move |_req: Request| {
            let clock = slow.clone();
            async move {
                clock.advance(Duration::from_millis(250));
                Err::<Response, _>(std::io::Error::other("unique constraint failed"))
            }
        })
        .layer(ProfilingStage::new().with_clock(clock.clone()).with_sink(sink.clone()))
        .layer(recorder("A", &log))
        .build()
        .unwrap();

    let err = app
        .call(Request::builder().method(Method::POST).path("/products"))
        .await
        .unwrap_err();

    assert!(matches!(err, tollgate::Error::Handler(_)));
    assert_eq!(sink.timings(), vec![("/products".to_owned(), Duration::from_millis(250))]);
    assert_eq!(*log.lock(), ["A.pre"]);
}

#[tokio::test]
async fn stage_sees_arguments_snapshot() {
    struct Capture(Arc<Mutex<Option<serde_json::Value>>>);

    #[async_trait]
    impl Middleware for Capture {
        async fn handle(
            &self,
            req: Request,
            next: tollgate::middleware::Next<'_>,
        ) -> Result<Response, tollgate::Error> {
            *self.0.lock() = Some(req.args().clone());
            next.run(req).await
        }
    }

    let seen = Arc::new(Mutex::new(None));
    let app = Router::new()
        .on(Method::GET, "/products/{id}", |_req: Request| async { "ok" })
        .route_layer(Method::GET, "/products/{id}", Capture(Arc::clone(&seen)))
        .build()
        .unwrap();

    app.call(Request::builder().path("/products/3").query("fields=name,sku"))
        .await
        .unwrap();

    assert_eq!(
        seen.lock().clone(),
        Some(serde_json::json!({ "id": "3", "fields": "name,sku" }))
    );
}
