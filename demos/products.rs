//! In-memory products API behind the full tollgate pipeline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example products
//!
//! Try:
//!   curl http://localhost:3000/products
//!   curl http://localhost:3000/products/1
//!   curl -X POST http://localhost:3000/products \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"lamp","price":19.5}'
//!   curl -X DELETE http://localhost:3000/products/1
//!
//! The sixth request inside ten seconds answers `429`. Tune with
//! `TOLLGATE_RATE_LIMIT` and `TOLLGATE_RATE_WINDOW` (e.g. `30s`).

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use tollgate::middleware::{
    ActionHookStage, LogActivity, LogSensitiveAction, ProfilingStage, RateLimiter,
};
use tollgate::{Config, Method, Request, Response, Router, Server, StatusCode};

#[derive(Clone, Serialize)]
struct Product {
    id: u32,
    name: String,
    price: f64,
}

#[derive(Deserialize)]
struct NewProduct {
    name: String,
    price: f64,
}

#[derive(Default)]
struct Store {
    next_id: u32,
    products: BTreeMap<u32, Product>,
}

type Shared = Arc<Mutex<Store>>;

#[tokio::main]
async fn main() -> Result<(), tollgate::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let store = Shared::default();
    store.lock().insert("desk", 120.0);

    let app = Router::new()
        .on(Method::GET, "/products", with(store.clone(), list_products))
        .on(Method::GET, "/products/{id}", with(store.clone(), get_product))
        .on(Method::POST, "/products", with(store.clone(), create_product))
        .on(Method::DELETE, "/products/{id}", with(store.clone(), delete_product))
        .layer(RateLimiter::new(config.rate_limit)?)
        .layer(ProfilingStage::new())
        .layer(ActionHookStage::new(LogActivity))
        .route_layer(Method::GET, "/products/{id}", ActionHookStage::new(LogSensitiveAction));

    Server::from_config(&config).serve(app).await
}

impl Store {
    fn insert(&mut self, name: &str, price: f64) -> Product {
        self.next_id += 1;
        let product = Product { id: self.next_id, name: name.to_owned(), price };
        self.products.insert(product.id, product.clone());
        product
    }
}

/// Binds a handler to the shared store.
fn with<F>(
    store: Shared,
    f: F,
) -> impl Fn(Request) -> std::future::Ready<Response> + Send + Sync + 'static
where
    F: Fn(&Shared, &Request) -> Response + Send + Sync + 'static,
{
    move |req| std::future::ready(f(&store, &req))
}

fn id_of(req: &Request) -> Option<u32> {
    req.param("id")?.parse().ok()
}

fn to_json<T: Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(bytes) => Response::json(bytes),
        Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// GET /products
fn list_products(store: &Shared, _req: &Request) -> Response {
    let products: Vec<Product> = store.lock().products.values().cloned().collect();
    to_json(&products)
}

// GET /products/{id}
fn get_product(store: &Shared, req: &Request) -> Response {
    let Some(id) = id_of(req) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    match store.lock().products.get(&id) {
        Some(product) => to_json(product),
        None => Response::status(StatusCode::NOT_FOUND),
    }
}

// POST /products
fn create_product(store: &Shared, req: &Request) -> Response {
    let Ok(input) = serde_json::from_slice::<NewProduct>(req.body()) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    let product = store.lock().insert(&input.name, input.price);
    let location = format!("/products/{}", product.id);

    match serde_json::to_vec(&product) {
        Ok(bytes) => Response::builder()
            .status(StatusCode::CREATED)
            .header("location", &location)
            .json(bytes),
        Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// DELETE /products/{id} → 204 No Content
fn delete_product(store: &Shared, req: &Request) -> Response {
    let Some(id) = id_of(req) else {
        return Response::status(StatusCode::BAD_REQUEST);
    };
    match store.lock().products.remove(&id) {
        Some(_) => Response::status(StatusCode::NO_CONTENT),
        None => Response::status(StatusCode::NOT_FOUND),
    }
}
