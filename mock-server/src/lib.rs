use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockUser {
    pub id: u64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub image: String,
    pub age: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    pub price: f64,
    #[serde(rename = "isDeleted", skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub expires_in_mins: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshInput {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ProductInput {
    pub title: Option<String>,
    pub price: Option<f64>,
}

#[derive(Deserialize)]
pub struct Page {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

/// Server behaviour switches.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockOptions {
    /// Answer logins with the older `token` field instead of `accessToken`.
    pub legacy_token_field: bool,
}

pub struct MockState {
    options: MockOptions,
    users: Vec<MockUser>,
    access_tokens: RwLock<HashMap<String, u64>>,
    refresh_tokens: RwLock<HashMap<String, u64>>,
    products: RwLock<BTreeMap<u64, Product>>,
}

pub type Db = Arc<MockState>;

pub fn seed_users() -> Vec<MockUser> {
    vec![
        MockUser {
            id: 1,
            username: "emilys".to_string(),
            password: "emilyspass".to_string(),
            email: "emily.johnson@x.dummyjson.com".to_string(),
            first_name: "Emily".to_string(),
            last_name: "Johnson".to_string(),
            gender: "female".to_string(),
            image: "https://dummyjson.com/icon/emilys/128".to_string(),
            age: 28,
        },
        MockUser {
            id: 2,
            username: "michaelw".to_string(),
            password: "michaelwpass".to_string(),
            email: "michael.williams@x.dummyjson.com".to_string(),
            first_name: "Michael".to_string(),
            last_name: "Williams".to_string(),
            gender: "male".to_string(),
            image: "https://dummyjson.com/icon/michaelw/128".to_string(),
            age: 35,
        },
    ]
}

fn seed_products() -> BTreeMap<u64, Product> {
    [
        (1, "Essence Mascara Lash Princess", 9.99),
        (2, "Eyeshadow Palette with Mirror", 19.99),
        (3, "Powder Canister", 14.99),
    ]
    .into_iter()
    .map(|(id, title, price)| {
        (
            id,
            Product {
                id,
                title: title.to_string(),
                price,
                is_deleted: None,
            },
        )
    })
    .collect()
}

pub fn app() -> Router {
    app_with(MockOptions::default())
}

pub fn app_with(options: MockOptions) -> Router {
    let db: Db = Arc::new(MockState {
        options,
        users: seed_users(),
        access_tokens: RwLock::new(HashMap::new()),
        refresh_tokens: RwLock::new(HashMap::new()),
        products: RwLock::new(seed_products()),
    });
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(current_user))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(revoke))
        .route("/auth/products", get(list_products_authenticated))
        .route("/products", get(list_products))
        .route("/products/add", post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/headers", get(echo_headers))
        .route("/plain", get(plain_text))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, MockOptions::default()).await
}

pub async fn run_with(listener: TcpListener, options: MockOptions) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(options)).await
}

type Reply = (StatusCode, Json<Value>);

fn message(status: StatusCode, text: &str) -> Reply {
    (status, Json(json!({ "message": text })))
}

async fn issue_tokens(db: &MockState, user_id: u64) -> (String, String) {
    let access = Uuid::new_v4().to_string();
    let refresh = Uuid::new_v4().to_string();
    db.access_tokens.write().await.insert(access.clone(), user_id);
    db.refresh_tokens.write().await.insert(refresh.clone(), user_id);
    (access, refresh)
}

async fn bearer_user(db: &MockState, headers: &HeaderMap) -> Result<MockUser, Reply> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| message(StatusCode::UNAUTHORIZED, "Access Token is required"))?;
    let user_id = db
        .access_tokens
        .read()
        .await
        .get(token)
        .copied()
        .ok_or_else(|| message(StatusCode::UNAUTHORIZED, "Invalid/Expired Token!"))?;
    db.users
        .iter()
        .find(|user| user.id == user_id)
        .cloned()
        .ok_or_else(|| message(StatusCode::NOT_FOUND, "User not found"))
}

async fn login(State(db): State<Db>, Json(input): Json<LoginInput>) -> Reply {
    let Some(user) = db
        .users
        .iter()
        .find(|user| user.username == input.username && user.password == input.password)
    else {
        return message(StatusCode::BAD_REQUEST, "Invalid credentials");
    };

    let (access, refresh) = issue_tokens(&db, user.id).await;
    let mut body = json!(user);
    let token_field = if db.options.legacy_token_field {
        "token"
    } else {
        "accessToken"
    };
    body[token_field] = json!(access);
    body["refreshToken"] = json!(refresh);
    if let Some(mins) = input.expires_in_mins {
        body["expiresInMins"] = json!(mins);
    }
    (StatusCode::OK, Json(body))
}

async fn current_user(State(db): State<Db>, headers: HeaderMap) -> Reply {
    match bearer_user(&db, &headers).await {
        Ok(user) => (StatusCode::OK, Json(json!(user))),
        Err(reply) => reply,
    }
}

async fn refresh(State(db): State<Db>, Json(input): Json<RefreshInput>) -> Reply {
    let Some(user_id) = db.refresh_tokens.write().await.remove(&input.refresh_token) else {
        return message(StatusCode::FORBIDDEN, "Invalid refresh token");
    };
    let (access, refresh) = issue_tokens(&db, user_id).await;
    (
        StatusCode::OK,
        Json(json!({ "accessToken": access, "refreshToken": refresh })),
    )
}

async fn revoke(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match token {
        Some(token) if db.access_tokens.write().await.remove(token).is_some() => {
            message(StatusCode::OK, "Logged out")
        }
        _ => message(StatusCode::UNAUTHORIZED, "Invalid/Expired Token!"),
    }
}

async fn page_of(db: &MockState, page: &Page) -> Value {
    let products = db.products.read().await;
    let skip = page.skip.unwrap_or(0);
    let limit = page.limit.unwrap_or(30);
    let items: Vec<&Product> = products.values().skip(skip).take(limit).collect();
    json!({
        "products": items,
        "total": products.len(),
        "skip": skip,
        "limit": items.len(),
    })
}

async fn list_products(State(db): State<Db>, Query(page): Query<Page>) -> Reply {
    (StatusCode::OK, Json(page_of(&db, &page).await))
}

async fn list_products_authenticated(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(page): Query<Page>,
) -> Reply {
    if let Err(reply) = bearer_user(&db, &headers).await {
        return reply;
    }
    (StatusCode::OK, Json(page_of(&db, &page).await))
}

fn product_not_found(id: u64) -> Reply {
    message(
        StatusCode::NOT_FOUND,
        &format!("Product with id '{id}' not found"),
    )
}

async fn get_product(State(db): State<Db>, Path(id): Path<u64>) -> Reply {
    match db.products.read().await.get(&id) {
        Some(product) => (StatusCode::OK, Json(json!(product))),
        None => product_not_found(id),
    }
}

async fn create_product(State(db): State<Db>, Json(input): Json<ProductInput>) -> Reply {
    let Some(title) = input.title else {
        return message(StatusCode::BAD_REQUEST, "title is required");
    };
    let mut products = db.products.write().await;
    let id = products.keys().next_back().map_or(1, |last| last + 1);
    let product = Product {
        id,
        title,
        price: input.price.unwrap_or(0.0),
        is_deleted: None,
    };
    products.insert(id, product.clone());
    (StatusCode::CREATED, Json(json!(product)))
}

async fn update_product(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<ProductInput>,
) -> Reply {
    let mut products = db.products.write().await;
    let Some(product) = products.get_mut(&id) else {
        return product_not_found(id);
    };
    if let Some(title) = input.title {
        product.title = title;
    }
    if let Some(price) = input.price {
        product.price = price;
    }
    (StatusCode::OK, Json(json!(product)))
}

async fn delete_product(State(db): State<Db>, Path(id): Path<u64>) -> Reply {
    match db.products.write().await.remove(&id) {
        Some(mut product) => {
            product.is_deleted = Some(true);
            (StatusCode::OK, Json(json!(product)))
        }
        None => product_not_found(id),
    }
}

async fn echo_headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    Json(
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
    )
}

async fn plain_text() -> &'static str {
    "OK"
}
