//! In-process 115 API stand-in for tests / 测试用模拟服务
//!
//! Serves every endpoint the session touches from one local address and
//! records what the client sent, so tests can assert on the wire shape.

use axum::body::Bytes;
use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CryptoError;

use super::config::{Endpoints, Pan115Config};
use super::crypto::PayloadCodec;
use super::ecdh::{unpack_token, EcdhCipher, SessionCipher};

type Params = HashMap<String, String>;

const PLAIN_KEY_SIZE: usize = 16;

/// Reversible test codec: `base64(key || input ^ key)`
#[derive(Default)]
pub struct PlainCodec {
    keys: Mutex<Vec<Vec<u8>>>,
}

impl PlainCodec {
    /// Every key handed out so far, in order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.keys.lock().unwrap().clone()
    }

    fn xor(input: &[u8], key: &[u8]) -> Vec<u8> {
        input.iter().zip(key.iter().cycle()).map(|(b, k)| b ^ k).collect()
    }

    fn seal(input: &[u8], key: &[u8]) -> String {
        let mut out = key.to_vec();
        out.extend(Self::xor(input, key));
        BASE64.encode(out)
    }

    /// Returns the embedded key and the plain bytes.
    fn open(input: &str) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let raw = BASE64.decode(input)?;
        if raw.len() < PLAIN_KEY_SIZE {
            return Err(CryptoError::ShortPayload);
        }
        let (key, body) = raw.split_at(PLAIN_KEY_SIZE);
        Ok((key.to_vec(), Self::xor(body, key)))
    }
}

impl PayloadCodec for PlainCodec {
    fn generate_key(&self) -> Vec<u8> {
        let mut key = vec![0u8; PLAIN_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        self.keys.lock().unwrap().push(key.clone());
        key
    }

    fn encode(&self, input: &[u8], key: &[u8]) -> Result<String, CryptoError> {
        Ok(Self::seal(input, key))
    }

    fn decode(&self, input: &str, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let (embedded, plain) = Self::open(input)?;
        if embedded != key {
            return Err(CryptoError::Padding);
        }
        Ok(plain)
    }
}

/// One recorded `downurl` request
#[derive(Debug, Clone)]
pub struct DownloadCall {
    pub data: String,
    pub user_agent: String,
    pub t: String,
    pub payload: Value,
}

#[derive(Default)]
struct Recorded {
    list_pages: VecDeque<Response>,
    list_calls: Vec<Params>,
    versions: Option<Value>,
    login_check: Option<Value>,
    login_check_cookies: Vec<String>,
    qrcode_login: Option<Value>,
    qrcode_login_forms: Vec<Params>,
    qrcode_token: Option<Value>,
    qrcode_status: Option<Value>,
    qrcode_status_queries: Vec<Params>,
    download_payload: Option<Value>,
    download_envelope: Option<Value>,
    download_calls: Vec<DownloadCall>,
    upload_info: Option<Value>,
    upload_init: VecDeque<Value>,
    upload_init_calls: Vec<Params>,
}

struct Shared {
    server_key: SecretKey,
    recorded: Mutex<Recorded>,
}

type AppState = State<Arc<Shared>>;

pub struct MockProvider {
    base: String,
    shared: Arc<Shared>,
}

impl MockProvider {
    pub async fn start() -> Self {
        // RUST_LOG=pan115_session=debug shows the session's request trace
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into()))
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();

        let shared = Arc::new(Shared {
            server_key: SecretKey::random(&mut rand::rngs::OsRng),
            recorded: Mutex::new(Recorded::default()),
        });

        let app = Router::new()
            .route("/files", get(list_files))
            .route("/1/web/1.0/api/getMultiVer", get(versions))
            .route("/app/1.0/web/1.0/check/sso", get(login_check))
            .route("/app/1.0/linux/1.0/login/qrcode", post(qrcode_login))
            .route("/app/1.0/tv/1.0/login/qrcode", post(qrcode_login))
            .route("/api/1.0/web/1.0/token/", get(qrcode_token))
            .route("/get/status/", get(qrcode_status))
            .route("/app/chrome/downurl", post(download))
            .route("/app/uploadinfo", get(upload_info))
            .route("/4.0/initupload.php", post(upload_init))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            shared,
        }
    }

    /// Session config pointed at this mock, carrying its ECDH public key
    pub fn config(&self, cookie: &str) -> Pan115Config {
        let server_pub = self.shared.server_key.public_key().to_encoded_point(true);
        Pan115Config {
            cookie: cookie.to_string(),
            ecdh_server_key: hex::encode(server_pub.as_bytes()),
            endpoints: Endpoints::single(&self.base),
            ..Default::default()
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        f(&mut self.shared.recorded.lock().unwrap())
    }

    pub fn push_list_page(&self, page: Value) {
        self.with(|r| r.list_pages.push_back(Json(page).into_response()));
    }

    pub fn push_list_raw(&self, body: &str) {
        let body = body.to_string();
        self.with(|r| r.list_pages.push_back(body.into_response()));
    }

    pub fn list_calls(&self) -> Vec<Params> {
        self.with(|r| r.list_calls.clone())
    }

    pub fn set_versions(&self, value: Value) {
        self.with(|r| r.versions = Some(value));
    }

    pub fn set_login_check(&self, value: Value) {
        self.with(|r| r.login_check = Some(value));
    }

    pub fn login_check_cookies(&self) -> Vec<String> {
        self.with(|r| r.login_check_cookies.clone())
    }

    pub fn set_qrcode_login(&self, value: Value) {
        self.with(|r| r.qrcode_login = Some(value));
    }

    pub fn qrcode_login_forms(&self) -> Vec<Params> {
        self.with(|r| r.qrcode_login_forms.clone())
    }

    pub fn set_qrcode_token(&self, value: Value) {
        self.with(|r| r.qrcode_token = Some(value));
    }

    pub fn set_qrcode_status(&self, value: Value) {
        self.with(|r| r.qrcode_status = Some(value));
    }

    pub fn qrcode_status_queries(&self) -> Vec<Params> {
        self.with(|r| r.qrcode_status_queries.clone())
    }

    /// Decrypted `data` to return, encoded with the key the client sent
    pub fn set_download_payload(&self, value: Value) {
        self.with(|r| {
            r.download_payload = Some(value);
            r.download_envelope = None;
        });
    }

    /// Whole response envelope, returned verbatim
    pub fn set_download_envelope(&self, value: Value) {
        self.with(|r| {
            r.download_envelope = Some(value);
            r.download_payload = None;
        });
    }

    pub fn download_calls(&self) -> Vec<DownloadCall> {
        self.with(|r| r.download_calls.clone())
    }

    pub fn set_upload_info(&self, value: Value) {
        self.with(|r| r.upload_info = Some(value));
    }

    /// Queue one decrypted init response; served in push order
    pub fn push_upload_init(&self, value: Value) {
        self.with(|r| r.upload_init.push_back(value));
    }

    /// Decrypted form of every init request received
    pub fn upload_init_calls(&self) -> Vec<Params> {
        self.with(|r| r.upload_init_calls.clone())
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn list_files(State(shared): AppState, Query(query): Query<Params>) -> Response {
    let mut recorded = shared.recorded.lock().unwrap();
    recorded.list_calls.push(query);
    recorded
        .list_pages
        .pop_front()
        .unwrap_or_else(|| Json(json!({ "state": true, "count": 0, "data": [] })).into_response())
}

async fn versions(State(shared): AppState) -> Json<Value> {
    let recorded = shared.recorded.lock().unwrap();
    Json(recorded.versions.clone().unwrap_or_else(|| json!({ "error": "", "data": {} })))
}

async fn login_check(State(shared): AppState, headers: HeaderMap) -> Json<Value> {
    let mut recorded = shared.recorded.lock().unwrap();
    recorded.login_check_cookies.push(header_str(&headers, header::COOKIE));
    Json(
        recorded
            .login_check
            .clone()
            .unwrap_or_else(|| json!({ "state": 0, "message": "not login", "code": 990001 })),
    )
}

async fn qrcode_login(State(shared): AppState, Form(form): Form<Params>) -> Json<Value> {
    let mut recorded = shared.recorded.lock().unwrap();
    recorded.qrcode_login_forms.push(form);
    Json(recorded.qrcode_login.clone().unwrap_or_else(|| json!({ "state": 0, "code": 40101 })))
}

async fn qrcode_token(State(shared): AppState) -> Json<Value> {
    let recorded = shared.recorded.lock().unwrap();
    Json(recorded.qrcode_token.clone().unwrap_or_else(|| json!({ "state": 0 })))
}

async fn qrcode_status(State(shared): AppState, Query(query): Query<Params>) -> Json<Value> {
    let mut recorded = shared.recorded.lock().unwrap();
    recorded.qrcode_status_queries.push(query);
    Json(
        recorded
            .qrcode_status
            .clone()
            .unwrap_or_else(|| json!({ "state": 1, "data": { "status": 0 } })),
    )
}

async fn download(
    State(shared): AppState,
    Query(query): Query<Params>,
    headers: HeaderMap,
    Form(form): Form<Params>,
) -> Response {
    let data = form.get("data").cloned().unwrap_or_default();
    let Ok((key, plain)) = PlainCodec::open(&data) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut recorded = shared.recorded.lock().unwrap();
    recorded.download_calls.push(DownloadCall {
        data,
        user_agent: header_str(&headers, header::USER_AGENT),
        t: query.get("t").cloned().unwrap_or_default(),
        payload: serde_json::from_slice(&plain).unwrap_or(Value::Null),
    });

    if let Some(envelope) = &recorded.download_envelope {
        return Json(envelope.clone()).into_response();
    }
    let payload = recorded.download_payload.clone().unwrap_or_else(|| json!({}));
    let encoded = PlainCodec::seal(payload.to_string().as_bytes(), &key);
    Json(json!({ "state": true, "msg": "", "errno": 0, "data": encoded })).into_response()
}

async fn upload_info(State(shared): AppState) -> Json<Value> {
    let recorded = shared.recorded.lock().unwrap();
    Json(
        recorded
            .upload_info
            .clone()
            .unwrap_or_else(|| json!({ "state": true, "user_id": 0, "userkey": "" })),
    )
}

async fn upload_init(State(shared): AppState, Query(query): Query<Params>, body: Bytes) -> Response {
    let token = query.get("k_ec").cloned().unwrap_or_default();
    let Ok((client_pub, _)) = unpack_token(&token) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Ok(client_pub) = PublicKey::from_sec1_bytes(&client_pub) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let shared_secret = p256::ecdh::diffie_hellman(shared.server_key.to_nonzero_scalar(), client_pub.as_affine());
    let cipher = EcdhCipher::from_shared(Vec::new(), shared_secret.raw_secret_bytes().as_slice());
    let Ok(plain) = cipher.decrypt(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let form: Params = url::form_urlencoded::parse(&plain).into_owned().collect();
    let reply = {
        let mut recorded = shared.recorded.lock().unwrap();
        recorded.upload_init_calls.push(form);
        recorded
            .upload_init
            .pop_front()
            .unwrap_or_else(|| json!({ "status": 0, "statuscode": 0, "statusmsg": "no response queued" }))
    };
    match cipher.encrypt(reply.to_string().as_bytes()) {
        Ok(encrypted) => encrypted.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
