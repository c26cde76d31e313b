//! The HTTP surface of the dashboard.
//!
//! Sessions live in memory only and are identified by a random cookie. Every dashboard request
//! rebuilds its page from the upload stored in the session.

use crate::auth::{Authenticator, Verdict};
use crate::dashboard::{self, Analysis, Notice, Selection};
use crate::render;
use crate::trend::Period;
use crate::{Config, Result};
use anyhow::Context;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "insights_session";
const UPLOAD_FIELD: &str = "file";

/// What the server remembers about one browser.
#[derive(Debug, Default, Clone)]
struct Session {
    authenticated: bool,
    /// Raw workbook bytes, one per analysis type.
    uploads: HashMap<Analysis, Vec<u8>>,
    /// Shown once on the next dashboard render.
    flash: Option<Notice>,
}

/// In-memory sessions keyed by the cookie value.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    fn with<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, Session>) -> R) -> R {
        // A panic while holding the lock leaves plain data behind, so recover it.
        let mut sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut sessions)
    }

    /// Marks `existing` as authenticated, or starts a new authenticated session.
    pub fn authenticate(&self, existing: Option<Uuid>) -> Uuid {
        self.with(|sessions| {
            let id = existing
                .filter(|id| sessions.contains_key(id))
                .unwrap_or_else(Uuid::new_v4);
            sessions.entry(id).or_default().authenticated = true;
            id
        })
    }

    pub fn is_authenticated(&self, id: &Uuid) -> bool {
        self.with(|sessions| sessions.get(id).is_some_and(|s| s.authenticated))
    }

    pub fn remove(&self, id: &Uuid) {
        self.with(|sessions| sessions.remove(id));
    }

    /// Replaces the stored upload of `analysis`.
    pub fn store_upload(&self, id: &Uuid, analysis: Analysis, bytes: Vec<u8>) {
        self.with(|sessions| {
            if let Some(session) = sessions.get_mut(id) {
                session.uploads.insert(analysis, bytes);
            }
        })
    }

    /// A copy of the stored upload, so no lock is held while the page is built.
    pub fn upload(&self, id: &Uuid, analysis: Analysis) -> Option<Vec<u8>> {
        self.with(|sessions| sessions.get(id)?.uploads.get(&analysis).cloned())
    }

    pub fn set_flash(&self, id: &Uuid, notice: Notice) {
        self.with(|sessions| {
            if let Some(session) = sessions.get_mut(id) {
                session.flash = Some(notice);
            }
        })
    }

    pub fn take_flash(&self, id: &Uuid) -> Option<Notice> {
        self.with(|sessions| sessions.get_mut(id)?.flash.take())
    }
}

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    auth: Authenticator,
    sessions: SessionStore,
}

impl AppState {
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            sessions: SessionStore::default(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn authenticated_session(&self, headers: &HeaderMap) -> Option<Uuid> {
        session_id(headers).filter(|id| self.sessions.is_authenticated(id))
    }
}

/// Reads the session id from the request cookies.
fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

fn session_cookie(id: &Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn with_cookie(response: impl IntoResponse, cookie: String) -> Response {
    let mut response = response.into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

fn dashboard_location(analysis: Analysis) -> String {
    format!("/dashboard?analysis={analysis}")
}

/// An unknown `analysis` or `period` value gets the styled error page.
fn bad_query(rejection: QueryRejection) -> Response {
    let message = rejection.body_text();
    warn!("Rejected query string: {message}");
    (
        rejection.status(),
        Html(render::error_page(Analysis::default(), &message)),
    )
        .into_response()
}

/// Builds the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/dashboard", get(show_dashboard))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds to the configured address and serves until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let addr = config.bind()?;
    let state = AppState::new(Authenticator::new(config.auth_code()));
    let app = router(state, config.max_upload_bytes());

    info!("Attempting to bind server to http://{addr}");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to bind to {addr}"))?;
    info!("Dashboard available at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The server stopped unexpectedly")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// `GET /`
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.authenticated_session(&headers).is_some() {
        return Redirect::to(&dashboard_location(Analysis::default())).into_response();
    }
    Html(render::login_page(None)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    code: String,
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth.verify(&form.code) {
        Verdict::Granted => {
            let id = state.sessions.authenticate(session_id(&headers));
            debug!("Session {id} authenticated");
            with_cookie(
                Redirect::to(&dashboard_location(Analysis::default())),
                session_cookie(&id),
            )
        }
        Verdict::Denied { notice } => Html(render::login_page(notice.as_deref())).into_response(),
    }
}

/// `POST /logout`
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.remove(&id);
        debug!("Session {id} ended");
    }
    with_cookie(Redirect::to("/"), expired_cookie())
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    analysis: Analysis,
    outlet: Option<String>,
    #[serde(default)]
    period: Period,
}

/// `GET /dashboard`
pub async fn show_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: std::result::Result<Query<DashboardQuery>, QueryRejection>,
) -> Response {
    let Some(id) = state.authenticated_session(&headers) else {
        return Redirect::to("/").into_response();
    };
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_query(rejection),
    };
    let analysis = query.analysis;
    let upload = state.sessions.upload(&id, analysis);
    let flash = state.sessions.take_flash(&id);
    let selection = Selection {
        outlet: query.outlet.filter(|o| !o.is_empty()),
        period: query.period,
    };

    let page = match dashboard::build(analysis, &selection, upload.as_deref()) {
        Ok(mut page) => {
            if let Some(notice) = flash {
                page.notices.insert(0, notice);
            }
            page
        }
        Err(e) => {
            warn!("Unable to build the {analysis} dashboard: {e:#}");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(render::error_page(analysis, &format!("{e:#}"))),
            )
                .into_response();
        }
    };
    match render::dashboard_page(&page) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!("Unable to render the {analysis} dashboard: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render::error_page(analysis, &format!("{e:#}"))),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    analysis: Analysis,
}

/// Checks the client-side file name. Returns the notice to show when the file is refused.
fn check_file_name(file_name: Option<&str>) -> std::result::Result<(), Notice> {
    match file_name {
        None | Some("") => Err(Notice::warning("Please choose a file to upload.")),
        Some(name) if name.to_ascii_lowercase().ends_with(".xlsx") => Ok(()),
        Some(name) => Err(Notice::warning(format!(
            "'{name}' is not an .xlsx file. Only .xlsx files are supported."
        ))),
    }
}

/// `POST /upload`
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    mut multipart: Multipart,
) -> Response {
    let Some(id) = state.authenticated_session(&headers) else {
        return Redirect::to("/").into_response();
    };
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_query(rejection),
    };
    let analysis = query.analysis;
    let location = dashboard_location(analysis);

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                state
                    .sessions
                    .set_flash(&id, Notice::warning("Please choose a file to upload."));
                break;
            }
            Err(e) => {
                warn!("Unable to read the upload: {e}");
                return (e.status(), e.body_text()).into_response();
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        if let Err(notice) = check_file_name(file_name.as_deref()) {
            state.sessions.set_flash(&id, notice);
            break;
        }
        match field.bytes().await {
            Ok(bytes) => {
                info!(
                    "Received {} bytes for the {analysis} dashboard from '{}'",
                    bytes.len(),
                    file_name.unwrap_or_default()
                );
                state.sessions.store_upload(&id, analysis, bytes.to_vec());
            }
            Err(e) => {
                warn!("Unable to read the upload: {e}");
                return (e.status(), e.body_text()).into_response();
            }
        }
        break;
    }
    Redirect::to(&location).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{products_workbook, sales_workbook, TestEnv};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const CODE: &str = "2580";
    const BOUNDARY: &str = "insights-upload-boundary";

    fn state() -> AppState {
        AppState::new(Authenticator::new(CODE))
    }

    fn cookie_headers(id: &Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}")).unwrap(),
        );
        headers
    }

    async fn body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    /// Logs in through the router and returns the `Cookie` header value for the new session.
    async fn log_in(app: &Router, code: &str) -> String {
        let request = Request::post("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("code={code}")))
            .unwrap();
        let response = send(app, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn get(uri: &str, cookie: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn upload_request(
        analysis: &str,
        cookie: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{UPLOAD_FIELD}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::post(format!("/upload?analysis={analysis}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_session_id_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(session_id(&cookie_headers(&id)), Some(id));
        assert_eq!(session_id(&HeaderMap::new()), None);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("insights_session=not-a-uuid"),
        );
        assert_eq!(session_id(&headers), None);
    }

    #[tokio::test]
    async fn test_login_with_correct_code() {
        let state = state();
        let form = LoginForm {
            code: CODE.to_string(),
        };
        let response = login(State(state.clone()), HeaderMap::new(), Form(form)).await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/dashboard?analysis=sales");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        let id = session_id(&headers).unwrap();
        assert!(state.sessions().is_authenticated(&id));
    }

    #[tokio::test]
    async fn test_login_with_wrong_and_empty_code() {
        let form = LoginForm {
            code: "0000".to_string(),
        };
        let response = login(State(state()), HeaderMap::new(), Form(form)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(response).await.contains(crate::auth::INVALID_CODE));

        let form = LoginForm {
            code: String::new(),
        };
        let response = login(State(state()), HeaderMap::new(), Form(form)).await;
        assert!(!body(response).await.contains(crate::auth::INVALID_CODE));
    }

    #[tokio::test]
    async fn test_dashboard_requires_login() {
        let response = show_dashboard(
            State(state()),
            cookie_headers(&Uuid::new_v4()),
            Ok(Query(DashboardQuery::default())),
        )
        .await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_dashboard_without_upload() {
        let state = state();
        let id = state.sessions().authenticate(None);
        let response = show_dashboard(
            State(state),
            cookie_headers(&id),
            Ok(Query(DashboardQuery::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(response).await.contains(dashboard::UPLOAD_PROMPT));
    }

    #[tokio::test]
    async fn test_dashboard_with_unreadable_upload() {
        let state = state();
        let id = state.sessions().authenticate(None);
        state
            .sessions()
            .store_upload(&id, Analysis::Products, b"not a workbook".to_vec());
        let query = DashboardQuery {
            analysis: Analysis::Products,
            ..DashboardQuery::default()
        };
        let response =
            show_dashboard(State(state.clone()), cookie_headers(&id), Ok(Query(query))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body(response).await.contains("xlsx"));

        // the sales upload is separate and still empty
        let response = show_dashboard(
            State(state),
            cookie_headers(&id),
            Ok(Query(DashboardQuery::default())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_flash_is_shown_once() {
        let state = state();
        let id = state.sessions().authenticate(None);
        state
            .sessions()
            .set_flash(&id, Notice::warning("Only once please"));
        let first = show_dashboard(
            State(state.clone()),
            cookie_headers(&id),
            Ok(Query(DashboardQuery::default())),
        )
        .await;
        assert!(body(first).await.contains("Only once please"));
        let second = show_dashboard(
            State(state),
            cookie_headers(&id),
            Ok(Query(DashboardQuery::default())),
        )
        .await;
        assert!(!body(second).await.contains("Only once please"));
    }

    #[tokio::test]
    async fn test_logout_forgets_session() {
        let state = state();
        let id = state.sessions().authenticate(None);
        let response = logout(State(state.clone()), cookie_headers(&id)).await;
        assert!(response.status().is_redirection());
        assert!(!state.sessions().is_authenticated(&id));
        let index = index(State(state), cookie_headers(&id)).await;
        assert!(body(index).await.contains("action=\"/login\""));
    }

    #[test]
    fn test_upload_replaces_previous() {
        let store = SessionStore::default();
        let id = store.authenticate(None);
        store.store_upload(&id, Analysis::Sales, vec![1]);
        store.store_upload(&id, Analysis::Sales, vec![2, 3]);
        assert_eq!(store.upload(&id, Analysis::Sales), Some(vec![2, 3]));
        assert_eq!(store.upload(&id, Analysis::Products), None);
        // unknown sessions are ignored
        store.store_upload(&Uuid::new_v4(), Analysis::Sales, vec![9]);
        assert_eq!(store.authenticate(Some(id)), id);
    }

    #[tokio::test]
    async fn test_configured_code_opens_a_session() {
        let env = TestEnv::new().await;
        let config = env.config();
        let state = AppState::new(Authenticator::new(config.auth_code()));
        let app = router(state, config.max_upload_bytes());
        let cookie = log_in(&app, config.auth_code()).await;
        let response = send(&app, get("/", &cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard?analysis=sales");
    }

    #[tokio::test]
    async fn test_upload_through_router() {
        let app = router(state(), 1024 * 1024);
        let cookie = log_in(&app, CODE).await;

        let request = upload_request("products", &cookie, "products.xlsx", &products_workbook());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard?analysis=products");

        let response = send(&app, get("/dashboard?analysis=products", &cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = body(response).await;
        assert!(page.contains("$24.25"));
        assert!(!page.contains(dashboard::UPLOAD_PROMPT));

        // each analysis keeps its own upload
        let page = body(send(&app, get("/dashboard?analysis=sales", &cookie)).await).await;
        assert!(page.contains(dashboard::UPLOAD_PROMPT));
    }

    #[tokio::test]
    async fn test_refused_upload_keeps_previous() {
        let app = router(state(), 1024 * 1024);
        let cookie = log_in(&app, CODE).await;

        let request = upload_request("sales", &cookie, "sales.csv", b"PCNumber,TrDate\n");
        let response = send(&app, request).await;
        assert_eq!(location(&response), "/dashboard?analysis=sales");
        let page = body(send(&app, get("/dashboard?analysis=sales", &cookie)).await).await;
        assert!(page.contains("is not an .xlsx file"));
        assert!(page.contains(dashboard::UPLOAD_PROMPT));

        let request = upload_request("sales", &cookie, "sales.xlsx", &sales_workbook());
        send(&app, request).await;
        let request = upload_request("sales", &cookie, "sales.csv", b"PCNumber,TrDate\n");
        send(&app, request).await;
        let page = body(send(&app, get("/dashboard?analysis=sales", &cookie)).await).await;
        assert!(page.contains("is not an .xlsx file"));
        assert!(page.contains("$4.00M"));

        // the notice is shown once
        let page = body(send(&app, get("/dashboard?analysis=sales", &cookie)).await).await;
        assert!(!page.contains("is not an .xlsx file"));
    }

    #[tokio::test]
    async fn test_upload_requires_login() {
        let app = router(state(), 1024 * 1024);
        let cookie = format!("{SESSION_COOKIE}={}", Uuid::new_v4());
        let request = upload_request("sales", &cookie, "sales.xlsx", &sales_workbook());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_upload_over_the_body_limit() {
        let app = router(state(), 256);
        let cookie = log_in(&app, CODE).await;
        let request = upload_request("sales", &cookie, "sales.xlsx", &sales_workbook());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let page = body(send(&app, get("/dashboard?analysis=sales", &cookie)).await).await;
        assert!(page.contains(dashboard::UPLOAD_PROMPT));
    }

    #[tokio::test]
    async fn test_unknown_query_values_render_error_page() {
        let app = router(state(), 1024 * 1024);
        let cookie = log_in(&app, CODE).await;

        let response = send(&app, get("/dashboard?period=fortnightly", &cookie)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let page = body(response).await;
        assert!(page.contains("<!DOCTYPE html>"));
        assert!(page.contains("class=\"notice error\""));
        assert!(page.contains("fortnightly"));

        let request = upload_request("inventory", &cookie, "sales.xlsx", &sales_workbook());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(response).await.contains("inventory"));
    }

    #[test]
    fn test_check_file_name() {
        assert!(check_file_name(Some("sales.xlsx")).is_ok());
        assert!(check_file_name(Some("SALES.XLSX")).is_ok());
        assert!(check_file_name(Some("sales.csv")).is_err());
        assert!(check_file_name(Some("")).is_err());
        assert!(check_file_name(None).is_err());
    }
}
