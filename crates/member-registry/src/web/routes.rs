//! HTTP route handlers.
//!
//! Thin adapters: extract the request, run the matching function from
//! [`crate::handlers`] against a per-request store, then render a page or
//! redirect with a flash message.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tower_sessions::Session;

use super::flash;
use super::state::AppState;
use super::templates::{EditTemplate, HtmlTemplate, IndexTemplate};
use crate::error::Result;
use crate::handlers::{self, EditPage, Outcome};
use crate::member::{EditForm, MemberForm};

/// Query string of the listing page.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Search text.
    pub q: Option<String>,
}

/// Member id from the request path.
///
/// Only a positive decimal integer matches; anything else is a 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberId(pub i64);

impl<S> FromRequestParts<S> for MemberId
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| StatusCode::NOT_FOUND)?;
        parse_member_id(&raw).map(Self).ok_or(StatusCode::NOT_FOUND)
    }
}

/// Parse a path segment as a member id.
///
/// Signs, whitespace, zero and values past `i64::MAX` are rejected.
#[must_use]
pub fn parse_member_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

/// `GET /` - list members, optionally filtered.
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SearchParams>,
) -> Result<Response> {
    let listing = state
        .with_store(move |store| handlers::search(store, params.q.as_deref()))
        .await?;
    let flashes = flash::take(&session).await?;
    Ok(HtmlTemplate(IndexTemplate::new(state.title(), flashes, listing)).into_response())
}

/// `POST /` - add a member.
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<MemberForm>,
) -> Result<Response> {
    let outcome = state
        .with_store(move |store| handlers::submit_new(store, &form))
        .await?;
    redirect(&session, outcome).await
}

/// `GET /edit/{id}` - show the edit form.
pub async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    MemberId(id): MemberId,
) -> Result<Response> {
    let page = state
        .with_store(move |store| handlers::show_edit(store, id))
        .await?;
    match page {
        EditPage::Form(member) => {
            let flashes = flash::take(&session).await?;
            Ok(HtmlTemplate(EditTemplate::new(state.title(), flashes, member)).into_response())
        }
        EditPage::Missing(outcome) => redirect(&session, outcome).await,
    }
}

/// `POST /edit/{id}` - save the edit form.
pub async fn edit_submit(
    State(state): State<AppState>,
    session: Session,
    MemberId(id): MemberId,
    Form(form): Form<EditForm>,
) -> Result<Response> {
    let outcome = state
        .with_store(move |store| handlers::submit_edit(store, id, &form))
        .await?;
    redirect(&session, outcome).await
}

/// `POST /delete/{id}` - delete a member.
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    MemberId(id): MemberId,
) -> Result<Response> {
    let outcome = state
        .with_store(move |store| handlers::remove(store, id))
        .await?;
    redirect(&session, outcome).await
}

async fn redirect(session: &Session, outcome: Outcome) -> Result<Response> {
    flash::push(session, outcome.flash).await?;
    Ok(Redirect::to(&outcome.location.path()).into_response())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::parse_member_id;
    use crate::config::Config;
    use crate::logging::init_test_logging;
    use crate::member::{MemberName, NewMember};
    use crate::storage::{MemberStore, Storage};
    use crate::web::{router, AppState};

    struct TestApp {
        app: Router,
        dir: PathBuf,
        db: PathBuf,
    }

    impl TestApp {
        fn new(name: &str) -> Self {
            init_test_logging();
            let dir = std::env::temp_dir().join(format!(
                "member_registry_routes_{}_{name}",
                std::process::id()
            ));
            let _ = std::fs::remove_dir_all(&dir);
            let db = dir.join("members.db");

            let mut config = Config::default();
            config.storage.database_path = Some(db.clone());
            let app = router(AppState::new(config));
            Self { app, dir, db }
        }

        fn store(&self) -> Storage {
            Storage::open(&self.db).unwrap()
        }

        fn seed(&self, name: &str, apartment: &str) -> i64 {
            let mut new = NewMember::named(MemberName::parse(name).unwrap());
            new.apartment = Some(apartment.to_string());
            self.store().create(&new).unwrap()
        }

        async fn send(&self, request: Request<Body>) -> axum::response::Response {
            self.app.clone().oneshot(request).await.unwrap()
        }
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap()
    }

    fn session_cookie(response: &axum::response::Response) -> String {
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Follow a redirect with the session cookie and return the page body.
    async fn follow(test: &TestApp, response: &axum::response::Response) -> String {
        let cookie = session_cookie(response);
        let page = test.send(get(location(response), Some(&cookie))).await;
        assert_eq!(page.status(), StatusCode::OK);
        body_text(page).await
    }

    #[tokio::test]
    async fn test_index_empty() {
        let test = TestApp::new("index_empty");

        let response = test.send(get("/", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Simple Member Registry"));
        assert!(html.contains("No members found."));
    }

    #[tokio::test]
    async fn test_create_member() {
        let test = TestApp::new("create");

        let response = test
            .send(post_form("/", "name=+Ali+&apartment=B-4&amount=150.5"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = follow(&test, &response).await;
        assert!(html.contains("added successfully"));
        assert!(html.contains("<td>Ali</td>"));
        assert!(html.contains("150.5"));

        let members = test.store().list(None).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Ali");
        assert_eq!(members[0].phone, None);
    }

    #[tokio::test]
    async fn test_create_blank_name_rejected() {
        let test = TestApp::new("create_blank");

        let response = test.send(post_form("/", "name=+++&phone=0555")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = follow(&test, &response).await;
        assert!(html.contains("name is required"));
        assert!(html.contains("class=\"flash flash-error\""));
        assert_eq!(test.store().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flash_shown_once() {
        let test = TestApp::new("flash_once");

        let response = test.send(post_form("/", "name=Ali")).await;
        let cookie = session_cookie(&response);

        let first = body_text(test.send(get("/", Some(&cookie))).await).await;
        assert!(first.contains("added successfully"));

        let second = body_text(test.send(get("/", Some(&cookie))).await).await;
        assert!(!second.contains("added successfully"));
    }

    #[tokio::test]
    async fn test_flash_survives_restart() {
        let test = TestApp::new("flash_restart");

        let response = test.send(post_form("/", "name=Ali")).await;
        let cookie = session_cookie(&response);
        assert_eq!(test.store().session_count().unwrap(), 1);

        let mut config = Config::default();
        config.storage.database_path = Some(test.db.clone());
        let restarted = router(AppState::new(config));

        let page = restarted.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert!(body_text(page).await.contains("added successfully"));
    }

    #[tokio::test]
    async fn test_search_filters_and_echoes_query() {
        let test = TestApp::new("search");
        test.seed("Ali", "B-4");
        test.seed("Sara", "C-1");

        let response = test.send(get("/?q=+B-4+", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("<td>Ali</td>"));
        assert!(!html.contains("<td>Sara</td>"));
        assert!(html.contains("value=\"B-4\""));
    }

    #[tokio::test]
    async fn test_edit_page_shows_member() {
        let test = TestApp::new("edit_page");
        let id = test.seed("Ali", "B-4");

        let response = test.send(get(&format!("/edit/{id}"), None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains(&format!("action=\"/edit/{id}\"")));
        assert!(html.contains("value=\"Ali\""));
        assert!(html.contains("value=\"B-4\""));
    }

    #[tokio::test]
    async fn test_edit_page_missing_member() {
        let test = TestApp::new("edit_missing");

        let response = test.send(get("/edit/999", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = follow(&test, &response).await;
        assert!(html.contains("record not found"));
    }

    #[test]
    fn test_parse_member_id() {
        assert_eq!(parse_member_id("1"), Some(1));
        assert_eq!(parse_member_id("0042"), Some(42));
        assert_eq!(parse_member_id("9223372036854775807"), Some(i64::MAX));

        for raw in ["", "0", "-1", "+1", " 1", "1.0", "abc", "9223372036854775808"] {
            assert_eq!(parse_member_id(raw), None, "input {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_edit_non_numeric_id_not_found() {
        let test = TestApp::new("edit_bad_id");

        let response = test.send(get("/edit/abc", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_positive_ids_not_found() {
        let test = TestApp::new("non_positive_ids");
        let id = test.seed("Ali", "B-4");

        for uri in ["/edit/-1", "/edit/0"] {
            let response = test.send(get(uri, None)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {uri}");
        }
        for uri in ["/edit/-1", "/delete/-1", "/delete/0"] {
            let response = test.send(post_form(uri, "name=Sara")).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "POST {uri}");
        }
        assert_eq!(test.store().count().unwrap(), 1);
        assert_eq!(test.store().get(id).unwrap().unwrap().name, "Ali");
    }

    #[tokio::test]
    async fn test_edit_submit_updates_member() {
        let test = TestApp::new("edit_submit");
        let id = test.seed("Ali", "B-4");

        let response = test
            .send(post_form(
                &format!("/edit/{id}"),
                "name=Ali+Omar&email=ali%40example.com&phone=&apartment=B-5&amount=abc",
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = follow(&test, &response).await;
        assert!(html.contains("record updated"));

        let member = test.store().get(id).unwrap().unwrap();
        assert_eq!(member.name, "Ali Omar");
        assert_eq!(member.email.as_deref(), Some("ali@example.com"));
        assert_eq!(member.phone, None);
        assert_eq!(member.apartment.as_deref(), Some("B-5"));
        assert!(member.amount.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_edit_submit_blank_name_returns_to_form() {
        let test = TestApp::new("edit_blank");
        let id = test.seed("Ali", "B-4");

        let response = test
            .send(post_form(&format!("/edit/{id}"), "name=&apartment=Z-9"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), format!("/edit/{id}"));

        let html = follow(&test, &response).await;
        assert!(html.contains("name is required"));

        let member = test.store().get(id).unwrap().unwrap();
        assert_eq!(member.name, "Ali");
        assert_eq!(member.apartment.as_deref(), Some("B-4"));
    }

    #[tokio::test]
    async fn test_edit_submit_missing_member() {
        let test = TestApp::new("edit_submit_missing");

        let response = test.send(post_form("/edit/42", "name=")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = follow(&test, &response).await;
        assert!(html.contains("record not found"));
        assert!(!html.contains("name is required"));
    }

    #[tokio::test]
    async fn test_delete_member() {
        let test = TestApp::new("delete");
        let id = test.seed("Ali", "B-4");

        let response = test.send(post_form(&format!("/delete/{id}"), "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = follow(&test, &response).await;
        assert!(html.contains("record deleted"));
        assert!(test.store().get(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_member_still_succeeds() {
        let test = TestApp::new("delete_unknown");

        let response = test.send(post_form("/delete/999", "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = follow(&test, &response).await;
        assert!(html.contains("record deleted"));
    }

    #[tokio::test]
    async fn test_delete_requires_post() {
        let test = TestApp::new("delete_get");
        let id = test.seed("Ali", "B-4");

        let response = test.send(get(&format!("/delete/{id}"), None)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(test.store().get(id).unwrap().is_some());
    }
}
