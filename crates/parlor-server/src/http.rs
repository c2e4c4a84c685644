//! HTTP pages backing the TOC `GOTO_URL` replies. Every route is gated on
//! a cookie-baker token minted by the TOC proxy.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tracing::info;

use parlor_shared::IdentScreenName;

use crate::services::Deps;

pub async fn serve(deps: Deps, port: u16, mut shutdown: watch::Receiver<bool>) -> crate::error::Result<()> {
    let app = Router::new()
        .route("/info", get(info_page))
        .route("/dir_info", get(dir_info_page))
        .route("/dir_search", get(dir_search_page))
        .with_state(deps);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "HTTP listener started");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

enum HttpError {
    Unauthorized,
    NotFound,
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::Unauthorized => (StatusCode::UNAUTHORIZED, "bad token").into_response(),
            HttpError::NotFound => (StatusCode::NOT_FOUND, "no such user").into_response(),
            HttpError::Internal(e) => {
                tracing::error!(error = %e, "page render failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

fn verify_token(deps: &Deps, params: &HashMap<String, String>) -> Result<(), HttpError> {
    let cookie = params.get("cookie").ok_or(HttpError::Unauthorized)?;
    let token = hex::decode(cookie).map_err(|_| HttpError::Unauthorized)?;
    deps.baker.crack(&token).map_err(|_| HttpError::Unauthorized)?;
    Ok(())
}

async fn info_page(
    State(deps): State<Deps>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Html<String>, HttpError> {
    verify_token(&deps, &params)?;
    let user = params.get("user").ok_or(HttpError::NotFound)?;
    let ident = IdentScreenName::new(user);

    let account = deps
        .db
        .user(&ident)
        .map_err(|e| HttpError::Internal(e.to_string()))?
        .ok_or(HttpError::NotFound)?;
    let away = deps
        .sessions
        .retrieve(&ident)
        .and_then(|s| s.away_message())
        .unwrap_or_default();

    let mut page = format!(
        "<HTML><HEAD><TITLE>{name}</TITLE></HEAD><BODY>\
         <H2>User information for {name}</H2>",
        name = escape(account.display.as_str()),
    );
    if !away.is_empty() {
        page.push_str(&format!("<B>Away message:</B> {away}<HR>"));
    }
    page.push_str(&account.profile);
    page.push_str("</BODY></HTML>");
    Ok(Html(page))
}

async fn dir_info_page(
    State(deps): State<Deps>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Html<String>, HttpError> {
    verify_token(&deps, &params)?;
    let user = params.get("user").ok_or(HttpError::NotFound)?;
    let ident = IdentScreenName::new(user);

    let info = deps
        .db
        .dir_info(&ident)
        .map_err(|e| HttpError::Internal(e.to_string()))?
        .ok_or(HttpError::NotFound)?;

    let rows: Vec<(&str, &String)> = vec![
        ("First name", &info.first_name),
        ("Middle name", &info.middle_name),
        ("Last name", &info.last_name),
        ("Maiden name", &info.maiden_name),
        ("Country", &info.country),
        ("State", &info.state),
        ("City", &info.city),
    ];
    let mut page = format!(
        "<HTML><HEAD><TITLE>Directory: {}</TITLE></HEAD><BODY><TABLE>",
        escape(user)
    );
    for (label, value) in rows {
        if !value.is_empty() {
            page.push_str(&format!(
                "<TR><TD><B>{label}</B></TD><TD>{}</TD></TR>",
                escape(value)
            ));
        }
    }
    page.push_str("</TABLE></BODY></HTML>");
    Ok(Html(page))
}

async fn dir_search_page(
    State(deps): State<Deps>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Html<String>, HttpError> {
    verify_token(&deps, &params)?;

    // scan the directory table for users matching every provided field
    let users = deps
        .db
        .all_users()
        .map_err(|e| HttpError::Internal(e.to_string()))?;

    let mut matches = Vec::new();
    for user in users {
        let Some(info) = deps
            .db
            .dir_info(&user.ident)
            .map_err(|e| HttpError::Internal(e.to_string()))?
        else {
            continue;
        };
        let field_matches = |param: &str, value: &str| {
            params
                .get(param)
                .map(|wanted| !wanted.is_empty() && value.eq_ignore_ascii_case(wanted))
                .unwrap_or(true)
        };
        if field_matches("first_name", &info.first_name)
            && field_matches("last_name", &info.last_name)
            && field_matches("city", &info.city)
            && field_matches("state", &info.state)
            && field_matches("country", &info.country)
        {
            matches.push(user.display.as_str().to_string());
        }
    }

    let mut page = String::from("<HTML><HEAD><TITLE>Search results</TITLE></HEAD><BODY><UL>");
    for name in matches {
        page.push_str(&format!("<LI>{}</LI>", escape(&name)));
    }
    page.push_str("</UL></BODY></HTML>");
    Ok(Html(page))
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::{insert_user, test_deps};

    #[tokio::test]
    async fn test_token_gate() {
        let (deps, _dir) = test_deps().await;
        insert_user(&deps, "Alice", "pw");

        let mut params = HashMap::new();
        params.insert("user".to_string(), "alice".to_string());
        assert!(verify_token(&deps, &params).is_err());

        let token = deps.baker.issue(b"alice").unwrap();
        params.insert("cookie".to_string(), hex::encode(token));
        assert!(verify_token(&deps, &params).is_ok());

        params.insert("cookie".to_string(), "00ff".to_string());
        assert!(verify_token(&deps, &params).is_err());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }
}
