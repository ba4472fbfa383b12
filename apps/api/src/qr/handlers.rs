use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthedUser;
use crate::errors::AppError;
use crate::models::qr::QrCodeRow;
use crate::qr::slug::generate_slug;
use crate::state::AppState;
use crate::subscription::Tier;

/// Anonymous scan traffic limit per (slug, client IP) pair.
const SCAN_LIMIT: u64 = 30;
const SCAN_WINDOW_SECS: u64 = 60;

#[derive(Deserialize)]
pub struct CreateQrRequest {
    pub target_url: String,
    pub label: Option<String>,
    pub style: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateQrRequest {
    pub target_url: Option<String>,
    pub label: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStyleRequest {
    pub style: Value,
}

/// POST /api/v1/qr
pub async fn handle_create(
    State(state): State<AppState>,
    auth: AuthedUser,
    Json(req): Json<CreateQrRequest>,
) -> Result<(StatusCode, Json<QrCodeRow>), AppError> {
    validate_target_url(&req.target_url)?;

    if req.style.is_some() && !auth.limits.custom_styling {
        return Err(AppError::UpgradeRequired {
            required: Tier::Pro,
        });
    }

    if let Some(max) = auth.limits.max_qr_codes {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qr_codes WHERE user_id = $1")
            .bind(auth.user.id)
            .fetch_one(&state.db)
            .await?;
        if count >= max {
            return Err(AppError::UpgradeRequired {
                required: auth.tier.next_up(),
            });
        }
    }

    let row: QrCodeRow = sqlx::query_as(
        r#"
        INSERT INTO qr_codes (id, user_id, slug, target_url, label, style)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user.id)
    .bind(generate_slug())
    .bind(&req.target_url)
    .bind(&req.label)
    .bind(req.style.unwrap_or_else(|| json!({})))
    .fetch_one(&state.db)
    .await?;

    info!("Created QR code {} (slug {}) for user {}", row.id, row.slug, auth.user.id);
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/qr
pub async fn handle_list(
    State(state): State<AppState>,
    auth: AuthedUser,
) -> Result<Json<Vec<QrCodeRow>>, AppError> {
    let rows: Vec<QrCodeRow> =
        sqlx::query_as("SELECT * FROM qr_codes WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(auth.user.id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

/// GET /api/v1/qr/:id
pub async fn handle_get(
    State(state): State<AppState>,
    auth: AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QrCodeRow>, AppError> {
    let row = fetch_owned(&state, id, auth.user.id).await?;
    Ok(Json(row))
}

/// PATCH /api/v1/qr/:id
pub async fn handle_update(
    State(state): State<AppState>,
    auth: AuthedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateQrRequest>,
) -> Result<Json<QrCodeRow>, AppError> {
    if let Some(url) = &req.target_url {
        validate_target_url(url)?;
    }

    let row: Option<QrCodeRow> = sqlx::query_as(
        r#"
        UPDATE qr_codes
        SET target_url = COALESCE($1, target_url),
            label = COALESCE($2, label),
            updated_at = NOW()
        WHERE id = $3 AND user_id = $4
        RETURNING *
        "#,
    )
    .bind(&req.target_url)
    .bind(&req.label)
    .bind(id)
    .bind(auth.user.id)
    .fetch_optional(&state.db)
    .await?;

    row.map(Json)
        .ok_or_else(|| AppError::NotFound(format!("QR code {id} not found")))
}

/// PATCH /api/v1/qr/:id/style
pub async fn handle_update_style(
    State(state): State<AppState>,
    auth: AuthedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStyleRequest>,
) -> Result<Json<QrCodeRow>, AppError> {
    if !auth.limits.custom_styling {
        return Err(AppError::UpgradeRequired {
            required: Tier::Pro,
        });
    }
    if !req.style.is_object() {
        return Err(AppError::Validation(
            "style must be a JSON object".to_string(),
        ));
    }

    let row: Option<QrCodeRow> = sqlx::query_as(
        r#"
        UPDATE qr_codes
        SET style = $1, updated_at = NOW()
        WHERE id = $2 AND user_id = $3
        RETURNING *
        "#,
    )
    .bind(&req.style)
    .bind(id)
    .bind(auth.user.id)
    .fetch_optional(&state.db)
    .await?;

    row.map(Json)
        .ok_or_else(|| AppError::NotFound(format!("QR code {id} not found")))
}

/// DELETE /api/v1/qr/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    auth: AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM qr_codes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(auth.user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("QR code {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /r/:slug — public scan endpoint.
///
/// Resolves the slug, rate-limits per (slug, client IP), records the scan
/// event, then redirects to the target. A Redis outage degrades the limit to
/// per-process counting rather than blocking scans.
pub async fn handle_scan(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    let qr: Option<QrCodeRow> = sqlx::query_as("SELECT * FROM qr_codes WHERE slug = $1")
        .bind(&slug)
        .fetch_optional(&state.db)
        .await?;
    let qr = qr.ok_or_else(|| AppError::NotFound(format!("No QR code for slug {slug}")))?;

    let ip = client_ip(&headers, addr);
    let result = state
        .limiter
        .check(&format!("scan:{slug}:{ip}"), SCAN_LIMIT, SCAN_WINDOW_SECS)
        .await?;
    if !result.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: result.retry_after_secs(),
        });
    }

    sqlx::query(
        "INSERT INTO scan_events (id, qr_id, ip, user_agent, referer) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(qr.id)
    .bind(&ip)
    .bind(header_str(&headers, "user-agent"))
    .bind(header_str(&headers, "referer"))
    .execute(&state.db)
    .await?;

    Ok(Redirect::temporary(&qr.target_url))
}

async fn fetch_owned(state: &AppState, id: Uuid, user_id: Uuid) -> Result<QrCodeRow, AppError> {
    let row: Option<QrCodeRow> =
        sqlx::query_as("SELECT * FROM qr_codes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
    row.ok_or_else(|| AppError::NotFound(format!("QR code {id} not found")))
}

fn validate_target_url(url: &str) -> Result<(), AppError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::Validation(
            "target_url must be an http(s) URL".to_string(),
        ))
    }
}

/// Client IP for rate limiting and scan attribution: first hop of
/// X-Forwarded-For when present (we sit behind a proxy in production),
/// otherwise the socket peer.
fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "10.0.0.9:443".parse().unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, addr()), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), addr()), "10.0.0.9");
    }

    #[test]
    fn test_target_url_validation() {
        assert!(validate_target_url("https://example.com/x").is_ok());
        assert!(validate_target_url("http://example.com").is_ok());
        assert!(validate_target_url("ftp://example.com").is_err());
        assert!(validate_target_url("javascript:alert(1)").is_err());
    }
}
