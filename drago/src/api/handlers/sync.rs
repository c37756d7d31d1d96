//! Dynamic DNS push from the client daemon.

use std::net::IpAddr;

use axum::{Json, extract::State};
use tracing::{debug, info, instrument};

use crate::{
    AppState,
    api::models::sync::{SyncRequest, SyncResponse},
    auth::current_user::ApiKeyAuth,
    db::handlers::{ApiKeys, DnsRecords, Repository},
    errors::Error,
};

/// Whether `address` can be the content of a record of `record_type`.
fn address_fits(record_type: &str, address: &IpAddr) -> bool {
    match record_type.to_ascii_uppercase().as_str() {
        "A" => address.is_ipv4(),
        "AAAA" => address.is_ipv6(),
        _ => false,
    }
}

/// Push the client's current IP address into the record its API key controls
#[utoipa::path(
    put,
    path = "/sync",
    request_body = SyncRequest,
    tag = "sync",
    responses(
        (status = 200, description = "Record synced", body = SyncResponse),
        (status = 400, description = "Invalid address for the record"),
        (status = 401, description = "Missing or invalid API key"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all, fields(record_id = %key.dns_record_id))]
pub async fn sync_record(
    State(state): State<AppState>,
    ApiKeyAuth(key): ApiKeyAuth,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, Error> {
    let address: IpAddr = request.ip_address.trim().parse().map_err(|_| Error::BadRequest {
        message: format!("'{}' is not an IP address", request.ip_address),
    })?;
    let synced_at = request.time_synced.and_utc();

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let record = DnsRecords::new(&mut tx)
        .get_by_id(key.dns_record_id.clone())
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Record".to_string(),
            id: key.dns_record_id.clone(),
        })?;

    if !address_fits(&record.record_type, &address) {
        return Err(Error::BadRequest {
            message: format!("{} records cannot hold the address {}", record.record_type, address),
        });
    }

    let (record, updated) = DnsRecords::new(&mut tx)
        .sync_content(&record.id, &address.to_string(), synced_at)
        .await?;
    ApiKeys::new(&mut tx).touch_last_used(key.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let message = if updated {
        info!("Record {} now points at {}", record.record_name, address);
        format!("{} updated to {}", record.record_name, address)
    } else {
        debug!("Record {} already points at {}", record.record_name, address);
        format!("{} already up to date", record.record_name)
    };

    Ok(Json(SyncResponse {
        success: true,
        updated,
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{ApiKeys, DnsRecords, Repository};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn test_address_fits_record_type() {
        let v4: IpAddr = "203.0.113.7".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert!(address_fits("A", &v4));
        assert!(address_fits("aaaa", &v6));
        assert!(!address_fits("A", &v6));
        assert!(!address_fits("AAAA", &v4));
        assert!(!address_fits("CNAME", &v4));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sync_updates_record_and_stamps_key(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let (full_key, key) = create_api_key_for_record(&pool, fixture.user.id, &fixture.record.id).await;
        let body = json!({ "ip_address": "203.0.113.7", "time_synced": "2026-03-01T12:00:00" });

        let response = app
            .put("/sync")
            .add_header("authorization", format!("Bearer {full_key}"))
            .json(&body)
            .await;
        response.assert_status_ok();
        let synced: SyncResponse = response.json();
        assert!(synced.success);
        assert!(synced.updated);

        let mut conn = pool.acquire().await.unwrap();
        let record = DnsRecords::new(&mut conn).get_by_id(fixture.record.id.clone()).await.unwrap().unwrap();
        assert_eq!(record.content.as_deref(), Some("203.0.113.7"));
        assert_eq!(record.last_synced_at.to_rfc3339(), "2026-03-01T12:00:00+00:00");
        let key = ApiKeys::new(&mut conn).get_by_id(key.id).await.unwrap().unwrap();
        assert!(key.last_used.is_some());

        // Same address again
        let again: SyncResponse = app
            .put("/sync")
            .add_header("authorization", format!("Bearer {full_key}"))
            .json(&body)
            .await
            .json();
        assert!(again.success);
        assert!(!again.updated);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sync_rejects_bad_credentials_and_addresses(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let (full_key, _) = create_api_key_for_record(&pool, fixture.user.id, &fixture.record.id).await;

        app.put("/sync")
            .json(&json!({ "ip_address": "203.0.113.7", "time_synced": "2026-03-01T12:00:00" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // A session JWT is not an API key
        let (name, value) = session_cookie_header(&fixture.user);
        app.put("/sync")
            .add_header(name, value)
            .json(&json!({ "ip_address": "203.0.113.7", "time_synced": "2026-03-01T12:00:00" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let tampered = format!("{}{}", &full_key[..full_key.len() - 1], if full_key.ends_with('a') { 'b' } else { 'a' });
        app.put("/sync")
            .add_header("authorization", format!("Bearer {tampered}"))
            .json(&json!({ "ip_address": "203.0.113.7", "time_synced": "2026-03-01T12:00:00" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        for ip in ["not-an-ip", "2001:db8::1"] {
            app.put("/sync")
                .add_header("authorization", format!("Bearer {full_key}"))
                .json(&json!({ "ip_address": ip, "time_synced": "2026-03-01T12:00:00" }))
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
    }
}
