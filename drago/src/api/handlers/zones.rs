use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        records::RecordResponse,
        users::CurrentUser,
        zones::{ZoneResponse, ZoneUpsert, ZoneWithRecords},
    },
    db::{
        handlers::{DnsRecords, DnsTokens, DnsZones, Repository},
        models::{dns_records::DnsRecordFilter, dns_zones::DnsZoneFilter, dns_zones::DnsZoneUpsertDBRequest},
    },
    errors::Error,
    types::{UserId, ZoneId},
};

/// All of a user's zones, each with its records.
pub(crate) async fn zones_with_records(conn: &mut PgConnection, user_id: UserId) -> Result<Vec<ZoneWithRecords>, Error> {
    let zones = DnsZones::new(conn).list(&DnsZoneFilter { user_id, token_id: None }).await?;
    let records = DnsRecords::new(conn).list(&DnsRecordFilter { user_id, zone_id: None }).await?;

    let mut by_zone: HashMap<ZoneId, Vec<RecordResponse>> = HashMap::new();
    for record in records {
        by_zone.entry(record.zone_id.clone()).or_default().push(record.into());
    }

    Ok(zones
        .into_iter()
        .map(|zone| ZoneWithRecords {
            records: by_zone.remove(&zone.id).unwrap_or_default(),
            zone: zone.into(),
        })
        .collect())
}

/// List mirrored zones with their records
#[utoipa::path(
    get,
    path = "/api/v1/zones",
    tag = "zones",
    responses(
        (status = 200, description = "Zones and their records", body = [ZoneWithRecords]),
        (status = 401, description = "Not signed in"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_zones(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Vec<ZoneWithRecords>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(zones_with_records(&mut conn, user.id).await?))
}

/// Insert or refresh a zone mirror
///
/// The last write wins. A zone id already mirrored by another account is rejected.
#[utoipa::path(
    put,
    path = "/api/v1/zones",
    request_body = ZoneUpsert,
    tag = "zones",
    responses(
        (status = 200, description = "Zone mirrored", body = ZoneResponse),
        (status = 404, description = "Token not found"),
        (status = 409, description = "Zone belongs to another account"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all, fields(zone_id = %request.id))]
pub async fn upsert_zone(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ZoneUpsert>,
) -> Result<Json<ZoneResponse>, Error> {
    if request.id.trim().is_empty() || request.zone_name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Zone id and name are required".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if DnsTokens::new(&mut tx).get_owned(request.token_id, user.id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "DNS token".to_string(),
            id: request.token_id.to_string(),
        });
    }

    let zone = DnsZones::new(&mut tx)
        .create(&DnsZoneUpsertDBRequest {
            id: request.id,
            user_id: user.id,
            token_id: request.token_id,
            zone_name: request.zone_name,
            status: request.status,
            meta: request.meta,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(zone.into()))
}

/// Delete a zone mirror and its records
#[utoipa::path(
    delete,
    path = "/api/v1/zones/{zone_id}",
    tag = "zones",
    params(("zone_id" = String, Path, description = "Provider zone ID")),
    responses(
        (status = 204, description = "Zone deleted"),
        (status = 404, description = "Zone not found"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all, fields(zone_id = %zone_id))]
pub async fn delete_zone(State(state): State<AppState>, user: CurrentUser, Path(zone_id): Path<ZoneId>) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if DnsZones::new(&mut conn).delete_owned(&zone_id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Zone".to_string(),
            id: zone_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::zones::{ZoneResponse, ZoneWithRecords};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_and_list_zones(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let (name, value) = session_cookie_header(&fixture.user);

        let zone: ZoneResponse = app
            .put("/api/v1/zones")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "id": "zone-new",
                "token_id": fixture.token.id,
                "zone_name": "new.example.com",
                "meta": { "plan": "free" }
            }))
            .await
            .json();
        assert_eq!(zone.zone_name, "new.example.com");

        // Last write wins
        let renamed: ZoneResponse = app
            .put("/api/v1/zones")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "id": "zone-new", "token_id": fixture.token.id, "zone_name": "renamed.example.com" }))
            .await
            .json();
        assert_eq!(renamed.zone_name, "renamed.example.com");
        assert!(renamed.last_synced_at >= zone.last_synced_at);

        let zones: Vec<ZoneWithRecords> = app.get("/api/v1/zones").add_header(name, value).await.json();
        assert_eq!(zones.len(), 2);
        let fixture_zone = zones.iter().find(|z| z.zone.id == fixture.zone.id).unwrap();
        assert_eq!(fixture_zone.records.len(), 1);
        assert_eq!(fixture_zone.records[0].id, fixture.record.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_mirror_with_foreign_token_or_take_over_zone(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let cipher = test_cipher();
        let owner = create_test_fixture(&pool, &cipher).await;
        let other = create_test_user(&pool).await;
        let other_token = create_test_token(&pool, &cipher, other.id).await;
        let (name, value) = session_cookie_header(&other);

        app.put("/api/v1/zones")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "id": "zone-x", "token_id": owner.token.id, "zone_name": "x.example.com" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.put("/api/v1/zones")
            .add_header(name, value)
            .json(&json!({ "id": owner.zone.id, "token_id": other_token.id, "zone_name": "stolen.example.com" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_zone(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let fixture = create_test_fixture(&pool, &test_cipher()).await;
        let (name, value) = session_cookie_header(&fixture.user);

        app.delete(&format!("/api/v1/zones/{}", fixture.zone.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let zones: Vec<ZoneWithRecords> = app.get("/api/v1/zones").add_header(name.clone(), value.clone()).await.json();
        assert!(zones.is_empty());

        app.delete(&format!("/api/v1/zones/{}", fixture.zone.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
