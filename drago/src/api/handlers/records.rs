use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        records::{RecordResponse, RecordUpsert},
        users::CurrentUser,
    },
    db::{
        handlers::{DnsRecords, DnsZones, Repository},
        models::dns_records::{DnsRecordFilter, DnsRecordUpsertDBRequest},
    },
    errors::Error,
    types::{RecordId, ZoneId},
};

fn zone_not_found(zone_id: &str) -> Error {
    Error::NotFound {
        resource: "Zone".to_string(),
        id: zone_id.to_string(),
    }
}

/// List the records mirrored for a zone
#[utoipa::path(
    get,
    path = "/api/v1/zones/{zone_id}/records",
    tag = "records",
    params(("zone_id" = String, Path, description = "Provider zone ID")),
    responses(
        (status = 200, description = "Records in the zone", body = [RecordResponse]),
        (status = 404, description = "Zone not found"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all, fields(zone_id = %zone_id))]
pub async fn list_records(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(zone_id): Path<ZoneId>,
) -> Result<Json<Vec<RecordResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if DnsZones::new(&mut conn).get_owned(&zone_id, user.id).await?.is_none() {
        return Err(zone_not_found(&zone_id));
    }

    let records = DnsRecords::new(&mut conn)
        .list(&DnsRecordFilter {
            user_id: user.id,
            zone_id: Some(zone_id),
        })
        .await?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Insert or refresh a record mirror in a zone
///
/// The last write wins. A record id already mirrored by another account is rejected.
#[utoipa::path(
    put,
    path = "/api/v1/zones/{zone_id}/records",
    request_body = RecordUpsert,
    tag = "records",
    params(("zone_id" = String, Path, description = "Provider zone ID")),
    responses(
        (status = 200, description = "Record mirrored", body = RecordResponse),
        (status = 400, description = "Invalid record"),
        (status = 404, description = "Zone not found"),
        (status = 409, description = "Record belongs to another account"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all, fields(zone_id = %zone_id, record_id = %request.id))]
pub async fn upsert_record(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(zone_id): Path<ZoneId>,
    Json(request): Json<RecordUpsert>,
) -> Result<Json<RecordResponse>, Error> {
    if request.id.trim().is_empty() || request.record_name.trim().is_empty() || request.record_type.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Record id, name and type are required".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if DnsZones::new(&mut tx).get_owned(&zone_id, user.id).await?.is_none() {
        return Err(zone_not_found(&zone_id));
    }

    let record = DnsRecords::new(&mut tx)
        .create(&DnsRecordUpsertDBRequest {
            id: request.id,
            user_id: user.id,
            zone_id,
            record_name: request.record_name,
            record_type: request.record_type.trim().to_uppercase(),
            content: request.content,
            ttl: request.ttl,
            proxied: request.proxied,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(record.into()))
}

/// Delete a record mirror and its API key
#[utoipa::path(
    delete,
    path = "/api/v1/records/{record_id}",
    tag = "records",
    params(("record_id" = String, Path, description = "Provider record ID")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "Record not found"),
    ),
    security(("session" = []), ("bearer" = []))
)]
#[tracing::instrument(skip_all, fields(record_id = %record_id))]
pub async fn delete_record(State(state): State<AppState>, user: CurrentUser, Path(record_id): Path<RecordId>) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if DnsRecords::new(&mut conn).delete_owned(&record_id, user.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Record".to_string(),
            id: record_id,
        })
    }
}
