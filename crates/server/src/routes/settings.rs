use crate::error::{ServerError, ServerResult};
use crate::middleware::AdminActor;
use crate::routes::read_upload;
use crate::state::ServerState;
use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_KEY_LEN: usize = 64;

/// Setting key under which the uploaded GCash QR image URL is kept.
pub const GCASH_QR_KEY: &str = "gcash_qr_url";

#[derive(Debug, Deserialize)]
pub struct SettingBody {
    pub value: Value,
}

/// Keys are lowercase ASCII letters, digits and underscores.
fn check_key(key: &str) -> ServerResult<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(ServerError::BadRequest(format!(
            "setting key must match [a-z0-9_]{{1,{MAX_KEY_LEN}}}, got '{key}'"
        )))
    }
}

pub async fn get_settings(State(state): State<Arc<ServerState>>) -> Json<BTreeMap<String, Value>> {
    let settings = state
        .settings
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    Json(settings)
}

pub async fn set_setting(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> ServerResult<Json<Value>> {
    check_key(&key)?;
    state.settings.insert(key.clone(), body.value.clone());
    tracing::info!(target: "audit", key = %key, actor = %actor.0, "setting_updated");
    Ok(Json(json!({ "key": key, "value": body.value })))
}

/// Uploads the GCash QR image (multipart `qr` or `file`) and publishes its URL.
pub async fn upload_gcash_qr(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    mut multipart: Multipart,
) -> ServerResult<Json<Value>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if matches!(field.name(), Some("qr" | "file")) {
            upload = Some(read_upload(field).await?);
            break;
        }
    }
    let upload = upload.ok_or_else(|| records::RecordError::missing("qr"))?;
    let media = state.manager.upload_media(upload).await?;
    state
        .settings
        .insert(GCASH_QR_KEY.to_string(), json!(media.url));
    tracing::info!(target: "audit", url = %media.url, actor = %actor.0, "gcash_qr_updated");
    Ok(Json(json!({ "key": GCASH_QR_KEY, "value": media.url })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_keys() {
        assert!(check_key("total_population").is_ok());
        assert!(check_key("barangay_name2").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("Barangay").is_err());
        assert!(check_key("a-b").is_err());
        assert!(check_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }
}
