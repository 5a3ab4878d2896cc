//! Checking the remote upload quota before starting.
use crate::client::{HttpRequest, SendRequest as _, UploadClient};
use crate::config::UploadConfig;
use crate::error::{ErrorRepr, Result, Stage};

use http::{Method, StatusCode};
use serde::Deserialize;

const QUOTA_ENDPOINT: &str = "/me";

#[derive(Debug, Deserialize)]
struct QuotaResponse {
    upload_quota: UploadQuota,
}

#[derive(Debug, Deserialize)]
struct UploadQuota {
    space: QuotaSpace,
}

#[derive(Debug, Deserialize)]
struct QuotaSpace {
    free: u64,
}

/// Fail unless the account has room for `size` more bytes.
pub(crate) async fn ensure_quota(
    client: &UploadClient,
    config: &UploadConfig,
    size: u64,
) -> Result<()> {
    let req = HttpRequest::new(Method::GET, QUOTA_ENDPOINT)
        .query("fields", "upload_quota")
        .timeout(config.request_timeout);

    let response = client
        .send_request(req)
        .await
        .map_err(ErrorRepr::from_transport(Stage::Quota))?;
    if response.status != StatusCode::OK {
        return Err(ErrorRepr::QuotaLookup {
            reason: "unexpected status",
            response,
        }
        .into());
    }
    let free = match response.json::<QuotaResponse>() {
        Ok(quota) => quota.upload_quota.space.free,
        Err(_) => {
            return Err(ErrorRepr::QuotaLookup {
                reason: "missing upload_quota.space.free",
                response,
            }
            .into());
        }
    };

    trace!(free, size, "checked upload quota");
    if free < size {
        return Err(ErrorRepr::QuotaExceeded {
            size,
            free,
            response,
        }
        .into());
    }
    Ok(())
}
