//! Client identification headers sent with every poll and stream request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};

pub const APP_NAME_HEADER: &str = "unleash-appname";
pub const INSTANCE_ID_HEADER: &str = "unleash-instanceid";
pub const CONNECTION_ID_HEADER: &str = "unleash-connection-id";
pub const SDK_HEADER: &str = "unleash-sdk";
pub const CLIENT_SPEC_HEADER: &str = "unleash-client-spec";

/// Client specification version this SDK implements.
pub const CLIENT_SPEC_VERSION: &str = "5.2.0";

/// SDK identifier, `name:version`.
pub fn sdk_version() -> String {
    format!("{}:{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Build the identification headers plus any configured custom headers.
///
/// # Errors
/// Returns [`SyncError::Config`] when a configured value is not a valid header.
pub fn client_headers(api: &ApiConfig, connection_id: &str) -> SyncResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    insert(&mut headers, APP_NAME_HEADER, &api.app_name)?;
    insert(&mut headers, INSTANCE_ID_HEADER, &api.instance_id)?;
    insert(&mut headers, CONNECTION_ID_HEADER, connection_id)?;
    insert(&mut headers, SDK_HEADER, &sdk_version())?;
    insert(&mut headers, CLIENT_SPEC_HEADER, CLIENT_SPEC_VERSION)?;

    for (name, value) in &api.custom_headers {
        insert(&mut headers, name, value)?;
    }
    Ok(headers)
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> SyncResult<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| SyncError::Config(format!("invalid header name '{name}': {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| SyncError::Config(format!("invalid value for header '{name}': {e}")))?;
    headers.insert(name, value);
    Ok(())
}
