use serde::Deserialize;

use crate::error::RemoteError;
use crate::store::RemoteRecord;

#[derive(Deserialize)]
struct ListPage {
    #[serde(default)]
    data: Vec<RemoteRecord>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

/// Decode a listing body of the form `{"data": [{"id": ...}, ...]}`.
pub fn parse_list(method: &str, url: &str, body: &str) -> Result<Vec<RemoteRecord>, RemoteError> {
    serde_json::from_str::<ListPage>(body)
        .map(|page| page.data)
        .map_err(|source| RemoteError::Decode {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })
}

/// Decode the id out of a creation response.
pub fn parse_created(method: &str, url: &str, body: &str) -> Result<String, RemoteError> {
    serde_json::from_str::<Created>(body)
        .map(|c| c.id)
        .map_err(|source| RemoteError::Decode {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })
}
