/// Failure talking to the remote store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("{method} {url}: status {status}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url}: undecodable response: {source}")]
    Decode {
        method: String,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEndpoint {
    /// Handle of the connection.
    pub edge: String,
    /// Object handle missing from the remote store.
    pub endpoint: String,
}

/// Errors surfaced by the synchronization workflows. The first one stops
/// the workflow; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("landscape {0} not found")]
    LandscapeNotFound(String),

    #[error("version {version} not found in landscape {landscape}")]
    VersionNotFound { landscape: String, version: String },

    #[error("connection endpoints missing from the remote store: {}", describe_unresolved(.0))]
    UnresolvedEndpoints(Vec<UnresolvedEndpoint>),

    #[error("identifier {id} collides with {existing} as handle {handle}")]
    SlugCollision {
        id: String,
        existing: String,
        handle: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Input(#[from] c4sync_core::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Validation failures are raised before any mutating call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SyncError::LandscapeNotFound(_)
                | SyncError::VersionNotFound { .. }
                | SyncError::UnresolvedEndpoints(_)
                | SyncError::SlugCollision { .. }
        )
    }
}

fn describe_unresolved(list: &[UnresolvedEndpoint]) -> String {
    list.iter()
        .map(|u| format!("{} -> {}", u.edge, u.endpoint))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
