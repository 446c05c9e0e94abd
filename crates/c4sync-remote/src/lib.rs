pub mod error;
pub mod http;
pub mod parse;
pub mod reconcile;
pub mod store;

pub use error::{RemoteError, Result, SyncError, UnresolvedEndpoint};
pub use http::HttpStore;
pub use reconcile::{check_collisions, Reconciler, SyncOptions, SyncReport};
pub use store::{RemoteStore, ResourceKind, Scope};
