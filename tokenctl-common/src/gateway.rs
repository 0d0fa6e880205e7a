//! Per-cluster remote token operations

use crate::token::{FetchedToken, Service, Token, TokenSummary};
use async_trait::async_trait;

/// Failure of a single remote call against one cluster
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("not found")]
    NotFound,

    #[error("conflicting update: {0}")]
    Conflict(String),

    #[error("already inactive")]
    AlreadyInactive,

    #[error("{0}")]
    Transport(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Token operations against one cluster's endpoint.
///
/// Implementations carry their own timeouts; a timeout surfaces as
/// [`GatewayError::Transport`].
#[async_trait]
pub trait RemoteTokenGateway: Send + Sync {
    async fn get_token(&self, name: &str) -> GatewayResult<FetchedToken>;

    async fn put_token(
        &self,
        name: &str,
        token: &Token,
        expected_etag: Option<&str>,
    ) -> GatewayResult<()>;

    async fn delete_token(&self, name: &str, expected_etag: Option<&str>) -> GatewayResult<()>;

    async fn list_services_for_token(&self, name: &str) -> GatewayResult<Vec<Service>>;

    /// Look up one service by id; [`GatewayError::NotFound`] when the cluster never ran it
    async fn get_service(&self, service_id: &str) -> GatewayResult<Service>;

    async fn kill_service(&self, service_id: &str) -> GatewayResult<()>;

    async fn ping_token(&self, name: &str) -> GatewayResult<()>;

    async fn list_tokens(&self) -> GatewayResult<Vec<TokenSummary>>;
}
