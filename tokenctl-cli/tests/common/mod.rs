//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokenctl_cli::commands::CommandContext;
use tokenctl_cli::federation::{FederatedQueryEngine, Gateways};
use tokenctl_common::{
    Cluster, ClusterSet, FetchedToken, GatewayError, GatewayResult, RemoteTokenGateway, Service,
    Token, TokenSummary,
};

#[derive(Default)]
struct FakeState {
    tokens: HashMap<String, (Token, u64)>,
    services: HashMap<String, Vec<Service>>,
    pings: Vec<String>,
    killed: Vec<String>,
    writes: usize,
}

/// In-memory stand-in for one cluster's token service
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
    failure: Mutex<Option<GatewayError>>,
    write_failure: Mutex<Option<GatewayError>>,
    service_failure: Mutex<Option<GatewayError>>,
    kill_delay: Mutex<Option<Duration>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, token: Token) {
        let mut state = self.state.lock().unwrap();
        let version = state.tokens.get(name).map(|(_, v)| v + 1).unwrap_or(1);
        state.tokens.insert(name.to_string(), (token, version));
    }

    pub fn seed_services(&self, name: &str, services: Vec<Service>) {
        let mut state = self.state.lock().unwrap();
        state.services.insert(name.to_string(), services);
    }

    /// Make every call fail with `err`
    pub fn fail_with(&self, err: GatewayError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    /// Make only token writes and deletes fail with `err`
    pub fn fail_writes_with(&self, err: GatewayError) {
        *self.write_failure.lock().unwrap() = Some(err);
    }

    /// Make only service listings fail with `err`
    pub fn fail_services_with(&self, err: GatewayError) {
        *self.service_failure.lock().unwrap() = Some(err);
    }

    /// Make every service kill take `delay`
    pub fn slow_kills(&self, delay: Duration) {
        *self.kill_delay.lock().unwrap() = Some(delay);
    }

    pub fn token(&self, name: &str) -> Option<Token> {
        let state = self.state.lock().unwrap();
        state.tokens.get(name).map(|(token, _)| token.clone())
    }

    pub fn has_token(&self, name: &str) -> bool {
        self.token(name).is_some()
    }

    pub fn pings(&self) -> Vec<String> {
        self.state.lock().unwrap().pings.clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.state.lock().unwrap().killed.clone()
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    fn check(&self) -> GatewayResult<()> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check_write(&self) -> GatewayResult<()> {
        self.check()?;
        match self.write_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn etag(version: u64) -> String {
    format!("\"v{}\"", version)
}

#[async_trait]
impl RemoteTokenGateway for FakeGateway {
    async fn get_token(&self, name: &str) -> GatewayResult<FetchedToken> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let (token, version) = state.tokens.get(name).ok_or(GatewayError::NotFound)?;
        Ok(FetchedToken {
            token: token.clone(),
            etag: Some(etag(*version)),
        })
    }

    async fn put_token(
        &self,
        name: &str,
        token: &Token,
        expected_etag: Option<&str>,
    ) -> GatewayResult<()> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        let current = state.tokens.get(name).map(|(_, v)| *v);
        if let (Some(expected), Some(version)) = (expected_etag, current) {
            if expected != etag(version) {
                return Err(GatewayError::Conflict(format!("etag {} is stale", expected)));
            }
        }

        let mut stored = token.clone();
        stored.last_update_time = Some(Utc::now());
        let version = current.map(|v| v + 1).unwrap_or(1);
        state.tokens.insert(name.to_string(), (stored, version));
        state.writes += 1;
        Ok(())
    }

    async fn delete_token(&self, name: &str, _expected_etag: Option<&str>) -> GatewayResult<()> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        state.tokens.remove(name).ok_or(GatewayError::NotFound)?;
        state.writes += 1;
        Ok(())
    }

    async fn list_services_for_token(&self, name: &str) -> GatewayResult<Vec<Service>> {
        self.check()?;
        if let Some(err) = self.service_failure.lock().unwrap().clone() {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        Ok(state.services.get(name).cloned().unwrap_or_default())
    }

    async fn get_service(&self, service_id: &str) -> GatewayResult<Service> {
        self.check()?;
        let state = self.state.lock().unwrap();
        state
            .services
            .values()
            .flatten()
            .find(|s| s.service_id == service_id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn kill_service(&self, service_id: &str) -> GatewayResult<()> {
        self.check()?;
        let delay = *self.kill_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        let service = state
            .services
            .values_mut()
            .flatten()
            .find(|s| s.service_id == service_id)
            .ok_or(GatewayError::AlreadyInactive)?;
        if service.is_inactive() {
            return Err(GatewayError::AlreadyInactive);
        }
        service.status = Some("Inactive".to_string());
        state.killed.push(service_id.to_string());
        Ok(())
    }

    async fn ping_token(&self, name: &str) -> GatewayResult<()> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if !state.tokens.contains_key(name) {
            return Err(GatewayError::NotFound);
        }
        state.pings.push(name.to_string());
        Ok(())
    }

    async fn list_tokens(&self) -> GatewayResult<Vec<TokenSummary>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .tokens
            .iter()
            .map(|(name, (token, _))| TokenSummary {
                token: name.clone(),
                owner: token.owner.clone(),
                last_update_time: token.last_update_time,
                ..TokenSummary::default()
            })
            .collect())
    }
}

/// A token last updated at `updated_ms`, optionally pinned to a cluster
pub fn token(updated_ms: i64, hint: Option<&str>) -> Token {
    Token {
        owner: Some("tester".to_string()),
        cluster: hint.map(str::to_string),
        last_update_time: Utc.timestamp_millis_opt(updated_ms).single(),
        ..Token::default()
    }
}

/// Token with a `version` field
pub fn versioned(version: &str, updated_ms: i64, hint: Option<&str>) -> Token {
    let mut t = token(updated_ms, hint);
    t.set_field("version", serde_json::json!(version));
    t
}

/// A cluster set with one fake gateway per cluster
pub struct Federation {
    pub clusters: ClusterSet,
    fakes: HashMap<String, Arc<FakeGateway>>,
}

impl Federation {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        let clusters = ClusterSet::new(clusters).unwrap();
        let fakes = clusters
            .iter()
            .map(|c| (c.name.clone(), Arc::new(FakeGateway::new())))
            .collect();
        Self { clusters, fakes }
    }

    /// waiter1 (default for create) and waiter2, in the given sync groups
    pub fn two_waiters(group1: &str, group2: &str) -> Self {
        Self::new(vec![
            Cluster::new("waiter1", "http://waiter1")
                .with_sync_group(group1)
                .with_default_for_create(),
            Cluster::new("waiter2", "http://waiter2").with_sync_group(group2),
        ])
    }

    pub fn fake(&self, cluster: &str) -> &FakeGateway {
        self.fakes
            .get(cluster)
            .unwrap_or_else(|| panic!("no fake for {}", cluster))
    }

    pub fn gateways(&self) -> Gateways {
        let mut gateways = Gateways::new();
        for (name, fake) in &self.fakes {
            let gateway: Arc<dyn RemoteTokenGateway> = fake.clone();
            gateways.insert(name, gateway);
        }
        gateways
    }

    pub fn engine(&self) -> FederatedQueryEngine {
        FederatedQueryEngine::new(self.gateways())
    }

    pub fn context(&self) -> CommandContext {
        CommandContext::new(self.clusters.clone(), self.engine())
    }

    pub fn context_for(&self, cluster: &str) -> CommandContext {
        self.context().with_explicit_cluster(Some(cluster.to_string()))
    }
}

/// Captured narration
pub fn text(out: &[u8]) -> String {
    String::from_utf8_lossy(out).to_string()
}
