///! HTTP gateway to one cluster's token service

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokenctl_common::{
    FetchedToken, GatewayError, GatewayResult, RemoteTokenGateway, Service, Token, TokenSummary,
};
use tracing::debug;

/// Header naming the token a request is about
const TOKEN_HEADER: &str = "x-waiter-token";

pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Share `client` (and its timeout) across every cluster's gateway
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        self.client.request(method, &url)
    }

    /// Send a request and map non-success statuses onto gateway errors
    async fn send(&self, request: reqwest::RequestBuilder) -> GatewayResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => GatewayError::NotFound,
            StatusCode::PRECONDITION_FAILED => GatewayError::Conflict(error_text),
            _ => GatewayError::Transport(format!("HTTP {} - {}", status, error_text)),
        })
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
        response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("malformed response: {}", e)))
    }
}

fn with_etag(
    request: reqwest::RequestBuilder,
    expected_etag: Option<&str>,
) -> reqwest::RequestBuilder {
    match expected_etag {
        Some(etag) => request.header(header::IF_MATCH, etag),
        None => request,
    }
}

#[async_trait]
impl RemoteTokenGateway for HttpGateway {
    async fn get_token(&self, name: &str) -> GatewayResult<FetchedToken> {
        let request = self
            .build_request(Method::GET, "/token")
            .query(&[("include", "metadata")])
            .header(TOKEN_HEADER, name);
        let response = self.send(request).await?;

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let token: Token = Self::read_json(response).await?;

        Ok(FetchedToken { token, etag })
    }

    async fn put_token(
        &self,
        name: &str,
        token: &Token,
        expected_etag: Option<&str>,
    ) -> GatewayResult<()> {
        let request = self
            .build_request(Method::POST, "/token")
            .query(&[("token", name)])
            .json(token);
        self.send(with_etag(request, expected_etag)).await?;
        Ok(())
    }

    async fn delete_token(&self, name: &str, expected_etag: Option<&str>) -> GatewayResult<()> {
        let request = self
            .build_request(Method::DELETE, "/token")
            .header(TOKEN_HEADER, name);
        self.send(with_etag(request, expected_etag)).await?;
        Ok(())
    }

    async fn list_services_for_token(&self, name: &str) -> GatewayResult<Vec<Service>> {
        let request = self
            .build_request(Method::GET, "/apps")
            .query(&[("token", name)]);
        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn get_service(&self, service_id: &str) -> GatewayResult<Service> {
        let path = format!("/apps/{}", urlencoding::encode(service_id));
        let response = self.send(self.build_request(Method::GET, &path)).await?;
        let mut service: Service = Self::read_json(response).await?;
        if service.service_id.is_empty() {
            service.service_id = service_id.to_string();
        }
        Ok(service)
    }

    async fn kill_service(&self, service_id: &str) -> GatewayResult<()> {
        let path = format!("/apps/{}", urlencoding::encode(service_id));
        match self.send(self.build_request(Method::DELETE, &path)).await {
            Ok(_) => Ok(()),
            Err(GatewayError::NotFound) => Err(GatewayError::AlreadyInactive),
            Err(e) => Err(e),
        }
    }

    async fn ping_token(&self, name: &str) -> GatewayResult<()> {
        let request = self
            .build_request(Method::GET, "/waiter-ping")
            .header(TOKEN_HEADER, name);
        self.send(request).await?;
        Ok(())
    }

    async fn list_tokens(&self) -> GatewayResult<Vec<TokenSummary>> {
        let response = self.send(self.build_request(Method::GET, "/tokens")).await?;
        Self::read_json(response).await
    }
}
