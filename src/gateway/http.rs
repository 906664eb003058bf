use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{
    config::settings::GatewaySettings,
    error::ServiceError,
    gateway::{
        AuthorizeRequest, AuthorizeResponse, CancellationRequest, CancellationResponse, FiscalGateway, GatewayError,
        ServiceStatusRequest, ServiceStatusResponse,
    },
};

const AUTHORIZE_PATH: &str = "api/nfe/authorize";
const CANCEL_PATH: &str = "api/nfe/cancel";
const STATUS_PATH: &str = "api/nfe/status";

/// JSON client for the Fiscal Gateway service.
#[derive(Clone)]
pub struct HttpFiscalGateway {
    client: Client,
    base_url: Url,
}

impl HttpFiscalGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        // Url::join drops the last segment unless the base ends with a slash.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|e| {
            ServiceError::internal_server_error("Invalid fiscal gateway URL")
                .with_context(|ctx| ctx.with_tag("gateway").with_detail(e.to_string()))
        })?;
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ServiceError::internal_server_error("Failed to build fiscal gateway client")
                .with_context(|ctx| ctx.with_tag("gateway").with_detail(e.to_string()))
        })?;
        Ok(Self { client, base_url })
    }

    pub fn from_settings(settings: &GatewaySettings) -> Result<Self, ServiceError> {
        Self::new(&settings.base_url, settings.timeout)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| GatewayError::Connection(err.to_string()))?;
        log::debug!("POST {}", url);
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Connection(err.to_string())
                }
            })?;
        Self::decode_response(resp).await
    }

    /// The gateway answers rejections with `400` and the same body shape as a
    /// success, so both are decoded. Anything else is a transport failure.
    async fn decode_response<T>(resp: Response) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let status = resp.status();
        let body = resp.text().await.map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Connection(err.to_string())
            }
        })?;

        if status.is_success() {
            serde_json::from_str::<T>(&body).map_err(|err| GatewayError::Decode(err.to_string()))
        } else if status == StatusCode::BAD_REQUEST {
            serde_json::from_str::<T>(&body).map_err(|_| GatewayError::HttpStatus {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(GatewayError::HttpStatus {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl FiscalGateway for HttpFiscalGateway {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, GatewayError> {
        self.post(AUTHORIZE_PATH, &request).await
    }

    async fn cancel(&self, request: CancellationRequest) -> Result<CancellationResponse, GatewayError> {
        self.post(CANCEL_PATH, &request).await
    }

    async fn service_status(&self, request: ServiceStatusRequest) -> Result<ServiceStatusResponse, GatewayError> {
        self.post(STATUS_PATH, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_its_path_prefix() {
        let gateway = HttpFiscalGateway::new("http://localhost:9000/dfe", Duration::from_secs(5)).unwrap();
        assert_eq!(
            gateway.base_url.join(AUTHORIZE_PATH).unwrap().as_str(),
            "http://localhost:9000/dfe/api/nfe/authorize"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpFiscalGateway::new("not a url", Duration::from_secs(5)).is_err());
    }
}
