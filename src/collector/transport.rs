//! Jolokia HTTP 전송 계층
//!
//! Connection pooling, TLS, 타임아웃을 담당합니다. reqwest 클라이언트는
//! 첫 요청 시점에 한 번만 생성되고 이후 모든 폴링 사이클에서 재사용됩니다.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Certificate, Client, ClientBuilder, Identity, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::parser::CollectResult;
use super::request::PreparedRequest;
use crate::config::Config;
use crate::error::CollectorError;

/// 전송 결과 (아직 검증되지 않은 원시 응답)
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// body 읽기 실패는 디코더가 분류할 수 있도록 여기에 담습니다
    pub body: Result<Vec<u8>, String>,
}

impl RawResponse {
    /// 상태 코드와 body로 응답 생성
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Ok(body.into()),
        }
    }
}

/// 준비된 요청을 실행하는 전송 계층
#[async_trait]
pub trait Transport: Send + Sync {
    /// 요청 실행. 에러는 모두 transport 에러(폴링 사이클 중단)로 취급됩니다.
    async fn execute(&self, request: PreparedRequest) -> CollectResult<RawResponse>;
}

/// HTTP 클라이언트 설정
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// `send()` 호출부터 응답 헤더까지의 대기 시간
    ///
    /// DNS 조회, TCP 연결, TLS 핸드셰이크 시간도 포함됩니다.
    pub response_header_timeout: Duration,
    /// body를 포함한 전체 요청 시간
    pub client_timeout: Duration,
    pub ssl_ca: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
    pub insecure_skip_verify: bool,
}

impl From<&Config> for TransportSettings {
    fn from(config: &Config) -> Self {
        Self {
            response_header_timeout: config.response_header_timeout,
            client_timeout: config.client_timeout,
            ssl_ca: config.ssl_ca.clone(),
            ssl_cert: config.ssl_cert.clone(),
            ssl_key: config.ssl_key.clone(),
            insecure_skip_verify: config.insecure_skip_verify,
        }
    }
}

/// reqwest 기반 Transport
pub struct HttpTransport {
    settings: TransportSettings,
    client: OnceCell<Client>,
}

impl HttpTransport {
    /// 새 Transport 생성 (클라이언트는 첫 요청 시 생성)
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> CollectResult<&Client> {
        self.client.get_or_try_init(|| build_client(&self.settings))
    }
}

fn build_client(settings: &TransportSettings) -> CollectResult<Client> {
    let mut builder = ClientBuilder::new()
        .timeout(settings.client_timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30));

    if let Some(path) = &settings.ssl_ca {
        let pem = read_pem(path)?;
        let cert = Certificate::from_pem(&pem).map_err(|e| CollectorError::TlsMaterial {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        builder = builder.add_root_certificate(cert);
    }

    if let (Some(cert_path), Some(key_path)) = (&settings.ssl_cert, &settings.ssl_key) {
        let mut pem = read_pem(cert_path)?;
        pem.push(b'\n');
        pem.extend(read_pem(key_path)?);
        let identity = Identity::from_pem(&pem).map_err(|e| CollectorError::TlsMaterial {
            path: format!("{} + {}", cert_path, key_path),
            reason: e.to_string(),
        })?;
        builder = builder.identity(identity);
    }

    if settings.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    debug!(
        client_timeout_ms = settings.client_timeout.as_millis() as u64,
        tls_client_auth = settings.ssl_cert.is_some(),
        "Building HTTP client"
    );

    builder.build().map_err(CollectorError::HttpClientInit)
}

fn read_pem(path: &str) -> CollectResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| CollectorError::TlsMaterial {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: PreparedRequest) -> CollectResult<RawResponse> {
        let client = self.client()?;
        let PreparedRequest {
            method,
            url,
            headers,
            body,
            credentials,
        } = request;

        let explicit_auth = headers.contains_key(AUTHORIZATION);
        let mut req = client.request(method, url).headers(headers).body(body);
        if let (false, Some(creds)) = (explicit_auth, credentials) {
            req = req.basic_auth(creds.username, Some(creds.password));
        }

        let header_timeout = self.settings.response_header_timeout;
        let client_timeout = self.settings.client_timeout;
        let response = tokio::time::timeout(header_timeout, req.send())
            .await
            .map_err(|_| CollectorError::timeout_with_duration(header_timeout.as_millis() as u64))?
            .map_err(|e| {
                if e.is_timeout() {
                    CollectorError::timeout_with_duration(client_timeout.as_millis() as u64)
                } else {
                    CollectorError::from(e)
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| e.to_string());

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
