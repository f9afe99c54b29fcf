//! Jolokia read 요청 생성
//!
//! direct/proxy 모드에 맞는 URL, body, 헤더를 구성합니다. 네트워크 I/O는 없습니다.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use url::Url;

use super::parser::CollectResult;
use crate::config::{Config, MetricConfig, Mode, ServerConfig};
use crate::error::CollectorError;

/// Jolokia read 요청 body
#[derive(Debug, Serialize)]
struct ReadRequest<'a> {
    #[serde(rename = "type")]
    request_type: &'static str,
    mbean: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attribute: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<ProxyTarget<'a>>,
}

/// proxy 모드의 원격 JMX 대상
#[derive(Debug, Serialize)]
struct ProxyTarget<'a> {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

/// Basic Auth 자격 증명
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// 전송 준비가 끝난 요청
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// `Authorization` 헤더가 없을 때만 적용
    pub credentials: Option<Credentials>,
}

/// 설정 기반 요청 생성기
#[derive(Debug, Clone)]
pub struct RequestFactory {
    mode: Mode,
    context: String,
    proxy: Option<ServerConfig>,
    auth_header: String,
    use_https: bool,
}

impl RequestFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            mode: config.mode,
            context: config.context.clone(),
            proxy: config.proxy.clone(),
            auth_header: config.jmx_auth.clone(),
            use_https: config.https,
        }
    }

    /// (server, metric) 쌍에 대한 read 요청 생성
    pub fn build(
        &self,
        server: &ServerConfig,
        metric: &MetricConfig,
    ) -> CollectResult<PreparedRequest> {
        let attribute = non_empty(&metric.attribute);
        let mut body = ReadRequest {
            request_type: "read",
            mbean: &metric.mbean,
            attribute,
            path: attribute.and(non_empty(&metric.path)),
            target: None,
        };

        let (url, credentials) = match self.mode {
            Mode::Proxy => {
                let proxy = self.proxy.as_ref().ok_or(CollectorError::MissingProxy)?;
                body.target = Some(ProxyTarget {
                    url: service_url(server),
                    user: non_empty(&server.username),
                    password: non_empty(&server.password),
                });
                (self.endpoint("http", proxy)?, basic_auth_for(proxy))
            }
            Mode::Direct => {
                let scheme = if self.use_https { "https" } else { "http" };
                (self.endpoint(scheme, server)?, basic_auth_for(server))
            }
        };

        let body = serde_json::to_vec(&body).map_err(CollectorError::RequestEncode)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.auth_header.is_empty() {
            let value = HeaderValue::from_str(&self.auth_header)
                .map_err(|e| CollectorError::InvalidHeader(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(PreparedRequest {
            method: Method::POST,
            url,
            headers,
            body,
            credentials,
        })
    }

    fn endpoint(&self, scheme: &str, agent: &ServerConfig) -> CollectResult<Url> {
        let raw = format!("{}://{}:{}{}", scheme, agent.host, agent.port, self.context);
        Url::parse(&raw).map_err(|source| CollectorError::InvalidUrl { url: raw, source })
    }
}

/// RMI 서비스 URL (proxy 대상)
fn service_url(server: &ServerConfig) -> String {
    format!(
        "service:jmx:rmi:///jndi/rmi://{}:{}/jmxrmi",
        server.host, server.port
    )
}

fn basic_auth_for(agent: &ServerConfig) -> Option<Credentials> {
    let username = agent.username.as_deref().unwrap_or_default();
    let password = agent.password.as_deref().unwrap_or_default();
    if username.is_empty() && password.is_empty() {
        return None;
    }
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
