//! Error types for rjmx-poller
//!
//! This module defines the error types used throughout the application.

use thiserror::Error;

/// Collector 에러의 심각도 분류
///
/// `Build`와 `Transport`는 폴링 사이클 전체를 중단시키고,
/// `Envelope`와 `Payload`는 해당 (server, metric) 쌍에만 국한됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 요청 구성 실패 (URL, 헤더, 프록시 설정)
    Build,
    /// 네트워크, 타임아웃, TLS 실패
    Transport,
    /// 응답 envelope 검증 실패
    Envelope,
    /// 응답 payload 형태 오류
    Payload,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Build => write!(f, "build"),
            Severity::Transport => write!(f, "transport"),
            Severity::Envelope => write!(f, "envelope"),
            Severity::Payload => write!(f, "payload"),
        }
    }
}

/// Collector 모듈 에러 타입
#[derive(Error, Debug)]
pub enum CollectorError {
    /// 요청 URL 구성 실패
    #[error("Invalid request URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Authorization 헤더 값이 유효하지 않음
    #[error("Invalid Authorization header value: {0}")]
    InvalidHeader(String),

    /// proxy 모드인데 proxy 설정이 없음
    #[error("Proxy mode requires a proxy descriptor")]
    MissingProxy,

    /// 요청 body 직렬화 실패
    #[error("Failed to encode request body: {0}")]
    RequestEncode(#[source] serde_json::Error),

    /// HTTP 클라이언트 초기화 실패
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    /// TLS 인증서/키 파일 로딩 실패
    #[error("Failed to load TLS material from '{path}': {reason}")]
    TlsMaterial { path: String, reason: String },

    /// HTTP 요청 실패
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// 타임아웃
    /// The value is the configured timeout in milliseconds, if known.
    #[error("Request timed out{}", .0.map(|ms| format!(" after {}ms", ms)).unwrap_or_default())]
    Timeout(Option<u64>),

    /// 연결 실패
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP 상태 코드 에러
    #[error("Response has status code {status} ({reason}), expected 200 (OK)")]
    HttpStatus { status: u16, reason: String },

    /// HTTP 응답 body 읽기 실패
    #[error("Failed to read HTTP response body: {0}")]
    BodyRead(String),

    /// JSON 파싱 에러
    #[error("Error decoding JSON response: {0}")]
    JsonParse(String),

    /// 응답 body에 status 키가 없음
    #[error("Missing status in response body")]
    MissingStatus,

    /// 응답 body의 status가 200이 아님
    #[error("Not expected status value in response body: {0}")]
    BadStatus(serde_json::Value),

    /// 응답 body에 value 키가 없음
    #[error("Missing key 'value' in output response")]
    MissingValue,

    /// tags_from_mbean이 설정됐지만 value가 MBean 이름 맵이 아님
    #[error("There was no MBean name in output response")]
    MissingMBeanName,

    /// 잘못된 ObjectName (콜론 없음)
    #[error("Malformed MBean name '{0}': expected 'domain:key=value,...'")]
    MalformedMBean(String),

    /// 잘못된 ObjectName 속성 (key=value 형식 아님)
    #[error("Incorrect format of MBean property '{property}' in '{mbean}'")]
    MalformedMBeanProperty { mbean: String, property: String },
}

impl CollectorError {
    /// 에러 심각도 분류
    pub fn severity(&self) -> Severity {
        match self {
            CollectorError::InvalidUrl { .. }
            | CollectorError::InvalidHeader(_)
            | CollectorError::MissingProxy
            | CollectorError::RequestEncode(_) => Severity::Build,
            CollectorError::HttpClientInit(_)
            | CollectorError::TlsMaterial { .. }
            | CollectorError::HttpRequest(_)
            | CollectorError::Timeout(_)
            | CollectorError::ConnectionFailed(_) => Severity::Transport,
            CollectorError::HttpStatus { .. }
            | CollectorError::BodyRead(_)
            | CollectorError::JsonParse(_)
            | CollectorError::MissingStatus
            | CollectorError::BadStatus(_) => Severity::Envelope,
            CollectorError::MissingValue
            | CollectorError::MissingMBeanName
            | CollectorError::MalformedMBean(_)
            | CollectorError::MalformedMBeanProperty { .. } => Severity::Payload,
        }
    }

    /// 폴링 사이클 전체를 중단해야 하는 에러인지 확인
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity(), Severity::Build | Severity::Transport)
    }

    /// HTTP 상태 코드 추출
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CollectorError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Create a Timeout error with known duration
    pub fn timeout_with_duration(ms: u64) -> Self {
        CollectorError::Timeout(Some(ms))
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest doesn't expose the configured timeout duration.
            // Use CollectorError::timeout_with_duration() when the duration is known.
            CollectorError::Timeout(None)
        } else if err.is_connect() {
            CollectorError::ConnectionFailed(err.to_string())
        } else if err.is_builder() {
            CollectorError::HttpClientInit(err)
        } else {
            CollectorError::HttpRequest(err)
        }
    }
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Collector error
    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Sink output error
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
