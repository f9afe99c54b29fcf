//! Jolokia JSON 응답 파서
//!
//! HTTP 상태 코드와 Jolokia envelope의 `status`를 검증하고
//! 디코딩된 JSON 객체를 반환합니다.

use reqwest::StatusCode;
use serde_json::{Map, Value};

use super::transport::RawResponse;
use crate::error::CollectorError;

/// Collector 작업 결과 타입
pub type CollectResult<T> = Result<T, CollectorError>;

/// Jolokia가 성공 시 돌려주는 status 값
const JOLOKIA_SUCCESS: f64 = 200.0;

/// 응답 검증 및 디코딩
///
/// 성공 시 envelope 전체를 반환하며, 호출자가 `value`를 꺼내 씁니다.
pub fn decode_response(response: &RawResponse) -> CollectResult<Map<String, Value>> {
    if response.status != StatusCode::OK {
        return Err(CollectorError::HttpStatus {
            status: response.status.as_u16(),
            reason: response
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
        });
    }

    let body = response
        .body
        .as_ref()
        .map_err(|e| CollectorError::BodyRead(e.clone()))?;

    parse_envelope(body)
}

/// body 바이트를 envelope 객체로 파싱하고 `status`를 확인
pub fn parse_envelope(body: &[u8]) -> CollectResult<Map<String, Value>> {
    let envelope: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| CollectorError::JsonParse(e.to_string()))?;

    match envelope.get("status") {
        None => Err(CollectorError::MissingStatus),
        Some(status) if status.as_f64() == Some(JOLOKIA_SUCCESS) => Ok(envelope),
        Some(status) => Err(CollectorError::BadStatus(status.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: &str) -> RawResponse {
        RawResponse::new(StatusCode::OK, body)
    }

    #[test]
    fn test_decode_success() {
        let response = ok(r#"{
            "request": {"mbean": "java.lang:type=Memory", "type": "read"},
            "value": {"HeapMemoryUsage": {"used": 123, "max": 456}},
            "timestamp": 1609459200,
            "status": 200
        }"#);

        let envelope = decode_response(&response).unwrap();
        assert_eq!(
            envelope["value"],
            json!({"HeapMemoryUsage": {"used": 123, "max": 456}})
        );
    }

    #[test]
    fn test_http_status_error() {
        let response = RawResponse::new(StatusCode::SERVICE_UNAVAILABLE, "");
        match decode_response(&response) {
            Err(CollectorError::HttpStatus { status, reason }) => {
                assert_eq!(status, 503);
                assert_eq!(reason, "Service Unavailable");
            }
            other => panic!("Expected HttpStatus error, got {:?}", other),
        }
    }

    #[test]
    fn test_body_read_error() {
        let response = RawResponse {
            status: StatusCode::OK,
            headers: Default::default(),
            body: Err("connection reset".to_string()),
        };
        assert!(matches!(
            decode_response(&response),
            Err(CollectorError::BodyRead(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            decode_response(&ok("<html>not json</html>")),
            Err(CollectorError::JsonParse(_))
        ));
    }

    #[test]
    fn test_non_object_json() {
        assert!(matches!(
            decode_response(&ok("[1, 2, 3]")),
            Err(CollectorError::JsonParse(_))
        ));
    }

    #[test]
    fn test_missing_status() {
        assert!(matches!(
            decode_response(&ok(r#"{"value": 1}"#)),
            Err(CollectorError::MissingStatus)
        ));
    }

    #[test]
    fn test_bad_status() {
        let response = ok(r#"{
            "error_type": "javax.management.InstanceNotFoundException",
            "error": "No MBean found",
            "status": 404
        }"#);
        match decode_response(&response) {
            Err(CollectorError::BadStatus(status)) => assert_eq!(status, json!(404)),
            other => panic!("Expected BadStatus error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_must_be_numeric() {
        assert!(matches!(
            decode_response(&ok(r#"{"status": "200", "value": 1}"#)),
            Err(CollectorError::BadStatus(_))
        ));
    }
}
