//! Jolokia JMX 메트릭 수집 모듈
//!
//! 설정된 서버 × 메트릭 조합마다 read 요청을 보내고, 응답을 검증한 뒤
//! 평탄화된 필드와 태그를 [`Sink`]로 전달합니다.
//!
//! # Example
//!
//! ```ignore
//! use rjmx_poller::collector::Collector;
//! use rjmx_poller::sink::MemorySink;
//!
//! let collector = Collector::from_config(&config);
//! let mut sink = MemorySink::new();
//! let report = collector.poll(&mut sink).await?;
//! ```

mod flatten;
mod parser;
mod request;
mod tags;
mod transport;

pub use flatten::{FieldValue, Fields, Flattener};
pub use parser::{decode_response, parse_envelope, CollectResult};
pub use request::{Credentials, PreparedRequest, RequestFactory};
pub use tags::{extract_tags, ObjectName, Tags, DOMAIN_KEY, DOMAIN_TAG};
pub use transport::{HttpTransport, RawResponse, Transport, TransportSettings};

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::{Config, MetricConfig, ServerConfig};
use crate::error::CollectorError;
use crate::sink::Sink;

/// 모든 field-set에 사용되는 measurement 이름
pub const MEASUREMENT: &str = "jolokia";

/// 폴링 중 기록된 non-fatal 실패
#[derive(Debug)]
pub struct MetricFailure {
    /// 서버 이름
    pub server: String,
    /// 메트릭 이름
    pub metric: String,
    /// 태그 추출에 실패한 MBean (있는 경우)
    pub mbean: Option<String>,
    /// 실패 원인
    pub error: CollectorError,
}

/// 폴링 사이클 결과
#[derive(Debug, Default)]
pub struct PollReport {
    /// Sink로 전달된 field-set 수
    pub emitted: usize,
    /// 건너뛴 메트릭/MBean
    pub failures: Vec<MetricFailure>,
}

impl PollReport {
    fn record(
        &mut self,
        server: &ServerConfig,
        metric: &MetricConfig,
        mbean: Option<&str>,
        error: CollectorError,
    ) {
        warn!(
            server = %server.name,
            metric = %metric.name,
            mbean = mbean.unwrap_or_default(),
            severity = %error.severity(),
            error = %error,
            "Skipping metric"
        );
        self.failures.push(MetricFailure {
            server: server.name.clone(),
            metric: metric.name.clone(),
            mbean: mbean.map(str::to_string),
            error,
        });
    }
}

/// 서버별 기본 태그
pub fn default_tags(server: &ServerConfig) -> Tags {
    Tags::from([
        ("jolokia_name".to_string(), server.name.clone()),
        ("jolokia_host".to_string(), server.host.clone()),
        ("jolokia_port".to_string(), server.port.clone()),
    ])
}

/// Collector 구조체 - 폴링 사이클 orchestrator
pub struct Collector<T: Transport> {
    requests: RequestFactory,
    flattener: Flattener,
    servers: Vec<ServerConfig>,
    metrics: Vec<MetricConfig>,
    transport: T,
}

impl Collector<HttpTransport> {
    /// reqwest Transport로 Collector 생성
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, HttpTransport::new(TransportSettings::from(config)))
    }
}

impl<T: Transport> Collector<T> {
    /// 주어진 Transport로 Collector 생성
    pub fn new(config: &Config, transport: T) -> Self {
        Self {
            requests: RequestFactory::new(config),
            flattener: Flattener::new(config.delimiter.clone()),
            servers: config.servers.clone(),
            metrics: config.metrics.clone(),
            transport,
        }
    }

    /// 요청 생성기 참조 반환
    pub fn requests(&self) -> &RequestFactory {
        &self.requests
    }

    /// Transport 참조 반환
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 폴링 사이클 1회 실행
    ///
    /// 요청 생성/전송 에러는 사이클 전체를 중단하고 `Err`로 반환됩니다.
    /// 응답 및 payload 에러는 [`PollReport::failures`]에 기록되고 다음 메트릭으로 넘어갑니다.
    #[instrument(skip_all, fields(servers = self.servers.len(), metrics = self.metrics.len()))]
    pub async fn poll(&self, sink: &mut dyn Sink) -> CollectResult<PollReport> {
        let mut report = PollReport::default();

        for server in &self.servers {
            let defaults = default_tags(server);

            for metric in &self.metrics {
                let request = self.requests.build(server, metric)?;
                debug!(
                    server = %server.name,
                    metric = %metric.name,
                    url = %request.url,
                    "Sending Jolokia read request"
                );

                let response = self.transport.execute(request).await?;

                match decode_response(&response) {
                    Ok(mut envelope) => match envelope.remove("value") {
                        Some(value) => {
                            self.extract_metric(value, server, metric, &defaults, sink, &mut report)
                        }
                        None => report.record(server, metric, None, CollectorError::MissingValue),
                    },
                    Err(e) => report.record(server, metric, None, e),
                }
            }
        }

        debug!(
            emitted = report.emitted,
            failures = report.failures.len(),
            "Poll cycle complete"
        );

        Ok(report)
    }

    fn extract_metric(
        &self,
        value: Value,
        server: &ServerConfig,
        metric: &MetricConfig,
        defaults: &Tags,
        sink: &mut dyn Sink,
        report: &mut PollReport,
    ) {
        if metric.tags_from_mbean.is_empty() {
            let fields = self.flattener.flatten(&metric.name, &value);
            sink.emit(MEASUREMENT, fields, defaults.clone());
            report.emitted += 1;
            return;
        }

        let Value::Object(per_mbean) = value else {
            report.record(server, metric, None, CollectorError::MissingMBeanName);
            return;
        };

        for (mbean, inner) in &per_mbean {
            match extract_tags(mbean, &metric.tags_from_mbean, defaults) {
                Ok(tags) => {
                    let fields = self.flattener.flatten(&metric.name, inner);
                    sink.emit(MEASUREMENT, fields, tags);
                    report.emitted += 1;
                }
                Err(e) => report.record(server, metric, Some(mbean.as_str()), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 미리 정해진 응답을 순서대로 돌려주는 Transport
    struct StubTransport {
        responses: Mutex<VecDeque<CollectResult<RawResponse>>>,
        requests: Mutex<Vec<PreparedRequest>>,
    }

    impl StubTransport {
        fn new(responses: Vec<CollectResult<RawResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(vec![]),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn execute(&self, request: PreparedRequest) -> CollectResult<RawResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(RawResponse::new(StatusCode::NOT_FOUND, "")))
        }
    }

    fn ok(body: serde_json::Value) -> CollectResult<RawResponse> {
        Ok(RawResponse::new(StatusCode::OK, body.to_string()))
    }

    fn server(name: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            host: "127.0.0.1".to_string(),
            port: "8080".to_string(),
            ..ServerConfig::default()
        }
    }

    fn metric(name: &str, mbean: &str, tags_from_mbean: &[&str]) -> MetricConfig {
        MetricConfig {
            name: name.to_string(),
            mbean: mbean.to_string(),
            tags_from_mbean: tags_from_mbean.iter().map(|k| k.to_string()).collect(),
            ..MetricConfig::default()
        }
    }

    fn config(servers: Vec<ServerConfig>, metrics: Vec<MetricConfig>) -> Config {
        Config {
            servers,
            metrics,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_heap_memory_usage_fields() {
        let transport = StubTransport::new(vec![ok(json!({
            "status": 200,
            "value": {"HeapMemoryUsage": {"used": 123, "max": 456}}
        }))]);
        let config = config(
            vec![server("as-server-01")],
            vec![metric("heap_memory_usage", "java.lang:type=Memory", &[])],
        );
        let collector = Collector::new(&config, transport);
        let mut sink = MemorySink::new();

        let report = collector.poll(&mut sink).await.unwrap();

        assert_eq!(report.emitted, 1);
        assert!(report.failures.is_empty());
        let emission = &sink.emissions[0];
        assert_eq!(emission.measurement, "jolokia");
        assert_eq!(
            emission.fields,
            Fields::from([
                (
                    "heap_memory_usage_HeapMemoryUsage_max".to_string(),
                    FieldValue::Integer(456)
                ),
                (
                    "heap_memory_usage_HeapMemoryUsage_used".to_string(),
                    FieldValue::Integer(123)
                ),
            ])
        );
        assert_eq!(emission.tags, default_tags(&server("as-server-01")));
    }

    #[tokio::test]
    async fn test_attribute_scoped_value_fields() {
        let transport = StubTransport::new(vec![ok(json!({
            "status": 200,
            "value": {"used": 123, "max": 456}
        }))]);
        let config = config(
            vec![server("s1")],
            vec![metric("heap_memory_usage", "java.lang:type=Memory", &[])],
        );
        let mut sink = MemorySink::new();

        Collector::new(&config, transport)
            .poll(&mut sink)
            .await
            .unwrap();

        let fields = &sink.emissions[0].fields;
        assert_eq!(fields["heap_memory_usage_used"], FieldValue::Integer(123));
        assert_eq!(fields["heap_memory_usage_max"], FieldValue::Integer(456));
    }

    #[tokio::test]
    async fn test_bad_status_skips_metric() {
        let transport = StubTransport::new(vec![
            ok(json!({"status": 500, "error": "boom"})),
            ok(json!({"status": 200, "value": 42})),
        ]);
        let config = config(
            vec![server("s1")],
            vec![
                metric("broken", "java.lang:type=Broken", &[]),
                metric("thread_count", "java.lang:type=Threading", &[]),
            ],
        );
        let collector = Collector::new(&config, transport);
        let mut sink = MemorySink::new();

        let report = collector.poll(&mut sink).await.unwrap();

        assert_eq!(collector.transport().request_count(), 2);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].metric, "broken");
        assert!(matches!(
            report.failures[0].error,
            CollectorError::BadStatus(_)
        ));
        assert_eq!(
            sink.emissions[0].fields["thread_count"],
            FieldValue::Integer(42)
        );
    }

    #[tokio::test]
    async fn test_missing_value() {
        let transport = StubTransport::new(vec![ok(json!({"status": 200}))]);
        let config = config(vec![server("s1")], vec![metric("m", "d:k=v", &[])]);
        let mut sink = MemorySink::new();

        let report = Collector::new(&config, transport)
            .poll(&mut sink)
            .await
            .unwrap();

        assert!(sink.emissions.is_empty());
        assert!(matches!(
            report.failures[0].error,
            CollectorError::MissingValue
        ));
    }

    #[tokio::test]
    async fn test_tags_from_mbean_per_key() {
        let transport = StubTransport::new(vec![ok(json!({
            "status": 200,
            "value": {
                "java.lang:type=GarbageCollector,name=G1 Young Generation": {
                    "CollectionCount": 42
                },
                "java.lang:type=GarbageCollector,name=G1 Old Generation": {
                    "CollectionCount": 5
                }
            }
        }))]);
        let config = config(
            vec![server("s1")],
            vec![metric(
                "gc",
                "java.lang:type=GarbageCollector,*",
                &["name", "*domain"],
            )],
        );
        let mut sink = MemorySink::new();

        let report = Collector::new(&config, transport)
            .poll(&mut sink)
            .await
            .unwrap();

        assert_eq!(report.emitted, 2);
        for emission in &sink.emissions {
            assert_eq!(emission.tags["_domain"], "java.lang");
            assert_eq!(emission.tags["jolokia_name"], "s1");
            assert!(!emission.tags.contains_key("type"));
        }
        let old = sink
            .emissions
            .iter()
            .find(|e| e.tags["name"] == "G1 Old Generation")
            .unwrap();
        assert_eq!(old.fields["gc_CollectionCount"], FieldValue::Integer(5));
    }

    #[tokio::test]
    async fn test_malformed_mbean_key_skips_entry_only() {
        let transport = StubTransport::new(vec![ok(json!({
            "status": 200,
            "value": {
                "no-colon-here": {"Count": 1},
                "app:type=Cache": {"Count": 2}
            }
        }))]);
        let config = config(vec![server("s1")], vec![metric("cache", "app:*", &["type"])]);
        let mut sink = MemorySink::new();

        let report = Collector::new(&config, transport)
            .poll(&mut sink)
            .await
            .unwrap();

        assert_eq!(report.emitted, 1);
        assert_eq!(sink.emissions[0].tags["type"], "Cache");
        assert_eq!(report.failures[0].mbean.as_deref(), Some("no-colon-here"));
        assert!(matches!(
            report.failures[0].error,
            CollectorError::MalformedMBean(_)
        ));
    }

    #[tokio::test]
    async fn test_array_value_with_tags_from_mbean() {
        let transport = StubTransport::new(vec![
            ok(json!({"status": 200, "value": [1, 2, 3]})),
            ok(json!({"status": 200, "value": 7})),
        ]);
        let config = config(
            vec![server("s1")],
            vec![
                metric("tagged", "app:type=*", &["type"]),
                metric("plain", "app:type=Plain", &[]),
            ],
        );
        let mut sink = MemorySink::new();

        let report = Collector::new(&config, transport)
            .poll(&mut sink)
            .await
            .unwrap();

        assert!(matches!(
            report.failures[0].error,
            CollectorError::MissingMBeanName
        ));
        assert_eq!(sink.emissions.len(), 1);
        assert_eq!(sink.emissions[0].fields["plain"], FieldValue::Integer(7));
    }

    #[tokio::test]
    async fn test_transport_error_aborts_poll() {
        let transport = StubTransport::new(vec![
            Err(CollectorError::ConnectionFailed("refused".to_string())),
            ok(json!({"status": 200, "value": 1})),
        ]);
        let config = config(
            vec![server("s1"), server("s2")],
            vec![metric("m", "d:k=v", &[])],
        );
        let collector = Collector::new(&config, transport);
        let mut sink = MemorySink::new();

        let result = collector.poll(&mut sink).await;

        assert!(matches!(result, Err(CollectorError::ConnectionFailed(_))));
        assert_eq!(collector.transport().request_count(), 1);
        assert!(sink.emissions.is_empty());
    }

    #[tokio::test]
    async fn test_build_error_aborts_before_io() {
        let transport = StubTransport::new(vec![]);
        let bad = ServerConfig {
            port: "bad port".to_string(),
            ..server("s1")
        };
        let config = config(vec![bad], vec![metric("m", "d:k=v", &[])]);
        let collector = Collector::new(&config, transport);
        let mut sink = MemorySink::new();

        let result = collector.poll(&mut sink).await;

        assert!(matches!(result, Err(CollectorError::InvalidUrl { .. })));
        assert_eq!(collector.transport().request_count(), 0);
    }

    #[tokio::test]
    async fn test_default_tags_per_server() {
        let transport = StubTransport::new(vec![
            ok(json!({"status": 200, "value": 1})),
            ok(json!({"status": 200, "value": 2})),
        ]);
        let config = config(
            vec![server("s1"), server("s2")],
            vec![metric("m", "d:k=v", &[])],
        );
        let mut sink = MemorySink::new();

        Collector::new(&config, transport)
            .poll(&mut sink)
            .await
            .unwrap();

        let names: Vec<&str> = sink
            .emissions
            .iter()
            .map(|e| e.tags["jolokia_name"].as_str())
            .collect();
        assert_eq!(names, vec!["s1", "s2"]);
    }
}
