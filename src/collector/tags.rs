//! MBean ObjectName 기반 태그 추출

use std::collections::BTreeMap;

use super::parser::CollectResult;
use crate::error::CollectorError;

/// 태그 이름 -> 값
pub type Tags = BTreeMap<String, String>;

/// allow-list에 넣으면 도메인을 `_domain` 태그로 추가하는 키
pub const DOMAIN_KEY: &str = "*domain";

/// 도메인 태그 이름
pub const DOMAIN_TAG: &str = "_domain";

/// MBean ObjectName 구조
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectName {
    /// 도메인 (예: "java.lang")
    pub domain: String,
    /// 속성, 원래 순서 유지 (예: [("type", "Memory")])
    pub properties: Vec<(String, String)>,
}

impl ObjectName {
    /// ObjectName 문자열 파싱
    ///
    /// 첫 번째 `:`에서 도메인과 속성 목록을 나누고, 각 속성은
    /// 정확히 하나의 `=`를 가져야 합니다.
    ///
    /// # Limitations
    /// - Quoted values containing `,` or `=` are NOT supported
    pub fn parse(s: &str) -> CollectResult<Self> {
        let (domain, list) = s
            .split_once(':')
            .ok_or_else(|| CollectorError::MalformedMBean(s.to_string()))?;

        let properties: Vec<(String, String)> = list
            .split(',')
            .map(|prop| {
                let kv: Vec<&str> = prop.split('=').collect();
                match kv.as_slice() {
                    [key, value] => Ok((key.to_string(), value.to_string())),
                    _ => Err(CollectorError::MalformedMBeanProperty {
                        mbean: s.to_string(),
                        property: prop.to_string(),
                    }),
                }
            })
            .collect::<CollectResult<_>>()?;

        Ok(Self {
            domain: domain.to_string(),
            properties,
        })
    }

    /// allow-list에 포함된 속성만 태그로 변환해 `defaults` 위에 덮어씁니다
    pub fn tags(&self, allowed: &[String], defaults: &Tags) -> Tags {
        let mut tags = defaults.clone();

        if allowed.iter().any(|key| key == DOMAIN_KEY) {
            tags.insert(DOMAIN_TAG.to_string(), self.domain.clone());
        }

        for (key, value) in &self.properties {
            if allowed.iter().any(|allowed_key| allowed_key == key) {
                tags.insert(key.trim().to_string(), value.clone());
            }
        }

        tags
    }
}

/// MBean 이름에서 태그 추출
pub fn extract_tags(mbean: &str, allowed: &[String], defaults: &Tags) -> CollectResult<Tags> {
    Ok(ObjectName::parse(mbean)?.tags(allowed, defaults))
}
