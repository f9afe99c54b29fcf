//! 중첩된 속성 값 평탄화
//!
//! `{"HeapMemoryUsage": {"used": 1, "max": 2}}` 같은 값을
//! `heap_HeapMemoryUsage_used`, `heap_HeapMemoryUsage_max` 필드로 펼칩니다.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// 필드 이름 -> 스칼라 값
pub type Fields = BTreeMap<String, FieldValue>;

/// 평탄화된 필드 값
///
/// JSON 배열은 순회하지 않고 하나의 불투명한 값으로 취급합니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 정수
    Integer(i64),
    /// 실수 (i64 범위를 넘는 정수 포함)
    Float(f64),
    /// 문자열
    String(String),
    /// 불리언
    Boolean(bool),
    /// Null
    Null,
    /// 배열 (원소 그대로 보존)
    Array(Vec<Value>),
}

/// delimiter 기반 평탄화기
#[derive(Debug, Clone)]
pub struct Flattener {
    delimiter: String,
}

impl Flattener {
    /// 빈 delimiter는 단순 이어붙이기가 됩니다
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    /// `value`를 `prefix` 아래로 평탄화
    pub fn flatten(&self, prefix: &str, value: &Value) -> Fields {
        let mut fields = Fields::new();
        self.flatten_into(prefix.to_string(), value, &mut fields);
        fields
    }

    fn flatten_into(&self, key: String, value: &Value, fields: &mut Fields) {
        let leaf = match value {
            Value::Object(map) => {
                for (child, inner) in map {
                    let name = format!("{}{}{}", key, self.delimiter, child);
                    self.flatten_into(name, inner, fields);
                }
                return;
            }
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(items) => FieldValue::Array(items.clone()),
        };
        fields.insert(key, leaf);
    }
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new("_")
    }
}
