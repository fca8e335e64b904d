//! 型の揺れを許容するデシリアライザー
//!
//! プロデューサーによって数値が文字列で来たり、その逆だったりする。
//! 解釈できない値は `None` にして、イベント全体は落とさない。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 数値または数値文字列
pub(crate) fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_to_i64))
}

/// 文字列または数値
pub(crate) fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_to_string))
}

/// 文字列または数値（欠落・解釈不能なら空文字列）
pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.unwrap_or_default())
}

/// 真偽値、0/1、"true"/"false"
pub(crate) fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Value>::deserialize(deserializer)?.and_then(|value| match value {
            Value::Bool(b) => Some(b),
            Value::String(s) => s.trim().parse::<bool>().ok(),
            other => value_to_i64(&other).map(|n| n != 0),
        }),
    )
}

/// 任意の型。解釈できなければ `None`
pub(crate) fn opt_parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok()))
}

/// ネストしたオブジェクト。形が合わなければ `None`
pub(crate) fn opt_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .filter(Value::is_object)
        .and_then(|value| serde_json::from_value(value).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Default)]
    struct Sample {
        #[serde(default, deserialize_with = "opt_i64")]
        count: Option<i64>,
        #[serde(default, deserialize_with = "opt_string")]
        id: Option<String>,
        #[serde(default, deserialize_with = "opt_bool")]
        flag: Option<bool>,
    }

    fn sample(value: serde_json::Value) -> Sample {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_number_or_numeric_string() {
        assert_eq!(sample(json!({"count": 3})).count, Some(3));
        assert_eq!(sample(json!({"count": "3"})).count, Some(3));
        assert_eq!(sample(json!({"count": " 12 "})).count, Some(12));
        assert_eq!(sample(json!({"count": 2.0})).count, Some(2));
        assert_eq!(sample(json!({"count": "many"})).count, None);
        assert_eq!(sample(json!({"count": null})).count, None);
        assert_eq!(sample(json!({"count": [1]})).count, None);
        assert_eq!(sample(json!({})).count, None);
    }

    #[test]
    fn test_string_or_number() {
        assert_eq!(sample(json!({"id": "123"})).id.as_deref(), Some("123"));
        assert_eq!(sample(json!({"id": 123456789})).id.as_deref(), Some("123456789"));
        assert_eq!(sample(json!({"id": {"x": 1}})).id, None);
    }

    #[test]
    fn test_bool_variants() {
        assert_eq!(sample(json!({"flag": true})).flag, Some(true));
        assert_eq!(sample(json!({"flag": 0})).flag, Some(false));
        assert_eq!(sample(json!({"flag": "true"})).flag, Some(true));
        assert_eq!(sample(json!({"flag": "yes"})).flag, None);
    }
}
