use std::fmt;

/// A value bound to a template variable or returned by a function.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Missing or empty; renders as an empty string.
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// Structured data; rendered as compact JSON.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Json(_) => "Json",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Number(n) => {
                if n.is_finite() && *n == n.floor() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => f.write_str(s),
            Value::Json(serde_json::Value::String(s)) => f.write_str(s),
            Value::Json(serde_json::Value::Null) => Ok(()),
            Value::Json(json) => write!(f, "{}", json),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b, // NaN != NaN per IEEE 754
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::String(s) => Value::String(s),
            // u64 beyond i64 stays JSON so it prints exactly.
            serde_json::Value::Number(n) => match (n.as_i64(), n.is_f64()) {
                (Some(i), _) => Value::Integer(i),
                (None, true) => n.as_f64().map_or(Value::Null, Value::Number),
                (None, false) => Value::Json(serde_json::Value::Number(n)),
            },
            other => Value::Json(other),
        }
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(n) => Value::Integer(n),
            toml::Value::Float(f) => Value::Number(f),
            toml::Value::Boolean(b) => Value::Boolean(b),
            other => match serde_json::to_value(&other) {
                Ok(json) => Value::Json(json),
                Err(_) => Value::String(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn null_renders_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(None::<String>).to_string(), "");
    }

    #[test]
    fn json_strings_render_unquoted() {
        assert_eq!(Value::Json(serde_json::json!("hi")).to_string(), "hi");
        assert_eq!(
            Value::Json(serde_json::json!({"a": [1, 2]})).to_string(),
            r#"{"a":[1,2]}"#
        );
    }

    #[test]
    fn json_scalars_become_plain_values() {
        assert_eq!(Value::from(serde_json::json!(true)), Value::Boolean(true));
        assert_eq!(Value::from(serde_json::json!(3)), Value::Integer(3));
        assert_eq!(Value::from(serde_json::json!(2.5)), Value::Number(2.5));
        assert_eq!(Value::from(serde_json::json!("s")), Value::String("s".into()));
    }

    #[test]
    fn toml_tables_become_json() {
        let table: toml::Value = toml::from_str("a = 1").expect("toml");
        assert_eq!(Value::from(table).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn large_integers_render_exactly() {
        let table: toml::Table = toml::from_str("id = 9007199254740993").expect("toml");
        let id = table.get("id").cloned().expect("id");
        assert_eq!(Value::from(id).to_string(), "9007199254740993");

        let json: serde_json::Value = serde_json::from_str("9007199254740993").expect("json");
        assert_eq!(Value::from(json).to_string(), "9007199254740993");

        let json: serde_json::Value = serde_json::from_str("18446744073709551615").expect("json");
        assert_eq!(Value::from(json).to_string(), "18446744073709551615");
    }
}
