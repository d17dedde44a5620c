//! Serialization filters for manifests
//!
//! Usage: `{{ CONFIG_JSON | fromjson | toyaml }}`, `{{ TOKEN | b64encode }}`

use base64::Engine as _;
use minijinja::{Environment, Error, ErrorKind, Value};

pub(crate) fn register(env: &mut Environment<'static>) {
    env.add_filter("toyaml", toyaml);
    env.add_filter("tojson", tojson);
    env.add_filter("fromyaml", fromyaml);
    env.add_filter("fromjson", fromjson);
    env.add_filter("b64encode", b64encode);
    env.add_filter("b64decode", b64decode);

    // camelCase names older kd manifests use, as filters and as functions
    env.add_filter("toYaml", toyaml);
    env.add_filter("toJson", tojson);
    env.add_filter("fromYaml", fromyaml);
    env.add_filter("fromJson", fromjson);
    env.add_function("toYaml", toyaml);
    env.add_function("toJson", tojson);
    env.add_function("fromYaml", fromyaml);
    env.add_function("fromJson", fromjson);
}

fn invalid(e: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidOperation, e.to_string())
}

/// Convert a value to YAML, without the document marker or trailing newline
pub fn toyaml(value: Value) -> Result<String, Error> {
    let json_value: serde_json::Value = serde_json::to_value(&value).map_err(invalid)?;
    let yaml = serde_yaml::to_string(&json_value).map_err(invalid)?;

    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

pub fn tojson(value: Value) -> Result<String, Error> {
    let json_value: serde_json::Value = serde_json::to_value(&value).map_err(invalid)?;
    serde_json::to_string(&json_value).map_err(invalid)
}

pub fn fromyaml(value: String) -> Result<Value, Error> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(&value).map_err(invalid)?;
    Ok(Value::from_serialize(&parsed))
}

pub fn fromjson(value: String) -> Result<Value, Error> {
    let parsed: serde_json::Value = serde_json::from_str(&value).map_err(invalid)?;
    Ok(Value::from_serialize(&parsed))
}

#[must_use]
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.as_bytes())
        .map_err(invalid)?;
    String::from_utf8(bytes).map_err(invalid)
}
