//! Global template functions
//!
//! ```jinja2
//! password: {{ secret("mysql", 24) }}
//! clusterIP: {{ k8lookup("Service", "db", ".spec.clusterIP") }}
//! nginx.conf: {{ file("conf/nginx.conf") | b64encode }}
//! app.conf: {{ file_with("conf/app.conf", {"PORT": "8080"}) }}
//! ```

use std::sync::Arc;
use std::sync::atomic::Ordering;

use base64::Engine as _;
use minijinja::{Environment, Error, ErrorKind, Value};
use rand::Rng;

use crate::engine::RenderState;

const UPPER_ALPHA: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER_ALPHA: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
const SPECIALS: &str = "_~=+%^*/()[]{}/!@#$?|";
const MYSQL_SAFE: &str = "_!#^&*()+{}|:<>?=";
const YAML_SAFE: &str = "_!#^&*()+<>?=";

const MAX_SECRET_LENGTH: i64 = 4096;

pub(crate) fn register(env: &mut Environment<'static>, state: &RenderState) {
    let secret_used = Arc::clone(&state.secret_used);
    env.add_function("secret", move |charset: String, length: i64| -> Result<String, Error> {
        let value = secret(&charset, length)?;
        secret_used.store(true, Ordering::Relaxed);
        Ok(value)
    });

    let lookup = Arc::clone(&state.lookup);
    env.add_function(
        "k8lookup",
        move |kind: String, name: String, path: String| -> Result<String, Error> {
            lookup.lookup(&kind, &name, &path).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("k8lookup {}/{} {}: {}", kind, name, path, e),
                )
            })
        },
    );

    let nested = state.clone();
    env.add_function("file", move |path: String| nested.render_nested(&path, None));

    let nested = state.clone();
    env.add_function("file_with", move |path: String, extra: Value| {
        nested.render_nested(&path, Some(extra))
    });

    let nested = state.clone();
    env.add_function("fileWith", move |path: String, extra: Value| {
        nested.render_nested(&path, Some(extra))
    });
}

/// Characters allowed for a named secret charset
fn charset(name: &str) -> String {
    match name {
        "alphanum" => [UPPER_ALPHA, LOWER_ALPHA, DIGITS].concat(),
        "mysql" => [UPPER_ALPHA, LOWER_ALPHA, DIGITS, MYSQL_SAFE].concat(),
        "yaml" => [UPPER_ALPHA, LOWER_ALPHA, DIGITS, YAML_SAFE].concat(),
        _ => [UPPER_ALPHA, LOWER_ALPHA, DIGITS, SPECIALS].concat(),
    }
}

/// Generate `length` random characters from a charset, base64 encoded
///
/// A zero length gives an empty string.
pub fn secret(charset_name: &str, length: i64) -> Result<String, Error> {
    if !(0..=MAX_SECRET_LENGTH).contains(&length) {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("secret: length must be between 0 and {}, got {}", MAX_SECRET_LENGTH, length),
        ));
    }

    let chars = charset(charset_name).into_bytes();
    let mut rng = rand::rng();
    let raw: Vec<u8> = (0..length)
        .map(|_| chars[rng.random_range(0..chars.len())])
        .collect();

    Ok(base64::engine::general_purpose::STANDARD.encode(raw))
}
