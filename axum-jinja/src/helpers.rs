//! Template helpers: `url`, `static` and the `app` global
//!
//! [`setup`](crate::setup) registers `url` and `static` unless
//! [`Setup::default_helpers`](crate::Setup::default_helpers) is turned off.
//! The `app` global is always bound.
//!
//! ```jinja
//! <a href="{{ url('user', id=user.id, query_={'tab': 'posts'}) }}">profile</a>
//! <link rel="stylesheet" href="{{ static('css/site.css') }}">
//! <title>{{ app.site_name }}</title>
//! ```

use minijinja::value::{Enumerator, Kwargs, Object, Value, ValueKind};
use minijinja::{Error, ErrorKind, State};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::store::{AppStore, WeakStore};

/// Application value holding the root URL for `static()`
pub const STATIC_ROOT_URL_KEY: &str = "static_root_url";

/// Name of the keyword argument carrying query parameters in `url()`
const QUERY_ARG: &str = "query_";

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The `app` global: read-only view of the application values
#[derive(Debug)]
pub(crate) struct AppObject {
    store: WeakStore,
}

impl AppObject {
    pub(crate) fn new(store: &AppStore) -> Self {
        Self {
            store: store.downgrade(),
        }
    }
}

impl Object for AppObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        self.store.upgrade()?.value(key.as_str()?)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        match self.store.upgrade() {
            Some(store) => {
                Enumerator::Values(store.value_names().into_iter().map(Value::from).collect())
            }
            None => Enumerator::Empty,
        }
    }
}

fn app_store(state: &State) -> Result<AppStore, Error> {
    let app = state.lookup("app").ok_or_else(|| {
        Error::new(ErrorKind::InvalidOperation, "the `app` global is not defined")
    })?;
    let object = app.downcast_object_ref::<AppObject>().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            "the `app` global was replaced and no longer refers to the application",
        )
    })?;
    object
        .store
        .upgrade()
        .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "the application was dropped"))
}

/// `url(name, query_=None, **parts)`
///
/// Builds the path of a route registered with
/// [`App::route_named`](crate::App::route_named). The result is already
/// URL-encoded and marked safe.
pub fn url(state: &State, name: &str, kwargs: Kwargs) -> Result<Value, Error> {
    let store = app_store(state)?;
    let pattern = store.route(name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("no route named '{}'", name),
        )
    })?;

    let mut query = None;
    let mut parts = BTreeMap::new();
    for key in kwargs.args() {
        let value: Value = kwargs.get(key)?;
        if key == QUERY_ARG {
            query = Some(value);
        } else {
            parts.insert(key.to_owned(), value.to_string());
        }
    }

    let mut path = build_path(&pattern, &parts)?;
    if let Some(query) = query.filter(|q| !(q.is_none() || q.is_undefined())) {
        let query_string = encode_query(&query)?;
        if !query_string.is_empty() {
            path.push('?');
            path.push_str(&query_string);
        }
    }
    Ok(Value::from_safe_string(path))
}

/// `static(path)`
///
/// Joins the application value `static_root_url` with `path`; marked safe.
pub fn static_url(state: &State, path: &str) -> Result<Value, Error> {
    let store = app_store(state)?;
    let root = store
        .value(STATIC_ROOT_URL_KEY)
        .filter(Value::is_true)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                "app does not define a static root url 'static_root_url', \
                 set it with Setup::static_root_url or App::with_value",
            )
        })?;

    Ok(Value::from_safe_string(format!(
        "{}/{}",
        root.to_string().trim_end_matches('/'),
        path.trim_start_matches('/')
    )))
}

/// Substitute `{name}` and `{*name}` placeholders in an axum route pattern
fn build_path(pattern: &str, parts: &BTreeMap<String, String>) -> Result<String, Error> {
    let mut path = String::with_capacity(pattern.len());
    let mut seen = BTreeSet::new();
    let mut rest = pattern;

    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("malformed route pattern '{}'", pattern),
            )
        })?;
        let placeholder = &after[..end];
        let (name, wildcard) = match placeholder.strip_prefix('*') {
            Some(name) => (name, true),
            None => (placeholder, false),
        };

        let value = parts.get(name).ok_or_else(|| {
            Error::new(
                ErrorKind::MissingArgument,
                format!("missing parameter '{}' for route '{}'", name, pattern),
            )
        })?;
        if wildcard {
            let segments: Vec<String> = value
                .split('/')
                .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
                .collect();
            path.push_str(&segments.join("/"));
        } else {
            path.push_str(&utf8_percent_encode(value, SEGMENT).to_string());
        }

        seen.insert(name);
        rest = &after[end + 1..];
    }
    path.push_str(rest);

    if let Some(extra) = parts.keys().find(|key| !seen.contains(key.as_str())) {
        return Err(Error::new(
            ErrorKind::TooManyArguments,
            format!("unexpected parameter '{}' for route '{}'", extra, pattern),
        ));
    }

    Ok(path)
}

fn encode_query(query: &Value) -> Result<String, Error> {
    if query.kind() != ValueKind::Map {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("{} must be a mapping", QUERY_ARG),
        ));
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for key in query.try_iter()? {
        let value = query.get_item(&key)?;
        let key = key.to_string();
        if value.kind() == ValueKind::Seq {
            for item in value.try_iter()? {
                serializer.append_pair(&key, &item.to_string());
            }
        } else {
            serializer.append_pair(&key, &value.to_string());
        }
    }
    Ok(serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_build_path_substitutes_and_encodes() {
        let path = build_path("/users/{id}/posts", &parts(&[("id", "a b/c")])).unwrap();
        assert_eq!(path, "/users/a%20b%2Fc/posts");
    }

    #[test]
    fn test_build_path_wildcard_keeps_slashes() {
        let path = build_path("/files/{*path}", &parts(&[("path", "css/site main.css")])).unwrap();
        assert_eq!(path, "/files/css/site%20main.css");
    }

    #[test]
    fn test_build_path_missing_parameter() {
        let err = build_path("/users/{id}", &parts(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);
    }

    #[test]
    fn test_build_path_unexpected_parameter() {
        let err = build_path("/users", &parts(&[("id", "1")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyArguments);
    }

    #[test]
    fn test_encode_query() {
        let query = Value::from_serialize(serde_json::json!({"q": "a b", "tag": ["x", "y"]}));
        assert_eq!(encode_query(&query).unwrap(), "q=a+b&tag=x&tag=y");
    }

    #[test]
    fn test_encode_query_rejects_scalars() {
        assert!(encode_query(&Value::from(3)).is_err());
    }
}
