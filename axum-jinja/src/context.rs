//! Template contexts and the request view handed to renderers

use axum::{
    body::Bytes,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Method, StatusCode, Uri},
    response::Response,
};
use minijinja::value::{Value, ValueKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::environment::Environment;
use crate::error::{Result, TemplateError};
use crate::render;
use crate::store::{AppKey, ScopeChain};

/// String-keyed template context
///
/// Merging with [`Context::extend`] is last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a serializable value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.0.insert(key.into(), Value::from_serialize(value));
    }

    /// Builder-style [`Context::insert`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    /// Merge `other` into this context; keys in `other` win
    pub fn extend(&mut self, other: Context) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Convert an engine value, rejecting anything that is not a mapping
    pub fn from_value(value: Value) -> Result<Self> {
        if value.kind() != ValueKind::Map {
            return Err(TemplateError::invalid_context(kind_name(&value)).into());
        }

        let mut map = BTreeMap::new();
        for key in value.try_iter()? {
            let item = value.get_item(&key)?;
            let key = match key.as_str() {
                Some(key) => key.to_owned(),
                None => key.to_string(),
            };
            map.insert(key, item);
        }
        Ok(Self(map))
    }

    /// Serialize `context` and convert it with [`Context::from_value`]
    pub fn from_serialize<C: Serialize + ?Sized>(context: &C) -> Result<Self> {
        Self::from_value(Value::from_serialize(context))
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Context> for Value {
    fn from(context: Context) -> Self {
        Value::from_serialize(&context)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value.kind() {
        ValueKind::Undefined => "undefined",
        ValueKind::None => "none",
        ValueKind::Bool => "bool",
        ValueKind::Number => "number",
        ValueKind::String => "string",
        ValueKind::Bytes => "bytes",
        ValueKind::Seq => "sequence",
        ValueKind::Map => "map",
        ValueKind::Iterable => "iterable",
        ValueKind::Plain => "plain object",
        _ => "invalid value",
    }
}

/// Accumulated processor context for one request
///
/// Stored as a request extension; created by the first context processor run
/// and dropped with the request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext(Context);

impl RequestContext {
    pub fn new(context: Context) -> Self {
        Self(context)
    }

    pub fn context(&self) -> &Context {
        &self.0
    }

    /// Merge processor output; later keys win
    pub fn extend(&mut self, context: Context) {
        self.0.extend(context);
    }

    pub fn into_inner(self) -> Context {
        self.0
    }
}

/// Snapshot of the request a template is rendered for
///
/// Carries what rendering needs after the body has been handed to the
/// handler: method, URI, headers, the scope chain and the accumulated
/// context. Extracting it never fails.
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    scopes: ScopeChain,
    context: Option<Context>,
    body: Bytes,
}

impl TemplateRequest {
    /// Snapshot request parts
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            scopes: parts
                .extensions
                .get::<ScopeChain>()
                .cloned()
                .unwrap_or_default(),
            context: parts
                .extensions
                .get::<RequestContext>()
                .map(|ctx| ctx.context().clone()),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub(crate) fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body; only populated for class-based views
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn scopes(&self) -> &ScopeChain {
        &self.scopes
    }

    /// Accumulated processor context, if any processor ran
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Accumulated context, created empty when absent
    pub fn context_mut(&mut self) -> &mut Context {
        self.context.get_or_insert_with(Context::new)
    }

    /// Nearest environment under `key`
    pub fn environment(&self, key: &AppKey) -> Option<Environment> {
        self.scopes.environment(key)
    }

    /// Nearest application value
    pub fn app_value(&self, name: &str) -> Option<Value> {
        self.scopes.value(name)
    }

    /// Render with the default environment
    pub async fn render_string<C>(&self, template_name: &str, context: &C) -> Result<String>
    where
        C: Serialize + Sync + ?Sized,
    {
        render::render_string(template_name, self, context, &AppKey::ENVIRONMENT).await
    }

    /// Render with the default environment into a `200 text/html` response
    pub async fn render<C>(&self, template_name: &str, context: &C) -> Result<Response>
    where
        C: Serialize + Sync + ?Sized,
    {
        render::render_template(
            template_name,
            self,
            context,
            &AppKey::ENVIRONMENT,
            "utf-8",
            StatusCode::OK,
        )
        .await
    }
}

impl<S> FromRequestParts<S> for TemplateRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TemplateErrorKind};
    use axum::http::Request;

    fn invalid_kind(err: Error) -> Option<String> {
        match err {
            Error::Template(err) if err.kind() == TemplateErrorKind::InvalidContext => {
                Some(err.message)
            }
            _ => None,
        }
    }

    #[test]
    fn test_extend_last_write_wins() {
        let mut base = Context::new().with("a", 1).with("b", 1);
        base.extend(Context::new().with("b", 2).with("c", 2));

        assert_eq!(base.get("a"), Some(&Value::from(1)));
        assert_eq!(base.get("b"), Some(&Value::from(2)));
        assert_eq!(base.get("c"), Some(&Value::from(2)));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_from_serialize_struct() {
        #[derive(Serialize)]
        struct Page {
            title: &'static str,
            count: u32,
        }

        let ctx = Context::from_serialize(&Page {
            title: "Home",
            count: 3,
        })
        .unwrap();
        assert_eq!(ctx.get("title"), Some(&Value::from("Home")));
        assert_eq!(ctx.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn test_from_value_rejects_sequence() {
        let err = Context::from_serialize(&vec![1, 2, 3]).unwrap_err();
        assert_eq!(
            invalid_kind(err).as_deref(),
            Some("context should be mapping, not sequence")
        );
    }

    #[test]
    fn test_from_value_rejects_none() {
        let err = Context::from_value(Value::from(())).unwrap_err();
        assert_eq!(
            invalid_kind(err).as_deref(),
            Some("context should be mapping, not none")
        );
    }

    #[test]
    fn test_template_request_snapshot() {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/items?page=2")
            .header("x-test", "yes")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(RequestContext::new(Context::new().with("user", "ann")));
        let (parts, _) = request.into_parts();

        let snapshot = TemplateRequest::from_parts(&parts);
        assert_eq!(snapshot.method(), Method::POST);
        assert_eq!(snapshot.path(), "/items");
        assert_eq!(snapshot.query(), Some("page=2"));
        assert_eq!(snapshot.headers()["x-test"], "yes");
        assert!(snapshot.scopes().is_empty());
        assert_eq!(
            snapshot.context().and_then(|c| c.get("user")),
            Some(&Value::from("ann"))
        );
    }

    #[test]
    fn test_context_mut_creates_context() {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let mut snapshot = TemplateRequest::from_parts(&parts);
        assert!(snapshot.context().is_none());

        snapshot.context_mut().insert("flag", true);
        assert_eq!(snapshot.context().map(Context::len), Some(1));
    }
}
