//! Gremlin Server / Neptune backend over the HTTP endpoint.
//!
//! Each primitive is one parameterised Groovy traversal posted in one
//! request. Values always travel as bindings, never spliced into the script.
//! Responses are decoded from GraphSON v1 or v3.

use crate::{
    Direction, EdgeSpec, ElementId, GraphError, GraphStore, Properties, VertexKey, VertexSpec,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct GremlinConfig {
    /// HTTP endpoint, e.g. `http://localhost:8182/gremlin`.
    pub endpoint: url::Url,
    pub timeout_secs: u64,
}

impl GremlinConfig {
    pub fn new(endpoint: &str) -> Result<Self, GraphError> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| GraphError::InvalidRequest(format!("bad Gremlin URL '{endpoint}': {e}")))?;
        Ok(Self {
            endpoint,
            timeout_secs: 30,
        })
    }

    /// Load `GREMLIN_URL` / `GREMLIN_TIMEOUT_SECS` through `lookup`. `None`
    /// when no endpoint is configured.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, GraphError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let Some(raw) = var("GREMLIN_URL") else {
            return Ok(None);
        };
        let config = Self::new(raw.trim())?;
        match var("GREMLIN_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse().map_err(|_| {
                    GraphError::InvalidRequest(format!("GREMLIN_TIMEOUT_SECS '{raw}'"))
                })?;
                Ok(Some(config.with_timeout(secs)))
            }
            None => Ok(Some(config)),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// ============================================================================
// Script building
// ============================================================================

/// A script plus its bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    pub script: String,
    pub bindings: Map<String, Value>,
}

impl Traversal {
    fn new() -> Self {
        Self {
            script: String::new(),
            bindings: Map::new(),
        }
    }

    fn bind(&mut self, name: &str, value: Value) -> &mut Self {
        self.bindings.insert(name.to_string(), value);
        self
    }

    fn push(&mut self, fragment: &str) -> &mut Self {
        self.script.push_str(fragment);
        self
    }

    /// Append `.property([single, ]pNk, pNv)` steps for `properties`.
    fn properties(&mut self, prefix: &str, properties: &Properties, single: bool) -> &mut Self {
        for (i, (name, value)) in properties.iter().enumerate() {
            let k = format!("{prefix}{i}k");
            let v = format!("{prefix}{i}v");
            let step = if single {
                format!(".property(single, {k}, {v})")
            } else {
                format!(".property({k}, {v})")
            };
            self.script.push_str(&step);
            self.bindings.insert(k, Value::from(name.as_str()));
            self.bindings.insert(v, value.to_json());
        }
        self
    }

    fn body(&self) -> Value {
        json!({
            "gremlin": self.script,
            "bindings": Value::Object(self.bindings.clone()),
        })
    }
}

fn bind_key(t: &mut Traversal, key: &VertexKey) {
    t.bind("vLabel", Value::from(key.label.as_str()))
        .bind("keyProp", Value::from(key.property.as_str()))
        .bind("keyValue", key.value.to_json());
}

/// `fold().coalesce(unfold(), addV(...))`: existence check and creation in one traversal.
pub fn upsert_vertex_traversal(spec: &VertexSpec) -> Traversal {
    let mut t = Traversal::new();
    bind_key(&mut t, &spec.key);
    t.push("g.V().has(vLabel, keyProp, keyValue).fold().coalesce(__.unfold(), __.addV(vLabel).property(keyProp, keyValue)")
        .properties("c", &spec.properties, false)
        .push(")")
        .properties("r", &spec.refresh, true)
        .push(".id()");
    t
}

/// `coalesce(outE(label).where(inV().as('t')), addE(label).to('t'))` from `from` to `to`.
pub fn upsert_edge_traversal(spec: &EdgeSpec) -> Traversal {
    let mut t = Traversal::new();
    t.bind("eLabel", Value::from(spec.label.as_str()))
        .bind("fromId", spec.from.to_json())
        .bind("toId", spec.to.to_json())
        .push("g.V(toId).as('t').V(fromId).coalesce(__.outE(eLabel).where(__.inV().as('t')), __.addE(eLabel).to('t')")
        .properties("e", &spec.properties, false)
        .push(").id()");
    t
}

pub fn find_vertex_traversal(key: &VertexKey) -> Traversal {
    let mut t = Traversal::new();
    bind_key(&mut t, key);
    t.push("g.V().has(vLabel, keyProp, keyValue).limit(1).id()");
    t
}

pub fn drop_vertices_traversal(key: &VertexKey) -> Traversal {
    let mut t = Traversal::new();
    bind_key(&mut t, key);
    t.push("g.V().has(vLabel, keyProp, keyValue).sideEffect(__.drop()).count()");
    t
}

pub fn drop_exclusive_neighbors_traversal(
    anchor: &VertexKey,
    edge_label: &str,
    direction: Direction,
) -> Traversal {
    let mut t = Traversal::new();
    bind_key(&mut t, anchor);
    t.bind("eLabel", Value::from(edge_label));
    let walk = match direction {
        Direction::Out => ".outE(eLabel).inV().where(__.inE(eLabel).count().is(lte(1)))",
        Direction::In => ".inE(eLabel).outV().where(__.outE(eLabel).count().is(lte(1)))",
    };
    t.push("g.V().has(vLabel, keyProp, keyValue)")
        .push(walk)
        .push(".dedup().sideEffect(__.drop()).count()");
    t
}

// ============================================================================
// GraphSON decoding
// ============================================================================

/// Strip GraphSON v2/v3 `{"@type": .., "@value": ..}` wrappers recursively.
pub fn unwrap_graphson(value: Value) -> Value {
    match value {
        Value::Object(mut obj) if obj.contains_key("@type") && obj.contains_key("@value") => {
            let inner = obj.remove("@value").unwrap_or(Value::Null);
            unwrap_graphson(inner)
        }
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (k, unwrap_graphson(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_graphson).collect()),
        other => other,
    }
}

/// Extract `result.data` as a list of plain JSON values.
pub fn decode_response(body: Value) -> Result<Vec<Value>, GraphError> {
    let body = unwrap_graphson(body);

    if let Some(code) = body.pointer("/status/code").and_then(Value::as_u64) {
        if !(200..300).contains(&code) {
            let message = body
                .pointer("/status/message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(GraphError::Server {
                status: code as u16,
                message,
            });
        }
    }

    match body.pointer("/result/data") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Ok(vec![other.clone()]),
    }
}

fn first_id(data: &[Value]) -> Option<ElementId> {
    data.first().and_then(ElementId::from_json)
}

fn first_count(data: &[Value]) -> Result<u64, GraphError> {
    match data.first() {
        None => Ok(0),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| GraphError::InvalidResponse(format!("expected a count, got {v}"))),
    }
}

// ============================================================================
// Client
// ============================================================================

/// Handle to a Gremlin endpoint.
///
/// Open with [`GremlinClient::connect`], share by reference or `Arc`, and
/// release with [`GremlinClient::close`].
pub struct GremlinClient {
    client: Client,
    config: GremlinConfig,
}

impl GremlinClient {
    pub fn connect(config: GremlinConfig) -> Result<Self, GraphError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GraphError::Transport(e.to_string()))?;

        tracing::info!(endpoint = %config.endpoint, "gremlin connection opened");
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.config.endpoint
    }

    pub fn close(self) {
        tracing::info!(endpoint = %self.config.endpoint, "gremlin connection closed");
    }

    /// Submit one traversal and return the decoded `result.data` list.
    pub async fn submit(&self, traversal: &Traversal) -> Result<Vec<Value>, GraphError> {
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(&traversal.body())
            .send()
            .await
            .map_err(|e| GraphError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GraphError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GraphError::InvalidResponse(e.to_string()))?;
        decode_response(body)
    }
}

#[async_trait]
impl GraphStore for GremlinClient {
    async fn find_or_create_vertex(&self, spec: &VertexSpec) -> Result<ElementId, GraphError> {
        let data = self.submit(&upsert_vertex_traversal(spec)).await?;
        first_id(&data).ok_or_else(|| {
            GraphError::InvalidResponse(format!("no vertex id returned for {}", spec.key))
        })
    }

    async fn find_or_create_edge(&self, spec: &EdgeSpec) -> Result<ElementId, GraphError> {
        let data = self.submit(&upsert_edge_traversal(spec)).await?;
        // An empty result means one of the endpoints did not match.
        first_id(&data).ok_or_else(|| GraphError::MissingEndpoint {
            from: spec.from.clone(),
            to: spec.to.clone(),
        })
    }

    async fn find_vertex_id(&self, key: &VertexKey) -> Result<Option<ElementId>, GraphError> {
        let data = self.submit(&find_vertex_traversal(key)).await?;
        Ok(first_id(&data))
    }

    async fn drop_vertices(&self, key: &VertexKey) -> Result<u64, GraphError> {
        let data = self.submit(&drop_vertices_traversal(key)).await?;
        first_count(&data)
    }

    async fn drop_exclusive_neighbors(
        &self,
        anchor: &VertexKey,
        edge_label: &str,
        direction: Direction,
    ) -> Result<u64, GraphError> {
        let traversal = drop_exclusive_neighbors_traversal(anchor, edge_label, direction);
        let data = self.submit(&traversal).await?;
        first_count(&data)
    }

    fn backend_name(&self) -> &'static str {
        "gremlin"
    }
}
