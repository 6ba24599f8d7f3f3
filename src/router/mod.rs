use crate::auth::AuthGate;
use crate::config::RouteConfig;
use crate::error::{GatewayError, Result};
use http::Method;
use std::sync::Arc;
use tracing::debug;

/// A configured route, ready to serve
#[derive(Debug, Clone)]
pub struct Route {
    pub backend: String,
    /// Empty allows every method
    pub methods: Vec<Method>,
    /// Literal pattern prefix removed from the path before forwarding
    pub strip: Option<String>,
    pub auth_gate: Option<Arc<AuthGate>>,
}

impl Route {
    fn from_config(config: &RouteConfig, literal_prefix: String) -> Result<Self> {
        let methods = config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_uppercase().as_bytes())
                    .map_err(|_| GatewayError::Config(format!("unknown method {:?}", m)))
            })
            .collect::<Result<Vec<_>>>()?;

        let auth_gate = config
            .auth_redirect
            .clone()
            .map(|auth| AuthGate::provision(auth).map(Arc::new))
            .transpose()?;

        Ok(Self {
            backend: config.backend.trim_end_matches('/').to_string(),
            methods,
            strip: config.strip_prefix.then_some(literal_prefix),
            auth_gate,
        })
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Backend URL for an inbound path and query
    pub fn backend_url(&self, path: &str, query: Option<&str>) -> String {
        let forwarded = match &self.strip {
            Some(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            None => path,
        };

        let mut url = self.backend.clone();
        if !forwarded.starts_with('/') {
            url.push('/');
        }
        url.push_str(forwarded);
        if let Some(q) = query {
            url.push('?');
            url.push_str(q);
        }
        url
    }
}

/// Path-indexed route lookup
#[derive(Debug, Clone)]
pub struct RouteTable {
    matcher: matchit::Router<Route>,
    patterns: Vec<String>,
}

impl RouteTable {
    /// Compile routes, provisioning an auth gate for each route that asks for one
    pub fn new(configs: &[RouteConfig]) -> Result<Self> {
        let mut matcher = matchit::Router::new();

        for config in configs {
            let (pattern, literal_prefix) = compile_pattern(&config.path);
            let route = Route::from_config(config, literal_prefix)?;
            debug!(
                path = %config.path,
                backend = %route.backend,
                gated = route.auth_gate.is_some(),
                "Route loaded"
            );

            matcher.insert(pattern, route).map_err(|e| {
                GatewayError::Config(format!("route {:?}: {}", config.path, e))
            })?;
        }

        Ok(Self {
            matcher,
            patterns: configs.iter().map(|c| c.path.clone()).collect(),
        })
    }

    pub fn lookup(&self, path: &str, method: &Method) -> Result<&Route> {
        let route = self
            .matcher
            .at(path)
            .map_err(|_| GatewayError::NoRoute {
                path: path.to_string(),
            })?
            .value;

        if !route.allows(method) {
            return Err(GatewayError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
            });
        }
        Ok(route)
    }

    /// Route patterns as configured
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Turn `/a/:id/*rest` into matchit's `/a/{id}/{*rest}`, and return the
/// literal segments in front of the first parameter (`/a`)
fn compile_pattern(path: &str) -> (String, String) {
    let mut pattern = Vec::new();
    let mut prefix = Vec::new();
    let mut literal = true;

    for segment in path.split('/') {
        let compiled = if let Some(name) = segment.strip_prefix(':') {
            literal = false;
            format!("{{{}}}", name)
        } else if let Some(name) = segment.strip_prefix('*') {
            literal = false;
            format!("{{*{}}}", name)
        } else {
            segment.to_string()
        };

        if literal {
            prefix.push(segment);
        }
        pattern.push(compiled);
    }

    (pattern.join("/"), prefix.join("/"))
}
