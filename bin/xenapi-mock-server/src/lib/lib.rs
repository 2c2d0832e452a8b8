// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Implementation of a mock XenServer pool master

use std::sync::Arc;

use dropshot::{
    endpoint, ApiDescription, HttpError, HttpResponseOk, RequestContext,
    TypedBody,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slog::{debug, o, Logger};
use xenapi_client::Failure;

mod pool;
pub use pool::Pool;

/// A JSON-RPC request as sent by XenAPI clients.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct RpcCall {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

/// The error object of a failed call. `message` carries the failure code
/// and `data` its parameters.
#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct RpcFault {
    pub code: i64,
    pub message: String,
    pub data: Vec<String>,
}

impl From<Failure> for RpcFault {
    fn from(failure: Failure) -> Self {
        RpcFault { code: 1, message: failure.code, data: failure.params }
    }
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct RpcReply {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcFault>,
    pub id: Option<Value>,
}

pub struct Context {
    pool: Arc<Pool>,
    log: Logger,
}

impl Context {
    pub fn new(pool: Arc<Pool>, log: Logger) -> Self {
        Context { pool, log }
    }
}

#[endpoint {
    method = POST,
    path = "/jsonrpc",
}]
async fn jsonrpc(
    rqctx: RequestContext<Arc<Context>>,
    request: TypedBody<RpcCall>,
) -> Result<HttpResponseOk<RpcReply>, HttpError> {
    let ctx = rqctx.context();
    let RpcCall { method, params, id, .. } = request.into_inner();
    debug!(ctx.log, "call"; "method" => &method);

    // Remote failures travel in the JSON-RPC envelope, never as HTTP errors.
    let (result, error) = match ctx.pool.dispatch(&method, params) {
        Ok(value) => (Some(value), None),
        Err(failure) => {
            debug!(ctx.log, "call failed"; "method" => &method,
                "failure" => %failure);
            (None, Some(failure.into()))
        }
    };

    Ok(HttpResponseOk(RpcReply {
        jsonrpc: "2.0".to_string(),
        result,
        error,
        id,
    }))
}

/// Returns a Dropshot [`ApiDescription`] object to launch a server.
pub fn api() -> ApiDescription<Arc<Context>> {
    let mut api = ApiDescription::new();
    api.register(jsonrpc).unwrap();
    api
}

// These types need to be exposed so that consumers have names for them without
// having to maintain a dropshot dependency in lockstep with their dependency on
// this crate.

/// configuration for the dropshot server
pub type Config = dropshot::ConfigDropshot;
/// the dropshot server itself
pub type Server = dropshot::HttpServer<Arc<Context>>;
/// errors returned from attempting to start a dropshot server
pub type ServerStartError = Box<dyn std::error::Error + Send + Sync>;

/// Starts a mock pool master serving `pool`.
pub fn start(
    config: Config,
    pool: Arc<Pool>,
    log: Logger,
) -> Result<Server, ServerStartError> {
    let pool_log = log.new(o!("component" => "xenapi-mock-server"));
    let dropshot_log = log.new(o!("component" => "dropshot"));
    let private = Arc::new(Context::new(pool, pool_log));
    let starter = dropshot::HttpServerStarter::new(
        &config,
        api(),
        private,
        &dropshot_log,
    )?;
    Ok(starter.start())
}
