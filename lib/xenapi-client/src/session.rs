// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON-RPC transport to a pool master.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slog::{debug, info, o, Logger};

use crate::api::{Failure, NetworkRecord, OpaqueRef, VmRecord, XenClass};
use crate::{Error, NetworkApi, ObjectApi, VmApi};

/// API version announced at login.
pub const API_VERSION: &str = "1.0";

/// Originator string announced at login; shows up in the pool's audit log.
pub const ORIGINATOR: &str = "xenserver-provider";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
    #[serde(default)]
    data: Vec<Value>,
}

impl From<RpcError> for Failure {
    fn from(error: RpcError) -> Self {
        let params = error
            .data
            .into_iter()
            .map(|param| match param {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        Failure::new(error.message, params)
    }
}

impl RpcResponse {
    fn into_result<T: DeserializeOwned>(
        self,
        method: &str,
    ) -> Result<T, Error> {
        if let Some(error) = self.error {
            return Err(Error::Api(error.into()));
        }
        serde_json::from_value(self.result).map_err(|source| Error::Payload {
            method: method.to_string(),
            source,
        })
    }
}

// Sends "request", awaits "response", and returns an error on any
// non-success status code.
async fn send_and_check_ok(
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, Error> {
    let response = request.send().await.map_err(Error::from)?;

    if !response.status().is_success() {
        return Err(Error::Status(response.status().as_u16()));
    }

    Ok(response)
}

/// An authenticated session with a pool master.
///
/// A session is shared by every reconciler of a provider instance; all
/// methods take `&self`, so it may be used from concurrent operations.
pub struct Session {
    client: reqwest::Client,
    log: Logger,
    endpoint: String,
    session_ref: OpaqueRef,
    next_id: AtomicU64,
}

impl Session {
    /// Logs in to the pool master at `url` (e.g. `https://10.0.0.1`).
    pub async fn connect(
        url: &str,
        username: &str,
        password: &str,
        log: Logger,
    ) -> Result<Session, Error> {
        let mut session = Session {
            client: reqwest::Client::new(),
            log: log.new(o!("xenapi_client address" => url.to_string())),
            endpoint: format!("{}/jsonrpc", url.trim_end_matches('/')),
            session_ref: OpaqueRef::null(),
            next_id: AtomicU64::new(1),
        };

        session.session_ref = session
            .send(
                "session.login_with_password",
                vec![
                    Value::from(username),
                    Value::from(password),
                    Value::from(API_VERSION),
                    Value::from(ORIGINATOR),
                ],
            )
            .await?;
        info!(session.log, "logged in"; "username" => username);

        Ok(session)
    }

    /// The session reference handed out by the pool at login.
    pub fn session_ref(&self) -> &OpaqueRef {
        &self.session_ref
    }

    /// Ends the session on the pool.
    pub async fn logout(&self) -> Result<(), Error> {
        let _: Value = self.call("session.logout", vec![]).await?;
        info!(self.log, "logged out");
        Ok(())
    }

    /// Invokes `method` with the session reference prepended to `args`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, Error> {
        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(Value::from(self.session_ref.as_str()));
        params.extend(args);
        self.send(method, params).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(self.log, "JSON-RPC request"; "method" => method, "id" => id);

        let request = RpcRequest { jsonrpc: "2.0", method, params, id };
        let response: RpcResponse =
            send_and_check_ok(self.client.post(&self.endpoint).json(&request))
                .await?
                .json()
                .await?;
        response.into_result(method)
    }
}

fn reference_arg(reference: &OpaqueRef) -> Value {
    Value::from(reference.as_str())
}

#[async_trait]
impl NetworkApi for Session {
    async fn network_create(
        &self,
        record: &NetworkRecord,
    ) -> Result<OpaqueRef, Error> {
        let method = XenClass::Network.method("create");
        let record = serde_json::to_value(record).map_err(|source| {
            Error::Payload { method: method.clone(), source }
        })?;
        self.call(&method, vec![record]).await
    }

    async fn network_get_record(
        &self,
        network: &OpaqueRef,
    ) -> Result<NetworkRecord, Error> {
        self.call(
            &XenClass::Network.method("get_record"),
            vec![reference_arg(network)],
        )
        .await
    }

    async fn network_get_by_uuid(
        &self,
        uuid: &str,
    ) -> Result<OpaqueRef, Error> {
        self.call(&XenClass::Network.method("get_by_uuid"), vec![uuid.into()])
            .await
    }

    async fn network_set_name_label(
        &self,
        network: &OpaqueRef,
        label: &str,
    ) -> Result<(), Error> {
        let _: Value = self
            .call(
                &XenClass::Network.method("set_name_label"),
                vec![reference_arg(network), label.into()],
            )
            .await?;
        Ok(())
    }

    async fn network_destroy(&self, network: &OpaqueRef) -> Result<(), Error> {
        let _: Value = self
            .call(
                &XenClass::Network.method("destroy"),
                vec![reference_arg(network)],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VmApi for Session {
    async fn vm_get_all_records(
        &self,
    ) -> Result<BTreeMap<OpaqueRef, VmRecord>, Error> {
        self.call(&XenClass::Vm.method("get_all_records"), vec![]).await
    }
}

#[async_trait]
impl ObjectApi for Session {
    async fn get_uuid(
        &self,
        class: XenClass,
        reference: &OpaqueRef,
    ) -> Result<String, Error> {
        self.call(&class.method("get_uuid"), vec![reference_arg(reference)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(raw: Value) -> RpcResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn request_is_json_rpc_2() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "network.get_by_uuid",
            params: vec![json!("OpaqueRef:session"), json!("abc")],
            id: 7,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "method": "network.get_by_uuid",
                "params": ["OpaqueRef:session", "abc"],
                "id": 7,
            })
        );
    }

    #[test]
    fn result_is_decoded_into_requested_type() {
        let response = decode(json!({
            "jsonrpc": "2.0",
            "result": "OpaqueRef:net-1",
            "id": 1,
        }));
        let reference: OpaqueRef =
            response.into_result("network.create").unwrap();
        assert_eq!(reference, OpaqueRef::new("OpaqueRef:net-1"));
    }

    #[test]
    fn error_becomes_remote_failure() {
        let response = decode(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": 1,
                "message": "UUID_INVALID",
                "data": ["network", "abc"],
            },
            "id": 1,
        }));
        let err = response.into_result::<OpaqueRef>("network.get_by_uuid");
        match err {
            Err(Error::Api(failure)) => {
                assert_eq!(
                    failure,
                    Failure::uuid_invalid(XenClass::Network, "abc")
                );
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn non_string_failure_params_are_stringified() {
        let response = decode(json!({
            "error": { "code": 1, "message": "WEIRD", "data": [1, true] },
        }));
        let err = response.into_result::<Value>("VM.get_all_records");
        let failure = err.unwrap_err().failure().cloned().unwrap();
        assert_eq!(failure.params, vec!["1".to_string(), "true".to_string()]);
    }

    #[test]
    fn void_result_decodes_into_value() {
        let response = decode(json!({ "jsonrpc": "2.0", "id": 3 }));
        let value: Value = response.into_result("network.destroy").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn mistyped_result_is_a_payload_error() {
        let response = decode(json!({ "result": 42 }));
        let err = response.into_result::<OpaqueRef>("network.create");
        assert!(matches!(
            err,
            Err(Error::Payload { ref method, .. }) if method == "network.create"
        ));
    }
}
