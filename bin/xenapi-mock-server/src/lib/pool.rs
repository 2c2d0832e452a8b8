// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated pool state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use slog::{info, Logger};
use uuid::Uuid;
use xenapi_client::{
    Error, Failure, NetworkApi, NetworkRecord, ObjectApi, OpaqueRef, VmApi,
    VmPowerState, VmRecord, XenClass,
};

const DEFAULT_MTU: i64 = 1500;

fn fresh_ref() -> OpaqueRef {
    OpaqueRef::new(format!("OpaqueRef:{}", Uuid::new_v4()))
}

fn fresh_uuid() -> String {
    Uuid::new_v4().to_string()
}

struct PoolState {
    username: String,
    password: String,
    sessions: BTreeSet<OpaqueRef>,
    networks: BTreeMap<OpaqueRef, NetworkRecord>,
    vms: BTreeMap<OpaqueRef, VmRecord>,
    objects: BTreeMap<OpaqueRef, (XenClass, String)>,
    next_bridge: u64,
}

impl PoolState {
    fn network_create(&mut self, record: &NetworkRecord) -> OpaqueRef {
        let reference = fresh_ref();
        let mut record = record.clone();
        record.uuid = fresh_uuid();
        if record.mtu == 0 {
            record.mtu = DEFAULT_MTU;
        }
        if record.bridge.is_empty() {
            record.bridge = format!("xapi{}", self.next_bridge);
            self.next_bridge += 1;
        }
        record.allowed_operations = Vec::new();
        record.current_operations.clear();
        self.networks.insert(reference.clone(), record);
        reference
    }

    fn network(
        &mut self,
        network: &OpaqueRef,
    ) -> Result<&mut NetworkRecord, Failure> {
        self.networks
            .get_mut(network)
            .ok_or_else(|| Failure::handle_invalid(XenClass::Network, network))
    }

    fn network_get_by_uuid(&self, uuid: &str) -> Result<OpaqueRef, Failure> {
        self.networks
            .iter()
            .find(|(_, record)| record.uuid == uuid)
            .map(|(reference, _)| reference.clone())
            .ok_or_else(|| Failure::uuid_invalid(XenClass::Network, uuid))
    }

    fn network_destroy(&mut self, network: &OpaqueRef) -> Result<(), Failure> {
        self.networks
            .remove(network)
            .map(|_| ())
            .ok_or_else(|| Failure::handle_invalid(XenClass::Network, network))
    }

    fn get_uuid(
        &self,
        class: XenClass,
        reference: &OpaqueRef,
    ) -> Result<String, Failure> {
        let uuid = match class {
            XenClass::Network => {
                self.networks.get(reference).map(|r| r.uuid.clone())
            }
            XenClass::Vm => self.vms.get(reference).map(|r| r.uuid.clone()),
            _ => self
                .objects
                .get(reference)
                .filter(|(c, _)| *c == class)
                .map(|(_, uuid)| uuid.clone()),
        };
        uuid.ok_or_else(|| Failure::handle_invalid(class, reference))
    }

    fn check_session(&self, session: &OpaqueRef) -> Result<(), Failure> {
        if self.sessions.contains(session) {
            Ok(())
        } else {
            Err(Failure::new(
                Failure::SESSION_INVALID,
                vec![session.to_string()],
            ))
        }
    }
}

/// An in-memory stand-in for a pool master.
///
/// The pool implements the client traits directly, so it can be handed to a
/// provider in-process, and also answers JSON-RPC calls through
/// [`Pool::dispatch`] for use behind the HTTP server.
pub struct Pool {
    state: Mutex<PoolState>,
    log: Logger,
}

impl Pool {
    pub const DEFAULT_USERNAME: &'static str = "root";
    pub const DEFAULT_PASSWORD: &'static str = "xenroot";

    /// Creates a pool containing a single host and its control domain.
    pub fn new(log: Logger) -> Self {
        Self::with_credentials(
            Self::DEFAULT_USERNAME,
            Self::DEFAULT_PASSWORD,
            log,
        )
    }

    pub fn with_credentials(
        username: &str,
        password: &str,
        log: Logger,
    ) -> Self {
        let pool = Pool {
            state: Mutex::new(PoolState {
                username: username.to_string(),
                password: password.to_string(),
                sessions: BTreeSet::new(),
                networks: BTreeMap::new(),
                vms: BTreeMap::new(),
                objects: BTreeMap::new(),
                next_bridge: 0,
            }),
            log,
        };

        let host = pool.add_object(XenClass::Host, &fresh_uuid());
        pool.add_vm(VmRecord {
            name_label: "Control domain on host: xs-1".to_string(),
            power_state: VmPowerState::Running,
            is_control_domain: true,
            domid: 0,
            resident_on: host,
            ..Default::default()
        });
        pool
    }

    /// Adds a VM to the pool, assigning a UUID if the record has none.
    pub fn add_vm(&self, mut record: VmRecord) -> OpaqueRef {
        if record.uuid.is_empty() {
            record.uuid = fresh_uuid();
        }
        let reference = fresh_ref();
        self.state.lock().unwrap().vms.insert(reference.clone(), record);
        reference
    }

    /// Registers an object of a class the pool does not otherwise model, so
    /// that references to it can be resolved to `uuid`.
    pub fn add_object(&self, class: XenClass, uuid: &str) -> OpaqueRef {
        let reference = fresh_ref();
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(reference.clone(), (class, uuid.to_string()));
        reference
    }

    /// Removes a network behind the provider's back.
    pub fn remove_network(&self, uuid: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.networks.len();
        state.networks.retain(|_, record| record.uuid != uuid);
        before != state.networks.len()
    }

    /// Returns the current record of the network with the given UUID.
    pub fn network_by_uuid(&self, uuid: &str) -> Option<NetworkRecord> {
        self.state
            .lock()
            .unwrap()
            .networks
            .values()
            .find(|record| record.uuid == uuid)
            .cloned()
    }

    /// Fills the pool with a mix of guests, templates and snapshots.
    pub fn seed_demo(&self) {
        let host = self.add_object(XenClass::Host, &fresh_uuid());
        let sr = self.add_object(XenClass::Sr, &fresh_uuid());
        for (i, name) in ["web-0", "web-1", "db-0"].iter().enumerate() {
            let vif = self.add_object(XenClass::Vif, &fresh_uuid());
            let vbd = self.add_object(XenClass::Vbd, &fresh_uuid());
            let metrics = self.add_object(XenClass::VmMetrics, &fresh_uuid());
            let guest = self.add_vm(VmRecord {
                name_label: name.to_string(),
                power_state: VmPowerState::Running,
                domid: i as i64 + 1,
                resident_on: host.clone(),
                suspend_sr: sr.clone(),
                vifs: vec![vif],
                vbds: vec![vbd],
                metrics,
                memory_static_max: 2 << 30,
                memory_dynamic_max: 2 << 30,
                memory_dynamic_min: 1 << 30,
                memory_static_min: 1 << 30,
                vcpus_max: 2,
                vcpus_at_startup: 2,
                hvm_shadow_multiplier: 1.0,
                domain_type: "hvm".to_string(),
                ..Default::default()
            });
            if i == 0 {
                self.add_vm(VmRecord {
                    name_label: format!("{name} snapshot"),
                    is_a_snapshot: true,
                    snapshot_of: guest,
                    domid: -1,
                    ..Default::default()
                });
            }
        }
        self.add_vm(VmRecord {
            name_label: "Debian Bookworm 12".to_string(),
            is_a_template: true,
            is_default_template: true,
            domid: -1,
            ..Default::default()
        });
        info!(self.log, "seeded demo pool");
    }

    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<OpaqueRef, Failure> {
        let mut state = self.state.lock().unwrap();
        if state.username != username || state.password != password {
            return Err(Failure::new(
                Failure::SESSION_AUTHENTICATION_FAILED,
                vec![
                    username.to_string(),
                    "Authentication failure".to_string(),
                ],
            ));
        }
        let session = fresh_ref();
        state.sessions.insert(session.clone());
        info!(self.log, "session opened"; "username" => username);
        Ok(session)
    }

    /// Answers a JSON-RPC call.
    ///
    /// Every method other than `session.login_with_password` expects a valid
    /// session reference as its first parameter.
    pub fn dispatch(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, Failure> {
        if method == "session.login_with_password" {
            // Version and originator are optional.
            if params.len() < 2 || params.len() > 4 {
                return Err(count_mismatch(method, 2, params.len()));
            }
            let username: String = arg(&params[0])?;
            let password: String = arg(&params[1])?;
            return self.login(&username, &password).map(to_value);
        }

        let Some((session, args)) = params.split_first() else {
            return Err(count_mismatch(method, 1, 0));
        };
        let session: OpaqueRef = arg(session)?;
        let mut state = self.state.lock().unwrap();
        state.check_session(&session)?;

        match method {
            "session.logout" => {
                expect_args(method, args, 0)?;
                state.sessions.remove(&session);
                Ok(Value::Null)
            }
            "network.create" => {
                expect_args(method, args, 1)?;
                let record: NetworkRecord = arg(&args[0])?;
                Ok(to_value(state.network_create(&record)))
            }
            "network.get_record" => {
                expect_args(method, args, 1)?;
                let network: OpaqueRef = arg(&args[0])?;
                state.network(&network).map(|record| to_value(&*record))
            }
            "network.get_by_uuid" => {
                expect_args(method, args, 1)?;
                let uuid: String = arg(&args[0])?;
                state.network_get_by_uuid(&uuid).map(to_value)
            }
            "network.set_name_label" => {
                expect_args(method, args, 2)?;
                let network: OpaqueRef = arg(&args[0])?;
                let label: String = arg(&args[1])?;
                state.network(&network)?.name_label = label;
                Ok(Value::Null)
            }
            "network.destroy" => {
                expect_args(method, args, 1)?;
                let network: OpaqueRef = arg(&args[0])?;
                state.network_destroy(&network).map(|_| Value::Null)
            }
            "VM.get_all_records" => {
                expect_args(method, args, 0)?;
                Ok(to_value(&state.vms))
            }
            _ => match method.strip_suffix(".get_uuid") {
                Some(class) => {
                    let class: XenClass = class.parse().map_err(|_| {
                        Failure::new(
                            Failure::MESSAGE_METHOD_UNKNOWN,
                            vec![method.to_string()],
                        )
                    })?;
                    expect_args(method, args, 1)?;
                    let reference: OpaqueRef = arg(&args[0])?;
                    state.get_uuid(class, &reference).map(to_value)
                }
                None => Err(Failure::new(
                    Failure::MESSAGE_METHOD_UNKNOWN,
                    vec![method.to_string()],
                )),
            },
        }
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    // Records and references are plain data; serializing them cannot fail.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn arg<T: DeserializeOwned>(value: &Value) -> Result<T, Failure> {
    serde_json::from_value(value.clone()).map_err(|e| {
        Failure::new(Failure::FIELD_TYPE_ERROR, vec![e.to_string()])
    })
}

fn count_mismatch(method: &str, expected: usize, received: usize) -> Failure {
    Failure::new(
        Failure::MESSAGE_PARAMETER_COUNT_MISMATCH,
        vec![method.to_string(), expected.to_string(), received.to_string()],
    )
}

fn expect_args(method: &str, args: &[Value], n: usize) -> Result<(), Failure> {
    if args.len() == n {
        Ok(())
    } else {
        // The session reference counts towards the remote arity.
        Err(count_mismatch(method, n + 1, args.len() + 1))
    }
}

#[async_trait]
impl NetworkApi for Pool {
    async fn network_create(
        &self,
        record: &NetworkRecord,
    ) -> Result<OpaqueRef, Error> {
        Ok(self.state.lock().unwrap().network_create(record))
    }

    async fn network_get_record(
        &self,
        network: &OpaqueRef,
    ) -> Result<NetworkRecord, Error> {
        let mut state = self.state.lock().unwrap();
        Ok(state.network(network)?.clone())
    }

    async fn network_get_by_uuid(
        &self,
        uuid: &str,
    ) -> Result<OpaqueRef, Error> {
        Ok(self.state.lock().unwrap().network_get_by_uuid(uuid)?)
    }

    async fn network_set_name_label(
        &self,
        network: &OpaqueRef,
        label: &str,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.network(network)?.name_label = label.to_string();
        Ok(())
    }

    async fn network_destroy(&self, network: &OpaqueRef) -> Result<(), Error> {
        Ok(self.state.lock().unwrap().network_destroy(network)?)
    }
}

#[async_trait]
impl VmApi for Pool {
    async fn vm_get_all_records(
        &self,
    ) -> Result<BTreeMap<OpaqueRef, VmRecord>, Error> {
        Ok(self.state.lock().unwrap().vms.clone())
    }
}

#[async_trait]
impl ObjectApi for Pool {
    async fn get_uuid(
        &self,
        class: XenClass,
        reference: &OpaqueRef,
    ) -> Result<String, Error> {
        Ok(self.state.lock().unwrap().get_uuid(class, reference)?)
    }
}
