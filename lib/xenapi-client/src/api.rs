// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types exchanged with the XenServer/XCP-ng management API.
//!
//! Field names follow the remote API's own spelling on the wire (for example
//! `VCPUs_max` or `HVM_boot_params`), with Rust-style names on the structs.
//! Every record field defaults when the pool omits it, so partially
//! populated records (as produced by older pools) still decode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key/value fields are decoded without committing to an element type.
///
/// The remote API declares most of these as `(string -> string)`, but some
/// map to enums or references; consumers pick the element type they need.
pub type XenMap = BTreeMap<String, serde_json::Value>;

/// A session-scoped handle to a remote object.
///
/// References are only meaningful for the lifetime of the session that
/// produced them and must never be persisted; the object's UUID is the
/// durable identifier.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OpaqueRef(String);

impl OpaqueRef {
    pub const NULL: &'static str = "OpaqueRef:NULL";

    pub fn new<S: Into<String>>(reference: S) -> Self {
        Self(reference.into())
    }

    pub fn null() -> Self {
        Self(Self::NULL.to_string())
    }

    pub fn is_null(&self) -> bool {
        self.0 == Self::NULL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OpaqueRef {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object classes of the remote API that show up as references in records
/// handled by this client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum XenClass {
    Network,
    Vm,
    Host,
    Vdi,
    Sr,
    Vif,
    Vbd,
    Vusb,
    Console,
    Crashdump,
    Vtpm,
    Vgpu,
    Pci,
    VmMetrics,
    VmGuestMetrics,
    Vmpp,
    Vmss,
    VmAppliance,
    VmGroup,
    Blob,
}

impl XenClass {
    pub const ALL: [XenClass; 20] = [
        XenClass::Network,
        XenClass::Vm,
        XenClass::Host,
        XenClass::Vdi,
        XenClass::Sr,
        XenClass::Vif,
        XenClass::Vbd,
        XenClass::Vusb,
        XenClass::Console,
        XenClass::Crashdump,
        XenClass::Vtpm,
        XenClass::Vgpu,
        XenClass::Pci,
        XenClass::VmMetrics,
        XenClass::VmGuestMetrics,
        XenClass::Vmpp,
        XenClass::Vmss,
        XenClass::VmAppliance,
        XenClass::VmGroup,
        XenClass::Blob,
    ];

    /// The class name as used in remote method names (`<class>.<method>`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            XenClass::Network => "network",
            XenClass::Vm => "VM",
            XenClass::Host => "host",
            XenClass::Vdi => "VDI",
            XenClass::Sr => "SR",
            XenClass::Vif => "VIF",
            XenClass::Vbd => "VBD",
            XenClass::Vusb => "VUSB",
            XenClass::Console => "console",
            XenClass::Crashdump => "crashdump",
            XenClass::Vtpm => "VTPM",
            XenClass::Vgpu => "VGPU",
            XenClass::Pci => "PCI",
            XenClass::VmMetrics => "VM_metrics",
            XenClass::VmGuestMetrics => "VM_guest_metrics",
            XenClass::Vmpp => "VMPP",
            XenClass::Vmss => "VMSS",
            XenClass::VmAppliance => "VM_appliance",
            XenClass::VmGroup => "VM_group",
            XenClass::Blob => "blob",
        }
    }

    /// Builds the fully qualified name of a method on this class.
    pub fn method(&self, name: &str) -> String {
        format!("{}.{}", self.as_str(), name)
    }
}

impl fmt::Display for XenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XenClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| format!("unknown object class {s}"))
    }
}

/// A failure reported by the remote API.
///
/// The pool reports errors as a code (e.g. `UUID_INVALID`) followed by a
/// list of string parameters whose meaning depends on the code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub code: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl Failure {
    pub const HANDLE_INVALID: &'static str = "HANDLE_INVALID";
    pub const UUID_INVALID: &'static str = "UUID_INVALID";
    pub const SESSION_INVALID: &'static str = "SESSION_INVALID";
    pub const SESSION_AUTHENTICATION_FAILED: &'static str =
        "SESSION_AUTHENTICATION_FAILED";
    pub const MESSAGE_METHOD_UNKNOWN: &'static str = "MESSAGE_METHOD_UNKNOWN";
    pub const MESSAGE_PARAMETER_COUNT_MISMATCH: &'static str =
        "MESSAGE_PARAMETER_COUNT_MISMATCH";
    pub const FIELD_TYPE_ERROR: &'static str = "FIELD_TYPE_ERROR";
    pub const INTERNAL_ERROR: &'static str = "INTERNAL_ERROR";

    pub fn new<S: Into<String>>(code: S, params: Vec<String>) -> Self {
        Self { code: code.into(), params }
    }

    pub fn handle_invalid(class: XenClass, reference: &OpaqueRef) -> Self {
        Self::new(
            Self::HANDLE_INVALID,
            vec![class.to_string(), reference.to_string()],
        )
    }

    pub fn uuid_invalid(class: XenClass, uuid: &str) -> Self {
        Self::new(Self::UUID_INVALID, vec![class.to_string(), uuid.to_string()])
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.code)
        } else {
            write!(f, "{} [{}]", self.code, self.params.join(", "))
        }
    }
}

impl std::error::Error for Failure {}

/// A virtual network in the pool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkRecord {
    pub uuid: String,
    pub name_label: String,
    pub name_description: String,
    pub allowed_operations: Vec<String>,
    pub current_operations: XenMap,
    #[serde(rename = "VIFs")]
    pub vifs: Vec<OpaqueRef>,
    #[serde(rename = "PIFs")]
    pub pifs: Vec<OpaqueRef>,
    #[serde(rename = "MTU")]
    pub mtu: i64,
    pub other_config: XenMap,
    pub bridge: String,
    pub managed: bool,
    pub blobs: BTreeMap<String, OpaqueRef>,
    pub tags: Vec<String>,
    pub default_locking_mode: String,
    pub assigned_ips: BTreeMap<String, String>,
    pub purpose: Vec<String>,
}

/// The power state of a VM as reported by the pool.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum VmPowerState {
    #[default]
    Halted,
    Paused,
    Running,
    Suspended,
    #[serde(other)]
    Undefined,
}

impl VmPowerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            VmPowerState::Halted => "Halted",
            VmPowerState::Paused => "Paused",
            VmPowerState::Running => "Running",
            VmPowerState::Suspended => "Suspended",
            VmPowerState::Undefined => "undefined",
        }
    }
}

impl fmt::Display for VmPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A virtual machine (or template, or snapshot) in the pool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmRecord {
    pub uuid: String,
    pub allowed_operations: Vec<String>,
    pub current_operations: XenMap,
    pub name_label: String,
    pub name_description: String,
    pub power_state: VmPowerState,
    pub user_version: i64,
    pub is_a_template: bool,
    pub is_default_template: bool,
    #[serde(rename = "suspend_VDI")]
    pub suspend_vdi: OpaqueRef,
    pub resident_on: OpaqueRef,
    pub scheduled_to_be_resident_on: OpaqueRef,
    pub affinity: OpaqueRef,
    pub memory_overhead: i64,
    pub memory_target: i64,
    pub memory_static_max: i64,
    pub memory_dynamic_max: i64,
    pub memory_dynamic_min: i64,
    pub memory_static_min: i64,
    #[serde(rename = "VCPUs_params")]
    pub vcpus_params: XenMap,
    #[serde(rename = "VCPUs_max")]
    pub vcpus_max: i64,
    #[serde(rename = "VCPUs_at_startup")]
    pub vcpus_at_startup: i64,
    pub actions_after_softreboot: String,
    pub actions_after_shutdown: String,
    pub actions_after_reboot: String,
    pub actions_after_crash: String,
    pub consoles: Vec<OpaqueRef>,
    #[serde(rename = "VIFs")]
    pub vifs: Vec<OpaqueRef>,
    #[serde(rename = "VBDs")]
    pub vbds: Vec<OpaqueRef>,
    #[serde(rename = "VUSBs")]
    pub vusbs: Vec<OpaqueRef>,
    pub crash_dumps: Vec<OpaqueRef>,
    #[serde(rename = "VTPMs")]
    pub vtpms: Vec<OpaqueRef>,
    #[serde(rename = "PV_bootloader")]
    pub pv_bootloader: String,
    #[serde(rename = "PV_kernel")]
    pub pv_kernel: String,
    #[serde(rename = "PV_ramdisk")]
    pub pv_ramdisk: String,
    #[serde(rename = "PV_args")]
    pub pv_args: String,
    #[serde(rename = "PV_bootloader_args")]
    pub pv_bootloader_args: String,
    #[serde(rename = "PV_legacy_args")]
    pub pv_legacy_args: String,
    #[serde(rename = "HVM_boot_policy")]
    pub hvm_boot_policy: String,
    #[serde(rename = "HVM_boot_params")]
    pub hvm_boot_params: XenMap,
    #[serde(rename = "HVM_shadow_multiplier")]
    pub hvm_shadow_multiplier: f64,
    pub platform: XenMap,
    #[serde(rename = "PCI_bus")]
    pub pci_bus: String,
    pub other_config: XenMap,
    pub domid: i64,
    pub domarch: String,
    #[serde(rename = "last_boot_CPU_flags")]
    pub last_boot_cpu_flags: XenMap,
    pub is_control_domain: bool,
    pub metrics: OpaqueRef,
    pub guest_metrics: OpaqueRef,
    pub last_booted_record: String,
    pub recommendations: String,
    pub xenstore_data: XenMap,
    pub ha_always_run: bool,
    pub ha_restart_priority: String,
    pub is_a_snapshot: bool,
    pub snapshot_of: OpaqueRef,
    pub snapshots: Vec<OpaqueRef>,
    pub snapshot_time: String,
    pub transportable_snapshot_id: String,
    pub blobs: BTreeMap<String, OpaqueRef>,
    pub tags: Vec<String>,
    pub blocked_operations: XenMap,
    pub snapshot_info: XenMap,
    pub snapshot_metadata: String,
    pub parent: OpaqueRef,
    pub children: Vec<OpaqueRef>,
    pub bios_strings: XenMap,
    pub protection_policy: OpaqueRef,
    pub is_snapshot_from_vmpp: bool,
    pub snapshot_schedule: OpaqueRef,
    pub is_vmss_snapshot: bool,
    pub appliance: OpaqueRef,
    pub start_delay: i64,
    pub shutdown_delay: i64,
    pub order: i64,
    #[serde(rename = "VGPUs")]
    pub vgpus: Vec<OpaqueRef>,
    #[serde(rename = "attached_PCIs")]
    pub attached_pcis: Vec<OpaqueRef>,
    #[serde(rename = "suspend_SR")]
    pub suspend_sr: OpaqueRef,
    pub version: i64,
    pub generation_id: String,
    pub hardware_platform_version: i64,
    pub has_vendor_device: bool,
    pub requires_reboot: bool,
    pub reference_label: String,
    pub domain_type: String,
    #[serde(rename = "NVRAM")]
    pub nvram: XenMap,
    pub pending_guidances: Vec<String>,
    pub pending_guidances_recommended: Vec<String>,
    pub pending_guidances_full: Vec<String>,
    pub groups: Vec<OpaqueRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_reference_is_default() {
        let reference = OpaqueRef::default();
        assert!(reference.is_null());
        assert_eq!(reference.to_string(), "OpaqueRef:NULL");
        assert!(!OpaqueRef::new("OpaqueRef:1234").is_null());
    }

    #[test]
    fn class_names_round_trip_through_from_str() {
        for class in XenClass::ALL {
            assert_eq!(class.as_str().parse::<XenClass>(), Ok(class));
        }
        assert!("widget".parse::<XenClass>().is_err());
        assert_eq!(
            XenClass::VmGuestMetrics.method("get_uuid"),
            "VM_guest_metrics.get_uuid"
        );
    }

    #[test]
    fn failure_display_includes_params() {
        let failure = Failure::uuid_invalid(XenClass::Network, "abc");
        assert_eq!(failure.to_string(), "UUID_INVALID [network, abc]");
        assert_eq!(
            Failure::new(Failure::SESSION_INVALID, vec![]).to_string(),
            "SESSION_INVALID"
        );
    }

    #[test]
    fn vm_record_decodes_native_field_names() {
        let raw = json!({
            "uuid": "7d4ff9a5-0000-4000-8000-000000000001",
            "name_label": "vm-A",
            "power_state": "Running",
            "VCPUs_max": 4,
            "VCPUs_params": { "weight": "256" },
            "HVM_shadow_multiplier": 1.0,
            "VIFs": ["OpaqueRef:vif-1", "OpaqueRef:vif-2"],
            "suspend_VDI": "OpaqueRef:NULL",
            "resident_on": "OpaqueRef:host-1",
            "NVRAM": {},
            "domid": 3,
        });
        let record: VmRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.name_label, "vm-A");
        assert_eq!(record.power_state, VmPowerState::Running);
        assert_eq!(record.vcpus_max, 4);
        assert_eq!(record.vcpus_params.get("weight"), Some(&json!("256")));
        assert_eq!(record.vifs.len(), 2);
        assert!(record.suspend_vdi.is_null());
        assert_eq!(record.resident_on, OpaqueRef::new("OpaqueRef:host-1"));
        // Absent references default to the null reference.
        assert!(record.snapshot_of.is_null());
        assert_eq!(record.domid, 3);
    }

    #[test]
    fn unknown_power_state_is_tolerated() {
        let record: VmRecord =
            serde_json::from_value(json!({ "power_state": "Migrating" }))
                .unwrap();
        assert_eq!(record.power_state, VmPowerState::Undefined);
    }

    #[test]
    fn network_record_uses_native_field_names() {
        let record = NetworkRecord {
            name_label: "net-1".to_string(),
            mtu: 1500,
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["MTU"], json!(1500));
        assert_eq!(value["name_label"], json!("net-1"));
        assert_eq!(value["VIFs"], json!([]));
    }
}
