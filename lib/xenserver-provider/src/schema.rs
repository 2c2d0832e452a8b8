// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute tables for resources and data sources, and the operations the
//! orchestrating tool performs against them before a reconciler is invoked:
//! validating user configuration, substituting static defaults, and deciding
//! between in-place update and replacement.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// The local type of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum AttributeType {
    String,
    Bool,
    Int32,
    Int64,
    Float64,
    /// An ordered list of strings.
    StringList,
    /// An unordered string-to-string mapping.
    StringMap,
    /// An ordered list of objects described by a nested schema.
    ListNested(&'static Schema),
}

impl AttributeType {
    /// Returns true if `value` (which must not be null) is representable as
    /// this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::Int32 => value
                .as_i64()
                .map_or(false, |n| i32::try_from(n).is_ok()),
            AttributeType::Int64 => value.is_i64(),
            AttributeType::Float64 => value.is_number(),
            AttributeType::StringList => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_string)),
            AttributeType::StringMap => value
                .as_object()
                .map_or(false, |map| map.values().all(Value::is_string)),
            AttributeType::ListNested(_) => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_object)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Bool => "bool",
            AttributeType::Int32 => "int32",
            AttributeType::Int64 => "int64",
            AttributeType::Float64 => "float64",
            AttributeType::StringList => "list of string",
            AttributeType::StringMap => "map of string",
            AttributeType::ListNested(_) => "list of object",
        }
    }
}

/// A value substituted for an omitted optional attribute.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum StaticDefault {
    String(&'static str),
    EmptyList,
    EmptyMap,
}

impl StaticDefault {
    pub fn to_value(self) -> Value {
        match self {
            StaticDefault::String(s) => Value::from(s),
            StaticDefault::EmptyList => Value::Array(Vec::new()),
            StaticDefault::EmptyMap => Value::Object(Map::new()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Presence {
    /// Must be supplied by the user.
    Required,
    /// May be supplied by the user; `default` is substituted otherwise.
    Optional { default: Option<StaticDefault> },
    /// Filled by the provider only.
    Computed,
    /// May be supplied by the user, and is filled by the provider otherwise.
    OptionalComputed,
}

impl Presence {
    pub fn is_user_settable(&self) -> bool {
        !matches!(self, Presence::Computed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub presence: Presence,
    /// Changing the attribute forces replacement of the entity.
    pub requires_replace: bool,
    /// An unknown planned value keeps the prior state's value.
    pub use_state_for_unknown: bool,
}

impl Attribute {
    const fn new(
        name: &'static str,
        ty: AttributeType,
        presence: Presence,
        description: &'static str,
    ) -> Self {
        Attribute {
            name,
            description,
            ty,
            presence,
            requires_replace: false,
            use_state_for_unknown: false,
        }
    }

    const fn replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    const fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Schema {
    pub description: &'static str,
    pub attributes: &'static [Attribute],
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&'static Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

const fn computed(
    name: &'static str,
    ty: AttributeType,
    description: &'static str,
) -> Attribute {
    Attribute::new(name, ty, Presence::Computed, description)
}

pub static NETWORK_RESOURCE: Schema = Schema {
    description: "Network Resource",
    attributes: &[
        computed(
            "id",
            AttributeType::String,
            "The UUID of the virtual network on xenserver",
        )
        .use_state_for_unknown(),
        Attribute::new(
            "name_label",
            AttributeType::String,
            Presence::Required,
            "The name of the virtual network",
        ),
        Attribute::new(
            "name_description",
            AttributeType::String,
            Presence::Optional { default: Some(StaticDefault::String("")) },
            "The description of the virtual network",
        )
        .replace(),
        Attribute::new(
            "other_config",
            AttributeType::StringMap,
            Presence::Optional { default: Some(StaticDefault::EmptyMap) },
            "The additional configuration of the virtual network",
        )
        .replace(),
    ],
};

pub static VM_DATA_SOURCE: Schema = Schema {
    description: "Provides information about the virtual machine (VM).",
    attributes: &[
        Attribute::new(
            "uuid",
            AttributeType::String,
            Presence::Optional { default: None },
            "The UUID of the virtual machine.",
        ),
        Attribute::new(
            "name_label",
            AttributeType::String,
            Presence::Optional { default: None },
            "The name of the virtual machine.",
        ),
        computed(
            "data_items",
            AttributeType::ListNested(&VM_RECORD),
            "The return items of virtual machines.",
        ),
    ],
};

use AttributeType::{
    Bool, Float64, Int32, Int64, String as Str, StringList, StringMap,
};

pub static VM_RECORD: Schema = Schema {
    description: "A virtual machine.",
    attributes: &[
        computed("uuid", Str, "The UUID of the virtual machine."),
        computed(
            "allowed_operations",
            StringList,
            "The list of the operations allowed in this state.",
        ),
        computed(
            "current_operations",
            StringMap,
            "The links each of the running tasks using this object (by \
             reference) to a current_operation enum which describes the \
             nature of the task.",
        ),
        computed("name_label", Str, "The name of the virtual machine."),
        computed(
            "name_description",
            Str,
            "The description of the virtual machine.",
        ),
        computed(
            "power_state",
            Str,
            "The current power state of the virtual machine.",
        ),
        computed(
            "user_version",
            Int32,
            "Creators of VMs and templates may store version information \
             here.",
        ),
        computed(
            "suspend_vdi",
            Str,
            "The VDI(UUID) that a suspend image is stored on. Only has \
             meaning if VM is currently suspended.",
        ),
        computed(
            "memory_overhead",
            Int64,
            "Virtualization memory overhead (bytes).",
        ),
        computed(
            "is_control_domain",
            Bool,
            "True if this is a control domain (domain 0 or a driver domain).",
        ),
        computed(
            "vcpus_params",
            StringMap,
            "Configuration parameters for the selected VCPU policy.",
        ),
        computed("pci_bus", Str, "PCI bus path for pass-through devices."),
        computed("other_config", StringMap, "Additional configuration."),
        computed("platform", StringMap, "Platform-specific configuration."),
        computed(
            "is_a_template",
            Bool,
            "True if this is a template. Template VMs can never be started, \
             they are used only for cloning other VMs.",
        ),
        computed(
            "is_default_template",
            Bool,
            "True if this is a default template. Default template VMs can \
             never be started or migrated, they are used only for cloning \
             other VMs.",
        ),
        computed(
            "resident_on",
            Str,
            "The host(UUID) the VM is currently resident on.",
        ),
        computed(
            "scheduled_to_be_resident_on",
            Str,
            "The host(UUID) on which the VM is due to be \
             started/resumed/migrated. This acts as a memory reservation \
             indicator.",
        ),
        computed(
            "affinity",
            Str,
            "A host which the VM has some affinity for (or NULL). This is \
             used as a hint to the start call when it decides where to run \
             the VM. Resource constraints may cause the VM to be started \
             elsewhere.",
        ),
        computed(
            "memory_target",
            Int64,
            "Dynamically-set memory target (bytes). The value of this field \
             indicates the current target for memory available to this VM.",
        ),
        computed(
            "memory_static_max",
            Int64,
            "Statically-set (absolute) maximum (bytes). The value of this \
             field at VM start time acts as a hard limit of the amount of \
             memory a guest can use. New values only take effect on reboot.",
        ),
        computed(
            "memory_dynamic_max",
            Int64,
            "Dynamic maximum (bytes) of memory.",
        ),
        computed(
            "memory_dynamic_min",
            Int64,
            "Dynamic minimum (bytes) of memory.",
        ),
        computed(
            "memory_static_min",
            Int64,
            "Statically-set (absolute) mininum (bytes). The value of this \
             field indicates the least amount of memory this VM can boot \
             with without crashing.",
        ),
        computed("vcpus_max", Int32, "Max number of VCPUs."),
        computed("vcpus_at_startup", Int32, "Boot number of VCPUs."),
        computed(
            "actions_after_softreboot",
            Str,
            "Action to take after soft reboot.",
        ),
        computed(
            "actions_after_shutdown",
            Str,
            "Action to take after the guest has shutdown itself.",
        ),
        computed(
            "actions_after_reboot",
            Str,
            "Action to take after the guest has rebooted itself.",
        ),
        computed(
            "actions_after_crash",
            Str,
            "Action to take if the guest crashes.",
        ),
        computed(
            "consoles",
            StringList,
            "The UUID list of virtual console devices.",
        ),
        computed(
            "vifs",
            StringList,
            "The UUID list of virtual network interfaces.",
        ),
        computed("vbds", StringList, "The UUID list of virtual block devices."),
        computed("vusbs", StringList, "The UUID list of virtual USB devices."),
        computed(
            "crash_dumps",
            StringList,
            "The UUID list of crash dumps associated with this VM.",
        ),
        computed("vtpms", StringList, "The UUID list of virtual TPMs."),
        computed("pv_bootloader", Str, "Name of or path to bootloader."),
        computed("pv_kernel", Str, "Path to the kernel."),
        computed("pv_ramdisk", Str, "Path to the initrd."),
        computed("pv_args", Str, "Kernel command-line arguments"),
        computed(
            "pv_bootloader_args",
            Str,
            "Miscellaneous arguments for the bootloader.",
        ),
        computed("pv_legacy_args", Str, "To make Zurich guests boot."),
        computed("hvm_boot_policy", Str, "HVM boot policy."),
        computed("hvm_boot_params", StringMap, "HVM boot parameters."),
        computed(
            "hvm_shadow_multiplier",
            Float64,
            "Multiplier applied to the amount of shadow that will be made \
             available to the guest.",
        ),
        computed("domid", Int32, "Domain ID (if available, -1 otherwise)."),
        computed(
            "domarch",
            Str,
            "Domain architecture (if available, null string otherwise).",
        ),
        computed(
            "last_boot_cpu_flags",
            StringMap,
            "Describes the CPU flags on which the VM was last booted.",
        ),
        computed("metrics", Str, "Metrics(UUID) associated with this VM."),
        computed(
            "guest_metrics",
            Str,
            "Metrics(UUID) associated with the running guest.",
        ),
        computed(
            "last_booted_record",
            Str,
            "Marshalled value containing VM record at time of last boot.",
        ),
        computed(
            "recommendations",
            Str,
            "An XML specification of recommended values and ranges for \
             properties of this VM.",
        ),
        computed(
            "xenstore_data",
            StringMap,
            "Data to be inserted into the xenstore tree \
             (/local/domain/<domid>/vm-data) after the VM is created.",
        ),
        computed(
            "ha_always_run",
            Bool,
            "If true then the system will attempt to keep the VM running as \
             much as possible.",
        ),
        computed(
            "ha_restart_priority",
            Str,
            "Has possible values: 'best-effort' meaning 'try to restart this \
             VM if possible but don't consider the pool to be overcommitted \
             if this is not possible'; 'restart' meaning 'this VM should be \
             restarted'; '' meaning 'do not try to restart this VM'.",
        ),
        computed(
            "is_a_snapshot",
            Bool,
            "True if this is a snapshot. Snapshotted VMs can never be \
             started, they are used only for cloning other VMs.",
        ),
        computed(
            "snapshot_of",
            Str,
            "UUID pointing to the VM this snapshot is of.",
        ),
        computed(
            "snapshots",
            StringList,
            "UUID list pointing to all the VM snapshots.",
        ),
        computed(
            "snapshot_time",
            Str,
            "Date/time when this snapshot was created.",
        ),
        computed(
            "transportable_snapshot_id",
            Str,
            "Transportable ID of the snapshot VM.",
        ),
        computed(
            "blobs",
            StringMap,
            "Binary blobs(UUID) associated with this VM.",
        ),
        computed(
            "tags",
            StringList,
            "User-specified tags for categorization purposes.",
        ),
        computed(
            "blocked_operations",
            StringMap,
            "List of operations which have been explicitly blocked and an \
             error code.",
        ),
        computed(
            "snapshot_info",
            StringMap,
            "Human-readable information concerning this snapshot.",
        ),
        computed(
            "snapshot_metadata",
            Str,
            "Metadata concerning this snapshot.",
        ),
        computed("parent", Str, "UUID pointing to the parent of this VM."),
        computed(
            "children",
            StringList,
            "UUID list pointing to all the children of this VM.",
        ),
        computed("bios_strings", StringMap, "BIOS strings."),
        computed(
            "protection_policy",
            Str,
            "UUID pointing to a protection policy for this VM.",
        ),
        computed(
            "is_snapshot_from_vmpp",
            Bool,
            "True if this snapshot was created by the protection policy.",
        ),
        computed(
            "snapshot_schedule",
            Str,
            "UUID pointing to a snapshot schedule for this VM.",
        ),
        computed(
            "is_vmss_snapshot",
            Bool,
            "True if this snapshot was created by the snapshot schedule.",
        ),
        computed(
            "appliance",
            Str,
            "The appliance(UUID) to which this VM belongs.",
        ),
        computed(
            "start_delay",
            Int64,
            "The delay to wait before proceeding to the next order in the \
             startup sequence (seconds).",
        ),
        computed(
            "shutdown_delay",
            Int64,
            "The delay to wait before proceeding to the next order in the \
             shutdown sequence (seconds).",
        ),
        computed(
            "order",
            Int32,
            "The point in the startup or shutdown sequence at which this VM \
             will be started.",
        ),
        computed("vgpus", StringList, "The UUID list of virtual GPUs."),
        computed(
            "attached_pcis",
            StringList,
            "The UUID list of currently passed-through PCI devices.",
        ),
        computed(
            "suspend_sr",
            Str,
            "The SR(UUID) on which a suspend image is stored.",
        ),
        computed(
            "version",
            Int32,
            "The number of times this VM has been recovered.",
        ),
        computed("generation_id", Str, "Generation ID of the VM."),
        computed(
            "hardware_platform_version",
            Int32,
            "The host virtual hardware platform version the VM can run on.",
        ),
        computed(
            "has_vendor_device",
            Bool,
            "When an HVM guest starts, this controls the presence of the \
             emulated C000 PCI device which triggers Windows Update to fetch \
             or update PV drivers.",
        ),
        computed(
            "requires_reboot",
            Bool,
            "Indicates whether a VM requires a reboot in order to update its \
             configuration, for example, its memory allocation.",
        ),
        computed(
            "reference_label",
            Str,
            "Textual reference to the template used to create a VM. This can \
             be used by clients in need of an immutable reference to the \
             template since the latter's uuid and name_label may change, for \
             example, after a package installation or upgrade.",
        ),
        computed(
            "domain_type",
            Str,
            "The type of domain that will be created when the VM is started.",
        ),
        computed(
            "nvram",
            StringMap,
            "Initial value for guest NVRAM (containing UEFI variables, and so \
             on). Cannot be changed while the VM is running.",
        ),
        computed(
            "pending_guidances",
            StringList,
            "The set of pending mandatory guidances after applying updates, \
             which must be applied, as otherwise there may be, for example, \
             VM failures.",
        ),
        computed(
            "pending_guidances_recommended",
            StringList,
            "The set of pending recommended guidances after applying \
             updates, which most users should follow to make the updates \
             effective, but if not followed, will not cause a failure.",
        ),
        computed(
            "pending_guidances_full",
            StringList,
            "The set of pending full guidances after applying updates, which \
             a user should follow to make some updates, for example, \
             specific hardware drivers or CPU features, fully effective, but \
             the 'average user' doesn't need to.",
        ),
        computed(
            "groups",
            StringList,
            "The UUID list of VM groups associated with the VM.",
        ),
    ],
};

/// What the orchestrating tool must do to move from a prior state to a
/// proposed configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update { attributes: Vec<&'static str> },
    Replace { attributes: Vec<&'static str> },
    NoOp,
    Delete,
}

fn as_object<'a>(value: &'a Value) -> Result<&'a Map<String, Value>, Error> {
    value
        .as_object()
        .ok_or_else(|| {
            Error::invalid(format!("expected an object, got {value}"))
        })
}

/// Checks a user-supplied configuration object against `schema`.
pub fn validate_config(schema: &Schema, config: &Value) -> Result<(), Error> {
    let config = as_object(config)?;

    for (name, value) in config {
        let attr = schema.attribute(name).ok_or_else(|| {
            Error::invalid(format!("unsupported attribute \"{name}\""))
        })?;
        if value.is_null() {
            continue;
        }
        if !attr.presence.is_user_settable() {
            return Err(Error::invalid(format!(
                "attribute \"{name}\" is computed and cannot be configured"
            )));
        }
        if !attr.ty.accepts(value) {
            return Err(Error::invalid(format!(
                "attribute \"{name}\" must be of type {}",
                attr.ty.name()
            )));
        }
    }

    for attr in schema.attributes {
        if attr.presence == Presence::Required
            && config.get(attr.name).map_or(true, Value::is_null)
        {
            return Err(Error::invalid(format!(
                "missing required attribute \"{}\"",
                attr.name
            )));
        }
    }

    Ok(())
}

/// Substitutes static defaults for omitted optional attributes.
pub fn apply_defaults(
    schema: &Schema,
    config: &mut Value,
) -> Result<(), Error> {
    let config = config.as_object_mut().ok_or_else(|| {
        Error::invalid("expected an object".to_string())
    })?;
    for attr in schema.attributes {
        if let Presence::Optional { default: Some(default) } = attr.presence {
            let slot = config.entry(attr.name).or_insert(Value::Null);
            if slot.is_null() {
                *slot = default.to_value();
            }
        }
    }
    Ok(())
}

/// Returns the user-settable attributes whose value differs between `prior`
/// and `config`.
fn changed_attributes(
    schema: &Schema,
    prior: &Map<String, Value>,
    config: &Map<String, Value>,
) -> Vec<&'static Attribute> {
    schema
        .attributes
        .iter()
        .filter(|attr| attr.presence.is_user_settable())
        .filter(|attr| {
            let planned = config.get(attr.name).unwrap_or(&Value::Null);
            // An unset optional-computed attribute keeps whatever the
            // provider last reported.
            if planned.is_null() && attr.presence == Presence::OptionalComputed
            {
                return false;
            }
            prior.get(attr.name).unwrap_or(&Value::Null) != planned
        })
        .collect()
}

/// Names the attributes changed between `prior` and `planned` that cannot be
/// updated in place.
pub fn requires_replace(
    schema: &Schema,
    prior: &Value,
    planned: &Value,
) -> Result<Vec<&'static str>, Error> {
    Ok(changed_attributes(schema, as_object(prior)?, as_object(planned)?)
        .into_iter()
        .filter(|attr| attr.requires_replace)
        .map(|attr| attr.name)
        .collect())
}

/// Builds the planned state for an update: the configuration (with
/// defaults applied) plus the prior values of computed attributes marked
/// `use_state_for_unknown`. Other computed attributes are left out, since
/// their values are unknown until the update is applied.
pub fn planned_state(
    schema: &Schema,
    prior: &Value,
    config: &Value,
) -> Result<Value, Error> {
    let prior = as_object(prior)?;
    let mut planned = config.clone();
    apply_defaults(schema, &mut planned)?;
    let Some(fields) = planned.as_object_mut() else {
        return Err(Error::invalid("expected an object".to_string()));
    };
    for attr in schema.attributes {
        match attr.presence {
            Presence::Computed | Presence::OptionalComputed
                if attr.use_state_for_unknown =>
            {
                if fields.get(attr.name).map_or(true, Value::is_null) {
                    if let Some(value) = prior.get(attr.name) {
                        fields.insert(attr.name.to_string(), value.clone());
                    }
                }
            }
            Presence::Computed => {
                fields.remove(attr.name);
            }
            _ => {}
        }
    }
    Ok(planned)
}

/// Decides how to move from `prior` (None if the entity is absent) to
/// `config` (None if the entity is no longer configured).
pub fn plan(
    schema: &Schema,
    prior: Option<&Value>,
    config: Option<&Value>,
) -> Result<PlanAction, Error> {
    let (prior, config) = match (prior, config) {
        (None, None) => return Ok(PlanAction::NoOp),
        (Some(_), None) => return Ok(PlanAction::Delete),
        (None, Some(config)) => {
            validate_config(schema, config)?;
            return Ok(PlanAction::Create);
        }
        (Some(prior), Some(config)) => (prior, config),
    };

    validate_config(schema, config)?;
    let planned = planned_state(schema, prior, config)?;
    let changed =
        changed_attributes(schema, as_object(prior)?, as_object(&planned)?);

    if changed.is_empty() {
        return Ok(PlanAction::NoOp);
    }
    let replace: Vec<_> = changed
        .iter()
        .filter(|attr| attr.requires_replace)
        .map(|attr| attr.name)
        .collect();
    if replace.is_empty() {
        Ok(PlanAction::Update {
            attributes: changed.iter().map(|attr| attr.name).collect(),
        })
    } else {
        Ok(PlanAction::Replace { attributes: replace })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn network_config_validation() {
        validate_config(&NETWORK_RESOURCE, &json!({ "name_label": "net-1" }))
            .unwrap();

        let err = validate_config(&NETWORK_RESOURCE, &json!({}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("missing required attribute \"name_label\""));

        let err = validate_config(
            &NETWORK_RESOURCE,
            &json!({ "name_label": "net-1", "id": "abc" }),
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("\"id\" is computed"));

        let err = validate_config(
            &NETWORK_RESOURCE,
            &json!({ "name_label": "net-1", "mtu": 9000 }),
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("unsupported attribute \"mtu\""));

        let err = validate_config(
            &NETWORK_RESOURCE,
            &json!({ "name_label": "net-1", "other_config": { "a": 1 } }),
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("\"other_config\" must be of type map of string"));
    }

    #[test]
    fn defaults_fill_omitted_and_null_attributes() {
        let mut config = json!({ "name_label": "net-1", "other_config": null });
        apply_defaults(&NETWORK_RESOURCE, &mut config).unwrap();
        assert_eq!(
            config,
            json!({
                "name_label": "net-1",
                "name_description": "",
                "other_config": {},
            })
        );

        let mut config = json!({ "name_label": "n", "name_description": "d" });
        apply_defaults(&NETWORK_RESOURCE, &mut config).unwrap();
        assert_eq!(config["name_description"], json!("d"));
    }

    #[test]
    fn int32_rejects_out_of_range() {
        assert!(AttributeType::Int32.accepts(&json!(-1)));
        assert!(!AttributeType::Int32.accepts(&json!(1i64 << 40)));
        assert!(AttributeType::Int64.accepts(&json!(1i64 << 40)));
        assert!(!AttributeType::Int64.accepts(&json!(1.5)));
    }

    fn prior() -> Value {
        json!({
            "id": "3f9b2a55-0000-4000-8000-000000000001",
            "name_label": "net-1",
            "name_description": "",
            "other_config": {},
        })
    }

    #[test]
    fn plan_actions() {
        let config = json!({ "name_label": "net-1" });
        assert_eq!(
            plan(&NETWORK_RESOURCE, None, Some(&config)).unwrap(),
            PlanAction::Create
        );
        assert_eq!(
            plan(&NETWORK_RESOURCE, Some(&prior()), None).unwrap(),
            PlanAction::Delete
        );
        assert_eq!(
            plan(&NETWORK_RESOURCE, Some(&prior()), Some(&config)).unwrap(),
            PlanAction::NoOp
        );
        assert_eq!(
            plan(
                &NETWORK_RESOURCE,
                Some(&prior()),
                Some(&json!({ "name_label": "net-2" }))
            )
            .unwrap(),
            PlanAction::Update { attributes: vec!["name_label"] }
        );
        assert_eq!(
            plan(
                &NETWORK_RESOURCE,
                Some(&prior()),
                Some(&json!({
                    "name_label": "net-2",
                    "other_config": { "k": "v" },
                }))
            )
            .unwrap(),
            PlanAction::Replace { attributes: vec!["other_config"] }
        );
    }

    #[test]
    fn planned_state_keeps_id_from_prior() {
        let planned = planned_state(
            &NETWORK_RESOURCE,
            &prior(),
            &json!({ "name_label": "net-2" }),
        )
        .unwrap();
        assert_eq!(planned["id"], prior()["id"]);
        assert_eq!(planned["name_label"], json!("net-2"));
        assert_eq!(planned["other_config"], json!({}));
    }

    #[test]
    fn requires_replace_ignores_updatable_attributes() {
        let mut planned = prior();
        planned["name_label"] = json!("net-2");
        assert!(requires_replace(&NETWORK_RESOURCE, &prior(), &planned)
            .unwrap()
            .is_empty());

        planned["name_description"] = json!("new");
        assert_eq!(
            requires_replace(&NETWORK_RESOURCE, &prior(), &planned).unwrap(),
            vec!["name_description"]
        );
    }

    #[test]
    fn vm_catalog_is_computed_only() {
        assert!(VM_RECORD
            .attributes
            .iter()
            .all(|attr| attr.presence == Presence::Computed));
        let config = json!({ "name_label": "vm-A", "data_items": [] });
        assert!(validate_config(&VM_DATA_SOURCE, &config).is_err());
        validate_config(&VM_DATA_SOURCE, &json!({ "name_label": "vm-A" }))
            .unwrap();
        validate_config(&VM_DATA_SOURCE, &json!({})).unwrap();
    }
}
