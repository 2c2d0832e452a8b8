// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `xenserver_vm` data source.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, Logger};
use xenapi_client::{ObjectApi, VmApi, VmRecord, XenClass};

use crate::error::Error;
use crate::mapper::{self, MapError, RefResolver};
use crate::provider::DataSource;
use crate::schema::{Schema, VM_DATA_SOURCE};

/// Configuration and result of a VM listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmDataSourceModel {
    pub uuid: Option<String>,
    pub name_label: Option<String>,
    pub data_items: Vec<VmRecordData>,
}

/// A VM as presented to the orchestrating tool. Reference-typed fields of
/// the remote record hold the UUID of the referenced object, or the empty
/// string for a null reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmRecordData {
    pub uuid: String,
    pub allowed_operations: Vec<String>,
    pub current_operations: BTreeMap<String, String>,
    pub name_label: String,
    pub name_description: String,
    pub power_state: String,
    pub user_version: i32,
    pub suspend_vdi: String,
    pub memory_overhead: i64,
    pub is_control_domain: bool,
    pub vcpus_params: BTreeMap<String, String>,
    pub pci_bus: String,
    pub other_config: BTreeMap<String, String>,
    pub platform: BTreeMap<String, String>,
    pub is_a_template: bool,
    pub is_default_template: bool,
    pub resident_on: String,
    pub scheduled_to_be_resident_on: String,
    pub affinity: String,
    pub memory_target: i64,
    pub memory_static_max: i64,
    pub memory_dynamic_max: i64,
    pub memory_dynamic_min: i64,
    pub memory_static_min: i64,
    pub vcpus_max: i32,
    pub vcpus_at_startup: i32,
    pub actions_after_softreboot: String,
    pub actions_after_shutdown: String,
    pub actions_after_reboot: String,
    pub actions_after_crash: String,
    pub consoles: Vec<String>,
    pub vifs: Vec<String>,
    pub vbds: Vec<String>,
    pub vusbs: Vec<String>,
    pub crash_dumps: Vec<String>,
    pub vtpms: Vec<String>,
    pub pv_bootloader: String,
    pub pv_kernel: String,
    pub pv_ramdisk: String,
    pub pv_args: String,
    pub pv_bootloader_args: String,
    pub pv_legacy_args: String,
    pub hvm_boot_policy: String,
    pub hvm_boot_params: BTreeMap<String, String>,
    pub hvm_shadow_multiplier: f64,
    pub domid: i32,
    pub domarch: String,
    pub last_boot_cpu_flags: BTreeMap<String, String>,
    pub metrics: String,
    pub guest_metrics: String,
    pub last_booted_record: String,
    pub recommendations: String,
    pub xenstore_data: BTreeMap<String, String>,
    pub ha_always_run: bool,
    pub ha_restart_priority: String,
    pub is_a_snapshot: bool,
    pub snapshot_of: String,
    pub snapshots: Vec<String>,
    pub snapshot_time: String,
    pub transportable_snapshot_id: String,
    pub blobs: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub blocked_operations: BTreeMap<String, String>,
    pub snapshot_info: BTreeMap<String, String>,
    pub snapshot_metadata: String,
    pub parent: String,
    pub children: Vec<String>,
    pub bios_strings: BTreeMap<String, String>,
    pub protection_policy: String,
    pub is_snapshot_from_vmpp: bool,
    pub snapshot_schedule: String,
    pub is_vmss_snapshot: bool,
    pub appliance: String,
    pub start_delay: i64,
    pub shutdown_delay: i64,
    pub order: i32,
    pub vgpus: Vec<String>,
    pub attached_pcis: Vec<String>,
    pub suspend_sr: String,
    pub version: i32,
    pub generation_id: String,
    pub hardware_platform_version: i32,
    pub has_vendor_device: bool,
    pub requires_reboot: bool,
    pub reference_label: String,
    pub domain_type: String,
    pub nvram: BTreeMap<String, String>,
    pub pending_guidances: Vec<String>,
    pub pending_guidances_recommended: Vec<String>,
    pub pending_guidances_full: Vec<String>,
    pub groups: Vec<String>,
}

impl VmRecordData {
    /// Maps every field of `record`, resolving references through `refs`.
    pub async fn from_record<C: ObjectApi + ?Sized>(
        record: &VmRecord,
        refs: &RefResolver<'_, C>,
    ) -> Result<Self, MapError> {
        use mapper::{int32, string_list, string_map};

        Ok(VmRecordData {
            uuid: record.uuid.clone(),
            allowed_operations: string_list(&record.allowed_operations),
            current_operations: string_map(
                "current_operations",
                &record.current_operations,
            )?,
            name_label: record.name_label.clone(),
            name_description: record.name_description.clone(),
            power_state: record.power_state.to_string(),
            user_version: int32("user_version", record.user_version)?,
            suspend_vdi: refs
                .uuid("suspend_vdi", XenClass::Vdi, &record.suspend_vdi)
                .await?,
            memory_overhead: record.memory_overhead,
            is_control_domain: record.is_control_domain,
            vcpus_params: string_map("vcpus_params", &record.vcpus_params)?,
            pci_bus: record.pci_bus.clone(),
            other_config: string_map("other_config", &record.other_config)?,
            platform: string_map("platform", &record.platform)?,
            is_a_template: record.is_a_template,
            is_default_template: record.is_default_template,
            resident_on: refs
                .uuid("resident_on", XenClass::Host, &record.resident_on)
                .await?,
            scheduled_to_be_resident_on: refs
                .uuid(
                    "scheduled_to_be_resident_on",
                    XenClass::Host,
                    &record.scheduled_to_be_resident_on,
                )
                .await?,
            affinity: refs
                .uuid("affinity", XenClass::Host, &record.affinity)
                .await?,
            memory_target: record.memory_target,
            memory_static_max: record.memory_static_max,
            memory_dynamic_max: record.memory_dynamic_max,
            memory_dynamic_min: record.memory_dynamic_min,
            memory_static_min: record.memory_static_min,
            vcpus_max: int32("vcpus_max", record.vcpus_max)?,
            vcpus_at_startup: int32(
                "vcpus_at_startup",
                record.vcpus_at_startup,
            )?,
            actions_after_softreboot: record.actions_after_softreboot.clone(),
            actions_after_shutdown: record.actions_after_shutdown.clone(),
            actions_after_reboot: record.actions_after_reboot.clone(),
            actions_after_crash: record.actions_after_crash.clone(),
            consoles: refs
                .uuids("consoles", XenClass::Console, &record.consoles)
                .await?,
            vifs: refs.uuids("vifs", XenClass::Vif, &record.vifs).await?,
            vbds: refs.uuids("vbds", XenClass::Vbd, &record.vbds).await?,
            vusbs: refs.uuids("vusbs", XenClass::Vusb, &record.vusbs).await?,
            crash_dumps: refs
                .uuids("crash_dumps", XenClass::Crashdump, &record.crash_dumps)
                .await?,
            vtpms: refs.uuids("vtpms", XenClass::Vtpm, &record.vtpms).await?,
            pv_bootloader: record.pv_bootloader.clone(),
            pv_kernel: record.pv_kernel.clone(),
            pv_ramdisk: record.pv_ramdisk.clone(),
            pv_args: record.pv_args.clone(),
            pv_bootloader_args: record.pv_bootloader_args.clone(),
            pv_legacy_args: record.pv_legacy_args.clone(),
            hvm_boot_policy: record.hvm_boot_policy.clone(),
            hvm_boot_params: string_map(
                "hvm_boot_params",
                &record.hvm_boot_params,
            )?,
            hvm_shadow_multiplier: record.hvm_shadow_multiplier,
            domid: int32("domid", record.domid)?,
            domarch: record.domarch.clone(),
            last_boot_cpu_flags: string_map(
                "last_boot_cpu_flags",
                &record.last_boot_cpu_flags,
            )?,
            metrics: refs
                .uuid("metrics", XenClass::VmMetrics, &record.metrics)
                .await?,
            guest_metrics: refs
                .uuid(
                    "guest_metrics",
                    XenClass::VmGuestMetrics,
                    &record.guest_metrics,
                )
                .await?,
            last_booted_record: record.last_booted_record.clone(),
            recommendations: record.recommendations.clone(),
            xenstore_data: string_map("xenstore_data", &record.xenstore_data)?,
            ha_always_run: record.ha_always_run,
            ha_restart_priority: record.ha_restart_priority.clone(),
            is_a_snapshot: record.is_a_snapshot,
            snapshot_of: refs
                .uuid("snapshot_of", XenClass::Vm, &record.snapshot_of)
                .await?,
            snapshots: refs
                .uuids("snapshots", XenClass::Vm, &record.snapshots)
                .await?,
            snapshot_time: record.snapshot_time.clone(),
            transportable_snapshot_id: record
                .transportable_snapshot_id
                .clone(),
            blobs: refs.uuid_map("blobs", XenClass::Blob, &record.blobs).await?,
            tags: string_list(&record.tags),
            blocked_operations: string_map(
                "blocked_operations",
                &record.blocked_operations,
            )?,
            snapshot_info: string_map("snapshot_info", &record.snapshot_info)?,
            snapshot_metadata: record.snapshot_metadata.clone(),
            parent: refs.uuid("parent", XenClass::Vm, &record.parent).await?,
            children: refs
                .uuids("children", XenClass::Vm, &record.children)
                .await?,
            bios_strings: string_map("bios_strings", &record.bios_strings)?,
            protection_policy: refs
                .uuid(
                    "protection_policy",
                    XenClass::Vmpp,
                    &record.protection_policy,
                )
                .await?,
            is_snapshot_from_vmpp: record.is_snapshot_from_vmpp,
            snapshot_schedule: refs
                .uuid(
                    "snapshot_schedule",
                    XenClass::Vmss,
                    &record.snapshot_schedule,
                )
                .await?,
            is_vmss_snapshot: record.is_vmss_snapshot,
            appliance: refs
                .uuid("appliance", XenClass::VmAppliance, &record.appliance)
                .await?,
            start_delay: record.start_delay,
            shutdown_delay: record.shutdown_delay,
            order: int32("order", record.order)?,
            vgpus: refs.uuids("vgpus", XenClass::Vgpu, &record.vgpus).await?,
            attached_pcis: refs
                .uuids("attached_pcis", XenClass::Pci, &record.attached_pcis)
                .await?,
            suspend_sr: refs
                .uuid("suspend_sr", XenClass::Sr, &record.suspend_sr)
                .await?,
            version: int32("version", record.version)?,
            generation_id: record.generation_id.clone(),
            hardware_platform_version: int32(
                "hardware_platform_version",
                record.hardware_platform_version,
            )?,
            has_vendor_device: record.has_vendor_device,
            requires_reboot: record.requires_reboot,
            reference_label: record.reference_label.clone(),
            domain_type: record.domain_type.clone(),
            nvram: string_map("nvram", &record.nvram)?,
            pending_guidances: string_list(&record.pending_guidances),
            pending_guidances_recommended: string_list(
                &record.pending_guidances_recommended,
            ),
            pending_guidances_full: string_list(&record.pending_guidances_full),
            groups: refs
                .uuids("groups", XenClass::VmGroup, &record.groups)
                .await?,
        })
    }
}

/// Selects the VMs a listing returns.
///
/// An unset constraint matches everything. Templates, snapshots and the
/// control domain (domid 0) never match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VmFilter {
    pub uuid: Option<String>,
    pub name_label: Option<String>,
}

impl VmFilter {
    pub fn matches(&self, record: &VmRecord) -> bool {
        if let Some(name_label) = &self.name_label {
            if record.name_label != *name_label {
                return false;
            }
        }
        if let Some(uuid) = &self.uuid {
            if record.uuid != *uuid {
                return false;
            }
        }
        !(record.is_a_template
            || record.is_default_template
            || !record.snapshot_of.is_null()
            || record.domid == 0)
    }
}

impl From<&VmDataSourceModel> for VmFilter {
    fn from(config: &VmDataSourceModel) -> Self {
        VmFilter {
            uuid: config.uuid.clone(),
            name_label: config.name_label.clone(),
        }
    }
}

pub struct VmDataSource<C: ?Sized> {
    client: Arc<C>,
    log: Logger,
}

impl<C: VmApi + ObjectApi + ?Sized> VmDataSource<C> {
    pub fn new(client: Arc<C>, log: &Logger) -> Self {
        VmDataSource { client, log: log.new(o!("component" => "xenserver_vm")) }
    }
}

#[async_trait]
impl<C: VmApi + ObjectApi + ?Sized + 'static> DataSource for VmDataSource<C> {
    type Config = VmDataSourceModel;

    fn schema(&self) -> &'static Schema {
        &VM_DATA_SOURCE
    }

    async fn read(
        &self,
        config: VmDataSourceModel,
    ) -> Result<VmDataSourceModel, Error> {
        debug!(self.log, "VM.get_all_records");
        let records = self
            .client
            .vm_get_all_records()
            .await
            .map_err(Error::remote("unable to read VM records"))?;

        let filter = VmFilter::from(&config);
        let refs = RefResolver::new(&*self.client);
        let mut items = Vec::new();
        for record in records.values().filter(|r| filter.matches(r)) {
            let item = VmRecordData::from_record(record, &refs)
                .await
                .map_err(Error::mapping("unable to update VM data"))?;
            items.push(item);
        }
        items.sort_by(|a, b| a.uuid.cmp(&b.uuid));

        info!(self.log, "listed VMs";
            "matched" => items.len(), "total" => records.len());
        Ok(VmDataSourceModel { data_items: items, ..config })
    }
}
