// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `xenserver_network` resource.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, Logger};
use xenapi_client::{NetworkApi, NetworkRecord, OpaqueRef};

use crate::error::Error;
use crate::mapper::{self, MapError};
use crate::provider::{Resource, ResourceState};
use crate::schema::{Schema, NETWORK_RESOURCE};

/// Local model of a virtual network.
///
/// `id` holds the network's durable UUID; the session-scoped reference is
/// re-resolved from it by every operation and never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkResourceModel {
    pub id: String,
    pub name_label: String,
    pub name_description: String,
    pub other_config: BTreeMap<String, String>,
}

impl ResourceState for NetworkResourceModel {
    fn from_id(id: &str) -> Self {
        NetworkResourceModel { id: id.to_string(), ..Default::default() }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Projects every field of `record` onto `data`.
fn update_model(
    record: &NetworkRecord,
    data: &mut NetworkResourceModel,
) -> Result<(), MapError> {
    data.name_label = record.name_label.clone();
    update_model_computed(record, data)
}

/// Projects the fields the pool may fill or default onto `data`.
fn update_model_computed(
    record: &NetworkRecord,
    data: &mut NetworkResourceModel,
) -> Result<(), MapError> {
    data.id = record.uuid.clone();
    data.name_description = record.name_description.clone();
    data.other_config =
        mapper::string_map("other_config", &record.other_config)?;
    Ok(())
}

pub struct NetworkResource<C: ?Sized> {
    client: Arc<C>,
    log: Logger,
}

impl<C: NetworkApi + ?Sized> NetworkResource<C> {
    pub fn new(client: Arc<C>, log: &Logger) -> Self {
        NetworkResource {
            client,
            log: log.new(o!("component" => "xenserver_network")),
        }
    }

    async fn resolve(&self, uuid: &str) -> Result<OpaqueRef, Error> {
        debug!(self.log, "network.get_by_uuid"; "uuid" => uuid);
        self.client
            .network_get_by_uuid(uuid)
            .await
            .map_err(Error::resolution("unable to get network ref"))
    }

    async fn fetch(&self, network: &OpaqueRef) -> Result<NetworkRecord, Error> {
        debug!(self.log, "network.get_record"; "ref" => %network);
        self.client
            .network_get_record(network)
            .await
            .map_err(Error::remote("unable to get network record"))
    }
}

#[async_trait]
impl<C: NetworkApi + ?Sized + 'static> Resource for NetworkResource<C> {
    type State = NetworkResourceModel;

    fn schema(&self) -> &'static Schema {
        &NETWORK_RESOURCE
    }

    async fn create(
        &self,
        plan: NetworkResourceModel,
    ) -> Result<NetworkResourceModel, Error> {
        let record = NetworkRecord {
            name_label: plan.name_label.clone(),
            name_description: plan.name_description.clone(),
            other_config: mapper::xen_map(&plan.other_config),
            ..Default::default()
        };

        debug!(self.log, "network.create"; "name_label" => &plan.name_label);
        let network = self
            .client
            .network_create(&record)
            .await
            .map_err(Error::remote("unable to create network"))?;

        let record = self.fetch(&network).await?;
        let mut data = plan;
        update_model_computed(&record, &mut data).map_err(Error::mapping(
            "unable to update the computed fields of network resource model",
        ))?;
        info!(self.log, "created network"; "uuid" => &data.id);
        Ok(data)
    }

    async fn read(
        &self,
        state: NetworkResourceModel,
    ) -> Result<NetworkResourceModel, Error> {
        let network = self.resolve(&state.id).await?;
        let record = self.fetch(&network).await?;
        let mut data = state;
        update_model(&record, &mut data).map_err(Error::mapping(
            "unable to update the fields of network resource model",
        ))?;
        info!(self.log, "read network"; "uuid" => &data.id);
        Ok(data)
    }

    async fn update(
        &self,
        plan: NetworkResourceModel,
        _prior: NetworkResourceModel,
    ) -> Result<NetworkResourceModel, Error> {
        let network = self.resolve(&plan.id).await?;

        // name_label is the only attribute that can change in place.
        debug!(self.log, "network.set_name_label"; "ref" => %network);
        self.client
            .network_set_name_label(&network, &plan.name_label)
            .await
            .map_err(Error::remote("unable to set name label of network"))?;

        let record = self.fetch(&network).await?;
        let mut data = plan;
        update_model_computed(&record, &mut data).map_err(Error::mapping(
            "unable to update the computed fields of network resource model",
        ))?;
        info!(self.log, "updated network"; "uuid" => &data.id);
        Ok(data)
    }

    async fn delete(&self, state: NetworkResourceModel) -> Result<(), Error> {
        let network = self.resolve(&state.id).await?;
        debug!(self.log, "network.destroy"; "ref" => %network);
        self.client
            .network_destroy(&network)
            .await
            .map_err(Error::remote("unable to destroy network"))?;
        info!(self.log, "destroyed network"; "uuid" => &state.id);
        Ok(())
    }
}
