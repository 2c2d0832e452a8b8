// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The provider registry and the boundary with the orchestrating tool.
//!
//! Reconcilers and projectors implement the typed [`Resource`] and
//! [`DataSource`] traits. The orchestrating tool deals in untyped JSON
//! objects instead, and sees every entity type through the object-safe
//! [`DynamicResource`] and [`DynamicDataSource`] traits, which validate the
//! objects against the schema before decoding them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use slog::{o, Logger};
use xenapi_client::XenApi;

use crate::error::Error;
use crate::network::NetworkResource;
use crate::schema::{
    self, PlanAction, Schema, NETWORK_RESOURCE, VM_DATA_SOURCE,
};
use crate::vm::VmDataSource;

/// Prefix of every type name registered by this provider.
pub const PROVIDER_NAME: &str = "xenserver";

/// Schemas of every registered resource and data source, keyed by type
/// name. Needs no pool connection.
pub fn schemas() -> BTreeMap<String, &'static Schema> {
    BTreeMap::from([
        (format!("{PROVIDER_NAME}_network"), &NETWORK_RESOURCE),
        (format!("{PROVIDER_NAME}_vm"), &VM_DATA_SOURCE),
    ])
}

/// A persisted resource state, identified by the entity's durable UUID.
pub trait ResourceState:
    Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// An otherwise empty state carrying only the identifier.
    fn from_id(id: &str) -> Self;
    fn id(&self) -> &str;
}

/// The lifecycle of one managed entity type.
#[async_trait]
pub trait Resource: Send + Sync {
    type State: ResourceState;

    fn schema(&self) -> &'static Schema;

    async fn create(&self, plan: Self::State) -> Result<Self::State, Error>;

    async fn read(&self, state: Self::State) -> Result<Self::State, Error>;

    async fn update(
        &self,
        plan: Self::State,
        prior: Self::State,
    ) -> Result<Self::State, Error>;

    async fn delete(&self, state: Self::State) -> Result<(), Error>;

    /// Adopts an existing entity given its durable UUID.
    async fn import(&self, id: &str) -> Result<Self::State, Error> {
        self.read(Self::State::from_id(id)).await
    }
}

/// A read-only, filtered listing of one entity type.
#[async_trait]
pub trait DataSource: Send + Sync {
    type Config: Serialize + DeserializeOwned + Send + 'static;

    fn schema(&self) -> &'static Schema;

    async fn read(&self, config: Self::Config) -> Result<Self::Config, Error>;
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::invalid(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::invalid(e.to_string()))
}

/// A resource as seen by the orchestrating tool.
#[async_trait]
pub trait DynamicResource: Send + Sync {
    fn schema(&self) -> &'static Schema;

    /// Creates the entity from a user configuration.
    async fn create(&self, config: Value) -> Result<Value, Error>;

    async fn read(&self, state: Value) -> Result<Value, Error>;

    /// Applies `config` to the entity described by `prior`. Fails without
    /// contacting the pool if the change requires replacement.
    async fn update(&self, config: Value, prior: Value) -> Result<Value, Error>;

    async fn delete(&self, state: Value) -> Result<(), Error>;

    async fn import(&self, id: &str) -> Result<Value, Error>;

    fn plan(
        &self,
        prior: Option<&Value>,
        config: Option<&Value>,
    ) -> Result<PlanAction, Error> {
        schema::plan(self.schema(), prior, config)
    }
}

#[async_trait]
impl<R: Resource> DynamicResource for R {
    fn schema(&self) -> &'static Schema {
        Resource::schema(self)
    }

    async fn create(&self, mut config: Value) -> Result<Value, Error> {
        let schema = Resource::schema(self);
        schema::validate_config(schema, &config)?;
        schema::apply_defaults(schema, &mut config)?;
        let state = Resource::create(self, decode(config)?).await?;
        encode(&state)
    }

    async fn read(&self, state: Value) -> Result<Value, Error> {
        let state = Resource::read(self, decode(state)?).await?;
        encode(&state)
    }

    async fn update(
        &self,
        config: Value,
        prior: Value,
    ) -> Result<Value, Error> {
        let schema = Resource::schema(self);
        schema::validate_config(schema, &config)?;
        let planned = schema::planned_state(schema, &prior, &config)?;
        let replace = schema::requires_replace(schema, &prior, &planned)?;
        if !replace.is_empty() {
            return Err(Error::invalid(format!(
                "changing {} requires replacement",
                replace.join(", ")
            )));
        }
        let state =
            Resource::update(self, decode(planned)?, decode(prior)?).await?;
        encode(&state)
    }

    async fn delete(&self, state: Value) -> Result<(), Error> {
        Resource::delete(self, decode(state)?).await
    }

    async fn import(&self, id: &str) -> Result<Value, Error> {
        let state = Resource::import(self, id).await?;
        encode(&state)
    }
}

/// A data source as seen by the orchestrating tool.
#[async_trait]
pub trait DynamicDataSource: Send + Sync {
    fn schema(&self) -> &'static Schema;

    async fn read(&self, config: Value) -> Result<Value, Error>;
}

#[async_trait]
impl<D: DataSource> DynamicDataSource for D {
    fn schema(&self) -> &'static Schema {
        DataSource::schema(self)
    }

    async fn read(&self, config: Value) -> Result<Value, Error> {
        schema::validate_config(DataSource::schema(self), &config)?;
        let state = DataSource::read(self, decode(config)?).await?;
        encode(&state)
    }
}

/// The set of entity types served over one pool connection.
///
/// The connection is owned by the caller; every reconciler and projector
/// handed out by the provider shares it.
pub struct Provider<C: ?Sized> {
    client: Arc<C>,
    log: Logger,
}

impl<C: XenApi + ?Sized + 'static> Provider<C> {
    pub fn new(client: Arc<C>, log: Logger) -> Self {
        Provider { client, log: log.new(o!("component" => "provider")) }
    }

    pub fn resources(&self) -> BTreeMap<String, Box<dyn DynamicResource>> {
        let mut resources: BTreeMap<String, Box<dyn DynamicResource>> =
            BTreeMap::new();
        resources.insert(
            format!("{PROVIDER_NAME}_network"),
            Box::new(NetworkResource::new(self.client.clone(), &self.log)),
        );
        resources
    }

    pub fn data_sources(
        &self,
    ) -> BTreeMap<String, Box<dyn DynamicDataSource>> {
        let mut data_sources: BTreeMap<String, Box<dyn DynamicDataSource>> =
            BTreeMap::new();
        data_sources.insert(
            format!("{PROVIDER_NAME}_vm"),
            Box::new(VmDataSource::new(self.client.clone(), &self.log)),
        );
        data_sources
    }

    pub fn resource(&self, name: &str) -> Option<Box<dyn DynamicResource>> {
        self.resources().remove(name)
    }

    pub fn data_source(
        &self,
        name: &str,
    ) -> Option<Box<dyn DynamicDataSource>> {
        self.data_sources().remove(name)
    }

    /// Looks up the schema of a resource or data source by type name.
    pub fn schema(&self, name: &str) -> Option<&'static Schema> {
        schemas().remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_logger, MockXen};
    use serde_json::json;
    use xenapi_client::{NetworkRecord, OpaqueRef};

    const UUID: &str = "0d7f6c1e-8a55-4a0b-b1c1-5f7e4b6f2a90";

    fn provider(mock: MockXen) -> Provider<MockXen> {
        Provider::new(Arc::new(mock), test_logger())
    }

    #[test]
    fn registry_is_keyed_by_type_name() {
        let provider = provider(MockXen::new());
        assert_eq!(
            provider.resources().keys().collect::<Vec<_>>(),
            vec!["xenserver_network"]
        );
        assert_eq!(
            provider.data_sources().keys().collect::<Vec<_>>(),
            vec!["xenserver_vm"]
        );
        assert_eq!(
            provider.schema("xenserver_network"),
            Some(&NETWORK_RESOURCE)
        );
        assert_eq!(provider.schema("xenserver_vm"), Some(&VM_DATA_SOURCE));
        assert!(provider.schema("xenserver_sr").is_none());

        for (name, resource) in provider.resources() {
            assert_eq!(schemas()[&name], resource.schema());
        }
        for (name, data_source) in provider.data_sources() {
            assert_eq!(schemas()[&name], data_source.schema());
        }
        assert_eq!(schemas().len(), 2);
    }

    #[tokio::test]
    async fn create_applies_defaults_before_the_remote_call() {
        let mut mock = MockXen::new();
        mock.expect_network_create()
            .withf(|record| {
                record.name_description.is_empty()
                    && record.other_config.is_empty()
            })
            .returning(|_| Ok(OpaqueRef::new("OpaqueRef:n")));
        mock.expect_network_get_record().returning(|_| {
            Ok(NetworkRecord {
                uuid: UUID.to_string(),
                name_label: "net-1".to_string(),
                ..Default::default()
            })
        });
        let provider = provider(mock);
        let network = provider.resource("xenserver_network").unwrap();

        let state = network.create(json!({ "name_label": "net-1" })).await;
        assert_eq!(
            state.unwrap(),
            json!({
                "id": UUID,
                "name_label": "net-1",
                "name_description": "",
                "other_config": {},
            })
        );
    }

    #[tokio::test]
    async fn invalid_config_never_reaches_the_pool() {
        let mut mock = MockXen::new();
        mock.expect_network_create().never();
        let provider = provider(mock);
        let network = provider.resource("xenserver_network").unwrap();

        let err = network.create(json!({ "name_description": "x" })).await;
        assert!(matches!(err, Err(Error::InvalidObject { .. })));
    }

    #[tokio::test]
    async fn update_requiring_replacement_is_refused() {
        let mut mock = MockXen::new();
        mock.expect_network_get_by_uuid().never();
        let provider = provider(mock);
        let network = provider.resource("xenserver_network").unwrap();

        let prior = json!({
            "id": UUID,
            "name_label": "net-1",
            "name_description": "",
            "other_config": {},
        });
        let config = json!({ "name_label": "net-1", "name_description": "x" });
        let err = network.update(config, prior).await.unwrap_err();
        assert!(err.to_string().contains("name_description"));
    }

    #[tokio::test]
    async fn data_source_rejects_computed_input() {
        let mut mock = MockXen::new();
        mock.expect_vm_get_all_records().never();
        let provider = provider(mock);
        let vms = provider.data_source("xenserver_vm").unwrap();
        let err = vms.read(json!({ "data_items": [] })).await.unwrap_err();
        assert!(matches!(err, Error::InvalidObject { .. }));
    }
}
