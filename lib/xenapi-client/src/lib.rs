// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface for making requests to a XenServer/XCP-ng pool master.
//!
//! The [`NetworkApi`], [`VmApi`] and [`ObjectApi`] traits describe the
//! subset of the management API consumed by the provider. [`Session`]
//! implements them over the pool's JSON-RPC endpoint; other implementations
//! (such as the in-memory mock pool) can stand in for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub mod api;
mod session;

pub use api::{
    Failure, NetworkRecord, OpaqueRef, VmPowerState, VmRecord, XenClass,
    XenMap,
};
pub use session::{Session, API_VERSION, ORIGINATOR};

/// Errors which may be returned from the XenAPI client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Bad Status: {0}")]
    Status(u16),

    #[error("API error: {0}")]
    Api(Failure),

    #[error("Malformed payload for {method}: {source}")]
    Payload {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Returns the remote failure, if this error was reported by the pool.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Error::Api(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        Error::Api(failure)
    }
}

/// Operations on the pool's `network` class.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Creates a network from `record`, returning its reference.
    async fn network_create(
        &self,
        record: &NetworkRecord,
    ) -> Result<OpaqueRef, Error>;

    async fn network_get_record(
        &self,
        network: &OpaqueRef,
    ) -> Result<NetworkRecord, Error>;

    /// Resolves a durable UUID to a session-scoped reference.
    async fn network_get_by_uuid(&self, uuid: &str)
        -> Result<OpaqueRef, Error>;

    async fn network_set_name_label(
        &self,
        network: &OpaqueRef,
        label: &str,
    ) -> Result<(), Error>;

    async fn network_destroy(&self, network: &OpaqueRef) -> Result<(), Error>;
}

/// Operations on the pool's `VM` class.
#[async_trait]
pub trait VmApi: Send + Sync {
    /// Returns every VM record in the pool, keyed by reference.
    ///
    /// This includes templates, snapshots and control domains.
    async fn vm_get_all_records(
        &self,
    ) -> Result<BTreeMap<OpaqueRef, VmRecord>, Error>;
}

/// Operations available on every object class.
#[async_trait]
pub trait ObjectApi: Send + Sync {
    async fn get_uuid(
        &self,
        class: XenClass,
        reference: &OpaqueRef,
    ) -> Result<String, Error>;
}

/// Everything the provider needs from a pool connection.
pub trait XenApi: NetworkApi + VmApi + ObjectApi {}

impl<T: NetworkApi + VmApi + ObjectApi> XenApi for T {}
