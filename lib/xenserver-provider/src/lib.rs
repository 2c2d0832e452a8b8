// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconcilers and projectors exposing a XenServer/XCP-ng pool to a
//! declarative orchestration tool.
//!
//! Each managed entity type is either a [`provider::Resource`] (full
//! create/read/update/delete/import lifecycle, e.g.
//! [`network::NetworkResource`]) or a [`provider::DataSource`] (filtered
//! read-only listing, e.g. [`vm::VmDataSource`]). Both consume the pool
//! through the traits of [`xenapi_client`], and are registered by name in a
//! [`Provider`].

pub mod error;
pub mod mapper;
pub mod network;
pub mod provider;
pub mod schema;
pub mod vm;

#[cfg(test)]
mod test_utils;

pub use error::{Diagnostic, Error, Severity};
pub use provider::{
    schemas, DataSource, DynamicDataSource, DynamicResource, Provider,
    Resource, PROVIDER_NAME,
};
pub use schema::PlanAction;
