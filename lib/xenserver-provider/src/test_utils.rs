// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use async_trait::async_trait;
use xenapi_client::{
    Error, NetworkApi, NetworkRecord, ObjectApi, OpaqueRef, VmApi, VmRecord,
    XenClass,
};

mockall::mock! {
    pub Xen {}

    #[async_trait]
    impl NetworkApi for Xen {
        async fn network_create(
            &self,
            record: &NetworkRecord,
        ) -> Result<OpaqueRef, Error>;
        async fn network_get_record(
            &self,
            network: &OpaqueRef,
        ) -> Result<NetworkRecord, Error>;
        async fn network_get_by_uuid(
            &self,
            uuid: &str,
        ) -> Result<OpaqueRef, Error>;
        async fn network_set_name_label(
            &self,
            network: &OpaqueRef,
            label: &str,
        ) -> Result<(), Error>;
        async fn network_destroy(
            &self,
            network: &OpaqueRef,
        ) -> Result<(), Error>;
    }

    #[async_trait]
    impl VmApi for Xen {
        async fn vm_get_all_records(
            &self,
        ) -> Result<BTreeMap<OpaqueRef, VmRecord>, Error>;
    }

    #[async_trait]
    impl ObjectApi for Xen {
        async fn get_uuid(
            &self,
            class: XenClass,
            reference: &OpaqueRef,
        ) -> Result<String, Error>;
    }
}

pub fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}
