// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use dropshot::{
    ConfigDropshot, ConfigLogging, ConfigLoggingIfExists, ConfigLoggingLevel,
};
use serde_json::{json, Value};
use slog::{o, Logger};
use xenapi_client::{Failure, OpaqueRef, Session, VmRecord, XenClass};
use xenapi_mock_server::{Pool, Server};
use xenserver_provider::{Diagnostic, Error, PlanAction, Provider};

fn initialize_log(test_name: &str) -> Logger {
    let path = format!("/tmp/{}.log", test_name);
    eprintln!("Logging at {}", path);
    let config_logging = ConfigLogging::File {
        level: ConfigLoggingLevel::Debug,
        if_exists: ConfigLoggingIfExists::Truncate,
        path,
    };
    config_logging.to_logger(test_name).unwrap()
}

fn initialize_server(log: &Logger) -> (Arc<Pool>, Server) {
    let pool = Arc::new(Pool::new(log.new(o!("component" => "pool"))));
    let config_dropshot = ConfigDropshot {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let server =
        xenapi_mock_server::start(config_dropshot, pool.clone(), log.clone())
            .unwrap();
    (pool, server)
}

async fn connect(server: &Server, log: &Logger) -> Session {
    Session::connect(
        &format!("http://{}", server.local_addr()),
        Pool::DEFAULT_USERNAME,
        Pool::DEFAULT_PASSWORD,
        log.new(o!("component" => "client")),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_bad_credentials() {
    let log = initialize_log("test_bad_credentials");
    let (_pool, server) = initialize_server(&log);

    let err = Session::connect(
        &format!("http://{}", server.local_addr()),
        "root",
        "wrong",
        log.clone(),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(
        err.failure().map(|f| f.code.as_str()),
        Some(Failure::SESSION_AUTHENTICATION_FAILED)
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_network_lifecycle() {
    let log = initialize_log("test_network_lifecycle");
    let (pool, server) = initialize_server(&log);
    let session = Arc::new(connect(&server, &log).await);
    let provider = Provider::new(session.clone(), log.clone());
    let network = provider.resource("xenserver_network").unwrap();

    // Create with defaults, then read back the same model.
    let config = json!({ "name_label": "net-1" });
    let created = network.create(config).await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(
        created,
        json!({
            "id": id,
            "name_label": "net-1",
            "name_description": "",
            "other_config": {},
        })
    );
    assert_eq!(network.read(created.clone()).await.unwrap(), created);

    // The pool filled in defaults of its own.
    let record = pool.network_by_uuid(&id).unwrap();
    assert_eq!(record.mtu, 1500);
    assert!(record.bridge.starts_with("xapi"));

    // Import yields the state obtained from create and read.
    assert_eq!(network.import(&id).await.unwrap(), created);

    // Only the label changes on update.
    let config = json!({ "name_label": "net-2" });
    assert_eq!(
        network.plan(Some(&created), Some(&config)).unwrap(),
        PlanAction::Update { attributes: vec!["name_label"] }
    );
    let updated = network.update(config, created.clone()).await.unwrap();
    let mut expected = created.clone();
    expected["name_label"] = json!("net-2");
    assert_eq!(updated, expected);
    assert_eq!(pool.network_by_uuid(&id).unwrap().name_label, "net-2");

    // Delete, after which the UUID no longer resolves.
    network.delete(updated.clone()).await.unwrap();
    let err = network.read(updated).await.unwrap_err();
    assert!(matches!(err, Error::Resolution { .. }));
    let diag = Diagnostic::from(&err);
    assert_eq!(diag.summary, "unable to get network ref");
    assert!(diag.detail.contains(Failure::UUID_INVALID));

    session.logout().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_create_sends_other_config() {
    let log = initialize_log("test_create_sends_other_config");
    let (pool, server) = initialize_server(&log);
    let session = Arc::new(connect(&server, &log).await);
    let provider = Provider::new(session, log.clone());
    let network = provider.resource("xenserver_network").unwrap();

    let created = network
        .create(json!({
            "name_label": "net-cfg",
            "name_description": "with config",
            "other_config": { "owner": "ops" },
        }))
        .await
        .unwrap();
    assert_eq!(created["other_config"], json!({ "owner": "ops" }));
    let id = created["id"].as_str().unwrap();
    let record = pool.network_by_uuid(id).unwrap();
    assert_eq!(record.other_config.get("owner"), Some(&json!("ops")));
    assert_eq!(record.name_description, "with config");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_out_of_band_deletion_is_not_self_healing() {
    let log = initialize_log("test_out_of_band_deletion_is_not_self_healing");
    let (pool, server) = initialize_server(&log);
    let session = Arc::new(connect(&server, &log).await);
    let provider = Provider::new(session, log.clone());
    let network = provider.resource("xenserver_network").unwrap();

    let config = json!({ "name_label": "gone" });
    let created = network.create(config).await.unwrap();
    assert!(pool.remove_network(created["id"].as_str().unwrap()));

    assert!(matches!(
        network.read(created.clone()).await,
        Err(Error::Resolution { .. })
    ));
    assert!(matches!(
        network.delete(created).await,
        Err(Error::Resolution { .. })
    ));

    server.close().await.unwrap();
}

fn labels(listing: &Value) -> Vec<&str> {
    listing["data_items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name_label"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_vm_listing() {
    let log = initialize_log("test_vm_listing");
    let (pool, server) = initialize_server(&log);

    let host = pool.add_object(XenClass::Host, "host-uuid");
    for (uuid, name) in [("30", "vm-A"), ("10", "vm-B"), ("20", "vm-A")] {
        pool.add_vm(VmRecord {
            uuid: uuid.to_string(),
            name_label: name.to_string(),
            domid: 1,
            resident_on: host.clone(),
            ..Default::default()
        });
    }
    pool.add_vm(VmRecord {
        uuid: "40".to_string(),
        name_label: "vm-A".to_string(),
        is_a_template: true,
        ..Default::default()
    });
    pool.add_vm(VmRecord {
        uuid: "50".to_string(),
        name_label: "vm-A".to_string(),
        domid: -1,
        snapshot_of: OpaqueRef::new("OpaqueRef:elsewhere"),
        ..Default::default()
    });

    let session = Arc::new(connect(&server, &log).await);
    let provider = Provider::new(session, log.clone());
    let vms = provider.data_source("xenserver_vm").unwrap();

    // The control domain is excluded along with templates and snapshots.
    let all = vms.read(json!({})).await.unwrap();
    let uuids: Vec<_> = all["data_items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["uuid"].as_str().unwrap())
        .collect();
    assert_eq!(uuids, vec!["10", "20", "30"]);
    assert_eq!(all["data_items"][0]["resident_on"], json!("host-uuid"));
    assert_eq!(all["data_items"][0]["snapshot_of"], json!(""));
    assert_eq!(all, vms.read(json!({})).await.unwrap());

    let narrowed = vms.read(json!({ "name_label": "vm-A" })).await.unwrap();
    assert_eq!(labels(&narrowed), vec!["vm-A", "vm-A"]);
    assert_eq!(narrowed["name_label"], json!("vm-A"));

    server.close().await.unwrap();
}
