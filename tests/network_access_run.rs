use keyvault_vnet::vault::models::{
    Bypass, DefaultAction, IpRule, NetworkRuleSet, Subnet, VirtualNetwork, VirtualNetworkRule,
    KEY_VAULT_SERVICE_ENDPOINT,
};
use keyvault_vnet::vault::{NetworkAccessRun, ProbeOutcome, VaultError};
use tokio::time::{Duration, Instant};

mod common;

use common::{
    existing_vault, network_config, setup_logging, FakeAzure, IP_ADDRESS, SUBNET_ID,
};

fn existing_vnet(subnet_name: &str) -> VirtualNetwork {
    VirtualNetwork::new(
        "southcentralus",
        "10.1.0.0/16",
        Subnet::with_vault_endpoint(subnet_name, "10.1.0.0/24"),
    )
}

#[tokio::test]
async fn test_fresh_environment_creates_everything() {
    setup_logging();
    let azure = FakeAzure::new();
    let config = network_config();

    let report = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .expect("run should succeed");

    assert!(report.vnet_created);
    assert!(!report.subnet_created, "the new vnet already carries the subnet");
    assert!(report.vault_created);
    assert!(report.rules_updated);
    assert!(report.enforcement_enabled);
    assert_eq!(report.enforced_probe, ProbeOutcome::Forbidden);
    assert_eq!(report.restored_probe, ProbeOutcome::Allowed);

    // create, add rules, enforce, remove rules
    assert_eq!(azure.count("put_vault"), 4);
    assert_eq!(azure.count("put_vnet"), 1);
    assert_eq!(azure.count("put_subnet"), 0);
    assert_eq!(azure.count("list_secrets"), 2);

    let vnet = azure.stored_vnet().expect("vnet stored");
    let subnet = vnet.find_subnet("subnet-0").expect("subnet stored");
    assert_eq!(
        subnet.properties.service_endpoints[0].service,
        KEY_VAULT_SERVICE_ENDPOINT
    );

    let acl = report.final_acl.expect("ACL present after the run");
    assert_eq!(acl.default_action, DefaultAction::Allow);
    assert!(acl.virtual_network_rules.is_empty());
    assert!(acl.ip_rules.is_empty());

    let stored = azure.stored_vault().expect("vault stored");
    assert_eq!(stored.properties.network_acls, Some(acl));
    assert_eq!(stored.properties.access_policies.len(), 1);
}

#[tokio::test]
async fn test_existing_rules_skip_rule_update() {
    setup_logging();
    let mut vault = existing_vault();
    vault.properties.network_acls = Some(NetworkRuleSet {
        bypass: Bypass::AzureServices,
        default_action: DefaultAction::Deny,
        ip_rules: vec![IpRule {
            value: IP_ADDRESS.to_string(),
        }],
        virtual_network_rules: vec![VirtualNetworkRule {
            id: SUBNET_ID.to_uppercase(),
        }],
    });
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .with_vault(vault);
    let config = network_config();

    let report = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .expect("run should succeed");

    assert!(!report.vnet_created);
    assert!(!report.subnet_created);
    assert!(!report.vault_created);
    assert!(!report.rules_updated);
    assert!(!report.enforcement_enabled);
    assert_eq!(report.enforced_probe, ProbeOutcome::Forbidden);

    // Only the teardown writes
    assert_eq!(azure.count("put_vault"), 1);
    assert_eq!(azure.count("put_vnet"), 0);
    assert_eq!(azure.count("put_subnet"), 0);
}

#[tokio::test]
async fn test_missing_subnet_is_created_in_existing_vnet() {
    setup_logging();
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("other"))
        .with_vault(existing_vault());
    let config = network_config();

    let report = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .expect("run should succeed");

    assert!(!report.vnet_created);
    assert!(report.subnet_created);
    assert_eq!(azure.count("put_subnet"), 1);
    // initial read plus the re-read after the subnet was added
    assert_eq!(azure.count("get_vnet"), 2);

    let vnet = azure.stored_vnet().unwrap();
    assert!(vnet.find_subnet("other").is_some());
    assert!(vnet.find_subnet("SUBNET-0").is_some());
}

#[tokio::test]
async fn test_unexpected_vault_error_aborts_run() {
    setup_logging();
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .failing_vault_reads(500);
    let config = network_config();

    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::HttpStatus(500, _)));
    assert_eq!(azure.count("get_vault"), 1);
    assert_eq!(azure.count("put_vault"), 0);
    assert_eq!(azure.count("list_secrets"), 0);
}

#[tokio::test]
async fn test_conflict_on_vault_read_is_not_treated_as_missing() {
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .failing_vault_reads(409);
    let config = network_config();

    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(azure.count("put_vault"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_vault_is_read_back_with_backoff() {
    setup_logging();
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .hiding_new_vaults_for(2);
    let config = network_config();

    let start = Instant::now();
    let report = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .expect("run should succeed");

    assert!(report.vault_created);
    // existence check plus three read-backs
    assert_eq!(azure.count("get_vault"), 4);
    // 1s then 2s
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_new_vault_never_visible_fails_after_max_attempts() {
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .hiding_new_vaults_for(10);
    let config = network_config();

    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(azure.count("get_vault"), 1 + config.max_attempts as usize);
    assert_eq!(azure.count("put_vault"), 1);
}

#[tokio::test]
async fn test_client_matching_a_rule_is_allowed_while_enforced() {
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .with_vault(existing_vault())
        .allowing_enforced_access();
    let config = network_config();

    let report = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .expect("an allowed probe is not an error");

    assert_eq!(report.enforced_probe, ProbeOutcome::Allowed);
    assert_eq!(report.restored_probe, ProbeOutcome::Allowed);
}

#[tokio::test]
async fn test_second_run_reuses_resources() {
    let azure = FakeAzure::new();
    let config = network_config();
    let run = NetworkAccessRun::new(&azure, &azure, &azure, &config);

    let first = run.run().await.unwrap();
    assert!(first.vnet_created && first.vault_created);

    let second = run.run().await.unwrap();
    assert!(!second.vnet_created);
    assert!(!second.subnet_created);
    assert!(!second.vault_created);
    assert!(second.rules_updated);
    assert_eq!(second.final_acl, first.final_acl);
    assert_eq!(azure.count("put_vnet"), 1);
}

fn assert_original(err: &VaultError, status: u16, call: &str) {
    let body = format!("injected {} failure", call);
    match (status, err) {
        (404, VaultError::NotFound(msg)) | (403, VaultError::Forbidden(msg)) => {
            assert_eq!(msg, &body)
        }
        (_, VaultError::HttpStatus(code, msg)) if *code == status => assert_eq!(msg, &body),
        _ => panic!("expected the original {} error, got {:?}", status, err),
    }
}

#[tokio::test(start_paused = true)]
async fn test_enforced_probe_failure_is_returned_unchanged() {
    setup_logging();
    for status in [400, 401, 404, 409, 412] {
        let azure = FakeAzure::new()
            .with_vnet(existing_vnet("subnet-0"))
            .with_vault(existing_vault())
            .failing_from("list_secrets", 1, status);
        let config = network_config();

        let start = Instant::now();
        let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
            .run()
            .await
            .unwrap_err();

        assert_original(&err, status, "list_secrets");
        assert_eq!(azure.count("list_secrets"), 1, "status {} was retried", status);
        assert_eq!(start.elapsed(), Duration::ZERO);
        // rules and enforcement were written, teardown never ran
        assert_eq!(azure.count("put_vault"), 2);
    }
}

#[tokio::test(start_paused = true)]
async fn test_restored_probe_failure_is_returned_unchanged() {
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .with_vault(existing_vault())
        .failing_from("list_secrets", 2, 409);
    let config = network_config();

    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert_original(&err, 409, "list_secrets");
    assert_eq!(azure.count("list_secrets"), 2);
    assert_eq!(azure.count("put_vault"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_probe_failure_is_retried_then_returned() {
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("subnet-0"))
        .with_vault(existing_vault())
        .failing_from("list_secrets", 2, 503);
    let config = network_config();

    let start = Instant::now();
    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert_original(&err, 503, "list_secrets");
    // first probe plus every attempt of the second
    assert_eq!(
        azure.count("list_secrets"),
        1 + config.max_attempts as usize
    );
    // 1s + 2s + 4s
    assert_eq!(start.elapsed(), Duration::from_secs(7));
}

#[tokio::test]
async fn test_vnet_read_failure_aborts_run() {
    let azure = FakeAzure::new().failing_from("get_vnet", 1, 403);
    let config = network_config();

    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert_original(&err, 403, "get_vnet");
    assert_eq!(azure.count("get_vnet"), 1);
    assert_eq!(azure.count("put_vnet"), 0);
    assert_eq!(azure.count("get_vault"), 0);
}

#[tokio::test]
async fn test_vnet_creation_failure_aborts_run() {
    let azure = FakeAzure::new().failing_from("put_vnet", 1, 409);
    let config = network_config();

    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert_original(&err, 409, "put_vnet");
    assert_eq!(azure.count("put_vnet"), 1);
    assert_eq!(azure.count("get_vault"), 0);
}

#[tokio::test]
async fn test_subnet_creation_failure_aborts_run() {
    let azure = FakeAzure::new()
        .with_vnet(existing_vnet("other"))
        .failing_from("put_subnet", 1, 400);
    let config = network_config();

    let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
        .run()
        .await
        .unwrap_err();

    assert_original(&err, 400, "put_subnet");
    assert_eq!(azure.count("put_subnet"), 1);
    assert_eq!(azure.count("get_vnet"), 1);
    assert_eq!(azure.count("get_vault"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_read_back_failure_after_create_is_returned_unchanged() {
    for status in [403, 409] {
        let azure = FakeAzure::new()
            .with_vnet(existing_vnet("subnet-0"))
            .failing_from("get_vault", 2, status);
        let config = network_config();

        let start = Instant::now();
        let err = NetworkAccessRun::new(&azure, &azure, &azure, &config)
            .run()
            .await
            .unwrap_err();

        assert_original(&err, status, "get_vault");
        // existence check plus a single read-back
        assert_eq!(azure.count("get_vault"), 2);
        assert_eq!(azure.count("put_vault"), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
