use queuebench_common::{ConfigError, EndpointDescriptor, EndpointRegistry};

fn endpoint(name: &str, statuses: &[u16]) -> EndpointDescriptor {
    EndpointDescriptor::new(name, format!("http://127.0.0.1:8081/{name}"), statuses)
}

fn by_name<'a>(registry: &'a EndpointRegistry, name: &str) -> &'a EndpointDescriptor {
    registry.iter().find(|e| e.name == name).unwrap()
}

#[test]
fn test_success_predicate_matches_expected_statuses_only() {
    let sync = endpoint("sync", &[200, 201]);
    assert!(sync.is_success(200));
    assert!(sync.is_success(201));
    assert!(!sync.is_success(202));
    assert!(!sync.is_success(500));

    let kafka = endpoint("kafka", &[202]);
    assert!(kafka.is_success(202));
    assert!(!kafka.is_success(200));
}

#[test]
fn test_registry_preserves_order_and_looks_up_by_name() {
    let registry = EndpointRegistry::new(vec![
        endpoint("sync", &[200]),
        endpoint("kafka", &[202]),
        endpoint("rabbitmq", &[202]),
    ])
    .unwrap();

    let names: Vec<&str> = registry.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["sync", "kafka", "rabbitmq"]);
    assert_eq!(registry.len(), 3);
    assert_eq!(by_name(&registry, "kafka").expected_statuses, vec![202]);
}

#[test]
fn test_registry_rejects_duplicates() {
    let err = EndpointRegistry::new(vec![endpoint("sync", &[200]), endpoint("sync", &[201])])
        .unwrap_err();
    assert_eq!(err, ConfigError::DuplicateEndpoint("sync".to_string()));
}

#[test]
fn test_registry_rejects_empty_inputs() {
    assert_eq!(EndpointRegistry::new(vec![]).unwrap_err(), ConfigError::NoEndpoints);
    assert_eq!(
        EndpointRegistry::new(vec![endpoint("", &[200])]).unwrap_err(),
        ConfigError::EmptyEndpointName
    );
    assert_eq!(
        EndpointRegistry::new(vec![endpoint("sync", &[])]).unwrap_err(),
        ConfigError::NoExpectedStatus("sync".to_string())
    );
}

#[test]
fn test_order_paths_defaults() {
    let registry = EndpointRegistry::order_paths("http://localhost:8081/").unwrap();
    let sync = by_name(&registry, "sync");
    assert_eq!(sync.address, "http://localhost:8081/orders/sync");
    assert!(sync.is_success(200) && sync.is_success(201));

    let kafka = by_name(&registry, "kafka");
    assert_eq!(kafka.address, "http://localhost:8081/orders/async/kafka");
    assert!(kafka.is_success(202));

    let rabbit = by_name(&registry, "rabbitmq");
    assert_eq!(rabbit.address, "http://localhost:8081/orders/async/rabbitmq");
    assert!(!rabbit.is_success(200));
}

#[test]
fn test_registry_rejects_malformed_addresses() {
    for address in ["not a url", "", "ftp://127.0.0.1/orders", "localhost:8081/orders", "http://"] {
        let err = EndpointRegistry::new(vec![EndpointDescriptor::new("sync", address, &[200])]).unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidAddress(name, _) if name == "sync"),
            "{address:?} accepted: {err:?}"
        );
    }
    assert!(EndpointRegistry::new(vec![EndpointDescriptor::new("sync", "https://orders.example:443/x", &[200])]).is_ok());
}

#[test]
fn test_order_paths_rejects_malformed_base_url() {
    assert!(matches!(
        EndpointRegistry::order_paths("orders-service"),
        Err(ConfigError::InvalidAddress(_, _))
    ));
}
