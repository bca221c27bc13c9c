//! End-to-end tests: a host bound on loopback TCP and channels calling it

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{open, registry, start, Point, CALCULATOR};
use duplex_rpc::config::HostConfig;
use duplex_rpc::core::{ObjectValue, SerializationFormat, Value};
use duplex_rpc::error::ProtocolError;
use duplex_rpc::service::{Channel, ChannelOptions, Host};
use duplex_rpc::transport::Endpoint;
use duplex_rpc::values;
use std::time::Duration;

#[tokio::test]
async fn test_min_over_tcp() {
    let handle = start(Host::builder(registry()).build()).await;
    let mut channel = open(&handle).await;

    let min: i32 = channel.call_as("Min", &mut values![3, 9]).await.unwrap();
    assert_eq!(min, 3);
    let min: i32 = channel.call_as("Min", &mut values![-4, -5]).await.unwrap();
    assert_eq!(min, -5);

    channel.close().await.unwrap();
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_sync_info_lists_inherited_methods() {
    let handle = start(Host::builder(registry()).build()).await;
    let channel = open(&handle).await;

    let info = channel.sync_info();
    assert_eq!(info.service_key_index, 0);
    let names: Vec<_> = info.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Min", "DivMod", "Echo", "Mirror", "Delay", "Ping"]);
    assert_eq!(channel.method_id("Min", &["i32".into(), "i32".into()]), Some(0));
    assert_eq!(channel.method_id("Min", &["i64".into(), "i32".into()]), None);

    let mut channel = channel;
    let pong: String = channel.call_as("Ping", &mut []).await.unwrap();
    assert_eq!(pong, "pong");
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_service_sentinel() {
    let handle = start(Host::builder(registry()).build()).await;
    let result = Channel::connect(handle.endpoint(), ChannelOptions::new("Demo.IMissing")).await;
    assert!(matches!(result, Err(ProtocolError::ServiceNotFound(key)) if key == "Demo.IMissing"));

    // The host keeps serving other clients.
    let mut channel = open(&handle).await;
    assert_eq!(channel.call("Min", &mut values![1, 2]).await.unwrap(), Value::Int(1));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_method_keeps_connection() {
    let handle = start(Host::builder(registry()).build()).await;
    let mut channel = open(&handle).await;

    assert!(matches!(
        channel.invoke(999, &mut values![1]).await,
        Err(ProtocolError::RemoteMethodNotFound(_))
    ));
    assert!(channel.is_connected());
    assert_eq!(channel.call("Min", &mut values![8, 2]).await.unwrap(), Value::Int(2));
    assert_eq!(handle.stats().snapshot().unknown_methods, 1);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_remote_exception_then_reuse() {
    let handle = start(Host::builder(registry()).build()).await;
    let mut channel = open(&handle).await;

    match channel.call("DivMod", &mut values![1, 0, 0]).await {
        Err(ProtocolError::RemoteInvocationFailed {
            type_name,
            message,
            stack,
        }) => {
            assert_eq!(type_name, "DivideByZeroException");
            assert_eq!(message, "Attempted to divide by zero.");
            assert_eq!(stack.as_deref(), Some("at Calculator.DivMod"));
        }
        other => panic!("expected remote exception, got {other:?}"),
    }

    let mut args = values![17, 5, 0];
    assert_eq!(channel.call("DivMod", &mut args).await.unwrap(), Value::Int(3));
    assert_eq!(args, values![17, 5, 2]);
    assert_eq!(handle.stats().snapshot().invocations_faulted, 1);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_argument_type_mismatch_is_remote_fault() {
    let handle = start(Host::builder(registry()).build()).await;
    let mut channel = open(&handle).await;

    match channel.invoke(0, &mut values!["three", 9]).await {
        Err(ProtocolError::RemoteInvocationFailed { type_name, .. }) => assert_eq!(type_name, "ArgumentMismatch"),
        other => panic!("expected argument fault, got {other:?}"),
    }
    // Wrong arity is reported the same way.
    match channel.invoke(0, &mut values![1]).await {
        Err(ProtocolError::RemoteInvocationFailed { type_name, .. }) => assert_eq!(type_name, "ArgumentMismatch"),
        other => panic!("expected argument fault, got {other:?}"),
    }
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_async_method() {
    let handle = start(Host::builder(registry()).build()).await;
    let mut channel = open(&handle).await;
    let waited: u64 = channel.call_as("Delay", &mut values![20u64]).await.unwrap();
    assert_eq!(waited, 20);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_object_parameters_each_format() {
    for format in [
        SerializationFormat::Bincode,
        SerializationFormat::Json,
        SerializationFormat::MessagePack,
    ] {
        let config = HostConfig {
            serialization: format,
            ..HostConfig::default()
        };
        let mut registry = duplex_rpc::service::ServiceRegistry::with_config(&config);
        registry.register(common::calculator(), common::Calculator::default()).unwrap();
        let handle = start(Host::new(registry, config)).await;

        let options = ChannelOptions::new(CALCULATOR).serialization(format);
        let mut channel = Channel::connect(handle.endpoint(), options).await.unwrap();

        let arg = ObjectValue::encode(&Point { x: 1, y: 2 }, format).unwrap();
        match channel.call("Mirror", &mut vec![Value::Object(arg)]).await.unwrap() {
            Value::Object(obj) => assert_eq!(obj.decode::<Point>(format).unwrap(), Point { x: 2, y: 1 }),
            other => panic!("expected object, got {other:?}"),
        }
        handle.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn test_compressed_payloads_both_directions() {
    let config = HostConfig {
        use_compression: true,
        compression_threshold: 1024,
        ..HostConfig::default()
    };
    let mut registry = duplex_rpc::service::ServiceRegistry::with_config(&config);
    registry.register(common::calculator(), common::Calculator::default()).unwrap();
    let handle = start(Host::new(registry, config)).await;
    let mut channel = open(&handle).await;

    assert!(channel.sync_info().use_compression);
    assert_eq!(channel.sync_info().compression_threshold, 1024);

    for len in [1024usize, 1025, 300_000] {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let echoed: Vec<u8> = channel.call_as("Echo", &mut vec![Value::ByteArray(payload.clone())]).await.unwrap();
        assert_eq!(echoed, payload);
    }
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_large_payload_crosses_read_chunks() {
    let handle = start(Host::builder(registry()).build()).await;
    let mut channel = open(&handle).await;

    let payload = vec![0xA5u8; 4 * 1024 * 1024];
    let echoed: Vec<u8> = channel.call_as("Echo", &mut vec![Value::ByteArray(payload.clone())]).await.unwrap();
    assert_eq!(echoed.len(), payload.len());
    assert_eq!(echoed, payload);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind and drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = Endpoint::Tcp(listener.local_addr().unwrap());
    drop(listener);

    let result = Channel::connect(&endpoint, ChannelOptions::new(CALCULATOR)).await;
    assert!(matches!(result, Err(ProtocolError::ConnectRefused(_))));
}

#[tokio::test]
async fn test_connect_timeout_is_bounded() {
    // Non-routable address: the connect attempt hangs until the deadline.
    let endpoint = Endpoint::parse("10.255.255.1:8098").unwrap();
    let options = ChannelOptions::new(CALCULATOR).connect_timeout(Duration::from_millis(200));

    let started = std::time::Instant::now();
    let result = Channel::connect(&endpoint, options).await;
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_shutdown_closes_idle_channels() {
    let config = HostConfig {
        shutdown_timeout: Duration::from_secs(1),
        ..HostConfig::default()
    };
    let handle = start(Host::new(registry(), config)).await;
    let mut channel = open(&handle).await;
    let endpoint = handle.endpoint().clone();

    handle.shutdown().await.unwrap();

    assert!(channel.call("Min", &mut values![1, 2]).await.is_err());
    assert!(!channel.is_connected());
    assert!(Channel::connect(&endpoint, ChannelOptions::new(CALCULATOR)).await.is_err());
}

#[tokio::test]
async fn test_stats_track_connections() {
    let handle = start(Host::builder(registry()).build()).await;
    let stats = handle.stats();

    let mut channel = open(&handle).await;
    channel.call("Min", &mut values![1, 2]).await.unwrap();
    channel.close().await.unwrap();

    // The host notices the close asynchronously.
    for _ in 0..50 {
        if stats.snapshot().connections_active == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.connections_total, 1);
    assert_eq!(snapshot.connections_active, 0);
    assert_eq!(snapshot.syncs_total, 1);
    assert_eq!(snapshot.invocations_total, 1);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_call_finish() {
    let handle = start(Host::builder(registry()).build()).await;
    let mut channel = open(&handle).await;

    let call = tokio::spawn(async move { channel.call_as::<u64>("Delay", &mut values![200u64]).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    handle.shutdown().await.unwrap();
    assert_eq!(call.await.unwrap().unwrap(), 200);
    assert!(started.elapsed() < Duration::from_secs(5));
}
