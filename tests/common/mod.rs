//! Shared fixtures for the integration tests
#![allow(dead_code, clippy::unwrap_used)]

use duplex_rpc::service::{Channel, ChannelOptions, Fault, Host, HostHandle, InterfaceDef, MethodDef, ServiceRegistry};
use duplex_rpc::transport::Endpoint;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const CALCULATOR: &str = "Demo.ICalculator";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Default)]
pub struct Calculator {
    pub calls: AtomicU64,
}

impl Calculator {
    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

fn base() -> InterfaceDef<Calculator> {
    InterfaceDef::new("Demo.IBase").method(MethodDef::new("Ping").returns::<String>(), |svc: &Calculator, args| {
        svc.tick();
        args.returning("pong")
    })
}

pub fn calculator() -> InterfaceDef<Calculator> {
    InterfaceDef::new(CALCULATOR)
        .method(MethodDef::new("Min").param::<i32>().param::<i32>().returns::<i32>(), |svc: &Calculator, args| {
            svc.tick();
            let (a, b) = (args.get::<i32>(0)?, args.get::<i32>(1)?);
            args.returning(a.min(b))
        })
        .method(
            MethodDef::new("DivMod").param::<i32>().param::<i32>().out_param::<i32>().returns::<i32>(),
            |svc: &Calculator, mut args| {
                svc.tick();
                let (a, b) = (args.get::<i32>(0)?, args.get::<i32>(1)?);
                if b == 0 {
                    return Err(Fault::new("DivideByZeroException", "Attempted to divide by zero.")
                        .with_stack("at Calculator.DivMod"));
                }
                args.set(2, a % b);
                args.returning(a / b)
            },
        )
        .method(MethodDef::new("Echo").param::<Vec<u8>>().returns::<Vec<u8>>(), |_: &Calculator, args| {
            let data = args.get::<Vec<u8>>(0)?;
            args.returning(data)
        })
        .method(
            MethodDef::new("Mirror").param_named("Point").returns_named("Point"),
            |_: &Calculator, args| {
                let p: Point = args.object(0)?;
                args.returning_object(&Point { x: p.y, y: p.x })
            },
        )
        .method_async(MethodDef::new("Delay").param::<u64>().returns::<u64>(), |_svc, args| async move {
            let ms = args.get::<u64>(0)?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            args.returning(ms)
        })
        .extends(base())
}

pub fn registry() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    registry.register(calculator(), Calculator::default()).unwrap();
    registry
}

pub async fn start(host: Host) -> HostHandle {
    host.bind(&Endpoint::parse("127.0.0.1:0").unwrap()).await.unwrap()
}

pub async fn open(handle: &HostHandle) -> Channel {
    Channel::connect(handle.endpoint(), ChannelOptions::new(CALCULATOR)).await.unwrap()
}
