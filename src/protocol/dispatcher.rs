use crate::core::codec::CompressionPolicy;
use crate::core::serialization::SerializationFormat;
use crate::core::value::Value;
use crate::error::Result;
use crate::protocol::message::{InvocationResult, MethodCallEnvelope, RemoteFault};
use crate::service::registry::{CallArgs, Fault, Invocation, ServiceRegistry};
use crate::utils::metrics::{HostStats, Timer};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Routes sync requests and invocations to the host's registry.
///
/// Shared read-only by every connection task; no locks on the call path.
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    stats: Arc<HostStats>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>, stats: Arc<HostStats>) -> Self {
        Self { registry, stats }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &HostStats {
        &self.stats
    }

    pub fn format(&self) -> SerializationFormat {
        self.registry.format()
    }

    /// Serialized sync info for `key`, or `None` if no such service exists
    #[instrument(skip(self))]
    pub fn sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _timer = Timer::with_detail("sync", key.to_string());
        match self.registry.service_by_key(key) {
            Some(instance) => {
                let bytes = instance.sync_info().to_bytes(self.registry.format())?;
                self.stats.sync_served();
                debug!(bytes = bytes.len(), "Sync info served");
                Ok(Some(bytes))
            }
            None => {
                warn!("Sync requested for unknown service");
                Ok(None)
            }
        }
    }

    /// Compression applied to replies of a service
    pub fn compression_for(&self, service_key_index: i32) -> CompressionPolicy {
        self.registry
            .service(service_key_index)
            .map(|s| s.compression())
            .unwrap_or(CompressionPolicy::DISABLED)
    }

    /// Run one call. Method failures and panics become `Faulted`; they never
    /// escape into the connection loop.
    #[instrument(skip(self, envelope), fields(service = envelope.service_key_index, method = envelope.method_id))]
    pub async fn dispatch(&self, envelope: MethodCallEnvelope) -> InvocationResult {
        let Some(instance) = self.registry.service(envelope.service_key_index) else {
            self.stats.unknown_method();
            return InvocationResult::UnknownMethod;
        };
        let Some(entry) = instance.method(envelope.method_id) else {
            self.stats.unknown_method();
            return InvocationResult::UnknownMethod;
        };

        let descriptor = entry.descriptor();
        let _timer = Timer::with_detail("invoke", format!("{}.{}", instance.key(), descriptor.name));
        self.stats.invocation();

        if envelope.parameters.len() != descriptor.parameter_types.len() {
            self.stats.invocation_faulted();
            return InvocationResult::Faulted(
                Fault::new(
                    "ArgumentMismatch",
                    format!(
                        "{} expects {} arguments, received {}",
                        descriptor.name,
                        descriptor.parameter_types.len(),
                        envelope.parameters.len()
                    ),
                )
                .into(),
            );
        }

        let args = CallArgs::new(envelope.parameters, self.registry.format());
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| entry.call(args))) {
            Ok(future) => AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(Fault::from_panic(panic))),
            Err(panic) => Err(Fault::from_panic(panic)),
        };

        match outcome {
            Ok(invocation) => InvocationResult::Returned(return_slots(invocation, &descriptor.by_ref)),
            Err(fault) => {
                warn!(fault = %fault, "Method faulted");
                self.stats.invocation_faulted();
                InvocationResult::Faulted(RemoteFault::from(fault))
            }
        }
    }
}

/// Slot 0 holds the return value; by-ref arguments follow, others are Null.
fn return_slots(invocation: Invocation, by_ref: &[bool]) -> Vec<Value> {
    let mut slots = Vec::with_capacity(1 + invocation.args.len());
    slots.push(invocation.return_value);
    for (index, value) in invocation.args.into_iter().enumerate() {
        if by_ref.get(index).copied().unwrap_or(false) {
            slots.push(value);
        } else {
            slots.push(Value::Null);
        }
    }
    slots
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::service::registry::{InterfaceDef, MethodDef};

    struct Svc;

    fn dispatcher() -> Dispatcher {
        let iface = InterfaceDef::new("Test.ISvc")
            .method(
                MethodDef::new("Swap").out_param::<i32>().param::<i32>().out_param::<i32>(),
                |_: &Svc, mut args| {
                    let (a, c) = (args.get::<i32>(0)?, args.get::<i32>(2)?);
                    args.set(0, c);
                    args.set(2, a);
                    args.returning_unit()
                },
            )
            .method(MethodDef::new("Fail"), |_: &Svc, _args| {
                Err(Fault::new("InvalidOperation", "nope").with_stack("at Fail"))
            })
            .method(MethodDef::new("Explode"), |_: &Svc, _args| panic!("kaboom"))
            .method_async(MethodDef::new("Later").returns::<String>(), |_svc, args| async move {
                tokio::task::yield_now().await;
                args.returning("done")
            });

        let mut registry = ServiceRegistry::new();
        registry.register(iface, Svc).unwrap();
        Dispatcher::new(Arc::new(registry), Arc::new(HostStats::new()))
    }

    fn call(method_id: i32, parameters: Vec<Value>) -> MethodCallEnvelope {
        MethodCallEnvelope {
            service_key_index: 0,
            method_id,
            parameters,
        }
    }

    #[tokio::test]
    async fn test_by_ref_slots_and_null_others() {
        let d = dispatcher();
        let result = d
            .dispatch(call(0, vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
            .await;
        assert_eq!(
            result,
            InvocationResult::Returned(vec![Value::Null, Value::Int(3), Value::Null, Value::Int(1)])
        );
    }

    #[tokio::test]
    async fn test_fault_preserved() {
        let d = dispatcher();
        match d.dispatch(call(1, vec![])).await {
            InvocationResult::Faulted(fault) => {
                assert_eq!(fault.type_name, "InvalidOperation");
                assert_eq!(fault.message, "nope");
                assert_eq!(fault.stack.as_deref(), Some("at Fail"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
        assert_eq!(d.stats().snapshot().invocations_faulted, 1);
    }

    #[tokio::test]
    async fn test_panic_isolated() {
        let d = dispatcher();
        match d.dispatch(call(2, vec![])).await {
            InvocationResult::Faulted(fault) => assert_eq!(fault.message, "kaboom"),
            other => panic!("expected fault, got {other:?}"),
        }
        // Still serving afterwards.
        assert!(matches!(d.dispatch(call(3, vec![])).await, InvocationResult::Returned(_)));
    }

    #[tokio::test]
    async fn test_async_method_awaited() {
        let d = dispatcher();
        assert_eq!(
            d.dispatch(call(3, vec![])).await,
            InvocationResult::Returned(vec![Value::String("done".into())])
        );
    }

    #[tokio::test]
    async fn test_unknown_targets() {
        let d = dispatcher();
        assert_eq!(d.dispatch(call(99, vec![])).await, InvocationResult::UnknownMethod);
        let mut bad_service = call(0, vec![]);
        bad_service.service_key_index = 7;
        assert_eq!(d.dispatch(bad_service).await, InvocationResult::UnknownMethod);
        assert_eq!(d.stats().snapshot().unknown_methods, 2);
    }

    #[tokio::test]
    async fn test_arity_mismatch_faults() {
        let d = dispatcher();
        match d.dispatch(call(0, vec![Value::Int(1)])).await {
            InvocationResult::Faulted(fault) => assert_eq!(fault.type_name, "ArgumentMismatch"),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_sync_lookup() {
        let d = dispatcher();
        assert!(d.sync("Test.ISvc").unwrap().is_some());
        assert!(d.sync("Test.IMissing").unwrap().is_none());
    }
}
