//! # Service Registry
//!
//! Services are described by an [`InterfaceDef`]: a key plus a table of
//! typed method thunks. Each thunk receives the call's [`CallArgs`] and
//! returns an [`Invocation`] (return value plus updated arguments) or a
//! [`Fault`].
//!
//! ```rust
//! use duplex_rpc::service::registry::{InterfaceDef, MethodDef, ServiceRegistry};
//!
//! struct Calculator;
//!
//! impl Calculator {
//!     fn min(&self, a: i32, b: i32) -> i32 {
//!         a.min(b)
//!     }
//! }
//!
//! let calc = InterfaceDef::new("Demo.ICalculator")
//!     .method(MethodDef::new("Min").param::<i32>().param::<i32>().returns::<i32>(), |svc: &Calculator, args| {
//!         let (a, b) = (args.get::<i32>(0)?, args.get::<i32>(1)?);
//!         args.returning(svc.min(a, b))
//!     });
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register(calc, Calculator).unwrap();
//! ```
//!
//! ## Method Ids
//! Own methods in declaration order, then each extended interface depth-first.
//! Every declared method gets its own id, even when a base declares the same
//! signature. A base reached twice through different paths is listed once.

use crate::config::HostConfig;
use crate::core::codec::CompressionPolicy;
use crate::core::serialization::{type_name_of, ObjectValue, SerializationFormat};
use crate::core::value::{FromValue, IntoValue, Value, WireType};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::descriptor::{MethodDescriptor, ServiceSyncInfo};
use crate::protocol::message::RemoteFault;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

pub type MethodFuture = BoxFuture<'static, std::result::Result<Invocation, Fault>>;

type UnboundThunk<T> = Box<dyn Fn(Arc<T>, CallArgs) -> MethodFuture + Send + Sync>;
type BoundThunk = Box<dyn Fn(CallArgs) -> MethodFuture + Send + Sync>;

/// A failure raised by a service method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub type_name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl Fault {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Name the fault after the error type; the source chain becomes the stack
    pub fn from_error<E: std::error::Error + 'static>(error: &E) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            type_name: short_type_name(&type_name_of::<E>()),
            message: error.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\ncaused by: ")),
        }
    }

    /// Fault for a panic unwinding out of a method
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "method panicked".to_string()
        };
        Self::new("panic", message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl From<ProtocolError> for Fault {
    fn from(error: ProtocolError) -> Self {
        let type_name = match &error {
            ProtocolError::ArgumentMismatch(_) => "ArgumentMismatch",
            ProtocolError::SerializeError(_) => "SerializeError",
            ProtocolError::DeserializeError(_) => "DeserializeError",
            _ => "ProtocolError",
        };
        Fault::new(type_name, error.to_string())
    }
}

impl From<Fault> for RemoteFault {
    fn from(fault: Fault) -> Self {
        RemoteFault {
            type_name: fault.type_name,
            message: fault.message,
            stack: fault.stack,
        }
    }
}

fn short_type_name(name: &str) -> String {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Arguments of one call. By-ref outputs are written back with [`CallArgs::set`].
#[derive(Debug, Clone)]
pub struct CallArgs {
    values: Vec<Value>,
    format: SerializationFormat,
}

impl CallArgs {
    pub fn new(values: Vec<Value>, format: SerializationFormat) -> Self {
        Self { values, format }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn value(&self, index: usize) -> std::result::Result<&Value, Fault> {
        self.values.get(index).ok_or_else(|| {
            Fault::new(
                "ArgumentMismatch",
                format!("argument {index} missing, call has {}", self.values.len()),
            )
        })
    }

    pub fn get<T: FromValue>(&self, index: usize) -> std::result::Result<T, Fault> {
        T::from_value(self.value(index)?.clone()).map_err(Fault::from)
    }

    /// Deserialize an object argument with the connection's format
    pub fn object<T: DeserializeOwned>(&self, index: usize) -> std::result::Result<T, Fault> {
        match self.value(index)? {
            Value::Object(obj) => obj.decode(self.format).map_err(Fault::from),
            other => Err(Fault::new(
                "ArgumentMismatch",
                format!("argument {index} is {}, expected object", other.kind()),
            )),
        }
    }

    pub fn set<T: IntoValue>(&mut self, index: usize, value: T) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value.into_value();
        }
    }

    pub fn set_object<T: Serialize>(&mut self, index: usize, value: &T) -> std::result::Result<(), Fault> {
        let obj = ObjectValue::encode(value, self.format)?;
        self.set(index, Value::Object(obj));
        Ok(())
    }

    pub fn returning<T: IntoValue>(self, value: T) -> std::result::Result<Invocation, Fault> {
        Ok(Invocation {
            return_value: value.into_value(),
            args: self.values,
        })
    }

    pub fn returning_object<T: Serialize>(self, value: &T) -> std::result::Result<Invocation, Fault> {
        let obj = ObjectValue::encode(value, self.format)?;
        self.returning(Value::Object(obj))
    }

    pub fn returning_unit(self) -> std::result::Result<Invocation, Fault> {
        self.returning(Value::Null)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// The `(return value, updated arguments)` result of a method
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub return_value: Value,
    pub args: Vec<Value>,
}

/// Signature of one contract method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    name: String,
    return_type: String,
    parameter_types: Vec<String>,
    by_ref: Vec<bool>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: <() as WireType>::wire_name(),
            parameter_types: Vec::new(),
            by_ref: Vec::new(),
        }
    }

    pub fn param<P: WireType>(self) -> Self {
        self.param_named(P::wire_name())
    }

    /// By-reference parameter: its updated value travels back to the caller
    pub fn out_param<P: WireType>(self) -> Self {
        self.out_param_named(P::wire_name())
    }

    pub fn param_named(mut self, type_name: impl Into<String>) -> Self {
        self.parameter_types.push(type_name.into());
        self.by_ref.push(false);
        self
    }

    pub fn out_param_named(mut self, type_name: impl Into<String>) -> Self {
        self.parameter_types.push(type_name.into());
        self.by_ref.push(true);
        self
    }

    pub fn returns<R: WireType>(self) -> Self {
        self.returns_named(R::wire_name())
    }

    pub fn returns_named(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = type_name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    fn into_descriptor(self, id: u32) -> MethodDescriptor {
        MethodDescriptor {
            id,
            name: self.name,
            return_type: self.return_type,
            parameter_types: self.parameter_types,
            by_ref: self.by_ref,
        }
    }
}

/// A service contract over implementation type `T`
pub struct InterfaceDef<T> {
    key: String,
    methods: Vec<(MethodDef, UnboundThunk<T>)>,
    bases: Vec<InterfaceDef<T>>,
}

impl<T: Send + Sync + 'static> InterfaceDef<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            methods: Vec::new(),
            bases: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Add a synchronous method
    pub fn method<F>(mut self, def: MethodDef, f: F) -> Self
    where
        F: Fn(&T, CallArgs) -> std::result::Result<Invocation, Fault> + Send + Sync + 'static,
    {
        let thunk: UnboundThunk<T> = Box::new(move |target: Arc<T>, args: CallArgs| {
            let result = f(&*target, args);
            Box::pin(futures::future::ready(result))
        });
        self.methods.push((def, thunk));
        self
    }

    /// Add a method whose result is awaited before replying
    pub fn method_async<F, Fut>(mut self, def: MethodDef, f: F) -> Self
    where
        F: Fn(Arc<T>, CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Invocation, Fault>> + Send + 'static,
    {
        let thunk: UnboundThunk<T> = Box::new(move |target: Arc<T>, args: CallArgs| Box::pin(f(target, args)));
        self.methods.push((def, thunk));
        self
    }

    /// Inherit the methods of another contract
    pub fn extends(mut self, base: InterfaceDef<T>) -> Self {
        self.bases.push(base);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(ProtocolError::NotAnInterface(constants::ERR_EMPTY_SERVICE_KEY.into()));
        }
        if self.key.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ProtocolError::NotAnInterface(format!(
                "{}: {:?}",
                constants::ERR_INVALID_SERVICE_KEY,
                self.key
            )));
        }
        if self.method_count() == 0 {
            return Err(ProtocolError::NotAnInterface(format!(
                "{}: {}",
                constants::ERR_NO_METHODS,
                self.key
            )));
        }
        Ok(())
    }

    fn method_count(&self) -> usize {
        self.methods.len() + self.bases.iter().map(|b| b.method_count()).sum::<usize>()
    }

    fn flatten_into(self, seen: &mut HashSet<String>, out: &mut Vec<(MethodDef, UnboundThunk<T>)>) {
        seen.insert(self.key);
        out.extend(self.methods);
        for base in self.bases {
            if !seen.contains(&base.key) {
                base.flatten_into(seen, out);
            }
        }
    }
}

pub struct MethodEntry {
    descriptor: MethodDescriptor,
    thunk: BoundThunk,
}

impl MethodEntry {
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Start the method. Panics raised before the future exists propagate to
    /// the caller, which isolates them at the dispatch boundary.
    pub fn call(&self, args: CallArgs) -> MethodFuture {
        (self.thunk)(args)
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry").field("descriptor", &self.descriptor).finish()
    }
}

/// A registered service: its method table, sync info and implementation
pub struct ServiceInstance {
    key: String,
    key_index: i32,
    methods: Vec<MethodEntry>,
    sync_info: ServiceSyncInfo,
    target: Arc<dyn Any + Send + Sync>,
}

impl ServiceInstance {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn key_index(&self) -> i32 {
        self.key_index
    }

    pub fn sync_info(&self) -> &ServiceSyncInfo {
        &self.sync_info
    }

    pub fn method(&self, id: i32) -> Option<&MethodEntry> {
        usize::try_from(id).ok().and_then(|i| self.methods.get(i))
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodEntry> {
        self.methods.iter()
    }

    pub fn compression(&self) -> CompressionPolicy {
        CompressionPolicy::new(self.sync_info.use_compression, self.sync_info.compression_threshold)
    }

    /// The implementation object, if it is a `T`
    pub fn target<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.target).downcast::<T>().ok()
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("key", &self.key)
            .field("key_index", &self.key_index)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// All services of one host. Frozen into an `Arc` once the host is built.
pub struct ServiceRegistry {
    services: Vec<ServiceInstance>,
    keys: HashMap<String, i32>,
    use_compression: bool,
    compression_threshold: usize,
    format: SerializationFormat,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::with_config(&HostConfig::default())
    }

    /// Registry whose services advertise the host's compression settings
    pub fn with_config(config: &HostConfig) -> Self {
        Self {
            services: Vec::new(),
            keys: HashMap::new(),
            use_compression: config.use_compression,
            compression_threshold: config.effective_compression_threshold(),
            format: config.serialization,
        }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    /// Register `target` under `interface`.
    ///
    /// # Errors
    /// `DuplicateService` if the key is taken, `NotAnInterface` if the
    /// contract has an invalid key or no methods.
    pub fn register<T: Send + Sync + 'static>(&mut self, interface: InterfaceDef<T>, target: T) -> Result<i32> {
        self.register_arc(interface, Arc::new(target))
    }

    pub fn register_arc<T: Send + Sync + 'static>(&mut self, interface: InterfaceDef<T>, target: Arc<T>) -> Result<i32> {
        interface.validate()?;
        if self.keys.contains_key(&interface.key) {
            return Err(ProtocolError::DuplicateService(interface.key));
        }

        let key_index = i32::try_from(self.services.len())
            .map_err(|_| ProtocolError::ConfigError("too many services".into()))?;
        let key = interface.key.clone();

        let mut flat = Vec::new();
        interface.flatten_into(&mut HashSet::new(), &mut flat);

        let mut methods = Vec::with_capacity(flat.len());
        for (id, (def, thunk)) in flat.into_iter().enumerate() {
            let id = u32::try_from(id).map_err(|_| ProtocolError::ConfigError("too many methods".into()))?;
            let bound_target = Arc::clone(&target);
            methods.push(MethodEntry {
                descriptor: def.into_descriptor(id),
                thunk: Box::new(move |args: CallArgs| thunk(Arc::clone(&bound_target), args)),
            });
        }

        let sync_info = ServiceSyncInfo {
            service_key_index: key_index,
            use_compression: self.use_compression,
            compression_threshold: self.compression_threshold,
            methods: methods.iter().map(|m| m.descriptor.clone()).collect(),
        };

        debug!(service = %key, methods = methods.len(), "Registered method table");
        info!(service = %key, key_index, "Service registered");

        self.keys.insert(key.clone(), key_index);
        self.services.push(ServiceInstance {
            key,
            key_index,
            methods,
            sync_info,
            target,
        });
        Ok(key_index)
    }

    pub fn key_index(&self, key: &str) -> Option<i32> {
        self.keys.get(key).copied()
    }

    pub fn service(&self, key_index: i32) -> Option<&ServiceInstance> {
        usize::try_from(key_index).ok().and_then(|i| self.services.get(i))
    }

    pub fn service_by_key(&self, key: &str) -> Option<&ServiceInstance> {
        self.key_index(key).and_then(|i| self.service(i))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|s| s.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services)
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Calc;

    fn base() -> InterfaceDef<Calc> {
        InterfaceDef::new("Demo.IBase")
            .method(MethodDef::new("Ping").returns::<bool>(), |_: &Calc, args| args.returning(true))
            .method(MethodDef::new("Add").param::<i32>().param::<i32>().returns::<i32>(), |_: &Calc, args| {
                let sum = args.get::<i32>(0)? + args.get::<i32>(1)?;
                args.returning(sum)
            })
    }

    fn calc() -> InterfaceDef<Calc> {
        InterfaceDef::new("Demo.ICalc")
            .method(MethodDef::new("Min").param::<i32>().param::<i32>().returns::<i32>(), |_: &Calc, args| {
                let (a, b) = (args.get::<i32>(0)?, args.get::<i32>(1)?);
                args.returning(a.min(b))
            })
            .method(MethodDef::new("Add").param::<i32>().param::<i32>().returns::<i32>(), |_: &Calc, args| {
                args.returning(0)
            })
            .extends(base())
    }

    #[test]
    fn test_method_ids_own_then_inherited() {
        let mut registry = ServiceRegistry::new();
        let index = registry.register(calc(), Calc).unwrap();
        let info = registry.service(index).unwrap().sync_info().clone();

        let names: Vec<_> = info.methods.iter().map(|m| (m.id, m.name.as_str())).collect();
        // The base Add is listed again under its own id.
        assert_eq!(names, vec![(0, "Min"), (1, "Add"), (2, "Ping"), (3, "Add")]);
    }

    #[tokio::test]
    async fn test_redeclared_method_keeps_both_thunks() {
        let mut registry = ServiceRegistry::new();
        let index = registry.register(calc(), Calc).unwrap();
        let service = registry.service(index).unwrap();
        let args = || CallArgs::new(vec![Value::Int(2), Value::Int(3)], SerializationFormat::Bincode);

        let derived = service.method(1).unwrap().call(args()).await.unwrap();
        assert_eq!(derived.return_value, Value::Int(0));
        let inherited = service.method(3).unwrap().call(args()).await.unwrap();
        assert_eq!(inherited.return_value, Value::Int(5));
    }

    #[test]
    fn test_shared_base_listed_once() {
        fn left() -> InterfaceDef<Calc> {
            InterfaceDef::new("Demo.ILeft")
                .method(MethodDef::new("Left"), |_: &Calc, a| a.returning_unit())
                .extends(base())
        }
        fn right() -> InterfaceDef<Calc> {
            InterfaceDef::new("Demo.IRight")
                .method(MethodDef::new("Right"), |_: &Calc, a| a.returning_unit())
                .extends(base())
        }
        let both = InterfaceDef::new("Demo.IBoth").extends(left()).extends(right());

        let mut registry = ServiceRegistry::new();
        let index = registry.register(both, Calc).unwrap();
        let info = registry.service(index).unwrap().sync_info();
        let names: Vec<_> = info.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Left", "Ping", "Add", "Right"]);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = ServiceRegistry::new();
        registry.register(calc(), Calc).unwrap();
        assert!(matches!(
            registry.register(calc(), Calc),
            Err(ProtocolError::DuplicateService(key)) if key == "Demo.ICalc"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_not_an_interface() {
        let mut registry = ServiceRegistry::new();
        let empty: InterfaceDef<Calc> = InterfaceDef::new("Demo.IEmpty");
        assert!(matches!(registry.register(empty, Calc), Err(ProtocolError::NotAnInterface(_))));

        let unnamed = InterfaceDef::new("").method(MethodDef::new("X"), |_: &Calc, a| a.returning_unit());
        assert!(matches!(registry.register(unnamed, Calc), Err(ProtocolError::NotAnInterface(_))));

        let spaced = InterfaceDef::new("Demo ICalc").method(MethodDef::new("X"), |_: &Calc, a| a.returning_unit());
        assert!(matches!(registry.register(spaced, Calc), Err(ProtocolError::NotAnInterface(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sync_info_carries_compression_settings() {
        let config = HostConfig {
            use_compression: true,
            compression_threshold: 10,
            ..HostConfig::default()
        };
        let mut registry = ServiceRegistry::with_config(&config);
        let index = registry.register(calc(), Calc).unwrap();
        let info = registry.service(index).unwrap().sync_info();
        assert!(info.use_compression);
        assert_eq!(info.compression_threshold, crate::config::MIN_COMPRESSION_THRESHOLD);
    }

    #[tokio::test]
    async fn test_out_param_written_back() {
        struct Splitter;
        let iface = InterfaceDef::new("Demo.ISplit").method(
            MethodDef::new("Split").param::<i32>().out_param::<i32>().returns::<i32>(),
            |_: &Splitter, mut args| {
                let n = args.get::<i32>(0)?;
                args.set(1, n % 10);
                args.returning(n / 10)
            },
        );
        let mut registry = ServiceRegistry::new();
        let index = registry.register(iface, Splitter).unwrap();
        let service = registry.service(index).unwrap();
        let entry = service.method(0).unwrap();
        assert_eq!(entry.descriptor().by_ref, vec![false, true]);

        let result = entry
            .call(CallArgs::new(vec![Value::Int(47), Value::Null], SerializationFormat::Bincode))
            .await
            .unwrap();
        assert_eq!(result.return_value, Value::Int(4));
        assert_eq!(result.args[1], Value::Int(7));
    }

    #[tokio::test]
    async fn test_argument_mismatch_is_a_fault() {
        let mut registry = ServiceRegistry::new();
        let index = registry.register(calc(), Calc).unwrap();
        let entry = registry.service(index).unwrap().method(0).unwrap();

        let fault = entry
            .call(CallArgs::new(
                vec![Value::String("x".into()), Value::Int(1)],
                SerializationFormat::Bincode,
            ))
            .await
            .unwrap_err();
        assert_eq!(fault.type_name, "ArgumentMismatch");
    }

    #[test]
    fn test_dropping_registry_disposes_targets() {
        struct Tracked(Arc<AtomicBool>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let iface = InterfaceDef::new("Demo.ITracked").method(MethodDef::new("Noop"), |_: &Tracked, a| a.returning_unit());
        let mut registry = ServiceRegistry::new();
        let index = registry.register(iface, Tracked(Arc::clone(&dropped))).unwrap();
        assert!(registry.service(index).unwrap().target::<Tracked>().is_some());

        assert!(!dropped.load(Ordering::SeqCst));
        drop(registry);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_fault_from_error_keeps_source_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let outer = ProtocolError::Io(inner);
        let fault = Fault::from_error(&outer);
        assert_eq!(fault.type_name, "ProtocolError");
        assert!(fault.message.contains("disk gone"));
    }

    #[test]
    fn test_panic_payload_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        let fault = Fault::from_panic(payload);
        assert_eq!(fault.type_name, "panic");
        assert_eq!(fault.message, "boom");
    }
}
