//! # Channel
//!
//! Client end of a connection to one service on a host.
//!
//! A channel connects, optionally runs the zero-knowledge handshake, then
//! syncs the service's method table. Calls are made by method id or by name
//! against that table:
//!
//! ```rust,no_run
//! use duplex_rpc::service::channel::{Channel, ChannelOptions};
//! use duplex_rpc::transport::Endpoint;
//! use duplex_rpc::values;
//!
//! # async fn run() -> duplex_rpc::error::Result<()> {
//! let endpoint = Endpoint::parse("127.0.0.1:8098")?;
//! let mut channel = Channel::connect(&endpoint, ChannelOptions::new("Demo.ICalculator")).await?;
//! let min: i32 = channel.call_as("Min", &mut values![3, 9]).await?;
//! assert_eq!(min, 3);
//! channel.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! `invoke` takes `&mut self`: one call is in flight per channel.

use crate::config::{ChannelConfig, TransportConfig};
use crate::core::codec::{put_string, CompressionPolicy};
use crate::core::reader::WireRead;
use crate::core::serialization::{PassthroughResolver, SerializationFormat, TypeResolver};
use crate::core::value::{FromValue, Value};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::descriptor::{MethodDescriptor, ServiceSyncInfo};
use crate::protocol::handshake::{
    client_zk_finalize, client_zk_initiate, client_zk_proof, ZkChallenge, ZkConfirmation,
};
use crate::protocol::message::{
    read_message_type, write_invocation, MessageType, MethodCallEnvelope, Payload, RemoteFault,
};
use crate::transport::{self, DuplexPipe, Endpoint};
use crate::utils::buffer_pool::{BufferLease, BufferPool};
use crate::utils::crypto::Crypto;
use crate::utils::timeout::{with_timeout_error, CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

/// User name and password for the zero-knowledge handshake
#[derive(Clone)]
pub struct ZkCredentials {
    username: String,
    password: Zeroizing<String>,
}

impl ZkCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for ZkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZkCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct ChannelOptions {
    pub service_key: String,
    pub credentials: Option<ZkCredentials>,
    pub connect_timeout: Duration,
    /// Deadline for the handshake and sync that follow the connect
    pub setup_timeout: Duration,
    pub serialization: SerializationFormat,
    pub transport: TransportConfig,
    pub resolver: Arc<dyn TypeResolver>,
}

impl ChannelOptions {
    pub fn new(service_key: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            credentials: None,
            connect_timeout: CONNECT_TIMEOUT,
            setup_timeout: DEFAULT_TIMEOUT,
            serialization: SerializationFormat::default(),
            transport: TransportConfig::default(),
            resolver: Arc::new(PassthroughResolver),
        }
    }

    pub fn from_config(service_key: impl Into<String>, config: &ChannelConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            serialization: config.serialization,
            ..Self::new(service_key)
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(ZkCredentials::new(username, password));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn serialization(mut self, format: SerializationFormat) -> Self {
        self.serialization = format;
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

impl fmt::Debug for ChannelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelOptions")
            .field("service_key", &self.service_key)
            .field("credentials", &self.credentials)
            .field("connect_timeout", &self.connect_timeout)
            .field("serialization", &self.serialization)
            .finish()
    }
}

pub struct Channel {
    pipe: Option<DuplexPipe>,
    service_key: String,
    sync_info: ServiceSyncInfo,
    cipher: Option<Crypto>,
    resolver: Arc<dyn TypeResolver>,
    buffers: BufferPool,
}

impl Channel {
    /// Connect to `endpoint` and bind to `options.service_key`.
    ///
    /// # Errors
    /// `ConnectTimeout`/`ConnectRefused` from the transport,
    /// `AuthenticationFailed` from the handshake, `ServiceNotFound` when the
    /// host has no such service.
    #[instrument(skip(options), fields(endpoint = %endpoint, service = %options.service_key))]
    pub async fn connect(endpoint: &Endpoint, options: ChannelOptions) -> Result<Self> {
        let pipe = transport::connect(endpoint, options.connect_timeout, &options.transport).await?;
        Self::over_pipe(pipe, options).await
    }

    /// Run the handshake and sync over an already connected pipe
    pub async fn over_pipe(mut pipe: DuplexPipe, options: ChannelOptions) -> Result<Self> {
        let buffers = BufferPool::new(4);
        let setup = async {
            let cipher = match &options.credentials {
                Some(credentials) => Some(authenticate(&mut pipe, credentials, &buffers).await?),
                None => None,
            };
            let sync_info = sync(
                &mut pipe,
                &options.service_key,
                cipher.as_ref(),
                options.serialization,
                &buffers,
            )
            .await
            .map_err(|e| match e {
                ProtocolError::ConnectionClosed if options.credentials.is_none() => {
                    ProtocolError::AuthenticationFailed(constants::ERR_AUTH_REQUIRED.into())
                }
                other => other,
            })?;
            Ok::<_, ProtocolError>((cipher, sync_info))
        };

        let (cipher, sync_info) = match with_timeout_error(setup, options.setup_timeout).await {
            Ok(done) => done,
            Err(e) => {
                let _ = pipe.close().await;
                return Err(e);
            }
        };

        info!(
            service = %options.service_key,
            methods = sync_info.methods.len(),
            secure = cipher.is_some(),
            "Channel ready"
        );

        Ok(Self {
            pipe: Some(pipe),
            service_key: options.service_key,
            sync_info,
            cipher,
            resolver: options.resolver,
            buffers,
        })
    }

    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    pub fn sync_info(&self) -> &ServiceSyncInfo {
        &self.sync_info
    }

    pub fn is_connected(&self) -> bool {
        self.pipe.as_ref().is_some_and(|p| p.is_open())
    }

    pub fn is_authenticated(&self) -> bool {
        self.cipher.is_some()
    }

    /// Method id for `name` with exactly these parameter type names
    pub fn method_id(&self, name: &str, parameter_types: &[String]) -> Option<u32> {
        self.sync_info.find_method(name, parameter_types).map(|m| m.id)
    }

    fn resolve_by_name(&self, name: &str, args: &[Value]) -> Result<&MethodDescriptor> {
        if let Some(method) = self.sync_info.find_unique(name) {
            return Ok(method);
        }
        let mut by_arity = self
            .sync_info
            .methods
            .iter()
            .filter(|m| m.name == name && m.parameter_types.len() == args.len());
        match (by_arity.next(), by_arity.next()) {
            (Some(method), None) => Ok(method),
            (None, _) => Err(ProtocolError::RemoteMethodNotFound(format!("{}.{name}", self.service_key))),
            (Some(_), Some(_)) => Err(ProtocolError::ArgumentMismatch(format!(
                "{name} is overloaded; call it by method id"
            ))),
        }
    }

    /// Call a method by name, resolving overloads by argument count
    pub async fn call(&mut self, name: &str, args: &mut [Value]) -> Result<Value> {
        let id = self.resolve_by_name(name, args)?.id;
        self.invoke(id, args).await
    }

    pub async fn call_as<R: FromValue>(&mut self, name: &str, args: &mut [Value]) -> Result<R> {
        R::from_value(self.call(name, args).await?)
    }

    /// Invoke `method_id`. By-ref arguments are overwritten with the values
    /// the host returns.
    ///
    /// # Errors
    /// `RemoteInvocationFailed` when the method faulted (the channel stays
    /// usable), `RemoteMethodNotFound` for an id the host does not know.
    #[instrument(skip(self, args), fields(service = %self.service_key))]
    pub async fn invoke(&mut self, method_id: u32, args: &mut [Value]) -> Result<Value> {
        // Encoding failures leave the connection untouched.
        let request = self.encode_request(method_id, args)?;
        let result = self.round_trip(method_id, request, args).await;
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!(error = %e, "Channel failed, dropping connection");
                self.pipe = None;
            }
        }
        result
    }

    fn encode_request(&self, method_id: u32, args: &[Value]) -> Result<BufferLease> {
        let payload = Payload::from_session(self.cipher.as_ref());
        let policy = CompressionPolicy::new(self.sync_info.use_compression, self.sync_info.compression_threshold);
        let method_index =
            i32::try_from(method_id).map_err(|_| ProtocolError::RemoteMethodNotFound(method_id.to_string()))?;

        let envelope = MethodCallEnvelope {
            service_key_index: self.sync_info.service_key_index,
            method_id: method_index,
            parameters: args.to_vec(),
        };
        let mut out = self.buffers.acquire();
        write_invocation(&mut out, &envelope, payload, policy)?;
        Ok(out)
    }

    async fn round_trip(&mut self, method_id: u32, request: BufferLease, args: &mut [Value]) -> Result<Value> {
        let pipe = self.pipe.as_mut().ok_or(ProtocolError::ConnectionClosed)?;
        let payload = Payload::from_session(self.cipher.as_ref());
        pipe.write_bytes(request.into_bytes()).await?;

        match read_message_type(pipe).await? {
            MessageType::ReturnValues => {
                let mut slots = payload.read_parameters(pipe, self.resolver.as_ref()).await?.into_iter();
                let return_value = slots.next().unwrap_or_default();
                if let Some(method) = self.sync_info.method(method_id) {
                    for ((arg, slot), by_ref) in args.iter_mut().zip(slots).zip(&method.by_ref) {
                        if *by_ref {
                            *arg = slot;
                        }
                    }
                }
                debug!(method_id, "Call returned");
                Ok(return_value)
            }
            MessageType::ThrowException => {
                let values = payload.read_parameters(pipe, self.resolver.as_ref()).await?;
                let fault = RemoteFault::from_values(values)?;
                debug!(method_id, fault = %fault.type_name, "Call faulted");
                Err(fault.into())
            }
            MessageType::UnknownMethod => Err(ProtocolError::RemoteMethodNotFound(format!(
                "{}#{method_id}",
                self.service_key
            ))),
            other => Err(ProtocolError::UnexpectedMessage(other.as_i32())),
        }
    }

    /// Tell the host to end the session, then close the pipe
    #[instrument(skip(self), fields(service = %self.service_key))]
    pub async fn close(mut self) -> Result<()> {
        let Some(mut pipe) = self.pipe.take() else {
            return Ok(());
        };
        if let Err(e) = pipe.write(&MessageType::TerminateConnection.to_le_bytes()).await {
            debug!(error = %e, "Terminate message not delivered");
        }
        pipe.close().await
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("service_key", &self.service_key)
            .field("connected", &self.is_connected())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[instrument(skip(pipe, credentials, buffers), fields(username = %credentials.username))]
async fn authenticate(pipe: &mut DuplexPipe, credentials: &ZkCredentials, buffers: &BufferPool) -> Result<Crypto> {
    let (state, initiate) = client_zk_initiate(&credentials.username, &credentials.password);
    let mut out = buffers.acquire();
    initiate.encode(&mut out)?;
    pipe.write(&out).await?;

    let challenge = ZkChallenge::read(pipe).await.map_err(closed_is_rejection)?;
    let (state, proof) = client_zk_proof(state, &challenge)?;

    out.clear();
    proof.encode(&mut out);
    pipe.write(&out).await?;

    let confirmation = ZkConfirmation::read(pipe).await.map_err(closed_is_rejection)?;
    let key = client_zk_finalize(state, &confirmation)?;
    debug!("Session key established");
    Ok(Crypto::new(&key))
}

fn closed_is_rejection(e: ProtocolError) -> ProtocolError {
    match e {
        ProtocolError::ConnectionClosed => {
            ProtocolError::AuthenticationFailed(constants::ERR_HANDSHAKE_REJECTED.into())
        }
        other => other,
    }
}

async fn sync(
    pipe: &mut DuplexPipe,
    service_key: &str,
    cipher: Option<&Crypto>,
    format: SerializationFormat,
    buffers: &BufferPool,
) -> Result<ServiceSyncInfo> {
    let payload = Payload::from_session(cipher);
    let mut out = buffers.acquire();
    out.extend_from_slice(&MessageType::SyncInterface.to_le_bytes());
    match payload {
        Payload::Clear => put_string(&mut out, service_key)?,
        Payload::Sealed(_) => payload.put_block(&mut out, service_key.as_bytes())?,
    }
    pipe.write_bytes(out.into_bytes()).await?;

    let len = pipe.read_len().await?;
    if len == 0 {
        return Err(ProtocolError::ServiceNotFound(service_key.to_string()));
    }
    let block = pipe.read_bytes(len).await?;
    let bytes = payload.open_block(&block)?;
    ServiceSyncInfo::from_bytes(&bytes, format)
}
