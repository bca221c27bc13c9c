//! # Host
//!
//! Accepts connections on an [`Endpoint`] and runs one task per connection.
//! Each task alternates strictly between reading a request and writing its
//! reply:
//!
//! ```text
//! AwaitingMessageType ─▶ { ZkInitiate, ZkProof } ─▶ SyncInterface ─▶ MethodInvocation*
//!          ▲                                                              │
//!          └──────────────────────────────────────────────────────────────┘
//! TerminateConnection, framing errors or auth failures end the connection.
//! ```
//!
//! When the host has a [`ZkRepository`], sync and invocation requests are
//! only served after the handshake and travel sealed under the session key.
//!
//! ## Shutdown
//! [`HostHandle::shutdown`] stops accepting and closes connections that are
//! waiting for their next request. Calls already in progress get up to the
//! configured shutdown timeout to finish, then are aborted. The registry
//! (and with it every service implementation) is dropped once the last
//! connection is gone.

use crate::config::{HostConfig, TransportConfig};
use crate::core::reader::WireRead;
use crate::core::serialization::{PassthroughResolver, TypeResolver};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::handshake::{encode_rejection, ZkInitiate, ZkProof, ZkSessionState};
use crate::protocol::message::{read_invocation, read_message_type, InvocationResult, MessageType, Payload, RemoteFault};
use crate::protocol::zk_repository::ZkRepository;
use crate::service::registry::{Fault, ServiceRegistry};
use crate::transport::{DuplexPipe, Endpoint, Listener};
use crate::utils::buffer_pool::{BufferLease, BufferPool};
use crate::utils::metrics::HostStats;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

enum Flow {
    Continue,
    Stop,
}

struct HostShared {
    dispatcher: Dispatcher,
    config: HostConfig,
    transport: TransportConfig,
    repository: Option<Arc<dyn ZkRepository>>,
    resolver: Arc<dyn TypeResolver>,
    buffers: BufferPool,
}

/// An RPC host over a frozen service registry
#[derive(Clone)]
pub struct Host {
    shared: Arc<HostShared>,
    stats: Arc<HostStats>,
    shutdown: CancellationToken,
}

/// Builder; registration is finished once [`HostBuilder::build`] runs
pub struct HostBuilder {
    registry: ServiceRegistry,
    config: HostConfig,
    transport: TransportConfig,
    repository: Option<Arc<dyn ZkRepository>>,
    resolver: Arc<dyn TypeResolver>,
    stats: Arc<HostStats>,
}

impl HostBuilder {
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Require the zero-knowledge handshake against `repository`
    pub fn repository(mut self, repository: Arc<dyn ZkRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn stats(mut self, stats: Arc<HostStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn build(self) -> Host {
        let registry = Arc::new(self.registry);
        Host {
            shared: Arc::new(HostShared {
                dispatcher: Dispatcher::new(registry, Arc::clone(&self.stats)),
                config: self.config,
                transport: self.transport,
                repository: self.repository,
                resolver: self.resolver,
                buffers: BufferPool::default(),
            }),
            stats: self.stats,
            shutdown: CancellationToken::new(),
        }
    }
}

impl Host {
    pub fn builder(registry: ServiceRegistry) -> HostBuilder {
        HostBuilder {
            registry,
            config: HostConfig::default(),
            transport: TransportConfig::default(),
            repository: None,
            resolver: Arc::new(PassthroughResolver),
            stats: Arc::new(HostStats::new()),
        }
    }

    pub fn new(registry: ServiceRegistry, config: HostConfig) -> Self {
        Self::builder(registry).config(config).build()
    }

    pub fn stats(&self) -> Arc<HostStats> {
        Arc::clone(&self.stats)
    }

    pub fn requires_authentication(&self) -> bool {
        self.shared.repository.is_some()
    }

    pub fn registry(&self) -> &ServiceRegistry {
        self.shared.dispatcher.registry()
    }

    /// Bind `endpoint` and serve in the background
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn bind(self, endpoint: &Endpoint) -> Result<HostHandle> {
        let listener = Listener::bind(endpoint).await?;
        let local = listener.local_endpoint()?;
        let shutdown = self.shutdown.clone();
        let stats = self.stats();
        let task = tokio::spawn(self.accept_loop(listener));

        info!(endpoint = %local, "Host open");
        Ok(HostHandle {
            endpoint: local,
            shutdown,
            task,
            stats,
        })
    }

    /// Bind `endpoint` and serve until Ctrl+C
    pub async fn run_until_ctrl_c(self, endpoint: &Endpoint) -> Result<()> {
        let handle = self.bind(endpoint).await?;
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        handle.shutdown().await
    }

    async fn accept_loop(self, mut listener: Listener) {
        let mut connections = JoinSet::new();
        let max_connections = self.shared.config.max_connections.max(1);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Host no longer accepting connections");
                    break;
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Connection task panicked");
                        }
                    }
                }
                accepted = listener.accept(&self.shared.transport) => {
                    match accepted {
                        Ok(pipe) => {
                            if connections.len() >= max_connections {
                                warn!(peer = %pipe.peer(), max_connections, "Connection limit reached, dropping client");
                                drop(pipe);
                                continue;
                            }
                            let host = self.clone();
                            connections.spawn(async move { host.serve_connection(pipe).await });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept failed");
                        }
                    }
                }
            }
        }

        drop(listener);

        if !connections.is_empty() {
            info!(active = connections.len(), "Waiting for connections to close");
            let drained = tokio::time::timeout(self.shared.config.shutdown_timeout, async {
                while connections.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(remaining = connections.len(), "Shutdown timeout reached, aborting connections");
                connections.shutdown().await;
            }
        }

        self.stats.log_stats();
    }

    /// Serve one already-established connection until it ends
    #[instrument(skip(self, pipe), fields(peer = %pipe.peer()))]
    pub async fn serve_connection(&self, mut pipe: DuplexPipe) {
        self.stats.connection_opened();
        debug!("Connection opened");

        let mut session = ZkSessionState::new();
        loop {
            // Idle connections end on shutdown; a request already being read runs to completion.
            let message_type = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Host shutting down, closing idle connection");
                    break;
                }
                read = read_message_type(&mut pipe) => read,
            };
            let outcome = match message_type {
                Ok(message_type) => self.process_request(message_type, &mut pipe, &mut session).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(ProtocolError::ConnectionClosed) => {
                    debug!("Peer closed the connection");
                    break;
                }
                Err(e) => {
                    self.stats.protocol_error();
                    warn!(error = %e, "Terminating connection");
                    break;
                }
            }
        }

        if let Err(e) = pipe.close().await {
            debug!(error = %e, "Close did not complete cleanly");
        }
        self.stats.connection_closed();
        debug!("Connection closed");
    }

    async fn process_request(
        &self,
        message_type: MessageType,
        pipe: &mut DuplexPipe,
        session: &mut ZkSessionState,
    ) -> Result<Flow> {
        match message_type {
            MessageType::ZkInitiate => self.process_zk_initiate(pipe, session).await,
            MessageType::ZkProof => self.process_zk_proof(pipe, session).await,
            MessageType::SyncInterface => {
                if !self.authorized(session) {
                    return Ok(Flow::Stop);
                }
                self.process_sync(pipe, session).await
            }
            MessageType::MethodInvocation => {
                if !self.authorized(session) {
                    return Ok(Flow::Stop);
                }
                self.process_invocation(pipe, session).await
            }
            MessageType::TerminateConnection => {
                debug!("Client requested termination");
                Ok(Flow::Stop)
            }
            other => Err(ProtocolError::UnexpectedMessage(other.as_i32())),
        }
    }

    fn authorized(&self, session: &ZkSessionState) -> bool {
        if self.requires_authentication() && !session.is_established() {
            warn!(phase = ?session.phase(), "{}", constants::ERR_AUTH_REQUIRED);
            return false;
        }
        true
    }

    async fn send(&self, pipe: &mut DuplexPipe, out: BufferLease) -> Result<()> {
        pipe.write_bytes(out.into_bytes()).await
    }

    async fn reject(&self, pipe: &mut DuplexPipe) -> Result<Flow> {
        self.stats.handshake_failed();
        let mut out = self.shared.buffers.acquire();
        encode_rejection(&mut out);
        self.send(pipe, out).await?;
        Ok(Flow::Stop)
    }

    async fn process_zk_initiate(&self, pipe: &mut DuplexPipe, session: &mut ZkSessionState) -> Result<Flow> {
        let initiate = ZkInitiate::read(pipe).await?;
        self.stats.handshake_attempt();

        let Some(repository) = self.shared.repository.as_deref() else {
            warn!(username = %initiate.username, "Handshake requested but host has no repository");
            return self.reject(pipe).await;
        };

        match session.on_initiate(repository, &initiate) {
            Ok(challenge) => {
                let mut out = self.shared.buffers.acquire();
                challenge.encode(&mut out);
                self.send(pipe, out).await?;
                Ok(Flow::Continue)
            }
            Err(e) => {
                warn!(username = %initiate.username, error = %e, "Handshake rejected");
                self.reject(pipe).await
            }
        }
    }

    async fn process_zk_proof(&self, pipe: &mut DuplexPipe, session: &mut ZkSessionState) -> Result<Flow> {
        let proof = ZkProof::read(pipe).await?;
        match session.on_proof(&proof) {
            Ok(confirmation) => {
                let mut out = self.shared.buffers.acquire();
                confirmation.encode(&mut out);
                self.send(pipe, out).await?;
                info!("Session established");
                Ok(Flow::Continue)
            }
            Err(e) => {
                warn!(error = %e, "Proof rejected");
                self.reject(pipe).await
            }
        }
    }

    async fn process_sync(&self, pipe: &mut DuplexPipe, session: &ZkSessionState) -> Result<Flow> {
        let payload = Payload::from_session(session.cipher());
        let key = match payload {
            Payload::Clear => pipe.read_string().await?,
            Payload::Sealed(_) => {
                let sealed = pipe.read_len_prefixed().await?;
                String::from_utf8(payload.open_block(&sealed)?)
                    .map_err(|_| ProtocolError::malformed(constants::ERR_INVALID_UTF8))?
            }
        };

        let mut out = self.shared.buffers.acquire();
        match self.shared.dispatcher.sync(&key)? {
            Some(bytes) => payload.put_block(&mut out, &bytes)?,
            None => out.extend_from_slice(&0i32.to_le_bytes()),
        }
        self.send(pipe, out).await?;
        Ok(Flow::Continue)
    }

    async fn process_invocation(&self, pipe: &mut DuplexPipe, session: &ZkSessionState) -> Result<Flow> {
        let payload = Payload::from_session(session.cipher());
        let envelope = read_invocation(pipe, payload, self.shared.resolver.as_ref()).await?;
        let policy = self.shared.dispatcher.compression_for(envelope.service_key_index);

        let result = self.shared.dispatcher.dispatch(envelope).await;

        let mut out = self.shared.buffers.acquire();
        out.extend_from_slice(&MessageType::from(result.kind()).to_le_bytes());
        match result {
            InvocationResult::Returned(slots) => {
                let start = out.len();
                if let Err(e) = payload.put_parameters(&mut out, &slots, policy) {
                    // The return value could not be encoded; report it as a fault.
                    warn!(error = %e, "Failed to encode return values");
                    out.truncate(start - 4);
                    out.extend_from_slice(&MessageType::ThrowException.to_le_bytes());
                    let fault = RemoteFault::from(Fault::from(e));
                    payload.put_parameters(&mut out, &fault.to_values(), policy)?;
                }
            }
            InvocationResult::Faulted(fault) => {
                payload.put_parameters(&mut out, &fault.to_values(), policy)?;
            }
            InvocationResult::UnknownMethod => {}
        }
        self.send(pipe, out).await?;
        Ok(Flow::Continue)
    }
}

/// A running host
pub struct HostHandle {
    endpoint: Endpoint,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    stats: Arc<HostStats>,
}

impl HostHandle {
    /// The bound endpoint; for `127.0.0.1:0` this carries the assigned port
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn stats(&self) -> Arc<HostStats> {
        Arc::clone(&self.stats)
    }

    /// Stop accepting and wait for the accept loop to drain connections
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| ProtocolError::Io(std::io::Error::other(e.to_string())))?;
        info!("Host closed");
        Ok(())
    }
}
