//! Process-wide coordinator of shared ports.
//!
//! `PortRegistry` is a cheap handle; clones share one coordinator. All map
//! mutations happen under the coordinator lock. A port's own lock is only
//! taken while the coordinator lock is held, never the other way around.

use crate::error::{HubError, HubResult};
use crate::framing::ExtractionPolicy;
use crate::options::{ResponseFormat, SerialOptions};
use crate::payload::PortData;
use crate::port::{PortSettings, TransportFactory};
use crate::shared_port::{PortHooks, SharedPort};
use crate::sink::{ConnectionId, NotificationSink};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Snapshot of one open port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortStatus {
    pub port_name: String,
    pub listeners: usize,
    pub settings: PortSettings,
    pub format: ResponseFormat,
}

struct RegistryState {
    ports: HashMap<String, Arc<SharedPort>>,
    port_listeners: HashMap<String, HashSet<ConnectionId>>,
    sessions: HashMap<ConnectionId, Arc<dyn NotificationSink>>,
    /// Names of ports that closed themselves.
    closed: Receiver<String>,
}

impl RegistryState {
    fn is_listening(&self, connection: &ConnectionId, port_name: &str) -> bool {
        self.port_listeners
            .get(port_name)
            .is_some_and(|listeners| listeners.contains(connection))
    }

    /// Drop entries of ports that reported closing. A port reopened under the
    /// same name in the meantime is kept.
    fn reap(&mut self) {
        while let Ok(name) = self.closed.try_recv() {
            if self.ports.get(&name).is_some_and(|port| !port.is_open()) {
                self.ports.remove(&name);
                self.port_listeners.remove(&name);
                info!("Shared port [{}] removed from registry", name);
            }
        }
        self.prune_sessions();
    }

    fn prune_sessions(&mut self) {
        let listeners = &self.port_listeners;
        self.sessions
            .retain(|connection, _| listeners.values().any(|set| set.contains(connection)));
    }

    /// Detach `connection` from `port_name`. Returns whether it was attached.
    fn detach(&mut self, connection: &ConnectionId, port_name: &str) -> bool {
        let Some(port) = self.ports.get(port_name).cloned() else {
            return false;
        };

        let mut attached = false;
        if let Some(listeners) = self.port_listeners.get_mut(port_name) {
            attached = listeners.remove(connection);
            if listeners.is_empty() {
                self.port_listeners.remove(port_name);
            }
        }

        if port.remove_subscriber(connection) {
            self.ports.remove(port_name);
            self.port_listeners.remove(port_name);
            info!("Port [{}] closed (last listener removed)", port_name);
        }
        attached
    }
}

struct RegistryShared {
    state: Mutex<RegistryState>,
    closed_tx: Sender<String>,
    factory: Box<dyn TransportFactory>,
    policy: ExtractionPolicy,
    aliases: HashMap<String, String>,
}

/// Builder for [`PortRegistry`].
pub struct RegistryBuilder {
    factory: Box<dyn TransportFactory>,
    policy: ExtractionPolicy,
    aliases: HashMap<String, String>,
}

impl RegistryBuilder {
    pub fn policy(mut self, policy: ExtractionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Let clients refer to `port_name` as `alias`.
    pub fn alias(mut self, alias: impl Into<String>, port_name: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), port_name.into());
        self
    }

    pub fn aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases.extend(aliases);
        self
    }

    pub fn build(self) -> PortRegistry {
        let (closed_tx, closed) = mpsc::channel();
        PortRegistry {
            shared: Arc::new(RegistryShared {
                state: Mutex::new(RegistryState {
                    ports: HashMap::new(),
                    port_listeners: HashMap::new(),
                    sessions: HashMap::new(),
                    closed,
                }),
                closed_tx,
                factory: self.factory,
                policy: self.policy,
                aliases: self.aliases,
            }),
        }
    }
}

/// Maps port names to shared ports and connections to their subscriptions.
#[derive(Clone)]
pub struct PortRegistry {
    shared: Arc<RegistryShared>,
}

impl PortRegistry {
    pub fn new(factory: impl TransportFactory + 'static) -> Self {
        Self::builder(factory).build()
    }

    pub fn builder(factory: impl TransportFactory + 'static) -> RegistryBuilder {
        RegistryBuilder {
            factory: Box::new(factory),
            policy: ExtractionPolicy::default(),
            aliases: HashMap::new(),
        }
    }

    /// System name of `port_name`, after alias lookup.
    pub fn resolve(&self, port_name: &str) -> String {
        self.shared
            .aliases
            .get(port_name)
            .cloned()
            .unwrap_or_else(|| port_name.to_string())
    }

    /// Subscribe `connection` to `port_name`, opening the port if needed.
    ///
    /// Returns `Ok(false)` if the connection was already listening. Joining an
    /// open port fails when an explicitly supplied option disagrees with the
    /// port's applied configuration; the port and its listeners are untouched.
    pub fn start_listening(
        &self,
        connection: &ConnectionId,
        sink: Arc<dyn NotificationSink>,
        port_name: &str,
        options: Option<&SerialOptions>,
    ) -> HubResult<bool> {
        let port_name = self.resolve(port_name);
        let mut state = self.shared.state.lock();
        state.reap();

        if state.is_listening(connection, &port_name) {
            warn!("Connection {} already listening to port [{}]", connection, port_name);
            return Ok(false);
        }

        let existing = state.ports.get(&port_name).filter(|port| port.is_open()).cloned();
        let port = match existing {
            Some(port) => {
                if let Some(options) = options {
                    options.check_join(&port.applied()).map_err(|aspect| {
                        warn!(
                            "Connection {} rejected from port [{}]: different {}",
                            connection, port_name, aspect
                        );
                        HubError::Incompatible {
                            port: port_name.clone(),
                            aspect,
                        }
                    })?;
                }
                port
            }
            None => {
                let transport = self.shared.factory.create(&port_name);
                let port = SharedPort::new(transport, self.hooks(), self.shared.policy);
                port.open(options).map_err(|e| {
                    error!("Failed to open serial port [{}]: {}", port_name, e);
                    HubError::transport(&port_name, e)
                })?;
                state.ports.insert(port_name.clone(), Arc::clone(&port));
                info!("Opened new shared port [{}]", port_name);
                port
            }
        };

        state.sessions.insert(*connection, Arc::clone(&sink));
        port.add_subscriber(*connection, sink);
        state
            .port_listeners
            .entry(port_name.clone())
            .or_default()
            .insert(*connection);

        info!(
            "Connection {} now listening to port [{}], total listeners: {}",
            connection,
            port_name,
            port.listener_count()
        );
        Ok(true)
    }

    /// Unsubscribe `connection` from `port_name`; the port closes with its last listener.
    ///
    /// Returns false if the connection was not listening.
    pub fn stop_listening(&self, connection: &ConnectionId, port_name: &str) -> bool {
        self.detach(connection, &self.resolve(port_name))
    }

    /// Unsubscribe from a port given by its system name.
    fn detach(&self, connection: &ConnectionId, port_name: &str) -> bool {
        let mut state = self.shared.state.lock();
        state.reap();
        let attached = state.detach(connection, port_name);
        state.prune_sessions();
        if !attached {
            debug!("Connection {} was not listening to port [{}]", connection, port_name);
        }
        attached
    }

    /// Unsubscribe `connection` from every port. Returns how many it left.
    pub fn stop_listening_all(&self, connection: &ConnectionId) -> usize {
        let mut state = self.shared.state.lock();
        state.reap();

        let ports: Vec<String> = state
            .port_listeners
            .iter()
            .filter(|(_, listeners)| listeners.contains(connection))
            .map(|(name, _)| name.clone())
            .collect();

        let detached = ports
            .iter()
            .filter(|port_name| state.detach(connection, port_name))
            .count();
        state.sessions.remove(connection);
        detached
    }

    /// Write `data` to a port `connection` is listening to.
    pub fn send_data(
        &self,
        connection: &ConnectionId,
        port_name: &str,
        data: &PortData,
        options: Option<&SerialOptions>,
    ) -> HubResult<usize> {
        let port_name = self.resolve(port_name);
        let port = {
            let mut state = self.shared.state.lock();
            state.reap();
            if !state.is_listening(connection, &port_name) {
                return Err(HubError::NotListening(port_name));
            }
            match state.ports.get(&port_name) {
                Some(port) if port.is_open() => Arc::clone(port),
                _ => return Err(HubError::PortNotOpen(port_name)),
            }
        };
        port.send(data, options)
    }

    pub fn is_listening(&self, connection: &ConnectionId, port_name: &str) -> bool {
        let port_name = self.resolve(port_name);
        let mut state = self.shared.state.lock();
        state.reap();
        state.is_listening(connection, &port_name)
    }

    pub fn listener_count(&self, port_name: &str) -> usize {
        let port_name = self.resolve(port_name);
        let mut state = self.shared.state.lock();
        state.reap();
        state
            .ports
            .get(&port_name)
            .map_or(0, |port| port.listener_count())
    }

    pub fn is_port_open(&self, port_name: &str) -> bool {
        let port_name = self.resolve(port_name);
        let mut state = self.shared.state.lock();
        state.reap();
        state.ports.get(&port_name).is_some_and(|port| port.is_open())
    }

    /// Ports `connection` listens to, sorted by name.
    pub fn ports_for(&self, connection: &ConnectionId) -> Vec<String> {
        let mut state = self.shared.state.lock();
        state.reap();
        let mut ports: Vec<String> = state
            .port_listeners
            .iter()
            .filter(|(_, listeners)| listeners.contains(connection))
            .map(|(name, _)| name.clone())
            .collect();
        ports.sort();
        ports
    }

    /// Names of all open ports, sorted.
    pub fn open_ports(&self) -> Vec<String> {
        let mut state = self.shared.state.lock();
        state.reap();
        let mut ports: Vec<String> = state.ports.keys().cloned().collect();
        ports.sort();
        ports
    }

    /// Number of connections listening to at least one port.
    pub fn connection_count(&self) -> usize {
        let mut state = self.shared.state.lock();
        state.reap();
        state.sessions.len()
    }

    pub fn status(&self, port_name: &str) -> Option<PortStatus> {
        let port_name = self.resolve(port_name);
        let mut state = self.shared.state.lock();
        state.reap();
        let port = state.ports.get(&port_name).filter(|port| port.is_open())?;
        let applied = port.applied();
        Some(PortStatus {
            port_name,
            listeners: port.listener_count(),
            settings: applied.settings,
            format: applied.format,
        })
    }

    /// Close every port and forget all connections.
    pub fn shutdown(&self) {
        let ports: Vec<Arc<SharedPort>> = {
            let mut state = self.shared.state.lock();
            state.port_listeners.clear();
            state.sessions.clear();
            state.ports.drain().map(|(_, port)| port).collect()
        };
        for port in ports {
            port.close();
        }
        info!("Port registry shut down");
    }

    fn hooks(&self) -> PortHooks {
        let closed_tx = self.shared.closed_tx.clone();
        let registry: Weak<RegistryShared> = Arc::downgrade(&self.shared);
        PortHooks {
            on_close: Some(Arc::new(move |port_name: &str| {
                // The registry may already be gone during shutdown.
                let _ = closed_tx.send(port_name.to_string());
            })),
            on_delivery_failure: Some(Arc::new(move |connection: &ConnectionId, port_name: &str| {
                // `port_name` is already the system name; it must not go through aliases again.
                if let Some(shared) = registry.upgrade() {
                    PortRegistry { shared }.detach(connection, port_name);
                }
            })),
        }
    }
}

impl std::fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortRegistry")
            .field("open_ports", &self.open_ports())
            .field("policy", &self.shared.policy)
            .finish()
    }
}
