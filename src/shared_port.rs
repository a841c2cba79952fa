//! One physical port shared by any number of client connections.
//!
//! A `SharedPort` owns the transport, the receive buffer and the subscriber
//! list. Received chunks are framed and fanned out to a snapshot of the
//! subscribers with no lock held, so sinks may call back into the registry.
//!
//! Lock order: `dispatch`, then `state`, then `transport`. `dispatch` is held
//! only by the reader while framing and delivering, which keeps messages of
//! one port in order.

use crate::buffer::ByteAccumulator;
use crate::error::HubError;
use crate::framing::{extract_messages, ExtractionPolicy};
use crate::options::{AppliedOptions, ResponseFormat, SerialOptions};
use crate::payload::PortData;
use crate::port::{ByteHandler, PortError, PortSettings, Transport};
use crate::sink::{ConnectionId, NotificationSink};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Invoked once after the port closed, with the port name.
pub type CloseHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Invoked when delivering to a connection failed.
pub type DeliveryFailureHook = Arc<dyn Fn(&ConnectionId, &str) + Send + Sync>;

/// Callbacks from a port to its owner.
#[derive(Clone, Default)]
pub struct PortHooks {
    pub on_close: Option<CloseHook>,
    /// Without this hook the port drops the failing subscriber itself.
    pub on_delivery_failure: Option<DeliveryFailureHook>,
}

type Subscriber = (ConnectionId, Arc<dyn NotificationSink>);

struct PortState {
    open: bool,
    settings: PortSettings,
    format: ResponseFormat,
    buffer: ByteAccumulator,
    subscribers: Vec<Subscriber>,
}

pub struct SharedPort {
    name: String,
    state: Mutex<PortState>,
    transport: Mutex<Box<dyn Transport>>,
    dispatch: Mutex<()>,
    hooks: PortHooks,
    policy: ExtractionPolicy,
}

impl SharedPort {
    pub fn new(transport: Box<dyn Transport>, hooks: PortHooks, policy: ExtractionPolicy) -> Arc<Self> {
        Arc::new(Self {
            name: transport.name().to_string(),
            state: Mutex::new(PortState {
                open: false,
                settings: PortSettings::default(),
                format: ResponseFormat::default(),
                buffer: ByteAccumulator::new(),
                subscribers: Vec::new(),
            }),
            transport: Mutex::new(transport),
            dispatch: Mutex::new(()),
            hooks,
            policy,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open the transport and apply the initial configuration.
    ///
    /// Returns `Ok(false)` if the port was already open; the configuration is
    /// left as it was.
    pub fn open(self: &Arc<Self>, options: Option<&SerialOptions>) -> Result<bool, PortError> {
        let mut state = self.state.lock();
        if state.open {
            warn!("Serial port [{}] is already open", self.name);
            return Ok(false);
        }

        let settings = options.and_then(|o| o.port_settings).unwrap_or_default();
        let format = options
            .and_then(|o| o.response_format.clone())
            .unwrap_or_default();

        let weak = Arc::downgrade(self);
        let handler: ByteHandler = Arc::new(move |bytes: &[u8]| {
            if let Some(port) = weak.upgrade() {
                port.on_bytes_available(bytes);
            }
        });

        {
            let mut transport = self.transport.lock();
            transport.open()?;
            let configured = transport
                .apply_port_settings(&settings)
                .and_then(|()| transport.listen(handler));
            if let Err(e) = configured {
                if let Err(close_err) = transport.close() {
                    warn!("Failed to close serial port [{}]: {}", self.name, close_err);
                }
                return Err(e);
            }
        }

        info!(
            "Opened serial port [{}] at {} baud, framing {:?}",
            self.name, settings.baud_rate, format.mode
        );
        state.open = true;
        state.settings = settings;
        state.format = format;
        state.buffer.clear();
        Ok(true)
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Register a sink for `connection`. Returns false if it was already registered.
    pub fn add_subscriber(&self, connection: ConnectionId, sink: Arc<dyn NotificationSink>) -> bool {
        let mut state = self.state.lock();
        if state.subscribers.iter().any(|(id, _)| *id == connection) {
            warn!("Connection {} is already listening to serial port [{}]", connection, self.name);
            return false;
        }
        state.subscribers.push((connection, sink));
        info!(
            "Connection {} listening to serial port [{}] ({} listener(s))",
            connection,
            self.name,
            state.subscribers.len()
        );
        true
    }

    /// Unregister `connection`.
    ///
    /// Returns true if it was the last subscriber, in which case the port is
    /// closed before returning.
    pub fn remove_subscriber(&self, connection: &ConnectionId) -> bool {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| id != connection);
        if state.subscribers.len() == before {
            return false;
        }
        info!(
            "Connection {} stopped listening to serial port [{}] ({} listener(s))",
            connection,
            self.name,
            state.subscribers.len()
        );
        if !state.subscribers.is_empty() {
            return false;
        }

        let closed = self.shutdown(&mut state);
        drop(state);
        if closed {
            self.notify_closed();
        }
        true
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn has_listener(&self, connection: &ConnectionId) -> bool {
        self.state.lock().subscribers.iter().any(|(id, _)| id == connection)
    }

    pub fn listeners(&self) -> Vec<ConnectionId> {
        self.state.lock().subscribers.iter().map(|(id, _)| *id).collect()
    }

    pub fn port_settings(&self) -> PortSettings {
        self.state.lock().settings
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.state.lock().format.clone()
    }

    pub fn applied(&self) -> AppliedOptions {
        let state = self.state.lock();
        AppliedOptions {
            settings: state.settings,
            format: state.format.clone(),
        }
    }

    /// Write `data` to the port.
    ///
    /// Line settings cannot change while the port is shared; overrides are
    /// ignored with a warning. Only the charset may vary per call.
    pub fn send(&self, data: &PortData, options: Option<&SerialOptions>) -> Result<usize, HubError> {
        let encoding = {
            let state = self.state.lock();
            if !state.open {
                return Err(HubError::PortNotOpen(self.name.clone()));
            }
            if let Some(options) = options {
                let differs = options
                    .port_settings
                    .is_some_and(|requested| !requested.same_line(&state.settings));
                if options.line_settings_explicit && differs {
                    warn!(
                        "Port settings of shared serial port [{}] cannot be changed, ignoring them",
                        self.name
                    );
                }
                if options.rx_explicit {
                    warn!("Response format options are ignored when sending to [{}]", self.name);
                }
            }
            options
                .and_then(|o| o.encoding)
                .unwrap_or(state.settings.encoding)
        };

        let bytes = data.to_bytes(encoding).map_err(|source| HubError::Payload {
            port: self.name.clone(),
            source,
        })?;
        debug!("Sending {} byte(s) over [{}]", bytes.len(), self.name);

        self.transport
            .lock()
            .write_bytes(&bytes)
            .map_err(|e| HubError::transport(&self.name, e))
    }

    /// Frame a received chunk and deliver the resulting messages.
    pub fn on_bytes_available(&self, chunk: &[u8]) {
        let _order = self.dispatch.lock();

        let messages: Vec<String> = {
            let mut state = self.state.lock();
            if !state.open {
                return;
            }
            let PortState { format, buffer, .. } = &mut *state;
            buffer.append(chunk);
            extract_messages(&format.mode, buffer, self.policy)
                .iter()
                .map(|bytes| format.encoding.decode(bytes))
                .collect()
        };

        for message in messages {
            debug!("Received from [{}]: {:?}", self.name, message);
            for (connection, sink) in self.snapshot() {
                if let Err(e) = sink.deliver(&self.name, &message) {
                    warn!(
                        "Delivery to connection {} failed for serial port [{}]: {}",
                        connection, self.name, e
                    );
                    self.delivery_failed(&connection);
                }
            }
        }
    }

    /// Close the transport and drop every subscriber. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.subscribers.clear();
        let closed = self.shutdown(&mut state);
        drop(state);
        if closed {
            self.notify_closed();
        }
    }

    fn snapshot(&self) -> Vec<Subscriber> {
        self.state.lock().subscribers.clone()
    }

    fn delivery_failed(&self, connection: &ConnectionId) {
        match &self.hooks.on_delivery_failure {
            Some(hook) => hook(connection, &self.name),
            None => {
                self.remove_subscriber(connection);
            }
        }
    }

    /// Returns true if the port was open.
    fn shutdown(&self, state: &mut PortState) -> bool {
        if !state.open {
            return false;
        }
        state.open = false;
        state.buffer.clear();
        if let Err(e) = self.transport.lock().close() {
            warn!("Failed to close serial port [{}]: {}", self.name, e);
        }
        info!("Closed serial port [{}]", self.name);
        true
    }

    fn notify_closed(&self) {
        if let Some(hook) = &self.hooks.on_close {
            hook(&self.name);
        }
    }
}

impl std::fmt::Debug for SharedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SharedPort")
            .field("name", &self.name)
            .field("open", &state.open)
            .field("listeners", &state.subscribers.len())
            .field("policy", &self.policy)
            .finish()
    }
}
