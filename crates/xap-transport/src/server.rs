//! xAP UDP server
//!
//! One task owns the socket's send side, the [`XapHandler`] and every
//! device. It selects over received datagrams, messages queued by devices,
//! heartbeat ticks and commands from [`ServerHandle`]s, so device state is
//! never touched concurrently.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};
use xap_core::{Address, Message, Registry, XAP_PORT};
use xap_device::{Device, Outbox};

use crate::error::{Result, TransportError};
use crate::handler::{DeviceId, XapHandler};
use crate::udp::{SocketEvent, XapSocket};

/// Server configuration
#[derive(Debug, Clone)]
pub struct XapServerConfig {
    /// Local address to receive on
    pub bind_addr: SocketAddr,
    /// Where outbound messages are sent
    pub broadcast_addr: SocketAddr,
    /// Maximum datagram size
    pub max_packet_size: usize,
}

impl Default for XapServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, XAP_PORT)),
            broadcast_addr: SocketAddr::from((Ipv4Addr::BROADCAST, XAP_PORT)),
            max_packet_size: 65507, // Max UDP payload
        }
    }
}

enum Command {
    AddDevice(Box<dyn Device>, oneshot::Sender<DeviceId>),
    RemoveDevice(DeviceId, oneshot::Sender<Option<Box<dyn Device>>>),
    AddReceiver(Address, oneshot::Sender<mpsc::UnboundedReceiver<Message>>),
    Send(Message),
    Shutdown(oneshot::Sender<()>),
}

/// xAP server
pub struct XapServer {
    config: XapServerConfig,
    registry: Arc<Registry>,
}

impl XapServer {
    /// A server that understands heartbeats and BSC messages
    pub fn new(config: XapServerConfig) -> Self {
        Self::with_registry(config, Registry::standard())
    }

    pub fn with_registry(config: XapServerConfig, registry: Registry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    /// Bind the socket and spawn the server loop
    pub async fn start(self) -> Result<ServerHandle> {
        let socket = XapSocket::bind(self.config.bind_addr, self.config.max_packet_size).await?;
        let local_addr = socket.local_addr()?;
        let (datagrams, recv_task) = socket.start_receiver();

        let (outbox, outbound) = Outbox::channel();
        let handler = XapHandler::new(self.registry, outbox);
        let (command_tx, commands) = mpsc::unbounded_channel();

        let event_loop = EventLoop {
            socket,
            broadcast_addr: self.config.broadcast_addr,
            handler,
            timers: HashMap::new(),
        };
        let task = tokio::spawn(event_loop.run(datagrams, recv_task, outbound, commands));

        info!(
            "xAP server on {}, broadcasting to {}",
            local_addr, self.config.broadcast_addr
        );
        Ok(ServerHandle {
            commands: command_tx,
            local_addr,
            task: Arc::new(task),
        })
    }
}

/// Control handle for a running server
#[derive(Clone)]
pub struct ServerHandle {
    commands: mpsc::UnboundedSender<Command>,
    local_addr: SocketAddr,
    task: Arc<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Add a device; it is attached and its heartbeat scheduled
    pub async fn add_device(&self, device: impl Device + 'static) -> Result<DeviceId> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::AddDevice(Box::new(device), tx))?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    /// Remove a device, cancelling its heartbeat, and hand it back
    pub async fn remove_device(&self, id: DeviceId) -> Result<Option<Box<dyn Device>>> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::RemoveDevice(id, tx))?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    /// Receive every message whose source matches `pattern`
    pub async fn add_receiver(&self, pattern: Address) -> Result<mpsc::UnboundedReceiver<Message>> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::AddReceiver(pattern, tx))?;
        rx.await.map_err(|_| TransportError::Closed)
    }

    /// Broadcast a message
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        self.command(Command::Send(message.into()))
    }

    /// Stop the server and detach every device
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.command(Command::Shutdown(tx)).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Closed)
    }
}

struct EventLoop {
    socket: XapSocket,
    broadcast_addr: SocketAddr,
    handler: XapHandler,
    timers: HashMap<DeviceId, JoinHandle<()>>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut datagrams: mpsc::Receiver<SocketEvent>,
        recv_task: JoinHandle<()>,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let (tick_tx, mut ticks) = mpsc::unbounded_channel::<DeviceId>();
        let mut shutdown_ack = None;

        loop {
            tokio::select! {
                Some(event) = datagrams.recv() => match event {
                    SocketEvent::Data(data, from) => {
                        debug!("Datagram of {} bytes from {}", data.len(), from);
                        // Errors are logged by the handler
                        let _ = self.handler.receive_datagram(&data);
                    }
                    SocketEvent::Error(e) => warn!("Socket receive failed: {}", e),
                },
                Some(message) = outbound.recv() => {
                    broadcast(&self.socket, self.broadcast_addr, &message.to_bytes()).await;
                }
                Some(id) = ticks.recv() => {
                    if let Some(payload) = self.handler.heartbeat_payload(id) {
                        broadcast(&self.socket, self.broadcast_addr, &payload).await;
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::AddDevice(device, reply)) => {
                        let interval = device.interval();
                        let id = self.handler.add_device(device);
                        if interval > 0 {
                            self.timers.insert(id, spawn_heartbeat(id, interval, tick_tx.clone()));
                        }
                        let _ = reply.send(id);
                    }
                    Some(Command::RemoveDevice(id, reply)) => {
                        if let Some(timer) = self.timers.remove(&id) {
                            timer.abort();
                        }
                        let _ = reply.send(self.handler.remove_device(id));
                    }
                    Some(Command::AddReceiver(pattern, reply)) => {
                        let _ = reply.send(self.handler.add_receiver(pattern));
                    }
                    Some(Command::Send(message)) => {
                        broadcast(&self.socket, self.broadcast_addr, &message.to_bytes()).await;
                    }
                    Some(Command::Shutdown(ack)) => {
                        shutdown_ack = Some(ack);
                        break;
                    }
                    None => break,
                },
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        recv_task.abort();
        self.handler.detach_all();
        info!("xAP server stopped");

        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }
}

async fn broadcast(socket: &XapSocket, target: SocketAddr, data: &[u8]) {
    if let Err(e) = socket.send_to(data, target).await {
        warn!("Failed to send xAP message: {}", e);
    }
}

/// Tick a device's heartbeat every `interval` seconds, starting one
/// interval from now
fn spawn_heartbeat(
    id: DeviceId,
    interval: u32,
    ticks: mpsc::UnboundedSender<DeviceId>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(u64::from(interval));
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if ticks.send(id).is_err() {
                break;
            }
        }
    })
}
