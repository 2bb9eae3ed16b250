//! Tokio UDP server driving an [`AppleMidiSession`]
//!
//! One task owns the engine and both sockets. It routes datagrams from the
//! control and data sockets into the engine, ticks it every millisecond and
//! executes lifecycle requests arriving through a [`ServerHandle`]. Outbound
//! datagrams use non-blocking `try_send_to`, so the engine never waits on
//! the network; a send that would block is queued and retried once the
//! socket reports writable.

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::traits::{Channel, DatagramSender, MidiEventSink};
use crate::discovery::{AdvertiserConfig, SessionAdvertiser};
use crate::error::{AppleMidiError, Result};
use crate::midi::ChannelMessage;
use crate::session::{AppleMidiSession, PeerView};
use crate::types::SessionConfig;

/// Receive buffer per socket
pub const RECV_BUFFER_SIZE: usize = 2048;

/// Period of the engine tick
pub const TICK_PERIOD: Duration = Duration::from_millis(1);

/// Datagrams held per socket while it is not writable
pub const SEND_BACKLOG_LIMIT: usize = 256;

const COMMAND_QUEUE_DEPTH: usize = 64;
const BIND_ATTEMPTS: usize = 16;

#[derive(Debug, Clone)]
struct Queued {
    destination: SocketAddr,
    bytes: Bytes,
}

/// [`DatagramSender`] over the session's control and data sockets
#[derive(Debug, Clone)]
pub struct UdpSender {
    control: Arc<UdpSocket>,
    data: Arc<UdpSocket>,
    control_backlog: VecDeque<Queued>,
    data_backlog: VecDeque<Queued>,
}

impl UdpSender {
    /// Wrap a bound socket pair
    #[must_use]
    pub fn new(control: Arc<UdpSocket>, data: Arc<UdpSocket>) -> Self {
        Self {
            control,
            data,
            control_backlog: VecDeque::new(),
            data_backlog: VecDeque::new(),
        }
    }

    /// Socket that serves `channel`
    #[must_use]
    pub fn socket(&self, channel: Channel) -> &UdpSocket {
        match channel {
            Channel::Control => &self.control,
            Channel::Data => &self.data,
        }
    }

    /// Datagrams on `channel` waiting for the socket to become writable
    #[must_use]
    pub fn pending(&self, channel: Channel) -> usize {
        match channel {
            Channel::Control => self.control_backlog.len(),
            Channel::Data => self.data_backlog.len(),
        }
    }

    /// Send queued datagrams on `channel` until the socket would block again
    ///
    /// Returns the number of datagrams that left the queue. Datagrams failing
    /// with anything but `WouldBlock` are dropped.
    pub fn retry(&mut self, channel: Channel) -> usize {
        let (socket, backlog) = self.parts(channel);
        let mut sent = 0;
        while let Some(queued) = backlog.front() {
            match socket.try_send_to(&queued.bytes, queued.destination) {
                Ok(_) => sent += 1,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(peer = %queued.destination, %channel, error = %e, "Dropping queued datagram");
                }
            }
            backlog.pop_front();
        }
        if sent > 0 {
            trace!(%channel, sent, left = backlog.len(), "Flushed send backlog");
        }
        sent
    }

    fn parts(&mut self, channel: Channel) -> (&UdpSocket, &mut VecDeque<Queued>) {
        match channel {
            Channel::Control => (&self.control, &mut self.control_backlog),
            Channel::Data => (&self.data, &mut self.data_backlog),
        }
    }
}

impl DatagramSender for UdpSender {
    fn send_datagram(
        &mut self,
        channel: Channel,
        destination: SocketAddr,
        bytes: &[u8],
    ) -> io::Result<usize> {
        let (socket, backlog) = self.parts(channel);
        if backlog.is_empty() {
            match socket.try_send_to(bytes, destination) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                result => return result,
            }
        }

        if backlog.len() >= SEND_BACKLOG_LIMIT {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "send backlog full",
            ));
        }
        backlog.push_back(Queued {
            destination,
            bytes: Bytes::copy_from_slice(bytes),
        });
        trace!(peer = %destination, %channel, queued = backlog.len(), "Socket not writable, datagram queued");
        Ok(bytes.len())
    }
}

/// Bind a control socket and its data socket on `control_port + 1`
///
/// With `control_port` 0 an ephemeral control port is chosen, retrying
/// until the port above it is free as well.
///
/// # Errors
///
/// Returns the bind error, or `AddrInUse` when no adjacent pair was found.
pub async fn bind_pair(ip: IpAddr, control_port: u16) -> io::Result<(UdpSocket, UdpSocket)> {
    if control_port != 0 {
        let data_port = control_port.checked_add(1).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "control port has no data port above it")
        })?;
        let control = UdpSocket::bind(SocketAddr::new(ip, control_port)).await?;
        let data = UdpSocket::bind(SocketAddr::new(ip, data_port)).await?;
        return Ok((control, data));
    }

    for _ in 0..BIND_ATTEMPTS {
        let control = UdpSocket::bind(SocketAddr::new(ip, 0)).await?;
        let Some(data_port) = control.local_addr()?.port().checked_add(1) else {
            continue;
        };
        match UdpSocket::bind(SocketAddr::new(ip, data_port)).await {
            Ok(data) => return Ok((control, data)),
            Err(e) => trace!(port = data_port, error = %e, "Data port taken, retrying"),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        "no free control/data port pair",
    ))
}

enum ServerCommand {
    StartSession {
        slot: usize,
        address: IpAddr,
        control_port: u16,
        reply: oneshot::Sender<Result<()>>,
    },
    TerminateSession {
        slot: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    SendMessage {
        slot: usize,
        bytes: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    Flush {
        slot: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    PeerInfo {
        slot: usize,
        reply: oneshot::Sender<Option<PeerView>>,
    },
    SearchFreeSlot {
        reply: oneshot::Sender<Option<usize>>,
    },
    SetDebugLevel {
        level: u8,
    },
    Shutdown,
}

impl std::fmt::Debug for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StartSession { .. } => "StartSession",
            Self::TerminateSession { .. } => "TerminateSession",
            Self::SendMessage { .. } => "SendMessage",
            Self::Flush { .. } => "Flush",
            Self::PeerInfo { .. } => "PeerInfo",
            Self::SearchFreeSlot { .. } => "SearchFreeSlot",
            Self::SetDebugLevel { .. } => "SetDebugLevel",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Cloneable handle to a running [`AppleMidiServer`]
///
/// Every request fails with `ServerClosed` once the server task is gone.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    commands: mpsc::Sender<ServerCommand>,
    control_port: u16,
    local_ssrc: u32,
}

impl ServerHandle {
    /// Local control port
    #[must_use]
    pub fn control_port(&self) -> u16 {
        self.control_port
    }

    /// Local data port
    #[must_use]
    pub fn data_port(&self) -> u16 {
        self.control_port.wrapping_add(1)
    }

    /// Local synchronization source id
    #[must_use]
    pub fn local_ssrc(&self) -> u32 {
        self.local_ssrc
    }

    /// Whether the server task is still accepting requests
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Invite a peer into `slot`
    ///
    /// # Errors
    ///
    /// See [`AppleMidiSession::start_session`]; `ServerClosed` if the
    /// server stopped.
    pub async fn start_session(&self, slot: usize, peer: SocketAddr) -> Result<()> {
        self.request(|reply| ServerCommand::StartSession {
            slot,
            address: peer.ip(),
            control_port: peer.port(),
            reply,
        })
        .await?
    }

    /// End the session in `slot`
    ///
    /// # Errors
    ///
    /// See [`AppleMidiSession::terminate_session`].
    pub async fn terminate_session(&self, slot: usize) -> Result<()> {
        self.request(|reply| ServerCommand::TerminateSession { slot, reply })
            .await?
    }

    /// Queue raw MIDI bytes for `slot`
    ///
    /// # Errors
    ///
    /// See [`AppleMidiSession::send_message`].
    pub async fn send_message(&self, slot: usize, bytes: impl Into<Bytes>) -> Result<()> {
        let bytes = bytes.into();
        self.request(|reply| ServerCommand::SendMessage { slot, bytes, reply })
            .await?
    }

    /// Queue a channel voice message for `slot`
    ///
    /// # Errors
    ///
    /// See [`AppleMidiSession::send_message`].
    pub async fn send(&self, slot: usize, message: &ChannelMessage) -> Result<()> {
        self.send_message(slot, message.encode()).await
    }

    /// Transmit whatever is buffered for `slot` now
    ///
    /// # Errors
    ///
    /// See [`AppleMidiSession::flush`].
    pub async fn flush(&self, slot: usize) -> Result<()> {
        self.request(|reply| ServerCommand::Flush { slot, reply })
            .await?
    }

    /// Snapshot of a slot
    ///
    /// # Errors
    ///
    /// Returns `ServerClosed` if the server stopped.
    pub async fn peer_info(&self, slot: usize) -> Result<Option<PeerView>> {
        self.request(|reply| ServerCommand::PeerInfo { slot, reply })
            .await
    }

    /// First free remote slot
    ///
    /// # Errors
    ///
    /// Returns `ServerClosed` if the server stopped.
    pub async fn search_free_slot(&self) -> Result<Option<usize>> {
        self.request(|reply| ServerCommand::SearchFreeSlot { reply })
            .await
    }

    /// Change diagnostic verbosity
    ///
    /// # Errors
    ///
    /// Returns `ServerClosed` if the server stopped.
    pub async fn set_debug_level(&self, level: u8) -> Result<()> {
        self.commands
            .send(ServerCommand::SetDebugLevel { level })
            .await
            .map_err(|_| AppleMidiError::ServerClosed)
    }

    /// Stop the server task
    ///
    /// Sessions are not ended; peers notice through missing sync replies.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(ServerCommand::Shutdown).await;
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ServerCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| AppleMidiError::ServerClosed)?;
        rx.await.map_err(|_| AppleMidiError::ServerClosed)
    }
}

/// `AppleMIDI` endpoint on a control/data UDP socket pair
pub struct AppleMidiServer<E> {
    engine: AppleMidiSession<UdpSender, E>,
    control: Arc<UdpSocket>,
    data: Arc<UdpSocket>,
    commands: mpsc::Receiver<ServerCommand>,
    advertiser: Option<SessionAdvertiser>,
}

impl<E: MidiEventSink + Send + 'static> AppleMidiServer<E> {
    /// Bind on all IPv4 interfaces at `config.default_port`
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if either socket cannot be bound.
    pub async fn bind(config: SessionConfig, sink: E) -> Result<(Self, ServerHandle)> {
        Self::bind_addr(config, sink, IpAddr::V4(Ipv4Addr::UNSPECIFIED)).await
    }

    /// Bind on `ip` at `config.default_port` (0 picks a free pair)
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if either socket cannot be bound.
    pub async fn bind_addr(config: SessionConfig, sink: E, ip: IpAddr) -> Result<(Self, ServerHandle)> {
        let (control, data) = bind_pair(ip, config.default_port).await?;
        // try_send_to fails until the reactor has seen each socket writable
        control.writable().await?;
        data.writable().await?;
        let control = Arc::new(control);
        let data = Arc::new(data);
        let control_port = control.local_addr()?.port();

        let sender = UdpSender::new(Arc::clone(&control), Arc::clone(&data));
        let engine = AppleMidiSession::new(config, sender, sink);
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        info!(
            control_port,
            data_port = control_port.wrapping_add(1),
            ssrc = engine.local_ssrc(),
            "AppleMIDI server bound"
        );

        let handle = ServerHandle {
            commands: tx,
            control_port,
            local_ssrc: engine.local_ssrc(),
        };
        let server = Self {
            engine,
            control,
            data,
            commands: rx,
            advertiser: None,
        };
        Ok((server, handle))
    }

    /// Local control port
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.control.local_addr()?)
    }

    /// Advertise the session over mDNS until the server stops
    ///
    /// # Errors
    ///
    /// Returns `Advertiser` if the mDNS daemon cannot register the service.
    pub fn advertise(&mut self) -> Result<()> {
        let port = self.control.local_addr()?.port();
        let config = AdvertiserConfig::from_session(self.engine.config()).with_port(port);
        let mut advertiser = SessionAdvertiser::new(config)?;
        advertiser.register()?;
        self.advertiser = Some(advertiser);
        Ok(())
    }

    /// The engine, for inspection before the server starts
    pub fn engine(&self) -> &AppleMidiSession<UdpSender, E> {
        &self.engine
    }

    /// Run the server on a new task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shut down through a [`ServerHandle`] or all handles are dropped
    pub async fn run(mut self) {
        let mut control_buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut data_buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut ticker = tokio::time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = self.control.recv_from(&mut control_buf) => {
                    match result {
                        Ok((len, src)) => self.dispatch(src, &control_buf[..len], Channel::Control),
                        Err(e) => warn!(error = %e, "Control socket receive failed"),
                    }
                }
                result = self.data.recv_from(&mut data_buf) => {
                    match result {
                        Ok((len, src)) => self.dispatch(src, &data_buf[..len], Channel::Data),
                        Err(e) => warn!(error = %e, "Data socket receive failed"),
                    }
                }
                result = self.control.writable(), if self.engine.sender().pending(Channel::Control) > 0 => {
                    if result.is_ok() {
                        self.engine.sender_mut().retry(Channel::Control);
                    }
                }
                result = self.data.writable(), if self.engine.sender().pending(Channel::Data) > 0 => {
                    if result.is_ok() {
                        self.engine.sender_mut().retry(Channel::Data);
                    }
                }
                _ = ticker.tick() => {
                    self.engine.tick();
                }
                command = self.commands.recv() => {
                    match command {
                        Some(ServerCommand::Shutdown) | None => break,
                        Some(command) => self.execute(command),
                    }
                }
            }
        }

        if let Some(mut advertiser) = self.advertiser.take() {
            if let Err(e) = advertiser.unregister() {
                warn!(error = %e, "Failed to withdraw mDNS service");
            }
        }
        info!("AppleMIDI server stopped");
    }

    fn dispatch(&mut self, source: SocketAddr, datagram: &[u8], channel: Channel) {
        if let Err(e) = self.engine.handle_datagram(source, datagram, channel) {
            trace!(peer = %source, %channel, error = %e, "Datagram dropped");
        }
    }

    fn execute(&mut self, command: ServerCommand) {
        debug!(?command, "Server request");
        match command {
            ServerCommand::StartSession {
                slot,
                address,
                control_port,
                reply,
            } => {
                let _ = reply.send(self.engine.start_session(slot, address, control_port));
            }
            ServerCommand::TerminateSession { slot, reply } => {
                let _ = reply.send(self.engine.terminate_session(slot));
            }
            ServerCommand::SendMessage { slot, bytes, reply } => {
                let _ = reply.send(self.engine.send_message(slot, &bytes));
            }
            ServerCommand::Flush { slot, reply } => {
                let _ = reply.send(self.engine.flush(slot));
            }
            ServerCommand::PeerInfo { slot, reply } => {
                let _ = reply.send(self.engine.peer_info(slot));
            }
            ServerCommand::SearchFreeSlot { reply } => {
                let _ = reply.send(self.engine.search_free_slot());
            }
            ServerCommand::SetDebugLevel { level } => self.engine.set_debug_level(level),
            ServerCommand::Shutdown => {}
        }
    }
}
