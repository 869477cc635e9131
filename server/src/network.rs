//! UDP transport in front of the match core.
//!
//! Clients send bincode-encoded [`Request`]s; the server answers with
//! bincode-encoded [`Notification`]s. The transport owns the address book
//! (who is behind which socket address) and the silence timeout; everything
//! game-related is delegated to the [`MatchRegistry`].

use crate::observer::ChannelObserver;
use crate::registry::MatchRegistry;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Notification, Request};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to the main server loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        request: Request,
        addr: SocketAddr,
    },
    ClientTimeout {
        addr: SocketAddr,
        username: String,
        match_name: String,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages queued for the outbound socket task.
#[derive(Debug)]
enum OutboundMessage {
    Send {
        note: Notification,
        addr: SocketAddr,
    },
}

#[derive(Debug, Clone)]
struct ClientLink {
    username: String,
    match_name: String,
    last_seen: Instant,
}

/// Address book mapping socket addresses to joined players.
#[derive(Debug)]
struct ClientLinks {
    map: HashMap<SocketAddr, ClientLink>,
    timeout: Duration,
}

impl ClientLinks {
    fn new(timeout: Duration) -> Self {
        Self {
            map: HashMap::new(),
            timeout,
        }
    }

    fn register(&mut self, addr: SocketAddr, username: &str, match_name: &str) {
        self.map.insert(
            addr,
            ClientLink {
                username: username.to_string(),
                match_name: match_name.to_string(),
                last_seen: Instant::now(),
            },
        );
    }

    /// Refreshes the liveness stamp and returns the link, if known.
    fn touch(&mut self, addr: SocketAddr) -> Option<ClientLink> {
        let link = self.map.get_mut(&addr)?;
        link.last_seen = Instant::now();
        Some(link.clone())
    }

    /// Removes and returns every link silent for longer than the timeout.
    fn check_timeouts(&mut self) -> Vec<(SocketAddr, ClientLink)> {
        let now = Instant::now();
        let expired: Vec<SocketAddr> = self
            .map
            .iter()
            .filter(|(_, link)| now.duration_since(link.last_seen) > self.timeout)
            .map(|(addr, _)| *addr)
            .collect();
        expired
            .into_iter()
            .filter_map(|addr| self.map.remove(&addr).map(|link| (addr, link)))
            .collect()
    }

    fn remove(&mut self, addr: &SocketAddr) -> Option<ClientLink> {
        self.map.remove(addr)
    }
}

/// Main server coordinating the socket tasks and the match registry.
pub struct Server {
    socket: Arc<UdpSocket>,
    links: Arc<RwLock<ClientLinks>>,
    registry: MatchRegistry,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        registry: MatchRegistry,
        client_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            links: Arc::new(RwLock::new(ClientLinks::new(client_timeout))),
            registry,
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    /// Spawns the task that continuously listens for incoming datagrams.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(request) = deserialize::<Request>(&buffer[0..len]) {
                            if server_tx
                                .send(ServerMessage::PacketReceived { request, addr })
                                .is_err()
                            {
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize request from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outbound queue onto the socket.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(OutboundMessage::Send { note, addr }) = out_rx.recv().await {
                match serialize(&note) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                    Err(e) => error!("Failed to encode notification: {}", e),
                }
            }
        });
    }

    /// Spawns the task that watches for silent clients.
    fn spawn_timeout_checker(&self) {
        let links = Arc::clone(&self.links);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;
                let timed_out = {
                    let mut links_guard = links.write().await;
                    links_guard.check_timeouts()
                };
                for (addr, link) in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout {
                            addr,
                            username: link.username,
                            match_name: link.match_name,
                        })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    async fn handle_request(&mut self, request: Request, addr: SocketAddr) {
        if let Request::JoinMatch {
            username,
            match_name,
        } = &request
        {
            info!("{} joining '{}' from {}", username, match_name, addr);
            {
                let mut links = self.links.write().await;
                links.register(addr, username, match_name);
            }
            let (observer, mut note_rx) = ChannelObserver::new();
            let out_tx = self.out_tx.clone();
            // Pump the player's notifications out to their address. The
            // pump dies with the channel when the driver replaces the
            // observer or tears the match down.
            tokio::spawn(async move {
                while let Some(note) = note_rx.recv().await {
                    if out_tx.send(OutboundMessage::Send { note, addr }).is_err() {
                        break;
                    }
                }
            });
            self.registry.join(username, match_name, Box::new(observer));
            return;
        }

        let link = {
            let mut links = self.links.write().await;
            links.touch(addr)
        };
        match link {
            Some(link) => {
                if link.username != request.username() {
                    warn!(
                        "{} spoofed a request for {}; dropping",
                        addr,
                        request.username()
                    );
                    return;
                }
                debug!("routing {:?} from {}", request, addr);
                self.registry.route(&link.match_name, request);
            }
            None => warn!("request from unknown address {}", addr),
        }
    }

    async fn handle_timeout(&mut self, addr: SocketAddr, username: String, match_name: String) {
        info!("{} at {} timed out", username, addr);
        self.registry
            .route(&match_name, Request::Deactivate { username });
    }

    /// Main server loop coordinating all transport tasks.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { request, addr }) => {
                    self.handle_request(request, addr).await;
                }
                Some(ServerMessage::ClientTimeout {
                    addr,
                    username,
                    match_name,
                }) => {
                    self.links.write().await.remove(&addr);
                    self.handle_timeout(addr, username, match_name).await;
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
