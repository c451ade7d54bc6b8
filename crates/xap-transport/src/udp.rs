//! UDP broadcast socket

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{Result, TransportError};

/// First pause after a receive error
const MIN_ERROR_BACKOFF: Duration = Duration::from_millis(10);
/// Longest pause between failing receives
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Output of the receive task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A datagram and its sender
    Data(Bytes, SocketAddr),
    /// A receive error; the task keeps receiving after a pause
    Error(String),
}

/// A bound UDP socket with broadcast enabled
#[derive(Debug, Clone)]
pub struct XapSocket {
    socket: Arc<UdpSocket>,
    max_packet_size: usize,
}

impl XapSocket {
    /// Bind to a local address and enable broadcast
    pub async fn bind(addr: SocketAddr, max_packet_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TransportError::Bind(format!("{}: {}", addr, e)))?;
        socket.set_broadcast(true).map_err(TransportError::Io)?;

        if let Ok(local) = socket.local_addr() {
            info!("xAP socket bound to {}", local);
        }

        Ok(Self {
            socket: Arc::new(socket),
            max_packet_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(TransportError::Io)
    }

    /// Spawn a task forwarding every received datagram into a channel.
    /// The task ends when the receiver is dropped or aborted.
    pub fn start_receiver(&self) -> (mpsc::Receiver<SocketEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(100);
        let socket = self.socket.clone();
        let max_size = self.max_packet_size;

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; max_size];
            let mut backoff = None;

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        backoff = None;
                        debug!("UDP received {} bytes from {}", len, from);
                        let data = Bytes::copy_from_slice(&buf[..len]);
                        if tx.send(SocketEvent::Data(data, from)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("UDP receive error: {}", e);
                        if tx.send(SocketEvent::Error(e.to_string())).await.is_err() {
                            break;
                        }
                        let pause = next_backoff(backoff);
                        backoff = Some(pause);
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        });

        (rx, task)
    }

    /// Send one datagram
    pub async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        if data.len() > self.max_packet_size {
            return Err(TransportError::Send(format!(
                "{} byte message exceeds the {} byte packet limit",
                data.len(),
                self.max_packet_size
            )));
        }
        self.socket
            .send_to(data, target)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(())
    }
}

/// Pause after a receive error: doubles on each consecutive error, capped
fn next_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => MIN_ERROR_BACKOFF,
        Some(pause) => (pause * 2).min(MAX_ERROR_BACKOFF),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut pause = next_backoff(None);
        assert_eq!(pause, MIN_ERROR_BACKOFF);
        pause = next_backoff(Some(pause));
        assert_eq!(pause, MIN_ERROR_BACKOFF * 2);
        for _ in 0..20 {
            pause = next_backoff(Some(pause));
        }
        assert_eq!(pause, MAX_ERROR_BACKOFF);
    }

    #[tokio::test]
    async fn test_receiver_forwards_datagrams() {
        let socket = XapSocket::bind("127.0.0.1:0".parse().unwrap(), 1024)
            .await
            .unwrap();
        let local = socket.local_addr().unwrap();
        let (mut rx, task) = socket.start_receiver();

        socket.send_to(b"hello", local).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, SocketEvent::Data(Bytes::from_static(b"hello"), local));

        // Oversize datagrams are refused before reaching the socket
        assert!(matches!(
            socket.send_to(&[0u8; 2048], local).await,
            Err(TransportError::Send(_))
        ));

        // The task stops once the receiver is gone
        drop(rx);
        socket.send_to(b"bye", local).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
