//! # Unit of work: one accepted connection.
//!
//! A [`Connection`] is owned by exactly one worker at a time. It is handed to the
//! handler by `&mut` and released by the worker with [`Connection::close`], which
//! consumes it, so a unit cannot be released twice.

use std::fmt;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// An accepted client connection.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    peer: Option<SocketAddr>,
    stream: TcpStream,
}

impl Connection {
    /// Wraps an accepted stream. `id` is assigned by the listener (monotonic per bind).
    pub fn new(id: u64, stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self { id, peer, stream }
    }

    /// Listener-assigned sequence number.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address, if the OS still reports one.
    #[inline]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    #[inline]
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    #[inline]
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Releases the connection: flushes and shuts down the write half, then drops the socket.
    ///
    /// Errors are ignored; the peer may already be gone.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "connection #{} from {peer}", self.id),
            None => write!(f, "connection #{}", self.id),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Returns a server-side connection and the matching client stream.
    pub(crate) async fn connected_pair(id: u64) -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (stream, _) = accepted.unwrap();
        (Connection::new(id, stream), client.unwrap())
    }

    #[tokio::test]
    async fn close_delivers_eof_to_peer() {
        let (mut conn, mut client) = connected_pair(7).await;
        assert_eq!(conn.id(), 7);
        assert!(conn.peer().is_some());
        assert!(conn.to_string().starts_with("connection #7 from 127.0.0.1:"));

        conn.stream_mut().write_all(b"bye").await.unwrap();
        conn.close().await;

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"bye");
    }
}
