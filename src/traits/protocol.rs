use std::net::SocketAddr;

use tokio::net::TcpStream;

pub trait SessionHandler {
    fn run(self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

pub trait Protocol: Default + Send + Sync {
    type Session: SessionHandler + Send + Sync + 'static;

    /// Wrap an accepted connection in a session. The session owns the
    /// stream for its entire lifetime; dropping the session is the one
    /// and only close.
    fn handle(&self, stream: TcpStream, peer: SocketAddr, banner: String) -> Self::Session;
}
