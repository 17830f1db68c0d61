use std::net::SocketAddr;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::{
    controller::{Signal, SHUTDOWN_BROADCAST},
    internal,
    traits::protocol::{Protocol, SessionHandler},
};

#[derive(Deserialize, Serialize)]
pub struct Listener<Proto: Protocol> {
    #[serde(skip)]
    handler: Proto,
    socket: SocketAddr,
    /// Hostname announced in the capability banner.
    #[serde(default)]
    banner: String,
}

impl<Proto: Protocol> Listener<Proto> {
    pub async fn serve(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.socket).await?;
        self.serve_with(listener).await
    }

    /// Serve on an already bound socket. Tests bind port 0 themselves and
    /// hand the listener over, so they know the address before serving.
    ///
    /// The `sessions` vector is the registry of live dialogs: the accept
    /// loop stays sequential and hands each connection to its own task,
    /// and shutdown joins whatever is still running.
    pub async fn serve_with(&self, listener: TcpListener) -> anyhow::Result<()> {
        let local = listener.local_addr()?;
        internal!(level = INFO, "Listening on {local} for SMTP connections");

        let mut sessions = Vec::default();
        let mut receiver = SHUTDOWN_BROADCAST.subscribe();

        loop {
            tokio::select! {
                sig = receiver.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown)) {
                        internal!(level = INFO, "Listener {local} received shutdown signal, finishing sessions ...");
                        join_all(sessions).await;
                        SHUTDOWN_BROADCAST.send(Signal::Finalised)?;
                        break;
                    }
                }

                connection = listener.accept() => {
                    match connection {
                        Ok((stream, peer)) => {
                            tracing::debug!("Connection received from {peer}");
                            let handler = self.handler.handle(stream, peer, self.banner.clone());
                            sessions.push(tokio::spawn(async move { handler.run().await }));
                        }
                        Err(err) => internal!(level = WARN, "Failed to accept connection: {err}"),
                    }
                }
            }
        }

        Ok(())
    }
}

impl<Proto: Protocol> From<SocketAddr> for Listener<Proto> {
    fn from(socket: SocketAddr) -> Self {
        Self {
            handler: Proto::default(),
            socket,
            banner: String::default(),
        }
    }
}
