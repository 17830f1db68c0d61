use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{incoming, internal, traits::fsm::FiniteStateMachine};

use super::{
    channel::{Line, LineChannel},
    command::Command,
    error::ChannelError,
    status::Status,
    State,
};

/// What the dialog has learned from the peer so far. Kept for the log
/// only; nothing is persisted past the session.
#[derive(Debug, Default)]
pub struct Context {
    /// The identity the client offered with HELO/EHLO.
    pub id: String,
    pub mail_from: String,
    pub rcpt_to: String,
    /// Set by the transition function when a line arrived out of
    /// sequence; the session answers it with 503 and clears it.
    pub rejected: Option<String>,
}

/// How collecting a message body ended.
#[derive(Debug, PartialEq, Eq)]
enum Body {
    /// The peer sent the lone `.` terminator.
    Terminated(Vec<String>),
    /// The stream ended first; the session is over.
    Interrupted(Vec<String>),
}

impl Body {
    fn lines(&self) -> &[String] {
        match self {
            Self::Terminated(lines) | Self::Interrupted(lines) => lines,
        }
    }
}

/// One mail-transfer dialog over one connection. The session owns the
/// stream; every exit path releases it exactly once, by drop.
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    peer: SocketAddr,
    banner: String,
    state: State,
    context: Context,
    channel: LineChannel<Stream>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    pub fn create(stream: Stream, peer: SocketAddr, banner: String) -> Self {
        Self {
            peer,
            banner: if banner.is_empty() {
                "localhost".to_owned()
            } else {
                banner
            },
            state: State::default(),
            context: Context::default(),
            channel: LineChannel::new(stream),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        internal!("Connected to {}", self.peer);

        let result = self.converse().await;
        if let Err(err) = &result {
            internal!(level = ERROR, "Session with {} failed: {err}", self.peer);
        }

        internal!("Connection closed");

        Ok(result?)
    }

    /// Drive the fixed command sequence to completion: one line read per
    /// state, a canned reply per accepted command, a 503 for anything out
    /// of order, and a body-collection run after DATA.
    async fn converse(&mut self) -> Result<(), ChannelError> {
        loop {
            let line = match self.channel.read_line().await {
                Ok(line) => line,
                Err(ChannelError::StreamClosed) => return Ok(()),
                Err(err) => return Err(err),
            };

            let at_end = line.is_final();
            let command = Command::from(line.text());
            incoming!("{command}");

            self.state = self.state.transition(command, &mut self.context);

            if let Some(rejected) = self.context.rejected.take() {
                internal!(
                    level = WARN,
                    "Out of sequence command from {}: {rejected}",
                    self.peer
                );
                self.channel
                    .write_line(&format!(
                        "{} Bad sequence of commands",
                        Status::InvalidCommandSequence
                    ))
                    .await?;
            } else {
                self.respond().await?;
            }

            if self.state == State::Quit || at_end {
                return Ok(());
            }

            if self.state == State::Data {
                self.state = State::Reading;

                let body = self.collect_body().await?;
                internal!(
                    "Message from {} ({} line(s)):\n{}",
                    self.peer,
                    body.lines().len(),
                    body.lines().join("\n")
                );

                match body {
                    Body::Interrupted(_) => return Ok(()),
                    Body::Terminated(_) => {
                        self.state = State::DataReceived;
                        self.channel
                            .write_line(&format!("{} OK: Queued", Status::Ok))
                            .await?;
                    }
                }
            }
        }
    }

    /// Read body lines until the lone `.`, which is not part of the body.
    /// End-of-stream counts as an early, terminator-less end.
    async fn collect_body(&mut self) -> Result<Body, ChannelError> {
        let mut lines = Vec::new();

        loop {
            match self.channel.read_line().await {
                Ok(Line::Complete(line)) if line == "." => return Ok(Body::Terminated(lines)),
                Ok(Line::Complete(line)) => lines.push(line),
                Ok(Line::Final(line)) => {
                    if !line.is_empty() {
                        lines.push(line);
                    }
                    return Ok(Body::Interrupted(lines));
                }
                Err(ChannelError::StreamClosed) => return Ok(Body::Interrupted(lines)),
                Err(err) => return Err(err),
            }
        }
    }

    async fn respond(&mut self) -> Result<(), ChannelError> {
        match self.state {
            State::Helo => {
                for line in self.capability_banner() {
                    self.channel.write_line(&line).await?;
                }
            }
            State::MailFrom | State::RcptTo => {
                self.channel
                    .write_line(&format!("{} OK", Status::Ok))
                    .await?;
            }
            State::Data => {
                self.channel
                    .write_line(&format!(
                        "{} End data with <CR><LF>.<CR><LF>",
                        Status::StartMailInput
                    ))
                    .await?;
            }
            State::Quit => {
                self.channel
                    .write_line(&format!("{} Bye", Status::GoodBye))
                    .await?;
            }
            State::Connect | State::Reading | State::DataReceived => {}
        }

        Ok(())
    }

    fn capability_banner(&self) -> Vec<String> {
        vec![
            format!("{}-{} Hello {}", Status::Ok, self.banner, self.context.id),
            format!("{}-SIZE 52428800", Status::Ok),
            format!("{}-8BITMIME", Status::Ok),
            format!("{}-PIPELINING", Status::Ok),
            format!("{}-AUTH LOGIN PLAIN", Status::Ok),
            format!("{}-CHUNKING", Status::Ok),
            format!("{} HELO", Status::Ok),
        ]
    }
}

#[cfg(test)]
mod test {
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    use super::{Body, Session};

    fn peer() -> std::net::SocketAddr {
        "[::]:25".parse().unwrap()
    }

    async fn responses_for(script: &[u8]) -> Vec<String> {
        let (mut client, server) = duplex(4096);
        let session = Session::create(server, peer(), "testing".to_owned());
        let dialog = tokio::spawn(session.run());

        client.write_all(script).await.unwrap();
        client.shutdown().await.unwrap();

        let mut replies = String::new();
        client.read_to_string(&mut replies).await.unwrap();

        dialog.await.unwrap().unwrap();

        replies.lines().map(str::to_owned).collect()
    }

    #[tokio::test]
    async fn full_dialog_in_order() {
        let replies = responses_for(
            b"HELO client.example\r\n\
              MAIL FROM:<a@b.example>\r\n\
              RCPT TO:<c@d.example>\r\n\
              DATA\r\n\
              Subject: hi\r\n\
              hello there\r\n\
              .\r\n\
              QUIT\r\n",
        )
        .await;

        assert_eq!(replies[0], "250-testing Hello client.example");
        assert_eq!(replies[6], "250 HELO");
        assert_eq!(
            &replies[7..],
            [
                "250 OK",
                "250 OK",
                "354 End data with <CR><LF>.<CR><LF>",
                "250 OK: Queued",
                "221 Bye",
            ]
        );
    }

    #[tokio::test]
    async fn out_of_sequence_command_draws_503() {
        let replies = responses_for(b"MAIL FROM:<a@b.example>\r\nQUIT\r\n").await;

        assert_eq!(replies, ["503 Bad sequence of commands", "221 Bye"]);
    }

    #[tokio::test]
    async fn dialog_survives_a_rejected_command() {
        let replies = responses_for(
            b"HELO client.example\r\n\
              RCPT TO:<c@d.example>\r\n\
              MAIL FROM:<a@b.example>\r\n\
              QUIT\r\n",
        )
        .await;

        assert_eq!(replies[6], "250 HELO");
        assert_eq!(
            &replies[7..],
            ["503 Bad sequence of commands", "250 OK", "221 Bye"]
        );
    }

    #[tokio::test]
    async fn peer_disconnect_ends_the_session() {
        let replies = responses_for(b"HELO client.example\r\n").await;

        assert_eq!(replies.len(), 7);
        assert_eq!(replies[6], "250 HELO");
    }

    #[tokio::test]
    async fn body_excludes_the_terminator() {
        let (mut client, server) = duplex(1024);
        let mut session = Session::create(server, peer(), "testing".to_owned());

        client
            .write_all(b"first line\r\nsecond line\r\n.\r\n")
            .await
            .unwrap();

        assert_eq!(
            session.collect_body().await.unwrap(),
            Body::Terminated(vec!["first line".to_owned(), "second line".to_owned()])
        );
    }

    #[tokio::test]
    async fn body_cut_short_by_disconnect() {
        let (mut client, server) = duplex(1024);
        let mut session = Session::create(server, peer(), "testing".to_owned());

        client.write_all(b"first line\r\npartial").await.unwrap();
        drop(client);

        assert_eq!(
            session.collect_body().await.unwrap(),
            Body::Interrupted(vec!["first line".to_owned(), "partial".to_owned()])
        );
    }
}
