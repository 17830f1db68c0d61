pub mod channel;
pub mod command;
pub mod error;
pub mod session;
pub mod status;

use core::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use crate::traits::{
    fsm::FiniteStateMachine,
    protocol::{Protocol, SessionHandler},
};

use self::{
    command::Command,
    session::{Context, Session},
};

#[derive(Default, Deserialize, Serialize)]
pub struct Smtp;

impl Protocol for Smtp {
    type Session = Session<TcpStream>;

    fn handle(&self, stream: TcpStream, peer: SocketAddr, banner: String) -> Self::Session {
        Session::create(stream, peer, banner)
    }
}

impl SessionHandler for Session<TcpStream> {
    fn run(self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send {
        Self::run(self)
    }
}

/// Where the dialog stands: the last command the session accepted.
/// Transitions only ever move forward through the fixed sequence.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
pub enum State {
    #[default]
    Connect,
    Helo,
    MailFrom,
    RcptTo,
    Data,
    Reading,
    DataReceived,
    Quit,
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Reading | Self::DataReceived => "",
            Self::Connect => "Connect",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL",
            Self::RcptTo => "RCPT",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        })
    }
}

impl FiniteStateMachine for State {
    type Input = Command;
    type Context = Context;

    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self {
        match (self, input) {
            (Self::Connect, Command::Helo(id)) => {
                context.id = id;
                Self::Helo
            }
            (Self::Helo, Command::MailFrom(from)) => {
                context.mail_from = from;
                Self::MailFrom
            }
            (Self::MailFrom, Command::RcptTo(to)) => {
                context.rcpt_to = to;
                Self::RcptTo
            }
            (Self::RcptTo, Command::Data) => Self::Data,
            // QUIT is the final position in the sequence, so taking it
            // from anywhere is still a forward move.
            (_, Command::Quit) => Self::Quit,
            (state, command) => {
                // Out-of-sequence input never advances the dialog; the
                // session answers it with 503 and keeps waiting.
                context.rejected = Some(command.to_string());
                state
            }
        }
    }
}
