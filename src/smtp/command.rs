use core::fmt::{self, Display, Formatter};

/// Client commands, recognised by prefix only. Anything past the verb is
/// carried along verbatim; this server never parses addresses.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// `HELO` or `EHLO`, with whatever identity the client offered.
    Helo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    Quit,
    Unknown(String),
}

impl Command {
    fn argument(line: &str, prefix: &str) -> String {
        line[prefix.len()..]
            .trim_start_matches(':')
            .trim()
            .to_owned()
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        let line = line.trim();
        let upper = line.to_ascii_uppercase();

        if upper.starts_with("HELO") || upper.starts_with("EHLO") {
            Self::Helo(Self::argument(line, "HELO"))
        } else if upper.starts_with("MAIL FROM") {
            Self::MailFrom(Self::argument(line, "MAIL FROM"))
        } else if upper.starts_with("RCPT TO") {
            Self::RcptTo(Self::argument(line, "RCPT TO"))
        } else if upper.starts_with("DATA") {
            Self::Data
        } else if upper.starts_with("QUIT") {
            Self::Quit
        } else {
            Self::Unknown(line.to_owned())
        }
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(id) => write!(fmt, "HELO {id}"),
            Self::MailFrom(from) => write!(fmt, "MAIL FROM:{from}"),
            Self::RcptTo(to) => write!(fmt, "RCPT TO:{to}"),
            Self::Data => fmt.write_str("DATA"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Unknown(line) => fmt.write_str(line),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Command;

    #[test]
    fn helo_and_ehlo() {
        assert_eq!(
            Command::from("HELO client.example"),
            Command::Helo("client.example".to_owned())
        );
        assert_eq!(
            Command::from("EHLO client.example"),
            Command::Helo("client.example".to_owned())
        );
        assert_eq!(Command::from("helo there"), Command::Helo("there".to_owned()));
    }

    #[test]
    fn mail_from_keeps_the_address_verbatim() {
        assert_eq!(
            Command::from("MAIL FROM:<a@b.example>"),
            Command::MailFrom("<a@b.example>".to_owned())
        );
        assert_eq!(
            Command::from("mail from: <a@b.example>"),
            Command::MailFrom("<a@b.example>".to_owned())
        );
    }

    #[test]
    fn rcpt_to_keeps_the_address_verbatim() {
        assert_eq!(
            Command::from("RCPT TO:<c@d.example>"),
            Command::RcptTo("<c@d.example>".to_owned())
        );
    }

    #[test]
    fn bare_verbs() {
        assert_eq!(Command::from("DATA"), Command::Data);
        assert_eq!(Command::from("data"), Command::Data);
        assert_eq!(Command::from("QUIT"), Command::Quit);
        assert_eq!(Command::from("quit\r"), Command::Quit);
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(
            Command::from("VRFY someone"),
            Command::Unknown("VRFY someone".to_owned())
        );
    }
}
