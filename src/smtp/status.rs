use core::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    GoodBye = 221,
    Ok = 250,
    StartMailInput = 354,
    InvalidCommandSequence = 503,
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", *self as u32)
    }
}

#[cfg(test)]
mod test {
    use super::Status;

    #[test]
    fn renders_as_reply_code() {
        assert_eq!(Status::Ok.to_string(), "250");
        assert_eq!(Status::GoodBye.to_string(), "221");
        assert_eq!(Status::StartMailInput.to_string(), "354");
        assert_eq!(Status::InvalidCommandSequence.to_string(), "503");
    }
}
