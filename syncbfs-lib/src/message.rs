use std::{fmt::Display, num::ParseIntError, str::FromStr};

/// Externally assigned identifier of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub i64);

impl Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(ProcessId)
    }
}

impl From<i64> for ProcessId {
    fn from(id: i64) -> Self {
        ProcessId(id)
    }
}

/// A protocol message. The round and distance are never carried, they are
/// implied by the round the message is drained in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Hello(ProcessId),
    Ack(ProcessId),
    Nack(ProcessId),
}

impl Message {
    pub fn sender(&self) -> ProcessId {
        match *self {
            Message::Hello(id) | Message::Ack(id) | Message::Nack(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_is_shared_by_every_variant() {
        let id = ProcessId(7);

        assert_eq!(Message::Hello(id).sender(), id);
        assert_eq!(Message::Ack(id).sender(), id);
        assert_eq!(Message::Nack(id).sender(), id);
    }

    #[test]
    fn process_id_parses_negative_values() {
        assert_eq!("-3".parse::<ProcessId>(), Ok(ProcessId(-3)));
        assert!("x3".parse::<ProcessId>().is_err());
    }
}
