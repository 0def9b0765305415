//! Request and acknowledgment codes.
//!
//! The target writes one of the request codes to the Status word and raises
//! its request line. After servicing, the host writes one of the ack codes to
//! the Ack word and pulses the ack line; the target sees the edge and reads
//! the Ack word to learn which kind of request completed.

/// Target asks the host to print the Outbound window on the console.
pub const TERM_PRINT_REQ: u32 = 0;
/// Target asks for one console line in the Inbound window.
pub const TERM_SCAN_REQ: u32 = 1;
/// Target asks the host to send the Outbound window as one datagram.
pub const INET_PRINT_REQ: u32 = 2;
/// Target asks for one datagram payload in the Inbound window.
pub const INET_SCAN_REQ: u32 = 3;
/// Target has faulted; its panic message is staged in the Outbound window.
pub const FAULT_REQ: u32 = 15;

/// Ack code for completed print requests (console or network).
pub const PRINT_ACK: u32 = 0;
/// Ack code for completed scan requests (console or network).
pub const SCAN_ACK: u32 = 1;

/// A decoded Status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// Print the Outbound window on the console.
    TerminalPrint,
    /// Read one console line into the Inbound window.
    TerminalScan,
    /// Send the Outbound window to the network peer.
    NetworkPrint,
    /// Receive one datagram into the Inbound window.
    NetworkScan,
    /// Target fault; the message is in the Outbound window.
    Fault,
    /// Any other value.
    Unknown(u32),
}

impl Request {
    /// Decode a Status word value.
    #[must_use]
    pub const fn from_status(word: u32) -> Self {
        match word {
            TERM_PRINT_REQ => Self::TerminalPrint,
            TERM_SCAN_REQ => Self::TerminalScan,
            INET_PRINT_REQ => Self::NetworkPrint,
            INET_SCAN_REQ => Self::NetworkScan,
            FAULT_REQ => Self::Fault,
            other => Self::Unknown(other),
        }
    }

    /// The raw Status word value.
    #[must_use]
    pub const fn status(&self) -> u32 {
        match self {
            Self::TerminalPrint => TERM_PRINT_REQ,
            Self::TerminalScan => TERM_SCAN_REQ,
            Self::NetworkPrint => INET_PRINT_REQ,
            Self::NetworkScan => INET_SCAN_REQ,
            Self::Fault => FAULT_REQ,
            Self::Unknown(word) => *word,
        }
    }
}

/// Value written to the Ack word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AckKind {
    /// A print request completed.
    Print = PRINT_ACK,
    /// A scan request completed.
    Scan = SCAN_ACK,
}

impl AckKind {
    /// Word value written to the Ack word.
    #[must_use]
    pub const fn word(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TerminalPrint => write!(f, "terminal print"),
            Self::TerminalScan => write!(f, "terminal scan"),
            Self::NetworkPrint => write!(f, "network print"),
            Self::NetworkScan => write!(f, "network scan"),
            Self::Fault => write!(f, "fault"),
            Self::Unknown(word) => write!(f, "unknown ({word:08x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_decode() {
        assert_eq!(Request::from_status(0), Request::TerminalPrint);
        assert_eq!(Request::from_status(1), Request::TerminalScan);
        assert_eq!(Request::from_status(2), Request::NetworkPrint);
        assert_eq!(Request::from_status(3), Request::NetworkScan);
        assert_eq!(Request::from_status(15), Request::Fault);
    }

    #[test]
    fn everything_else_is_unknown() {
        for word in [4, 14, 16, 99, u32::MAX] {
            assert_eq!(Request::from_status(word), Request::Unknown(word));
            assert_eq!(Request::from_status(word).status(), word);
        }
    }

    #[test]
    fn ack_words() {
        assert_eq!(AckKind::Print.word(), 0);
        assert_eq!(AckKind::Scan.word(), 1);
    }
}
