//! Error taxonomy.
//!
//! Every error maps onto a 16-bit code space partitioned by the high byte:
//! `0x00xx` is an alert this endpoint wants to send (low byte = alert code),
//! `0x01xx` is an alert received from the peer, `0x02xx` is an internal
//! condition. `Error::code` and `Error::from_code` round-trip the space.

use crate::alert::Alert;

/// High-byte class of a self-generated alert error.
pub const ERROR_CLASS_SELF_ALERT: u16 = 0x0000;
/// High-byte class of an alert received from the peer.
pub const ERROR_CLASS_PEER_ALERT: u16 = 0x0100;
/// High-byte class of internal errors.
pub const ERROR_CLASS_INTERNAL: u16 = 0x0200;

/// Top-level crate error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A fatal condition detected locally; the low byte names the alert
    /// that is (or would be) sent to the peer.
    SelfAlert(Alert),
    /// A fatal alert received from the peer.
    PeerAlert(Alert),
    /// Memory allocation failed.
    NoMemory,
    /// The handshake has not completed yet; feed more input.
    HandshakeInProgress,
    /// Internal invariant breach.
    Library,
    /// A key or public share was malformed or of the wrong type.
    IncompatibleKey,
    /// The connection was closed (close_notify already surfaced).
    ConnectionClosed,
}

impl Error {
    /// The 16-bit wire-independent error code.
    pub fn code(self) -> u16 {
        match self {
            Error::SelfAlert(a) => ERROR_CLASS_SELF_ALERT + a.to_u8() as u16,
            Error::PeerAlert(a) => ERROR_CLASS_PEER_ALERT + a.to_u8() as u16,
            Error::NoMemory => ERROR_CLASS_INTERNAL + 1,
            Error::HandshakeInProgress => ERROR_CLASS_INTERNAL + 2,
            Error::Library => ERROR_CLASS_INTERNAL + 3,
            Error::IncompatibleKey => ERROR_CLASS_INTERNAL + 4,
            Error::ConnectionClosed => ERROR_CLASS_INTERNAL + 5,
        }
    }

    /// Reconstruct an error from its 16-bit code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code & 0xff00 {
            ERROR_CLASS_SELF_ALERT => Alert::from_u8(code as u8).map(Error::SelfAlert),
            ERROR_CLASS_PEER_ALERT => Alert::from_u8(code as u8).map(Error::PeerAlert),
            ERROR_CLASS_INTERNAL => match code & 0xff {
                1 => Some(Error::NoMemory),
                2 => Some(Error::HandshakeInProgress),
                3 => Some(Error::Library),
                4 => Some(Error::IncompatibleKey),
                5 => Some(Error::ConnectionClosed),
                _ => None,
            },
            _ => None,
        }
    }

    /// The class bits (`code & 0xff00`).
    pub fn class(self) -> u16 {
        self.code() & 0xff00
    }

    /// The alert carried by an alert-classed error.
    pub fn alert(self) -> Option<Alert> {
        match self {
            Error::SelfAlert(a) | Error::PeerAlert(a) => Some(a),
            _ => None,
        }
    }

    /// Whether this error is alert-classed (self or peer).
    pub fn is_alert(self) -> bool {
        self.class() != ERROR_CLASS_INTERNAL
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::SelfAlert(a) => write!(f, "fatal alert raised: {a:?}"),
            Error::PeerAlert(a) => write!(f, "fatal alert received: {a:?}"),
            Error::NoMemory => write!(f, "out of memory"),
            Error::HandshakeInProgress => write!(f, "handshake in progress"),
            Error::Library => write!(f, "internal library error"),
            Error::IncompatibleKey => write!(f, "incompatible key"),
            Error::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_classes() {
        assert_eq!(Error::SelfAlert(Alert::DecodeError).code(), 50);
        assert_eq!(Error::PeerAlert(Alert::HandshakeFailure).code(), 0x0128);
        assert_eq!(Error::NoMemory.code(), 0x0201);
        assert_eq!(Error::HandshakeInProgress.code(), 0x0202);
        assert_eq!(Error::Library.code(), 0x0203);
        assert_eq!(Error::IncompatibleKey.code(), 0x0204);
    }

    #[test]
    fn class_extraction() {
        assert_eq!(Error::SelfAlert(Alert::BadRecordMac).class(), ERROR_CLASS_SELF_ALERT);
        assert_eq!(Error::PeerAlert(Alert::CloseNotify).class(), ERROR_CLASS_PEER_ALERT);
        assert_eq!(Error::Library.class(), ERROR_CLASS_INTERNAL);
    }

    #[test]
    fn alert_extraction() {
        assert_eq!(
            Error::SelfAlert(Alert::DecryptError).alert(),
            Some(Alert::DecryptError)
        );
        assert_eq!(Error::NoMemory.alert(), None);
    }

    #[test]
    fn code_roundtrip() {
        let errors = [
            Error::SelfAlert(Alert::UnexpectedMessage),
            Error::SelfAlert(Alert::CloseNotify),
            Error::PeerAlert(Alert::BadRecordMac),
            Error::PeerAlert(Alert::UnrecognizedName),
            Error::NoMemory,
            Error::HandshakeInProgress,
            Error::Library,
            Error::IncompatibleKey,
            Error::ConnectionClosed,
        ];
        for e in errors {
            assert_eq!(Error::from_code(e.code()), Some(e));
        }
        assert_eq!(Error::from_code(0x0300), None);
        assert_eq!(Error::from_code(0x02ff), None);
    }
}
