//! TLS 1.3 alert descriptions (RFC 8446 section 6).

/// TLS alert description codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Alert {
    CloseNotify = 0,
    EndOfEarlyData = 1,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    HandshakeFailure = 40,
    BadCertificate = 42,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    DecodeError = 50,
    DecryptError = 51,
    InternalError = 80,
    UserCanceled = 90,
    MissingExtension = 109,
    UnrecognizedName = 112,
}

/// Alert level byte on the wire.
pub(crate) const ALERT_LEVEL_WARNING: u8 = 1;
pub(crate) const ALERT_LEVEL_FATAL: u8 = 2;

impl Alert {
    /// Convert from a raw u8 byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::CloseNotify),
            1 => Some(Self::EndOfEarlyData),
            10 => Some(Self::UnexpectedMessage),
            20 => Some(Self::BadRecordMac),
            40 => Some(Self::HandshakeFailure),
            42 => Some(Self::BadCertificate),
            44 => Some(Self::CertificateRevoked),
            45 => Some(Self::CertificateExpired),
            46 => Some(Self::CertificateUnknown),
            47 => Some(Self::IllegalParameter),
            50 => Some(Self::DecodeError),
            51 => Some(Self::DecryptError),
            80 => Some(Self::InternalError),
            90 => Some(Self::UserCanceled),
            109 => Some(Self::MissingExtension),
            112 => Some(Self::UnrecognizedName),
            _ => None,
        }
    }

    /// Convert to raw u8 byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Wire level for this alert. Everything except close_notify is fatal.
    pub(crate) fn level(self) -> u8 {
        match self {
            Alert::CloseNotify => ALERT_LEVEL_WARNING,
            _ => ALERT_LEVEL_FATAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_alert_codes() {
        let codes = [
            Alert::CloseNotify,
            Alert::EndOfEarlyData,
            Alert::UnexpectedMessage,
            Alert::BadRecordMac,
            Alert::HandshakeFailure,
            Alert::BadCertificate,
            Alert::CertificateRevoked,
            Alert::CertificateExpired,
            Alert::CertificateUnknown,
            Alert::IllegalParameter,
            Alert::DecodeError,
            Alert::DecryptError,
            Alert::InternalError,
            Alert::UserCanceled,
            Alert::MissingExtension,
            Alert::UnrecognizedName,
        ];
        for code in codes {
            assert_eq!(Alert::from_u8(code.to_u8()), Some(code));
        }
    }

    #[test]
    fn unknown_alert_code() {
        assert_eq!(Alert::from_u8(255), None);
        assert_eq!(Alert::from_u8(21), None);
    }

    #[test]
    fn only_close_notify_is_warning() {
        assert_eq!(Alert::CloseNotify.level(), ALERT_LEVEL_WARNING);
        assert_eq!(Alert::BadRecordMac.level(), ALERT_LEVEL_FATAL);
        assert_eq!(Alert::UserCanceled.level(), ALERT_LEVEL_FATAL);
    }
}
