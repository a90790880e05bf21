//! The connection object: record reassembly, cipher installation, alert
//! handling, and the public handshake/receive/send operations.
//!
//! A connection performs no I/O. `handshake` consumes peer bytes and
//! appends outgoing flights to the caller's buffer; `receive` decrypts one
//! record; `send` seals application data. All suspension is expressed by
//! returning [`HandshakeStatus::InProgress`]: the caller fetches more
//! bytes from its own transport and calls again. One returned error makes
//! the connection terminal for everything except drop.

use alloc::string::String;
use alloc::vec::Vec;

use zeroize::Zeroize;

use crate::alert::Alert;
use crate::buffer::OutputBuffer;
use crate::cert::CertificateCallbacks;
use crate::crypto::{CipherSuite, CryptoRegistry};
use crate::error::Error;
use crate::handshake::{Epoch, HandshakeEngine, HandshakeEvent, Role};
use crate::messages::{read_handshake_header, HANDSHAKE_HEADER_LEN};
use crate::record::{
    decode_record_header, seal_payload, write_plaintext_records, ContentType, RecordCipher,
    RECORD_HEADER_LEN,
};

/// Result of a `handshake` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Feed more peer bytes; all input so far was consumed.
    InProgress,
    /// The handshake is complete; the connection is ready for traffic.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Handshaking,
    Connected,
    Closed,
}

/// One TLS 1.3 endpoint.
pub struct Connection<'a> {
    engine: HandshakeEngine<'a>,
    crypto: &'a CryptoRegistry,
    callbacks: &'a dyn CertificateCallbacks,

    state: ConnState,
    /// First error returned; repeated by every later operation.
    fail: Option<Error>,
    /// Alert waiting to be flushed into the next outgoing buffer.
    pending_alert: Option<Alert>,
    started: bool,

    read_cipher: Option<RecordCipher>,
    write_cipher: Option<RecordCipher>,

    /// Partial inbound record bytes.
    recv_buf: Vec<u8>,
    /// Reassembled handshake stream awaiting complete messages.
    hs_stream: Vec<u8>,
}

impl<'a> Connection<'a> {
    /// Create a connection. Client role iff `server_name` is supplied.
    pub fn new(
        crypto: &'a CryptoRegistry,
        callbacks: &'a dyn CertificateCallbacks,
        server_name: Option<&str>,
    ) -> Self {
        let engine = match server_name {
            Some(name) => HandshakeEngine::new_client(crypto, callbacks, String::from(name)),
            None => HandshakeEngine::new_server(crypto, callbacks),
        };
        Self {
            engine,
            crypto,
            callbacks,
            state: ConnState::Handshaking,
            fail: None,
            pending_alert: None,
            started: false,
            read_cipher: None,
            write_cipher: None,
            recv_buf: Vec::new(),
            hs_stream: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.engine.role()
    }

    pub fn crypto(&self) -> &'a CryptoRegistry {
        self.crypto
    }

    pub fn callbacks(&self) -> &'a dyn CertificateCallbacks {
        self.callbacks
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Connected
    }

    pub fn negotiated_suite(&self) -> Option<CipherSuite> {
        self.engine.negotiated_suite()
    }

    /// Drive the handshake with `input` bytes from the peer.
    ///
    /// Outgoing flight bytes are appended to `sendbuf`; the caller must
    /// transmit them even when an error is returned (a fatal alert ends
    /// up there). Returns the status and the number of input bytes
    /// consumed; `InProgress` guarantees all input was consumed.
    pub fn handshake(
        &mut self,
        sendbuf: &mut OutputBuffer<'_>,
        input: &[u8],
    ) -> Result<(HandshakeStatus, usize), Error> {
        if let Some(e) = self.fail {
            return Err(e);
        }
        if self.state == ConnState::Connected {
            return Ok((HandshakeStatus::Complete, 0));
        }
        match self.handshake_inner(sendbuf, input) {
            Ok(done) => Ok(done),
            Err(e) => Err(self.fail_with(e, Some(sendbuf))),
        }
    }

    fn handshake_inner(
        &mut self,
        sendbuf: &mut OutputBuffer<'_>,
        input: &[u8],
    ) -> Result<(HandshakeStatus, usize), Error> {
        if !self.started {
            self.started = true;
            if self.engine.role() == Role::Client {
                self.engine.start()?;
            }
            self.drain_events(sendbuf)?;
        }

        let mut consumed = 0;
        while !self.engine.is_connected() {
            let (n, ready) = self.fill_record(&input[consumed..])?;
            consumed += n;
            if !ready {
                break;
            }
            self.process_handshake_record(sendbuf)?;
        }

        if self.engine.is_connected() {
            self.state = ConnState::Connected;
            Ok((HandshakeStatus::Complete, consumed))
        } else {
            Ok((HandshakeStatus::InProgress, consumed))
        }
    }

    /// Decrypt exactly one application-data record from `input`, appending
    /// its plaintext to `plainbuf`. Partial records are buffered; the
    /// return value is the number of input bytes consumed. A zero-length
    /// plaintext appends nothing and is not an error.
    pub fn receive(
        &mut self,
        plainbuf: &mut OutputBuffer<'_>,
        input: &[u8],
    ) -> Result<usize, Error> {
        if let Some(e) = self.fail {
            return Err(e);
        }
        if self.state == ConnState::Handshaking {
            return Err(Error::HandshakeInProgress);
        }
        match self.receive_inner(plainbuf, input) {
            Ok(consumed) => Ok(consumed),
            Err(e) => Err(self.fail_with(e, None)),
        }
    }

    fn receive_inner(
        &mut self,
        plainbuf: &mut OutputBuffer<'_>,
        input: &[u8],
    ) -> Result<usize, Error> {
        let (consumed, ready) = self.fill_record(input)?;
        if !ready {
            return Ok(consumed);
        }
        self.process_app_record(plainbuf)?;
        Ok(consumed)
    }

    /// Fragment and seal `plaintext` into application-data records.
    pub fn send(&mut self, sendbuf: &mut OutputBuffer<'_>, plaintext: &[u8]) -> Result<(), Error> {
        if let Some(e) = self.fail {
            // A failure detected on the receive path parks its alert
            // here; flush it so the caller's next write carries it.
            let _ = self.flush_alert(sendbuf);
            return Err(e);
        }
        if self.state == ConnState::Handshaking {
            return Err(Error::HandshakeInProgress);
        }
        let result = {
            let cipher = self.write_cipher.as_mut().ok_or(Error::Library)?;
            seal_payload(cipher, sendbuf, ContentType::ApplicationData, plaintext)
        };
        result.map_err(|e| self.fail_with(e, None))
    }

    /// Send a close_notify alert and make the connection terminal.
    /// Idempotent once closed.
    pub fn close(&mut self, sendbuf: &mut OutputBuffer<'_>) -> Result<(), Error> {
        if self.state == ConnState::Closed {
            return Ok(());
        }
        if let Some(e) = self.fail {
            return Err(e);
        }
        let body = [Alert::CloseNotify.level(), Alert::CloseNotify.to_u8()];
        match self.write_cipher.as_mut() {
            Some(cipher) => seal_payload(cipher, sendbuf, ContentType::Alert, &body)?,
            None => write_plaintext_records(sendbuf, ContentType::Alert, &body)?,
        }
        self.state = ConnState::Closed;
        self.fail = Some(Error::ConnectionClosed);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Failure plumbing
    // ------------------------------------------------------------------

    fn fail_with(&mut self, e: Error, sendbuf: Option<&mut OutputBuffer<'_>>) -> Error {
        match e {
            Error::SelfAlert(alert) => self.pending_alert = Some(alert),
            Error::PeerAlert(_) | Error::ConnectionClosed | Error::HandshakeInProgress => {}
            _ => self.pending_alert = Some(Alert::InternalError),
        }

        if e == Error::PeerAlert(Alert::CloseNotify) && self.state == ConnState::Connected {
            // Graceful close: surfaced exactly once, terminal afterwards.
            self.state = ConnState::Closed;
            self.fail = Some(Error::ConnectionClosed);
        } else {
            self.fail = Some(e);
        }

        if let Some(buf) = sendbuf {
            let _ = self.flush_alert(buf);
        }
        e
    }

    fn flush_alert(&mut self, out: &mut OutputBuffer<'_>) -> Result<(), Error> {
        if let Some(alert) = self.pending_alert.take() {
            let body = [alert.level(), alert.to_u8()];
            match self.write_cipher.as_mut() {
                Some(cipher) => seal_payload(cipher, out, ContentType::Alert, &body)?,
                None => write_plaintext_records(out, ContentType::Alert, &body)?,
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Record intake
    // ------------------------------------------------------------------

    /// Buffer input toward one complete record. Returns (bytes consumed,
    /// record complete). The header is validated as soon as it is whole.
    fn fill_record(&mut self, input: &[u8]) -> Result<(usize, bool), Error> {
        let mut consumed = 0;

        if self.recv_buf.len() < RECORD_HEADER_LEN {
            let need = RECORD_HEADER_LEN - self.recv_buf.len();
            let take = need.min(input.len());
            self.recv_buf.extend_from_slice(&input[..take]);
            consumed += take;
            if self.recv_buf.len() < RECORD_HEADER_LEN {
                return Ok((consumed, false));
            }
            decode_record_header(&self.recv_buf)?;
        }

        let header = decode_record_header(&self.recv_buf)?;
        let total = RECORD_HEADER_LEN + header.length;
        if self.recv_buf.len() < total {
            let need = total - self.recv_buf.len();
            let take = need.min(input.len() - consumed);
            self.recv_buf
                .extend_from_slice(&input[consumed..consumed + take]);
            consumed += take;
        }
        Ok((consumed, self.recv_buf.len() == total))
    }

    /// Take the completed record out of the intake buffer.
    fn take_record(&mut self) -> Result<(ContentType, [u8; RECORD_HEADER_LEN], Vec<u8>), Error> {
        let header_info = decode_record_header(&self.recv_buf)?;
        let mut header = [0u8; RECORD_HEADER_LEN];
        header.copy_from_slice(&self.recv_buf[..RECORD_HEADER_LEN]);
        let mut record = core::mem::take(&mut self.recv_buf);
        record.drain(..RECORD_HEADER_LEN);
        Ok((header_info.content_type, header, record))
    }

    fn process_handshake_record(&mut self, sendbuf: &mut OutputBuffer<'_>) -> Result<(), Error> {
        let (content_type, header, mut payload) = self.take_record()?;
        let result = (|| {
            match content_type {
                // Tolerated for middlebox compatibility; carries nothing.
                ContentType::ChangeCipherSpec => Ok(()),
                ContentType::Alert => self.handle_alert_body(&payload),
                ContentType::Handshake => {
                    if self.read_cipher.is_some() {
                        // Plaintext handshake records are over once keys
                        // are installed for reading.
                        return Err(Error::SelfAlert(Alert::UnexpectedMessage));
                    }
                    if payload.is_empty() {
                        return Err(Error::SelfAlert(Alert::DecodeError));
                    }
                    self.hs_stream.extend_from_slice(&payload);
                    self.process_hs_stream(sendbuf)
                }
                ContentType::ApplicationData => {
                    let cipher = self
                        .read_cipher
                        .as_mut()
                        .ok_or(Error::SelfAlert(Alert::UnexpectedMessage))?;
                    let (len, inner) = cipher.open_record(&header, &mut payload)?;
                    match inner {
                        ContentType::Handshake => {
                            if len == 0 {
                                return Err(Error::SelfAlert(Alert::DecodeError));
                            }
                            self.hs_stream.extend_from_slice(&payload[..len]);
                            self.process_hs_stream(sendbuf)
                        }
                        ContentType::Alert => self.handle_alert_body(&payload[..len]),
                        _ => Err(Error::SelfAlert(Alert::UnexpectedMessage)),
                    }
                }
            }
        })();
        payload.zeroize();
        result
    }

    fn process_app_record(&mut self, plainbuf: &mut OutputBuffer<'_>) -> Result<(), Error> {
        let (content_type, header, mut payload) = self.take_record()?;
        let result = (|| {
            match content_type {
                ContentType::ApplicationData => {
                    let cipher = self.read_cipher.as_mut().ok_or(Error::Library)?;
                    let (len, inner) = cipher.open_record(&header, &mut payload)?;
                    match inner {
                        ContentType::ApplicationData => {
                            plainbuf.extend_from_slice(&payload[..len])
                        }
                        ContentType::Alert => self.handle_alert_body(&payload[..len]),
                        // Post-handshake handshake messages (session
                        // tickets and the like) are not supported and
                        // not surfaced.
                        ContentType::Handshake => Ok(()),
                        ContentType::ChangeCipherSpec => {
                            Err(Error::SelfAlert(Alert::UnexpectedMessage))
                        }
                    }
                }
                // Nothing travels unprotected after the handshake.
                _ => Err(Error::SelfAlert(Alert::UnexpectedMessage)),
            }
        })();
        payload.zeroize();
        result
    }

    /// Feed complete handshake messages from the reassembly stream into
    /// the state machine.
    fn process_hs_stream(&mut self, sendbuf: &mut OutputBuffer<'_>) -> Result<(), Error> {
        loop {
            if self.hs_stream.len() < HANDSHAKE_HEADER_LEN {
                return Ok(());
            }
            let (_, body_len) = read_handshake_header(&self.hs_stream)?;
            let total = HANDSHAKE_HEADER_LEN + body_len;
            if self.hs_stream.len() < total {
                return Ok(());
            }

            let mut msg: Vec<u8> = self.hs_stream.drain(..total).collect();
            let result = self.engine.on_message(&msg);
            msg.zeroize();
            result?;
            self.drain_events(sendbuf)?;

            if self.engine.is_connected() {
                if !self.hs_stream.is_empty() {
                    return Err(Error::SelfAlert(Alert::UnexpectedMessage));
                }
                return Ok(());
            }
        }
    }

    fn drain_events(&mut self, sendbuf: &mut OutputBuffer<'_>) -> Result<(), Error> {
        while let Some(event) = self.engine.next_event() {
            match event {
                HandshakeEvent::Emit {
                    epoch: Epoch::Plaintext,
                    payload,
                } => {
                    write_plaintext_records(sendbuf, ContentType::Handshake, &payload)?;
                }
                HandshakeEvent::Emit { payload, .. } => {
                    let cipher = self.write_cipher.as_mut().ok_or(Error::Library)?;
                    seal_payload(cipher, sendbuf, ContentType::Handshake, &payload)?;
                }
                HandshakeEvent::InstallKeys(secrets) => {
                    // Handshake keys replace nothing; application keys
                    // replace the handshake ciphers.
                    let installing_app = secrets.epoch == Epoch::Application;
                    if installing_app != self.read_cipher.is_some() {
                        return Err(Error::Library);
                    }
                    // Atomic between records: both directions swap, the
                    // sequence numbers restart with the new ciphers, and
                    // the outgoing epoch's secrets die with this scope.
                    self.read_cipher = Some(RecordCipher::new(secrets.suite, &secrets.recv)?);
                    self.write_cipher = Some(RecordCipher::new(secrets.suite, &secrets.send)?);
                }
            }
        }
        Ok(())
    }

    fn handle_alert_body(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() != 2 {
            return Err(Error::SelfAlert(Alert::DecodeError));
        }
        let alert = Alert::from_u8(data[1]).ok_or(Error::SelfAlert(Alert::DecodeError))?;
        // Every peer alert ends the connection; close_notify is the
        // orderly variant, distinguished by the caller via its class.
        Err(Error::PeerAlert(alert))
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        self.recv_buf.zeroize();
        self.hs_stream.zeroize();
    }
}
