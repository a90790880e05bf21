//! TLS 1.3 handshake state machine for both roles.
//!
//! Client-side states:
//! ```text
//! Start -> WaitServerHello -> WaitEncryptedExtensions -> WaitCertOrCertRequest
//!       -> WaitCertificate -> WaitCertificateVerify -> WaitFinished -> Connected
//! ```
//!
//! Server-side states:
//! ```text
//! WaitClientHello -> ReceivedClientHello -> Negotiated -> WaitClientFinished
//!                 -> Connected
//! ```
//!
//! The engine consumes complete handshake messages (record reassembly is
//! the connection's job), feeds the transcript, drives the key schedule,
//! and queues what the record layer must do next: emit handshake bytes
//! under some epoch, or install freshly derived traffic keys.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::alert::Alert;
use crate::cert::{
    certificate_verify_message, CertificateCallbacks, Verifier, CONTEXT_SERVER,
};
use crate::crypto::{
    CipherSuite, CryptoRegistry, HashOutput, KeyExchangeContext, NamedGroup,
};
use crate::error::Error;
use crate::extensions::{
    encode_client_hello_extensions, encode_server_hello_extensions, parse_client_hello_extensions,
    parse_encrypted_extensions_data, parse_server_hello_extensions, SIGNATURE_SCHEMES,
    TLS13_VERSION,
};
use crate::key_schedule::{KeySchedule, Secret};
use crate::messages::{
    encode_certificate, encode_certificate_verify, encode_client_hello, encode_encrypted_extensions,
    encode_finished, encode_server_hello, iter_certificate_entries, iter_cipher_suites,
    parse_certificate, parse_certificate_verify, parse_client_hello, parse_encrypted_extensions,
    parse_finished, parse_server_hello, read_handshake_header, HandshakeType,
};
use crate::transcript::TranscriptHash;

/// Client or server role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Key epochs a record travels under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Epoch {
    Plaintext,
    Handshake,
    Application,
}

/// Traffic secrets for both directions of one epoch, already oriented
/// for this endpoint (`send` protects outgoing records).
pub(crate) struct EpochSecrets {
    pub epoch: Epoch,
    pub suite: CipherSuite,
    pub send: Secret,
    pub recv: Secret,
}

/// What the record layer must do next, in queue order.
pub(crate) enum HandshakeEvent {
    /// Emit handshake message bytes under the given epoch.
    Emit { epoch: Epoch, payload: Vec<u8> },
    /// Swap in new traffic keys for both directions.
    InstallKeys(EpochSecrets),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    // Client states.
    Start,
    WaitServerHello,
    WaitEncryptedExtensions,
    WaitCertOrCertRequest,
    WaitCertificate,
    WaitCertificateVerify,
    WaitFinished,

    // Server states.
    WaitClientHello,
    ReceivedClientHello,
    Negotiated,
    WaitClientFinished,

    // Shared.
    Connected,
}

pub(crate) struct HandshakeEngine<'a> {
    role: Role,
    state: State,
    crypto: &'a CryptoRegistry,
    callbacks: &'a dyn CertificateCallbacks,

    /// Client: the SNI target.
    server_name: Option<String>,

    /// Created once the cipher suite (and with it the hash) is known.
    transcript: Option<TranscriptHash>,
    /// Client: ClientHello wire bytes held until the suite is negotiated.
    early_client_hello: Vec<u8>,

    /// Client: one prepared context per enabled group.
    kex_contexts: Vec<KeyExchangeContext>,

    suite: Option<CipherSuite>,
    key_schedule: Option<KeySchedule>,
    client_hs_secret: Option<Secret>,
    server_hs_secret: Option<Secret>,

    /// Client: pending CertificateVerify capability.
    verifier: Option<Box<dyn Verifier>>,

    events: VecDeque<HandshakeEvent>,
}

fn wrap_callback_error(e: Error) -> Error {
    if e.is_alert() {
        e
    } else {
        Error::SelfAlert(Alert::HandshakeFailure)
    }
}

fn wrap_kex_error(_: Error) -> Error {
    Error::SelfAlert(Alert::IllegalParameter)
}

impl<'a> HandshakeEngine<'a> {
    pub fn new_client(
        crypto: &'a CryptoRegistry,
        callbacks: &'a dyn CertificateCallbacks,
        server_name: String,
    ) -> Self {
        Self {
            role: Role::Client,
            state: State::Start,
            crypto,
            callbacks,
            server_name: Some(server_name),
            transcript: None,
            early_client_hello: Vec::new(),
            kex_contexts: Vec::new(),
            suite: None,
            key_schedule: None,
            client_hs_secret: None,
            server_hs_secret: None,
            verifier: None,
            events: VecDeque::new(),
        }
    }

    pub fn new_server(crypto: &'a CryptoRegistry, callbacks: &'a dyn CertificateCallbacks) -> Self {
        Self {
            role: Role::Server,
            state: State::WaitClientHello,
            crypto,
            callbacks,
            server_name: None,
            transcript: None,
            early_client_hello: Vec::new(),
            kex_contexts: Vec::new(),
            suite: None,
            key_schedule: None,
            client_hs_secret: None,
            server_hs_secret: None,
            verifier: None,
            events: VecDeque::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    pub fn negotiated_suite(&self) -> Option<CipherSuite> {
        self.suite
    }

    pub fn next_event(&mut self) -> Option<HandshakeEvent> {
        self.events.pop_front()
    }

    /// Client only: build and queue ClientHello.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.role != Role::Client || self.state != State::Start {
            return Err(Error::Library);
        }
        let mut rng = self.crypto.rng();

        // One prepared context and public share per enabled group.
        let mut shares = Vec::with_capacity(self.crypto.key_exchanges.len());
        for &group in self.crypto.key_exchanges {
            let (ctx, share) = group.prepare(&mut rng)?;
            self.kex_contexts.push(ctx);
            shares.push((group, share));
        }

        let mut random = [0u8; 32];
        rng.fill(&mut random);

        let mut extensions = Vec::new();
        encode_client_hello_extensions(
            &mut extensions,
            self.server_name.as_deref(),
            self.crypto.key_exchanges,
            &shares,
        );

        let mut msg = Vec::new();
        encode_client_hello(&mut msg, &random, &[], self.crypto.cipher_suites, &extensions);

        // The transcript hash is not chosen until the server picks the
        // suite; hold the exact wire bytes until then.
        self.early_client_hello = msg.clone();
        self.events.push_back(HandshakeEvent::Emit {
            epoch: Epoch::Plaintext,
            payload: msg,
        });
        self.state = State::WaitServerHello;
        Ok(())
    }

    /// Consume one complete handshake message (header and body).
    pub fn on_message(&mut self, full: &[u8]) -> Result<(), Error> {
        let (type_byte, body_len) = read_handshake_header(full)?;
        if body_len + 4 != full.len() {
            return Err(Error::Library);
        }
        let body = &full[4..];
        let msg_type =
            HandshakeType::from_u8(type_byte).ok_or(Error::SelfAlert(Alert::UnexpectedMessage))?;

        match (self.state, msg_type) {
            (State::WaitServerHello, HandshakeType::ServerHello) => {
                self.process_server_hello(full, body)
            }
            (State::WaitEncryptedExtensions, HandshakeType::EncryptedExtensions) => {
                self.transcript_mut()?.update(full);
                self.process_encrypted_extensions(body)
            }
            (State::WaitCertOrCertRequest, HandshakeType::CertificateRequest) => {
                // Tolerated for 1-RTT server auth; the request itself is
                // not honored (client certificates are out of scope).
                self.transcript_mut()?.update(full);
                self.state = State::WaitCertificate;
                Ok(())
            }
            (State::WaitCertOrCertRequest | State::WaitCertificate, HandshakeType::Certificate) => {
                self.transcript_mut()?.update(full);
                self.process_certificate(body)
            }
            (State::WaitCertificateVerify, HandshakeType::CertificateVerify) => {
                // The signature covers the transcript up to but not
                // including this message.
                let before = self.transcript_mut()?.current_hash();
                self.transcript_mut()?.update(full);
                self.process_certificate_verify(body, &before)
            }
            (State::WaitFinished, HandshakeType::Finished) => {
                let before = self.transcript_mut()?.current_hash();
                self.transcript_mut()?.update(full);
                self.process_server_finished(body, &before)
            }
            (State::WaitClientHello, HandshakeType::ClientHello) => {
                self.process_client_hello(full, body)
            }
            (State::WaitClientFinished, HandshakeType::Finished) => {
                let before = self.transcript_mut()?.current_hash();
                self.transcript_mut()?.update(full);
                self.process_client_finished(body, &before)
            }
            _ => Err(Error::SelfAlert(Alert::UnexpectedMessage)),
        }
    }

    fn transcript_mut(&mut self) -> Result<&mut TranscriptHash, Error> {
        self.transcript.as_mut().ok_or(Error::Library)
    }

    fn key_schedule_mut(&mut self) -> Result<&mut KeySchedule, Error> {
        self.key_schedule.as_mut().ok_or(Error::Library)
    }

    // =====================================================================
    // Client side
    // =====================================================================

    fn process_server_hello(&mut self, full: &[u8], body: &[u8]) -> Result<(), Error> {
        let sh = parse_server_hello(body)?;

        // We sent an empty legacy session id; the echo must match.
        if !sh.session_id.is_empty() {
            return Err(Error::SelfAlert(Alert::IllegalParameter));
        }

        // The suite must be one we offered.
        let suite = CipherSuite::from_u16(sh.cipher_suite)
            .filter(|s| self.crypto.cipher_suites.contains(s))
            .ok_or(Error::SelfAlert(Alert::IllegalParameter))?;
        self.suite = Some(suite);

        let ext = parse_server_hello_extensions(sh.extensions)?;
        match ext.selected_version {
            0 => return Err(Error::SelfAlert(Alert::MissingExtension)),
            TLS13_VERSION => {}
            _ => return Err(Error::SelfAlert(Alert::IllegalParameter)),
        }
        let (group_id, server_share) =
            ext.key_share.ok_or(Error::SelfAlert(Alert::MissingExtension))?;
        let group =
            NamedGroup::from_u16(group_id).ok_or(Error::SelfAlert(Alert::IllegalParameter))?;

        // Resolve the context we prepared for the chosen group; the
        // remainder are abandoned (dropped, private scalars wiped).
        let position = self
            .kex_contexts
            .iter()
            .position(|ctx| ctx.group() == group)
            .ok_or(Error::SelfAlert(Alert::IllegalParameter))?;
        let ctx = self.kex_contexts.swap_remove(position);
        self.kex_contexts.clear();
        let shared = ctx.exchange(server_share).map_err(wrap_kex_error)?;

        // The hash is now known; start the transcript at ClientHello.
        let mut transcript = TranscriptHash::new(suite.hash());
        transcript.update(&self.early_client_hello);
        transcript.update(full);
        self.early_client_hello.zeroize();
        self.early_client_hello = Vec::new();
        self.transcript = Some(transcript);

        let mut ks = KeySchedule::new(suite.hash());
        ks.derive_handshake_secret(shared.as_slice())?;

        let transcript_hash = self.transcript_mut()?.current_hash();
        let (client_hs, server_hs) = ks.handshake_traffic_secrets(&transcript_hash)?;
        self.key_schedule = Some(ks);

        self.events
            .push_back(HandshakeEvent::InstallKeys(EpochSecrets {
                epoch: Epoch::Handshake,
                suite,
                send: client_hs.clone(),
                recv: server_hs.clone(),
            }));
        self.client_hs_secret = Some(client_hs);
        self.server_hs_secret = Some(server_hs);

        self.state = State::WaitEncryptedExtensions;
        Ok(())
    }

    fn process_encrypted_extensions(&mut self, body: &[u8]) -> Result<(), Error> {
        let extensions = parse_encrypted_extensions(body)?;
        parse_encrypted_extensions_data(extensions)?;
        self.state = State::WaitCertOrCertRequest;
        Ok(())
    }

    fn process_certificate(&mut self, body: &[u8]) -> Result<(), Error> {
        let cert = parse_certificate(body)?;
        let mut chain: Vec<Vec<u8>> = Vec::new();
        for entry in iter_certificate_entries(cert.entries) {
            chain.push(entry?.cert_data.to_vec());
        }
        if chain.is_empty() {
            return Err(Error::SelfAlert(Alert::DecodeError));
        }

        let verifier = self.callbacks.verify(&chain).map_err(wrap_callback_error)?;
        self.verifier = Some(verifier);
        self.state = State::WaitCertificateVerify;
        Ok(())
    }

    fn process_certificate_verify(
        &mut self,
        body: &[u8],
        transcript_before: &HashOutput,
    ) -> Result<(), Error> {
        let cv = parse_certificate_verify(body)?;
        if !SIGNATURE_SCHEMES.contains(&cv.algorithm) {
            return Err(Error::SelfAlert(Alert::IllegalParameter));
        }

        let message = certificate_verify_message(CONTEXT_SERVER, transcript_before);
        let verifier = self.verifier.take().ok_or(Error::Library)?;
        verifier
            .verify(&message, cv.signature)
            .map_err(wrap_callback_error)?;

        self.state = State::WaitFinished;
        Ok(())
    }

    fn process_server_finished(
        &mut self,
        body: &[u8],
        transcript_before: &HashOutput,
    ) -> Result<(), Error> {
        let suite = self.suite.ok_or(Error::Library)?;
        let verify_data = parse_finished(body, suite.hash().digest_size())?;

        let server_hs = self.server_hs_secret.as_ref().ok_or(Error::Library)?;
        let finished_key = KeySchedule::finished_key(server_hs)?;
        let expected = KeySchedule::finished_verify_data(&finished_key, transcript_before);
        if expected.as_slice().ct_eq(verify_data).unwrap_u8() != 1 {
            return Err(Error::SelfAlert(Alert::DecryptError));
        }

        // Application secrets cover the transcript through the server's
        // Finished; the client's own Finished is not part of the context.
        let transcript_hash = self.transcript_mut()?.current_hash();
        let ks = self.key_schedule_mut()?;
        ks.derive_master_secret()?;
        let (client_app, server_app) = ks.app_traffic_secrets(&transcript_hash)?;

        // Client Finished, still under the handshake keys.
        let client_hs = self.client_hs_secret.as_ref().ok_or(Error::Library)?;
        let client_finished_key = KeySchedule::finished_key(client_hs)?;
        let client_verify = KeySchedule::finished_verify_data(&client_finished_key, &transcript_hash);
        let mut fin = Vec::new();
        encode_finished(&mut fin, client_verify.as_slice());
        self.transcript_mut()?.update(&fin);

        self.events.push_back(HandshakeEvent::Emit {
            epoch: Epoch::Handshake,
            payload: fin,
        });
        self.events
            .push_back(HandshakeEvent::InstallKeys(EpochSecrets {
                epoch: Epoch::Application,
                suite,
                send: client_app,
                recv: server_app,
            }));

        // Handshake-epoch key material is done with; wipe it.
        self.client_hs_secret = None;
        self.server_hs_secret = None;

        self.state = State::Connected;
        Ok(())
    }

    // =====================================================================
    // Server side
    // =====================================================================

    fn process_client_hello(&mut self, full: &[u8], body: &[u8]) -> Result<(), Error> {
        let ch = parse_client_hello(body)?;
        let ext = parse_client_hello_extensions(ch.extensions)?;
        self.state = State::ReceivedClientHello;

        if !ext.supports_tls13 {
            return Err(Error::SelfAlert(Alert::HandshakeFailure));
        }

        // First mutually supported suite, our preference order.
        let suite = self
            .crypto
            .cipher_suites
            .iter()
            .copied()
            .find(|s| iter_cipher_suites(ch.cipher_suites).any(|c| c == s.to_u16()))
            .ok_or(Error::SelfAlert(Alert::HandshakeFailure))?;
        self.suite = Some(suite);

        // First mutually supported group the client supplied a share for.
        let (group, peer_share) = self
            .crypto
            .key_exchanges
            .iter()
            .copied()
            .find_map(|g| {
                ext.key_shares
                    .iter()
                    .find(|(id, _)| *id == g.to_u16())
                    .map(|(_, share)| (g, *share))
            })
            .ok_or(Error::SelfAlert(Alert::HandshakeFailure))?;

        let mut rng = self.crypto.rng();
        let (own_share, shared) = group.exchange(&mut rng, peer_share).map_err(wrap_kex_error)?;

        // Chain, scheme, and signer come from the application.
        let selection = self
            .callbacks
            .lookup(ext.server_name, &ext.signature_algorithms)
            .map_err(wrap_callback_error)?;
        if selection.chain.is_empty() {
            return Err(Error::SelfAlert(Alert::HandshakeFailure));
        }

        let mut transcript = TranscriptHash::new(suite.hash());
        transcript.update(full);

        // --- ServerHello, in the clear ---
        let mut random = [0u8; 32];
        rng.fill(&mut random);
        let mut sh_ext = Vec::new();
        encode_server_hello_extensions(&mut sh_ext, group, &own_share);
        let mut sh = Vec::new();
        encode_server_hello(&mut sh, &random, ch.session_id, suite, &sh_ext);
        transcript.update(&sh);
        self.transcript = Some(transcript);
        self.events.push_back(HandshakeEvent::Emit {
            epoch: Epoch::Plaintext,
            payload: sh,
        });

        // --- Handshake traffic keys ---
        let mut ks = KeySchedule::new(suite.hash());
        ks.derive_handshake_secret(shared.as_slice())?;
        let transcript_hash = self.transcript_mut()?.current_hash();
        let (client_hs, server_hs) = ks.handshake_traffic_secrets(&transcript_hash)?;
        self.key_schedule = Some(ks);
        self.events
            .push_back(HandshakeEvent::InstallKeys(EpochSecrets {
                epoch: Epoch::Handshake,
                suite,
                send: server_hs.clone(),
                recv: client_hs.clone(),
            }));
        self.state = State::Negotiated;

        // --- Encrypted flight: EE + Certificate + CertificateVerify + Finished ---
        let mut flight = Vec::new();

        let mut start = flight.len();
        encode_encrypted_extensions(&mut flight, &[]);
        self.transcript_mut()?.update(&flight[start..]);

        start = flight.len();
        encode_certificate(&mut flight, &selection.chain);
        self.transcript_mut()?.update(&flight[start..]);

        let cv_hash = self.transcript_mut()?.current_hash();
        let message = certificate_verify_message(CONTEXT_SERVER, &cv_hash);
        let signature = selection.signer.sign(&message).map_err(wrap_callback_error)?;
        start = flight.len();
        encode_certificate_verify(&mut flight, selection.scheme, &signature);
        self.transcript_mut()?.update(&flight[start..]);

        let server_finished_key = KeySchedule::finished_key(&server_hs)?;
        let fin_hash = self.transcript_mut()?.current_hash();
        let verify_data = KeySchedule::finished_verify_data(&server_finished_key, &fin_hash);
        start = flight.len();
        encode_finished(&mut flight, verify_data.as_slice());
        self.transcript_mut()?.update(&flight[start..]);

        self.events.push_back(HandshakeEvent::Emit {
            epoch: Epoch::Handshake,
            payload: flight,
        });

        self.client_hs_secret = Some(client_hs);
        self.server_hs_secret = Some(server_hs);
        self.state = State::WaitClientFinished;
        Ok(())
    }

    fn process_client_finished(
        &mut self,
        body: &[u8],
        transcript_before: &HashOutput,
    ) -> Result<(), Error> {
        let suite = self.suite.ok_or(Error::Library)?;
        let verify_data = parse_finished(body, suite.hash().digest_size())?;

        let client_hs = self.client_hs_secret.as_ref().ok_or(Error::Library)?;
        let finished_key = KeySchedule::finished_key(client_hs)?;
        let expected = KeySchedule::finished_verify_data(&finished_key, transcript_before);
        if expected.as_slice().ct_eq(verify_data).unwrap_u8() != 1 {
            return Err(Error::SelfAlert(Alert::DecryptError));
        }

        // `transcript_before` covers everything through our Finished,
        // which is exactly the application-secret context.
        let ks = self.key_schedule_mut()?;
        ks.derive_master_secret()?;
        let (client_app, server_app) = ks.app_traffic_secrets(transcript_before)?;
        self.events
            .push_back(HandshakeEvent::InstallKeys(EpochSecrets {
                epoch: Epoch::Application,
                suite,
                send: server_app,
                recv: client_app,
            }));

        self.client_hs_secret = None;
        self.server_hs_secret = None;

        self.state = State::Connected;
        Ok(())
    }
}
