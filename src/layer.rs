//! The SASL I/O layer and its drive loop

use std::path::{Path, PathBuf};

use bytes::{Buf, BytesMut};
use fe2o3_amqp_types::primitives::{Array, Binary, Symbol};
use fe2o3_amqp_types::sasl::{
    SaslChallenge, SaslCode, SaslInit, SaslMechanisms, SaslOutcome, SaslResponse,
};
use tracing::{error, trace};

use crate::context::SaslContext;
use crate::error::Error;
use crate::event::{Collector, TransportEvent};
use crate::frames;
use crate::frames::sasl::{Frame, FrameCodec};
use crate::mechanisms::{included_mech, split_mechs, ANONYMOUS};
use crate::protocol_header::{
    sniff_protocol, ProtocolHeader, SniffedProtocol, PROTOCOL_HEADER_LEN,
};
use crate::provider::{BuiltinProvider, SaslProvider};
use crate::state::{Role, SaslState};
use crate::util::quote_bytes;

/// Environment variable consulted for the provider configuration directory
pub const CONFIG_PATH_ENV_VAR: &str = "PN_SASL_CONFIG_PATH";

/// Error descriptions are capped at this many characters
const QUOTE_CAP: usize = 1024;

/// Number of bytes moved by a single pass over a layer, or end of stream
/// for that direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoProgress {
    /// Bytes consumed from, or produced into, the caller's buffer
    Bytes(usize),
    /// This direction is closed for the caller
    Eos,
}

/// A pluggable (input, output) pair in a transport's layer chain.
///
/// Layers never own an I/O loop: the caller feeds inbound bytes and drains
/// outbound bytes, re-invoking whenever more bytes arrive or buffer space
/// opens. Both operations are synchronous and may move zero bytes.
pub trait IoLayer {
    /// Feeds inbound bytes to the layer.
    ///
    /// Returns the number of bytes consumed; the caller re-presents the
    /// remainder on the next call. `eos` reports that the byte source is
    /// exhausted.
    fn process_input(&mut self, bytes: &[u8], eos: bool) -> IoProgress;

    /// Produces outbound bytes into `buf`.
    fn process_output(&mut self, buf: &mut [u8]) -> IoProgress;
}

/// Terminal layer that consumes nothing and produces nothing.
///
/// Stands in for the frame layer above when a transport terminates at the
/// SASL exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLayer;

impl IoLayer for NullLayer {
    fn process_input(&mut self, _bytes: &[u8], _eos: bool) -> IoProgress {
        IoProgress::Eos
    }

    fn process_output(&mut self, _buf: &mut [u8]) -> IoProgress {
        IoProgress::Eos
    }
}

/// Position of the SASL layer in its header-to-passthrough progression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Neither header has been exchanged; sniffing on input, writing the
    /// header on output
    Header,
    /// The peer's header was seen; reading SASL frames, still writing the
    /// header on output
    WriteHeader,
    /// Our header was written; still sniffing on input, writing SASL
    /// frames on output
    ReadHeader,
    /// Both headers done; SASL frames in both directions
    Steady,
    /// Negotiation concluded; bytes are forwarded untouched to the layer
    /// above
    Passthrough,
    /// A fatal condition was recorded; both directions report end of
    /// stream
    Error,
}

#[derive(Debug)]
struct ExternalSecurity {
    ssf: u32,
    authid: Option<String>,
}

/// The SASL negotiation layer of an AMQP transport.
///
/// Sits between a raw byte stream and the frame layer above, exchanges the
/// SASL protocol header and frames, and once both sides have observed the
/// outcome degenerates into a passthrough that forwards bytes to `U`
/// untouched.
///
/// `P` is the mechanism provider consulted for every step of the exchange;
/// [`BuiltinProvider`] covers ANONYMOUS, PLAIN and EXTERNAL.
#[derive(Debug)]
pub struct SaslLayer<P, U> {
    context: SaslContext,
    provider: P,
    upper: U,
    stage: LayerKind,
    codec: FrameCodec,
    pending_out: BytesMut,
    staged_external: Option<ExternalSecurity>,
    close_sent: bool,
    tail_closed: bool,
    condition: Option<Error>,
}

impl<P, U> SaslLayer<P, U>
where
    P: SaslProvider,
    U: IoLayer,
{
    /// Replaces the allow-list of mechanisms; `None` allows all.
    ///
    /// Setting the list to exactly `"ANONYMOUS"` on a client concludes the
    /// negotiation locally: the init frame is posted without waiting for
    /// the peer's mechanisms frame.
    pub fn allowed_mechs(&mut self, mechs: Option<&str>) {
        self.context.set_included_mechanisms(mechs);
        if mechs == Some(ANONYMOUS) {
            self.force_anonymous();
        }
    }

    /// Sets the provider configuration name
    pub fn config_name(&mut self, name: &str) {
        self.context.set_config_name(name);
    }

    /// Sets the provider configuration directory; `None` clears it
    pub fn config_path(&mut self, dir: Option<&Path>) {
        self.context.set_config_dir(dir.map(Path::to_path_buf));
    }

    /// Server side: records the outcome to be emitted
    pub fn done(&mut self, code: SaslCode) {
        self.context.done(code);
    }

    /// Username configured on a client, or the authenticated identity on a
    /// server once the exchange concluded
    pub fn user(&self) -> Option<&str> {
        self.context.username()
    }

    /// The mechanism chosen for this exchange
    pub fn mechanism(&self) -> Option<&str> {
        self.context.selected_mechanism()
    }

    /// Outcome of the exchange, `None` until concluded
    pub fn outcome(&self) -> Option<SaslCode> {
        self.context.outcome()
    }

    /// Whether the exchange concluded successfully
    pub fn authenticated(&self) -> bool {
        self.context.outcome_is_ok()
    }

    /// Sets the fully qualified domain name of the peer
    pub fn set_remote_hostname(&mut self, fqdn: Option<&str>) {
        self.context.set_remote_hostname(fqdn);
    }

    /// Sets the credentials a client offers for PLAIN; `None` clears
    pub fn set_user_password(&mut self, username: Option<&str>, password: Option<&str>) {
        self.context.set_user_password(username, password);
    }

    /// Records the security context established by a lower layer.
    ///
    /// While the peer's header is still outstanding the values are staged
    /// and propagated into the context when the header is seen.
    pub fn set_external_security(&mut self, ssf: u32, authid: Option<&str>) {
        match self.stage {
            LayerKind::Header | LayerKind::ReadHeader => {
                self.staged_external = Some(ExternalSecurity {
                    ssf,
                    authid: authid.map(String::from),
                });
            }
            _ => self.context.set_external_security(ssf, authid),
        }
    }

    /// Current position in the header-to-passthrough progression
    pub fn layer_kind(&self) -> LayerKind {
        self.stage
    }

    /// The fatal condition recorded on this transport, if any
    pub fn condition(&self) -> Option<&Error> {
        self.condition.as_ref()
    }

    /// Whether the read side of the transport was closed because the
    /// exchange failed
    pub fn tail_closed(&self) -> bool {
        self.tail_closed
    }

    /// Read access to the negotiation context
    pub fn context(&self) -> &SaslContext {
        &self.context
    }

    /// Read access to the mechanism provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Mutable access to the mechanism provider
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Consumes the layer, returning the layer above
    pub fn into_upper(self) -> U {
        self.upper
    }

    fn force_anonymous(&mut self) {
        // Only a client can skip the round trip; a server does not know
        // whether SASL is active until it sees the client's header
        if !matches!(self.context.role(), Role::Client) {
            return;
        }
        // Pretend the mechanisms frame arrived carrying only ANONYMOUS
        if self.provider.init_client(&mut self.context)
            && self.provider.process_mechanisms(&mut self.context, ANONYMOUS)
        {
            self.context.set_desired_state(SaslState::PretendOutcome);
        } else {
            self.context.done(SaslCode::SysPerm);
            self.context.set_desired_state(SaslState::RecvedOutcome);
        }
    }

    /// Server side lazy initialization: post the mechanisms frame if it has
    /// not been requested yet
    fn process(&mut self) {
        if matches!(self.context.role(), Role::Server)
            && self.context.desired_state() < SaslState::PostedMechanisms
            && self.provider.init_server(&mut self.context)
        {
            self.context.set_desired_state(SaslState::PostedMechanisms);
        }
    }

    /// Emits frames until `last_state` catches up with `desired_state`.
    ///
    /// States that presuppose an earlier frame redirect the iteration to
    /// that frame first; a failed emission stalls the transition so the
    /// next cycle can retry.
    fn post_sasl_frame(&mut self) {
        let mut desired = self.context.desired_state();
        while self.context.desired_state() > self.context.last_state() {
            match desired {
                SaslState::None => return,
                SaslState::PostedInit => {
                    let init = SaslInit {
                        mechanism: Symbol::from(
                            self.context.selected_mechanism().unwrap_or_default(),
                        ),
                        initial_response: Some(Binary::from(self.context.bytes_out().to_vec())),
                        hostname: self.context.remote_fqdn().map(String::from),
                    };
                    if !self.post_frame(Frame::Init(init)) {
                        return;
                    }
                }
                SaslState::PretendOutcome => {
                    if self.context.last_state() < SaslState::PostedInit {
                        desired = SaslState::PostedInit;
                        continue;
                    }
                    // Concluded locally, nothing goes on the wire
                }
                SaslState::PostedMechanisms => {
                    let mechlist = self.provider.list_mechs(&self.context).unwrap_or_default();
                    let mechs = match split_mechs(&mechlist, self.context.included_mechanisms()) {
                        Ok(mechs) => mechs,
                        Err(err) => {
                            error!(%err, "not posting the mechanisms frame");
                            return;
                        }
                    };
                    let mechanisms = SaslMechanisms {
                        sasl_server_mechanisms: Array(mechs),
                    };
                    if !self.post_frame(Frame::Mechanisms(mechanisms)) {
                        return;
                    }
                }
                SaslState::PostedResponse => {
                    let response = SaslResponse {
                        response: Binary::from(self.context.bytes_out().to_vec()),
                    };
                    if !self.post_frame(Frame::Response(response)) {
                        return;
                    }
                }
                SaslState::PostedChallenge => {
                    if self.context.last_state() < SaslState::PostedMechanisms {
                        desired = SaslState::PostedMechanisms;
                        continue;
                    }
                    let challenge = SaslChallenge {
                        challenge: Binary::from(self.context.bytes_out().to_vec()),
                    };
                    if !self.post_frame(Frame::Challenge(challenge)) {
                        return;
                    }
                }
                SaslState::PostedOutcome => {
                    if self.context.last_state() < SaslState::PostedMechanisms {
                        desired = SaslState::PostedMechanisms;
                        continue;
                    }
                    let outcome = SaslOutcome {
                        code: self.context.outcome().unwrap_or(SaslCode::Auth),
                        additional_data: None,
                    };
                    if !self.post_frame(Frame::Outcome(outcome)) {
                        return;
                    }
                }
                SaslState::RecvedOutcome => {
                    if self.context.last_state() < SaslState::PostedInit
                        && self.context.outcome_is_ok()
                    {
                        desired = SaslState::PostedInit;
                        continue;
                    }
                    // Terminal for the drive loop
                }
            }
            self.context.set_last_state(desired);
            desired = self.context.desired_state();
        }
    }

    fn post_frame(&mut self, frame: Frame) -> bool {
        use tokio_util::codec::Encoder;

        trace!("  -> {:?}", frame);
        let mut buf = BytesMut::new();
        match self.codec.encode(frame, &mut buf) {
            Ok(()) => {
                self.pending_out.extend_from_slice(&buf);
                self.context.emit(TransportEvent::Progress);
                true
            }
            Err(err) => {
                error!(%err, "failed to encode SASL frame");
                false
            }
        }
    }

    /// Decodes and dispatches at most one SASL frame, returning the number
    /// of bytes consumed. A partial frame consumes nothing.
    fn dispatch_input(&mut self, bytes: &[u8]) -> Result<usize, frames::Error> {
        use tokio_util::codec::Decoder;

        let mut src = BytesMut::from(bytes);
        let before = src.len();
        match self.codec.decode(&mut src)? {
            Some(frame) => {
                let consumed = before - src.len();
                self.on_frame(frame)?;
                Ok(consumed)
            }
            None => Ok(0),
        }
    }

    fn on_frame(&mut self, frame: Frame) -> Result<(), frames::Error> {
        trace!("  <- {:?}", frame);
        match (self.context.role(), frame) {
            (Role::Server, Frame::Init(init)) => {
                self.on_init(init);
                Ok(())
            }
            (Role::Client, Frame::Mechanisms(mechanisms)) => {
                self.on_mechanisms(mechanisms);
                Ok(())
            }
            (Role::Client, Frame::Challenge(challenge)) => {
                self.provider
                    .process_challenge(&mut self.context, &challenge.challenge);
                Ok(())
            }
            (Role::Server, Frame::Response(response)) => {
                self.provider
                    .process_response(&mut self.context, &response.response);
                Ok(())
            }
            (Role::Client, Frame::Outcome(outcome)) => {
                self.on_outcome(outcome);
                Ok(())
            }
            // A frame the peer may not send to this role
            (_, frame) => {
                error!(?frame, role = ?self.context.role(), "illegal SASL frame");
                Err(frames::Error::FramingError)
            }
        }
    }

    fn on_init(&mut self, init: SaslInit) {
        let mechanism = init.mechanism.into_inner();
        self.context.select_mechanism(&mechanism);
        let initial_response = init
            .initial_response
            .map(Binary::into_vec)
            .unwrap_or_default();
        self.provider
            .process_init(&mut self.context, &mechanism, &initial_response);
    }

    fn on_mechanisms(&mut self, mechanisms: SaslMechanisms) {
        // A short-circuited exchange has already chosen ANONYMOUS
        if matches!(self.context.last_state(), SaslState::PretendOutcome) {
            return;
        }

        let offered = {
            let included = self.context.included_mechanisms();
            mechanisms
                .sasl_server_mechanisms
                .iter()
                .map(Symbol::as_str)
                .filter(|name| included_mech(included, name))
                .collect::<Vec<&str>>()
                .join(" ")
        };

        if self.provider.init_client(&mut self.context)
            && self.provider.process_mechanisms(&mut self.context, &offered)
        {
            self.context.set_desired_state(SaslState::PostedInit);
        } else {
            self.context.done(SaslCode::SysPerm);
            self.context.set_desired_state(SaslState::RecvedOutcome);
        }
    }

    fn on_outcome(&mut self, outcome: SaslOutcome) {
        self.context.done(outcome.code);
        self.context.set_desired_state(SaslState::RecvedOutcome);
    }

    fn sasl_input(&mut self, bytes: &[u8]) -> Result<IoProgress, frames::Error> {
        self.process();

        let n = self.dispatch_input(bytes)?;
        if n == 0 && self.context.is_final_input_state() {
            return Ok(IoProgress::Eos);
        }
        Ok(IoProgress::Bytes(n))
    }

    fn sasl_output(&mut self, buf: &mut [u8]) -> IoProgress {
        self.process();
        self.post_sasl_frame();

        if self.pending_out.is_empty() && self.context.is_final_output_state() {
            if !self.context.outcome_is_ok() && self.context.is_final_input_state() {
                self.tail_closed = true;
            }
            IoProgress::Eos
        } else {
            let n = buf.len().min(self.pending_out.len());
            buf[..n].copy_from_slice(&self.pending_out[..n]);
            self.pending_out.advance(n);
            IoProgress::Bytes(n)
        }
    }

    fn read_header_input(&mut self, bytes: &[u8], eos: bool) -> IoProgress {
        match sniff_protocol(bytes) {
            SniffedProtocol::AmqpSasl => {
                self.stage = match self.stage {
                    LayerKind::ReadHeader => LayerKind::Steady,
                    _ => LayerKind::WriteHeader,
                };
                trace!("  <- SASL");
                if let Some(external) = self.staged_external.take() {
                    self.context
                        .set_external_security(external.ssf, external.authid.as_deref());
                }
                IoProgress::Bytes(PROTOCOL_HEADER_LEN)
            }
            SniffedProtocol::Insufficient if !eos => IoProgress::Bytes(0),
            sniffed => {
                self.close_sent = true;
                let description = format!(
                    "SASL header mismatch: {} ['{}']{}",
                    sniffed.name(),
                    quote_bytes(bytes, QUOTE_CAP),
                    if eos { " (connection aborted)" } else { "" }
                );
                self.raise_framing_error(description);
                IoProgress::Eos
            }
        }
    }

    fn write_header_output(&mut self, buf: &mut [u8]) -> IoProgress {
        if buf.len() < PROTOCOL_HEADER_LEN {
            return IoProgress::Bytes(0);
        }
        trace!("  -> SASL");
        let header: [u8; 8] = ProtocolHeader::sasl().into();
        buf[..PROTOCOL_HEADER_LEN].copy_from_slice(&header);
        self.stage = match self.stage {
            LayerKind::WriteHeader => LayerKind::Steady,
            _ => LayerKind::ReadHeader,
        };
        IoProgress::Bytes(PROTOCOL_HEADER_LEN)
    }

    fn sasl_stage_input(&mut self, bytes: &[u8], eos: bool) -> IoProgress {
        if eos {
            self.close_sent = true;
            self.raise_framing_error(String::from("connection aborted"));
            return IoProgress::Eos;
        }

        if !self.context.input_bypass() {
            match self.sasl_input(bytes) {
                Ok(IoProgress::Bytes(n)) => return IoProgress::Bytes(n),
                Ok(IoProgress::Eos) => {
                    self.context.set_input_bypass();
                    self.maybe_engage_passthrough();
                    if matches!(self.stage, LayerKind::Error) {
                        return IoProgress::Eos;
                    }
                }
                Err(err) => {
                    self.close_sent = true;
                    self.raise_framing_error(format!("malformed SASL frame: {}", err));
                    return IoProgress::Eos;
                }
            }
        }
        self.upper.process_input(bytes, eos)
    }

    fn sasl_stage_output(&mut self, buf: &mut [u8]) -> IoProgress {
        if !self.context.output_bypass() {
            // An error raised elsewhere closes the output without draining
            let progress = if self.close_sent {
                IoProgress::Eos
            } else {
                self.sasl_output(buf)
            };
            match progress {
                IoProgress::Bytes(n) => return IoProgress::Bytes(n),
                IoProgress::Eos => {
                    self.context.set_output_bypass();
                    self.maybe_engage_passthrough();
                    if matches!(self.stage, LayerKind::Error) {
                        return IoProgress::Eos;
                    }
                }
            }
        }
        self.upper.process_output(buf)
    }

    fn maybe_engage_passthrough(&mut self) {
        if self.context.input_bypass() && self.context.output_bypass() {
            if self.context.outcome_is_ok() {
                self.stage = LayerKind::Passthrough;
            } else {
                // A failed negotiation never degrades into a passthrough
                self.stage = LayerKind::Error;
            }
        }
    }

    fn raise_framing_error(&mut self, description: String) {
        error!(%description, "SASL framing error");
        if self.condition.is_none() {
            self.condition = Some(Error::framing_error(description));
        }
        self.stage = LayerKind::Error;
        self.context.emit(TransportEvent::Error);
    }
}

impl<P, U> IoLayer for SaslLayer<P, U>
where
    P: SaslProvider,
    U: IoLayer,
{
    fn process_input(&mut self, bytes: &[u8], eos: bool) -> IoProgress {
        match self.stage {
            LayerKind::Header | LayerKind::ReadHeader => self.read_header_input(bytes, eos),
            LayerKind::WriteHeader | LayerKind::Steady => self.sasl_stage_input(bytes, eos),
            LayerKind::Passthrough => self.upper.process_input(bytes, eos),
            LayerKind::Error => IoProgress::Eos,
        }
    }

    fn process_output(&mut self, buf: &mut [u8]) -> IoProgress {
        match self.stage {
            LayerKind::Header | LayerKind::WriteHeader => self.write_header_output(buf),
            LayerKind::ReadHeader | LayerKind::Steady => self.sasl_stage_output(buf),
            LayerKind::Passthrough => self.upper.process_output(buf),
            LayerKind::Error => IoProgress::Eos,
        }
    }
}

/// Builder for a [`SaslLayer`]
#[derive(Debug)]
pub struct Builder<P> {
    role: Role,
    provider: P,
    username: Option<String>,
    password: Option<String>,
    allowed_mechs: Option<String>,
    config_name: Option<String>,
    config_dir: Option<PathBuf>,
    remote_fqdn: Option<String>,
    collector: Option<Collector>,
    env_config_path: bool,
}

impl Builder<BuiltinProvider> {
    /// Builder for a client side layer with the built-in provider
    pub fn client() -> Self {
        Self::new(Role::Client)
    }

    /// Builder for a server side layer with the built-in provider
    pub fn server() -> Self {
        Self::new(Role::Server)
    }

    fn new(role: Role) -> Self {
        Self {
            role,
            provider: BuiltinProvider::new(),
            username: None,
            password: None,
            allowed_mechs: None,
            config_name: None,
            config_dir: None,
            remote_fqdn: None,
            collector: None,
            env_config_path: true,
        }
    }
}

impl<P> Builder<P> {
    /// Replaces the mechanism provider
    pub fn provider<T>(self, provider: T) -> Builder<T> {
        Builder {
            role: self.role,
            provider,
            username: self.username,
            password: self.password,
            allowed_mechs: self.allowed_mechs,
            config_name: self.config_name,
            config_dir: self.config_dir,
            remote_fqdn: self.remote_fqdn,
            collector: self.collector,
            env_config_path: self.env_config_path,
        }
    }

    /// Credentials a client offers for PLAIN
    pub fn user_password(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Credentials a client offers for PLAIN, e.g. extracted from a
    /// connection URL
    pub fn credentials(self, credentials: impl Into<crate::provider::PlainCredentials>) -> Self {
        let credentials = credentials.into();
        self.user_password(credentials.username, credentials.password)
    }

    /// Space separated allow-list of mechanisms.
    ///
    /// Exactly `"ANONYMOUS"` on a client triggers the short-circuit that
    /// posts the init frame without waiting for the mechanisms frame.
    pub fn allowed_mechs(mut self, mechs: impl Into<String>) -> Self {
        self.allowed_mechs = Some(mechs.into());
        self
    }

    /// Provider configuration name; defaults to a role specific name
    pub fn config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = Some(name.into());
        self
    }

    /// Provider configuration directory; takes precedence over the
    /// environment
    pub fn config_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Fully qualified domain name of the peer
    pub fn remote_hostname(mut self, fqdn: impl Into<String>) -> Self {
        self.remote_fqdn = Some(fqdn.into());
        self
    }

    /// Collector shared with the enclosing transport
    pub fn collector(mut self, collector: Collector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Whether to consult [`CONFIG_PATH_ENV_VAR`] for the configuration
    /// directory when none was given explicitly. On by default; tests
    /// switch it off to stay deterministic
    pub fn env_config_path(mut self, enabled: bool) -> Self {
        self.env_config_path = enabled;
        self
    }

    /// Builds the layer on top of `upper`, the frame layer the stream is
    /// handed to once the negotiation concludes
    pub fn build<U>(self, upper: U) -> SaslLayer<P, U>
    where
        P: SaslProvider,
        U: IoLayer,
    {
        let mut context = SaslContext::new(self.role);
        if self.username.is_some() || self.password.is_some() {
            context.set_user_password(self.username.as_deref(), self.password.as_deref());
        }
        if let Some(name) = &self.config_name {
            context.set_config_name(name);
        }
        let config_dir = self.config_dir.or_else(|| {
            self.env_config_path
                .then(|| std::env::var(CONFIG_PATH_ENV_VAR).ok().map(PathBuf::from))
                .flatten()
        });
        context.set_config_dir(config_dir);
        if let Some(fqdn) = &self.remote_fqdn {
            context.set_remote_hostname(Some(fqdn));
        }
        if let Some(collector) = self.collector {
            context.set_collector(collector);
        }

        let mut layer = SaslLayer {
            context,
            provider: self.provider,
            upper,
            stage: LayerKind::Header,
            codec: FrameCodec::default(),
            pending_out: BytesMut::new(),
            staged_external: None,
            close_sent: false,
            tail_closed: false,
            condition: None,
        };
        if let Some(mechs) = self.allowed_mechs {
            layer.allowed_mechs(Some(&mechs));
        }
        layer
    }
}
