//! End-to-end negotiation scenarios driving a client and a server layer
//! against each other over in-memory buffers

use bytes::{Bytes, BytesMut};
use fe2o3_amqp_types::sasl::SaslCode;
use tokio_util::codec::Decoder;

use fe2o3_amqp_sasl::frames::sasl::{Frame, FrameCodec};
use fe2o3_amqp_sasl::{
    Builder, BuiltinProvider, IoLayer, IoProgress, LayerKind, SaslContext, SaslLayer,
    SaslProvider, SaslState, SingleCredential, SASL_PROTOCOL_HEADER,
};

/// Frame layer standing in for the AMQP transport above the SASL layer
#[derive(Debug, Default)]
struct Recorder {
    received: Vec<u8>,
    outbound: Vec<u8>,
}

impl Recorder {
    fn with_outbound(outbound: &[u8]) -> Self {
        Self {
            received: Vec::new(),
            outbound: outbound.to_vec(),
        }
    }
}

impl IoLayer for Recorder {
    fn process_input(&mut self, bytes: &[u8], _eos: bool) -> IoProgress {
        self.received.extend_from_slice(bytes);
        IoProgress::Bytes(bytes.len())
    }

    fn process_output(&mut self, buf: &mut [u8]) -> IoProgress {
        let n = self.outbound.len().min(buf.len());
        buf[..n].copy_from_slice(&self.outbound[..n]);
        self.outbound.drain(..n);
        IoProgress::Bytes(n)
    }
}

/// Shuttles bytes between the two layers the way a connection driver would,
/// returning the full wire capture of each direction
fn pump<PC, PS, UC, US>(
    client: &mut SaslLayer<PC, UC>,
    server: &mut SaslLayer<PS, US>,
) -> (Vec<u8>, Vec<u8>)
where
    PC: SaslProvider,
    PS: SaslProvider,
    UC: IoLayer,
    US: IoLayer,
{
    let mut c2s: Vec<u8> = Vec::new();
    let mut s2c: Vec<u8> = Vec::new();
    let mut c2s_log = Vec::new();
    let mut s2c_log = Vec::new();
    let mut buf = [0u8; 4096];

    for _ in 0..32 {
        if let IoProgress::Bytes(n) = client.process_output(&mut buf) {
            c2s.extend_from_slice(&buf[..n]);
            c2s_log.extend_from_slice(&buf[..n]);
        }
        if let IoProgress::Bytes(n) = server.process_output(&mut buf) {
            s2c.extend_from_slice(&buf[..n]);
            s2c_log.extend_from_slice(&buf[..n]);
        }
        if let IoProgress::Bytes(n) = server.process_input(&c2s, false) {
            c2s.drain(..n);
        }
        if let IoProgress::Bytes(n) = client.process_input(&s2c, false) {
            s2c.drain(..n);
        }
    }

    (c2s_log, s2c_log)
}

/// Strips the protocol header from a wire capture and decodes the SASL
/// frames that follow
fn parse_frames(wire: &[u8]) -> Vec<Frame> {
    assert!(
        wire.len() >= 8 && wire[..8] == SASL_PROTOCOL_HEADER,
        "capture does not start with the SASL header"
    );
    let mut src = BytesMut::from(&wire[8..]);
    let mut codec = FrameCodec::default();
    let mut frames = Vec::new();
    while let Some(frame) = codec.decode(&mut src).unwrap() {
        frames.push(frame);
    }
    frames
}

fn assert_client_emissions(frames: &[Frame]) {
    for frame in frames {
        assert!(
            matches!(frame, Frame::Init(_) | Frame::Response(_)),
            "client emitted a server performative: {:?}",
            frame
        );
    }
}

fn assert_server_emissions(frames: &[Frame]) {
    for frame in frames {
        assert!(
            matches!(
                frame,
                Frame::Mechanisms(_) | Frame::Challenge(_) | Frame::Outcome(_)
            ),
            "server emitted a client performative: {:?}",
            frame
        );
    }
}

#[test]
fn anonymous_negotiation_succeeds() {
    let mut client = Builder::client()
        .env_config_path(false)
        .build(Recorder::default());
    let mut server = Builder::server()
        .env_config_path(false)
        .build(Recorder::default());

    let (c2s, s2c) = pump(&mut client, &mut server);

    assert!(client.authenticated());
    assert!(matches!(client.outcome(), Some(SaslCode::Ok)));
    assert!(matches!(server.outcome(), Some(SaslCode::Ok)));
    assert_eq!(client.layer_kind(), LayerKind::Passthrough);
    assert_eq!(server.layer_kind(), LayerKind::Passthrough);
    assert_eq!(client.mechanism(), Some("ANONYMOUS"));

    let client_frames = parse_frames(&c2s);
    assert_client_emissions(&client_frames);
    assert_eq!(client_frames.len(), 1);
    assert!(
        matches!(&client_frames[0], Frame::Init(init) if init.mechanism.as_str() == "ANONYMOUS")
    );

    let server_frames = parse_frames(&s2c);
    assert_server_emissions(&server_frames);
    assert!(matches!(
        &server_frames[..],
        [Frame::Mechanisms(_), Frame::Outcome(_)]
    ));
}

#[test]
fn force_anonymous_skips_the_mechanisms_round_trip() {
    let mut client = Builder::client()
        .allowed_mechs("ANONYMOUS")
        .env_config_path(false)
        .build(Recorder::default());

    // The init frame is posted before any server byte has arrived
    let mut wire = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match client.process_output(&mut buf) {
            IoProgress::Bytes(n) if n > 0 => wire.extend_from_slice(&buf[..n]),
            _ => break,
        }
    }
    let eager = parse_frames(&wire);
    assert!(matches!(&eager[..], [Frame::Init(init)] if init.mechanism.as_str() == "ANONYMOUS"));

    let mut server = Builder::server()
        .env_config_path(false)
        .build(Recorder::default());

    // Deliver the pipelined header and init to the server by hand, then
    // let the pump finish the exchange
    let mut pending = wire.clone();
    loop {
        match server.process_input(&pending, false) {
            IoProgress::Bytes(n) if n > 0 => {
                pending.drain(..n);
            }
            _ => break,
        }
    }
    assert!(pending.is_empty());

    let (c2s, s2c) = pump(&mut client, &mut server);

    // The inbound mechanisms frame is ignored, the outcome is honored
    assert!(client.authenticated());
    assert_eq!(client.mechanism(), Some("ANONYMOUS"));
    assert_eq!(client.layer_kind(), LayerKind::Passthrough);

    // Nothing further left the client; the server saw a single init
    assert!(c2s.is_empty());
    let server_frames = parse_frames(&s2c);
    assert!(matches!(
        &server_frames[..],
        [Frame::Mechanisms(_), Frame::Outcome(_)]
    ));
}

#[derive(Debug, Default)]
struct ScramLikeClient {
    challenges_seen: usize,
}

impl SaslProvider for ScramLikeClient {
    fn list_mechs(&mut self, _context: &SaslContext) -> Option<String> {
        None
    }

    fn init_server(&mut self, _context: &mut SaslContext) -> bool {
        false
    }

    fn init_client(&mut self, _context: &mut SaslContext) -> bool {
        true
    }

    fn process_init(&mut self, _context: &mut SaslContext, _mechanism: &str, _ir: &[u8]) {}

    fn process_mechanisms(&mut self, context: &mut SaslContext, offered: &str) -> bool {
        if offered.split(' ').any(|mech| mech == "SCRAM-SHA-1") {
            context.select_mechanism("SCRAM-SHA-1");
            context.stage_bytes_out(Bytes::from_static(b"client-first"));
            true
        } else {
            false
        }
    }

    fn process_challenge(&mut self, context: &mut SaslContext, _challenge: &[u8]) {
        self.challenges_seen += 1;
        let body = format!("client-round-{}", self.challenges_seen);
        context.stage_bytes_out(Bytes::from(body.into_bytes()));
        context.set_desired_state(SaslState::PostedResponse);
    }

    fn process_response(&mut self, _context: &mut SaslContext, _response: &[u8]) {}
}

#[derive(Debug, Default)]
struct ScramLikeServer {
    responses_seen: usize,
}

impl SaslProvider for ScramLikeServer {
    fn list_mechs(&mut self, _context: &SaslContext) -> Option<String> {
        Some(String::from("PLAIN SCRAM-SHA-1"))
    }

    fn init_server(&mut self, _context: &mut SaslContext) -> bool {
        true
    }

    fn init_client(&mut self, _context: &mut SaslContext) -> bool {
        false
    }

    fn process_init(&mut self, context: &mut SaslContext, mechanism: &str, _ir: &[u8]) {
        assert_eq!(mechanism, "SCRAM-SHA-1");
        context.stage_bytes_out(Bytes::from_static(b"server-first"));
        context.set_desired_state(SaslState::PostedChallenge);
    }

    fn process_mechanisms(&mut self, _context: &mut SaslContext, _offered: &str) -> bool {
        false
    }

    fn process_challenge(&mut self, _context: &mut SaslContext, _challenge: &[u8]) {}

    fn process_response(&mut self, context: &mut SaslContext, _response: &[u8]) {
        self.responses_seen += 1;
        if self.responses_seen < 3 {
            context.stage_bytes_out(Bytes::from_static(b"server-next"));
            context.set_desired_state(SaslState::PostedChallenge);
        } else {
            context.done(SaslCode::Ok);
            context.set_desired_state(SaslState::PostedOutcome);
        }
    }
}

#[test]
fn multi_round_challenge_response_rewinds_and_reposts() {
    let mut client = Builder::client()
        .provider(ScramLikeClient::default())
        .env_config_path(false)
        .build(Recorder::default());
    let mut server = Builder::server()
        .provider(ScramLikeServer::default())
        .env_config_path(false)
        .build(Recorder::default());

    let (c2s, s2c) = pump(&mut client, &mut server);

    assert!(client.authenticated());
    assert_eq!(client.mechanism(), Some("SCRAM-SHA-1"));
    assert_eq!(client.provider().challenges_seen, 3);
    assert_eq!(server.provider().responses_seen, 3);

    let client_frames = parse_frames(&c2s);
    assert_client_emissions(&client_frames);
    let responses: Vec<Vec<u8>> = client_frames
        .iter()
        .filter_map(|frame| match frame {
            Frame::Response(response) => Some(response.response.to_vec()),
            _ => None,
        })
        .collect();
    assert_eq!(
        responses,
        [
            b"client-round-1".to_vec(),
            b"client-round-2".to_vec(),
            b"client-round-3".to_vec(),
        ]
    );

    let server_frames = parse_frames(&s2c);
    assert_server_emissions(&server_frames);
    let challenges = server_frames
        .iter()
        .filter(|frame| matches!(frame, Frame::Challenge(_)))
        .count();
    assert_eq!(challenges, 3);
}

#[test]
fn header_mismatch_rejects_the_stream() {
    let mut client = Builder::client()
        .env_config_path(false)
        .build(Recorder::default());

    assert_eq!(client.process_input(b"HTTP/1.1 ", false), IoProgress::Eos);
    assert_eq!(client.layer_kind(), LayerKind::Error);

    let condition = client.condition().expect("condition must be recorded");
    assert!(condition.description().contains("header mismatch"));
    assert!(condition.description().contains("HTTP/1.1 "));

    // No SASL frame is ever emitted afterwards
    let mut buf = [0u8; 256];
    assert_eq!(client.process_output(&mut buf), IoProgress::Eos);
}

#[test]
fn denied_outcome_closes_the_read_tail() {
    let mut client = Builder::client()
        .user_password("user", "wrong")
        .env_config_path(false)
        .build(Recorder::default());
    let mut server = Builder::server()
        .provider(BuiltinProvider::with_credentials(SingleCredential::new(
            "user", "secret",
        )))
        .env_config_path(false)
        .build(Recorder::default());

    let (c2s, s2c) = pump(&mut client, &mut server);

    assert!(!client.authenticated());
    assert!(matches!(client.outcome(), Some(SaslCode::Auth)));
    assert!(client.tail_closed());
    assert_ne!(client.layer_kind(), LayerKind::Passthrough);

    let client_frames = parse_frames(&c2s);
    assert!(matches!(&client_frames[..], [Frame::Init(init)] if init.mechanism.as_str() == "PLAIN"));
    let server_frames = parse_frames(&s2c);
    assert!(matches!(
        server_frames.last(),
        Some(Frame::Outcome(outcome)) if matches!(outcome.code, SaslCode::Auth)
    ));
}

#[derive(Debug)]
struct OfferOnly {
    mechs: &'static str,
}

impl SaslProvider for OfferOnly {
    fn list_mechs(&mut self, _context: &SaslContext) -> Option<String> {
        Some(String::from(self.mechs))
    }

    fn init_server(&mut self, _context: &mut SaslContext) -> bool {
        true
    }

    fn init_client(&mut self, _context: &mut SaslContext) -> bool {
        true
    }

    fn process_init(&mut self, context: &mut SaslContext, _mechanism: &str, _ir: &[u8]) {
        context.done(SaslCode::Auth);
        context.set_desired_state(SaslState::PostedOutcome);
    }

    fn process_mechanisms(&mut self, _context: &mut SaslContext, _offered: &str) -> bool {
        false
    }

    fn process_challenge(&mut self, _context: &mut SaslContext, _challenge: &[u8]) {}

    fn process_response(&mut self, _context: &mut SaslContext, _response: &[u8]) {}
}

#[test]
fn allow_list_excluding_every_offer_aborts_without_init() {
    let mut client = Builder::client()
        .user_password("user", "secret")
        .allowed_mechs("PLAIN")
        .env_config_path(false)
        .build(Recorder::default());
    let mut server = Builder::server()
        .provider(OfferOnly {
            mechs: "ANONYMOUS GSSAPI",
        })
        .env_config_path(false)
        .build(Recorder::default());

    let (c2s, _s2c) = pump(&mut client, &mut server);

    assert!(matches!(client.outcome(), Some(SaslCode::SysPerm)));
    assert!(!client.authenticated());
    assert!(client.tail_closed());
    assert_ne!(client.layer_kind(), LayerKind::Passthrough);

    // Only the header left the client, never an init frame
    assert!(parse_frames(&c2s).is_empty());
}

#[test]
fn passthrough_forwards_pipelined_bytes_untouched() {
    let amqp_bytes = b"AMQP\x00\x01\x00\x00pipelined-open-frame";
    let mut client = Builder::client()
        .env_config_path(false)
        .build(Recorder::with_outbound(amqp_bytes));
    let mut server = Builder::server()
        .env_config_path(false)
        .build(Recorder::default());

    pump(&mut client, &mut server);

    assert_eq!(client.layer_kind(), LayerKind::Passthrough);
    assert_eq!(server.layer_kind(), LayerKind::Passthrough);
    assert_eq!(server.into_upper().received, amqp_bytes);
}
