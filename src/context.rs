//! Per-transport negotiation context

use std::path::{Path, PathBuf};

use bytes::Bytes;
use fe2o3_amqp_types::sasl::SaslCode;
use tracing::error;

use crate::event::{Collector, TransportEvent};
use crate::state::{Role, SaslState};

/// Negotiation state shared between the I/O layer and the mechanism
/// provider.
///
/// The layer owns the context for the lifetime of the transport; providers
/// receive it on every callback and advance the exchange by staging bytes,
/// recording the outcome and requesting the next posted state.
#[derive(Debug)]
pub struct SaslContext {
    role: Role,
    desired_state: SaslState,
    last_state: SaslState,
    selected_mechanism: Option<String>,
    included_mechanisms: Option<String>,
    username: Option<String>,
    password: Option<String>,
    config_name: String,
    config_dir: Option<PathBuf>,
    remote_fqdn: Option<String>,
    external_auth: Option<String>,
    external_ssf: u32,
    outcome: Option<SaslCode>,
    bytes_out: Bytes,
    input_bypass: bool,
    output_bypass: bool,
    collector: Option<Collector>,
}

impl SaslContext {
    pub(crate) fn new(role: Role) -> Self {
        let config_name = match role {
            Role::Client => "amqp-sasl-client",
            Role::Server => "amqp-sasl-server",
        };
        Self {
            role,
            desired_state: SaslState::None,
            last_state: SaslState::None,
            selected_mechanism: None,
            included_mechanisms: None,
            username: None,
            password: None,
            config_name: String::from(config_name),
            config_dir: None,
            remote_fqdn: None,
            external_auth: None,
            external_ssf: 0,
            outcome: None,
            bytes_out: Bytes::new(),
            input_bypass: false,
            output_bypass: false,
            collector: None,
        }
    }

    /// Which side of the exchange this context belongs to
    pub fn role(&self) -> Role {
        self.role
    }

    /// The furthest state the drive loop has emitted
    pub fn last_state(&self) -> SaslState {
        self.last_state
    }

    /// The state the exchange intends to reach
    pub fn desired_state(&self) -> SaslState {
        self.desired_state
    }

    /// Username configured on a client, or the authenticated identity on a
    /// server once the exchange concluded
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Password configured on a client
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Fully qualified domain name of the peer
    pub fn remote_fqdn(&self) -> Option<&str> {
        self.remote_fqdn.as_deref()
    }

    /// Identity established by a lower security layer
    pub fn external_auth(&self) -> Option<&str> {
        self.external_auth.as_deref()
    }

    /// Security strength factor inherited from a lower security layer,
    /// zero when there is none
    pub fn external_ssf(&self) -> u32 {
        self.external_ssf
    }

    /// Provider configuration name
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Provider configuration directory
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    /// The mechanism chosen for this exchange
    pub fn selected_mechanism(&self) -> Option<&str> {
        self.selected_mechanism.as_deref()
    }

    /// Space separated allow-list of mechanisms, `None` when unrestricted
    pub fn included_mechanisms(&self) -> Option<&str> {
        self.included_mechanisms.as_deref()
    }

    /// Outcome of the exchange, `None` until concluded
    pub fn outcome(&self) -> Option<SaslCode> {
        self.outcome.clone()
    }

    /// Records the mechanism chosen for this exchange
    pub fn select_mechanism(&mut self, mechanism: &str) {
        self.selected_mechanism = Some(String::from(mechanism));
    }

    /// Stages the body of the next init, challenge or response frame
    pub fn stage_bytes_out(&mut self, bytes: Bytes) {
        self.bytes_out = bytes;
    }

    /// Records the outcome of the exchange
    pub fn done(&mut self, code: SaslCode) {
        self.outcome = Some(code);
    }

    /// Replaces the username
    pub fn set_username(&mut self, username: Option<&str>) {
        self.username = username.map(String::from);
    }

    /// Requests that the exchange advance to `desired`.
    ///
    /// Backward transitions and states that are not legal for this role are
    /// logged and suppressed. Requesting the already-emitted challenge or
    /// response state rewinds progress one step so the frame is emitted
    /// again on the next drive.
    pub fn set_desired_state(&mut self, desired: SaslState) {
        if self.last_state > desired {
            error!(
                ?desired,
                last_state = ?self.last_state,
                "attempt to post a SASL frame for an earlier state"
            );
        } else if !desired.is_legal_for(self.role) {
            error!(?desired, role = ?self.role, "SASL state is not legal for this role");
        } else {
            if self.last_state == desired && matches!(desired, SaslState::PostedResponse) {
                self.last_state = SaslState::PostedInit;
            }
            if self.last_state == desired && matches!(desired, SaslState::PostedChallenge) {
                self.last_state = SaslState::PostedMechanisms;
            }
            self.desired_state = desired;
            self.emit(TransportEvent::Progress);
        }
    }

    pub(crate) fn set_last_state(&mut self, state: SaslState) {
        self.last_state = state;
    }

    pub(crate) fn bytes_out(&self) -> &Bytes {
        &self.bytes_out
    }

    pub(crate) fn input_bypass(&self) -> bool {
        self.input_bypass
    }

    pub(crate) fn output_bypass(&self) -> bool {
        self.output_bypass
    }

    pub(crate) fn set_input_bypass(&mut self) {
        self.input_bypass = true;
    }

    pub(crate) fn set_output_bypass(&mut self) {
        self.output_bypass = true;
    }

    pub(crate) fn set_included_mechanisms(&mut self, mechs: Option<&str>) {
        self.included_mechanisms = mechs.map(String::from);
    }

    pub(crate) fn set_user_password(&mut self, username: Option<&str>, password: Option<&str>) {
        self.username = username.map(String::from);
        self.password = password.map(String::from);
    }

    pub(crate) fn set_external_security(&mut self, ssf: u32, authid: Option<&str>) {
        self.external_ssf = ssf;
        self.external_auth = authid.map(String::from);
    }

    pub(crate) fn set_remote_hostname(&mut self, fqdn: Option<&str>) {
        self.remote_fqdn = fqdn.map(String::from);
    }

    pub(crate) fn set_config_name(&mut self, name: &str) {
        self.config_name = String::from(name);
    }

    pub(crate) fn set_config_dir(&mut self, dir: Option<PathBuf>) {
        self.config_dir = dir;
    }

    pub(crate) fn set_collector(&mut self, collector: Collector) {
        self.collector = Some(collector);
    }

    pub(crate) fn emit(&self, event: TransportEvent) {
        if let Some(collector) = &self.collector {
            collector.put(event);
        }
    }

    /// No more SASL frames are expected from the peer
    pub(crate) fn is_final_input_state(&self) -> bool {
        matches!(self.last_state, SaslState::RecvedOutcome)
            || matches!(
                self.desired_state,
                SaslState::RecvedOutcome | SaslState::PostedOutcome
            )
    }

    /// Every frame this side will ever emit has been emitted
    pub(crate) fn is_final_output_state(&self) -> bool {
        matches!(
            self.last_state,
            SaslState::PretendOutcome | SaslState::RecvedOutcome | SaslState::PostedOutcome
        )
    }

    pub(crate) fn outcome_is_ok(&self) -> bool {
        matches!(self.outcome, Some(SaslCode::Ok))
    }
}
