//! UDP command server
//!
//! Owns the datagram socket the controller talks to. Receiving and sending
//! are thin wrappers over the socket; the interesting part is the optional
//! comms realism layer, which simulates the mower driving out of WiFi range
//! by dropping whole requests for a configured window.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use rand::Rng;
use thiserror::Error;

// Internal
use crate::params::{CommsRealismParams, SimExecParams};
use mower_if::cmd::{Command, Request};

// Standard
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Largest accepted request datagram.
const MAX_DATAGRAM_BYTES: usize = 1024;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The command server.
pub struct SimServer {
    socket: UdpSocket,

    realism: CommsRealismParams,

    /// End of the current offline window, if one is active.
    offline_until: Option<Instant>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors during server operation. Only `BindError` is fatal; the
/// others are logged and the serving loop continues.
#[derive(Debug, Error)]
pub enum SimServerError {
    #[error("Cannot bind the command socket to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("Socket IO failure: {0}")]
    TransientIo(#[from] std::io::Error),

    #[error("Received datagram is not valid UTF-8: {0}")]
    NotUtf8(std::str::Utf8Error),
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl SimServer {
    /// Bind the command socket described by the parameters.
    pub fn new(params: &SimExecParams) -> Result<Self, SimServerError> {
        let socket = UdpSocket::bind(&params.bind_endpoint)
            .map_err(|e| SimServerError::BindError(params.bind_endpoint.clone(), e))?;

        info!("Command socket bound to {}", params.bind_endpoint);

        // A bad probability in the param file must not be able to panic the
        // serving loop later
        let mut realism = params.comms_realism.clone();
        if !(0.0..=1.0).contains(&realism.fail_prob) {
            warn!(
                "Comms fail_prob {} outside [0, 1], clamping",
                realism.fail_prob
            );
            realism.fail_prob = realism.fail_prob.max(0.0).min(1.0);
        }

        Ok(SimServer {
            socket,
            realism,
            offline_until: None,
        })
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, SimServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Block until the next request datagram arrives.
    pub fn recv(&self) -> Result<(String, SocketAddr), SimServerError> {
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];
        let (len, sender) = self.socket.recv_from(&mut buf)?;

        let text = std::str::from_utf8(&buf[..len]).map_err(SimServerError::NotUtf8)?;

        trace!("{} bytes from {}: {}", len, sender, text);

        Ok((String::from(text), sender))
    }

    /// Send a textual reply back to a sender.
    pub fn send(&self, reply: &str, dest: SocketAddr) -> Result<(), SimServerError> {
        self.socket.send_to(reply.as_bytes(), dest)?;
        Ok(())
    }

    /// Run the per-message comms trial and report whether the link is up.
    ///
    /// While online, each received message runs one Bernoulli trial which
    /// may start an offline window of `fail_duration_s`. Call this exactly
    /// once per received datagram, whether or not it parses.
    pub fn comms_online(&mut self) -> bool {
        if !self.realism.enabled {
            return true;
        }

        if let Some(until) = self.offline_until {
            if Instant::now() >= until {
                info!("Comms back online");
                self.offline_until = None;
            }
        }

        if self.offline_until.is_none() {
            if rand::thread_rng().gen_bool(self.realism.fail_prob) {
                warn!(
                    "Comms dropped offline for {} s",
                    self.realism.fail_duration_s
                );
                self.offline_until =
                    Some(Instant::now() + Duration::from_secs_f64(self.realism.fail_duration_s));
            } else {
                return true;
            }
        }

        false
    }

    /// Decide whether a request gets through the simulated comms link.
    ///
    /// Runs the per-message trial via [`SimServer::comms_online`]. While
    /// offline, synchronous requests are admitted only if every command is
    /// `get_pose`, asynchronous ones only if every command is `set_pose`;
    /// everything else is dropped without a reply.
    pub fn admit(&mut self, request: &Request) -> bool {
        if self.comms_online() {
            return true;
        }

        let admitted = if request.sync {
            request.cmds.iter().all(|c| matches!(c, Command::GetPose))
        } else {
            request
                .cmds
                .iter()
                .all(|c| matches!(c, Command::SetPose { .. }))
        };

        if !admitted {
            trace!("Request dropped by comms realism");
        }

        admitted
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::SimExecParams;

    fn test_params(realism: CommsRealismParams) -> SimExecParams {
        SimExecParams {
            bind_endpoint: String::from("127.0.0.1:0"),
            initial_battery_charge: 1000,
            simulate_battery: true,
            default_ssid: String::from("mower-sim"),
            comms_realism: realism,
        }
    }

    fn forced_outage() -> CommsRealismParams {
        CommsRealismParams {
            enabled: true,
            fail_prob: 1.0,
            fail_duration_s: 60.0,
        }
    }

    fn no_realism() -> CommsRealismParams {
        CommsRealismParams {
            enabled: false,
            fail_prob: 1.0,
            fail_duration_s: 60.0,
        }
    }

    #[test]
    fn test_recv_send_round_trip() {
        let server = SimServer::new(&test_params(no_realism())).unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();

        client
            .send_to(b">get_pose()", server.local_addr().unwrap())
            .unwrap();

        let (text, sender) = server.recv().unwrap();
        assert_eq!(text, ">get_pose()");

        server.send("0.000,0.000,0.000", sender).unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"0.000,0.000,0.000");
    }

    #[test]
    fn test_realism_disabled_admits_everything() {
        let mut server = SimServer::new(&test_params(no_realism())).unwrap();

        let request = Request::parse("sweep(50,50,1000)").unwrap();
        assert!(server.admit(&request));
    }

    #[test]
    fn test_outage_admits_sync_get_pose_only() {
        let mut server = SimServer::new(&test_params(forced_outage())).unwrap();

        assert!(server.admit(&Request::parse(">get_pose()").unwrap()));
        assert!(!server.admit(&Request::parse(">get_telemetry()").unwrap()));
        assert!(!server.admit(&Request::parse(">get_pose()!get_telemetry()").unwrap()));
    }

    #[test]
    fn test_outage_admits_async_set_pose_only() {
        let mut server = SimServer::new(&test_params(forced_outage())).unwrap();

        assert!(server.admit(&Request::parse("set_pose(0,0,0)").unwrap()));
        assert!(!server.admit(&Request::parse("sweep(50,50,1000)").unwrap()));
        // The marker matters: a synchronous set_pose is dropped offline
        assert!(!server.admit(&Request::parse(">set_pose(0,0,0)").unwrap()));
    }

    #[test]
    fn test_comms_online_trips_per_message() {
        let mut server = SimServer::new(&test_params(forced_outage())).unwrap();

        // The trial runs per received message, so even unparseable traffic
        // trips the outage and gets no reply
        assert!(!server.comms_online());
        assert!(server.offline_until.is_some());
        assert!(!server.comms_online());
    }

    #[test]
    fn test_comms_online_without_realism() {
        let mut server = SimServer::new(&test_params(no_realism())).unwrap();

        assert!(server.comms_online());
        assert!(server.offline_until.is_none());
    }

    #[test]
    fn test_out_of_range_fail_prob_clamped() {
        let sweep = Request::parse("sweep(50,50,1000)").unwrap();

        // Above 1: behaves as a forced outage instead of panicking
        let mut params = forced_outage();
        params.fail_prob = 7.5;
        let mut server = SimServer::new(&test_params(params)).unwrap();
        assert!(!server.admit(&sweep));

        // Below 0: never drops
        let mut params = forced_outage();
        params.fail_prob = -0.5;
        let mut server = SimServer::new(&test_params(params)).unwrap();
        assert!(server.admit(&sweep));
    }

    #[test]
    fn test_outage_window_expires() {
        let mut params = forced_outage();
        params.fail_duration_s = 0.05;
        let mut server = SimServer::new(&test_params(params)).unwrap();

        let request = Request::parse("sweep(50,50,1000)").unwrap();
        assert!(!server.admit(&request));

        std::thread::sleep(Duration::from_millis(80));

        // fail_prob 1.0 trips straight into a new window, so the request is
        // still dropped but a fresh deadline is armed
        assert!(!server.admit(&request));
        assert!(server.offline_until.unwrap() > Instant::now());
    }
}
