//! MAVLink vehicle adapter
//!
//! Talks to a PX4/ArduPilot autopilot (hardware or SITL) through the
//! `mavlink` crate. One reader thread owns the blocking receive side of the
//! link and fans every frame out on a broadcast channel. Each call subscribes
//! before it sends, so a call that times out only drops its receiver and
//! never holds the link. The time bound on each call comes from
//! [`GuardedVehicle`](crate::vehicle::GuardedVehicle).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use mavlink::common::{
    MavAutopilot, MavCmd, MavFrame, MavMessage, MavResult, COMMAND_INT_DATA, COMMAND_LONG_DATA,
};
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geo::{Coordinate, Position};
use crate::vehicle::Vehicle;

/// Height above the current position requested by takeoff, in meters
pub const DEFAULT_TAKEOFF_ALTITUDE_M: f64 = 2.5;

/// `MAV_DO_REPOSITION_FLAGS_CHANGE_MODE`: switch to guided mode on reposition
const REPOSITION_CHANGE_MODE: f32 = 1.0;

/// Frames buffered per subscriber before it starts lagging
const FRAME_BUFFER: usize = 1024;

type Link = Arc<dyn MavConnection<MavMessage> + Send + Sync>;
type Frame = (MavHeader, MavMessage);

/// Vehicle backed by a MAVLink connection
pub struct MavlinkVehicle {
    link: Option<Link>,
    frames: Option<broadcast::Receiver<Frame>>,
    reader_stop: Arc<AtomicBool>,
    target_system: u8,
    target_component: u8,
    takeoff_altitude_m: f64,
}

impl MavlinkVehicle {
    pub fn new() -> Self {
        Self {
            link: None,
            frames: None,
            reader_stop: Arc::new(AtomicBool::new(false)),
            target_system: 1,
            target_component: 1,
            takeoff_altitude_m: DEFAULT_TAKEOFF_ALTITUDE_M,
        }
    }

    /// Sets the height gained by the takeoff command
    pub fn with_takeoff_altitude(mut self, takeoff_altitude_m: f64) -> Self {
        self.takeoff_altitude_m = takeoff_altitude_m;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    fn link(&self) -> Result<Link> {
        self.link
            .clone()
            .ok_or_else(|| Error::ConnectionFailure("MAVLink link not connected".to_string()))
    }

    fn send(&self, message: &MavMessage) -> Result<()> {
        self.link()?
            .send_default(message)
            .map_err(|e| Error::ConnectionFailure(format!("Failed to send MAVLink message: {}", e)))?;
        Ok(())
    }

    /// Receiver for every frame read after this call
    fn subscribe(&self) -> Result<broadcast::Receiver<Frame>> {
        self.frames
            .as_ref()
            .map(|frames| frames.resubscribe())
            .ok_or_else(|| Error::ConnectionFailure("MAVLink link not connected".to_string()))
    }

    async fn command_long(&self, command: MavCmd, name: &'static str, params: [f32; 7]) -> Result<()> {
        let message = MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
            command,
            target_system: self.target_system,
            target_component: self.target_component,
            confirmation: 0,
        });

        let frames = self.subscribe()?;
        debug!(command = name, "Sending COMMAND_LONG");
        self.send(&message)?;
        wait_ack(frames, command, name).await
    }

    /// Stops the reader of the current link, if any
    fn stop_reader(&mut self) {
        self.reader_stop.store(true, Ordering::Relaxed);
        self.frames = None;
    }
}

impl Drop for MavlinkVehicle {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

impl Default for MavlinkVehicle {
    fn default() -> Self {
        Self::new()
    }
}

/// Degrees to MAVLink's 1e-7 degree integer encoding
fn to_degrees_e7(value: f64) -> i32 {
    (value * 1e7).round() as i32
}

fn from_degrees_e7(value: i32) -> f64 {
    value as f64 / 1e7
}

/// Starts the thread that owns the link's receive side
///
/// The thread exits on a link I/O error, or after the next frame once `stop`
/// is set. Either way the broadcast sender is dropped and waiting calls see
/// the link as closed.
fn spawn_reader(link: Link, frames: broadcast::Sender<Frame>, stop: Arc<AtomicBool>) -> Result<()> {
    thread::Builder::new()
        .name("mavlink-reader".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match link.recv() {
                    // No subscribers between calls is normal
                    Ok(frame) => {
                        let _ = frames.send(frame);
                    }
                    Err(MessageReadError::Io(e)) => {
                        warn!(error = %e, "MAVLink link read failed, reader stopped");
                        break;
                    }
                    // Corrupt or unknown frames are skipped
                    Err(_) => continue,
                }
            }
            debug!("MAVLink reader exiting");
        })?;

    Ok(())
}

/// Waits for the first frame `pick` accepts
async fn recv_until<T, F>(mut frames: broadcast::Receiver<Frame>, what: &'static str, mut pick: F) -> Result<T>
where
    F: FnMut(&MavHeader, &MavMessage) -> Option<T> + Send,
{
    loop {
        match frames.recv().await {
            Ok((header, message)) => {
                if let Some(value) = pick(&header, &message) {
                    return Ok(value);
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!(what, skipped, "MAVLink subscriber lagged"),
            Err(RecvError::Closed) => {
                return Err(Error::TelemetryUnavailable(format!("{}: MAVLink link closed", what)));
            }
        }
    }
}

/// Waits for the COMMAND_ACK answering `command`
async fn wait_ack(frames: broadcast::Receiver<Frame>, command: MavCmd, name: &'static str) -> Result<()> {
    let result = recv_until(frames, name, move |_, message| match message {
        MavMessage::COMMAND_ACK(ack)
            if ack.command == command && !matches!(ack.result, MavResult::MAV_RESULT_IN_PROGRESS) =>
        {
            Some(ack.result)
        }
        _ => None,
    })
    .await?;

    match result {
        MavResult::MAV_RESULT_ACCEPTED => Ok(()),
        other => Err(Error::CommandRejected {
            command: name,
            reason: format!("{:?}", other),
        }),
    }
}

#[async_trait]
impl Vehicle for MavlinkVehicle {
    fn name(&self) -> &str {
        "mavlink"
    }

    async fn connect(&mut self, address: &str) -> Result<()> {
        let target = address.to_string();
        let connection = tokio::task::spawn_blocking(move || mavlink::connect::<MavMessage>(&target))
            .await
            .map_err(|e| Error::ConnectionFailure(format!("Connect task failed: {}", e)))?
            .map_err(|e| Error::ConnectionFailure(format!("{}: {}", address, e)))?;

        self.stop_reader();
        let link: Link = Arc::from(connection);
        let (tx, rx) = broadcast::channel(FRAME_BUFFER);
        let heartbeats = rx.resubscribe();
        self.reader_stop = Arc::new(AtomicBool::new(false));
        spawn_reader(Arc::clone(&link), tx, Arc::clone(&self.reader_stop))
            .map_err(|e| Error::ConnectionFailure(format!("MAVLink reader: {}", e)))?;
        self.link = Some(link);
        self.frames = Some(rx);

        // The first autopilot heartbeat tells us who to address commands to
        let (system, component) = recv_until(heartbeats, "heartbeat", |header, message| match message {
            MavMessage::HEARTBEAT(heartbeat)
                if !matches!(heartbeat.autopilot, MavAutopilot::MAV_AUTOPILOT_INVALID) =>
            {
                Some((header.system_id, header.component_id))
            }
            _ => None,
        })
        .await
        .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

        self.target_system = system;
        self.target_component = component;
        info!(address, system, component, "Autopilot heartbeat received");
        Ok(())
    }

    async fn arm(&mut self) -> Result<()> {
        self.command_long(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, "arm", [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .await
    }

    async fn disarm(&mut self) -> Result<()> {
        self.command_long(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, "disarm", [0.0; 7])
            .await
    }

    async fn takeoff(&mut self) -> Result<()> {
        let position = self.read_position().await?;
        let altitude = (position.absolute_altitude_m + self.takeoff_altitude_m) as f32;

        self.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            "takeoff",
            [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, altitude],
        )
        .await
    }

    async fn goto_location(&mut self, target: Coordinate, altitude_m: f64, heading_deg: f64) -> Result<()> {
        let message = MavMessage::COMMAND_INT(COMMAND_INT_DATA {
            param1: -1.0,
            param2: REPOSITION_CHANGE_MODE,
            param3: 0.0,
            param4: heading_deg as f32,
            x: to_degrees_e7(target.latitude_deg),
            y: to_degrees_e7(target.longitude_deg),
            z: altitude_m as f32,
            command: MavCmd::MAV_CMD_DO_REPOSITION,
            target_system: self.target_system,
            target_component: self.target_component,
            frame: MavFrame::MAV_FRAME_GLOBAL,
            current: 0,
            autocontinue: 0,
        });

        let frames = self.subscribe()?;
        self.send(&message)?;
        wait_ack(frames, MavCmd::MAV_CMD_DO_REPOSITION, "goto_location").await
    }

    async fn return_to_launch(&mut self) -> Result<()> {
        self.command_long(
            MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH,
            "return_to_launch",
            [0.0; 7],
        )
        .await
    }

    async fn read_position(&mut self) -> Result<Position> {
        recv_until(self.subscribe()?, "read_position", |_, message| match message {
            MavMessage::GLOBAL_POSITION_INT(data) => Some(Position::new(
                Coordinate::new(from_degrees_e7(data.lat), from_degrees_e7(data.lon)),
                data.alt as f64 / 1000.0,
            )),
            _ => None,
        })
        .await
    }

    async fn read_battery(&mut self) -> Result<f64> {
        // battery_remaining is -1 when the autopilot does not know
        recv_until(self.subscribe()?, "read_battery", |_, message| match message {
            MavMessage::SYS_STATUS(data) if data.battery_remaining >= 0 => {
                Some(data.battery_remaining as f64)
            }
            _ => None,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mavlink::common::{MavModeFlag, MavState, MavType, COMMAND_ACK_DATA, HEARTBEAT_DATA};
    use tokio::time::timeout;

    fn free_udp_port() -> u16 {
        std::net::UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    /// Loopback autopilot: a heartbeat every 50 ms and an accepted ACK for
    /// every COMMAND_LONG. It never reports SYS_STATUS.
    fn spawn_autopilot(vehicle_port: u16) -> Arc<AtomicBool> {
        let link: Link = Arc::from(
            mavlink::connect::<MavMessage>(&format!("udpout:127.0.0.1:{}", vehicle_port)).unwrap(),
        );
        let stop = Arc::new(AtomicBool::new(false));

        let heartbeat_link = Arc::clone(&link);
        let heartbeat_stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !heartbeat_stop.load(Ordering::Relaxed) {
                let _ = heartbeat_link.send_default(&MavMessage::HEARTBEAT(HEARTBEAT_DATA {
                    custom_mode: 0,
                    mavtype: MavType::MAV_TYPE_QUADROTOR,
                    autopilot: MavAutopilot::MAV_AUTOPILOT_PX4,
                    base_mode: MavModeFlag::empty(),
                    system_status: MavState::MAV_STATE_STANDBY,
                    mavlink_version: 3,
                }));
                thread::sleep(Duration::from_millis(50));
            }
        });

        let ack_stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !ack_stop.load(Ordering::Relaxed) {
                if let Ok((_, MavMessage::COMMAND_LONG(command))) = link.recv() {
                    let _ = link.send_default(&MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
                        command: command.command,
                        result: MavResult::MAV_RESULT_ACCEPTED,
                        progress: 0,
                        result_param2: 0,
                        target_system: 0,
                        target_component: 0,
                    }));
                }
            }
        });

        stop
    }

    #[tokio::test]
    async fn test_timed_out_read_leaves_link_usable() {
        let port = free_udp_port();
        let autopilot = spawn_autopilot(port);

        let mut vehicle = MavlinkVehicle::new();
        timeout(Duration::from_secs(5), vehicle.connect(&format!("udpin:127.0.0.1:{}", port)))
            .await
            .expect("no heartbeat from loopback autopilot")
            .unwrap();
        assert!(vehicle.is_connected());

        // No SYS_STATUS is ever sent, so the read is abandoned by the timeout
        assert!(timeout(Duration::from_millis(300), vehicle.read_battery()).await.is_err());

        // The abandoned read must not consume the ACK for the next command
        timeout(Duration::from_secs(2), vehicle.arm())
            .await
            .expect("arm acknowledgement was not delivered")
            .unwrap();
        timeout(Duration::from_secs(2), vehicle.disarm())
            .await
            .expect("disarm acknowledgement was not delivered")
            .unwrap();

        autopilot.store(true, Ordering::Relaxed);
    }

    #[test]
    fn test_degrees_e7_encoding() {
        assert_eq!(to_degrees_e7(47.397742), 473_977_420);
        assert_eq!(to_degrees_e7(-122.0), -1_220_000_000);
        assert!((from_degrees_e7(85_455_940) - 8.545594).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_commands_fail_before_connect() {
        let mut vehicle = MavlinkVehicle::new();
        assert!(!vehicle.is_connected());
        assert!(matches!(vehicle.arm().await, Err(Error::ConnectionFailure(_))));
        assert!(matches!(vehicle.read_battery().await, Err(Error::ConnectionFailure(_))));
    }

    #[tokio::test]
    async fn test_invalid_address_is_connection_failure() {
        let mut vehicle = MavlinkVehicle::new();
        let err = vehicle.connect("not-a-transport").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailure(_)));
    }
}
