// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CAM data model: the beacon every node broadcasts.
//!
//! Shapes follow ETSI EN 302 637-2 naming (ItsPduHeader, CoopAwareness,
//! containers) restricted to this simulation profile: planar positions, a
//! flat high-frequency container, and symbolic enum names on the wire.

use crate::config::{GENERATION_DELTA_TIME_WRAP, ITS_EPOCH_UNIX_MS, PROTOCOL_VERSION};
use crate::source::CamSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ITS message kinds carried in [`ItsPduHeader`]. Discriminants follow the
/// ETSI numbering; the wire carries the symbolic name, and unknown names are
/// rejected at decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageId {
    Denm = 1,
    Cam = 2,
    Poi = 3,
    Spatem = 4,
    Mapem = 5,
    Ivim = 6,
    EvRsr = 7,
    Tistpgtransaction = 8,
    Srem = 9,
    Ssem = 10,
    Evcsn = 11,
    Saem = 12,
    Rtcmem = 13,
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageId::Denm => "DENM",
            MessageId::Cam => "CAM",
            MessageId::Poi => "POI",
            MessageId::Spatem => "SPATEM",
            MessageId::Mapem => "MAPEM",
            MessageId::Ivim => "IVIM",
            MessageId::EvRsr => "EV_RSR",
            MessageId::Tistpgtransaction => "TISTPGTRANSACTION",
            MessageId::Srem => "SREM",
            MessageId::Ssem => "SSEM",
            MessageId::Evcsn => "EVCSN",
            MessageId::Saem => "SAEM",
            MessageId::Rtcmem => "RTCMEM",
        };
        write!(f, "{}", name)
    }
}

/// Originating station kinds, ETSI numbering (note the 12..14 gap before
/// road-side units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StationType {
    Unknown = 0,
    Pedestrian = 1,
    Cyclist = 2,
    Moped = 3,
    Motorcycle = 4,
    PassengerCar = 5,
    Bus = 6,
    LightTruck = 7,
    HeavyTruck = 8,
    Trailer = 9,
    SpecialVehicles = 10,
    Tram = 11,
    RoadSideUnit = 15,
}

impl std::fmt::Display for StationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StationType::Unknown => "UNKNOWN",
            StationType::Pedestrian => "PEDESTRIAN",
            StationType::Cyclist => "CYCLIST",
            StationType::Moped => "MOPED",
            StationType::Motorcycle => "MOTORCYCLE",
            StationType::PassengerCar => "PASSENGER_CAR",
            StationType::Bus => "BUS",
            StationType::LightTruck => "LIGHT_TRUCK",
            StationType::HeavyTruck => "HEAVY_TRUCK",
            StationType::Trailer => "TRAILER",
            StationType::SpecialVehicles => "SPECIAL_VEHICLES",
            StationType::Tram => "TRAM",
            StationType::RoadSideUnit => "ROAD_SIDE_UNIT",
        };
        write!(f, "{}", name)
    }
}

/// Fixed per-process header: protocol version and message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItsPduHeader {
    pub protocol_version: u8,
    #[serde(rename = "messageID")]
    pub message_id: MessageId,
}

/// Planar reference position in simulation coordinates (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePosition {
    pub posx: f64,
    pub posy: f64,
}

/// Station kind plus current reference position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicContainer {
    pub station_type: StationType,
    pub reference_position: ReferencePosition,
}

/// Per-cycle kinematic state plus local-only platoon metadata.
///
/// Equality covers the transmitted fields only; `platoon` never leaves the
/// process and is excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicVehicleContainerHighFrequency {
    pub distance: f64,
    pub relative_speed: f64,
    pub node_id: u32,
    pub acceleration: f64,
    pub controller_acceleration: f64,
    pub speed: f64,
    /// Simulation metadata; never transmitted.
    #[serde(skip)]
    pub platoon: PlatoonProfile,
}

impl PartialEq for BasicVehicleContainerHighFrequency {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
            && self.relative_speed == other.relative_speed
            && self.node_id == other.node_id
            && self.acceleration == other.acceleration
            && self.controller_acceleration == other.controller_acceleration
            && self.speed == other.speed
    }
}

/// Both containers of the cooperative awareness body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamParameters {
    pub basic_container: BasicContainer,
    pub high_frequency_container: BasicVehicleContainerHighFrequency,
}

/// Cooperative awareness body: timestamp plus containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoopAwareness {
    /// Milliseconds since the ITS epoch modulo 65536, stamped immediately
    /// before each transmission.
    pub generation_delta_time: u16,
    pub cam_parameters: CamParameters,
}

impl CoopAwareness {
    /// Re-stamp `generation_delta_time` from the wall clock. The sender
    /// calls this right before every transmission; the value is never
    /// persisted between sends.
    pub fn refresh_timestamp(&mut self) {
        self.generation_delta_time = generation_delta_time_at(Utc::now());
    }
}

/// One complete beacon: header plus cooperative awareness body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamMessage {
    pub header: ItsPduHeader,
    pub cam: CoopAwareness,
}

impl CamMessage {
    /// Build the initial beacon for `node_id`.
    ///
    /// The header is fixed for the process lifetime (version 2, kind CAM,
    /// passenger car). Kinematics start from a stock snapshot and are
    /// overwritten by the first sample before anything is transmitted.
    pub fn new(node_id: u32) -> Self {
        Self {
            header: ItsPduHeader {
                protocol_version: PROTOCOL_VERSION,
                message_id: MessageId::Cam,
            },
            cam: CoopAwareness {
                generation_delta_time: generation_delta_time_at(Utc::now()),
                cam_parameters: CamParameters {
                    basic_container: BasicContainer {
                        station_type: StationType::PassengerCar,
                        reference_position: ReferencePosition {
                            posx: 100.0,
                            posy: 200.0,
                        },
                    },
                    high_frequency_container: BasicVehicleContainerHighFrequency {
                        distance: 10.5,
                        relative_speed: 1.2,
                        node_id,
                        acceleration: 2.0,
                        controller_acceleration: 1.5,
                        speed: 60.0,
                        platoon: PlatoonProfile::default(),
                    },
                },
            },
        }
    }

    /// Overwrite the six kinematic fields and the two position fields from
    /// one sample, in place. The header and platoon profile are untouched.
    pub fn apply_sample(&mut self, sample: &CamSample) {
        let hf = &mut self.cam.cam_parameters.high_frequency_container;
        hf.distance = sample.distance;
        hf.relative_speed = sample.relative_speed;
        hf.node_id = sample.node_id;
        hf.acceleration = sample.acceleration;
        hf.controller_acceleration = sample.controller_acceleration;
        hf.speed = sample.speed;

        let pos = &mut self.cam.cam_parameters.basic_container.reference_position;
        pos.posx = sample.posx;
        pos.posy = sample.posy;
    }

    /// Node id currently carried in the high-frequency container.
    pub fn node_id(&self) -> u32 {
        self.cam.cam_parameters.high_frequency_container.node_id
    }
}

/// Static platoon metadata kept alongside the kinematics for logging and
/// analysis. Never serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatoonProfile {
    /// Heading of the platoon lead vehicle (degrees).
    pub heading: f64,
    /// Leader time headway (seconds).
    pub leader_headway: f64,
    /// Leader cruise speed (km/h).
    pub leader_speed: f64,
    /// Vehicles in the simulation.
    pub n_cars: u32,
    /// Lanes on the simulated road.
    pub n_lanes: u32,
    /// Application payload size assumed by the channel model (bytes).
    pub packet_size: u32,
    /// Vehicles in this platoon.
    pub platoon_size: u32,
    /// Longitudinal controller name.
    pub controller: String,
    /// CACC constant spacing target (meters).
    pub cacc_spacing: f64,
    /// ITS-G5 carrier frequency (Hz).
    pub carrier_frequency: f64,
    /// Vehicle length (meters).
    pub car_length: f64,
    /// Maximum deceleration (m/s^2).
    pub max_deceleration: f64,
    /// Maximum acceleration (m/s^2).
    pub max_acceleration: f64,
}

impl Default for PlatoonProfile {
    fn default() -> Self {
        Self {
            heading: 0.0,
            leader_headway: 1.2,
            leader_speed: 80.0,
            n_cars: 6,
            n_lanes: 1,
            packet_size: 200,
            platoon_size: 6,
            controller: "CACC".to_string(),
            cacc_spacing: 5.0,
            carrier_frequency: 5.89e9,
            car_length: 4.0,
            max_deceleration: 6.0,
            max_acceleration: 2.5,
        }
    }
}

/// Milliseconds elapsed since the ITS epoch modulo 65536, at `now`.
///
/// Pure over the supplied instant so the wrap behavior is testable against
/// fixed clocks.
pub fn generation_delta_time_at(now: DateTime<Utc>) -> u16 {
    let elapsed_ms = now.timestamp_millis() - ITS_EPOCH_UNIX_MS;
    elapsed_ms.rem_euclid(GENERATION_DELTA_TIME_WRAP) as u16
}
