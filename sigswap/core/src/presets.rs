//! Built-in rule sets.

use std::str::FromStr;

use crate::mapping::SignalMapping;

/// Named rule set that ships with the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Session start-up set: a few powertrain and body signals.
    Default,
    /// Engine and transmission signals.
    Powertrain,
    /// Brake, steering, and wheel-speed signals.
    Chassis,
}

impl Preset {
    /// Every preset, in listing order.
    pub const ALL: [Preset; 3] = [Preset::Default, Preset::Powertrain, Preset::Chassis];

    /// Lower-case name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Powertrain => "powertrain",
            Preset::Chassis => "chassis",
        }
    }

    /// The preset's rules with ids `1..=n`.
    pub fn rules(self) -> Vec<SignalMapping> {
        let table: &[(&str, &str, &str)] = match self {
            Preset::Default => &[
                ("$EngineSpeed", "@sysvar::Engine::Speed", "Engine speed in rpm"),
                ("$VehicleSpeed", "@sysvar::Vehicle::Speed", "Vehicle speed in km/h"),
                ("$IgnitionState", "@sysvar::Body::Ignition", "Terminal 15 state"),
                ("EngineMsg.Torque", "@sysvar::Engine::Torque", "CAN torque signal"),
                ("output(EngineMsg)", "sysSetVariable(Engine::Msg)", "Frame send call"),
            ],
            Preset::Powertrain => &[
                ("$EngineSpeed", "@sysvar::Engine::Speed", "Engine speed in rpm"),
                ("$EngineTemp", "@sysvar::Engine::CoolantTemp", "Coolant temperature"),
                ("$ThrottlePos", "@sysvar::Engine::Throttle", "Throttle position in %"),
                ("$GearActual", "@sysvar::Trans::Gear", "Engaged gear"),
                ("$GearTarget", "@sysvar::Trans::TargetGear", "Requested gear"),
                ("EngineMsg.Torque", "@sysvar::Engine::Torque", "CAN torque signal"),
                ("TransMsg.Gear", "@sysvar::Trans::GearRaw", "CAN gear signal"),
            ],
            Preset::Chassis => &[
                ("$Speed", "@sysvar::Chassis::Speed", "Reference speed"),
                ("$SpeedFront", "@sysvar::Chassis::SpeedFront", "Front axle speed"),
                ("$SpeedRear", "@sysvar::Chassis::SpeedRear", "Rear axle speed"),
                ("$BrakePressure", "@sysvar::Chassis::BrakePressure", "Master cylinder pressure"),
                ("$SteeringAngle", "@sysvar::Chassis::SteeringAngle", "Steering wheel angle"),
                ("BrakeMsg.Active", "@sysvar::Chassis::BrakeActive", "CAN brake flag"),
            ],
        };
        table
            .iter()
            .enumerate()
            .map(|(i, (real, sim, description))| {
                SignalMapping::new((i + 1).to_string(), *real, *sim).with_description(*description)
            })
            .collect()
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| format!("unknown preset {:?} (available: {})", s.trim(), names()))
    }
}

/// Comma-separated preset names.
pub fn names() -> String {
    Preset::ALL
        .iter()
        .map(|preset| preset.name())
        .collect::<Vec<_>>()
        .join(", ")
}
