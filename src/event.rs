//! Typed events flowing through the dispatch registry.
//!
//! Every [`Event`] variant carries its own payload type, so processors and
//! subscribers pattern-match instead of probing free-form maps. Each payload
//! has an `annotations` map that processors use for enrichment.

use std::{borrow::Cow, collections::BTreeMap, fmt, str::FromStr};

use crate::Error;

pub type Annotations = BTreeMap<String, String>;

/// The closed set of event types the dashboard produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EventKind {
    Voice,
    Pose,
    Face,
    Location,
    Biometric,
    Environmental,
    Emergency,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Voice,
        EventKind::Pose,
        EventKind::Face,
        EventKind::Location,
        EventKind::Biometric,
        EventKind::Environmental,
        EventKind::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Voice => "voice",
            EventKind::Pose => "pose",
            EventKind::Face => "face",
            EventKind::Location => "location",
            EventKind::Biometric => "biometric",
            EventKind::Environmental => "environmental",
            EventKind::Emergency => "emergency",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::external(format!("unknown event kind '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VoiceAnalysis {
    pub transcript: String,
    /// 0.0 (calm) to 1.0 (highly stressed).
    pub stress_level: f32,
    pub distress_keywords: Vec<String>,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoseAnalysis {
    pub posture: String,
    pub fall_detected: bool,
    pub confidence: f32,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FaceAnalysis {
    pub emotion: String,
    pub confidence: f32,
    pub recognized: bool,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f32,
    pub annotations: Annotations,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f32) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            annotations: Annotations::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BiometricReading {
    pub heart_rate_bpm: u16,
    pub spo2_percent: f32,
    pub skin_temp_c: f32,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvironmentalReading {
    pub temperature_c: f32,
    pub noise_db: f32,
    pub air_quality_index: u16,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EmergencyAlert {
    pub reason: String,
    pub location: Option<LocationFix>,
    pub annotations: Annotations,
}

impl EmergencyAlert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, location: LocationFix) -> Self {
        self.location = Some(location);
        self
    }
}

/// An event together with its strongly typed payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", content = "payload", rename_all = "lowercase")
)]
pub enum Event {
    Voice(VoiceAnalysis),
    Pose(PoseAnalysis),
    Face(FaceAnalysis),
    Location(LocationFix),
    Biometric(BiometricReading),
    Environmental(EnvironmentalReading),
    Emergency(EmergencyAlert),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Voice(_) => EventKind::Voice,
            Event::Pose(_) => EventKind::Pose,
            Event::Face(_) => EventKind::Face,
            Event::Location(_) => EventKind::Location,
            Event::Biometric(_) => EventKind::Biometric,
            Event::Environmental(_) => EventKind::Environmental,
            Event::Emergency(_) => EventKind::Emergency,
        }
    }

    /// Human-readable name used in logs.
    pub fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.kind().as_str())
    }

    pub fn annotations(&self) -> &Annotations {
        match self {
            Event::Voice(p) => &p.annotations,
            Event::Pose(p) => &p.annotations,
            Event::Face(p) => &p.annotations,
            Event::Location(p) => &p.annotations,
            Event::Biometric(p) => &p.annotations,
            Event::Environmental(p) => &p.annotations,
            Event::Emergency(p) => &p.annotations,
        }
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        match self {
            Event::Voice(p) => &mut p.annotations,
            Event::Pose(p) => &mut p.annotations,
            Event::Face(p) => &mut p.annotations,
            Event::Location(p) => &mut p.annotations,
            Event::Biometric(p) => &mut p.annotations,
            Event::Environmental(p) => &mut p.annotations,
            Event::Emergency(p) => &mut p.annotations,
        }
    }

    /// Attach an enrichment key to the payload, returning the event.
    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations_mut().insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            Event::Emergency(EmergencyAlert::new("fall")).kind(),
            EventKind::Emergency
        );
        assert_eq!(
            Event::Location(LocationFix::new(51.5, -0.12, 5.0)).kind(),
            EventKind::Location
        );
        assert_eq!(
            Event::Biometric(BiometricReading::default()).name(),
            "biometric"
        );
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("voice".parse::<EventKind>().unwrap(), EventKind::Voice);
        assert_eq!(
            " Environmental ".parse::<EventKind>().unwrap(),
            EventKind::Environmental
        );
        assert!("quantum".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_annotate() {
        let event = Event::Voice(VoiceAnalysis::default()).annotate("lang", "en");
        assert_eq!(event.annotations().get("lang").map(String::as_str), Some("en"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_wire_shape() {
        let event: Event = serde_json::from_str(
            r#"{"type":"location","payload":{"latitude":1.5,"longitude":2.5,"accuracy_m":3.0}}"#,
        )
        .unwrap();
        assert_eq!(event, Event::Location(LocationFix::new(1.5, 2.5, 3.0)));
    }
}
