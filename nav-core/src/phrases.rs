//! Phrasebook for instruction labels, announcements, and alerts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{NavError, PositionError};

/// Language of every user-facing string the navigation core produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Korean,
}

impl Language {
    /// Two-letter code used in config files and on the command line.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Korean => "ko",
        }
    }

    /// Label synthesized from a maneuver type and optional modifier.
    pub fn maneuver_label(self, maneuver_type: &str, modifier: Option<&str>) -> String {
        let label = match (self, maneuver_type, modifier.unwrap_or("")) {
            (Language::English, "turn", "left") => "Turn left",
            (Language::English, "turn", "right") => "Turn right",
            (Language::English, "turn", "sharp left") => "Turn sharp left",
            (Language::English, "turn", "sharp right") => "Turn sharp right",
            (Language::English, "turn", "slight left") => "Turn slightly left",
            (Language::English, "turn", "slight right") => "Turn slightly right",
            (Language::English, "turn", _) => "Turn",
            (Language::English, "arrive", _) => "Arrive",
            (Language::English, "depart", _) => "Depart",

            (Language::Korean, "turn", "left") => "좌회전",
            (Language::Korean, "turn", "right") => "우회전",
            (Language::Korean, "turn", "sharp left") => "급좌회전",
            (Language::Korean, "turn", "sharp right") => "급우회전",
            (Language::Korean, "turn", "slight left") => "약간 좌회전",
            (Language::Korean, "turn", "slight right") => "약간 우회전",
            (Language::Korean, "turn", _) => "회전",
            (Language::Korean, "arrive", _) => "도착",
            (Language::Korean, "depart", _) => "출발",

            (_, "continue", _) => self.straight(),
            (_, other, _) => return other.to_string(),
        };
        label.to_string()
    }

    /// Far-zone label, also used for `continue` maneuvers.
    pub fn straight(self) -> &'static str {
        match self {
            Language::English => "Continue straight",
            Language::Korean => "직진",
        }
    }

    /// Label for a step that carries no maneuver information at all.
    pub fn proceed(self) -> &'static str {
        match self {
            Language::English => "Proceed",
            Language::Korean => "진행하세요",
        }
    }

    pub fn arrived(self) -> &'static str {
        match self {
            Language::English => "You have arrived at your destination",
            Language::Korean => "목적지에 도착했습니다",
        }
    }

    pub fn rerouting(self) -> &'static str {
        match self {
            Language::English => "Recalculating route",
            Language::Korean => "경로를 재탐색합니다",
        }
    }

    /// Alert shown when a route request fails.
    pub fn route_failed(self) -> &'static str {
        match self {
            Language::English => "Could not get a route.",
            Language::Korean => "경로를 가져오는 데 실패했습니다.",
        }
    }

    pub fn tracking_started(self) -> &'static str {
        match self {
            Language::English => "Starting location tracking",
            Language::Korean => "위치 추적을 시작합니다",
        }
    }

    /// Actionable alert text for a position source failure.
    pub fn position_alert(self, error: &PositionError) -> String {
        match (self, error) {
            (Language::English, PositionError::PermissionDenied) => {
                "Location permission was denied. Allow location access in your settings.".into()
            }
            (Language::English, PositionError::PositionUnavailable) => {
                "Position is unavailable. Check that GPS is turned on.".into()
            }
            (Language::English, PositionError::Timeout) => {
                "Position request timed out. Check the GPS signal.".into()
            }
            (Language::English, PositionError::Other(msg)) => format!("Location error: {msg}"),

            (Language::Korean, PositionError::PermissionDenied) => {
                "위치 권한이 거부되었습니다. 설정에서 위치 권한을 허용해주세요.".into()
            }
            (Language::Korean, PositionError::PositionUnavailable) => {
                "위치 정보를 사용할 수 없습니다. GPS가 켜져있는지 확인해주세요.".into()
            }
            (Language::Korean, PositionError::Timeout) => {
                "위치 정보 요청 시간이 초과되었습니다. GPS 신호를 확인해주세요.".into()
            }
            (Language::Korean, PositionError::Other(msg)) => format!("위치 오류: {msg}"),
        }
    }
}

impl FromStr for Language {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "ko" | "korean" => Ok(Language::Korean),
            other => Err(NavError::Config(format!("unknown language: {other}"))),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
