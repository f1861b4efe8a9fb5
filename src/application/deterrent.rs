// Deterrent action state machines
use serde::Serialize;
use std::time::Duration;

/// Remote actions the collar can play to influence behavior. Each kind
/// runs an independent idle -> active -> idle cycle with a fixed
/// auto-reset delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeterrentKind {
    Vibration,
    Ultrasonic,
}

impl DeterrentKind {
    pub fn reset_delay(self) -> Duration {
        match self {
            DeterrentKind::Vibration => Duration::from_millis(2000),
            DeterrentKind::Ultrasonic => Duration::from_millis(3000),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vibration" => Some(DeterrentKind::Vibration),
            "ultrasonic" => Some(DeterrentKind::Ultrasonic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeterrentControls {
    pub vibration_active: bool,
    pub ultrasonic_active: bool,
}

impl DeterrentControls {
    pub fn is_active(&self, kind: DeterrentKind) -> bool {
        match kind {
            DeterrentKind::Vibration => self.vibration_active,
            DeterrentKind::Ultrasonic => self.ultrasonic_active,
        }
    }

    /// Arm a deterrent. Returns false when it is already active;
    /// re-triggering is ignored rather than resetting the timer.
    pub fn arm(&mut self, kind: DeterrentKind) -> bool {
        if self.is_active(kind) {
            return false;
        }
        *self.flag_mut(kind) = true;
        true
    }

    pub fn clear(&mut self, kind: DeterrentKind) {
        *self.flag_mut(kind) = false;
    }

    fn flag_mut(&mut self, kind: DeterrentKind) -> &mut bool {
        match kind {
            DeterrentKind::Vibration => &mut self.vibration_active,
            DeterrentKind::Ultrasonic => &mut self.ultrasonic_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_and_clear_cycle() {
        let mut controls = DeterrentControls::default();
        assert!(controls.arm(DeterrentKind::Vibration));
        assert!(controls.vibration_active);
        assert!(!controls.ultrasonic_active);

        controls.clear(DeterrentKind::Vibration);
        assert!(!controls.vibration_active);
    }

    #[test]
    fn test_retrigger_while_active_is_ignored() {
        let mut controls = DeterrentControls::default();
        assert!(controls.arm(DeterrentKind::Ultrasonic));
        assert!(!controls.arm(DeterrentKind::Ultrasonic));
        assert!(controls.ultrasonic_active);
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut controls = DeterrentControls::default();
        assert!(controls.arm(DeterrentKind::Vibration));
        assert!(controls.arm(DeterrentKind::Ultrasonic));
        controls.clear(DeterrentKind::Vibration);
        assert!(controls.ultrasonic_active);
    }

    #[test]
    fn test_parse_path_segment() {
        assert_eq!(DeterrentKind::parse("vibration"), Some(DeterrentKind::Vibration));
        assert_eq!(DeterrentKind::parse("ultrasonic"), Some(DeterrentKind::Ultrasonic));
        assert_eq!(DeterrentKind::parse("water-cannon"), None);
    }
}
