// Geographic to screen-space projection
use serde::{Deserialize, Serialize};

/// Margin keeping the marker inside its container regardless of
/// coordinate noise: projected percentages saturate at [5, 95].
const EDGE_MIN_PCT: f64 = 5.0;
const EDGE_MAX_PCT: f64 = 95.0;

/// Fixed bounding rectangle for the tracked area.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for GeoBounds {
    // Patras city block the mock collars roam in.
    fn default() -> Self {
        Self {
            min_lat: 38.2460,
            max_lat: 38.2470,
            min_lon: 21.7340,
            max_lon: 21.7350,
        }
    }
}

impl GeoBounds {
    /// Project a coordinate into container percentages. Latitude grows
    /// north while screen y grows down, so y is inverted. Coordinates
    /// outside the rectangle clamp to the margin instead of erroring.
    pub fn project(&self, lat: f64, lon: f64) -> ScreenPosition {
        let y = (self.max_lat - lat) / (self.max_lat - self.min_lat) * 100.0;
        let x = (lon - self.min_lon) / (self.max_lon - self.min_lon) * 100.0;
        ScreenPosition {
            x: x.clamp(EDGE_MIN_PCT, EDGE_MAX_PCT),
            y: y.clamp(EDGE_MIN_PCT, EDGE_MAX_PCT),
        }
    }
}

/// Marker position as container-relative percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
}

impl Default for ScreenPosition {
    fn default() -> Self {
        Self { x: 50.0, y: 50.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_center() {
        let bounds = GeoBounds::default();
        let pos = bounds.project(38.2465, 21.7345);
        assert!((pos.x - 50.0).abs() < 1e-6);
        assert!((pos.y - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_project_clamps_far_outside() {
        let bounds = GeoBounds::default();

        // Way north-west of the box.
        let pos = bounds.project(40.0, 20.0);
        assert_eq!(pos, ScreenPosition { x: 5.0, y: 5.0 });

        // Way south-east of the box.
        let pos = bounds.project(37.0, 23.0);
        assert_eq!(pos, ScreenPosition { x: 95.0, y: 95.0 });
    }

    #[test]
    fn test_project_inverts_latitude() {
        let bounds = GeoBounds::default();
        // Northern edge maps near the top of the container.
        let north = bounds.project(bounds.max_lat, 21.7345);
        let south = bounds.project(bounds.min_lat, 21.7345);
        assert!(north.y < south.y);
    }
}
