//! Pixel-to-zone mapping for the pitch grid.
//!
//! The pitch image is divided into `rows x cols` equal cells (3 x 6 by
//! default), numbered from 1 left-to-right, top-to-bottom:
//!
//! ```text
//!   col:  0    1    2    3    4    5
//! row 0:  1    2    3    4    5    6
//! row 1:  7    8    9   10   11   12
//! row 2: 13   14   15   16   17   18
//! ```
//!
//! A coordinate lying exactly on an inner cell boundary belongs to the cell
//! that floor division selects (the cell starting at that boundary). The far
//! pitch edges (`x == width`, `y == height`) fold into the last column/row.
//!
//! Which end of the pitch counts as "forward" depends on the match
//! orientation and is configured per match with [`AttackDirection`].
//!
//! [`ZoneGrid`] holds no mutable state and is safe to share across threads.

use serde::{Deserialize, Serialize};
use tracing::warn;

use fastbreak_models::{Point, Zone};

use crate::error::{AnalysisError, AnalysisResult};

/// Direction of attack for the team being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackDirection {
    /// Forward means moving toward row 0
    #[default]
    TowardRowZero,
    /// Forward means moving toward the last row
    TowardLastRow,
}

impl std::str::FromStr for AttackDirection {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "toward_row_zero" | "row_zero" | "up" => Ok(AttackDirection::TowardRowZero),
            "toward_last_row" | "last_row" | "down" => Ok(AttackDirection::TowardLastRow),
            other => Err(AnalysisError::invalid_config(format!(
                "unknown attack direction '{}'",
                other
            ))),
        }
    }
}

/// Grid parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneGridConfig {
    /// Number of rows (goal-to-goal direction)
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
    /// Pitch image width in pixels
    pub pitch_width: f64,
    /// Pitch image height in pixels
    pub pitch_height: f64,
    /// Orientation used by [`ZoneGrid::is_forward`]
    pub attack: AttackDirection,
}

impl Default for ZoneGridConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 6,
            pitch_width: 1920.0,
            pitch_height: 1080.0,
            attack: AttackDirection::TowardRowZero,
        }
    }
}

impl ZoneGridConfig {
    /// Validate the grid parameters.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(AnalysisError::invalid_config("grid must have at least one row and column"));
        }
        if u32::from(self.rows) * u32::from(self.cols) > u32::from(u16::MAX) {
            return Err(AnalysisError::invalid_config("grid has too many zones"));
        }
        if !(self.pitch_width.is_finite() && self.pitch_width > 0.0) {
            return Err(AnalysisError::invalid_config("pitch width must be positive"));
        }
        if !(self.pitch_height.is_finite() && self.pitch_height > 0.0) {
            return Err(AnalysisError::invalid_config("pitch height must be positive"));
        }
        Ok(())
    }
}

/// Pixel bounds and center of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneCell {
    pub zone: Zone,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub center_x: f64,
    pub center_y: f64,
}

/// All zones of a grid, for rendering overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneLayout {
    pub zones: Vec<ZoneCell>,
    pub pitch_width: f64,
    pub pitch_height: f64,
}

/// The pitch grid.
#[derive(Debug, Clone)]
pub struct ZoneGrid {
    config: ZoneGridConfig,
    zone_width: f64,
    zone_height: f64,
}

impl ZoneGrid {
    /// Build a grid from validated parameters.
    pub fn new(config: ZoneGridConfig) -> AnalysisResult<Self> {
        config.validate()?;
        let zone_width = config.pitch_width / f64::from(config.cols);
        let zone_height = config.pitch_height / f64::from(config.rows);
        Ok(Self {
            config,
            zone_width,
            zone_height,
        })
    }

    pub fn config(&self) -> &ZoneGridConfig {
        &self.config
    }

    /// Number of zones on the grid.
    pub fn zone_count(&self) -> u16 {
        self.config.rows * self.config.cols
    }

    /// Whether a coordinate lies on the pitch (edges included).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x.is_finite()
            && y.is_finite()
            && (0.0..=self.config.pitch_width).contains(&x)
            && (0.0..=self.config.pitch_height).contains(&y)
    }

    /// Map a pixel coordinate to its zone.
    ///
    /// Off-pitch or non-finite coordinates are clamped onto the pitch and
    /// logged; this never fails.
    pub fn zone_of(&self, x: f64, y: f64) -> Zone {
        if !self.contains(x, y) {
            warn!(
                x,
                y,
                pitch_width = self.config.pitch_width,
                pitch_height = self.config.pitch_height,
                "Coordinate outside pitch, clamping to nearest zone"
            );
        }
        self.zone_index(x, y)
    }

    /// Map a pixel coordinate to its zone, rejecting off-pitch coordinates.
    pub fn checked_zone_of(&self, x: f64, y: f64) -> AnalysisResult<Zone> {
        if !self.contains(x, y) {
            return Err(AnalysisError::InvalidZoneCoordinate {
                x,
                y,
                width: self.config.pitch_width,
                height: self.config.pitch_height,
            });
        }
        Ok(self.zone_index(x, y))
    }

    /// Zone of a point, see [`ZoneGrid::zone_of`].
    #[inline]
    pub fn zone_of_point(&self, point: Point) -> Zone {
        self.zone_of(point.x, point.y)
    }

    /// Zone of a point, clamped onto the pitch without logging. For
    /// callers that handle off-pitch positions themselves.
    #[inline]
    pub fn clamped_zone_of(&self, point: Point) -> Zone {
        self.zone_index(point.x, point.y)
    }

    fn zone_index(&self, x: f64, y: f64) -> Zone {
        let col = Self::cell(x, self.zone_width, self.config.cols);
        let row = Self::cell(y, self.zone_height, self.config.rows);
        Zone::from_index(row * self.config.cols + col)
    }

    fn cell(value: f64, size: f64, count: u16) -> u16 {
        let value = if value.is_finite() { value } else { 0.0 };
        let index = (value / size).floor();
        index.clamp(0.0, f64::from(count - 1)) as u16
    }

    /// Grid row of a zone (0-based).
    pub fn row_of(&self, zone: Zone) -> AnalysisResult<u16> {
        self.ensure_valid(zone)?;
        Ok((zone.get() - 1) / self.config.cols)
    }

    /// Grid column of a zone (0-based).
    pub fn col_of(&self, zone: Zone) -> AnalysisResult<u16> {
        self.ensure_valid(zone)?;
        Ok((zone.get() - 1) % self.config.cols)
    }

    /// Whether moving the ball from zone `a` to zone `b` progresses toward
    /// the attacked goal. Zones in the same row are neither forward nor
    /// backward; zones outside the grid are never forward.
    pub fn is_forward(&self, a: Zone, b: Zone) -> bool {
        match (self.row_of(a), self.row_of(b)) {
            (Ok(row_a), Ok(row_b)) => match self.config.attack {
                AttackDirection::TowardRowZero => row_b < row_a,
                AttackDirection::TowardLastRow => row_b > row_a,
            },
            _ => false,
        }
    }

    /// Pixel bounds and center of a zone.
    pub fn zone_cell(&self, zone: Zone) -> AnalysisResult<ZoneCell> {
        let row = f64::from(self.row_of(zone)?);
        let col = f64::from(self.col_of(zone)?);

        let x1 = col * self.zone_width;
        let y1 = row * self.zone_height;
        let x2 = x1 + self.zone_width;
        let y2 = y1 + self.zone_height;

        Ok(ZoneCell {
            zone,
            x1,
            y1,
            x2,
            y2,
            center_x: (x1 + x2) / 2.0,
            center_y: (y1 + y2) / 2.0,
        })
    }

    /// Center of a zone in pixels.
    pub fn zone_center(&self, zone: Zone) -> AnalysisResult<Point> {
        let cell = self.zone_cell(zone)?;
        Ok(Point::new(cell.center_x, cell.center_y))
    }

    /// Layout of every zone, for rendering.
    pub fn layout(&self) -> ZoneLayout {
        let zones = (0..self.zone_count())
            .map(Zone::from_index)
            .filter_map(|zone| self.zone_cell(zone).ok())
            .collect();

        ZoneLayout {
            zones,
            pitch_width: self.config.pitch_width,
            pitch_height: self.config.pitch_height,
        }
    }

    fn ensure_valid(&self, zone: Zone) -> AnalysisResult<()> {
        if zone.get() > self.zone_count() {
            return Err(AnalysisError::InvalidZone {
                zone: zone.get(),
                zone_count: self.zone_count(),
            });
        }
        Ok(())
    }
}

impl Default for ZoneGrid {
    fn default() -> Self {
        let config = ZoneGridConfig::default();
        Self {
            zone_width: config.pitch_width / f64::from(config.cols),
            zone_height: config.pitch_height / f64::from(config.rows),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(n: u16) -> Zone {
        Zone::new(n).unwrap()
    }

    #[test]
    fn test_corners_and_centers() {
        let grid = ZoneGrid::default();
        assert_eq!(grid.zone_of(0.0, 0.0), zone(1));
        assert_eq!(grid.zone_of(1919.0, 0.0), zone(6));
        assert_eq!(grid.zone_of(0.0, 1079.0), zone(13));
        assert_eq!(grid.zone_of(1919.0, 1079.0), zone(18));
        assert_eq!(grid.zone_of(480.0, 540.0), zone(8));
    }

    #[test]
    fn test_every_on_pitch_coordinate_maps_into_grid() {
        let grid = ZoneGrid::default();
        let mut x = 0.0;
        while x <= 1920.0 {
            let mut y = 0.0;
            while y <= 1080.0 {
                let z = grid.zone_of(x, y).get();
                assert!((1..=18).contains(&z), "({}, {}) -> {}", x, y, z);
                y += 45.0;
            }
            x += 40.0;
        }
    }

    #[test]
    fn test_boundary_belongs_to_floor_division_cell() {
        let grid = ZoneGrid::default();
        // x = 320 is the boundary between columns 0 and 1
        assert_eq!(grid.zone_of(319.999, 10.0), zone(1));
        assert_eq!(grid.zone_of(320.0, 10.0), zone(2));
        // y = 360 is the boundary between rows 0 and 1
        assert_eq!(grid.zone_of(10.0, 360.0), zone(7));
        // far edges fold into the last cell
        assert_eq!(grid.zone_of(1920.0, 1080.0), zone(18));
    }

    #[test]
    fn test_off_pitch_is_clamped() {
        let grid = ZoneGrid::default();
        assert_eq!(grid.zone_of(-50.0, -50.0), zone(1));
        assert_eq!(grid.zone_of(5000.0, 540.0), zone(12));
        assert_eq!(grid.zone_of(f64::NAN, 540.0), zone(7));
        assert!(grid.checked_zone_of(-1.0, 10.0).is_err());
        assert!(matches!(
            grid.checked_zone_of(10.0, 2000.0),
            Err(AnalysisError::InvalidZoneCoordinate { .. })
        ));
    }

    #[test]
    fn test_clamped_zone_matches_zone_of() {
        let grid = ZoneGrid::default();
        let off = Point::new(-30.0, 2000.0);
        assert_eq!(grid.clamped_zone_of(off), zone(13));
        assert_eq!(grid.clamped_zone_of(off), grid.zone_of_point(off));
        assert_eq!(grid.clamped_zone_of(Point::new(480.0, 540.0)), zone(8));
    }

    #[test]
    fn test_zone_of_is_idempotent() {
        let grid = ZoneGrid::default();
        let first = grid.zone_of(777.7, 333.3);
        for _ in 0..10 {
            assert_eq!(grid.zone_of(777.7, 333.3), first);
        }
    }

    #[test]
    fn test_is_forward_is_antisymmetric() {
        let grid = ZoneGrid::default();
        for a in 1..=18 {
            for b in 1..=18 {
                let (za, zb) = (zone(a), zone(b));
                let same_row = grid.row_of(za).unwrap() == grid.row_of(zb).unwrap();
                if same_row {
                    assert!(!grid.is_forward(za, zb));
                    assert!(!grid.is_forward(zb, za));
                } else {
                    assert_ne!(grid.is_forward(za, zb), grid.is_forward(zb, za));
                }
            }
        }
    }

    #[test]
    fn test_is_forward_orientation() {
        let grid = ZoneGrid::default();
        assert!(grid.is_forward(zone(14), zone(8)));
        assert!(!grid.is_forward(zone(8), zone(14)));

        let flipped = ZoneGrid::new(ZoneGridConfig {
            attack: AttackDirection::TowardLastRow,
            ..Default::default()
        })
        .unwrap();
        assert!(flipped.is_forward(zone(8), zone(14)));
        assert!(!flipped.is_forward(zone(14), zone(8)));
    }

    #[test]
    fn test_invalid_zone_is_never_forward() {
        let grid = ZoneGrid::default();
        assert!(!grid.is_forward(zone(19), zone(1)));
        assert!(grid.zone_cell(zone(19)).is_err());
    }

    #[test]
    fn test_zone_cell_and_center() {
        let grid = ZoneGrid::default();
        let cell = grid.zone_cell(zone(8)).unwrap();
        assert_eq!((cell.x1, cell.y1, cell.x2, cell.y2), (320.0, 360.0, 640.0, 720.0));
        assert_eq!(grid.zone_center(zone(8)).unwrap(), Point::new(480.0, 540.0));
        assert_eq!(grid.zone_of_point(grid.zone_center(zone(11)).unwrap()), zone(11));
    }

    #[test]
    fn test_layout_covers_all_zones() {
        let layout = ZoneGrid::default().layout();
        assert_eq!(layout.zones.len(), 18);
        assert_eq!(layout.zones[0].zone, zone(1));
        assert_eq!(layout.zones[17].zone, zone(18));

        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["zones"][7]["zone"], 8);
        assert_eq!(json["zones"][7]["center_x"], 480.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ZoneGridConfig {
            rows: 0,
            ..Default::default()
        };
        assert!(ZoneGrid::new(config).is_err());

        let config = ZoneGridConfig {
            pitch_width: -1.0,
            ..Default::default()
        };
        assert!(ZoneGrid::new(config).is_err());
    }

    #[test]
    fn test_attack_direction_parse() {
        assert_eq!("toward_last_row".parse::<AttackDirection>().unwrap(), AttackDirection::TowardLastRow);
        assert!("sideways".parse::<AttackDirection>().is_err());
    }
}
