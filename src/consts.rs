/// Relative tolerance above a level's bag ceiling before excess is penalized.
pub const BAG_TOLERANCE: f64 = 0.05;

/// Daily cap applied to every subject of every class unless disabled.
pub const DEFAULT_DAILY_CAP: u8 = 2;

/// Volumes are expressed in weekly hours and must be multiples of a half hour.
pub const HALF_HOUR_EPSILON: f64 = 1e-6;

/// Attempts to draw a valid random move before giving up on a step.
pub const MOVE_DRAW_RETRIES: usize = 8;
