//! Signal K paths consumed and produced by the engine.

// ── Inputs ────────────────────────────────────────────────────────────────────

pub const RATE_OF_TURN: &str = "navigation.rateOfTurn";
pub const SPEED_THROUGH_WATER: &str = "navigation.speedThroughWater";
pub const APPARENT_WIND_ANGLE: &str = "environment.wind.angleApparent";
pub const APPARENT_WIND_SPEED: &str = "environment.wind.speedApparent";
pub const COURSE_OVER_GROUND: &str = "navigation.courseOverGroundTrue";
pub const SPEED_OVER_GROUND: &str = "navigation.speedOverGround";

// ── Inputs that are also derived and published ───────────────────────────────

pub const TRUE_WIND_SPEED: &str = "environment.wind.speedTrue";
pub const TRUE_WIND_ANGLE: &str = "environment.wind.angleTrueWater";
pub const VELOCITY_MADE_GOOD: &str = "performance.velocityMadeGood";

// ── Performance outputs ──────────────────────────────────────────────────────

pub const BEAT_ANGLE: &str = "performance.beatAngle";
pub const BEAT_ANGLE_TARGET_SPEED: &str = "performance.beatAngleTargetSpeed";
pub const BEAT_ANGLE_VMG: &str = "performance.beatAngleVelocityMadeGood";
pub const GYBE_ANGLE: &str = "performance.gybeAngle";
pub const GYBE_ANGLE_TARGET_SPEED: &str = "performance.gybeAngleTargetSpeed";
pub const GYBE_ANGLE_VMG: &str = "performance.gybeAngleVelocityMadeGood";
pub const TARGET_ANGLE: &str = "performance.targetAngle";
pub const TARGET_SPEED: &str = "performance.targetSpeed";
pub const POLAR_SPEED: &str = "performance.polarSpeed";
pub const POLAR_SPEED_RATIO: &str = "performance.polarSpeedRatio";
