/// Default session tick rate in Hz.
pub const DEFAULT_TICK_RATE_HZ: u32 = 20;

/// Absorbs f32 representation error (0.35 s at 20 Hz is 6.9999 ticks).
const TICK_EPSILON: f32 = 1e-3;

/// Convert seconds to a whole number of ticks, rounding down.
pub fn secs_to_ticks(secs: f32, tick_rate: u32) -> u32 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * tick_rate as f32 + TICK_EPSILON).floor() as u32
}

/// Whole seconds remaining for a tick count, rounding up.
pub fn ticks_to_secs_ceil(ticks: u32, tick_rate: u32) -> u32 {
    if tick_rate == 0 {
        return 0;
    }
    ticks.div_ceil(tick_rate)
}
