//! Conversions between durations and the counter/prescaler pairs of the timers.
//!
//! All three timers of the chip count with an 8-bit counter behind an 8-bit prescaler.
//! For a requested duration the prescaler is kept as small as possible for the best
//! resolution, after which the counter is rounded to whichever neighbour gives the smallest error.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Above this crystal frequency the digital domain runs on half the crystal frequency
pub const DIGITAL_DOMAIN_XTAL_THRESHOLD: u32 = 30_000_000;

/// The RX timer ticks once every this many digital clock cycles
const RX_TIMER_DIVIDER: f32 = 1210.0;

/// The fast RX termination timer ticks at `digital_frequency / 24 / 2^CHFLT_E`
const FAST_RX_TIMER_DIVIDER: u32 = 24;

/// The number of ticks one full 16-bit LDC cycle takes, used to pick the multiplier
const LDC_TICKS_PER_MULTIPLIER: f32 = 65536.0;

/// The frequency of the digital domain for the given crystal frequency
pub const fn digital_frequency(xtal_frequency: u32) -> u32 {
    if xtal_frequency > DIGITAL_DOMAIN_XTAL_THRESHOLD {
        xtal_frequency / 2
    } else {
        xtal_frequency
    }
}

/// The nominal frequency of the RC oscillator in Hz. The chip derives it from the crystal.
pub const fn rco_frequency(xtal_frequency: u32) -> u16 {
    match xtal_frequency {
        24_000_000 | 48_000_000 => 32_000,
        25_000_000 | 50_000_000 => 33_300,
        _ => 34_700,
    }
}

/// Find the smallest prescaler and best counter to reach `n` ticks.
///
/// `error` gives the timing error of a `(counter, prescaler)` combination.
/// Both returned values are *before* the chip specific offsets are applied.
/// Returns `None` if `n` is out of range.
fn best_pair(n: u32, error: impl Fn(u32, u32) -> f32) -> Option<(u32, u32)> {
    if n / 0xFF > 0xFD {
        return None;
    }

    // The prescaler needs to be at least 2
    let prescaler = n / 0xFF + 2;
    let mut counter = n / prescaler;

    if counter <= 254 && error(counter + 1, prescaler) < error(counter, prescaler) {
        counter += 1;
    }

    Some((counter, prescaler))
}

/// The register values of the RX timeout timer.
///
/// The timeout is `COUNTER * (PRESCALER + 1) * 1210 / f_dig`.
/// A value of 0 in either register makes the timeout infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct RxTimer {
    pub counter: u8,
    pub prescaler: u8,
}

impl RxTimer {
    /// Timer that never expires
    pub const INFINITE: Self = Self {
        counter: 0,
        prescaler: 0,
    };

    /// The longest finite timeout
    pub const MAX: Self = Self {
        counter: 0xFF,
        prescaler: 0xFF,
    };

    /// Compute the register values closest to the desired timeout in milliseconds.
    ///
    /// Timeouts that are too long saturate to [Self::MAX].
    /// The resulting counter is never 0, so the result is never infinite.
    pub fn from_ms(desired_ms: f32, xtal_frequency: u32) -> Self {
        let desired_ms = if desired_ms.is_nan() { 0.0 } else { desired_ms };
        let f_dig = digital_frequency(xtal_frequency) as f32;
        let tick_ms = RX_TIMER_DIVIDER / f_dig * 1000.0;

        let n = (desired_ms * f_dig / RX_TIMER_DIVIDER / 1000.0) as u32;

        let Some((counter, prescaler)) = best_pair(n, |counter, prescaler| {
            (((counter * prescaler) as f32 - 1.0) * tick_ms - desired_ms).abs()
        }) else {
            return Self::MAX;
        };

        Self {
            counter: counter.max(1) as u8,
            prescaler: (prescaler - 1) as u8,
        }
    }

    /// The timeout in milliseconds or `None` if it's infinite
    pub fn duration_ms(&self, xtal_frequency: u32) -> Option<f32> {
        if self.counter == 0 || self.prescaler == 0 {
            return None;
        }

        let f_dig_khz = digital_frequency(xtal_frequency) as f32 / 1000.0;
        Some(
            (self.prescaler as f32 + 1.0) * self.counter as f32 * (RX_TIMER_DIVIDER / f_dig_khz),
        )
    }
}

/// Multiplier of the LDC wake-up timer period. The discriminant is the register code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum LdcTimerMultiplier {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
}

impl LdcTimerMultiplier {
    pub const fn factor(self) -> u8 {
        1 << self as u8
    }

    /// Get the multiplier from the 2-bit register field. Higher bits are ignored.
    pub fn from_register(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::X1,
            1 => Self::X2,
            2 => Self::X4,
            _ => Self::X8,
        }
    }
}

/// The register values of the LDC wake-up timer (or its reload registers).
///
/// The period is `(COUNTER + 1) * (PRESCALER + 1) * MULTIPLIER / f_rco`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct WakeUpTimer {
    pub counter: u8,
    pub prescaler: u8,
    pub multiplier: LdcTimerMultiplier,
}

impl WakeUpTimer {
    /// Compute the register values closest to the desired period in milliseconds.
    ///
    /// The smallest multiplier that can reach the period is chosen.
    /// Periods that are too long saturate to the maximum counter and prescaler.
    pub fn from_ms(desired_ms: f32, xtal_frequency: u32) -> Self {
        let desired_ms = if desired_ms.is_nan() { 0.0 } else { desired_ms };
        let rco = rco_frequency(xtal_frequency) as f32;
        let max_period_s = LDC_TICKS_PER_MULTIPLIER / rco;
        let desired_s = desired_ms / 1000.0;

        let multiplier = if desired_s <= max_period_s {
            LdcTimerMultiplier::X1
        } else if desired_s <= max_period_s * 2.0 {
            LdcTimerMultiplier::X2
        } else if desired_s <= max_period_s * 4.0 {
            LdcTimerMultiplier::X4
        } else {
            LdcTimerMultiplier::X8
        };

        // Ticks per millisecond
        let rco_khz = rco / 1000.0 / multiplier.factor() as f32;
        let n = (desired_ms * rco_khz) as u32;

        let Some((counter, prescaler)) = best_pair(n, |counter, prescaler| {
            ((counter * prescaler) as f32 / rco_khz - desired_ms).abs()
        }) else {
            return Self {
                counter: 0xFF,
                prescaler: 0xFF,
                multiplier,
            };
        };

        // Both registers count one more than their value
        Self {
            counter: counter.saturating_sub(1).max(1) as u8,
            prescaler: (prescaler - 1) as u8,
            multiplier,
        }
    }

    /// The wake-up period in milliseconds
    pub fn duration_ms(&self, xtal_frequency: u32) -> f32 {
        let rco_khz = rco_frequency(xtal_frequency) as f32 / 1000.0;
        (self.counter as f32 + 1.0)
            * (self.prescaler as f32 + 1.0)
            * self.multiplier.factor() as f32
            / rco_khz
    }
}

/// Compute the fast RX termination timer word for a duration in microseconds.
///
/// `chflt_e` is the channel filter exponent currently programmed in the chip.
/// Returns `None` if the duration doesn't fit in the 8-bit word.
pub fn fast_rx_termination_word(desired_us: u32, xtal_frequency: u32, chflt_e: u8) -> Option<u8> {
    let tick_hz = digital_frequency(xtal_frequency) / FAST_RX_TIMER_DIVIDER / (1 << (chflt_e & 0x0F));
    if tick_hz == 0 || desired_us >= 255 * 1_000_000 / tick_hz {
        return None;
    }

    Some((tick_hz as u64 * desired_us as u64 / 1_000_000) as u8)
}

/// Conditions that stop the RX timeout timer.
///
/// The low three bits select the RSSI, SQI and PQI conditions.
/// Conditions with bit 7 set are combined with AND, the others with OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum RxTimeoutStopCondition {
    /// The timeout is never stopped, RX ends when it expires
    NoTimeoutStop = 0x00,
    /// The timeout is always stopped, RX lasts until a packet is received or RX is aborted
    TimeoutAlwaysStopped = 0x08,
    RssiAboveThreshold = 0x04,
    SqiAboveThreshold = 0x02,
    PqiAboveThreshold = 0x01,
    RssiAndSqiAboveThreshold = 0x86,
    RssiAndPqiAboveThreshold = 0x85,
    SqiAndPqiAboveThreshold = 0x83,
    AllAboveThreshold = 0x87,
    RssiOrSqiAboveThreshold = 0x06,
    RssiOrPqiAboveThreshold = 0x05,
    SqiOrPqiAboveThreshold = 0x03,
    AnyAboveThreshold = 0x07,
}

impl RxTimeoutStopCondition {
    pub const fn rssi(self) -> bool {
        self as u8 & 0x04 != 0
    }

    pub const fn sqi(self) -> bool {
        self as u8 & 0x02 != 0
    }

    pub const fn pqi(self) -> bool {
        self as u8 & 0x01 != 0
    }

    /// Whether the selected conditions must all be true.
    ///
    /// With no condition selected, AND makes the timer always stopped and OR makes it never stop.
    pub const fn and(self) -> bool {
        self as u8 & 0x88 != 0
    }
}
