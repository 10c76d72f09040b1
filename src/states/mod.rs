pub mod addressable;
pub mod ready;
pub mod shutdown;
pub mod sleep;
pub mod standby;

/// The chip is powered down through its SDN pin. Nothing is retained.
pub struct Shutdown;
/// The chip is idle with the crystal running
pub struct Ready;
/// Low power state with the crystal off. Registers are retained.
pub struct Standby;
/// Lowest power state that keeps the registers.
/// When the low duty cycle mode is on, the wake-up timer runs in this state.
pub struct Sleep;

/// Implemented if the state allows for spi communication
pub(crate) trait Addressable {}

impl Addressable for Ready {}
impl Addressable for Standby {}
impl Addressable for Sleep {}
