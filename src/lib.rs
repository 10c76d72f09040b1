#![cfg_attr(not(test), no_std)]

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::{delay::DelayNs, digital::Wait, spi::SpiDevice};
use ll::{Device, DeviceError, DeviceInterface};
use states::shutdown::Config;

pub mod ll;
pub mod states;
pub mod timer;

pub struct S2lp<State, Spi: SpiDevice, Sdn: OutputPin, Gpio: InputPin + Wait, Delay: DelayNs> {
    device: Device<DeviceInterface<Spi>>,
    shutdown_pin: Sdn,
    gpio0: Gpio,
    delay: Delay,
    config: Config,
    _state: State,
}

impl<State, Spi, Sdn, Gpio, Delay> S2lp<State, Spi, Sdn, Gpio, Delay>
where
    Spi: SpiDevice,
    Sdn: OutputPin,
    Gpio: InputPin + Wait,
    Delay: DelayNs,
{
    fn cast_state<NextState>(self, state: NextState) -> S2lp<NextState, Spi, Sdn, Gpio, Delay> {
        S2lp {
            device: self.device,
            shutdown_pin: self.shutdown_pin,
            gpio0: self.gpio0,
            delay: self.delay,
            config: self.config,
            _state: state,
        }
    }

    /// The crystal frequency the driver was configured with
    pub fn xtal_frequency(&self) -> u32 {
        self.config.xtal_frequency
    }

    /// The frequency of the digital domain, the crystal frequency after the optional divider
    pub fn digital_frequency(&self) -> u32 {
        timer::digital_frequency(self.config.xtal_frequency)
    }

    /// The nominal frequency of the internal RC oscillator that clocks the wake-up timer
    pub fn rco_frequency(&self) -> u16 {
        timer::rco_frequency(self.config.xtal_frequency)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<Spi, Sdn, Gpio> {
    Device(DeviceError<Spi>),
    Sdn(Sdn),
    Gpio(Gpio),
    /// The chip could not be initialized
    Init,
    /// The configured crystal frequency (in Hz) is not supported by the chip
    UnsupportedXtal(u32),
    /// The chip did not reach the state the driver was waiting for
    BadState,
    /// The requested value can't be represented in the registers of the chip
    ValueOutOfRange,
}

impl<Spi, Sdn, Gpio> From<DeviceError<Spi>> for Error<Spi, Sdn, Gpio> {
    fn from(v: DeviceError<Spi>) -> Self {
        Self::Device(v)
    }
}

/// Gives access to the full error type of a driver instance
pub trait HasErrorType {
    type Error;
}

impl<State, Spi, Sdn, Gpio, Delay> HasErrorType for S2lp<State, Spi, Sdn, Gpio, Delay>
where
    Spi: SpiDevice,
    Sdn: OutputPin,
    Gpio: InputPin + Wait,
    Delay: DelayNs,
{
    type Error = Error<Spi::Error, Sdn::Error, Gpio::Error>;
}

/// The error type of the given driver type
pub type ErrorOf<T> = <T as HasErrorType>::Error;
