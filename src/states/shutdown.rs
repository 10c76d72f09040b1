use embassy_futures::select::{select, Either};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::{delay::DelayNs, digital::Wait, spi::SpiDevice};

use crate::{
    ll::{Device, DeviceInterface},
    timer::DIGITAL_DOMAIN_XTAL_THRESHOLD,
    Error, ErrorOf, S2lp,
};

use super::{Ready, Shutdown};

/// The version the chip reports in `DEVICE_INFO0`
const EXPECTED_VERSION: u8 = 0xC1;
/// Upper bound for the power-on-reset of the chip to finish
const POR_TIMEOUT_MS: u32 = 100;

impl<Spi, Sdn, Gpio, Delay> S2lp<Shutdown, Spi, Sdn, Gpio, Delay>
where
    Spi: SpiDevice,
    Sdn: OutputPin,
    Gpio: InputPin + Wait,
    Delay: DelayNs,
{
    /// Create the driver. The chip isn't touched until [Self::init] is called.
    ///
    /// The `gpio0` pin must be connected to GPIO0 of the radio, which signals the end of the power-on-reset.
    pub fn new(spi: Spi, shutdown_pin: Sdn, gpio0: Gpio, delay: Delay) -> Self {
        Self {
            device: Device::new(DeviceInterface::new(spi)),
            shutdown_pin,
            gpio0,
            delay,
            config: Config::default(),
            _state: Shutdown,
        }
    }

    /// Initialize the radio chip
    pub async fn init(
        mut self,
        config: Config,
    ) -> Result<S2lp<Ready, Spi, Sdn, Gpio, Delay>, ErrorOf<Self>> {
        if !config.is_supported_xtal() {
            #[cfg(feature = "defmt-03")]
            defmt::error!("Unsupported crystal frequency: {} Hz", config.xtal_frequency);
            return Err(Error::UnsupportedXtal(config.xtal_frequency));
        }

        #[cfg(feature = "defmt-03")]
        defmt::debug!("Resetting the radio");

        self.shutdown_pin.set_high().map_err(Error::Sdn)?;
        self.delay.delay_us(1).await;
        self.shutdown_pin.set_low().map_err(Error::Sdn)?;

        #[cfg(feature = "defmt-03")]
        defmt::trace!("Waiting for POR");

        match select(self.gpio0.wait_for_high(), self.delay.delay_ms(POR_TIMEOUT_MS)).await {
            Either::First(res) => res.map_err(Error::Gpio)?,
            Either::Second(()) => {
                #[cfg(feature = "defmt-03")]
                defmt::error!("POR did not finish within {} ms", POR_TIMEOUT_MS);
                return Err(Error::Init);
            }
        }

        #[cfg(feature = "defmt-03")]
        defmt::trace!("Checking interface works");
        let version = self.device.device_info_0().read_async().await?.version();
        if version != EXPECTED_VERSION {
            #[cfg(feature = "defmt-03")]
            defmt::error!("Unexpected chip version: {:X}", version);
            return Err(Error::Init);
        }

        // The digital domain must run below 30 MHz, so fast crystals get divided by 2
        let divided = config.xtal_frequency > DIGITAL_DOMAIN_XTAL_THRESHOLD;
        self.device
            .xo_rco_conf_1()
            .modify_async(|reg| reg.set_pd_clkdiv(!divided))
            .await?;

        #[cfg(feature = "defmt-03")]
        defmt::debug!("Init done! Xtal: {} Hz, clock divider: {}", config.xtal_frequency, divided);

        self.config = config;
        Ok(self.cast_state(Ready))
    }
}

/// The configuration of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// The frequency of the crystal connected to the radio in Hz.
    ///
    /// The chip supports 24 to 26 MHz and 48 to 52 MHz.
    pub xtal_frequency: u32,
}

impl Config {
    pub fn is_supported_xtal(&self) -> bool {
        matches!(self.xtal_frequency, 24_000_000..=26_000_000 | 48_000_000..=52_000_000)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            xtal_frequency: 50_000_000,
        }
    }
}
