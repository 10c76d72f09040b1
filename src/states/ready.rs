use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::{delay::DelayNs, digital::Wait, spi::SpiDevice};

use crate::{Error, ErrorOf, S2lp};

use super::{Ready, Shutdown, Sleep, Standby};

impl<Spi, Sdn, Gpio, Delay> S2lp<Ready, Spi, Sdn, Gpio, Delay>
where
    Spi: SpiDevice,
    Sdn: OutputPin,
    Gpio: InputPin + Wait,
    Delay: DelayNs,
{
    /// Power down the chip. All configuration is lost and [S2lp::init] has to be called again.
    pub fn shutdown(mut self) -> Result<S2lp<Shutdown, Spi, Sdn, Gpio, Delay>, ErrorOf<Self>> {
        self.shutdown_pin.set_high().map_err(Error::Sdn)?;

        #[cfg(feature = "defmt-03")]
        defmt::debug!("Radio shut down");

        Ok(self.cast_state(Shutdown))
    }

    /// Go to the standby state
    pub async fn standby(mut self) -> Result<S2lp<Standby, Spi, Sdn, Gpio, Delay>, ErrorOf<Self>> {
        self.ll().standby().dispatch_async().await?;

        #[cfg(feature = "defmt-03")]
        defmt::debug!("Radio in standby");

        Ok(self.cast_state(Standby))
    }

    /// Go to the sleep state.
    ///
    /// With the low duty cycle mode enabled, the chip wakes up by itself when the wake-up timer expires.
    pub async fn sleep(mut self) -> Result<S2lp<Sleep, Spi, Sdn, Gpio, Delay>, ErrorOf<Self>> {
        self.ll().sleep().dispatch_async().await?;

        #[cfg(feature = "defmt-03")]
        defmt::debug!("Radio sleeping");

        Ok(self.cast_state(Sleep))
    }
}
