use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::{delay::DelayNs, digital::Wait, spi::SpiDevice};

use crate::{ErrorOf, S2lp};

use super::{Ready, Sleep};

impl<Spi, Sdn, Gpio, Delay> S2lp<Sleep, Spi, Sdn, Gpio, Delay>
where
    Spi: SpiDevice,
    Sdn: OutputPin,
    Gpio: InputPin + Wait,
    Delay: DelayNs,
{
    /// Wake up the device and go back to ready mode
    pub async fn wake_up(mut self) -> Result<S2lp<Ready, Spi, Sdn, Gpio, Delay>, ErrorOf<Self>> {
        self.ll().ready().dispatch_async().await?;

        #[cfg(feature = "defmt-03")]
        defmt::debug!("Radio woken up from sleep");

        Ok(self.cast_state(Ready))
    }
}
