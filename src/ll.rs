//! Low level register and interface definitions

use embedded_hal::spi::Operation;
use embedded_hal_async::spi::SpiDevice;

device_driver::create_device!(
    device_name: Device,
    manifest: "device.yaml"
);

/// The SPI wrapper interface to the driver
#[derive(Debug)]
pub struct DeviceInterface<Spi: SpiDevice> {
    spi: Spi,
}

impl<Spi: SpiDevice> DeviceInterface<Spi> {
    /// Construct a new instance of the device.
    ///
    /// Spi mode 0, max 8 MHz
    pub(crate) const fn new(spi: Spi) -> Self {
        Self { spi }
    }
}

const WRITE_HEADER: u8 = 0b0000_0000;
const READ_HEADER: u8 = 0b0000_0001;
const COMMAND_HEADER: u8 = 0b1000_0000;

impl<Spi: SpiDevice> device_driver::AsyncRegisterInterface for DeviceInterface<Spi> {
    type Error = DeviceError<Spi::Error>;

    type AddressType = u8;

    /// Registers wider than a byte are written as one burst starting at `address`
    async fn write_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        Ok(self
            .spi
            .transaction(&mut [
                Operation::Write(&[WRITE_HEADER, address]),
                Operation::Write(data),
            ])
            .await?)
    }

    async fn read_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[READ_HEADER, address]),
                Operation::Read(data),
            ])
            .await?;

        Ok(())
    }
}

impl<Spi: SpiDevice> device_driver::AsyncCommandInterface for DeviceInterface<Spi> {
    type Error = DeviceError<Spi::Error>;
    type AddressType = u8;

    async fn dispatch_command(
        &mut self,
        address: Self::AddressType,
        _size_bits_in: u32,
        _input: &[u8],
        _size_bits_out: u32,
        _output: &mut [u8],
    ) -> Result<(), Self::Error> {
        Ok(self
            .spi
            .transaction(&mut [Operation::Write(&[COMMAND_HEADER, address])])
            .await?)
    }
}

/// Low level interface error that wraps the SPI error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DeviceError<Spi>(pub Spi);

impl<Spi> From<Spi> for DeviceError<Spi> {
    fn from(value: Spi) -> Self {
        Self(value)
    }
}

impl<Spi> core::ops::Deref for DeviceError<Spi> {
    type Target = Spi;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<Spi> core::ops::DerefMut for DeviceError<Spi> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
