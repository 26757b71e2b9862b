use device_descriptor::{ReadOnlyRegister, Register};
use embedded_hal::i2c::I2c;
use embedded_hal_async::i2c::I2c as AsyncI2c;
use register_access::{AsyncRegisterAccess, RegisterAccess};

/// I2C transport for the fuel gauge register file.
///
/// A register read addresses the register with a write, then collects both
/// data bytes after a repeated start. A register write sends the register
/// address and the big-endian value in a single transaction.
pub struct Max17048I2cInterface<I> {
    pub i2c: I,
}

impl<I> Max17048I2cInterface<I> {
    /// Fixed 7-bit bus address; every IC of the family responds at 0x36.
    pub const DEVICE_ADDR: u8 = 0x36;
}

impl<I> RegisterAccess for Max17048I2cInterface<I>
where
    I: I2c,
{
    type Error = I::Error;

    fn read_register<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister,
    {
        let mut buffer = [0; 2];
        self.i2c
            .write_read(Self::DEVICE_ADDR, &[R::ADDRESS], &mut buffer)?;
        Ok(R::from_bits(u16::from_be_bytes(buffer)))
    }

    fn write_register<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register,
    {
        let [hi, lo] = reg.bits().to_be_bytes();
        self.i2c.write(Self::DEVICE_ADDR, &[R::ADDRESS, hi, lo])
    }
}

impl<I> AsyncRegisterAccess for Max17048I2cInterface<I>
where
    I: AsyncI2c,
{
    type Error = I::Error;

    async fn read_register_async<R>(&mut self) -> Result<R, Self::Error>
    where
        R: ReadOnlyRegister,
    {
        let mut buffer = [0; 2];
        self.i2c
            .write_read(Self::DEVICE_ADDR, &[R::ADDRESS], &mut buffer)
            .await?;
        Ok(R::from_bits(u16::from_be_bytes(buffer)))
    }

    async fn write_register_async<R>(&mut self, reg: R) -> Result<(), Self::Error>
    where
        R: Register,
    {
        let [hi, lo] = reg.bits().to_be_bytes();
        self.i2c
            .write(Self::DEVICE_ADDR, &[R::ADDRESS, hi, lo])
            .await
    }
}
