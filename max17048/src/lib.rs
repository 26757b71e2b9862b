#![cfg_attr(not(test), no_std)]

use embedded_hal::i2c::I2c;
use embedded_hal_async::i2c::I2c as AsyncI2c;

use device_descriptor::{Proxy, Register};
use register_access::{AsyncRegisterReader, AsyncRegisterWriter, RegisterReader, RegisterWriter};

use crate::descriptors::{
    Alert, Bit, Command, CommandKind, Config, Mode, SleepMode, Soc, Vcell, Version,
};

pub mod descriptors;
pub mod ll;

/// Volts per VCELL ADC step on the MAX17048. The MAX17049 measures a
/// two-cell stack and doubles this.
const CELL_VOLTAGE_LSB: f32 = 0.00125;

/// Alert threshold bits in the CONFIG low byte.
const ATHD_MASK: u8 = 0x1F;

/// Sleep flag in the CONFIG low byte.
const SLEEP_BIT: u8 = 0x80;

/// Selects between the two supported ICs. They share the register file and
/// differ in the VCELL input range only.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IcVariant {
    /// 0-5V input range, for single-cell packs.
    Max17048,
    /// 0-10V input range, for two-cell stacks.
    Max17049,
}

impl IcVariant {
    const fn voltage_scale(self) -> f32 {
        match self {
            Self::Max17048 => 1.0,
            Self::Max17049 => 2.0,
        }
    }
}

/// Driver for the MAX17048/MAX17049 lithium fuel gauges.
///
/// The driver holds no device state; the register file on the IC is the
/// only source of truth and every operation is a fresh bus transaction
/// sequence.
///
/// Configuration operations (`set_compensation`, `set_alert_threshold`,
/// `clear_alert_interrupt`, `sleep`, `wake`) read CONFIG and write it back
/// in two separate bus transactions. Nothing makes that sequence atomic, so
/// callers must serialize access to one device, either by driving it from a
/// single task or by holding an external mutex across each call.
pub struct Max17048<I> {
    iface: ll::Max17048I2cInterface<I>,
    variant: IcVariant,
}

impl<I> Max17048<I> {
    pub const fn new(i2c: I, variant: IcVariant) -> Self {
        Self {
            iface: ll::Max17048I2cInterface { i2c },
            variant,
        }
    }

    /// Gives direct access to the bus, e.g. to change its configuration.
    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.iface.i2c
    }

    pub fn into_inner(self) -> I {
        self.iface.i2c
    }

    fn scale_voltage(&self, raw: u16) -> f32 {
        raw as f32 * CELL_VOLTAGE_LSB * self.variant.voltage_scale()
    }
}

/// Decodes an alert threshold percentage from the CONFIG low byte.
const fn decode_threshold(status: u8) -> u8 {
    (!status & ATHD_MASK) + 1
}

/// Encodes an alert threshold percentage as the two's complement of
/// (32 - percent), clamping to the representable 1-32% range first.
fn encode_threshold(percent: u8) -> u8 {
    percent.clamp(1, 32).wrapping_neg() & ATHD_MASK
}

impl<I> Max17048<I>
where
    I: I2c,
{
    /// Returns the measured cell voltage in volts.
    pub fn read_cell_voltage(&mut self) -> Result<f32, I::Error> {
        let vcell = Vcell::read(&mut self.iface)?;
        Ok(self.scale_voltage(vcell.voltage().read_field_bits()))
    }

    /// Returns the state of charge as a percentage of the full capacity,
    /// with a resolution of 1/256%.
    pub fn read_soc(&mut self) -> Result<f32, I::Error> {
        let soc = Soc::read(&mut self.iface)?;
        Ok(soc.percentage().read_field_bits() as f32 / 256.0)
    }

    /// Returns the production version of the IC.
    pub fn read_version(&mut self) -> Result<u16, I::Error> {
        let version = Version::read(&mut self.iface)?;
        Ok(version.version().read_field_bits())
    }

    /// Returns the RCOMP compensation value.
    pub fn read_compensation(&mut self) -> Result<u8, I::Error> {
        let config = Config::read(&mut self.iface)?;
        Ok(config.rcomp().read_field_bits() as u8)
    }

    /// Returns the raw CONFIG low byte: the sleep flag, the alert flags and
    /// the encoded alert threshold.
    pub fn read_status_byte(&mut self) -> Result<u8, I::Error> {
        let config = Config::read(&mut self.iface)?;
        Ok(config.bits() as u8)
    }

    /// Returns the alert threshold as a percentage in the 1-32 range.
    pub fn read_alert_threshold(&mut self) -> Result<u8, I::Error> {
        let config = Config::read(&mut self.iface)?;
        Ok(decode_threshold(config.bits() as u8))
    }

    /// Replaces RCOMP, leaving the rest of CONFIG untouched.
    pub fn set_compensation(&mut self, compensation: u8) -> Result<(), I::Error> {
        Config::read(&mut self.iface)?
            .modify(|reg| reg.rcomp().write(compensation))
            .write(&mut self.iface)
    }

    /// Sets the SOC percentage below which the IC asserts the ALRT pin.
    ///
    /// The device accepts thresholds between 1% and 32%; out-of-range
    /// values are clamped. The sleep flag is preserved, while a latched
    /// alert is dropped along with the previous threshold.
    pub fn set_alert_threshold(&mut self, percent: u8) -> Result<(), I::Error> {
        let encoded = encode_threshold(percent);

        Config::read(&mut self.iface)?
            .modify(|reg| {
                reg.alsc()
                    .write(Bit::NotSet)
                    .alrt()
                    .write(Alert::NoAlert)
                    .athd()
                    .write(encoded)
            })
            .write(&mut self.iface)?;

        logger::debug!("Alert threshold set to {}%", decode_threshold(encoded));
        Ok(())
    }

    /// Releases the ALRT pin after a threshold alert. Compensation, alert
    /// threshold and the sleep flag are left as they are.
    pub fn clear_alert_interrupt(&mut self) -> Result<(), I::Error> {
        Config::read(&mut self.iface)?
            .modify(|reg| reg.alrt().write(Alert::NoAlert))
            .write(&mut self.iface)
    }

    /// Halts all IC operations, cutting the supply current to 1µA or less.
    ///
    /// The CONFIG low byte is rebuilt from the decoded alert threshold, so
    /// a latched alert flag is not carried over into sleep.
    pub fn sleep(&mut self) -> Result<(), I::Error> {
        let config = Config::read(&mut self.iface)?;
        let threshold = decode_threshold(config.bits() as u8);

        Config::from_bits((config.bits() & 0xFF00) | u16::from(SLEEP_BIT | threshold))
            .write(&mut self.iface)
    }

    /// Resumes IC operation after sleep.
    pub fn wake(&mut self) -> Result<(), I::Error> {
        let config = Config::read(&mut self.iface)?;
        let threshold = decode_threshold(config.bits() as u8);

        Config::from_bits((config.bits() & 0xFF00) | u16::from(!SLEEP_BIT & threshold))
            .write(&mut self.iface)
    }

    /// Whether the IC is currently in sleep mode.
    pub fn is_sleeping(&mut self) -> Result<bool, I::Error> {
        let config = Config::read(&mut self.iface)?;
        Ok(config.sleep().read() == Some(SleepMode::Asleep))
    }

    /// Restarts fuel-gauge calculations from a fresh voltage reading, in
    /// the same manner as at power-up. Useful when the supply ramp is noisy
    /// enough to confuse the initial open-circuit voltage estimate.
    pub fn quick_start(&mut self) -> Result<(), I::Error> {
        Mode::new(|reg| reg.quick_start().write(Bit::Set)).write(&mut self.iface)
    }

    /// Completely resets the IC as if power had been removed. All registers
    /// return to their power-up defaults.
    pub fn reset(&mut self) -> Result<(), I::Error> {
        logger::debug!("Resetting fuel gauge");
        Command::new(|reg| reg.command().write(CommandKind::PowerOnReset)).write(&mut self.iface)
    }
}

// Async mirrors of the operations above; same register sequences, awaited.

impl<I> Max17048<I>
where
    I: AsyncI2c,
{
    /// Returns the measured cell voltage in volts.
    pub async fn read_cell_voltage_async(&mut self) -> Result<f32, I::Error> {
        let vcell = Vcell::read_async(&mut self.iface).await?;
        Ok(self.scale_voltage(vcell.voltage().read_field_bits()))
    }

    /// Returns the state of charge as a percentage of the full capacity,
    /// with a resolution of 1/256%.
    pub async fn read_soc_async(&mut self) -> Result<f32, I::Error> {
        let soc = Soc::read_async(&mut self.iface).await?;
        Ok(soc.percentage().read_field_bits() as f32 / 256.0)
    }

    /// Returns the production version of the IC.
    pub async fn read_version_async(&mut self) -> Result<u16, I::Error> {
        let version = Version::read_async(&mut self.iface).await?;
        Ok(version.version().read_field_bits())
    }

    /// Returns the RCOMP compensation value.
    pub async fn read_compensation_async(&mut self) -> Result<u8, I::Error> {
        let config = Config::read_async(&mut self.iface).await?;
        Ok(config.rcomp().read_field_bits() as u8)
    }

    /// Returns the raw CONFIG low byte: the sleep flag, the alert flags and
    /// the encoded alert threshold.
    pub async fn read_status_byte_async(&mut self) -> Result<u8, I::Error> {
        let config = Config::read_async(&mut self.iface).await?;
        Ok(config.bits() as u8)
    }

    /// Returns the alert threshold as a percentage in the 1-32 range.
    pub async fn read_alert_threshold_async(&mut self) -> Result<u8, I::Error> {
        let config = Config::read_async(&mut self.iface).await?;
        Ok(decode_threshold(config.bits() as u8))
    }

    /// Replaces RCOMP, leaving the rest of CONFIG untouched.
    pub async fn set_compensation_async(&mut self, compensation: u8) -> Result<(), I::Error> {
        Config::read_async(&mut self.iface)
            .await?
            .modify(|reg| reg.rcomp().write(compensation))
            .write_async(&mut self.iface)
            .await
    }

    /// Sets the SOC percentage below which the IC asserts the ALRT pin.
    ///
    /// The device accepts thresholds between 1% and 32%; out-of-range
    /// values are clamped. The sleep flag is preserved, while a latched
    /// alert is dropped along with the previous threshold.
    pub async fn set_alert_threshold_async(&mut self, percent: u8) -> Result<(), I::Error> {
        let encoded = encode_threshold(percent);

        Config::read_async(&mut self.iface)
            .await?
            .modify(|reg| {
                reg.alsc()
                    .write(Bit::NotSet)
                    .alrt()
                    .write(Alert::NoAlert)
                    .athd()
                    .write(encoded)
            })
            .write_async(&mut self.iface)
            .await?;

        logger::debug!("Alert threshold set to {}%", decode_threshold(encoded));
        Ok(())
    }

    /// Releases the ALRT pin after a threshold alert. Compensation, alert
    /// threshold and the sleep flag are left as they are.
    pub async fn clear_alert_interrupt_async(&mut self) -> Result<(), I::Error> {
        Config::read_async(&mut self.iface)
            .await?
            .modify(|reg| reg.alrt().write(Alert::NoAlert))
            .write_async(&mut self.iface)
            .await
    }

    /// Halts all IC operations, cutting the supply current to 1µA or less.
    ///
    /// The CONFIG low byte is rebuilt from the decoded alert threshold, so
    /// a latched alert flag is not carried over into sleep.
    pub async fn sleep_async(&mut self) -> Result<(), I::Error> {
        let config = Config::read_async(&mut self.iface).await?;
        let threshold = decode_threshold(config.bits() as u8);

        Config::from_bits((config.bits() & 0xFF00) | u16::from(SLEEP_BIT | threshold))
            .write_async(&mut self.iface)
            .await
    }

    /// Resumes IC operation after sleep.
    pub async fn wake_async(&mut self) -> Result<(), I::Error> {
        let config = Config::read_async(&mut self.iface).await?;
        let threshold = decode_threshold(config.bits() as u8);

        Config::from_bits((config.bits() & 0xFF00) | u16::from(!SLEEP_BIT & threshold))
            .write_async(&mut self.iface)
            .await
    }

    /// Whether the IC is currently in sleep mode.
    pub async fn is_sleeping_async(&mut self) -> Result<bool, I::Error> {
        let config = Config::read_async(&mut self.iface).await?;
        Ok(config.sleep().read() == Some(SleepMode::Asleep))
    }

    /// Restarts fuel-gauge calculations from a fresh voltage reading, in
    /// the same manner as at power-up.
    pub async fn quick_start_async(&mut self) -> Result<(), I::Error> {
        Mode::new(|reg| reg.quick_start().write(Bit::Set))
            .write_async(&mut self.iface)
            .await
    }

    /// Completely resets the IC as if power had been removed. All registers
    /// return to their power-up defaults.
    pub async fn reset_async(&mut self) -> Result<(), I::Error> {
        logger::debug!("Resetting fuel gauge");
        Command::new(|reg| reg.command().write(CommandKind::PowerOnReset))
            .write_async(&mut self.iface)
            .await
    }
}

#[cfg(test)]
mod test {
    use embedded_hal::i2c::{self, Operation};
    use heapless::Vec;

    use crate::{IcVariant, Max17048};

    const VCELL: u8 = 0x02;
    const SOC: u8 = 0x04;
    const MODE: u8 = 0x06;
    const VERSION: u8 = 0x08;
    const CONFIG: u8 = 0x0C;
    const COMMAND: u8 = 0xFE;

    /// Fake device backed by a register array. Written values are echoed
    /// back on read, and every register write is captured for wire-level
    /// assertions.
    struct FakeFuelGauge {
        regs: [u16; 256],
        writes: Vec<(u8, u16), 64>,
        fail: bool,
    }

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    struct BusFault;

    impl i2c::Error for BusFault {
        fn kind(&self) -> i2c::ErrorKind {
            i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
        }
    }

    impl i2c::ErrorType for FakeFuelGauge {
        type Error = BusFault;
    }

    impl FakeFuelGauge {
        fn new() -> Self {
            Self {
                regs: [0; 256],
                writes: Vec::new(),
                fail: false,
            }
        }

        fn with_register(mut self, address: u8, value: u16) -> Self {
            self.regs[address as usize] = value;
            self
        }

        fn failing() -> Self {
            let mut this = Self::new();
            this.fail = true;
            this
        }
    }

    impl i2c::I2c for FakeFuelGauge {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert_eq!(address, crate::ll::Max17048I2cInterface::<Self>::DEVICE_ADDR);

            if self.fail {
                return Err(BusFault);
            }

            let mut pointer = None;
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => match **bytes {
                        [register] => pointer = Some(register),
                        [register, hi, lo] => {
                            let value = u16::from_be_bytes([hi, lo]);
                            self.regs[register as usize] = value;
                            self.writes.push((register, value)).unwrap();
                        }
                        _ => panic!("unexpected write payload"),
                    },
                    Operation::Read(buffer) => {
                        let register = pointer.expect("read without a register pointer");
                        buffer.copy_from_slice(&self.regs[register as usize].to_be_bytes());
                    }
                }
            }

            Ok(())
        }
    }

    impl embedded_hal_async::i2c::I2c for FakeFuelGauge {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            i2c::I2c::transaction(self, address, operations)
        }
    }

    fn gauge(bus: FakeFuelGauge) -> Max17048<FakeFuelGauge> {
        Max17048::new(bus, IcVariant::Max17048)
    }

    #[test]
    fn cell_voltage_uses_the_upper_12_bits() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(VCELL, 0xABCD));

        assert_eq!(
            gauge.read_cell_voltage().unwrap(),
            (0xABCDu16 >> 4) as f32 * 0.00125
        );
    }

    #[test]
    fn cell_voltage_scales_with_the_ic_variant() {
        let bus = FakeFuelGauge::new().with_register(VCELL, 0x8760);
        let mut gauge = Max17048::new(bus, IcVariant::Max17049);

        assert_eq!(
            gauge.read_cell_voltage().unwrap(),
            (0x8760u16 >> 4) as f32 * 0.00125 * 2.0
        );
    }

    #[test]
    fn soc_has_1_256th_percent_resolution() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(SOC, 0x6428));

        assert_eq!(gauge.read_soc().unwrap(), 100.0 + 40.0 / 256.0);
    }

    #[test]
    fn version_combines_big_endian() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(VERSION, 0x0012));

        assert_eq!(gauge.read_version().unwrap(), 0x0012);
    }

    #[test]
    fn config_halves_are_split_correctly() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0x975A));

        assert_eq!(gauge.read_compensation().unwrap(), 0x97);
        assert_eq!(gauge.read_status_byte().unwrap(), 0x5A);
    }

    #[test]
    fn alert_threshold_round_trips() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0x971C));

        for percent in 1..=32 {
            gauge.set_alert_threshold(percent).unwrap();
            assert_eq!(gauge.read_alert_threshold().unwrap(), percent);
        }
    }

    #[test]
    fn alert_threshold_is_clamped() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0x971C));

        gauge.set_alert_threshold(0).unwrap();
        assert_eq!(gauge.read_alert_threshold().unwrap(), 1);

        gauge.set_alert_threshold(33).unwrap();
        assert_eq!(gauge.read_alert_threshold().unwrap(), 32);

        // 32% is stored as two's complement zero
        let bus = gauge.into_inner();
        assert_eq!(bus.regs[CONFIG as usize] & 0x1F, 0x00);
    }

    #[test]
    fn set_compensation_preserves_the_status_byte() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0xAB5A));

        gauge.set_compensation(0x42).unwrap();

        let bus = gauge.into_inner();
        assert_eq!(bus.regs[CONFIG as usize], 0x425A);
    }

    #[test]
    fn set_alert_threshold_preserves_the_sleep_bit_only() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0x97FF));

        gauge.set_alert_threshold(4).unwrap();

        let bus = gauge.into_inner();
        assert_eq!(bus.regs[CONFIG as usize], 0x979C);
    }

    #[test]
    fn clear_alert_interrupt_clears_one_bit() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0x977F));

        gauge.clear_alert_interrupt().unwrap();

        let bus = gauge.into_inner();
        assert_eq!(bus.regs[CONFIG as usize], 0x975F);
    }

    #[test]
    fn sleep_and_wake_toggle_the_sleep_bit() {
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0x971C));

        assert!(!gauge.is_sleeping().unwrap());

        gauge.sleep().unwrap();
        assert!(gauge.is_sleeping().unwrap());

        gauge.wake().unwrap();
        assert!(!gauge.is_sleeping().unwrap());
    }

    #[test]
    fn sleep_rebuilds_the_low_byte_from_the_decoded_threshold() {
        // ATHD = 0x1C (4%) with the alert flag latched
        let mut gauge = gauge(FakeFuelGauge::new().with_register(CONFIG, 0x973C));

        gauge.sleep().unwrap();

        // sleep bit | decoded threshold; the latched alert flag is gone
        let bus = gauge.into_inner();
        assert_eq!(bus.regs[CONFIG as usize], 0x9784);
    }

    #[test]
    fn quick_start_writes_the_documented_payload() {
        let mut gauge = gauge(FakeFuelGauge::new());

        gauge.quick_start().unwrap();

        let bus = gauge.into_inner();
        assert_eq!(&bus.writes[..], &[(MODE, 0x4000)]);
    }

    #[test]
    fn reset_writes_the_documented_payload() {
        let mut gauge = gauge(FakeFuelGauge::new());

        gauge.reset().unwrap();

        let bus = gauge.into_inner();
        assert_eq!(&bus.writes[..], &[(COMMAND, 0x5400)]);
    }

    #[test]
    fn bus_errors_pass_through() {
        let mut gauge = gauge(FakeFuelGauge::failing());

        assert_eq!(gauge.read_soc(), Err(BusFault));
        assert_eq!(gauge.set_compensation(0x97), Err(BusFault));
        assert_eq!(gauge.quick_start(), Err(BusFault));
    }

    #[test]
    fn threshold_encoding_is_twos_complement() {
        assert_eq!(crate::encode_threshold(1), 0x1F);
        assert_eq!(crate::encode_threshold(4), 0x1C);
        assert_eq!(crate::encode_threshold(32), 0x00);

        assert_eq!(crate::decode_threshold(0x1F), 1);
        assert_eq!(crate::decode_threshold(0x1C), 4);
        assert_eq!(crate::decode_threshold(0x00), 32);
    }

    #[async_std::test]
    async fn async_operations_mirror_the_blocking_ones() {
        let bus = FakeFuelGauge::new()
            .with_register(VCELL, 0xABCD)
            .with_register(CONFIG, 0x971C);
        let mut gauge = Max17048::new(bus, IcVariant::Max17048);

        assert_eq!(
            gauge.read_cell_voltage_async().await.unwrap(),
            (0xABCDu16 >> 4) as f32 * 0.00125
        );

        gauge.set_alert_threshold_async(10).await.unwrap();
        assert_eq!(gauge.read_alert_threshold_async().await.unwrap(), 10);

        gauge.sleep_async().await.unwrap();
        assert!(gauge.is_sleeping_async().await.unwrap());
    }
}
