use device_descriptor::*;

device! {
    /// ADC measurement of the cell voltage.
    Vcell(u16 @ 0x02) {
        /// 12-bit ADC reading. 1.25mV per LSB on the MAX17048,
        /// 2.5mV per LSB on the MAX17049.
        voltage @ 4..16 => u16
    }

    /// State of charge as calculated by the ModelGauge algorithm.
    Soc(u16 @ 0x04) {
        /// Percentage of full capacity with a resolution of 1/256%.
        percentage @ 0..16 => u16
    }

    /// The MODE register allows the host to send special commands to the IC.
    Mode(u16 @ 0x06, default = 0x0000) {
        /// Writing 1 restarts fuel-gauge calculations from the present
        /// measurements, in the same manner as at power-up. Use when the
        /// application's power-up sequence is noisy enough to confuse the
        /// initial open-circuit voltage estimate.
        quick_start @ 14 => Bit {
            Set = 1,
            NotSet = 0
        },
        /// When set, the IC is allowed to enter sleep mode while both bus
        /// lines are held low, or when CONFIG.SLEEP is written.
        en_sleep @ 13 => Bit,
        /// (Hibernate Status) Set when the IC is in hibernate mode.
        hib_stat @ 12 => Bit
    }

    /// Production version of the IC.
    Version(u16 @ 0x08) {
        version @ 0..16 => u16
    }

    /// Thresholds controlling entry to and exit from hibernate mode.
    /// Writing 0xFFFF keeps the IC in hibernate, 0x0000 keeps it out.
    Hibrt(u16 @ 0x0A, default = 0x8030) {
        /// The IC enters hibernate when |CRATE| stays below this value
        /// for longer than 6 minutes. 0.208%/hr per LSB.
        hib_thr @ 8..16 => u8,
        /// The IC exits hibernate when the cell voltage changes by more
        /// than this value. 1.25mV per LSB.
        act_thr @ 0..8 => u8
    }

    /// Compensation and alert configuration. The high byte holds the RCOMP
    /// tuning value; the low byte packs the sleep flag, the alert flags and
    /// the alert threshold.
    Config(u16 @ 0x0C, default = 0x971C) {
        /// Compensation value tuning the ModelGauge algorithm to the cell
        /// chemistry and operating temperature. The power-up value of 0x97
        /// suits most applications at 20°C.
        rcomp @ 8..16 => u8,
        /// Forces the IC in or out of sleep mode, provided MODE.EnSleep
        /// is set. All IC operations halt while asleep.
        sleep @ 7 => SleepMode {
            Asleep = 1,
            Awake = 0
        },
        /// (SOC Change Alert) When set, the IC alerts on every 1% change
        /// in SOC.
        alsc @ 6 => Bit,
        /// (Alert Status) Latched when the IC asserts the ALRT pin. The
        /// host must clear this bit to release the pin.
        alrt @ 5 => Alert {
            Alert = 1,
            NoAlert = 0
        },
        /// (Alert Threshold) SOC percentage below which the IC alerts,
        /// stored as the two's complement of (32 - percent).
        athd @ 0..5 => u8
    }

    /// Voltage alert window. The IC alerts while VCELL is outside of it.
    /// 20mV per LSB.
    Valrt(u16 @ 0x14, default = 0x00FF) {
        /// Alerts when VCELL drops below this value.
        min @ 8..16 => u8,
        /// Alerts when VCELL rises above this value.
        max @ 0..8 => u8
    }

    /// Approximate charge or discharge rate of the cell, 0.208%/hr per LSB.
    CRate(u16 @ 0x16) {
        /// Signed two's-complement rate value.
        rate @ 0..16 => u16
    }

    /// Cell removal detection threshold and one-time-programmable chip ID.
    VresetId(u16 @ 0x18, default = 0x9600) {
        /// VCELL level below which the IC treats the cell as removed and
        /// resets itself. 40mV per LSB. Set to 2.5V for most applications.
        threshold @ 9..16 => u8,
        /// Disables the cell removal comparator in hibernate, saving 0.5µA.
        dis @ 8 => Bit,
        /// Factory-programmed identifier, distinguishing otherwise
        /// identical ICs on the bus address.
        id @ 0..8 => u8
    }

    /// Interrupt status flags. A flag stays set until the host clears it.
    Status(u16 @ 0x1A, default = 0x0100) {
        /// (Voltage Reset Alert enable) When set, a cell reinsertion
        /// asserts the ALRT pin.
        en_vr @ 14 => Bit,
        /// (SOC Change) SOC changed by at least 1% since the last clear.
        sc @ 13 => Bit,
        /// (SOC Low) SOC dropped below the CONFIG.ATHD threshold.
        hd @ 12 => Bit,
        /// (Voltage Reset) The cell was removed and reinserted, or the
        /// voltage dipped below the VRESET threshold.
        vr @ 11 => Bit,
        /// (Voltage Low) VCELL dropped below VALRT.MIN.
        vl @ 10 => Bit,
        /// (Voltage High) VCELL rose above VALRT.MAX.
        vh @ 9 => Bit,
        /// (Reset Indicator) Set at power-up; the host clears it once the
        /// IC is configured.
        ri @ 8 => Bit
    }

    /// One-shot commands. Reads back as 0xFFFF.
    Command(u16 @ 0xFE, default = 0xFFFF) {
        command @ 0..16 => CommandKind {
            /// Completely resets the IC as if power had been removed.
            PowerOnReset = 0x5400
        }
    }
}
