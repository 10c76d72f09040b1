//! The timers of the chip.
//!
//! - The RX timeout timer ends a reception that didn't get a packet in time
//! - The low duty cycle (LDC) wake-up timer wakes the chip from sleep periodically
//! - The fast RX termination timer ends a reception early when no carrier is sensed

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::{delay::DelayNs, digital::Wait, spi::SpiDevice};

use crate::{states::Addressable, Error, ErrorOf, S2lp};

mod conversion;

pub use conversion::*;

/// The `MC_STATE0.STATE` value the LDC interrupt workaround waits for. `XO_ON` is ignored.
const LDC_IRQ_WA_MC_STATE: u8 = 0x7C;
/// How often `MC_STATE0` is polled before giving up
const LDC_IRQ_WA_MAX_POLLS: u32 = 1000;
const LDC_IRQ_WA_POLL_INTERVAL_US: u32 = 10;

/// The sleep variant the chip uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SleepMode {
    /// Sleep without retaining the FIFO contents
    A,
    /// Sleep while retaining the FIFO contents
    B,
}

#[allow(private_bounds)]
impl<State, Spi, Sdn, Gpio, Delay> S2lp<State, Spi, Sdn, Gpio, Delay>
where
    State: Addressable,
    Spi: SpiDevice,
    Sdn: OutputPin,
    Gpio: InputPin + Wait,
    Delay: DelayNs,
{
    /// Enable or disable the low duty cycle mode.
    ///
    /// In this mode the chip goes to sleep and wakes up on the wake-up timer.
    pub async fn set_ldc_mode(&mut self, enabled: bool) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .protocol_1()
            .modify_async(|reg| reg.set_ldc_mode(enabled))
            .await?;

        #[cfg(feature = "defmt-03")]
        defmt::debug!("LDC mode enabled: {}", enabled);

        Ok(())
    }

    /// Enable or disable reloading the wake-up timer from the reload registers when a sync word is received
    pub async fn set_ldc_auto_reload(&mut self, enabled: bool) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .protocol_1()
            .modify_async(|reg| reg.set_ldc_reload_on_sync(enabled))
            .await?;
        Ok(())
    }

    pub async fn ldc_auto_reload(&mut self) -> Result<bool, ErrorOf<Self>> {
        Ok(self.ll().protocol_1().read_async().await?.ldc_reload_on_sync())
    }

    /// Load the wake-up timer with the values of the reload registers now
    pub async fn reload_ldc_timer(&mut self) -> Result<(), ErrorOf<Self>> {
        self.ll().ldc_reload().dispatch_async().await?;
        Ok(())
    }

    /// Program the RX timeout timer with raw register values.
    ///
    /// A 0 for either value makes the timeout infinite.
    pub async fn set_rx_timer(&mut self, counter: u8, prescaler: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .rx_timer()
            .write_async(|reg| {
                reg.set_counter(counter);
                reg.set_prescaler(prescaler);
            })
            .await?;
        Ok(())
    }

    /// Program the RX timeout timer with the closest match to the given timeout.
    ///
    /// The reachable range is about 0.1 ms to 3.1 s with a 50 MHz crystal. Longer timeouts saturate.
    pub async fn set_rx_timer_ms(&mut self, timeout_ms: f32) -> Result<RxTimer, ErrorOf<Self>> {
        let timer = RxTimer::from_ms(timeout_ms, self.xtal_frequency());

        #[cfg(feature = "defmt-03")]
        defmt::debug!("RX timeout of {} ms programmed as {}", timeout_ms, timer);

        self.set_rx_timer(timer.counter, timer.prescaler).await?;
        Ok(timer)
    }

    pub async fn set_rx_timer_counter(&mut self, counter: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .rx_timer()
            .modify_async(|reg| reg.set_counter(counter))
            .await?;
        Ok(())
    }

    pub async fn set_rx_timer_prescaler(&mut self, prescaler: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .rx_timer()
            .modify_async(|reg| reg.set_prescaler(prescaler))
            .await?;
        Ok(())
    }

    pub async fn rx_timer(&mut self) -> Result<RxTimer, ErrorOf<Self>> {
        let reg = self.ll().rx_timer().read_async().await?;
        Ok(RxTimer {
            counter: reg.counter(),
            prescaler: reg.prescaler(),
        })
    }

    /// The programmed RX timeout in milliseconds, `None` if it's infinite
    pub async fn rx_timeout_ms(&mut self) -> Result<Option<f32>, ErrorOf<Self>> {
        let xtal_frequency = self.xtal_frequency();
        Ok(self.rx_timer().await?.duration_ms(xtal_frequency))
    }

    /// Program the wake-up timer with raw register values. The multiplier is left as is.
    pub async fn set_wake_up_timer(&mut self, counter: u8, prescaler: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .ldc_timer()
            .write_async(|reg| {
                reg.set_counter(counter);
                reg.set_prescaler(prescaler);
            })
            .await?;
        Ok(())
    }

    /// Program the wake-up timer and its multiplier with the closest match to the given period
    pub async fn set_wake_up_timer_ms(&mut self, period_ms: f32) -> Result<WakeUpTimer, ErrorOf<Self>> {
        let timer = WakeUpTimer::from_ms(period_ms, self.xtal_frequency());

        #[cfg(feature = "defmt-03")]
        defmt::debug!("Wake-up period of {} ms programmed as {}", period_ms, timer);

        self.set_ldc_timer_multiplier(timer.multiplier).await?;
        self.set_wake_up_timer(timer.counter, timer.prescaler).await?;
        Ok(timer)
    }

    pub async fn set_wake_up_timer_counter(&mut self, counter: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .ldc_timer()
            .modify_async(|reg| reg.set_counter(counter))
            .await?;
        Ok(())
    }

    pub async fn set_wake_up_timer_prescaler(&mut self, prescaler: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .ldc_timer()
            .modify_async(|reg| reg.set_prescaler(prescaler))
            .await?;
        Ok(())
    }

    pub async fn wake_up_timer(&mut self) -> Result<WakeUpTimer, ErrorOf<Self>> {
        let multiplier = self.ldc_timer_multiplier().await?;
        let reg = self.ll().ldc_timer().read_async().await?;
        Ok(WakeUpTimer {
            counter: reg.counter(),
            prescaler: reg.prescaler(),
            multiplier,
        })
    }

    /// The programmed wake-up period in milliseconds
    pub async fn wake_up_time_ms(&mut self) -> Result<f32, ErrorOf<Self>> {
        let xtal_frequency = self.xtal_frequency();
        Ok(self.wake_up_timer().await?.duration_ms(xtal_frequency))
    }

    /// Program the wake-up reload registers with raw values
    pub async fn set_wake_up_timer_reload(
        &mut self,
        counter: u8,
        prescaler: u8,
        multiplier: LdcTimerMultiplier,
    ) -> Result<(), ErrorOf<Self>> {
        self.set_ldc_timer_multiplier(multiplier).await?;
        self.ll()
            .ldc_timer_reload()
            .write_async(|reg| {
                reg.set_counter(counter);
                reg.set_prescaler(prescaler);
            })
            .await?;
        Ok(())
    }

    /// Program the wake-up reload registers with the closest match to the given period
    pub async fn set_wake_up_timer_reload_ms(
        &mut self,
        period_ms: f32,
    ) -> Result<WakeUpTimer, ErrorOf<Self>> {
        let timer = WakeUpTimer::from_ms(period_ms, self.xtal_frequency());
        self.set_wake_up_timer_reload(timer.counter, timer.prescaler, timer.multiplier)
            .await?;
        Ok(timer)
    }

    pub async fn set_wake_up_timer_reload_counter(&mut self, counter: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .ldc_timer_reload()
            .modify_async(|reg| reg.set_counter(counter))
            .await?;
        Ok(())
    }

    pub async fn set_wake_up_timer_reload_prescaler(
        &mut self,
        prescaler: u8,
    ) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .ldc_timer_reload()
            .modify_async(|reg| reg.set_prescaler(prescaler))
            .await?;
        Ok(())
    }

    pub async fn wake_up_timer_reload(&mut self) -> Result<WakeUpTimer, ErrorOf<Self>> {
        let multiplier = self.ldc_timer_multiplier().await?;
        let reg = self.ll().ldc_timer_reload().read_async().await?;
        Ok(WakeUpTimer {
            counter: reg.counter(),
            prescaler: reg.prescaler(),
            multiplier,
        })
    }

    pub async fn wake_up_reload_time_ms(&mut self) -> Result<f32, ErrorOf<Self>> {
        let xtal_frequency = self.xtal_frequency();
        Ok(self.wake_up_timer_reload().await?.duration_ms(xtal_frequency))
    }

    async fn set_ldc_timer_multiplier(
        &mut self,
        multiplier: LdcTimerMultiplier,
    ) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .protocol_2()
            .modify_async(|reg| reg.set_ldc_timer_mult(multiplier.into()))
            .await?;
        Ok(())
    }

    async fn ldc_timer_multiplier(&mut self) -> Result<LdcTimerMultiplier, ErrorOf<Self>> {
        let code = self.ll().protocol_2().read_async().await?.ldc_timer_mult();
        Ok(LdcTimerMultiplier::from_register(code))
    }

    /// Select which conditions stop the RX timeout timer
    pub async fn set_rx_timeout_stop_condition(
        &mut self,
        condition: RxTimeoutStopCondition,
    ) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .protocol_2()
            .modify_async(|reg| {
                reg.set_cs_timeout_mask(condition.rssi());
                reg.set_sqi_timeout_mask(condition.sqi());
                reg.set_pqi_timeout_mask(condition.pqi());
            })
            .await?;

        self.ll()
            .pckt_flt_options()
            .modify_async(|reg| reg.set_rx_timeout_and_or_sel(condition.and()))
            .await?;

        #[cfg(feature = "defmt-03")]
        defmt::debug!("RX timeout stop condition: {}", condition);

        Ok(())
    }

    /// Enable or disable the fast RX termination timer
    pub async fn set_fast_rx_termination(&mut self, enabled: bool) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .protocol_1()
            .modify_async(|reg| reg.set_fast_cs_term_en(enabled))
            .await?;
        Ok(())
    }

    /// Set the word at which the fast RX termination timer expires.
    ///
    /// The timer ticks at `digital_frequency / 24 / 2^CHFLT_E`.
    pub async fn set_fast_rx_termination_word(&mut self, word: u8) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .fast_rx_timer()
            .write_async(|reg| reg.set_value(word))
            .await?;
        Ok(())
    }

    /// Set the fast RX termination timer from a duration in microseconds.
    ///
    /// Uses the channel filter currently programmed, so configure that first.
    pub async fn set_fast_rx_termination_us(&mut self, duration_us: u32) -> Result<u8, ErrorOf<Self>> {
        let chflt_e = self.ll().chflt().read_async().await?.chflt_e();

        let Some(word) = fast_rx_termination_word(duration_us, self.xtal_frequency(), chflt_e)
        else {
            #[cfg(feature = "defmt-03")]
            defmt::error!("Fast RX termination of {} us is out of range", duration_us);
            return Err(Error::ValueOutOfRange);
        };

        self.set_fast_rx_termination_word(word).await?;
        Ok(word)
    }

    /// Calibrate the RC oscillator on every READY to SLEEP transition.
    pub async fn set_rco_calibration(&mut self, enabled: bool) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .xo_rco_conf_0()
            .modify_async(|reg| reg.set_rco_calibration(enabled))
            .await?;
        Ok(())
    }

    pub async fn set_sleep_mode(&mut self, mode: SleepMode) -> Result<(), ErrorOf<Self>> {
        self.ll()
            .pm_conf_0()
            .modify_async(|reg| reg.set_sleep_mode_sel(mode == SleepMode::B))
            .await?;
        Ok(())
    }

    /// Workaround for the LDC wake-up interrupt.
    ///
    /// When enabling, the chip must first reach the state in which the patch can be applied.
    /// That state is polled for a bounded time, after which [Error::BadState] is returned.
    pub async fn set_ldc_irq_workaround(&mut self, enabled: bool) -> Result<(), ErrorOf<Self>> {
        let (wa_0, wa_1) = if enabled { (0x01, 0x64) } else { (0x00, 0x60) };

        if enabled {
            let mut polls = 0;
            loop {
                let state = self.ll().mc_state_0().read_async().await?.state();
                if state == LDC_IRQ_WA_MC_STATE {
                    break;
                }

                polls += 1;
                if polls == LDC_IRQ_WA_MAX_POLLS {
                    #[cfg(feature = "defmt-03")]
                    defmt::error!("LDC IRQ workaround: chip stuck in state {:X}", state);
                    return Err(Error::BadState);
                }

                #[cfg(feature = "defmt-03")]
                defmt::trace!("LDC IRQ workaround: waiting, state {:X}", state);
                self.delay.delay_us(LDC_IRQ_WA_POLL_INTERVAL_US).await;
            }
        }

        self.ll()
            .ldc_irq_wa_1()
            .write_async(|reg| reg.set_value(wa_1))
            .await?;
        self.ll()
            .ldc_irq_wa_0()
            .write_async(|reg| reg.set_value(wa_0))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;
    use embedded_hal_mock::eh1::spi;
    use futures_test::test;

    const XTAL_50M: u32 = 50_000_000;

    /// Run `f` on a ready driver that expects `transactions` after init
    macro_rules! with_driver {
        ($transactions:expr, |$s2:ident| $body:block) => {{
            let mut spi_device =
                spi::Mock::new(&[mock::init(XTAL_50M), $transactions].concat());
            let mut sdn = mock::shutdown_pin();
            let mut gpio0 = mock::gpio0();

            {
                let mut $s2 = mock::ready(&mut spi_device, &mut sdn, &mut gpio0, XTAL_50M).await;
                $body
            }

            spi_device.done();
            sdn.done();
            gpio0.done();
        }};
    }

    #[test]
    async fn ldc_mode_keeps_other_bits() {
        with_driver!(
            [
                mock::read(0x3A, 0x41),
                mock::write(0x3A, vec![0xC1]),
                mock::read(0x3A, 0xC1),
                mock::write(0x3A, vec![0x41]),
            ]
            .concat(),
            |s2| {
                s2.set_ldc_mode(true).await.unwrap();
                s2.set_ldc_mode(false).await.unwrap();
            }
        );
    }

    #[test]
    async fn ldc_auto_reload() {
        with_driver!(
            [
                mock::read(0x3A, 0x01),
                mock::write(0x3A, vec![0x41]),
                mock::read(0x3A, 0x41),
                mock::command(0x68),
            ]
            .concat(),
            |s2| {
                s2.set_ldc_auto_reload(true).await.unwrap();
                assert!(s2.ldc_auto_reload().await.unwrap());
                s2.reload_ldc_timer().await.unwrap();
            }
        );
    }

    #[test]
    async fn rx_timer_from_ms() {
        with_driver!(
            [
                mock::write(0x46, vec![104, 1]),
                mock::read_vec(0x46, vec![104, 1]),
            ]
            .concat(),
            |s2| {
                let timer = s2.set_rx_timer_ms(10.0).await.unwrap();
                assert_eq!(timer, RxTimer::from_ms(10.0, XTAL_50M));

                let timeout = s2.rx_timeout_ms().await.unwrap().unwrap();
                assert!((timeout - 10.067).abs() < 0.01);
            }
        );
    }

    #[test]
    async fn rx_timer_halves() {
        with_driver!(
            [
                mock::read_vec(0x46, vec![0x10, 0x20]),
                mock::write(0x46, vec![0x00, 0x20]),
                mock::read_vec(0x46, vec![0x00, 0x20]),
                mock::write(0x46, vec![0x00, 0x05]),
                mock::read_vec(0x46, vec![0x00, 0x05]),
            ]
            .concat(),
            |s2| {
                s2.set_rx_timer_counter(0).await.unwrap();
                s2.set_rx_timer_prescaler(5).await.unwrap();
                assert_eq!(s2.rx_timeout_ms().await.unwrap(), None);
            }
        );
    }

    #[test]
    async fn wake_up_timer_from_ms() {
        with_driver!(
            [
                // Multiplier x2 into PROTOCOL2, other bits kept
                mock::read(0x39, 0x40),
                mock::write(0x39, vec![0x41]),
                // Prescaler first, then counter
                mock::write(0x48, vec![196, 253]),
                mock::read(0x39, 0x41),
                mock::read_vec(0x48, vec![196, 253]),
            ]
            .concat(),
            |s2| {
                let timer = s2.set_wake_up_timer_ms(3001.0).await.unwrap();
                assert_eq!(timer.multiplier, LdcTimerMultiplier::X2);

                assert_eq!(s2.wake_up_timer().await.unwrap(), timer);
            }
        );
    }

    #[test]
    async fn wake_up_timer_raw() {
        with_driver!(
            [
                mock::write(0x48, vec![5, 204]),
                mock::read_vec(0x48, vec![5, 204]),
                mock::write(0x48, vec![5, 100]),
                mock::read(0x39, 0x40),
                mock::read_vec(0x48, vec![5, 100]),
            ]
            .concat(),
            |s2| {
                s2.set_wake_up_timer(204, 5).await.unwrap();
                s2.set_wake_up_timer_counter(100).await.unwrap();

                let period = s2.wake_up_time_ms().await.unwrap();
                assert!((period - 101.0 * 6.0 / 33.3).abs() < 0.01);
            }
        );
    }

    #[test]
    async fn wake_up_reload_uses_its_own_registers() {
        with_driver!(
            [
                mock::read(0x39, 0xE2),
                mock::write(0x39, vec![0xE0]),
                mock::write(0x4A, vec![5, 204]),
                mock::read(0x39, 0xE0),
                mock::read_vec(0x4A, vec![5, 204]),
                mock::read_vec(0x4A, vec![5, 204]),
                mock::write(0x4A, vec![9, 204]),
            ]
            .concat(),
            |s2| {
                let timer = s2.set_wake_up_timer_reload_ms(37.0).await.unwrap();
                assert_eq!(
                    timer,
                    WakeUpTimer {
                        counter: 204,
                        prescaler: 5,
                        multiplier: LdcTimerMultiplier::X1
                    }
                );

                let period = s2.wake_up_reload_time_ms().await.unwrap();
                assert!((period - 1230.0 / 33.3).abs() < 0.01);

                s2.set_wake_up_timer_reload_prescaler(9).await.unwrap();
            }
        );
    }

    #[test]
    async fn rx_timeout_and_condition() {
        with_driver!(
            [
                mock::read(0x39, 0x41),
                mock::write(0x39, vec![0xC1]),
                mock::read(0x40, 0x31),
                mock::write(0x40, vec![0x71]),
            ]
            .concat(),
            |s2| {
                s2.set_rx_timeout_stop_condition(RxTimeoutStopCondition::RssiAndSqiAboveThreshold)
                    .await
                    .unwrap();
            }
        );
    }

    #[test]
    async fn rx_timeout_or_condition() {
        with_driver!(
            [
                mock::read(0x39, 0xE3),
                mock::write(0x39, vec![0x23]),
                mock::read(0x40, 0x71),
                mock::write(0x40, vec![0x31]),
            ]
            .concat(),
            |s2| {
                s2.set_rx_timeout_stop_condition(RxTimeoutStopCondition::PqiAboveThreshold)
                    .await
                    .unwrap();
            }
        );
    }

    #[test]
    async fn rx_timeout_always_stopped() {
        with_driver!(
            [
                mock::read(0x39, 0xE0),
                mock::write(0x39, vec![0x00]),
                mock::read(0x40, 0x31),
                mock::write(0x40, vec![0x71]),
            ]
            .concat(),
            |s2| {
                s2.set_rx_timeout_stop_condition(RxTimeoutStopCondition::TimeoutAlwaysStopped)
                    .await
                    .unwrap();
            }
        );
    }

    #[test]
    async fn fast_rx_termination() {
        with_driver!(
            [
                mock::read(0x3A, 0x01),
                mock::write(0x3A, vec![0x11]),
                mock::read(0x13, 0x23),
                mock::write(0x54, vec![130]),
                mock::read(0x13, 0x23),
            ]
            .concat(),
            |s2| {
                s2.set_fast_rx_termination(true).await.unwrap();
                assert_eq!(s2.set_fast_rx_termination_us(1000).await.unwrap(), 130);
                assert!(matches!(
                    s2.set_fast_rx_termination_us(5000).await,
                    Err(Error::ValueOutOfRange)
                ));
            }
        );
    }

    #[test]
    async fn rco_calibration_and_sleep_mode() {
        with_driver!(
            [
                mock::read(0x6D, 0x30),
                mock::write(0x6D, vec![0x31]),
                mock::read(0x79, 0x42),
                mock::write(0x79, vec![0x43]),
                mock::read(0x79, 0x43),
                mock::write(0x79, vec![0x42]),
            ]
            .concat(),
            |s2| {
                s2.set_rco_calibration(true).await.unwrap();
                s2.set_sleep_mode(SleepMode::B).await.unwrap();
                s2.set_sleep_mode(SleepMode::A).await.unwrap();
            }
        );
    }

    #[test]
    async fn ldc_irq_workaround_waits_for_state() {
        with_driver!(
            [
                // STATE 0x00 with XO on, then STATE 0x7C with XO off
                mock::read(0x8E, 0x01),
                mock::read(0x8E, 0xF8),
                mock::write(0x7B, vec![0x64]),
                mock::write(0x7A, vec![0x01]),
                mock::write(0x7B, vec![0x60]),
                mock::write(0x7A, vec![0x00]),
            ]
            .concat(),
            |s2| {
                s2.set_ldc_irq_workaround(true).await.unwrap();
                s2.set_ldc_irq_workaround(false).await.unwrap();
            }
        );
    }

    #[test]
    async fn ldc_irq_workaround_ignores_xo_on() {
        with_driver!(
            [
                // Raw 0x7C is STATE 0x3E, then STATE 0x7C with XO on
                mock::read(0x8E, 0x7C),
                mock::read(0x8E, 0xF9),
                mock::write(0x7B, vec![0x64]),
                mock::write(0x7A, vec![0x01]),
            ]
            .concat(),
            |s2| {
                s2.set_ldc_irq_workaround(true).await.unwrap();
            }
        );
    }

    #[test]
    async fn ldc_irq_workaround_gives_up() {
        let polls: Vec<_> = (0..LDC_IRQ_WA_MAX_POLLS)
            .flat_map(|_| mock::read(0x8E, 0x01))
            .collect();

        // No writes to 0x7A/0x7B may follow
        with_driver!(polls, |s2| {
            assert!(matches!(
                s2.set_ldc_irq_workaround(true).await,
                Err(Error::BadState)
            ));
        });
    }
}
