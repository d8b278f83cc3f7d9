// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]
#![no_main]

use defmt::info;
use defmt_rtt as _;
use dfplayer::{Coordinator, NullHooks, Transport};
use embedded_hal::serial::Read as _;
use panic_halt as _;
use rp_pico::entry;
use rp_pico::hal;
use rp_pico::hal::pac;
use rp_pico::hal::Clock;

/// [`Transport`] over an RP2040 hardware UART, backed by the chip's
/// free-running microsecond timer for `now_ms`.
struct UartTransport<D, P>
where
    D: hal::uart::UartDevice,
    P: hal::uart::ValidUartPinout<D>,
{
    uart: hal::uart::UartPeripheral<hal::uart::Enabled, D, P>,
    timer: hal::Timer,
}

impl<D, P> Transport for UartTransport<D, P>
where
    D: hal::uart::UartDevice,
    P: hal::uart::ValidUartPinout<D>,
{
    type Error = ();

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.uart.write_full_blocking(bytes);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.uart.read() {
                Ok(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => break,
            }
        }
        Ok(n)
    }

    fn now_ms(&self) -> u64 {
        self.timer.get_counter().ticks() / 1000
    }
}

#[entry]
fn main() -> ! {
    info!("boot");

    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    let clocks = hal::clocks::init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    let _delay = cortex_m::delay::Delay::new(core.SYST, clocks.system_clock.freq().integer());
    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    let sio = hal::Sio::new(pac.SIO);
    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    info!("init uart");
    let uart_pins = (
        pins.gpio0.into_mode::<hal::gpio::FunctionUart>(),
        pins.gpio1.into_mode::<hal::gpio::FunctionUart>(),
    );
    let uart = hal::uart::UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
        .enable(
            hal::uart::common_configs::_9600_8_N_1,
            clocks.peripheral_clock.into(),
        )
        .unwrap();

    let mut transport = UartTransport { uart, timer };
    let mut hooks = NullHooks;
    let mut coordinator: Coordinator<4> = Coordinator::new();

    coordinator.reset();
    let _ = coordinator.play_track_from_mp3(1);

    info!("entering poll loop");
    loop {
        let _ = coordinator.update(&mut transport, &mut hooks);
    }
}
