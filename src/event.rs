//! Radio events and the interrupt-to-event pump
//!
//! A DIO1 edge only raises a flag in the [`IrqLatch`]. The SPI work of
//! reading and clearing the IRQ status word happens in
//! [`Device::handle_interrupt`], called from the waiting loop, which turns the
//! status word into [`RadioEvent`]s on a bounded FIFO.

use core::cell::Cell;

use critical_section::Mutex;
use embedded_hal::spi::SpiBus;
use heapless::spsc::Queue;
use log::{trace, warn};

use crate::{
    commands::{GetIrqStatus, IrqMask},
    controller::RadioController,
    error::Error,
    mode::RadioMode,
    Device,
};

/// Slots in the event FIFO; one slot is kept free by the ring buffer
pub const EVENT_QUEUE_SIZE: usize = 16;

/// Something the radio reported, carrying the raw IRQ status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// A packet with a valid CRC is waiting in the buffer
    RxDone(u16),
    /// Transmission finished
    TxDone(u16),
    /// The TX or RX hardware timer elapsed
    Timeout(u16),
    /// The application watchdog fired
    Watchdog(u16),
    /// A packet was received with a bad CRC
    CrcError(u16),
    /// Any other IRQ source
    Unhandled(u16),
}

impl RadioEvent {
    /// IRQ status word the event was decoded from
    pub fn irq_status(self) -> u16 {
        match self {
            Self::RxDone(status)
            | Self::TxDone(status)
            | Self::Timeout(status)
            | Self::Watchdog(status)
            | Self::CrcError(status)
            | Self::Unhandled(status) => status,
        }
    }

    /// Events encoded in an IRQ status word, lowest bit first
    ///
    /// RxDone is suppressed when the same word carries a CRC error.
    pub fn from_irq_status(status: u16) -> IrqEvents {
        IrqEvents { status, bit: 0 }
    }
}

/// Iterator over the events of one IRQ status word
#[derive(Debug, Clone)]
pub struct IrqEvents {
    status: u16,
    bit: u32,
}

impl Iterator for IrqEvents {
    type Item = RadioEvent;

    fn next(&mut self) -> Option<RadioEvent> {
        let irq = IrqMask::from_bits_retain(self.status);

        while self.bit < u16::BITS {
            let flag = IrqMask::from_bits_retain(1 << self.bit);
            self.bit += 1;
            if !irq.contains(flag) {
                continue;
            }

            let status = self.status;
            let event = if flag == IrqMask::TX_DONE {
                RadioEvent::TxDone(status)
            } else if flag == IrqMask::RX_DONE {
                if irq.contains(IrqMask::CRC_ERR) {
                    continue;
                }
                RadioEvent::RxDone(status)
            } else if flag == IrqMask::CRC_ERR {
                RadioEvent::CrcError(status)
            } else if flag == IrqMask::TIMEOUT {
                RadioEvent::Timeout(status)
            } else {
                RadioEvent::Unhandled(status)
            };
            return Some(event);
        }

        None
    }
}

/// Bounded FIFO of radio events
pub struct EventQueue {
    queue: Queue<RadioEvent, EVENT_QUEUE_SIZE>,
}

impl EventQueue {
    /// Creates an empty queue
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    /// Appends an event, handing it back when the queue is full
    pub fn push(&mut self, event: RadioEvent) -> Result<(), RadioEvent> {
        self.queue.enqueue(event)
    }

    /// Oldest event, if any
    pub fn pop(&mut self) -> Option<RadioEvent> {
        self.queue.dequeue()
    }

    /// Drops every queued event and returns how many there were
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.queue.dequeue().is_some() {
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Flags set from interrupt context and consumed by the driver
///
/// Meant to live in a `static` so a DIO1 interrupt handler or a watchdog
/// timer can reach it:
///
/// ```no_run
/// use sx126x_lora::IrqLatch;
///
/// static RADIO_IRQ: IrqLatch = IrqLatch::new();
///
/// // in the DIO1 interrupt handler
/// RADIO_IRQ.raise();
/// ```
pub struct IrqLatch {
    dio1: Mutex<Cell<bool>>,
    watchdog: Mutex<Cell<bool>>,
}

impl IrqLatch {
    pub const fn new() -> Self {
        Self {
            dio1: Mutex::new(Cell::new(false)),
            watchdog: Mutex::new(Cell::new(false)),
        }
    }

    /// Records a DIO1 edge
    pub fn raise(&self) {
        critical_section::with(|cs| self.dio1.borrow(cs).set(true));
    }

    /// Records an application watchdog expiry
    pub fn raise_watchdog(&self) {
        critical_section::with(|cs| self.watchdog.borrow(cs).set(true));
    }

    /// Consumes a pending DIO1 edge
    pub fn take(&self) -> bool {
        critical_section::with(|cs| self.dio1.borrow(cs).replace(false))
    }

    /// Consumes a pending watchdog expiry
    pub fn take_watchdog(&self) -> bool {
        critical_section::with(|cs| self.watchdog.borrow(cs).replace(false))
    }

    pub fn is_raised(&self) -> bool {
        critical_section::with(|cs| self.dio1.borrow(cs).get())
    }
}

impl Default for IrqLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl<SPI, RC> Device<SPI, RC>
where
    SPI: SpiBus,
    RC: RadioController,
{
    /// Reads and clears the IRQ status word and queues its events
    ///
    /// Returns the status word. Events that do not fit are dropped and
    /// reported with [`Error::QueueOverflow`] after the rest were queued.
    pub fn handle_interrupt(&mut self) -> Result<u16, Error<SPI::Error>> {
        let status = self.execute_command(GetIrqStatus)?.irq_status;
        self.clear_irq_status()?;
        trace!("irq status {:#06x}", status);

        self.track_completion(IrqMask::from_bits_retain(status));

        let mut overflow = false;
        for event in RadioEvent::from_irq_status(status) {
            if self.events.push(event).is_err() {
                warn!("event queue full, dropping {:?}", event);
                overflow = true;
            }
        }

        if overflow {
            Err(Error::QueueOverflow)
        } else {
            Ok(status)
        }
    }

    /// Oldest queued event, without touching the radio
    pub fn poll_event(&mut self) -> Option<RadioEvent> {
        self.events.pop()
    }

    /// Blocks until an event is available
    ///
    /// A pending watchdog expiry is reported as [`RadioEvent::Watchdog`].
    /// Waits forever when neither DIO1 nor the watchdog ever fires.
    pub fn next_event_blocking(&mut self) -> Result<RadioEvent, Error<SPI::Error>> {
        loop {
            if let Some(event) = self.events.pop() {
                return Ok(event);
            }
            if self.latch.take_watchdog() {
                return Ok(RadioEvent::Watchdog(0));
            }

            self.controller.poll_interrupt()?;
            if self.latch.take() {
                match self.handle_interrupt() {
                    Ok(_) | Err(Error::QueueOverflow) => {}
                    Err(err) => return Err(err),
                }
            } else {
                core::hint::spin_loop();
            }
        }
    }

    /// Forgets queued events and pending latch flags
    pub(crate) fn drain_events(&mut self) {
        let stale = self.events.clear();
        let dio1 = self.latch.take();
        let watchdog = self.latch.take_watchdog();
        if stale > 0 || dio1 || watchdog {
            trace!(
                "dropped {} stale events (dio1 pending: {}, watchdog pending: {})",
                stale,
                dio1,
                watchdog
            );
        }
    }

    /// Follows the chip back to its fallback mode once an operation ends
    fn track_completion(&mut self, irq: IrqMask) {
        let finished = match self.mode {
            RadioMode::Tx => irq.intersects(IrqMask::TX_DONE | IrqMask::TIMEOUT),
            RadioMode::Rx if !self.continuous_rx => {
                irq.intersects(IrqMask::RX_DONE | IrqMask::TIMEOUT | IrqMask::CRC_ERR)
            }
            _ => false,
        };
        if finished {
            self.mode = RadioMode::after_fallback(self.fallback);
        }
    }
}
