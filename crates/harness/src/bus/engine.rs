//! Bus Transaction Engine.
//!
//! The engine is the only component allowed to touch the clock. One call to
//! [`BusEngine::period`] performs:
//! 1. **Rising edge:** clock high, evaluate, record a waveform sample, advance time.
//! 2. **Falling edge:** clock low, evaluate, record a waveform sample, advance time.
//!
//! Inputs driven before a period are guaranteed visible on the outputs once it
//! returns; nothing may be assumed about the outputs within the same period.

use crate::device::{Device, DeviceHandle, NoTrace, TraceSink};

/// Simulated time in half-cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimClock {
    time: u64,
}

impl SimClock {
    /// Current time in half-cycles; this is the waveform timestamp.
    pub const fn time(self) -> u64 {
        self.time
    }

    /// Full clock periods elapsed.
    pub const fn cycles(self) -> u64 {
        self.time / 2
    }

    const fn tick(&mut self) {
        self.time += 1;
    }
}

/// Drives a device one clock period at a time.
///
/// The trace sink is a type parameter so that [`NoTrace`] compiles to nothing.
#[derive(Debug)]
pub struct BusEngine<D: Device, T: TraceSink = NoTrace> {
    handle: DeviceHandle<D>,
    trace: T,
    clock: SimClock,
}

impl<D: Device> BusEngine<D, NoTrace> {
    /// Creates an engine with tracing disabled.
    pub const fn new(device: D) -> Self {
        Self::with_trace(device, NoTrace)
    }
}

impl<D: Device, T: TraceSink> BusEngine<D, T> {
    /// Creates an engine recording every edge into `trace`.
    pub const fn with_trace(device: D, trace: T) -> Self {
        Self {
            handle: DeviceHandle::new(device),
            trace,
            clock: SimClock { time: 0 },
        }
    }

    /// Advances one full clock period (two half-cycles).
    pub fn period(&mut self) {
        let device = self.handle.get_mut();

        device.set_clock(true);
        device.eval();
        self.trace.dump(self.clock.time());
        self.clock.tick();

        device.set_clock(false);
        device.eval();
        self.trace.dump(self.clock.time());
        self.clock.tick();
    }

    /// Advances `n` full clock periods.
    pub fn periods(&mut self, n: u64) {
        for _ in 0..n {
            self.period();
        }
    }

    /// Current simulated time.
    pub const fn now(&self) -> SimClock {
        self.clock
    }

    /// Borrows the device for sampling outputs.
    pub fn device(&self) -> &D {
        self.handle.get()
    }

    /// Borrows the device for driving inputs.
    ///
    /// Callers must not drive the clock through this reference.
    pub fn device_mut(&mut self) -> &mut D {
        self.handle.get_mut()
    }

    /// Closes the trace and finalizes the device, returning it.
    pub fn shutdown(mut self) -> D {
        self.trace.close();
        self.handle.shutdown()
    }
}
