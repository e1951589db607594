//! Exclusive device ownership.
//!
//! A [`DeviceHandle`] is created once per run and finalizes the device exactly
//! once: on [`DeviceHandle::shutdown`], or on drop when a run exits early.

use std::fmt;

use super::traits::Device;

/// Owns a device for the lifetime of one run.
pub struct DeviceHandle<D: Device> {
    device: Option<D>,
}

impl<D: Device> DeviceHandle<D> {
    /// Takes ownership of `device`.
    pub const fn new(device: D) -> Self {
        Self {
            device: Some(device),
        }
    }

    /// Borrows the device.
    ///
    /// The handle only becomes empty inside `shutdown`, which consumes it, so
    /// the device is always present here.
    pub fn get(&self) -> &D {
        match self.device.as_ref() {
            Some(device) => device,
            None => unreachable!("device accessed after shutdown"),
        }
    }

    /// Mutably borrows the device.
    pub fn get_mut(&mut self) -> &mut D {
        match self.device.as_mut() {
            Some(device) => device,
            None => unreachable!("device accessed after shutdown"),
        }
    }

    /// Finalizes the device and returns it for inspection.
    pub fn shutdown(mut self) -> D {
        let mut device = match self.device.take() {
            Some(device) => device,
            None => unreachable!("device shut down twice"),
        };
        device.finalize();
        device
    }
}

impl<D: Device> Drop for DeviceHandle<D> {
    fn drop(&mut self) {
        if let Some(device) = self.device.as_mut() {
            tracing::debug!(device = device.name(), "finalizing device on drop");
            device.finalize();
        }
    }
}

impl<D: Device> fmt::Debug for DeviceHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("device", &self.device.as_ref().map(Device::name))
            .finish()
    }
}
