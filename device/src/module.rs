//! Backend synchronization hooks.
//!
//! A buffer realized by a device-capable backend carries a handle to the
//! module that produced it; only that module knows how to move the
//! buffer's contents between host and device or release its device-side
//! allocation. Backends without device state simply never attach a
//! module, and every synchronization operation degrades to a no-op.

use std::fmt;
use std::rc::Rc;

use crate::raw::RawBuffer;

/// Device synchronization capability supplied by a compiled backend.
///
/// Every operation defaults to a no-op, so a backend only overrides the
/// hooks it actually supports. Hooks receive the buffer's raw descriptor;
/// there is no execution-context parameter because this runtime targets
/// the embedded/just-in-time mode, where the context is always absent.
pub trait DeviceSync: fmt::Debug {
    /// Bring the host side up to date with the device side.
    fn copy_to_host(&self, _buf: &mut RawBuffer) {}

    /// Bring the device side up to date with the host side.
    fn copy_to_device(&self, _buf: &mut RawBuffer) {}

    /// Release the device-side allocation behind `buf.dev`, if any.
    fn free_device_buffer(&self, _buf: &mut RawBuffer) {}
}

/// Synchronization hooks of a host-only backend; every hook is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSync;

impl DeviceSync for HostSync {}

/// Opaque handle to the compiled module that realized a buffer.
///
/// The module may contain internal state (a live device context, loaded
/// kernels) that the buffer's synchronization depends on, so buffers keep
/// the module alive for as long as they exist. Handles are `Rc`-shared
/// and never sent across threads.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    sync: Rc<dyn DeviceSync>,
}

impl CompiledModule {
    pub fn new(sync: Rc<dyn DeviceSync>) -> Self {
        Self { sync }
    }

    pub fn copy_to_host(&self, buf: &mut RawBuffer) {
        self.sync.copy_to_host(buf);
    }

    pub fn copy_to_device(&self, buf: &mut RawBuffer) {
        self.sync.copy_to_device(buf);
    }

    pub fn free_device_buffer(&self, buf: &mut RawBuffer) {
        self.sync.free_device_buffer(buf);
    }
}
