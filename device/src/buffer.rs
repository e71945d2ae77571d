//! The reference-counted buffer handle.
//!
//! A [`Buffer`] is a shared handle over one array: element type, up to
//! four extents/strides/mins, a host allocation (owned or wrapped), an
//! opaque device handle, and two independent dirty bits. Handles are
//! cheap to clone; the last handle to go away releases the device-side
//! allocation through the attached module's hook, then the host storage
//! if this buffer owns it.
//!
//! Sharing is single-threaded: the reference count is a plain `Rc` and
//! the handle is `!Send`. Callers that want cross-thread content sharing
//! serialize handle duplication themselves.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use sluice_dtype::DType;
use snafu::{OptionExt, ResultExt, ensure};
use tracing::trace;

use crate::error::{
    BufferTooLargeSnafu, CoordinateMismatchSnafu, CoordinateOutOfBoundsSnafu, DimensionOutOfRangeSnafu,
    NegativeExtentSnafu, OutOfMemorySnafu, Result, SizeOverflowSnafu, TooManyDimensionsSnafu, UndefinedBufferSnafu,
    VectorElementTypeSnafu,
};
use crate::module::CompiledModule;
use crate::raw::RawBuffer;
use crate::size::{checked_multiply, checked_multiply_assert};

/// Host allocations get this much slack so the element base can be
/// rounded up to an aligned address.
const HOST_ALIGNMENT: usize = 32;

/// Total sizes at or above 2^31 - 1 bytes are rejected; generated code
/// addresses buffers with 32-bit signed offsets.
const MAX_BUFFER_BYTES: usize = (1 << 31) - 1;

/// Process-wide counter for auto-generated buffer names. Zero at process
/// start; names are never reclaimed.
static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn unique_name(prefix: char) -> String {
    format!("{prefix}{}", NAME_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Shared record behind every handle to one buffer.
#[derive(Debug)]
struct BufferContents {
    /// The descriptor handed to generated code and backend hooks.
    raw: RawBuffer,
    /// Element type. The descriptor only tracks the byte width, so the
    /// full type lives here.
    dtype: DType,
    /// Host storage when this buffer made its own allocation; `None`
    /// when wrapping caller-supplied memory that must never be freed.
    allocation: Option<Box<[u8]>>,
    /// Debug name, auto-generated when the caller supplies none.
    name: String,
    /// The module that realized this buffer, when a device-capable
    /// backend did. Its hooks are the only way to synchronize `raw`.
    source_module: Option<CompiledModule>,
}

impl Drop for BufferContents {
    fn drop(&mut self) {
        // Device side first: only the source module knows how to release
        // the allocation behind `raw.dev`. The owned host slab (if any)
        // is dropped with `allocation` afterwards.
        if let Some(module) = &self.source_module {
            module.free_device_buffer(&mut self.raw);
        }
    }
}

/// Reference-counted handle to a host/device array.
///
/// A default-constructed handle is *undefined*: a distinct,
/// valid-but-unusable state in which every accessor fails with
/// [`crate::Error::UndefinedBuffer`].
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    contents: Option<Rc<RefCell<BufferContents>>>,
}

impl Buffer {
    /// Create an owning buffer from up to four extents.
    ///
    /// The host allocation is zero-filled, 32-byte aligned, and freed
    /// when the last handle goes away. Strides default to row-major
    /// packing and mins to zero; the device handle starts unset and both
    /// dirty bits start false.
    pub fn with_extents(dtype: DType, extents: &[i32], name: Option<&str>) -> Result<Self> {
        let name = name.map_or_else(|| unique_name('b'), str::to_owned);
        let (mut contents, bytes) = Self::layout(dtype, extents, name)?;

        // The slack for alignment is internal arithmetic: `bytes` was just
        // validated against MAX_BUFFER_BYTES, so this cannot overflow.
        let padded = bytes.checked_add(HOST_ALIGNMENT).expect("overflow in buffer padding arithmetic");

        let mut storage = Vec::new();
        storage.try_reserve_exact(padded).context(OutOfMemorySnafu { name: &contents.name, bytes: padded })?;
        storage.resize(padded, 0u8);
        let mut storage = storage.into_boxed_slice();

        let base = storage.as_mut_ptr();
        // align_offset on a byte pointer is < HOST_ALIGNMENT, so the
        // aligned base plus `bytes` stays inside the padded slab.
        contents.raw.host = unsafe { base.add(base.align_offset(HOST_ALIGNMENT)) };
        contents.allocation = Some(storage);

        trace!(buffer = %contents.name, bytes, "allocated host storage");
        Ok(Self::bind(contents))
    }

    /// Create a buffer over caller-supplied host memory.
    ///
    /// Metadata is computed exactly as for [`Buffer::with_extents`], but
    /// no allocation is made and the memory is never freed. The caller
    /// keeps the pointer valid for the buffer's lifetime.
    pub fn wrapping_host(dtype: DType, extents: &[i32], host: *mut u8, name: Option<&str>) -> Result<Self> {
        let name = name.map_or_else(|| unique_name('b'), str::to_owned);
        let (mut contents, _bytes) = Self::layout(dtype, extents, name)?;
        contents.raw.host = host;
        Ok(Self::bind(contents))
    }

    /// Wrap a pre-built descriptor verbatim.
    ///
    /// Extents, strides, mins, pointers and dirty bits are copied as-is;
    /// nothing is allocated and nothing is ever freed. This is the
    /// interop path for externally produced buffers.
    pub fn from_raw(dtype: DType, raw: &RawBuffer, name: Option<&str>) -> Result<Self> {
        let name = name.map_or_else(|| unique_name('b'), str::to_owned);
        ensure!(dtype.lanes() == 1, VectorElementTypeSnafu { name, dtype });
        Ok(Self::bind(BufferContents { raw: *raw, dtype, allocation: None, name, source_module: None }))
    }

    /// Compute the descriptor metadata shared by the extent-based
    /// constructors: validated extents, total byte size, row-major
    /// strides, zero mins. The size checks run for wrapped host memory
    /// too, since strides must fit 32-bit addressing either way.
    fn layout(dtype: DType, extents: &[i32], name: String) -> Result<(BufferContents, usize)> {
        ensure!(dtype.lanes() == 1, VectorElementTypeSnafu { name, dtype });
        ensure!(extents.len() <= 4, TooManyDimensionsSnafu { name, count: extents.len() });
        if let Some((dim, &extent)) = extents.iter().enumerate().find(|&(_, &e)| e < 0) {
            return NegativeExtentSnafu { name, dim, extent }.fail();
        }

        let mut raw = RawBuffer { elem_size: dtype.bytes() as i32, ..RawBuffer::default() };
        for (dim, &extent) in extents.iter().enumerate() {
            raw.extent[dim] = extent;
        }

        // Total size: product of the nonzero extents (a zero-dimensional
        // buffer holds one element) times the element width. Overflow here
        // is a caller error and stays catchable.
        let mut elements = 1usize;
        for &extent in raw.extent.iter().filter(|&&e| e != 0) {
            elements = checked_multiply(elements, extent as usize).context(SizeOverflowSnafu { name: &name })?;
        }
        let bytes = checked_multiply(elements, raw.elem_size as usize).context(SizeOverflowSnafu { name: &name })?;
        ensure!(bytes < MAX_BUFFER_BYTES, BufferTooLargeSnafu { name, bytes });

        // Row-major packing. Each stride is a prefix product of extents,
        // bounded by the element count validated above, so overflow here
        // is a bug.
        raw.stride[0] = 1;
        for dim in 1..4 {
            raw.stride[dim] =
                checked_multiply_assert(raw.stride[dim - 1] as usize, raw.extent[dim - 1] as usize) as i32;
        }

        Ok((BufferContents { raw, dtype, allocation: None, name, source_module: None }, bytes))
    }

    fn bind(contents: BufferContents) -> Self {
        Self { contents: Some(Rc::new(RefCell::new(contents))) }
    }

    fn contents(&self) -> Result<&Rc<RefCell<BufferContents>>> {
        self.contents.as_ref().context(UndefinedBufferSnafu)
    }

    /// Whether this handle is bound to a concrete buffer.
    pub fn defined(&self) -> bool {
        self.contents.is_some()
    }

    /// Whether two handles share the same underlying buffer.
    pub fn same_as(&self, other: &Buffer) -> bool {
        match (&self.contents, &other.contents) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Number of live handles to this buffer (0 for an undefined handle).
    pub fn reference_count(&self) -> usize {
        self.contents.as_ref().map_or(0, Rc::strong_count)
    }

    pub fn name(&self) -> Result<String> {
        Ok(self.contents()?.borrow().name.clone())
    }

    pub fn dtype(&self) -> Result<DType> {
        Ok(self.contents()?.borrow().dtype.clone())
    }

    /// A copy of the raw descriptor, for inspection and marshalling.
    pub fn raw_buffer(&self) -> Result<RawBuffer> {
        Ok(self.contents()?.borrow().raw)
    }

    pub fn host_ptr(&self) -> Result<*mut u8> {
        Ok(self.contents()?.borrow().raw.host)
    }

    pub fn device_handle(&self) -> Result<u64> {
        Ok(self.contents()?.borrow().raw.dev)
    }

    /// Number of dimensions: leading nonzero extents of the descriptor.
    pub fn dimensions(&self) -> Result<usize> {
        Ok(self.contents()?.borrow().raw.dimensions())
    }

    pub fn extent(&self, dim: usize) -> Result<i32> {
        ensure!(dim < 4, DimensionOutOfRangeSnafu { dim });
        Ok(self.contents()?.borrow().raw.extent[dim])
    }

    pub fn stride(&self, dim: usize) -> Result<i32> {
        ensure!(dim < 4, DimensionOutOfRangeSnafu { dim });
        Ok(self.contents()?.borrow().raw.stride[dim])
    }

    pub fn min(&self, dim: usize) -> Result<i32> {
        ensure!(dim < 4, DimensionOutOfRangeSnafu { dim });
        Ok(self.contents()?.borrow().raw.min[dim])
    }

    /// Reposition the buffer's coordinate origin.
    pub fn set_min(&self, mins: &[i32]) -> Result<()> {
        ensure!(mins.len() <= 4, TooManyDimensionsSnafu { name: self.name()?, count: mins.len() });
        let contents = self.contents()?;
        let mut c = contents.borrow_mut();
        for (dim, &min) in mins.iter().enumerate() {
            c.raw.min[dim] = min;
        }
        Ok(())
    }

    pub fn host_dirty(&self) -> Result<bool> {
        Ok(self.contents()?.borrow().raw.host_dirty)
    }

    pub fn set_host_dirty(&self, dirty: bool) -> Result<()> {
        self.contents()?.borrow_mut().raw.host_dirty = dirty;
        Ok(())
    }

    pub fn device_dirty(&self) -> Result<bool> {
        Ok(self.contents()?.borrow().raw.device_dirty)
    }

    pub fn set_device_dirty(&self, dirty: bool) -> Result<()> {
        self.contents()?.borrow_mut().raw.device_dirty = dirty;
        Ok(())
    }

    /// Attach the module whose hooks synchronize this buffer.
    pub fn set_source_module(&self, module: CompiledModule) -> Result<()> {
        self.contents()?.borrow_mut().source_module = Some(module);
        Ok(())
    }

    pub fn source_module(&self) -> Result<Option<CompiledModule>> {
        Ok(self.contents()?.borrow().source_module.clone())
    }

    /// Bring the host side up to date via the attached module's hook.
    ///
    /// A buffer that was never realized by a device-capable backend has
    /// no module and the call is a silent no-op: buffers that never touch
    /// a device must not pay any synchronization cost.
    pub fn copy_to_host(&self) -> Result<()> {
        let contents = self.contents()?;
        let mut c = contents.borrow_mut();
        if let Some(module) = c.source_module.clone() {
            module.copy_to_host(&mut c.raw);
        }
        Ok(())
    }

    /// Bring the device side up to date via the attached module's hook;
    /// no-op without a module.
    pub fn copy_to_device(&self) -> Result<()> {
        let contents = self.contents()?;
        let mut c = contents.borrow_mut();
        if let Some(module) = c.source_module.clone() {
            module.copy_to_device(&mut c.raw);
        }
        Ok(())
    }

    /// Release the device-side allocation via the attached module's hook;
    /// no-op without a module.
    pub fn free_device_buffer(&self) -> Result<()> {
        let contents = self.contents()?;
        let mut c = contents.borrow_mut();
        if let Some(module) = c.source_module.clone() {
            module.free_device_buffer(&mut c.raw);
        }
        Ok(())
    }

    /// Element offset of the given coordinates from the host base:
    /// `sum((pos[d] - min[d]) * stride[d])`.
    ///
    /// Coordinates are bounds-checked against `[min, min + extent)` per
    /// dimension and must match the buffer's dimensionality exactly, so
    /// the returned offset addresses a valid element.
    pub fn element_offset(&self, pos: &[i32]) -> Result<isize> {
        let contents = self.contents()?;
        let c = contents.borrow();
        let dims = c.raw.dimensions();
        ensure!(pos.len() == dims, CoordinateMismatchSnafu { name: &c.name, expected: dims, actual: pos.len() });

        let mut offset = 0i64;
        for (dim, &index) in pos.iter().enumerate() {
            let min = c.raw.min[dim];
            let extent = c.raw.extent[dim] as i64;
            ensure!(
                (index as i64) >= (min as i64) && (index as i64) < min as i64 + extent,
                CoordinateOutOfBoundsSnafu { name: &c.name, dim, index, min, min_plus_extent: min as i64 + extent }
            );
            offset += (index as i64 - min as i64) * c.raw.stride[dim] as i64;
        }
        Ok(offset as isize)
    }
}
