use sluice_dtype::DType;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Buffers model one scalar element per logical cell.
    #[snafu(display("buffer {name}: cannot create a buffer of a vector element type ({dtype})"))]
    VectorElementType { name: String, dtype: DType },

    /// More than four dimensions are not supported.
    #[snafu(display("buffer {name}: {count} dimensions requested, at most 4 are supported"))]
    TooManyDimensions { name: String, count: usize },

    #[snafu(display("buffer {name}: extent {extent} of dimension {dim} is negative"))]
    NegativeExtent { name: String, dim: usize, extent: i32 },

    /// Caller-supplied extents overflow the size computation.
    #[snafu(display("buffer {name}: total size overflows the size computation"))]
    SizeOverflow { name: String },

    #[snafu(display("buffer {name}: total size of {bytes} bytes exceeds 2^31 - 1"))]
    BufferTooLarge { name: String, bytes: usize },

    #[snafu(display("buffer {name}: out of memory allocating {bytes} bytes"))]
    OutOfMemory { name: String, bytes: usize, source: std::collections::TryReserveError },

    /// Operation on a default-constructed, unbound handle.
    #[snafu(display("buffer is undefined"))]
    UndefinedBuffer,

    #[snafu(display("dimension index {dim} is out of range, buffers have at most 4 dimensions"))]
    DimensionOutOfRange { dim: usize },

    #[snafu(display("buffer {name}: expected {expected} coordinates, got {actual}"))]
    CoordinateMismatch { name: String, expected: usize, actual: usize },

    #[snafu(display(
        "buffer {name}: coordinate {index} of dimension {dim} is outside [{min}, {min_plus_extent})"
    ))]
    CoordinateOutOfBounds { name: String, dim: usize, index: i32, min: i32, min_plus_extent: i64 },
}
