//! Stream signatures: how many streams a block accepts and what travels on them
//!
//! A signature bounds the number of input or output streams a block may be
//! connected with and fixes the item size in bytes for every stream slot.
//! Signatures are immutable after creation; the graph builder validates
//! connections against them before a run starts.

use super::errors::SignatureError;

/// Marker for plain-data sample types that can travel on a stream.
///
/// # Safety
///
/// Implementors must be valid for every bit pattern and contain no padding
/// bytes, so that reinterpreting a ring-buffer byte region as `[Self]` is
/// sound in both directions.
pub unsafe trait StreamItem: Copy + Send + Sync + 'static {}

macro_rules! stream_item {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl StreamItem for $t {})*
    };
}

stream_item!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);
stream_item!([f32; 2], [f64; 2], [i16; 2]);

/// Descriptor for one side (input or output) of a block: stream count
/// bounds plus the per-stream item size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSignature {
    min_streams: usize,
    max_streams: Option<usize>,
    item_size: usize,
}

impl StreamSignature {
    /// Create a signature with explicit bounds. `max_streams = None` means
    /// unbounded.
    pub fn new(
        min_streams: usize,
        max_streams: Option<usize>,
        item_size: usize,
    ) -> Result<Self, SignatureError> {
        if item_size == 0 {
            return Err(SignatureError::ZeroItemSize);
        }
        if let Some(max) = max_streams {
            if min_streams > max {
                return Err(SignatureError::InvalidBounds {
                    min: min_streams,
                    max,
                });
            }
        }
        Ok(Self {
            min_streams,
            max_streams,
            item_size,
        })
    }

    /// Exactly `n` streams of `item_size`-byte items.
    ///
    /// Panics if `item_size` is zero; use [`StreamSignature::new`] for a
    /// fallible variant.
    pub fn fixed(n: usize, item_size: usize) -> Self {
        Self::new(n, Some(n), item_size).expect("item_size must be positive")
    }

    /// Between `min` and `max` streams of `item_size`-byte items.
    pub fn between(min: usize, max: usize, item_size: usize) -> Result<Self, SignatureError> {
        Self::new(min, Some(max), item_size)
    }

    /// No streams at all (the input side of a source, the output side of a
    /// sink). The item size is a placeholder and never used.
    pub fn null() -> Self {
        Self {
            min_streams: 0,
            max_streams: Some(0),
            item_size: 1,
        }
    }

    /// Typed convenience: between `min` and `max` streams of `T` items.
    pub fn of<T: StreamItem>(min: usize, max: Option<usize>) -> Self {
        Self {
            min_streams: min,
            max_streams: max,
            item_size: std::mem::size_of::<T>(),
        }
    }

    /// Exactly `n` streams of `T` items.
    pub fn of_fixed<T: StreamItem>(n: usize) -> Self {
        Self::of::<T>(n, Some(n))
    }

    pub fn min_streams(&self) -> usize {
        self.min_streams
    }

    pub fn max_streams(&self) -> Option<usize> {
        self.max_streams
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Whether `actual` connected streams satisfy the bounds.
    pub fn accepts(&self, actual: usize) -> bool {
        actual >= self.min_streams && self.max_streams.is_none_or(|max| actual <= max)
    }

    /// Human-readable bounds, for error messages.
    pub fn bounds_description(&self) -> String {
        match self.max_streams {
            Some(max) if max == self.min_streams => format!("exactly {}", max),
            Some(max) => format!("{}..={}", self.min_streams, max),
            None => format!("{}..", self.min_streams),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_signature() {
        let sig = StreamSignature::fixed(2, 4);
        assert_eq!(sig.min_streams(), 2);
        assert_eq!(sig.max_streams(), Some(2));
        assert_eq!(sig.item_size(), 4);
        assert!(sig.accepts(2));
        assert!(!sig.accepts(1));
        assert!(!sig.accepts(3));
    }

    #[test]
    fn test_unbounded_max() {
        let sig = StreamSignature::of::<f32>(1, None);
        assert!(sig.accepts(1));
        assert!(sig.accepts(100));
        assert!(!sig.accepts(0));
        assert_eq!(sig.item_size(), 4);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(matches!(
            StreamSignature::new(3, Some(2), 4),
            Err(SignatureError::InvalidBounds { min: 3, max: 2 })
        ));
    }

    #[test]
    fn test_zero_item_size_rejected() {
        assert!(matches!(
            StreamSignature::new(1, Some(1), 0),
            Err(SignatureError::ZeroItemSize)
        ));
    }

    #[test]
    fn test_null_signature() {
        let sig = StreamSignature::null();
        assert!(sig.accepts(0));
        assert!(!sig.accepts(1));
    }
}
