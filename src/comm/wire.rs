//! Byte-level casts for halo payloads.
//!
//! Halo messages are header-less packed arrays of `T`; element count and
//! byte count are negotiated only through the layout's precomputed ranges.
//! Everything that crosses the communicator must be `bytemuck::Pod`.

use bytemuck::Pod;

/// View a typed slice as raw bytes.
#[inline]
pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// View a mutable typed slice as raw bytes.
#[inline]
pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// View raw bytes as a typed slice.
#[inline]
pub fn cast_slice_from<T: Pod>(v: &[u8]) -> &[T] {
    bytemuck::cast_slice(v)
}

/// View mutable raw bytes as a mutable typed slice.
#[inline]
pub fn cast_slice_from_mut<T: Pod>(v: &mut [u8]) -> &mut [T] {
    bytemuck::cast_slice_mut(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_roundtrip() {
        let v = [1.5f64, -2.0, 0.25];
        let bytes = cast_slice(&v).to_vec();
        let back: &[f64] = cast_slice_from(&bytes);
        assert_eq!(back, &v);
    }

    #[test]
    fn mut_cast_writes_through() {
        let mut bytes = vec![0u8; 2 * std::mem::size_of::<i64>()];
        {
            let ints: &mut [i64] = cast_slice_from_mut(&mut bytes);
            ints[0] = 41;
            ints[1] = -7;
        }
        let back: &[i64] = cast_slice_from(&bytes);
        assert_eq!(back, &[41, -7]);
    }
}
