//! Kernel ABI layer: `repr(C)` request structs and `ioctl` codes for the
//! media-controller and V4L2 multi-planar interfaces.
//!
//! Layouts follow the 64-bit kernel UAPI headers, with implicit padding
//! spelled out as named fields so every byte handed to the kernel is
//! initialized. Request codes are computed from the struct sizes and pinned
//! against the well-known numeric values in the tests.

pub(crate) mod media;
pub(crate) mod video;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
}

/// `_IOR(ty, nr, T)`: the kernel writes a `T` back to userspace.
pub(crate) const fn ior<T>(ty: u8, nr: u8) -> u32 {
    ioc(IOC_READ, ty, nr, size_of::<T>())
}

/// `_IOW(ty, nr, T)`: userspace hands a `T` to the kernel.
pub(crate) const fn iow<T>(ty: u8, nr: u8) -> u32 {
    ioc(IOC_WRITE, ty, nr, size_of::<T>())
}

/// `_IOWR(ty, nr, T)`: the `T` travels in both directions.
pub(crate) const fn iowr<T>(ty: u8, nr: u8) -> u32 {
    ioc(IOC_READ | IOC_WRITE, ty, nr, size_of::<T>())
}

/// Little-endian four-character code, as used by both DRM and V4L2.
pub(crate) const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

/// Renders a fourcc for logs, escaping non-printable lanes.
pub(crate) fn fourcc_string(code: u32) -> String {
    code.to_le_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            }
        })
        .collect()
}

/// Decodes a NUL-padded fixed-size kernel string field.
pub(crate) fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
#[path = "../../tests/unit/wire.rs"]
mod tests;
