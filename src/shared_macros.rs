// Generates bounds-checked integer readers: `read_be_u32!(buf, offset)` yields
// `Option<u32>`, `None` when the buffer is too short.
macro_rules! generate_read_int_macros {
    ($($type:ty);*) => {
        $(
            paste::item! {
                macro_rules! [< read_be_ $type >] {
                    ($buf:expr, $offset:expr) => {
                        $buf.get($offset..$offset + std::mem::size_of::<$type>())
                            .and_then(|bytes: &[u8]| bytes.try_into().ok())
                            .map(<$type>::from_be_bytes)
                    };
                }

                #[allow(unused_imports)]
                pub(crate) use [< read_be_ $type >];
            }
        )*
    };
}

generate_read_int_macros!(
    u32;
    u64
);

// Reads a big-endian integer of `$size` bytes (4 or 8) widened to u64 and
// advances `$offset` on success.
macro_rules! take_be_int {
    ($buf:expr, $offset:expr, $size:expr) => {{
        let value = match $size {
            4 => $crate::shared_macros::read_be_u32!($buf, $offset).map(u64::from),
            8 => $crate::shared_macros::read_be_u64!($buf, $offset),
            _ => None,
        };
        if value.is_some() {
            $offset += $size as usize;
        }
        value
    }};
}

pub(crate) use take_be_int;
