use core::fmt::Debug;

#[derive(Copy, Clone, Default, Debug, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Little<T: Copy + Clone + Default + Debug + PartialEq + PartialOrd + Sized>(T);

macro_rules! define {
    ($type:ty) => {
        impl Little<$type> {
            pub fn to_ne(self) -> $type {
                <$type>::from_le(self.0)
            }
        }

        impl From<Little<$type>> for $type {
            #[inline]
            fn from(t: Little<$type>) -> $type {
                <$type>::from_le(t.0)
            }
        }

        impl From<$type> for Little<$type> {
            #[inline]
            fn from(t: $type) -> Self {
                Self(<$type>::to_le(t))
            }
        }
    };
}

define!(u16);
define!(u32);
define!(u64);

#[cfg(test)]
mod test {
    use super::Little;

    #[test]
    fn test_byte_order() {
        let value = Little::from(0x1234_5678u32);
        let bytes: [u8; 4] = unsafe { core::mem::transmute(value) };
        assert_eq!(bytes, [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(value.to_ne(), 0x1234_5678);
        assert_eq!(u16::from(Little::from(0xABCDu16)), 0xABCD);
    }
}
