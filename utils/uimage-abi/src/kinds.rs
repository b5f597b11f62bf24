//! Single-byte header classifiers.
//!
//! Every enum keeps unknown codes in an `Other` variant so that a decoded
//! header re-encodes to the exact bytes it came from.

use core::fmt;

macro_rules! byte_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $( $(#[$vattr:meta])* $variant:ident = $code:literal => $label:literal, )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vattr])* $variant, )*
            /// A code this crate does not name.
            Other(u8),
        }

        impl $name {
            /// Raw on-disk code.
            #[must_use]
            pub const fn code(self) -> u8 {
                match self {
                    $( Self::$variant => $code, )*
                    Self::Other(code) => code,
                }
            }

            /// Short lowercase label, `None` for unnamed codes.
            #[must_use]
            pub const fn label(self) -> Option<&'static str> {
                match self {
                    $( Self::$variant => Some($label), )*
                    Self::Other(_) => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::from(0)
            }
        }

        impl From<u8> for $name {
            fn from(code: u8) -> Self {
                match code {
                    $( $code => Self::$variant, )*
                    other => Self::Other(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value.code()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.label() {
                    Some(label) => f.write_str(label),
                    None => write!(f, "unknown({})", self.code()),
                }
            }
        }
    };
}

byte_enum! {
    /// Image type (`ih_type`).
    pub enum ImageType {
        Invalid = 0 => "invalid",
        Standalone = 1 => "standalone",
        Kernel = 2 => "kernel",
        Ramdisk = 3 => "ramdisk",
        /// Multi-image container: a size table followed by embedded images.
        Multi = 4 => "multi",
        Firmware = 5 => "firmware",
        Script = 6 => "script",
        Filesystem = 7 => "filesystem",
        FlatDt = 8 => "flat_dt",
    }
}

byte_enum! {
    /// Operating system (`ih_os`).
    pub enum Os {
        Invalid = 0 => "invalid",
        OpenBsd = 1 => "openbsd",
        NetBsd = 2 => "netbsd",
        FreeBsd = 3 => "freebsd",
        Linux = 5 => "linux",
        Vxworks = 14 => "vxworks",
        Qnx = 16 => "qnx",
        UBoot = 17 => "u-boot",
        Rtems = 18 => "rtems",
    }
}

byte_enum! {
    /// CPU architecture (`ih_arch`).
    pub enum Arch {
        Invalid = 0 => "invalid",
        Alpha = 1 => "alpha",
        Arm = 2 => "arm",
        I386 = 3 => "x86",
        Ia64 = 4 => "ia64",
        Mips = 5 => "mips",
        Mips64 = 6 => "mips64",
        Ppc = 7 => "powerpc",
        S390 = 8 => "s390",
        Sh = 9 => "sh",
        Sparc = 10 => "sparc",
        Sparc64 = 11 => "sparc64",
        M68k = 12 => "m68k",
        Microblaze = 14 => "microblaze",
        Nios2 = 15 => "nios2",
        Blackfin = 16 => "blackfin",
        Avr32 = 17 => "avr32",
        Arm64 = 22 => "arm64",
        X86_64 = 24 => "x86_64",
        Riscv = 26 => "riscv",
    }
}

byte_enum! {
    /// Payload compression (`ih_comp`).
    pub enum Compression {
        None = 0 => "none",
        Gzip = 1 => "gzip",
        Bzip2 = 2 => "bzip2",
        Lzma = 3 => "lzma",
        Lzo = 4 => "lzo",
        Lz4 = 5 => "lz4",
        Zstd = 6 => "zstd",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_variants() {
        assert_eq!(ImageType::from(4), ImageType::Multi);
        assert_eq!(Os::from(5), Os::Linux);
        assert_eq!(Arch::from(2), Arch::Arm);
        assert_eq!(Compression::from(1), Compression::Gzip);
    }

    #[test]
    fn unknown_codes_survive_round_trip() {
        for code in 0..=u8::MAX {
            assert_eq!(u8::from(ImageType::from(code)), code);
            assert_eq!(u8::from(Os::from(code)), code);
            assert_eq!(u8::from(Arch::from(code)), code);
            assert_eq!(u8::from(Compression::from(code)), code);
        }
    }

    #[test]
    fn labels() {
        use std::string::ToString;

        assert_eq!(ImageType::Multi.to_string(), "multi");
        assert_eq!(ImageType::from(200).to_string(), "unknown(200)");
    }
}
