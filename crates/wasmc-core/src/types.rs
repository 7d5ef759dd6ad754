//! The source-language type system and its mapping onto WebAssembly's machine types.

/// One of the four numeric types WebAssembly's validator tracks on the operand stack.
///
/// Every [`Intrinsic`] and every [`StorageType::Pointer`] lowers to exactly one of these.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MachineType {
    I32,
    I64,
    F32,
    F64,
}

impl MachineType {
    /// `true` for the two integer machine types.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    /// `true` for the two floating-point machine types.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// The bit width of values of this machine type (`32` or `64`).
    pub fn bit_width(self) -> u32 {
        match self {
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
        }
    }
}

impl std::fmt::Display for MachineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        })
    }
}

/// A scalar source type that lowers directly to one of WebAssembly's four numeric machine types.
///
/// 8- and 16-bit integers ride on [`MachineType::I32`]; the distinction only matters for
/// [tightening](crate::cast) after arithmetic and for [typed memory access](crate::cast).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Intrinsic {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Intrinsic {
    /// The machine type this intrinsic is represented as on the WebAssembly operand stack.
    pub fn machine_type(self) -> MachineType {
        match self {
            Self::I8 | Self::U8 | Self::I16 | Self::U16 | Self::I32 | Self::U32 => {
                MachineType::I32
            }
            Self::I64 | Self::U64 => MachineType::I64,
            Self::F32 => MachineType::F32,
            Self::F64 => MachineType::F64,
        }
    }

    /// Whether values of this type are interpreted as signed: true when the intrinsic's
    /// underlying name starts with `i`.
    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// `true` for the two floating-point intrinsics.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// `true` for the eight integer intrinsics.
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// `true` for `i8`/`u8`/`i16`/`u16`: intrinsics whose machine representation ([`MachineType::I32`])
    /// is wider than their declared bit width and therefore require [tightening](crate::cast)
    /// after arithmetic.
    pub fn is_sub_word(self) -> bool {
        matches!(self, Self::I8 | Self::U8 | Self::I16 | Self::U16)
    }

    /// The declared bit width: `8`, `16`, `32`, or `64`.
    pub fn bit_width(self) -> u32 {
        match self {
            Self::I8 | Self::U8 => 8,
            Self::I16 | Self::U16 => 16,
            Self::I32 | Self::U32 | Self::F32 => 32,
            Self::I64 | Self::U64 | Self::F64 => 64,
        }
    }

    /// The all-ones bitmask for this intrinsic's declared width, used by the `~` unary operator.
    pub fn all_ones_mask(self) -> u64 {
        match self.bit_width() {
            8 => 0xFF,
            16 => 0xFFFF,
            32 => 0xFFFF_FFFF,
            64 => u64::MAX,
            _ => unreachable!(),
        }
    }

    /// Parses an intrinsic type name such as `"i32"` or `"u8"`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i8" => Self::I8,
            "u8" => Self::U8,
            "i16" => Self::I16,
            "u16" => Self::U16,
            "i32" => Self::I32,
            "u32" => Self::U32,
            "i64" => Self::I64,
            "u64" => Self::U64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        })
    }
}

/// Opaque handle into the external declaration table's record of a struct's fields and layout.
///
/// Struct layout computation (field offsets, total size) is performed by the semantic-analysis
/// pass, an external collaborator; this crate only ever asks the
/// [`SizeOracle`](crate::context::SizeOracle) and [`Declarations`](crate::context::Declarations)
/// traits for the answers it needs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct StructRef(pub u32);

/// A single named, typed field of a [`StructRef`], with its byte offset already resolved by the
/// external declaration table.
#[derive(Clone, Debug)]
pub struct StructField {
    pub name: Box<str>,
    pub ty: StorageType,
    pub offset: u32,
}

/// The declared type of a named storage location: a parameter, local, global, memory variable,
/// struct field, or array element.
///
/// Unlike [`Intrinsic`], this also covers pointers, arrays, and structs -- the four type sorts
/// of the source-language type system.
#[derive(Clone, Debug)]
pub enum StorageType {
    Intrinsic(Intrinsic),
    Pointer(Box<StorageType>),
    Array {
        element: Box<StorageType>,
        /// Item count; the size in bytes is `count * sizeof(element)`.
        count: u32,
    },
    Struct(StructRef),
}

impl StorageType {
    /// Every pointer is represented as [`MachineType::I32`] at the machine level.
    pub fn machine_type(&self) -> Option<MachineType> {
        match self {
            Self::Intrinsic(i) => Some(i.machine_type()),
            Self::Pointer(_) => Some(MachineType::I32),
            Self::Array { .. } | Self::Struct(_) => None,
        }
    }

    /// `true` if this storage type lowers directly to an [`Intrinsic`] value (as opposed to an
    /// aggregate that must be addressed instead of loaded directly).
    pub fn as_intrinsic(&self) -> Option<Intrinsic> {
        match self {
            Self::Intrinsic(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_word_intrinsics_ride_on_i32() {
        for i in [Intrinsic::I8, Intrinsic::U8, Intrinsic::I16, Intrinsic::U16] {
            assert_eq!(i.machine_type(), MachineType::I32);
            assert!(i.is_sub_word());
        }
        for i in [Intrinsic::I32, Intrinsic::U32, Intrinsic::I64, Intrinsic::U64] {
            assert!(!i.is_sub_word());
        }
    }

    #[test]
    fn signedness_follows_leading_i() {
        assert!(Intrinsic::I8.is_signed());
        assert!(!Intrinsic::U8.is_signed());
        assert!(!Intrinsic::F32.is_signed());
    }

    #[test]
    fn all_ones_mask_matches_declared_width() {
        assert_eq!(Intrinsic::U8.all_ones_mask(), 0xFF);
        assert_eq!(Intrinsic::U16.all_ones_mask(), 0xFFFF);
        assert_eq!(Intrinsic::U32.all_ones_mask(), 0xFFFF_FFFF);
        assert_eq!(Intrinsic::U64.all_ones_mask(), u64::MAX);
    }

    #[test]
    fn from_name_round_trips_with_display() {
        for name in ["i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64", "f32", "f64"] {
            let parsed = Intrinsic::from_name(name).unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!(Intrinsic::from_name("bogus").is_none());
    }

    #[test]
    fn pointer_storage_type_lowers_to_i32() {
        let ptr = StorageType::Pointer(Box::new(StorageType::Intrinsic(Intrinsic::I64)));
        assert_eq!(ptr.machine_type(), Some(MachineType::I32));
        assert!(ptr.is_pointer());
        assert_eq!(ptr.as_intrinsic(), None);
    }

    #[test]
    fn aggregate_storage_types_have_no_machine_type() {
        let array = StorageType::Array {
            element: Box::new(StorageType::Intrinsic(Intrinsic::I32)),
            count: 4,
        };
        assert_eq!(array.machine_type(), None);
        assert_eq!(StorageType::Struct(StructRef(0)).machine_type(), None);
    }
}
