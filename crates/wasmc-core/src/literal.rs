//! Literal values, tagged by the lexical form they were parsed from.

use num_bigint::BigInt;

/// Which lexical form a [`Literal`] was parsed from.
///
/// Folding must preserve this tag: "Literals produced by folding preserve
/// distinction between integer (`Int`), real (`Real`), and big-integer (`BigInt`) sources".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LiteralSource {
    Int,
    Real,
    BigInt,
}

/// A literal value together with the lexical form it came from.
#[derive(Clone, Debug)]
pub enum Literal {
    /// A decimal, binary, or hex integer literal that fit in the host's safe integer range.
    Int(i64),
    /// A floating-point literal.
    Real(f64),
    /// An integer literal whose magnitude exceeded the safe integer range, or the result of
    /// folding an arithmetic operation between such literals.
    BigInt(BigInt),
}

impl Literal {
    pub fn source(&self) -> LiteralSource {
        match self {
            Self::Int(_) => LiteralSource::Int,
            Self::Real(_) => LiteralSource::Real,
            Self::BigInt(_) => LiteralSource::BigInt,
        }
    }

    /// `true` for [`Literal::BigInt`] and [`Literal::Int`]; `false` for [`Literal::Real`].
    pub fn is_integer(&self) -> bool {
        !matches!(self, Self::Real(_))
    }

    /// Widens to [`BigInt`] for use in arbitrary-precision arithmetic.
    ///
    /// Returns `None` for [`Literal::Real`], which is never mixed with big-integer arithmetic --
    /// that combination promotes to the host double instead.
    pub fn as_bigint(&self) -> Option<BigInt> {
        match self {
            Self::Int(i) => Some(BigInt::from(*i)),
            Self::BigInt(b) => Some(b.clone()),
            Self::Real(_) => None,
        }
    }

    /// Widens to `f64` for use in host-double arithmetic.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Real(r) => *r,
            Self::BigInt(b) => bigint_to_f64(b),
        }
    }

    /// `true` if the value is exactly zero, regardless of source tag.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Int(i) => *i == 0,
            Self::Real(r) => *r == 0.0,
            Self::BigInt(b) => b.sign() == num_bigint::Sign::NoSign,
        }
    }

    /// `true` if the value is strictly negative, regardless of source tag.
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Int(i) => *i < 0,
            Self::Real(r) => *r < 0.0,
            Self::BigInt(b) => b.sign() == num_bigint::Sign::Minus,
        }
    }

    /// `true` if the value is exactly one, regardless of source tag.
    pub fn is_one(&self) -> bool {
        match self {
            Self::Int(i) => *i == 1,
            Self::Real(r) => *r == 1.0,
            Self::BigInt(b) => *b == BigInt::from(1),
        }
    }

    /// Negates the literal, preserving its source tag.
    pub fn negate(&self) -> Literal {
        match self {
            Self::Int(i) => i
                .checked_neg()
                .map(Literal::Int)
                .unwrap_or_else(|| Literal::BigInt(-BigInt::from(*i))),
            Self::Real(r) => Literal::Real(-r),
            Self::BigInt(b) => Literal::BigInt(-b.clone()),
        }
    }

    /// Narrows a big-integer value to 64 bits by unsigned modular reduction, used when storage-
    /// casting a folded [`Literal::BigInt`] to an unsigned 64-bit intrinsic.
    ///
    /// `BigInt` values folded by this crate are not always non-negative (e.g. negating a large
    /// positive literal, or a `Sub` that underflows below zero), so this must reduce modulo 2^64
    /// rather than take the magnitude's bytes: [`BigInt::to_signed_bytes_le`] already produces a
    /// minimal two's-complement encoding, which is sign-extended (`0xFF` for negative values,
    /// `0x00` otherwise) out to 8 bytes before reinterpreting as `u64`.
    pub fn narrow_bigint_unsigned64(b: &BigInt) -> u64 {
        let bytes = b.to_signed_bytes_le();
        let fill = if b.sign() == num_bigint::Sign::Minus { 0xFF } else { 0x00 };
        let mut buf = [fill; 8];
        let n = bytes.len().min(8);
        buf[..n].copy_from_slice(&bytes[..n]);
        u64::from_le_bytes(buf)
    }

    /// Narrows a big-integer value to 64 bits by signed (two's complement) modular reduction.
    pub fn narrow_bigint_signed64(b: &BigInt) -> i64 {
        Self::narrow_bigint_unsigned64(b) as i64
    }
}

fn bigint_to_f64(b: &BigInt) -> f64 {
    use num_traits::ToPrimitive;
    b.to_f64().unwrap_or(f64::NAN)
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::BigInt(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tag_is_preserved_by_construction() {
        assert_eq!(Literal::Int(1).source(), LiteralSource::Int);
        assert_eq!(Literal::Real(1.0).source(), LiteralSource::Real);
        assert_eq!(Literal::BigInt(BigInt::from(1)).source(), LiteralSource::BigInt);
    }

    #[test]
    fn is_zero_and_is_one_agree_across_sources() {
        assert!(Literal::Int(0).is_zero());
        assert!(Literal::Real(0.0).is_zero());
        assert!(Literal::BigInt(BigInt::from(0)).is_zero());
        assert!(Literal::Int(1).is_one());
        assert!(Literal::Real(1.0).is_one());
        assert!(Literal::BigInt(BigInt::from(1)).is_one());
    }

    #[test]
    fn negate_preserves_source_tag_and_overflows_to_bigint() {
        assert!(matches!(Literal::Int(5).negate(), Literal::Int(-5)));
        assert!(matches!(Literal::Real(2.5).negate(), Literal::Real(r) if r == -2.5));
        // `i64::MIN` has no positive `i64` counterpart, so negation must widen rather than panic.
        match Literal::Int(i64::MIN).negate() {
            Literal::BigInt(b) => assert_eq!(b, -BigInt::from(i64::MIN)),
            other => panic!("expected BigInt, got {other:?}"),
        }
    }

    #[test]
    fn narrow_bigint_unsigned64_matches_little_endian_bytes() {
        let value = BigInt::from(0x1234_5678u64);
        assert_eq!(Literal::narrow_bigint_unsigned64(&value), 0x1234_5678);
    }

    #[test]
    fn narrow_bigint_unsigned64_reduces_negative_values_modulo_2_pow_64() {
        // A negative `BigInt` (e.g. from negating a large positive literal, or an underflowing
        // subtraction) must reduce modulo 2^64, not take the absolute value's bytes.
        assert_eq!(Literal::narrow_bigint_unsigned64(&BigInt::from(-1)), u64::MAX);
        assert_eq!(Literal::narrow_bigint_unsigned64(&BigInt::from(-5i64)), (-5i64) as u64);
        assert_eq!(Literal::narrow_bigint_signed64(&BigInt::from(-5i64)), -5);
    }

    #[test]
    fn narrow_bigint_signed64_reinterprets_high_bit() {
        // 2^64 - 1 narrows to all-ones bits, i.e. -1 as a signed i64.
        let value = (BigInt::from(1) << 64) - BigInt::from(1);
        assert_eq!(Literal::narrow_bigint_signed64(&value), -1);
    }

    #[test]
    fn as_bigint_is_none_for_real() {
        assert!(Literal::Real(1.5).as_bigint().is_none());
        assert_eq!(Literal::Int(7).as_bigint(), Some(BigInt::from(7)));
    }
}
