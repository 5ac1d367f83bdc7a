//! Real numbers: machine integers, arbitrary-precision integers, fractions
//! and hardware-float decimals.
//!
//! The encoding keeps magnitudes unsigned; negative integers, bignums and
//! fractions get their own tag. Arithmetic promotes between representations
//! as needed and always allocates the smallest encoding that holds the
//! result.

use std::cmp::Ordering;

use num::{
   BigInt,
   BigRational,
   ToPrimitive as _,
   bigint::Sign,
};

use crate::{
   Id,
   Result,
   Runtime,
   leb128,
   object,
   parse::{
      Parsed,
      Parser,
   },
   render::Renderer,
};

// Constructors.

pub fn make_integer(rt: &mut Runtime, value: u64) -> Result<usize> {
   let mut image = Vec::with_capacity(12);
   leb128::push(&mut image, Id::Integer as u64);
   leb128::push(&mut image, value);
   rt.make(&image)
}

pub fn make_neg_integer(rt: &mut Runtime, magnitude: u64) -> Result<usize> {
   if magnitude == 0 {
      return make_integer(rt, 0);
   }

   let mut image = Vec::with_capacity(12);
   leb128::push(&mut image, Id::NegInteger as u64);
   leb128::push(&mut image, magnitude);
   rt.make(&image)
}

pub fn make_signed(rt: &mut Runtime, value: i64) -> Result<usize> {
   if value < 0 {
      make_neg_integer(rt, value.unsigned_abs())
   } else {
      make_integer(rt, value as u64)
   }
}

pub fn make_based(rt: &mut Runtime, base: u32, value: u64) -> Result<usize> {
   let mut image = Vec::with_capacity(14);
   leb128::push(&mut image, Id::BasedInteger as u64);
   leb128::push(&mut image, u64::from(base));
   leb128::push(&mut image, value);
   rt.make(&image)
}

/// Allocates the smallest integral encoding holding this value.
pub fn make_big(rt: &mut Runtime, value: &BigInt) -> Result<usize> {
   if let Some(small) = value.to_u64() {
      return make_integer(rt, small);
   }
   if value.sign() == Sign::Minus
      && let Some(small) = (-value).to_u64()
   {
      return make_neg_integer(rt, small);
   }

   let (sign, bytes) = value.to_bytes_le();
   let ty = if sign == Sign::Minus {
      Id::NegBignum
   } else {
      Id::Bignum
   };

   let mut image = Vec::with_capacity(bytes.len() + 4);
   leb128::push(&mut image, ty as u64);
   leb128::push(&mut image, bytes.len() as u64);
   image.extend_from_slice(&bytes);
   rt.make(&image)
}

/// Allocates a fraction, reduced; denominator 1 collapses to an integer.
pub fn make_fraction(rt: &mut Runtime, negative: bool, num: u64, den: u64) -> Result<usize> {
   if den == 0 {
      return rt.zero_divide_error().err();
   }

   let common = gcd(num, den);
   let (num, den) = (num / common, den / common);

   if den == 1 || num == 0 {
      return if negative {
         make_neg_integer(rt, num)
      } else {
         make_integer(rt, num)
      };
   }

   let ty = if negative {
      Id::NegFraction
   } else {
      Id::Fraction
   };

   let mut image = Vec::with_capacity(20);
   leb128::push(&mut image, ty as u64);
   leb128::push(&mut image, num);
   leb128::push(&mut image, den);
   rt.make(&image)
}

pub fn make_decimal(rt: &mut Runtime, value: f64) -> Result<usize> {
   let mut image = Vec::with_capacity(10);
   leb128::push(&mut image, Id::Decimal as u64);
   image.extend_from_slice(&value.to_le_bytes());
   rt.make(&image)
}

/// Allocates the smallest encoding for an exact rational result.
pub fn make_rational(rt: &mut Runtime, value: &BigRational) -> Result<usize> {
   if value.is_integer() {
      return make_big(rt, &value.to_integer());
   }

   let negative = value.numer().sign() == Sign::Minus;
   let numer = value.numer().magnitude().to_u64();
   let denom = value.denom().magnitude().to_u64();

   match (numer, denom) {
      (Some(num), Some(den)) => make_fraction(rt, negative, num, den),

      // Components too large for the fraction encoding: fall back to the
      // decimal approximation.
      _ => make_decimal(rt, value.to_f64().unwrap_or(f64::NAN)),
   }
}

// Readers.

/// The magnitude of an integer or the value of a based integer.
#[must_use]
pub fn integer_value(rt: &Runtime, obj: usize) -> Option<u64> {
   let at = object::payload(rt, obj);

   match object::id(rt, obj) {
      Id::Integer | Id::NegInteger => Some(leb128::read(rt.bytes(), at).0),
      Id::BasedInteger => {
         let digits = leb128::skip(rt.bytes(), at);
         Some(leb128::read(rt.bytes(), digits).0)
      },
      _ => None,
   }
}

/// Base and value of a based integer.
#[must_use]
pub fn based_parts(rt: &Runtime, obj: usize) -> (u32, u64) {
   let at = object::payload(rt, obj);
   let (base, read) = leb128::read(rt.bytes(), at);
   let (value, _) = leb128::read(rt.bytes(), at + read);

   (base as u32, value)
}

/// Sign, numerator and denominator of a fraction.
#[must_use]
pub fn fraction_parts(rt: &Runtime, obj: usize) -> (bool, u64, u64) {
   let at = object::payload(rt, obj);
   let (num, read) = leb128::read(rt.bytes(), at);
   let (den, _) = leb128::read(rt.bytes(), at + read);

   (object::id(rt, obj) == Id::NegFraction, num, den)
}

#[must_use]
pub fn decimal_value(rt: &Runtime, obj: usize) -> f64 {
   let at = object::payload(rt, obj);
   let mut raw = [0_u8; 8];
   raw.copy_from_slice(&rt.bytes()[at..at + 8]);

   f64::from_le_bytes(raw)
}

/// The exact rational value of anything integral or fractional; `None` for
/// decimals.
#[must_use]
pub fn rational_value(rt: &Runtime, obj: usize) -> Option<BigRational> {
   let at = object::payload(rt, obj);

   match object::id(rt, obj) {
      Id::Integer => Some(BigRational::from(BigInt::from(leb128::read(rt.bytes(), at).0))),
      Id::NegInteger => Some(BigRational::from(-BigInt::from(
         leb128::read(rt.bytes(), at).0,
      ))),
      Id::BasedInteger => {
         let (_, value) = based_parts(rt, obj);
         Some(BigRational::from(BigInt::from(value)))
      },

      Id::Bignum | Id::NegBignum => {
         let (len, read) = leb128::read(rt.bytes(), at);
         let bytes = &rt.bytes()[at + read..at + read + len as usize];
         let sign = if object::id(rt, obj) == Id::NegBignum {
            Sign::Minus
         } else {
            Sign::Plus
         };

         Some(BigRational::from(BigInt::from_bytes_le(sign, bytes)))
      },

      Id::Fraction | Id::NegFraction => {
         let (negative, num, den) = fraction_parts(rt, obj);
         let mut value = BigRational::new(BigInt::from(num), BigInt::from(den));
         if negative {
            value = -value;
         }
         Some(value)
      },

      _ => None,
   }
}

/// Any real number as a hardware float.
#[must_use]
pub fn to_f64(rt: &Runtime, obj: usize) -> f64 {
   match object::id(rt, obj) {
      Id::Decimal => decimal_value(rt, obj),
      _ => rational_value(rt, obj)
         .and_then(|value| value.to_f64())
         .unwrap_or(f64::NAN),
   }
}

#[must_use]
pub fn is_zero(rt: &Runtime, obj: usize) -> bool {
   match object::id(rt, obj) {
      Id::Decimal => decimal_value(rt, obj) == 0.0,
      _ => rational_value(rt, obj).is_some_and(|value| value.numer().sign() == Sign::NoSign),
   }
}

#[must_use]
pub fn is_negative(rt: &Runtime, obj: usize) -> bool {
   match object::id(rt, obj) {
      Id::Decimal => decimal_value(rt, obj) < 0.0,
      Id::NegInteger | Id::NegBignum | Id::NegFraction => true,
      _ => false,
   }
}

/// Numeric ordering across every real representation.
#[must_use]
pub fn compare(rt: &Runtime, left: usize, right: usize) -> Ordering {
   match (rational_value(rt, left), rational_value(rt, right)) {
      (Some(x), Some(y)) => x.cmp(&y),
      _ => to_f64(rt, left)
         .partial_cmp(&to_f64(rt, right))
         .unwrap_or(Ordering::Equal),
   }
}

fn gcd(mut x: u64, mut y: u64) -> u64 {
   while y != 0 {
      (x, y) = (y, x % y);
   }
   x.max(1)
}

// Parsing.

fn digit_value(c: char) -> Option<u64> {
   c.to_digit(36).map(u64::from)
}

fn scan_digits(p: &Parser, mut at: usize, base: u64) -> (usize, bool) {
   let mut any = false;

   for c in p.rest_from(at).chars() {
      if c == '_' {
         at += 1;
         continue;
      }

      match digit_value(c) {
         Some(digit) if digit < base => {
            any = true;
            at += c.len_utf8();
         },
         _ => break,
      }
   }

   (at, any)
}

fn digits_value(text: &str, base: u64) -> Option<u64> {
   let mut value = 0_u128;

   for c in text.chars() {
      if c == '_' {
         continue;
      }

      value = value * u128::from(base) + u128::from(digit_value(c)?);
      if value > u128::from(u64::MAX) {
         return None;
      }
   }

   Some(value as u64)
}

/// Parses based-integer literals: `#BEEFh`, `#777o`, `#1010b`, `#99d` and
/// the explicit-radix `base#digits#` form.
pub fn parse_based(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   let start = p.offset;

   // radix#digits#
   if let Some(c) = p.peek()
      && c.is_ascii_digit()
   {
      let (after_radix, _) = scan_digits(p, p.offset, 10);
      if p.rest_from(after_radix).starts_with('#') {
         let Some(base) = digits_value(p.slice(start, after_radix), 10) else {
            return Ok(Parsed::Skip);
         };
         if !(2..=36).contains(&base) {
            return Ok(Parsed::Skip);
         }

         let digits_start = after_radix + 1;
         let (digits_end, any) = scan_digits(p, digits_start, base);
         if !any || !p.rest_from(digits_end).starts_with('#') {
            return Ok(Parsed::Skip);
         }

         let Some(value) = digits_value(p.slice(digits_start, digits_end), base) else {
            return p.fail_value(rt, start, digits_end);
         };

         p.offset = digits_end + 1;
         let value = mask_to_word_size(rt, value);
         return Ok(Parsed::Done(make_based(rt, base as u32, value)?));
      }
   }

   if !p.rest().starts_with('#') {
      return Ok(Parsed::Skip);
   }

   // #digits with a trailing base letter; the digits are scanned in base 16
   // so that the suffix letter of #12d or #101b is not eaten as a digit, and
   // validated against the actual base afterwards.
   let digits_start = p.offset + 1;
   let (scan_end, any) = scan_digits(p, digits_start, 16);
   if !any {
      return Ok(Parsed::Skip);
   }

   let (digits_end, base) = match p.rest_from(scan_end).chars().next() {
      Some('h' | 'H') => (scan_end, 16),
      Some('o' | 'O') => (scan_end, 8),
      _ => {
         // Binary and decimal suffixes are hex digits themselves, so they sit
         // at the end of the scanned run.
         let text = p.slice(digits_start, scan_end);
         match text.chars().last() {
            Some('b' | 'B') => (scan_end - 1, 2),
            Some('d' | 'D') => (scan_end - 1, 10),
            _ => return Ok(Parsed::Skip),
         }
      },
   };

   let text = p.slice(digits_start, digits_end);
   if text.is_empty() || text.chars().any(|c| c != '_' && digit_value(c).is_none_or(|d| d >= base))
   {
      return Ok(Parsed::Skip);
   }

   let Some(value) = digits_value(text, base) else {
      return p.fail_value(rt, start, digits_end);
   };

   p.offset = digits_end + 1;
   let value = mask_to_word_size(rt, value);
   Ok(Parsed::Done(make_based(rt, base as u32, value)?))
}

fn mask_to_word_size(rt: &Runtime, value: u64) -> u64 {
   let bits = rt.settings.word_size;

   if bits >= 64 {
      value
   } else {
      value & ((1 << bits) - 1)
   }
}

/// Parses decimal integers, decimals with fractional part or exponent, and
/// top-level `a/b` fractions.
pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   // Numbers never sit in infix position.
   if p.precedence < 0 {
      return Ok(Parsed::Skip);
   }

   let start = p.offset;
   let mut at = p.offset;
   let mut negative = false;

   // A sign belongs to the literal only at the top level; inside an
   // expression the sign is an operator.
   if p.precedence == 0
      && let Some(sign @ ('-' | '+')) = p.peek()
   {
      negative = sign == '-';
      at += 1;
   }

   let (int_end, any) = scan_digits(p, at, 10);
   if !any {
      return Ok(Parsed::Skip);
   }

   let rest = p.rest_from(int_end);

   // Fractional part or exponent make it a decimal.
   let fractional = rest.starts_with('.')
      && p.rest_from(int_end + 1)
         .chars()
         .next()
         .is_some_and(|c| c.is_ascii_digit());
   let exponent = rest.starts_with(['e', 'E'])
      && p.rest_from(int_end + 1)
         .chars()
         .next()
         .map(|c| {
            c.is_ascii_digit()
               || (matches!(c, '+' | '-')
                  && p.rest_from(int_end + 2)
                     .chars()
                     .next()
                     .is_some_and(|c| c.is_ascii_digit()))
         })
         .unwrap_or(false);

   if fractional || exponent {
      let mut end = int_end;

      if fractional {
         (end, _) = scan_digits(p, end + 1, 10);
      }

      let rest = p.rest_from(end);
      if rest.starts_with(['e', 'E']) {
         let mut exp_at = end + 1;
         if p.rest_from(exp_at).starts_with(['+', '-']) {
            exp_at += 1;
         }
         let (exp_end, any) = scan_digits(p, exp_at, 10);
         if any {
            end = exp_end;
         }
      }

      let text: String = p.slice(start, end).chars().filter(|&c| c != '_').collect();
      let Ok(value) = text.parse::<f64>() else {
         return p.fail_value(rt, start, end);
      };

      p.offset = end;
      return Ok(Parsed::Done(make_decimal(rt, value)?));
   }

   // Top-level a/b fraction, both parts adjacent to the slash.
   if p.precedence == 0 && rest.starts_with('/') {
      let den_start = int_end + 1;
      let (den_end, any) = scan_digits(p, den_start, 10);

      if any {
         let num = digits_value(p.slice(at, int_end), 10);
         let den = digits_value(p.slice(den_start, den_end), 10);

         let (Some(num), Some(den)) = (num, den) else {
            return p.fail_value(rt, start, den_end);
         };
         if den == 0 {
            return rt.zero_divide_error().source(p.span(start, den_end)).err();
         }

         p.offset = den_end;
         return Ok(Parsed::Done(make_fraction(rt, negative, num, den)?));
      }
   }

   let text = p.slice(at, int_end);
   p.offset = int_end;

   match digits_value(text, 10) {
      Some(value) => {
         if negative {
            Ok(Parsed::Done(make_neg_integer(rt, value)?))
         } else {
            Ok(Parsed::Done(make_integer(rt, value)?))
         }
      },

      // Too large for the machine encoding: arbitrary precision.
      None => {
         let digits: String = text.chars().filter(|&c| c != '_').collect();
         let mut value: BigInt = digits.parse().unwrap_or_default();
         if negative {
            value = -value;
         }
         Ok(Parsed::Done(make_big(rt, &value)?))
      },
   }
}

// Rendering.

const BASED_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn based_digits(mut value: u64, base: u64) -> String {
   let mut digits = Vec::new();

   loop {
      digits.push(BASED_DIGITS[(value % base) as usize]);
      value /= base;

      if value == 0 {
         break;
      }
   }

   digits.reverse();
   String::from_utf8(digits).expect("digits are ASCII")
}

/// Renders a decimal with at most the configured number of significant
/// digits for display, full round-trip precision everywhere else.
fn decimal_text(value: f64, display_digits: Option<u32>) -> String {
   match display_digits {
      Some(digits) => {
         let text = format!("{value:.prec$e}", prec = digits.saturating_sub(1) as usize);

         // Fold 1.5e2 style output back to plain notation when short.
         match text.parse::<f64>() {
            Ok(folded) if folded.abs() < 1e12 => {
               let plain = format!("{folded:?}");
               if plain.len() <= text.len() { plain } else { text }
            },
            _ => text,
         }
      },

      None => format!("{value:?}"),
   }
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   match object::id(rt, obj) {
      Id::Integer => {
         let value = integer_value(rt, obj).unwrap_or(0);
         r.put(&value.to_string());
      },

      Id::NegInteger => {
         let value = integer_value(rt, obj).unwrap_or(0);
         r.put("-");
         r.put(&value.to_string());
      },

      Id::BasedInteger => {
         let (base, value) = based_parts(rt, obj);

         match base {
            16 | 8 | 2 | 10 => {
               let suffix = match base {
                  16 => "h",
                  8 => "o",
                  2 => "b",
                  _ => "d",
               };
               r.put("#");
               r.put(&based_digits(value, u64::from(base)));
               r.put(suffix);
            },

            _ => {
               r.put(&base.to_string());
               r.put("#");
               r.put(&based_digits(value, u64::from(base)));
               r.put("#");
            },
         }
      },

      Id::Bignum | Id::NegBignum => {
         let value = rational_value(rt, obj).expect("bignum is rational");
         r.put(&value.to_integer().to_string());
      },

      Id::Fraction | Id::NegFraction => {
         let (negative, num, den) = fraction_parts(rt, obj);

         if negative {
            r.put("-");
         }
         r.put(&num.to_string());
         r.put("/");
         r.put(&den.to_string());
      },

      Id::Decimal => {
         let digits = r.display().then_some(rt.settings.precision);
         r.put(&decimal_text(decimal_value(rt, obj), digits));
      },

      _ => {},
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn smallest_encoding_wins() {
      let mut rt = Runtime::new();

      let big = make_big(&mut rt, &BigInt::from(42)).expect("make");
      assert_eq!(object::id(&rt, big), Id::Integer);

      let big = make_big(&mut rt, &BigInt::from(-42)).expect("make");
      assert_eq!(object::id(&rt, big), Id::NegInteger);

      let huge = make_big(&mut rt, &BigInt::from(u128::MAX)).expect("make");
      assert_eq!(object::id(&rt, huge), Id::Bignum);
   }

   #[test]
   fn fractions_reduce() {
      let mut rt = Runtime::new();

      let half = make_fraction(&mut rt, false, 4, 8).expect("make");
      assert_eq!(fraction_parts(&rt, half), (false, 1, 2));

      let whole = make_fraction(&mut rt, true, 8, 4).expect("make");
      assert_eq!(object::id(&rt, whole), Id::NegInteger);
   }

   #[test]
   fn ordering_crosses_representations() {
      let mut rt = Runtime::new();

      let third = make_fraction(&mut rt, false, 1, 3).expect("make");
      let decimal = make_decimal(&mut rt, 0.5).expect("make");
      let one = make_integer(&mut rt, 1).expect("make");

      assert_eq!(compare(&rt, third, decimal), Ordering::Less);
      assert_eq!(compare(&rt, decimal, one), Ordering::Less);
      assert_eq!(compare(&rt, one, third), Ordering::Greater);
   }

   #[test]
   fn negative_zero_is_zero() {
      let mut rt = Runtime::new();

      let zero = make_neg_integer(&mut rt, 0).expect("make");
      assert_eq!(object::id(&rt, zero), Id::Integer);
      assert!(is_zero(&rt, zero));
   }
}
