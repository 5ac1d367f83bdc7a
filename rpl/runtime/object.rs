//! The uniform object protocol.
//!
//! An object is a tag followed by a type-specific payload, everything
//! LEB128-delimited so that the end of any object can be computed from its
//! start. The functions here are the per-tag dispatch surface that the rest
//! of the runtime builds on.

use std::cmp::Ordering;

use crate::{
   Id,
   Result,
   Runtime,
   leb128,
   value::{
      number,
      symbol,
   },
};

/// Reads the tag of the object at the given offset.
#[must_use]
pub fn id(rt: &Runtime, obj: usize) -> Id {
   let raw = leb128::read_u16(rt.bytes(), obj);

   Id::try_from(raw).unwrap_or(Id::Object)
}

/// The offset of the object's payload, just past its tag.
#[must_use]
pub fn payload(rt: &Runtime, obj: usize) -> usize {
   leb128::skip(rt.bytes(), obj)
}

/// The total size of the object in bytes.
#[must_use]
pub fn size(rt: &Runtime, obj: usize) -> usize {
   let ty = id(rt, obj);
   let after_tag = payload(rt, obj);
   let bytes = rt.bytes();

   match ty {
      // Tag plus one number.
      Id::Integer | Id::NegInteger | Id::Local => leb128::skip(bytes, after_tag) - obj,

      // Tag plus two numbers.
      Id::BasedInteger | Id::Fraction | Id::NegFraction => {
         leb128::skip(bytes, leb128::skip(bytes, after_tag)) - obj
      },

      Id::Decimal => after_tag + 8 - obj,

      // Tag plus a length-prefixed body.
      Id::Bignum
      | Id::NegBignum
      | Id::Symbol
      | Id::Text
      | Id::Comment
      | Id::Expression
      | Id::List
      | Id::Array
      | Id::Program
      | Id::Block
      | Id::Directory => {
         let (len, read) = leb128::read(bytes, after_tag);
         after_tag + read + len as usize - obj
      },

      // Tag plus two sub-objects.
      Id::Rectangular | Id::Polar => {
         let second = skip(rt, after_tag);
         skip(rt, second) - obj
      },

      // Loop markers carry a back-offset to their replay point.
      Id::UntilMarker | Id::WhileMarker | Id::NextMarker | Id::StepMarker => {
         leb128::skip(bytes, after_tag) - obj
      },

      // Structures hold a length-prefixed run of sub-objects.
      ty if ty.is_structure() => {
         let (len, read) = leb128::read(bytes, after_tag);
         after_tag + read + len as usize - obj
      },

      // Commands, remaining markers and reserved names are just their tag.
      _ => after_tag - obj,
   }
}

/// The offset just past the object.
#[must_use]
pub fn skip(rt: &Runtime, obj: usize) -> usize {
   obj + size(rt, obj)
}

/// The sub-object run of a structure or aggregate: payload start and end.
#[must_use]
pub fn body(rt: &Runtime, obj: usize) -> (usize, usize) {
   let after_tag = payload(rt, obj);
   let (len, read) = leb128::read(rt.bytes(), after_tag);

   (after_tag + read, after_tag + read + len as usize)
}

/// Appends a command or marker object, which is its bare tag.
pub fn push_command(image: &mut Vec<u8>, ty: Id) {
   leb128::push(image, ty as u64);
}

/// Assembles a length-prefixed object image from a payload.
#[must_use]
pub fn wrap(ty: Id, body: &[u8]) -> Vec<u8> {
   let mut image = Vec::with_capacity(body.len() + 4);
   leb128::push(&mut image, ty as u64);
   leb128::push(&mut image, body.len() as u64);
   image.extend_from_slice(body);
   image
}

/// Copies the object's bytes out of the arena.
#[must_use]
pub fn image(rt: &Runtime, obj: usize) -> Vec<u8> {
   rt.bytes()[obj..skip(rt, obj)].to_vec()
}

/// Compares two objects, numerically inside the real family, honouring the
/// case setting for symbols, bytewise otherwise.
#[must_use]
pub fn compare(rt: &Runtime, left: usize, right: usize) -> Ordering {
   let lty = id(rt, left);
   let rty = id(rt, right);

   if lty.is_real() && rty.is_real() {
      return number::compare(rt, left, right);
   }

   if lty == Id::Symbol && rty == Id::Symbol {
      return symbol::compare(rt, left, right);
   }

   if lty != rty {
      return (lty as u16).cmp(&(rty as u16));
   }

   rt.bytes()[left..skip(rt, left)].cmp(&rt.bytes()[right..skip(rt, right)])
}

/// Whether two objects are equal under [`compare`].
#[must_use]
pub fn same(rt: &Runtime, left: usize, right: usize) -> bool {
   compare(rt, left, right) == Ordering::Equal
}

/// Strips one level of quoting: an expression containing a single name
/// yields that name; a symbol or reserved name is already one.
#[must_use]
pub fn as_quoted(rt: &Runtime, obj: usize) -> Option<usize> {
   match id(rt, obj) {
      Id::Symbol => Some(obj),
      ty if ty.is_reserved_name() => Some(obj),

      Id::Expression => {
         let (start, end) = body(rt, obj);
         let ty = id(rt, start);

         (skip(rt, start) == end && (ty == Id::Symbol || ty.is_reserved_name())).then_some(start)
      },

      _ => None,
   }
}

/// The object as a truth value: zero is false, any other number true.
pub fn as_truth(rt: &mut Runtime, obj: usize) -> Result<bool> {
   let ty = id(rt, obj);

   if !ty.is_real() {
      return rt.type_error().err();
   }

   Ok(!number::is_zero(rt, obj))
}

/// The object as an unsigned 32-bit value, or a type/value error.
pub fn as_u32(rt: &mut Runtime, obj: usize) -> Result<u32> {
   let ty = id(rt, obj);

   match ty {
      Id::Integer | Id::BasedInteger => {
         let value = number::integer_value(rt, obj).unwrap_or(u64::MAX);

         u32::try_from(value).map_or_else(|_| rt.value_error().err(), Ok)
      },

      Id::NegInteger => rt.value_error().err(),

      Id::Decimal => {
         let value = number::decimal_value(rt, obj);

         if value < 0.0 || value > f64::from(u32::MAX) || value.fract() != 0.0 {
            return rt.value_error().err();
         }
         Ok(value as u32)
      },

      _ => rt.type_error().err(),
   }
}

/// The object as a signed 64-bit value.
pub fn as_i64(rt: &mut Runtime, obj: usize) -> Result<i64> {
   let ty = id(rt, obj);

   match ty {
      Id::Integer | Id::BasedInteger | Id::NegInteger => {
         let magnitude = number::integer_value(rt, obj).unwrap_or(u64::MAX);
         let Ok(magnitude) = i64::try_from(magnitude) else {
            return rt.value_error().err();
         };

         Ok(if ty == Id::NegInteger { -magnitude } else { magnitude })
      },

      Id::Decimal => {
         let value = number::decimal_value(rt, obj);

         if value.fract() != 0.0 || value < i64::MIN as f64 || value > i64::MAX as f64 {
            return rt.value_error().err();
         }
         Ok(value as i64)
      },

      _ => rt.type_error().err(),
   }
}

/// Pops the top of stack and converts it to an unsigned 32-bit value.
pub fn pop_u32(rt: &mut Runtime) -> Result<u32> {
   let obj = rt.pop()?;
   as_u32(rt, obj)
}

/// Validates that the bytes starting at `obj` form a well-formed object
/// ending exactly at `end`.
#[must_use]
pub fn well_formed(rt: &Runtime, obj: usize, end: usize) -> bool {
   if obj >= end {
      return false;
   }

   let raw = leb128::read_u16(rt.bytes(), obj);
   if Id::try_from(raw).is_err() || raw == Id::Object as u16 {
      return false;
   }

   let ty = id(rt, obj);
   let total = size(rt, obj);
   if obj + total > end {
      return false;
   }

   // Check the children of anything that aggregates sub-objects.
   let children = match ty {
      Id::Expression
      | Id::List
      | Id::Array
      | Id::Program
      | Id::Block
      | Id::Directory => Some(body(rt, obj)),
      ty if ty.is_structure() => Some(body(rt, obj)),
      Id::Rectangular | Id::Polar => {
         let start = payload(rt, obj);
         Some((start, obj + total))
      },
      _ => None,
   };

   if let Some((mut at, stop)) = children {
      let mut count = 0_usize;

      while at < stop {
         if !well_formed(rt, at, stop) {
            return false;
         }
         at = skip(rt, at);
         count += 1;
      }

      if at != stop {
         return false;
      }

      // Directories pair names with values.
      if ty == Id::Directory && count % 2 != 0 {
         return false;
      }
   }

   true
}
