//! The arithmetic and logic commands.
//!
//! Exact arithmetic runs over rationals and promotes to arbitrary
//! precision; anything touching a decimal falls back to hardware floats.
//! When an operand is symbolic the operation builds an expression instead,
//! which is what lets formulas flow through the same commands.

use std::cmp::Ordering;

use num::{
   BigInt,
   ToPrimitive as _,
   Zero as _,
};

use crate::{
   Failed,
   Id,
   Result,
   Runtime,
   memory::GcObj,
   object,
   settings::AngleMode,
   value::{
      complex,
      expression,
      number,
   },
};

pub fn evaluate(rt: &mut Runtime, ty: Id) -> Result {
   match ty.arity() {
      1 => unary(rt, ty),
      2 => binary(rt, ty),
      _ => rt.internal_error().command(ty).err(),
   }
}

fn push_bool(rt: &mut Runtime, truth: bool) -> Result {
   let obj = number::make_integer(rt, u64::from(truth))?;
   rt.push(obj)
}

fn pop_protected(rt: &mut Runtime) -> Result<GcObj> {
   let obj = rt.pop()?;
   Ok(rt.protect(obj))
}

fn is_symbolic(rt: &Runtime, obj: usize) -> bool {
   object::id(rt, obj).is_symbolic()
}

fn to_radians(rt: &Runtime, value: f64) -> f64 {
   match rt.settings.angle_mode {
      AngleMode::Degrees => value.to_radians(),
      AngleMode::Radians => value,
      AngleMode::Grads => value * std::f64::consts::PI / 200.0,
   }
}

fn binary(rt: &mut Runtime, ty: Id) -> Result {
   let y = pop_protected(rt)?;
   let x = pop_protected(rt)?;

   let xt = object::id(rt, x.get());
   let yt = object::id(rt, y.get());

   // Symbolic operands turn the operation into an expression.
   if is_symbolic(rt, x.get()) || is_symbolic(rt, y.get()) {
      if !xt.is_algebraic() || !yt.is_algebraic() {
         return rt.type_error().command(ty).err();
      }

      let combined = expression::combine(rt, ty, &[x.get(), y.get()])?;
      return rt.push(combined);
   }

   match ty {
      Id::TestEq => return push_bool(rt, object::same(rt, x.get(), y.get())),
      Id::TestNe => return push_bool(rt, !object::same(rt, x.get(), y.get())),

      Id::TestLt | Id::TestGt | Id::TestLe | Id::TestGe => {
         if !(xt.is_real() && yt.is_real()) && !(xt == Id::Text && yt == Id::Text) {
            return rt.type_error().command(ty).err();
         }

         let order = object::compare(rt, x.get(), y.get());
         let truth = match ty {
            Id::TestLt => order == Ordering::Less,
            Id::TestGt => order == Ordering::Greater,
            Id::TestLe => order != Ordering::Greater,
            _ => order != Ordering::Less,
         };
         return push_bool(rt, truth);
      },

      Id::Min | Id::Max => {
         if !(xt.is_real() && yt.is_real()) {
            return rt.type_error().command(ty).err();
         }

         let order = object::compare(rt, x.get(), y.get());
         let keep = if (ty == Id::Min) == (order == Ordering::Greater) {
            y.get()
         } else {
            x.get()
         };
         return rt.push(keep);
      },

      Id::And | Id::Or | Id::Xor => return logic(rt, ty, &x, &y),

      _ => {},
   }

   // Complex operands collapse to rectangular float components.
   if xt.is_complex() || yt.is_complex() {
      return binary_complex(rt, ty, &x, &y);
   }

   if !xt.is_real() || !yt.is_real() {
      return rt.type_error().command(ty).err();
   }

   // Based integers stay in their base, wrapped to the configured word
   // size.
   if xt == Id::BasedInteger || yt == Id::BasedInteger {
      return binary_based(rt, ty, &x, &y);
   }

   if xt == Id::Decimal || yt == Id::Decimal {
      let a = number::to_f64(rt, x.get());
      let b = number::to_f64(rt, y.get());

      let value = match ty {
         Id::Add => a + b,
         Id::Sub => a - b,
         Id::Mul => a * b,
         Id::Div => {
            if b == 0.0 {
               return rt.zero_divide_error().command(ty).err();
            }
            a / b
         },
         Id::Pow => a.powf(b),
         _ => return rt.internal_error().command(ty).err(),
      };

      let result = number::make_decimal(rt, value)?;
      return rt.push(result);
   }

   // Exact path.
   let a = number::rational_value(rt, x.get()).ok_or(Failed)?;
   let b = number::rational_value(rt, y.get()).ok_or(Failed)?;

   let value = match ty {
      Id::Add => a + b,
      Id::Sub => a - b,
      Id::Mul => a * b,

      Id::Div => {
         if b.is_zero() {
            return rt.zero_divide_error().command(ty).err();
         }
         a / b
      },

      Id::Pow => {
         let Some(exponent) = b.is_integer().then(|| b.to_integer()).and_then(|e| e.to_i32())
         else {
            // Fractional or huge exponents go through floats.
            let value = number::to_f64(rt, x.get()).powf(number::to_f64(rt, y.get()));
            let result = number::make_decimal(rt, value)?;
            return rt.push(result);
         };

         if exponent < 0 && a.is_zero() {
            return rt.zero_divide_error().command(ty).err();
         }
         a.pow(exponent)
      },

      _ => return rt.internal_error().command(ty).err(),
   };

   let result = number::make_rational(rt, &value)?;
   rt.push(result)
}

fn binary_complex(rt: &mut Runtime, ty: Id, x: &GcObj, y: &GcObj) -> Result {
   let (ar, ai) = complex_parts(rt, x.get());
   let (br, bi) = complex_parts(rt, y.get());

   let (re, im) = match ty {
      Id::Add => (ar + br, ai + bi),
      Id::Sub => (ar - br, ai - bi),
      Id::Mul => (ar * br - ai * bi, ar * bi + ai * br),

      Id::Div => {
         let norm = br * br + bi * bi;
         if norm == 0.0 {
            return rt.zero_divide_error().command(ty).err();
         }
         ((ar * br + ai * bi) / norm, (ai * br - ar * bi) / norm)
      },

      _ => return rt.type_error().command(ty).err(),
   };

   let result = make_rectangular(rt, re, im)?;
   rt.push(result)
}

fn complex_parts(rt: &Runtime, obj: usize) -> (f64, f64) {
   if object::id(rt, obj).is_complex() {
      complex::to_rectangular(rt, obj)
   } else {
      (number::to_f64(rt, obj), 0.0)
   }
}

fn make_rectangular(rt: &mut Runtime, re: f64, im: f64) -> Result<usize> {
   let re = number::make_decimal(rt, re)?;
   let re = rt.protect(re);
   let im = number::make_decimal(rt, im)?;

   complex::make(rt, Id::Rectangular, re.get(), im)
}

fn based_value(rt: &mut Runtime, obj: usize) -> Result<u64> {
   match object::id(rt, obj) {
      Id::BasedInteger | Id::Integer => number::integer_value(rt, obj).ok_or(Failed),
      _ => rt.type_error().err(),
   }
}

fn word_mask(rt: &Runtime) -> u64 {
   let bits = rt.settings.word_size;

   if bits >= 64 {
      u64::MAX
   } else {
      (1 << bits) - 1
   }
}

fn binary_based(rt: &mut Runtime, ty: Id, x: &GcObj, y: &GcObj) -> Result {
   let base = if object::id(rt, x.get()) == Id::BasedInteger {
      number::based_parts(rt, x.get()).0
   } else {
      number::based_parts(rt, y.get()).0
   };

   let a = based_value(rt, x.get())?;
   let b = based_value(rt, y.get())?;
   let mask = word_mask(rt);

   let value = match ty {
      Id::Add => a.wrapping_add(b),
      Id::Sub => a.wrapping_sub(b),
      Id::Mul => a.wrapping_mul(b),

      Id::Div => {
         if b == 0 {
            return rt.zero_divide_error().command(ty).err();
         }
         a / b
      },

      _ => return rt.type_error().command(ty).err(),
   };

   let result = number::make_based(rt, base, value & mask)?;
   rt.push(result)
}

fn logic(rt: &mut Runtime, ty: Id, x: &GcObj, y: &GcObj) -> Result {
   let xt = object::id(rt, x.get());
   let yt = object::id(rt, y.get());

   // Bit-wise on based integers, boolean otherwise.
   if xt == Id::BasedInteger || yt == Id::BasedInteger {
      let base = if xt == Id::BasedInteger {
         number::based_parts(rt, x.get()).0
      } else {
         number::based_parts(rt, y.get()).0
      };

      let a = based_value(rt, x.get())?;
      let b = based_value(rt, y.get())?;

      let value = match ty {
         Id::And => a & b,
         Id::Or => a | b,
         _ => a ^ b,
      };

      let result = number::make_based(rt, base, value & word_mask(rt))?;
      return rt.push(result);
   }

   let a = object::as_truth(rt, x.get())?;
   let b = object::as_truth(rt, y.get())?;

   let truth = match ty {
      Id::And => a && b,
      Id::Or => a || b,
      _ => a != b,
   };

   push_bool(rt, truth)
}

fn unary(rt: &mut Runtime, ty: Id) -> Result {
   let x = pop_protected(rt)?;
   let xt = object::id(rt, x.get());

   if is_symbolic(rt, x.get()) {
      let combined = expression::combine(rt, ty, &[x.get()])?;
      return rt.push(combined);
   }

   if xt.is_complex() {
      return unary_complex(rt, ty, &x);
   }

   if ty == Id::Not {
      if xt == Id::BasedInteger {
         let (base, value) = number::based_parts(rt, x.get());
         let result = number::make_based(rt, base, !value & word_mask(rt))?;
         return rt.push(result);
      }

      let truth = object::as_truth(rt, x.get())?;
      return push_bool(rt, !truth);
   }

   if !xt.is_real() {
      return rt.type_error().command(ty).err();
   }

   match ty {
      Id::Fact => return factorial(rt, &x),

      Id::Sqrt => {
         let value = number::to_f64(rt, x.get());

         // The square root of a negative real is purely imaginary.
         if value < 0.0 {
            let result = make_rectangular(rt, 0.0, (-value).sqrt())?;
            return rt.push(result);
         }

         let result = number::make_decimal(rt, value.sqrt())?;
         return rt.push(result);
      },

      Id::Exp | Id::Ln | Id::Sin | Id::Cos | Id::Tan => {
         let value = number::to_f64(rt, x.get());

         let value = match ty {
            Id::Exp => value.exp(),
            Id::Ln => {
               if value <= 0.0 {
                  return rt.value_error().command(ty).err();
               }
               value.ln()
            },
            Id::Sin => to_radians(rt, value).sin(),
            Id::Cos => to_radians(rt, value).cos(),
            _ => to_radians(rt, value).tan(),
         };

         let result = number::make_decimal(rt, value)?;
         return rt.push(result);
      },

      _ => {},
   }

   if xt == Id::Decimal {
      let value = number::decimal_value(rt, x.get());

      let value = match ty {
         Id::Neg => -value,
         Id::Abs => value.abs(),
         Id::Sq => value * value,
         Id::Cubed => value * value * value,
         Id::Inv => {
            if value == 0.0 {
               return rt.zero_divide_error().command(ty).err();
            }
            1.0 / value
         },
         _ => return rt.internal_error().command(ty).err(),
      };

      let result = number::make_decimal(rt, value)?;
      return rt.push(result);
   }

   let a = number::rational_value(rt, x.get()).ok_or(Failed)?;

   let value = match ty {
      Id::Neg => -a,
      Id::Abs => {
         if a.numer().sign() == num::bigint::Sign::Minus {
            -a
         } else {
            a
         }
      },
      Id::Sq => a.clone() * a,
      Id::Cubed => a.clone() * a.clone() * a,
      Id::Inv => {
         if a.is_zero() {
            return rt.zero_divide_error().command(ty).err();
         }
         a.recip()
      },
      _ => return rt.internal_error().command(ty).err(),
   };

   let result = number::make_rational(rt, &value)?;
   rt.push(result)
}

fn unary_complex(rt: &mut Runtime, ty: Id, x: &GcObj) -> Result {
   let (re, im) = complex::to_rectangular(rt, x.get());

   match ty {
      Id::Neg => {
         let result = make_rectangular(rt, -re, -im)?;
         rt.push(result)
      },

      Id::Sq => {
         let result = make_rectangular(rt, re * re - im * im, 2.0 * re * im)?;
         rt.push(result)
      },

      Id::Abs => {
         let result = number::make_decimal(rt, re.hypot(im))?;
         rt.push(result)
      },

      Id::Inv => {
         let norm = re * re + im * im;
         if norm == 0.0 {
            return rt.zero_divide_error().command(ty).err();
         }
         let result = make_rectangular(rt, re / norm, -im / norm)?;
         rt.push(result)
      },

      _ => rt.type_error().command(ty).err(),
   }
}

/// Exact factorial. Long products poll for interruption so the user can
/// abort them.
fn factorial(rt: &mut Runtime, x: &GcObj) -> Result {
   let Some(value) = number::rational_value(rt, x.get()) else {
      return rt.type_error().command(Id::Fact).err();
   };

   if !value.is_integer() || value.numer().sign() == num::bigint::Sign::Minus {
      return rt.value_error().command(Id::Fact).err();
   }

   let Some(n) = value.to_integer().to_u32() else {
      return rt.value_error().command(Id::Fact).err();
   };

   let mut product = BigInt::from(1);
   for factor in 2..=u64::from(n) {
      product *= factor;

      if factor % 1024 == 0 && rt.interrupted() {
         // Put the flag back for the evaluator to observe.
         rt.interrupt_flag()
            .store(true, std::sync::atomic::Ordering::Relaxed);
         return Err(Failed);
      }
   }

   let result = number::make_big(rt, &product)?;
   rt.push(result)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{
      render,
      value::symbol,
   };

   fn push_int(rt: &mut Runtime, value: i64) {
      let obj = number::make_signed(rt, value).expect("make");
      rt.push(obj).expect("push");
   }

   fn top_text(rt: &mut Runtime) -> String {
      let top = rt.top().expect("top");
      render::to_text(rt, top)
   }

   #[test]
   fn integer_addition() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 2);
      push_int(&mut rt, 3);
      evaluate(&mut rt, Id::Add).expect("add");

      assert_eq!(rt.depth(), 1);
      assert_eq!(top_text(&mut rt), "5");
   }

   #[test]
   fn inexact_division_makes_fractions() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 3);
      push_int(&mut rt, 6);
      evaluate(&mut rt, Id::Div).expect("div");
      assert_eq!(top_text(&mut rt), "1/2");

      push_int(&mut rt, 2);
      evaluate(&mut rt, Id::Div).expect("div");
      assert_eq!(top_text(&mut rt), "1/4");
   }

   #[test]
   fn division_by_zero_raises() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 1);
      push_int(&mut rt, 0);
      assert!(evaluate(&mut rt, Id::Div).is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::ZeroDivide)
      );
   }

   #[test]
   fn integer_overflow_promotes() {
      let mut rt = Runtime::new();

      push_int(&mut rt, i64::MAX);
      push_int(&mut rt, i64::MAX);
      evaluate(&mut rt, Id::Mul).expect("mul");

      let top = rt.top().expect("top");
      assert_eq!(object::id(&rt, top), Id::Bignum);
   }

   #[test]
   fn factorial_is_exact() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 20);
      evaluate(&mut rt, Id::Fact).expect("fact");
      assert_eq!(top_text(&mut rt), "2432902008176640000");
   }

   #[test]
   fn symbolic_operands_build_expressions() {
      let mut rt = Runtime::new();

      let a = symbol::make(&mut rt, "a").expect("make");
      rt.push(a).expect("push");
      push_int(&mut rt, 2);
      evaluate(&mut rt, Id::Add).expect("add");

      assert_eq!(top_text(&mut rt), "'a+2'");
   }

   #[test]
   fn comparisons_yield_truth_values() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 2);
      push_int(&mut rt, 3);
      evaluate(&mut rt, Id::TestLt).expect("lt");
      assert_eq!(top_text(&mut rt), "1");
   }

   #[test]
   fn based_logic_masks_to_word_size() {
      let mut rt = Runtime::new();
      rt.settings.word_size = 8;

      let a = number::make_based(&mut rt, 16, 0xF0).expect("make");
      rt.push(a).expect("push");
      assert!(evaluate(&mut rt, Id::Not).is_ok());
      assert_eq!(top_text(&mut rt), "#Fh");
   }
}
