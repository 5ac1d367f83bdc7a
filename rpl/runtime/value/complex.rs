//! Complex numbers, rectangular `a+bⅈ` and polar `r∠θ`. Components are any
//! real number objects, stored back to back.

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
   value::number,
};

pub fn make(rt: &mut Runtime, ty: Id, first: usize, second: usize) -> Result<usize> {
   let mut image = Vec::new();
   leb128::push(&mut image, ty as u64);
   image.extend_from_slice(&object::image(rt, first));
   image.extend_from_slice(&object::image(rt, second));
   rt.make(&image)
}

/// The two components: real and imaginary parts, or modulus and argument.
#[must_use]
pub fn parts(rt: &Runtime, obj: usize) -> (usize, usize) {
   let first = object::payload(rt, obj);

   (first, object::skip(rt, first))
}

/// Both components as hardware floats, in rectangular form.
#[must_use]
pub fn to_rectangular(rt: &Runtime, obj: usize) -> (f64, f64) {
   let (first, second) = parts(rt, obj);
   let x = number::to_f64(rt, first);
   let y = number::to_f64(rt, second);

   match object::id(rt, obj) {
      Id::Polar => (x * y.cos(), x * y.sin()),
      _ => (x, y),
   }
}

pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   if p.precedence < 0 {
      return Ok(Parsed::Skip);
   }

   let start = p.offset;

   let Parsed::Done(first) = number::parse(rt, p)? else {
      return Ok(Parsed::Skip);
   };

   // r∠θ
   if p.rest().starts_with('∠') {
      p.offset += '∠'.len_utf8();

      let Parsed::Done(second) = number::parse(rt, p)? else {
         return rt
            .syntax_error()
            .source(p.span(start, p.offset))
            .err();
      };

      return Ok(Parsed::Done(make(rt, Id::Polar, first, second)?));
   }

   // bⅈ, purely imaginary
   if p.rest().starts_with('ⅈ') {
      p.offset += 'ⅈ'.len_utf8();

      let zero = number::make_integer(rt, 0)?;
      return Ok(Parsed::Done(make(rt, Id::Rectangular, zero, first)?));
   }

   // a+bⅈ and a-bⅈ; the sign is parsed as part of the imaginary number.
   if p.rest().starts_with(['+', '-'])
      && p.rest_from(p.offset + 1)
         .chars()
         .next()
         .is_some_and(|c| c.is_ascii_digit())
   {
      let resume = p.offset;

      if let Parsed::Done(second) = number::parse(rt, p)?
         && p.rest().starts_with('ⅈ')
      {
         p.offset += 'ⅈ'.len_utf8();
         return Ok(Parsed::Done(make(rt, Id::Rectangular, first, second)?));
      }

      p.offset = resume;
   }

   // Just a real number after all.
   p.offset = start;
   Ok(Parsed::Skip)
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   let (first, second) = parts(rt, obj);

   match object::id(rt, obj) {
      Id::Polar => {
         number::render(rt, first, r);
         r.put("∠");
         number::render(rt, second, r);
      },

      _ => {
         let imaginary_only = number::is_zero(rt, first);

         if !imaginary_only {
            number::render(rt, first, r);
            if !number::is_negative(rt, second) {
               r.put("+");
            }
         }

         number::render(rt, second, r);
         r.put("ⅈ");
      },
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::render;

   fn parse_one(rt: &mut Runtime, source: &str) -> usize {
      let mut p = Parser::new(source);
      match parse(rt, &mut p).expect("parse") {
         Parsed::Done(obj) => obj,
         _ => panic!("{source} must parse as complex"),
      }
   }

   #[test]
   fn rectangular_roundtrips() {
      let mut rt = Runtime::new();

      let obj = parse_one(&mut rt, "3-4ⅈ");
      assert_eq!(object::id(&rt, obj), Id::Rectangular);
      assert_eq!(render::to_text(&rt, obj), "3-4ⅈ");

      let (re, im) = to_rectangular(&rt, obj);
      assert_eq!((re, im), (3.0, -4.0));
   }

   #[test]
   fn polar_roundtrips() {
      let mut rt = Runtime::new();

      let obj = parse_one(&mut rt, "2∠1.5");
      assert_eq!(object::id(&rt, obj), Id::Polar);
      assert_eq!(render::to_text(&rt, obj), "2∠1.5");
   }

   #[test]
   fn plain_reals_are_left_alone() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("42 dup");
      assert!(matches!(parse(&mut rt, &mut p), Ok(Parsed::Skip)));
      assert_eq!(p.offset, 0);
   }
}
