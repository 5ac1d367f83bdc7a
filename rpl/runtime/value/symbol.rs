//! Symbols: names that evaluate by looking themselves up.

use std::cmp::Ordering;

use rpl_syntax::{
   is_valid_as_name_initial,
   is_valid_in_name,
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
   value::text,
};

pub fn make(rt: &mut Runtime, name: &str) -> Result<usize> {
   text::make_with(rt, Id::Symbol, name.as_bytes())
}

/// The name, borrowed from the arena.
#[must_use]
pub fn value(rt: &Runtime, obj: usize) -> &str {
   let at = object::payload(rt, obj);
   let (len, read) = leb128::read(rt.bytes(), at);
   let bytes = &rt.bytes()[at + read..at + read + len as usize];

   std::str::from_utf8(bytes).unwrap_or("")
}

/// Name ordering, honouring the case sensitivity setting.
#[must_use]
pub fn compare(rt: &Runtime, left: usize, right: usize) -> Ordering {
   let left = value(rt, left);
   let right = value(rt, right);

   compare_names(rt, left, right)
}

#[must_use]
pub fn compare_names(rt: &Runtime, left: &str, right: &str) -> Ordering {
   if rt.settings.case_sensitive {
      left.cmp(right)
   } else {
      left.to_lowercase().cmp(&right.to_lowercase())
   }
}

#[must_use]
pub fn matches(rt: &Runtime, obj: usize, name: &str) -> bool {
   compare_names(rt, value(rt, obj), name) == Ordering::Equal
}

/// Parses a name. This is the last candidate in the dispatch order, so any
/// word no other parser claimed becomes a symbol — or a local reference if
/// a surrounding loop bound it.
pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   let start = p.offset;

   let Some(initial) = p.peek() else {
      return Ok(Parsed::Skip);
   };
   if !is_valid_as_name_initial(initial) {
      return Ok(Parsed::Skip);
   }

   let mut end = start + initial.len_utf8();
   for c in p.rest_from(end).chars() {
      if !is_valid_in_name(c) {
         break;
      }
      end += c.len_utf8();
   }

   let name = p.slice(start, end).to_owned();
   p.offset = end;

   // A name bound by an enclosing loop compiles to its depth.
   if let Some(index) = p.local_index(rt, &name) {
      let mut image = Vec::with_capacity(4);
      leb128::push(&mut image, Id::Local as u64);
      leb128::push(&mut image, index as u64);
      return Ok(Parsed::Done(rt.make(&image)?));
   }

   Ok(Parsed::Done(make(rt, &name)?))
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   r.put(value(rt, obj));
}

/// The depth a local reference resolves to.
#[must_use]
pub fn local_index(rt: &Runtime, obj: usize) -> usize {
   let at = object::payload(rt, obj);
   leb128::read(rt.bytes(), at).0 as usize
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn case_sensitivity_follows_the_setting() {
      let mut rt = Runtime::new();

      let lower = make(&mut rt, "speed").expect("make");
      let upper = make(&mut rt, "SPEED").expect("make");

      assert_eq!(compare(&rt, lower, upper), Ordering::Equal);

      rt.settings.case_sensitive = true;
      assert_ne!(compare(&rt, lower, upper), Ordering::Equal);
   }

   #[test]
   fn words_parse_to_symbols() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("Speed2 rest");
      let Parsed::Done(obj) = parse(&mut rt, &mut p).expect("parse") else {
         panic!("name must parse");
      };

      assert_eq!(object::id(&rt, obj), Id::Symbol);
      assert_eq!(value(&rt, obj), "Speed2");
      assert_eq!(p.offset, 6);
   }

   #[test]
   fn numbers_are_not_names() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("2X");
      assert!(matches!(parse(&mut rt, &mut p), Ok(Parsed::Skip)));
   }
}
