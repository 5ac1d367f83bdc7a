//! Programs: sequences evaluated step by step. A program literal inside a
//! running program pushes itself; running one defers its body onto the
//! return stack. Blocks are delimiter-less programs used for the bodies of
//! control structures.

use crate::{
   Id,
   Result,
   Runtime,
   object,
   parse::{
      self,
      Parsed,
      Parser,
   },
};

pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   if p.peek() != Some('«') {
      return Ok(Parsed::Skip);
   }

   let saved = p.precedence;
   p.precedence = 0;
   let result = super::list::parse_seq(rt, p, Id::Program, Some('«'), Some('»'));
   p.precedence = saved;
   result
}

/// Builds a block object from already-parsed source text.
pub fn block_of(rt: &mut Runtime, source: &str) -> Result<usize> {
   parse::all(rt, source)
}

/// Defers execution of an object: programs, blocks and expressions run
/// their body, anything else is deferred whole so its evaluation happens
/// next.
pub fn defer(rt: &mut Runtime, obj: usize) -> Result {
   let ty = object::id(rt, obj);

   if ty.is_program() || ty == Id::Expression {
      let (start, end) = object::body(rt, obj);
      rt.run_push(start, end)
   } else {
      rt.run_push(obj, object::skip(rt, obj))
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{
      render,
      value::list,
   };

   #[test]
   fn programs_roundtrip_with_guillemets() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("« 1 2 + »");
      let Parsed::Done(obj) = parse(&mut rt, &mut p).expect("parse") else {
         panic!("program must parse");
      };

      assert_eq!(object::id(&rt, obj), Id::Program);
      assert_eq!(list::len(&rt, obj), 3);

      let text = render::to_text(&rt, obj);
      let mut p = Parser::new(&text);
      let Parsed::Done(again) = parse(&mut rt, &mut p).expect("reparse") else {
         panic!("rendered program must parse");
      };
      assert!(object::same(&rt, obj, again));
   }

   #[test]
   fn nested_programs_stay_nested() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("« 1 « 2 » »");
      let Parsed::Done(obj) = parse(&mut rt, &mut p).expect("parse") else {
         panic!("program must parse");
      };

      let kinds: Vec<Id> = list::items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(kinds, [Id::Integer, Id::Program]);
   }
}
