//! The parser front end.
//!
//! `object` is the single entry point. It tries each candidate tag's parser
//! in a fixed order and falls back to `symbol` last, so that any word not
//! recognised as a keyword becomes a name. A parser may also report that it
//! consumed a commented-out region, in which case the dispatch resumes past
//! it without producing an object.

use rpl_syntax::{
   Span,
   skip_whitespace,
};

use crate::{
   Result,
   Runtime,
   flow,
   value::{
      command,
      comment,
      complex,
      directory,
      list,
      number,
      program,
      symbol,
      text,
   },
};

/// Outcome of one candidate parser.
pub enum Parsed {
   /// An object was produced and the cursor advanced.
   Done(usize),
   /// Not this tag; the cursor is unchanged.
   Skip,
   /// A commented-out region was consumed; retry from the new cursor.
   Commented,
}

/// Parser state threaded through every candidate.
pub struct Parser<'a> {
   /// The whole parse buffer.
   pub source: &'a str,
   /// Current position.
   pub offset: usize,
   /// Zero at the top level. Positive inside an expression, expecting an
   /// operand of at least that precedence; negative, expecting an infix at
   /// exactly that precedence.
   pub precedence: i16,

   /// Loop variable names bound by enclosing structures, innermost last.
   locals: Vec<String>,
}

impl<'a> Parser<'a> {
   #[must_use]
   pub fn new(source: &'a str) -> Self {
      Self {
         source,
         offset: 0,
         precedence: 0,
         locals: Vec::new(),
      }
   }

   #[must_use]
   pub fn rest(&self) -> &'a str {
      &self.source[self.offset..]
   }

   #[must_use]
   pub fn rest_from(&self, at: usize) -> &'a str {
      self.source.get(at..).unwrap_or("")
   }

   #[must_use]
   pub fn slice(&self, start: usize, end: usize) -> &'a str {
      self.source.get(start..end).unwrap_or("")
   }

   #[must_use]
   pub fn peek(&self) -> Option<char> {
      self.rest().chars().next()
   }

   #[must_use]
   pub fn span(&self, start: usize, end: usize) -> Span {
      Span::new(start, end)
   }

   pub fn skip_whitespace(&mut self) {
      self.offset += skip_whitespace(self.rest());
   }

   #[must_use]
   pub fn done(&self) -> bool {
      self.rest().is_empty()
   }

   /// Raises a value error spanning the given slice.
   pub fn fail_value<T>(&self, rt: &mut Runtime, start: usize, end: usize) -> Result<T> {
      rt.value_error().source(self.span(start, end)).err()
   }

   /// Binds a loop variable for the structure bodies parsed next.
   pub fn push_loop_local(&mut self, name: String) {
      self.locals.push(name);
   }

   pub fn pop_loop_local(&mut self) {
      self.locals.pop();
   }

   /// Resolves a name against enclosing loop variables. Each loop owns two
   /// runtime slots with the counter on top, so the innermost counter is
   /// index 0, the next one out index 2, and so on.
   #[must_use]
   pub fn local_index(&self, rt: &Runtime, name: &str) -> Option<usize> {
      self
         .locals
         .iter()
         .rev()
         .position(|bound| symbol::compare_names(rt, bound, name).is_eq())
         .map(|scope| scope * 2)
   }
}

type Candidate = fn(&mut Runtime, &mut Parser) -> Result<Parsed>;

/// Candidate parsers, tried in order; `symbol` stays last so that unclaimed
/// words become names.
const CANDIDATES: &[Candidate] = &[
   comment::parse,
   text::parse,
   number::parse_based,
   complex::parse,
   number::parse,
   directory::parse,
   list::parse,
   list::parse_array,
   program::parse,
   list::parse_expression,
   flow::parse,
   command::parse,
   symbol::parse,
];

/// Parses one object from the cursor position, honouring the parser's
/// precedence mode. Raises a syntax error when nothing matches.
pub fn object(rt: &mut Runtime, p: &mut Parser) -> Result<usize> {
   loop {
      p.skip_whitespace();

      let start = p.offset;
      if p.done() {
         return rt.syntax_error().source(Span::empty(start)).err();
      }

      let mut commented = false;

      for candidate in CANDIDATES {
         match candidate(rt, p)? {
            Parsed::Done(obj) => {
               tracing::trace!(
                  target: "rpl::parse",
                  consumed = p.offset - start,
                  "parsed object"
               );
               return Ok(obj);
            },

            Parsed::Commented => {
               commented = true;
               break;
            },

            Parsed::Skip => p.offset = start,
         }
      }

      if !commented {
         let len = p.rest().chars().next().map_or(0, char::len_utf8);
         return rt.syntax_error().source(p.span(start, start + len)).err();
      }
   }
}

/// Parses an entire source text as a sequence of objects, wrapped in a
/// block. This is what the command line feeds to the evaluator.
pub fn all(rt: &mut Runtime, source: &str) -> Result<usize> {
   let mut p = Parser::new(source);
   let mut body = Vec::new();

   loop {
      p.skip_whitespace();
      if p.done() {
         break;
      }

      let obj = object(rt, &mut p)?;
      body.extend_from_slice(&crate::object::image(rt, obj));
   }

   let image = crate::object::wrap(crate::Id::Block, &body);
   rt.make(&image)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{
      Id,
      object,
   };

   #[test]
   fn unknown_words_become_symbols() {
      let mut rt = Runtime::new();
      let mut p = Parser::new("frobnicate");

      let obj = object(&mut rt, &mut p).expect("parse");
      assert_eq!(object::id(&rt, obj), Id::Symbol);
   }

   #[test]
   fn keywords_win_over_symbols() {
      let mut rt = Runtime::new();
      let mut p = Parser::new("dup");

      let obj = object(&mut rt, &mut p).expect("parse");
      assert_eq!(object::id(&rt, obj), Id::Dup);
   }

   #[test]
   fn comments_advance_without_producing() {
      let mut rt = Runtime::new();
      let mut p = Parser::new("@@ noise @@ 42");

      let obj = object(&mut rt, &mut p).expect("parse");
      assert_eq!(object::id(&rt, obj), Id::Integer);
   }

   #[test]
   fn garbage_is_a_syntax_error_with_a_span() {
      let mut rt = Runtime::new();
      let mut p = Parser::new("  }");

      assert!(object(&mut rt, &mut p).is_err());
      let error = rt.error().expect("error");
      assert_eq!(error.span.map(|span| span.start), Some(2));
   }
}
