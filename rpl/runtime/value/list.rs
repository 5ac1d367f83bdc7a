//! Lists, arrays, and the shared sequence parser.
//!
//! One routine parses every delimited sequence: `{…}` lists, `[…]` arrays,
//! `«…»` programs and `'…'` expressions. When a precedence is in effect it
//! runs the algebraic machinery: unary signs, infix climbing, postfix
//! operators and parenthesised function arguments, accumulating the result
//! in postfix order so expressions evaluate exactly like programs.

use rpl_syntax::Span;

use crate::{
   Id,
   Result,
   Runtime,
   id::precedence::{
      FUNCTIONAL,
      LOWEST,
      SYMBOL,
   },
   leb128,
   object,
   parse::{
      self,
      Parsed,
      Parser,
   },
   render::{
      self,
      Renderer,
   },
};

/// One parsed item on its way into the sequence payload. Raw items are
/// appended as they are; expression items get their wrapper stripped so
/// nested expressions stay flat.
struct Pending {
   image: Vec<u8>,
   ty:    Id,
   raw:   bool,
}

impl Pending {
   fn object(rt: &Runtime, obj: usize) -> Self {
      Self {
         image: object::image(rt, obj),
         ty:    object::id(rt, obj),
         raw:   false,
      }
   }

   fn command(ty: Id) -> Self {
      let mut image = Vec::new();
      object::push_command(&mut image, ty);

      Self {
         image,
         ty,
         raw: false,
      }
   }

   fn raw(image: Vec<u8>) -> Self {
      Self {
         image,
         ty: Id::Expression,
         raw: true,
      }
   }
}

/// Builds a sequence object from already-allocated elements.
pub fn make(rt: &mut Runtime, ty: Id, items: &[usize]) -> Result<usize> {
   let mut body = Vec::new();

   for &item in items {
      body.extend_from_slice(&object::image(rt, item));
   }

   rt.make(&object::wrap(ty, &body))
}

/// Iterates the objects inside a sequence payload.
pub fn items(rt: &Runtime, obj: usize) -> Vec<usize> {
   let (mut at, end) = object::body(rt, obj);
   let mut found = Vec::new();

   while at < end {
      found.push(at);
      at = object::skip(rt, at);
   }

   found
}

/// Number of objects inside a sequence payload.
#[must_use]
pub fn len(rt: &Runtime, obj: usize) -> usize {
   items(rt, obj).len()
}

pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   let saved = p.precedence;
   p.precedence = 0;
   let result = parse_seq(rt, p, Id::List, Some('{'), Some('}'));
   p.precedence = saved;
   result
}

pub fn parse_array(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   let saved = p.precedence;
   p.precedence = 0;
   let result = parse_seq(rt, p, Id::Array, Some('['), Some(']'));
   p.precedence = saved;
   result
}

pub fn parse_expression(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   if p.peek() != Some('\'') {
      return Ok(Parsed::Skip);
   }

   let saved = p.precedence;
   p.precedence = i16::from(LOWEST);
   let result = parse_seq(rt, p, Id::Expression, Some('\''), Some('\''));
   p.precedence = saved;
   result
}

/// The generic sequence parser. Parsing sub-objects may collect garbage at
/// any point, so every parsed element is copied into a host-side scratch
/// buffer at once and only the assembled payload is allocated.
pub fn parse_seq(
   rt: &mut Runtime,
   p: &mut Parser,
   ty: Id,
   open: Option<char>,
   close: Option<char>,
) -> Result<Parsed> {
   let start = p.offset;

   let mut scratch = Vec::<u8>::new();
   let mut precedence = p.precedence;
   let lowest = precedence;

   let mut negate = false;
   let mut infix: Option<Id> = None;
   let mut prefix: Option<Id> = None;
   let mut postfix: Option<Id> = None;
   let mut arity = 0_usize;
   let mut arg = 0_usize;
   let mut objcount = 0_usize;
   let mut non_alg: Option<Span> = None;
   let mut closed = false;

   if let Some(open) = open {
      if p.peek() != Some(open) {
         return Ok(Parsed::Skip);
      }
      p.offset += open.len_utf8();
   }

   loop {
      p.skip_whitespace();

      let Some(c) = p.peek() else { break };

      if Some(c) == close || (close == Some(';') && c == ',') {
         p.offset += c.len_utf8();
         closed = true;
         break;
      }
      if precedence != 0 && matches!(c, '\'' | ')' | ';' | ',') {
         break;
      }

      let obj_start = p.offset;
      let mut obj: Option<Pending> = None;
      let mut postfix_cmd: Option<Id> = None;

      if precedence != 0 {
         if precedence > 0 {
            // Unary signs fold into a trailing negation.
            if c == '-' || c == '+' {
               if c == '-' {
                  negate = !negate;
               }
               p.offset += 1;
               continue;
            }

            // Parenthesised subexpressions, and the arguments of functions
            // with more than one operand.
            let parenthese = (c == '(' || arity > 1) && infix.is_none();
            if parenthese || infix.is_some() || prefix.is_some() {
               let childp = match infix {
                  Some(infix) => i16::from(infix.precedence()) + 1,
                  None if parenthese => i16::from(LOWEST),
                  None => i16::from(SYMBOL),
               };

               let (mut iopen, mut iclose) = if parenthese {
                  (Some('('), Some(')'))
               } else {
                  (None, None)
               };
               if infix.is_none() && arity > 1 {
                  if arg > 0 {
                     iopen = None;
                  }
                  arg += 1;
                  if arg < arity {
                     iclose = Some(';');
                  }
               }

               let saved = p.precedence;
               p.precedence = childp;
               let child = parse_seq(rt, p, Id::Expression, iopen, iclose);
               p.precedence = saved;

               let Parsed::Done(child) = child? else {
                  return rt
                     .syntax_error()
                     .source(p.span(obj_start, p.offset))
                     .err();
               };

               // Splice in the child's payload so expressions stay flat.
               let (body_start, body_end) = object::body(rt, child);
               obj = Some(Pending::raw(rt.bytes()[body_start..body_end].to_vec()));

               // Stay in postfix mode.
               precedence = -precedence;
            }
         }

         if precedence < 0 {
            postfix_cmd = match p.peek() {
               Some('²') => Some(Id::Sq),
               Some('³') => Some(Id::Cubed),
               Some('!') => Some(Id::Fact),
               Some('⁻') if p.rest_from(p.offset + '⁻'.len_utf8()).starts_with('¹') => {
                  Some(Id::Inv)
               },
               _ => None,
            };

            if let Some(cmd) = postfix_cmd {
               let len = match cmd {
                  Id::Inv => '⁻'.len_utf8() + '¹'.len_utf8(),
                  Id::Fact => 1,
                  _ => '²'.len_utf8(),
               };

               if obj.is_some() {
                  postfix = Some(cmd);
               } else {
                  obj = Some(Pending::command(cmd));
               }

               p.offset += len;
               precedence = -precedence;
            }
         }
      }

      if obj.is_none() {
         let saved = p.precedence;
         p.precedence = precedence;
         let parsed = parse::object(rt, p);
         p.precedence = saved;

         obj = Some(Pending::object(rt, parsed?));
      }

      let obj_span = p.span(obj_start, p.offset);

      if precedence != 0 && postfix_cmd.is_none() {
         let pending = obj.as_ref().expect("an object was parsed or spliced");

         if precedence > 0 {
            // Just parsed an operand or a function name.
            let ty = pending.ty;

            // An infix operator cannot open an operand.
            if !pending.raw
               && ty.is_algebraic_fn()
               && (1..FUNCTIONAL).contains(&ty.precedence())
            {
               return rt.prefix_expected_error().source(obj_span).err();
            }

            if !pending.raw && !ty.is_algebraic() {
               if objcount > 0 {
                  return rt.prefix_expected_error().source(obj_span).err();
               }
               non_alg = Some(obj_span);
            }

            if ty.is_algebraic_fn() {
               prefix = Some(ty);
               arity = ty.arity();
               arg = 0;
               obj = None;
               precedence = -i16::from(SYMBOL);
            }
         } else {
            // Expected an infix operator.
            let objprec = i16::from(pending.ty.precedence());

            if objprec != 0 && !pending.raw {
               if objprec < lowest {
                  // Lower precedence binds outside this level: rewind and
                  // let the enclosing level consume it.
                  p.offset = obj_start;
                  break;
               }

               if objprec < i16::from(FUNCTIONAL) {
                  infix = Some(pending.ty);
                  precedence = -objprec;
                  obj = None;
               }
            } else {
               precedence = -precedence;
            }
         }
      }

      if let Some(pending) = obj.take() {
         let mut current = Some(pending);

         while let Some(item) = current.take() {
            // Nested expression objects contribute their payload only.
            if precedence != 0 && !item.raw && item.ty == Id::Expression {
               let header = leb128::skip(&item.image, 0);
               let body = leb128::skip(&item.image, header);
               scratch.extend_from_slice(&item.image[body..]);
            } else {
               scratch.extend_from_slice(&item.image);
            }
            objcount += 1;

            if let Some(function) = prefix {
               if arity > 1 && arg < arity {
                  precedence = -precedence;
                  break;
               }
               prefix = None;
               current = Some(Pending::command(function));
            } else if negate {
               negate = false;
               current = Some(Pending::command(Id::Neg));
            } else if let Some(cmd) = postfix.take() {
               current = Some(Pending::command(cmd));
            } else if let Some(cmd) = infix.take() {
               current = Some(Pending::command(cmd));
            }
         }
      }

      // Alternate between operand and infix mode.
      precedence = -precedence;
   }

   // A dangling operator means its operand never came.
   if let Some(cmd) = infix.or(prefix) {
      return rt
         .argument_expected_error()
         .command(cmd)
         .source(Span::empty(p.offset))
         .err();
   }

   if let Some(span) = non_alg
      && objcount != 1
   {
      return rt.syntax_error().source(span).err();
   }

   if close.is_some() && !closed {
      return rt
         .unterminated_error()
         .source(Span::new(start, p.offset))
         .err();
   }

   if scratch.is_empty() && ty == Id::Expression {
      return rt.syntax_error().source(Span::new(start, p.offset)).err();
   }

   Ok(Parsed::Done(rt.make(&object::wrap(ty, &scratch))?))
}

/// Renders a sequence between its delimiters, indenting the body when it
/// holds nested structure.
pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer, open: &str, close: &str) {
   let ty = object::id(rt, obj);
   let elements = items(rt, obj);

   let mut structured = ty == Id::Program;
   for &element in &elements {
      let ety = object::id(rt, element);

      if matches!(ety, Id::List | Id::Array | Id::Program | Id::Comment) || ety.is_structure() {
         structured = true;
         break;
      }
   }

   if !open.is_empty() {
      r.put(open);
      r.indent();
      r.space();
   }
   if structured {
      r.cr();
   }

   for &element in &elements {
      r.space();

      if (ty == Id::Program || ty == Id::Block)
         && r.editing()
         && rt.settings.vertical_programs
      {
         r.cr();
      }

      render::render(rt, element, r);
      r.space();
   }

   if !close.is_empty() {
      r.unindent();
      if structured {
         r.cr();
      }
      r.space();
      r.put(close);
      r.space();
   }
}

/// Pushes every element of a sequence onto the data stack; on failure the
/// stack is restored to its previous depth.
pub fn expand(rt: &mut Runtime, obj: usize) -> Result {
   let depth = rt.depth();

   for element in items(rt, obj) {
      if rt.push(element).is_err() {
         let extra = rt.depth() - depth;
         let _ = rt.drop_n(extra);
         return Err(crate::Failed);
      }
   }

   Ok(())
}

#[cfg(test)]
mod tests {
   use super::*;

   fn parse_text(rt: &mut Runtime, source: &str) -> usize {
      let mut p = Parser::new(source);
      parse::object(rt, &mut p).expect("parse")
   }

   #[test]
   fn nested_lists_roundtrip() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "{ 1 { 2 3 } \"x\" }");
      assert_eq!(object::id(&rt, obj), Id::List);
      assert_eq!(len(&rt, obj), 3);

      let text = render::to_text(&rt, obj);
      let again = parse_text(&mut rt, &text);
      assert!(object::same(&rt, obj, again));
   }

   #[test]
   fn expressions_store_postfix() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "'a+2·b'");
      assert_eq!(object::id(&rt, obj), Id::Expression);

      let kinds: Vec<Id> = items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(
         kinds,
         [Id::Symbol, Id::Integer, Id::Symbol, Id::Mul, Id::Add]
      );
   }

   #[test]
   fn precedence_orders_the_payload() {
      let mut rt = Runtime::new();

      // Multiplication binds tighter: a+(b·c).
      let obj = parse_text(&mut rt, "'a+b·c'");
      let kinds: Vec<Id> = items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(
         kinds,
         [Id::Symbol, Id::Symbol, Id::Symbol, Id::Mul, Id::Add]
      );

      // Parentheses override: (a+b)·c.
      let obj = parse_text(&mut rt, "'(a+b)·c'");
      let kinds: Vec<Id> = items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(
         kinds,
         [Id::Symbol, Id::Symbol, Id::Add, Id::Symbol, Id::Mul]
      );
   }

   #[test]
   fn postfix_and_sign_fold_in() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "'-a²'");
      let kinds: Vec<Id> = items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(kinds, [Id::Symbol, Id::Neg, Id::Sq]);

      let obj = parse_text(&mut rt, "'b!'");
      let kinds: Vec<Id> = items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(kinds, [Id::Symbol, Id::Fact]);
   }

   #[test]
   fn functions_take_semicolon_arguments() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "'min(a;b)+1'");
      let kinds: Vec<Id> = items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(
         kinds,
         [Id::Symbol, Id::Symbol, Id::Min, Id::Integer, Id::Add]
      );
   }

   #[test]
   fn unterminated_list_spans_from_the_delimiter() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("{ 1 2");
      assert!(matches!(parse(&mut rt, &mut p), Err(_)));

      let error = rt.error().expect("error");
      assert_eq!(error.kind, crate::ErrorKind::Unterminated);
      let span = error.span.expect("span");
      assert_eq!(span.start, 0);
      assert_eq!(span.end(), 5);
   }

   #[test]
   fn bare_infix_wants_a_prefix() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("'·b'");
      assert!(parse_expression(&mut rt, &mut p).is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::PrefixExpected)
      );

      rt.clear_error();
      let mut p = Parser::new("'a+·b'");
      assert!(parse_expression(&mut rt, &mut p).is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::PrefixExpected)
      );
   }

   #[test]
   fn dangling_infix_wants_an_argument() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("'a+'");
      assert!(parse_expression(&mut rt, &mut p).is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::ArgumentExpected)
      );
   }
}
