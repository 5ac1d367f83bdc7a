//! Control structures: conditionals, error handlers, case statements and
//! the four loop families.
//!
//! Each structure encodes its blocks back to back with anonymous marker
//! objects in between. The markers have no source form; at run time they
//! pop a condition or step a counter and steer evaluation by rewriting the
//! pending range on the return stack. Loop markers carry a back-offset to
//! their replay point so one return-stack entry is all a loop needs.

use rpl_syntax::{
   Span,
   is_word_boundary,
};

use crate::{
   Failed,
   Id,
   Result,
   Runtime,
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
   value::{
      number,
      symbol,
   },
};

// Encoding.

fn push_block(image: &mut Vec<u8>, body: &[u8]) {
   image.extend_from_slice(&object::wrap(Id::Block, body));
}

fn push_marker(image: &mut Vec<u8>, ty: Id) {
   object::push_command(image, ty);
}

/// Appends a loop marker whose back-offset points at `replay`, a position
/// inside the payload being assembled.
fn push_loop_marker(image: &mut Vec<u8>, ty: Id, replay: usize) {
   let back = image.len() - replay;
   object::push_command(image, ty);
   leb128::push(image, back as u64);
}

fn finish(rt: &mut Runtime, ty: Id, payload: &[u8]) -> Result<Parsed> {
   Ok(Parsed::Done(rt.make(&object::wrap(ty, payload))?))
}

// Parsing.

/// Tries to consume one keyword, case-insensitively, at a word boundary.
fn keyword(p: &mut Parser, word: &str) -> bool {
   let matched = p
      .rest()
      .get(..word.len())
      .is_some_and(|head| head.eq_ignore_ascii_case(word));

   if matched && is_word_boundary(p.source, p.offset + word.len()) {
      p.offset += word.len();
      true
   } else {
      false
   }
}

/// Parses objects until one of the stop keywords, returning the block body
/// bytes and which keyword ended it.
fn scan_body(
   rt: &mut Runtime,
   p: &mut Parser,
   start: usize,
   stops: &[&str],
) -> Result<(Vec<u8>, usize)> {
   let mut body = Vec::new();

   loop {
      p.skip_whitespace();

      if p.done() {
         return rt
            .unterminated_error()
            .source(Span::new(start, p.offset))
            .err();
      }

      if let Some(index) = stops.iter().position(|stop| keyword(p, stop)) {
         return Ok((body, index));
      }

      let obj = parse::object(rt, p)?;
      body.extend_from_slice(&object::image(rt, obj));
   }
}

pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   let start = p.offset;

   if keyword(p, "iferr") {
      return parse_if_family(rt, p, start, Id::IfErrThen, Id::IfErrThenElse);
   }
   if keyword(p, "if") {
      return parse_if_family(rt, p, start, Id::IfThen, Id::IfThenElse);
   }
   if keyword(p, "case") {
      return parse_case(rt, p, start);
   }
   if keyword(p, "do") {
      return parse_do(rt, p, start);
   }
   if keyword(p, "while") {
      return parse_while(rt, p, start);
   }
   if keyword(p, "start") {
      // Unnamed loops still own a locals scope at run time.
      p.push_loop_local(String::new());
      return parse_counted(rt, p, start, None);
   }
   if keyword(p, "for") {
      return parse_for(rt, p, start);
   }

   Ok(Parsed::Skip)
}

fn parse_if_family(
   rt: &mut Runtime,
   p: &mut Parser,
   start: usize,
   plain: Id,
   with_else: Id,
) -> Result<Parsed> {
   let (condition, _) = scan_body(rt, p, start, &["then"])?;
   let (then_body, stop) = scan_body(rt, p, start, &["else", "end"])?;

   let (then_marker, else_marker) = if plain == Id::IfErrThen {
      (Id::ErrThenMarker, Id::ErrElseMarker)
   } else {
      (Id::ThenMarker, Id::ElseMarker)
   };

   let mut payload = Vec::new();
   push_block(&mut payload, &condition);
   push_marker(&mut payload, then_marker);
   push_block(&mut payload, &then_body);

   if stop == 0 {
      let (else_body, _) = scan_body(rt, p, start, &["end"])?;
      push_marker(&mut payload, else_marker);
      push_block(&mut payload, &else_body);
      finish(rt, with_else, &payload)
   } else {
      finish(rt, plain, &payload)
   }
}

fn parse_do(rt: &mut Runtime, p: &mut Parser, start: usize) -> Result<Parsed> {
   let (body, _) = scan_body(rt, p, start, &["until"])?;
   let (condition, _) = scan_body(rt, p, start, &["end"])?;

   let mut payload = Vec::new();
   push_block(&mut payload, &body);
   push_block(&mut payload, &condition);
   push_loop_marker(&mut payload, Id::UntilMarker, 0);

   finish(rt, Id::DoUntil, &payload)
}

fn parse_while(rt: &mut Runtime, p: &mut Parser, start: usize) -> Result<Parsed> {
   let (condition, _) = scan_body(rt, p, start, &["repeat"])?;
   let (body, _) = scan_body(rt, p, start, &["end"])?;

   let mut payload = Vec::new();
   push_block(&mut payload, &condition);
   push_loop_marker(&mut payload, Id::WhileMarker, 0);
   push_block(&mut payload, &body);

   finish(rt, Id::WhileRepeat, &payload)
}

fn parse_counted(
   rt: &mut Runtime,
   p: &mut Parser,
   start: usize,
   name: Option<Vec<u8>>,
) -> Result<Parsed> {
   // The caller bound the loop's scope name; drop it once the body ends.
   let named = name.is_some();
   let (body, stop) = scan_body(rt, p, start, &["next", "step"])?;
   p.pop_loop_local();

   let mut payload = Vec::new();
   if let Some(name) = name {
      payload.extend_from_slice(&name);
   }

   let body_start = payload.len();
   push_block(&mut payload, &body);

   let marker = if stop == 0 {
      Id::NextMarker
   } else {
      Id::StepMarker
   };
   push_loop_marker(&mut payload, marker, body_start);

   let ty = match (named, stop) {
      (false, 0) => Id::StartNext,
      (false, _) => Id::StartStep,
      (true, 0) => Id::ForNext,
      (true, _) => Id::ForStep,
   };

   finish(rt, ty, &payload)
}

fn parse_for(rt: &mut Runtime, p: &mut Parser, start: usize) -> Result<Parsed> {
   p.skip_whitespace();

   let name_start = p.offset;
   let name = parse::object(rt, p)?;

   if object::id(rt, name) != Id::Symbol {
      return rt
         .missing_variable_error()
         .source(Span::new(name_start, p.offset))
         .err();
   }

   p.push_loop_local(symbol::value(rt, name).to_owned());
   parse_counted(rt, p, start, Some(object::image(rt, name)))
}

fn parse_case(rt: &mut Runtime, p: &mut Parser, start: usize) -> Result<Parsed> {
   let mut branches = Vec::new();

   loop {
      let (body, stop) = scan_body(rt, p, start, &["then", "when", "end"])?;

      // Statements before the final `end` are the default branch.
      if stop == 2 {
         let mut payload = branches;
         push_block(&mut payload, &body);
         push_marker(&mut payload, Id::CaseEndMarker);

         return finish(rt, Id::CaseStatement, &payload);
      }

      let (branch_ty, marker) = if stop == 0 {
         (Id::CaseThen, Id::CaseThenMarker)
      } else {
         (Id::CaseWhen, Id::CaseWhenMarker)
      };

      let (branch_body, _) = scan_body(rt, p, start, &["end"])?;

      let mut branch = Vec::new();
      push_block(&mut branch, &body);
      push_marker(&mut branch, marker);
      push_block(&mut branch, &branch_body);

      branches.extend_from_slice(&object::wrap(branch_ty, &branch));
   }
}

// Evaluation.

/// Defers a structure's payload. Error handlers additionally arm their
/// marker as a separate entry so unwinding can find it.
pub fn evaluate(rt: &mut Runtime, ty: Id, obj: usize) -> Result {
   match ty {
      Id::IfErrThen | Id::IfErrThenElse => {
         let guard = rt.protect(obj);

         let (start, end) = object::body(rt, guard.get());
         let marker = object::skip(rt, start);
         rt.run_push(marker, end)?;

         // The first push may have collected and moved the structure.
         let (start, _) = object::body(rt, guard.get());
         let marker = object::skip(rt, start);
         rt.run_push(start, marker)
      },

      Id::StartNext | Id::StartStep | Id::ForNext | Id::ForStep => enter_counted(rt, ty, obj),

      _ => {
         let (start, end) = object::body(rt, obj);
         rt.run_push(start, end)
      },
   }
}

/// Pops the loop bounds and opens the loop's locals scope: the limit below,
/// the counter on top.
fn enter_counted(rt: &mut Runtime, ty: Id, obj: usize) -> Result {
   let guard = rt.protect(obj);

   rt.args(2)?;
   let finish = rt.pop()?;
   let finish = rt.protect(finish);
   let first = rt.pop()?;
   let first = rt.protect(first);

   if !object::id(rt, finish.get()).is_real() || !object::id(rt, first.get()).is_real() {
      return rt.type_error().err();
   }

   rt.push_locals(&[finish.get(), first.get()])?;

   let (start, end) = object::body(rt, guard.get());
   let body = if ty == Id::ForNext || ty == Id::ForStep {
      object::skip(rt, start)
   } else {
      start
   };

   rt.run_push(body, end)
}

/// Pops a condition as a truth value. A program left on the stack by the
/// condition is run first: the marker re-arms itself, defers the program,
/// and examines whatever it leaves behind on the next visit.
fn pop_truth(rt: &mut Runtime, marker: usize) -> Result<Option<bool>> {
   let condition = rt.pop()?;
   let ty = object::id(rt, condition);

   if ty.is_program() || ty == Id::Expression {
      let (_, end) = rt.run_peek().ok_or(Failed)?;
      rt.run_set_top(marker, end);
      crate::value::program::defer(rt, condition)?;
      return Ok(None);
   }

   object::as_truth(rt, condition).map(Some)
}

/// Skips the next object in the pending range; when the object after it is
/// one of the given markers, skips that marker too.
fn skip_pending(rt: &mut Runtime, and_markers: &[Id]) {
   let Some((pc, end)) = rt.run_peek() else {
      return;
   };
   if pc >= end {
      return;
   }

   let mut next = object::skip(rt, pc);
   if next < end && and_markers.contains(&object::id(rt, next)) {
      next = object::skip(rt, next);
   }

   rt.run_set_top(next, end);
}

/// Ends the enclosing range below the current one; this is how a taken case
/// branch leaves the whole statement.
fn exit_enclosing(rt: &mut Runtime) {
   let Some(top) = rt.run_pop() else {
      return;
   };

   if let Some((_, end)) = rt.run_peek() {
      rt.run_set_top(end, end);
   }

   let _ = rt.run_push(top.0, top.1);
}

/// The replay target of a loop marker.
fn replay_target(rt: &Runtime, marker: usize) -> usize {
   let at = object::payload(rt, marker);
   let (back, _) = leb128::read(rt.bytes(), at);

   marker - back as usize
}

/// Steps a loop counter by the given amount, keeping integers exact and
/// falling back to floats when either side is a decimal.
fn step_counter(rt: &mut Runtime, counter: usize, step: usize) -> Result<usize> {
   let decimal =
      object::id(rt, counter) == Id::Decimal || object::id(rt, step) == Id::Decimal;

   if decimal {
      let sum = number::to_f64(rt, counter) + number::to_f64(rt, step);
      number::make_decimal(rt, sum)
   } else {
      let sum = object::as_i64(rt, counter)?
         .checked_add(object::as_i64(rt, step)?)
         .ok_or(Failed)?;
      number::make_signed(rt, sum)
   }
}

/// Whether the loop continues for the new counter value, honouring the
/// step direction.
fn continues(rt: &Runtime, counter: usize, limit: usize, downward: bool) -> bool {
   let order = number::compare(rt, counter, limit);

   if downward {
      order != std::cmp::Ordering::Less
   } else {
      order != std::cmp::Ordering::Greater
   }
}

/// Runs one marker. `at` is the marker's own position, which the loop
/// markers turn into their replay target.
pub fn evaluate_marker(rt: &mut Runtime, ty: Id, at: usize) -> Result {
   match ty {
      Id::ThenMarker => {
         if let Some(false) = pop_truth(rt, at)? {
            skip_pending(rt, &[Id::ElseMarker]);
         }
         Ok(())
      },

      // Reached only after a taken branch ran.
      Id::ElseMarker | Id::ErrElseMarker => {
         skip_pending(rt, &[]);
         Ok(())
      },

      Id::ErrThenMarker => {
         if rt.take_handling() {
            return Ok(());
         }

         // A program left by the protected branch runs with the handler
         // still armed.
         if rt.depth() > 0 {
            let top = rt.top()?;

            if object::id(rt, top).is_program() || object::id(rt, top) == Id::Expression {
               let target = rt.pop()?;
               let (_, end) = rt.run_peek().ok_or(Failed)?;
               rt.run_set_top(at, end);
               return crate::value::program::defer(rt, target);
            }
         }

         skip_pending(rt, &[Id::ErrElseMarker]);
         Ok(())
      },

      Id::CaseThenMarker => {
         match pop_truth(rt, at)? {
            Some(true) => exit_enclosing(rt),
            Some(false) => skip_pending(rt, &[]),
            None => {},
         }
         Ok(())
      },

      Id::CaseWhenMarker => {
         let candidate = rt.pop()?;
         let subject = rt.top()?;

         if object::same(rt, subject, candidate) {
            rt.drop_n(1)?;
            exit_enclosing(rt);
         } else {
            skip_pending(rt, &[]);
         }
         Ok(())
      },

      Id::CaseEndMarker => Ok(()),

      Id::UntilMarker => {
         if let Some(false) = pop_truth(rt, at)? {
            let (_, end) = rt.run_peek().ok_or(Failed)?;
            rt.run_set_top(replay_target(rt, at), end);
         }
         Ok(())
      },

      Id::WhileMarker => {
         let marker = rt.protect(at);

         match pop_truth(rt, at)? {
            Some(true) => {
               // One net entry is added; make room up front so the ranges
               // read below stay put.
               rt.reserve(32)?;

               let (body, end) = rt.run_pop().ok_or(Failed)?;
               rt.run_push(replay_target(rt, marker.get()), end)?;
               rt.run_push(body, end)?;
            },

            Some(false) => {
               let (_, end) = rt.run_peek().ok_or(Failed)?;
               rt.run_set_top(end, end);
            },

            None => {},
         }
         Ok(())
      },

      Id::NextMarker | Id::StepMarker => {
         let marker = rt.protect(at);

         let step = if ty == Id::StepMarker {
            rt.pop()?
         } else {
            number::make_integer(rt, 1)?
         };
         let step = rt.protect(step);

         if !object::id(rt, step.get()).is_real() {
            return rt.type_error().err();
         }

         let counter = rt.local(0)?;
         let next = step_counter(rt, counter, step.get())?;
         rt.local_set(0, next)?;

         let limit = rt.local(1)?;
         let downward = number::is_negative(rt, step.get());

         if continues(rt, next, limit, downward) {
            let (_, end) = rt.run_peek().ok_or(Failed)?;
            rt.run_set_top(replay_target(rt, marker.get()), end);
         } else {
            rt.pop_locals(2);
         }
         Ok(())
      },

      _ => rt.internal_error().err(),
   }
}

// Rendering.

fn render_block(rt: &Runtime, block: usize, r: &mut Renderer) {
   r.indent();
   r.cr();
   render::render(rt, block, r);
   r.unindent();
   r.cr();
}

fn render_keyword(r: &mut Renderer, word: &str) {
   r.put(word);
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   let ty = object::id(rt, obj);
   let (start, end) = object::body(rt, obj);

   r.cr();

   match ty {
      Id::IfThen | Id::IfThenElse | Id::IfErrThen | Id::IfErrThenElse => {
         let condition = start;
         let then_marker = object::skip(rt, condition);
         let then_body = object::skip(rt, then_marker);

         render_keyword(r, if ty == Id::IfThen || ty == Id::IfThenElse {
            "if"
         } else {
            "iferr"
         });
         render_block(rt, condition, r);
         render_keyword(r, "then");
         render_block(rt, then_body, r);

         let else_marker = object::skip(rt, then_body);
         if else_marker < end {
            let else_body = object::skip(rt, else_marker);
            render_keyword(r, "else");
            render_block(rt, else_body, r);
         }

         render_keyword(r, "end");
      },

      Id::CaseStatement => {
         render_keyword(r, "case");
         r.indent();

         let mut at = start;
         while at < end {
            let ety = object::id(rt, at);

            match ety {
               Id::CaseThen | Id::CaseWhen => {
                  let (bstart, _) = object::body(rt, at);
                  let marker = object::skip(rt, bstart);
                  let body = object::skip(rt, marker);

                  r.cr();
                  render::render(rt, bstart, r);
                  r.space();
                  render_keyword(r, if ety == Id::CaseThen { "then" } else { "when" });
                  render_block(rt, body, r);
                  render_keyword(r, "end");
               },

               Id::Block => {
                  render_block(rt, at, r);
               },

               _ => {},
            }

            at = object::skip(rt, at);
         }

         r.unindent();
         r.cr();
         render_keyword(r, "end");
      },

      Id::DoUntil => {
         let body = start;
         let condition = object::skip(rt, body);

         render_keyword(r, "do");
         render_block(rt, body, r);
         render_keyword(r, "until");
         render_block(rt, condition, r);
         render_keyword(r, "end");
      },

      Id::WhileRepeat => {
         let condition = start;
         let marker = object::skip(rt, condition);
         let body = object::skip(rt, marker);

         render_keyword(r, "while");
         render_block(rt, condition, r);
         render_keyword(r, "repeat");
         render_block(rt, body, r);
         render_keyword(r, "end");
      },

      Id::StartNext | Id::StartStep | Id::ForNext | Id::ForStep => {
         let named = ty == Id::ForNext || ty == Id::ForStep;

         let (name, body) = if named {
            (Some(start), object::skip(rt, start))
         } else {
            (None, start)
         };

         render_keyword(r, if named { "for" } else { "start" });

         if let Some(name) = name {
            r.space();
            render::render(rt, name, r);
            r.push_local(symbol::value(rt, name).to_owned());
         } else {
            r.push_local(String::new());
         }

         render_block(rt, body, r);
         r.pop_local();

         render_keyword(
            r,
            if ty == Id::StartNext || ty == Id::ForNext {
               "next"
            } else {
               "step"
            },
         );
      },

      _ => {},
   }

   r.cr();
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::value::list;

   fn parse_text(rt: &mut Runtime, source: &str) -> usize {
      let mut p = Parser::new(source);
      parse::object(rt, &mut p).expect("parse")
   }

   #[test]
   fn if_then_else_encodes_markers() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "if 1 then 2 else 3 end");
      assert_eq!(object::id(&rt, obj), Id::IfThenElse);

      let kinds: Vec<Id> = list::items(&rt, obj)
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(
         kinds,
         [
            Id::Block,
            Id::ThenMarker,
            Id::Block,
            Id::ElseMarker,
            Id::Block
         ]
      );
   }

   #[test]
   fn keywords_ignore_case_and_need_boundaries() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "IF 1 THEN 2 END");
      assert_eq!(object::id(&rt, obj), Id::IfThen);

      // "iffy" is a name, not a conditional.
      let obj = parse_text(&mut rt, "iffy");
      assert_eq!(object::id(&rt, obj), Id::Symbol);
   }

   #[test]
   fn for_requires_a_variable_name() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("for 3 next");
      assert!(parse(&mut rt, &mut p).is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::MissingVariable)
      );
   }

   #[test]
   fn for_binds_its_body_names() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "for i i next");
      assert_eq!(object::id(&rt, obj), Id::ForNext);

      let items = list::items(&rt, obj);
      assert_eq!(object::id(&rt, items[0]), Id::Symbol);

      let body: Vec<Id> = list::items(&rt, items[1])
         .into_iter()
         .map(|item| object::id(&rt, item))
         .collect();
      assert_eq!(body, [Id::Local]);
   }

   #[test]
   fn unterminated_structures_report_their_span() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("do 1 2");
      assert!(parse(&mut rt, &mut p).is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::Unterminated)
      );
   }

   #[test]
   fn structures_render_back_to_their_keywords() {
      let mut rt = Runtime::new();

      let obj = parse_text(&mut rt, "while 1 repeat 2 end");
      let text = render::to_text(&rt, obj);

      let again = parse_text(&mut rt, &text);
      assert!(object::same(&rt, obj, again));
   }
}
