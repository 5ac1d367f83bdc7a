//! The evaluator: an iterative call/return scheduler over the in-arena
//! return stack.
//!
//! Evaluating an object never recurses through the host call stack. Running
//! a program pushes its body range; the main loop pops one object at a
//! time, re-pushes the remainder, and dispatches on the tag. Literals push
//! themselves, commands execute, structures and their markers steer the
//! pending ranges, and names recall through the directory chain. Depth is
//! bounded by arena space, not by host stack frames.

use crate::{
   Failed,
   Id,
   Result,
   Runtime,
   arithmetic,
   flow,
   object,
   parse,
   value::{
      command,
      comment,
      directory,
      expression,
      program,
      symbol,
   },
};

/// Debugger pacing for the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stepping {
   #[default]
   None,
   /// Halt again after this many objects.
   Steps(usize),
   /// Run until the return stack is back at this depth.
   Over(usize),
   /// Run until the return stack is shallower than this depth.
   Out(usize),
}

/// Evaluates one object in place.
fn evaluate_one(rt: &mut Runtime, obj: usize) -> Result {
   let ty = object::id(rt, obj);
   tracing::trace!(target: "rpl::eval", ?ty, at = obj, "step");

   match ty {
      // Self-representing objects.
      ty if ty.is_real() || ty.is_complex() => rt.push(obj),
      Id::Text | Id::List | Id::Array | Id::Program | Id::Expression => rt.push(obj),

      Id::Comment => comment::evaluate(rt, obj),

      // A block runs its body.
      Id::Block => {
         let (start, end) = object::body(rt, obj);
         rt.run_push(start, end)
      },

      Id::Symbol => {
         match directory::recall_all(rt, obj, false)? {
            Some(value) => defer_binding(rt, value),

            // Undefined names stand for themselves in symbolic mode.
            None if rt.settings.symbolic_results => {
               let quoted = expression::make_from(rt, obj)?;
               rt.push(quoted)
            },

            None => rt.undefined_name_error().err(),
         }
      },

      Id::Local => {
         let value = rt.local(symbol::local_index(rt, obj))?;
         rt.push(value)
      },

      Id::Directory => directory::evaluate(rt, obj),

      ty if ty.is_structure() => flow::evaluate(rt, ty, obj),
      ty if ty.is_marker() => flow::evaluate_marker(rt, ty, obj),

      ty if ty.is_algebraic_fn() => {
         rt.args(ty.arity())?;
         arithmetic::evaluate(rt, ty)
      },

      ty if ty.is_command() || ty.is_reserved_name() => {
         rt.args(ty.arity())?;
         command::evaluate(rt, ty, obj)
      },

      _ => rt.internal_error().err(),
   }
}

/// Defers a recalled value the way name resolution does: programs and
/// expressions run, anything else evaluates once (and so pushes itself,
/// enters itself, and so on).
pub fn defer_binding(rt: &mut Runtime, value: usize) -> Result {
   program::defer(rt, value)
}

/// Runs an object to completion: programs and expressions execute their
/// body, everything else evaluates once.
///
/// A fresh run may arrive while a debugged program sits halted underneath;
/// it executes on top of the pending work without resuming it, and the
/// halted state is restored afterwards unless a debugging command asked
/// otherwise.
pub fn run(rt: &mut Runtime, obj: usize) -> Result {
   let base = rt.run_depth();
   let was_halted = rt.halted;
   rt.halted = false;
   rt.halt_request = None;

   let result = program::defer(rt, obj).and_then(|()| run_loop(rt, base));

   rt.halted = rt.halt_request.take().unwrap_or(was_halted || rt.halted);
   result
}

/// Parses and runs a source text.
pub fn run_source(rt: &mut Runtime, source: &str) -> Result {
   let block = parse::all(rt, source)?;
   run(rt, block)
}

/// Resumes a halted evaluation.
pub fn resume(rt: &mut Runtime) -> Result {
   run_loop(rt, 0)
}

/// Whether a halted evaluation has pending work.
#[must_use]
pub fn pending(rt: &Runtime) -> bool {
   rt.run_depth() > 0
}

/// The main loop. Returns when the return stack is back at `base`, when the
/// evaluation halts for the debugger, or when an uncaught error unwinds.
/// A cooperative interruption unwinds cleanly with no error set.
fn run_loop(rt: &mut Runtime, base: usize) -> Result {
   loop {
      if rt.run_depth() <= base {
         return Ok(());
      }

      if rt.interrupted() {
         tracing::debug!(target: "rpl::eval", "interrupted");
         rt.run_unwind(base);
         return Ok(());
      }

      if rt.halted {
         return Ok(());
      }

      let (pc, end) = rt.run_pop().expect("depth was checked");
      if pc >= end {
         continue;
      }

      let ty = object::id(rt, pc);
      rt.run_push(object::skip(rt, pc), end)?;

      let failed = evaluate_one(rt, pc).is_err() || rt.error().is_some();
      if failed {
         // A failure with an empty slot is a cooperative cancellation.
         if rt.error().is_none() {
            rt.run_unwind(base);
            return Ok(());
         }

         if !unwind_to_handler(rt, base) {
            return Err(Failed);
         }
         continue;
      }

      step_accounting(rt, ty);
   }
}

/// Unwinds pending ranges looking for an armed error handler. When one is
/// found the error moves aside for `errm` and the handler range is left on
/// top, about to run.
fn unwind_to_handler(rt: &mut Runtime, base: usize) -> bool {
   while rt.run_depth() > base {
      let (pc, end) = rt.run_pop().expect("depth was checked");

      if pc < end && object::id(rt, pc) == Id::ErrThenMarker {
         rt.catch_error();
         let _ = rt.run_push(pc, end);
         return true;
      }
   }

   false
}

fn step_accounting(rt: &mut Runtime, ty: Id) {
   // The debugging commands steer the stepper; they are not steps.
   if matches!(
      ty,
      Id::Halt
         | Id::SingleStep
         | Id::StepOver
         | Id::StepOut
         | Id::MultipleSteps
         | Id::Continue
         | Id::Kill
   ) {
      return;
   }

   match rt.stepping {
      Stepping::None => {},

      Stepping::Steps(count) => {
         if count <= 1 {
            rt.stepping = Stepping::None;
            rt.halted = true;
         } else {
            rt.stepping = Stepping::Steps(count - 1);
         }
      },

      Stepping::Over(depth) => {
         if rt.run_depth() <= depth {
            rt.stepping = Stepping::None;
            rt.halted = true;
         }
      },

      Stepping::Out(depth) => {
         if rt.run_depth() <= depth {
            rt.stepping = Stepping::None;
            rt.halted = true;
         }
      },
   }
}

#[cfg(test)]
mod tests {
   use std::sync::atomic::Ordering;

   use super::*;
   use crate::{
      ErrorKind,
      render,
      value::number,
   };

   fn run_text(rt: &mut Runtime, source: &str) {
      run_source(rt, source).expect("evaluation must succeed");
   }

   fn top_text(rt: &mut Runtime) -> String {
      let top = rt.top().expect("top");
      render::to_text(rt, top)
   }

   #[test]
   fn arithmetic_on_the_stack() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "2 3 +");

      assert_eq!(rt.depth(), 1);
      assert_eq!(top_text(&mut rt), "5");
   }

   #[test]
   fn programs_push_and_eval_runs_them() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "« 1 2 + »");
      assert_eq!(rt.depth(), 1);
      let top = rt.top().expect("top");
      assert_eq!(object::id(&rt, top), Id::Program);

      run_text(&mut rt, "Eval");
      assert_eq!(top_text(&mut rt), "3");
   }

   #[test]
   fn running_twice_equals_the_concatenation() {
      let mut rt = Runtime::new();
      let mut other = Runtime::new();

      run_text(&mut rt, "« 1 + 2 · » 'P' Sto");
      run_text(&mut rt, "0 P");
      run_text(&mut rt, "P");

      run_text(&mut other, "« 1 + 2 · » 'P' Sto");
      run_text(&mut other, "0 P P");

      // ((0+1)*2+1)*2 either way.
      assert_eq!(top_text(&mut rt), "6");
      assert_eq!(top_text(&mut other), "6");
   }

   #[test]
   fn conditional_with_error_catch() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "« iferr « 1 0 / » then 42 end » Eval");

      assert_eq!(rt.depth(), 1);
      assert_eq!(top_text(&mut rt), "42");
      assert!(rt.error().is_none());

      // The caught message is available to the program.
      run_text(&mut rt, "Errm");
      assert_eq!(top_text(&mut rt), "\"Divide by zero\"");
   }

   #[test]
   fn uncaught_errors_surface() {
      let mut rt = Runtime::new();

      let result = run_source(&mut rt, "1 0 /");
      assert!(result.is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(ErrorKind::ZeroDivide)
      );
      assert_eq!(rt.run_depth(), 0);
   }

   #[test]
   fn bounded_loop_with_local_variable() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "0 1 5 for i i + next");

      assert_eq!(rt.depth(), 1);
      assert_eq!(top_text(&mut rt), "15");
      assert_eq!(rt.locals(), 0);
   }

   #[test]
   fn for_step_counts_down() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "0 10 2 for i i + -2 step");

      // 10 + 8 + 6 + 4 + 2.
      assert_eq!(top_text(&mut rt), "30");
   }

   #[test]
   fn start_next_repeats() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "7 1 4 start 1 + next");
      assert_eq!(top_text(&mut rt), "11");
   }

   #[test]
   fn do_until_runs_at_least_once() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "0 do 1 + until Dup 3 ≥ end");
      assert_eq!(top_text(&mut rt), "3");
   }

   #[test]
   fn while_repeat_may_not_run() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "5 while Dup 10 < repeat 2 · end");
      assert_eq!(top_text(&mut rt), "10");

      run_text(&mut rt, "while Dup 10 < repeat 2 · end");
      assert_eq!(top_text(&mut rt), "10");
   }

   #[test]
   fn if_then_else_branches() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "if 1 2 < then 111 else 222 end");
      assert_eq!(top_text(&mut rt), "111");

      run_text(&mut rt, "if 1 2 > then 111 else 222 end");
      assert_eq!(top_text(&mut rt), "222");

      run_text(&mut rt, "if 0 then 333 end");
      assert_eq!(top_text(&mut rt), "222");
   }

   #[test]
   fn case_picks_the_first_match() {
      let mut rt = Runtime::new();

      run_text(
         &mut rt,
         "2 case Dup 1 == then \"one\" end Dup 2 == then Drop \"two\" end \"other\" end",
      );
      assert_eq!(top_text(&mut rt), "\"two\"");
   }

   #[test]
   fn case_when_compares_the_subject() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "3 case 1 when \"one\" end 3 when \"three\" end end");
      assert_eq!(top_text(&mut rt), "\"three\"");
   }

   #[test]
   fn case_falls_through_to_the_default() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "9 case Dup 1 == then \"one\" end Drop \"other\" end");
      assert_eq!(top_text(&mut rt), "\"other\"");
   }

   #[test]
   fn ift_and_ifte_defer_their_target() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "1 « 40 2 + » IFT");
      assert_eq!(top_text(&mut rt), "42");

      run_text(&mut rt, "0 11 22 IFTE");
      assert_eq!(top_text(&mut rt), "22");
   }

   #[test]
   fn store_recall_in_nested_directories() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "2 'X' Sto");
      run_text(&mut rt, "'D' CrDir D");
      run_text(&mut rt, "3 'X' Sto X");
      assert_eq!(top_text(&mut rt), "3");

      run_text(&mut rt, "UpDir X");
      assert_eq!(top_text(&mut rt), "2");

      run_text(&mut rt, "'X' Purge");
      let result = run_source(&mut rt, "X Eval");
      assert!(result.is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(ErrorKind::UndefinedName)
      );
   }

   #[test]
   fn undefined_names_stay_symbolic() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "mystery");
      assert_eq!(top_text(&mut rt), "'mystery'");

      rt.settings.symbolic_results = false;
      let result = run_source(&mut rt, "mystery2");
      assert!(result.is_err());
   }

   #[test]
   fn expressions_evaluate_after_binding() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "6 'a' Sto 7 'b' Sto 'a·b' Eval");
      assert_eq!(top_text(&mut rt), "42");
   }

   #[test]
   fn substituted_expressions_match_stored_bindings() {
      let mut rt = Runtime::new();

      // evaluate(substitute(e, x, 4)) against storing 4 into x.
      run_text(&mut rt, "'x+x·3'");
      let expr = rt.pop().expect("expression");
      let expr = rt.protect(expr);

      let four = number::make_integer(&mut rt, 4).expect("make");
      let bound = expression::substitute(&mut rt, expr.get(), "x", four).expect("substitute");
      let bound = rt.protect(bound);
      run(&mut rt, bound.get()).expect("run substituted");
      let direct = top_text(&mut rt);

      run_text(&mut rt, "4 'x' Sto");
      run(&mut rt, expr.get()).expect("run stored");
      assert_eq!(top_text(&mut rt), direct);
   }

   #[test]
   fn interruption_stops_between_steps() {
      let mut rt = Runtime::new();

      // The flag is observed at a deferred-object boundary.
      rt.interrupt_flag().store(true, Ordering::Relaxed);

      let result = run_source(&mut rt, "1 2 + 10 ·");
      assert!(result.is_ok());
      assert!(rt.error().is_none());
      assert_eq!(rt.run_depth(), 0);
   }

   #[test]
   fn halt_and_single_step() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "1 Halt 2 3");
      assert!(rt.halted);
      assert_eq!(rt.depth(), 1);
      assert!(pending(&rt));

      // One object at a time.
      run_text(&mut rt, "SingleStep");
      resume(&mut rt).expect("resume");
      assert_eq!(rt.depth(), 2);
      assert!(rt.halted);

      run_text(&mut rt, "Continue");
      resume(&mut rt).expect("resume");
      assert_eq!(rt.depth(), 3);
      assert!(!pending(&rt));
   }

   #[test]
   fn kill_discards_pending_work() {
      let mut rt = Runtime::new();

      run_text(&mut rt, "1 Halt 2 3");
      assert!(pending(&rt));

      run_text(&mut rt, "Kill");
      assert!(!pending(&rt));
      assert_eq!(rt.depth(), 1);
   }

   #[test]
   fn deep_nesting_does_not_recurse() {
      let mut rt = Runtime::with_heap(256 * 1024);

      // A nested conditional tower far deeper than recursive evaluation on
      // the host call stack could survive.
      let mut source = String::from("0 ");
      for _ in 0..300 {
         source.push_str("if 1 then 1 + ");
      }
      for _ in 0..300 {
         source.push_str("end ");
      }

      run_text(&mut rt, &source);
      assert_eq!(top_text(&mut rt), "300");
   }

   #[test]
   fn gc_during_evaluation_keeps_references() {
      let mut rt = Runtime::with_heap(4096);

      // Each iteration allocates; the arena is far too small to hold them
      // all without collection.
      run_text(&mut rt, "0 1 200 for i i + next");
      assert_eq!(top_text(&mut rt), "20100");
   }
}
