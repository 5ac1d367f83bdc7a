//! Commands: objects that are nothing but their tag. Parsing matches the
//! spelling table; evaluation covers the stack, variable, debugging, error
//! and memory commands. Arithmetic lives in its own module.

use rpl_syntax::is_valid_as_name_initial;

use crate::{
   Id,
   Result,
   Runtime,
   eval,
   id,
   object,
   parse::{
      Parsed,
      Parser,
   },
   render,
   settings,
   value::{
      directory,
      list,
      symbol,
      text,
   },
};

fn emit(rt: &mut Runtime, ty: Id) -> Result<Parsed> {
   let mut image = Vec::new();
   object::push_command(&mut image, ty);

   Ok(Parsed::Done(rt.make(&image)?))
}

/// Parses a command or reserved variable name by its spelling: a maximal
/// name-like word, or the longest matching operator glyph run.
pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   let start = p.offset;
   let Some(first) = p.peek() else {
      return Ok(Parsed::Skip);
   };

   if is_valid_as_name_initial(first) {
      let mut end = start + first.len_utf8();
      for c in p.rest_from(end).chars() {
         if !rpl_syntax::is_valid_in_name(c) {
            break;
         }
         end += c.len_utf8();
      }

      let Some(ty) = id::lookup(p.slice(start, end)) else {
         return Ok(Parsed::Skip);
      };

      p.offset = end;
      return emit(rt, ty);
   }

   // Operator spellings are one or two characters; prefer the longer match
   // so `==` is not read as two `=`.
   let mut chars = p.rest().chars();
   let c1 = chars.next().expect("peeked above");

   if let Some(c2) = chars.next() {
      let len = c1.len_utf8() + c2.len_utf8();

      if let Some(ty) = id::lookup(p.slice(start, start + len)) {
         p.offset = start + len;
         return emit(rt, ty);
      }
   }

   if let Some(ty) = id::lookup(p.slice(start, start + c1.len_utf8())) {
      p.offset = start + c1.len_utf8();
      return emit(rt, ty);
   }

   Ok(Parsed::Skip)
}

/// Runs one non-algebraic command. The evaluator has already checked the
/// declared arity and snapshotted the arguments.
pub fn evaluate(rt: &mut Runtime, ty: Id, obj: usize) -> Result {
   match ty {
      // Stack manipulation.
      Id::Dup => {
         let top = rt.top()?;
         rt.push(top)
      },

      Id::Dup2 => {
         let second = rt.stack_at(1)?;
         let first = rt.stack_at(0)?;
         rt.push(second)?;
         rt.push(first)
      },

      Id::Drop => rt.drop_n(1),
      Id::Drop2 => rt.drop_n(2),

      Id::Swap => {
         let first = rt.stack_at(0)?;
         let second = rt.stack_at(1)?;
         rt.stack_set(0, second)?;
         rt.stack_set(1, first)
      },

      Id::Over => {
         let second = rt.stack_at(1)?;
         rt.push(second)
      },

      Id::Rot => rt.roll(3),

      Id::Pick => {
         let level = object::pop_u32(rt)? as usize;
         if level == 0 {
            return rt.value_error().command(ty).err();
         }

         let picked = rt.stack_at(level - 1)?;
         rt.push(picked)
      },

      Id::Roll => {
         let count = object::pop_u32(rt)? as usize;
         rt.roll(count)
      },

      Id::RollD => {
         let count = object::pop_u32(rt)? as usize;
         rt.rolld(count)
      },

      Id::Depth => {
         let depth = rt.depth() as u64;
         let obj = crate::value::number::make_integer(rt, depth)?;
         rt.push(obj)
      },

      Id::ClearStack => {
         let depth = rt.depth();
         rt.drop_n(depth)
      },

      Id::LastArg => rt.push_last_args(),

      // Variables.
      Id::Sto => {
         let name = rt.pop()?;
         let name = rt.protect(name);
         let value = rt.pop()?;

         let current = rt.variables(0).expect("the path always has a root");
         directory::store(rt, current, name.get(), value)
      },

      Id::Rcl => {
         let name = rt.pop()?;
         let value = directory::recall_all(rt, name, true)?.expect("reported if missing");
         rt.push(value)
      },

      Id::Purge => {
         let name = rt.pop()?;
         let current = rt.variables(0).expect("the path always has a root");
         directory::purge(rt, current, name)?;
         Ok(())
      },

      Id::CrDir => {
         let name = rt.pop()?;
         directory::create(rt, name)
      },

      Id::UpDir => {
         rt.updir();
         Ok(())
      },

      Id::Home => {
         rt.home();
         Ok(())
      },

      Id::Path => {
         let path = path_list(rt)?;
         rt.push(path)
      },

      // Evaluation.
      Id::Eval => {
         let target = rt.pop()?;
         eval::defer_binding(rt, target)
      },

      Id::Ift => {
         let target = rt.pop()?;
         let target = rt.protect(target);
         let condition = rt.pop()?;

         if object::as_truth(rt, condition)? {
            eval::defer_binding(rt, target.get())?;
         }
         Ok(())
      },

      Id::Ifte => {
         let otherwise = rt.pop()?;
         let otherwise = rt.protect(otherwise);
         let target = rt.pop()?;
         let target = rt.protect(target);
         let condition = rt.pop()?;

         let chosen = if object::as_truth(rt, condition)? {
            target.get()
         } else {
            otherwise.get()
         };
         eval::defer_binding(rt, chosen)
      },

      // Debugging.
      Id::Halt => {
         rt.halted = true;
         rt.halt_request = Some(true);
         Ok(())
      },

      Id::SingleStep => {
         rt.stepping = eval::Stepping::Steps(1);
         rt.halt_request = Some(false);
         Ok(())
      },

      Id::StepOver => {
         rt.stepping = eval::Stepping::Over(rt.run_depth());
         rt.halt_request = Some(false);
         Ok(())
      },

      Id::StepOut => {
         rt.stepping = eval::Stepping::Out(rt.run_depth().saturating_sub(1));
         rt.halt_request = Some(false);
         Ok(())
      },

      Id::MultipleSteps => {
         let count = object::pop_u32(rt)? as usize;
         rt.stepping = eval::Stepping::Steps(count.max(1));
         rt.halt_request = Some(false);
         Ok(())
      },

      Id::Continue => {
         rt.stepping = eval::Stepping::None;
         rt.halt_request = Some(false);
         Ok(())
      },

      Id::Kill => {
         rt.run_unwind(0);
         rt.stepping = eval::Stepping::None;
         rt.halted = false;
         rt.halt_request = Some(false);
         Ok(())
      },

      // Errors.
      Id::Errm => {
         let message = rt.caught().map(crate::Error::message).unwrap_or_default();
         let obj = text::make(rt, &message)?;
         rt.push(obj)
      },

      Id::Err0 => {
         rt.clear_caught();
         rt.clear_error();
         Ok(())
      },

      Id::DoErr => {
         let payload = rt.pop()?;

         let message = if object::id(rt, payload) == Id::Text {
            text::value(rt, payload).to_owned()
         } else {
            render::to_text(rt, payload)
         };

         rt.custom_error(message).command(ty).err()
      },

      // Memory.
      Id::GarbageCollect => {
         let freed = rt.gc() as u64;
         let obj = crate::value::number::make_integer(rt, freed)?;
         rt.push(obj)
      },

      Id::AvailableMemory => {
         let free = rt.free() as u64;
         let obj = crate::value::number::make_integer(rt, free)?;
         rt.push(obj)
      },

      ty if ty.is_setting() => settings::run(rt, ty),

      // Reserved names recall like symbols.
      ty if ty.is_reserved_name() => {
         match directory::recall_all(rt, obj, false)? {
            Some(value) => eval::defer_binding(rt, value),
            None => rt.undefined_name_error().command(ty).err(),
         }
      },

      _ => rt.internal_error().command(ty).err(),
   }
}

/// The `Path` result: the root marker followed by the name of every
/// directory from the root down to the current one.
fn path_list(rt: &mut Runtime) -> Result<usize> {
   let mut names = Vec::new();

   let home = symbol::make(rt, "HOME")?;
   names.push(rt.protect(home));

   for depth in (1..rt.path_len()).rev() {
      let parent = rt.variables(depth).expect("depth is on the path");
      let child = rt.variables(depth - 1).expect("depth is on the path");

      let name = directory::entries(rt, parent)
         .into_iter()
         .find(|&(_, value)| value == child)
         .map(|(name, _)| name);

      match name {
         Some(name) => names.push(rt.protect(name)),
         None => return rt.malformed_directory_error().err(),
      }
   }

   let offsets: Vec<usize> = names.iter().map(crate::memory::GcObj::get).collect();
   list::make(rt, Id::List, &offsets)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::value::number;

   fn push_int(rt: &mut Runtime, value: u64) {
      let obj = number::make_integer(rt, value).expect("make");
      rt.push(obj).expect("push");
   }

   fn int_at(rt: &mut Runtime, level: usize) -> u64 {
      let obj = rt.stack_at(level).expect("level");
      number::integer_value(rt, obj).expect("integer")
   }

   #[test]
   fn stack_shuffles() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 1);
      push_int(&mut rt, 2);
      push_int(&mut rt, 3);

      evaluate(&mut rt, Id::Rot, 0).expect("rot");
      assert_eq!(
         [int_at(&mut rt, 0), int_at(&mut rt, 1), int_at(&mut rt, 2)],
         [1, 3, 2]
      );

      evaluate(&mut rt, Id::Swap, 0).expect("swap");
      assert_eq!([int_at(&mut rt, 0), int_at(&mut rt, 1)], [3, 1]);

      evaluate(&mut rt, Id::Over, 0).expect("over");
      assert_eq!(int_at(&mut rt, 0), 1);
   }

   #[test]
   fn pick_counts_from_one() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 11);
      push_int(&mut rt, 22);
      push_int(&mut rt, 2);

      // 2 PICK copies the second level, like Over.
      evaluate(&mut rt, Id::Pick, 0).expect("pick");
      assert_eq!(int_at(&mut rt, 0), 11);
   }

   #[test]
   fn last_arguments_come_back() {
      let mut rt = Runtime::new();

      push_int(&mut rt, 7);
      push_int(&mut rt, 8);
      rt.args(2).expect("args");
      rt.drop_n(2).expect("drop");

      evaluate(&mut rt, Id::LastArg, 0).expect("lastarg");
      assert_eq!([int_at(&mut rt, 0), int_at(&mut rt, 1)], [8, 7]);
   }

   #[test]
   fn keywords_parse_with_boundaries() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("== 2");
      let Parsed::Done(obj) = parse(&mut rt, &mut p).expect("parse") else {
         panic!("operator must parse");
      };
      assert_eq!(object::id(&rt, obj), Id::TestEq);
      assert_eq!(p.offset, 2);
   }
}
