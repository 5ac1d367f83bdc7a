//! The RPL runtime core: a uniformly tagged object model in one compacting
//! arena, the parser and renderer mapping objects to and from source text,
//! and the iterative evaluator driving it all through an in-arena return
//! stack.

pub mod leb128;

mod id;
pub use id::{
   Id,
   NUM_IDS,
   lookup,
   precedence,
};

mod error;
pub use error::{
   Error,
   ErrorKind,
   Failed,
   Raised,
   Result,
};

mod settings;
pub use settings::{
   AngleMode,
   CommandDisplay,
   Settings,
};

mod memory;
pub use memory::{
   DEFAULT_HEAP,
   GcObj,
   Runtime,
};

pub mod object;

pub mod parse;
pub use parse::Parser;

pub mod render;
pub use render::{
   Renderer,
   Target,
};

mod arithmetic;
mod flow;

pub mod eval;
pub use eval::{
   Stepping,
   resume,
   run,
   run_source,
};

pub mod disk;

pub mod value;

#[cfg(test)]
mod tests {
   use super::*;

   fn roundtrip(source: &str) {
      let mut rt = Runtime::new();
      let mut p = Parser::new(source);

      let obj = parse::object(&mut rt, &mut p).expect("parse");
      let obj = rt.protect(obj);
      let text = render::to_text(&rt, obj.get());

      let mut p = Parser::new(&text);
      let again = parse::object(&mut rt, &mut p).expect("reparse");
      let again = rt.protect(again);

      assert!(
         object::same(&rt, obj.get(), again.get()),
         "{source} -> {text}"
      );
      assert_eq!(
         render::to_text(&rt, again.get()),
         text,
         "rendering {source} must be idempotent"
      );
   }

   #[test]
   fn parse_render_roundtrips() {
      for source in [
         "42",
         "-42",
         "123456789012345678901234567890",
         "3/4",
         "-3/4",
         "2.5",
         "1e30",
         "#BEEFh",
         "#777o",
         "#1010b",
         "5#1234#",
         "3-4ⅈ",
         "2∠1.5",
         "'a'",
         "'(a+2·b)/c'",
         "'sin(x)^2+cos(x)^2'",
         "\"hello \"\"world\"\"\"",
         "{ 1 2 { 3 } }",
         "[ 1 2 3 ]",
         "« 1 2 + Dup »",
         "« if 1 then 2 else 3 end »",
         "« do 1 until 2 end »",
         "« while 1 repeat 2 end »",
         "« 1 5 start 0 next »",
         "« 1 5 for i i + next »",
         "« 1 10 for i i + 2 step »",
         "« case 1 then 2 end 3 when 4 end 5 end »",
         "« iferr 1 then 2 else 3 end »",
         "Dup",
         "ΣData",
      ] {
         roundtrip(source);
      }
   }

   #[test]
   fn heap_accounting_is_exact_after_activity() {
      let mut rt = Runtime::with_heap(8192);

      eval::run_source(&mut rt, "1 'A' Sto { 2 3 } 'B' Sto 4 5 6").expect("run");
      rt.gc();

      // Sum of region sizes plus free space equals the arena size; this is
      // implied by the region layout, checked here after real traffic.
      assert!(rt.free() < rt.heap_size());
      assert!(rt.error().is_none());

      eval::run_source(&mut rt, "'B' Purge A").expect("run");
      let top = rt.top().expect("top");
      assert_eq!(render::to_text(&rt, top), "1");
   }

   #[test]
   fn gc_preserves_stack_renderings() {
      let mut rt = Runtime::with_heap(4096);

      // Fill temporaries with reachable objects, then force collections by
      // allocating garbage; every stack slot must still render the same.
      eval::run_source(&mut rt, "11 \"two\" { 3 } 'x+4'").expect("run");

      let before: Vec<String> = (0..rt.depth())
         .map(|level| {
            let obj = rt.stack_at(level).expect("level");
            render::to_text(&rt, obj)
         })
         .collect();

      for _ in 0..400 {
         let _ = value::text::make(&mut rt, "garbage garbage garbage").expect("make");
      }
      rt.gc();

      let after: Vec<String> = (0..rt.depth())
         .map(|level| {
            let obj = rt.stack_at(level).expect("level");
            render::to_text(&rt, obj)
         })
         .collect();

      assert_eq!(before, after);
   }
}
