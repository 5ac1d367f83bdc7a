//! Text rendering.
//!
//! A renderer streams into a growing (or width-capped) buffer, coalescing
//! deferred space and line-break requests and tracking the indentation the
//! structured forms ask for. Each tag's renderer decides what to emit; the
//! dispatch at the bottom ties them together.

use crate::{
   Id,
   Result,
   Runtime,
   flow,
   object,
   settings::CommandDisplay,
   value::{
      comment,
      complex,
      directory,
      expression,
      list,
      number,
      symbol,
      text,
   },
};

/// What the rendered text is for. The editor needs round-trip fidelity, the
/// display favours brevity, and symbolic output is what expression payloads
/// embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
   Display,
   #[default]
   Editor,
   Symbolic,
}

pub struct Renderer {
   out:    String,
   target: Target,
   max:    Option<usize>,

   indent:     usize,
   want_space: bool,
   want_cr:    bool,
   truncated:  bool,

   locals: Vec<String>,
}

#[bon::bon]
impl Renderer {
   #[builder]
   pub fn new(#[builder(default)] target: Target, max: Option<usize>) -> Self {
      Self {
         out: String::new(),
         target,
         max,

         indent: 0,
         want_space: false,
         want_cr: false,
         truncated: false,

         locals: Vec::new(),
      }
   }
}

impl Renderer {
   #[must_use]
   pub fn display(&self) -> bool {
      self.target == Target::Display
   }

   #[must_use]
   pub fn editing(&self) -> bool {
      self.target == Target::Editor
   }

   #[must_use]
   pub fn symbolic(&self) -> bool {
      self.target == Target::Symbolic
   }

   /// Requests a space before whatever comes next.
   pub fn space(&mut self) {
      self.want_space = true;
   }

   /// Requests a line break before whatever comes next. On the display
   /// target everything stays on one line.
   pub fn cr(&mut self) {
      if !self.display() {
         self.want_cr = true;
      }
   }

   pub fn indent(&mut self) {
      self.indent += 1;
   }

   pub fn unindent(&mut self) {
      self.indent = self.indent.saturating_sub(1);
   }

   fn flush_pending(&mut self) {
      if self.out.is_empty() {
         self.want_cr = false;
         self.want_space = false;
         return;
      }

      if self.want_cr {
         self.out.push('\n');
         for _ in 0..self.indent {
            self.out.push_str("  ");
         }
      } else if self.want_space && !self.out.ends_with([' ', '\n']) {
         self.out.push(' ');
      }

      self.want_cr = false;
      self.want_space = false;
   }

   pub fn put(&mut self, text: &str) {
      if text.is_empty() || self.truncated {
         return;
      }

      self.flush_pending();
      self.out.push_str(text);

      if let Some(max) = self.max
         && self.out.len() > max
      {
         let mut cut = max.saturating_sub('…'.len_utf8());
         while !self.out.is_char_boundary(cut) {
            cut -= 1;
         }

         self.out.truncate(cut);
         self.out.push('…');
         self.truncated = true;
      }
   }

   pub fn put_char(&mut self, c: char) {
      let mut raw = [0_u8; 4];
      self.put(c.encode_utf8(&mut raw));
   }

   /// Emits a command name in the configured spelling.
   pub fn put_id(&mut self, rt: &Runtime, ty: Id) {
      let spellings = ty.spellings();
      let name = match rt.settings.command_display {
         CommandDisplay::Short => spellings.last().copied(),
         CommandDisplay::Long => spellings.first().copied(),
      };

      self.put(name.unwrap_or(""));
   }

   /// Binds a loop variable name for the body being rendered.
   pub fn push_local(&mut self, name: String) {
      self.locals.push(name);
   }

   pub fn pop_local(&mut self) {
      self.locals.pop();
   }

   /// The name a local reference at this depth stands for.
   #[must_use]
   pub fn local_name(&self, index: usize) -> Option<&str> {
      // Each loop owns two slots, the counter sitting on top.
      let scope = index / 2;

      if index % 2 != 0 || scope >= self.locals.len() {
         return None;
      }

      Some(&self.locals[self.locals.len() - 1 - scope])
   }

   #[must_use]
   pub fn text(&self) -> &str {
      &self.out
   }

   #[must_use]
   pub fn size(&self) -> usize {
      self.out.len()
   }

   #[must_use]
   pub fn finish(self) -> String {
      self.out
   }
}

/// Renders one object into the given renderer.
pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   let ty = object::id(rt, obj);

   match ty {
      ty if ty.is_real() => number::render(rt, obj, r),
      ty if ty.is_complex() => complex::render(rt, obj, r),

      Id::Symbol => symbol::render(rt, obj, r),
      Id::Expression => expression::render(rt, obj, r),
      Id::Text => text::render(rt, obj, r),
      Id::Comment => comment::render(rt, obj, r),

      Id::List => list::render(rt, obj, r, "{", "}"),
      Id::Array => list::render(rt, obj, r, "[", "]"),
      Id::Program => list::render(rt, obj, r, "«", "»"),
      Id::Block => list::render(rt, obj, r, "", ""),

      Id::Directory => directory::render(rt, obj, r),

      Id::Local => {
         let name = r.local_name(symbol::local_index(rt, obj)).map(str::to_owned);
         r.put(name.as_deref().unwrap_or("_"));
      },

      ty if ty.is_structure() => flow::render(rt, obj, r),

      // Markers have no source form.
      ty if ty.is_marker() => {},

      ty if ty.is_command() || ty.is_reserved_name() => r.put_id(rt, ty),

      _ => {},
   }
}

/// Renders an object to a fresh string, in editor fidelity.
#[must_use]
pub fn to_text(rt: &Runtime, obj: usize) -> String {
   let mut r = Renderer::builder().build();
   render(rt, obj, &mut r);
   r.finish()
}

/// Renders an object for the stack display, capped to one line.
#[must_use]
pub fn to_display(rt: &Runtime, obj: usize, max: usize) -> String {
   let mut r = Renderer::builder().target(Target::Display).max(max).build();
   render(rt, obj, &mut r);
   r.finish()
}

/// Renders an object into the editor scratchpad.
pub fn edit(rt: &mut Runtime, obj: usize) -> Result {
   let text = to_text(rt, obj);
   rt.editor_set(&text)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::value::number;

   #[test]
   fn spaces_and_breaks_coalesce() {
      let mut r = Renderer::builder().build();

      r.space();
      r.put("a");
      r.space();
      r.space();
      r.put("b");
      r.cr();
      r.space();
      r.put("c");

      assert_eq!(r.text(), "a b\nc");
   }

   #[test]
   fn indentation_applies_after_breaks() {
      let mut r = Renderer::builder().build();

      r.put("«");
      r.indent();
      r.cr();
      r.put("x");
      r.unindent();
      r.cr();
      r.put("»");

      assert_eq!(r.text(), "«\n  x\n»");
   }

   #[test]
   fn display_target_caps_width() {
      let mut rt = Runtime::new();

      let obj = number::make_integer(&mut rt, u64::MAX).expect("make");
      let short = to_display(&rt, obj, 8);

      assert!(short.ends_with('…'));
      assert!(short.len() <= 8 + '…'.len_utf8());
   }
}
