//! Expressions: symbolic formulas stored in postfix order, rendered back to
//! infix using each element's declared precedence.

use smallvec::SmallVec;

use crate::{
   Id,
   Result,
   Runtime,
   id::precedence::{
      ADDITIVE,
      FUNCTION,
      SYMBOL,
   },
   object,
   render::{
      self,
      Renderer,
      Target,
   },
   value::{
      list,
      symbol,
   },
};

/// Wraps a single object into an expression; a symbol becomes the quoted
/// name form `'x'`.
pub fn make_from(rt: &mut Runtime, obj: usize) -> Result<usize> {
   let image = object::image(rt, obj);
   rt.make(&object::wrap(Id::Expression, &image))
}

/// Builds the expression applying a function to the given algebraic
/// operands, flattening operand expressions into the payload.
pub fn combine(rt: &mut Runtime, op: Id, operands: &[usize]) -> Result<usize> {
   let mut body = Vec::new();

   for &operand in operands {
      if object::id(rt, operand) == Id::Expression {
         let (start, end) = object::body(rt, operand);
         body.extend_from_slice(&rt.bytes()[start..end]);
      } else {
         body.extend_from_slice(&object::image(rt, operand));
      }
   }

   object::push_command(&mut body, op);
   rt.make(&object::wrap(Id::Expression, &body))
}

/// Rebuilds the expression with every occurrence of `name` replaced by the
/// given value.
pub fn substitute(rt: &mut Runtime, expr: usize, name: &str, value: usize) -> Result<usize> {
   let mut body = Vec::new();

   for item in list::items(rt, expr) {
      let replace =
         object::id(rt, item) == Id::Symbol && symbol::matches(rt, item, name);

      if replace {
         if object::id(rt, value) == Id::Expression {
            let (start, end) = object::body(rt, value);
            body.extend_from_slice(&rt.bytes()[start..end]);
         } else {
            body.extend_from_slice(&object::image(rt, value));
         }
      } else {
         body.extend_from_slice(&object::image(rt, item));
      }
   }

   rt.make(&object::wrap(Id::Expression, &body))
}

/// The free names of the expression, in order of first appearance.
#[must_use]
pub fn names(rt: &Runtime, expr: usize) -> Vec<String> {
   let mut found: Vec<String> = Vec::new();

   for item in list::items(rt, expr) {
      if object::id(rt, item) == Id::Symbol {
         let name = symbol::value(rt, item);

         if !found.iter().any(|seen| seen == name) {
            found.push(name.to_owned());
         }
      }
   }

   found
}

/// One rendered operand with the precedence of whatever produced it.
struct Fragment {
   text: String,
   prec: u8,
}

fn leaf(rt: &Runtime, obj: usize) -> Fragment {
   let mut r = Renderer::builder().target(Target::Symbolic).build();
   render::render(rt, obj, &mut r);

   let ty = object::id(rt, obj);
   let prec = if ty.is_real() && crate::value::number::is_negative(rt, obj) {
      // A leading minus binds like a subtraction when re-read.
      ADDITIVE
   } else {
      ty.precedence().max(1)
   };

   Fragment {
      text: r.finish(),
      prec,
   }
}

fn parenthesize(fragment: &Fragment, minimum: u8) -> String {
   if fragment.prec < minimum {
      format!("({})", fragment.text)
   } else {
      fragment.text.clone()
   }
}

fn infix_glyph(rt: &Runtime, op: Id) -> &'static str {
   match op {
      Id::Mul => rt.settings.multiply_glyph(),
      Id::And => " and ",
      Id::Or => " or ",
      Id::Xor => " xor ",
      other => other.name(),
   }
}

/// Replays the postfix payload against a small operand stack, combining
/// fragments by precedence.
fn infix_text(rt: &Runtime, expr: usize) -> String {
   let mut stack: SmallVec<[Fragment; 8]> = SmallVec::new();

   for item in list::items(rt, expr) {
      let ty = object::id(rt, item);

      if !ty.is_algebraic_fn() {
         stack.push(leaf(rt, item));
         continue;
      }

      match ty.arity() {
         1 => {
            let Some(x) = stack.pop() else { continue };

            let fragment = match ty {
               Id::Neg => Fragment {
                  text: format!("-{}", parenthesize(&x, SYMBOL)),
                  prec: ADDITIVE,
               },

               Id::Inv | Id::Sq | Id::Cubed | Id::Fact => {
                  let glyph = match ty {
                     Id::Inv => "⁻¹",
                     Id::Sq => "²",
                     Id::Cubed => "³",
                     _ => "!",
                  };

                  Fragment {
                     text: format!("{}{glyph}", parenthesize(&x, SYMBOL)),
                     prec: ty.precedence(),
                  }
               },

               _ => Fragment {
                  text: format!("{}({})", ty.name(), x.text),
                  prec: FUNCTION,
               },
            };

            stack.push(fragment);
         },

         2 => {
            let Some(y) = stack.pop() else { continue };
            let Some(x) = stack.pop() else { continue };

            let prec = ty.precedence();
            let fragment = if (1..FUNCTION).contains(&prec) {
               Fragment {
                  text: format!(
                     "{}{}{}",
                     parenthesize(&x, prec),
                     infix_glyph(rt, ty),
                     parenthesize(&y, prec + 1),
                  ),
                  prec,
               }
            } else {
               Fragment {
                  text: format!("{}({};{})", ty.name(), x.text, y.text),
                  prec: FUNCTION,
               }
            };

            stack.push(fragment);
         },

         _ => {},
      }
   }

   match stack.pop() {
      Some(fragment) => fragment.text,
      None => String::new(),
   }
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   let text = infix_text(rt, obj);

   if r.symbolic() {
      r.put(&text);
   } else {
      r.put("'");
      r.put(&text);
      r.put("'");
   }
}
