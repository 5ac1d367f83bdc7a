//! Comments. The `@ …` end-of-line form is kept as an object so the editor
//! round-trips it; the `@@ … @@` form is stripped during parsing.

use crate::{
   Id,
   Result,
   Runtime,
   object,
   parse::{
      Parsed,
      Parser,
   },
   render::Renderer,
   value::text,
};

/// The comment text, without the leading `@`.
#[must_use]
pub fn value(rt: &Runtime, obj: usize) -> &str {
   text::value(rt, obj)
}

pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   if !p.rest().starts_with('@') {
      return Ok(Parsed::Skip);
   }

   // Stripped form: consume through the closing marker and let the caller
   // retry from there.
   if p.rest().starts_with("@@") {
      let body = p.offset + 2;

      match p.rest_from(body).find("@@") {
         Some(at) => {
            p.offset = body + at + 2;
            return Ok(Parsed::Commented);
         },

         None => {
            return rt
               .unterminated_error()
               .source(p.span(p.offset, p.source.len()))
               .err();
         },
      }
   }

   let body = p.offset + 1;
   let len = p.rest_from(body).find('\n').unwrap_or(p.source.len() - body);
   let content = p.slice(body, body + len).to_owned();
   p.offset = body + len;

   Ok(Parsed::Done(text::make_with(
      rt,
      Id::Comment,
      content.as_bytes(),
   )?))
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   r.cr();
   r.put("@");
   r.put(value(rt, obj));
   r.cr();
}

/// Evaluating a comment does nothing.
pub fn evaluate(_rt: &mut Runtime, _obj: usize) -> Result {
   Ok(())
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn line_comments_are_kept() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("@ note to self\nrest");
      let Parsed::Done(obj) = parse(&mut rt, &mut p).expect("parse") else {
         panic!("comment must parse");
      };

      assert_eq!(object::id(&rt, obj), Id::Comment);
      assert_eq!(value(&rt, obj), " note to self");
   }

   #[test]
   fn block_comments_are_stripped() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("@@ gone @@ 42");
      assert!(matches!(parse(&mut rt, &mut p), Ok(Parsed::Commented)));
      assert_eq!(p.rest(), " 42");
   }

   #[test]
   fn unterminated_block_comment_errors() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("@@ gone");
      assert!(parse(&mut rt, &mut p).is_err());
   }
}
