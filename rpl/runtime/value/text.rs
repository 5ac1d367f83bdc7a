//! Text objects: a length-prefixed run of UTF-8 bytes.

use crate::{
   Id,
   Result,
   Runtime,
   leb128,
   object,
   parse::{
      Parsed,
      Parser,
   },
   render::Renderer,
};

pub fn make(rt: &mut Runtime, text: &str) -> Result<usize> {
   make_with(rt, Id::Text, text.as_bytes())
}

pub(crate) fn make_with(rt: &mut Runtime, ty: Id, bytes: &[u8]) -> Result<usize> {
   let mut image = Vec::with_capacity(bytes.len() + 4);
   leb128::push(&mut image, ty as u64);
   leb128::push(&mut image, bytes.len() as u64);
   image.extend_from_slice(bytes);
   rt.make(&image)
}

/// The text content, borrowed from the arena.
#[must_use]
pub fn value(rt: &Runtime, obj: usize) -> &str {
   let at = object::payload(rt, obj);
   let (len, read) = leb128::read(rt.bytes(), at);
   let bytes = &rt.bytes()[at + read..at + read + len as usize];

   std::str::from_utf8(bytes).unwrap_or("")
}

/// Parses a `"…"` literal; a doubled quote stands for one quote character.
pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   let start = p.offset;

   if !p.rest().starts_with('"') {
      return Ok(Parsed::Skip);
   }

   let mut content = String::new();
   let mut chars = p.rest_from(start + 1).char_indices();

   while let Some((at, c)) = chars.next() {
      if c != '"' {
         content.push(c);
         continue;
      }

      // A doubled quote is an escaped quote; a lone one closes the text.
      if let Some((_, '"')) = chars.clone().next() {
         chars.next();
         content.push('"');
         continue;
      }

      p.offset = start + 1 + at + 1;
      return Ok(Parsed::Done(make(rt, &content)?));
   }

   rt.unterminated_error()
      .source(p.span(start, p.source.len()))
      .err()
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   r.put("\"");

   for c in value(rt, obj).chars() {
      if c == '"' {
         r.put("\"\"");
      } else {
         r.put_char(c);
      }
   }

   r.put("\"");
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::render;

   #[test]
   fn quote_escape_roundtrips() {
      let mut rt = Runtime::new();

      let mut p = Parser::new(r#""say ""hi"" now" rest"#);
      let Parsed::Done(obj) = parse(&mut rt, &mut p).expect("parse") else {
         panic!("text literal must parse");
      };

      assert_eq!(value(&rt, obj), r#"say "hi" now"#);

      let rendered = render::to_text(&rt, obj);
      assert_eq!(rendered, r#""say ""hi"" now""#);
   }

   #[test]
   fn unterminated_text_spans_to_the_end() {
      let mut rt = Runtime::new();

      let mut p = Parser::new("\"oops");
      assert!(parse(&mut rt, &mut p).is_err());

      let error = rt.error().expect("error must be set");
      let span = error.span.expect("span must be set");
      assert_eq!(span.start, 0);
      assert_eq!(span.end(), 5);
   }
}
