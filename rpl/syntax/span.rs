use std::{
   fmt,
   ops,
};

/// The span of a source code element, as a byte offset and length into the
/// parse buffer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
   /// Byte offset of the first character.
   pub start: usize,
   /// Length in bytes.
   pub len:   usize,
}

impl fmt::Display for Span {
   fn fmt(&self, writer: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(writer, "{start}..{end}", start = self.start, end = self.end())
   }
}

impl From<Span> for ops::Range<usize> {
   fn from(span: Span) -> Self {
      span.start..span.end()
   }
}

impl Span {
   /// Creates a span from a start offset and a length.
   #[must_use]
   pub fn at(start: usize, len: usize) -> Self {
      Self { start, len }
   }

   /// Creates a span covering `start..end`.
   #[must_use]
   pub fn new(start: usize, end: usize) -> Self {
      Self {
         start,
         len: end - start,
      }
   }

   /// Creates an empty span at the given offset.
   #[must_use]
   pub fn empty(start: usize) -> Self {
      Self { start, len: 0 }
   }

   /// The offset one past the last character.
   #[must_use]
   pub fn end(self) -> usize {
      self.start + self.len
   }

   #[must_use]
   pub fn is_empty(self) -> bool {
      self.len == 0
   }

   /// Returns the spanned slice of the given source.
   #[must_use]
   pub fn of(self, source: &str) -> &str {
      source.get(self.start..self.end()).unwrap_or("")
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn slicing() {
      let span = Span::at(2, 3);

      assert_eq!(span.end(), 5);
      assert_eq!(span.of("do until end"), " un");
      assert_eq!(Span::empty(4).of("abc"), "");
   }
}
