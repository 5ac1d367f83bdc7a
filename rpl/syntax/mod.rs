//! Source-text level definitions shared by the parser and the renderer:
//! spans into a parse buffer and the classification of codepoints that
//! decides where names, numbers and separators begin and end.

mod span;
pub use span::Span;

/// Returns whether this string is usable as a name without quoting.
#[must_use]
pub fn is_valid_name(s: &str) -> bool {
   let mut chars = s.chars();

   chars.next().is_some_and(is_valid_as_name_initial) && chars.all(is_valid_in_name)
}

/// Returns whether a name may start with this character.
#[must_use]
pub fn is_valid_as_name_initial(c: char) -> bool {
   !c.is_ascii_digit() && is_valid_in_name(c)
}

/// Returns whether a name may contain this character past the first.
#[must_use]
pub fn is_valid_in_name(c: char) -> bool {
   if is_separator(c) || c.is_whitespace() || c.is_control() {
      return false;
   }

   !matches!(
      c,
      '+' | '-'
         | '*'
         | '/'
         | '^'
         | '!'
         | '='
         | '<'
         | '>'
         | '%'
         | '²'
         | '³'
         | '·'
         | '×'
         | '÷'
         | '⁻'
         | '∠'
         | 'ⅈ'
   )
}

/// Returns whether this character terminates a word during parsing.
///
/// Separators split commands and numbers from what follows them; they are
/// the delimiters of every structured object plus the argument separators
/// of algebraic function calls.
#[must_use]
pub fn is_separator(c: char) -> bool {
   matches!(
      c,
      '{' | '}' | '[' | ']' | '(' | ')' | '«' | '»' | '\'' | '"' | ';' | ',' | '@'
   )
}

/// Returns whether a word boundary lies at the given offset.
///
/// The start and end of the source are boundaries, as is any separator or
/// whitespace character.
#[must_use]
pub fn is_word_boundary(source: &str, offset: usize) -> bool {
   if offset == 0 || offset >= source.len() {
      return true;
   }

   source[offset..]
      .chars()
      .next()
      .is_some_and(|c| c.is_whitespace() || is_separator(c))
}

/// Strips one leading run of whitespace, returning how many bytes were
/// skipped.
#[must_use]
pub fn skip_whitespace(source: &str) -> usize {
   source.len() - source.trim_start().len()
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn names() {
      assert!(is_valid_name("X"));
      assert!(is_valid_name("Speed2"));
      assert!(is_valid_name("ΣData"));
      assert!(!is_valid_name("2X"));
      assert!(!is_valid_name("a+b"));
      assert!(!is_valid_name(""));
   }

   #[test]
   fn boundaries() {
      assert!(is_word_boundary("if then", 2));
      assert!(is_word_boundary("if", 2));
      assert!(is_word_boundary("do{", 2));
      assert!(!is_word_boundary("done", 2));
   }

   #[test]
   fn whitespace() {
      assert_eq!(skip_whitespace("  \n\tx"), 4);
      assert_eq!(skip_whitespace("x"), 0);
      assert_eq!(skip_whitespace(""), 0);
   }
}
