//! Directories: nested, mutable name → value maps encoded inline.
//!
//! A directory body is an even run of objects, names at even positions.
//! Store, update and purge resize the directory in place: everything above
//! the mutation point shifts by the size delta, then the length fields of
//! every enclosing directory on the active path are fixed up. Directories
//! live in the globals region; evaluating one enters it.

use rpl_syntax::is_word_boundary;

use crate::{
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
   settings,
   value::symbol,
};

/// The name/value pairs of a directory.
#[must_use]
pub fn entries(rt: &Runtime, dir: usize) -> Vec<(usize, usize)> {
   let (mut at, end) = object::body(rt, dir);
   let mut found = Vec::new();

   while at < end {
      let name = at;
      let value = object::skip(rt, name);
      if value >= end {
         break;
      }

      found.push((name, value));
      at = object::skip(rt, value);
   }

   found
}

/// Finds a name inside this directory, returning the offset of the stored
/// name object.
#[must_use]
pub fn lookup(rt: &Runtime, dir: usize, name: usize) -> Option<usize> {
   let name_ty = object::id(rt, name);

   for (stored, _) in entries(rt, dir) {
      if stored == name {
         return Some(stored);
      }

      let stored_ty = object::id(rt, stored);
      let found = if name_ty == Id::Symbol && stored_ty == Id::Symbol {
         symbol::compare(rt, stored, name).is_eq()
      } else {
         stored_ty == name_ty && object::same(rt, stored, name)
      };

      if found {
         return Some(stored);
      }
   }

   None
}

/// The value stored under a name in this directory.
#[must_use]
pub fn recall(rt: &Runtime, dir: usize, name: usize) -> Option<usize> {
   lookup(rt, dir, name).map(|stored| object::skip(rt, stored))
}

/// Classifies a prospective variable name, routing settings and rejecting
/// anything unusable.
fn check_name(rt: &mut Runtime, name: usize) -> Result<Id> {
   let ty = object::id(rt, name);

   match ty {
      Id::Symbol => Ok(ty),
      ty if ty.is_reserved_name() => Ok(ty),
      ty if ty.is_setting() => Ok(ty),
      Id::Integer if rt.settings.numbered_variables => Ok(ty),

      _ => rt.invalid_name_error().err(),
   }
}

/// Stores `value` under `name` in the given directory, replacing any
/// existing entry. The directory must be on the active path.
pub fn store(rt: &mut Runtime, dir: usize, name: usize, value: usize) -> Result {
   let name = object::as_quoted(rt, name).unwrap_or(name);

   let ty = check_name(rt, name)?;
   if ty.is_setting() {
      return settings::store(rt, ty, value);
   }

   let dir = rt.protect(dir);
   let name = rt.protect(name);
   let value = rt.protect(value);
   let value_size = object::size(rt, value.get());

   let delta;
   if let Some(existing) = lookup(rt, dir.get(), name.get()) {
      let old_value = object::skip(rt, existing);
      let old_size = object::size(rt, old_value);

      if value_size > old_size && rt.available(value_size - old_size) < value_size - old_size {
         return Err(crate::Failed);
      }

      // Anything on the stack still pointing at the old value keeps a copy.
      rt.unshare_global(old_value, old_size)?;

      if value_size != old_size {
         rt.move_globals(old_value + value_size, old_value + old_size);
      }

      let source = value.get();
      rt.bytes_mut()
         .copy_within(source..source + value_size, old_value);

      delta = value_size as isize - old_size as isize;
   } else {
      let name_size = object::size(rt, name.get());
      let grown = name_size + value_size;

      if rt.available(grown) < grown {
         return Err(crate::Failed);
      }

      let (body_start, body_end) = object::body(rt, dir.get());
      let insert = if rt.settings.store_at_end {
         body_end
      } else {
         body_start
      };

      rt.move_globals(insert + grown, insert);

      let source = name.get();
      rt.bytes_mut().copy_within(source..source + name_size, insert);
      let source = value.get();
      rt.bytes_mut()
         .copy_within(source..source + value_size, insert + name_size);

      delta = grown as isize;
   }

   adjust_sizes(rt, dir.get(), delta);
   tracing::debug!(target: "rpl::directory", delta, "store");
   Ok(())
}

/// Updates a name wherever it already exists on the active path. Returns
/// whether a binding was found.
pub fn update(rt: &mut Runtime, name: usize, value: usize) -> Result<bool> {
   let name = object::as_quoted(rt, name).unwrap_or(name);

   for depth in 0..rt.path_len() {
      let dir = rt.variables(depth).expect("depth is on the path");

      if lookup(rt, dir, name).is_some() {
         store(rt, dir, name, value)?;
         return Ok(true);
      }
   }

   Ok(false)
}

/// Recalls a name: settings pseudo-variables first, then the directory
/// path from the current directory up to the root.
pub fn recall_all(rt: &mut Runtime, name: usize, report_missing: bool) -> Result<Option<usize>> {
   let name = object::as_quoted(rt, name).unwrap_or(name);
   let ty = object::id(rt, name);

   if ty.is_setting() {
      return settings::recall(rt, ty).map(Some);
   }

   if ty != Id::Symbol && !ty.is_reserved_name() && !(ty == Id::Integer && rt.settings.numbered_variables) {
      return rt.invalid_name_error().err();
   }

   for depth in 0..rt.path_len() {
      let dir = rt.variables(depth).expect("depth is on the path");

      if let Some(value) = recall(rt, dir, name) {
         return Ok(Some(value));
      }
   }

   if report_missing {
      return rt.undefined_name_error().err();
   }

   Ok(None)
}

/// Purges a name from the given directory. Returns the number of bytes
/// reclaimed; purging an absent name is zero, not an error.
pub fn purge(rt: &mut Runtime, dir: usize, name: usize) -> Result<usize> {
   let name = object::as_quoted(rt, name).unwrap_or(name);

   let ty = check_name(rt, name)?;
   if ty.is_setting() {
      settings::purge(rt, ty)?;
      return Ok(0);
   }

   let dir = rt.protect(dir);

   let Some(stored) = lookup(rt, dir.get(), name) else {
      return Ok(0);
   };

   let value = object::skip(rt, stored);
   if rt.is_active_directory(value) {
      return rt.purge_active_directory_error().err();
   }

   let purged = object::size(rt, stored) + object::size(rt, value);

   rt.unshare_global(stored, purged)?;
   rt.move_globals(stored, stored + purged);
   adjust_sizes(rt, dir.get(), -(purged as isize));

   tracing::debug!(target: "rpl::directory", purged, "purge");
   Ok(purged)
}

/// Fixes up the length field of the mutated directory and of every
/// directory enclosing it on the active path.
fn adjust_sizes(rt: &mut Runtime, dir: usize, mut delta: isize) {
   let mut found = false;

   for depth in 0..rt.path_len() {
      let Some(current) = rt.variables(depth) else {
         break;
      };

      if current == dir {
         found = true;
      }
      if !found {
         continue;
      }

      let header = object::payload(rt, current);
      let (old_len, old_width) = leb128::read(rt.bytes(), header);
      let new_len = (old_len as isize + delta) as u64;
      let new_width = leb128::size(new_len);

      if new_width != old_width {
         rt.move_globals(header + new_width, header + old_width);
         delta += new_width as isize - old_width as isize;
      }

      let bytes = rt.bytes_mut();
      leb128::write(bytes, header, new_len);
   }
}

/// Creates an empty directory under the given name in the current
/// directory.
pub fn create(rt: &mut Runtime, name: usize) -> Result {
   let name = rt.protect(name);
   let empty = rt.make(&object::wrap(Id::Directory, &[]))?;

   let current = rt.variables(0).expect("the path always has a root");
   store(rt, current, name.get(), empty)
}

/// Evaluating a directory on the active path enters it; a loose directory
/// object is just data.
pub fn evaluate(rt: &mut Runtime, obj: usize) -> Result {
   if obj < rt.globals_end() {
      rt.enter(obj)
   } else {
      rt.push(obj)
   }
}

/// Parses the `Directory { name value … }` textual form.
pub fn parse(rt: &mut Runtime, p: &mut Parser) -> Result<Parsed> {
   const LABEL: &str = "directory";

   let start = p.offset;
   let matched = p
      .rest()
      .get(..LABEL.len())
      .is_some_and(|word| word.eq_ignore_ascii_case(LABEL));
   if !matched || !is_word_boundary(p.source, start + LABEL.len()) {
      return Ok(Parsed::Skip);
   }

   p.offset += LABEL.len();
   p.skip_whitespace();

   if p.peek() != Some('{') {
      return rt
         .malformed_directory_error()
         .source(p.span(start, p.offset))
         .err();
   }

   let body = parse::object(rt, p)?;

   // The body parses as a list; its payload must alternate names with
   // values.
   let mut count = 0_usize;
   for item in super::list::items(rt, body) {
      if count % 2 == 0 {
         let ty = object::id(rt, item);
         if ty != Id::Symbol && !ty.is_reserved_name() {
            return rt
               .malformed_directory_error()
               .source(p.span(start, p.offset))
               .err();
         }
      }
      count += 1;
   }

   if count % 2 != 0 {
      return rt
         .malformed_directory_error()
         .source(p.span(start, p.offset))
         .err();
   }

   let (body_start, body_end) = object::body(rt, body);
   let image = object::wrap(Id::Directory, &rt.bytes()[body_start..body_end].to_vec());
   Ok(Parsed::Done(rt.make(&image)?))
}

pub fn render(rt: &Runtime, obj: usize, r: &mut Renderer) {
   r.put("Directory {");
   r.indent();

   for (name, value) in entries(rt, obj) {
      r.cr();
      render::render(rt, name, r);
      r.space();
      render::render(rt, value, r);
   }

   r.unindent();
   r.cr();
   r.put("}");
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::value::number;

   fn name(rt: &mut Runtime, text: &str) -> usize {
      symbol::make(rt, text).expect("make symbol")
   }

   fn store_number(rt: &mut Runtime, dir: usize, text: &str, value: u64) {
      let name = name(rt, text);
      let name = rt.protect(name);
      let value = number::make_integer(rt, value).expect("make value");
      store(rt, dir, name.get(), value).expect("store");
   }

   #[test]
   fn store_then_recall() {
      let mut rt = Runtime::new();
      let root = rt.variables(0).expect("root");

      store_number(&mut rt, root, "X", 42);

      let root = rt.variables(0).expect("root");
      let x = name(&mut rt, "X");
      let value = recall(&rt, root, x).expect("recall");
      assert_eq!(number::integer_value(&rt, value), Some(42));
   }

   #[test]
   fn store_replaces_and_shrinks() {
      let mut rt = Runtime::new();
      let root = rt.variables(0).expect("root");

      store_number(&mut rt, root, "X", u64::MAX);
      store_number(&mut rt, root, "X", 1);

      let root = rt.variables(0).expect("root");
      assert_eq!(entries(&rt, root).len(), 1);

      let x = name(&mut rt, "X");
      let value = recall(&rt, root, x).expect("recall");
      assert_eq!(number::integer_value(&rt, value), Some(1));
   }

   #[test]
   fn lookup_ignores_case_by_default() {
      let mut rt = Runtime::new();
      let root = rt.variables(0).expect("root");

      store_number(&mut rt, root, "Speed", 9);

      let root = rt.variables(0).expect("root");
      let lower = name(&mut rt, "speed");
      assert!(recall(&rt, root, lower).is_some());
   }

   #[test]
   fn purge_is_idempotent() {
      let mut rt = Runtime::new();
      let root = rt.variables(0).expect("root");

      store_number(&mut rt, root, "X", 5);

      let x = name(&mut rt, "X");
      let x = rt.protect(x);
      let root = rt.variables(0).expect("root");

      let first = purge(&mut rt, root, x.get()).expect("purge");
      assert!(first > 0);

      let root = rt.variables(0).expect("root");
      let second = purge(&mut rt, root, x.get()).expect("purge again");
      assert_eq!(second, 0);
   }

   #[test]
   fn nested_store_shadows_and_restores() {
      let mut rt = Runtime::new();
      let root = rt.variables(0).expect("root");

      // 2 'X' STO, then a subdirectory D with its own X.
      store_number(&mut rt, root, "X", 2);

      let d = name(&mut rt, "D");
      create(&mut rt, d).expect("crdir");

      let root = rt.variables(0).expect("root");
      let d = name(&mut rt, "D");
      let subdir = recall(&rt, root, d).expect("subdir exists");
      rt.enter(subdir).expect("enter");

      let current = rt.variables(0).expect("current");
      store_number(&mut rt, current, "X", 3);

      let x = name(&mut rt, "X");
      let found = recall_all(&mut rt, x, true).expect("recall").expect("found");
      assert_eq!(number::integer_value(&rt, found), Some(3));

      rt.updir();
      let x = name(&mut rt, "X");
      let found = recall_all(&mut rt, x, true).expect("recall").expect("found");
      assert_eq!(number::integer_value(&rt, found), Some(2));

      let root = rt.variables(0).expect("root");
      let x = name(&mut rt, "X");
      let x = rt.protect(x);
      purge(&mut rt, root, x.get()).expect("purge");

      let result = recall_all(&mut rt, x.get(), true);
      assert!(result.is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::UndefinedName)
      );
   }

   #[test]
   fn purging_the_active_directory_is_refused() {
      let mut rt = Runtime::new();

      let d = name(&mut rt, "D");
      create(&mut rt, d).expect("crdir");

      let root = rt.variables(0).expect("root");
      let d = name(&mut rt, "D");
      let subdir = recall(&rt, root, d).expect("subdir");
      rt.enter(subdir).expect("enter");

      let root = rt.variables(1).expect("root");
      let d = name(&mut rt, "D");
      let d = rt.protect(d);
      assert!(purge(&mut rt, root, d.get()).is_err());
      assert_eq!(
         rt.error().map(|error| error.kind.clone()),
         Some(crate::ErrorKind::PurgeActiveDirectory)
      );
   }
}
