//! The object file format: a four-byte magic number followed by one
//! object in its in-memory encoding. Reading validates the whole structure
//! before anything reaches the arena; where the bytes come from or go to is
//! the embedder's business.

use crate::{
   Result,
   Runtime,
   object,
};

/// The magic prefix written on save.
pub const MAGIC: [u8; 4] = [0xDB, 0x48, 0x17, 0x02];

/// An alternate prefix accepted on load, for files from the wide-screen
/// target.
pub const MAGIC_ALTERNATE: [u8; 4] = [0xDB, 0x50, 0x19, 0x69];

/// Encodes one object for storage.
#[must_use]
pub fn save(rt: &Runtime, obj: usize) -> Vec<u8> {
   let mut out = Vec::with_capacity(4 + object::size(rt, obj));
   out.extend_from_slice(&MAGIC);
   out.extend_from_slice(&object::image(rt, obj));
   out
}

/// Decodes a stored object into temporaries, validating the magic number
/// and the full encoding.
pub fn load(rt: &mut Runtime, bytes: &[u8]) -> Result<usize> {
   let Some((magic, body)) = bytes.split_at_checked(4) else {
      return rt.type_error().err();
   };

   if magic != MAGIC.as_slice() && magic != MAGIC_ALTERNATE.as_slice() {
      return rt.type_error().err();
   }
   if body.is_empty() {
      return rt.type_error().err();
   }

   let obj = rt.make(body)?;

   if !object::well_formed(rt, obj, obj + body.len()) {
      return rt.type_error().err();
   }

   Ok(obj)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{
      eval,
      render,
   };

   #[test]
   fn objects_survive_the_trip() {
      let mut rt = Runtime::new();

      eval::run_source(&mut rt, "{ 1 'a+b' \"x\" « 2 3 + » }").expect("run");
      let obj = rt.top().expect("top");

      let stored = save(&rt, obj);
      let loaded = load(&mut rt, &stored).expect("load");

      let obj = rt.top().expect("top");
      assert!(object::same(&rt, obj, loaded));
      assert_eq!(render::to_text(&rt, obj), render::to_text(&rt, loaded));
   }

   #[test]
   fn directories_are_the_usual_payload() {
      let mut rt = Runtime::new();

      eval::run_source(&mut rt, "5 'X' Sto").expect("run");
      let root = rt.variables(0).expect("root");

      let stored = save(&rt, root);
      assert_eq!(&stored[..4], MAGIC.as_slice());

      let loaded = load(&mut rt, &stored).expect("load");
      let root = rt.variables(0).expect("root");
      assert!(object::same(&rt, root, loaded));
   }

   #[test]
   fn bad_magic_is_rejected() {
      let mut rt = Runtime::new();

      assert!(load(&mut rt, b"RPLX\x02").is_err());
   }

   #[test]
   fn torn_payloads_are_rejected() {
      let mut rt = Runtime::new();

      eval::run_source(&mut rt, "{ 1 2 3 }").expect("run");
      let obj = rt.top().expect("top");

      let mut stored = save(&rt, obj);
      stored.truncate(stored.len() - 1);

      rt.clear_error();
      assert!(load(&mut rt, &stored).is_err());
   }
}
