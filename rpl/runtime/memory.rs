//! The runtime memory: one contiguous arena holding every region, plus the
//! precise compacting garbage collector that keeps references valid across
//! allocation.
//!
//! Layout, low addresses to high:
//!
//! ```text
//! [ globals | temporaries | editor | locals | free | data ↓ | returns ↓ | directories ]
//! ```
//!
//! Objects live in globals and temporaries. The editor holds the UTF-8 text
//! being edited, the locals region the values of active loop variables. The
//! three stacks at the top store 8-byte little-endian object offsets; the
//! data stack slides down one slot whenever the return or directory stack
//! grows, so free space is always the single gap between the locals end and
//! the data stack top.

use std::{
   cell::Cell,
   rc::Rc,
   sync::{
      Arc,
      atomic::{
         AtomicBool,
         Ordering,
      },
   },
   time::Instant,
};

use crate::{
   Error,
   Id,
   Result,
   Settings,
   eval::Stepping,
   leb128,
   object,
};

/// Default arena size, sized like the reference hardware's working memory.
pub const DEFAULT_HEAP: usize = 70 * 1024;

const WORD: usize = 8;
const RETURN_ENTRY: usize = 2 * WORD;

/// A protected reference: keeps an object reachable and is rewritten to the
/// object's new position whenever the collector or a directory mutation
/// moves it. Dropping the handle releases the root on every exit path.
#[derive(Debug, Clone)]
pub struct GcObj {
   slot: Rc<Cell<usize>>,
}

impl GcObj {
   /// The object's current offset.
   #[must_use]
   pub fn get(&self) -> usize {
      self.slot.get()
   }
}

enum Slot {
   /// An arena word holding an object offset.
   Word(usize),
   /// An arena word holding a range end, owned by the return stack.
   WordEnd(usize),
   Root(Rc<Cell<usize>>),
}

pub struct Runtime {
   arena: Box<[u8]>,

   globals:     usize,
   temporaries: usize,
   editing:     usize,
   locals_len:  usize,
   stack:       usize,
   returns:     usize,
   directories: usize,

   roots:     Vec<Rc<Cell<usize>>>,
   last_args: Vec<Rc<Cell<usize>>>,

   error:    Option<Error>,
   caught:   Option<Error>,
   handling: bool,

   pub(crate) halted:       bool,
   pub(crate) halt_request: Option<bool>,
   pub(crate) stepping:     Stepping,
   interrupt: Arc<AtomicBool>,

   pub settings: Settings,

   started:   Instant,
   gc_cycles: usize,
   gc_purged: usize,
}

impl Default for Runtime {
   fn default() -> Self {
      Self::new()
   }
}

impl Runtime {
   #[must_use]
   pub fn new() -> Self {
      Self::with_heap(DEFAULT_HEAP)
   }

   /// Creates a runtime with the given arena size in bytes.
   #[must_use]
   pub fn with_heap(size: usize) -> Self {
      let size = size.max(1024) & !(WORD - 1);
      let mut arena = vec![0_u8; size].into_boxed_slice();

      // The root directory is the only object present at boot.
      let mut globals = leb128::write(&mut arena, 0, Id::Directory as u64);
      globals += leb128::write(&mut arena, globals, 0);

      let mut rt = Self {
         arena,

         globals,
         temporaries: globals,
         editing: 0,
         locals_len: 0,
         stack: size - WORD,
         returns: size - WORD,
         directories: size - WORD,

         roots: Vec::new(),
         last_args: Vec::new(),

         error: None,
         caught: None,
         handling: false,

         halted: false,
         halt_request: None,
         stepping: Stepping::None,
         interrupt: Arc::new(AtomicBool::new(false)),

         settings: Settings::default(),

         started: Instant::now(),
         gc_cycles: 0,
         gc_purged: 0,
      };

      rt.set_word(size - WORD, 0);
      rt
   }

   // Raw arena access.

   #[must_use]
   pub(crate) fn bytes(&self) -> &[u8] {
      &self.arena
   }

   pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
      &mut self.arena
   }

   #[must_use]
   pub(crate) fn word_at(&self, offset: usize) -> usize {
      let mut raw = [0_u8; WORD];
      raw.copy_from_slice(&self.arena[offset..offset + WORD]);
      u64::from_le_bytes(raw) as usize
   }

   pub(crate) fn set_word(&mut self, offset: usize, value: usize) {
      self.arena[offset..offset + WORD].copy_from_slice(&(value as u64).to_le_bytes());
   }

   // Region queries.

   /// End of the globals region; also where temporaries start.
   #[must_use]
   pub fn globals_end(&self) -> usize {
      self.globals
   }

   /// End of the temporaries region; also where the editor starts.
   #[must_use]
   pub fn temporaries_end(&self) -> usize {
      self.temporaries
   }

   fn locals_base(&self) -> usize {
      self.temporaries + self.editing
   }

   fn locals_end(&self) -> usize {
      self.locals_base() + self.locals_len
   }

   /// The free gap between the locals end and the data stack top.
   #[must_use]
   pub fn free(&self) -> usize {
      self.stack - self.locals_end()
   }

   /// The arena size; region sizes plus free space always add up to it.
   #[must_use]
   pub fn heap_size(&self) -> usize {
      self.arena.len()
   }

   /// Checks that `wanted` bytes can be carved from free space, collecting
   /// garbage if needed. Returns the available amount, which is smaller than
   /// `wanted` only if the out-of-memory error was raised.
   pub fn available(&mut self, wanted: usize) -> usize {
      if self.free() < wanted {
         self.gc();

         if self.free() < wanted {
            self.out_of_memory_error();
         }
      }

      self.free()
   }

   pub(crate) fn reserve(&mut self, wanted: usize) -> Result {
      if self.available(wanted) < wanted {
         return Err(crate::Failed);
      }

      Ok(())
   }

   /// Bump-allocates `size` bytes of temporaries, returning their offset.
   /// May collect garbage; raw offsets held across this call are invalid
   /// unless protected.
   pub fn allocate(&mut self, size: usize) -> Result<usize> {
      self.reserve(size)?;

      let at = self.temporaries;
      let tail = self.locals_end();
      self.arena.copy_within(at..tail, at + size);
      self.temporaries += size;

      tracing::trace!(target: "rpl::memory", size, at, "allocate");
      Ok(at)
   }

   /// Allocates a fully assembled object image and returns its offset.
   pub fn make(&mut self, image: &[u8]) -> Result<usize> {
      let at = self.allocate(image.len())?;
      self.arena[at..at + image.len()].copy_from_slice(image);
      Ok(at)
   }

   /// Re-allocates an object into fresh temporaries.
   pub fn clone_object(&mut self, obj: usize) -> Result<usize> {
      let obj = self.protect(obj);
      let size = object::size(self, obj.get());
      let at = self.allocate(size)?;

      self.arena.copy_within(obj.get()..obj.get() + size, at);
      Ok(at)
   }

   // Protected references.

   /// Registers an offset with the collector's root list. Roots are pruned
   /// in LIFO order as their handles drop.
   #[must_use]
   pub fn protect(&mut self, obj: usize) -> GcObj {
      let slot = Rc::new(Cell::new(obj));
      self.roots.push(Rc::clone(&slot));

      GcObj { slot }
   }

   fn slots(&self) -> Vec<Slot> {
      let mut slots = Vec::new();

      let mut at = self.stack;
      while at < self.returns {
         slots.push(Slot::Word(at));
         at += WORD;
      }

      while at < self.directories {
         slots.push(Slot::Word(at));
         slots.push(Slot::WordEnd(at + WORD));
         at += RETURN_ENTRY;
      }

      while at < self.arena.len() {
         slots.push(Slot::Word(at));
         at += WORD;
      }

      let base = self.locals_base();
      for index in 0..self.locals_len / WORD {
         slots.push(Slot::Word(base + index * WORD));
      }

      for root in self.roots.iter().chain(&self.last_args) {
         slots.push(Slot::Root(Rc::clone(root)));
      }

      slots
   }

   fn slot_get(&self, slot: &Slot) -> usize {
      match *slot {
         Slot::Word(at) | Slot::WordEnd(at) => self.word_at(at),
         Slot::Root(ref cell) => cell.get(),
      }
   }

   fn slot_set(&mut self, slot: &Slot, value: usize) {
      match *slot {
         Slot::Word(at) | Slot::WordEnd(at) => self.set_word(at, value),
         Slot::Root(ref cell) => cell.set(value),
      }
   }

   fn slot_hits(&self, slot: &Slot, start: usize, end: usize) -> bool {
      let value = self.slot_get(slot);

      match *slot {
         // A range end sits one past the content it refers to.
         Slot::WordEnd(_) => value > start && value <= end,
         _ => value >= start && value < end,
      }
   }

   /// Runs a compacting collection over the temporaries region and returns
   /// the number of bytes reclaimed.
   pub fn gc(&mut self) -> usize {
      self.roots.retain(|slot| Rc::strong_count(slot) > 1);

      let slots = self.slots();
      let mut scan = self.globals;
      let mut delta = 0_usize;

      while scan < self.temporaries {
         let size = object::size(self, scan);
         let live = slots
            .iter()
            .any(|slot| self.slot_hits(slot, scan, scan + size));

         if live {
            if delta > 0 {
               self.arena.copy_within(scan..scan + size, scan - delta);

               for slot in &slots {
                  if self.slot_hits(slot, scan, scan + size) {
                     let value = self.slot_get(slot);
                     self.slot_set(slot, value - delta);
                  }
               }
            }
         } else {
            delta += size;
         }

         scan += size;
      }

      if delta > 0 {
         let tail = self.locals_end();
         self
            .arena
            .copy_within(self.temporaries..tail, self.temporaries - delta);
         self.temporaries -= delta;
      }

      self.gc_cycles += 1;
      self.gc_purged += delta;
      tracing::debug!(target: "rpl::gc", freed = delta, cycles = self.gc_cycles, "collected");

      delta
   }

   /// Collection statistics: cycles run and bytes reclaimed so far.
   #[must_use]
   pub fn gc_stats(&self) -> (usize, usize) {
      (self.gc_cycles, self.gc_purged)
   }

   /// Moves everything in `[src, locals end)` so that it starts at `dst`,
   /// updating the region boundaries and every reference at or above `src`.
   /// Used by directory mutation; `src` and `dst` lie inside the globals
   /// region. Growth must have been checked by the caller.
   pub(crate) fn move_globals(&mut self, dst: usize, src: usize) {
      if dst == src {
         return;
      }

      let tail = self.locals_end();
      self.arena.copy_within(src..tail, dst);

      let slots = self.slots();
      for slot in &slots {
         let value = self.slot_get(slot);
         let moved = match *slot {
            Slot::WordEnd(_) => value > src,
            _ => value >= src,
         };

         if moved {
            self.slot_set(slot, value + dst - src);
         }
      }

      let delta = dst.wrapping_sub(src);
      self.globals = self.globals.wrapping_add(delta);
      self.temporaries = self.temporaries.wrapping_add(delta);

      tracing::trace!(target: "rpl::memory", src, dst, "move globals");
   }

   /// Clones a globals-resident byte range into temporaries if the data
   /// stack still refers into it, repointing those references. Called before
   /// a store or purge overwrites the range.
   pub(crate) fn unshare_global(&mut self, start: usize, len: usize) -> Result {
      let referenced = (0..self.depth()).any(|level| {
         let value = self.word_at(self.stack + level * WORD);
         value >= start && value < start + len
      });

      if !referenced {
         return Ok(());
      }

      let at = self.allocate(len)?;
      self.arena.copy_within(start..start + len, at);

      for level in 0..self.depth() {
         let slot = self.stack + level * WORD;
         let value = self.word_at(slot);

         if value >= start && value < start + len {
            self.set_word(slot, at + value - start);
         }
      }

      Ok(())
   }

   // The data stack.

   /// Number of objects on the data stack.
   #[must_use]
   pub fn depth(&self) -> usize {
      (self.returns - self.stack) / WORD
   }

   pub fn push(&mut self, obj: usize) -> Result {
      let obj = if self.free() < WORD {
         // Collecting to make room must not sweep the object being pushed.
         let guard = self.protect(obj);
         self.reserve(WORD)?;
         guard.get()
      } else {
         obj
      };

      self.stack -= WORD;
      self.set_word(self.stack, obj);
      Ok(())
   }

   pub fn pop(&mut self) -> Result<usize> {
      if self.depth() == 0 {
         return self.missing_argument_error().err();
      }

      let obj = self.word_at(self.stack);
      self.stack += WORD;
      Ok(obj)
   }

   pub fn top(&mut self) -> Result<usize> {
      self.stack_at(0)
   }

   /// The object at the given level, level 0 being the top.
   pub fn stack_at(&mut self, level: usize) -> Result<usize> {
      if level >= self.depth() {
         return self.missing_argument_error().err();
      }

      Ok(self.word_at(self.stack + level * WORD))
   }

   /// Overwrites the object at the given level.
   pub fn stack_set(&mut self, level: usize, obj: usize) -> Result {
      if level >= self.depth() {
         return self.missing_argument_error().err();
      }

      self.set_word(self.stack + level * WORD, obj);
      Ok(())
   }

   pub fn drop_n(&mut self, count: usize) -> Result {
      if count > self.depth() {
         return self.missing_argument_error().err();
      }

      self.stack += count * WORD;
      Ok(())
   }

   /// Moves the object at level `count - 1` to the top.
   pub fn roll(&mut self, count: usize) -> Result {
      if count == 0 {
         return Ok(());
      }
      if count > self.depth() {
         return self.missing_argument_error().err();
      }

      let lifted = self.word_at(self.stack + (count - 1) * WORD);
      self
         .arena
         .copy_within(self.stack..self.stack + (count - 1) * WORD, self.stack + WORD);
      self.set_word(self.stack, lifted);
      Ok(())
   }

   /// Moves the top object down to level `count - 1`.
   pub fn rolld(&mut self, count: usize) -> Result {
      if count == 0 {
         return Ok(());
      }
      if count > self.depth() {
         return self.missing_argument_error().err();
      }

      let buried = self.word_at(self.stack);
      self
         .arena
         .copy_within(self.stack + WORD..self.stack + count * WORD, self.stack);
      self.set_word(self.stack + (count - 1) * WORD, buried);
      Ok(())
   }

   /// Verifies that `count` operands are present, snapshotting them for
   /// `LastArg` when the setting is on.
   pub fn args(&mut self, count: usize) -> Result {
      if count > self.depth() {
         return self.missing_argument_error().err();
      }

      if self.settings.save_last_arguments {
         self.last_args.clear();

         for level in (0..count).rev() {
            let obj = self.word_at(self.stack + level * WORD);
            self.last_args.push(Rc::new(Cell::new(obj)));
         }
      }

      Ok(())
   }

   /// Pushes the last snapshotted arguments back, deepest first.
   pub fn push_last_args(&mut self) -> Result {
      for index in 0..self.last_args.len() {
         let obj = self.last_args[index].get();
         self.push(obj)?;
      }

      Ok(())
   }

   // The return stack: deferred evaluation ranges.

   /// Number of pending ranges.
   #[must_use]
   pub fn run_depth(&self) -> usize {
      (self.directories - self.returns) / RETURN_ENTRY
   }

   /// Defers evaluation of the objects in `[pc, end)`.
   pub fn run_push(&mut self, pc: usize, end: usize) -> Result {
      let (pc, end) = if self.free() < RETURN_ENTRY {
         if pc >= end {
            // An exhausted range carries no information worth relocating.
            self.reserve(RETURN_ENTRY)?;
            (0, 0)
         } else {
            // Both bounds must survive the collection making room; the end
            // bound is held through the last byte it covers.
            let pc = self.protect(pc);
            let last = self.protect(end - 1);
            self.reserve(RETURN_ENTRY)?;
            (pc.get(), last.get() + 1)
         }
      } else {
         (pc, end)
      };

      self
         .arena
         .copy_within(self.stack..self.returns, self.stack - RETURN_ENTRY);
      self.stack -= RETURN_ENTRY;
      self.returns -= RETURN_ENTRY;

      self.set_word(self.returns, pc);
      self.set_word(self.returns + WORD, end);
      Ok(())
   }

   /// Pops the most recently deferred range.
   pub fn run_pop(&mut self) -> Option<(usize, usize)> {
      if self.run_depth() == 0 {
         return None;
      }

      let pc = self.word_at(self.returns);
      let end = self.word_at(self.returns + WORD);

      self
         .arena
         .copy_within(self.stack..self.returns, self.stack + RETURN_ENTRY);
      self.stack += RETURN_ENTRY;
      self.returns += RETURN_ENTRY;

      Some((pc, end))
   }

   /// The most recently deferred range, if any.
   #[must_use]
   pub fn run_peek(&self) -> Option<(usize, usize)> {
      if self.run_depth() == 0 {
         return None;
      }

      Some((self.word_at(self.returns), self.word_at(self.returns + WORD)))
   }

   /// Rewrites the most recently deferred range.
   pub fn run_set_top(&mut self, pc: usize, end: usize) {
      debug_assert!(self.run_depth() > 0);

      self.set_word(self.returns, pc);
      self.set_word(self.returns + WORD, end);
   }

   /// Drops every pending range at or above `depth`.
   pub fn run_unwind(&mut self, depth: usize) {
      while self.run_depth() > depth {
         self.run_pop();
      }
   }

   // The directory stack: the path from the root to the current directory.

   /// The directory at the given depth; depth 0 is the current directory,
   /// the highest valid depth is the root.
   #[must_use]
   pub fn variables(&self, depth: usize) -> Option<usize> {
      if depth >= self.path_len() {
         return None;
      }

      Some(self.word_at(self.directories + depth * WORD))
   }

   /// Number of directories on the path, root included.
   #[must_use]
   pub fn path_len(&self) -> usize {
      (self.arena.len() - self.directories) / WORD
   }

   /// Makes the given directory current.
   pub fn enter(&mut self, dir: usize) -> Result {
      let dir = if self.free() < WORD {
         let guard = self.protect(dir);
         self.reserve(WORD)?;
         guard.get()
      } else {
         dir
      };

      self
         .arena
         .copy_within(self.stack..self.directories, self.stack - WORD);
      self.stack -= WORD;
      self.returns -= WORD;
      self.directories -= WORD;

      self.set_word(self.directories, dir);
      Ok(())
   }

   /// Leaves the current directory; a no-op at the root.
   pub fn updir(&mut self) {
      if self.path_len() <= 1 {
         return;
      }

      self
         .arena
         .copy_within(self.stack..self.directories, self.stack + WORD);
      self.stack += WORD;
      self.returns += WORD;
      self.directories += WORD;
   }

   /// Returns to the root directory.
   pub fn home(&mut self) {
      while self.path_len() > 1 {
         self.updir();
      }
   }

   /// Whether the given offset is a directory on the active path.
   #[must_use]
   pub fn is_active_directory(&self, obj: usize) -> bool {
      (0..self.path_len()).any(|depth| self.variables(depth) == Some(obj))
   }

   // The locals region: loop variable values, innermost last.

   /// Number of active locals.
   #[must_use]
   pub fn locals(&self) -> usize {
      self.locals_len / WORD
   }

   /// Pushes values for a new scope; the last pushed is index 0.
   pub fn push_locals(&mut self, values: &[usize]) -> Result {
      let needed = values.len() * WORD;

      if self.free() < needed {
         let guards: Vec<GcObj> = values.iter().map(|&value| self.protect(value)).collect();
         self.reserve(needed)?;

         for guard in &guards {
            let at = self.locals_end();
            self.locals_len += WORD;
            self.set_word(at, guard.get());
         }

         return Ok(());
      }

      for &value in values {
         let at = self.locals_end();
         self.locals_len += WORD;
         self.set_word(at, value);
      }

      Ok(())
   }

   /// Drops the innermost `count` locals.
   pub fn pop_locals(&mut self, count: usize) {
      self.locals_len = self.locals_len.saturating_sub(count * WORD);
   }

   /// The local at the given index, 0 being the innermost.
   pub fn local(&mut self, index: usize) -> Result<usize> {
      if index >= self.locals() {
         return self.undefined_name_error().err();
      }

      Ok(self.word_at(self.locals_end() - (index + 1) * WORD))
   }

   /// Rebinds the local at the given index.
   pub fn local_set(&mut self, index: usize, value: usize) -> Result {
      if index >= self.locals() {
         return self.undefined_name_error().err();
      }

      let at = self.locals_end() - (index + 1) * WORD;
      self.set_word(at, value);
      Ok(())
   }

   // The editor scratchpad.

   /// The text currently being edited.
   #[must_use]
   pub fn editor(&self) -> &[u8] {
      &self.arena[self.temporaries..self.temporaries + self.editing]
   }

   /// Length of the text currently being edited.
   #[must_use]
   pub fn editing(&self) -> usize {
      self.editing
   }

   /// Replaces the editor content.
   pub fn editor_set(&mut self, text: &str) -> Result {
      self.editor_remove(0, self.editing);
      self.editor_insert(0, text.as_bytes())
   }

   /// Inserts bytes at the given editor offset.
   pub fn editor_insert(&mut self, offset: usize, bytes: &[u8]) -> Result {
      let offset = offset.min(self.editing);
      self.reserve(bytes.len())?;

      let at = self.temporaries + offset;
      let tail = self.locals_end();
      self.arena.copy_within(at..tail, at + bytes.len());
      self.editing += bytes.len();
      self.arena[at..at + bytes.len()].copy_from_slice(bytes);
      Ok(())
   }

   /// Removes a byte range from the editor.
   pub fn editor_remove(&mut self, offset: usize, len: usize) {
      let offset = offset.min(self.editing);
      let len = len.min(self.editing - offset);

      let at = self.temporaries + offset;
      let tail = self.locals_end();
      self.arena.copy_within(at + len..tail, at);
      self.editing -= len;
   }

   /// Commits and clears the editor, returning its content.
   pub fn close_editor(&mut self) -> String {
      let text = String::from_utf8_lossy(self.editor()).into_owned();
      self.editor_remove(0, self.editing);
      text
   }

   // The error slot.

   /// The deposited error, if any.
   #[must_use]
   pub fn error(&self) -> Option<&Error> {
      self.error.as_ref()
   }

   pub fn clear_error(&mut self) {
      self.error = None;
   }

   /// Moves the current error aside for `errm`, clearing the slot. Used when
   /// an error handler catches; the handler marker picks up the flag.
   pub(crate) fn catch_error(&mut self) {
      self.caught = self.error.take();
      self.handling = true;
   }

   /// Whether an error handler is being entered; reading clears the flag.
   pub(crate) fn take_handling(&mut self) -> bool {
      std::mem::take(&mut self.handling)
   }

   /// The last caught error, for the `errm` command.
   #[must_use]
   pub fn caught(&self) -> Option<&Error> {
      self.caught.as_ref()
   }

   pub fn clear_caught(&mut self) {
      self.caught = None;
   }

   pub(crate) fn error_slot_mut(&mut self) -> Option<&mut Error> {
      self.error.as_mut()
   }

   pub(crate) fn set_error_slot(&mut self, error: Option<Error>) {
      self.error = error;
   }

   // Debugger state.

   /// Whether evaluation is suspended between two deferred objects.
   #[must_use]
   pub fn halted(&self) -> bool {
      self.halted
   }

   /// The current stepper pacing.
   #[must_use]
   pub fn stepping(&self) -> Stepping {
      self.stepping
   }

   // Cooperative interruption.

   /// A flag the embedder may set from another thread to request an abort.
   #[must_use]
   pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
      Arc::clone(&self.interrupt)
   }

   /// Polls and clears the interruption flag. Long-running primitives call
   /// this at least once per inner iteration.
   #[must_use]
   pub fn interrupted(&self) -> bool {
      self.interrupt.swap(false, Ordering::Relaxed)
   }

   /// Monotonic milliseconds since the runtime started.
   #[must_use]
   pub fn now_ms(&self) -> u64 {
      self.started.elapsed().as_millis() as u64
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::value::number;

   #[test]
   fn regions_account_for_the_whole_heap() {
      let mut rt = Runtime::with_heap(4096);

      let used = rt.globals_end()
         + (rt.temporaries_end() - rt.globals_end())
         + rt.editing()
         + rt.locals() * WORD
         + rt.free()
         + (rt.heap_size() - rt.stack);
      assert_eq!(used, rt.heap_size());

      let n = number::make_integer(&mut rt, 42).expect("make");
      rt.push(n).expect("push");

      let used = rt.locals_end() + rt.free() + (rt.heap_size() - rt.stack);
      assert_eq!(used, rt.heap_size());
   }

   #[test]
   fn stack_push_pop_roll() {
      let mut rt = Runtime::with_heap(4096);

      for value in 1..=4_u64 {
         let obj = number::make_integer(&mut rt, value).expect("make");
         rt.push(obj).expect("push");
      }
      assert_eq!(rt.depth(), 4);

      // 1 2 3 4 with 4 on top; roll(3) gives 1 3 4 2.
      rt.roll(3).expect("roll");
      let top = rt.pop().expect("pop");
      assert_eq!(number::integer_value(&rt, top), Some(2));

      rt.rolld(3).expect("rolld");
      let top = rt.pop().expect("pop");
      assert_eq!(number::integer_value(&rt, top), Some(3));
   }

   #[test]
   fn pop_on_empty_raises() {
      let mut rt = Runtime::with_heap(4096);

      assert!(rt.pop().is_err());
      assert!(rt.error().is_some());
   }

   #[test]
   fn return_stack_slides_the_data_stack() {
      let mut rt = Runtime::with_heap(4096);

      let obj = number::make_integer(&mut rt, 7).expect("make");
      rt.push(obj).expect("push");

      rt.run_push(100, 200).expect("run push");
      assert_eq!(rt.run_depth(), 1);

      let top = rt.top().expect("top");
      assert_eq!(number::integer_value(&rt, top), Some(7));

      assert_eq!(rt.run_pop(), Some((100, 200)));
      assert_eq!(rt.run_pop(), None);
   }

   #[test]
   fn gc_compacts_and_preserves_protected_references() {
      let mut rt = Runtime::with_heap(2048);

      let kept = number::make_integer(&mut rt, 123_456).expect("make");
      let kept = rt.protect(kept);

      // Garbage: unreferenced temporaries.
      for value in 0..64_u64 {
         number::make_integer(&mut rt, 100_000 + value).expect("make");
      }

      let reachable = number::make_integer(&mut rt, 999).expect("make");
      rt.push(reachable).expect("push");

      let freed = rt.gc();
      assert!(freed > 0);

      assert_eq!(number::integer_value(&rt, kept.get()), Some(123_456));
      let top = rt.top().expect("top");
      assert_eq!(number::integer_value(&rt, top), Some(999));
   }

   #[test]
   fn gc_runs_from_allocation_pressure() {
      let mut rt = Runtime::with_heap(2048);

      let kept = number::make_integer(&mut rt, 1).expect("make");
      rt.push(kept).expect("push");

      // Far more garbage than the arena holds at once.
      for value in 0..2000_u64 {
         number::make_integer(&mut rt, 10_000 + value).expect("make");
      }

      assert!(rt.error().is_none());
      let top = rt.top().expect("top");
      assert_eq!(number::integer_value(&rt, top), Some(1));
   }

   #[test]
   fn dropped_roots_are_pruned() {
      let mut rt = Runtime::with_heap(2048);

      let doomed = number::make_integer(&mut rt, 31_337).expect("make");
      let handle = rt.protect(doomed);
      drop(handle);

      let freed = rt.gc();
      assert!(freed > 0);
   }

   #[test]
   fn out_of_memory_raises() {
      let mut rt = Runtime::with_heap(1024);

      let result = rt.allocate(100_000);
      assert!(result.is_err());
      assert!(rt.error().is_some());
   }

   #[test]
   fn editor_inserts_and_removes() {
      let mut rt = Runtime::with_heap(4096);

      rt.editor_set("2 3 +").expect("set");
      assert_eq!(rt.editor(), b"2 3 +");

      rt.editor_insert(2, b"10 ").expect("insert");
      assert_eq!(rt.editor(), b"2 10 3 +");

      rt.editor_remove(2, 3);
      assert_eq!(rt.editor(), b"2 3 +");

      assert_eq!(rt.close_editor(), "2 3 +");
      assert_eq!(rt.editing(), 0);
   }

   #[test]
   fn locals_index_from_the_innermost() {
      let mut rt = Runtime::with_heap(4096);

      rt.push_locals(&[10, 20]).expect("push");
      rt.push_locals(&[30]).expect("push");

      assert_eq!(rt.local(0).expect("local"), 30);
      assert_eq!(rt.local(1).expect("local"), 20);
      assert_eq!(rt.local(2).expect("local"), 10);

      rt.pop_locals(1);
      assert_eq!(rt.local(0).expect("local"), 20);
   }

   #[test]
   fn directory_stack_enters_and_leaves() {
      let mut rt = Runtime::with_heap(4096);

      assert_eq!(rt.path_len(), 1);
      let root = rt.variables(0).expect("root");

      rt.enter(77).expect("enter");
      assert_eq!(rt.path_len(), 2);
      assert_eq!(rt.variables(0), Some(77));
      assert_eq!(rt.variables(1), Some(root));
      assert!(rt.is_active_directory(77));

      rt.updir();
      assert_eq!(rt.path_len(), 1);
      assert_eq!(rt.variables(0), Some(root));

      // The root cannot be left.
      rt.updir();
      assert_eq!(rt.path_len(), 1);
   }
}
