//! Process-wide modifier state.
//!
//! Settings are consulted by the parser, the renderer and the evaluator, and
//! every one of them doubles as a pseudo-variable: storing, recalling or
//! purging its name routes here instead of the directories.

use crate::{
   Id,
   Result,
   Runtime,
   object,
   value::number,
};

/// How command names are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandDisplay {
   /// Canonical spelling, e.g. `Dup`.
   #[default]
   Long,
   /// Last listed spelling, usually the terser alias.
   Short,
}

/// Angle unit for the trigonometric functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleMode {
   #[default]
   Degrees,
   Radians,
   Grads,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
   /// Store new directory entries after existing ones.
   pub store_at_end:        bool,
   /// Snapshot command arguments for `LastArg`.
   pub save_last_arguments: bool,
   /// Honour case when looking up names.
   pub case_sensitive:      bool,
   /// Allow integers as variable names.
   pub numbered_variables:  bool,
   /// Undefined names evaluate to themselves as expressions instead of
   /// raising an error.
   pub symbolic_results:    bool,
   /// One program step per line when rendering for the editor.
   pub vertical_programs:   bool,
   pub command_display:     CommandDisplay,
   /// Render multiplication as `·` rather than `*`.
   pub dot_multiplication:  bool,
   pub angle_mode:          AngleMode,
   /// Bit width for based-integer logic, 1 to 64.
   pub word_size:           u32,
   /// Significant digits when displaying decimals.
   pub precision:           u32,
}

impl Default for Settings {
   fn default() -> Self {
      Self {
         store_at_end:        false,
         save_last_arguments: true,
         case_sensitive:      false,
         numbered_variables:  false,
         symbolic_results:    true,
         vertical_programs:   false,
         command_display:     CommandDisplay::default(),
         dot_multiplication:  true,
         angle_mode:          AngleMode::default(),
         word_size:           64,
         precision:           12,
      }
   }
}

impl Settings {
   /// The spelling used for multiplication when rendering expressions.
   #[must_use]
   pub fn multiply_glyph(&self) -> &'static str {
      if self.dot_multiplication { "·" } else { "*" }
   }
}

/// Saves the settings and returns the runtime wrapped in a guard that
/// restores them on scope exit, on every path.
pub fn scoped<'a>(rt: &'a mut Runtime) -> scopeguard::ScopeGuard<&'a mut Runtime, impl FnOnce(&'a mut Runtime) + 'a> {
   let saved = rt.settings.clone();

   scopeguard::guard(rt, move |rt| rt.settings = saved)
}

/// Executes a settings command, adjusting one field.
pub fn run(rt: &mut Runtime, ty: Id) -> Result {
   match ty {
      Id::StoreAtEnd => rt.settings.store_at_end = true,
      Id::StoreAtStart => rt.settings.store_at_end = false,
      Id::SaveLastArguments => rt.settings.save_last_arguments = true,
      Id::NoLastArguments => rt.settings.save_last_arguments = false,
      Id::CaseSensitiveNames => rt.settings.case_sensitive = true,
      Id::CaseInsensitiveNames => rt.settings.case_sensitive = false,
      Id::NumberedVariables => rt.settings.numbered_variables = true,
      Id::NoNumberedVariables => rt.settings.numbered_variables = false,
      Id::SymbolicResults => rt.settings.symbolic_results = true,
      Id::NumericalResults => rt.settings.symbolic_results = false,
      Id::VerticalPrograms => rt.settings.vertical_programs = true,
      Id::HorizontalPrograms => rt.settings.vertical_programs = false,
      Id::LongForm => rt.settings.command_display = CommandDisplay::Long,
      Id::ShortForm => rt.settings.command_display = CommandDisplay::Short,
      Id::DotMultiplication => rt.settings.dot_multiplication = true,
      Id::StarMultiplication => rt.settings.dot_multiplication = false,
      Id::Degrees => rt.settings.angle_mode = AngleMode::Degrees,
      Id::Radians => rt.settings.angle_mode = AngleMode::Radians,
      Id::Grads => rt.settings.angle_mode = AngleMode::Grads,

      Id::WordSize => {
         let bits = object::pop_u32(rt)?;
         if bits == 0 || bits > 64 {
            return rt.value_error().command(ty).err();
         }
         rt.settings.word_size = bits;
      },

      Id::Precision => {
         let digits = object::pop_u32(rt)?;
         if digits == 0 || digits > 17 {
            return rt.value_error().command(ty).err();
         }
         rt.settings.precision = digits;
      },

      _ => return rt.internal_error().command(ty).err(),
   }

   Ok(())
}

/// Stores a value to a settings pseudo-variable.
pub fn store(rt: &mut Runtime, ty: Id, value: usize) -> Result {
   match ty {
      Id::WordSize | Id::Precision => {
         rt.push(value)?;
         run(rt, ty)
      },

      // A flag setting accepts a truth value; its paired tag clears it.
      _ => {
         let truth = object::as_truth(rt, value)?;
         run(rt, if truth { ty } else { paired(ty) })
      },
   }
}

/// Recalls the current value of a settings pseudo-variable.
pub fn recall(rt: &mut Runtime, ty: Id) -> Result<usize> {
   let value = match ty {
      Id::WordSize => u64::from(rt.settings.word_size),
      Id::Precision => u64::from(rt.settings.precision),

      _ => u64::from(flag(rt, ty)),
   };

   number::make_integer(rt, value)
}

/// Purging a settings pseudo-variable restores its default.
pub fn purge(rt: &mut Runtime, ty: Id) -> Result {
   let defaults = Settings::default();

   match ty {
      Id::WordSize => rt.settings.word_size = defaults.word_size,
      Id::Precision => rt.settings.precision = defaults.precision,
      Id::StoreAtEnd | Id::StoreAtStart => rt.settings.store_at_end = defaults.store_at_end,
      Id::SaveLastArguments | Id::NoLastArguments => {
         rt.settings.save_last_arguments = defaults.save_last_arguments;
      },
      Id::CaseSensitiveNames | Id::CaseInsensitiveNames => {
         rt.settings.case_sensitive = defaults.case_sensitive;
      },
      Id::NumberedVariables | Id::NoNumberedVariables => {
         rt.settings.numbered_variables = defaults.numbered_variables;
      },
      Id::SymbolicResults | Id::NumericalResults => {
         rt.settings.symbolic_results = defaults.symbolic_results;
      },
      Id::VerticalPrograms | Id::HorizontalPrograms => {
         rt.settings.vertical_programs = defaults.vertical_programs;
      },
      Id::LongForm | Id::ShortForm => rt.settings.command_display = defaults.command_display,
      Id::DotMultiplication | Id::StarMultiplication => {
         rt.settings.dot_multiplication = defaults.dot_multiplication;
      },
      Id::Degrees | Id::Radians | Id::Grads => rt.settings.angle_mode = defaults.angle_mode,

      _ => return rt.internal_error().err(),
   }

   Ok(())
}

fn flag(rt: &Runtime, ty: Id) -> bool {
   let settings = &rt.settings;

   match ty {
      Id::StoreAtEnd => settings.store_at_end,
      Id::StoreAtStart => !settings.store_at_end,
      Id::SaveLastArguments => settings.save_last_arguments,
      Id::NoLastArguments => !settings.save_last_arguments,
      Id::CaseSensitiveNames => settings.case_sensitive,
      Id::CaseInsensitiveNames => !settings.case_sensitive,
      Id::NumberedVariables => settings.numbered_variables,
      Id::NoNumberedVariables => !settings.numbered_variables,
      Id::SymbolicResults => settings.symbolic_results,
      Id::NumericalResults => !settings.symbolic_results,
      Id::VerticalPrograms => settings.vertical_programs,
      Id::HorizontalPrograms => !settings.vertical_programs,
      Id::LongForm => settings.command_display == CommandDisplay::Long,
      Id::ShortForm => settings.command_display == CommandDisplay::Short,
      Id::DotMultiplication => settings.dot_multiplication,
      Id::StarMultiplication => !settings.dot_multiplication,
      Id::Degrees => settings.angle_mode == AngleMode::Degrees,
      Id::Radians => settings.angle_mode == AngleMode::Radians,
      Id::Grads => settings.angle_mode == AngleMode::Grads,

      _ => false,
   }
}

fn paired(ty: Id) -> Id {
   match ty {
      Id::StoreAtEnd => Id::StoreAtStart,
      Id::StoreAtStart => Id::StoreAtEnd,
      Id::SaveLastArguments => Id::NoLastArguments,
      Id::NoLastArguments => Id::SaveLastArguments,
      Id::CaseSensitiveNames => Id::CaseInsensitiveNames,
      Id::CaseInsensitiveNames => Id::CaseSensitiveNames,
      Id::NumberedVariables => Id::NoNumberedVariables,
      Id::NoNumberedVariables => Id::NumberedVariables,
      Id::SymbolicResults => Id::NumericalResults,
      Id::NumericalResults => Id::SymbolicResults,
      Id::VerticalPrograms => Id::HorizontalPrograms,
      Id::HorizontalPrograms => Id::VerticalPrograms,
      Id::LongForm => Id::ShortForm,
      Id::ShortForm => Id::LongForm,
      Id::DotMultiplication => Id::StarMultiplication,
      Id::StarMultiplication => Id::DotMultiplication,

      other => other,
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn scoped_restore_runs_on_every_exit() {
      let mut rt = Runtime::new();
      assert!(!rt.settings.store_at_end);

      {
         let mut rt = scoped(&mut rt);
         rt.settings.store_at_end = true;
         assert!(rt.settings.store_at_end);
      }

      assert!(!rt.settings.store_at_end);
   }

   #[test]
   fn flag_commands_flip_fields() {
      let mut rt = Runtime::new();

      run(&mut rt, Id::StoreAtEnd).expect("flag command");
      assert!(rt.settings.store_at_end);

      run(&mut rt, Id::StoreAtStart).expect("flag command");
      assert!(!rt.settings.store_at_end);
   }

   #[test]
   fn purge_restores_defaults() {
      let mut rt = Runtime::new();

      run(&mut rt, Id::ShortForm).expect("flag command");
      assert_eq!(rt.settings.command_display, CommandDisplay::Short);

      purge(&mut rt, Id::ShortForm).expect("purge");
      assert_eq!(rt.settings.command_display, CommandDisplay::Long);
   }
}
