//! The closed set of object tags.
//!
//! Every object starts with one of these identifiers, LEB128-encoded. The
//! declaration order is load-bearing: type predicates are range checks over
//! the discriminants, so related tags must stay contiguous.

use num_enum::TryFromPrimitive;

/// Operator precedence inside expressions.
pub mod precedence {
   pub const NONE: u8 = 0;
   pub const LOWEST: u8 = 1;
   pub const LOGICAL: u8 = 10;
   pub const RELATIONAL: u8 = 12;
   pub const ADDITIVE: u8 = 14;
   pub const MULTIPLICATIVE: u8 = 16;
   pub const POWER: u8 = 28;
   pub const FUNCTIONAL: u8 = 30;
   pub const FUNCTION: u8 = 40;
   pub const FUNCTION_POWER: u8 = 50;
   pub const SYMBOL: u8 = 60;
   pub const PARENTHESES: u8 = 70;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive)]
#[repr(u16)]
pub enum Id {
   /// The generic object; never allocated, used as a sentinel.
   Object = 0,

   Directory,

   // Real numbers.
   Integer,
   NegInteger,
   BasedInteger,
   Bignum,
   NegBignum,
   Fraction,
   NegFraction,
   Decimal,

   // Complex numbers.
   Rectangular,
   Polar,

   // Symbolic objects.
   Symbol,
   Expression,

   Text,
   Comment,

   // Aggregates. A block is a program without delimiters, used for the
   // bodies of control structures.
   List,
   Array,
   Program,
   Block,

   /// A reference to a loop variable, resolved to a depth at parse time.
   Local,

   // Reserved variable names owned by collaborators.
   StatsData,
   StatsParameters,
   Equation,
   PlotParameters,

   // Control structures.
   IfThen,
   IfThenElse,
   IfErrThen,
   IfErrThenElse,
   CaseStatement,
   CaseThen,
   CaseWhen,
   DoUntil,
   WhileRepeat,
   StartNext,
   StartStep,
   ForNext,
   ForStep,

   // Anonymous markers embedded in control structure payloads. They have no
   // source form and render as nothing.
   ThenMarker,
   ElseMarker,
   ErrThenMarker,
   ErrElseMarker,
   CaseThenMarker,
   CaseWhenMarker,
   CaseEndMarker,
   UntilMarker,
   WhileMarker,
   NextMarker,
   StepMarker,

   // Algebraic functions: commands whose evaluation is pure and which may
   // therefore appear inside expressions.
   Add,
   Sub,
   Mul,
   Div,
   Pow,
   Neg,
   Inv,
   Sq,
   Cubed,
   Fact,
   Sqrt,
   Exp,
   Ln,
   Abs,
   Sin,
   Cos,
   Tan,
   Min,
   Max,
   And,
   Or,
   Xor,
   Not,
   TestEq,
   TestNe,
   TestLt,
   TestGt,
   TestLe,
   TestGe,

   // Stack commands.
   Dup,
   Dup2,
   Drop,
   Drop2,
   Swap,
   Over,
   Rot,
   Pick,
   Roll,
   RollD,
   Depth,
   ClearStack,
   LastArg,

   // Variable commands.
   Sto,
   Rcl,
   Purge,
   CrDir,
   UpDir,
   Home,
   Path,

   // Evaluation commands.
   Eval,
   Ift,
   Ifte,

   // Debugging commands.
   Halt,
   SingleStep,
   StepOver,
   StepOut,
   MultipleSteps,
   Continue,
   Kill,

   // Error commands.
   Errm,
   Err0,
   DoErr,

   // Memory commands.
   GarbageCollect,
   AvailableMemory,

   // Settings, each usable as a command and as a pseudo-variable name.
   StoreAtEnd,
   StoreAtStart,
   SaveLastArguments,
   NoLastArguments,
   CaseSensitiveNames,
   CaseInsensitiveNames,
   NumberedVariables,
   NoNumberedVariables,
   SymbolicResults,
   NumericalResults,
   VerticalPrograms,
   HorizontalPrograms,
   LongForm,
   ShortForm,
   DotMultiplication,
   StarMultiplication,
   Degrees,
   Radians,
   Grads,
   WordSize,
   Precision,
}

/// One past the highest valid tag.
pub const NUM_IDS: u16 = Id::Precision as u16 + 1;

impl Id {
   #[inline]
   fn between(self, first: Self, last: Self) -> bool {
      (first as u16..=last as u16).contains(&(self as u16))
   }

   /// Integral numbers, including based integers and bignums.
   #[must_use]
   pub fn is_integer(self) -> bool {
      self.between(Self::Integer, Self::NegBignum)
   }

   #[must_use]
   pub fn is_fraction(self) -> bool {
      self.between(Self::Fraction, Self::NegFraction)
   }

   /// Real numbers of any representation.
   #[must_use]
   pub fn is_real(self) -> bool {
      self.between(Self::Integer, Self::Decimal)
   }

   #[must_use]
   pub fn is_complex(self) -> bool {
      self.between(Self::Rectangular, Self::Polar)
   }

   /// Symbols and expressions.
   #[must_use]
   pub fn is_symbolic(self) -> bool {
      self.between(Self::Symbol, Self::Expression)
   }

   /// Real or complex numbers.
   #[must_use]
   pub fn is_algebraic_number(self) -> bool {
      self.is_real() || self.is_complex()
   }

   /// Valid operands inside an expression.
   #[must_use]
   pub fn is_symbolic_arg(self) -> bool {
      self.is_symbolic() || self.is_algebraic_number()
   }

   /// Pure functions usable inside expressions.
   #[must_use]
   pub fn is_algebraic_fn(self) -> bool {
      self.between(Self::Add, Self::TestGe)
   }

   /// Anything allowed in an expression: operands or pure functions.
   #[must_use]
   pub fn is_algebraic(self) -> bool {
      self.is_algebraic_fn() || self.is_symbolic_arg()
   }

   /// Programs and blocks, whose evaluation runs their body.
   #[must_use]
   pub fn is_program(self) -> bool {
      self.between(Self::Program, Self::Block)
   }

   /// Control structures.
   #[must_use]
   pub fn is_structure(self) -> bool {
      self.between(Self::IfThen, Self::ForStep)
   }

   /// Internal markers with no source form.
   #[must_use]
   pub fn is_marker(self) -> bool {
      self.between(Self::ThenMarker, Self::StepMarker)
   }

   /// Every executable command, including settings commands.
   #[must_use]
   pub fn is_command(self) -> bool {
      self.between(Self::Add, Self::Precision)
   }

   /// Settings usable as pseudo-variables.
   #[must_use]
   pub fn is_setting(self) -> bool {
      self.between(Self::StoreAtEnd, Self::Precision)
   }

   /// Non-symbol tags that may serve as directory entry names.
   #[must_use]
   pub fn is_reserved_name(self) -> bool {
      self.between(Self::StatsData, Self::PlotParameters)
   }

   /// The number of stack operands the evaluator checks for before running
   /// this command.
   #[must_use]
   pub fn arity(self) -> usize {
      match self {
         Self::Add
         | Self::Sub
         | Self::Mul
         | Self::Div
         | Self::Pow
         | Self::Min
         | Self::Max
         | Self::And
         | Self::Or
         | Self::Xor
         | Self::TestEq
         | Self::TestNe
         | Self::TestLt
         | Self::TestGt
         | Self::TestLe
         | Self::TestGe
         | Self::Dup2
         | Self::Drop2
         | Self::Swap
         | Self::Over
         | Self::Sto
         | Self::Ift => 2,

         Self::Neg
         | Self::Inv
         | Self::Sq
         | Self::Cubed
         | Self::Fact
         | Self::Sqrt
         | Self::Exp
         | Self::Ln
         | Self::Abs
         | Self::Sin
         | Self::Cos
         | Self::Tan
         | Self::Not
         | Self::Dup
         | Self::Drop
         | Self::Pick
         | Self::Roll
         | Self::RollD
         | Self::Rcl
         | Self::Purge
         | Self::CrDir
         | Self::Eval
         | Self::MultipleSteps
         | Self::DoErr
         | Self::WordSize
         | Self::Precision => 1,

         Self::Rot | Self::Ifte => 3,

         _ => 0,
      }
   }

   /// Precedence inside expressions; `NONE` for anything that cannot appear
   /// there.
   #[must_use]
   pub fn precedence(self) -> u8 {
      use precedence::*;

      match self {
         Self::And | Self::Or | Self::Xor => LOGICAL,

         Self::TestEq
         | Self::TestNe
         | Self::TestLt
         | Self::TestGt
         | Self::TestLe
         | Self::TestGe => RELATIONAL,

         Self::Add | Self::Sub => ADDITIVE,
         Self::Mul | Self::Div => MULTIPLICATIVE,
         Self::Pow => POWER,

         Self::Neg
         | Self::Not
         | Self::Sqrt
         | Self::Exp
         | Self::Ln
         | Self::Abs
         | Self::Sin
         | Self::Cos
         | Self::Tan
         | Self::Min
         | Self::Max => FUNCTION,

         Self::Inv | Self::Sq | Self::Cubed | Self::Fact => FUNCTION_POWER,

         Self::Symbol | Self::Local => SYMBOL,

         ty if ty.is_algebraic_number() => SYMBOL,

         _ => NONE,
      }
   }

   /// The spellings of this tag, canonical first. Empty for objects without
   /// a keyword form.
   #[must_use]
   pub fn spellings(self) -> &'static [&'static str] {
      match self {
         Self::Add => &["+"],
         Self::Sub => &["-"],
         Self::Mul => &["·", "*", "×"],
         Self::Div => &["/", "÷"],
         Self::Pow => &["^"],
         Self::Neg => &["neg"],
         Self::Inv => &["inv", "⁻¹"],
         Self::Sq => &["sq", "²"],
         Self::Cubed => &["cubed", "³"],
         Self::Fact => &["!", "fact"],
         Self::Sqrt => &["sqrt", "√"],
         Self::Exp => &["exp"],
         Self::Ln => &["ln"],
         Self::Abs => &["abs"],
         Self::Sin => &["sin"],
         Self::Cos => &["cos"],
         Self::Tan => &["tan"],
         Self::Min => &["min"],
         Self::Max => &["max"],
         Self::And => &["and"],
         Self::Or => &["or"],
         Self::Xor => &["xor"],
         Self::Not => &["not"],
         Self::TestEq => &["==", "same"],
         Self::TestNe => &["≠", "<>"],
         Self::TestLt => &["<"],
         Self::TestGt => &[">"],
         Self::TestLe => &["≤", "<="],
         Self::TestGe => &["≥", ">="],

         Self::Dup => &["Dup"],
         Self::Dup2 => &["Dup2"],
         Self::Drop => &["Drop"],
         Self::Drop2 => &["Drop2"],
         Self::Swap => &["Swap"],
         Self::Over => &["Over"],
         Self::Rot => &["Rot"],
         Self::Pick => &["Pick"],
         Self::Roll => &["Roll"],
         Self::RollD => &["RollD"],
         Self::Depth => &["Depth"],
         Self::ClearStack => &["ClearStack", "Clear"],
         Self::LastArg => &["LastArg", "LastArguments"],

         Self::Sto => &["Sto", "Store"],
         Self::Rcl => &["Rcl", "Recall"],
         Self::Purge => &["Purge"],
         Self::CrDir => &["CrDir"],
         Self::UpDir => &["UpDir"],
         Self::Home => &["Home"],
         Self::Path => &["Path"],

         Self::Eval => &["Eval"],
         Self::Ift => &["IFT"],
         Self::Ifte => &["IFTE"],

         Self::Halt => &["Halt"],
         Self::SingleStep => &["SingleStep", "SST"],
         Self::StepOver => &["StepOver"],
         Self::StepOut => &["StepOut"],
         Self::MultipleSteps => &["MultipleSteps"],
         Self::Continue => &["Continue", "Cont"],
         Self::Kill => &["Kill"],

         Self::Errm => &["Errm", "ErrorMessage"],
         Self::Err0 => &["Err0", "ClearError"],
         Self::DoErr => &["DoErr"],

         Self::GarbageCollect => &["GarbageCollect", "GC"],
         Self::AvailableMemory => &["AvailableMemory", "Mem"],

         Self::StoreAtEnd => &["StoreAtEnd"],
         Self::StoreAtStart => &["StoreAtStart"],
         Self::SaveLastArguments => &["SaveLastArguments"],
         Self::NoLastArguments => &["NoLastArguments"],
         Self::CaseSensitiveNames => &["CaseSensitiveNames"],
         Self::CaseInsensitiveNames => &["CaseInsensitiveNames"],
         Self::NumberedVariables => &["NumberedVariables"],
         Self::NoNumberedVariables => &["NoNumberedVariables"],
         Self::SymbolicResults => &["SymbolicResults"],
         Self::NumericalResults => &["NumericalResults"],
         Self::VerticalPrograms => &["VerticalPrograms"],
         Self::HorizontalPrograms => &["HorizontalPrograms"],
         Self::LongForm => &["LongForm"],
         Self::ShortForm => &["ShortForm"],
         Self::DotMultiplication => &["DotMultiplication"],
         Self::StarMultiplication => &["StarMultiplication"],
         Self::Degrees => &["Degrees", "Deg"],
         Self::Radians => &["Radians", "Rad"],
         Self::Grads => &["Grads", "Grad"],
         Self::WordSize => &["WordSize", "STWS"],
         Self::Precision => &["Precision"],

         Self::StatsData => &["ΣData"],
         Self::StatsParameters => &["ΣParameters"],
         Self::Equation => &["EQ"],
         Self::PlotParameters => &["PPAR"],

         _ => &[],
      }
   }

   /// The name used when rendering this tag, honouring the command display
   /// mode through the caller.
   #[must_use]
   pub fn name(self) -> &'static str {
      self.spellings().first().copied().unwrap_or("")
   }

   /// Help topic for the tag.
   #[must_use]
   pub fn help(self) -> &'static str {
      match self {
         Self::Directory => "Directories",
         ty if ty.is_real() => "Numbers",
         ty if ty.is_complex() => "Complex numbers",
         Self::Symbol | Self::Expression => "Expressions",
         Self::Text => "Text",
         Self::List | Self::Array => "Lists",
         Self::Program | Self::Block => "Programs",
         ty if ty.is_structure() => "Program structures",
         ty if ty.is_setting() => "Settings",
         ty if ty.is_command() => "Commands",
         _ => "Objects",
      }
   }
}

/// Looks a word up in the spelling table, ignoring case.
#[must_use]
pub fn lookup(word: &str) -> Option<Id> {
   // The phf key set is lowercase; non-ASCII spellings are short enough
   // that allocating here does not matter.
   let lower = word.to_lowercase();

   SPELLINGS.get(&lower).copied()
}

static SPELLINGS: phf::Map<&'static str, Id> = phf::phf_map! {
   "+" => Id::Add,
   "-" => Id::Sub,
   "·" => Id::Mul,
   "*" => Id::Mul,
   "×" => Id::Mul,
   "/" => Id::Div,
   "÷" => Id::Div,
   "^" => Id::Pow,
   "neg" => Id::Neg,
   "inv" => Id::Inv,
   "⁻¹" => Id::Inv,
   "sq" => Id::Sq,
   "²" => Id::Sq,
   "cubed" => Id::Cubed,
   "³" => Id::Cubed,
   "!" => Id::Fact,
   "fact" => Id::Fact,
   "sqrt" => Id::Sqrt,
   "√" => Id::Sqrt,
   "exp" => Id::Exp,
   "ln" => Id::Ln,
   "abs" => Id::Abs,
   "sin" => Id::Sin,
   "cos" => Id::Cos,
   "tan" => Id::Tan,
   "min" => Id::Min,
   "max" => Id::Max,
   "and" => Id::And,
   "or" => Id::Or,
   "xor" => Id::Xor,
   "not" => Id::Not,
   "==" => Id::TestEq,
   "same" => Id::TestEq,
   "≠" => Id::TestNe,
   "<>" => Id::TestNe,
   "<" => Id::TestLt,
   ">" => Id::TestGt,
   "≤" => Id::TestLe,
   "<=" => Id::TestLe,
   "≥" => Id::TestGe,
   ">=" => Id::TestGe,
   "dup" => Id::Dup,
   "dup2" => Id::Dup2,
   "drop" => Id::Drop,
   "drop2" => Id::Drop2,
   "swap" => Id::Swap,
   "over" => Id::Over,
   "rot" => Id::Rot,
   "pick" => Id::Pick,
   "roll" => Id::Roll,
   "rolld" => Id::RollD,
   "depth" => Id::Depth,
   "clearstack" => Id::ClearStack,
   "clear" => Id::ClearStack,
   "lastarg" => Id::LastArg,
   "lastarguments" => Id::LastArg,
   "sto" => Id::Sto,
   "store" => Id::Sto,
   "rcl" => Id::Rcl,
   "recall" => Id::Rcl,
   "purge" => Id::Purge,
   "crdir" => Id::CrDir,
   "updir" => Id::UpDir,
   "home" => Id::Home,
   "path" => Id::Path,
   "eval" => Id::Eval,
   "ift" => Id::Ift,
   "ifte" => Id::Ifte,
   "halt" => Id::Halt,
   "singlestep" => Id::SingleStep,
   "sst" => Id::SingleStep,
   "stepover" => Id::StepOver,
   "stepout" => Id::StepOut,
   "multiplesteps" => Id::MultipleSteps,
   "continue" => Id::Continue,
   "cont" => Id::Continue,
   "kill" => Id::Kill,
   "errm" => Id::Errm,
   "errormessage" => Id::Errm,
   "err0" => Id::Err0,
   "clearerror" => Id::Err0,
   "doerr" => Id::DoErr,
   "garbagecollect" => Id::GarbageCollect,
   "gc" => Id::GarbageCollect,
   "availablememory" => Id::AvailableMemory,
   "mem" => Id::AvailableMemory,
   "storeatend" => Id::StoreAtEnd,
   "storeatstart" => Id::StoreAtStart,
   "savelastarguments" => Id::SaveLastArguments,
   "nolastarguments" => Id::NoLastArguments,
   "casesensitivenames" => Id::CaseSensitiveNames,
   "caseinsensitivenames" => Id::CaseInsensitiveNames,
   "numberedvariables" => Id::NumberedVariables,
   "nonumberedvariables" => Id::NoNumberedVariables,
   "symbolicresults" => Id::SymbolicResults,
   "numericalresults" => Id::NumericalResults,
   "verticalprograms" => Id::VerticalPrograms,
   "horizontalprograms" => Id::HorizontalPrograms,
   "longform" => Id::LongForm,
   "shortform" => Id::ShortForm,
   "dotmultiplication" => Id::DotMultiplication,
   "starmultiplication" => Id::StarMultiplication,
   "degrees" => Id::Degrees,
   "deg" => Id::Degrees,
   "radians" => Id::Radians,
   "rad" => Id::Radians,
   "grads" => Id::Grads,
   "grad" => Id::Grads,
   "stws" => Id::WordSize,
   "wordsize" => Id::WordSize,
   "precision" => Id::Precision,
   "σdata" => Id::StatsData,
   "σparameters" => Id::StatsParameters,
   "eq" => Id::Equation,
   "ppar" => Id::PlotParameters,
};

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn ranges_are_disjoint_where_expected() {
      assert!(Id::Integer.is_real());
      assert!(Id::Decimal.is_real());
      assert!(!Id::Rectangular.is_real());
      assert!(Id::Polar.is_complex());

      assert!(Id::Symbol.is_symbolic());
      assert!(Id::Expression.is_symbolic());
      assert!(!Id::Text.is_symbolic());

      assert!(Id::Add.is_algebraic_fn());
      assert!(Id::TestGe.is_algebraic_fn());
      assert!(!Id::Dup.is_algebraic_fn());
      assert!(Id::Dup.is_command());
      assert!(Id::Precision.is_command());

      assert!(Id::IfThen.is_structure());
      assert!(Id::ForStep.is_structure());
      assert!(Id::ThenMarker.is_marker());
      assert!(!Id::ThenMarker.is_structure());
   }

   #[test]
   fn every_command_has_a_spelling() {
      for raw in 0..NUM_IDS {
         let ty = Id::try_from(raw).expect("tag in range");

         if ty.is_command() || ty.is_reserved_name() {
            assert!(!ty.spellings().is_empty(), "{ty:?} has no spelling");
         }
      }
   }

   #[test]
   fn every_spelling_resolves_back() {
      for raw in 0..NUM_IDS {
         let ty = Id::try_from(raw).expect("tag in range");

         for spelling in ty.spellings() {
            assert_eq!(lookup(spelling), Some(ty), "{spelling} of {ty:?}");
         }
      }
   }

   #[test]
   fn lookup_ignores_case() {
      assert_eq!(lookup("DUP"), Some(Id::Dup));
      assert_eq!(lookup("dUp"), Some(Id::Dup));
      assert_eq!(lookup("crdir"), Some(Id::CrDir));
      assert_eq!(lookup("no-such-word"), None);
   }
}
