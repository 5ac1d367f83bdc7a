//! The single-slot error model.
//!
//! Errors are not returned as values. Raising one deposits it in the
//! runtime's slot; functions that can fail return [`Result`] whose error
//! type, [`Failed`], only signals that the slot is occupied. Callers unwind
//! with `?` and the evaluator checks the slot after every step.

use rpl_syntax::Span;

use crate::{
   Id,
   Runtime,
};

/// Marker for "an error is in the slot"; carries no payload of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failed;

pub type Result<T = ()> = std::result::Result<T, Failed>;

/// What went wrong, with its user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
   #[error("Bad argument type")]
   Type,
   #[error("Bad argument value")]
   Value,
   #[error("Index out of range")]
   Index,
   #[error("Invalid dimension")]
   Dimension,
   #[error("Undefined name")]
   UndefinedName,
   #[error("Invalid name")]
   InvalidName,
   #[error("Unterminated")]
   Unterminated,
   #[error("Syntax error")]
   Syntax,
   #[error("Missing variable")]
   MissingVariable,
   #[error("Too few arguments")]
   MissingArgument,
   #[error("Argument expected")]
   ArgumentExpected,
   #[error("Prefix expected")]
   PrefixExpected,
   #[error("Malformed directory")]
   MalformedDirectory,
   #[error("Cannot purge active directory")]
   PurgeActiveDirectory,
   #[error("Out of memory")]
   OutOfMemory,
   #[error("Divide by zero")]
   ZeroDivide,
   #[error("Numerical precision lost")]
   PrecisionLoss,
   #[error("Internal error, please report")]
   Internal,
   #[error("Screenshot capture failed")]
   ScreenshotCapture,
   #[error("No equation")]
   NoEquation,
   #[error("No data")]
   NoData,
   #[error("Invalid equation")]
   InvalidEquation,
   #[error("Invalid plot type")]
   InvalidPlotType,
   #[error("Invalid plot data")]
   InvalidPlotData,
   #[error("Invalid function")]
   InvalidFunction,
   #[error("Invalid statistics data")]
   InvalidStatsData,
   #[error("Invalid statistics parameters")]
   InvalidStatsParameters,
   #[error("{0}")]
   Custom(String),
}

/// The contents of the error slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
   /// What went wrong.
   pub kind:    ErrorKind,
   /// Where in the last parse buffer, if the parser raised it.
   pub span:    Option<Span>,
   /// The command that raised it, if any.
   pub command: Option<Id>,
}

impl Error {
   #[must_use]
   pub fn new(kind: ErrorKind) -> Self {
      Self {
         kind,
         span: None,
         command: None,
      }
   }

   /// The user-visible message.
   #[must_use]
   pub fn message(&self) -> String {
      self.kind.to_string()
   }
}

/// Fluent handle returned by the raising methods, for attaching the source
/// span and the originating command before unwinding.
pub struct Raised<'a> {
   rt: &'a mut Runtime,
}

impl Raised<'_> {
   pub fn source(self, span: Span) -> Self {
      if let Some(error) = self.rt.error_slot_mut() {
         error.span = Some(span);
      }
      self
   }

   pub fn command(self, command: Id) -> Self {
      if let Some(error) = self.rt.error_slot_mut() {
         error.command = Some(command);
      }
      self
   }

   /// Converts the raise into an unwinding `Err`.
   pub fn err<T>(self) -> Result<T> {
      Err(Failed)
   }
}

macro_rules! raisers {
   ($($method:ident => $kind:ident,)*) => {
      impl Runtime {
         $(pub fn $method(&mut self) -> Raised<'_> {
            self.raise(ErrorKind::$kind)
         })*
      }
   };
}

raisers! {
   type_error => Type,
   value_error => Value,
   index_error => Index,
   dimension_error => Dimension,
   undefined_name_error => UndefinedName,
   invalid_name_error => InvalidName,
   unterminated_error => Unterminated,
   syntax_error => Syntax,
   missing_variable_error => MissingVariable,
   missing_argument_error => MissingArgument,
   argument_expected_error => ArgumentExpected,
   prefix_expected_error => PrefixExpected,
   malformed_directory_error => MalformedDirectory,
   purge_active_directory_error => PurgeActiveDirectory,
   out_of_memory_error => OutOfMemory,
   zero_divide_error => ZeroDivide,
   internal_error => Internal,
   screenshot_capture_error => ScreenshotCapture,
   no_equation_error => NoEquation,
   no_data_error => NoData,
   invalid_equation_error => InvalidEquation,
   invalid_plot_type_error => InvalidPlotType,
   invalid_plot_data_error => InvalidPlotData,
   invalid_function_error => InvalidFunction,
   invalid_stats_data_error => InvalidStatsData,
   invalid_stats_parameters_error => InvalidStatsParameters,
}

impl Runtime {
   /// Deposits an error in the slot. An error already present is kept: the
   /// first failure wins, later ones merely unwind.
   pub fn raise(&mut self, kind: ErrorKind) -> Raised<'_> {
      if self.error_slot_mut().is_none() {
         tracing::debug!(target: "rpl::error", ?kind, "raising");
         self.set_error_slot(Some(Error::new(kind)));
      }

      Raised { rt: self }
   }

   /// Raises an error with a free-form message, as the `DoErr` command does.
   pub fn custom_error(&mut self, message: impl Into<String>) -> Raised<'_> {
      self.raise(ErrorKind::Custom(message.into()))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn first_error_wins() {
      let mut rt = Runtime::new();

      rt.type_error();
      rt.value_error();

      assert_eq!(rt.error().map(|e| e.kind.clone()), Some(ErrorKind::Type));
   }

   #[test]
   fn fluent_span_and_command() {
      let mut rt = Runtime::new();

      let _: Result<()> = rt
         .syntax_error()
         .source(Span::at(4, 2))
         .command(Id::Add)
         .err();

      let error = rt.error().expect("slot must be occupied");
      assert_eq!(error.span, Some(Span::at(4, 2)));
      assert_eq!(error.command, Some(Id::Add));

      rt.clear_error();
      assert!(rt.error().is_none());
   }

   #[test]
   fn messages_read_like_the_calculator() {
      assert_eq!(ErrorKind::MissingArgument.to_string(), "Too few arguments");
      assert_eq!(
         ErrorKind::Custom("Oh no".into()).to_string(),
         "Oh no"
      );
   }
}
