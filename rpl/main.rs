use std::io::{
   self,
   BufRead as _,
   Write as _,
};

use anyhow::Context as _;
use clap::Parser as _;
use rpl_runtime::{
   Runtime,
   eval,
   render,
};

#[derive(clap::Parser)]
#[command(version, about)]
struct Cli {
   /// Arena size in bytes.
   #[arg(long, default_value_t = rpl_runtime::DEFAULT_HEAP)]
   heap: usize,

   /// Print every parsed object before evaluating it.
   #[arg(long)]
   dump_objects: bool,

   /// Levels of the stack to print after each evaluation.
   #[arg(long, default_value_t = 8)]
   levels: usize,

   /// The source to evaluate; standard input becomes a session when empty.
   source: Vec<String>,
}

fn main() -> anyhow::Result<()> {
   tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_writer(io::stderr)
      .init();

   let cli = Cli::parse();
   let mut rt = Runtime::with_heap(cli.heap);

   match &*cli.source {
      [] => repl(&mut rt, &cli),

      parts => {
         let source = parts.join(" ");
         let failed = !evaluate(&mut rt, &cli, &source);

         print_stack(&mut rt, &cli);
         if failed {
            std::process::exit(1);
         }
         Ok(())
      },
   }
}

fn repl(rt: &mut Runtime, cli: &Cli) -> anyhow::Result<()> {
   let stdin = io::stdin();
   let mut out = io::stdout();

   loop {
      write!(out, "> ").context("failed to write prompt")?;
      out.flush().context("failed to flush prompt")?;

      let mut line = String::new();
      let read = stdin
         .lock()
         .read_line(&mut line)
         .context("failed to read input")?;
      if read == 0 {
         return Ok(());
      }

      let source = line.trim();
      if source.is_empty() {
         continue;
      }

      evaluate(rt, cli, source);
      print_stack(rt, cli);
   }
}

/// Parses and runs one input, reporting any error. Returns whether the
/// evaluation completed cleanly.
fn evaluate(rt: &mut Runtime, cli: &Cli, source: &str) -> bool {
   if cli.dump_objects {
      dump(rt, source);
   }

   if eval::run_source(rt, source).is_ok() && rt.error().is_none() {
      if eval::pending(rt) {
         eprintln!("halted");
      }
      return true;
   }

   report(rt, source);
   rt.clear_error();
   false
}

fn dump(rt: &mut Runtime, source: &str) {
   let mut p = rpl_runtime::Parser::new(source);

   while {
      p.skip_whitespace();
      !p.done()
   } {
      match rpl_runtime::parse::object(rt, &mut p) {
         Ok(obj) => eprintln!("~ {}", render::to_text(rt, obj)),

         Err(_) => {
            rt.clear_error();
            break;
         },
      }
   }
}

/// Prints the error message, its originating command, and a caret under
/// the offending span.
fn report(rt: &Runtime, source: &str) {
   let Some(error) = rt.error() else {
      eprintln!("error: evaluation failed");
      return;
   };

   match error.command {
      Some(command) => eprintln!("error: {} in {}", error.message(), command.name()),
      None => eprintln!("error: {}", error.message()),
   }

   if let Some(span) = error.span
      && span.start < source.len()
   {
      let caret = " ".repeat(span.start) + &"^".repeat(span.len.max(1));
      eprintln!("  {source}");
      eprintln!("  {caret}");
   }
}

fn print_stack(rt: &mut Runtime, cli: &Cli) {
   let depth = rt.depth();

   for level in (0..depth.min(cli.levels)).rev() {
      let obj = rt.stack_at(level).expect("level is within depth");
      println!("{:3}: {}", level + 1, render::to_display(rt, obj, 70));
   }
}

#[cfg(test)]
mod tests {
   use clap::CommandFactory as _;

   use super::*;

   #[test]
   fn cli() {
      Cli::command().debug_assert();
   }

   #[test]
   fn batch_evaluation_leaves_a_result() {
      let mut rt = Runtime::new();
      let cli = Cli::parse_from(["rpl", "2", "3", "+"]);

      assert!(evaluate(&mut rt, &cli, "2 3 +"));
      assert_eq!(rt.depth(), 1);
   }
}
