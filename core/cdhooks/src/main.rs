//! cdhooks: CLI trigger adapter for directory transitions.
//!
//! Called by the shell integration that `cdhooks init <shell>` prints.
//!
//! ## Subcommands
//!
//! - `transition`: run leave/enter scripts between two directories (cd/pushd/popd wrappers)
//! - `prompt`: automatic hook, transitions only when the directory changed
//! - `exit`: session termination, leaves everything up to root once
//! - `start`: forget any state left by an earlier shell with the same PID
//! - `plan`: print the leave/enter lists without running anything
//! - `on-leave`: register a one-shot hook from inside a leave script
//! - `inode`: inspect or clear the directory identity guard
//! - `init`: print the shell integration

mod inode;
mod logging;
mod on_leave;
mod plan;
mod session;

use cdhooks_core::{CdhooksError, EngineConfig, Shell};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cdhooks")]
#[command(about = "Per-directory enter and leave scripts for your shell")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transition from one directory to another
    Transition {
        /// Directory the shell was in before navigating
        #[arg(long)]
        from: String,

        /// Directory the shell is in now
        #[arg(long)]
        to: String,

        /// Shell session ID (defaults to the parent process ID)
        #[arg(long)]
        session: Option<String>,

        /// Leave and re-enter `--to` even if nothing changed
        #[arg(long)]
        reenter: bool,

        /// Positional arguments passed to every script
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Automatic hook run before each prompt
    Prompt {
        /// Current working directory of the shell
        #[arg(long)]
        cwd: String,

        #[arg(long)]
        session: Option<String>,
    },

    /// Session is ending: run leave scripts up to root
    Exit {
        #[arg(long)]
        cwd: String,

        #[arg(long)]
        session: Option<String>,
    },

    /// Reset session state for a newly started shell
    Start {
        #[arg(long)]
        session: Option<String>,
    },

    /// Show which directories would be left and entered
    Plan {
        #[arg(long)]
        from: String,

        /// Destination (defaults to root with --exit, required otherwise)
        #[arg(long, required_unless_present = "exit")]
        to: Option<String>,

        #[arg(long, conflicts_with = "exit")]
        reenter: bool,

        /// Plan a session exit from `--from`
        #[arg(long)]
        exit: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a command to run right after the current leave script
    OnLeave {
        /// Command to run (a single argument is taken as shell code)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Inspect or manage the directory identity guard
    Inode {
        #[command(subcommand)]
        action: InodeAction,
    },

    /// Print shell integration code (add `eval "$(cdhooks init bash)"` to your rc file)
    Init {
        #[arg(value_enum)]
        shell: ShellArg,
    },
}

#[derive(Subcommand)]
enum InodeAction {
    /// Show the recorded and current identity of a directory
    Status {
        /// Directory (defaults to the current directory)
        dir: Option<String>,
    },
    /// Delete the record so the next visit re-records the directory
    Reset { dir: Option<String> },
    /// Stop checking this directory permanently
    Disable { dir: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
}

impl From<ShellArg> for Shell {
    fn from(arg: ShellArg) -> Self {
        match arg {
            ShellArg::Bash => Shell::Bash,
            ShellArg::Zsh => Shell::Zsh,
            ShellArg::Fish => Shell::Fish,
        }
    }
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();
    let quiet = EngineConfig::from_env().quiet;

    let result = match cli.command {
        Commands::Transition {
            from,
            to,
            session,
            reenter,
            args,
        } => session::transition(&from, &to, session, reenter, &args),
        Commands::Prompt { cwd, session } => session::prompt(&cwd, session),
        Commands::Exit { cwd, session } => session::exit(&cwd, session),
        Commands::Start { session } => session::start(session),
        Commands::Plan {
            from,
            to,
            reenter,
            exit,
            json,
        } => plan::run(&from, to.as_deref(), reenter, exit, json),
        Commands::OnLeave { command } => on_leave::run(&command),
        Commands::Inode { action } => match action {
            InodeAction::Status { dir } => inode::status(dir.as_deref()),
            InodeAction::Reset { dir } => inode::reset(dir.as_deref()),
            InodeAction::Disable { dir } => inode::disable(dir.as_deref()),
        },
        Commands::Init { shell } => {
            print!("{}", Shell::from(shell).init_script(&program_name()));
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "cdhooks failed");
        report_error(&e, quiet);
        std::process::exit(e.exit_code());
    }
}

fn report_error(error: &CdhooksError, quiet: bool) {
    if quiet && !error.is_always_reported() {
        return;
    }
    eprintln!("cdhooks: {}", error);
}

/// Path the shell integration should call back into.
fn program_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| "cdhooks".to_string())
}
