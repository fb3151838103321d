//! Shell integration scripts printed by `cdhooks init <shell>`.
//!
//! Each snippet wires the three triggers into the shell:
//!
//! | trigger    | bash                 | zsh                   | fish                  |
//! |------------|----------------------|-----------------------|-----------------------|
//! | navigation | `cd`/`pushd`/`popd` wrapper functions (all shells)                   |||
//! | prompt     | `PROMPT_COMMAND`     | `precmd_functions`    | `fish_prompt` event   |
//! | exit       | `trap ... EXIT`      | `zshexit_functions`   | `fish_exit` event     |
//!
//! Wrappers return the builtin's status when it fails and never call
//! `cdhooks` in that case. Previously installed prompt and exit hooks keep
//! running after ours. The session id is the shell's own PID.

use std::fmt;
use std::str::FromStr;

const PROGRAM_TOKEN: &str = "@CDHOOKS@";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub const ALL: [Shell; 3] = [Shell::Bash, Shell::Zsh, Shell::Fish];

    pub fn name(self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        }
    }

    /// Integration script invoking `program` for every trigger.
    pub fn init_script(self, program: &str) -> String {
        let (template, quoted) = match self {
            Shell::Bash => (BASH_INIT, posix_quote(program)),
            Shell::Zsh => (ZSH_INIT, posix_quote(program)),
            Shell::Fish => (FISH_INIT, fish_quote(program)),
        };
        template.replace(PROGRAM_TOKEN, &quoted)
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shell::ALL
            .into_iter()
            .find(|shell| shell.name() == s)
            .ok_or_else(|| format!("unsupported shell: {} (expected bash, zsh or fish)", s))
    }
}

/// Single-quotes `raw` for `sh`-family shells.
pub fn posix_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

fn fish_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\\', r"\\").replace('\'', r"\'"))
}

const BASH_INIT: &str = r#"# cdhooks integration for bash
__cdhooks_transition() {
    command @CDHOOKS@ transition --session "$$" --from "$1" --to "$PWD"
}

cd() {
    local __cdhooks_from="$PWD"
    builtin cd "$@" || return $?
    __cdhooks_transition "$__cdhooks_from"
    return 0
}

pushd() {
    local __cdhooks_from="$PWD"
    builtin pushd "$@" || return $?
    __cdhooks_transition "$__cdhooks_from"
    return 0
}

popd() {
    local __cdhooks_from="$PWD"
    builtin popd "$@" || return $?
    __cdhooks_transition "$__cdhooks_from"
    return 0
}

__cdhooks_prompt() {
    local __cdhooks_status=$?
    command @CDHOOKS@ prompt --session "$$" --cwd "$PWD"
    return $__cdhooks_status
}

case ";${PROMPT_COMMAND};" in
    *";__cdhooks_prompt;"*) ;;
    *) PROMPT_COMMAND="__cdhooks_prompt${PROMPT_COMMAND:+;$PROMPT_COMMAND}" ;;
esac

if [ -z "${__cdhooks_exit_installed:-}" ]; then
    __cdhooks_prev_exit=$(trap -p EXIT)
    __cdhooks_prev_exit=${__cdhooks_prev_exit#trap -- \'}
    __cdhooks_prev_exit=${__cdhooks_prev_exit%\' EXIT}
    __cdhooks_exit() {
        command @CDHOOKS@ exit --session "$$" --cwd "$PWD"
        if [ -n "$__cdhooks_prev_exit" ]; then
            eval "$__cdhooks_prev_exit"
        fi
    }
    trap '__cdhooks_exit' EXIT
    __cdhooks_exit_installed=1
fi

command @CDHOOKS@ start --session "$$"
"#;

const ZSH_INIT: &str = r#"# cdhooks integration for zsh
__cdhooks_transition() {
    command @CDHOOKS@ transition --session "$$" --from "$1" --to "$PWD"
}

cd() {
    local __cdhooks_from="$PWD"
    builtin cd "$@" || return $?
    __cdhooks_transition "$__cdhooks_from"
    return 0
}

pushd() {
    local __cdhooks_from="$PWD"
    builtin pushd "$@" || return $?
    __cdhooks_transition "$__cdhooks_from"
    return 0
}

popd() {
    local __cdhooks_from="$PWD"
    builtin popd "$@" || return $?
    __cdhooks_transition "$__cdhooks_from"
    return 0
}

__cdhooks_prompt() {
    command @CDHOOKS@ prompt --session "$$" --cwd "$PWD"
}

__cdhooks_exit() {
    command @CDHOOKS@ exit --session "$$" --cwd "$PWD"
}

typeset -ga precmd_functions zshexit_functions
if (( ! ${precmd_functions[(Ie)__cdhooks_prompt]} )); then
    precmd_functions=(__cdhooks_prompt $precmd_functions)
fi
if (( ! ${zshexit_functions[(Ie)__cdhooks_exit]} )); then
    zshexit_functions=(__cdhooks_exit $zshexit_functions)
fi

command @CDHOOKS@ start --session "$$"
"#;

const FISH_INIT: &str = r#"# cdhooks integration for fish
function __cdhooks_transition --argument-names from
    command @CDHOOKS@ transition --session $fish_pid --from $from --to $PWD
end

for __cdhooks_cmd in cd pushd popd
    if functions -q $__cdhooks_cmd; and not functions -q __cdhooks_orig_$__cdhooks_cmd
        functions --copy $__cdhooks_cmd __cdhooks_orig_$__cdhooks_cmd
    end
end
set -e __cdhooks_cmd

function cd --wraps cd
    set -l from $PWD
    if functions -q __cdhooks_orig_cd
        __cdhooks_orig_cd $argv; or return $status
    else
        builtin cd $argv; or return $status
    end
    __cdhooks_transition $from
    return 0
end

function pushd --wraps pushd
    set -l from $PWD
    if functions -q __cdhooks_orig_pushd
        __cdhooks_orig_pushd $argv; or return $status
    else
        builtin pushd $argv; or return $status
    end
    __cdhooks_transition $from
    return 0
end

function popd --wraps popd
    set -l from $PWD
    if functions -q __cdhooks_orig_popd
        __cdhooks_orig_popd $argv; or return $status
    else
        builtin popd $argv; or return $status
    end
    __cdhooks_transition $from
    return 0
end

function __cdhooks_prompt --on-event fish_prompt
    command @CDHOOKS@ prompt --session $fish_pid --cwd $PWD
end

function __cdhooks_exit --on-event fish_exit
    command @CDHOOKS@ exit --session $fish_pid --cwd $PWD
end

command @CDHOOKS@ start --session $fish_pid
"#;
