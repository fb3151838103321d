//! End-to-end transitions with real `sh` scripts on disk.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::rc::Rc;

use cdhooks_core::{
    AbsolutePath, EngineConfig, Execution, FileSessionStore, GuardState, LegacyPolicy,
    ScriptKind, ScriptSource, SessionStore, Severity, StepStatus, StorageConfig,
    TransitionEngine, TransitionMode, VirtualNavigator,
};
use tempfile::TempDir;

struct Env {
    temp: TempDir,
    storage: StorageConfig,
    log: PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("base"));
        let log = temp.path().join("events.log");
        Self { temp, storage, log }
    }

    fn dir(&self, rel: &str) -> AbsolutePath {
        let path = self.temp.path().join("tree").join(rel);
        std::fs::create_dir_all(&path).unwrap();
        AbsolutePath::from_path(&path).unwrap()
    }

    fn tree(&self) -> AbsolutePath {
        self.dir("")
    }

    fn script(&self, dir: &AbsolutePath, kind: ScriptKind, body: &str) {
        let path = self.storage.script_path(dir, kind);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    /// Script that appends `<kind> <path> <args> <pwd>` to the event log.
    fn logging_script(&self, dir: &AbsolutePath, kind: ScriptKind) {
        self.script(
            dir,
            kind,
            &format!(
                "echo \"{kind} __PATH__ $* $(pwd)\" >> '{}'\n",
                self.log.display()
            ),
        );
    }

    fn engine(&self, config: EngineConfig) -> TransitionEngine {
        TransitionEngine::builder()
            .storage(self.storage.clone())
            .config(config)
            .session_store(FileSessionStore::new(self.storage.clone()))
            .navigator(Rc::new(VirtualNavigator::default()))
            .build()
            .unwrap()
    }

    fn events(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn physical(dir: &AbsolutePath) -> String {
    std::fs::canonicalize(dir.as_path())
        .unwrap()
        .display()
        .to_string()
}

#[test]
fn scripts_run_in_order_with_placeholder_args_and_cwd() {
    let env = Env::new();
    let a = env.dir("a");
    let b = env.dir("a/b");
    let x = env.dir("x");
    env.logging_script(&b, ScriptKind::Leave);
    env.logging_script(&a, ScriptKind::Leave);
    env.logging_script(&x, ScriptKind::Enter);

    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("it").unwrap();
    let report = engine
        .transition_with_args(
            &mut ctx,
            &b,
            &x,
            TransitionMode::Normal,
            &["arg1".to_string()],
        )
        .unwrap();

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(
        env.events(),
        vec![
            format!("leave {} arg1 {}", b, physical(&b)),
            format!("leave {} arg1 {}", a, physical(&a)),
            format!("enter {} arg1 {}", x, physical(&x)),
        ]
    );
}

#[test]
fn leave_hooks_registered_by_script_run_after_it() {
    let env = Env::new();
    let a = env.dir("a");
    let b = env.dir("a/b");
    let log = env.log.display().to_string();
    env.script(
        &b,
        ScriptKind::Leave,
        &format!(
            "echo \"leave b\" >> '{log}'\n\
             echo \"echo hook-one >> '{log}'\" >> \"$CDHOOKS_LEAVE_HOOKS\"\n\
             echo \"echo hook-two >> '{log}'\" >> \"$CDHOOKS_LEAVE_HOOKS\"\n"
        ),
    );
    env.script(&a, ScriptKind::Leave, &format!("echo \"leave a\" >> '{log}'\n"));

    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("it").unwrap();
    engine
        .transition(&mut ctx, &b, &env.tree(), TransitionMode::Normal)
        .unwrap();

    assert_eq!(env.events(), vec!["leave b", "hook-one", "hook-two", "leave a"]);
    assert!(ctx.hooks.is_empty());
}

#[test]
fn lost_leave_hook_file_is_reported_without_hiding_the_exit_status() {
    let env = Env::new();
    let a = env.dir("a");
    env.script(&a, ScriptKind::Leave, "rm -f \"$CDHOOKS_LEAVE_HOOKS\"\n");

    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("it").unwrap();
    let report = engine
        .transition(&mut ctx, &a, &env.tree(), TransitionMode::Normal)
        .unwrap();

    match &report.steps[0].status {
        StepStatus::Completed { script, .. } => assert_eq!(
            script.execution,
            Execution::Ran {
                source: ScriptSource::Current,
                exit_code: Some(0)
            }
        ),
        other => panic!("unexpected step {other:?}"),
    }
    assert!(report
        .diagnostics
        .all()
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("leave hooks")));
}

#[test]
fn scripts_see_the_session_id() {
    let env = Env::new();
    let a = env.dir("a");
    env.script(
        &a,
        ScriptKind::Enter,
        &format!("echo \"$CDHOOKS_SESSION\" >> '{}'\n", env.log.display()),
    );

    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("shell-77").unwrap();
    engine
        .transition(&mut ctx, &env.tree(), &a, TransitionMode::Normal)
        .unwrap();

    assert_eq!(env.events(), vec!["shell-77"]);
}

#[test]
fn enter_scripts_cannot_register_leave_hooks() {
    let env = Env::new();
    let a = env.dir("a");
    env.script(
        &a,
        ScriptKind::Enter,
        "test -z \"$CDHOOKS_LEAVE_HOOKS\"\n",
    );

    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("it").unwrap();
    let report = engine
        .transition(&mut ctx, &env.tree(), &a, TransitionMode::Normal)
        .unwrap();

    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
}

#[test]
fn failing_script_is_reported_and_siblings_still_run() {
    let env = Env::new();
    let a = env.dir("a");
    let b = env.dir("a/b");
    env.script(&a, ScriptKind::Enter, "exit 7\n");
    env.logging_script(&b, ScriptKind::Enter);

    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("it").unwrap();
    let report = engine
        .transition(&mut ctx, &env.tree(), &b, TransitionMode::Normal)
        .unwrap();

    assert_eq!(env.events().len(), 1);
    let messages: Vec<_> = report.diagnostics.all().iter().map(|d| &d.message).collect();
    assert!(messages.iter().any(|m| m.contains("status 7")), "{messages:?}");
}

#[test]
fn recreated_directory_is_blocked_until_reset() {
    let env = Env::new();
    let a = env.dir("a");
    let b = env.dir("a/b");
    env.logging_script(&a, ScriptKind::Enter);
    env.logging_script(&b, ScriptKind::Enter);

    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("it").unwrap();
    engine
        .transition(&mut ctx, &env.tree(), &b, TransitionMode::Normal)
        .unwrap();
    assert_eq!(env.events().len(), 2);

    // Replace /a/b with a new directory at the same path.
    let held = env.temp.path().join("held");
    std::fs::rename(b.as_path(), &held).unwrap();
    std::fs::create_dir(b.as_path()).unwrap();

    let report = engine
        .transition(&mut ctx, &env.tree(), &b, TransitionMode::Normal)
        .unwrap();
    assert_eq!(env.events().len(), 3, "only /a should have run again");
    let blocking: Vec<_> = report
        .diagnostics
        .all()
        .iter()
        .filter(|d| d.severity == Severity::Blocking)
        .collect();
    assert_eq!(blocking.len(), 1);
    assert!(blocking[0].message.contains("enter.sh"));

    engine.inode_guard().reset(&b).unwrap();
    engine
        .transition(&mut ctx, &env.tree(), &b, TransitionMode::Normal)
        .unwrap();
    assert_eq!(env.events().len(), 5);
}

#[test]
fn legacy_scripts_follow_the_configured_policy() {
    let env = Env::new();
    let a = env.dir("a");
    let legacy = a.as_path().join(".enter.sh");
    std::fs::write(
        &legacy,
        format!("echo \"legacy __PATH__\" >> '{}'\n", env.log.display()),
    )
    .unwrap();

    let warn_only = env.engine(EngineConfig::default());
    let mut ctx = warn_only.load_session("it").unwrap();
    let report = warn_only
        .transition(&mut ctx, &env.tree(), &a, TransitionMode::Normal)
        .unwrap();
    assert!(env.events().is_empty());
    assert!(legacy.exists());
    assert!(report
        .diagnostics
        .all()
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("legacy")));

    let run_legacy = env.engine(EngineConfig {
        legacy_policy: LegacyPolicy::RunLegacy,
        ..EngineConfig::default()
    });
    run_legacy
        .transition(&mut ctx, &env.tree(), &a, TransitionMode::Reenter)
        .unwrap();
    assert_eq!(env.events(), vec![format!("legacy {}", a)]);

    let migrate = env.engine(EngineConfig {
        legacy_policy: LegacyPolicy::AutoMigrate,
        ..EngineConfig::default()
    });
    migrate
        .transition(&mut ctx, &env.tree(), &a, TransitionMode::Reenter)
        .unwrap();
    assert!(!legacy.exists());
    assert!(env.storage.script_path(&a, ScriptKind::Enter).is_file());
    assert_eq!(env.events().len(), 2);
}

#[test]
fn session_guard_is_idle_on_disk_after_transition() {
    let env = Env::new();
    let a = env.dir("a");
    let engine = env.engine(EngineConfig::default());
    let mut ctx = engine.load_session("disk").unwrap();

    engine
        .transition(&mut ctx, &env.tree(), &a, TransitionMode::Normal)
        .unwrap();

    let store = FileSessionStore::new(env.storage.clone());
    let state = store.load("disk").unwrap();
    assert_eq!(state.guard, GuardState::Idle);
    assert_eq!(state.last_location, Some(a));
    assert!(Path::new(&env.storage.session_file("disk")).is_file());
}
