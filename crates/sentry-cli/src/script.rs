// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Syscall scripts
//!
//! A script is a JSON document with a list of steps. Namespace steps
//! (`mkdir`, `create`, `open`, ...) call the VFS directly to set up a scene;
//! xattr steps place their arguments in guest memory and enter through the
//! syscall dispatcher exactly as a trapped guest call would. Every step prints
//! one strace-like line, and may carry an `expect` that is checked against
//! the raw return value.
//!
//! ```json
//! { "steps": [
//!     { "op": "create", "path": "/f", "mode": "0644" },
//!     { "op": "setxattr", "path": "/f", "name": "user.k", "value": "v" },
//!     { "op": "getxattr", "path": "/f", "name": "user.k", "size": 0, "expect": 1 }
//! ] }
//! ```

use std::fmt;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use sentry_syscalls::abi::{PATH_MAX, XATTR_CREATE, XATTR_LIST_MAX, XATTR_REPLACE, XATTR_SIZE_MAX};
use sentry_syscalls::{errno_name, handle_syscall, GuestAddr, GuestMemoryMap, SyscallArgs, Task, XattrSyscall};
use sentry_vfs::{FsCore, FsResult, ObjectType, OpenOptions, PID};
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

pub const PATH_ADDR: GuestAddr = GuestAddr(0x1_0000);
pub const NAME_ADDR: GuestAddr = GuestAddr(0x2_0000);
pub const VALUE_ADDR: GuestAddr = GuestAddr(0x3_0000);
pub const LIST_ADDR: GuestAddr = GuestAddr(0x6_0000);
const NAME_REGION: usize = 0x1000;

/// pid of the process a script starts in
pub const INITIAL_PID: u32 = 1;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid script {}", path.display()))
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct ScriptStep {
    pub step: Step,
    pub expect: Option<Expect>,
}

#[derive(Deserialize)]
struct RawStep {
    op: String,
    #[serde(default)]
    expect: Option<Expect>,
    #[serde(flatten)]
    args: Map<String, Value>,
}

/// Expected raw return value of a step: a number, or an errno name such as
/// `"ENODATA"` for a failure
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expect {
    Value(i64),
    Errno(String),
}

impl Expect {
    pub fn matches(&self, ret: i64) -> bool {
        match self {
            Expect::Value(value) => *value == ret,
            Expect::Errno(name) => ret < 0 && errno_name(-ret as i32).eq_ignore_ascii_case(name),
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Value(value) => write!(f, "{value}"),
            Expect::Errno(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Fifo,
    Socket,
    Chr,
    Blk,
}

impl From<NodeKind> for ObjectType {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Fifo => ObjectType::Fifo,
            NodeKind::Socket => ObjectType::Socket,
            NodeKind::Chr => ObjectType::CharDevice,
            NodeKind::Blk => ObjectType::BlockDevice,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Register a child of the current process and continue as it
    Process { pid: u32, uid: u32, gid: u32 },
    Chdir { path: String },
    Mkdir { path: String, mode: u32 },
    Create { path: String, mode: u32 },
    Symlink { target: String, path: String },
    Mknod { path: String, kind: NodeKind, mode: u32 },
    Chmod { path: String, mode: u32 },
    Chown { path: String, uid: u32, gid: u32 },
    Unlink { path: String },
    Open { path: String, options: OpenOptions },
    Close { fd: i32 },
    Xattr { call: XattrSyscall, args: XattrArgs },
}

/// Arguments of an xattr step. Which ones are required depends on the call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XattrArgs {
    pub path: Option<String>,
    pub fd: Option<i32>,
    pub name: Option<String>,
    pub value: Option<String>,
    /// Buffer size passed to the call. Defaults to the value length for
    /// set, and to the largest allowed buffer for get and list.
    pub size: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_flags")]
    pub flags: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessArgs {
    pid: u32,
    #[serde(default)]
    uid: u32,
    #[serde(default)]
    gid: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModeArgs {
    path: String,
    #[serde(default, deserialize_with = "deserialize_mode")]
    mode: Option<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SymlinkArgs {
    target: String,
    path: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MknodArgs {
    path: String,
    kind: NodeKind,
    #[serde(default, deserialize_with = "deserialize_mode")]
    mode: Option<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ChownArgs {
    path: String,
    uid: u32,
    gid: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OpenArgs {
    path: String,
    #[serde(default = "default_true")]
    read: bool,
    #[serde(default)]
    write: bool,
    #[serde(default)]
    path_only: bool,
    #[serde(default)]
    directory: bool,
    #[serde(default)]
    nofollow: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CloseArgs {
    fd: i32,
}

fn default_true() -> bool {
    true
}

/// Modes are given as octal strings (`"0644"`) or plain numbers
fn deserialize_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u32),
        Octal(String),
    }
    match Repr::deserialize(deserializer)? {
        Repr::Number(mode) => Ok(Some(mode)),
        Repr::Octal(text) => u32::from_str_radix(text.trim_start_matches("0o"), 8)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid octal mode {text:?}"))),
    }
}

/// Flags are a number or a list of `"create"` / `"replace"`. Unknown bits
/// pass through so the syscall can reject them.
fn deserialize_flags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Raw(u32),
        Names(Vec<String>),
    }
    match Repr::deserialize(deserializer)? {
        Repr::Raw(flags) => Ok(flags),
        Repr::Names(names) => names.iter().try_fold(0, |flags, name| match name.as_str() {
            "create" => Ok(flags | XATTR_CREATE),
            "replace" => Ok(flags | XATTR_REPLACE),
            other => Err(D::Error::custom(format!("unknown xattr flag {other:?}"))),
        }),
    }
}

fn parse_args<T: DeserializeOwned>(op: &str, args: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(args)).with_context(|| format!("invalid arguments for {op}"))
}

impl TryFrom<RawStep> for ScriptStep {
    type Error = anyhow::Error;

    fn try_from(raw: RawStep) -> Result<Self> {
        let RawStep { op, expect, args } = raw;
        let step = match op.as_str() {
            "process" => {
                let a: ProcessArgs = parse_args(&op, args)?;
                Step::Process {
                    pid: a.pid,
                    uid: a.uid,
                    gid: a.gid,
                }
            }
            "chdir" => Step::Chdir {
                path: parse_args::<PathArgs>(&op, args)?.path,
            },
            "mkdir" => {
                let a: ModeArgs = parse_args(&op, args)?;
                Step::Mkdir {
                    path: a.path,
                    mode: a.mode.unwrap_or(0o755),
                }
            }
            "create" => {
                let a: ModeArgs = parse_args(&op, args)?;
                Step::Create {
                    path: a.path,
                    mode: a.mode.unwrap_or(0o644),
                }
            }
            "symlink" => {
                let a: SymlinkArgs = parse_args(&op, args)?;
                Step::Symlink {
                    target: a.target,
                    path: a.path,
                }
            }
            "mknod" => {
                let a: MknodArgs = parse_args(&op, args)?;
                Step::Mknod {
                    path: a.path,
                    kind: a.kind,
                    mode: a.mode.unwrap_or(0o644),
                }
            }
            "chmod" => {
                let a: ModeArgs = parse_args(&op, args)?;
                let mode = a.mode.ok_or_else(|| anyhow!("chmod needs a mode"))?;
                Step::Chmod { path: a.path, mode }
            }
            "chown" => {
                let a: ChownArgs = parse_args(&op, args)?;
                Step::Chown {
                    path: a.path,
                    uid: a.uid,
                    gid: a.gid,
                }
            }
            "open" => {
                let a: OpenArgs = parse_args(&op, args)?;
                Step::Open {
                    path: a.path,
                    options: OpenOptions {
                        read: a.read,
                        write: a.write,
                        path_only: a.path_only,
                        directory: a.directory,
                        nofollow: a.nofollow,
                    },
                }
            }
            "unlink" => Step::Unlink {
                path: parse_args::<PathArgs>(&op, args)?.path,
            },
            "close" => Step::Close {
                fd: parse_args::<CloseArgs>(&op, args)?.fd,
            },
            name => {
                let call = XattrSyscall::from_name(name).ok_or_else(|| anyhow!("unknown op {name:?}"))?;
                let args: XattrArgs = parse_args(&op, args)?;
                check_xattr_args(call, &args)?;
                Step::Xattr { call, args }
            }
        };
        Ok(ScriptStep { step, expect })
    }
}

fn check_xattr_args(call: XattrSyscall, args: &XattrArgs) -> Result<()> {
    if call.uses_descriptor() {
        if args.fd.is_none() || args.path.is_some() {
            bail!("{} takes an fd and no path", call.name());
        }
    } else if args.path.is_none() || args.fd.is_some() {
        bail!("{} takes a path and no fd", call.name());
    }

    let takes_name = !matches!(
        call,
        XattrSyscall::ListXattr | XattrSyscall::LListXattr | XattrSyscall::FListXattr
    );
    if takes_name != args.name.is_some() {
        bail!(
            "{} {} a name",
            call.name(),
            if takes_name { "needs" } else { "does not take" }
        );
    }
    Ok(())
}

/// One executed step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub ret: i64,
    pub line: String,
    pub matched: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub outcomes: Vec<StepOutcome>,
}

impl ScriptReport {
    pub fn mismatches(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.matched).count()
    }
}

/// Executes script steps as one guest process at a time
pub struct ScriptRunner<'a> {
    core: &'a FsCore,
    mem: GuestMemoryMap,
    pid: PID,
}

impl<'a> ScriptRunner<'a> {
    /// Start as [`INITIAL_PID`] with the configured default identity
    pub fn new(core: &'a FsCore) -> Result<Self> {
        let mem = GuestMemoryMap::new(&[
            (PATH_ADDR, 2 * PATH_MAX),
            (NAME_ADDR, NAME_REGION),
            (VALUE_ADDR, 2 * XATTR_SIZE_MAX),
            (LIST_ADDR, 2 * XATTR_LIST_MAX),
        ])?;
        let security = &core.config().security;
        let pid = core.register_process(INITIAL_PID, 0, security.default_uid, security.default_gid)?;
        Ok(Self { core, mem, pid })
    }

    pub fn pid(&self) -> PID {
        self.pid
    }

    /// Run every step, writing one line per step to `out`
    pub fn run<W: Write>(&mut self, script: &Script, out: &mut W) -> Result<ScriptReport> {
        let mut report = ScriptReport::default();
        for (index, step) in script.steps.iter().enumerate() {
            let (ret, mut line) = self
                .execute(&step.step)
                .with_context(|| format!("step {index} failed to execute"))?;
            let matched = step.expect.as_ref().map_or(true, |expect| expect.matches(ret));
            if !matched {
                if let Some(expect) = &step.expect {
                    line.push_str(&format!("  # expected {expect}"));
                }
            }
            writeln!(out, "{line}")?;
            report.outcomes.push(StepOutcome { ret, line, matched });
        }
        info!(
            steps = report.outcomes.len(),
            mismatches = report.mismatches(),
            "script finished"
        );
        Ok(report)
    }

    /// Execute one step: the raw return value and its printed line
    pub fn execute(&mut self, step: &Step) -> Result<(i64, String)> {
        let pid = self.pid;
        let core = self.core;
        let (ret, call) = match step {
            Step::Process {
                pid: child,
                uid,
                gid,
            } => {
                let ret = vfs_ret(core.register_process(*child, pid.as_u32(), *uid, *gid).map(|new_pid| {
                    self.pid = new_pid;
                }));
                (ret, format!("process({child}, uid={uid}, gid={gid})"))
            }
            Step::Chdir { path } => (vfs_ret(core.set_cwd(&pid, path)), format!("chdir({path:?})")),
            Step::Mkdir { path, mode } => (
                vfs_ret(core.mkdir(&pid, path, *mode)),
                format!("mkdir({path:?}, {mode:#o})"),
            ),
            Step::Create { path, mode } => (
                vfs_ret(core.create_file(&pid, path, *mode)),
                format!("creat({path:?}, {mode:#o})"),
            ),
            Step::Symlink { target, path } => (
                vfs_ret(core.symlink(&pid, target, path)),
                format!("symlink({target:?}, {path:?})"),
            ),
            Step::Mknod { path, kind, mode } => (
                vfs_ret(core.mknod(&pid, path, (*kind).into(), *mode)),
                format!("mknod({path:?}, {kind:?}, {mode:#o})"),
            ),
            Step::Chmod { path, mode } => (
                vfs_ret(core.set_mode(&pid, path, *mode)),
                format!("chmod({path:?}, {mode:#o})"),
            ),
            Step::Chown { path, uid, gid } => (
                vfs_ret(core.set_owner(&pid, path, *uid, *gid)),
                format!("chown({path:?}, {uid}, {gid})"),
            ),
            Step::Unlink { path } => (vfs_ret(core.unlink(&pid, path)), format!("unlink({path:?})")),
            Step::Open { path, options } => {
                let ret = match core.open(&pid, path, options) {
                    Ok(fd) => fd as i64,
                    Err(err) => -(err.errno() as i64),
                };
                (ret, format!("open({path:?}, {})", open_flags(options)))
            }
            Step::Close { fd } => (vfs_ret(core.close(&pid, *fd)), format!("close({fd})")),
            Step::Xattr { call, args } => return self.execute_xattr(*call, args),
        };
        Ok((ret, format!("{call} = {}", render_ret(ret))))
    }

    fn execute_xattr(&mut self, call: XattrSyscall, args: &XattrArgs) -> Result<(i64, String)> {
        let mut regs = [0u64; 6];
        let mut shown = Vec::new();

        if let Some(fd) = args.fd {
            // Sign-extended as the guest register would hold it
            regs[0] = fd as i64 as u64;
            shown.push(fd.to_string());
        } else if let Some(path) = &args.path {
            self.mem
                .write_cstr(PATH_ADDR, path)
                .context("path does not fit the guest path buffer")?;
            regs[0] = PATH_ADDR.0;
            shown.push(format!("{path:?}"));
        }
        if let Some(name) = &args.name {
            self.mem
                .write_cstr(NAME_ADDR, name)
                .context("name does not fit the guest name buffer")?;
            shown.push(format!("{name:?}"));
        }

        let size = match call {
            XattrSyscall::SetXattr | XattrSyscall::LSetXattr | XattrSyscall::FSetXattr => {
                let value = args.value.as_deref().unwrap_or_default();
                self.mem
                    .write(VALUE_ADDR, value.as_bytes())
                    .context("value does not fit the guest value buffer")?;
                let size = args.size.unwrap_or(value.len());
                regs[1] = NAME_ADDR.0;
                regs[2] = VALUE_ADDR.0;
                regs[3] = size as u64;
                regs[4] = args.flags as u64;
                shown.push(format!("{value:?}"));
                shown.push(size.to_string());
                shown.push(render_flags(args.flags));
                size
            }
            XattrSyscall::GetXattr | XattrSyscall::LGetXattr | XattrSyscall::FGetXattr => {
                let size = args.size.unwrap_or(XATTR_SIZE_MAX);
                regs[1] = NAME_ADDR.0;
                regs[2] = VALUE_ADDR.0;
                regs[3] = size as u64;
                shown.push(size.to_string());
                size
            }
            XattrSyscall::ListXattr | XattrSyscall::LListXattr | XattrSyscall::FListXattr => {
                let size = args.size.unwrap_or(XATTR_LIST_MAX);
                regs[1] = LIST_ADDR.0;
                regs[2] = size as u64;
                shown.push(size.to_string());
                size
            }
            XattrSyscall::RemoveXattr | XattrSyscall::LRemoveXattr | XattrSyscall::FRemoveXattr => {
                regs[1] = NAME_ADDR.0;
                0
            }
        };

        let ret = {
            let task = Task::new(self.core, self.pid, &self.mem);
            handle_syscall(&task, call.number(), &SyscallArgs::new(regs))
        };
        debug!(syscall = call.name(), ret, "replayed");

        let mut line = format!("{}({}) = {}", call.name(), shown.join(", "), render_ret(ret));
        if ret > 0 && size > 0 {
            match call {
                XattrSyscall::GetXattr | XattrSyscall::LGetXattr | XattrSyscall::FGetXattr => {
                    let value = self.mem.read(VALUE_ADDR, ret as usize)?;
                    line.push_str(&format!(" {:?}", String::from_utf8_lossy(&value)));
                }
                XattrSyscall::ListXattr | XattrSyscall::LListXattr | XattrSyscall::FListXattr => {
                    let list = self.mem.read(LIST_ADDR, ret as usize)?;
                    line.push_str(&format!(" {:?}", split_name_list(&list)));
                }
                _ => {}
            }
        }
        Ok((ret, line))
    }
}

fn vfs_ret(result: FsResult<()>) -> i64 {
    match result {
        Ok(()) => 0,
        Err(err) => -(err.errno() as i64),
    }
}

fn render_ret(ret: i64) -> String {
    if ret < 0 {
        format!("-1 {}", errno_name(-ret as i32))
    } else {
        ret.to_string()
    }
}

fn render_flags(flags: u32) -> String {
    let mut parts = Vec::new();
    if flags & XATTR_CREATE != 0 {
        parts.push("XATTR_CREATE".to_string());
    }
    if flags & XATTR_REPLACE != 0 {
        parts.push("XATTR_REPLACE".to_string());
    }
    let rest = flags & !(XATTR_CREATE | XATTR_REPLACE);
    if rest != 0 {
        parts.push(format!("{rest:#x}"));
    }
    if parts.is_empty() {
        "0".to_string()
    } else {
        parts.join("|")
    }
}

fn open_flags(options: &OpenOptions) -> String {
    let mut parts = vec![match (options.read, options.write) {
        (_, true) if options.read => "O_RDWR",
        (_, true) => "O_WRONLY",
        _ => "O_RDONLY",
    }];
    if options.path_only {
        parts.push("O_PATH");
    }
    if options.directory {
        parts.push("O_DIRECTORY");
    }
    if options.nofollow {
        parts.push("O_NOFOLLOW");
    }
    parts.join("|")
}

/// Split a NUL-separated name list
pub fn split_name_list(list: &[u8]) -> Vec<String> {
    list.split(|&b| b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect()
}
