//! Validation and encoding of built-in commands.
//!
//! [`plan`] checks a token sequence against the rules of one built-in and, on
//! success, returns the operator facing description together with the encoded
//! [`TaskRequest`]. Planning never mutates state; local files are read here so
//! that a missing file fails before any task id exists.

use crate::builtins::BuiltinCommand;
use crate::error::DispatchError;
use crate::files::FileAccess;
use crate::tokenizer::{is_number, join_at, raw_tail};
use crate::wire::{b64, flag, TaskKind, TaskRequest};

const CMD_PROGRAM: &str = "c:\\windows\\system32\\cmd.exe";
const POWERSHELL_PROGRAM: &str = "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe";
const NET_DEFAULT_HOST: &str = "\\\\localhost";
const SHELLCODE_TECHNIQUE: &str = "default";

/// Where the id of a planned task comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// Minted by the teamserver together with the transcript line.
    Server,
    /// Generated by the console; used by subsystems the teamserver does not sequence.
    Local,
}

/// A validated built-in command, ready to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub description: String,
    pub request: TaskRequest,
    pub id_source: IdSource,
}

impl PlannedTask {
    fn server(description: impl Into<String>, request: TaskRequest) -> Self {
        Self {
            description: description.into(),
            request,
            id_source: IdSource::Server,
        }
    }

    fn local(description: impl Into<String>, request: TaskRequest) -> Self {
        Self {
            description: description.into(),
            request,
            id_source: IdSource::Local,
        }
    }
}

type PlanResult = Result<PlannedTask, DispatchError>;

/// Validate and encode a task producing built-in.
///
/// `line` is the raw command line; commands forwarding a shell command line
/// take their arguments from it verbatim.
pub fn plan(command: BuiltinCommand, tokens: &[String], line: &str, files: &dyn FileAccess) -> PlanResult {
    match command {
        BuiltinCommand::Sleep => sleep(tokens),
        BuiltinCommand::Interactive => {
            max_args(tokens, 1)?;
            Ok(PlannedTask::server(
                "Tasked agent to enter interactive mode",
                TaskRequest::new(TaskKind::Sleep, &["0", "0"]),
            ))
        }
        BuiltinCommand::Checkin => {
            max_args(tokens, 1)?;
            Ok(PlannedTask::server(
                "Tasked agent to send back a checkin request",
                TaskRequest::bare(TaskKind::Checkin),
            ))
        }
        BuiltinCommand::Task => task_queue(tokens),
        BuiltinCommand::Job => job(tokens),
        BuiltinCommand::Dir => dir(tokens),
        BuiltinCommand::Cd => single_path(tokens, "cd", "Tasked agent to change directory: "),
        BuiltinCommand::Remove => single_path(tokens, "remove", "Tasked agent to remove file or directory: "),
        BuiltinCommand::Mkdir => single_path(tokens, "mkdir", "Tasked agent to create new directory: "),
        BuiltinCommand::Download => single_path(tokens, "download", "Tasked agent to download a file "),
        BuiltinCommand::Cat => single_path(tokens, "cat", "Tasked agent to display content of "),
        BuiltinCommand::Cp => copy_or_move(tokens, "cp", "copy"),
        BuiltinCommand::Mv => copy_or_move(tokens, "mv", "move"),
        BuiltinCommand::Pwd => {
            max_args(tokens, 1)?;
            Ok(PlannedTask::server(
                "Tasked agent to get current working directory",
                TaskRequest::new(TaskKind::Fs, &["pwd"]),
            ))
        }
        BuiltinCommand::Upload => upload(tokens, files),
        BuiltinCommand::Shell => shell_like(
            tokens,
            line,
            CMD_PROGRAM,
            "/c ",
            "Tasked agent to execute a shell command",
        ),
        BuiltinCommand::Powershell => shell_like(
            tokens,
            line,
            POWERSHELL_PROGRAM,
            "-C ",
            "Tasked agent to execute a powershell command/script",
        ),
        BuiltinCommand::Proc => proc(tokens),
        BuiltinCommand::Ps => {
            max_args(tokens, 1)?;
            Ok(process_list())
        }
        BuiltinCommand::Dll => dll(tokens, files),
        BuiltinCommand::Shellcode => shellcode(tokens, files),
        BuiltinCommand::Token => token(tokens),
        BuiltinCommand::InlineExecute => inline_execute(tokens, line, files),
        BuiltinCommand::Dotnet => dotnet(tokens, line, files),
        BuiltinCommand::Rportfwd => rportfwd(tokens),
        BuiltinCommand::Socks => socks(tokens),
        BuiltinCommand::Transfer => transfer(tokens),
        BuiltinCommand::Config => config(tokens),
        BuiltinCommand::Screenshot => Ok(PlannedTask::server(
            "Tasked agent to take a screenshot",
            TaskRequest::bare(TaskKind::Screenshot),
        )),
        BuiltinCommand::Net => net(tokens),
        BuiltinCommand::Pivot => pivot(tokens),
        BuiltinCommand::Luid => Ok(PlannedTask::server(
            "Tasked agent to get the current logon ID",
            TaskRequest::new(TaskKind::Kerberos, &["luid"]),
        )),
        BuiltinCommand::Klist => klist(tokens),
        BuiltinCommand::Purge => purge(tokens),
        BuiltinCommand::Ptt => ptt(tokens),
        BuiltinCommand::Exit => exit(tokens),
        BuiltinCommand::Help | BuiltinCommand::Clear => Err(DispatchError::NotFound(line.to_string())),
    }
}

fn min_args(tokens: &[String], min: usize) -> Result<(), DispatchError> {
    if tokens.len() < min {
        return Err(DispatchError::NotEnoughArguments);
    }
    Ok(())
}

fn max_args(tokens: &[String], max: usize) -> Result<(), DispatchError> {
    if tokens.len() > max {
        return Err(DispatchError::TooManyArguments);
    }
    Ok(())
}

fn unknown_sub(tokens: &[String]) -> DispatchError {
    DispatchError::SubCommandNotFound {
        command: tokens[0].clone(),
        sub: tokens.get(1).cloned().unwrap_or_default(),
    }
}

fn require_number(value: &str, what: &str) -> Result<(), DispatchError> {
    if !is_number(value) {
        return Err(DispatchError::invalid(format!("{} is not a number: {}", what, value)));
    }
    Ok(())
}

fn require_bool(value: &str) -> Result<bool, DispatchError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(DispatchError::invalid("Wrong arguments")),
    }
}

fn load(files: &dyn FileAccess, path: &str) -> Result<Vec<u8>, DispatchError> {
    files
        .read_file(path)
        .ok_or_else(|| DispatchError::FileNotFound(path.to_string()))
}

fn sleep(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    max_args(tokens, 3)?;

    let delay = &tokens[1];
    if delay.starts_with('-') {
        return Err(DispatchError::invalid("\"sleep\" doesn't support negative delays"));
    }
    if !is_number(delay) {
        return Err(DispatchError::invalid("Invalid delay"));
    }

    match tokens.get(2) {
        Some(jitter) => {
            let value: f64 = jitter
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| DispatchError::invalid("Invalid jitter"))?;
            if value < 0.0 {
                return Err(DispatchError::invalid("\"sleep\" doesn't support negative jitters"));
            }
            if value > 100.0 {
                return Err(DispatchError::invalid("The jitter can't be larger than 100"));
            }
            Ok(PlannedTask::server(
                format!("Tasked agent to sleep for {} seconds with {}% jitter", delay, jitter),
                TaskRequest::new(TaskKind::Sleep, &[delay.as_str(), jitter.as_str()]),
            ))
        }
        None => Ok(PlannedTask::server(
            format!("Tasked agent to sleep for {} seconds", delay),
            TaskRequest::new(TaskKind::Sleep, &[delay.as_str(), "0"]),
        )),
    }
}

fn task_queue(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    match tokens[1].as_str() {
        "list" => Ok(PlannedTask::server(
            "Tasked teamserver to list commands in task queue",
            TaskRequest::new(TaskKind::TaskQueue, &["list"]),
        )),
        "clear" => Ok(PlannedTask::server(
            "Tasked teamserver to clear all commands from task queue",
            TaskRequest::new(TaskKind::TaskQueue, &["clear"]),
        )),
        _ => Err(unknown_sub(tokens)),
    }
}

fn job(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    let sub = tokens[1].as_str();
    match sub {
        "list" => Ok(PlannedTask::server(
            "Tasked agent to list jobs",
            TaskRequest::new(TaskKind::Job, &["list", "0"]),
        )),
        "suspend" | "resume" | "kill" => {
            min_args(tokens, 3)?;
            let id = tokens[2].as_str();
            Ok(PlannedTask::server(
                format!("Tasked agent to {} job: {}", sub, id),
                TaskRequest::new(TaskKind::Job, &[sub, id]),
            ))
        }
        _ => Err(unknown_sub(tokens)),
    }
}

#[derive(Default)]
struct DirOptions {
    sub_dirs: bool,
    files_only: bool,
    dirs_only: bool,
    list_only: bool,
    starts: String,
    contains: String,
    ends: String,
}

fn dir(tokens: &[String]) -> PlanResult {
    let mut options = DirOptions::default();

    let (path, description) = match tokens.get(1) {
        None => (".".to_string(), "Tasked agent to list current directory".to_string()),
        Some(path) => (path.clone(), format!("Tasked agent to list {}", path)),
    };

    let mut i = 2;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "/s" => options.sub_dirs = true,
            "/f" => options.files_only = true,
            "/d" => options.dirs_only = true,
            "/b" => options.list_only = true,
            filter @ ("/starts" | "/contains" | "/ends") => {
                let value = tokens.get(i + 1).ok_or(DispatchError::NotEnoughArguments)?.clone();
                match filter {
                    "/starts" => options.starts = value,
                    "/contains" => options.contains = value,
                    _ => options.ends = value,
                }
                i += 1;
            }
            other => return Err(DispatchError::invalid(format!("Unknown parameter {}", other))),
        }
        i += 1;
    }

    if options.files_only && options.dirs_only {
        return Err(DispatchError::invalid("Cannot set both /f and /d"));
    }

    let fields = [
        "dir".to_string(),
        b64(&path),
        flag(options.sub_dirs).to_string(),
        flag(options.files_only).to_string(),
        flag(options.dirs_only).to_string(),
        flag(options.list_only).to_string(),
        b64(&options.starts),
        b64(&options.contains),
        b64(&options.ends),
    ];

    Ok(PlannedTask::server(description, TaskRequest::new(TaskKind::Fs, &fields)))
}

/// `<command> <path...>` where the path is every remaining token.
fn single_path(tokens: &[String], sub: &str, description: &str) -> PlanResult {
    min_args(tokens, 2)?;
    let path = join_at(tokens, 1);
    Ok(PlannedTask::server(
        format!("{}{}", description, path),
        TaskRequest::new(TaskKind::Fs, &[sub.to_string(), b64(&path)]),
    ))
}

fn copy_or_move(tokens: &[String], sub: &str, verb: &str) -> PlanResult {
    min_args(tokens, 3)?;
    let from = &tokens[1];
    let to = join_at(tokens, 2);
    Ok(PlannedTask::server(
        format!("Tasked agent to {} file {} to {}", verb, from, to),
        TaskRequest::new(TaskKind::Fs, &[sub.to_string(), b64(from), b64(&to)]),
    ))
}

fn upload(tokens: &[String], files: &dyn FileAccess) -> PlanResult {
    min_args(tokens, 2)?;

    let local = &tokens[1];
    let content = load(files, local)?;
    let file_name = local.rsplit('/').next().unwrap_or(local.as_str());

    let remote = if tokens.len() == 2 {
        file_name.to_string()
    } else {
        let remote = join_at(tokens, 2);
        // a directory target keeps the local file name
        if remote.ends_with('\\') {
            format!("{}{}", remote, file_name)
        } else {
            remote
        }
    };

    Ok(PlannedTask::server(
        format!("Tasked agent to upload a file {} to {}", local, remote),
        TaskRequest::new(TaskKind::Fs, &["upload".to_string(), b64(&remote), b64(&content)]),
    ))
}

fn process_create_request(flags: &str, verbose: bool, piped: bool, program: &str, args: &str) -> TaskRequest {
    TaskRequest::new(
        TaskKind::Proc,
        &[
            "4".to_string(),
            flags.to_string(),
            flag(verbose).to_string(),
            flag(piped).to_string(),
            b64(program),
            b64(args),
        ],
    )
}

fn shell_like(tokens: &[String], line: &str, program: &str, prefix: &str, description: &str) -> PlanResult {
    min_args(tokens, 2)?;
    let args = format!("{}{}", prefix, raw_tail(line, 1));
    Ok(PlannedTask::server(
        description,
        process_create_request("0", false, true, program, &args),
    ))
}

fn process_list() -> PlannedTask {
    PlannedTask::server(
        "Tasked agent to enumerate and list all processes",
        TaskRequest::new(TaskKind::ProcList, &[flag(false)]),
    )
}

fn proc(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    match tokens[1].as_str() {
        "list" => Ok(process_list()),
        "modules" => {
            min_args(tokens, 3)?;
            require_number(&tokens[2], "Process id")?;
            Ok(PlannedTask::server(
                "Tasked agent to list all modules/dll of a remote process",
                TaskRequest::new(TaskKind::Proc, &["2", tokens[2].as_str()]),
            ))
        }
        "grep" => {
            min_args(tokens, 3)?;
            Ok(PlannedTask::server(
                "Tasked agent to grep information about the specified process",
                TaskRequest::new(TaskKind::Proc, &["3", tokens[2].as_str()]),
            ))
        }
        "create" => proc_create(tokens),
        "blockdll" => {
            min_args(tokens, 3)?;
            let description = match tokens[2].as_str() {
                "on" => "Tasked agent to enable blocking non microsoft signed dlls",
                "off" => "Tasked agent to disable blocking non microsoft signed dlls",
                _ => return Err(DispatchError::invalid("Argument not valid")),
            };
            Ok(PlannedTask::server(
                description,
                TaskRequest::new(TaskKind::Proc, &["5", tokens[2].as_str()]),
            ))
        }
        "memory" => {
            min_args(tokens, 4)?;
            require_number(&tokens[2], "Process id")?;
            Ok(PlannedTask::server(
                format!(
                    "Tasked agent to query for {} memory regions from {}",
                    tokens[3], tokens[2]
                ),
                TaskRequest::new(TaskKind::Proc, &["6", tokens[2].as_str(), tokens[3].as_str()]),
            ))
        }
        "kill" => {
            min_args(tokens, 3)?;
            if !is_number(&tokens[2]) {
                return Err(DispatchError::invalid("Specified process id to kill is not a number."));
            }
            Ok(PlannedTask::server(
                "Tasked agent to kill a process",
                TaskRequest::new(TaskKind::Proc, &["7", tokens[2].as_str()]),
            ))
        }
        _ => Err(unknown_sub(tokens)),
    }
}

fn proc_create(tokens: &[String]) -> PlanResult {
    min_args(tokens, 4)?;

    let flags = match tokens[2].as_str() {
        "normal" => "0",
        // CREATE_SUSPENDED
        "suspended" => "4",
        other => {
            return Err(DispatchError::invalid(format!(
                "Process creation flag not found: {}",
                other
            )))
        }
    };

    let mut index = 3;
    let mut verbose = true;
    let mut piped = true;
    if tokens.get(index).map(String::as_str) == Some("--silent") {
        verbose = false;
        index += 1;
    }
    if tokens.get(index).map(String::as_str) == Some("--no-pipe") {
        piped = false;
        index += 1;
    }

    let program = tokens.get(index).ok_or(DispatchError::NotEnoughArguments)?;
    let mut args = format!("\"{}\"", program);
    for arg in &tokens[index + 1..] {
        args.push(' ');
        args.push_str(arg);
    }

    let description = if flags == "4" {
        format!("Tasked agent to spawn a process in suspended state: {}", program)
    } else {
        format!("Tasked agent to spawn a process: {}", program)
    };

    Ok(PlannedTask::server(
        description,
        process_create_request(flags, verbose, piped, program, &args),
    ))
}

fn dll(tokens: &[String], files: &dyn FileAccess) -> PlanResult {
    min_args(tokens, 2)?;
    match tokens[1].as_str() {
        "inject" => {
            min_args(tokens, 4)?;
            let pid = &tokens[2];
            let path = &tokens[3];
            require_number(pid, "Process id")?;
            let args = join_at(tokens, 4);
            let dll = load(files, path)?;
            Ok(PlannedTask::server(
                format!("Tasked agent to inject a reflective dll: {}", path),
                TaskRequest::new(TaskKind::InjectDll, &[pid.clone(), b64(&dll), b64(&args)]),
            ))
        }
        "spawn" => {
            min_args(tokens, 3)?;
            let path = &tokens[2];
            let args = join_at(tokens, 3);
            let dll = load(files, path)?;
            Ok(PlannedTask::server(
                format!("Tasked agent to spawn a reflective dll: {}", path),
                TaskRequest::new(TaskKind::SpawnDll, &[b64(&dll), b64(&args)]),
            ))
        }
        _ => Err(unknown_sub(tokens)),
    }
}

fn require_arch(arch: &str) -> Result<(), DispatchError> {
    match arch {
        "x64" | "x86" => Ok(()),
        _ => Err(DispatchError::invalid(format!(
            "Incorrect process arch specified: {}",
            arch
        ))),
    }
}

fn shellcode(tokens: &[String], files: &dyn FileAccess) -> PlanResult {
    min_args(tokens, 2)?;
    let sub = tokens[1].as_str();
    match sub {
        "inject" => {
            min_args(tokens, 5)?;
            let arch = &tokens[2];
            let pid = &tokens[3];
            require_arch(arch)?;
            require_number(pid, "Process id")?;
            let shellcode = load(files, &tokens[4])?;
            Ok(PlannedTask::server(
                "Tasked agent to inject shellcode into a remote process",
                TaskRequest::new(
                    TaskKind::Shellcode,
                    &[
                        "inject".to_string(),
                        SHELLCODE_TECHNIQUE.to_string(),
                        arch.clone(),
                        pid.clone(),
                        b64(&shellcode),
                    ],
                ),
            ))
        }
        "spawn" | "execute" => {
            min_args(tokens, 4)?;
            let arch = &tokens[2];
            require_arch(arch)?;
            let shellcode = load(files, &tokens[3])?;
            let description = if sub == "spawn" {
                format!("Tasked agent to fork and inject a {} shellcode", arch)
            } else {
                format!("Tasked agent to self inject a {} shellcode", arch)
            };
            Ok(PlannedTask::server(
                description,
                TaskRequest::new(
                    TaskKind::Shellcode,
                    &[
                        sub.to_string(),
                        SHELLCODE_TECHNIQUE.to_string(),
                        arch.clone(),
                        b64(&shellcode),
                    ],
                ),
            ))
        }
        _ => Err(unknown_sub(tokens)),
    }
}

/// Numeric logon type for a `token make` logon type name.
pub fn logon_type(name: &str) -> Option<&'static str> {
    let code = match name {
        "LOGON_INTERACTIVE" => "2",
        "LOGON_NETWORK" => "3",
        "LOGON_BATCH" => "4",
        "LOGON_SERVICE" => "5",
        "LOGON_UNLOCK" => "7",
        "LOGON_NETWORK_CLEARTEXT" => "8",
        "LOGON_NEW_CREDENTIALS" => "9",
        _ => return None,
    };
    Some(code)
}

fn token(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    let request = |fields: &[&str]| TaskRequest::new(TaskKind::Token, fields);

    match tokens[1].as_str() {
        "impersonate" => {
            min_args(tokens, 3)?;
            Ok(PlannedTask::server(
                "Tasked agent to impersonate a process token",
                request(&["impersonate", tokens[2].as_str()]),
            ))
        }
        "steal" => {
            min_args(tokens, 3)?;
            max_args(tokens, 4)?;
            require_number(&tokens[2], "Process id")?;
            let handle = tokens.get(3).map(String::as_str).unwrap_or("0");
            Ok(PlannedTask::server(
                "Tasked agent to steal a process token",
                request(&["steal", tokens[2].as_str(), handle]),
            ))
        }
        "list" => Ok(PlannedTask::server(
            "Tasked agent to list token vault",
            request(&["list"]),
        )),
        "find" => Ok(PlannedTask::server(
            "Tasked agent to find tokens",
            request(&["find"]),
        )),
        "make" => {
            min_args(tokens, 5)?;
            max_args(tokens, 6)?;
            let (domain, user, password) = (&tokens[2], &tokens[3], &tokens[4]);
            let logon = match tokens.get(5) {
                Some(name) => logon_type(name).ok_or_else(|| DispatchError::invalid("Invalid token type"))?,
                None => "9",
            };
            Ok(PlannedTask::server(
                format!("Tasked agent to make a new network token for {}\\{}", domain, user),
                TaskRequest::new(
                    TaskKind::Token,
                    &[
                        "make".to_string(),
                        b64(domain),
                        b64(user),
                        b64(password),
                        logon.to_string(),
                    ],
                ),
            ))
        }
        "revert" => Ok(PlannedTask::server(
            "Tasked agent to revert the process token",
            request(&["revert"]),
        )),
        "remove" => {
            min_args(tokens, 3)?;
            Ok(PlannedTask::server(
                "Tasked agent to remove a token from the token vault",
                request(&["remove", tokens[2].as_str()]),
            ))
        }
        "clear" => Ok(PlannedTask::server(
            "Tasked agent to clear token vault",
            request(&["clear"]),
        )),
        "getuid" => Ok(PlannedTask::server(
            "Tasked agent to get current user id",
            request(&["getuid"]),
        )),
        "privs-list" => Ok(PlannedTask::server(
            "Tasked agent to list current token privileges",
            request(&["privs-list"]),
        )),
        "privs-get" => {
            min_args(tokens, 3)?;
            max_args(tokens, 3)?;
            Ok(PlannedTask::server(
                format!("Tasked agent to enable a privilege: {}", tokens[2]),
                request(&["privs-get", tokens[2].as_str()]),
            ))
        }
        _ => Err(unknown_sub(tokens)),
    }
}

fn inline_execute(tokens: &[String], line: &str, files: &dyn FileAccess) -> PlanResult {
    min_args(tokens, 2)?;
    let path = &tokens[1];
    let object = load(files, path)?;
    let args = raw_tail(line, 2);
    Ok(PlannedTask::server(
        format!("Tasked agent to execute an object file: {}", path),
        TaskRequest::new(
            TaskKind::InlineExecute,
            &["go".to_string(), b64(&object), b64(&args), "default".to_string()],
        ),
    ))
}

fn dotnet(tokens: &[String], line: &str, files: &dyn FileAccess) -> PlanResult {
    min_args(tokens, 2)?;
    match tokens[1].as_str() {
        "inline-execute" => {
            min_args(tokens, 3)?;
            let path = &tokens[2];
            let assembly = load(files, path)?;
            let args = raw_tail(line, 3);
            Ok(PlannedTask::server(
                format!("Tasked agent to inline execute a dotnet assembly: {}", path),
                TaskRequest::new(TaskKind::AssemblyInlineExecute, &[b64(&assembly), b64(&args)]),
            ))
        }
        "list-versions" => Ok(PlannedTask::server(
            "Tasked agent to list available dotnet versions",
            TaskRequest::bare(TaskKind::AssemblyListVersions),
        )),
        _ => Err(unknown_sub(tokens)),
    }
}

fn rportfwd(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    match tokens[1].as_str() {
        "add" => {
            min_args(tokens, 6)?;
            let (bind_addr, bind_port, fwd_addr, fwd_port) = (&tokens[2], &tokens[3], &tokens[4], &tokens[5]);
            require_number(bind_port, "Port")?;
            require_number(fwd_port, "Port")?;
            Ok(PlannedTask::server(
                format!(
                    "Tasked agent to start a reverse port forward {}:{} to {}:{}",
                    bind_addr, bind_port, fwd_addr, fwd_port
                ),
                TaskRequest::new(
                    TaskKind::Socket,
                    &[
                        "rportfwd add",
                        bind_addr.as_str(),
                        bind_port.as_str(),
                        fwd_addr.as_str(),
                        fwd_port.as_str(),
                    ],
                ),
            ))
        }
        "list" => Ok(PlannedTask::server(
            "Tasked agent to list all reverse port forwards",
            TaskRequest::new(TaskKind::Socket, &["rportfwd list"]),
        )),
        "remove" => {
            min_args(tokens, 3)?;
            Ok(PlannedTask::server(
                format!("Tasked agent to close and remove a reverse port forward {}", tokens[2]),
                TaskRequest::new(TaskKind::Socket, &["rportfwd remove", tokens[2].as_str()]),
            ))
        }
        "clear" => Ok(PlannedTask::server(
            "Tasked agent to close and clear all reverse port forwards",
            TaskRequest::new(TaskKind::Socket, &["rportfwd clear"]),
        )),
        _ => Err(unknown_sub(tokens)),
    }
}

fn socks(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    match tokens[1].as_str() {
        "add" => {
            min_args(tokens, 3)?;
            require_number(&tokens[2], "Port")?;
            Ok(PlannedTask::local(
                format!("Tasked teamserver to start a socks5 proxy on port {}", tokens[2]),
                TaskRequest::new(TaskKind::Socket, &["socks add", tokens[2].as_str()]),
            ))
        }
        "list" => Ok(PlannedTask::local(
            "Tasked teamserver to list socks5 proxies",
            TaskRequest::new(TaskKind::Socket, &["socks list"]),
        )),
        "kill" => {
            min_args(tokens, 3)?;
            Ok(PlannedTask::local(
                format!("Tasked teamserver to close socks5 proxy {}", tokens[2]),
                TaskRequest::new(TaskKind::Socket, &["socks kill", tokens[2].as_str()]),
            ))
        }
        "clear" => Ok(PlannedTask::local(
            "Tasked teamserver to close every socks5 proxy",
            TaskRequest::new(TaskKind::Socket, &["socks clear"]),
        )),
        _ => Err(unknown_sub(tokens)),
    }
}

fn transfer(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    let sub = tokens[1].as_str();
    let description = match sub {
        "list" => {
            return Ok(PlannedTask::server(
                "Tasked agent to list current downloads",
                TaskRequest::new(TaskKind::Transfer, &["list"]),
            ))
        }
        "stop" => "Tasked agent to stop a download",
        "resume" => "Tasked agent to resume a download",
        "remove" => "Tasked agent to stop and remove a download",
        _ => return Err(unknown_sub(tokens)),
    };
    min_args(tokens, 3)?;
    Ok(PlannedTask::server(
        description,
        TaskRequest::new(TaskKind::Transfer, &[sub, tokens[2].as_str()]),
    ))
}

fn config(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    let key = tokens[1].as_str();

    if matches!(key, "implant.sleep-obf.technique" | "inject.spoofaddr") {
        return Err(DispatchError::NotImplemented);
    }

    let (description, value) = match key {
        "implant.sleep-mask"
        | "implant.coffee.veh"
        | "implant.coffee.threaded"
        | "implant.verbose"
        | "implant.sleep-obf" => {
            min_args(tokens, 3)?;
            max_args(tokens, 3)?;
            let enabled = require_bool(&tokens[2])?;
            let what = match key {
                "implant.sleep-mask" => "sleep-mask",
                "implant.coffee.veh" => "coffee VEH",
                "implant.coffee.threaded" => "coffee threading",
                "implant.verbose" => "verbose messaging",
                _ => "sleep-obf",
            };
            (
                format!("Tasked agent to configure {}: {}", what, tokens[2]),
                flag(enabled).to_string(),
            )
        }
        "implant.sleep-obf.start-addr" | "memory.alloc" | "memory.execute" => {
            min_args(tokens, 3)?;
            max_args(tokens, 3)?;
            if !is_number(&tokens[2]) {
                return Err(DispatchError::invalid("Wrong argument: Is not a number"));
            }
            let what = match key {
                "implant.sleep-obf.start-addr" => "sleep-mask thread start addr",
                "memory.alloc" => "memory allocation",
                _ => "memory execution",
            };
            (
                format!("Tasked agent to configure {}: {}", what, tokens[2]),
                tokens[2].clone(),
            )
        }
        "inject.spawn64" | "inject.spawn32" => {
            min_args(tokens, 3)?;
            let path = join_at(tokens, 2);
            let arch = if key == "inject.spawn64" { "x64" } else { "x86" };
            (
                format!("Tasked agent to configure default {} target process: {}", arch, path),
                b64(&path),
            )
        }
        "killdate" => {
            min_args(tokens, 3)?;
            max_args(tokens, 4)?;
            let date = join_at(tokens, 2);
            if tokens.len() == 3 && date != "0" {
                return Err(DispatchError::invalid("Invalid arguments"));
            }
            (format!("Tasked agent to configure the KillDate: {}", date), date)
        }
        "workinghours" => {
            min_args(tokens, 3)?;
            max_args(tokens, 3)?;
            (
                format!("Tasked agent to configure the working hours: {}", tokens[2]),
                tokens[2].clone(),
            )
        }
        _ => return Err(DispatchError::invalid("Config does not exist")),
    };

    Ok(PlannedTask::server(
        description,
        TaskRequest::new(TaskKind::Config, &[key, value.as_str()]),
    ))
}

fn net(tokens: &[String]) -> PlanResult {
    if tokens.len() < 2 {
        return Err(DispatchError::MissingSubCommand);
    }

    let (code, description) = match tokens[1].as_str() {
        "domain" => {
            return Ok(PlannedTask::server(
                "Tasked agent to display domain for this host",
                TaskRequest::new(TaskKind::Net, &["1", ""]),
            ))
        }
        "logons" => ("2", "Tasked agent to list users logged onto a host"),
        "sessions" => ("3", "Tasked agent to list sessions on a host"),
        "share" => ("6", "Tasked agent to list shares on a host"),
        "localgroup" => ("7", "Tasked agent to list local groups and users in local groups"),
        "group" => ("8", "Tasked agent to list groups and users in groups"),
        "users" => ("9", "Tasked agent to list users and user information"),
        _ => return Err(unknown_sub(tokens)),
    };

    let host = tokens.get(2).map(String::as_str).unwrap_or(NET_DEFAULT_HOST);
    Ok(PlannedTask::server(
        description,
        TaskRequest::new(TaskKind::Net, &[code, host]),
    ))
}

fn pivot(tokens: &[String]) -> PlanResult {
    if tokens.len() < 2 {
        return Err(DispatchError::MissingSubCommand);
    }

    match tokens[1].as_str() {
        "list" => Ok(PlannedTask::server(
            "Tasked agent to list connected agent pivots",
            TaskRequest::new(TaskKind::Pivot, &["1"]),
        )),
        "connect" => {
            min_args(tokens, 4)?;
            let pipe = format!("\\\\{}\\pipe\\{}", tokens[2], tokens[3]);
            Ok(PlannedTask::server(
                format!("Tasked agent to connect to a smb pivot: {}", pipe),
                TaskRequest::new(TaskKind::Pivot, &["10", pipe.as_str()]),
            ))
        }
        "disconnect" => {
            min_args(tokens, 3)?;
            Ok(PlannedTask::server(
                format!("Tasked agent to disconnect a smb pivot: {}", tokens[2]),
                TaskRequest::new(TaskKind::Pivot, &["11", tokens[2].as_str()]),
            ))
        }
        _ => Err(unknown_sub(tokens)),
    }
}

fn klist(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    max_args(tokens, 3)?;

    let fields: Vec<&str> = match tokens[1].as_str() {
        "/all" if tokens.len() == 2 => vec!["klist", "/all"],
        "/luid" if tokens.len() == 3 => vec!["klist", "/luid", tokens[2].as_str()],
        _ => return Err(DispatchError::invalid("Invalid parameter")),
    };

    Ok(PlannedTask::server(
        "Tasked agent to list Kerberos tickets",
        TaskRequest::new(TaskKind::Kerberos, &fields),
    ))
}

fn purge(tokens: &[String]) -> PlanResult {
    min_args(tokens, 3)?;
    max_args(tokens, 3)?;
    if tokens[1] != "/luid" {
        return Err(DispatchError::invalid("Invalid parameter"));
    }
    Ok(PlannedTask::server(
        "Tasked agent to purge a Kerberos ticket",
        TaskRequest::new(TaskKind::Kerberos, &["purge", tokens[2].as_str()]),
    ))
}

fn ptt(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    max_args(tokens, 4)?;

    let luid = match tokens.len() {
        2 => "0",
        4 if tokens[2] == "/luid" => tokens[3].as_str(),
        _ => return Err(DispatchError::invalid("Invalid arguments")),
    };

    Ok(PlannedTask::server(
        "Tasked agent to import a Kerberos ticket",
        TaskRequest::new(TaskKind::Kerberos, &["ptt", tokens[1].as_str(), luid]),
    ))
}

fn exit(tokens: &[String]) -> PlanResult {
    min_args(tokens, 2)?;
    max_args(tokens, 2)?;
    let description = match tokens[1].as_str() {
        "thread" => "Tasked agent to cleanup and exit the thread",
        "process" => "Tasked agent to cleanup and exit the process",
        other => return Err(DispatchError::invalid(format!("Option not found: {}", other))),
    };
    Ok(PlannedTask::server(
        description,
        TaskRequest::new(TaskKind::Exit, &[tokens[1].as_str()]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeFiles(HashMap<String, Vec<u8>>);

    impl FakeFiles {
        fn with(path: &str, content: &[u8]) -> Self {
            let mut files = Self::default();
            files.0.insert(path.to_string(), content.to_vec());
            files
        }
    }

    impl FileAccess for FakeFiles {
        fn read_file(&self, path: &str) -> Option<Vec<u8>> {
            self.0.get(path).cloned()
        }

        fn file_exists(&self, path: &str) -> bool {
            self.0.contains_key(path)
        }
    }

    fn run(line: &str) -> PlanResult {
        run_with(line, &FakeFiles::default())
    }

    fn run_with(line: &str, files: &FakeFiles) -> PlanResult {
        let tokens = tokenize(line);
        let command = BuiltinCommand::from_name(&tokens[0]).unwrap();
        plan(command, &tokens, line, files)
    }

    fn message(result: PlanResult) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_sleep_validation() {
        assert_eq!(message(run("sleep")), "Not enough arguments");
        assert_eq!(message(run("sleep 1 2 3")), "Too many arguments");
        assert_eq!(message(run("sleep -5")), "\"sleep\" doesn't support negative delays");
        assert_eq!(message(run("sleep ten")), "Invalid delay");
        assert_eq!(message(run("sleep 10 abc")), "Invalid jitter");
        assert_eq!(message(run("sleep 10 -1")), "\"sleep\" doesn't support negative jitters");
        assert!(message(run("sleep 10 101")).contains("jitter can't be larger than 100"));
    }

    #[test]
    fn test_sleep_encoding() {
        let task = run("sleep 10 50").unwrap();
        assert_eq!(task.request.kind, TaskKind::Sleep);
        assert_eq!(task.request.payload, "10;50");
        assert_eq!(task.id_source, IdSource::Server);
        assert_eq!(task.description, "Tasked agent to sleep for 10 seconds with 50% jitter");

        assert_eq!(run("sleep 5").unwrap().request.payload, "5;0");
    }

    #[test]
    fn test_dir_flags() {
        let task = run("dir C:\\Windows /s /b /ends .exe").unwrap();
        let fields = task.request.fields();
        assert_eq!(fields[0], "dir");
        assert_eq!(fields[1], b64("C:\\Windows"));
        assert_eq!(&fields[2..6], &["TRUE", "FALSE", "FALSE", "TRUE"]);
        assert_eq!(fields[8], b64(".exe"));

        assert_eq!(message(run("dir C:\\temp /f /d")), "Cannot set both /f and /d");
        assert_eq!(message(run("ls C:\\temp /x")), "Unknown parameter /x");
        assert_eq!(message(run("ls C:\\temp /starts")), "Not enough arguments");
    }

    #[test]
    fn test_dir_defaults_to_current_directory() {
        let task = run("ls").unwrap();
        assert_eq!(task.request.fields()[1], b64("."));
        assert_eq!(task.description, "Tasked agent to list current directory");
    }

    #[test]
    fn test_trailing_path_arguments_are_joined() {
        let task = run("cd C:\\Program Files").unwrap();
        assert_eq!(task.request.payload, format!("cd;{}", b64("C:\\Program Files")));

        let task = run("cp a.txt C:\\some dir\\b.txt").unwrap();
        assert_eq!(
            task.request.payload,
            format!("cp;{};{}", b64("a.txt"), b64("C:\\some dir\\b.txt"))
        );

        assert_eq!(message(run("mkdir")), "Not enough arguments");
        assert_eq!(message(run("mv a")), "Not enough arguments");
    }

    #[test]
    fn test_upload_reads_local_file() {
        let files = FakeFiles::with("/tmp/tool.exe", b"MZ");

        let task = run_with("upload /tmp/tool.exe", &files).unwrap();
        assert_eq!(
            task.request.payload,
            format!("upload;{};{}", b64("tool.exe"), b64("MZ"))
        );

        let task = run_with("upload /tmp/tool.exe C:\\Temp\\", &files).unwrap();
        assert_eq!(task.request.fields()[1], b64("C:\\Temp\\tool.exe"));

        assert_eq!(
            message(run_with("upload /tmp/missing.exe", &files)),
            "File not found: /tmp/missing.exe"
        );
    }

    #[test]
    fn test_shell_keeps_raw_quotes() {
        let line = "shell echo \"hello  world\"";
        let task = run(line).unwrap();
        let fields = task.request.fields();
        assert_eq!(&fields[..4], &["4", "0", "FALSE", "TRUE"]);
        assert_eq!(fields[4], b64(CMD_PROGRAM));
        assert_eq!(fields[5], b64("/c echo \"hello  world\""));

        assert_eq!(message(run("shell")), "Not enough arguments");
    }

    #[test]
    fn test_powershell_prefix() {
        let task = run("powershell Get-Process").unwrap();
        assert_eq!(task.request.fields()[5], b64("-C Get-Process"));
    }

    #[test]
    fn test_proc_create() {
        let task = run("proc create suspended --silent notepad.exe a.txt").unwrap();
        let fields = task.request.fields();
        assert_eq!(&fields[..4], &["4", "4", "FALSE", "TRUE"]);
        assert_eq!(fields[4], b64("notepad.exe"));
        assert_eq!(fields[5], b64("\"notepad.exe\" a.txt"));
        assert!(task.description.contains("suspended"));

        assert_eq!(
            message(run("proc create hidden notepad.exe")),
            "Process creation flag not found: hidden"
        );
        assert_eq!(message(run("proc create normal --silent")), "Not enough arguments");
    }

    #[test]
    fn test_proc_sub_commands() {
        assert_eq!(run("proc kill 1234").unwrap().request.payload, "7;1234");
        assert_eq!(
            message(run("proc kill abc")),
            "Specified process id to kill is not a number."
        );
        assert_eq!(run("proc blockdll on").unwrap().request.payload, "5;on");
        assert_eq!(message(run("proc blockdll maybe")), "Argument not valid");
        assert_eq!(run("proc list").unwrap().request.kind, TaskKind::ProcList);
        assert_eq!(message(run("ps aux")), "Too many arguments");
        assert_eq!(
            message(run("proc frob")),
            "Sub command not found in \"proc\": frob"
        );
    }

    #[test]
    fn test_dll_and_shellcode_need_files() {
        let files = FakeFiles::with("/tmp/sc.bin", b"\x90\x90");

        let task = run_with("shellcode inject x64 4028 /tmp/sc.bin", &files).unwrap();
        assert_eq!(
            task.request.payload,
            format!("inject;default;x64;4028;{}", b64(b"\x90\x90"))
        );

        assert_eq!(
            message(run_with("shellcode spawn arm /tmp/sc.bin", &files)),
            "Incorrect process arch specified: arm"
        );
        assert_eq!(
            message(run_with("shellcode execute x86 /tmp/none.bin", &files)),
            "File not found: /tmp/none.bin"
        );
        assert_eq!(
            message(run_with("dll inject 4028 /tmp/none.dll", &files)),
            "File not found: /tmp/none.dll"
        );
    }

    #[test]
    fn test_token_make_logon_types() {
        let task = run("token make CORP alice s3cret LOGON_NETWORK").unwrap();
        assert_eq!(
            task.request.payload,
            format!("make;{};{};{};3", b64("CORP"), b64("alice"), b64("s3cret"))
        );
        assert!(run("token make CORP alice s3cret")
            .unwrap()
            .request
            .payload
            .ends_with(";9"));
        assert_eq!(
            message(run("token make CORP alice s3cret LOGON_WHATEVER")),
            "Invalid token type"
        );
        assert_eq!(message(run("token make CORP alice")), "Not enough arguments");
        assert_eq!(run("token steal 1234").unwrap().request.payload, "steal;1234;0");
    }

    #[test]
    fn test_inline_execute_args_from_raw_line() {
        let files = FakeFiles::with("/tmp/a.o", b"obj");
        let task = run_with("inline-execute /tmp/a.o \"quoted arg\" 2", &files).unwrap();
        let fields = task.request.fields();
        assert_eq!(fields[0], "go");
        assert_eq!(fields[2], b64("\"quoted arg\" 2"));

        let task = run_with("dotnet inline-execute /tmp/a.o -group=user", &files).unwrap();
        assert_eq!(task.request.fields()[1], b64("-group=user"));
    }

    #[test]
    fn test_raw_args_start_at_token_boundary() {
        let task = run("  shell whoami").unwrap();
        assert_eq!(task.request.fields()[5], b64("/c whoami"));

        let files = FakeFiles::with("/tmp/a.o", b"obj");
        let task = run_with("inline-execute  /tmp/a.o arg1", &files).unwrap();
        assert_eq!(task.request.fields()[2], b64("arg1"));

        let files = FakeFiles::with("/tmp/my tools/a.exe", b"MZ");
        let task = run_with("dotnet inline-execute \"/tmp/my tools/a.exe\" -x", &files).unwrap();
        assert_eq!(task.request.fields()[1], b64("-x"));

        let task = run_with("dotnet  inline-execute  \"/tmp/my tools/a.exe\"", &files).unwrap();
        assert_eq!(task.request.fields()[1], b64(""));
    }

    #[test]
    fn test_socks_uses_local_ids() {
        let task = run("socks add 1080").unwrap();
        assert_eq!(task.id_source, IdSource::Local);
        assert_eq!(task.request.payload, "socks add;1080");
        assert_eq!(message(run("socks add http")), "Port is not a number: http");
        assert_eq!(run("rportfwd list").unwrap().id_source, IdSource::Server);
    }

    #[test]
    fn test_config_boolean_literals() {
        let task = run("config implant.verbose true").unwrap();
        assert_eq!(task.request.payload, "implant.verbose;TRUE");
        assert_eq!(message(run("config implant.verbose TRUE")), "Wrong arguments");
        assert_eq!(message(run("config implant.verbose")), "Not enough arguments");
    }

    #[test]
    fn test_config_keys_are_exclusive() {
        // veh must not also be evaluated as a threaded key
        let task = run("config implant.coffee.veh false").unwrap();
        assert_eq!(task.description, "Tasked agent to configure coffee VEH: false");
        assert_eq!(task.request.payload, "implant.coffee.veh;FALSE");
    }

    #[test]
    fn test_config_other_keys() {
        assert_eq!(
            message(run("config memory.alloc fast")),
            "Wrong argument: Is not a number"
        );
        assert_eq!(message(run("config inject.spoofaddr 1")), "Not implemented");
        assert_eq!(message(run("config nope 1")), "Config does not exist");
        assert_eq!(
            run("config killdate 2030-01-01 00:00:00").unwrap().request.payload,
            "killdate;2030-01-01 00:00:00"
        );
        assert_eq!(message(run("config killdate tomorrow")), "Invalid arguments");
    }

    #[test]
    fn test_net_and_pivot_codes() {
        assert_eq!(run("net share").unwrap().request.payload, "6;\\\\localhost");
        assert_eq!(run("net users \\\\dc01").unwrap().request.payload, "9;\\\\dc01");
        assert_eq!(run("net domain").unwrap().request.payload, "1;");
        assert_eq!(
            run("pivot connect srv01 agent_pipe").unwrap().request.payload,
            "10;\\\\srv01\\pipe\\agent_pipe"
        );
        assert_eq!(run("pivot disconnect 1a2b").unwrap().request.payload, "11;1a2b");
        assert_eq!(message(run("pivot")), "Specify a sub command for the given module.");
    }

    #[test]
    fn test_kerberos_commands() {
        assert_eq!(run("klist /all").unwrap().request.payload, "klist;/all");
        assert_eq!(run("klist /luid 0x3e7").unwrap().request.payload, "klist;/luid;0x3e7");
        assert_eq!(message(run("klist /luid")), "Invalid parameter");
        assert_eq!(run("purge /luid 0x3e7").unwrap().request.payload, "purge;0x3e7");
        assert_eq!(run("ptt doIF").unwrap().request.payload, "ptt;doIF;0");
        assert_eq!(message(run("ptt doIF /luid")), "Invalid arguments");
    }

    #[test]
    fn test_exit() {
        assert_eq!(run("exit thread").unwrap().request.payload, "thread");
        assert_eq!(message(run("exit now")), "Option not found: now");
        assert_eq!(message(run("exit")), "Not enough arguments");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let first = run("token make CORP alice s3cret").unwrap();
        let second = run("token make CORP alice s3cret").unwrap();
        assert_eq!(first, second);
    }
}
