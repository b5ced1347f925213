//! Built-in commands of the default agent.
//!
//! [`BUILTIN_COMMANDS`] is the immutable descriptor table rendered by `help`;
//! [`BuiltinCommand`] is the closed set of names the dispatcher matches on.

/// Help metadata for one built-in command or sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: Option<&'static str>,
    pub example: Option<&'static str>,
    pub behavior: Option<&'static str>,
    pub options: &'static [&'static str],
    pub sub_commands: &'static [CommandDescriptor],
    pub module: bool,
}

impl CommandDescriptor {
    const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            usage: None,
            example: None,
            behavior: None,
            options: &[],
            sub_commands: &[],
            module: false,
        }
    }

    const fn usage(mut self, usage: &'static str) -> Self {
        self.usage = Some(usage);
        self
    }

    const fn example(mut self, example: &'static str) -> Self {
        self.example = Some(example);
        self
    }

    const fn behavior(mut self, behavior: &'static str) -> Self {
        self.behavior = Some(behavior);
        self
    }

    const fn options(mut self, options: &'static [&'static str]) -> Self {
        self.options = options;
        self
    }

    const fn module(mut self, sub_commands: &'static [CommandDescriptor]) -> Self {
        self.sub_commands = sub_commands;
        self.module = true;
        self
    }

    /// Find a sub-command by exact name.
    pub fn sub_command(&self, name: &str) -> Option<&'static CommandDescriptor> {
        self.sub_commands.iter().find(|sub| sub.name == name)
    }
}

/// Look up a top-level built-in descriptor by exact name.
pub fn descriptor(name: &str) -> Option<&'static CommandDescriptor> {
    BUILTIN_COMMANDS.iter().find(|cmd| cmd.name == name)
}

const BEHAVIOR_FORK_RUN: &str = "Fork & Run";
const BEHAVIOR_API_ONLY: &str = "API Only";

const JOB_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("list", "list of jobs"),
    CommandDescriptor::new("suspend", "suspend specified job id")
        .usage("[job id]")
        .example("1"),
    CommandDescriptor::new("resume", "resume specified job id")
        .usage("[job id]")
        .example("1"),
    CommandDescriptor::new("kill", "kill specified job id")
        .usage("[job id]")
        .example("1"),
];

const TASK_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("list", "list tasks queued on the teamserver"),
    CommandDescriptor::new("clear", "clear all tasks queued on the teamserver"),
];

const PROC_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("list", "display running processes").behavior(BEHAVIOR_API_ONLY),
    CommandDescriptor::new("modules", "lists a specified process loaded modules")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[pid]")
        .example("5632"),
    CommandDescriptor::new("grep", "grep information about the specified process")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[process name]")
        .example("explorer.exe"),
    CommandDescriptor::new("create", "start a process")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[normal/suspended] (--silent) (--no-pipe) [binary] (args)")
        .example("normal C:\\Windows\\System32\\cmd.exe /c whoami")
        .options(&[
            "--silent   do not report process creation output",
            "--no-pipe  do not capture process output",
        ]),
    CommandDescriptor::new("blockdll", "blocks non microsoft signed dlls from loading")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[on/off]")
        .example("on"),
    CommandDescriptor::new("memory", "query for memory regions")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[pid] [memory protection]")
        .example("4028 PAGE_EXECUTE_READWRITE"),
    CommandDescriptor::new("kill", "kill specified process")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[pid]")
        .example("4028"),
];

const DLL_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("inject", "inject a reflective dll into a process")
        .usage("[target pid] [/path/to/file.dll] (args)")
        .example("4028 /tmp/payload.x64.dll"),
    CommandDescriptor::new("spawn", "spawn a sacrificial process and inject a reflective dll")
        .behavior(BEHAVIOR_FORK_RUN)
        .usage("[/path/to/file.dll] (args)")
        .example("/tmp/payload.x64.dll"),
];

const SHELLCODE_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("inject", "inject shellcode into a remote process")
        .usage("[arch] [target pid] [/path/to/shellcode.bin]")
        .example("x64 4028 /tmp/shellcode.x64.bin"),
    CommandDescriptor::new("spawn", "spawn a sacrificial process and inject shellcode")
        .behavior(BEHAVIOR_FORK_RUN)
        .usage("[arch] [/path/to/shellcode.bin]")
        .example("x64 /tmp/shellcode.x64.bin"),
    CommandDescriptor::new("execute", "execute shellcode inside the agent process")
        .usage("[arch] [/path/to/shellcode.bin]")
        .example("x64 /tmp/shellcode.x64.bin"),
];

const TOKEN_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("impersonate", "impersonate a token from the token vault")
        .usage("[token id]")
        .example("1"),
    CommandDescriptor::new("steal", "steal a token from a process")
        .usage("[process id] (handle)")
        .example("1337"),
    CommandDescriptor::new("list", "list the token vault"),
    CommandDescriptor::new("find", "find tokens of other logged on users"),
    CommandDescriptor::new("make", "make a token from user credentials")
        .usage("[domain] [username] [password] (logon type)")
        .example("domain.local Administrator Passw0rd LOGON_NEW_CREDENTIALS")
        .options(&[
            "LOGON_INTERACTIVE",
            "LOGON_NETWORK",
            "LOGON_BATCH",
            "LOGON_SERVICE",
            "LOGON_UNLOCK",
            "LOGON_NETWORK_CLEARTEXT",
            "LOGON_NEW_CREDENTIALS (default)",
        ]),
    CommandDescriptor::new("revert", "revert to the default process token"),
    CommandDescriptor::new("remove", "remove a token from the token vault")
        .usage("[token id]")
        .example("1"),
    CommandDescriptor::new("clear", "remove every token from the token vault"),
    CommandDescriptor::new("getuid", "get the current user id"),
    CommandDescriptor::new("privs-list", "list the current token privileges"),
    CommandDescriptor::new("privs-get", "enable a privilege on the current token")
        .usage("[privilege]")
        .example("SeDebugPrivilege"),
];

const DOTNET_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("inline-execute", "execute a dotnet assembly in the current process")
        .usage("[/path/to/assembly.exe] (args)")
        .example("/tmp/Seatbelt.exe -group=user"),
    CommandDescriptor::new("list-versions", "list installed CLR versions"),
];

const RPORTFWD_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("add", "start a reverse port forward")
        .usage("[bind addr] [bind port] [forward addr] [forward port]")
        .example("0.0.0.0 8080 10.0.0.5 80"),
    CommandDescriptor::new("list", "list reverse port forwards"),
    CommandDescriptor::new("remove", "close and remove a reverse port forward")
        .usage("[socket id]")
        .example("a1b2c3d4"),
    CommandDescriptor::new("clear", "close and remove every reverse port forward"),
];

const SOCKS_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("add", "start a socks5 proxy on the teamserver")
        .usage("[bind port]")
        .example("1080"),
    CommandDescriptor::new("list", "list socks5 proxies"),
    CommandDescriptor::new("kill", "close a socks5 proxy")
        .usage("[socks id]")
        .example("1"),
    CommandDescriptor::new("clear", "close every socks5 proxy"),
];

const TRANSFER_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("list", "list current downloads"),
    CommandDescriptor::new("stop", "stop a download")
        .usage("[file id]")
        .example("a1b2c3d4"),
    CommandDescriptor::new("resume", "resume a download")
        .usage("[file id]")
        .example("a1b2c3d4"),
    CommandDescriptor::new("remove", "stop and remove a download")
        .usage("[file id]")
        .example("a1b2c3d4"),
];

const CONFIG_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("implant.verbose", "enable verbose implant messages")
        .usage("[true/false]")
        .example("true"),
    CommandDescriptor::new("implant.sleep-mask", "enable sleep masking")
        .usage("[true/false]")
        .example("true"),
    CommandDescriptor::new("implant.sleep-obf", "enable sleep obfuscation")
        .usage("[true/false]")
        .example("true"),
    CommandDescriptor::new("implant.sleep-obf.start-addr", "sleep obfuscation thread start address")
        .usage("[address]")
        .example("140737488355328"),
    CommandDescriptor::new("implant.sleep-obf.technique", "sleep obfuscation technique"),
    CommandDescriptor::new("implant.coffee.veh", "use a vectored exception handler for object files")
        .usage("[true/false]")
        .example("true"),
    CommandDescriptor::new("implant.coffee.threaded", "run object files in a separate thread")
        .usage("[true/false]")
        .example("false"),
    CommandDescriptor::new("memory.alloc", "memory allocation technique")
        .usage("[id]")
        .example("1"),
    CommandDescriptor::new("memory.execute", "memory execution technique")
        .usage("[id]")
        .example("1"),
    CommandDescriptor::new("inject.spawn64", "default x64 process to spawn")
        .usage("[path]")
        .example("C:\\Windows\\System32\\notepad.exe"),
    CommandDescriptor::new("inject.spawn32", "default x86 process to spawn")
        .usage("[path]")
        .example("C:\\Windows\\SysWOW64\\notepad.exe"),
    CommandDescriptor::new("inject.spoofaddr", "spoofed thread start address"),
    CommandDescriptor::new("killdate", "date after which the agent exits")
        .usage("[YYYY-MM-DD HH:MM:SS | 0]")
        .example("2030-01-01 00:00:00"),
    CommandDescriptor::new("workinghours", "hours during which the agent calls back")
        .usage("[HH:MM-HH:MM | 0]")
        .example("08:00-17:00"),
];

const NET_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("domain", "display the domain of this host"),
    CommandDescriptor::new("logons", "list users logged onto a host")
        .usage("(host)")
        .example("\\\\dc01"),
    CommandDescriptor::new("sessions", "list sessions on a host")
        .usage("(host)")
        .example("\\\\dc01"),
    CommandDescriptor::new("share", "list shares on a host")
        .usage("(host)")
        .example("\\\\dc01"),
    CommandDescriptor::new("localgroup", "list local groups and their members")
        .usage("(host)")
        .example("\\\\dc01"),
    CommandDescriptor::new("group", "list groups and their members")
        .usage("(host)")
        .example("\\\\dc01"),
    CommandDescriptor::new("users", "list users and user information")
        .usage("(host)")
        .example("\\\\dc01"),
];

const PIVOT_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("list", "list connected agent pivots"),
    CommandDescriptor::new("connect", "connect to a smb pivot")
        .usage("[host] [pipe name]")
        .example("srv01 agent_pipe"),
    CommandDescriptor::new("disconnect", "disconnect a smb pivot")
        .usage("[agent id]")
        .example("a1b2c3d4"),
];

const EXIT_SUBS: &[CommandDescriptor] = &[
    CommandDescriptor::new("thread", "clean up and exit the agent thread"),
    CommandDescriptor::new("process", "clean up and exit the agent process"),
];

/// Every built-in command in declaration order.
pub static BUILTIN_COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor::new("help", "shows help message of specified command"),
    CommandDescriptor::new("sleep", "sets the delay to sleep")
        .usage("[delay] (jitter)")
        .example("10 25"),
    CommandDescriptor::new("interactive", "sets the agent to interactive mode (sleep 0 0)"),
    CommandDescriptor::new("checkin", "request a checkin from the agent"),
    CommandDescriptor::new("task", "task management").module(TASK_SUBS),
    CommandDescriptor::new("job", "job manager").module(JOB_SUBS),
    CommandDescriptor::new("dir", "list specified directory")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("(path) (/s) (/f) (/d) (/b) (/starts x) (/contains x) (/ends x)")
        .example("C:\\Windows /f /ends .exe")
        .options(&[
            "/s         list sub directories",
            "/f         list files only",
            "/d         list directories only",
            "/b         list names only",
            "/starts    name starts with",
            "/contains  name contains",
            "/ends      name ends with",
        ]),
    CommandDescriptor::new("ls", "list specified directory (alias of dir)")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("(path)")
        .example("C:\\Windows"),
    CommandDescriptor::new("cd", "change to specified directory")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[path]")
        .example("C:\\Users"),
    CommandDescriptor::new("cp", "copy file from one location to another")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[from] [to]")
        .example("a.txt b.txt"),
    CommandDescriptor::new("mv", "move file from one location to another")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[from] [to]")
        .example("a.txt b.txt"),
    CommandDescriptor::new("move", "move file from one location to another (alias of mv)")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[from] [to]")
        .example("a.txt b.txt"),
    CommandDescriptor::new("remove", "remove file or directory")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[path]")
        .example("C:\\Temp\\a.txt"),
    CommandDescriptor::new("mkdir", "create new directory")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[path]")
        .example("C:\\Temp\\new"),
    CommandDescriptor::new("pwd", "get current directory").behavior(BEHAVIOR_API_ONLY),
    CommandDescriptor::new("cat", "display content of the specified file")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[path]")
        .example("C:\\Temp\\a.txt"),
    CommandDescriptor::new("type", "display content of the specified file (alias of cat)")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[path]")
        .example("C:\\Temp\\a.txt"),
    CommandDescriptor::new("download", "downloads a specified file")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[remote path]")
        .example("C:\\Temp\\a.txt"),
    CommandDescriptor::new("upload", "uploads a specified file")
        .behavior(BEHAVIOR_API_ONLY)
        .usage("[local path] (remote path)")
        .example("/tmp/a.txt C:\\Temp\\"),
    CommandDescriptor::new("shell", "executes cmd.exe commands and gets the output")
        .behavior(BEHAVIOR_FORK_RUN)
        .usage("[commands]")
        .example("dir C:\\"),
    CommandDescriptor::new("powershell", "executes powershell.exe commands and gets the output")
        .behavior(BEHAVIOR_FORK_RUN)
        .usage("[commands]")
        .example("Get-ChildItem"),
    CommandDescriptor::new("proc", "process enumeration and management").module(PROC_SUBS),
    CommandDescriptor::new("ps", "display running processes (alias of proc list)")
        .behavior(BEHAVIOR_API_ONLY),
    CommandDescriptor::new("dll", "dll spawn and injection modules").module(DLL_SUBS),
    CommandDescriptor::new("shellcode", "shellcode injection techniques").module(SHELLCODE_SUBS),
    CommandDescriptor::new("token", "token manipulation and impersonation").module(TOKEN_SUBS),
    CommandDescriptor::new("inline-execute", "executes an object file")
        .usage("[/path/to/object.o] (args)")
        .example("/tmp/whoami.x64.o"),
    CommandDescriptor::new("dotnet", "execute and manage dotnet assemblies").module(DOTNET_SUBS),
    CommandDescriptor::new("rportfwd", "reverse port forwarding").module(RPORTFWD_SUBS),
    CommandDescriptor::new("socks", "socks5 proxy").module(SOCKS_SUBS),
    CommandDescriptor::new("transfer", "download transfer module").module(TRANSFER_SUBS),
    CommandDescriptor::new("config", "configure the behaviour of the agent").module(CONFIG_SUBS),
    CommandDescriptor::new("screenshot", "takes a screenshot").behavior(BEHAVIOR_API_ONLY),
    CommandDescriptor::new("net", "network and host enumeration module").module(NET_SUBS),
    CommandDescriptor::new("pivot", "pivoting module").module(PIVOT_SUBS),
    CommandDescriptor::new("luid", "get the current logon id"),
    CommandDescriptor::new("klist", "list kerberos tickets")
        .usage("[/all | /luid <luid>]")
        .example("/all"),
    CommandDescriptor::new("purge", "purge a kerberos ticket")
        .usage("/luid [luid]")
        .example("/luid 0x3e7"),
    CommandDescriptor::new("ptt", "import a kerberos ticket")
        .usage("[ticket] (/luid <luid>)")
        .example("doIFoz... /luid 0x3e7"),
    CommandDescriptor::new("exit", "cleanup and exit").module(EXIT_SUBS),
    CommandDescriptor::new("clear", "clears the console"),
];

/// Closed set of built-in command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCommand {
    Help,
    Sleep,
    Interactive,
    Checkin,
    Task,
    Job,
    Dir,
    Cd,
    Cp,
    Mv,
    Remove,
    Mkdir,
    Pwd,
    Shell,
    Proc,
    Ps,
    Dll,
    Shellcode,
    Token,
    InlineExecute,
    Dotnet,
    Rportfwd,
    Socks,
    Transfer,
    Download,
    Cat,
    Upload,
    Powershell,
    Config,
    Screenshot,
    Net,
    Pivot,
    Luid,
    Klist,
    Purge,
    Ptt,
    Exit,
    Clear,
}

impl BuiltinCommand {
    /// Resolve a command word, including aliases. Case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let cmd = match name {
            "help" => Self::Help,
            "sleep" => Self::Sleep,
            "interactive" => Self::Interactive,
            "checkin" => Self::Checkin,
            "task" => Self::Task,
            "job" => Self::Job,
            "dir" | "ls" => Self::Dir,
            "cd" => Self::Cd,
            "cp" => Self::Cp,
            "mv" | "move" => Self::Mv,
            "remove" => Self::Remove,
            "mkdir" => Self::Mkdir,
            "pwd" => Self::Pwd,
            "shell" => Self::Shell,
            "proc" => Self::Proc,
            "ps" => Self::Ps,
            "dll" => Self::Dll,
            "shellcode" => Self::Shellcode,
            "token" => Self::Token,
            "inline-execute" => Self::InlineExecute,
            "dotnet" => Self::Dotnet,
            "rportfwd" => Self::Rportfwd,
            "socks" => Self::Socks,
            "transfer" => Self::Transfer,
            "download" => Self::Download,
            "cat" | "type" => Self::Cat,
            "upload" => Self::Upload,
            "powershell" => Self::Powershell,
            "config" => Self::Config,
            "screenshot" => Self::Screenshot,
            "net" => Self::Net,
            "pivot" => Self::Pivot,
            "luid" => Self::Luid,
            "klist" => Self::Klist,
            "purge" => Self::Purge,
            "ptt" => Self::Ptt,
            "exit" => Self::Exit,
            "clear" => Self::Clear,
            _ => return None,
        };
        Some(cmd)
    }

    /// Commands that never produce a task.
    pub fn is_console_local(self) -> bool {
        matches!(self, Self::Help | Self::Clear)
    }
}
