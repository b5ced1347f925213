//! End-to-end handling of one operator command line.
//!
//! `dispatch` tokenizes, resolves against an immutable registry snapshot,
//! validates, and only then mints a task id, submits and records. Any
//! failure becomes a single `[-]` transcript line and leaves the correlator
//! untouched.

use tracing::{debug, info, warn};

use crate::agent::{AgentCommandSpec, AgentContext, SessionInfo};
use crate::builtins::BuiltinCommand;
use crate::command::{self, PlannedTask};
use crate::correlator::TaskCorrelator;
use crate::error::DispatchError;
use crate::extension::{self, ExtensionRuntime, NullRuntime};
use crate::files::{FileAccess, LocalFiles};
use crate::help;
use crate::registry::{CommandRegistry, ExtensionCommand, Resolved};
use crate::tokenizer::{split_quoted, tokenize};
use crate::transcript::Transcript;
use crate::transport::Transport;
use crate::wire::{TaskKind, TaskRequest};

/// Console of one agent session.
pub struct Dispatcher<S: Transcript, T: Transport> {
    agent_id: String,
    context: AgentContext,
    session: SessionInfo,
    registry: CommandRegistry,
    correlator: TaskCorrelator,
    transcript: S,
    transport: T,
    runtime: Box<dyn ExtensionRuntime>,
    files: Box<dyn FileAccess>,
}

impl<S: Transcript, T: Transport> Dispatcher<S, T> {
    pub fn new(agent_id: impl Into<String>, context: AgentContext, transcript: S, transport: T) -> Self {
        Self {
            agent_id: agent_id.into(),
            context,
            session: SessionInfo::default(),
            registry: CommandRegistry::new(),
            correlator: TaskCorrelator::new(),
            transcript,
            transport,
            runtime: Box::new(NullRuntime),
            files: Box::new(LocalFiles),
        }
    }

    pub fn with_runtime(mut self, runtime: Box<dyn ExtensionRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_files(mut self, files: Box<dyn FileAccess>) -> Self {
        self.files = files;
        self
    }

    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = session;
        self
    }

    /// Registration happens here, between dispatch calls.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    pub fn correlator(&self) -> &TaskCorrelator {
        &self.correlator
    }

    pub fn transcript(&self) -> &S {
        &self.transcript
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handle one command line.
    ///
    /// With `send` the command is validated and transmitted. Without it the
    /// command is only validated and the description of `in_task_id` is
    /// echoed; nothing is minted, recorded, submitted or invoked.
    pub fn dispatch(&mut self, line: &str, send: bool, in_task_id: &str) -> bool {
        match self.try_dispatch(line, send, in_task_id) {
            Ok(()) => true,
            // rendering a prior line stays quiet about a bare module name
            Err(DispatchError::MissingSubCommand) if !send => {
                debug!(command = %line, "module without sub command");
                false
            }
            Err(e) => {
                warn!(command = %line, error = %e, "command rejected");
                self.transcript.append_line(&format!("[-] {}", e));
                false
            }
        }
    }

    fn try_dispatch(&mut self, line: &str, send: bool, in_task_id: &str) -> Result<(), DispatchError> {
        let tokens = tokenize(line);

        // registrations made while this line runs are not observed
        let registry = self.registry.clone();
        let context = self.context.clone();

        match registry.resolve(&tokens, &context) {
            Resolved::Empty => Ok(()),
            Resolved::Builtin(BuiltinCommand::Help) => {
                for help_line in help::render(&tokens, &registry, &context)? {
                    self.transcript.append_line(&help_line);
                }
                Ok(())
            }
            Resolved::Builtin(BuiltinCommand::Clear) => {
                self.transcript.clear();
                self.transcript.insert_raw(&self.session.banner());
                Ok(())
            }
            Resolved::Builtin(builtin) => {
                let planned = command::plan(builtin, &tokens, line, self.files.as_ref())?;
                if !send {
                    self.echo(in_task_id, &planned.description);
                    return Ok(());
                }
                self.issue(planned, line)
            }
            Resolved::AgentCommand(spec) => self.agent_command(spec, line, send, in_task_id),
            Resolved::Extension { command, arg_start } => {
                self.extension_command(command, arg_start, &tokens, line, send, in_task_id)
            }
            Resolved::MissingSubCommand => Err(DispatchError::MissingSubCommand),
            Resolved::NotFound => Err(DispatchError::NotFound(line.to_string())),
        }
    }

    fn echo(&mut self, task_id: &str, description: &str) {
        self.transcript
            .append_line(&format!("[*] [{}] {}", task_id, description));
    }

    fn echo_recorded(&mut self, task_id: &str) {
        match self.correlator.describe(task_id).map(str::to_string) {
            Some(description) => self.echo(task_id, &description),
            None => debug!(task_id = %task_id, "no recorded description"),
        }
    }

    fn issue(&mut self, planned: PlannedTask, line: &str) -> Result<(), DispatchError> {
        let task_id = self
            .correlator
            .new_task_id(planned.id_source, &mut self.transport, &planned.description)?;
        self.transport.submit(&task_id, &planned.request)?;
        self.correlator.record(&task_id, &planned.description, line);

        info!(task_id = %task_id, kind = %planned.request.kind, "task submitted");
        self.echo(&task_id, &planned.description);
        Ok(())
    }

    fn agent_command(
        &mut self,
        spec: &AgentCommandSpec,
        line: &str,
        send: bool,
        in_task_id: &str,
    ) -> Result<(), DispatchError> {
        let args = split_quoted(line);
        let bound = extension::bind_parameters(&spec.params, args.get(1..).unwrap_or(&[]), self.files.as_ref())?;

        if !send {
            self.echo_recorded(in_task_id);
            return Ok(());
        }

        let task_id = self.correlator.new_local_id();
        let mut object = serde_json::Map::new();
        object.insert("TaskID".to_string(), task_id.clone().into());
        object.insert("CommandLine".to_string(), line.into());
        object.insert("AgentID".to_string(), self.agent_id.clone().into());
        object.insert("Command".to_string(), spec.name.clone().into());
        for (name, value) in bound {
            object.insert(name, value.into());
        }

        let payload = serde_json::Value::Object(object).to_string();
        let description = format!("Tasked agent to run {}", spec.name);

        self.transport
            .submit(&task_id, &TaskRequest::raw(TaskKind::AgentCommand, payload))?;
        self.correlator.record(&task_id, &description, line);

        info!(task_id = %task_id, command = %spec.name, "agent command submitted");
        self.echo(&task_id, &description);
        Ok(())
    }

    fn extension_command(
        &mut self,
        command: &ExtensionCommand,
        arg_start: usize,
        tokens: &[String],
        line: &str,
        send: bool,
        in_task_id: &str,
    ) -> Result<(), DispatchError> {
        let args: Vec<String> = if command.params.is_empty() {
            tokens.get(arg_start..).unwrap_or(&[]).to_vec()
        } else {
            let quoted = split_quoted(line);
            extension::bind_parameters(&command.params, quoted.get(arg_start..).unwrap_or(&[]), self.files.as_ref())?
                .into_iter()
                .map(|(_, value)| value)
                .collect()
        };

        if !send {
            self.echo_recorded(in_task_id);
            return Ok(());
        }

        let report = extension::call(self.runtime.as_mut(), command, &self.agent_id, &args);
        for message in &report.messages {
            self.transcript.append_line(message);
        }
        let task_id = report.result?;

        let description = self
            .correlator
            .describe(&task_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Tasked agent to run {}", command.qualified_name()));

        self.transport
            .submit(&task_id, &TaskRequest::raw(TaskKind::ScriptCommand, line))?;
        self.correlator.record(&task_id, &description, line);

        info!(task_id = %task_id, command = %command.qualified_name(), "extension task submitted");
        self.echo(&task_id, &description);
        Ok(())
    }

    /// Show output the agent returned for `task_id`.
    pub fn render_result(&mut self, task_id: &str, output: &str) {
        match self.correlator.describe(task_id).map(str::to_string) {
            Some(description) => self
                .transcript
                .append_line(&format!("[+] [{}] {}", task_id, description)),
            None => debug!(task_id = %task_id, "result for unknown task"),
        }
        for line in output.lines() {
            self.transcript.append_line(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::extension::{InvokeOutcome, MockExtensionRuntime, CWD_LOCK};
    use crate::registry::{CallableHandle, Parameter};
    use crate::transcript::MemoryTranscript;
    use crate::transport::{LoopbackTransport, MockTransport};

    fn console() -> Dispatcher<MemoryTranscript, LoopbackTransport> {
        Dispatcher::new(
            "a1b2c3d4",
            AgentContext::Default,
            MemoryTranscript::new(),
            LoopbackTransport::new(),
        )
    }

    #[test]
    fn test_valid_builtin_is_submitted_and_recorded() {
        let mut console = console();
        assert!(console.dispatch("sleep 10 50", true, ""));

        let (task_id, request) = &console.transport().submitted()[0];
        assert_eq!(request.payload, "10;50");
        assert_eq!(
            console.correlator().get(task_id).unwrap().command_line,
            "sleep 10 50"
        );
        assert_eq!(
            console.transcript().last().unwrap(),
            format!("[*] [{}] Tasked agent to sleep for 10 seconds with 50% jitter", task_id)
        );
    }

    #[test]
    fn test_validation_failure_leaves_no_state() {
        let mut console = console();
        assert!(!console.dispatch("sleep", true, ""));
        assert!(console.correlator().is_empty());
        assert!(console.transport().descriptions().is_empty());
        assert_eq!(console.transcript().last(), Some("[-] Not enough arguments"));
    }

    #[test]
    fn test_empty_line_is_noop() {
        let mut console = console();
        assert!(console.dispatch("", true, ""));
        assert!(console.dispatch("   ", true, ""));
        assert!(console.transcript().lines().is_empty());
    }

    #[test]
    fn test_submit_failure_is_not_recorded() {
        let mut transport = MockTransport::new();
        transport
            .expect_request_description()
            .times(1)
            .returning(|_| Ok("deadbeef".to_string()));
        transport
            .expect_submit()
            .times(1)
            .returning(|_, _| Err(TransportError::Publish("broker down".to_string())));

        let mut console = Dispatcher::new("a1b2c3d4", AgentContext::Default, MemoryTranscript::new(), transport);
        assert!(!console.dispatch("checkin", true, ""));
        assert!(console.correlator().is_empty());
        assert_eq!(
            console.transcript().last(),
            Some("[-] Failed to submit task: publish failed: broker down")
        );
    }

    #[test]
    fn test_send_false_echoes_without_side_effects() {
        let mut console = console();
        assert!(console.dispatch("pwd", false, "0badc0de"));
        assert_eq!(
            console.transcript().last(),
            Some("[*] [0badc0de] Tasked agent to get current working directory")
        );
        assert!(console.correlator().is_empty());
        assert!(console.transport().submitted().is_empty());

        assert!(!console.dispatch("pwd now", false, "0badc0de"));
    }

    #[test]
    fn test_clear_reinserts_banner() {
        let session = SessionInfo {
            name: "a1b2c3d4".to_string(),
            ..SessionInfo::default()
        };
        let mut console = console().with_session(session.clone());
        console.dispatch("help", true, "");
        assert!(console.dispatch("clear", true, ""));
        assert_eq!(console.transcript().lines(), &[session.banner()]);
    }

    #[test]
    fn test_extension_failure_flushes_messages_and_restores_cwd() {
        let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut runtime = MockExtensionRuntime::new();
        runtime.expect_is_callable().return_const(true);
        runtime
            .expect_invoke()
            .returning(|_, _| InvokeOutcome::Raised("KeyError: 'host'".to_string()));
        runtime
            .expect_take_buffered_messages()
            .returning(|| vec!["[!] script warning".to_string()]);

        let mut console = console().with_runtime(Box::new(runtime));
        let mut command = ExtensionCommand::new("portscan", "scan ports", CallableHandle(1));
        command.params = vec![Parameter::required("host")];
        command.working_dir = Some(dir.path().to_path_buf());
        console.registry_mut().register_command(command);

        assert!(!console.dispatch("portscan 10.0.0.1", true, ""));
        assert_eq!(std::env::current_dir().unwrap(), before);

        let lines = console.transcript().lines();
        assert_eq!(lines[0], "[!] script warning");
        assert_eq!(
            lines[1],
            "[-] Failed to execute portscan. Script module failed: KeyError: 'host'"
        );
        assert!(console.correlator().is_empty());
    }

    #[test]
    fn test_extension_success_records_returned_id() {
        let mut runtime = MockExtensionRuntime::new();
        runtime.expect_is_callable().return_const(true);
        runtime
            .expect_invoke()
            .withf(|_, args| args == ["a1b2c3d4".to_string(), "10.0.0.1".to_string(), "445".to_string()])
            .returning(|_, _| InvokeOutcome::Text("c0ffee00".to_string()));
        runtime.expect_take_buffered_messages().returning(Vec::new);

        let mut console = console().with_runtime(Box::new(runtime));
        let mut command = ExtensionCommand::new("portscan", "scan ports", CallableHandle(1));
        command.params = vec![Parameter::required("host"), Parameter::optional("port")];
        console.registry_mut().register_command(command);

        assert!(console.dispatch("portscan 10.0.0.1 445", true, ""));
        assert_eq!(
            console.correlator().describe("c0ffee00"),
            Some("Tasked agent to run portscan")
        );
        let (task_id, request) = &console.transport().submitted()[0];
        assert_eq!(task_id, "c0ffee00");
        assert_eq!(request.kind, TaskKind::ScriptCommand);
        assert_eq!(request.payload, "portscan 10.0.0.1 445");
    }

    #[test]
    fn test_module_without_command() {
        let mut console = console();
        let mut command = ExtensionCommand::new("whoami", "", CallableHandle(1));
        command.module = Some("situational".to_string());
        console.registry_mut().register_command(command);

        assert!(!console.dispatch("situational", true, ""));
        assert_eq!(
            console.transcript().last(),
            Some("[-] Specify a sub command for the given module.")
        );

        // the render path fails without a transcript line
        let before = console.transcript().lines().len();
        assert!(!console.dispatch("situational", false, "0badc0de"));
        assert_eq!(console.transcript().lines().len(), before);
    }

    struct SingleFile;

    impl FileAccess for SingleFile {
        fn read_file(&self, path: &str) -> Option<Vec<u8>> {
            (path == "/loot/beacon.bin").then(|| b"\xfc\x48".to_vec())
        }

        fn file_exists(&self, path: &str) -> bool {
            path == "/loot/beacon.bin"
        }
    }

    #[test]
    fn test_upload_reads_through_file_access() {
        let mut console = console().with_files(Box::new(SingleFile));

        assert!(console.dispatch("upload /loot/beacon.bin C:\\Temp\\b.bin", true, ""));
        let (_, request) = &console.transport().submitted()[0];
        assert_eq!(request.fields()[2], crate::wire::b64(b"\xfc\x48"));

        assert!(!console.dispatch("upload /loot/other.bin", true, ""));
        assert_eq!(console.transcript().last(), Some("[-] File not found: /loot/other.bin"));
    }

    #[test]
    fn test_render_result() {
        let mut console = console();
        console.dispatch("pwd", true, "");
        let task_id = console.transport().submitted()[0].0.clone();

        console.render_result(&task_id, "C:\\Users\\alice\nsecond line");
        let lines = console.transcript().lines();
        assert_eq!(
            lines[lines.len() - 3],
            format!("[+] [{}] Tasked agent to get current working directory", task_id)
        );
        assert_eq!(lines[lines.len() - 1], "second line");
    }
}
