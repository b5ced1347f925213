//! Calling into extension commands.
//!
//! The console never interprets extension code itself. It hands the bound
//! arguments to an [`ExtensionRuntime`], runs the call inside the command's
//! working directory and converts the outcome into a task id or an error.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DispatchError, ExtensionError};
use crate::files::FileAccess;
use crate::registry::{CallableHandle, ExtensionCommand, Parameter};
use crate::tokenizer::join_preserving_quotes;
use crate::wire::b64;

/// What a callable produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// A string; callables return the id of the task they queued.
    Text(String),
    None,
    Bool(bool),
    /// Any other value, carried as its type name.
    Other(String),
    /// The callable raised; the text is the runtime's error message.
    Raised(String),
}

/// Host of the callables extension scripts register.
#[cfg_attr(test, mockall::automock)]
pub trait ExtensionRuntime {
    fn is_callable(&self, handle: &CallableHandle) -> bool;

    /// Call `handle` with the agent id followed by the command arguments.
    fn invoke(&mut self, handle: &CallableHandle, args: &[String]) -> InvokeOutcome;

    /// Messages the script printed during the last call.
    fn take_buffered_messages(&mut self) -> Vec<String>;
}

/// Runtime with nothing loaded.
#[derive(Debug, Default)]
pub struct NullRuntime;

impl ExtensionRuntime for NullRuntime {
    fn is_callable(&self, _handle: &CallableHandle) -> bool {
        false
    }

    fn invoke(&mut self, _handle: &CallableHandle, _args: &[String]) -> InvokeOutcome {
        InvokeOutcome::None
    }

    fn take_buffered_messages(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Serializes tests that change the process working directory.
#[cfg(test)]
pub(crate) static CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Switches the process working directory and switches back on drop.
pub struct WorkingDirGuard {
    previous: Option<PathBuf>,
}

impl WorkingDirGuard {
    pub fn enter(dir: Option<&Path>) -> Result<Self, ExtensionError> {
        let Some(dir) = dir else {
            return Ok(Self { previous: None });
        };

        let to_error = |source| ExtensionError::WorkingDirectory {
            path: dir.display().to_string(),
            source,
        };
        let previous = std::env::current_dir().map_err(to_error)?;
        std::env::set_current_dir(dir).map_err(to_error)?;
        debug!(dir = %dir.display(), "entered extension working directory");

        Ok(Self {
            previous: Some(previous),
        })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = std::env::set_current_dir(&previous) {
                warn!(dir = %previous.display(), error = %e, "failed to restore working directory");
            } else {
                debug!(dir = %previous.display(), "restored working directory");
            }
        }
    }
}

/// Bind `args` to declared parameters.
///
/// The last parameter absorbs every remaining argument. File parameters are
/// replaced by the base64 encoded content of the named local file.
pub fn bind_parameters(
    params: &[Parameter],
    args: &[String],
    files: &dyn FileAccess,
) -> Result<Vec<(String, String)>, DispatchError> {
    let mut bound = Vec::with_capacity(params.len());

    for (i, param) in params.iter().enumerate() {
        let is_last = i + 1 == params.len();
        let value = match args.get(i) {
            Some(_) if is_last => Some(join_preserving_quotes(args, i)),
            Some(arg) => Some(arg.clone()),
            None => None,
        };

        let value = match value {
            Some(path) if param.file_path => {
                let content = files
                    .read_file(&path)
                    .ok_or_else(|| DispatchError::FileNotFound(path.clone()))?;
                b64(content)
            }
            Some(value) => value,
            None if param.optional => String::new(),
            None => return Err(DispatchError::MissingParameter(param.name.clone())),
        };

        bound.push((param.name.clone(), value));
    }

    Ok(bound)
}

/// Result of one extension call plus whatever the script printed.
///
/// On success `result` holds the task id the callable returned.
#[derive(Debug)]
pub struct CallReport {
    pub result: Result<String, ExtensionError>,
    pub messages: Vec<String>,
}

/// Invoke `command` for `agent_id` with `args`.
///
/// Buffered script output is collected whether or not the call succeeded.
pub fn call(
    runtime: &mut dyn ExtensionRuntime,
    command: &ExtensionCommand,
    agent_id: &str,
    args: &[String],
) -> CallReport {
    let name = command.qualified_name();

    if !runtime.is_callable(&command.handle) {
        return CallReport {
            result: Err(ExtensionError::NotCallable(name)),
            messages: runtime.take_buffered_messages(),
        };
    }

    let mut call_args = Vec::with_capacity(args.len() + 1);
    call_args.push(agent_id.to_string());
    call_args.extend_from_slice(args);

    let result = match WorkingDirGuard::enter(command.working_dir.as_deref()) {
        Ok(_guard) => {
            debug!(command = %name, args = call_args.len(), "invoking extension command");
            match runtime.invoke(&command.handle, &call_args) {
                InvokeOutcome::Text(text) if !text.is_empty() => Ok(text),
                InvokeOutcome::None => Err(ExtensionError::ReturnedNone(name)),
                InvokeOutcome::Raised(reason) => Err(ExtensionError::Raised {
                    command: name,
                    reason,
                }),
                InvokeOutcome::Text(_) | InvokeOutcome::Bool(_) | InvokeOutcome::Other(_) => {
                    Err(ExtensionError::InvalidReturn(name))
                }
            }
        }
        Err(e) => Err(e),
    };

    CallReport {
        result,
        messages: runtime.take_buffered_messages(),
    }
}
