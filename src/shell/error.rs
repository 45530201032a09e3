use nix::errno::Errno;
use thiserror::Error;

/// 解析阶段的错误，整行作废，不会创建任何进程
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("missing file for redirection")]
    MissingRedirectTarget,
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("leftovers: {0}")]
    Leftovers(String),
    #[error("too many args (limit is {0})")]
    ArgumentLimitExceeded(usize),
    #[error("missing command after `|`")]
    MissingCommand,
}

/// 执行阶段的错误，报告后终止当前分支进程
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("could not open file {file}: {source}")]
    Open { file: String, source: Errno },
    #[error("failed to bind files: {source}")]
    Dup { source: Errno },
    #[error("failed to establish pipe: {source}")]
    Pipe { source: Errno },
    #[error("could not execute {program}: {source}")]
    Exec { program: String, source: Errno },
    #[error("fork failed: {source}")]
    Fork { source: Errno },
    #[error("wait failed: {source}")]
    Wait { source: Errno },
}
