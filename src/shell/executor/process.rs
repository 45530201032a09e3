use std::io::{self, Write};
use std::process;

use log::{error, trace};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, getpid, ForkResult, Pid};

use crate::shell::error::ExecError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// 结束当前进程，不再返回
pub fn terminate(code: i32) -> ! {
    trace!("进程退出, code={}", code);
    process::exit(code)
}

/// 报告错误并以失败码结束当前进程
pub fn fail(err: ExecError) -> ! {
    error!("{}", err);
    eprintln!("tinysh: {}", err);
    terminate(EXIT_FAILURE)
}

/// fork。失败不可局部恢复：报告后连同 `shell` 进程一起结束
pub fn fork_or_die(shell: Pid) -> ForkResult {
    // 子进程会继承未刷新的缓冲区，fork 前先刷掉
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    // SAFETY: shell 是单线程的，子进程只做 close/dup2/exec/exit
    match unsafe { fork() } {
        Ok(result) => {
            if let ForkResult::Parent { child } = result {
                trace!("fork 子进程 {}", child);
            }
            result
        }
        Err(source) => {
            if getpid() != shell {
                if let Err(errno) = kill(shell, Signal::SIGTERM) {
                    error!("无法结束 shell 进程 {}: {}", shell, errno);
                }
            }
            fail(ExecError::Fork { source })
        }
    }
}

/// 等待指定子进程结束并回收，返回其退出码。
///
/// 被信号杀死的进程按 128 + 信号值计。
pub fn reap(pid: Pid) -> Result<i32, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                trace!("回收子进程 {}, code={}", pid, code);
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(_, sig, _core_dumped)) => {
                trace!("回收子进程 {}, signal={}", pid, sig);
                return Ok(128 + sig as i32);
            }
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(source) => return Err(ExecError::Wait { source }),
        }
    }
}
