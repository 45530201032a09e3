use std::ffi::{CString, OsStr, OsString};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::open;
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2, execvp, pipe, ForkResult, Pid};

use super::process::{fail, fork_or_die, reap, terminate, EXIT_SUCCESS};
use crate::shell::error::ExecError;
use crate::shell::parser::ast::{Command, Direction};

/// 解释命令树。`run` 的每条分支都以进程结束告终，
/// 因此它只能在专门 fork 出来的进程里调用。
pub struct Executor {
    redirect_mode: Mode,
    /// 顶层 shell 进程，fork 失败时要一并结束它
    shell: Pid,
}

impl Executor {
    pub fn new(redirect_mode: Mode, shell: Pid) -> Self {
        Self {
            redirect_mode,
            shell,
        }
    }

    pub fn shell_pid(&self) -> Pid {
        self.shell
    }

    pub fn run(&self, node: &Command) -> ! {
        match node {
            // 空行解析出的空命令，直接成功退出
            Command::Exec { argv } if argv.is_empty() => terminate(EXIT_SUCCESS),
            Command::Exec { argv } => self.exec(argv),
            Command::Redirect {
                target,
                file,
                direction,
            } => {
                if let Err(err) = self.redirect(file, *direction) {
                    fail(err);
                }
                self.run(target)
            }
            Command::Pipe { left, right } => self.pipe(left, right),
        }
    }

    /// 用 argv[0] 替换当前进程映像，按 PATH 查找
    fn exec(&self, argv: &[OsString]) -> ! {
        let program = argv[0].to_string_lossy().into_owned();
        let args = match to_cstrings(argv) {
            Ok(args) => args,
            Err(source) => fail(ExecError::Exec { program, source }),
        };

        debug!("执行外部命令: {:?}", argv);
        let source = match execvp(&args[0], &args) {
            Ok(never) => match never {},
            Err(errno) => errno,
        };
        fail(ExecError::Exec { program, source })
    }

    fn redirect(&self, file: &OsStr, direction: Direction) -> Result<(), ExecError> {
        let fd = self.open_target(file, direction)?;
        debug!(
            "重定向 {} {} -> fd {}",
            direction.symbol(),
            file.to_string_lossy(),
            direction.fd()
        );
        bind(fd, direction.fd())
    }

    fn open_target(&self, file: &OsStr, direction: Direction) -> Result<OwnedFd, ExecError> {
        let raw = open(file, direction.flags(), self.redirect_mode).map_err(|source| {
            ExecError::Open {
                file: file.to_string_lossy().into_owned(),
                source,
            }
        })?;
        // SAFETY: open 刚返回的描述符，只在这里被接管
        Ok(unsafe { OwnedFd::from_raw_fd(raw) })
    }

    fn pipe(&self, left: &Command, right: &Command) -> ! {
        if let Err(err) = self.connect(left, right) {
            fail(err);
        }
        terminate(EXIT_SUCCESS)
    }

    /// 左边写、右边读。本进程不再 fork 自己，只负责创建两个子进程并回收，
    /// 返回两个阶段的退出码
    fn connect(
        &self,
        left: &Command,
        right: &Command,
    ) -> Result<(Option<i32>, Option<i32>), ExecError> {
        let (read_end, write_end) = pipe().map_err(|source| ExecError::Pipe { source })?;

        let left_pid = match fork_or_die(self.shell) {
            ForkResult::Child => {
                drop(read_end);
                if let Err(err) = bind(write_end, libc::STDOUT_FILENO) {
                    fail(err);
                }
                self.run(left)
            }
            ForkResult::Parent { child } => child,
        };

        let right_pid = match fork_or_die(self.shell) {
            ForkResult::Child => {
                drop(write_end);
                if let Err(err) = bind(read_end, libc::STDIN_FILENO) {
                    fail(err);
                }
                self.run(right)
            }
            ForkResult::Parent { child } => child,
        };

        // 两端都已交给子进程，父进程必须关闭，否则右边读不到 EOF
        drop(read_end);
        drop(write_end);

        Ok((wait_stage(left_pid), wait_stage(right_pid)))
    }
}

/// 把 fd 复制到 target 上，然后关闭原来的 fd
fn bind(fd: OwnedFd, target: RawFd) -> Result<(), ExecError> {
    if fd.as_raw_fd() == target {
        // 已经在目标位置上，保留
        let _ = fd.into_raw_fd();
        return Ok(());
    }
    let result = dup2(fd.as_raw_fd(), target);
    if let Err(errno) = close(fd.into_raw_fd()) {
        warn!("关闭描述符失败: {}", errno);
    }
    result.map(|_| ()).map_err(|source| ExecError::Dup { source })
}

/// 回收一个管道阶段，退出码只用于记录
fn wait_stage(pid: Pid) -> Option<i32> {
    match reap(pid) {
        Ok(code) => {
            debug!("管道阶段 {} 退出, code={}", pid, code);
            Some(code)
        }
        Err(err) => {
            warn!("回收管道阶段 {} 失败: {}", pid, err);
            None
        }
    }
}

fn to_cstrings(argv: &[OsString]) -> Result<Vec<CString>, Errno> {
    argv.iter()
        .map(|arg| CString::new(arg.as_bytes()).map_err(|_| Errno::EINVAL))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::executor::process::EXIT_FAILURE;
    use std::fs;
    use std::io::{Read, Write};
    use std::os::unix::ffi::OsStringExt;
    use std::os::unix::fs::PermissionsExt;
    use std::process;

    use nix::sys::wait::{waitpid, WaitPidFlag};
    use nix::unistd::{fork, getpid};

    fn exec(argv: &[&str]) -> Command {
        Command::Exec {
            argv: argv.iter().map(OsString::from).collect(),
        }
    }

    fn executor() -> Executor {
        Executor::new(Mode::from_bits_truncate(0o644), getpid())
    }

    /// 在 fork 出的子进程里执行 `body`，父进程回收并返回其退出码
    #[allow(clippy::unwrap_used)]
    fn in_child(body: impl FnOnce() -> i32) -> i32 {
        // SAFETY: 子进程只做 fork/dup2/exec/exit，不会回到测试框架
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => process::exit(body()),
            ForkResult::Parent { child } => reap(child).unwrap(),
        }
    }

    fn run_in_child(tree: &Command) -> i32 {
        in_child(|| executor().run(tree))
    }

    #[test]
    fn test_to_cstrings_keeps_order() {
        let argv: Vec<OsString> = vec!["grep".into(), "-n".into(), "foo".into()];
        let args = to_cstrings(&argv).unwrap_or_default();
        let back: Vec<&str> = args.iter().filter_map(|c| c.to_str().ok()).collect();
        assert_eq!(back, vec!["grep", "-n", "foo"]);
    }

    #[test]
    fn test_to_cstrings_rejects_nul() {
        let argv: Vec<OsString> = vec!["a\0b".into()];
        assert_eq!(to_cstrings(&argv), Err(Errno::EINVAL));
    }

    #[test]
    fn test_to_cstrings_keeps_raw_bytes() {
        let argv = vec![OsString::from_vec(b"caf\xe9".to_vec())];
        let args = to_cstrings(&argv).unwrap_or_default();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].as_bytes(), b"caf\xe9");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_open_output_creates_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old contents").unwrap();

        let executor = Executor::new(Mode::from_bits_truncate(0o600), getpid());
        let fd = executor
            .open_target(path.as_os_str(), Direction::Output)
            .unwrap();
        let mut file = fs::File::from(fd);
        file.write_all(b"new").unwrap();
        drop(file);

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_open_output_uses_configured_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.txt");

        let executor = Executor::new(Mode::from_bits_truncate(0o600), getpid());
        let fd = executor
            .open_target(path.as_os_str(), Direction::Output)
            .unwrap();
        drop(fd);

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_open_output_non_utf8_name() {
        let dir = tempfile::tempdir().unwrap();
        let name = OsString::from_vec(b"out\xff".to_vec());
        let path = dir.path().join(&name);

        let fd = executor()
            .open_target(path.as_os_str(), Direction::Output)
            .unwrap();
        drop(fd);

        let names: Vec<OsString> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![name]);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_open_input_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");

        let err = executor()
            .open_target(path.as_os_str(), Direction::Input)
            .unwrap_err();
        assert!(matches!(
            err,
            ExecError::Open {
                source: Errno::ENOENT,
                ..
            }
        ));
        assert!(!path.exists());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_bind_moves_descriptor() {
        let (read_end, write_end) = pipe().unwrap();
        let spare = nix::unistd::dup(write_end.as_raw_fd()).unwrap();

        // 把写端绑到 spare 上，原写端随之关闭
        bind(write_end, spare).unwrap();
        // SAFETY: spare 由上面的 dup 得到，此处唯一持有
        let mut writer = unsafe { fs::File::from_raw_fd(spare) };
        writer.write_all(b"piped").unwrap();
        drop(writer);

        let mut buf = String::new();
        fs::File::from(read_end).read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "piped");
    }

    #[test]
    fn test_run_empty_exec_succeeds() {
        assert_eq!(run_in_child(&exec(&[])), EXIT_SUCCESS);
    }

    #[test]
    fn test_run_exec_status_passes_through() {
        assert_eq!(run_in_child(&exec(&["true"])), 0);
        assert_eq!(run_in_child(&exec(&["sh", "-c", "exit 7"])), 7);
    }

    #[test]
    fn test_run_unknown_program_fails() {
        let tree = exec(&["tinysh-no-such-program"]);
        assert_eq!(run_in_child(&tree), EXIT_FAILURE);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_run_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tree = Command::redirect(
            exec(&["true"]),
            dir.path().join("missing.txt").into_os_string(),
            Direction::Input,
        );
        assert_eq!(run_in_child(&tree), EXIT_FAILURE);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_run_redirect_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let tree = Command::redirect(
            exec(&["printf", "%s", "caf\u{e9}"]),
            path.clone().into_os_string(),
            Direction::Output,
        );
        assert_eq!(run_in_child(&tree), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "caf\u{e9}");
    }

    #[test]
    fn test_run_pipe_ignores_stage_failure() {
        let tree = Command::pipe(exec(&["tinysh-no-such-program"]), exec(&["true"]));
        assert_eq!(run_in_child(&tree), EXIT_SUCCESS);

        let tree = Command::pipe(exec(&["true"]), exec(&["sh", "-c", "exit 5"]));
        assert_eq!(run_in_child(&tree), EXIT_SUCCESS);
    }

    #[test]
    fn test_connect_reaps_both_stages() {
        let left = exec(&["tinysh-no-such-program"]);
        let right = exec(&["true"]);
        let code = in_child(|| {
            let stages = executor().connect(&left, &right);
            // 两个阶段都已回收，不应再有子进程
            let leftover = waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG));
            match (stages, leftover) {
                (Ok((Some(1), Some(0))), Err(Errno::ECHILD)) => 0,
                (Ok(_), Err(Errno::ECHILD)) => 2,
                _ => 3,
            }
        });
        assert_eq!(code, 0);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_connect_right_stage_sees_left_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let left = exec(&["printf", "a\\nb\\n"]);
        let right = Command::redirect(
            exec(&["wc", "-l"]),
            path.clone().into_os_string(),
            Direction::Output,
        );
        let code = in_child(|| match executor().connect(&left, &right) {
            Ok((Some(0), Some(0))) => 0,
            _ => 1,
        });
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "2");
    }
}
