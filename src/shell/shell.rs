use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::unistd::{chdir, getpid, read, ForkResult};
use std::error::Error;
use std::ffi::{OsStr, OsString};
use std::io::{self, IsTerminal};
use std::os::unix::ffi::OsStrExt;

use crate::shell::executor::{fork_or_die, reap, Executor};
use crate::shell::parser::parse;
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::utils::config::Config;
use crate::utils::theme::Theme;

/// 读完一行后的去向
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    executor: Executor,
    interactive: bool,
    last_status: i32,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            theme: Theme::load_theme(&config.theme),
            executor: Executor::new(config.redirect_mode, getpid()),
            interactive: io::stdin().is_terminal(),
            last_status: 0,
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("初始化 tinysh, interactive={}", self.interactive);
        if self.interactive {
            self.run_interactive()?;
        } else {
            self.run_piped()?;
        }
        debug!("退出 tinysh, last_status={}", self.last_status);
        Ok(())
    }

    fn run_interactive(&mut self) -> Result<(), Box<dyn Error>> {
        let mut readline = ReadlineManager::new(self.config)?;
        readline.load_history();

        println!(
            "{}",
            (self.theme.success_style)(self.theme.get_message("welcome"))
        );

        loop {
            let prompt = (self.theme.prompt_style)(self.theme.get_message("prompt"));
            match readline.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        readline.add_history(&line);
                    }
                    if self.handle_input(line.as_bytes()) == Flow::Exit {
                        println!(
                            "{}",
                            (self.theme.success_style)(self.theme.get_message("exit"))
                        );
                        break;
                    }
                    if self.last_status != 0 {
                        eprintln!(
                            "{} {}",
                            (self.theme.error_style)(self.theme.get_message("error_symbol")),
                            (self.theme.error_style)(self.last_status.to_string())
                        );
                    }
                }
                Err(ReadlineError::Eof) => {
                    info!("接收到 EOF，退出 tinysh");
                    println!(
                        "\n{}",
                        (self.theme.warning_style)(self.theme.get_message("eof_signal"))
                    );
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    warn!("接收到中断信号");
                    println!(
                        "{}",
                        (self.theme.warning_style)(self.theme.get_message("interrupt_signal"))
                    );
                }
                Err(err) => {
                    error!("读取输入失败: {}", err);
                    eprintln!(
                        "{}: {}",
                        (self.theme.error_style)(self.theme.get_message("error")),
                        err
                    );
                    break;
                }
            }
        }

        readline.save_history();
        Ok(())
    }

    /// 非终端输入：不显示提示符，逐行读到 EOF
    fn run_piped(&mut self) -> Result<(), Box<dyn Error>> {
        while let Some(line) = read_line_unbuffered()? {
            if self.handle_input(&line) == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &[u8]) -> Flow {
        if line.trim_ascii() == b"exit" {
            return Flow::Exit;
        }

        if let Some(path) = line.strip_prefix(b"cd ") {
            self.change_dir(path);
            return Flow::Continue;
        }

        let tree = match parse(line) {
            Ok(tree) => tree,
            Err(err) => {
                warn!("语法错误: {} ({:?})", err, String::from_utf8_lossy(line));
                eprintln!("tinysh: syntax error: {}", err);
                // 与常见 shell 一致，语法错误记为 2
                self.last_status = 2;
                return Flow::Continue;
            }
        };

        // shell 本身要活下来，整行放到单独的子进程里执行
        debug!("执行: {} ({} 个阶段)", tree, tree.stage_count());
        match fork_or_die(self.executor.shell_pid()) {
            ForkResult::Child => self.executor.run(&tree),
            ForkResult::Parent { child } => match reap(child) {
                Ok(code) => {
                    debug!("命令结束, pid={} code={}", child, code);
                    self.last_status = code;
                }
                Err(err) => {
                    error!("回收子进程 {} 失败: {}", child, err);
                    self.last_status = 1;
                }
            },
        }
        Flow::Continue
    }

    fn change_dir(&mut self, arg: &[u8]) {
        let path = match arg.trim_ascii() {
            b"" => b"~".as_slice(),
            path => path,
        };
        let target = expand_home(path);
        match chdir(target.as_os_str()) {
            Ok(()) => {
                debug!("切换目录: {}", target.to_string_lossy());
                self.last_status = 0;
            }
            Err(errno) => {
                eprintln!(
                    "tinysh: cd: cannot change directory to {}: {}",
                    String::from_utf8_lossy(path),
                    errno
                );
                self.last_status = 1;
            }
        }
    }
}

/// `~` 只在路径是合法 UTF-8 时展开，其余字节原样交给 chdir
fn expand_home(path: &[u8]) -> OsString {
    match std::str::from_utf8(path) {
        Ok(text) => OsString::from(shellexpand::tilde(text).into_owned()),
        Err(_) => OsStr::from_bytes(path).to_os_string(),
    }
}

/// 一次读一个字节，不预读：同一个 stdin 之后还要交给子进程。
///
/// 返回原始字节，不做 UTF-8 解码
fn read_line_unbuffered() -> io::Result<Option<Vec<u8>>> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match read(libc::STDIN_FILENO, &mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => return Ok(Some(strip_carriage_return(bytes))),
            Ok(_) => bytes.push(byte[0]),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno.into()),
        }
    }
    if bytes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(strip_carriage_return(bytes)))
    }
}

fn strip_carriage_return(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}
