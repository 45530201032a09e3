use std::ffi::OsString;
use std::fmt;
use std::os::fd::RawFd;

use nix::fcntl::OFlag;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    Input,  // <
    Output, // >
}

impl Direction {
    /// 被替换的标准描述符：输入为 0，输出为 1
    pub fn fd(self) -> RawFd {
        match self {
            Direction::Input => libc::STDIN_FILENO,
            Direction::Output => libc::STDOUT_FILENO,
        }
    }

    pub fn flags(self) -> OFlag {
        match self {
            Direction::Input => OFlag::O_RDONLY,
            Direction::Output => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Direction::Input => '<',
            Direction::Output => '>',
        }
    }
}

/// 一行输入解析出的命令树，每个节点只归一个父节点所有。
///
/// 参数和文件名按原始字节保存，不要求是 UTF-8
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    Exec {
        argv: Vec<OsString>,
    },
    Redirect {
        target: Box<Command>,
        file: OsString,
        direction: Direction,
    },
    Pipe {
        left: Box<Command>,
        right: Box<Command>,
    },
}

impl Command {
    pub fn redirect(target: Command, file: OsString, direction: Direction) -> Self {
        Command::Redirect {
            target: Box::new(target),
            file,
            direction,
        }
    }

    pub fn pipe(left: Command, right: Command) -> Self {
        Command::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// 管道中的阶段数，N 个阶段对应 N-1 个管道
    pub fn stage_count(&self) -> usize {
        match self {
            Command::Pipe { left, right } => left.stage_count() + right.stage_count(),
            _ => 1,
        }
    }

    /// 没有参数也没有重定向的空命令
    pub fn is_empty(&self) -> bool {
        matches!(self, Command::Exec { argv } if argv.is_empty())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Exec { argv } => {
                let words: Vec<_> = argv.iter().map(|arg| arg.to_string_lossy()).collect();
                write!(f, "{}", words.join(" "))
            }
            Command::Redirect {
                target,
                file,
                direction,
            } => {
                if target.is_empty() {
                    write!(f, "{} {}", direction.symbol(), file.to_string_lossy())
                } else {
                    let file = file.to_string_lossy();
                    write!(f, "{} {} {}", target, direction.symbol(), file)
                }
            }
            Command::Pipe { left, right } => write!(f, "{} | {}", left, right),
        }
    }
}
