use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use log::debug;

use super::ast::{Command, Direction};
use super::lexer::{Lexer, Token};
use crate::shell::error::SyntaxError;

/// 一个命令最多占用的参数槽位，其中一个留给结尾标记
pub const MAX_ARGS: usize = 10;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Parser {
            lexer: Lexer::new(input),
        }
    }

    /// line := pipeline，且必须消费完整行
    pub fn parse_line(&mut self) -> Result<Command, SyntaxError> {
        let command = self.parse_pipeline()?;
        if !self.lexer.at_end() {
            let rest = String::from_utf8_lossy(self.lexer.rest());
            return Err(SyntaxError::Leftovers(rest.into_owned()));
        }
        Ok(command)
    }

    /// pipeline := exec ('|' pipeline)?，右结合
    fn parse_pipeline(&mut self) -> Result<Command, SyntaxError> {
        let left = self.parse_exec()?;
        if !self.lexer.peek(b"|") {
            return Ok(left);
        }
        self.lexer.next_token(); // 跳过 |

        let right = self.parse_pipeline()?;
        if right.is_empty() {
            return Err(SyntaxError::MissingCommand);
        }
        Ok(Command::pipe(left, right))
    }

    /// exec := redirs (WORD redirs)*
    fn parse_exec(&mut self) -> Result<Command, SyntaxError> {
        let mut argv = Vec::new();
        let mut redirections = Vec::new();

        self.parse_redirs(&mut redirections)?;
        while !self.lexer.peek(b"|") {
            match self.lexer.next_token() {
                Token::End => break,
                Token::Word(word) => {
                    argv.push(to_os_string(word));
                    if argv.len() >= MAX_ARGS {
                        return Err(SyntaxError::ArgumentLimitExceeded(MAX_ARGS));
                    }
                }
                token => return Err(SyntaxError::UnexpectedToken(token.describe())),
            }
            self.parse_redirs(&mut redirections)?;
        }

        // 先出现的重定向包在最里层
        let command = redirections
            .into_iter()
            .fold(Command::Exec { argv }, |target, (file, direction)| {
                Command::redirect(target, file, direction)
            });
        Ok(command)
    }

    /// redirs := ('<' WORD | '>' WORD)*
    fn parse_redirs(
        &mut self,
        redirections: &mut Vec<(OsString, Direction)>,
    ) -> Result<(), SyntaxError> {
        while self.lexer.peek(b"<>") {
            let direction = match self.lexer.next_token() {
                Token::Less => Direction::Input,
                Token::Greater => Direction::Output,
                token => return Err(SyntaxError::UnexpectedToken(token.describe())),
            };
            match self.lexer.next_token() {
                Token::Word(file) => redirections.push((to_os_string(file), direction)),
                _ => return Err(SyntaxError::MissingRedirectTarget),
            }
        }
        Ok(())
    }
}

fn to_os_string(word: &[u8]) -> OsString {
    OsStr::from_bytes(word).to_os_string()
}

/// 把一行输入解析为命令树
pub fn parse(line: &[u8]) -> Result<Command, SyntaxError> {
    let command = Parser::new(line).parse_line()?;
    debug!("解析结果: {:?}", command);
    Ok(command)
}
