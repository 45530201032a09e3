/// 空白字符：空格、制表符、回车、换行、垂直制表符
const WHITESPACE: &[u8] = b" \t\r\n\x0b";
/// 单字符符号
pub const SYMBOLS: &[u8] = b"<|>";

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Token<'a> {
    /// 借用输入中的 [start, end) 字节片段，提交到语法树时才复制
    Word(&'a [u8]),
    Pipe,    // |
    Less,    // <
    Greater, // >
    End,
}

impl Token<'_> {
    pub fn describe(&self) -> String {
        match self {
            Token::Word(word) => format!("`{}`", String::from_utf8_lossy(word)),
            Token::Pipe => "`|`".to_string(),
            Token::Less => "`<`".to_string(),
            Token::Greater => "`>`".to_string(),
            Token::End => "end of input".to_string(),
        }
    }
}

fn is_whitespace(b: u8) -> bool {
    WHITESPACE.contains(&b)
}

fn is_symbol(b: u8) -> bool {
    SYMBOLS.contains(&b)
}

/// 在一行输入上移动的游标。
///
/// 按字节扫描，输入不要求是合法 UTF-8，原样交给 exec 和 open。
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace();

        let token = match self.input.get(self.pos) {
            None => Token::End,
            Some(b'|') => {
                self.pos += 1;
                Token::Pipe
            }
            Some(b'<') => {
                self.pos += 1;
                Token::Less
            }
            Some(b'>') => {
                self.pos += 1;
                Token::Greater
            }
            Some(_) => self.read_word(),
        };

        self.skip_whitespace();
        token
    }

    /// 跳过空白后，判断下一个字符是否属于 `symbols`，不消耗 token
    pub fn peek(&mut self, symbols: &[u8]) -> bool {
        self.skip_whitespace();
        match self.input.get(self.pos) {
            Some(b) => symbols.contains(b),
            None => false,
        }
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.input.len()
    }

    /// 尚未消费的剩余输入
    pub fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.input;
        while self.pos < bytes.len() && is_whitespace(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn read_word(&mut self) -> Token<'a> {
        let bytes = self.input;
        let start = self.pos;
        while self.pos < bytes.len() && !is_whitespace(bytes[self.pos]) && !is_symbol(bytes[self.pos])
        {
            self.pos += 1;
        }
        Token::Word(&self.input[start..self.pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_command() {
        let mut lexer = Lexer::new(b"ls -l");
        assert_eq!(lexer.next_token(), Token::Word(b"ls"));
        assert_eq!(lexer.next_token(), Token::Word(b"-l"));
        assert_eq!(lexer.next_token(), Token::End);
    }

    #[test]
    fn test_pipe() {
        let mut lexer = Lexer::new(b"ls | grep foo");
        assert_eq!(lexer.next_token(), Token::Word(b"ls"));
        assert_eq!(lexer.next_token(), Token::Pipe);
        assert_eq!(lexer.next_token(), Token::Word(b"grep"));
        assert_eq!(lexer.next_token(), Token::Word(b"foo"));
        assert_eq!(lexer.next_token(), Token::End);
    }

    #[test]
    fn test_redirections() {
        let mut lexer = Lexer::new(b"echo hello > output.txt");
        assert_eq!(lexer.next_token(), Token::Word(b"echo"));
        assert_eq!(lexer.next_token(), Token::Word(b"hello"));
        assert_eq!(lexer.next_token(), Token::Greater);
        assert_eq!(lexer.next_token(), Token::Word(b"output.txt"));
        assert_eq!(lexer.next_token(), Token::End);
    }

    #[test]
    fn test_symbols_split_words_without_spaces() {
        let mut lexer = Lexer::new(b"cat<in|wc>out");
        assert_eq!(lexer.next_token(), Token::Word(b"cat"));
        assert_eq!(lexer.next_token(), Token::Less);
        assert_eq!(lexer.next_token(), Token::Word(b"in"));
        assert_eq!(lexer.next_token(), Token::Pipe);
        assert_eq!(lexer.next_token(), Token::Word(b"wc"));
        assert_eq!(lexer.next_token(), Token::Greater);
        assert_eq!(lexer.next_token(), Token::Word(b"out"));
        assert_eq!(lexer.next_token(), Token::End);
    }

    #[test]
    fn test_all_whitespace_kinds() {
        let mut lexer = Lexer::new(b" \t\x0bls\r\n");
        assert_eq!(lexer.next_token(), Token::Word(b"ls"));
        assert!(lexer.at_end());
        assert_eq!(lexer.next_token(), Token::End);
    }

    #[test]
    fn test_quotes_are_plain_characters() {
        let mut lexer = Lexer::new(br#"echo "a b""#);
        assert_eq!(lexer.next_token(), Token::Word(b"echo"));
        assert_eq!(lexer.next_token(), Token::Word(b"\"a"));
        assert_eq!(lexer.next_token(), Token::Word(b"b\""));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new(b"   | wc");
        assert!(lexer.peek(b"|"));
        assert!(!lexer.peek(b"<>"));
        assert_eq!(lexer.rest(), b"| wc");
        assert_eq!(lexer.next_token(), Token::Pipe);
        assert!(!lexer.peek(SYMBOLS));
        assert_eq!(lexer.next_token(), Token::Word(b"wc"));
        assert!(!lexer.peek(b"|"));
    }

    #[test]
    fn test_empty_input() {
        let mut lexer = Lexer::new(b"");
        assert!(lexer.at_end());
        assert_eq!(lexer.next_token(), Token::End);
        assert_eq!(lexer.next_token(), Token::End);
    }

    #[test]
    fn test_unicode_word() {
        let line = "echo 雑魚|cat";
        let mut lexer = Lexer::new(line.as_bytes());
        assert_eq!(lexer.next_token(), Token::Word(b"echo"));
        assert_eq!(lexer.next_token(), Token::Word("雑魚".as_bytes()));
        assert_eq!(lexer.next_token(), Token::Pipe);
    }

    #[test]
    fn test_invalid_utf8_passes_through() {
        let mut lexer = Lexer::new(b"printf caf\xe9>out");
        assert_eq!(lexer.next_token(), Token::Word(b"printf"));
        assert_eq!(lexer.next_token(), Token::Word(b"caf\xe9"));
        assert_eq!(lexer.next_token(), Token::Greater);
        assert_eq!(lexer.next_token(), Token::Word(b"out"));
        assert_eq!(lexer.next_token(), Token::End);
    }
}
