//! Character cursor shared by the path parsers.

use super::ExprError;

#[derive(Debug)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub(crate) const fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub(crate) fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    pub(crate) fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    /// Reads a `[...]` subscript whose opening bracket is the next character.
    pub(crate) fn subscript(&mut self) -> Result<Subscript<'a>, ExprError> {
        let open = self.pos;
        self.bump();
        self.skip_whitespace();

        if self.eat('"') {
            let key = self.take_while(|c| c != '"');
            if !self.eat('"') {
                return Err(ExprError::UnterminatedBracket { offset: open });
            }
            self.skip_whitespace();
            if !self.eat(']') {
                return Err(ExprError::UnterminatedBracket { offset: open });
            }
            return Ok(Subscript::Quoted(key));
        }

        let inner = self.take_while(|c| c != ']');
        if !self.eat(']') {
            return Err(ExprError::UnterminatedBracket { offset: open });
        }
        Ok(Subscript::Raw(inner.trim()))
    }
}

/// Body of a bracket subscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Subscript<'a> {
    /// `["key"]`
    Quoted(&'a str),
    /// Anything else, trimmed.
    Raw(&'a str),
}

/// Resolves a possibly negative index against a sequence length.
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscript_forms() {
        let mut cur = Cursor::new("[ 3 ]rest");
        assert_eq!(cur.subscript().unwrap(), Subscript::Raw("3"));
        assert_eq!(cur.peek(), Some('r'));

        let mut cur = Cursor::new("[\"b c\"]");
        assert_eq!(cur.subscript().unwrap(), Subscript::Quoted("b c"));
        assert!(cur.is_at_end());
    }

    #[test]
    fn test_unterminated_subscript() {
        let mut cur = Cursor::new("[12");
        assert_eq!(
            cur.subscript(),
            Err(ExprError::UnterminatedBracket { offset: 0 })
        );
        let mut cur = Cursor::new("[\"open]");
        assert!(cur.subscript().is_err());
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
    }
}
