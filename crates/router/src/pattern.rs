//! Command patterns: keyword plus argument grammar

/// What a command accepts after its keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgGrammar {
    /// Keyword alone
    NoArgs,
    /// Keyword, optionally followed by argument text
    OptionalArgs,
    /// Keyword followed by non-empty argument text
    RequiredArgs,
}

/// Matches prefix-stripped message text against one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPattern {
    keyword: String,
    grammar: ArgGrammar,
}

impl CommandPattern {
    pub fn new(keyword: impl Into<String>, grammar: ArgGrammar) -> Self {
        Self {
            keyword: keyword.into(),
            grammar,
        }
    }

    pub fn no_args(keyword: impl Into<String>) -> Self {
        Self::new(keyword, ArgGrammar::NoArgs)
    }

    pub fn optional_args(keyword: impl Into<String>) -> Self {
        Self::new(keyword, ArgGrammar::OptionalArgs)
    }

    pub fn required_args(keyword: impl Into<String>) -> Self {
        Self::new(keyword, ArgGrammar::RequiredArgs)
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn grammar(&self) -> ArgGrammar {
        self.grammar
    }

    /// Argument text if `text` matches, `None` otherwise
    pub fn match_text(&self, text: &str) -> Option<String> {
        let (head, rest) = split_keyword(text);
        if head != self.keyword {
            return None;
        }

        match self.grammar {
            ArgGrammar::NoArgs if !rest.is_empty() => None,
            ArgGrammar::RequiredArgs if rest.is_empty() => None,
            _ => Some(rest.to_string()),
        }
    }

    /// Whether `text` names this command, regardless of its arguments
    pub fn matches_keyword(&self, text: &str) -> bool {
        split_keyword(text).0 == self.keyword
    }
}

fn split_keyword(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}
