/// Operator joining the branches of a command tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    /// Leaf command: `argv` is populated, `left`/`right` are unused.
    None,
    /// Short-circuit `&&`: both branches populated.
    And,
    /// Pipeline `|`: both branches populated.
    Pipe,
    /// Parenthesized subshell: only `left` populated.
    Subshell,
}

#[derive(Debug, Clone)]
pub struct CommandNode {
    pub conjunction: Conjunction,
    pub left: Option<Box<CommandNode>>,
    pub right: Option<Box<CommandNode>>,
    pub argv: Vec<String>,
    pub input: Option<String>,
    pub output: Option<String>,
}

impl CommandNode {
    pub fn leaf(argv: Vec<String>, input: Option<String>, output: Option<String>) -> Self {
        Self {
            conjunction: Conjunction::None,
            left: None,
            right: None,
            argv,
            input,
            output,
        }
    }

    pub fn and(left: CommandNode, right: CommandNode) -> Self {
        Self {
            conjunction: Conjunction::And,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            argv: Vec::new(),
            input: None,
            output: None,
        }
    }

    pub fn pipe(left: CommandNode, right: CommandNode) -> Self {
        Self {
            conjunction: Conjunction::Pipe,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            argv: Vec::new(),
            input: None,
            output: None,
        }
    }

    pub fn subshell(body: CommandNode) -> Self {
        Self {
            conjunction: Conjunction::Subshell,
            left: Some(Box::new(body)),
            right: None,
            argv: Vec::new(),
            input: None,
            output: None,
        }
    }
}
