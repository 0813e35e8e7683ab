//! DOT topology reader.
//!
//! Accepts the subset of the Graphviz DOT language used to describe switched
//! networks: node statements with attribute lists, edge chains, graph
//! attributes, default attribute statements and (possibly nested)
//! subgraphs. Ports and compass points on node references are accepted and
//! ignored. Direction is ignored: `->` and `--` both create an undirected
//! link.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use log::{debug, warn};

use crate::graph::{Graph, GraphError};

/// Errors that can occur during DOT parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DotParseError {
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, line: usize },

    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },

    #[error("line {line}: unterminated comment")]
    UnterminatedComment { line: usize },

    #[error("line {line}: unterminated HTML string")]
    UnterminatedHtml { line: usize },

    #[error("line {line}: expected {expected}, found {found}")]
    Expected {
        expected: String,
        found: String,
        line: usize,
    },
}

/// A node statement, merged across repeated mentions
#[derive(Debug, Clone, PartialEq)]
pub struct DotNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

/// One link of an edge statement
#[derive(Debug, Clone, PartialEq)]
pub struct DotEdge {
    pub source: String,
    pub target: String,
    pub attributes: BTreeMap<String, String>,
}

/// A parsed DOT document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotGraph {
    pub name: Option<String>,
    pub strict: bool,
    pub directed: bool,
    /// Nodes in order of first mention
    pub nodes: Vec<DotNode>,
    pub edges: Vec<DotEdge>,
    /// `graph [..]` and `key=value` statements
    pub attributes: BTreeMap<String, String>,
    /// `node [..]` defaults; recorded, not applied
    pub node_defaults: BTreeMap<String, String>,
    /// `edge [..]` defaults; recorded, not applied
    pub edge_defaults: BTreeMap<String, String>,
}

impl DotGraph {
    pub fn node(&self, name: &str) -> Option<&DotNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Build the analysis graph.
    ///
    /// `ID` on a node and `speed` on an edge become the raw identity and
    /// speed; every other attribute is carried along. Self-loops are skipped.
    /// Repeated links between the same pair collapse into one, later
    /// attributes winning.
    pub fn into_graph(&self) -> Graph {
        let mut graph = Graph::new();
        graph.attributes = self.attributes.clone();

        for dot_node in &self.nodes {
            let handle = graph.add_node(&dot_node.name);
            let node = graph.node_mut(handle);
            for (key, value) in &dot_node.attributes {
                if key == "ID" {
                    node.raw_id = Some(value.clone());
                } else {
                    node.attributes.insert(key.clone(), value.clone());
                }
            }
        }

        for dot_edge in &self.edges {
            let handle = match graph.connect(&dot_edge.source, &dot_edge.target) {
                Ok(handle) => handle,
                Err(GraphError::SelfLoop(node)) => {
                    warn!("Skipping self-loop on node '{}'", node);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping edge {} -- {}: {}", dot_edge.source, dot_edge.target, e);
                    continue;
                }
            };

            let edge = graph.edge_mut(handle);
            for (key, value) in &dot_edge.attributes {
                if key == "speed" {
                    edge.speed = Some(value.clone());
                } else {
                    edge.attributes.insert(key.clone(), value.clone());
                }
            }
        }

        debug!(
            "Built graph with {} nodes and {} links from DOT",
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }
}

/// Token types for DOT parsing
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Unquoted identifier or numeral
    Ident(String),
    /// Double-quoted or HTML string
    Quoted(String),
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Equals,
    Semicolon,
    Comma,
    Colon,
    EdgeOp,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Quoted(s) => format!("string \"{}\"", s),
            Token::LeftBrace => "'{'".to_string(),
            Token::RightBrace => "'}'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Semicolon => "';'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::EdgeOp => "edge operator".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }
}

struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if self.current() == Some('\n') {
            self.line += 1;
        }
        self.position += 1;
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), DotParseError> {
        let start = self.line;
        self.advance();
        self.advance();
        loop {
            match (self.current(), self.peek()) {
                (Some('*'), Some('/')) => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                (Some(_), _) => self.advance(),
                (None, _) => return Err(DotParseError::UnterminatedComment { line: start }),
            }
        }
    }

    fn read_string(&mut self) -> Result<String, DotParseError> {
        let start = self.line;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current() {
                        Some('"') => result.push('"'),
                        Some('\\') => result.push('\\'),
                        // Line continuation
                        Some('\n') => {}
                        Some(other) => {
                            result.push('\\');
                            result.push(other);
                        }
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(DotParseError::UnterminatedString { line: start })
    }

    fn read_html(&mut self) -> Result<String, DotParseError> {
        let start = self.line;
        let mut depth = 0usize;
        let mut result = String::new();

        while let Some(ch) = self.current() {
            self.advance();
            match ch {
                '<' => {
                    if depth > 0 {
                        result.push(ch);
                    }
                    depth += 1;
                }
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(result);
                    }
                    result.push(ch);
                }
                _ => result.push(ch),
            }
        }

        Err(DotParseError::UnterminatedHtml { line: start })
    }

    fn read_word(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn next_token(&mut self) -> Result<(Token, usize), DotParseError> {
        loop {
            while matches!(self.current(), Some(ch) if ch.is_whitespace()) {
                self.advance();
            }

            let line = self.line;
            let Some(ch) = self.current() else {
                return Ok((Token::Eof, line));
            };

            let token = match ch {
                '#' => {
                    self.skip_line();
                    continue;
                }
                '/' if self.peek() == Some('/') => {
                    self.skip_line();
                    continue;
                }
                '/' if self.peek() == Some('*') => {
                    self.skip_block_comment()?;
                    continue;
                }
                '-' if matches!(self.peek(), Some('-') | Some('>')) => {
                    self.advance();
                    self.advance();
                    Token::EdgeOp
                }
                '-' => {
                    self.advance();
                    let rest = self.read_word();
                    if rest.is_empty() {
                        return Err(DotParseError::UnexpectedChar { ch: '-', line });
                    }
                    Token::Ident(format!("-{}", rest))
                }
                '"' => Token::Quoted(self.read_string()?),
                '<' => Token::Quoted(self.read_html()?),
                '{' | '}' | '[' | ']' | '=' | ';' | ',' | ':' => {
                    self.advance();
                    match ch {
                        '{' => Token::LeftBrace,
                        '}' => Token::RightBrace,
                        '[' => Token::LeftBracket,
                        ']' => Token::RightBracket,
                        '=' => Token::Equals,
                        ';' => Token::Semicolon,
                        ',' => Token::Comma,
                        _ => Token::Colon,
                    }
                }
                c if c.is_alphanumeric() || c == '_' || c == '.' => Token::Ident(self.read_word()),
                other => return Err(DotParseError::UnexpectedChar { ch: other, line }),
            };

            return Ok((token, line));
        }
    }
}

struct Parser {
    lexer: Lexer,
    current: Token,
    line: usize,
    graph: DotGraph,
    node_index: HashMap<String, usize>,
    /// Nodes mentioned inside each open subgraph
    scopes: Vec<Vec<String>>,
}

impl Parser {
    fn new(mut lexer: Lexer) -> Result<Self, DotParseError> {
        let (current, line) = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            line,
            graph: DotGraph::default(),
            node_index: HashMap::new(),
            scopes: Vec::new(),
        })
    }

    fn advance(&mut self) -> Result<(), DotParseError> {
        let (token, line) = self.lexer.next_token()?;
        self.current = token;
        self.line = line;
        Ok(())
    }

    fn error(&self, expected: &str) -> DotParseError {
        DotParseError::Expected {
            expected: expected.to_string(),
            found: self.current.describe(),
            line: self.line,
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), DotParseError> {
        if self.current == token {
            self.advance()
        } else {
            Err(self.error(expected))
        }
    }

    fn parse_id(&mut self) -> Result<String, DotParseError> {
        match &self.current {
            Token::Ident(s) | Token::Quoted(s) => {
                let value = s.clone();
                self.advance()?;
                Ok(value)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn mention(&mut self, name: &str) {
        if !self.node_index.contains_key(name) {
            self.node_index.insert(name.to_string(), self.graph.nodes.len());
            self.graph.nodes.push(DotNode {
                name: name.to_string(),
                attributes: BTreeMap::new(),
            });
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name.to_string());
        }
    }

    fn skip_port(&mut self) -> Result<(), DotParseError> {
        // node_id [ ':' ID [ ':' compass ] ]
        while self.current == Token::Colon {
            self.advance()?;
            self.parse_id()?;
        }
        Ok(())
    }

    fn parse_attr_list(&mut self) -> Result<BTreeMap<String, String>, DotParseError> {
        let mut attributes = BTreeMap::new();

        while self.current == Token::LeftBracket {
            self.advance()?;
            while self.current != Token::RightBracket {
                let key = self.parse_id()?;
                let value = if self.current == Token::Equals {
                    self.advance()?;
                    self.parse_id()?
                } else {
                    "true".to_string()
                };
                attributes.insert(key, value);

                if matches!(self.current, Token::Comma | Token::Semicolon) {
                    self.advance()?;
                }
            }
            self.expect(Token::RightBracket, "']'")?;
        }

        Ok(attributes)
    }

    fn parse_graph(mut self) -> Result<DotGraph, DotParseError> {
        if self.current.is_keyword("strict") {
            self.graph.strict = true;
            self.advance()?;
        }

        if self.current.is_keyword("graph") {
            self.graph.directed = false;
        } else if self.current.is_keyword("digraph") {
            self.graph.directed = true;
        } else {
            return Err(self.error("'graph' or 'digraph'"));
        }
        self.advance()?;

        if matches!(self.current, Token::Ident(_) | Token::Quoted(_)) {
            self.graph.name = Some(self.parse_id()?);
        }

        self.expect(Token::LeftBrace, "'{'")?;
        self.parse_stmt_list()?;
        self.expect(Token::RightBrace, "'}'")?;

        if self.current != Token::Eof {
            return Err(self.error("end of input"));
        }

        Ok(self.graph)
    }

    fn parse_stmt_list(&mut self) -> Result<(), DotParseError> {
        while self.current != Token::RightBrace {
            if self.current == Token::Eof {
                return Err(self.error("'}'"));
            }
            self.parse_stmt()?;
            if self.current == Token::Semicolon {
                self.advance()?;
            }
        }
        Ok(())
    }

    fn parse_stmt(&mut self) -> Result<(), DotParseError> {
        if self.current.is_keyword("graph") {
            self.advance()?;
            let attrs = self.parse_attr_list()?;
            self.graph.attributes.extend(attrs);
            return Ok(());
        }
        if self.current.is_keyword("node") {
            self.advance()?;
            let attrs = self.parse_attr_list()?;
            self.graph.node_defaults.extend(attrs);
            return Ok(());
        }
        if self.current.is_keyword("edge") {
            self.advance()?;
            let attrs = self.parse_attr_list()?;
            self.graph.edge_defaults.extend(attrs);
            return Ok(());
        }

        if self.current.is_keyword("subgraph") || self.current == Token::LeftBrace {
            let members = self.parse_subgraph()?;
            if self.current == Token::EdgeOp {
                self.parse_edge_chain(members)?;
            }
            return Ok(());
        }

        let name = self.parse_id()?;

        if self.current == Token::Equals {
            self.advance()?;
            let value = self.parse_id()?;
            self.graph.attributes.insert(name, value);
            return Ok(());
        }

        self.mention(&name);
        self.skip_port()?;

        if self.current == Token::EdgeOp {
            return self.parse_edge_chain(vec![name]);
        }

        let attrs = self.parse_attr_list()?;
        if let Some(&index) = self.node_index.get(&name) {
            self.graph.nodes[index].attributes.extend(attrs);
        }
        Ok(())
    }

    /// `[subgraph [ID]] '{' stmt_list '}'`, returning the nodes it mentions.
    fn parse_subgraph(&mut self) -> Result<Vec<String>, DotParseError> {
        if self.current.is_keyword("subgraph") {
            self.advance()?;
            if matches!(self.current, Token::Ident(_) | Token::Quoted(_)) {
                self.parse_id()?;
            }
        }

        self.scopes.push(Vec::new());
        self.expect(Token::LeftBrace, "'{'")?;
        self.parse_stmt_list()?;
        self.expect(Token::RightBrace, "'}'")?;

        let mut members = self.scopes.pop().unwrap_or_default();
        let mut seen = HashSet::new();
        members.retain(|member| seen.insert(member.clone()));
        if let Some(parent) = self.scopes.last_mut() {
            parent.extend(members.iter().cloned());
        }
        Ok(members)
    }

    fn parse_edge_chain(&mut self, first: Vec<String>) -> Result<(), DotParseError> {
        let mut groups = vec![first];

        while self.current == Token::EdgeOp {
            self.advance()?;
            if self.current.is_keyword("subgraph") || self.current == Token::LeftBrace {
                groups.push(self.parse_subgraph()?);
            } else {
                let name = self.parse_id()?;
                self.mention(&name);
                self.skip_port()?;
                groups.push(vec![name]);
            }
        }

        let attributes = self.parse_attr_list()?;

        for pair in groups.windows(2) {
            for source in &pair[0] {
                for target in &pair[1] {
                    self.graph.edges.push(DotEdge {
                        source: source.clone(),
                        target: target.clone(),
                        attributes: attributes.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Parse a DOT document from a string.
pub fn parse_dot_str(content: &str) -> Result<DotGraph, DotParseError> {
    // Uploaded files often carry Windows line endings
    let normalized = content.replace("\r\n", "\n");
    let parser = Parser::new(Lexer::new(&normalized))?;
    parser.parse_graph()
}

/// Parse a DOT file and return a DotGraph object
pub fn parse_dot_file(path: &Path) -> Result<DotGraph> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read DOT file '{}'", path.display()))?;

    parse_dot_str(&content).wrap_err_with(|| format!("Failed to parse DOT file '{}'", path.display()))
}

/// Read a DOT file straight into an analysis graph
pub fn load_topology(path: &Path) -> Result<Graph> {
    let dot = parse_dot_file(path)?;
    if dot.directed {
        warn!("Topology '{}' is a digraph; link direction is ignored", path.display());
    }
    Ok(dot.into_graph())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simple_dot() {
        let dot = r#"
            graph lab {
                S1 -- S2;
                S2 -- S3 [speed=1000];
            }
        "#;

        let graph = parse_dot_str(dot).unwrap();

        assert_eq!(graph.name, Some("lab".to_string()));
        assert!(!graph.directed);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[1].source, "S2");
        assert_eq!(graph.edges[1].target, "S3");
        assert_eq!(graph.edges[1].attributes.get("speed"), Some(&"1000".to_string()));
    }

    #[test]
    fn test_parse_node_attributes() {
        let dot = r#"
            graph {
                "core switch" [ID=1, label="Core"];
                edge1 [ID="42"; bipartite=2]
                edge1 -- "core switch"
            }
        "#;

        let graph = parse_dot_str(dot).unwrap();

        let core = graph.node("core switch").unwrap();
        assert_eq!(core.attributes.get("ID"), Some(&"1".to_string()));
        assert_eq!(core.attributes.get("label"), Some(&"Core".to_string()));
        let edge1 = graph.node("edge1").unwrap();
        assert_eq!(edge1.attributes.get("ID"), Some(&"42".to_string()));
        assert_eq!(edge1.attributes.get("bipartite"), Some(&"2".to_string()));
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_parse_edge_chain() {
        let graph = parse_dot_str("graph { a -- b -- c -- a [speed=10] }").unwrap();

        assert_eq!(graph.edges.len(), 3);
        for edge in &graph.edges {
            assert_eq!(edge.attributes.get("speed"), Some(&"10".to_string()));
        }
        assert_eq!(graph.edges[2].source, "c");
        assert_eq!(graph.edges[2].target, "a");
    }

    #[test]
    fn test_parse_comments_and_defaults() {
        let dot = r#"
            // topology exported from the lab
            strict graph "lab 2" {
                /* defaults are recorded only */
                node [shape=box];
                edge [speed=1000];
                rankdir=LR
                # preprocessor style comment
                a -- b
            }
        "#;

        let graph = parse_dot_str(dot).unwrap();

        assert!(graph.strict);
        assert_eq!(graph.name, Some("lab 2".to_string()));
        assert_eq!(graph.attributes.get("rankdir"), Some(&"LR".to_string()));
        assert_eq!(graph.node_defaults.get("shape"), Some(&"box".to_string()));
        assert_eq!(graph.edge_defaults.get("speed"), Some(&"1000".to_string()));
        assert!(graph.edges[0].attributes.is_empty());
    }

    #[test]
    fn test_parse_subgraph_edges() {
        let dot = "graph { core -- { leaf1 leaf2 }; subgraph hosts { h1; h2 } }";

        let graph = parse_dot_str(dot).unwrap();

        assert_eq!(graph.nodes.len(), 5);
        let targets: Vec<&str> = graph.edges.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["leaf1", "leaf2"]);
        assert!(graph.edges.iter().all(|e| e.source == "core"));
    }

    #[test]
    fn test_subgraph_repeats_connect_once() {
        let graph = parse_dot_str("graph { a -- { b c b { c } } }").unwrap();

        let targets: Vec<&str> = graph.edges.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "c"]);
        assert_eq!(graph.into_graph().edge_count(), 2);
    }

    #[test]
    fn test_parse_ports_and_digraph() {
        let graph = parse_dot_str("digraph { a:p1 -> b:p2:n }").unwrap();

        assert!(graph.directed);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source, "a");
        assert_eq!(graph.edges[0].target, "b");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_dot_str("network { a -- b }"),
            Err(DotParseError::Expected { .. })
        ));
        assert!(matches!(
            parse_dot_str("graph { a -- \"b }"),
            Err(DotParseError::UnterminatedString { .. })
        ));
        assert!(matches!(
            parse_dot_str("graph { a -- b"),
            Err(DotParseError::Expected { .. })
        ));
        assert_eq!(
            parse_dot_str("graph {\n a -- b\n a @ c }"),
            Err(DotParseError::UnexpectedChar { ch: '@', line: 3 })
        );
    }

    #[test]
    fn test_into_graph() {
        let dot = r#"
            graph {
                s1 [ID=7];
                s1 -- s2 [speed=10000, color=red];
                s2 -- s1 [speed=1000];
                s2 -- s2;
            }
        "#;

        let graph = parse_dot_str(dot).unwrap().into_graph();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let s1 = graph.find("s1").unwrap();
        assert_eq!(graph.node(s1).raw_id, Some("7".to_string()));
        let (_, edge) = graph.edges().next().unwrap();
        assert_eq!(edge.canonical_direction(), "s1,s2");
        // Later duplicate wins
        assert_eq!(edge.speed, Some("1000".to_string()));
        assert_eq!(edge.attributes.get("color"), Some(&"red".to_string()));
    }

    #[test]
    fn test_parse_dot_file_with_crlf() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "graph {{\r\n  a -- b\r\n}}\r\n").unwrap();

        let graph = load_topology(temp_file.path()).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = parse_dot_file(Path::new("/nonexistent/topology.dot")).unwrap_err();
        assert!(format!("{:?}", err).contains("topology.dot"));
    }
}
